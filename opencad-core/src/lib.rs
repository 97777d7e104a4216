/// OpenCAD Core Library - Model ingestion and view-state engine
///
/// This library turns binary STL and OBJ files into an immutable scene of
/// named parts, derives per-part render state from the user's view
/// modifiers, and packs model files into shareable URL tokens. It has no
/// rendering dependency; a graphics backend consumes its output.

pub mod config;
pub mod error;
pub mod format;
pub mod geometry;
pub mod obj;
pub mod scene;
pub mod session;
pub mod share;
pub mod stl;
pub mod view;
pub mod worker;

// Re-export commonly used types
pub use config::{EngineConfig, ShareConfig, ViewConfig};
pub use error::{Error, Result};
pub use format::{load, load_scene, ModelFormat, ModelSource};
pub use geometry::{Aabb, Part, Triangle};
pub use scene::Scene;
pub use session::{LoadOutcome, ViewerSession};
pub use view::{compute_render_descriptors, ClipPlane, RenderDescriptor, TriangleClip, ViewModifiers};
pub use worker::{LoadTicket, LoadedModel, PendingLoad};
