//! The viewer session: loaded scene plus the user's view modifiers.
//!
//! A session is `Empty` until the first successful load and `Loaded`
//! afterwards. Loading another model replaces the scene in place and
//! resets the modifiers; a failed load leaves everything as it was.
//!
//! The session has a single owner. Hosts that share it between threads
//! should wrap it in one lock so setters and
//! [`ViewerSession::render_descriptors`] stay serialized.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::format::{ModelFormat, ModelSource};
use crate::scene::Scene;
use crate::share;
use crate::view::{compute_render_descriptors, RenderDescriptor, ViewModifiers};
use crate::worker::{spawn_load, LoadTicket, LoadedModel, PendingLoad};

/// Result of handing a finished background load to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The scene is now the active one
    Applied,
    /// A newer load was requested meanwhile; the result was dropped
    Stale,
}

#[derive(Debug)]
struct Loaded {
    source: ModelSource,
    scene: Arc<Scene>,
}

/// Owns the active scene and its view modifiers
#[derive(Debug)]
pub struct ViewerSession {
    config: EngineConfig,
    /// `None` while the session is empty
    loaded: Option<Loaded>,
    modifiers: ViewModifiers,
    revision: u64,
    last_ticket: u64,
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ViewerSession {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            loaded: None,
            modifiers: ViewModifiers::default(),
            revision: 0,
            last_ticket: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.loaded.as_ref().map(|loaded| loaded.scene.as_ref())
    }

    /// Shared handle to the scene, for handing to a render thread
    pub fn scene_handle(&self) -> Option<Arc<Scene>> {
        self.loaded.as_ref().map(|loaded| Arc::clone(&loaded.scene))
    }

    /// Bytes, format and name of the loaded file
    pub fn source(&self) -> Option<&ModelSource> {
        self.loaded.as_ref().map(|loaded| &loaded.source)
    }

    pub fn modifiers(&self) -> ViewModifiers {
        self.modifiers
    }

    /// Bumped whenever the render output may have changed
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Decode and install a model synchronously.
    ///
    /// Supersedes any background load still in flight.
    pub fn load(&mut self, source: ModelSource) -> Result<&Scene> {
        let loaded = LoadedModel::decode(source)?;
        self.last_ticket += 1;
        Ok(self.install(loaded))
    }

    /// Decode bytes tagged `"stl"` or `"obj"`.
    pub fn load_bytes(&mut self, data: Vec<u8>, tag: &str, name: &str) -> Result<&Scene> {
        let format: ModelFormat = tag.parse()?;
        self.load(ModelSource::new(data, format, name))
    }

    /// Load the model carried by a share token.
    pub fn load_share_token(&mut self, token: &str) -> Result<&Scene> {
        let source = share::decode(token)?;
        self.load(source)
    }

    /// Issue a ticket for a load that will finish later.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.last_ticket += 1;
        LoadTicket(self.last_ticket)
    }

    /// Start decoding on a worker thread.
    pub fn load_in_background(&mut self, source: ModelSource) -> PendingLoad {
        let ticket = self.begin_load();
        spawn_load(ticket, source)
    }

    /// Apply the result of a background load if it is still the latest
    /// request. Stale results, failed or not, are discarded.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<LoadedModel>,
    ) -> Result<LoadOutcome> {
        if ticket.0 != self.last_ticket {
            warn!(ticket = ticket.0, latest = self.last_ticket, "Discarding stale load result");
            return Ok(LoadOutcome::Stale);
        }

        self.install(result?);
        Ok(LoadOutcome::Applied)
    }

    /// Drop the scene and return to `Empty`.
    pub fn unload(&mut self) {
        if self.is_loaded() {
            self.last_ticket += 1;
            self.loaded = None;
            self.modifiers = ViewModifiers::default();
            self.revision += 1;
        }
    }

    fn install(&mut self, loaded: LoadedModel) -> &Scene {
        info!(
            name = %loaded.source.name,
            format = %loaded.source.format,
            parts = loaded.scene.parts().len(),
            triangles = loaded.scene.triangle_count(),
            "Model loaded"
        );
        self.modifiers = ViewModifiers::default();
        self.revision += 1;
        let installed = self.loaded.insert(Loaded {
            source: loaded.source,
            scene: Arc::new(loaded.scene),
        });
        installed.scene.as_ref()
    }

    pub fn set_wireframe(&mut self, wireframe: bool) -> bool {
        self.update(|m| m.with_wireframe(wireframe))
    }

    pub fn set_sectioning(&mut self, sectioning: bool) -> bool {
        self.update(|m| m.with_sectioning(sectioning))
    }

    pub fn set_exploded(&mut self, exploded: bool) -> bool {
        self.update(|m| m.with_exploded(exploded))
    }

    /// Clamped to `[0, max_explode_factor]`; NaN is ignored.
    pub fn set_explode_factor(&mut self, factor: f32) -> bool {
        let max = self.config.view.max_explode_factor;
        self.update(|m| m.with_explode_factor(factor, max))
    }

    pub fn toggle_wireframe(&mut self) -> bool {
        self.set_wireframe(!self.modifiers.wireframe)
    }

    pub fn toggle_sectioning(&mut self) -> bool {
        self.set_sectioning(!self.modifiers.sectioning)
    }

    pub fn toggle_exploded(&mut self) -> bool {
        self.set_exploded(!self.modifiers.exploded)
    }

    /// Apply a modifier transition. Returns whether a redraw is due;
    /// nothing happens while no model is loaded.
    fn update(&mut self, transition: impl FnOnce(ViewModifiers) -> ViewModifiers) -> bool {
        if !self.is_loaded() {
            debug!("Ignoring view change with no model loaded");
            return false;
        }

        let next = transition(self.modifiers);
        if next == self.modifiers {
            return false;
        }

        self.modifiers = next;
        self.revision += 1;
        true
    }

    /// Per-part render state; empty when nothing is loaded
    pub fn render_descriptors(&self) -> Vec<RenderDescriptor> {
        self.scene()
            .map(|scene| compute_render_descriptors(scene, &self.modifiers, &self.config.view))
            .unwrap_or_default()
    }

    /// Display names for the hierarchy tree; empty when nothing is loaded
    pub fn hierarchy(&self) -> Vec<String> {
        self.scene().map(Scene::hierarchy).unwrap_or_default()
    }

    /// Share token for the loaded file, `None` when nothing is loaded
    pub fn share_token(&self) -> Option<Result<String>> {
        self.source().map(|source| {
            share::encode(
                &source.data,
                source.format.as_str(),
                &source.name,
                &self.config.share,
            )
        })
    }
}
