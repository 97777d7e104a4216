//! Engine configuration.
//!
//! Defaults match the shipped viewer; `from_env` lets a host override
//! the tunable limits without recompiling.

use nalgebra::Vector3;

use crate::view::ClipPlane;

/// Upper bound for the share payload: larger URLs stop working in browsers.
pub const DEFAULT_MAX_SHARE_BYTES: usize = 4 * 1024 * 1024;

/// Explode factor slider maximum.
pub const DEFAULT_MAX_EXPLODE_FACTOR: f32 = 5.0;

/// Vectors shorter than this are treated as zero-length.
pub const DEFAULT_DEGENERATE_EPSILON: f32 = 1e-6;

/// View-state engine parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    /// Explode factors are clamped to `[0, max_explode_factor]`.
    pub max_explode_factor: f32,
    /// Length below which an explode direction falls back to `(1,1,1)`.
    pub degenerate_epsilon: f32,
    /// Planes applied while sectioning is on.
    pub section_planes: Vec<ClipPlane>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            max_explode_factor: DEFAULT_MAX_EXPLODE_FACTOR,
            degenerate_epsilon: DEFAULT_DEGENERATE_EPSILON,
            section_planes: vec![ClipPlane::new(Vector3::new(0.0, -1.0, 0.0), 0.0)],
        }
    }
}

/// Share codec parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareConfig {
    /// Raw payloads above this size are rejected with `PayloadTooLarge`.
    pub max_payload_bytes: usize,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_SHARE_BYTES,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub view: ViewConfig,
    pub share: ShareConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// - `OPENCAD_MAX_SHARE_BYTES`: share payload limit in bytes
    /// - `OPENCAD_MAX_EXPLODE`: explode factor upper bound
    ///
    /// Missing or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bytes) = lookup("OPENCAD_MAX_SHARE_BYTES").and_then(|v| v.trim().parse().ok()) {
            config.share.max_payload_bytes = bytes;
        }

        if let Some(max) = lookup("OPENCAD_MAX_EXPLODE")
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
        {
            config.view.max_explode_factor = max;
        }

        config
    }
}
