//! Import adapter: turns external bytes (files, SVG markup, remote URLs) into populated layers.

pub mod handoff;
pub mod raster;
pub mod remote;
pub mod svg;

use serde::{Deserialize, Serialize};

/// What to paint into a layer whose content could not be produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Leave the registry (or the already-allocated layer) as it is.
    #[default]
    None,
    /// Solid background with a centered label.
    Placeholder,
}

/// Failure fallback per asset kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    pub svg: Fallback,
    pub raster: Fallback,
    pub remote: Fallback,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            svg: Fallback::Placeholder,
            raster: Fallback::None,
            remote: Fallback::None,
        }
    }
}

impl FallbackPolicy {
    /// Same fallback for every asset kind.
    pub fn uniform(fallback: Fallback) -> Self {
        Self {
            svg: fallback,
            raster: fallback,
            remote: fallback,
        }
    }
}
