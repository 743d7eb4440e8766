//! Transform parameters and execution strategy
//!
//! `GeodesicParams` carries the numeric knobs shared by every entry point;
//! `ExecutionStrategy` picks which engine runs the sweeps.

use crate::error::GeodesicError;
use serde::{Deserialize, Serialize};

/// Default initialisation ceiling for non-seed cells
pub const DEFAULT_CEILING: f32 = 1e10;

/// Default number of full sweep cycles
pub const DEFAULT_ITERATIONS: usize = 2;

/// Numeric parameters of the geodesic transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeodesicParams {
    /// Initialisation ceiling; the distance assigned to cells with mask value 1
    pub v: f32,
    /// Blend factor in [0, 1]: 1.0 is purely image-driven, 0.0 purely spatial
    pub lamb: f32,
    /// Number of full sweep cycles
    pub iterations: usize,
}

impl Default for GeodesicParams {
    fn default() -> Self {
        Self {
            v: DEFAULT_CEILING,
            lamb: 1.0,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl GeodesicParams {
    /// Create parameters from the three scalars
    #[must_use]
    pub const fn new(v: f32, lamb: f32, iterations: usize) -> Self {
        Self {
            v,
            lamb,
            iterations,
        }
    }

    /// Weight of the image dissimilarity term
    #[must_use]
    pub fn gradient_weight(&self) -> f32 {
        self.lamb
    }

    /// Weight of the spatial step term
    #[must_use]
    pub fn euclidean_weight(&self) -> f32 {
        1.0 - self.lamb
    }

    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `lamb` is outside [0, 1] or `v` is not finite.
    pub fn validate(&self) -> Result<(), GeodesicError> {
        if !(0.0..=1.0).contains(&self.lamb) {
            return Err(GeodesicError::invalid_parameter(
                "lamb",
                format!("must lie in [0, 1], got {}", self.lamb),
            ));
        }
        if !self.v.is_finite() {
            return Err(GeodesicError::invalid_parameter(
                "v",
                format!("must be finite, got {}", self.v),
            ));
        }
        Ok(())
    }
}

/// Which engine propagates the distance field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    /// Wavefront engine for CPU fields, GPU engine for GPU fields
    #[default]
    Auto,
    /// Single-threaded raster scan (reference implementation)
    Sequential,
    /// Rayon wavefront engine
    Wavefront {
        /// Worker count; `None` uses the global rayon pool
        threads: Option<usize>,
    },
}
