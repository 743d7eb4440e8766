//! Distance engine trait definition
//!
//! This module defines the `DistanceEngine` trait, the backend-agnostic
//! interface every propagation strategy implements.

use super::sweep::SweepContext;
use crate::error::GeodesicError;

/// Backend-agnostic interface for geodesic distance propagation
///
/// An engine refines an initialised distance buffer in place. Every
/// implementation follows the same pass schedule and update rule, so the
/// fixed point it reaches does not depend on the backend.
pub trait DistanceEngine: Send + Sync {
    /// Run `iterations` full sweep cycles over `distance`
    ///
    /// # Arguments
    ///
    /// * `ctx` - Lattice, guidance image and update weights
    /// * `distance` - Distance buffer in `[D, H, W]` row-major order, modified in place
    /// * `iterations` - Number of full cycles
    ///
    /// # Errors
    ///
    /// CPU engines never fail. The GPU engine reports device-side failures;
    /// in that case `distance` is left untouched.
    fn propagate(
        &self,
        ctx: &SweepContext<'_>,
        distance: &mut [f32],
        iterations: usize,
    ) -> Result<(), GeodesicError>;

    /// Short engine name for logging
    fn name(&self) -> &'static str;

    /// Check if this is the GPU backend
    ///
    /// # Returns
    ///
    /// `true` if GPU-accelerated, `false` if CPU-only
    fn is_gpu_accelerated(&self) -> bool {
        false
    }
}
