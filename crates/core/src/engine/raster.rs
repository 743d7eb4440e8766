//! Sequential raster-scan engine
//!
//! Reference implementation: every pass walks its planes in order and the
//! cells of each plane in raster order, writing each relaxed value back
//! before moving on.

use super::profiler::ProfilerScope;
use super::sweep::{Stencil, SweepContext, CYCLE};
use super::DistanceEngine;
use crate::error::GeodesicError;
use tracing::trace;

/// Single-threaded raster-scan engine
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterScanEngine;

impl RasterScanEngine {
    /// Create the engine
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run one full cycle (all directional passes) in place
    pub fn run_cycle(&self, ctx: &SweepContext<'_>, distance: &mut [f32]) {
        for pass in &CYCLE {
            let stencil = Stencil::for_pass(pass, &ctx.lattice);
            let plane_len = pass.plane_len(&ctx.lattice);
            for (plane, previous) in pass.planes(&ctx.lattice) {
                for k in 0..plane_len {
                    let coord = pass.cell(&ctx.lattice, plane, k);
                    let value = ctx.relax_cell(pass, &stencil, distance, coord, previous);
                    distance[ctx.lattice.index(coord)] = value;
                }
            }
        }
    }
}

impl DistanceEngine for RasterScanEngine {
    fn propagate(
        &self,
        ctx: &SweepContext<'_>,
        distance: &mut [f32],
        iterations: usize,
    ) -> Result<(), GeodesicError> {
        debug_assert_eq!(distance.len(), ctx.lattice.len());
        let _scope = ProfilerScope::new("raster_scan");
        for cycle in 0..iterations {
            self.run_cycle(ctx, distance);
            trace!(cycle, "raster scan cycle complete");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "raster-scan"
    }
}
