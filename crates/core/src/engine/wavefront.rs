//! Rayon wavefront engine
//!
//! Same pass schedule as the raster engine. Each plane is a wavefront: its
//! cells are relaxed concurrently into a scratch buffer, then written back
//! before the next plane starts. The write-back is the barrier between
//! wavefronts. Every cell goes through `SweepContext::relax_cell`, so the
//! output is bit-identical to `RasterScanEngine`.

use super::profiler::ProfilerScope;
use super::sweep::{Stencil, SweepContext, CYCLE};
use super::DistanceEngine;
use crate::error::{try_alloc, GeodesicError};
use crate::field::Device;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::trace;

/// Smallest number of cells handed to one rayon task
const MIN_CELLS_PER_TASK: usize = 256;

/// Parallel wavefront engine using Rayon
#[derive(Debug, Clone, Default)]
pub struct WavefrontParallelEngine {
    // Dedicated worker pool; `None` runs on rayon's global pool
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl WavefrontParallelEngine {
    /// Create an engine running on rayon's global pool
    #[must_use]
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Create an engine with a dedicated pool of `threads` workers
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `threads` is zero and
    /// `BackendUnavailable` if the pool cannot be started.
    pub fn with_threads(threads: usize) -> Result<Self, GeodesicError> {
        if threads == 0 {
            return Err(GeodesicError::invalid_parameter(
                "threads",
                "worker pool needs at least one thread",
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("geodesic-wavefront-{i}"))
            .build()
            .map_err(|e| GeodesicError::BackendUnavailable {
                device: Device::Cpu,
                reason: e.to_string(),
            })?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    /// Number of workers this engine runs on
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, |pool| pool.current_num_threads())
    }

    /// Run one full cycle in place, using `scratch` to stage each wavefront
    pub fn run_cycle(&self, ctx: &SweepContext<'_>, distance: &mut [f32], scratch: &mut [f32]) {
        for pass in &CYCLE {
            let stencil = Stencil::for_pass(pass, &ctx.lattice);
            let wavefront = &mut scratch[..pass.plane_len(&ctx.lattice)];

            for (plane, previous) in pass.planes(&ctx.lattice) {
                let current: &[f32] = distance;
                wavefront
                    .par_iter_mut()
                    .enumerate()
                    .with_min_len(MIN_CELLS_PER_TASK)
                    .for_each(|(k, value)| {
                        let coord = pass.cell(&ctx.lattice, plane, k);
                        *value = ctx.relax_cell(pass, &stencil, current, coord, previous);
                    });

                write_back(pass.axis, ctx.lattice.dims(), plane, wavefront, distance);
            }
        }
    }

    fn max_plane_len(ctx: &SweepContext<'_>) -> usize {
        CYCLE
            .iter()
            .map(|pass| pass.plane_len(&ctx.lattice))
            .max()
            .unwrap_or(0)
    }
}

/// Scatter a finished wavefront of `axis` back into the `[D, H, W]` buffer
///
/// Wavefront cells are in raster order over the two cross axes, so each
/// contiguous run of `distance` maps to a contiguous run of `wavefront`.
fn write_back(axis: usize, dims: [usize; 3], plane: usize, wavefront: &[f32], distance: &mut [f32]) {
    let [_, height, width] = dims;
    match axis {
        // Plane z is the slab [z*H*W, (z+1)*H*W)
        0 => {
            let slab = height * width;
            distance[plane * slab..(plane + 1) * slab].copy_from_slice(wavefront);
        }
        // Plane y holds row y of every slab
        1 => distance
            .par_chunks_mut(height * width)
            .zip(wavefront.par_chunks(width))
            .for_each(|(slab, row)| {
                slab[plane * width..(plane + 1) * width].copy_from_slice(row);
            }),
        // Plane x holds column x of every row
        _ => distance
            .par_chunks_mut(width)
            .zip(wavefront.par_iter())
            .with_min_len(MIN_CELLS_PER_TASK)
            .for_each(|(row, &value)| row[plane] = value),
    }
}

impl DistanceEngine for WavefrontParallelEngine {
    fn propagate(
        &self,
        ctx: &SweepContext<'_>,
        distance: &mut [f32],
        iterations: usize,
    ) -> Result<(), GeodesicError> {
        debug_assert_eq!(distance.len(), ctx.lattice.len());
        let _scope = ProfilerScope::new("wavefront");
        let mut scratch = try_alloc(Self::max_plane_len(ctx))?;

        let mut run = || {
            for cycle in 0..iterations {
                self.run_cycle(ctx, distance, &mut scratch);
                trace!(cycle, "wavefront cycle complete");
            }
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "wavefront"
    }
}
