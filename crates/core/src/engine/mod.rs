//! Distance propagation engines
//!
//! This module provides the sweep machinery behind every transform. The core
//! abstraction is the `DistanceEngine` trait, which has sequential, parallel
//! and GPU implementations sharing one pass schedule and one update rule.
//!
//! # Feature Flags
//!
//! - `gpu` (default): Enables the wgpu engine. Disable with `--no-default-features`
//!   for environments without GPU access.
//!
//! # Backend Selection
//!
//! `create_engine` maps an `ExecutionStrategy` and the device the fields
//! live on to an engine:
//! 1. `Sequential` always uses the raster-scan engine
//! 2. `Wavefront` always uses the rayon engine
//! 3. `Auto` uses the rayon engine for CPU fields and the GPU engine for GPU fields
//!
//! # Example
//!
//! ```rust,ignore
//! use geodesic_core::engine::create_engine;
//! use geodesic_core::{Device, ExecutionStrategy};
//!
//! let engine = create_engine(ExecutionStrategy::Auto, Device::Cpu)?;
//! ```

mod context;
#[cfg(feature = "gpu")]
mod gpu;
pub mod lattice;
pub mod local_update;
pub mod profiler;
mod raster;
pub mod sweep;
#[allow(clippy::module_name_repetitions)]
mod r#trait;
mod wavefront;

// Re-exports
pub use context::GpuInitResult;
pub use lattice::{Guidance, Lattice};
pub use local_update::{step_length, LocalUpdateRule};
pub use profiler::ProfilerScope;
pub use r#trait::DistanceEngine;
pub use raster::RasterScanEngine;
pub use sweep::{Direction, Stencil, StencilEntry, SweepContext, SweepPass, CYCLE};
pub use wavefront::WavefrontParallelEngine;

#[cfg(feature = "gpu")]
pub use context::GpuContext;
#[cfg(feature = "gpu")]
pub use gpu::GpuWavefrontEngine;

use crate::error::GeodesicError;
use crate::field::Device;
use crate::params::ExecutionStrategy;
use tracing::info;
#[cfg(feature = "gpu")]
use tracing::warn;

/// Create a distance engine for a strategy and device
///
/// # Arguments
///
/// * `strategy` - Requested execution strategy
/// * `device` - Device the input fields are tagged with
///
/// # Returns
///
/// A boxed `DistanceEngine` trait object
///
/// # Errors
///
/// Returns `BackendUnavailable` when `Auto` targets a GPU field and the `gpu`
/// feature is disabled or no usable adapter exists, and `InvalidParameter`
/// for a dedicated pool of zero threads.
pub fn create_engine(
    strategy: ExecutionStrategy,
    device: Device,
) -> Result<Box<dyn DistanceEngine>, GeodesicError> {
    match (strategy, device) {
        (ExecutionStrategy::Sequential, _) => {
            info!("Using sequential raster-scan engine ({} fields)", device);
            Ok(Box::new(RasterScanEngine::new()))
        }
        (ExecutionStrategy::Wavefront { .. }, _) | (ExecutionStrategy::Auto, Device::Cpu) => {
            let engine = match threads_of(strategy) {
                Some(n) => WavefrontParallelEngine::with_threads(n)?,
                None => WavefrontParallelEngine::new(),
            };
            info!(
                "Using wavefront engine on {} threads ({} fields)",
                engine.threads(),
                device
            );
            Ok(Box::new(engine))
        }
        (ExecutionStrategy::Auto, Device::Gpu) => create_gpu_engine(),
    }
}

fn threads_of(strategy: ExecutionStrategy) -> Option<usize> {
    match strategy {
        ExecutionStrategy::Wavefront { threads } => threads,
        _ => None,
    }
}

#[cfg(feature = "gpu")]
fn create_gpu_engine() -> Result<Box<dyn DistanceEngine>, GeodesicError> {
    match GpuContext::new() {
        GpuInitResult::Success(gpu_context) => {
            info!("Using GPU backend: {}", gpu_context.adapter_name());
            Ok(Box::new(GpuWavefrontEngine::new(gpu_context)))
        }
        GpuInitResult::NoGpuFound => {
            warn!("No GPU found for a GPU field");
            Err(GeodesicError::BackendUnavailable {
                device: Device::Gpu,
                reason: "no compatible GPU adapter found".to_string(),
            })
        }
        GpuInitResult::InitFailed {
            adapter_name,
            error,
        } => {
            warn!(
                "GPU '{}' found but failed to initialize: {}",
                adapter_name, error
            );
            Err(GeodesicError::BackendUnavailable {
                device: Device::Gpu,
                reason: format!("GPU '{adapter_name}' failed to initialize: {error}"),
            })
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn create_gpu_engine() -> Result<Box<dyn DistanceEngine>, GeodesicError> {
    info!("GPU feature disabled, cannot run GPU fields");
    Err(GeodesicError::BackendUnavailable {
        device: Device::Gpu,
        reason: "crate built without the `gpu` feature".to_string(),
    })
}
