//! GPU wavefront engine
//!
//! This module provides a GPU implementation of the `DistanceEngine` trait
//! using a wgpu compute shader. It is only available when the `gpu` feature
//! is enabled.
//!
//! # Shader Files
//!
//! - `shaders/geodesic_sweep.wgsl` - relaxes every cell of one plane against
//!   the previous plane
//!
//! # Implementation
//!
//! The pass schedule is the one the CPU engines follow. Each plane becomes
//! one dispatch; the plane to work on is selected through a dynamic offset
//! into a uniform buffer holding one `PlaneStep` per plane of a cycle.
//! Dispatches in a compute pass are ordered, so plane `p` always sees the
//! finished plane `p ∓ 1`. All cycles are recorded into a single command
//! buffer and the result is read back once through a staging buffer.
//!
//! Error scopes live on the `wgpu::Device`, not on the calling thread, so a
//! whole push/run/pop sequence holds `submission` for its duration.

use super::context::GpuContext;
use super::profiler::ProfilerScope;
use super::sweep::{SweepContext, CYCLE};
use super::DistanceEngine;
use crate::error::GeodesicError;
use crate::field::Device;
use bytemuck::{Pod, Zeroable};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

/// Workgroup edge length (defined in the shader)
const WORKGROUP_SIZE: u32 = 8;

/// Grid parameters (must match WGSL struct layout)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GridParams {
    depth: u32,
    height: u32,
    width: u32,
    channels: u32,
    l_grad: f32,
    l_eucl: f32,
    spacing_d: f32,
    spacing_h: f32,
    spacing_w: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}

/// One plane of the schedule (must match WGSL struct layout)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PlaneStep {
    axis: u32,
    plane: u32,
    previous: u32,
    _pad: u32,
}

/// A recorded plane dispatch
struct Dispatch {
    offset: u32,
    workgroups: (u32, u32),
}

fn to_u32(value: usize, what: &str) -> Result<u32, GeodesicError> {
    u32::try_from(value).map_err(|_| GeodesicError::Gpu {
        reason: format!("{what} {value} exceeds the 32-bit range of the shader"),
    })
}

/// GPU engine running one compute dispatch per plane
pub struct GpuWavefrontEngine {
    context: GpuContext,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    // Serializes error-scope sequences on the shared device
    submission: Mutex<()>,
}

impl GpuWavefrontEngine {
    /// Build the compute pipeline on an initialized context
    #[must_use]
    pub fn new(context: GpuContext) -> Self {
        let device = context.device();
        let shader =
            device.create_shader_module(wgpu::include_wgsl!("shaders/geodesic_sweep.wgsl"));

        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Geodesic Sweep Bind Group Layout"),
            entries: &[
                // guidance (binding 0)
                storage_entry(0, true),
                // distance (binding 1)
                storage_entry(1, false),
                // grid params (binding 2)
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // plane step (binding 3), selected per dispatch
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<PlaneStep>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Geodesic Sweep Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Geodesic Sweep Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        Self {
            context,
            pipeline,
            bind_group_layout,
            submission: Mutex::new(()),
        }
    }

    /// Name of the adapter this engine runs on
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        self.context.adapter_name()
    }

    /// Pack the plane steps of one cycle at `stride`-byte intervals
    fn schedule(
        ctx: &SweepContext<'_>,
        stride: usize,
    ) -> Result<(Vec<u8>, Vec<Dispatch>), GeodesicError> {
        let dims = ctx.lattice.dims();
        let mut bytes = Vec::new();
        let mut dispatches = Vec::new();

        for pass in &CYCLE {
            let (a, b) = pass.cross_axes();
            let workgroups = (
                to_u32(dims[b], "extent")?.div_ceil(WORKGROUP_SIZE),
                to_u32(dims[a], "extent")?.div_ceil(WORKGROUP_SIZE),
            );
            for (plane, previous) in pass.planes(&ctx.lattice) {
                let step = PlaneStep {
                    axis: to_u32(pass.axis, "axis")?,
                    plane: to_u32(plane, "plane")?,
                    previous: to_u32(previous, "plane")?,
                    _pad: 0,
                };
                let offset = bytes.len();
                bytes.extend_from_slice(bytemuck::bytes_of(&step));
                bytes.resize(offset + stride, 0);
                dispatches.push(Dispatch {
                    offset: to_u32(offset, "uniform offset")?,
                    workgroups,
                });
            }
        }
        Ok((bytes, dispatches))
    }

    fn grid_params(ctx: &SweepContext<'_>) -> Result<GridParams, GeodesicError> {
        let [depth, height, width] = ctx.lattice.dims();
        let spacing = ctx.lattice.spacing();
        Ok(GridParams {
            depth: to_u32(depth, "depth")?,
            height: to_u32(height, "height")?,
            width: to_u32(width, "width")?,
            channels: to_u32(ctx.guidance.channels(), "channel count")?,
            l_grad: ctx.rule.gradient_weight(),
            l_eucl: ctx.rule.euclidean_weight(),
            spacing_d: spacing.x,
            spacing_h: spacing.y,
            spacing_w: spacing.z,
            _pad0: 0.0,
            _pad1: 0.0,
            _pad2: 0.0,
        })
    }

    /// Upload, run every cycle and read the distance buffer back
    fn run(
        &self,
        ctx: &SweepContext<'_>,
        distance: &[f32],
        iterations: usize,
    ) -> Result<Vec<f32>, GeodesicError> {
        let device = self.context.device();
        let queue = self.context.queue();

        let alignment = self.context.uniform_offset_alignment() as usize;
        let stride = std::mem::size_of::<PlaneStep>().next_multiple_of(alignment);
        let (steps, dispatches) = Self::schedule(ctx, stride)?;
        let params = Self::grid_params(ctx)?;
        let buffer_size = std::mem::size_of_val(distance) as u64;

        let guidance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Guidance Buffer"),
            contents: bytemuck::cast_slice(ctx.guidance.as_slice()),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let distance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Distance Buffer"),
            contents: bytemuck::cast_slice(distance),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Grid Params Buffer"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let steps_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Plane Step Buffer"),
            contents: &steps,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Distance Staging Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Geodesic Sweep Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: guidance_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: distance_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &steps_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<PlaneStep>() as u64),
                    }),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Geodesic Sweep Encoder"),
        });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Geodesic Sweep Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            for cycle in 0..iterations {
                for dispatch in &dispatches {
                    compute_pass.set_bind_group(0, &bind_group, &[dispatch.offset]);
                    compute_pass.dispatch_workgroups(dispatch.workgroups.0, dispatch.workgroups.1, 1);
                }
                trace!(cycle, planes = dispatches.len(), "gpu cycle recorded");
            }
        }
        encoder.copy_buffer_to_buffer(&distance_buffer, 0, &staging_buffer, 0, buffer_size);
        queue.submit(std::iter::once(encoder.finish()));

        // Map and read
        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GeodesicError::Gpu {
                reason: format!("readback channel closed: {e}"),
            })?
            .map_err(|e| GeodesicError::Gpu {
                reason: format!("failed to map distance buffer: {e}"),
            })?;

        let data = buffer_slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging_buffer.unmap();

        Ok(result)
    }
}

impl DistanceEngine for GpuWavefrontEngine {
    fn propagate(
        &self,
        ctx: &SweepContext<'_>,
        distance: &mut [f32],
        iterations: usize,
    ) -> Result<(), GeodesicError> {
        debug_assert_eq!(distance.len(), ctx.lattice.len());
        if iterations == 0 || CYCLE.iter().all(|pass| pass.planes(&ctx.lattice).next().is_none()) {
            return Ok(());
        }
        if !self
            .context
            .can_allocate(ctx.lattice.len(), ctx.guidance.channels())
        {
            return Err(GeodesicError::BackendUnavailable {
                device: Device::Gpu,
                reason: format!(
                    "{} cells × {} channels exceed the device buffer limits",
                    ctx.lattice.len(),
                    ctx.guidance.channels()
                ),
            });
        }

        let _scope = ProfilerScope::new("gpu_wavefront");
        let device = self.context.device();
        let (result, validation, out_of_memory) = {
            // The guard protects no data, a poisoned lock is still usable
            let _guard = self
                .submission
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let result = self.run(ctx, distance, iterations);
            let validation = pollster::block_on(device.pop_error_scope());
            let out_of_memory = pollster::block_on(device.pop_error_scope());
            (result, validation, out_of_memory)
        };

        if let Some(error) = validation.or(out_of_memory) {
            debug!("GPU propagation failed: {}", error);
            return Err(GeodesicError::Gpu {
                reason: error.to_string(),
            });
        }
        let refined = result?;
        distance.copy_from_slice(&refined);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gpu-wavefront"
    }

    fn is_gpu_accelerated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::GpuInitResult;
    use crate::engine::lattice::{Guidance, Lattice};
    use crate::engine::local_update::LocalUpdateRule;
    use crate::engine::RasterScanEngine;
    use nalgebra::Vector3;

    fn gpu_engine() -> Option<GpuWavefrontEngine> {
        match GpuContext::new() {
            GpuInitResult::Success(context) => Some(GpuWavefrontEngine::new(context)),
            _ => None,
        }
    }

    #[test]
    fn test_grid_params_layout() {
        assert_eq!(std::mem::size_of::<GridParams>(), 48);
        assert_eq!(std::mem::size_of::<PlaneStep>(), 16);
    }

    #[test]
    fn test_schedule_packs_one_step_per_plane() {
        let lattice = Lattice::new([1, 4, 3], Vector3::repeat(1.0));
        let image = vec![0.0; lattice.len()];
        let ctx = SweepContext {
            lattice,
            guidance: Guidance::new(&image, 1, lattice.len()),
            rule: LocalUpdateRule::from_weights(0.0, 1.0),
        };
        let (bytes, dispatches) = GpuWavefrontEngine::schedule(&ctx, 256).unwrap();
        // Depth contributes nothing; H has 3 planes per direction, W has 2
        assert_eq!(dispatches.len(), 10);
        assert_eq!(bytes.len(), 10 * 256);
        assert_eq!(dispatches[1].offset, 256);
        let first: &PlaneStep = bytemuck::from_bytes(&bytes[..16]);
        assert_eq!((first.axis, first.plane, first.previous), (1, 1, 0));
    }

    #[test]
    fn test_matches_raster_scan() {
        let Some(engine) = gpu_engine() else {
            return;
        };
        let lattice = Lattice::new([4, 12, 10], Vector3::new(2.0, 1.0, 0.5));
        let image: Vec<f32> = (0..lattice.len()).map(|i| ((i * 7) % 11) as f32 / 11.0).collect();
        let ctx = SweepContext {
            lattice,
            guidance: Guidance::new(&image, 1, lattice.len()),
            rule: LocalUpdateRule::from_weights(0.7, 0.3),
        };
        let mut initial = vec![1e10; lattice.len()];
        initial[lattice.index([1, 5, 4])] = 0.0;

        let mut expected = initial.clone();
        RasterScanEngine::new()
            .propagate(&ctx, &mut expected, 2)
            .unwrap();
        let mut actual = initial;
        engine.propagate(&ctx, &mut actual, 2).unwrap();

        for (e, a) in expected.iter().zip(&actual) {
            assert!((e - a).abs() <= 1e-3 * e.abs().max(1.0), "{e} vs {a}");
        }
    }

    #[test]
    fn test_pipeline_builds() {
        let Some(engine) = gpu_engine() else {
            return;
        };
        assert!(!engine.adapter_name().is_empty());
        assert!(engine.is_gpu_accelerated());
        assert_eq!(engine.name(), "gpu-wavefront");
    }

    #[test]
    fn test_concurrent_propagations_stay_separate() {
        let Some(engine) = gpu_engine() else {
            return;
        };
        let lattice = Lattice::new([3, 10, 9], Vector3::repeat(1.0));
        let image: Vec<f32> = (0..lattice.len()).map(|i| (i % 5) as f32).collect();
        let ctx = SweepContext {
            lattice,
            guidance: Guidance::new(&image, 1, lattice.len()),
            rule: LocalUpdateRule::from_weights(0.5, 0.5),
        };
        let mut near = vec![1e10; lattice.len()];
        near[0] = 0.0;
        let mut far = vec![1e10; lattice.len()];
        far[lattice.len() - 1] = 0.0;

        let mut expected_near = near.clone();
        let mut expected_far = far.clone();
        RasterScanEngine::new().propagate(&ctx, &mut expected_near, 2).unwrap();
        RasterScanEngine::new().propagate(&ctx, &mut expected_far, 2).unwrap();

        let (a, b) = rayon::join(
            || engine.propagate(&ctx, &mut near, 2),
            || engine.propagate(&ctx, &mut far, 2),
        );
        a.unwrap();
        b.unwrap();
        for (expected, actual) in [(&expected_near, &near), (&expected_far, &far)] {
            for (e, a) in expected.iter().zip(actual.iter()) {
                assert!((e - a).abs() <= 1e-3 * e.abs().max(1.0), "{e} vs {a}");
            }
        }
    }
}
