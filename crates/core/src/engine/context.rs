//! wgpu device acquisition for the GPU engine
//!
//! A missing adapter is an ordinary outcome on headless machines and is
//! reported apart from an adapter that refuses to create a device.

/// Outcome of acquiring a compute device
#[derive(Debug)]
pub enum GpuInitResult {
    /// Device and queue ready
    #[cfg(feature = "gpu")]
    Success(GpuContext),
    /// No adapter offered by any backend
    NoGpuFound,
    /// An adapter was found but `request_device` failed
    InitFailed {
        /// Adapter reported by the backend
        adapter_name: String,
        /// Backend error text
        error: String,
    },
}

#[cfg(feature = "gpu")]
mod gpu_impl {
    use super::GpuInitResult;
    use tracing::{debug, info};

    /// Device, queue and adapter description shared by GPU propagations
    #[derive(Debug)]
    pub struct GpuContext {
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_info: wgpu::AdapterInfo,
    }

    fn request_adapter() -> Option<wgpu::Adapter> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
    }

    impl GpuContext {
        /// Acquire the highest-performance adapter and open a compute device on it
        #[allow(clippy::new_ret_no_self)]
        pub fn new() -> GpuInitResult {
            let Some(adapter) = request_adapter() else {
                debug!("No wgpu adapter available for geodesic sweeps");
                return GpuInitResult::NoGpuFound;
            };
            let adapter_info = adapter.get_info();
            debug!(
                adapter = %adapter_info.name,
                backend = ?adapter_info.backend,
                "Opening geodesic compute device"
            );

            let descriptor = wgpu::DeviceDescriptor {
                label: Some("Geodesic Compute Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            };
            match pollster::block_on(adapter.request_device(&descriptor, None)) {
                Ok((device, queue)) => {
                    info!("Geodesic compute device ready on {}", adapter_info.name);
                    GpuInitResult::Success(Self {
                        device,
                        queue,
                        adapter_info,
                    })
                }
                Err(e) => GpuInitResult::InitFailed {
                    adapter_name: adapter_info.name,
                    error: e.to_string(),
                },
            }
        }

        #[must_use]
        pub fn adapter_name(&self) -> &str {
            &self.adapter_info.name
        }

        /// Whether a `cells × channels` guidance buffer fits one storage binding
        ///
        /// The distance buffer has a single channel, so it fits whenever the
        /// guidance does.
        #[must_use]
        pub fn can_allocate(&self, cells: usize, channels: usize) -> bool {
            let limits = self.device.limits();
            let bytes = (cells as u64)
                .saturating_mul(channels as u64)
                .saturating_mul(std::mem::size_of::<f32>() as u64);
            bytes <= u64::from(limits.max_storage_buffer_binding_size)
                && bytes <= limits.max_buffer_size
        }

        /// Required alignment of dynamic uniform buffer offsets
        #[must_use]
        pub fn uniform_offset_alignment(&self) -> u32 {
            self.device.limits().min_uniform_buffer_offset_alignment
        }

        #[must_use]
        pub fn device(&self) -> &wgpu::Device {
            &self.device
        }

        #[must_use]
        pub fn queue(&self) -> &wgpu::Queue {
            &self.queue
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_init_outcome_is_consistent() {
            // Which variant comes back depends on the host
            match GpuContext::new() {
                GpuInitResult::Success(ctx) => {
                    assert!(!ctx.adapter_name().is_empty());
                    assert!(ctx.uniform_offset_alignment().is_power_of_two());
                }
                GpuInitResult::NoGpuFound => {}
                GpuInitResult::InitFailed {
                    adapter_name,
                    error,
                } => {
                    assert!(!adapter_name.is_empty());
                    assert!(!error.is_empty());
                }
            }
        }

        #[test]
        fn test_can_allocate() {
            if let GpuInitResult::Success(ctx) = GpuContext::new() {
                assert!(ctx.can_allocate(256 * 256, 1));
                assert!(!ctx.can_allocate(usize::MAX / 8, 4));
            }
        }
    }
}

#[cfg(feature = "gpu")]
pub use gpu_impl::GpuContext;
