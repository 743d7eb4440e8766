//! Error types for the geodesic transform
//!
//! Every variant except `Allocation` and `Gpu` is raised by input validation,
//! before any propagation work starts. Propagation itself cannot fail on the
//! CPU engines.

use crate::field::Device;
use std::fmt;

/// Errors returned by the public transform entry points
#[derive(Debug, Clone, PartialEq)]
pub enum GeodesicError {
    /// Batch size, channel count, spatial rank or spatial extents are wrong
    InvalidShape {
        /// Human-readable description of the violated constraint
        reason: String,
    },
    /// Spacing vector has the wrong length or contains non-positive values
    InvalidSpacing {
        /// Number of spatial axes the call expects
        expected: usize,
        /// Offending spacing values
        actual: Vec<f32>,
    },
    /// Image and mask live on different execution targets
    DeviceMismatch {
        /// Device of the guidance image
        image: Device,
        /// Device of the mask
        mask: Device,
    },
    /// A scalar parameter is outside its valid range
    InvalidParameter {
        /// Parameter name (e.g. `"lamb"`)
        name: &'static str,
        /// Description of the constraint
        reason: String,
    },
    /// No engine can run on the requested device
    BackendUnavailable {
        /// Requested device
        device: Device,
        /// Why the backend cannot be used
        reason: String,
    },
    /// Output or scratch buffer could not be allocated
    Allocation {
        /// Number of bytes requested
        bytes: usize,
    },
    /// Device-side failure while propagating or reading back
    Gpu {
        /// Error message from the GPU layer
        reason: String,
    },
}

impl GeodesicError {
    pub(crate) fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GeodesicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidShape { reason } => write!(f, "invalid shape: {reason}"),
            Self::InvalidSpacing { expected, actual } => write!(
                f,
                "invalid spacing: expected {expected} positive finite values, got {actual:?}"
            ),
            Self::DeviceMismatch { image, mask } => write!(
                f,
                "device mismatch: image is on {image}, mask is on {mask}"
            ),
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter '{name}': {reason}")
            }
            Self::BackendUnavailable { device, reason } => {
                write!(f, "no backend available for {device}: {reason}")
            }
            Self::Allocation { bytes } => write!(f, "failed to allocate {bytes} bytes"),
            Self::Gpu { reason } => write!(f, "GPU error: {reason}"),
        }
    }
}

impl std::error::Error for GeodesicError {}

/// Allocate a zeroed `f32` buffer, reporting allocation failure instead of aborting
pub(crate) fn try_alloc(len: usize) -> Result<Vec<f32>, GeodesicError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| GeodesicError::Allocation {
            bytes: len.saturating_mul(std::mem::size_of::<f32>()),
        })?;
    buffer.resize(len, 0.0);
    Ok(buffer)
}
