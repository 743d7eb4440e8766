//! Dense grid fields
//!
//! `GridField` stores an image, mask or distance map as a flat `Vec<f32>` in
//! row-major `[batch, channel, spatial...]` order, the layout callers already
//! use for tensors. Spatial rank is 2 (`[N, C, H, W]`) or 3
//! (`[N, C, D, H, W]`).

use crate::error::GeodesicError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution target a field lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Device {
    /// Host memory, propagated by the CPU engines
    #[default]
    Cpu,
    /// Accelerator memory, propagated by the wgpu engine (feature `gpu`)
    Gpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

/// Dense `f32` field over a 2D or 3D lattice
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    shape: Vec<usize>,
    spacing: Vec<f32>,
    device: Device,
    data: Vec<f32>,
}

impl GridField {
    /// Create a field of the given shape, initialized to zero
    ///
    /// # Arguments
    ///
    /// * `shape` - Full shape including batch and channel axes
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if the shape does not have 2 or 3 spatial axes
    /// or has a zero extent, and `Allocation` if the buffer cannot be allocated.
    pub fn zeros(shape: &[usize]) -> Result<Self, GeodesicError> {
        Self::filled(shape, 0.0)
    }

    /// Create a field of the given shape with every element set to `value`
    ///
    /// # Errors
    ///
    /// Same as [`GridField::zeros`].
    pub fn filled(shape: &[usize], value: f32) -> Result<Self, GeodesicError> {
        let len = checked_len(shape)?;
        let mut data = crate::error::try_alloc(len)?;
        data.fill(value);
        Ok(Self {
            spacing: vec![1.0; shape.len() - 2],
            shape: shape.to_vec(),
            device: Device::Cpu,
            data,
        })
    }

    /// Wrap existing data
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if `data.len()` differs from the product of `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Result<Self, GeodesicError> {
        let len = checked_len(shape)?;
        if data.len() != len {
            return Err(GeodesicError::invalid_shape(format!(
                "shape {shape:?} needs {len} elements, got {}",
                data.len()
            )));
        }
        Ok(Self {
            spacing: vec![1.0; shape.len() - 2],
            shape: shape.to_vec(),
            device: Device::Cpu,
            data,
        })
    }

    /// Replace the per-axis spacing
    ///
    /// # Errors
    ///
    /// Returns `InvalidSpacing` if the length differs from the spatial rank or
    /// a value is not finite and positive.
    pub fn with_spacing(mut self, spacing: &[f32]) -> Result<Self, GeodesicError> {
        check_spacing(spacing, self.spatial_rank())?;
        self.spacing = spacing.to_vec();
        Ok(self)
    }

    /// Tag the field with an execution target
    pub fn on(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Full shape, `[batch, channels, spatial...]`
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Spatial extents only
    #[must_use]
    pub fn spatial_shape(&self) -> &[usize] {
        &self.shape[2..]
    }

    /// Number of spatial axes (2 or 3)
    #[must_use]
    pub fn spatial_rank(&self) -> usize {
        self.shape.len() - 2
    }

    /// Batch extent
    #[must_use]
    pub fn batch(&self) -> usize {
        self.shape[0]
    }

    /// Channel extent
    #[must_use]
    pub fn channels(&self) -> usize {
        self.shape[1]
    }

    /// Number of cells in one spatial slice
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.spatial_shape().iter().product()
    }

    /// Per-axis physical spacing
    #[must_use]
    pub fn spacing(&self) -> &[f32] {
        &self.spacing
    }

    /// Execution target of this field
    #[must_use]
    pub fn device(&self) -> Device {
        self.device
    }

    /// Get reference to field data
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Get mutable reference to field data
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the field, returning its data
    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Get value at a full index (batch, channel, spatial...)
    ///
    /// # Panics
    ///
    /// Panics if the index has the wrong rank or is out of bounds
    #[must_use]
    pub fn get(&self, index: &[usize]) -> f32 {
        self.data[self.flat_index(index)]
    }

    /// Set value at a full index (batch, channel, spatial...)
    ///
    /// # Panics
    ///
    /// Panics if the index has the wrong rank or is out of bounds
    pub fn set(&mut self, index: &[usize], value: f32) {
        let flat = self.flat_index(index);
        self.data[flat] = value;
    }

    /// Largest value in the field
    #[must_use]
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Smallest value in the field
    #[must_use]
    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    fn flat_index(&self, index: &[usize]) -> usize {
        assert_eq!(index.len(), self.shape.len(), "Index rank mismatch");
        index
            .iter()
            .zip(&self.shape)
            .fold(0, |acc, (&i, &extent)| {
                assert!(i < extent, "Coordinates out of bounds");
                acc * extent + i
            })
    }

    /// Build a field sharing this field's shape, spacing and device
    pub(crate) fn like(&self, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            shape: self.shape.clone(),
            spacing: self.spacing.clone(),
            device: self.device,
            data,
        }
    }
}

fn checked_len(shape: &[usize]) -> Result<usize, GeodesicError> {
    if !(4..=5).contains(&shape.len()) {
        return Err(GeodesicError::invalid_shape(format!(
            "expected [batch, channel, spatial...] with 2 or 3 spatial axes, got {shape:?}"
        )));
    }
    if shape.contains(&0) {
        return Err(GeodesicError::invalid_shape(format!(
            "zero-sized axis in shape {shape:?}"
        )));
    }
    shape
        .iter()
        .try_fold(1_usize, |acc, &extent| acc.checked_mul(extent))
        .ok_or_else(|| GeodesicError::invalid_shape(format!("shape {shape:?} overflows")))
}

pub(crate) fn check_spacing(spacing: &[f32], rank: usize) -> Result<(), GeodesicError> {
    if spacing.len() != rank || spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(GeodesicError::InvalidSpacing {
            expected: rank,
            actual: spacing.to_vec(),
        });
    }
    Ok(())
}
