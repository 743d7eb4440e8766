//! Engine-side views of the grid
//!
//! The engines work on a fixed three-axis lattice `[D, H, W]`. A 2D field is
//! lifted to `D = 1`; the depth axis then contributes no passes and no
//! in-bounds neighbours, so the same sweep code serves both ranks.

use crate::error::GeodesicError;
use crate::field::GridField;
use nalgebra::Vector3;

/// Spatial extents and physical spacing of a three-axis lattice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    dims: [usize; 3],
    spacing: Vector3<f32>,
}

impl Lattice {
    /// Create a lattice from `[D, H, W]` extents and spacing
    #[must_use]
    pub fn new(dims: [usize; 3], spacing: Vector3<f32>) -> Self {
        Self { dims, spacing }
    }

    /// Build the lattice of a 2D or 3D field from its spatial shape and spacing
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if the field is neither 2D nor 3D.
    pub fn of(field: &GridField, spacing: &[f32]) -> Result<Self, GeodesicError> {
        match (field.spatial_shape(), spacing) {
            (&[h, w], &[sh, sw]) => Ok(Self::new([1, h, w], Vector3::new(1.0, sh, sw))),
            (&[d, h, w], &[sd, sh, sw]) => Ok(Self::new([d, h, w], Vector3::new(sd, sh, sw))),
            (shape, _) => Err(GeodesicError::invalid_shape(format!(
                "cannot build a lattice for spatial shape {shape:?} with spacing {spacing:?}"
            ))),
        }
    }

    /// Extents `[D, H, W]`
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Per-axis spacing `(D, H, W)`
    #[must_use]
    pub fn spacing(&self) -> Vector3<f32> {
        self.spacing
    }

    /// Total number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    /// Whether the lattice has no cells
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major strides `[H*W, W, 1]`
    #[must_use]
    pub fn strides(&self) -> [usize; 3] {
        [self.dims[1] * self.dims[2], self.dims[2], 1]
    }

    /// Flat index of `[d, h, w]`
    #[inline]
    #[must_use]
    pub fn index(&self, coord: [usize; 3]) -> usize {
        let strides = self.strides();
        coord[0] * strides[0] + coord[1] * strides[1] + coord[2]
    }
}

/// Read-only channel-major guidance image (`[C, D, H, W]` flattened)
#[derive(Debug, Clone, Copy)]
pub struct Guidance<'a> {
    data: &'a [f32],
    channels: usize,
    cells: usize,
}

impl<'a> Guidance<'a> {
    /// Wrap a guidance buffer
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != channels * cells`
    #[must_use]
    pub fn new(data: &'a [f32], channels: usize, cells: usize) -> Self {
        assert_eq!(data.len(), channels * cells, "Guidance buffer size mismatch");
        Self {
            data,
            channels,
            cells,
        }
    }

    /// Number of channels
    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Raw channel-major data
    #[must_use]
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// L1 dissimilarity between two cells, summed over channels in order
    #[inline]
    #[must_use]
    pub fn dissimilarity(&self, a: usize, b: usize) -> f32 {
        if self.channels == 1 {
            return (self.data[a] - self.data[b]).abs();
        }
        let mut sum = 0.0_f32;
        for c in 0..self.channels {
            let offset = c * self.cells;
            sum += (self.data[offset + a] - self.data[offset + b]).abs();
        }
        sum
    }
}
