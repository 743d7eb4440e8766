//! Transform entry points
//!
//! `GeodesicTransform` validates the inputs, seeds the distance buffer from
//! the mask (`D0 = v · mask`), picks an engine and runs the sweeps. The free
//! functions are thin wrappers with a fixed spatial rank.
//!
//! # Example
//!
//! ```rust,ignore
//! use geodesic_core::{generalised_geodesic_2d, GridField};
//!
//! let image = GridField::zeros(&[1, 1, 64, 64])?;
//! let mut mask = GridField::filled(&[1, 1, 64, 64], 1.0)?;
//! mask.set(&[0, 0, 32, 32], 0.0);
//! let distance = generalised_geodesic_2d(&image, &mask, 1e10, 0.0, 2)?;
//! ```

use crate::engine::{create_engine, DistanceEngine, Guidance, Lattice, LocalUpdateRule, SweepContext};
use crate::error::{try_alloc, GeodesicError};
use crate::field::GridField;
use crate::gsf::fuse;
use crate::params::{ExecutionStrategy, GeodesicParams};
use crate::signed::{below, combine_signed, complement};
use crate::validate::{check_inputs, check_theta};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configured geodesic transform
///
/// Holds the numeric parameters and the execution strategy; every method
/// accepts 2D (`[1, C, H, W]`) and 3D (`[1, C, D, H, W]`) inputs, with
/// `spacing` giving one physical step per spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeodesicTransform {
    params: GeodesicParams,
    strategy: ExecutionStrategy,
}

/// Everything one validated call needs to run propagations
struct Job<'a> {
    engine: Box<dyn DistanceEngine>,
    ctx: SweepContext<'a>,
    params: GeodesicParams,
    mask: &'a GridField,
    spacing: &'a [f32],
}

impl Job<'_> {
    /// Seed from `seeds` and propagate
    fn propagate(&self, seeds: &[f32]) -> Result<Vec<f32>, GeodesicError> {
        let mut distance = try_alloc(seeds.len())?;
        for (d, &m) in distance.iter_mut().zip(seeds) {
            *d = self.params.v * m;
        }
        self.engine
            .propagate(&self.ctx, &mut distance, self.params.iterations)?;
        Ok(distance)
    }

    /// `(D_fg, D_bg)` of a soft mask, computed independently
    fn one_sided(&self, mask: &[f32]) -> Result<(Vec<f32>, Vec<f32>), GeodesicError> {
        let inverse = complement(mask)?;
        let (fg, bg) = rayon::join(|| self.propagate(&inverse), || self.propagate(mask));
        Ok((fg?, bg?))
    }

    fn signed(&self, mask: &[f32]) -> Result<Vec<f32>, GeodesicError> {
        let (mut fg, bg) = self.one_sided(mask)?;
        combine_signed(&mut fg, &bg);
        Ok(fg)
    }

    /// Wrap a result with the mask's shape and device and the call's spacing
    fn output(&self, data: Vec<f32>) -> Result<GridField, GeodesicError> {
        self.mask.like(data).with_spacing(self.spacing)
    }
}

impl GeodesicTransform {
    /// Create a transform with the default execution strategy
    #[must_use]
    pub fn new(params: GeodesicParams) -> Self {
        Self {
            params,
            strategy: ExecutionStrategy::Auto,
        }
    }

    /// Replace the execution strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Numeric parameters
    #[must_use]
    pub fn params(&self) -> &GeodesicParams {
        &self.params
    }

    /// Execution strategy
    #[must_use]
    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Generalised geodesic distance from the zero-valued cells of `mask`
    ///
    /// # Errors
    ///
    /// Returns a contract violation (see [`crate::validate`]), `Allocation`,
    /// `BackendUnavailable` or `Gpu`.
    pub fn distance(
        &self,
        image: &GridField,
        mask: &GridField,
        spacing: &[f32],
    ) -> Result<GridField, GeodesicError> {
        self.distance_of_rank(image, mask, spacing, image.spatial_rank())
    }

    /// Signed distance: negative inside the foreground (`mask = 1`), positive outside
    ///
    /// # Errors
    ///
    /// Same as [`GeodesicTransform::distance`].
    pub fn signed(
        &self,
        image: &GridField,
        mask: &GridField,
        spacing: &[f32],
    ) -> Result<GridField, GeodesicError> {
        self.signed_of_rank(image, mask, spacing, image.spatial_rank())
    }

    /// Foreground probability `sigmoid(theta · (D_bg - D_fg))`
    ///
    /// # Errors
    ///
    /// Same as [`GeodesicTransform::distance`], plus `InvalidParameter` for a
    /// non-finite `theta`.
    pub fn gsf(
        &self,
        image: &GridField,
        mask: &GridField,
        theta: f32,
        spacing: &[f32],
    ) -> Result<GridField, GeodesicError> {
        self.gsf_of_rank(image, mask, theta, spacing, image.spatial_rank())
    }

    /// Geodesic symmetric filter: signed distance of the mask after a
    /// geodesic erosion and dilation by `theta`
    ///
    /// # Errors
    ///
    /// Same as [`GeodesicTransform::gsf`].
    pub fn symmetric_filter(
        &self,
        image: &GridField,
        mask: &GridField,
        theta: f32,
        spacing: &[f32],
    ) -> Result<GridField, GeodesicError> {
        self.symmetric_filter_of_rank(image, mask, theta, spacing, image.spatial_rank())
    }

    fn prepare<'a>(
        &self,
        image: &'a GridField,
        mask: &'a GridField,
        spacing: &'a [f32],
        rank: usize,
    ) -> Result<Job<'a>, GeodesicError> {
        check_inputs(image, mask, spacing, rank, &self.params)?;
        let lattice = Lattice::of(image, spacing)?;
        let engine = create_engine(self.strategy, image.device())?;
        debug!(
            shape = ?image.shape(),
            ?spacing,
            v = self.params.v,
            lamb = self.params.lamb,
            iterations = self.params.iterations,
            engine = engine.name(),
            "geodesic transform"
        );
        Ok(Job {
            engine,
            ctx: SweepContext {
                lattice,
                guidance: Guidance::new(image.as_slice(), image.channels(), lattice.len()),
                rule: LocalUpdateRule::new(&self.params),
            },
            params: self.params,
            mask,
            spacing,
        })
    }

    fn distance_of_rank(
        &self,
        image: &GridField,
        mask: &GridField,
        spacing: &[f32],
        rank: usize,
    ) -> Result<GridField, GeodesicError> {
        let job = self.prepare(image, mask, spacing, rank)?;
        let distance = job.propagate(mask.as_slice())?;
        job.output(distance)
    }

    fn signed_of_rank(
        &self,
        image: &GridField,
        mask: &GridField,
        spacing: &[f32],
        rank: usize,
    ) -> Result<GridField, GeodesicError> {
        let job = self.prepare(image, mask, spacing, rank)?;
        let signed = job.signed(mask.as_slice())?;
        job.output(signed)
    }

    fn gsf_of_rank(
        &self,
        image: &GridField,
        mask: &GridField,
        theta: f32,
        spacing: &[f32],
        rank: usize,
    ) -> Result<GridField, GeodesicError> {
        let job = self.prepare(image, mask, spacing, rank)?;
        check_theta(theta)?;
        let (fg, bg) = job.one_sided(mask.as_slice())?;
        job.output(fuse(&fg, &bg, theta)?)
    }

    fn symmetric_filter_of_rank(
        &self,
        image: &GridField,
        mask: &GridField,
        theta: f32,
        spacing: &[f32],
        rank: usize,
    ) -> Result<GridField, GeodesicError> {
        let job = self.prepare(image, mask, spacing, rank)?;
        check_theta(theta)?;
        let signed = job.signed(mask.as_slice())?;
        let eroded = below(&signed, -theta)?;
        let dilated = below(&signed, theta)?;
        drop(signed);

        // S(Me) - S(1 - Md)
        let mut filtered = job.signed(&dilated)?;
        let outside = job.signed(&complement(&eroded)?)?;
        combine_signed(&mut filtered, &outside);
        job.output(filtered)
    }
}

/// Generalised geodesic distance on a 2D grid with unit spacing
///
/// # Arguments
///
/// * `image` - Guidance image `[1, C, H, W]`
/// * `mask` - Seed mask `[1, 1, H, W]`; 0 marks a seed, 1 starts at `v`
/// * `v` - Initialisation ceiling
/// * `lamb` - Blend factor in [0, 1]; 0 is Euclidean, 1 is purely image-driven
/// * `iterations` - Number of full sweep cycles
///
/// # Errors
///
/// Returns the first contract violation, or an allocation/backend failure.
pub fn generalised_geodesic_2d(
    image: &GridField,
    mask: &GridField,
    v: f32,
    lamb: f32,
    iterations: usize,
) -> Result<GridField, GeodesicError> {
    GeodesicTransform::new(GeodesicParams::new(v, lamb, iterations))
        .distance_of_rank(image, mask, &[1.0, 1.0], 2)
}

/// Generalised geodesic distance on a 3D grid
///
/// # Errors
///
/// Same as [`generalised_geodesic_2d`], plus `InvalidSpacing`.
pub fn generalised_geodesic_3d(
    image: &GridField,
    mask: &GridField,
    spacing: &[f32],
    v: f32,
    lamb: f32,
    iterations: usize,
) -> Result<GridField, GeodesicError> {
    GeodesicTransform::new(GeodesicParams::new(v, lamb, iterations))
        .distance_of_rank(image, mask, spacing, 3)
}

/// Signed generalised geodesic distance on a 2D grid
///
/// # Errors
///
/// Same as [`generalised_geodesic_2d`].
pub fn signed_generalised_geodesic_2d(
    image: &GridField,
    mask: &GridField,
    v: f32,
    lamb: f32,
    iterations: usize,
) -> Result<GridField, GeodesicError> {
    GeodesicTransform::new(GeodesicParams::new(v, lamb, iterations))
        .signed_of_rank(image, mask, &[1.0, 1.0], 2)
}

/// Signed generalised geodesic distance on a 3D grid
///
/// # Errors
///
/// Same as [`generalised_geodesic_3d`].
pub fn signed_generalised_geodesic_3d(
    image: &GridField,
    mask: &GridField,
    spacing: &[f32],
    v: f32,
    lamb: f32,
    iterations: usize,
) -> Result<GridField, GeodesicError> {
    GeodesicTransform::new(GeodesicParams::new(v, lamb, iterations))
        .signed_of_rank(image, mask, spacing, 3)
}

/// Geodesic soft fusion on a 2D grid
///
/// # Errors
///
/// Same as [`generalised_geodesic_2d`], plus `InvalidParameter` for `theta`.
pub fn gsf_2d(
    image: &GridField,
    mask: &GridField,
    theta: f32,
    v: f32,
    lamb: f32,
    iterations: usize,
) -> Result<GridField, GeodesicError> {
    GeodesicTransform::new(GeodesicParams::new(v, lamb, iterations))
        .gsf_of_rank(image, mask, theta, &[1.0, 1.0], 2)
}

/// Geodesic soft fusion on a 3D grid
///
/// # Errors
///
/// Same as [`generalised_geodesic_3d`], plus `InvalidParameter` for `theta`.
pub fn gsf_3d(
    image: &GridField,
    mask: &GridField,
    theta: f32,
    spacing: &[f32],
    v: f32,
    lamb: f32,
    iterations: usize,
) -> Result<GridField, GeodesicError> {
    GeodesicTransform::new(GeodesicParams::new(v, lamb, iterations))
        .gsf_of_rank(image, mask, theta, spacing, 3)
}

/// Geodesic symmetric filter on a 2D grid
///
/// # Errors
///
/// Same as [`gsf_2d`].
pub fn geodesic_symmetric_filter_2d(
    image: &GridField,
    mask: &GridField,
    theta: f32,
    v: f32,
    lamb: f32,
    iterations: usize,
) -> Result<GridField, GeodesicError> {
    GeodesicTransform::new(GeodesicParams::new(v, lamb, iterations))
        .symmetric_filter_of_rank(image, mask, theta, &[1.0, 1.0], 2)
}

/// Geodesic symmetric filter on a 3D grid
///
/// # Errors
///
/// Same as [`gsf_3d`].
pub fn geodesic_symmetric_filter_3d(
    image: &GridField,
    mask: &GridField,
    theta: f32,
    spacing: &[f32],
    v: f32,
    lamb: f32,
    iterations: usize,
) -> Result<GridField, GeodesicError> {
    GeodesicTransform::new(GeodesicParams::new(v, lamb, iterations))
        .symmetric_filter_of_rank(image, mask, theta, spacing, 3)
}
