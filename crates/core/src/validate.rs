//! Input contract of the transforms
//!
//! Checks run in a fixed order so that a call with several problems always
//! reports the same one: rank, batch, mask channels, spatial extents,
//! spacing, devices, then parameters. Nothing is propagated before every
//! check has passed.

use crate::error::GeodesicError;
use crate::field::{check_spacing, GridField};
use crate::params::GeodesicParams;

/// Validate an image/mask pair for a transform of spatial rank `rank`
///
/// # Errors
///
/// Returns the first violated condition as `InvalidShape`, `InvalidSpacing`,
/// `DeviceMismatch` or `InvalidParameter`.
pub fn check_inputs(
    image: &GridField,
    mask: &GridField,
    spacing: &[f32],
    rank: usize,
    params: &GeodesicParams,
) -> Result<(), GeodesicError> {
    for (name, field) in [("image", image), ("mask", mask)] {
        if field.spatial_rank() != rank {
            return Err(GeodesicError::invalid_shape(format!(
                "{rank}D transform expects a {} {name}, got shape {:?}",
                if rank == 2 { "[1, C, H, W]" } else { "[1, C, D, H, W]" },
                field.shape()
            )));
        }
    }
    for (name, field) in [("image", image), ("mask", mask)] {
        if field.batch() != 1 {
            return Err(GeodesicError::invalid_shape(format!(
                "{name} batch size must be 1, got {}",
                field.batch()
            )));
        }
    }
    if mask.channels() != 1 {
        return Err(GeodesicError::invalid_shape(format!(
            "mask must have 1 channel, got {}",
            mask.channels()
        )));
    }
    if image.spatial_shape() != mask.spatial_shape() {
        return Err(GeodesicError::invalid_shape(format!(
            "image spatial shape {:?} does not match mask {:?}",
            image.spatial_shape(),
            mask.spatial_shape()
        )));
    }
    check_spacing(spacing, rank)?;
    if image.device() != mask.device() {
        return Err(GeodesicError::DeviceMismatch {
            image: image.device(),
            mask: mask.device(),
        });
    }
    params.validate()
}

/// Validate the sharpness/threshold of the fusion and filter operations
///
/// # Errors
///
/// Returns `InvalidParameter` if `theta` is not finite.
pub fn check_theta(theta: f32) -> Result<(), GeodesicError> {
    if theta.is_finite() {
        Ok(())
    } else {
        Err(GeodesicError::invalid_parameter(
            "theta",
            format!("must be finite, got {theta}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Device;

    fn pair(image_shape: &[usize], mask_shape: &[usize]) -> (GridField, GridField) {
        (
            GridField::zeros(image_shape).unwrap(),
            GridField::zeros(mask_shape).unwrap(),
        )
    }

    #[test]
    fn test_accepts_valid_inputs() {
        let (image, mask) = pair(&[1, 3, 8, 8], &[1, 1, 8, 8]);
        assert!(check_inputs(&image, &mask, &[1.0, 1.0], 2, &GeodesicParams::default()).is_ok());
    }

    #[test]
    fn test_rank_checked_first() {
        // Wrong rank and wrong batch: rank wins
        let (image, mask) = pair(&[2, 1, 4, 4, 4], &[1, 1, 4, 4, 4]);
        let err = check_inputs(&image, &mask, &[1.0, 1.0], 2, &GeodesicParams::default());
        assert!(matches!(err, Err(GeodesicError::InvalidShape { reason }) if reason.contains("2D")));
    }

    #[test]
    fn test_batch_and_channels() {
        let (image, mask) = pair(&[2, 1, 4, 4], &[2, 1, 4, 4]);
        let err = check_inputs(&image, &mask, &[1.0, 1.0], 2, &GeodesicParams::default());
        assert!(matches!(err, Err(GeodesicError::InvalidShape { reason }) if reason.contains("batch")));

        let (image, mask) = pair(&[1, 1, 4, 4], &[1, 2, 4, 4]);
        let err = check_inputs(&image, &mask, &[1.0, 1.0], 2, &GeodesicParams::default());
        assert!(matches!(err, Err(GeodesicError::InvalidShape { reason }) if reason.contains("channel")));
    }

    #[test]
    fn test_extent_mismatch() {
        let (image, mask) = pair(&[1, 1, 4, 5], &[1, 1, 4, 4]);
        let err = check_inputs(&image, &mask, &[1.0, 1.0], 2, &GeodesicParams::default());
        assert!(matches!(err, Err(GeodesicError::InvalidShape { .. })));
    }

    #[test]
    fn test_spacing_before_device() {
        let (image, mask) = pair(&[1, 1, 4, 4, 4], &[1, 1, 4, 4, 4]);
        let mask = mask.on(Device::Gpu);
        let err = check_inputs(&image, &mask, &[1.0, 1.0], 3, &GeodesicParams::default());
        assert!(matches!(err, Err(GeodesicError::InvalidSpacing { expected: 3, .. })));

        let err = check_inputs(&image, &mask, &[1.0, 1.0, 1.0], 3, &GeodesicParams::default());
        assert_eq!(
            err,
            Err(GeodesicError::DeviceMismatch {
                image: Device::Cpu,
                mask: Device::Gpu
            })
        );
    }

    #[test]
    fn test_parameters_checked_last() {
        let (image, mask) = pair(&[1, 1, 4, 4], &[1, 1, 4, 4]);
        let params = GeodesicParams::new(1e10, 1.5, 2);
        let err = check_inputs(&image, &mask, &[1.0, 1.0], 2, &params);
        assert!(matches!(err, Err(GeodesicError::InvalidParameter { name: "lamb", .. })));
    }

    #[test]
    fn test_theta() {
        assert!(check_theta(0.0).is_ok());
        assert!(check_theta(f32::NAN).is_err());
        assert!(check_theta(f32::INFINITY).is_err());
    }
}
