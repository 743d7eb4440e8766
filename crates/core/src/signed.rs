//! Signed geodesic distance
//!
//! A soft mask `m` (1 = foreground) seeds two independent propagations:
//! `D_fg`, seeded on the foreground through the complement `1 - m`, and
//! `D_bg`, seeded on the background through `m` itself. The signed map is
//! `D_fg - D_bg`, negative inside the foreground and positive outside.

use crate::error::{try_alloc, GeodesicError};
use rayon::prelude::*;

/// Elementwise complement `1 - m`
///
/// # Errors
///
/// Returns `Allocation` if the output buffer cannot be reserved.
pub fn complement(mask: &[f32]) -> Result<Vec<f32>, GeodesicError> {
    let mut out = try_alloc(mask.len())?;
    for (o, &m) in out.iter_mut().zip(mask) {
        *o = 1.0 - m;
    }
    Ok(out)
}

/// Combine the two one-sided distances into a signed map, in place over `d_fg`
///
/// # Panics
///
/// Panics if the buffers differ in length.
pub fn combine_signed(d_fg: &mut [f32], d_bg: &[f32]) {
    assert_eq!(d_fg.len(), d_bg.len(), "Distance buffer size mismatch");
    d_fg.par_iter_mut()
        .zip(d_bg.par_iter())
        .for_each(|(fg, &bg)| *fg -= bg);
}

/// Binary mask of cells where `signed < threshold`
///
/// # Errors
///
/// Returns `Allocation` if the output buffer cannot be reserved.
pub fn below(signed: &[f32], threshold: f32) -> Result<Vec<f32>, GeodesicError> {
    let mut out = try_alloc(signed.len())?;
    for (o, &s) in out.iter_mut().zip(signed) {
        if s < threshold {
            *o = 1.0;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement() {
        assert_eq!(complement(&[0.0, 1.0, 0.25]).unwrap(), vec![1.0, 0.0, 0.75]);
    }

    #[test]
    fn test_combine_signed() {
        // Foreground cell: D_fg = 0, D_bg = 3 -> -3
        // Background cell: D_fg = 2, D_bg = 0 -> 2
        let mut d_fg = vec![0.0, 2.0, 0.0];
        combine_signed(&mut d_fg, &[3.0, 0.0, 0.0]);
        assert_eq!(d_fg, vec![-3.0, 2.0, 0.0]);
    }

    #[test]
    fn test_below_threshold() {
        assert_eq!(
            below(&[-2.0, -0.5, 0.0, 1.0], -0.5).unwrap(),
            vec![1.0, 0.0, 0.0, 0.0]
        );
        assert_eq!(below(&[-2.0, 0.0, 1.0], 0.5).unwrap(), vec![1.0, 1.0, 0.0]);
    }
}
