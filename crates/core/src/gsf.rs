//! Geodesic soft fusion
//!
//! Turns the one-sided distances of a mask into a foreground probability
//! `P = sigmoid(theta * (D_bg - D_fg))`. Cells deep inside the foreground
//! have `D_fg = 0` and a large `D_bg`, so `P` tends to 1 there; `theta`
//! controls how sharp the transition across the boundary is.

use crate::error::{try_alloc, GeodesicError};
use rayon::prelude::*;

/// Logistic function that never overflows `exp`
#[inline]
#[must_use]
pub fn stable_sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Fuse foreground and background distances into a probability map
///
/// # Arguments
///
/// * `d_fg` - Distance to the foreground
/// * `d_bg` - Distance to the background
/// * `theta` - Sharpness; `0.0` yields 0.5 everywhere
///
/// # Errors
///
/// Returns `Allocation` if the output buffer cannot be reserved.
///
/// # Panics
///
/// Panics if the buffers differ in length.
pub fn fuse(d_fg: &[f32], d_bg: &[f32], theta: f32) -> Result<Vec<f32>, GeodesicError> {
    assert_eq!(d_fg.len(), d_bg.len(), "Distance buffer size mismatch");
    let mut out = try_alloc(d_fg.len())?;
    if theta == 0.0 {
        // Exact 0.5 even where both distances sit at the ceiling
        out.fill(0.5);
        return Ok(out);
    }
    out.par_iter_mut()
        .zip(d_fg.par_iter().zip(d_bg.par_iter()))
        .for_each(|(p, (&fg, &bg))| *p = stable_sigmoid(theta * (bg - fg)).clamp(0.0, 1.0));
    Ok(out)
}
