//! Local update rule
//!
//! A cell `c` receives from one neighbour `n` the candidate
//!
//! ```text
//! candidate = D(n) + (1 - λ)·|offset ⊙ spacing| + λ·Σ_k |I_k(c) - I_k(n)|
//! ```
//!
//! and keeps the minimum over its neighbours. The rule never writes; ordering
//! and aggregation belong to the engines. All engines go through
//! [`LocalUpdateRule::candidate`] so the floating-point evaluation order is
//! identical everywhere.

use crate::params::GeodesicParams;
use nalgebra::Vector3;

/// Weights of the spatial and image terms of the update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalUpdateRule {
    l_grad: f32,
    l_eucl: f32,
}

impl LocalUpdateRule {
    /// Build the rule from transform parameters
    #[must_use]
    pub fn new(params: &GeodesicParams) -> Self {
        Self::from_weights(params.gradient_weight(), params.euclidean_weight())
    }

    /// Build the rule from explicit weights
    #[must_use]
    pub const fn from_weights(l_grad: f32, l_eucl: f32) -> Self {
        Self { l_grad, l_eucl }
    }

    /// Image-term weight (λ)
    #[must_use]
    pub fn gradient_weight(&self) -> f32 {
        self.l_grad
    }

    /// Spatial-term weight (1 - λ)
    #[must_use]
    pub fn euclidean_weight(&self) -> f32 {
        self.l_eucl
    }

    /// Candidate distance for `c` propagated from a neighbour
    ///
    /// # Arguments
    ///
    /// * `neighbour_distance` - Current distance at the neighbour
    /// * `step` - Physical step length between the two cells
    /// * `dissimilarity` - Guidance dissimilarity between the two cells
    #[inline(always)]
    #[must_use]
    pub fn candidate(&self, neighbour_distance: f32, step: f32, dissimilarity: f32) -> f32 {
        neighbour_distance + self.l_eucl * step + self.l_grad * dissimilarity
    }
}

/// Physical length of a lattice offset under the given spacing
#[must_use]
pub fn step_length(offset: [i32; 3], spacing: Vector3<f32>) -> f32 {
    let offset = Vector3::new(offset[0] as f32, offset[1] as f32, offset[2] as f32);
    offset.component_mul(&spacing).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pure_euclidean_candidate() {
        let rule = LocalUpdateRule::new(&GeodesicParams::new(1e10, 0.0, 2));
        // Image term must be ignored entirely
        assert_eq!(rule.candidate(2.0, 1.5, 100.0), 3.5);
    }

    #[test]
    fn test_pure_geodesic_candidate() {
        let rule = LocalUpdateRule::new(&GeodesicParams::new(1e10, 1.0, 2));
        assert_eq!(rule.candidate(2.0, 1.5, 0.25), 2.25);
        // Uniform image: no propagation cost at all
        assert_eq!(rule.candidate(7.0, 1.0, 0.0), 7.0);
    }

    #[test]
    fn test_candidate_monotone() {
        let rule = LocalUpdateRule::from_weights(0.3, 0.7);
        for &(d, step, diff) in &[(0.0, 1.0, 0.0), (5.0, 1.414, 2.0), (1e10, 1.0, 1.0)] {
            assert!(rule.candidate(d, step, diff) >= d);
        }
    }

    #[test]
    fn test_step_length_isotropic() {
        let unit = Vector3::repeat(1.0);
        assert_eq!(step_length([1, 0, 0], unit), 1.0);
        assert_relative_eq!(step_length([1, 1, 0], unit), 2.0_f32.sqrt());
        assert_relative_eq!(step_length([1, -1, 1], unit), 3.0_f32.sqrt());
    }

    #[test]
    fn test_step_length_anisotropic() {
        let spacing = Vector3::new(3.0, 4.0, 1.0);
        assert_relative_eq!(step_length([1, 1, 0], spacing), 5.0);
        assert_relative_eq!(step_length([0, 0, -1], spacing), 1.0);
    }
}
