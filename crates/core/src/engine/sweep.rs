//! Sweep schedule and per-cell relaxation
//!
//! One cycle runs, for each axis D, H, W in turn, a forward pass (planes in
//! increasing order) and a backward pass (decreasing order). During a pass a
//! cell on plane `p` looks at the 3×3 block of cells on the previous plane
//! `p ∓ 1` centred on it (8-connectivity in 2D, 26 in 3D). Cells on one plane
//! never read each other, so a plane is a wavefront: the sequential and the
//! parallel engines differ only in how they walk the cells of a plane.

use super::lattice::{Guidance, Lattice};
use super::local_update::{step_length, LocalUpdateRule};

/// Sweep direction along an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Planes visited in increasing order
    Forward,
    /// Planes visited in decreasing order
    Backward,
}

/// One directional pass over the lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SweepPass {
    /// Sweep axis (0 = D, 1 = H, 2 = W)
    pub axis: usize,
    /// Visiting order of planes
    pub direction: Direction,
}

/// Passes of one full cycle, in execution order
pub const CYCLE: [SweepPass; 6] = [
    SweepPass::new(0, Direction::Forward),
    SweepPass::new(0, Direction::Backward),
    SweepPass::new(1, Direction::Forward),
    SweepPass::new(1, Direction::Backward),
    SweepPass::new(2, Direction::Forward),
    SweepPass::new(2, Direction::Backward),
];

impl SweepPass {
    /// Create a pass along `axis`
    #[must_use]
    pub const fn new(axis: usize, direction: Direction) -> Self {
        Self { axis, direction }
    }

    /// The two axes spanning a plane of this pass, in raster order
    #[must_use]
    pub const fn cross_axes(&self) -> (usize, usize) {
        match self.axis {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        }
    }

    /// `(plane, previous_plane)` pairs in visiting order
    ///
    /// Empty when the axis has extent 1 (e.g. the depth axis of a 2D field).
    pub fn planes(&self, lattice: &Lattice) -> impl Iterator<Item = (usize, usize)> {
        let extent = lattice.dims()[self.axis];
        let forward = self.direction == Direction::Forward;
        (1..extent).map(move |k| {
            if forward {
                (k, k - 1)
            } else {
                (extent - 1 - k, extent - k)
            }
        })
    }

    /// Number of cells on one plane of this pass
    #[must_use]
    pub fn plane_len(&self, lattice: &Lattice) -> usize {
        let dims = lattice.dims();
        let (a, b) = self.cross_axes();
        dims[a] * dims[b]
    }

    /// Coordinate of the `k`-th cell (raster order) on `plane`
    #[inline]
    #[must_use]
    pub fn cell(&self, lattice: &Lattice, plane: usize, k: usize) -> [usize; 3] {
        let dims = lattice.dims();
        let (a, b) = self.cross_axes();
        let mut coord = [0; 3];
        coord[self.axis] = plane;
        coord[a] = k / dims[b];
        coord[b] = k % dims[b];
        coord
    }
}

/// One previous-plane neighbour: offsets on the two cross axes and step length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilEntry {
    /// Offset along the first cross axis
    pub da: i32,
    /// Offset along the second cross axis
    pub db: i32,
    /// Physical step length to the neighbour
    pub step: f32,
}

/// The 3×3 previous-plane neighbourhood of a pass, with precomputed step lengths
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    entries: [StencilEntry; 9],
}

impl Stencil {
    /// Build the stencil of `pass` under the lattice spacing
    #[must_use]
    pub fn for_pass(pass: &SweepPass, lattice: &Lattice) -> Self {
        let (a, b) = pass.cross_axes();
        let spacing = lattice.spacing();
        let mut entries = [StencilEntry {
            da: 0,
            db: 0,
            step: 0.0,
        }; 9];
        for (i, entry) in entries.iter_mut().enumerate() {
            let da = i as i32 / 3 - 1;
            let db = i as i32 % 3 - 1;
            let mut offset = [0_i32; 3];
            offset[pass.axis] = 1;
            offset[a] = da;
            offset[b] = db;
            *entry = StencilEntry {
                da,
                db,
                step: step_length(offset, spacing),
            };
        }
        Self { entries }
    }

    /// Stencil entries in enumeration order
    #[must_use]
    pub fn entries(&self) -> &[StencilEntry; 9] {
        &self.entries
    }
}

/// Read-only inputs of a propagation
#[derive(Debug, Clone, Copy)]
pub struct SweepContext<'a> {
    /// Lattice geometry
    pub lattice: Lattice,
    /// Guidance image
    pub guidance: Guidance<'a>,
    /// Update weights
    pub rule: LocalUpdateRule,
}

impl SweepContext<'_> {
    /// New distance of the cell at `coord` during `pass`
    ///
    /// Reads the cell itself and the in-bounds cells of `previous`; never writes.
    #[inline]
    #[must_use]
    pub fn relax_cell(
        &self,
        pass: &SweepPass,
        stencil: &Stencil,
        distance: &[f32],
        coord: [usize; 3],
        previous: usize,
    ) -> f32 {
        let dims = self.lattice.dims();
        let (a, b) = pass.cross_axes();
        let idx = self.lattice.index(coord);
        let mut best = distance[idx];

        for entry in stencil.entries() {
            let na = coord[a] as isize + entry.da as isize;
            let nb = coord[b] as isize + entry.db as isize;
            if na < 0 || nb < 0 || na as usize >= dims[a] || nb as usize >= dims[b] {
                continue;
            }
            let mut neighbour = coord;
            neighbour[pass.axis] = previous;
            neighbour[a] = na as usize;
            neighbour[b] = nb as usize;
            let nidx = self.lattice.index(neighbour);

            let candidate = self.rule.candidate(
                distance[nidx],
                entry.step,
                self.guidance.dissimilarity(idx, nidx),
            );
            best = best.min(candidate);
        }
        best
    }
}
