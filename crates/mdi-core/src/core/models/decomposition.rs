use super::cell::SimulationCell;
use nalgebra::Vector3;

/// Splits the box into equal slabs along the first fractional coordinate, one
/// slab per worker.
///
/// This is the reference ownership rule: an atom belongs to the worker whose slab
/// contains its (wrapped) position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabDecomposition {
    pub rank: usize,
    pub size: usize,
}

impl SlabDecomposition {
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size: size.max(1),
        }
    }

    pub fn serial() -> Self {
        Self::new(0, 1)
    }

    pub fn owner_of(&self, cell: &SimulationCell, position: &Vector3<f64>) -> usize {
        if self.size == 1 {
            return 0;
        }
        let lamda = cell.to_fractional(position).x.clamp(0.0, 1.0);
        ((lamda * self.size as f64) as usize).min(self.size - 1)
    }

    #[inline]
    pub fn owns(&self, cell: &SimulationCell, position: &Vector3<f64>) -> bool {
        self.owner_of(cell, position) == self.rank
    }
}
