use crate::{CellGrid, GridParameters, Shear};
use crate::potentials::LennardJones;
use crate::sort::OverflowPolicy;

/// Parameters for a cubic box of side 8, with one cell per unit length
pub fn test_parameters() -> GridParameters {
    GridParameters {
        cutoff: 2.5,
        lengths: [8.0, 8.0, 8.0],
        shear: Shear::default(),
        grid: [8, 8, 8],
        capacity: 32,
        overflow: OverflowPolicy::Drop,
        lennard_jones: LennardJones::default(),
    }
}

pub fn test_grid() -> CellGrid {
    CellGrid::new(test_parameters()).expect("failed to create test grid")
}
