use log::debug;
use rayon::prelude::*;

use crate::cells::{Cell, CellEnergy};
use crate::Error;

use super::LaunchConfig;

/// An operator applied independently to every slot of every cell.
pub trait SingleOperator: Sync {
    /// Per-cell output produced by this operator
    type Output: Send;

    /// Apply the operator to the slot `lane` of a cell, containing a particle
    /// with the given `tag` and `position`. The position is meaningless when
    /// `tag` is zero.
    fn apply(&self, output: &mut Self::Output, lane: usize, tag: u32, position: [f32; 3]);
}

/// Mark all slots of a cell as empty
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroCell;

impl SingleOperator for ZeroCell {
    type Output = Cell;

    fn apply(&self, output: &mut Cell, lane: usize, _: u32, _: [f32; 3]) {
        output.clear(lane);
    }
}

/// Reset all tags and energies in a [`CellEnergy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroEnergy;

impl SingleOperator for ZeroEnergy {
    type Output = CellEnergy;

    fn apply(&self, output: &mut CellEnergy, lane: usize, _: u32, _: [f32; 3]) {
        output.tags[lane] = 0;
        output.energy[lane] = 0.0;
    }
}

/// Count the particles in each cell, adding the count to the existing value
/// in the output
#[derive(Debug, Clone, Copy, Default)]
pub struct CountParticles;

impl SingleOperator for CountParticles {
    type Output = u32;

    fn apply(&self, output: &mut u32, _: usize, tag: u32, _: [f32; 3]) {
        if tag != 0 {
            *output += 1;
        }
    }
}

/// Apply `operator` to all slots of all `cells`, writing the results to the
/// corresponding entry in `output`.
#[time_graph::instrument(name = "reduce::launch_single")]
pub fn launch_single<O: SingleOperator>(
    launch: LaunchConfig,
    operator: &O,
    cells: &[Cell],
    output: &mut [O::Output],
) -> Result<(), Error> {
    launch.validate()?;
    launch.validate_buffer("cells", cells.len())?;
    launch.validate_buffer("output", output.len())?;

    debug!("launching single-cell reduction over {} cells", launch.n_cells);

    cells.par_iter().zip(output.par_iter_mut()).for_each(|(cell, output)| {
        for lane in 0..launch.group_width {
            operator.apply(output, lane, cell.tag(lane), cell.position(lane));
        }
    });

    return Ok(());
}

/// Apply `operator` to all slots of all `cells`, using the cells themselves
/// as output.
#[time_graph::instrument(name = "reduce::launch_single_in_place")]
pub fn launch_single_in_place<O: SingleOperator<Output = Cell>>(
    launch: LaunchConfig,
    operator: &O,
    cells: &mut [Cell],
) -> Result<(), Error> {
    launch.validate()?;
    launch.validate_buffer("cells", cells.len())?;

    debug!("launching in-place single-cell reduction over {} cells", launch.n_cells);

    cells.par_iter_mut().for_each(|cell| {
        for lane in 0..launch.group_width {
            let tag = cell.tag(lane);
            let position = cell.position(lane);
            operator.apply(cell, lane, tag, position);
        }
    });

    return Ok(());
}
