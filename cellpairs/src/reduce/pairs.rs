use log::debug;
use rayon::prelude::*;

use crate::cells::{Cell, CELL_CAPACITY};
use crate::group::Group;
use crate::{BoxGeometry, Error, NeighborOffsetList};

use super::LaunchConfig;

/// An operator folded over all ordered pairs of particles in neighboring
/// cells.
///
/// For each particle (the "near" particle), the engine creates a new
/// accumulator, calls [`PairOperator::pair`] for every other particle in the
/// neighboring cells, and finally calls [`PairOperator::finalize`] to write
/// the result to the output of the near particle's cell.
pub trait PairOperator: Sync {
    /// Per-cell output produced by this operator
    type Output: Send;
    /// Per-particle accumulator
    type Accumulator: Copy + Default;

    /// Add the contribution of a pair separated by `(dx, dy, dz)` (near minus
    /// far position) to the `accumulator`.
    fn pair(&self, accumulator: &mut Self::Accumulator, dx: f32, dy: f32, dz: f32);

    /// Write the final value of the `accumulator` for the particle in slot
    /// `lane` of a cell, with the given `tag`. This is called for every slot,
    /// including empty ones (with `tag == 0`).
    fn finalize(&self, output: &mut Self::Output, accumulator: Self::Accumulator, tag: u32, lane: usize);
}

/// Content of a far cell loaded in the group staging area
struct StagedCell {
    tags: [u32; CELL_CAPACITY],
    /// positions, already shifted to the periodic image next to the near cell
    positions: [[f32; 3]; CELL_CAPACITY],
    /// is this the near cell itself, without periodic shift?
    is_near_cell: bool,
    /// phase of the group when the load was issued
    phase: u64,
}

impl StagedCell {
    /// Load the cell at `offset` from the cell at grid coordinates `near`,
    /// with every lane of the `group` loading its own slot.
    fn load(
        group: &Group,
        geometry: &BoxGeometry,
        cells: &[Cell],
        near: [usize; 3],
        offset: [i32; 3],
    ) -> StagedCell {
        let (bin, shift) = geometry.neighbor(near, offset);
        let image = geometry.image_shift(shift);
        let far = &cells[bin];

        let mut staged = StagedCell {
            tags: [0; CELL_CAPACITY],
            positions: [[0.0; 3]; CELL_CAPACITY],
            is_near_cell: offset == [0, 0, 0],
            phase: group.phase(),
        };

        for lane in group.lanes() {
            staged.tags[lane] = far.tag(lane);
            let position = far.position(lane);
            staged.positions[lane] = [
                position[0] + image[0],
                position[1] + image[1],
                position[2] + image[2],
            ];
        }

        return staged;
    }
}

/// Fold `operator` over all pairs of particles within the cells listed in
/// `neighbors` around each cell, and write the result in the corresponding
/// entry of `output`.
///
/// Each particle sees every other particle in the neighboring cells exactly
/// once, including particles in periodic images of its own cell, so every
/// unordered pair is visited twice.
#[time_graph::instrument(name = "reduce::launch_pairs")]
pub fn launch_pairs<O: PairOperator>(
    launch: LaunchConfig,
    operator: &O,
    geometry: &BoxGeometry,
    neighbors: &NeighborOffsetList,
    cells: &[Cell],
    output: &mut [O::Output],
) -> Result<(), Error> {
    launch.validate()?;
    launch.validate_geometry(geometry)?;
    launch.validate_buffer("cells", cells.len())?;
    launch.validate_buffer("output", output.len())?;

    if neighbors.is_empty() {
        return Err(Error::DegenerateGeometry(
            "the neighbor offsets list does not contain any cell".into()
        ));
    }

    if neighbors.len() % launch.group_width != 0 || !neighbors.as_slice().iter().any(|r| r.is_sentinel()) {
        return Err(Error::DegenerateGeometry(format!(
            "the neighbor offsets list must be terminated by a sentinel and padded to a multiple of {}",
            launch.group_width
        )));
    }

    debug!(
        "launching pair reduction over {} cells with {} neighboring cells each",
        launch.n_cells, neighbors.n_offsets()
    );

    output.par_iter_mut().enumerate().for_each(|(bin, output)| {
        let group = Group::new(launch.group_width);
        reduce_cell(&group, operator, geometry, neighbors, cells, bin, output);
    });

    return Ok(());
}

/// Run the pair reduction for the cell at `bin` with a single group
fn reduce_cell<O: PairOperator>(
    group: &Group,
    operator: &O,
    geometry: &BoxGeometry,
    neighbors: &NeighborOffsetList,
    cells: &[Cell],
    bin: usize,
    output: &mut O::Output,
) {
    let near = geometry.decode_bin(bin);

    let mut tags = [0; CELL_CAPACITY];
    let mut positions = [[0.0; 3]; CELL_CAPACITY];
    let mut accumulators = [O::Accumulator::default(); CELL_CAPACITY];
    for lane in group.lanes() {
        tags[lane] = cells[bin].tag(lane);
        positions[lane] = cells[bin].position(lane);
    }

    // double buffering: the next far cell is staged while the current one is
    // used for computations
    let mut offsets = neighbors.offsets();
    let mut staged = offsets.next().map(|offset| {
        StagedCell::load(group, geometry, cells, near, offset)
    });

    while let Some(current) = staged.take() {
        group.barrier();
        debug_assert!(current.phase < group.phase());

        staged = offsets.next().map(|offset| {
            StagedCell::load(group, geometry, cells, near, offset)
        });

        for lane in group.lanes() {
            if tags[lane] == 0 {
                continue;
            }

            let [x, y, z] = positions[lane];
            for slot in group.lanes() {
                if current.tags[slot] == 0 || (current.is_near_cell && slot == lane) {
                    continue;
                }

                let [far_x, far_y, far_z] = current.positions[slot];
                operator.pair(&mut accumulators[lane], x - far_x, y - far_y, z - far_z);
            }
        }
    }

    for lane in group.lanes() {
        operator.finalize(output, accumulators[lane], tags[lane], lane);
    }
}
