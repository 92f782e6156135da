//! Launch configuration and engines reducing data over cells.
//!
//! Two kinds of reductions exist: single-cell reductions apply an operator to
//! every slot of every cell independently ([`launch_single`] and
//! [`launch_single_in_place`]); pair reductions fold an operator over every
//! ordered pair of particles in neighboring cells ([`launch_pairs`]).
use crate::cells::CELL_CAPACITY;
use crate::{BoxGeometry, Error};

mod single;
pub use self::single::{SingleOperator, launch_single, launch_single_in_place};
pub use self::single::{ZeroCell, ZeroEnergy, CountParticles};

mod pairs;
pub use self::pairs::{PairOperator, launch_pairs};

/// Configuration of a launch over cells: the number of cells to process and
/// the number of lanes in each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// number of cells (and groups) in the launch
    pub n_cells: usize,
    /// number of lanes in each group, must be [`CELL_CAPACITY`]
    pub group_width: usize,
}

impl LaunchConfig {
    /// Create a new launch configuration for `n_cells` cells, using groups
    /// of `group_width` lanes
    pub fn new(n_cells: usize, group_width: usize) -> LaunchConfig {
        LaunchConfig {
            n_cells: n_cells,
            group_width: group_width,
        }
    }

    /// Get the launch configuration covering all cells of the `geometry`
    pub fn for_geometry(geometry: &BoxGeometry) -> LaunchConfig {
        LaunchConfig::new(geometry.n_cells(), CELL_CAPACITY)
    }

    /// Check that this configuration can be used to launch work on cells
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.group_width != CELL_CAPACITY {
            return Err(Error::GroupWidth {
                expected: CELL_CAPACITY,
                got: self.group_width,
            });
        }
        return Ok(());
    }

    /// Check that this configuration matches the number of cells in the
    /// `geometry`
    pub(crate) fn validate_geometry(&self, geometry: &BoxGeometry) -> Result<(), Error> {
        if geometry.n_cells() != self.n_cells {
            return Err(Error::InvalidParameter(format!(
                "the launch is configured for {} cells, but the box contains {} cells",
                self.n_cells, geometry.n_cells()
            )));
        }
        return Ok(());
    }

    /// Check that the buffer called `name` contains one entry per cell
    pub(crate) fn validate_buffer(&self, name: &str, len: usize) -> Result<(), Error> {
        if len != self.n_cells {
            return Err(Error::InvalidParameter(format!(
                "expected {} entries in the {} buffer, got {}",
                self.n_cells, name, len
            )));
        }
        return Ok(());
    }
}
