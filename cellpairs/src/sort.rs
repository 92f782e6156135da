//! Redistribution of particles in the cells containing them, after they moved.
use log::warn;
use rayon::prelude::*;

use crate::cells::{cooperative_insert, Cell, InsertOutcome, InsertRequest, CELL_CAPACITY};
use crate::group::Group;
use crate::reduce::{LaunchConfig, ZeroCell, launch_single_in_place};
use crate::{BoxGeometry, Error};

/// What to do with particles that can not be inserted in their destination
/// cell because it is already full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Drop the particles, and log a warning
    #[default]
    Drop,
    /// Drop the particles, and return [`Error::CellOverflow`] once the
    /// redistribution is complete
    Error,
}

/// Summary of a redistribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortReport {
    /// number of particles inserted in the destination cells
    pub moved: usize,
    /// number of particles dropped because their destination cell was full
    pub dropped: usize,
}

impl std::ops::Add for SortReport {
    type Output = SortReport;

    fn add(self, other: SortReport) -> SortReport {
        SortReport {
            moved: self.moved + other.moved,
            dropped: self.dropped + other.dropped,
        }
    }
}

/// Move all particles from the `source` cells to the cell containing them in
/// the `destination` buffer, wrapping their positions inside the box.
///
/// The destination cells are emptied first. The order of particles inside a
/// destination cell is unspecified. Particles whose destination cell is full
/// are dropped: this is reported in the returned [`SortReport`], and turned
/// into an error if `policy` is [`OverflowPolicy::Error`].
#[time_graph::instrument(name = "sort::redistribute")]
pub fn redistribute(
    launch: LaunchConfig,
    geometry: &BoxGeometry,
    source: &[Cell],
    destination: &mut [Cell],
    policy: OverflowPolicy,
) -> Result<SortReport, Error> {
    launch.validate()?;
    launch.validate_geometry(geometry)?;
    launch.validate_buffer("source", source.len())?;
    launch.validate_buffer("destination", destination.len())?;

    launch_single_in_place(launch, &ZeroCell, destination)?;

    let destination = &*destination;
    let report = source.par_iter()
        .map(|cell| {
            let group = Group::new(launch.group_width);
            sort_cell(&group, geometry, cell, destination)
        })
        .reduce(SortReport::default, |a, b| a + b);

    if report.dropped != 0 {
        warn!(
            "{} particle(s) were dropped during redistribution because their destination cell was full",
            report.dropped
        );

        if policy == OverflowPolicy::Error {
            return Err(Error::CellOverflow { dropped: report.dropped });
        }
    }

    return Ok(report);
}

/// Insert all particles in `cell` in their destination cell, using a single
/// group
fn sort_cell(group: &Group, geometry: &BoxGeometry, cell: &Cell, destination: &[Cell]) -> SortReport {
    let mut requests = [InsertRequest::default(); CELL_CAPACITY];
    let mut positions = [[0.0; 3]; CELL_CAPACITY];
    for lane in group.lanes() {
        let tag = cell.tag(lane);
        if tag != 0 {
            let (bin, position) = geometry.locate(cell.position(lane));
            requests[lane] = InsertRequest { tag: tag, bin: bin };
            positions[lane] = position;
        }
    }

    let mut report = SortReport::default();
    let live = group.ballot(|lane| requests[lane].tag != 0);
    for source in live.lanes() {
        match cooperative_insert(group, destination, &requests[..group.width()], source) {
            InsertOutcome::Inserted(slot) => {
                destination[requests[source].bin].store_position(slot, positions[source]);
                report.moved += 1;
            }
            InsertOutcome::Full => report.dropped += 1,
            InsertOutcome::Rejected => unreachable!("only live lanes insert particles"),
        }
    }

    return report;
}
