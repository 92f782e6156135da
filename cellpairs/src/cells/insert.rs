use crate::group::Group;
use super::Cell;

/// A request to insert a particle with the given tag in a cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertRequest {
    /// tag of the particle, must not be zero
    pub tag: u32,
    /// bin index of the destination cell
    pub bin: usize,
}

/// Result of a cooperative insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The particle was inserted in the given slot
    Inserted(usize),
    /// All slots of the destination cell are occupied
    Full,
    /// The request used the empty tag `0`, nothing was inserted
    Rejected,
}

/// Insert a particle in a cell, using all lanes of the `group`.
///
/// `requests` contains one request per lane, and only the request of the
/// `source` lane is used: it is broadcast to the whole group, which then
/// searches for an empty slot in the destination cell. The lowest empty slot
/// is claimed with a compare-and-swap by the corresponding lane; if another
/// group claimed the same slot first, the search starts again.
///
/// Concurrent insertions from different groups in the same cell never share
/// a slot. When the cell has no empty slot left, this returns
/// [`InsertOutcome::Full`] without retrying.
pub fn cooperative_insert(
    group: &Group,
    cells: &[Cell],
    requests: &[InsertRequest],
    source: usize,
) -> InsertOutcome {
    let request = group.broadcast(requests, source);
    if request.tag == 0 {
        return InsertOutcome::Rejected;
    }

    let cell = &cells[request.bin];
    let mut claimed = [false; super::CELL_CAPACITY];
    let mut attempts = 0;
    loop {
        attempts += 1;
        // every slot we tried was taken by someone else, so the number of
        // attempts is bounded by the group width
        debug_assert!(attempts <= group.width() + 1);

        let empty = group.ballot(|lane| cell.is_empty(lane));
        let winner = match empty.lowest() {
            Some(lane) => lane,
            None => return InsertOutcome::Full,
        };

        claimed[winner] = cell.try_claim(winner, request.tag).is_ok();
        if group.broadcast(&claimed[..group.width()], winner) {
            return InsertOutcome::Inserted(winner);
        }
    }
}
