//! Fixed-capacity cells holding particle tags and coordinates, and the
//! per-cell output aggregates written by the reduction engines.
use std::sync::atomic::{AtomicU32, Ordering};

mod insert;
pub use self::insert::{cooperative_insert, InsertOutcome, InsertRequest};

/// Number of slots in a cell, which is also the number of lanes in the
/// groups working on cells.
pub const CELL_CAPACITY: usize = 32;

/// A single cell of the grid, containing up to [`CELL_CAPACITY`] particles.
///
/// Each slot contains an occupancy tag (0 for empty slots, any other value is
/// a marker for the particle type) and the coordinates of the particle. The
/// coordinates of a slot are meaningful only if the corresponding tag is not
/// zero.
///
/// All data is stored in atomics, so that different groups can claim slots
/// in the same cell and write coordinates through a shared reference.
pub struct Cell {
    tags: [AtomicU32; CELL_CAPACITY],
    // f32 bits of the coordinates
    x: [AtomicU32; CELL_CAPACITY],
    y: [AtomicU32; CELL_CAPACITY],
    z: [AtomicU32; CELL_CAPACITY],
}

impl Default for Cell {
    fn default() -> Cell {
        Cell::new()
    }
}

impl Clone for Cell {
    fn clone(&self) -> Cell {
        let load = |values: &[AtomicU32; CELL_CAPACITY]| {
            std::array::from_fn(|slot| AtomicU32::new(values[slot].load(Ordering::Relaxed)))
        };

        Cell {
            tags: load(&self.tags),
            x: load(&self.x),
            y: load(&self.y),
            z: load(&self.z),
        }
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_map();
        for (slot, tag, position) in self.particles() {
            list.entry(&slot, &(tag, position));
        }
        list.finish()
    }
}

impl Cell {
    /// Create a new cell with all slots empty
    pub fn new() -> Cell {
        Cell {
            tags: std::array::from_fn(|_| AtomicU32::new(0)),
            x: std::array::from_fn(|_| AtomicU32::new(0)),
            y: std::array::from_fn(|_| AtomicU32::new(0)),
            z: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    /// Get the tag of the given `slot`, `0` for empty slots
    #[inline]
    pub fn tag(&self, slot: usize) -> u32 {
        self.tags[slot].load(Ordering::Acquire)
    }

    /// Get the coordinates stored in the given `slot`
    #[inline]
    pub fn position(&self, slot: usize) -> [f32; 3] {
        return [
            f32::from_bits(self.x[slot].load(Ordering::Relaxed)),
            f32::from_bits(self.y[slot].load(Ordering::Relaxed)),
            f32::from_bits(self.z[slot].load(Ordering::Relaxed)),
        ];
    }

    /// Is the given `slot` empty?
    #[inline]
    pub fn is_empty(&self, slot: usize) -> bool {
        self.tag(slot) == 0
    }

    /// Get the number of occupied slots in this cell
    pub fn count(&self) -> usize {
        (0..CELL_CAPACITY).filter(|&slot| !self.is_empty(slot)).count()
    }

    /// Try to claim the empty `slot` for a particle with the given `tag`.
    ///
    /// This fails and returns the current tag if the slot is already
    /// occupied, including when another group claimed it first.
    #[inline]
    pub fn try_claim(&self, slot: usize, tag: u32) -> Result<(), u32> {
        self.tags[slot]
            .compare_exchange(0, tag, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
    }

    /// Store the coordinates of the particle in `slot`. This should only be
    /// called by the group which claimed the slot.
    #[inline]
    pub fn store_position(&self, slot: usize, position: [f32; 3]) {
        self.x[slot].store(position[0].to_bits(), Ordering::Relaxed);
        self.y[slot].store(position[1].to_bits(), Ordering::Relaxed);
        self.z[slot].store(position[2].to_bits(), Ordering::Relaxed);
    }

    /// Set the content of a slot, with exclusive access to the cell
    pub fn set(&mut self, slot: usize, tag: u32, position: [f32; 3]) {
        *self.tags[slot].get_mut() = tag;
        *self.x[slot].get_mut() = position[0].to_bits();
        *self.y[slot].get_mut() = position[1].to_bits();
        *self.z[slot].get_mut() = position[2].to_bits();
    }

    /// Mark the given `slot` as empty and reset its coordinates
    pub fn clear(&mut self, slot: usize) {
        self.set(slot, 0, [0.0; 3]);
    }

    /// Iterate over the occupied slots in this cell, giving the slot index,
    /// the tag and the coordinates of each particle
    pub fn particles(&self) -> impl Iterator<Item = (usize, u32, [f32; 3])> + '_ {
        (0..CELL_CAPACITY).filter_map(move |slot| {
            let tag = self.tag(slot);
            if tag == 0 {
                None
            } else {
                Some((slot, tag, self.position(slot)))
            }
        })
    }
}

/// Allocate a buffer of `n_cells` empty cells
pub fn new_buffer(n_cells: usize) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(n_cells);
    cells.resize_with(n_cells, Cell::new);
    return cells;
}

/// Per-slot energies of the particles in a cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellEnergy {
    /// copy of the tags of the cell
    pub tags: [u32; CELL_CAPACITY],
    /// energy of each particle, zero for empty slots
    pub energy: [f64; CELL_CAPACITY],
}

impl Default for CellEnergy {
    fn default() -> CellEnergy {
        CellEnergy {
            tags: [0; CELL_CAPACITY],
            energy: [0.0; CELL_CAPACITY],
        }
    }
}

impl CellEnergy {
    /// Sum of the energies of all particles in this cell
    pub fn total(&self) -> f64 {
        self.energy.iter().sum()
    }
}

/// Per-slot gradients of the energy with respect to the particles positions
#[derive(Debug, Clone, PartialEq)]
pub struct CellGradient {
    /// copy of the tags of the cell
    pub tags: [u32; CELL_CAPACITY],
    /// gradient for each particle, zero for empty slots
    pub gradient: [[f32; 3]; CELL_CAPACITY],
}

impl Default for CellGradient {
    fn default() -> CellGradient {
        CellGradient {
            tags: [0; CELL_CAPACITY],
            gradient: [[0.0; 3]; CELL_CAPACITY],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots() {
        let mut cell = Cell::new();
        assert_eq!(cell.count(), 0);
        assert!(cell.is_empty(12));

        cell.set(12, 3, [1.0, 2.0, -3.5]);
        assert_eq!(cell.tag(12), 3);
        assert_eq!(cell.position(12), [1.0, 2.0, -3.5]);
        assert_eq!(cell.count(), 1);

        let particles = cell.particles().collect::<Vec<_>>();
        assert_eq!(particles, [(12, 3, [1.0, 2.0, -3.5])]);

        cell.clear(12);
        assert!(cell.is_empty(12));
        assert_eq!(cell.particles().count(), 0);
    }

    #[test]
    fn claim() {
        let cell = Cell::new();
        assert_eq!(cell.try_claim(4, 7), Ok(()));
        assert_eq!(cell.try_claim(4, 2), Err(7));
        cell.store_position(4, [0.5, 0.25, 0.125]);

        let copy = cell.clone();
        assert_eq!(copy.tag(4), 7);
        assert_eq!(copy.position(4), [0.5, 0.25, 0.125]);
    }

    #[test]
    fn buffers() {
        let cells = new_buffer(27);
        assert_eq!(cells.len(), 27);
        assert!(cells.iter().all(|cell| cell.count() == 0));

        let mut energy = CellEnergy::default();
        energy.energy[0] = 1.5;
        energy.energy[31] = -0.5;
        assert_eq!(energy.total(), 1.0);
    }
}
