//! Cooperative groups of lanes.
//!
//! The engines in this crate are written for groups of `C` lanes running in
//! lockstep, one lane per cell slot. On the CPU, a group is a single task
//! executing its lanes one after the other between collective operations:
//! every collective takes one value (or one predicate evaluation) per lane,
//! so the whole group always participates.
//!
//! Different groups run in parallel (see the launch functions in
//! [`crate::reduce`] and [`crate::sort`]), and only communicate through
//! atomic operations on shared cells.

/// Maximal number of lanes in a group, limited by the size of [`LaneMask`]
pub const MAX_GROUP_WIDTH: usize = 32;

/// Result of a ballot: bit `i` is set if lane `i` voted `true`
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LaneMask(u32);

impl std::fmt::Debug for LaneMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LaneMask({:#034b})", self.0)
    }
}

impl LaneMask {
    /// Mask where no lane is set
    pub const EMPTY: LaneMask = LaneMask(0);

    /// Create a mask from the raw `bits`
    pub fn from_bits(bits: u32) -> LaneMask {
        LaneMask(bits)
    }

    /// Get the raw bits of this mask
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Is no lane set in this mask?
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Is `lane` set in this mask?
    pub fn contains(self, lane: usize) -> bool {
        lane < MAX_GROUP_WIDTH && (self.0 >> lane) & 1 == 1
    }

    /// Number of lanes set in this mask
    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Get the lowest lane set in this mask
    pub fn lowest(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Iterate over the lanes set in this mask, in increasing order
    pub fn lanes(self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let lane = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(lane)
        })
    }
}

/// A cooperative group of lanes, providing the collective operations used by
/// the cell algorithms.
#[derive(Debug)]
pub struct Group {
    /// number of lanes in the group
    width: usize,
    /// number of barriers crossed by this group
    phase: std::cell::Cell<u64>,
}

impl Group {
    /// Create a new group with `width` lanes.
    ///
    /// # Panics
    ///
    /// If `width` is zero or larger than [`MAX_GROUP_WIDTH`]
    pub fn new(width: usize) -> Group {
        assert!(
            width > 0 && width <= MAX_GROUP_WIDTH,
            "group width must be between 1 and {}, got {}", MAX_GROUP_WIDTH, width
        );

        Group {
            width: width,
            phase: std::cell::Cell::new(0),
        }
    }

    /// Get the number of lanes in this group
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Iterate over the lanes of this group
    #[inline]
    pub fn lanes(&self) -> std::ops::Range<usize> {
        0..self.width
    }

    /// Evaluate `predicate` on every lane, and give the set of lanes where it
    /// was `true` back to all lanes.
    pub fn ballot(&self, mut predicate: impl FnMut(usize) -> bool) -> LaneMask {
        let mut bits = 0;
        for lane in self.lanes() {
            if predicate(lane) {
                bits |= 1 << lane;
            }
        }
        return LaneMask(bits);
    }

    /// Give the value held by the `source` lane to all lanes. `values`
    /// contains one value for each lane in the group.
    pub fn broadcast<T: Copy>(&self, values: &[T], source: usize) -> T {
        assert_eq!(values.len(), self.width, "broadcast needs one value per lane");
        assert!(source < self.width, "invalid source lane {} for broadcast", source);
        return values[source];
    }

    /// Wait for all lanes to reach this point. Writes to the group staging
    /// area made before the barrier are visible to all lanes after it.
    pub fn barrier(&self) {
        self.phase.set(self.phase.get() + 1);
    }

    /// Get the number of barriers crossed by this group so far
    pub fn phase(&self) -> u64 {
        self.phase.get()
    }
}
