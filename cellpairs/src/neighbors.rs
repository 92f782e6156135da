use log::info;

use crate::{BoxGeometry, Error, Vector3D};
use crate::cells::CELL_CAPACITY;

/// Tolerance used when converting distances to cell offsets, preventing
/// fencepost errors when the cutoff falls exactly on a cell boundary.
const OFFSET_EPSILON: f64 = 1e-6;

/// A `CellRange` is a strip of neighboring cells along the first box vector:
/// all offsets `(i, j, k)` with `i0 <= i <= i1`.
///
/// A range with `i0 > i1` is a sentinel, marking the end of a
/// [`NeighborOffsetList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// first offset along the first box vector (inclusive)
    pub i0: i8,
    /// last offset along the first box vector (inclusive)
    pub i1: i8,
    /// offset along the second box vector
    pub j: i8,
    /// offset along the third box vector
    pub k: i8,
}

impl CellRange {
    /// The canonical end-of-list marker
    pub const SENTINEL: CellRange = CellRange { i0: 1, i1: 0, j: 0, k: 0 };

    /// Create a new `CellRange`
    pub fn new(i0: i8, i1: i8, j: i8, k: i8) -> CellRange {
        CellRange { i0, i1, j, k }
    }

    /// Is this range marking the end of a list?
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.i0 > self.i1
    }

    /// Number of cell offsets in this range
    pub fn len(&self) -> usize {
        if self.is_sentinel() {
            0
        } else {
            (self.i1 as i32 - self.i0 as i32 + 1) as usize
        }
    }

    /// Is this range empty? Only sentinels are empty.
    pub fn is_empty(&self) -> bool {
        self.is_sentinel()
    }

    /// Iterate over the `[i, j, k]` offsets in this range
    pub fn offsets(&self) -> impl Iterator<Item = [i32; 3]> {
        let (j, k) = (self.j as i32, self.k as i32);
        (self.i0 as i32..=self.i1 as i32).map(move |i| [i, j, k])
    }
}

/// List of all the neighboring cell offsets that can contain a particle within
/// the cutoff of a particle in the central cell.
///
/// The list is made of [`CellRange`], ordered by `k` then `j`, followed by at
/// least one sentinel. The list length is always a multiple of
/// [`CELL_CAPACITY`], which allows a whole group of lanes to load it without
/// going out of bounds and to find the end of the list without a separate
/// length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborOffsetList {
    ranges: Vec<CellRange>,
}

impl NeighborOffsetList {
    /// Create the list of all cells (including the central cell) within
    /// `cutoff` of a central cell in the given `geometry`.
    #[time_graph::instrument(name = "NeighborOffsetList::new")]
    pub fn new(geometry: &BoxGeometry, cutoff: f64) -> Result<NeighborOffsetList, Error> {
        if !(cutoff > 0.0 && cutoff.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "cutoff must be positive and finite, got {}", cutoff
            )));
        }

        let [hx, hy, hz] = geometry.cell_lengths();
        let shear = geometry.cell_shear();
        // the extent of a sheared cell along y and x also includes the shear
        // of the other cell vectors
        let half_y = hy + f64::abs(shear.zy);
        let half_x = hx + f64::abs(shear.yx) + f64::abs(shear.zx);

        let eps = OFFSET_EPSILON;
        let cutoff2 = cutoff * cutoff;

        let k0 = to_offset(f64::ceil(eps - (hz + cutoff) / hz))?;
        let k1 = to_offset(f64::floor((hz + cutoff) / hz - eps))?;

        let mut ranges = Vec::new();
        for k in k0..=k1 {
            let abs_k = if k > 0 { k - 1 } else if k < 0 { -k - 1 } else { 0 };
            let dz = abs_k as f64 * hz;
            let cutoff2_z = cutoff2 - dz * dz;
            if cutoff2_z < 0.0 {
                continue;
            }
            let remaining_z = f64::sqrt(cutoff2_z);

            // shifted base point
            let y0 = -(k as f64) * shear.zy;
            let j0 = to_offset(f64::ceil((y0 - half_y - remaining_z) / hy + eps))?;
            let j1 = to_offset(f64::floor((y0 + half_y + remaining_z) / hy - eps))?;

            for j in j0..=j1 {
                let dy = f64::max(f64::abs(j as f64 * hy - y0) - half_y, 0.0);
                let cutoff2_y = cutoff2_z - dy * dy;
                if cutoff2_y < 0.0 {
                    continue;
                }
                let remaining_y = f64::sqrt(cutoff2_y);

                let x0 = -(j as f64) * shear.yx - (k as f64) * shear.zx;
                let mut i0 = to_offset(f64::ceil((x0 - half_x - remaining_y) / hx + eps))?;
                let mut i1 = to_offset(f64::floor((x0 + half_x + remaining_y) / hx - eps))?;

                if geometry.is_sheared() {
                    // the bounds above are loose for sheared cells, use the
                    // exact distance to remove extra cells at both ends
                    let cell = geometry.cell_vectors();
                    let too_far = |i: i8| {
                        let offset = [i as i32, j as i32, k as i32];
                        min_cell_distance2(&cell, offset) > (cutoff + eps) * (cutoff + eps)
                    };

                    while i0 < i1 && too_far(i0) {
                        i0 += 1;
                    }
                    while i1 > i0 && too_far(i1) {
                        i1 -= 1;
                    }
                    if i0 == i1 && too_far(i0) {
                        continue;
                    }
                }

                if i1 >= i0 {
                    ranges.push(CellRange::new(i0, i1, j, k));
                }
            }
        }

        let n_ranges = ranges.len();
        pad_with_sentinels(&mut ranges);

        let list = NeighborOffsetList { ranges };
        info!(
            "created neighbor offsets list for cutoff {}: {} ranges, {} cells",
            cutoff, n_ranges, list.n_offsets()
        );

        return Ok(list);
    }

    /// Create a list from already computed `ranges`. The ranges must contain
    /// at least one sentinel, and their number must be a multiple of
    /// [`CELL_CAPACITY`].
    pub fn from_ranges(ranges: Vec<CellRange>) -> Result<NeighborOffsetList, Error> {
        if !ranges.iter().any(CellRange::is_sentinel) {
            return Err(Error::InvalidParameter(
                "neighbor offsets list must be terminated by a sentinel".into()
            ));
        }

        if ranges.len() % CELL_CAPACITY != 0 {
            return Err(Error::InvalidParameter(format!(
                "neighbor offsets list length must be a multiple of {}, got {}",
                CELL_CAPACITY, ranges.len()
            )));
        }

        return Ok(NeighborOffsetList { ranges });
    }

    /// Get the full list, including sentinels used as padding
    pub fn as_slice(&self) -> &[CellRange] {
        &self.ranges
    }

    /// Get the full length of the list, including sentinels
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Does this list contain no range before the first sentinel?
    pub fn is_empty(&self) -> bool {
        self.ranges().next().is_none()
    }

    /// Iterate over the ranges before the first sentinel
    pub fn ranges(&self) -> impl Iterator<Item = &CellRange> + '_ {
        self.ranges.iter().take_while(|range| !range.is_sentinel())
    }

    /// Iterate over all the `[i, j, k]` cell offsets in this list
    pub fn offsets(&self) -> impl Iterator<Item = [i32; 3]> + '_ {
        self.ranges().flat_map(CellRange::offsets)
    }

    /// Get the total number of cell offsets in this list
    pub fn n_offsets(&self) -> usize {
        self.ranges().map(CellRange::len).sum()
    }
}

/// Terminate `ranges` with a sentinel, and add more sentinels until the length
/// is a multiple of `CELL_CAPACITY`
fn pad_with_sentinels(ranges: &mut Vec<CellRange>) {
    ranges.push(CellRange::SENTINEL);
    while ranges.len() % CELL_CAPACITY != 0 {
        ranges.push(CellRange::SENTINEL);
    }
}

/// Convert a floating point cell offset to the `i8` used in `CellRange`
fn to_offset(value: f64) -> Result<i8, Error> {
    if value >= -(i8::MAX as f64) && value <= i8::MAX as f64 {
        Ok(value as i8)
    } else {
        Err(Error::InvalidParameter(format!(
            "the cutoff spans too many cells (needs an offset of {}), use larger cells", value
        )))
    }
}

/// Get the squared minimal distance between a point in the cell at the origin
/// and a point in the cell at `offset`, for cells spanned by `cell`.
///
/// This is the distance between the origin and the parallelepiped centered on
/// `offset` with half-edges given by the cell vectors. We check the interior
/// and all the faces/edges/vertices of the parallelepiped: for each, the
/// closest point is found by projecting the origin on the corresponding
/// affine subspace, and kept if it lies inside the parallelepiped.
pub(crate) fn min_cell_distance2(cell: &[Vector3D; 3], offset: [i32; 3]) -> f64 {
    let center = offset[0] as f64 * cell[0] + offset[1] as f64 * cell[1] + offset[2] as f64 * cell[2];

    let mut best = f64::INFINITY;
    // each axis is either free (0), or fixed at -1 (1) or +1 (2)
    for pattern in 0..27 {
        let states = [pattern % 3, (pattern / 3) % 3, pattern / 9];

        let mut base = center;
        let mut free = Vec::with_capacity(3);
        for (axis, &state) in states.iter().enumerate() {
            match state {
                0 => free.push(cell[axis]),
                1 => base -= cell[axis],
                _ => base += cell[axis],
            }
        }

        let coefficients = project_origin(base, &free);
        if coefficients.iter().any(|t| f64::abs(*t) > 1.0 + 1e-12) {
            continue;
        }

        let mut point = base;
        for (&t, &vector) in coefficients.iter().zip(&free) {
            point += t * vector;
        }
        best = f64::min(best, point.norm2());
    }

    return best;
}

/// Find the coefficients `t` minimizing `|base + sum(t_i * free_i)|`, i.e.
/// projecting the origin on the affine subspace going through `base` and
/// spanned by the (linearly independent) `free` vectors.
fn project_origin(base: Vector3D, free: &[Vector3D]) -> Vec<f64> {
    match *free {
        [] => vec![],
        [u] => vec![-(u * base) / u.norm2()],
        [u, v] => {
            // normal equations, solved with Cramer's rule
            let (uu, uv, vv) = (u * u, u * v, v * v);
            let (bu, bv) = (-(u * base), -(v * base));
            let determinant = uu * vv - uv * uv;
            vec![
                (bu * vv - bv * uv) / determinant,
                (uu * bv - uv * bu) / determinant,
            ]
        }
        [u, v, w] => {
            // the rows of the inverse matrix are given by cross products
            let volume = u * (v ^ w);
            vec![
                -(base * (v ^ w)) / volume,
                -(base * (w ^ u)) / volume,
                -(base * (u ^ v)) / volume,
            ]
        }
        _ => unreachable!("there are at most three free axis"),
    }
}
