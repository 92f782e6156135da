//! The `BoxGeometry` type represents the periodic simulation box, possibly
//! sheared, together with the uniform grid of cells covering it.
use crate::{Error, Vector3D};

/// Shear lengths of a triclinic box. The box vectors are `a = (Lx, 0, 0)`,
/// `b = (yx, Ly, 0)` and `c = (zx, zy, Lz)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Shear {
    /// x component of the second box vector
    #[serde(default)]
    pub yx: f64,
    /// x component of the third box vector
    #[serde(default)]
    pub zx: f64,
    /// y component of the third box vector
    #[serde(default)]
    pub zy: f64,
}

impl Shear {
    fn is_zero(&self) -> bool {
        self.yx == 0.0 && self.zx == 0.0 && self.zy == 0.0
    }
}

/// A `BoxGeometry` defines the system boundaries and how the box is split in
/// `nx * ny * nz` cells.
///
/// Cells follow the box vectors: cell `(i, j, k)` spans the fractional
/// coordinates `[i/nx, (i+1)/nx) x [j/ny, (j+1)/ny) x [k/nz, (k+1)/nz)`. The
/// bin index of this cell is `(k * ny + j) * nx + i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    /// Box lengths along the three axis
    lengths: [f64; 3],
    /// Box shear lengths
    shear: Shear,
    /// Number of cells along each box vector
    grid: [usize; 3],
}

impl BoxGeometry {
    /// Create a new geometry for a box with the given `lengths` and `shear`,
    /// split into `grid[0] * grid[1] * grid[2]` cells.
    pub fn new(lengths: [f64; 3], shear: Shear, grid: [usize; 3]) -> Result<BoxGeometry, Error> {
        if !lengths.iter().all(|&l| l > 0.0 && l.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "box lengths must be positive and finite, got {:?}", lengths
            )));
        }

        if !(shear.yx.is_finite() && shear.zx.is_finite() && shear.zy.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "box shear must be finite, got {:?}", shear
            )));
        }

        if grid.iter().any(|&n| n == 0) {
            return Err(Error::InvalidParameter(format!(
                "the grid needs at least one cell in each direction, got {:?}", grid
            )));
        }

        let n_cells = grid[0].checked_mul(grid[1]).and_then(|n| n.checked_mul(grid[2]));
        if n_cells.map_or(true, |n| n > u32::MAX as usize) {
            return Err(Error::InvalidParameter(format!(
                "too many cells in the grid {:?}", grid
            )));
        }

        return Ok(BoxGeometry {
            lengths: lengths,
            shear: shear,
            grid: grid,
        });
    }

    /// Create a geometry for an orthorhombic box with side lengths `lengths`
    pub fn orthorhombic(lengths: [f64; 3], grid: [usize; 3]) -> Result<BoxGeometry, Error> {
        BoxGeometry::new(lengths, Shear::default(), grid)
    }

    /// Get the box lengths
    pub fn lengths(&self) -> [f64; 3] {
        self.lengths
    }

    /// Get the box shear lengths
    pub fn shear(&self) -> Shear {
        self.shear
    }

    /// Is this box sheared?
    pub fn is_sheared(&self) -> bool {
        !self.shear.is_zero()
    }

    /// Get the number of cells along each box vector
    pub fn grid(&self) -> [usize; 3] {
        self.grid
    }

    /// Get the total number of cells
    pub fn n_cells(&self) -> usize {
        self.grid[0] * self.grid[1] * self.grid[2]
    }

    /// Get the cell lengths `hx, hy, hz`
    pub fn cell_lengths(&self) -> [f64; 3] {
        [
            self.lengths[0] / self.grid[0] as f64,
            self.lengths[1] / self.grid[1] as f64,
            self.lengths[2] / self.grid[2] as f64,
        ]
    }

    /// Get the shear of a single cell, i.e. the box shear divided by the
    /// number of cells along the sheared vector.
    pub fn cell_shear(&self) -> Shear {
        Shear {
            yx: self.shear.yx / self.grid[1] as f64,
            zx: self.shear.zx / self.grid[2] as f64,
            zy: self.shear.zy / self.grid[2] as f64,
        }
    }

    /// Get the three vectors spanning a single cell
    pub fn cell_vectors(&self) -> [Vector3D; 3] {
        let [hx, hy, hz] = self.cell_lengths();
        let shear = self.cell_shear();
        [
            Vector3D::new(hx, 0.0, 0.0),
            Vector3D::new(shear.yx, hy, 0.0),
            Vector3D::new(shear.zx, shear.zy, hz),
        ]
    }

    /// Get the bin index of the cell at grid coordinates `(i, j, k)`
    #[inline]
    pub fn bin(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.grid[0] && j < self.grid[1] && k < self.grid[2]);
        (k * self.grid[1] + j) * self.grid[0] + i
    }

    /// Get the grid coordinates `(i, j, k)` of the cell with the given `bin`
    /// index
    #[inline]
    pub fn decode_bin(&self, bin: usize) -> [usize; 3] {
        debug_assert!(bin < self.n_cells());
        let [nx, ny, _] = self.grid;
        [bin % nx, (bin / nx) % ny, bin / (nx * ny)]
    }
}

/// Geometric operations using periodic boundary conditions
impl BoxGeometry {
    /// Get the three box vectors `a`, `b` and `c`
    pub fn box_vectors(&self) -> [Vector3D; 3] {
        let [lx, ly, lz] = self.lengths;
        [
            Vector3D::new(lx, 0.0, 0.0),
            Vector3D::new(self.shear.yx, ly, 0.0),
            Vector3D::new(self.shear.zx, self.shear.zy, lz),
        ]
    }

    /// Get the fractional representation of the `position` in this box
    pub fn fractional(&self, position: Vector3D) -> Vector3D {
        // the box matrix is lower triangular, solve by forward substitution
        let [lx, ly, lz] = self.lengths;
        let s_c = position[2] / lz;
        let s_b = (position[1] - s_c * self.shear.zy) / ly;
        let s_a = (position[0] - s_b * self.shear.yx - s_c * self.shear.zx) / lx;
        Vector3D::new(s_a, s_b, s_c)
    }

    /// Get the Cartesian representation of the `fractional` vector in this box
    pub fn cartesian(&self, fractional: Vector3D) -> Vector3D {
        let [a, b, c] = self.box_vectors();
        fractional[0] * a + fractional[1] * b + fractional[2] * c
    }

    /// Find the cell containing `position` after wrapping it inside the box.
    /// This returns the bin index of the cell and the wrapped position.
    pub fn locate(&self, position: [f32; 3]) -> (usize, [f32; 3]) {
        let mut fractional = self.fractional(Vector3D::from(position));

        let mut cell = [0; 3];
        for xyz in 0..3 {
            fractional[xyz] -= f64::floor(fractional[xyz]);
            // rounding can put values exactly on the upper boundary
            let n = self.grid[xyz];
            cell[xyz] = usize::min(f64::floor(fractional[xyz] * n as f64) as usize, n - 1);
        }

        let wrapped = self.cartesian(fractional);
        let bin = self.bin(cell[0], cell[1], cell[2]);
        return (bin, wrapped.to_f32());
    }

    /// Get the bin index of the cell containing `position`, wrapping the
    /// position inside the box first
    pub fn bin_of(&self, position: [f32; 3]) -> usize {
        self.locate(position).0
    }

    /// Wrap `position` inside the box, obeying the periodic boundary
    /// conditions.
    pub fn wrap(&self, position: [f32; 3]) -> [f32; 3] {
        self.locate(position).1
    }

    /// Compute the shift vector in cartesian coordinates corresponding to the
    /// given number of box vectors.
    pub fn image_shift(&self, shift: [i32; 3]) -> [f32; 3] {
        let shift = Vector3D::new(shift[0] as f64, shift[1] as f64, shift[2] as f64);
        self.cartesian(shift).to_f32()
    }

    /// Get the cell at `offset` from the cell at grid coordinates `cell`,
    /// wrapping around the periodic boundaries. This returns the bin index of
    /// the neighboring cell, and how many box vectors were crossed to reach
    /// it.
    pub fn neighbor(&self, cell: [usize; 3], offset: [i32; 3]) -> (usize, [i32; 3]) {
        let unwrapped = [
            cell[0] as i32 + offset[0],
            cell[1] as i32 + offset[1],
            cell[2] as i32 + offset[2],
        ];

        let (shift, wrapped) = divmod_vec(unwrapped, self.grid);
        return (self.bin(wrapped[0], wrapped[1], wrapped[2]), shift);
    }
}

/// Function to compute both quotient and remainder of the division of a by b.
/// This function follows Python convention, making sure the remainder have the
/// same sign as `b`.
fn divmod(a: i32, b: usize) -> (i32, usize) {
    debug_assert!(b < (i32::MAX as usize));
    let b = b as i32;
    let mut quotient = a / b;
    let mut remainder = a % b;
    if remainder < 0 {
        remainder += b;
        quotient -= 1;
    }
    return (quotient, remainder as usize);
}

/// Apply the [`divmod`] function to three components at the time
fn divmod_vec(a: [i32; 3], b: [usize; 3]) -> ([i32; 3], [usize; 3]) {
    let (qx, rx) = divmod(a[0], b[0]);
    let (qy, ry) = divmod(a[1], b[1]);
    let (qz, rz) = divmod(a[2], b[2]);
    return ([qx, qy, qz], [rx, ry, rz]);
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::{assert_relative_eq, assert_ulps_eq};

    fn sheared() -> BoxGeometry {
        let shear = Shear { yx: 1.5, zx: -0.5, zy: 2.0 };
        BoxGeometry::new([6.0, 8.0, 10.0], shear, [3, 4, 5]).unwrap()
    }

    #[test]
    fn invalid_parameters() {
        assert!(BoxGeometry::orthorhombic([-4.0, 4.0, 4.0], [2, 2, 2]).is_err());
        assert!(BoxGeometry::orthorhombic([4.0, f64::NAN, 4.0], [2, 2, 2]).is_err());
        assert!(BoxGeometry::orthorhombic([4.0, 4.0, 4.0], [2, 0, 2]).is_err());

        let shear = Shear { yx: f64::INFINITY, zx: 0.0, zy: 0.0 };
        let error = BoxGeometry::new([4.0, 4.0, 4.0], shear, [2, 2, 2]).unwrap_err();
        assert!(error.to_string().starts_with("invalid parameter: box shear must be finite"));
    }

    #[test]
    fn cells() {
        let geometry = sheared();
        assert_eq!(geometry.n_cells(), 60);
        assert!(geometry.is_sheared());
        assert!(!BoxGeometry::orthorhombic([1.0, 1.0, 1.0], [1, 1, 1]).unwrap().is_sheared());

        assert_eq!(geometry.cell_lengths(), [2.0, 2.0, 2.0]);
        assert_eq!(geometry.cell_shear(), Shear { yx: 0.375, zx: -0.1, zy: 0.4 });

        let [a, b, c] = geometry.box_vectors();
        assert_eq!(c, Vector3D::new(-0.5, 2.0, 10.0));
        // the volume of the box is the mixed product of its vectors
        assert_ulps_eq!(a * (b ^ c), 480.0);

        let [ha, hb, hc] = geometry.cell_vectors();
        assert_eq!(ha, Vector3D::new(2.0, 0.0, 0.0));
        assert_eq!(hb, Vector3D::new(0.375, 2.0, 0.0));
        assert_eq!(hc, Vector3D::new(-0.1, 0.4, 2.0));
    }

    #[test]
    fn bins() {
        let geometry = sheared();
        assert_eq!(geometry.bin(0, 0, 0), 0);
        assert_eq!(geometry.bin(1, 0, 0), 1);
        assert_eq!(geometry.bin(0, 1, 0), 3);
        assert_eq!(geometry.bin(0, 0, 1), 12);
        assert_eq!(geometry.bin(2, 3, 4), 59);

        for bin in 0..geometry.n_cells() {
            let [i, j, k] = geometry.decode_bin(bin);
            assert_eq!(geometry.bin(i, j, k), bin);
        }
    }

    #[test]
    fn fractional_cartesian() {
        let geometry = sheared();
        assert_eq!(
            geometry.fractional(Vector3D::new(0.0, 0.0, 5.0)),
            Vector3D::new(0.4375 / 6.0, -0.125, 0.5)
        );

        let tests = [
            Vector3D::new(0.0, 10.0, 4.0),
            Vector3D::new(-5.0, 12.0, 4.9),
            Vector3D::new(3.3, -1.0, 22.0),
        ];

        for test in tests {
            let transformed = geometry.cartesian(geometry.fractional(test));
            assert_ulps_eq!(test[0], transformed[0], epsilon = 1e-14);
            assert_ulps_eq!(test[1], transformed[1], epsilon = 1e-14);
            assert_ulps_eq!(test[2], transformed[2], epsilon = 1e-14);
        }
    }

    #[test]
    fn locate() {
        let geometry = BoxGeometry::orthorhombic([10.0, 10.0, 10.0], [5, 5, 5]).unwrap();
        assert_eq!(geometry.locate([0.5, 0.5, 0.5]), (0, [0.5, 0.5, 0.5]));
        assert_eq!(geometry.locate([3.0, 4.5, 9.0]), (geometry.bin(1, 2, 4), [3.0, 4.5, 9.0]));

        // positions outside of the box are wrapped inside
        let (bin, wrapped) = geometry.locate([-1.0, 13.0, 25.0]);
        assert_eq!(bin, geometry.bin(4, 1, 2));
        assert_relative_eq!(wrapped[0], 9.0);
        assert_relative_eq!(wrapped[1], 3.0);
        assert_relative_eq!(wrapped[2], 5.0);

        // values just below the upper boundary stay in the last cell
        assert_eq!(geometry.bin_of([9.999_999, 0.0, 0.0]), geometry.bin(4, 0, 0));
        assert_eq!(geometry.bin_of([-1e-9, 0.0, 0.0]), geometry.bin(4, 0, 0));
    }

    #[test]
    fn locate_sheared() {
        let geometry = sheared();
        // (1, 1, 1) in fractional coordinates of the cells
        let position = geometry.cartesian(Vector3D::new(1.5 / 3.0, 1.5 / 4.0, 1.5 / 5.0)).to_f32();
        let (bin, wrapped) = geometry.locate(position);
        assert_eq!(bin, geometry.bin(1, 1, 1));
        assert_relative_eq!(wrapped[0], position[0], epsilon = 1e-6);
        assert_relative_eq!(wrapped[1], position[1], epsilon = 1e-6);
        assert_relative_eq!(wrapped[2], position[2], epsilon = 1e-6);

        // shifting by a full box vector gives back the same cell
        let c = geometry.image_shift([0, 0, 1]);
        assert_eq!(c, [-0.5, 2.0, 10.0]);
        let shifted = [position[0] + c[0], position[1] + c[1], position[2] + c[2]];
        let (bin, wrapped) = geometry.locate(shifted);
        assert_eq!(bin, geometry.bin(1, 1, 1));
        assert_relative_eq!(wrapped[0], position[0], epsilon = 1e-5);
        assert_relative_eq!(wrapped[1], position[1], epsilon = 1e-5);
        assert_relative_eq!(wrapped[2], position[2], epsilon = 1e-5);
    }

    #[test]
    fn neighbors() {
        let geometry = BoxGeometry::orthorhombic([10.0, 10.0, 10.0], [5, 4, 3]).unwrap();
        assert_eq!(geometry.neighbor([1, 1, 1], [1, 1, 1]), (geometry.bin(2, 2, 2), [0, 0, 0]));
        assert_eq!(geometry.neighbor([0, 0, 0], [-1, 0, 0]), (geometry.bin(4, 0, 0), [-1, 0, 0]));
        assert_eq!(geometry.neighbor([4, 3, 2], [1, 1, 1]), (geometry.bin(0, 0, 0), [1, 1, 1]));
        // offsets larger than the grid
        assert_eq!(geometry.neighbor([0, 0, 0], [11, -9, 0]), (geometry.bin(1, 3, 0), [2, -3, 0]));
    }

    #[test]
    fn test_divmod() {
        assert_eq!(divmod(7, 3), (2, 1));
        assert_eq!(divmod(-7, 3), (-3, 2));
        assert_eq!(divmod(-6, 3), (-2, 0));
        assert_eq!(divmod(0, 4), (0, 0));
    }
}
