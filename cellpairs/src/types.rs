//! 3D vectors used for the box and cell geometry
use std::ops::{Add, AddAssign, Sub, SubAssign, Neg, Mul, Div, BitXor, Index, IndexMut};

/// Implement `$Lhs -- $Rhs` arithmetic operations for all variations of by
/// value and by reference of `$Rhs` and `$Lhs`.
macro_rules! impl_arithmetic {
    ($Lhs:ty, $Rhs:ty, $Op:ident, $op:ident, $Output:ty, $sel:ident, $other:ident, $res:expr) => (
        impl $Op<$Rhs> for $Lhs {
            type Output = $Output;
            #[inline] fn $op($sel, $other: $Rhs) -> $Output {
                $res
            }
        }

        impl<'a> $Op<$Rhs> for &'a $Lhs {
            type Output = $Output;
            #[inline] fn $op($sel, $other: $Rhs) -> $Output {
                $res
            }
        }

        impl<'a> $Op<&'a $Rhs> for $Lhs {
            type Output = $Output;
            #[inline] fn $op($sel, $other: &'a $Rhs) -> $Output {
                $res
            }
        }

        impl<'a, 'b> $Op<&'a $Rhs> for &'b $Lhs {
            type Output = $Output;
            #[inline] fn $op($sel, $other: &'a $Rhs) -> $Output {
                $res
            }
        }
    );
}

/// A 3-dimensional vector type
///
/// The `*` operator between two vectors is the dot product, and `^` is the
/// cross product.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3D([f64; 3]);

impl Vector3D {
    /// Create a new `Vector3D` with components `x`, `y`, `z`
    pub const fn new(x: f64, y: f64, z: f64) -> Vector3D {
        Vector3D([x, y, z])
    }

    /// Create a new `Vector3D` with all components set to 0
    pub const fn zero() -> Vector3D {
        Vector3D([0.0; 3])
    }

    /// Get the squared euclidean norm of the vector
    #[inline]
    pub fn norm2(&self) -> f64 {
        self * self
    }

    /// Get the euclidean norm of the vector
    #[inline]
    pub fn norm(&self) -> f64 {
        f64::sqrt(self.norm2())
    }

    /// Convert this vector to single precision
    pub fn to_f32(self) -> [f32; 3] {
        [self[0] as f32, self[1] as f32, self[2] as f32]
    }
}

impl From<[f64; 3]> for Vector3D {
    fn from(array: [f64; 3]) -> Vector3D {
        Vector3D(array)
    }
}

impl From<[f32; 3]> for Vector3D {
    fn from(array: [f32; 3]) -> Vector3D {
        Vector3D::new(f64::from(array[0]), f64::from(array[1]), f64::from(array[2]))
    }
}

impl From<Vector3D> for [f64; 3] {
    fn from(vector: Vector3D) -> [f64; 3] {
        vector.0
    }
}

impl Index<usize> for Vector3D {
    type Output = f64;
    #[inline]
    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Vector3D {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl_arithmetic!(
    Vector3D, Vector3D, Add, add, Vector3D, self, other,
    Vector3D::new(self[0] + other[0], self[1] + other[1], self[2] + other[2])
);

impl_arithmetic!(
    Vector3D, Vector3D, Sub, sub, Vector3D, self, other,
    Vector3D::new(self[0] - other[0], self[1] - other[1], self[2] - other[2])
);

// Dot product
impl_arithmetic!(
    Vector3D, Vector3D, Mul, mul, f64, self, other,
    self[0] * other[0] + self[1] * other[1] + self[2] * other[2]
);

// Cross product
impl_arithmetic!(
    Vector3D, Vector3D, BitXor, bitxor, Vector3D, self, other,
    Vector3D::new(
        self[1] * other[2] - self[2] * other[1],
        self[2] * other[0] - self[0] * other[2],
        self[0] * other[1] - self[1] * other[0],
    )
);

impl_arithmetic!(
    Vector3D, f64, Mul, mul, Vector3D, self, other,
    Vector3D::new(self[0] * other, self[1] * other, self[2] * other)
);

impl_arithmetic!(
    f64, Vector3D, Mul, mul, Vector3D, self, other,
    Vector3D::new(self * other[0], self * other[1], self * other[2])
);

impl_arithmetic!(
    Vector3D, f64, Div, div, Vector3D, self, other,
    Vector3D::new(self[0] / other, self[1] / other, self[2] / other)
);

impl Neg for Vector3D {
    type Output = Vector3D;
    #[inline]
    fn neg(self) -> Vector3D {
        Vector3D::new(-self[0], -self[1], -self[2])
    }
}

impl AddAssign<Vector3D> for Vector3D {
    #[inline]
    fn add_assign(&mut self, other: Vector3D) {
        self.0[0] += other[0];
        self.0[1] += other[1];
        self.0[2] += other[2];
    }
}

impl SubAssign<Vector3D> for Vector3D {
    #[inline]
    fn sub_assign(&mut self, other: Vector3D) {
        self.0[0] -= other[0];
        self.0[1] -= other[1];
        self.0[2] -= other[2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    #[test]
    fn arithmetic() {
        let a = Vector3D::new(2.0, 3.5, 4.75);
        let b = Vector3D::new(6.25, -8.5, 7.5);

        assert_eq!(a + b, Vector3D::new(8.25, -5.0, 12.25));
        assert_eq!(&a - b, Vector3D::new(-4.25, 12.0, -2.75));
        assert_eq!(-a, Vector3D::new(-2.0, -3.5, -4.75));
        assert_eq!(a * 2.0, Vector3D::new(4.0, 7.0, 9.5));
        assert_eq!(2.0 * &a, a * 2.0);
        assert_eq!(a / 2.0, Vector3D::new(1.0, 1.75, 2.375));

        let mut c = a;
        c += b;
        assert_eq!(c, a + b);
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn products() {
        let a = Vector3D::new(2.0, 3.5, 4.75);
        let b = Vector3D::new(6.25, -8.5, 7.5);
        assert_eq!(a * b, 18.375);

        let x = Vector3D::new(1.0, 0.0, 0.0);
        let y = Vector3D::new(0.0, 1.0, 0.0);
        assert_eq!(x ^ y, Vector3D::new(0.0, 0.0, 1.0));
        assert_eq!(y ^ x, Vector3D::new(0.0, 0.0, -1.0));

        // the cross product is orthogonal to both vectors
        let cross = a ^ b;
        assert_ulps_eq!(cross * a, 0.0, epsilon = 1e-12);
        assert_ulps_eq!(cross * b, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn norms() {
        let a = Vector3D::new(3.0, 0.0, -4.0);
        assert_eq!(a.norm2(), 25.0);
        assert_eq!(a.norm(), 5.0);
        assert_eq!(Vector3D::zero().norm(), 0.0);
    }

    #[test]
    fn conversions() {
        let a = Vector3D::from([1.0, 2.0, 3.0]);
        assert_eq!(<[f64; 3]>::from(a), [1.0, 2.0, 3.0]);
        assert_eq!(Vector3D::from([0.5f32, 1.5, -2.0]), Vector3D::new(0.5, 1.5, -2.0));
        assert_eq!(Vector3D::new(0.25, 1.0, -3.5).to_f32(), [0.25, 1.0, -3.5]);
    }
}
