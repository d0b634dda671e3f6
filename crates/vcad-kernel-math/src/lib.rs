#![warn(missing_docs)]

//! Math types for the vcad ray tracing kernels.
//!
//! Thin wrappers around nalgebra providing the single-precision types
//! used by BVH traversal and curve intersection: vectors, axis-aligned
//! boxes, orthonormal frames, and the scalar helpers the kernels share.

use nalgebra::{Matrix3, Vector3, Vector4};

/// A vector (or point) in 3D space.
pub type Vec3 = Vector3<f32>;

/// A 3D position with a radius packed into `w`.
pub type Vec4 = Vector4<f32>;

/// Unit in the last place for `1.0f32`.
pub const ULP: f32 = f32::EPSILON;

/// Reciprocal `1 / x`.
#[inline]
pub fn rcp(x: f32) -> f32 {
    1.0 / x
}

/// Fused multiply-subtract: `a * b - c`.
#[inline]
pub fn msub(a: f32, b: f32, c: f32) -> f32 {
    a.mul_add(b, -c)
}

/// Square of a scalar.
#[inline]
pub fn sqr(x: f32) -> f32 {
    x * x
}

/// Normalize a vector, returning zero for zero-length input.
#[inline]
pub fn normalize_safe(v: &Vec3) -> Vec3 {
    let len = v.norm();
    if len > 0.0 {
        v / len
    } else {
        Vec3::zeros()
    }
}

/// Position part of a position/radius vector.
#[inline]
pub fn xyz(v: &Vec4) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// Reciprocal of every component; zero components map to infinities.
#[inline]
pub fn rcp_vec(v: &Vec3) -> Vec3 {
    Vec3::new(rcp(v.x), rcp(v.y), rcp(v.z))
}

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// True if any axis is inverted.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Vec3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Expand this AABB to include another box.
    pub fn include_aabb(&mut self, other: &Aabb3) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Expand the AABB by a tolerance in all directions.
    pub fn expand(&mut self, tol: f32) {
        self.min -= Vec3::repeat(tol);
        self.max += Vec3::repeat(tol);
    }

    /// Box center.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Index of the longest axis.
    pub fn max_dim(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}

/// Orthonormal frame whose local `z` axis is a given direction.
///
/// Rows of the matrix are the frame axes, so multiplying a world vector
/// yields its local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// World to local rotation.
    pub to_local: Matrix3<f32>,
}

impl Frame {
    /// Build a frame around the unit vector `n`.
    pub fn from_normal(n: &Vec3) -> Self {
        let dx0 = Vec3::x().cross(n);
        let dx1 = Vec3::y().cross(n);
        let dx = if dx0.norm_squared() > dx1.norm_squared() {
            dx0
        } else {
            dx1
        }
        .normalize();
        let dy = n.cross(&dx).normalize();
        Self {
            to_local: Matrix3::from_rows(&[dx.transpose(), dy.transpose(), n.transpose()]),
        }
    }

    /// Express a world-space vector in frame coordinates.
    #[inline]
    pub fn apply(&self, v: &Vec3) -> Vec3 {
        self.to_local * v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_msub() {
        assert_relative_eq!(msub(3.0, 4.0, 2.0), 10.0);
    }

    #[test]
    fn test_normalize_safe_zero() {
        assert_eq!(normalize_safe(&Vec3::zeros()), Vec3::zeros());
        let n = normalize_safe(&Vec3::new(0.0, 3.0, 4.0));
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rcp_vec_zero_is_infinite() {
        let r = rcp_vec(&Vec3::new(0.0, -0.0, 2.0));
        assert_eq!(r.x, f32::INFINITY);
        assert_eq!(r.y, f32::NEG_INFINITY);
        assert_relative_eq!(r.z, 0.5);
    }

    #[test]
    fn test_aabb_empty_and_include() {
        let mut b = Aabb3::empty();
        assert!(b.is_empty());
        b.include_point(&Vec3::new(1.0, 2.0, 3.0));
        b.include_point(&Vec3::new(-1.0, 0.0, 5.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, 3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 5.0));
        assert_eq!(b.max_dim(), 0);
    }

    #[test]
    fn test_aabb_union() {
        let mut a = Aabb3::new(Vec3::zeros(), Vec3::repeat(1.0));
        a.include_aabb(&Aabb3::new(Vec3::repeat(2.0), Vec3::repeat(3.0)));
        assert_eq!(a.min, Vec3::zeros());
        assert_eq!(a.max, Vec3::repeat(3.0));
        assert_eq!(a.center(), Vec3::repeat(1.5));
    }

    #[test]
    fn test_frame_is_orthonormal() {
        let n = Vec3::new(1.0, 2.0, -0.5).normalize();
        let f = Frame::from_normal(&n);
        let local = f.apply(&n);
        assert_relative_eq!(local.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(local.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(local.z, 1.0, epsilon = 1e-6);
        let m = f.to_local * f.to_local.transpose();
        assert_relative_eq!(m, Matrix3::identity(), epsilon = 1e-5);
    }

    #[test]
    fn test_frame_along_x() {
        // dx0 degenerates for n = +x, the frame must pick the other candidate
        let f = Frame::from_normal(&Vec3::x());
        let local = f.apply(&Vec3::x());
        assert_relative_eq!(local.z, 1.0, epsilon = 1e-6);
    }
}
