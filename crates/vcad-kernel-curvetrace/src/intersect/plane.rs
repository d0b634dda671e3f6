//! Ray clipping against a half space.

use vcad_kernel_math::Vec3;

/// Parameter interval of the line `org + t * dir` inside the half space
/// `dot(x - p, n) >= 0`.
///
/// Lines parallel to the plane yield an unbounded interval when the
/// origin is inside and an empty one (`lower > upper`) otherwise.
pub fn intersect_half_plane(org: &Vec3, dir: &Vec3, n: &Vec3, p: &Vec3) -> (f32, f32) {
    let on = (org - p).dot(n);
    let dn = dir.dot(n);
    if dn == 0.0 {
        // signed zero would pick the side arbitrarily
        return if on >= 0.0 {
            (f32::NEG_INFINITY, f32::INFINITY)
        } else {
            (f32::INFINITY, f32::NEG_INFINITY)
        };
    }
    let t = -on / dn;
    if dn < 0.0 {
        (f32::NEG_INFINITY, t)
    } else {
        (t, f32::INFINITY)
    }
}
