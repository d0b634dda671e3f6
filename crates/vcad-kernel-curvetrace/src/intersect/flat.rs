//! Approximate ray-facing ribbon test.

use vcad_kernel_math::{xyz, Vec3, Vec4};

use super::{CurveSegment, SurfaceHit};
use crate::ray::{Ray, RayPrecalc};

/// Intersect `ray` with `segment` treated as a flat ribbon facing the ray.
///
/// Endpoints are projected into ray space; the closest point of the
/// projected segment to the ray axis is a hit when it lies within the
/// interpolated radius. Zero-length segments never hit. The reported
/// normal is the segment tangent.
pub fn intersect_flat(ray: &Ray, pre: &RayPrecalc, segment: &CurveSegment) -> Option<SurfaceHit> {
    let tangent = xyz(&segment.p1) - xyz(&segment.p0);
    if tangent == Vec3::zeros() {
        return None;
    }

    let to_ray_space = |p: &Vec4| {
        let q = pre.ray_space.apply(&(xyz(p) - ray.org));
        Vec4::new(q.x, q.y, q.z, p.w)
    };
    let p0 = to_ray_space(&segment.p0);
    let p1 = to_ray_space(&segment.p1);

    let v = p1 - p0;
    let d0 = -p0.x * v.x - p0.y * v.y;
    let d1 = v.x * v.x + v.y * v.y;
    // seen end-on the projection collapses to a point
    let u = if d1 == 0.0 { 0.0 } else { (d0 / d1).clamp(0.0, 1.0) };
    let p = p0 + v * u;
    let t = p.z * pre.depth_scale;
    let d2 = p.x * p.x + p.y * p.y;

    if d2 <= p.w * p.w && ray.tnear < t && t < ray.tfar {
        Some(SurfaceHit { t, u, normal: tangent })
    } else {
        None
    }
}
