//! Swept-surface intersection by marching along the ray.
//!
//! The surface between two joints is swept by circles whose planes follow
//! the joint normals `n0` and `n1`. For a point `p` on the ray, the plane
//! through `p` and the segment axis cuts the end circles in `q0` and `q1`;
//! the line `q0 q1` approximates the surface near `p` and the signed
//! distance of `p` to it is the next step along the ray.

use vcad_kernel_math::{xyz, Vec3};

use super::{intersect_cylinder, intersect_half_plane, CurveSegment, LocalRay, SurfaceHit};
use crate::config::CurveConfig;
use crate::ray::Ray;

/// Segment re-expressed around a ray re-centered at its midpoint.
pub(super) struct LocalSegment {
    pub ray: LocalRay,
    pub p0: Vec3,
    pub p1: Vec3,
    pub n0: Vec3,
    pub n1: Vec3,
    pub r0: f32,
    pub r1: f32,
}

impl LocalSegment {
    pub fn new(ray: &Ray, segment: &CurveSegment) -> Self {
        let a = xyz(&segment.p0);
        let b = xyz(&segment.p1);
        let ray = LocalRay::centered(ray, &((a + b) * 0.5));
        Self {
            p0: a - ray.org,
            p1: b - ray.org,
            n0: segment.n0,
            n1: segment.n1,
            r0: segment.p0.w,
            r1: segment.p1.w,
            ray,
        }
    }

    /// Convergence distance.
    pub fn t_term(&self, config: &CurveConfig) -> f32 {
        config.termination_scale * self.r0.max(self.r1)
    }

    /// Local distance interval inside the bounding cylinder and between
    /// the two joint planes.
    pub fn bracket(&self) -> Option<(f32, f32)> {
        let org = Vec3::zeros();
        let d = &self.ray.dir;
        let hull = intersect_cylinder(&org, d, &self.p0, &self.p1, self.r0.max(self.r1))?;
        let (lo0, hi0) = intersect_half_plane(&org, d, &self.n0, &self.p0);
        let (lo1, hi1) = intersect_half_plane(&org, d, &-self.n1, &self.p1);
        let lower = hull.t.max(lo0).max(lo1);
        let upper = hull.t_exit.min(hi0).min(hi1);
        if lower > upper {
            None
        } else {
            Some((lower, upper))
        }
    }

    /// End-circle points in the plane through `p` and the axis, and the
    /// surface normal of the line between them.
    fn cross_section(&self, p: &Vec3) -> (Vec3, Vec3, Vec3) {
        let n = (p - self.p0).cross(&(self.p1 - self.p0));
        let q0 = self.p0 + self.n0.cross(&n).normalize() * self.r0;
        let q1 = self.p1 + self.n1.cross(&n).normalize() * self.r1;
        let ng = (q1 - q0).cross(&n).normalize();
        (q0, q1, ng)
    }
}

/// Intersect `ray` with the swept surface of `segment`.
///
/// Returns `None` when the ray misses the bounding hull, the march leaves
/// the hull or the iteration budget runs out.
pub fn intersect_swept(ray: &Ray, segment: &CurveSegment, config: &CurveConfig) -> Option<SurfaceHit> {
    let seg = LocalSegment::new(ray, segment);
    let d = seg.ray.dir;
    let t_term = seg.t_term(config);
    let (lower, upper) = seg.bracket()?;

    let mut t = lower;
    let mut converged = false;
    for _ in 0..config.max_iterations {
        if t > upper {
            break;
        }
        let p = d * t;
        let (q0, _, ng) = seg.cross_section(&p);
        let dt = (p - q0).dot(&ng);
        t += dt;
        if !t.is_finite() {
            return None;
        }
        if dt < t_term {
            converged = true;
            break;
        }
    }
    if !converged && t <= upper {
        return None;
    }

    let near = seg.ray.to_local_t(ray.tnear).max(lower);
    let far = seg.ray.to_local_t(ray.tfar).min(upper);
    if t + 1.5 * t_term < near || t - 1.5 * t_term > far {
        return None;
    }

    let p = d * t;
    let (q0, q1, ng) = seg.cross_section(&p);
    let axis = q1 - q0;
    let u = ((p - q0).dot(&axis) / axis.norm_squared()).clamp(0.0, 1.0);
    let t = q0.dot(&ng) / d.dot(&ng);
    if !t.is_finite() {
        return None;
    }
    Some(SurfaceHit {
        t: seg.ray.to_ray_t(t),
        u,
        normal: ng,
    })
}
