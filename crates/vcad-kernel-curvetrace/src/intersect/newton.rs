//! Swept-surface intersection by Newton iteration on the axial parameter.
//!
//! For an axial parameter `u` the cross-section is the circle of radius
//! `rs(u)` around `ps(u)` in the plane with normal `ns(u)`, all linearly
//! interpolated between the joints. The ray meets that plane at
//! `t = ps.ns / d.ns`, and
//!
//! ```text
//! f(u) = |(ps.ns) d - ps (ns.d)|^2 - (rs (ns.d))^2
//! ```
//!
//! is `(ns.d)^2` times the squared distance from that point to `ps` minus
//! `rs^2`. Roots of `f` are where the ray pierces the surface.

use vcad_kernel_math::{sqr, Vec3};

use super::fill::LocalSegment;
use super::{CurveSegment, SurfaceHit};
use crate::config::CurveConfig;
use crate::ray::Ray;

/// `(a.b) c - a (b.c)`
#[inline]
fn distribute(a: &Vec3, b: &Vec3, c: &Vec3) -> Vec3 {
    c * a.dot(b) - a * b.dot(c)
}

struct Section {
    ps: Vec3,
    ns: Vec3,
    rs: f32,
}

impl LocalSegment {
    fn section(&self, u: f32) -> Section {
        Section {
            ps: self.p0 * (1.0 - u) + self.p1 * u,
            ns: self.n0 * (1.0 - u) + self.n1 * u,
            rs: self.r0 * (1.0 - u) + self.r1 * u,
        }
    }

    fn f(&self, u: f32) -> f32 {
        let d = &self.ray.dir;
        let s = self.section(u);
        let a = distribute(&s.ps, &s.ns, d);
        let b = s.rs * s.ns.dot(d);
        a.dot(&a) - sqr(b)
    }

    fn dfdu(&self, u: f32) -> f32 {
        let d = &self.ray.dir;
        let s = self.section(u);
        let dps = self.p1 - self.p0;
        let dns = self.n1 - self.n0;
        let drs = self.r1 - self.r0;
        let a = distribute(&s.ps, &s.ns, d);
        let da = distribute(&dps, &s.ns, d) + distribute(&s.ps, &dns, d);
        let b = s.rs * s.ns.dot(d);
        let db = drs * s.ns.dot(d) + s.rs * dns.dot(d);
        2.0 * da.dot(&a) - 2.0 * db * b
    }

    /// Refine `u` to a root of `f`.
    fn solve(&self, mut u: f32, t_term: f32, config: &CurveConfig) -> Option<f32> {
        let len = (self.p1 - self.p0).norm();
        for _ in 0..config.max_iterations {
            let step = self.f(u) / self.dfdu(u);
            if !step.is_finite() {
                return None;
            }
            u -= step;
            if step.abs() * len < t_term {
                return Some(u);
            }
        }
        None
    }

    /// Hit at a converged `u`, in local distance.
    fn hit_at(&self, u: f32, config: &CurveConfig) -> Option<(f32, Vec3)> {
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let d = &self.ray.dir;
        let s = self.section(u);
        let dn = s.ns.dot(d);
        let residual = self.f(u).abs() / (sqr(dn) * sqr(s.rs));
        if !(residual <= config.residual_tolerance) {
            return None;
        }
        let t = s.ps.dot(&s.ns) / dn;
        if !t.is_finite() {
            return None;
        }
        Some((t, d * t - s.ps))
    }
}

/// Intersect `ray` with the swept surface of `segment` by solving for the
/// axial parameter.
///
/// Iteration starts from the entry of the bounding hull and from both
/// joints; the nearest converged root inside the ray interval wins.
/// Non-converging starts and roots with a relative residual above
/// `residual_tolerance` are discarded.
pub fn intersect_swept_newton(ray: &Ray, segment: &CurveSegment, config: &CurveConfig) -> Option<SurfaceHit> {
    let seg = LocalSegment::new(ray, segment);
    let t_term = seg.t_term(config);
    let (lower, _) = seg.bracket()?;

    let axis = seg.p1 - seg.p0;
    let entry = seg.ray.dir * lower;
    let u_entry = ((entry - seg.p0).dot(&axis) / axis.norm_squared()).clamp(0.0, 1.0);

    let near = seg.ray.to_local_t(ray.tnear);
    let far = seg.ray.to_local_t(ray.tfar);
    let mut best: Option<SurfaceHit> = None;
    for start in [u_entry, 0.0, 1.0] {
        let Some(u) = seg.solve(start, t_term, config) else {
            continue;
        };
        let Some((t, normal)) = seg.hit_at(u, config) else {
            continue;
        };
        if !(near < t && t < far) {
            continue;
        }
        let t = seg.ray.to_ray_t(t);
        if best.map_or(true, |b| t < b.t) {
            best = Some(SurfaceHit { t, u, normal });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersect::intersect_swept;
    use approx::assert_relative_eq;
    use std::f32::consts::SQRT_2;

    fn tube() -> CurveSegment {
        CurveSegment::new(Vec3::zeros(), 0.5, Vec3::new(4.0, 0.0, 0.0), 0.5)
    }

    #[test]
    fn test_oblique_hit_on_straight_tube() {
        let ray = Ray::new(Vec3::new(1.0, 0.0, 3.0), Vec3::new(1.0, 0.0, -1.0) / SQRT_2);
        let hit = intersect_swept_newton(&ray, &tube(), &CurveConfig::default()).unwrap();
        assert_relative_eq!(hit.t, 2.5 * SQRT_2, epsilon = 1e-3);
        assert_relative_eq!(hit.u, 0.875, epsilon = 1e-3);
        assert_relative_eq!(hit.normal.normalize(), Vec3::z(), epsilon = 1e-3);
    }

    #[test]
    fn test_derivative_matches_difference() {
        let ray = Ray::new(Vec3::new(1.0, 0.3, 3.0), Vec3::new(1.0, 0.2, -1.0));
        let segment = CurveSegment::from_neighbors(
            &Vec3::new(-1.0, -1.0, 0.0),
            &Vec3::zeros(),
            &Vec3::new(4.0, 0.0, 0.0),
            &Vec3::new(5.0, 2.0, 0.0),
            0.4,
            0.7,
        );
        let seg = LocalSegment::new(&ray, &segment);
        for u in [0.1_f32, 0.4, 0.8] {
            let h = 1e-2;
            let numeric = (seg.f(u + h) - seg.f(u - h)) / (2.0 * h);
            let analytic = seg.dfdu(u);
            assert!((numeric - analytic).abs() <= 1e-2 * analytic.abs().max(1.0));
        }
    }

    #[test]
    fn test_agrees_with_march_on_bent_segment() {
        let segment = CurveSegment::from_neighbors(
            &Vec3::new(-1.0, 0.0, 0.0),
            &Vec3::zeros(),
            &Vec3::new(4.0, 0.0, 0.0),
            &Vec3::new(4.0, 4.0, 0.0),
            0.5,
            0.5,
        );
        let ray = Ray::new(Vec3::new(1.0, 0.1, 3.0), Vec3::new(0.8, 0.0, -1.0));
        let config = CurveConfig::default();
        let newton = intersect_swept_newton(&ray, &segment, &config).unwrap();
        let march = intersect_swept(&ray, &segment, &config).unwrap();
        assert_relative_eq!(newton.t, march.t, epsilon = 1e-2);
        assert_relative_eq!(newton.u, march.u, epsilon = 1e-2);
    }

    #[test]
    fn test_iteration_budget_exhausted_reports_no_hit() {
        let cone = CurveSegment::new(Vec3::zeros(), 0.2, Vec3::new(4.0, 0.0, 0.0), 0.8);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::new(1.0, 0.0, -1.0));
        let hit = intersect_swept_newton(&ray, &cone, &CurveConfig::default()).unwrap();
        assert_relative_eq!(hit.t, 2.8 / 1.15, epsilon = 1e-3);
        assert_relative_eq!(hit.u, 0.7 / 1.15, epsilon = 1e-3);

        // no start lands within tolerance after a single step
        let starved = CurveConfig {
            max_iterations: 1,
            ..Default::default()
        };
        assert!(intersect_swept_newton(&ray, &cone, &starved).is_none());
    }

    #[test]
    fn test_miss() {
        let ray = Ray::new(Vec3::new(1.0, 0.6, 3.0), Vec3::new(1.0, 0.0, -1.0));
        assert!(intersect_swept_newton(&ray, &tube(), &CurveConfig::default()).is_none());
    }

    #[test]
    fn test_grazing_rejected_by_residual() {
        // ray lies in the cross-section plane, so ns.d vanishes
        let ray = Ray::new(Vec3::new(2.0, 0.0, 3.0), -Vec3::z());
        assert!(intersect_swept_newton(&ray, &tube(), &CurveConfig::default()).is_none());
    }
}
