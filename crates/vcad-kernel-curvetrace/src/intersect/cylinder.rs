//! Ray-cylinder intersection.

use vcad_kernel_math::{sqr, Vec3};

use super::AxialHit;

/// Intersect the line `org + t * dir` with the infinite cylinder of
/// `radius` around the axis through `p0` and `p1`.
///
/// `u` is the axial position of the near root, 0 at `p0` and 1 at `p1`.
pub fn intersect_cylinder(org: &Vec3, dir: &Vec3, p0: &Vec3, p1: &Vec3, radius: f32) -> Option<AxialHit> {
    let axis = p1 - p0;
    let rl = 1.0 / axis.norm();
    if !rl.is_finite() {
        return None;
    }
    let dp = axis * rl;
    let o = org - p0;

    let doz = dp.dot(dir);
    let oz = dp.dot(&o);

    // Quadratic: |o + t*d|^2 - (oz + t*doz)^2 = r^2
    let a = dir.dot(dir) - sqr(doz);
    let b = 2.0 * (dir.dot(&o) - doz * oz);
    let c = o.dot(&o) - (sqr(oz) + sqr(radius));

    let disc = b * b - 4.0 * a * c;
    if !(disc >= 0.0) {
        return None;
    }
    let q = disc.sqrt();
    let t = (-b - q) / (2.0 * a);
    let t_exit = (-b + q) / (2.0 * a);
    if !t.is_finite() {
        // parallel to the axis
        return None;
    }

    let z = oz + t * doz;
    Some(AxialHit {
        t,
        t_exit,
        u: z * rl,
        normal: o + dir * t - dp * z,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersect::intersect_cone;
    use approx::assert_relative_eq;

    #[test]
    fn test_perpendicular_hit() {
        let hit = intersect_cylinder(
            &Vec3::new(1.0, 0.0, 5.0),
            &-Vec3::z(),
            &Vec3::zeros(),
            &Vec3::new(4.0, 0.0, 0.0),
            0.5,
        )
        .unwrap();
        assert_relative_eq!(hit.t, 4.5, epsilon = 1e-5);
        assert_relative_eq!(hit.t_exit, 5.5, epsilon = 1e-5);
        assert_relative_eq!(hit.u, 0.25, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.normalize(), Vec3::z(), epsilon = 1e-5);
    }

    #[test]
    fn test_parallel_to_axis() {
        assert!(intersect_cylinder(&Vec3::new(-1.0, 0.1, 0.0), &Vec3::x(), &Vec3::zeros(), &Vec3::x(), 0.5).is_none());
    }

    #[test]
    fn test_cone_converges_to_cylinder() {
        let org = Vec3::new(0.3, -4.0, 2.0);
        let dir = Vec3::new(0.1, 1.0, -0.4);
        let p0 = Vec3::new(-1.0, 0.0, 0.0);
        let p1 = Vec3::new(2.0, 0.5, 0.0);
        let cyl = intersect_cylinder(&org, &dir, &p0, &p1, 0.6).unwrap();
        for eps in [1e-2_f32, 1e-3] {
            let cone = intersect_cone(&org, &dir, &p0, 0.6, &p1, 0.6 + eps).unwrap();
            assert!((cone.t - cyl.t).abs() < 10.0 * eps);
        }
        let cone = intersect_cone(&org, &dir, &p0, 0.6, &p1, 0.6).unwrap();
        assert_relative_eq!(cone.t, cyl.t, epsilon = 1e-4);
        assert_relative_eq!(cone.u, cyl.u, epsilon = 1e-4);
    }
}
