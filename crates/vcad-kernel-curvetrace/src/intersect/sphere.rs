//! Ray-sphere intersection (quadratic equation).

use vcad_kernel_math::Vec3;

/// Intersect the line `org + t * dir` with a sphere.
///
/// Returns both roots `[near, far]`, unclipped. The geometric normal at a
/// root is `org + t * dir - center`.
pub fn intersect_sphere(org: &Vec3, dir: &Vec3, center: &Vec3, radius: f32) -> Option<[f32; 2]> {
    let o = org - center;

    // Quadratic: |o + t*d|^2 = r^2
    let a = dir.dot(dir);
    let b = 2.0 * dir.dot(&o);
    let c = o.dot(&o) - radius * radius;

    let disc = b * b - 4.0 * a * c;
    if !(disc >= 0.0) {
        return None;
    }
    let q = disc.sqrt();
    let rcp_2a = 1.0 / (2.0 * a);
    Some([(-b - q) * rcp_2a, (-b + q) * rcp_2a])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_through_center() {
        let [t0, t1] = intersect_sphere(
            &Vec3::new(-10.0, 0.0, 0.0),
            &Vec3::x(),
            &Vec3::zeros(),
            5.0,
        )
        .unwrap();
        assert_relative_eq!(t0, 5.0, epsilon = 1e-5);
        assert_relative_eq!(t1, 15.0, epsilon = 1e-5);
    }

    #[test]
    fn test_scaled_direction() {
        let [t0, _] = intersect_sphere(
            &Vec3::new(-10.0, 0.0, 0.0),
            &Vec3::new(2.0, 0.0, 0.0),
            &Vec3::zeros(),
            5.0,
        )
        .unwrap();
        assert_relative_eq!(t0, 2.5, epsilon = 1e-5);
    }

    #[test]
    fn test_miss() {
        assert!(intersect_sphere(
            &Vec3::new(-10.0, 10.0, 0.0),
            &Vec3::x(),
            &Vec3::zeros(),
            5.0
        )
        .is_none());
    }

    #[test]
    fn test_nan_direction_misses() {
        let dir = Vec3::new(f32::NAN, 0.0, 0.0);
        assert!(intersect_sphere(&Vec3::zeros(), &dir, &Vec3::x(), 1.0).is_none());
    }
}
