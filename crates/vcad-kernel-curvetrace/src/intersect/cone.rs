//! Ray-cone intersection for linearly varying radius.

use vcad_kernel_math::{sqr, Vec3};

/// Roots of a ray against an axial surface of revolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxialHit {
    /// Near root.
    pub t: f32,
    /// Far root.
    pub t_exit: f32,
    /// Axial parameter at the near root, unclipped.
    pub u: f32,
    /// Geometric normal at the near root.
    pub normal: Vec3,
}

/// Intersect the line `org + t * dir` with the infinite cone through
/// `p0` with radius `r0` and `p1` with radius `r1`.
///
/// The radius varies linearly along the axis and `u` measures the axial
/// position of the near root (0 at `p0`, 1 at `p1`). Callers clip `u` and
/// `t`. Zero-length axes and negative discriminants yield `None`.
pub fn intersect_cone(org: &Vec3, dir: &Vec3, p0: &Vec3, r0: f32, p1: &Vec3, r1: f32) -> Option<AxialHit> {
    let axis = p1 - p0;
    let rl = 1.0 / axis.norm();
    if !rl.is_finite() {
        return None;
    }
    let dp = axis * rl;
    let dr = (r1 - r0) * rl;
    let o = org - p0;

    let dodo = dir.dot(dir);
    let odo = dir.dot(&o);
    let oo = o.dot(&o);
    let doz = dp.dot(dir);
    let oz = dp.dot(&o);

    // Quadratic: |o + t*d|^2 - (oz + t*doz)^2 = R(oz + t*doz)^2
    let r = r0 + oz * dr;
    let a = dodo - sqr(doz) * (1.0 + sqr(dr));
    let b = 2.0 * (odo - doz * (oz + r * dr));
    let c = oo - (sqr(oz) + sqr(r));

    let disc = b * b - 4.0 * a * c;
    if !(disc >= 0.0) {
        return None;
    }
    let q = disc.sqrt();
    let rcp_2a = 1.0 / (2.0 * a);
    let (t0, t1) = {
        let ta = (-b - q) * rcp_2a;
        let tb = (-b + q) * rcp_2a;
        if ta <= tb {
            (ta, tb)
        } else {
            (tb, ta)
        }
    };
    if !t0.is_finite() {
        return None;
    }

    let z = oz + t0 * doz;
    let radial = o + dir * t0 - dp * z;
    Some(AxialHit {
        t: t0,
        t_exit: t1,
        u: z * rl,
        normal: radial - dp * ((r0 + z * dr) * dr),
    })
}
