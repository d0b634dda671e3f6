//! Rays, ray packets and per-ray precalculations.

use vcad_kernel_math::{rcp_vec, Aabb3, Frame, Vec3, ULP};

use crate::mask::{LaneMask, MAX_LANES};

/// Lower rounding factor for robust interval tests.
pub(crate) const ROUND_DOWN: f32 = 1.0 - 2.0 * ULP;
/// Upper rounding factor for robust interval tests.
pub(crate) const ROUND_UP: f32 = 1.0 + 2.0 * ULP;

/// A ray with a parametric validity interval `[tnear, tfar]`.
///
/// The direction need not be normalized; hit distances are expressed in
/// units of the direction vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin point.
    pub org: Vec3,
    /// Direction.
    pub dir: Vec3,
    /// Start of the valid interval.
    pub tnear: f32,
    /// End of the valid interval; shrinks as closer hits are accepted.
    pub tfar: f32,
}

impl Ray {
    /// Create a ray valid on `[0, +inf)`.
    pub fn new(org: Vec3, dir: Vec3) -> Self {
        Self::with_range(org, dir, 0.0, f32::INFINITY)
    }

    /// Create a ray with an explicit interval.
    pub fn with_range(org: Vec3, dir: Vec3, tnear: f32, tfar: f32) -> Self {
        Self {
            org,
            dir,
            tnear,
            tfar,
        }
    }

    /// Evaluate the ray at parameter `t`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.org + self.dir * t
    }

    /// Reciprocal direction.
    #[inline]
    pub fn rdir(&self) -> Vec3 {
        rcp_vec(&self.dir)
    }

    /// Slab test against a box, clipped to the ray interval.
    ///
    /// Returns the entry distance if the box overlaps `[tnear, tfar]`.
    pub fn intersect_aabb(&self, aabb: &Aabb3, robust: bool) -> Option<f32> {
        intersect_slab(
            &self.org,
            &self.rdir(),
            &aabb.min,
            &aabb.max,
            self.tnear,
            self.tfar,
            robust,
        )
    }
}

/// Sign-selected slab test shared by single-ray traversal and per-lane
/// packet tests.
#[inline]
pub(crate) fn intersect_slab(
    org: &Vec3,
    rdir: &Vec3,
    lower: &Vec3,
    upper: &Vec3,
    tnear: f32,
    tfar: f32,
    robust: bool,
) -> Option<f32> {
    let mut t0 = tnear;
    let mut t1 = tfar;
    for axis in 0..3 {
        let (near, far) = if rdir[axis] >= 0.0 {
            (lower[axis], upper[axis])
        } else {
            (upper[axis], lower[axis])
        };
        t0 = t0.max((near - org[axis]) * rdir[axis]);
        t1 = t1.min((far - org[axis]) * rdir[axis]);
    }
    let hit = if robust {
        ROUND_DOWN * t0 <= ROUND_UP * t1
    } else {
        t0 <= t1
    };
    if hit {
        Some(if robust { ROUND_DOWN * t0 } else { t0 })
    } else {
        None
    }
}

/// `K` independent rays with a validity mask, stored lane-major.
#[derive(Debug, Clone)]
pub struct RayPacket<const K: usize> {
    /// Origins per lane.
    pub org: [Vec3; K],
    /// Directions per lane.
    pub dir: [Vec3; K],
    /// Interval starts per lane.
    pub tnear: [f32; K],
    /// Interval ends per lane.
    pub tfar: [f32; K],
    /// Lanes carrying a ray.
    pub valid: LaneMask,
}

impl<const K: usize> RayPacket<K> {
    /// An empty packet with no valid lanes.
    pub fn new() -> Self {
        assert!(K <= MAX_LANES, "packet width {K} exceeds {MAX_LANES}");
        Self {
            org: [Vec3::zeros(); K],
            dir: [Vec3::zeros(); K],
            tnear: [0.0; K],
            tfar: [f32::NEG_INFINITY; K],
            valid: LaneMask::EMPTY,
        }
    }

    /// Fill lanes `0..rays.len()` from single rays.
    pub fn from_rays(rays: &[Ray]) -> Self {
        assert!(rays.len() <= K, "{} rays do not fit a {K}-wide packet", rays.len());
        let mut packet = Self::new();
        for (lane, ray) in rays.iter().enumerate() {
            packet.set(lane, ray);
        }
        packet
    }

    /// Store `ray` in `lane` and mark it valid.
    pub fn set(&mut self, lane: usize, ray: &Ray) {
        self.org[lane] = ray.org;
        self.dir[lane] = ray.dir;
        self.tnear[lane] = ray.tnear;
        self.tfar[lane] = ray.tfar;
        self.valid.set(lane);
    }

    /// The ray in `lane`.
    pub fn ray(&self, lane: usize) -> Ray {
        Ray::with_range(self.org[lane], self.dir[lane], self.tnear[lane], self.tfar[lane])
    }

    /// Valid lanes with a non-empty interval.
    pub fn active(&self) -> LaneMask {
        self.valid & LaneMask::from_fn(K, |lane| self.tnear[lane] <= self.tfar[lane])
    }
}

impl<const K: usize> Default for RayPacket<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-ray data computed once before primitive tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayPrecalc {
    /// Reciprocal length of the ray direction.
    pub depth_scale: f32,
    /// Frame whose `z` axis is the normalized ray direction.
    pub ray_space: Frame,
}

impl RayPrecalc {
    /// Precalculate for `ray`.
    pub fn new(ray: &Ray) -> Self {
        let s = 1.0 / ray.dir.norm();
        Self {
            depth_scale: s,
            ray_space: Frame::from_normal(&(ray.dir * s)),
        }
    }
}

impl Default for RayPrecalc {
    fn default() -> Self {
        Self {
            depth_scale: 1.0,
            ray_space: Frame::from_normal(&Vec3::z()),
        }
    }
}
