//! Ray-primitive intersection for curve geometry.
//!
//! Closed-form solvers (sphere, cone, cylinder, half plane) are plain
//! functions over a ray that has been re-centered near the primitive.
//! [`CurveIntersector`] combines them per [`CurveGeometry`] and reports
//! candidates through an epilogue; it never writes to the ray.
//!
//! [`CurveGeometry`]: crate::config::CurveGeometry

mod cone;
mod curve;
mod cylinder;
mod fill;
mod flat;
mod newton;
mod plane;
mod sphere;

pub use cone::{intersect_cone, AxialHit};
pub use curve::{CurveBatch, CurveIntersector, CurveSegment};
pub use cylinder::intersect_cylinder;
pub use fill::intersect_swept;
pub use flat::intersect_flat;
pub use newton::intersect_swept_newton;
pub use plane::intersect_half_plane;
pub use sphere::intersect_sphere;

use vcad_kernel_math::Vec3;

use crate::mask::LaneMask;
use crate::ray::Ray;

/// A candidate intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Distance along the ray, in units of the ray direction.
    pub t: f32,
    /// Axial parameter in `[0, 1]` from the first to the second endpoint.
    pub u: f32,
    /// Secondary surface parameter; zero for curves.
    pub v: f32,
    /// Unnormalized geometric normal.
    pub normal: Vec3,
    /// Primitive identifier.
    pub prim_id: u32,
}

/// Hit of a single segment, before it is tagged with a primitive id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Distance along the ray, in units of the ray direction.
    pub t: f32,
    /// Axial parameter.
    pub u: f32,
    /// Unnormalized geometric normal.
    pub normal: Vec3,
}

/// Receives candidate hits for a packet lane and decides acceptance.
///
/// Accepted hits shrink the lane's `tfar` in intersect mode and terminate
/// the lane in occluded mode.
pub trait Epilogue {
    /// Return true to accept `hit` for `lane`.
    fn accept(&mut self, lane: usize, hit: &Hit) -> bool;
}

impl<F> Epilogue for F
where
    F: FnMut(usize, &Hit) -> bool,
{
    fn accept(&mut self, lane: usize, hit: &Hit) -> bool {
        self(lane, hit)
    }
}

/// Epilogue accepting every candidate and keeping the last accepted hit
/// per lane, which is the nearest in intersect mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHits<const K: usize> {
    /// Recorded hit per lane.
    pub hits: [Option<Hit>; K],
}

impl<const K: usize> NearestHits<K> {
    /// No hits recorded.
    pub fn new() -> Self {
        Self { hits: [None; K] }
    }
}

impl<const K: usize> Default for NearestHits<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> Epilogue for NearestHits<K> {
    fn accept(&mut self, lane: usize, hit: &Hit) -> bool {
        self.hits[lane] = Some(*hit);
        true
    }
}

/// Leaf primitive test used by the traversal engine.
pub trait PrimitiveIntersector {
    /// Primitive stored in tree leaves.
    type Primitive;
    /// Per-ray data computed once per traversal call.
    type Precalc: Copy + Default;

    /// Compute per-ray data for `ray`.
    fn precalculate(&self, ray: &Ray) -> Self::Precalc;

    /// Test `ray` against `prim`, offering candidates nearest first until
    /// `epilogue` accepts one. Returns whether a candidate was accepted.
    fn intersect<F>(&self, pre: &Self::Precalc, ray: &Ray, prim: &Self::Primitive, epilogue: F) -> bool
    where
        F: FnMut(&Hit) -> bool;
}

/// Ray with a unit direction whose origin was moved along the ray next to
/// a primitive.
///
/// Distances in local space are Euclidean and measured from the moved
/// origin; `tb` is the distance the origin was moved.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalRay {
    pub org: Vec3,
    pub dir: Vec3,
    pub tb: f32,
    len: f32,
}

impl LocalRay {
    /// Move the origin of `ray` to the projection of `center` onto it.
    pub fn centered(ray: &Ray, center: &Vec3) -> Self {
        let len = ray.dir.norm();
        let dir = ray.dir / len;
        let tb = (center - ray.org).dot(&dir);
        Self {
            org: ray.org + dir * tb,
            dir,
            tb,
            len,
        }
    }

    /// Local distance to ray parameter.
    #[inline]
    pub fn to_ray_t(&self, local: f32) -> f32 {
        (self.tb + local) / self.len
    }

    /// Ray parameter to local distance.
    #[inline]
    pub fn to_local_t(&self, t: f32) -> f32 {
        t * self.len - self.tb
    }
}

/// Per-lane candidates of a primitive batch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidates<const M: usize> {
    pub t: [f32; M],
    pub u: [f32; M],
    pub normal: [Vec3; M],
    pub valid: LaneMask,
}

impl<const M: usize> Candidates<M> {
    pub fn new() -> Self {
        Self {
            t: [f32::INFINITY; M],
            u: [0.0; M],
            normal: [Vec3::zeros(); M],
            valid: LaneMask::EMPTY,
        }
    }

    pub fn set(&mut self, lane: usize, t: f32, u: f32, normal: Vec3) {
        self.t[lane] = t;
        self.u[lane] = u;
        self.normal[lane] = normal;
        self.valid.set(lane);
    }

    /// Drop lanes whose distance lies outside the open ray interval.
    pub fn clip(&mut self, ray: &Ray) {
        let t = &self.t;
        self.valid &= LaneMask::from_fn(M, |i| ray.tnear < t[i] && t[i] < ray.tfar);
    }

    /// Offer valid lanes nearest first until one is accepted.
    pub fn report<F>(&mut self, prim_ids: &[u32; M], mut epilogue: F) -> bool
    where
        F: FnMut(&Hit) -> bool,
    {
        while self.valid.any() {
            let mut nearest = None;
            for i in self.valid {
                if nearest.map_or(true, |n: usize| self.t[i] < self.t[n]) {
                    nearest = Some(i);
                }
            }
            let Some(i) = nearest else { break };
            let hit = Hit {
                t: self.t[i],
                u: self.u[i],
                v: 0.0,
                normal: self.normal[i],
                prim_id: prim_ids[i],
            };
            if epilogue(&hit) {
                return true;
            }
            self.valid.clear(i);
        }
        false
    }
}
