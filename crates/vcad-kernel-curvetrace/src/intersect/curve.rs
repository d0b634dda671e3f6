//! Curve segments, segment batches and the leaf intersector.

use vcad_kernel_math::{normalize_safe, xyz, Aabb3, Vec3, Vec4};

use super::{
    intersect_cone, intersect_flat, intersect_sphere, intersect_swept, intersect_swept_newton, Candidates, Hit,
    LocalRay, PrimitiveIntersector, SurfaceHit,
};
use crate::config::{CurveConfig, CurveGeometry};
use crate::error::Result;
use crate::mask::{LaneMask, MAX_LANES};
use crate::ray::{Ray, RayPrecalc};

/// One piece of a round curve.
///
/// Endpoints carry their radius in `w`. The joint normals `n0` and `n1`
/// orient the end cross-sections for the swept surface models; the
/// capsule and flat models ignore them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSegment {
    /// First endpoint and radius.
    pub p0: Vec4,
    /// Second endpoint and radius.
    pub p1: Vec4,
    /// Cross-section normal at `p0`.
    pub n0: Vec3,
    /// Cross-section normal at `p1`.
    pub n1: Vec3,
}

impl CurveSegment {
    /// Segment with cross-sections perpendicular to its axis.
    pub fn new(a: Vec3, r0: f32, b: Vec3, r1: f32) -> Self {
        let n = normalize_safe(&(b - a));
        Self {
            p0: Vec4::new(a.x, a.y, a.z, r0),
            p1: Vec4::new(b.x, b.y, b.z, r1),
            n0: n,
            n1: n,
        }
    }

    /// Segment from `a` to `b` of a polyline, with joint normals bisecting
    /// the neighboring segments.
    pub fn from_neighbors(prev: &Vec3, a: &Vec3, b: &Vec3, next: &Vec3, r0: f32, r1: f32) -> Self {
        let ab = normalize_safe(&(b - a));
        Self {
            p0: Vec4::new(a.x, a.y, a.z, r0),
            p1: Vec4::new(b.x, b.y, b.z, r1),
            n0: normalize_safe(&(a - prev)) + ab,
            n1: ab + normalize_safe(&(next - b)),
        }
    }

    /// Box containing the segment for every surface model.
    pub fn bounds(&self) -> Aabb3 {
        let r = self.p0.w.max(self.p1.w);
        let mut bounds = Aabb3::empty();
        bounds.include_point(&xyz(&self.p0));
        bounds.include_point(&xyz(&self.p1));
        bounds.expand(r);
        bounds
    }
}

/// Up to `M` segments stored field by field, tested together.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveBatch<const M: usize> {
    /// First endpoints and radii.
    pub p0: [Vec4; M],
    /// Second endpoints and radii.
    pub p1: [Vec4; M],
    /// Normals at `p0`.
    pub n0: [Vec3; M],
    /// Normals at `p1`.
    pub n1: [Vec3; M],
    /// Primitive identifiers reported with hits.
    pub prim_ids: [u32; M],
    /// Occupied lanes.
    pub valid: LaneMask,
}

impl<const M: usize> CurveBatch<M> {
    /// An empty batch.
    pub fn new() -> Self {
        assert!(M <= MAX_LANES, "batch width {M} exceeds {MAX_LANES}");
        Self {
            p0: [Vec4::zeros(); M],
            p1: [Vec4::zeros(); M],
            n0: [Vec3::zeros(); M],
            n1: [Vec3::zeros(); M],
            prim_ids: [0; M],
            valid: LaneMask::EMPTY,
        }
    }

    /// Store `segment` in the next free lane; false when full.
    pub fn push(&mut self, segment: &CurveSegment, prim_id: u32) -> bool {
        let i = self.len();
        if i == M {
            return false;
        }
        self.p0[i] = segment.p0;
        self.p1[i] = segment.p1;
        self.n0[i] = segment.n0;
        self.n1[i] = segment.n1;
        self.prim_ids[i] = prim_id;
        self.valid.set(i);
        true
    }

    /// Occupied lanes.
    pub fn len(&self) -> usize {
        self.valid.count()
    }

    /// True when no lane is occupied.
    pub fn is_empty(&self) -> bool {
        self.valid.none()
    }

    /// The segment in lane `i`.
    pub fn segment(&self, i: usize) -> CurveSegment {
        CurveSegment {
            p0: self.p0[i],
            p1: self.p1[i],
            n0: self.n0[i],
            n1: self.n1[i],
        }
    }

    /// Union of the occupied segments' bounds.
    pub fn bounds(&self) -> Aabb3 {
        let mut bounds = Aabb3::empty();
        for i in self.valid {
            bounds.include_aabb(&self.segment(i).bounds());
        }
        bounds
    }
}

impl<const M: usize> Default for CurveBatch<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Intersects rays with [`CurveBatch`]es using the configured surface model.
#[derive(Debug, Clone, Default)]
pub struct CurveIntersector<const M: usize> {
    config: CurveConfig,
}

impl<const M: usize> CurveIntersector<M> {
    /// Create an intersector after validating `config`.
    pub fn new(config: CurveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active settings.
    pub fn config(&self) -> &CurveConfig {
        &self.config
    }

    /// Lanes that can possibly be hit: occupied, non-degenerate and with
    /// the ray passing the segment axis within the larger radius.
    fn prefilter(&self, ray: &Ray, batch: &CurveBatch<M>) -> LaneMask {
        batch.valid
            & LaneMask::from_fn(M, |i| {
                let a = xyz(&batch.p0[i]);
                let axis = xyz(&batch.p1[i]) - a;
                let n = normalize_safe(&axis.cross(&ray.dir));
                let r = batch.p0[i].w.max(batch.p1[i].w);
                axis != Vec3::zeros() && (ray.org - a).dot(&n).abs() <= r
            })
    }

    /// Cone body clipped to the segment, capped by endpoint spheres.
    fn capsule(&self, ray: &Ray, batch: &CurveBatch<M>, valid: LaneMask, out: &mut Candidates<M>) {
        let zero = Vec3::zeros();
        for i in valid {
            let (a, b) = (xyz(&batch.p0[i]), xyz(&batch.p1[i]));
            let (r0, r1) = (batch.p0[i].w, batch.p1[i].w);
            let local = LocalRay::centered(ray, &((a + b) * 0.5));
            let (a, b) = (a - local.org, b - local.org);
            let d = local.dir;
            let near = local.to_local_t(ray.tnear);
            let far = local.to_local_t(ray.tfar);

            let mut best: Option<(f32, f32, Vec3)> = None;
            let mut offer = |t: f32, u: f32, normal: Vec3| {
                if near < t && t < far && best.map_or(true, |(bt, _, _)| t < bt) {
                    best = Some((t, u, normal));
                }
            };
            if let Some(hit) = intersect_cone(&zero, &d, &a, r0, &b, r1) {
                if (0.0..=1.0).contains(&hit.u) {
                    offer(hit.t, hit.u, hit.normal);
                }
            }
            if let Some([t, _]) = intersect_sphere(&zero, &d, &a, r0) {
                offer(t, 0.0, d * t - a);
            }
            if let Some([t, _]) = intersect_sphere(&zero, &d, &b, r1) {
                offer(t, 1.0, d * t - b);
            }
            if let Some((t, u, normal)) = best {
                out.set(i, local.to_ray_t(t), u, normal);
            }
        }
    }

    fn per_segment<F>(&self, batch: &CurveBatch<M>, valid: LaneMask, out: &mut Candidates<M>, mut solve: F)
    where
        F: FnMut(&CurveSegment) -> Option<SurfaceHit>,
    {
        for i in valid {
            if let Some(hit) = solve(&batch.segment(i)) {
                out.set(i, hit.t, hit.u, hit.normal);
            }
        }
    }
}

impl<const M: usize> PrimitiveIntersector for CurveIntersector<M> {
    type Primitive = CurveBatch<M>;
    type Precalc = RayPrecalc;

    fn precalculate(&self, ray: &Ray) -> RayPrecalc {
        RayPrecalc::new(ray)
    }

    fn intersect<F>(&self, pre: &RayPrecalc, ray: &Ray, batch: &CurveBatch<M>, epilogue: F) -> bool
    where
        F: FnMut(&Hit) -> bool,
    {
        let valid = self.prefilter(ray, batch);
        if valid.none() {
            return false;
        }

        let mut candidates = Candidates::new();
        let config = &self.config;
        match config.geometry {
            CurveGeometry::Capsule => self.capsule(ray, batch, valid, &mut candidates),
            CurveGeometry::Swept => {
                self.per_segment(batch, valid, &mut candidates, |s| intersect_swept(ray, s, config))
            }
            CurveGeometry::SweptNewton => {
                self.per_segment(batch, valid, &mut candidates, |s| intersect_swept_newton(ray, s, config))
            }
            CurveGeometry::Flat => self.per_segment(batch, valid, &mut candidates, |s| intersect_flat(ray, pre, s)),
        }
        candidates.clip(ray);
        candidates.report(&batch.prim_ids, epilogue)
    }
}
