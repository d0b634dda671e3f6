//! Hybrid packet traversal.
//!
//! A packet walks the tree as a unit while its rays stay coherent: the
//! [`Frustum`] culls children for all active lanes at once and the lanes
//! that still need a subtree travel with it on the stack. In incoherent
//! mode each approved child is also tested per lane. A child the frustum
//! approved but at most `divergent_lane_limit` lanes actually hit counts as
//! an incoherent visit for those lanes; a lane whose count exceeds the
//! switch threshold leaves the packet for good and finishes with
//! single-ray walks started from the pending stack items that carry it.

use std::fmt;

use log::{debug, trace};
use vcad_kernel_math::{rcp_vec, Vec3};

use super::frustum::Frustum;
use super::node::NodeRef;
use super::stack::{StackItem, TraversalStack};
use super::store::NodeStore;
use crate::config::TraversalConfig;
use crate::error::{CurveTraceError, Result};
use crate::intersect::{Epilogue, PrimitiveIntersector};
use crate::mask::LaneMask;
use crate::ray::{intersect_slab, Ray, RayPacket};

/// Caller hint about the directional coherence of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coherence {
    /// Near-parallel rays such as primary camera rays; the packet is never
    /// split.
    Coherent,
    /// Arbitrary rays; lanes may leave the packet.
    #[default]
    Incoherent,
}

/// Work counters of one traversal call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Internal nodes whose children were tested.
    pub nodes_visited: usize,
    /// Leaves whose primitives were tested.
    pub leaves_visited: usize,
    /// Non-empty children rejected by the frustum.
    pub frustum_rejections: usize,
    /// Lanes moved from the packet to single-ray traversal.
    pub lanes_switched: usize,
    /// Single-ray walks started.
    pub single_dispatches: usize,
    /// Ray-primitive tests.
    pub primitive_tests: usize,
    /// Lanes moved to single-ray traversal.
    pub switched: LaneMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    Intersect,
    Occluded,
}

/// Traversal engine over a node store of fan-out `N`.
pub struct HybridIntersector<'a, const N: usize, I: PrimitiveIntersector> {
    pub(super) store: &'a NodeStore<N, I::Primitive>,
    pub(super) prim: &'a I,
    pub(super) config: TraversalConfig,
}

impl<const N: usize, I: PrimitiveIntersector> fmt::Debug for HybridIntersector<'_, N, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridIntersector")
            .field("nodes", &self.store.node_count())
            .field("depth", &self.store.depth())
            .field("config", &self.config)
            .finish()
    }
}

impl<'a, const N: usize, I: PrimitiveIntersector> HybridIntersector<'a, N, I> {
    /// Create an engine after validating `config` against `store`.
    pub fn new(store: &'a NodeStore<N, I::Primitive>, prim: &'a I, config: TraversalConfig) -> Result<Self> {
        config.validate()?;
        if store.depth() > config.max_depth {
            return Err(CurveTraceError::TreeTooDeep {
                depth: store.depth(),
                max_depth: config.max_depth,
            });
        }
        Ok(Self { store, prim, config })
    }

    /// Active settings.
    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    /// A stack sized for this engine's trees.
    pub fn stack(&self) -> TraversalStack {
        TraversalStack::new(N, self.config.max_depth)
    }

    /// Find the nearest accepted hit of every active lane.
    ///
    /// Accepted hits shrink `packet.tfar`; `sink` sees every candidate
    /// closer than the lane's current `tfar`.
    pub fn intersect<const K: usize>(
        &self,
        packet: &mut RayPacket<K>,
        coherence: Coherence,
        stack: &mut TraversalStack,
        sink: &mut impl Epilogue,
    ) -> TraversalStats {
        self.traverse(packet, coherence, stack, sink, Mode::Intersect).1
    }

    /// Find the lanes with any accepted hit; `packet` is not modified.
    pub fn occluded<const K: usize>(
        &self,
        packet: &RayPacket<K>,
        coherence: Coherence,
        stack: &mut TraversalStack,
        sink: &mut impl Epilogue,
    ) -> (LaneMask, TraversalStats) {
        let mut packet = packet.clone();
        self.traverse(&mut packet, coherence, stack, sink, Mode::Occluded)
    }

    fn traverse<const K: usize, E: Epilogue>(
        &self,
        packet: &mut RayPacket<K>,
        coherence: Coherence,
        stack: &mut TraversalStack,
        sink: &mut E,
        mode: Mode,
    ) -> (LaneMask, TraversalStats) {
        let mut stats = TraversalStats::default();
        let mut terminated = LaneMask::EMPTY;
        let mut active = packet.active();
        let root = self.store.root();
        if active.none() || root.is_empty() {
            return (terminated, stats);
        }

        let robust = self.config.robust;
        let threshold = match coherence {
            Coherence::Coherent => 0,
            Coherence::Incoherent => self.config.switch_threshold_for(N, K),
        };
        let limit = self.config.divergent_lane_limit;
        let pre: [I::Precalc; K] = std::array::from_fn(|k| {
            if active.contains(k) {
                self.prim.precalculate(&packet.ray(k))
            } else {
                Default::default()
            }
        });
        let rdir: [Vec3; K] = std::array::from_fn(|k| rcp_vec(&packet.dir[k]));

        let mut single = LaneMask::EMPTY;
        if coherence == Coherence::Incoherent && active.count() < self.config.min_packet_lanes {
            debug!(
                "{} active lanes below packet minimum {}, tracing single rays",
                active.count(),
                self.config.min_packet_lanes
            );
            single = active;
            active = LaneMask::EMPTY;
        }
        let mut frustum = active.any().then(|| Frustum::new(packet, &rdir, active, robust));
        let mut visits = [0usize; K];

        stack.clear();
        let lanes = active | single;
        stack.push(StackItem {
            node: root,
            dist: lanes.reduce_min(&packet.tnear).min(0.0),
            lanes,
        });

        while let Some(item) = stack.pop() {
            let packet_lanes = within(item.lanes & active, item.dist, &packet.tfar);
            let single_lanes = within(item.lanes & single, item.dist, &packet.tfar);

            for k in single_lanes {
                stats.single_dispatches += 1;
                let mut ray = packet.ray(k);
                let mark = stack.begin_walk();
                let hit = self.walk_single(&mut ray, &pre[k], k, item.node, item.dist, stack, sink, mode, &mut stats);
                stack.end_walk(mark);
                packet.tfar[k] = ray.tfar;
                if hit && mode == Mode::Occluded {
                    terminated.set(k);
                    single.clear(k);
                }
            }

            if packet_lanes.any() {
                if item.node.is_leaf() {
                    stats.leaves_visited += 1;
                    let accepted = self.intersect_leaf(packet, packet_lanes, &pre, item.node, sink, mode, &mut stats);
                    if accepted.any() {
                        match mode {
                            Mode::Occluded => {
                                terminated |= accepted;
                                active &= !accepted;
                                frustum = active.any().then(|| Frustum::new(packet, &rdir, active, robust));
                            }
                            Mode::Intersect => {
                                if let (true, Some(f)) = (self.config.update_max_dist, frustum.as_mut()) {
                                    f.update_max_dist(&packet.tfar, active);
                                }
                            }
                        }
                    }
                } else if let Some(f) = frustum.as_ref() {
                    stats.nodes_visited += 1;
                    let node = self.store.children(item.node);
                    let (approved, dist) = f.intersect(node);
                    stats.frustum_rejections += (0..N)
                        .filter(|&slot| !approved.contains(slot) && !node.children[slot].is_empty())
                        .count();

                    let mut children = [StackItem::EMPTY; N];
                    let mut count = 0;
                    for slot in approved {
                        let lanes = match coherence {
                            Coherence::Coherent => packet_lanes,
                            Coherence::Incoherent => {
                                let lower = node.lower(slot);
                                let upper = node.upper(slot);
                                let hit = LaneMask::from_fn(K, |k| {
                                    packet_lanes.contains(k)
                                        && intersect_slab(
                                            &packet.org[k],
                                            &rdir[k],
                                            &lower,
                                            &upper,
                                            packet.tnear[k],
                                            packet.tfar[k],
                                            robust,
                                        )
                                        .is_some()
                                });
                                if hit.none() {
                                    continue;
                                }
                                if threshold > 0 && hit.count() <= limit && active.count() > limit {
                                    for k in hit {
                                        visits[k] += 1;
                                    }
                                }
                                hit
                            }
                        };
                        children[count] = StackItem {
                            node: node.children[slot],
                            dist: dist[slot],
                            lanes,
                        };
                        count += 1;
                    }

                    if threshold > 0 {
                        let leaving = active & LaneMask::from_fn(K, |k| visits[k] > threshold);
                        if leaving.any() {
                            debug!("lanes {leaving:?} leave the packet after more than {threshold} incoherent visits");
                            active &= !leaving;
                            single |= leaving;
                            stats.lanes_switched += leaving.count();
                            stats.switched |= leaving;
                            frustum = active.any().then(|| Frustum::new(packet, &rdir, active, robust));
                        }
                    }
                    stack.push_nearest_first(&mut children[..count]);
                }
            }

            if mode == Mode::Occluded && (active | single).none() {
                break;
            }
        }
        stack.clear();

        trace!("{mode:?} traversal of {K} lanes finished: {stats:?}");
        (terminated, stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn intersect_leaf<const K: usize, E: Epilogue>(
        &self,
        packet: &mut RayPacket<K>,
        lanes: LaneMask,
        pre: &[I::Precalc; K],
        leaf: NodeRef,
        sink: &mut E,
        mode: Mode,
        stats: &mut TraversalStats,
    ) -> LaneMask {
        let mut accepted = LaneMask::EMPTY;
        for k in lanes {
            let mut ray = packet.ray(k);
            if self.intersect_leaf1(&mut ray, &pre[k], k, leaf, sink, mode, stats) {
                accepted.set(k);
            }
            packet.tfar[k] = ray.tfar;
        }
        accepted
    }

    /// Test every primitive of `leaf`; returns whether a hit was accepted.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn intersect_leaf1<E: Epilogue>(
        &self,
        ray: &mut Ray,
        pre: &I::Precalc,
        lane: usize,
        leaf: NodeRef,
        sink: &mut E,
        mode: Mode,
        stats: &mut TraversalStats,
    ) -> bool {
        let mut any = false;
        for prim in self.store.leaf_primitives(leaf) {
            stats.primitive_tests += 1;
            let snapshot = *ray;
            let mut tfar = ray.tfar;
            let accepted = self.prim.intersect(pre, &snapshot, prim, |hit| {
                if !(snapshot.tnear < hit.t && hit.t < tfar) || !sink.accept(lane, hit) {
                    return false;
                }
                if mode == Mode::Intersect {
                    tfar = hit.t;
                }
                true
            });
            if accepted {
                any = true;
                ray.tfar = tfar;
                if mode == Mode::Occluded {
                    break;
                }
            }
        }
        any
    }
}

/// Lanes of `lanes` whose interval still reaches `dist`.
#[inline]
fn within<const K: usize>(lanes: LaneMask, dist: f32, tfar: &[f32; K]) -> LaneMask {
    lanes & LaneMask::from_fn(K, |k| dist <= tfar[k])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::testing::{brute_force, build_tree, grid_segments};
    use crate::config::{CurveConfig, CurveGeometry};
    use crate::intersect::{CurveBatch, CurveIntersector, CurveSegment, Hit, NearestHits};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    type Store = NodeStore<4, CurveBatch<4>>;

    fn random_scene(rng: &mut StdRng, count: usize) -> Vec<CurveSegment> {
        (0..count)
            .map(|_| {
                let a = Vec3::new(rng.gen_range(-8.0..8.0), rng.gen_range(-8.0..8.0), rng.gen_range(-2.0..2.0));
                let d = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
                CurveSegment::new(a, rng.gen_range(0.05..0.3), a + d, rng.gen_range(0.05..0.3))
            })
            .collect()
    }

    /// Rays from above the scene aimed into the (+x, +y, -z) octant.
    fn random_packet<const K: usize>(rng: &mut StdRng) -> RayPacket<K> {
        let mut packet = RayPacket::new();
        for k in 0..K {
            let org = Vec3::new(rng.gen_range(-9.0..0.0), rng.gen_range(-9.0..0.0), 6.0);
            let dir = Vec3::new(rng.gen_range(0.0..0.6), rng.gen_range(0.0..0.6), -1.0);
            packet.set(k, &Ray::new(org, dir));
        }
        packet
    }

    fn curves(geometry: CurveGeometry) -> CurveIntersector<4> {
        CurveIntersector::new(CurveConfig {
            geometry,
            ..Default::default()
        })
        .unwrap()
    }

    fn assert_same_hit(got: Option<Hit>, want: Option<Hit>) {
        match (got, want) {
            (None, None) => {}
            (Some(g), Some(w)) => {
                assert_relative_eq!(g.t, w.t, epsilon = 1e-4);
                assert_eq!(g.prim_id, w.prim_id);
            }
            other => panic!("hit mismatch: {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_deep_tree() {
        let mut store = Store::new();
        let leaf = store.push_leaf([CurveBatch::new()]);
        store.set_root(leaf, Default::default(), 40);
        let prim = curves(CurveGeometry::Capsule);
        let err = HybridIntersector::new(&store, &prim, TraversalConfig::default()).unwrap_err();
        assert!(matches!(err, CurveTraceError::TreeTooDeep { depth: 40, max_depth: 32 }));
    }

    #[test]
    fn test_empty_tree_and_empty_packet() {
        let store = Store::new();
        let prim = curves(CurveGeometry::Capsule);
        let engine = HybridIntersector::new(&store, &prim, TraversalConfig::default()).unwrap();
        let mut stack = engine.stack();
        let mut packet = RayPacket::<4>::from_rays(&[Ray::new(Vec3::zeros(), Vec3::x())]);
        let stats = engine.intersect(&mut packet, Coherence::Incoherent, &mut stack, &mut NearestHits::<4>::new());
        assert_eq!(stats, TraversalStats::default());

        let segments = grid_segments(4, 1.0, 0.2);
        let store: Store = build_tree(&segments);
        let engine = HybridIntersector::new(&store, &prim, TraversalConfig::default()).unwrap();
        let mut packet = RayPacket::<4>::new();
        let stats = engine.intersect(&mut packet, Coherence::Incoherent, &mut stack, &mut NearestHits::<4>::new());
        assert_eq!(stats.nodes_visited, 0);
    }

    #[test]
    fn test_intersect_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(1);
        for geometry in [CurveGeometry::Capsule, CurveGeometry::Swept, CurveGeometry::Flat] {
            let segments = random_scene(&mut rng, 300);
            let store: Store = build_tree(&segments);
            let prim = curves(geometry);
            for robust in [false, true] {
                let config = TraversalConfig {
                    robust,
                    ..Default::default()
                };
                let engine = HybridIntersector::new(&store, &prim, config).unwrap();
                let mut stack = engine.stack();
                for _ in 0..20 {
                    let mut packet = random_packet::<8>(&mut rng);
                    let original = packet.clone();
                    let mut sink = NearestHits::<8>::new();
                    engine.intersect(&mut packet, Coherence::Incoherent, &mut stack, &mut sink);
                    for k in 0..8 {
                        let want = brute_force(store.primitives(), &prim, &original.ray(k));
                        assert_same_hit(sink.hits[k], want);
                        match want {
                            Some(hit) => assert_relative_eq!(packet.tfar[k], hit.t, epsilon = 1e-4),
                            None => assert_eq!(packet.tfar[k], f32::INFINITY),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_occluded_iff_intersect_hits() {
        let mut rng = StdRng::seed_from_u64(2);
        let segments = random_scene(&mut rng, 200);
        let store: Store = build_tree(&segments);
        let prim = curves(CurveGeometry::Capsule);
        let engine = HybridIntersector::new(&store, &prim, TraversalConfig::default()).unwrap();
        let mut stack = engine.stack();
        for _ in 0..30 {
            let mut packet = random_packet::<8>(&mut rng);
            for k in 0..8 {
                packet.tfar[k] = rng.gen_range(2.0..12.0);
            }
            let before = packet.clone();
            for coherence in [Coherence::Coherent, Coherence::Incoherent] {
                let (occluded, _) = engine.occluded(&packet, coherence, &mut stack, &mut NearestHits::<8>::new());
                let mut traced = packet.clone();
                let mut sink = NearestHits::<8>::new();
                engine.intersect(&mut traced, coherence, &mut stack, &mut sink);
                let hits = LaneMask::from_fn(8, |k| sink.hits[k].is_some());
                assert_eq!(occluded, hits);
            }
            assert_eq!(packet.tfar, before.tfar);
        }
    }

    #[test]
    fn test_occluded_visits_no_more_than_intersect() {
        let mut rng = StdRng::seed_from_u64(3);
        let segments = random_scene(&mut rng, 300);
        let store: Store = build_tree(&segments);
        let prim = curves(CurveGeometry::Capsule);
        let engine = HybridIntersector::new(&store, &prim, TraversalConfig::default()).unwrap();
        let mut stack = engine.stack();
        for _ in 0..50 {
            let packet = random_packet::<1>(&mut rng);
            let ray = packet.ray(0);
            let (_, occluded) = engine.occluded1(&ray, &mut stack, &mut NearestHits::<1>::new());
            let mut traced = ray;
            let intersect = engine.intersect1(&mut traced, &mut stack, &mut NearestHits::<1>::new());
            assert!(
                occluded.nodes_visited + occluded.leaves_visited
                    <= intersect.nodes_visited + intersect.leaves_visited
            );
        }
    }

    #[test]
    fn test_update_max_dist_only_saves_work() {
        let mut rng = StdRng::seed_from_u64(4);
        let segments = random_scene(&mut rng, 400);
        let store: Store = build_tree(&segments);
        let prim = curves(CurveGeometry::Capsule);
        let with = HybridIntersector::new(&store, &prim, TraversalConfig::default()).unwrap();
        let without = HybridIntersector::new(
            &store,
            &prim,
            TraversalConfig {
                update_max_dist: false,
                ..Default::default()
            },
        )
        .unwrap();
        let mut stack = with.stack();
        for _ in 0..20 {
            let packet = random_packet::<8>(&mut rng);
            let (mut a, mut b) = (packet.clone(), packet.clone());
            let (mut ha, mut hb) = (NearestHits::<8>::new(), NearestHits::<8>::new());
            let sa = with.intersect(&mut a, Coherence::Coherent, &mut stack, &mut ha);
            let sb = without.intersect(&mut b, Coherence::Coherent, &mut stack, &mut hb);
            for k in 0..8 {
                assert_same_hit(ha.hits[k], hb.hits[k]);
            }
            assert_eq!(a.tfar, b.tfar);
            assert!(sa.nodes_visited + sa.leaves_visited <= sb.nodes_visited + sb.leaves_visited);
        }
    }

    #[test]
    fn test_coherent_and_incoherent_agree() {
        let mut rng = StdRng::seed_from_u64(5);
        let segments = random_scene(&mut rng, 300);
        let store: Store = build_tree(&segments);
        let prim = curves(CurveGeometry::Capsule);
        let config = TraversalConfig {
            switch_threshold: Some(1),
            ..Default::default()
        };
        let engine = HybridIntersector::new(&store, &prim, config).unwrap();
        let mut stack = engine.stack();
        for _ in 0..20 {
            let packet = random_packet::<16>(&mut rng);
            let (mut a, mut b) = (packet.clone(), packet.clone());
            let (mut ha, mut hb) = (NearestHits::<16>::new(), NearestHits::<16>::new());
            engine.intersect(&mut a, Coherence::Coherent, &mut stack, &mut ha);
            engine.intersect(&mut b, Coherence::Incoherent, &mut stack, &mut hb);
            for k in 0..16 {
                assert_same_hit(ha.hits[k], hb.hits[k]);
            }
        }
    }

    #[test]
    fn test_inactive_lanes_untouched() {
        let segments = grid_segments(8, 1.0, 0.3);
        let store: Store = build_tree(&segments);
        let prim = curves(CurveGeometry::Capsule);
        let engine = HybridIntersector::new(&store, &prim, TraversalConfig::default()).unwrap();
        let mut stack = engine.stack();
        let mut packet = RayPacket::<4>::new();
        packet.set(0, &Ray::new(Vec3::new(2.0, 2.0, 5.0), -Vec3::z()));
        packet.set(2, &Ray::with_range(Vec3::new(2.0, 2.0, 5.0), -Vec3::z(), 1.0, 0.5));
        packet.set(3, &Ray::new(Vec3::new(3.0, 3.0, 5.0), -Vec3::z()));
        packet.valid.clear(3);
        let mut sink = NearestHits::<4>::new();
        engine.intersect(&mut packet, Coherence::Incoherent, &mut stack, &mut sink);
        assert!(sink.hits[0].is_some());
        assert!(sink.hits[2].is_none());
        assert!(sink.hits[3].is_none());
        assert_eq!(packet.tfar[2], 0.5);
        assert_eq!(packet.tfar[3], f32::INFINITY);
    }

    #[test]
    fn test_rejecting_sink_leaves_tfar() {
        let segments = grid_segments(8, 1.0, 0.3);
        let store: Store = build_tree(&segments);
        let prim = curves(CurveGeometry::Capsule);
        let engine = HybridIntersector::new(&store, &prim, TraversalConfig::default()).unwrap();
        let mut stack = engine.stack();
        let mut packet = RayPacket::<4>::from_rays(&[
            Ray::new(Vec3::new(2.0, 2.0, 5.0), -Vec3::z()),
            Ray::new(Vec3::new(2.1, 2.0, 5.0), -Vec3::z()),
        ]);
        let mut offered = 0;
        let mut sink = |_: usize, _: &Hit| {
            offered += 1;
            false
        };
        engine.intersect(&mut packet, Coherence::Coherent, &mut stack, &mut sink);
        assert!(offered > 0);
        assert_eq!(packet.tfar[0], f32::INFINITY);
        assert_eq!(packet.tfar[1], f32::INFINITY);
    }

    #[test]
    fn test_small_packet_starts_single() {
        let segments = grid_segments(8, 1.0, 0.3);
        let store: Store = build_tree(&segments);
        let prim = curves(CurveGeometry::Capsule);
        let engine = HybridIntersector::new(&store, &prim, TraversalConfig::default()).unwrap();
        let mut stack = engine.stack();
        let ray = Ray::new(Vec3::new(2.0, 2.0, 5.0), -Vec3::z());
        let mut packet = RayPacket::<8>::from_rays(&[ray]);
        let mut sink = NearestHits::<8>::new();
        let stats = engine.intersect(&mut packet, Coherence::Incoherent, &mut stack, &mut sink);
        assert_eq!(stats.single_dispatches, 1);
        assert_eq!(stats.frustum_rejections, 0);
        assert_same_hit(sink.hits[0], brute_force(store.primitives(), &prim, &ray));
    }

    #[test]
    fn test_divergent_lane_switches_once() {
        let segments = grid_segments(16, 1.0, 0.3);
        let store: Store = build_tree(&segments);
        assert!(store.depth() >= 3);
        let prim = curves(CurveGeometry::Capsule);
        let config = TraversalConfig {
            switch_threshold: Some(2),
            ..Default::default()
        };
        let engine = HybridIntersector::new(&store, &prim, config).unwrap();
        let mut stack = engine.stack();

        let dir = Vec3::new(0.05, 0.05, -1.0);
        let mut packet = RayPacket::<8>::new();
        for k in 0..7 {
            let jitter = k as f32 * 1e-5;
            packet.set(k, &Ray::new(Vec3::new(1.1 + jitter, 1.6, 8.0), dir));
        }
        let divergent = 7;
        packet.set(divergent, &Ray::new(Vec3::new(12.1, 12.6, 8.0), dir));
        let original = packet.clone();

        let mut sink = NearestHits::<8>::new();
        let stats = engine.intersect(&mut packet, Coherence::Incoherent, &mut stack, &mut sink);
        assert_eq!(stats.lanes_switched, 1);
        assert_eq!(stats.switched, LaneMask::single(divergent));
        assert_eq!(stats.single_dispatches, 1);
        for k in 0..8 {
            let want = brute_force(store.primitives(), &prim, &original.ray(k));
            assert!(want.is_some());
            assert_same_hit(sink.hits[k], want);
        }
    }

    #[test]
    fn test_coherent_packet_never_switches() {
        let segments = grid_segments(16, 1.0, 0.3);
        let store: Store = build_tree(&segments);
        let prim = curves(CurveGeometry::Capsule);
        let config = TraversalConfig {
            switch_threshold: Some(0),
            ..Default::default()
        };
        let engine = HybridIntersector::new(&store, &prim, config).unwrap();
        let mut stack = engine.stack();
        let mut rng = StdRng::seed_from_u64(6);
        let mut packet = random_packet::<8>(&mut rng);
        let stats = engine.intersect(&mut packet, Coherence::Coherent, &mut stack, &mut NearestHits::<8>::new());
        assert_eq!(stats.lanes_switched, 0);
        assert_eq!(stats.single_dispatches, 0);
    }
}
