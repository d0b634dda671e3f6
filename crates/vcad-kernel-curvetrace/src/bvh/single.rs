//! Single-ray traversal.
//!
//! Used for lanes that left a packet and for rays traced on their own.

use log::trace;

use super::hybrid::{HybridIntersector, Mode, TraversalStats};
use super::node::NodeRef;
use super::stack::{StackItem, TraversalStack};
use crate::intersect::{Epilogue, PrimitiveIntersector};
use crate::mask::LaneMask;
use crate::ray::{intersect_slab, Ray};

impl<const N: usize, I: PrimitiveIntersector> HybridIntersector<'_, N, I> {
    /// Find the nearest accepted hit of `ray`, shrinking `ray.tfar`.
    ///
    /// `sink` receives candidates as lane 0.
    pub fn intersect1(&self, ray: &mut Ray, stack: &mut TraversalStack, sink: &mut impl Epilogue) -> TraversalStats {
        self.trace1(ray, stack, sink, Mode::Intersect).1
    }

    /// Whether `ray` has any accepted hit.
    pub fn occluded1(&self, ray: &Ray, stack: &mut TraversalStack, sink: &mut impl Epilogue) -> (bool, TraversalStats) {
        let mut ray = *ray;
        self.trace1(&mut ray, stack, sink, Mode::Occluded)
    }

    fn trace1<E: Epilogue>(&self, ray: &mut Ray, stack: &mut TraversalStack, sink: &mut E, mode: Mode) -> (bool, TraversalStats) {
        let mut stats = TraversalStats::default();
        let root = self.store.root();
        if !(ray.tnear <= ray.tfar) || root.is_empty() {
            return (false, stats);
        }
        let pre = self.prim.precalculate(ray);
        stack.clear();
        let hit = self.walk_single(ray, &pre, 0, root, ray.tnear.min(0.0), stack, sink, mode, &mut stats);
        stack.clear();
        trace!("{mode:?} single-ray traversal finished: {stats:?}");
        (hit, stats)
    }

    /// Walk the subtree at `root` for one lane on a fresh stack walk.
    ///
    /// Returns whether a hit was accepted; in occluded mode the walk stops
    /// at the first one and leaves its remaining items to the caller.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn walk_single<E: Epilogue>(
        &self,
        ray: &mut Ray,
        pre: &I::Precalc,
        lane: usize,
        root: NodeRef,
        dist: f32,
        stack: &mut TraversalStack,
        sink: &mut E,
        mode: Mode,
        stats: &mut TraversalStats,
    ) -> bool {
        let robust = self.config.robust;
        let rdir = ray.rdir();
        let lanes = LaneMask::single(lane);
        let mut any = false;

        stack.push(StackItem { node: root, dist, lanes });
        while let Some(item) = stack.pop() {
            if item.dist > ray.tfar {
                continue;
            }
            if item.node.is_leaf() {
                stats.leaves_visited += 1;
                if self.intersect_leaf1(ray, pre, lane, item.node, sink, mode, stats) {
                    any = true;
                    if mode == Mode::Occluded {
                        return true;
                    }
                }
                continue;
            }

            stats.nodes_visited += 1;
            let node = self.store.children(item.node);
            let mut children = [StackItem::EMPTY; N];
            let mut count = 0;
            for (slot, &child) in node.children.iter().enumerate() {
                if child.is_empty() {
                    continue;
                }
                let hit = intersect_slab(
                    &ray.org,
                    &rdir,
                    &node.lower(slot),
                    &node.upper(slot),
                    ray.tnear,
                    ray.tfar,
                    robust,
                );
                if let Some(dist) = hit {
                    children[count] = StackItem { node: child, dist, lanes };
                    count += 1;
                }
            }
            stack.push_nearest_first(&mut children[..count]);
        }
        any
    }
}
