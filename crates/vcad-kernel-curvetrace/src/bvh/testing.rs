//! Reference tree builder and brute-force tracing for tests and benchmarks.
//!
//! The builder is a plain median split: primitives are sorted by centroid
//! along the widest centroid axis and cut into `N` equal runs until a run
//! fits one [`CurveBatch`]. Tree quality is irrelevant here; the traversal
//! only relies on child bounds enclosing their subtrees.

use vcad_kernel_math::{Aabb3, Vec3};

use super::node::{AlignedNode, NodeRef};
use super::store::NodeStore;
use crate::intersect::{CurveBatch, CurveSegment, Hit, PrimitiveIntersector};
use crate::ray::Ray;

/// Padding added to every child box.
const BOUNDS_PADDING: f32 = 1e-4;

struct Entry {
    segment: CurveSegment,
    prim_id: u32,
    centroid: Vec3,
}

/// Build a tree over `segments`; primitive ids are the slice indices.
pub fn build_tree<const N: usize, const M: usize>(segments: &[CurveSegment]) -> NodeStore<N, CurveBatch<M>> {
    assert!(N >= 2 && M >= 1, "fan-out {N} or batch width {M} too small");
    let mut store = NodeStore::new();
    if segments.is_empty() {
        return store;
    }
    let mut entries: Vec<Entry> = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| Entry {
            segment: *segment,
            prim_id: i as u32,
            centroid: segment.bounds().center(),
        })
        .collect();
    let (root, bounds, depth) = build_node::<N, M>(&mut store, &mut entries);
    store.set_root(root, bounds, depth);
    store
}

fn build_node<const N: usize, const M: usize>(
    store: &mut NodeStore<N, CurveBatch<M>>,
    entries: &mut [Entry],
) -> (NodeRef, Aabb3, usize) {
    if entries.len() <= M {
        let mut batch = CurveBatch::new();
        for entry in entries.iter() {
            batch.push(&entry.segment, entry.prim_id);
        }
        let mut bounds = batch.bounds();
        bounds.expand(BOUNDS_PADDING);
        return (store.push_leaf([batch]), bounds, 0);
    }

    let mut centroids = Aabb3::empty();
    for entry in entries.iter() {
        centroids.include_point(&entry.centroid);
    }
    let axis = centroids.max_dim();
    entries.sort_by(|a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));

    let run = entries.len().div_ceil(N);
    let mut node = AlignedNode::<N>::empty();
    let mut depth = 0;
    for (slot, chunk) in entries.chunks_mut(run).enumerate() {
        let (child, bounds, child_depth) = build_node::<N, M>(store, chunk);
        node.set_child(slot, &bounds, child);
        depth = depth.max(child_depth + 1);
    }
    let bounds = node.union_bounds();
    (store.push_node(node), bounds, depth)
}

/// An `n` by `n` grid of straight segments in the `z = 0` plane.
///
/// Segment `j * n + i` runs along `x` from `(i, j)` to `(i + 1, j)`, scaled
/// by `spacing`.
pub fn grid_segments(n: usize, spacing: f32, radius: f32) -> Vec<CurveSegment> {
    let mut segments = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let a = Vec3::new(i as f32, j as f32, 0.0) * spacing;
            let b = Vec3::new((i + 1) as f32, j as f32, 0.0) * spacing;
            segments.push(CurveSegment::new(a, radius, b, radius));
        }
    }
    segments
}

/// Nearest hit of `ray` over all primitives, without a tree.
pub fn brute_force<I: PrimitiveIntersector>(primitives: &[I::Primitive], prim: &I, ray: &Ray) -> Option<Hit> {
    brute_force_filtered(primitives, prim, ray, |_| true)
}

/// Nearest hit of `ray` accepted by `filter`, without a tree.
pub fn brute_force_filtered<I, F>(primitives: &[I::Primitive], prim: &I, ray: &Ray, mut filter: F) -> Option<Hit>
where
    I: PrimitiveIntersector,
    F: FnMut(&Hit) -> bool,
{
    let pre = prim.precalculate(ray);
    let mut ray = *ray;
    let mut nearest = None;
    for p in primitives {
        let snapshot = ray;
        prim.intersect(&pre, &snapshot, p, |hit| {
            if hit.t < ray.tfar && filter(hit) {
                ray.tfar = hit.t;
                nearest = Some(*hit);
                true
            } else {
                false
            }
        });
    }
    nearest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersect::CurveIntersector;

    #[test]
    fn test_build_depth_and_bounds() {
        let segments = grid_segments(16, 1.0, 0.3);
        let store: NodeStore<4, CurveBatch<4>> = build_tree(&segments);
        assert_eq!(store.depth(), 3);
        assert_eq!(store.primitives().len(), 64);
        let count: usize = store.primitives().iter().map(|b| b.len()).sum();
        assert_eq!(count, 256);
        let bounds = store.bounds();
        assert!(bounds.min.x <= -0.3 && bounds.max.x >= 16.3);
        assert!(bounds.min.z <= -0.3 && bounds.max.z >= 0.3);
    }

    #[test]
    fn test_children_enclose_subtrees() {
        let segments = grid_segments(7, 0.5, 0.1);
        let store: NodeStore<2, CurveBatch<3>> = build_tree(&segments);
        let mut pending = vec![(store.root(), store.bounds())];
        let mut seen = 0;
        while let Some((r, outer)) = pending.pop() {
            if r.is_leaf() {
                for batch in store.leaf_primitives(r) {
                    let b = batch.bounds();
                    assert!(b.min.x >= outer.min.x && b.max.x <= outer.max.x);
                    assert!(b.min.y >= outer.min.y && b.max.y <= outer.max.y);
                    seen += batch.len();
                }
                continue;
            }
            let node = store.children(r);
            for (slot, &child) in node.children.iter().enumerate() {
                if !child.is_empty() {
                    pending.push((child, node.bounds(slot)));
                }
            }
        }
        assert_eq!(seen, 49);
    }

    #[test]
    fn test_empty_input() {
        let store: NodeStore<4, CurveBatch<4>> = build_tree(&[]);
        assert!(store.root().is_empty());
    }

    #[test]
    fn test_brute_force_nearest() {
        let segments = grid_segments(4, 1.0, 0.25);
        let store: NodeStore<4, CurveBatch<4>> = build_tree(&segments);
        let prim = CurveIntersector::<4>::default();
        let ray = Ray::new(Vec3::new(0.5, -1.0, 0.0), Vec3::y());
        let hit = brute_force(store.primitives(), &prim, &ray).unwrap();
        assert_eq!(hit.prim_id, 0);
        assert!((hit.t - 0.75).abs() < 1e-4);
    }
}
