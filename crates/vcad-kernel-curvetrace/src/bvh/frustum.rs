//! Packet-wide conservative node culling.
//!
//! Rays of a packet are assumed to share a direction octant, so per axis the
//! reciprocal directions are either all non-negative or all negative. With
//! `t = (p - org) * rdir` the earliest entry over all rays of a slab is then
//! reached by the extreme origin paired with the extreme reciprocal:
//!
//! ```text
//! rdir >= 0:  t_min = p_lo * rdir_min - org_max * rdir_min
//!             t_max = p_hi * rdir_max - org_min * rdir_max
//! rdir <  0:  t_min = p_hi * rdir_max - org_min * rdir_max
//!             t_max = p_lo * rdir_min - org_max * rdir_min
//! ```
//!
//! Mixed-octant packets are not rejected but may be culled incorrectly.

use vcad_kernel_math::{msub, Vec3};

use super::node::AlignedNode;
use crate::mask::{LaneMask, SlotMask};
use crate::ray::{RayPacket, ROUND_DOWN, ROUND_UP};

/// Aggregate interval bounds of the active lanes of a packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Per axis, 0 when the near slab plane is the lower bound, 1 otherwise.
    near: [usize; 3],
    min_rdir: Vec3,
    max_rdir: Vec3,
    // Exact mode premultiplies the origins by the matching reciprocal.
    org_min_rdir: Vec3,
    org_max_rdir: Vec3,
    min_dist: f32,
    max_dist: f32,
    robust: bool,
}

impl Frustum {
    /// Reduce the lanes in `active` of `packet`.
    ///
    /// `rdir` holds the reciprocal direction per lane. At least one lane must
    /// be active.
    pub fn new<const K: usize>(
        packet: &RayPacket<K>,
        rdir: &[Vec3; K],
        active: LaneMask,
        robust: bool,
    ) -> Self {
        debug_assert!(active.any(), "frustum over an empty packet");

        let axis = |v: &[Vec3; K], a: usize| -> [f32; K] { std::array::from_fn(|k| v[k][a]) };

        let mut near = [0; 3];
        let mut min_rdir = Vec3::zeros();
        let mut max_rdir = Vec3::zeros();
        let mut org_min_rdir = Vec3::zeros();
        let mut org_max_rdir = Vec3::zeros();

        for a in 0..3 {
            let org = axis(&packet.org, a);
            let rd = axis(rdir, a);
            let reduced_min_org = active.reduce_min(&org);
            let reduced_max_org = active.reduce_max(&org);
            let reduced_min_rdir = active.reduce_min(&rd);
            let reduced_max_rdir = active.reduce_max(&rd);

            let positive = reduced_min_rdir >= 0.0;
            let (lo_rdir, hi_rdir) = if positive {
                (reduced_min_rdir, reduced_max_rdir)
            } else {
                (reduced_max_rdir, reduced_min_rdir)
            };
            let (org_for_min, org_for_max) = if positive {
                (reduced_max_org, reduced_min_org)
            } else {
                (reduced_min_org, reduced_max_org)
            };

            min_rdir[a] = lo_rdir;
            max_rdir[a] = hi_rdir;
            near[a] = if lo_rdir < 0.0 { 1 } else { 0 };
            if robust {
                org_min_rdir[a] = org_for_min;
                org_max_rdir[a] = org_for_max;
            } else {
                org_min_rdir[a] = lo_rdir * org_for_min;
                org_max_rdir[a] = hi_rdir * org_for_max;
            }
        }

        Self {
            near,
            min_rdir,
            max_rdir,
            org_min_rdir,
            org_max_rdir,
            min_dist: active.reduce_min(&packet.tnear),
            max_dist: active.reduce_max(&packet.tfar),
            robust,
        }
    }

    /// Nearest `tnear` over the reduced lanes.
    pub fn min_dist(&self) -> f32 {
        self.min_dist
    }

    /// Farthest `tfar` over the reduced lanes.
    pub fn max_dist(&self) -> f32 {
        self.max_dist
    }

    /// Test all child slots of `node`.
    ///
    /// Returns the slots whose interval overlaps `[min_dist, max_dist]` and
    /// a conservative entry distance per slot.
    pub fn intersect<const N: usize>(&self, node: &AlignedNode<N>) -> (SlotMask, [f32; N]) {
        let planes: [[&[f32; N]; 2]; 3] = [
            [&node.lower_x, &node.upper_x],
            [&node.lower_y, &node.upper_y],
            [&node.lower_z, &node.upper_z],
        ];

        let mut mask = SlotMask::EMPTY;
        let mut dist = [f32::INFINITY; N];
        for slot in 0..N {
            let mut fmin = self.min_dist;
            let mut fmax = self.max_dist;
            for a in 0..3 {
                let bmin = planes[a][self.near[a]][slot];
                let bmax = planes[a][self.near[a] ^ 1][slot];
                let (lo, hi) = if self.robust {
                    (
                        (bmin - self.org_min_rdir[a]) * self.min_rdir[a],
                        (bmax - self.org_max_rdir[a]) * self.max_rdir[a],
                    )
                } else {
                    (
                        msub(bmin, self.min_rdir[a], self.org_min_rdir[a]),
                        msub(bmax, self.max_rdir[a], self.org_max_rdir[a]),
                    )
                };
                fmin = fmin.max(lo);
                fmax = fmax.min(hi);
            }

            let hit = if self.robust {
                fmin *= ROUND_DOWN;
                fmin <= ROUND_UP * fmax
            } else {
                fmin <= fmax
            };
            if hit {
                mask.set(slot);
            }
            dist[slot] = fmin;
        }
        (mask, dist)
    }

    /// Shrink `max_dist` to the largest `tfar` of the `active` lanes.
    pub fn update_max_dist<const K: usize>(&mut self, tfar: &[f32; K], active: LaneMask) {
        self.max_dist = self.max_dist.min(active.reduce_max(tfar));
    }
}
