//! Bounding volume hierarchy storage and hybrid packet traversal.
//!
//! Trees are built elsewhere and handed over as a [`NodeStore`]. The
//! [`HybridIntersector`] walks them for packets of up to 64 rays, culling
//! with a packet [`Frustum`] and falling back to single-ray walks for lanes
//! that stop following the packet.

mod frustum;
mod hybrid;
mod node;
mod single;
mod stack;
mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use frustum::Frustum;
pub use hybrid::{Coherence, HybridIntersector, TraversalStats};
pub use node::{AlignedNode, NodeRef, MAX_LEAF_OFFSET, MAX_LEAF_PRIMITIVES};
pub use stack::{StackItem, TraversalStack, WalkMark};
pub use store::NodeStore;
