//! Read-only arena of nodes and leaf primitives.

use vcad_kernel_math::Aabb3;

use super::node::{AlignedNode, NodeRef, MAX_LEAF_PRIMITIVES};

/// Bounding volume hierarchy over primitives of type `P`.
///
/// Trees are assembled by an external builder through [`push_node`],
/// [`push_leaf`] and [`set_root`]; traversal only reads them.
///
/// [`push_node`]: NodeStore::push_node
/// [`push_leaf`]: NodeStore::push_leaf
/// [`set_root`]: NodeStore::set_root
#[derive(Debug, Clone)]
pub struct NodeStore<const N: usize, P> {
    nodes: Vec<AlignedNode<N>>,
    primitives: Vec<P>,
    root: NodeRef,
    bounds: Aabb3,
    depth: usize,
}

impl<const N: usize, P> NodeStore<N, P> {
    /// An empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            primitives: Vec::new(),
            root: NodeRef::EMPTY,
            bounds: Aabb3::empty(),
            depth: 0,
        }
    }

    /// Append primitives as one leaf.
    pub fn push_leaf(&mut self, primitives: impl IntoIterator<Item = P>) -> NodeRef {
        let offset = self.primitives.len();
        self.primitives.extend(primitives);
        let count = self.primitives.len() - offset;
        assert!(
            count <= MAX_LEAF_PRIMITIVES,
            "leaf of {count} primitives exceeds {MAX_LEAF_PRIMITIVES}"
        );
        if count == 0 {
            NodeRef::EMPTY
        } else {
            NodeRef::leaf(offset, count)
        }
    }

    /// Append an internal node.
    pub fn push_node(&mut self, node: AlignedNode<N>) -> NodeRef {
        let r = NodeRef::internal(self.nodes.len());
        self.nodes.push(node);
        r
    }

    /// Set the root, its bounds and the number of internal levels above
    /// the deepest leaf.
    pub fn set_root(&mut self, root: NodeRef, bounds: Aabb3, depth: usize) {
        self.root = root;
        self.bounds = bounds;
        self.depth = depth;
    }

    /// Root reference.
    pub fn root(&self) -> NodeRef {
        self.root
    }

    /// Scene bounds.
    pub fn bounds(&self) -> Aabb3 {
        self.bounds
    }

    /// Internal levels on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of internal nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All primitives in leaf order.
    pub fn primitives(&self) -> &[P] {
        &self.primitives
    }

    /// Whether `r` is a leaf.
    #[inline]
    pub fn is_leaf(&self, r: NodeRef) -> bool {
        r.is_leaf()
    }

    /// Children of an internal node.
    ///
    /// Panics if `r` is a leaf or outside the arena.
    #[inline]
    pub fn children(&self, r: NodeRef) -> &AlignedNode<N> {
        &self.nodes[r.node_index()]
    }

    /// Primitives of a leaf.
    ///
    /// Panics if `r` is not a leaf or addresses primitives past the arena.
    #[inline]
    pub fn leaf_primitives(&self, r: NodeRef) -> &[P] {
        let (offset, count) = r.leaf_range();
        &self.primitives[offset..offset + count]
    }
}

impl<const N: usize, P> Default for NodeStore<N, P> {
    fn default() -> Self {
        Self::new()
    }
}
