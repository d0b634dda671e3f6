//! Node references and N-wide aligned nodes.

use vcad_kernel_math::{Aabb3, Vec3};

const LEAF_TAG: u32 = 1 << 31;
const COUNT_BITS: u32 = 4;
const COUNT_MASK: u32 = (1 << COUNT_BITS) - 1;

/// Most primitives a single leaf reference can address.
pub const MAX_LEAF_PRIMITIVES: usize = COUNT_MASK as usize;

/// Largest primitive offset a leaf reference can address.
pub const MAX_LEAF_OFFSET: usize = ((LEAF_TAG - 1) >> COUNT_BITS) as usize;

/// Tagged reference to an internal node or a leaf.
///
/// Internal references index the node arena. Leaf references carry the
/// offset of their first primitive in bits 4..31 and the primitive count in
/// bits 0..4. Bit 31 is the leaf tag.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(u32);

impl NodeRef {
    /// A leaf without primitives; fills unused child slots.
    pub const EMPTY: Self = Self(LEAF_TAG);

    /// Reference the internal node at arena `index`.
    pub fn internal(index: usize) -> Self {
        assert!(index < LEAF_TAG as usize, "node index {index} out of range");
        Self(index as u32)
    }

    /// Reference `count` primitives starting at `offset`.
    pub fn leaf(offset: usize, count: usize) -> Self {
        assert!(
            count <= MAX_LEAF_PRIMITIVES,
            "leaf of {count} primitives exceeds {MAX_LEAF_PRIMITIVES}"
        );
        assert!(offset <= MAX_LEAF_OFFSET, "leaf offset {offset} out of range");
        Self(LEAF_TAG | ((offset as u32) << COUNT_BITS) | count as u32)
    }

    /// True for leaf references, including [`NodeRef::EMPTY`].
    #[inline]
    pub fn is_leaf(self) -> bool {
        self.0 & LEAF_TAG != 0
    }

    /// True for the empty leaf.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.is_leaf() && self.0 & COUNT_MASK == 0
    }

    /// Arena index of an internal node.
    #[inline]
    pub fn node_index(self) -> usize {
        assert!(!self.is_leaf(), "{self:?} is not an internal node");
        self.0 as usize
    }

    /// First primitive and primitive count of a leaf.
    #[inline]
    pub fn leaf_range(self) -> (usize, usize) {
        assert!(self.is_leaf(), "{self:?} is not a leaf");
        let bits = self.0 & !LEAF_TAG;
        ((bits >> COUNT_BITS) as usize, (bits & COUNT_MASK) as usize)
    }
}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_leaf() {
            let (offset, count) = self.leaf_range();
            write!(f, "Leaf({offset}+{count})")
        } else {
            write!(f, "Node({})", self.0)
        }
    }
}

/// Internal node with up to `N` children, bounds stored per axis.
///
/// Unused slots hold [`NodeRef::EMPTY`] and an inverted box so that every
/// interval test rejects them.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedNode<const N: usize> {
    /// Lower x bound per child.
    pub lower_x: [f32; N],
    /// Upper x bound per child.
    pub upper_x: [f32; N],
    /// Lower y bound per child.
    pub lower_y: [f32; N],
    /// Upper y bound per child.
    pub upper_y: [f32; N],
    /// Lower z bound per child.
    pub lower_z: [f32; N],
    /// Upper z bound per child.
    pub upper_z: [f32; N],
    /// Child references.
    pub children: [NodeRef; N],
}

impl<const N: usize> AlignedNode<N> {
    /// A node whose slots are all empty.
    pub fn empty() -> Self {
        Self {
            lower_x: [f32::INFINITY; N],
            upper_x: [f32::NEG_INFINITY; N],
            lower_y: [f32::INFINITY; N],
            upper_y: [f32::NEG_INFINITY; N],
            lower_z: [f32::INFINITY; N],
            upper_z: [f32::NEG_INFINITY; N],
            children: [NodeRef::EMPTY; N],
        }
    }

    /// Store `child` with `bounds` in `slot`.
    pub fn set_child(&mut self, slot: usize, bounds: &Aabb3, child: NodeRef) {
        self.lower_x[slot] = bounds.min.x;
        self.lower_y[slot] = bounds.min.y;
        self.lower_z[slot] = bounds.min.z;
        self.upper_x[slot] = bounds.max.x;
        self.upper_y[slot] = bounds.max.y;
        self.upper_z[slot] = bounds.max.z;
        self.children[slot] = child;
    }

    /// Bounds of `slot`.
    #[inline]
    pub fn bounds(&self, slot: usize) -> Aabb3 {
        Aabb3::new(self.lower(slot), self.upper(slot))
    }

    /// Lower corner of `slot`.
    #[inline]
    pub fn lower(&self, slot: usize) -> Vec3 {
        Vec3::new(self.lower_x[slot], self.lower_y[slot], self.lower_z[slot])
    }

    /// Upper corner of `slot`.
    #[inline]
    pub fn upper(&self, slot: usize) -> Vec3 {
        Vec3::new(self.upper_x[slot], self.upper_y[slot], self.upper_z[slot])
    }

    /// Union of all child bounds.
    pub fn union_bounds(&self) -> Aabb3 {
        let mut bounds = Aabb3::empty();
        for slot in 0..N {
            bounds.include_aabb(&self.bounds(slot));
        }
        bounds
    }
}

impl<const N: usize> Default for AlignedNode<N> {
    fn default() -> Self {
        Self::empty()
    }
}
