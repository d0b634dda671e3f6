//! Bitsets over packet lanes and node child slots.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// A set of lane (or child slot) indices below 64.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LaneMask(u64);

/// Child slots selected by a node test.
pub type SlotMask = LaneMask;

/// Largest supported packet, batch or node width.
pub const MAX_LANES: usize = 64;

impl LaneMask {
    /// No lanes set.
    pub const EMPTY: Self = Self(0);

    /// Build a mask from raw bits.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Lanes `0..n`.
    #[inline]
    pub fn first_n(n: usize) -> Self {
        assert!(n <= MAX_LANES, "lane count {n} exceeds {MAX_LANES}");
        if n == MAX_LANES {
            Self(u64::MAX)
        } else {
            Self((1u64 << n) - 1)
        }
    }

    /// A mask with only `lane` set.
    #[inline]
    pub fn single(lane: usize) -> Self {
        debug_assert!(lane < MAX_LANES);
        Self(1u64 << lane)
    }

    /// Lanes in `0..n` for which `f` returns true.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize) -> bool) -> Self {
        let mut mask = Self::EMPTY;
        for lane in 0..n {
            if f(lane) {
                mask.set(lane);
            }
        }
        mask
    }

    /// True if any lane is set.
    #[inline]
    pub fn any(self) -> bool {
        self.0 != 0
    }

    /// True if no lane is set.
    #[inline]
    pub fn none(self) -> bool {
        self.0 == 0
    }

    /// Number of set lanes.
    #[inline]
    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether `lane` is set.
    #[inline]
    pub fn contains(self, lane: usize) -> bool {
        lane < MAX_LANES && self.0 & (1u64 << lane) != 0
    }

    /// Set `lane`.
    #[inline]
    pub fn set(&mut self, lane: usize) {
        debug_assert!(lane < MAX_LANES);
        self.0 |= 1u64 << lane;
    }

    /// Clear `lane`.
    #[inline]
    pub fn clear(&mut self, lane: usize) {
        debug_assert!(lane < MAX_LANES);
        self.0 &= !(1u64 << lane);
    }

    /// Lowest set lane.
    #[inline]
    pub fn first(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Iterate set lanes in ascending order.
    #[inline]
    pub fn iter(self) -> Lanes {
        Lanes(self.0)
    }

    /// Minimum of `values` over set lanes, `+inf` when empty.
    pub fn reduce_min(self, values: &[f32]) -> f32 {
        self.iter().fold(f32::INFINITY, |acc, lane| acc.min(values[lane]))
    }

    /// Maximum of `values` over set lanes, `-inf` when empty.
    pub fn reduce_max(self, values: &[f32]) -> f32 {
        self.iter()
            .fold(f32::NEG_INFINITY, |acc, lane| acc.max(values[lane]))
    }
}

/// Iterator over the set lanes of a [`LaneMask`].
#[derive(Debug, Clone)]
pub struct Lanes(u64);

impl Iterator for Lanes {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let lane = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(lane)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Lanes {}

impl IntoIterator for LaneMask {
    type Item = usize;
    type IntoIter = Lanes;

    fn into_iter(self) -> Lanes {
        self.iter()
    }
}

impl BitAnd for LaneMask {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for LaneMask {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for LaneMask {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LaneMask {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Not for LaneMask {
    type Output = Self;

    #[inline]
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for LaneMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LaneMask({:#b})", self.0)
    }
}
