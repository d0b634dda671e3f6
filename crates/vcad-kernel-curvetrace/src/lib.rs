#![warn(missing_docs)]

//! Packet BVH traversal and swept-curve ray intersection for the vcad kernel.
//!
//! Rays are traced in packets of up to 64 lanes through a wide bounding
//! volume hierarchy whose leaves hold batches of curve segments. Packets
//! stay together while their rays agree on which subtrees matter; lanes
//! that diverge are finished as single rays.
//!
//! # Architecture
//!
//! - [`ray`] - Rays, ray packets and per-ray precalculation
//! - [`mask`] - Lane masks over packet and batch lanes
//! - [`bvh`] - Node storage, frustum culling and the hybrid traversal
//! - [`intersect`] - Curve segment intersectors and the epilogue hook
//! - [`config`] - Traversal and intersection settings
//!
//! # Example
//!
//! ```ignore
//! use vcad_kernel_curvetrace::bvh::{Coherence, HybridIntersector};
//! use vcad_kernel_curvetrace::intersect::{CurveIntersector, NearestHits};
//!
//! let prim = CurveIntersector::<4>::default();
//! let engine = HybridIntersector::new(&store, &prim, TraversalConfig::default())?;
//! let mut stack = engine.stack();
//! let mut hits = NearestHits::<8>::new();
//! engine.intersect(&mut packet, Coherence::Incoherent, &mut stack, &mut hits);
//! ```

pub mod bvh;
pub mod config;
pub mod error;
pub mod intersect;
pub mod mask;
pub mod ray;

pub use bvh::{Coherence, HybridIntersector, NodeStore, TraversalStats};
pub use config::{CurveConfig, CurveGeometry, TraversalConfig};
pub use error::{CurveTraceError, Result};
pub use intersect::{CurveBatch, CurveIntersector, CurveSegment, Epilogue, Hit, NearestHits};
pub use mask::LaneMask;
pub use ray::{Ray, RayPacket, RayPrecalc};
