//! Small geometry support crate shared by the projector core.
//!
//! Kept as its own workspace member, in the same spirit as the original
//! `geometry` crate: a place for the coordinate/bounding-box primitives
//! that the projector kernels build on, independent of how LOR batches
//! or images are stored. The core is monomorphic in 32-bit float (no
//! typed-unit scaffolding), so this crate carries only `BBox`'s
//! `ncollide3d`-backed ray/cuboid intersection.

pub mod math;

pub use math::{BBox, Point, Vector};
