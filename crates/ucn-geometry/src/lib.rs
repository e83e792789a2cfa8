//! # UCN Geometry
//!
//! Geometry handling for the UCN tracking framework. This crate provides:
//!
//! - **Triangle meshes** ([`mesh`]) — Triangle soup with segment
//!   intersection tests.
//! - **Spatial index** ([`tree`]) — Bounding-volume hierarchy for fast
//!   segment queries against large meshes.
//! - **Parametric primitives** ([`primitives`]) — Closed cuboid and
//!   cylinder meshes built from simple parameters.
//! - **File parsers** ([`parsers`]) — Import solids from `.obj` files.
//! - **Scene model** ([`model`]) — Prioritised solids with materials and
//!   ordered crossing queries along a trajectory segment.

pub mod mesh;
pub mod model;
pub mod parsers;
pub mod primitives;
pub mod tree;

pub use mesh::{Triangle, TriangleMesh};
pub use model::{Crossing, GeometryError, GeometryModel, Solid};
