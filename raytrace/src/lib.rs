//! CPU-side ray picking over triangle meshes.
//!
//! Geometries are built out of caller-provided index and vertex buffers,
//! indexed with a binned-SAH bounding volume hierarchy (cached on disk by
//! content hash) and then queried through [`Intersect`], either directly or
//! via [`Instance`]s grouped into [`Scene`]s.

mod buffer;
mod bvh;
mod cache;
mod config;
mod device;
mod error;
mod executor;
mod geometry;
mod hash;
mod hit;
mod ingest;
mod instance;
mod ray;
mod scene;
mod triangle;
mod utils;

#[cfg(test)]
mod test_utils;

pub use self::buffer::*;
pub use self::bvh::*;
pub use self::cache::*;
pub use self::config::*;
pub use self::device::*;
pub use self::error::*;
pub use self::executor::*;
pub use self::geometry::*;
pub use self::hash::*;
pub use self::hit::*;
pub use self::ingest::*;
pub use self::instance::*;
pub use self::ray::*;
pub use self::scene::*;
pub use self::triangle::*;
pub use self::utils::*;
