//! Scene model of the ray tracing demo: geometry, materials, animation and textures.
//!
//! Everything outside [`gpu`] is plain data and can be used without a device.

mod animation;
mod cube;
mod demo;
mod error;
mod geometry;
mod material;
mod obj;
mod renderable;
mod texture;
mod vertex;

#[cfg(feature = "ash")]
pub mod gpu;

pub use animation::*;
pub use cube::cube_vertices_and_indices;
pub use demo::*;
pub use error::*;
pub use geometry::*;
pub use material::*;
pub use obj::*;
pub use renderable::*;
pub use texture::*;
pub use vertex::*;
