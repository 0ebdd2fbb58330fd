use thiserror::Error as ThisError;

use crate::ObjError;

pub type Result<T> = std::result::Result<T, SceneError>;

#[derive(Debug, ThisError)]
pub enum SceneError {
    #[error(transparent)]
    Obj(#[from] ObjError),
    #[error(transparent)]
    Resource(#[from] resource_manager::ResourceError),
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Shared vertex buffer overflows 16 bit indices ({count} vertices)")]
    IndexOverflow { count: usize },
    #[error("Index byte offset {byte_offset} is not a whole number of triangles")]
    MisalignedIndexOffset { byte_offset: u64 },
    #[error("Vertex buffer slot {vertex_slot} must directly follow index buffer slot {index_slot}")]
    VertexSlotMismatch { index_slot: u32, vertex_slot: u32 },
    #[error("Geometry {id} does not fit the {capacity} per-geometry transforms")]
    TooManyGeometries { id: usize, capacity: usize },
    #[error("No geometry {id}, the table holds {len}")]
    UnknownGeometry { id: usize, len: usize },
}
