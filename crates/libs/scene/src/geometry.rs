use std::mem::size_of;

use glam::Mat4;

use crate::{texture_slot, Index, Material, Renderable, Result, SceneError, TextureId, Vertex};

/// Geometries the scene constants carry a transform for.
pub const MAX_GEOMETRIES: usize = 4;

/// Rays traced against every geometry: primary and shadow.
pub const RAY_TYPE_COUNT: u32 = 2;

const TRIANGLE_INDEX_BYTES: u64 = 3 * size_of::<Index>() as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    R32G32B32Sfloat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
}

/// Triangle geometry as the bottom level acceleration structure consumes it.
///
/// Offsets are relative to the shared vertex and index buffers. Indices address the
/// whole vertex buffer, so `vertex_byte_offset` only documents where the range starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryDescriptor {
    pub vertex_format: VertexFormat,
    pub vertex_stride: u64,
    pub vertex_byte_offset: u64,
    pub vertex_count: u32,
    pub index_format: IndexFormat,
    pub index_byte_offset: u64,
    pub index_count: u32,
    /// Row major 3x4.
    pub transform: [f32; 12],
    pub opaque: bool,
}

impl GeometryDescriptor {
    pub fn primitive_count(&self) -> u32 {
        self.index_count / 3
    }
}

/// Row major 3x4 matrix of an affine transform.
pub fn transform_3x4(transform: &Mat4) -> [f32; 12] {
    let mut matrix = [0.0; 12];
    matrix.copy_from_slice(&transform.transpose().to_cols_array()[..12]);
    matrix
}

/// Inline constants of a hit record. Mirrors the `HitPayload` block of the shaders.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct HitPayload {
    pub albedo: [f32; 4],
    pub material: u32,
    /// In indices, not bytes.
    pub index_offset: u32,
    pub geometry_id: u32,
    pub texture_slot: i32,
}

impl HitPayload {
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts((self as *const Self).cast::<u8>(), size_of::<Self>())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryEntry {
    pub descriptor: GeometryDescriptor,
    pub payload: HitPayload,
}

/// Geometries paired with their hit constants.
///
/// Entry `i` is geometry `i` of the bottom level structure and owns hit records
/// `i * RAY_TYPE_COUNT ..`, so the two can't drift apart.
#[derive(Debug, Default, Clone)]
pub struct GeometryTable {
    entries: Vec<GeometryEntry>,
}

impl GeometryTable {
    pub fn from_renderables(renderables: &[Renderable]) -> Result<Self> {
        let mut table = Self::default();
        for renderable in renderables {
            table.push(
                renderable.geometry_descriptor(),
                renderable.material,
                renderable.texture,
            )?;
        }
        Ok(table)
    }

    /// Appends a geometry and returns its id.
    pub fn push(
        &mut self,
        descriptor: GeometryDescriptor,
        material: Material,
        texture: Option<TextureId>,
    ) -> Result<u32> {
        let id = self.entries.len();
        if id >= MAX_GEOMETRIES {
            return Err(SceneError::TooManyGeometries {
                id,
                capacity: MAX_GEOMETRIES,
            });
        }
        if descriptor.index_byte_offset % TRIANGLE_INDEX_BYTES != 0 {
            return Err(SceneError::MisalignedIndexOffset {
                byte_offset: descriptor.index_byte_offset,
            });
        }

        let payload = HitPayload {
            albedo: [1.0; 4],
            material: material.id(),
            index_offset: (descriptor.index_byte_offset / size_of::<Index>() as u64) as u32,
            geometry_id: id as u32,
            texture_slot: texture_slot(texture),
        };
        self.entries.push(GeometryEntry {
            descriptor,
            payload,
        });

        Ok(id as u32)
    }

    pub fn update_transform(&mut self, id: usize, transform: &Mat4) -> Result<()> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(id)
            .ok_or(SceneError::UnknownGeometry { id, len })?;
        entry.descriptor.transform = transform_3x4(transform);
        Ok(())
    }

    pub fn entries(&self) -> &[GeometryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn transforms(&self) -> Vec<[f32; 12]> {
        self.entries.iter().map(|e| e.descriptor.transform).collect()
    }

    pub fn payloads(&self) -> Vec<HitPayload> {
        self.entries.iter().map(|e| e.payload).collect()
    }

    /// Payload of every hit record in table order.
    pub fn hit_records(&self) -> impl Iterator<Item = &HitPayload> + '_ {
        self.entries
            .iter()
            .flat_map(|e| (0..RAY_TYPE_COUNT).map(move |_| &e.payload))
    }

    pub fn hit_record_index(geometry_id: u32, ray_type: u32) -> u32 {
        geometry_id * RAY_TYPE_COUNT + ray_type
    }
}

/// Shaders read the vertex buffer from the descriptor right after the index buffer.
pub fn check_buffer_slots(index_slot: u32, vertex_slot: u32) -> Result<()> {
    if vertex_slot != index_slot + 1 {
        return Err(SceneError::VertexSlotMismatch {
            index_slot,
            vertex_slot,
        });
    }
    Ok(())
}

pub(crate) fn vertex_stride() -> u64 {
    size_of::<Vertex>() as u64
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    fn descriptor(index_byte_offset: u64) -> GeometryDescriptor {
        GeometryDescriptor {
            vertex_format: VertexFormat::R32G32B32Sfloat,
            vertex_stride: vertex_stride(),
            vertex_byte_offset: 0,
            vertex_count: 3,
            index_format: IndexFormat::Uint16,
            index_byte_offset,
            index_count: 3,
            transform: transform_3x4(&Mat4::IDENTITY),
            opaque: true,
        }
    }

    #[test]
    fn payload_matches_shader_layout() {
        assert_eq!(size_of::<HitPayload>(), 32);
        assert_eq!(HitPayload::default().as_bytes().len(), 32);
    }

    #[test]
    fn ids_follow_insertion_order() {
        let mut table = GeometryTable::default();
        let a = table
            .push(descriptor(0), Material::CheckerboardFloor, Some(TextureId::Checkerboard))
            .unwrap();
        let b = table.push(descriptor(36), Material::Statue, None).unwrap();

        assert_eq!((a, b), (0, 1));
        let payload = table.entries()[1].payload;
        assert_eq!(payload.geometry_id, 1);
        assert_eq!(payload.index_offset, 18);
        assert_eq!(payload.texture_slot, -1);
        assert_eq!(payload.material, 2);
    }

    #[test]
    fn hit_records_come_in_pairs() {
        let mut table = GeometryTable::default();
        table.push(descriptor(0), Material::CheckerboardFloor, None).unwrap();
        table.push(descriptor(6), Material::Text, None).unwrap();

        let ids = table.hit_records().map(|p| p.geometry_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![0, 0, 1, 1]);
        assert_eq!(GeometryTable::hit_record_index(1, 1), 3);
    }

    #[test]
    fn misaligned_index_offset_is_rejected() {
        let mut table = GeometryTable::default();
        let err = table.push(descriptor(4), Material::Statue, None).unwrap_err();
        assert!(matches!(err, SceneError::MisalignedIndexOffset { byte_offset: 4 }));
        assert!(table.is_empty());
    }

    #[test]
    fn table_is_bounded_by_transform_count() {
        let mut table = GeometryTable::default();
        for _ in 0..MAX_GEOMETRIES {
            table.push(descriptor(0), Material::Statue, None).unwrap();
        }
        assert!(matches!(
            table.push(descriptor(0), Material::Statue, None),
            Err(SceneError::TooManyGeometries { .. })
        ));
    }

    #[test]
    fn vertex_slot_must_follow_index_slot() {
        assert!(check_buffer_slots(0, 1).is_ok());
        assert!(matches!(
            check_buffer_slots(0, 2),
            Err(SceneError::VertexSlotMismatch { .. })
        ));
    }

    #[test]
    fn transform_updates_need_a_known_geometry() {
        let mut table = GeometryTable::default();
        table.push(descriptor(0), Material::Statue, None).unwrap();

        let moved = Mat4::from_translation(vec3(0.0, 1.0, 0.0));
        table.update_transform(0, &moved).unwrap();
        assert_eq!(table.transforms()[0], transform_3x4(&moved));

        assert!(matches!(
            table.update_transform(1, &moved),
            Err(SceneError::UnknownGeometry { id: 1, len: 1 })
        ));
    }

    #[test]
    fn transform_is_row_major() {
        let m = transform_3x4(&Mat4::from_translation(vec3(1.0, 2.0, 3.0)));
        assert_eq!(m, [1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 2.0, 0.0, 0.0, 1.0, 3.0]);
    }
}
