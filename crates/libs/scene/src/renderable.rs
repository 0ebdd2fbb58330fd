use std::mem::size_of;
use std::ops::Range;

use glam::Mat4;

use crate::geometry::vertex_stride;
use crate::{
    transform_3x4, Animation, GeometryDescriptor, Index, IndexFormat, Material, TextureId,
    VertexFormat,
};

/// One object of the scene and its slice of the shared buffers.
#[derive(Debug, Clone)]
pub struct Renderable {
    pub name: &'static str,
    pub texture: Option<TextureId>,
    pub material: Material,
    base_transform: Mat4,
    current_transform: Mat4,
    pub animation: Option<Animation>,
    /// In vertices.
    pub vertex_range: Range<u32>,
    /// In indices.
    pub index_range: Range<u32>,
}

impl Renderable {
    pub fn new(name: &'static str, material: Material, texture: Option<TextureId>) -> Self {
        Self {
            name,
            texture,
            material,
            base_transform: Mat4::IDENTITY,
            current_transform: Mat4::IDENTITY,
            animation: None,
            vertex_range: 0..0,
            index_range: 0..0,
        }
    }

    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animation = Some(animation);
        self
    }

    pub fn set_base_transform(&mut self, transform: Mat4) {
        self.base_transform = transform;
        self.current_transform = self.animated(transform);
    }

    pub fn base_transform(&self) -> Mat4 {
        self.base_transform
    }

    /// Steps the animation `frames` times and returns the new world transform.
    pub fn advance_animation(&mut self, frames: u32) -> Mat4 {
        if let Some(animation) = self.animation.as_mut() {
            (0..frames).for_each(|_| animation.step());
        }
        self.current_transform = self.animated(self.base_transform);
        self.current_transform
    }

    pub fn net_transform(&self) -> Mat4 {
        self.current_transform
    }

    pub fn set_spin_enabled(&mut self, enabled: bool) {
        if let Some(animation) = self.animation.as_mut() {
            animation.set_spin_enabled(enabled);
        }
    }

    pub fn is_spinning(&self) -> bool {
        self.animation.map_or(false, |a| a.is_spinning())
    }

    fn animated(&self, base: Mat4) -> Mat4 {
        match self.animation {
            Some(animation) => base * animation.transform(),
            None => base,
        }
    }

    pub fn to_geometry_descriptor(
        &self,
        vertex_range: Range<u32>,
        index_range: Range<u32>,
    ) -> GeometryDescriptor {
        GeometryDescriptor {
            vertex_format: VertexFormat::R32G32B32Sfloat,
            vertex_stride: vertex_stride(),
            vertex_byte_offset: vertex_range.start as u64 * vertex_stride(),
            vertex_count: vertex_range.len() as u32,
            index_format: IndexFormat::Uint16,
            index_byte_offset: index_range.start as u64 * size_of::<Index>() as u64,
            index_count: index_range.len() as u32,
            transform: transform_3x4(&self.current_transform),
            opaque: true,
        }
    }

    pub fn geometry_descriptor(&self) -> GeometryDescriptor {
        self.to_geometry_descriptor(self.vertex_range.clone(), self.index_range.clone())
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    #[test]
    fn static_renderable_keeps_its_base() {
        let mut floor = Renderable::new("floor", Material::CheckerboardFloor, None);
        let base = Mat4::from_translation(vec3(0.0, -4.0, 30.0));
        floor.set_base_transform(base);
        assert_eq!(floor.advance_animation(10), base);
    }

    #[test]
    fn animation_is_applied_in_object_space() {
        let mut text = Renderable::new("text", Material::Text, Some(TextureId::Text))
            .with_animation(Animation::default());
        let base = Mat4::from_scale(vec3(2.0, 2.0, 2.0));
        text.set_base_transform(base);

        let lift = text.animation.map(|a| a.transform()).unwrap();
        assert_eq!(text.net_transform(), base * lift);
        assert!(text.net_transform().w_axis.y > 0.0);
    }

    #[test]
    fn descriptor_offsets_are_in_bytes() {
        let mut statue = Renderable::new("statue", Material::Statue, None);
        statue.vertex_range = 24..30;
        statue.index_range = 36..42;

        let descriptor = statue.geometry_descriptor();
        assert_eq!(descriptor.vertex_byte_offset, 24 * 36);
        assert_eq!(descriptor.index_byte_offset, 72);
        assert_eq!(descriptor.primitive_count(), 2);
        assert!(descriptor.opaque);
    }
}
