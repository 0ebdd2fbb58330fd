use glam::Vec3;

/// Index into the shared vertex buffer. Shaders fetch them as packed 16 bit pairs.
pub type Index = u16;

/// Vertex layout shared by the acceleration structures and the hit shaders.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 3],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: [uv[0], uv[1], 0.0],
        }
    }
}

#[test]
fn vertex_is_nine_packed_floats() {
    assert_eq!(std::mem::size_of::<Vertex>(), 36);
    assert_eq!(std::mem::align_of::<Vertex>(), 4);
}
