use app::camera::Camera;
use app::types::{Mat4, Vec4};
use scene::MAX_GEOMETRIES;

const LIGHT_POSITION: [f32; 4] = [-5.0, 24.8, -26.0, 0.0];
const LIGHT_AMBIENT: [f32; 4] = [0.5, 0.5, 0.5, 1.0];
const LIGHT_DIFFUSE: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

/// Mirrors the `SceneConstants` uniform block of the tracing shaders (std140).
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SceneConstants {
    pub projection_to_world: Mat4,
    pub camera_position: Vec4,
    pub light_position: Vec4,
    pub light_ambient: Vec4,
    pub light_diffuse: Vec4,
    pub per_geometry_transform: [Mat4; MAX_GEOMETRIES],
    pub floor_uv_displacement: Vec4,
}

impl SceneConstants {
    pub fn new(
        camera: &Camera,
        transforms: &[glam::Mat4; MAX_GEOMETRIES],
        floor_uv: &FloorScroll,
    ) -> Self {
        let [u, v] = floor_uv.offset();

        Self {
            projection_to_world: camera.projection_to_world(),
            camera_position: camera.position(),
            light_position: Vec4::from(LIGHT_POSITION),
            light_ambient: Vec4::from(LIGHT_AMBIENT),
            light_diffuse: Vec4::from(LIGHT_DIFFUSE),
            per_geometry_transform: transforms.map(|t| Mat4::from_column_slice(&t.to_cols_array())),
            floor_uv_displacement: Vec4::new(u, v, 0.0, 0.0),
        }
    }
}

/// Scrolls the floor texture a little every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FloorScroll {
    offset: [f32; 2],
}

impl FloorScroll {
    const STEP: [f32; 2] = [0.01 / 8.0, 0.01];
    const WRAP: f32 = 1000.0;

    pub fn step(&mut self) {
        for (offset, step) in self.offset.iter_mut().zip(Self::STEP) {
            *offset += step;
            if *offset > Self::WRAP {
                *offset = 0.0;
            }
        }
    }

    pub fn offset(&self) -> [f32; 2] {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use super::*;

    #[test]
    fn constants_match_the_std140_block() {
        // 5 matrices, 5 vectors
        assert_eq!(size_of::<SceneConstants>(), 5 * 64 + 5 * 16);
    }

    #[test]
    fn floor_scrolls_faster_along_v() {
        let mut scroll = FloorScroll::default();
        scroll.step();
        scroll.step();

        let [u, v] = scroll.offset();
        assert!((u - 0.0025).abs() < 1e-7);
        assert!((v - 0.02).abs() < 1e-7);
    }

    #[test]
    fn scroll_wraps_past_a_thousand() {
        let mut scroll = FloorScroll {
            offset: [0.0, 999.995],
        };
        scroll.step();
        let [u, v] = scroll.offset();
        assert_eq!(v, 0.0);
        assert!(u > 0.0);
    }

    #[test]
    fn geometry_transforms_keep_column_order() {
        let camera = Camera::fixed(1.0);
        let translation = glam::Mat4::from_translation(glam::vec3(1.0, 2.0, 3.0));
        let transforms = [translation; MAX_GEOMETRIES];

        let constants = SceneConstants::new(&camera, &transforms, &FloorScroll::default());
        let moved = constants.per_geometry_transform[2] * Vec4::new(0.0, 0.0, 0.0, 1.0);

        assert_eq!(moved, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(constants.camera_position, Vec4::new(0.0, 0.0, -5.0, 1.0));
        assert_eq!(constants.light_position.y, 24.8);
    }
}
