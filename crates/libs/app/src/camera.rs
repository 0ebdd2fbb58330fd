use crate::types::*;

/// A camera that never moves. Only the aspect ratio follows the window.
///
/// The view is left-handed: +Z points into the screen and +X to the right, with
/// clip space depth in `0..1`. Shaders flip the pixel Y coordinate themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Point,
    pub target: Point,
    pub up: Vec3,
    pub fov: f32,
    pub aspect_ratio: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(eye: Point, target: Point, fov: f32, aspect_ratio: f32) -> Self {
        Self {
            eye,
            target,
            up: Vec3::y(),
            fov,
            aspect_ratio,
            z_near: 1.0,
            z_far: 125.0,
        }
    }

    pub fn fixed(aspect_ratio: f32) -> Self {
        Self::new(
            Point::new(0.0, 0.0, -5.0),
            Point::origin(),
            45.0,
            aspect_ratio,
        )
    }

    pub fn set_extent(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_lh(&self.eye, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let focal = 1.0 / (self.fov.to_radians() * 0.5).tan();
        let depth = self.z_far / (self.z_far - self.z_near);

        #[rustfmt::skip]
        let projection = Mat4::new(
            focal / self.aspect_ratio, 0.0, 0.0, 0.0,
            0.0, focal, 0.0, 0.0,
            0.0, 0.0, depth, -self.z_near * depth,
            0.0, 0.0, 1.0, 0.0,
        );
        projection
    }

    /// Maps a clip space position back to world space. Used by ray generation to
    /// turn a pixel into a primary ray direction.
    pub fn projection_to_world(&self) -> Mat4 {
        let view_projection = self.projection_matrix() * self.view_matrix();
        view_projection.try_inverse().unwrap_or_else(Mat4::identity)
    }

    pub fn position(&self) -> Vec4 {
        Vec4::new(self.eye.x, self.eye.y, self.eye.z, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unproject(camera: &Camera, x: f32, y: f32) -> Vec3 {
        let world = camera.projection_to_world() * Vec4::new(x, y, 0.0, 1.0);
        world.xyz() / world.w
    }

    #[test]
    fn center_ray_points_at_the_target() {
        let camera = Camera::fixed(16.0 / 9.0);
        let direction = (unproject(&camera, 0.0, 0.0) - camera.eye.coords).normalize();

        assert!((direction - Vec3::z()).norm() < 1e-4);
    }

    #[test]
    fn positive_clip_x_is_world_right() {
        let camera = Camera::fixed(1.0);
        let right = unproject(&camera, 1.0, 0.0);
        let up = unproject(&camera, 0.0, 1.0);

        assert!(right.x > 0.0);
        assert!(up.y > 0.0);
    }

    #[test]
    fn near_plane_sits_at_z_near() {
        let camera = Camera::fixed(1.0);
        let near = unproject(&camera, 0.0, 0.0);

        assert!((near.z - (camera.eye.z + camera.z_near)).abs() < 1e-3);
    }

    #[test]
    fn extent_updates_aspect_ratio() {
        let mut camera = Camera::fixed(1.0);
        camera.set_extent(1280, 720);
        assert!((camera.aspect_ratio - 1280.0 / 720.0).abs() < 1e-6);

        camera.set_extent(1280, 0);
        assert!((camera.aspect_ratio - 1280.0 / 720.0).abs() < 1e-6);
    }
}
