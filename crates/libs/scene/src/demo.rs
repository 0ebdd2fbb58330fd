use std::f32::consts::PI;
use std::ops::Range;

use glam::{vec3, Mat4, Vec3};
use log::{info, warn};
use resource_manager::{ResourceError, ResourceKind, Resources};

use crate::{
    cube_vertices_and_indices, Animation, GeometryTable, Index, Material, ObjDocument,
    Renderable, Result, SceneError, TextureId, Vertex, MAX_GEOMETRIES,
};

pub const STATUE_MESH: &str = "helios.obj";
pub const STATUE_OBJECT: &str = "Plane001";
pub const STATUE_SCALE: f32 = 0.007;

/// Geometry ids of the demo objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneObject {
    Floor = 0,
    Statue = 1,
    Cityscape = 2,
    Text = 3,
}

/// Floor, statue and two floating panels sharing one vertex and one index buffer.
#[derive(Debug, Clone)]
pub struct DemoScene {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<Index>,
    renderables: Vec<Renderable>,
}

impl DemoScene {
    /// Loads the statue mesh through `resources`, falling back to a cube when it is missing.
    pub fn load(resources: &Resources) -> Result<Self> {
        match resources.find(ResourceKind::Mesh, STATUE_MESH) {
            Ok(path) => {
                info!("Loading statue from {}", path.display());
                Self::build(&ObjDocument::load(path)?)
            }
            Err(err @ ResourceError::NotFound { .. }) => {
                warn!("{err}. Using a cube for the statue");
                let (vertices, indices) = cube_vertices_and_indices(Vec3::splat(0.5), Vec3::ZERO, 1.0);
                Self::with_statue_mesh(vertices, indices)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn build(obj: &ObjDocument) -> Result<Self> {
        let (vertices, indices) = obj.vertices_and_indices(STATUE_OBJECT, STATUE_SCALE)?;
        Self::with_statue_mesh(vertices, indices)
    }

    fn with_statue_mesh(statue_vertices: Vec<Vertex>, statue_indices: Vec<Index>) -> Result<Self> {
        let mut scene = Self {
            vertices: vec![],
            indices: vec![],
            renderables: Vec::with_capacity(MAX_GEOMETRIES),
        };

        // The statue goes first in the buffers but is geometry 1.
        let statue_ranges = scene.append(statue_vertices, statue_indices)?;

        let mut floor = Renderable::new(
            "floor",
            Material::CheckerboardFloor,
            Some(TextureId::Checkerboard),
        );
        scene.add_cube(&mut floor, vec3(50.0, 0.1, 30.0), vec3(0.0, -4.0, 30.0), 10.0)?;

        let mut statue = Renderable::new("statue", Material::Statue, None)
            .with_animation(Animation::default());
        (statue.vertex_range, statue.index_range) = statue_ranges;
        statue.set_base_transform(
            Mat4::from_translation(vec3(-1.5, 0.0, 0.0))
                * Mat4::from_rotation_z(PI)
                * Mat4::from_rotation_y(PI / 12.0)
                * Mat4::from_rotation_x(PI / 2.0),
        );

        let mut cityscape = Renderable::new(
            "cityscape",
            Material::Cityscape,
            Some(TextureId::Cityscape),
        )
        .with_animation(Animation::default().with_phase(400));
        scene.add_cube(&mut cityscape, vec3(1.354, 1.0, 0.1), vec3(1.5, -0.5, 3.0), 1.0)?;

        let mut text = Renderable::new("text", Material::Text, Some(TextureId::Text))
            .with_animation(Animation::default().with_phase(200));
        scene.add_cube(&mut text, vec3(1.911, 1.0, 0.1), vec3(1.5, 2.0, 3.0), 1.0)?;

        scene.renderables = vec![floor, statue, cityscape, text];
        info!(
            "Scene has {} vertices and {} indices",
            scene.vertices.len(),
            scene.indices.len()
        );

        Ok(scene)
    }

    fn add_cube(
        &mut self,
        renderable: &mut Renderable,
        scale: Vec3,
        translate: Vec3,
        uv_scale: f32,
    ) -> Result<()> {
        let (vertices, indices) = cube_vertices_and_indices(Vec3::ONE, Vec3::ZERO, uv_scale);
        (renderable.vertex_range, renderable.index_range) = self.append(vertices, indices)?;
        renderable.set_base_transform(Mat4::from_translation(translate) * Mat4::from_scale(scale));
        Ok(())
    }

    /// Appends a mesh whose indices start at zero, rebasing them on the shared buffer.
    fn append(
        &mut self,
        vertices: Vec<Vertex>,
        indices: Vec<Index>,
    ) -> Result<(Range<u32>, Range<u32>)> {
        let vertex_start = self.vertices.len();
        let count = vertex_start + vertices.len();
        if count > Index::MAX as usize + 1 {
            return Err(SceneError::IndexOverflow { count });
        }

        let index_start = self.indices.len();
        self.vertices.extend(vertices);
        self.indices
            .extend(indices.into_iter().map(|i| i + vertex_start as Index));

        Ok((
            vertex_start as u32..self.vertices.len() as u32,
            index_start as u32..self.indices.len() as u32,
        ))
    }

    pub fn renderables(&self) -> &[Renderable] {
        &self.renderables
    }

    pub fn renderable(&self, object: SceneObject) -> &Renderable {
        &self.renderables[object as usize]
    }

    pub fn geometry_table(&self) -> Result<GeometryTable> {
        GeometryTable::from_renderables(&self.renderables)
    }

    /// Steps every animated object once.
    pub fn advance_animations(&mut self) {
        self.renderables.iter_mut().for_each(|r| {
            r.advance_animation(1);
        });
    }

    /// Flips spin on every animated object independently. Returns whether the statue spins now.
    pub fn toggle_spin(&mut self) -> bool {
        self.renderables
            .iter_mut()
            .filter(|r| r.animation.is_some())
            .for_each(|r| {
                let spin = !r.is_spinning();
                r.set_spin_enabled(spin);
            });
        self.renderable(SceneObject::Statue).is_spinning()
    }

    pub fn net_transforms(&self) -> [Mat4; MAX_GEOMETRIES] {
        let mut transforms = [Mat4::IDENTITY; MAX_GEOMETRIES];
        transforms
            .iter_mut()
            .zip(&self.renderables)
            .for_each(|(t, r)| *t = r.net_transform());
        transforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUE: &str = "\
# object Plane001
v 0 0 0
v 100 0 0
v 0 100 0
vn 0 0 1
g Plane001
f 1//1 2//1 3//1
";

    fn scene() -> DemoScene {
        DemoScene::build(&ObjDocument::parse(STATUE).unwrap()).unwrap()
    }

    #[test]
    fn objects_are_in_geometry_order() {
        let scene = scene();
        let names = scene.renderables().iter().map(|r| r.name).collect::<Vec<_>>();
        assert_eq!(names, vec!["floor", "statue", "cityscape", "text"]);
        assert_eq!(scene.renderable(SceneObject::Text).texture, Some(TextureId::Text));
    }

    #[test]
    fn statue_leads_the_shared_buffers() {
        let scene = scene();
        assert_eq!(scene.vertices.len(), 3 + 3 * 24);
        assert_eq!(scene.indices.len(), 3 + 3 * 36);
        assert_eq!(scene.renderable(SceneObject::Statue).index_range, 0..3);
        assert_eq!(scene.renderable(SceneObject::Floor).vertex_range, 3..27);
        assert!((scene.vertices[1].position[0] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn indices_address_the_shared_vertex_buffer() {
        let scene = scene();
        let text = scene.renderable(SceneObject::Text);
        let range = text.index_range.start as usize..text.index_range.end as usize;
        assert!(scene.indices[range]
            .iter()
            .all(|&i| text.vertex_range.contains(&(i as u32))));
    }

    #[test]
    fn geometry_table_follows_renderables() {
        let scene = scene();
        let table = scene.geometry_table().unwrap();
        let payloads = table.payloads();

        assert_eq!(payloads.len(), 4);
        assert_eq!(payloads[0].index_offset, 3);
        assert_eq!(payloads[1].index_offset, 0);
        assert_eq!(payloads[3].material, Material::Text.id());
        assert!(payloads.iter().enumerate().all(|(i, p)| p.geometry_id == i as u32));
    }

    #[test]
    fn only_animated_objects_move() {
        let mut scene = scene();
        let before = scene.net_transforms();
        scene.advance_animations();
        let after = scene.net_transforms();

        assert_eq!(before[SceneObject::Floor as usize], after[SceneObject::Floor as usize]);
        assert_ne!(before[SceneObject::Text as usize], after[SceneObject::Text as usize]);
    }

    #[test]
    fn spin_toggles() {
        let mut scene = scene();
        let animated = [SceneObject::Statue, SceneObject::Cityscape, SceneObject::Text];

        assert!(scene.toggle_spin());
        assert!(animated.iter().all(|&o| scene.renderable(o).is_spinning()));
        assert!(!scene.renderable(SceneObject::Floor).is_spinning());
        assert!(scene.renderable(SceneObject::Floor).animation.is_none());

        assert!(!scene.toggle_spin());
        assert!(animated.iter().all(|&o| !scene.renderable(o).is_spinning()));
    }
}
