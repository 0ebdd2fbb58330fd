use glam::Vec3;

use crate::{Index, Vertex};

struct Face {
    normal: Vec3,
    corners: [[f32; 3]; 4],
    // multiplied by the uv scale
    uvs: [[f32; 2]; 4],
}

const FACES: [Face; 6] = [
    // top
    Face {
        normal: Vec3::new(0.0, 1.0, 0.0),
        corners: [[-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]],
        uvs: [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
    },
    // bottom, never seen
    Face {
        normal: Vec3::new(0.0, -1.0, 0.0),
        corners: [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]],
        uvs: [[0.0, 0.0]; 4],
    },
    // left
    Face {
        normal: Vec3::new(-1.0, 0.0, 0.0),
        corners: [[-1.0, -1.0, 1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0]],
        uvs: [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
    },
    // right
    Face {
        normal: Vec3::new(1.0, 0.0, 0.0),
        corners: [[1.0, -1.0, 1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0]],
        uvs: [[1.0, 1.0], [0.0, 1.0], [0.0, 0.0], [1.0, 0.0]],
    },
    // front, facing the camera
    Face {
        normal: Vec3::new(0.0, 0.0, -1.0),
        corners: [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]],
        uvs: [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
    },
    // back
    Face {
        normal: Vec3::new(0.0, 0.0, 1.0),
        corners: [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]],
        uvs: [[1.0, 1.0], [0.0, 1.0], [0.0, 0.0], [1.0, 0.0]],
    },
];

// Per face, relative to its first vertex.
const FACE_INDICES: [[Index; 6]; 6] = [
    [3, 1, 0, 2, 1, 3],
    [2, 0, 1, 3, 0, 2],
    [3, 1, 0, 2, 1, 3],
    [2, 0, 1, 3, 0, 2],
    [3, 1, 0, 2, 1, 3],
    [2, 0, 1, 0, 2, 3],
];

/// A 2x2x2 box centred on `translate` after scaling. Indices start at zero.
pub fn cube_vertices_and_indices(
    scale: Vec3,
    translate: Vec3,
    uv_scale: f32,
) -> (Vec<Vertex>, Vec<Index>) {
    let vertices = FACES
        .iter()
        .flat_map(|face| {
            face.corners.iter().zip(face.uvs).map(|(corner, [u, v])| {
                let position = Vec3::from_array(*corner) * scale + translate;
                Vertex::new(position, face.normal, [u * uv_scale, v * uv_scale])
            })
        })
        .collect();

    let indices = FACE_INDICES
        .iter()
        .enumerate()
        .flat_map(|(face, indices)| indices.map(|i| i + face as Index * 4))
        .collect();

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    fn triangle_normal(vertices: &[Vertex], tri: &[Index]) -> Vec3 {
        let [a, b, c] = [0, 1, 2].map(|i| Vec3::from_array(vertices[tri[i] as usize].position));
        (b - a).cross(c - a).normalize()
    }

    #[test]
    fn twenty_four_vertices_thirty_six_indices() {
        let (vertices, indices) = cube_vertices_and_indices(Vec3::ONE, Vec3::ZERO, 1.0);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn scale_and_translate_apply_to_positions() {
        let (vertices, _) = cube_vertices_and_indices(vec3(2.0, 1.0, 0.5), vec3(0.0, -4.0, 1.0), 1.0);
        assert_eq!(vertices[2].position, [2.0, -3.0, 1.5]);
    }

    #[test]
    fn uv_scale_tiles_the_top() {
        let (vertices, _) = cube_vertices_and_indices(Vec3::ONE, Vec3::ZERO, 10.0);
        assert_eq!(vertices[2].uv, [10.0, 10.0, 0.0]);
    }

    #[test]
    fn winding_is_consistent_per_face() {
        let (vertices, indices) = cube_vertices_and_indices(Vec3::ONE, Vec3::ZERO, 1.0);
        for face in indices.chunks(6) {
            let first = triangle_normal(&vertices, &face[..3]);
            let second = triangle_normal(&vertices, &face[3..]);
            assert!(first.dot(second) > 0.99);
            let stored = Vec3::from_array(vertices[face[0] as usize].normal);
            assert!(first.dot(stored).abs() > 0.99);
        }
    }
}
