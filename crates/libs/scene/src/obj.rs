//! Reader for the subset of Wavefront OBJ the demo meshes use.

use std::path::{Path, PathBuf};

use glam::{vec3, Vec3};
use log::debug;
use thiserror::Error;

use crate::{Index, Vertex};

const OBJECT_PREFIX: &str = "# object ";
const DEFAULT_OBJECT: &str = "default";
const MAX_VERTICES: usize = Index::MAX as usize + 1;

#[derive(Debug, Error)]
pub enum ObjError {
    #[error("No object named {0}")]
    UnknownObject(String),
    #[error("Object {object} needs {count} vertices, more than 16 bit indices can address")]
    IndexOverflow { object: String, count: usize },
    #[error("Face of object {object} references {kind} {index}, only {available} defined")]
    BadIndex {
        object: String,
        kind: &'static str,
        index: u32,
        available: usize,
    },
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Face {
    // 1 based, as written in the file
    positions: [u32; 3],
    normals: Option<[u32; 3]>,
}

/// One named block of the file. Face indices address this object's own positions and normals.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjObject {
    pub name: String,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    faces: Vec<Face>,
}

impl ObjObject {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            positions: vec![],
            normals: vec![],
            faces: vec![],
        }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjDocument {
    objects: Vec<ObjObject>,
}

impl ObjDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ObjError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ObjError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc = Self::parse(&text)?;
        debug!(
            "Loaded {}: objects {:?}",
            path.display(),
            doc.object_names().collect::<Vec<_>>()
        );
        Ok(doc)
    }

    pub fn parse(text: &str) -> Result<Self, ObjError> {
        let mut doc = Self::default();
        let mut current = None;

        for (number, line) in text.lines().enumerate().map(|(n, l)| (n + 1, l.trim_end())) {
            if line.is_empty() {
                continue;
            }

            if let Some(name) = line.strip_prefix(OBJECT_PREFIX) {
                current = Some(doc.object_index(name.trim()));
            } else if let Some(name) = line.strip_prefix("g ") {
                current = Some(doc.object_index(name.trim()));
            } else if let Some(rest) = line.strip_prefix("v ") {
                let position = parse_vec3(rest, number)?;
                doc.current(&mut current).positions.push(position);
            } else if let Some(rest) = line.strip_prefix("vn ") {
                let normal = parse_vec3(rest, number)?;
                doc.current(&mut current).normals.push(normal);
            } else if let Some(rest) = line.strip_prefix("f ") {
                let faces = parse_face(rest, number)?;
                doc.current(&mut current).faces.extend(faces);
            }
        }

        Ok(doc)
    }

    fn object_index(&mut self, name: &str) -> usize {
        match self.objects.iter().position(|o| o.name == name) {
            Some(index) => index,
            None => {
                self.objects.push(ObjObject::new(name));
                self.objects.len() - 1
            }
        }
    }

    /// Object receiving the next line, the default one when none was named yet.
    fn current(&mut self, current: &mut Option<usize>) -> &mut ObjObject {
        let index = match *current {
            Some(index) => index,
            None => {
                let index = self.object_index(DEFAULT_OBJECT);
                *current = Some(index);
                index
            }
        };
        &mut self.objects[index]
    }

    pub fn object(&self, name: &str) -> Option<&ObjObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|o| o.name.as_str())
    }

    /// Flattens `object` into one vertex per face corner, positions multiplied by `scale`.
    ///
    /// Indices start at zero for the returned range.
    pub fn vertices_and_indices(
        &self,
        object: &str,
        scale: f32,
    ) -> Result<(Vec<Vertex>, Vec<Index>), ObjError> {
        let obj = self
            .object(object)
            .ok_or_else(|| ObjError::UnknownObject(object.to_string()))?;

        let count = obj.faces.len() * 3;
        if count > MAX_VERTICES {
            return Err(ObjError::IndexOverflow {
                object: object.to_string(),
                count,
            });
        }

        let mut vertices = Vec::with_capacity(count);
        for face in &obj.faces {
            for corner in 0..3 {
                let position = lookup(&obj.positions, face.positions[corner], object, "position")?;
                let normal = match face.normals {
                    Some(normals) => lookup(&obj.normals, normals[corner], object, "normal")?,
                    None => Vec3::ZERO,
                };
                vertices.push(Vertex::new(position * scale, normal, [0.5, 0.5]));
            }
        }
        let indices = (0..vertices.len()).map(|i| i as Index).collect();

        Ok((vertices, indices))
    }
}

fn lookup(values: &[Vec3], index: u32, object: &str, kind: &'static str) -> Result<Vec3, ObjError> {
    index
        .checked_sub(1)
        .and_then(|i| values.get(i as usize))
        .copied()
        .ok_or_else(|| ObjError::BadIndex {
            object: object.to_string(),
            kind,
            index,
            available: values.len(),
        })
}

fn parse_error(line: usize, message: impl Into<String>) -> ObjError {
    ObjError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_vec3(rest: &str, line: usize) -> Result<Vec3, ObjError> {
    let values = rest
        .split_whitespace()
        .take(3)
        .map(|v| v.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parse_error(line, e.to_string()))?;

    match values[..] {
        [x, y, z] => Ok(vec3(x, y, z)),
        _ => Err(parse_error(line, "expected three components")),
    }
}

fn parse_index(text: &str, line: usize) -> Result<u32, ObjError> {
    text.parse()
        .map_err(|_| parse_error(line, format!("invalid index {text:?}")))
}

/// Splits `v/vt/vn` into the position and normal index.
fn parse_corner(token: &str, line: usize) -> Result<(u32, u32), ObjError> {
    let mut parts = token.splitn(3, '/');
    let position = parts.next().unwrap_or_default();
    let normal = parts
        .nth(1)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| parse_error(line, format!("missing normal index in {token:?}")))?;

    Ok((parse_index(position, line)?, parse_index(normal, line)?))
}

/// Polygons are fanned into triangles around their first corner.
fn parse_face(rest: &str, line: usize) -> Result<Vec<Face>, ObjError> {
    let tokens = rest.split_whitespace().collect::<Vec<_>>();
    if tokens.len() < 3 {
        return Err(parse_error(line, "a face needs at least three corners"));
    }

    let with_normals = rest.contains('/');
    let corners = tokens
        .iter()
        .map(|token| {
            if with_normals {
                parse_corner(token, line).map(|(p, n)| (p, Some(n)))
            } else {
                parse_index(token, line).map(|p| (p, None))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let faces = (1..corners.len() - 1)
        .map(|i| {
            let [a, b, c] = [corners[0], corners[i], corners[i + 1]];
            Face {
                positions: [a.0, b.0, c.0],
                normals: with_normals.then(|| {
                    [a.1.unwrap_or_default(), b.1.unwrap_or_default(), c.1.unwrap_or_default()]
                }),
            }
        })
        .collect();

    Ok(faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "\
# object Plane001
v 1 2 3
v 4 5 6
v 7 8 9

vn 0 0 1
vn 0 1 0
vt 0.5 0.5 0
g Plane001
f 1/1/1 2/2/2 3/3/1
";

    #[test]
    fn triangle_with_normals() {
        let doc = ObjDocument::parse(TRIANGLE).unwrap();
        let (vertices, indices) = doc.vertices_and_indices("Plane001", 2.0).unwrap();

        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[0].position, [2.0, 4.0, 6.0]);
        assert_eq!(vertices[2].position, [14.0, 16.0, 18.0]);
        assert_eq!(vertices[1].normal, [0.0, 1.0, 0.0]);
        assert_eq!(vertices[2].normal, [0.0, 0.0, 1.0]);
        assert_eq!(vertices[0].uv, [0.5, 0.5, 0.0]);
    }

    #[test]
    fn object_and_group_lines_share_objects() {
        let doc = ObjDocument::parse(TRIANGLE).unwrap();
        assert_eq!(doc.object_names().collect::<Vec<_>>(), vec!["Plane001"]);
        assert_eq!(doc.object("Plane001").map(ObjObject::face_count), Some(1));
    }

    #[test]
    fn faces_without_normals_and_default_object() {
        let doc = ObjDocument::parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf 1 2 3 4\n").unwrap();
        let (vertices, indices) = doc.vertices_and_indices(DEFAULT_OBJECT, 1.0).unwrap();

        assert_eq!(indices.len(), 6);
        assert_eq!(vertices[3].position, [0.0, 0.0, 0.0]);
        assert_eq!(vertices[5].position, [1.0, 1.0, 0.0]);
        assert!(vertices.iter().all(|v| v.normal == [0.0; 3]));
    }

    #[test]
    fn objects_own_their_vertices() {
        let text = "\
# object First
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
g First
f 1//1 2//1 3//1
# object Second
v 5 5 5
v 6 5 5
v 5 6 5
vn 1 0 0
g Second
f 1//1 2//1 3//1
";
        let doc = ObjDocument::parse(text).unwrap();
        assert_eq!(doc.object("Second").map(ObjObject::position_count), Some(3));

        let (first, _) = doc.vertices_and_indices("First", 1.0).unwrap();
        let (second, indices) = doc.vertices_and_indices("Second", 1.0).unwrap();

        assert_eq!(first[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(second[0].position, [5.0, 5.0, 5.0]);
        assert_eq!(second[2].position, [5.0, 6.0, 5.0]);
        assert!(second.iter().all(|v| v.normal == [1.0, 0.0, 0.0]));
    }

    #[test]
    fn unknown_object() {
        let doc = ObjDocument::parse(TRIANGLE).unwrap();
        assert!(matches!(
            doc.vertices_and_indices("Teapot", 1.0),
            Err(ObjError::UnknownObject(name)) if name == "Teapot"
        ));
    }

    #[test]
    fn out_of_range_references() {
        let doc = ObjDocument::parse("v 0 0 0\nf 1 2 0\n").unwrap();
        assert!(matches!(
            doc.vertices_and_indices(DEFAULT_OBJECT, 1.0),
            Err(ObjError::BadIndex { index: 2, available: 1, .. })
        ));
    }

    #[test]
    fn malformed_lines_report_their_number() {
        let err = ObjDocument::parse("v 0 0 0\nv 1 x 0\n").unwrap_err();
        assert!(matches!(err, ObjError::Parse { line: 2, .. }));

        let err = ObjDocument::parse("f 1/1 2/2 3/3\n").unwrap_err();
        assert!(matches!(err, ObjError::Parse { line: 1, .. }));
    }

    #[test]
    fn too_many_corners_for_u16() {
        let mut text = String::from("v 0 0 0\n");
        for _ in 0..(MAX_VERTICES / 3 + 1) {
            text.push_str("f 1 1 1\n");
        }
        let doc = ObjDocument::parse(&text).unwrap();
        assert!(matches!(
            doc.vertices_and_indices(DEFAULT_OBJECT, 1.0),
            Err(ObjError::IndexOverflow { .. })
        ));
    }
}
