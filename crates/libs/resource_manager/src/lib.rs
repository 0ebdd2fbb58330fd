//! Locates shaders, textures, meshes and fonts on disk.

use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

const SPV_SEARCH_PATHS: [&str; 2] = ["", "./spv"];

const ASSET_SEARCH_PATHS: [&str; 3] = ["", "./assets", "../../../assets"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Spv,
    Texture,
    Mesh,
    Font,
}

impl ResourceKind {
    fn base_paths(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Spv => &SPV_SEARCH_PATHS,
            _ => &ASSET_SEARCH_PATHS,
        }
    }

    fn sub_dir(self) -> Option<&'static str> {
        match self {
            ResourceKind::Spv => None,
            ResourceKind::Texture => Some("textures"),
            ResourceKind::Mesh => Some("models"),
            ResourceKind::Font => Some("fonts"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Couldn't find {kind:?} file {name}, tried {tried:?}")]
    NotFound {
        kind: ResourceKind,
        name: String,
        tried: Vec<PathBuf>,
    },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Search path set. Extra roots are searched before the built-in ones.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    extra_roots: Vec<PathBuf>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.extra_roots.push(root.into());
        self
    }

    fn candidates(&self, kind: ResourceKind, name: &Path) -> Vec<PathBuf> {
        let roots = self
            .extra_roots
            .iter()
            .cloned()
            .chain(kind.base_paths().iter().map(PathBuf::from));

        roots
            .flat_map(|root| {
                let nested = kind.sub_dir().map(|dir| root.join(dir).join(name));
                std::iter::once(root.join(name)).chain(nested)
            })
            .collect()
    }

    pub fn find<P: AsRef<Path>>(&self, kind: ResourceKind, name: P) -> Result<PathBuf, ResourceError> {
        let name = name.as_ref();
        let tried = self.candidates(kind, name);

        match tried.iter().find(|p| p.is_file()) {
            Some(path) => {
                log::debug!("Found {kind:?} {} at {}", name.display(), path.display());
                Ok(path.clone())
            }
            None => Err(ResourceError::NotFound {
                kind,
                name: name.display().to_string(),
                tried,
            }),
        }
    }

    pub fn read<P: AsRef<Path>>(&self, kind: ResourceKind, name: P) -> Result<Vec<u8>, ResourceError> {
        let path = self.find(kind, name)?;
        fs::read(&path).map_err(|source| ResourceError::Io { path, source })
    }

    pub fn load_spv<P: AsRef<Path>>(&self, name: P) -> Result<Vec<u8>, ResourceError> {
        self.read(ResourceKind::Spv, name)
    }
}

/// Reads a compiled shader from the default search paths.
pub fn load_spv<P: AsRef<Path>>(name: P) -> Result<Vec<u8>, ResourceError> {
    Resources::new().load_spv(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("resource_manager_{name}_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn finds_file_in_kind_sub_directory_of_extra_root() {
        let root = scratch_dir("sub_dir");
        fs::create_dir_all(root.join("textures")).unwrap();
        fs::write(root.join("textures").join("checker.png"), b"png").unwrap();

        let resources = Resources::new().with_root(&root);
        let found = resources.find(ResourceKind::Texture, "checker.png").unwrap();
        assert_eq!(found, root.join("textures").join("checker.png"));
        assert_eq!(resources.read(ResourceKind::Texture, "checker.png").unwrap(), b"png");

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn missing_file_reports_every_candidate() {
        let resources = Resources::new().with_root("/nonexistent-root");
        let err = resources
            .find(ResourceKind::Font, "no-such-font.ttf")
            .unwrap_err();

        match err {
            ResourceError::NotFound { kind, tried, .. } => {
                assert_eq!(kind, ResourceKind::Font);
                assert_eq!(tried[0], Path::new("/nonexistent-root/no-such-font.ttf"));
                assert_eq!(tried[1], Path::new("/nonexistent-root/fonts/no-such-font.ttf"));
                assert_eq!(tried.len(), 2 * (1 + ASSET_SEARCH_PATHS.len()));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn spv_paths_have_no_sub_directory() {
        let root = scratch_dir("spv");
        fs::write(root.join("shader.spv"), [3u8, 2, 35, 7]).unwrap();

        let resources = Resources::new().with_root(&root);
        assert_eq!(resources.load_spv("shader.spv").unwrap(), vec![3, 2, 35, 7]);
        assert!(load_spv("definitely-missing.spv").is_err());

        fs::remove_dir_all(root).unwrap();
    }
}
