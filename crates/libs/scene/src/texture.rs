use std::path::Path;

use cfg_if::cfg_if;
use image::io::Reader as ImageReader;
use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use resource_manager::{ResourceError, ResourceKind, Resources};
use strum::IntoEnumIterator;

use crate::{Result, TextureId};

pub const TEXT_TEXTURE_WIDTH: u32 = 256;
pub const TEXT_TEXTURE_HEIGHT: u32 = 128;

const FALLBACK_SIZE: u32 = 256;

/// Decoded RGBA8 pixels of one texture.
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub id: TextureId,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub source: Option<String>,
}

impl TextureImage {
    pub fn load_image<P: AsRef<Path>>(id: TextureId, p: P) -> Result<Self> {
        let source = p.as_ref().to_str().map(|s| s.to_string());
        let img = ImageReader::open(p)
            .map_err(image::ImageError::IoError)?
            .decode()?
            .to_rgba8();

        let (width, height) = img.dimensions();
        info!("Texture {id:?}: {source:?} {width}x{height}");
        Ok(Self {
            id,
            pixels: img.into_raw(),
            width,
            height,
            source,
        })
    }

    pub fn filled(id: TextureId, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            id,
            pixels: rgba.repeat((width * height) as usize),
            width,
            height,
            source: None,
        }
    }

    /// Stand-in for a texture whose image file is missing.
    pub fn procedural(id: TextureId) -> Self {
        let size = FALLBACK_SIZE;
        match id {
            TextureId::Checkerboard => Self::from_fn(id, size, size, |x, y| {
                if (x / 32 + y / 32) % 2 == 0 {
                    [255, 255, 255, 255]
                } else {
                    [40, 40, 40, 255]
                }
            }),
            TextureId::Cityscape => {
                let mut rng = StdRng::seed_from_u64(0x5eed);
                let skyline = (0..size / 16)
                    .map(|_| rng.gen_range(size / 4..size * 3 / 4))
                    .collect::<Vec<_>>();
                Self::from_fn(id, size, size, |x, y| {
                    let top = size - skyline[(x / 16) as usize];
                    if y >= top {
                        [30, 20, 60, 255]
                    } else {
                        let t = (y * 255 / size) as u8;
                        [255 - t / 2, 80 + t / 3, 160, 255]
                    }
                })
            }
            TextureId::TvNoise => {
                let mut rng = StdRng::seed_from_u64(0x7f);
                Self::from_fn(id, size, size, |_, _| {
                    let v = rng.gen::<u8>();
                    [v, v, v, 255]
                })
            }
            TextureId::Text => Self::filled(id, TEXT_TEXTURE_WIDTH, TEXT_TEXTURE_HEIGHT, [255, 130, 156, 255]),
        }
    }

    fn from_fn(
        id: TextureId,
        width: u32,
        height: u32,
        mut pixel: impl FnMut(u32, u32) -> [u8; 4],
    ) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend(pixel(x, y));
            }
        }
        Self {
            id,
            pixels,
            width,
            height,
            source: None,
        }
    }
}

fn load_texture(resources: &Resources, id: TextureId) -> Result<TextureImage> {
    let Some(file_name) = id.file_name() else {
        return Ok(TextureImage::procedural(id));
    };

    match resources.find(ResourceKind::Texture, file_name) {
        Ok(path) => TextureImage::load_image(id, path),
        Err(err @ ResourceError::NotFound { .. }) => {
            warn!("{err}. Using a generated texture");
            Ok(TextureImage::procedural(id))
        }
        Err(err) => Err(err.into()),
    }
}

/// Decodes every texture of [`TextureId`], in declaration order.
pub fn load_textures(resources: &Resources) -> Result<Vec<TextureImage>> {
    let ids = TextureId::iter().collect::<Vec<_>>();
    cfg_if! {
        if #[cfg(feature = "rayon")] {
            use rayon::prelude::*;
            info!("Rayon enabled. Decoding {} textures", ids.len());
            ids.par_iter().map(|&id| load_texture(resources, id)).collect()
        } else {
            info!("Rayon disabled. Decoding {} textures", ids.len());
            ids.iter().map(|&id| load_texture(resources, id)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedural_textures_are_rgba() {
        for id in TextureId::iter() {
            let texture = TextureImage::procedural(id);
            assert_eq!(
                texture.pixels.len(),
                (texture.width * texture.height * 4) as usize
            );
        }
    }

    #[test]
    fn missing_files_fall_back() {
        let resources = Resources::new().with_root("/definitely/not/here");
        let textures = load_textures(&resources).unwrap();
        let ids = textures.iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids, TextureId::iter().collect::<Vec<_>>());
        let text = &textures[2];
        assert_eq!((text.width, text.height), (TEXT_TEXTURE_WIDTH, TEXT_TEXTURE_HEIGHT));
    }

    #[test]
    fn decodes_png_from_disk() {
        let dir = std::env::temp_dir().join("scene_texture_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tiny.png");
        image::RgbImage::from_pixel(2, 3, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let texture = TextureImage::load_image(TextureId::Cityscape, &path).unwrap();
        assert_eq!((texture.width, texture.height), (2, 3));
        assert_eq!(&texture.pixels[..4], &[1, 2, 3, 255]);
    }
}
