use strum_macros::{EnumCount, EnumIter, IntoStaticStr};

/// Shading model picked by the closest hit shader.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum Material {
    CheckerboardFloor = 1,
    Statue = 2,
    Cityscape = 3,
    Text = 4,
}

impl Material {
    pub fn id(self) -> u32 {
        self as u32
    }
}

/// Slot of a texture in the ray tracing texture table.
///
/// `TvNoise` is only sampled by the post-process pass.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum TextureId {
    Checkerboard = 0,
    Cityscape = 2,
    Text = 3,
    TvNoise = 4,
}

/// Capacity of the ray tracing texture table.
pub const TEXTURE_SLOTS: u32 = 5;

impl TextureId {
    pub fn slot(self) -> u32 {
        self as u32
    }

    /// Image file backing the texture. The text texture is painted at runtime.
    pub fn file_name(self) -> Option<&'static str> {
        match self {
            TextureId::Checkerboard => Some("checker.png"),
            TextureId::Cityscape => Some("Cityscape.png"),
            TextureId::TvNoise => Some("TVNoise.png"),
            TextureId::Text => None,
        }
    }
}

/// Shader side encoding of an optional texture.
pub fn texture_slot(texture: Option<TextureId>) -> i32 {
    texture.map_or(-1, |t| t.slot() as i32)
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn materials_are_numbered_from_one() {
        let ids = Material::iter().map(Material::id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn texture_slots_fit_the_table() {
        assert!(TextureId::iter().all(|t| t.slot() < TEXTURE_SLOTS));
        assert_eq!(texture_slot(None), -1);
        assert_eq!(texture_slot(Some(TextureId::Text)), 3);
    }
}
