//! Half-Life `.mdl` (v10) texture storage
//!
//! Only the parts of the model format that hold textures are interpreted:
//! the header fields that locate the texture table and the skin table, the
//! fixed 80-byte texture records, and the per-texture pixel and palette
//! payload. Everything else in the file is left untouched.

mod reader;
mod writer;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::formats::indexed::IndexedImage;

pub use reader::{
    external_textures_path, read_skin_data, read_texture_infos, read_textures,
    read_textures_from_path,
};
pub use writer::{add_textures, replace_textures, write_standalone, write_standalone_file};

/// "IDST" file signature
pub const MDL_SIGNATURE: [u8; 4] = *b"IDST";

/// The only supported model version
pub const MDL_VERSION: i32 = 10;

/// Size of the v10 studio header
pub const HEADER_SIZE: usize = 244;

/// Size of the fixed-width, null-padded texture name field
pub const TEXTURE_NAME_SIZE: usize = 64;

/// Size of each record in the texture table (64 + 4 + 4 + 4 + 4 = 80 bytes)
pub const TEXTURE_INFO_SIZE: usize = 80;

/// Number of entries in every texture palette
pub const PALETTE_SIZE: usize = 256;

/// Size of a palette entry on disk (RGB, no alpha)
pub const PALETTE_ENTRY_SIZE: usize = 3;

/// Palette index used as the color key for masked textures
pub const TRANSPARENT_INDEX: u8 = 255;

// Header field offsets
pub(crate) const MODEL_NAME_OFFSET: u64 = 8;
pub(crate) const FILE_SIZE_OFFSET: u64 = 72;
pub(crate) const TEXTURE_COUNT_OFFSET: u64 = 180;
pub(crate) const SKIN_REF_COUNT_OFFSET: u64 = 192;

/// An RGB palette entry
pub type Rgb = [u8; 3];

bitflags! {
    /// Texture flags as stored in the texture record.
    ///
    /// Bits this crate does not interpret are kept as-is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MdlTextureFlags: u32 {
        const FLATSHADE = 0x01;
        const CHROME = 0x02;
        const FULLBRIGHT = 0x04;
        const MIPMAPS = 0x08;
        const ALPHA = 0x10;
        const ADDITIVE = 0x20;
        /// 1-bit transparency: index 255 is the color key
        const MASKED = 0x40;
    }
}

/// A texture with its pixel indices and palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdlTexture {
    pub name: String,
    pub flags: MdlTextureFlags,
    pub width: u32,
    pub height: u32,
    /// Row-major palette indices, `width * height` bytes
    pub image_data: Vec<u8>,
    /// Always exactly [`PALETTE_SIZE`] entries
    pub palette: Vec<Rgb>,
}

impl MdlTexture {
    /// Create a texture, padding the palette with black (or truncating it) to 256 entries.
    ///
    /// # Errors
    /// Returns [`Error::TextureDataMismatch`] if `image_data` is not `width * height` bytes.
    pub fn new(
        name: impl Into<String>,
        flags: MdlTextureFlags,
        width: u32,
        height: u32,
        image_data: Vec<u8>,
        mut palette: Vec<Rgb>,
    ) -> Result<Self> {
        let name = name.into();
        let expected = width as usize * height as usize;
        if image_data.len() != expected {
            return Err(Error::TextureDataMismatch {
                name,
                expected,
                actual: image_data.len(),
            });
        }

        palette.resize(PALETTE_SIZE, [0, 0, 0]);
        Ok(Self {
            name,
            flags,
            width,
            height,
            image_data,
            palette,
        })
    }

    /// Whether index 255 acts as a transparent color key
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.flags.contains(MdlTextureFlags::MASKED)
    }

    /// Size of this texture's payload: indices followed by the palette
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.image_data.len() + PALETTE_SIZE * PALETTE_ENTRY_SIZE
    }

    /// Copy of the pixels and palette as an indexed image
    #[must_use]
    pub fn to_indexed_image(&self) -> IndexedImage {
        IndexedImage {
            width: self.width,
            height: self.height,
            indices: self.image_data.clone(),
            palette: self.palette.clone(),
        }
    }
}

/// A record from the texture table (no pixel data)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdlTextureInfo {
    pub name: String,
    pub flags: MdlTextureFlags,
    pub width: u32,
    pub height: u32,
    /// Absolute file offset of the pixel indices
    pub data_offset: u32,
}

/// The skin table: which texture each skin reference uses, per skin family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdlSkinData {
    pub skin_ref_count: i32,
    pub skin_family_count: i32,
    /// `skin_ref_count * skin_family_count` texture indices
    pub texture_ids: Vec<i16>,
}

impl MdlSkinData {
    /// A single skin family where each reference points at the texture of the same index
    #[must_use]
    pub fn identity(texture_count: usize) -> Self {
        Self {
            skin_ref_count: texture_count as i32,
            skin_family_count: 1,
            texture_ids: (0..texture_count as i16).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pads_palette() {
        let texture = MdlTexture::new("a", MdlTextureFlags::empty(), 2, 1, vec![0, 1], vec![[1, 2, 3]]).unwrap();
        assert_eq!(texture.palette.len(), PALETTE_SIZE);
        assert_eq!(texture.palette[0], [1, 2, 3]);
        assert_eq!(texture.palette[255], [0, 0, 0]);
    }

    #[test]
    fn test_new_rejects_wrong_pixel_count() {
        let result = MdlTexture::new("a", MdlTextureFlags::empty(), 2, 2, vec![0; 3], Vec::new());
        assert!(matches!(result, Err(Error::TextureDataMismatch { expected: 4, actual: 3, .. })));
    }

    #[test]
    fn test_unknown_flag_bits_survive() {
        let flags = MdlTextureFlags::from_bits_retain(0x8000_0040);
        assert!(flags.contains(MdlTextureFlags::MASKED));
        assert_eq!(flags.bits(), 0x8000_0040);
    }
}
