//! Texture extraction
//!
//! Saves the textures of a model as images that can be edited and built
//! again. Color remap textures are split into a main image plus one overlay
//! image per remap band, with settings written into the file names so a
//! build puts every color back into its band.

use crate::error::{Error, Result};
use crate::formats::indexed::{load_indexed, save_indexed, save_rgba};
use crate::formats::mdl::{MdlTexture, MdlTextureFlags, TRANSPARENT_INDEX, read_textures_from_path};
use crate::naming::{
    BandLayout, group_name_for_model_texture, is_dm_base_texture, parse_remap_texture_name, texture_band_layout,
};
use crate::settings::{ColorMask, DEFAULT_REMAP_COLOR_COUNT, TextureSettings, insert_settings_into_filename};
use image::{Rgba, RgbaImage};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Image format of extracted files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractFormat {
    #[default]
    Png,
    Jpg,
    Gif,
    Bmp,
    Tga,
}

impl ExtractFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tga => "tga",
        }
    }

    /// Whether palette images can be saved in this format
    #[must_use]
    pub const fn supports_indexed(self) -> bool {
        matches!(self, Self::Png | Self::Gif | Self::Bmp)
    }
}

impl fmt::Display for ExtractFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExtractFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "gif" => Ok(Self::Gif),
            "bmp" => Ok(Self::Bmp),
            "tga" => Ok(Self::Tga),
            _ => Err(Error::InvalidUsage(format!("unsupported image format: '{s}'"))),
        }
    }
}

/// Options for [`extract_textures`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub format: ExtractFormat,
    /// Save every texture as a single palette image
    pub indexed: bool,
    pub overwrite: bool,
}

/// Extract all textures of a model (including its `T.mdl` textures and a
/// `<model>.bmp` portrait) into `output_directory`.
///
/// Returns the number of image files created. Textures that fail are
/// logged and skipped.
///
/// # Errors
/// Returns [`Error::InvalidUsage`] for a missing model or an indexed
/// extraction to a format without palettes, and an error if the model
/// cannot be read.
pub fn extract_textures(model_path: &Path, output_directory: &Path, options: &ExtractOptions) -> Result<usize> {
    if !model_path.is_file() {
        return Err(Error::InvalidUsage(format!(
            "Unable to extract textures: '{}' is not a file.",
            model_path.display()
        )));
    }
    if options.indexed && !options.format.supports_indexed() {
        return Err(Error::InvalidUsage(format!(
            "Unable to extract indexed textures as {}: use png, gif or bmp.",
            options.format
        )));
    }

    tracing::info!(
        "Extracting textures from '{}' and saving the result to '{}'",
        model_path.display(),
        output_directory.display()
    );
    let mut textures: Vec<(MdlTexture, bool)> = read_textures_from_path(model_path, true)?
        .into_iter()
        .map(|texture| (texture, false))
        .collect();
    if let Some(portrait) = load_model_portrait(model_path) {
        textures.push((portrait, true));
    }

    std::fs::create_dir_all(output_directory)?;

    let mut created = 0;
    for (texture, is_portrait) in &textures {
        tracing::info!("Extracting '{}'", texture.name);
        let result = if options.indexed {
            extract_indexed(texture, output_directory, options)
        } else {
            extract_editable(texture, *is_portrait, output_directory, options)
        };
        match result {
            Ok(count) => created += count,
            Err(e) => tracing::error!("Failed to extract '{}': {e}", texture.name),
        }
    }

    tracing::info!(
        "Extracted {created} images from {} textures from '{}'",
        textures.len(),
        model_path.display()
    );
    Ok(created)
}

/// `<model>.bmp` next to the model, if there is one
fn load_model_portrait(model_path: &Path) -> Option<MdlTexture> {
    let path = model_path.with_extension("bmp");
    if !path.is_file() {
        return None;
    }

    let name = path.file_name()?.to_string_lossy().into_owned();
    let texture = load_indexed(&path).and_then(|indexed| {
        MdlTexture::new(
            name,
            MdlTextureFlags::empty(),
            indexed.width,
            indexed.height,
            indexed.indices,
            indexed.palette,
        )
    });
    match texture {
        Ok(texture) => Some(texture),
        Err(e) => {
            tracing::warn!("Failed to open model portrait '{}', skipping file: {e}", path.display());
            None
        }
    }
}

fn extract_indexed(texture: &MdlTexture, output_directory: &Path, options: &ExtractOptions) -> Result<usize> {
    let path = output_directory.join(Path::new(&texture.name).with_extension(options.format.extension()));
    if !may_write(&path, options) {
        return Ok(0);
    }
    save_indexed(&texture.to_indexed_image(), &path)?;
    Ok(1)
}

/// Main image plus remap band overlays
fn extract_editable(
    texture: &MdlTexture,
    is_portrait: bool,
    output_directory: &Path,
    options: &ExtractOptions,
) -> Result<usize> {
    let remap_layout = parse_remap_texture_name(&texture.name);
    let mut main_settings = TextureSettings::default();
    let base_name = if let Some(layout) = remap_layout {
        main_settings.color_mask = Some(ColorMask::Main);
        if layout.is_main_split() {
            main_settings.color_count = Some(layout.color1_start as u32);
        }
        group_name_for_model_texture(&texture.name)
    } else if is_dm_base_texture(&texture.name) {
        group_name_for_model_texture(&texture.name)
    } else {
        Path::new(&texture.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    if is_portrait {
        main_settings.is_model_portrait = Some(true);
    }

    let base_file_name = format!("{base_name}.{}", options.format.extension());
    let main_path = output_directory.join(insert_settings_into_filename(&base_file_name, &main_settings));
    if !may_write(&main_path, options) {
        return Ok(0);
    }

    let transparent_index = texture.is_masked().then_some(TRANSPARENT_INDEX);
    save_rgba(&texture.to_indexed_image().to_rgba(transparent_index), &main_path)?;
    let mut created = 1;

    let layout = if is_portrait {
        Some(BandLayout::LEGACY)
    } else {
        texture_band_layout(&texture.name)
    };
    let Some(layout) = layout else {
        return Ok(created);
    };

    for mask in [ColorMask::Color1, ColorMask::Color2] {
        let Some(range) = layout.ranges(mask).into_iter().next().filter(|r| !r.is_empty()) else {
            continue;
        };

        let count = range.len() as u32;
        // Portraits show color1 and color2 swapped
        let file_mask = match (is_portrait, mask) {
            (true, ColorMask::Color1) => ColorMask::Color2,
            (true, ColorMask::Color2) => ColorMask::Color1,
            _ => mask,
        };
        let overlay_settings = TextureSettings {
            color_mask: Some(file_mask),
            color_count: (count != DEFAULT_REMAP_COLOR_COUNT).then_some(count),
            ..TextureSettings::default()
        };

        let path = output_directory.join(insert_settings_into_filename(&base_file_name, &overlay_settings));
        if !may_write(&path, options) {
            continue;
        }
        save_rgba(&band_overlay(texture, &range), &path)?;
        created += 1;
    }
    Ok(created)
}

/// Pixels whose index lies in `range`; everything else transparent
fn band_overlay(texture: &MdlTexture, range: &std::ops::Range<usize>) -> RgbaImage {
    let mut image = RgbaImage::new(texture.width, texture.height);
    for (pixel, &index) in image.pixels_mut().zip(&texture.image_data) {
        let index = usize::from(index);
        if range.contains(&index) {
            let [r, g, b] = texture.palette[index];
            *pixel = Rgba([r, g, b, 255]);
        }
    }
    image
}

fn may_write(path: &Path, options: &ExtractOptions) -> bool {
    if !options.overwrite && path.exists() {
        tracing::warn!("'{}' already exists, skipping", path.display());
        return false;
    }
    tracing::debug!("Creating image file '{}'", path.display());
    true
}
