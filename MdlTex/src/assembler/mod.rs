//! Texture assembly
//!
//! Turns the source files of one texture into an [`MdlTexture`]. The build
//! strategy is chosen in this order:
//!
//! 1. files that conflict (two files for one band, or overlays on a texture
//!    without color remapping) are rejected,
//! 2. an indexed main image with `preserve-palette` is used as-is,
//! 3. `dm_base`, `remapX` and model portrait textures are assembled from
//!    separately quantized bands (see [`remap`]),
//! 4. anything else is a single quantized image.

mod remap;

use crate::conversion::ConversionDirectory;
use crate::error::{Error, Result};
use crate::formats::indexed::{load_indexed, load_rgba};
use crate::formats::mdl::{MdlTexture, MdlTextureFlags, PALETTE_SIZE, TRANSPARENT_INDEX};
use crate::naming::{BandLayout, find_band_file, output_name};
use crate::quantize::{MedianCutQuantizer, QuantizeOptions, Quantizer};
use crate::settings::{ColorMask, SourceFileInfo};
use std::collections::HashSet;

/// Palette color used for the transparent index
pub const TRANSPARENT_COLOR: [u8; 3] = [0, 0, 255];

/// Result of assembling one texture
#[derive(Debug)]
pub enum AssembleOutcome {
    Built(MdlTexture),
    /// Inputs are unusable as configured; nothing was built
    Skipped(String),
    /// An input could not be read or processed
    Failed(Error),
}

/// Builds textures from source files with a [`Quantizer`]
#[derive(Debug, Clone, Default)]
pub struct TextureAssembler<Q: Quantizer = MedianCutQuantizer> {
    quantizer: Q,
}

impl<Q: Quantizer> TextureAssembler<Q> {
    pub fn new(quantizer: Q) -> Self {
        Self { quantizer }
    }

    /// Build the texture for a group of source files.
    ///
    /// Files with a converter are converted first, into `conversion`. The
    /// texture is named after the group's output name, with a `.bmp`
    /// extension. Never panics or returns early with an error: every
    /// problem ends up in the outcome.
    pub fn assemble(&self, texture_name: &str, files: &[SourceFileInfo], conversion: &ConversionDirectory) -> AssembleOutcome {
        match self.try_assemble(texture_name, files, conversion) {
            Ok(outcome) => outcome,
            Err(e) => AssembleOutcome::Failed(e),
        }
    }

    fn try_assemble(
        &self,
        texture_name: &str,
        files: &[SourceFileInfo],
        conversion: &ConversionDirectory,
    ) -> Result<AssembleOutcome> {
        if files
            .iter()
            .any(|f| f.settings.converter.is_some() && f.settings.converter_arguments.is_none())
        {
            return Ok(AssembleOutcome::Skipped(format!(
                "some input files for '{texture_name}' are missing converter arguments"
            )));
        }

        let files = conversion.convert_source_files(texture_name, files)?;
        if let Some(reason) = verify_source_files(texture_name, &files) {
            return Ok(AssembleOutcome::Skipped(reason));
        }

        let name = format!("{}.bmp", output_name(texture_name, &files));
        let main = find_band_file(&files, ColorMask::Main);

        if let Some(main) = main.filter(|f| f.settings.preserves_palette()) {
            tracing::debug!("Using palette of '{}' as-is", main.path().display());
            let indexed = load_indexed(main.path())?;
            let texture = MdlTexture::new(
                name,
                MdlTextureFlags::empty(),
                indexed.width,
                indexed.height,
                indexed.indices,
                indexed.palette,
            )?;
            return Ok(AssembleOutcome::Built(texture));
        }

        if let Some(layout) = BandLayout::for_group(texture_name, &files) {
            if !layout.is_valid() {
                return Ok(AssembleOutcome::Skipped(format!(
                    "total color count for remap colors in '{texture_name}' does not fit in {PALETTE_SIZE} colors \
                     (color1 {} from {}, color2 {}, main {})",
                    layout.color1_count, layout.color1_start, layout.color2_count, layout.main_count
                )));
            }
            let swap_color_bands = files.iter().any(|f| f.settings.is_portrait());
            return remap::assemble_color_remap(&self.quantizer, name, &files, layout, swap_color_bands)
                .map(AssembleOutcome::Built);
        }

        let Some(main) = main else {
            return Ok(AssembleOutcome::Skipped(format!(
                "missing main input file for '{texture_name}', and texture does not support color remapping ({})",
                file_list(&files)
            )));
        };
        self.assemble_standard(name, main).map(AssembleOutcome::Built)
    }

    /// Single image, with index 255 reserved when it has transparent pixels
    fn assemble_standard(&self, name: String, file: &SourceFileInfo) -> Result<MdlTexture> {
        let image = load_rgba(file.path())?;
        let settings = &file.settings;
        let has_transparency = image.pixels().any(|p| settings.is_transparent(p.0));

        let options = QuantizeOptions {
            max_colors: if has_transparency { PALETTE_SIZE - 1 } else { PALETTE_SIZE },
            dithering: settings.dithering_or_default(),
            dither_scale: settings.dither_scale_or_default(),
        };
        let is_transparent = |pixel: [u8; 4]| has_transparency && settings.is_transparent(pixel);
        let indexed = self.quantizer.quantize(&image, &options, &is_transparent, &|_, _, _| false);

        let mut palette = indexed.palette;
        palette.resize(PALETTE_SIZE, [0, 0, 0]);
        let flags = if has_transparency {
            palette[TRANSPARENT_INDEX as usize] = TRANSPARENT_COLOR;
            MdlTextureFlags::MASKED
        } else {
            MdlTextureFlags::empty()
        };

        MdlTexture::new(name, flags, indexed.width, indexed.height, indexed.indices, palette)
    }
}

/// Reason to reject a group, if its files conflict
fn verify_source_files(texture_name: &str, files: &[SourceFileInfo]) -> Option<String> {
    let mut masks = HashSet::new();
    if !files.iter().all(|f| masks.insert(f.settings.color_mask_or_default())) {
        return Some(format!(
            "conflicting input files detected for '{texture_name}' ({})",
            file_list(files)
        ));
    }

    let has_overlays = files.iter().any(|f| f.settings.color_mask_or_default() != ColorMask::Main);
    if has_overlays && BandLayout::for_group(texture_name, files).is_none() {
        return Some(format!(
            "color1 and color2 overlays detected for '{texture_name}', which does not support color remapping ({})",
            file_list(files)
        ));
    }
    None
}

fn file_list(files: &[SourceFileInfo]) -> String {
    files
        .iter()
        .map(|f| f.path().display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{DitheringAlgorithm, FileFingerprint, TextureSettings};
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn source(path: &Path, settings: TextureSettings) -> SourceFileInfo {
        SourceFileInfo::new(FileFingerprint::unhashed(path), settings)
    }

    fn no_dither() -> TextureSettings {
        TextureSettings {
            dithering_algorithm: Some(DitheringAlgorithm::None),
            ..TextureSettings::default()
        }
    }

    fn built(outcome: AssembleOutcome) -> MdlTexture {
        match outcome {
            AssembleOutcome::Built(texture) => texture,
            other => panic!("expected a texture, got {other:?}"),
        }
    }

    #[test]
    fn test_standard_texture_without_transparency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wall.png");
        RgbaImage::from_fn(4, 2, |x, _| Rgba([x as u8 * 50, 0, 0, 255])).save(&path).unwrap();

        let conversion = ConversionDirectory::for_input(dir.path());
        let texture = built(TextureAssembler::<MedianCutQuantizer>::default().assemble(
            "wall",
            &[source(&path, no_dither())],
            &conversion,
        ));

        assert_eq!(texture.name, "wall.bmp");
        assert!(!texture.is_masked());
        assert_eq!((texture.width, texture.height), (4, 2));
        assert_eq!(&texture.palette[..4], &[[0, 0, 0], [50, 0, 0], [100, 0, 0], [150, 0, 0]]);
        assert_eq!(texture.image_data, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_standard_texture_with_transparency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grate.png");
        let mut image = RgbaImage::from_pixel(2, 2, Rgba([10, 10, 10, 255]));
        image.put_pixel(1, 1, Rgba([90, 90, 90, 20]));
        image.save(&path).unwrap();

        let conversion = ConversionDirectory::for_input(dir.path());
        let texture = built(TextureAssembler::<MedianCutQuantizer>::default().assemble(
            "grate",
            &[source(&path, no_dither())],
            &conversion,
        ));

        assert!(texture.is_masked());
        assert_eq!(texture.palette[255], TRANSPARENT_COLOR);
        assert_eq!(texture.image_data, vec![0, 0, 0, 255]);
    }

    #[test]
    fn test_transparency_color() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([0, 255, 0, 255]));
        image.put_pixel(0, 0, Rgba([255, 0, 255, 255]));
        image.save(&path).unwrap();

        let settings = TextureSettings {
            transparency_color: Some([255, 0, 255]),
            ..no_dither()
        };
        let conversion = ConversionDirectory::for_input(dir.path());
        let texture = built(TextureAssembler::<MedianCutQuantizer>::default().assemble(
            "leaf",
            &[source(&path, settings)],
            &conversion,
        ));
        assert!(texture.is_masked());
        assert_eq!(texture.image_data, vec![255, 0]);
        assert_eq!(texture.palette[0], [0, 255, 0]);
    }

    #[test]
    fn test_preserve_palette() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        let indexed = crate::formats::IndexedImage {
            width: 2,
            height: 1,
            indices: vec![1, 0],
            palette: vec![[1, 2, 3], [4, 5, 6]],
        };
        crate::formats::save_indexed(&indexed, &path).unwrap();

        let settings = TextureSettings {
            preserve_palette: Some(true),
            ..TextureSettings::default()
        };
        let conversion = ConversionDirectory::for_input(dir.path());
        let texture = built(TextureAssembler::<MedianCutQuantizer>::default().assemble(
            "logo",
            &[source(&path, settings)],
            &conversion,
        ));
        assert_eq!(texture.image_data, vec![1, 0]);
        assert_eq!(&texture.palette[..2], &[[1, 2, 3], [4, 5, 6]]);
        assert_eq!(texture.flags, MdlTextureFlags::empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_converted_remap_group() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("remap1.psd");
        let color1 = dir.path().join("remap1.color1.psd");
        RgbaImage::from_pixel(4, 4, Rgba([90, 60, 30, 255]))
            .save_with_format(&main, image::ImageFormat::Png)
            .unwrap();
        RgbaImage::from_fn(4, 4, |x, _| if x < 2 { Rgba([0, 0, 200, 255]) } else { Rgba([0, 0, 0, 0]) })
            .save_with_format(&color1, image::ImageFormat::Png)
            .unwrap();

        let converted = |color_mask| TextureSettings {
            color_mask,
            converter: Some("cp".to_string()),
            converter_arguments: Some("{input} {output}.png".to_string()),
            ..no_dither()
        };
        let files = [
            source(&main, converted(None)),
            source(&color1, converted(Some(ColorMask::Color1))),
        ];
        let conversion = ConversionDirectory::for_input(dir.path());
        let texture = built(TextureAssembler::<MedianCutQuantizer>::default().assemble("remap1", &files, &conversion));

        assert!(texture.name.starts_with("remap1_"), "unexpected name {}", texture.name);
        assert_eq!(texture.image_data[0], texture.image_data[1]);
        assert_ne!(texture.image_data[0], texture.image_data[2]);
    }

    #[test]
    fn test_oversized_palette_bmp_fails_its_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.bmp");
        let indexed = crate::formats::IndexedImage {
            width: 2,
            height: 2,
            indices: vec![0, 1, 1, 0],
            palette: vec![[1, 2, 3], [4, 5, 6]],
        };
        crate::formats::save_indexed(&indexed, &path).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[18..26].copy_from_slice(&[0xff, 0xff, 0xff, 0x7f, 0xff, 0xff, 0xff, 0x7f]);
        std::fs::write(&path, bytes).unwrap();

        let settings = TextureSettings {
            preserve_palette: Some(true),
            ..TextureSettings::default()
        };
        let conversion = ConversionDirectory::for_input(dir.path());
        let outcome =
            TextureAssembler::<MedianCutQuantizer>::default().assemble("logo", &[source(&path, settings)], &conversion);
        assert!(matches!(outcome, AssembleOutcome::Failed(_)));
    }

    #[test]
    fn test_conflicting_files_are_skipped() {
        let files = [
            source(Path::new("skin.png"), TextureSettings::default()),
            source(Path::new("skin.jpg"), TextureSettings::default()),
        ];
        let conversion = ConversionDirectory::for_input("unused");
        let outcome = TextureAssembler::<MedianCutQuantizer>::default().assemble("skin", &files, &conversion);
        assert!(matches!(outcome, AssembleOutcome::Skipped(reason) if reason.contains("conflicting")));
    }

    #[test]
    fn test_overlays_need_color_remapping() {
        let files = [
            source(Path::new("skin.png"), TextureSettings::default()),
            source(
                Path::new("skin.color1.png"),
                TextureSettings {
                    color_mask: Some(ColorMask::Color1),
                    ..TextureSettings::default()
                },
            ),
        ];
        let conversion = ConversionDirectory::for_input("unused");
        let outcome = TextureAssembler::<MedianCutQuantizer>::default().assemble("skin", &files, &conversion);
        assert!(matches!(outcome, AssembleOutcome::Skipped(reason) if reason.contains("overlays")));
    }

    #[test]
    fn test_missing_converter_arguments_are_skipped() {
        let files = [source(
            Path::new("skin.psd"),
            TextureSettings {
                converter: Some("magick".to_string()),
                ..TextureSettings::default()
            },
        )];
        let conversion = ConversionDirectory::for_input("unused");
        let outcome = TextureAssembler::<MedianCutQuantizer>::default().assemble("skin", &files, &conversion);
        assert!(matches!(outcome, AssembleOutcome::Skipped(_)));
    }

    #[test]
    fn test_unreadable_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let conversion = ConversionDirectory::for_input(dir.path());
        let outcome =
            TextureAssembler::<MedianCutQuantizer>::default().assemble("broken", &[source(&path, no_dither())], &conversion);
        assert!(matches!(outcome, AssembleOutcome::Failed(_)));
    }
}
