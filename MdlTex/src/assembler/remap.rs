//! Color remap textures
//!
//! Each band image (main, color1, color2) is quantized separately, limited
//! to the pixels it covers, and its colors are placed at the band's fixed
//! palette positions. Color2 covers wherever it is opaque, then color1,
//! and main covers the rest.

use crate::error::{Error, Result};
use crate::formats::indexed::load_rgba;
use crate::formats::mdl::{MdlTexture, MdlTextureFlags, PALETTE_SIZE, Rgb};
use crate::naming::{BandLayout, find_band_file};
use crate::quantize::{QuantizeOptions, Quantizer};
use crate::settings::{ColorMask, SourceFileInfo, TextureSettings};
use image::RgbaImage;

struct BandImage<'a> {
    mask: ColorMask,
    image: RgbaImage,
    settings: &'a TextureSettings,
}

pub(super) fn assemble_color_remap<Q: Quantizer>(
    quantizer: &Q,
    name: String,
    files: &[SourceFileInfo],
    layout: BandLayout,
    swap_color_bands: bool,
) -> Result<MdlTexture> {
    let bands = load_band_images(files, &layout)?;
    let Some(first) = bands.first() else {
        return Err(Error::InvalidSetting(format!("'{name}' has no color bands to build")));
    };
    let (width, height) = first.image.dimensions();

    let coverage = coverage_map(&bands, width, height);
    let mut image_data = vec![0u8; coverage.len()];
    let mut palette: Vec<Rgb> = vec![[0, 0, 0]; PALETTE_SIZE];

    for band in &bands {
        // Palette positions of this band, in order
        let slots: Vec<usize> = layout.ranges(band.mask).into_iter().flatten().collect();
        if slots.is_empty() {
            continue;
        }

        let options = QuantizeOptions {
            max_colors: slots.len(),
            dithering: band.settings.dithering_or_default(),
            dither_scale: band.settings.dither_scale_or_default(),
        };
        let is_excluded = |x: u32, y: u32, pixel: [u8; 4]| {
            coverage[(y * width + x) as usize] != band.mask || band.settings.is_transparent(pixel)
        };
        let indexed = quantizer.quantize(&band.image, &options, &|_| false, &is_excluded);

        for (slot, color) in slots.iter().zip(&indexed.palette) {
            palette[*slot] = *color;
        }
        for (i, (&mask, &local)) in coverage.iter().zip(&indexed.indices).enumerate() {
            if mask == band.mask {
                image_data[i] = slots.get(usize::from(local)).copied().unwrap_or(slots[0]) as u8;
            }
        }
    }

    if swap_color_bands && layout.color1_count > 0 && layout.color2_count > 0 {
        swap_color1_and_color2(&mut image_data, &mut palette, &layout);
    }

    MdlTexture::new(name, MdlTextureFlags::empty(), width, height, image_data, palette)
}

fn load_band_images<'a>(files: &'a [SourceFileInfo], layout: &BandLayout) -> Result<Vec<BandImage<'a>>> {
    let mut bands: Vec<BandImage<'a>> = Vec::new();
    for (mask, color_count) in [
        (ColorMask::Main, layout.main_count),
        (ColorMask::Color1, layout.color1_count),
        (ColorMask::Color2, layout.color2_count),
    ] {
        let Some(file) = find_band_file(files, mask) else {
            continue;
        };
        if color_count <= 0 {
            tracing::debug!("Ignoring '{}': its band has no colors", file.path().display());
            continue;
        }

        let image = load_rgba(file.path())?;
        if let Some(first) = bands.first()
            && first.image.dimensions() != image.dimensions()
        {
            return Err(Error::ImageSizeMismatch {
                path: file.path().to_path_buf(),
                width: first.image.width(),
                height: first.image.height(),
                actual_width: image.width(),
                actual_height: image.height(),
            });
        }

        bands.push(BandImage {
            mask,
            image,
            settings: &file.settings,
        });
    }
    Ok(bands)
}

/// Band per pixel: the last opaque overlay, color2 before color1, else main
fn coverage_map(bands: &[BandImage<'_>], width: u32, height: u32) -> Vec<ColorMask> {
    let mut coverage = vec![ColorMask::Main; width as usize * height as usize];
    for y in 0..height {
        for x in 0..width {
            let covering = bands
                .iter()
                .rev()
                .take_while(|band| band.mask != ColorMask::Main)
                .find(|band| !band.settings.is_transparent(band.image.get_pixel(x, y).0));
            if let Some(band) = covering {
                coverage[(y * width + x) as usize] = band.mask;
            }
        }
    }
    coverage
}

/// Model portraits show color1 and color2 the other way around in game.
///
/// The bands are exchanged after assembly instead of swapping the source
/// images, so overlapping overlays keep the same coverage.
fn swap_color1_and_color2(image_data: &mut [u8], palette: &mut [Rgb], layout: &BandLayout) {
    let color1 = layout.color1_start as usize..layout.color2_start() as usize;
    let color2 = layout.color2_start() as usize..(layout.color2_end() + 1) as usize;
    let (color1_count, color2_count) = (color1.len(), color2.len());

    for index in image_data.iter_mut() {
        let i = usize::from(*index);
        if color1.contains(&i) {
            *index = (i + color2_count) as u8;
        } else if color2.contains(&i) {
            *index = (i - color1_count) as u8;
        }
    }
    palette[color1.start..color2.end].rotate_left(color1_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{AssembleOutcome, TextureAssembler};
    use crate::conversion::ConversionDirectory;
    use crate::quantize::MedianCutQuantizer;
    use crate::settings::{DitheringAlgorithm, FileFingerprint};
    use image::Rgba;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const RED: Rgba<u8> = Rgba([200, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 200, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 200, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn band_file(dir: &Path, file_name: &str, image: &RgbaImage, settings: TextureSettings) -> SourceFileInfo {
        let path = dir.join(file_name);
        image.save(&path).unwrap();
        SourceFileInfo::new(
            FileFingerprint::unhashed(&path),
            TextureSettings {
                dithering_algorithm: Some(DitheringAlgorithm::None),
                ..settings
            },
        )
    }

    fn mask(mask: ColorMask, count: Option<u32>) -> TextureSettings {
        TextureSettings {
            color_mask: Some(mask),
            color_count: count,
            ..TextureSettings::default()
        }
    }

    /// 4x1 images: color1 opaque at x 0..=1, color2 opaque at x 1..=2
    fn overlapping_bands(dir: &Path, main_settings: TextureSettings) -> Vec<SourceFileInfo> {
        let main = RgbaImage::from_pixel(4, 1, RED);
        let color1 = RgbaImage::from_fn(4, 1, |x, _| if x <= 1 { GREEN } else { CLEAR });
        let color2 = RgbaImage::from_fn(4, 1, |x, _| if (1..=2).contains(&x) { BLUE } else { CLEAR });
        vec![
            band_file(dir, "remap1.png", &main, main_settings),
            band_file(dir, "remap1.color1.png", &color1, mask(ColorMask::Color1, None)),
            band_file(dir, "remap1.color2.png", &color2, mask(ColorMask::Color2, None)),
        ]
    }

    fn build(name: &str, files: &[SourceFileInfo], dir: &Path) -> MdlTexture {
        let conversion = ConversionDirectory::for_input(dir);
        match TextureAssembler::<MedianCutQuantizer>::default().assemble(name, files, &conversion) {
            AssembleOutcome::Built(texture) => texture,
            other => panic!("expected a texture, got {other:?}"),
        }
    }

    #[test]
    fn test_color2_covers_color1_covers_main() {
        let dir = tempfile::tempdir().unwrap();
        let files = overlapping_bands(dir.path(), mask(ColorMask::Main, None));
        let texture = build("remap1", &files, dir.path());

        // Color1 192..224, color2 224..256, main 0..192
        assert_eq!(texture.name, "remap1_192_223_255.bmp");
        assert_eq!(texture.image_data, vec![192, 224, 224, 0]);
        assert_eq!(texture.palette[0], [200, 0, 0]);
        assert_eq!(texture.palette[192], [0, 200, 0]);
        assert_eq!(texture.palette[224], [0, 0, 200]);
        assert_eq!(texture.flags, MdlTextureFlags::empty());
    }

    #[test]
    fn test_indices_stay_in_their_band() {
        let dir = tempfile::tempdir().unwrap();
        let main = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 90, 255]));
        let color1 = RgbaImage::from_fn(16, 16, |x, y| {
            if x < 8 { Rgba([0, (x * 30) as u8, (y * 15) as u8, 255]) } else { CLEAR }
        });
        let files = vec![
            band_file(dir.path(), "remap3.main 64.png", &main, mask(ColorMask::Main, Some(64))),
            band_file(dir.path(), "remap3.color1 16.png", &color1, mask(ColorMask::Color1, Some(16))),
        ];
        let texture = build("remap3", &files, dir.path());

        let layout = BandLayout::for_remap_group(&files);
        assert!(layout.is_main_split());
        for (i, &index) in texture.image_data.iter().enumerate() {
            let expected = if i % 16 < 8 { ColorMask::Color1 } else { ColorMask::Main };
            assert_eq!(layout.band_of(index), Some(expected), "pixel {i} has index {index}");
        }
        // Main wraps around: 0..64 and 80..256 are used, 64..80 belong to color1
        assert!(texture.image_data.iter().any(|&i| i >= 80));
    }

    #[test]
    fn test_dm_base_alone_uses_main_band() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbaImage::from_fn(8, 8, |x, y| Rgba([(x * 30) as u8, (y * 30) as u8, 10, 255]));
        let files = vec![band_file(dir.path(), "dm_base.png", &image, TextureSettings::default())];
        let texture = build("dm_base", &files, dir.path());

        assert_eq!(texture.name, "dm_base_160_191_223.bmp");
        assert!(texture.image_data.iter().all(|&i| i < 160));
        assert!(texture.palette[160..224].iter().all(|&c| c == [0, 0, 0]));
    }

    #[test]
    fn test_dm_base_with_many_colors_stays_below_color1() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbaImage::from_fn(32, 32, |x, y| Rgba([(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8, 255]));
        let files = vec![band_file(dir.path(), "dm_base.png", &image, TextureSettings::default())];
        let texture = build("dm_base", &files, dir.path());

        let highest = texture.image_data.iter().copied().max().unwrap();
        assert!(highest < 160, "highest index {highest}");
        assert!(highest > 100, "expected most of the main band to be used, got {highest}");
        assert!(texture.palette[160..].iter().all(|&c| c == [0, 0, 0]));
    }

    #[test]
    fn test_portrait_swaps_color_bands() {
        let dir = tempfile::tempdir().unwrap();
        let normal_files = overlapping_bands(dir.path(), mask(ColorMask::Main, Some(160)));
        let normal = build("remap1", &normal_files, dir.path());

        let portrait_settings = TextureSettings {
            is_model_portrait: Some(true),
            ..mask(ColorMask::Main, Some(160))
        };
        let portrait_files = overlapping_bands(dir.path(), portrait_settings);
        let portrait = build("remap1", &portrait_files, dir.path());

        assert_eq!(normal.image_data, vec![160, 192, 192, 0]);
        assert_eq!(portrait.image_data, vec![192, 160, 160, 0]);
        assert_eq!(&portrait.palette[160..192], &normal.palette[192..224]);
        assert_eq!(&portrait.palette[192..224], &normal.palette[160..192]);
        assert_eq!(&portrait.palette[..160], &normal.palette[..160]);
        assert_eq!(&portrait.palette[224..], &normal.palette[224..]);
    }

    #[test]
    fn test_band_sizes_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            band_file(dir.path(), "remap1.png", &RgbaImage::from_pixel(4, 4, RED), TextureSettings::default()),
            band_file(
                dir.path(),
                "remap1.color1.png",
                &RgbaImage::from_pixel(2, 2, GREEN),
                mask(ColorMask::Color1, None),
            ),
        ];
        let conversion = ConversionDirectory::for_input(dir.path());
        let outcome = TextureAssembler::<MedianCutQuantizer>::default().assemble("remap1", &files, &conversion);
        assert!(matches!(outcome, AssembleOutcome::Failed(Error::ImageSizeMismatch { .. })));
    }

    #[test]
    fn test_swap_moves_indices_between_bands() {
        let layout = BandLayout {
            main_count: 192,
            color1_start: 100,
            color1_count: 8,
            color2_count: 4,
        };
        let mut data = vec![99, 100, 107, 108, 111, 112];
        let mut palette: Vec<Rgb> = (0..=255u8).map(|i| [i, 0, 0]).collect();
        swap_color1_and_color2(&mut data, &mut palette, &layout);

        assert_eq!(data, vec![99, 104, 111, 100, 103, 112]);
        assert_eq!(palette[100], [108, 0, 0]);
        assert_eq!(palette[104], [100, 0, 0]);
        // Each pixel keeps its color
        assert_eq!(palette[usize::from(data[1])], [100, 0, 0]);
        assert_eq!(palette[usize::from(data[3])], [108, 0, 0]);
    }
}
