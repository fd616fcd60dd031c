//! Color quantization
//!
//! Reduces a full-color image to at most N palette colors plus one index
//! per pixel. The [`Quantizer`] trait is the seam used by the texture
//! assembler; [`MedianCutQuantizer`] is the implementation used by default.

mod median_cut;

use crate::formats::indexed::IndexedImage;
use crate::formats::mdl::{Rgb, TRANSPARENT_INDEX};
use crate::settings::DitheringAlgorithm;
use image::RgbaImage;
use std::collections::HashMap;

pub use median_cut::MedianCutQuantizer;

/// Parameters for a single quantization run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizeOptions {
    /// Maximum palette size (at most 256)
    pub max_colors: usize,
    pub dithering: DitheringAlgorithm,
    /// Scale applied to diffused error, 0..=1
    pub dither_scale: f32,
}

/// Reduces a full-color image to an indexed one.
///
/// Transparent pixels are left out of palette selection and get index 255.
/// Excluded pixels are also left out of palette selection, but still get
/// the nearest palette index.
pub trait Quantizer {
    fn quantize(
        &self,
        image: &RgbaImage,
        options: &QuantizeOptions,
        is_transparent: &dyn Fn([u8; 4]) -> bool,
        is_excluded: &dyn Fn(u32, u32, [u8; 4]) -> bool,
    ) -> IndexedImage;
}

/// Map pixels to the nearest palette color, with optional Floyd-Steinberg
/// error diffusion between included pixels.
pub(crate) fn map_to_palette(
    image: &RgbaImage,
    palette: &[Rgb],
    options: &QuantizeOptions,
    is_transparent: &dyn Fn([u8; 4]) -> bool,
    is_excluded: &dyn Fn(u32, u32, [u8; 4]) -> bool,
) -> Vec<u8> {
    let width = image.width() as usize;
    let mut indices = Vec::with_capacity(width * image.height() as usize);
    if palette.is_empty() {
        for pixel in image.pixels() {
            indices.push(if is_transparent(pixel.0) { TRANSPARENT_INDEX } else { 0 });
        }
        return indices;
    }

    let dither = options.dithering == DitheringAlgorithm::FloydSteinberg && options.dither_scale > 0.0;
    let mut nearest = NearestColor::new(palette);

    // Error for the current and next row, with one pixel of padding on each side
    let mut current_error = vec![[0.0f32; 3]; width + 2];
    let mut next_error = vec![[0.0f32; 3]; width + 2];

    for (y, row) in image.rows().enumerate() {
        for (x, pixel) in row.enumerate() {
            let rgba = pixel.0;
            if is_transparent(rgba) {
                indices.push(TRANSPARENT_INDEX);
                continue;
            }
            if !dither || is_excluded(x as u32, y as u32, rgba) {
                indices.push(nearest.find([rgba[0], rgba[1], rgba[2]]));
                continue;
            }

            let error = current_error[x + 1];
            let wanted = [0, 1, 2].map(|c| (f32::from(rgba[c]) + error[c]).clamp(0.0, 255.0));
            let index = nearest.find(wanted.map(|v| v.round() as u8));
            indices.push(index);

            let chosen = palette[index as usize];
            let diff = [0, 1, 2].map(|c| (wanted[c] - f32::from(chosen[c])) * options.dither_scale);
            for c in 0..3 {
                current_error[x + 2][c] += diff[c] * 7.0 / 16.0;
                next_error[x][c] += diff[c] * 3.0 / 16.0;
                next_error[x + 1][c] += diff[c] * 5.0 / 16.0;
                next_error[x + 2][c] += diff[c] * 1.0 / 16.0;
            }
        }

        std::mem::swap(&mut current_error, &mut next_error);
        next_error.fill([0.0; 3]);
    }

    indices
}

/// Nearest palette entry by squared RGB distance, cached per color
struct NearestColor<'a> {
    palette: &'a [Rgb],
    cache: HashMap<Rgb, u8>,
}

impl<'a> NearestColor<'a> {
    fn new(palette: &'a [Rgb]) -> Self {
        Self {
            palette,
            cache: HashMap::new(),
        }
    }

    fn find(&mut self, color: Rgb) -> u8 {
        if let Some(&index) = self.cache.get(&color) {
            return index;
        }

        let mut best_index = 0u8;
        let mut best_distance = u32::MAX;
        for (i, entry) in self.palette.iter().enumerate() {
            let distance: u32 = (0..3)
                .map(|c| {
                    let d = i32::from(color[c]) - i32::from(entry[c]);
                    (d * d) as u32
                })
                .sum();
            if distance < best_distance {
                best_distance = distance;
                best_index = i as u8;
                if distance == 0 {
                    break;
                }
            }
        }

        self.cache.insert(color, best_index);
        best_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(dithering: DitheringAlgorithm) -> QuantizeOptions {
        QuantizeOptions {
            max_colors: 256,
            dithering,
            dither_scale: 0.75,
        }
    }

    #[test]
    fn test_nearest_prefers_lowest_index_on_ties() {
        let palette = [[0, 0, 0], [10, 10, 10], [10, 10, 10]];
        let mut nearest = NearestColor::new(&palette);
        assert_eq!(nearest.find([9, 9, 9]), 1);
        assert_eq!(nearest.find([1, 1, 1]), 0);
    }

    #[test]
    fn test_transparent_pixels_get_index_255() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgba([10, 20, 30, 255]));
        image.put_pixel(1, 0, image::Rgba([10, 20, 30, 0]));

        let indices = map_to_palette(
            &image,
            &[[10, 20, 30]],
            &options(DitheringAlgorithm::FloydSteinberg),
            &|p| p[3] < 128,
            &|_, _, _| false,
        );
        assert_eq!(indices, vec![0, TRANSPARENT_INDEX]);
    }

    #[test]
    fn test_empty_palette_maps_to_zero() {
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]));
        let indices = map_to_palette(
            &image,
            &[],
            &options(DitheringAlgorithm::None),
            &|_| false,
            &|_, _, _| false,
        );
        assert_eq!(indices, vec![0; 4]);
    }

    #[test]
    fn test_dithering_mixes_colors() {
        // Mid grey between black and white dithers into both
        let image = RgbaImage::from_pixel(8, 8, image::Rgba([128, 128, 128, 255]));
        let palette = [[0, 0, 0], [255, 255, 255]];
        let dithered = map_to_palette(
            &image,
            &palette,
            &options(DitheringAlgorithm::FloydSteinberg),
            &|_| false,
            &|_, _, _| false,
        );
        assert!(dithered.contains(&0) && dithered.contains(&1));

        let flat = map_to_palette(&image, &palette, &options(DitheringAlgorithm::None), &|_| false, &|_, _, _| false);
        assert!(flat.iter().all(|&i| i == flat[0]));
    }
}
