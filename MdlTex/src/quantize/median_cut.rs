//! Median cut palette selection

use super::{QuantizeOptions, Quantizer, map_to_palette};
use crate::formats::indexed::IndexedImage;
use crate::formats::mdl::{PALETTE_SIZE, Rgb};
use image::RgbaImage;
use std::collections::BTreeMap;

/// Deterministic median cut quantizer.
///
/// If the included pixels use at most `max_colors` distinct colors, those
/// exact colors form the palette (sorted). Otherwise the color space is
/// split repeatedly at the pixel-weighted median of the box with the widest
/// channel range, and each box contributes its weighted average.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianCutQuantizer;

impl Quantizer for MedianCutQuantizer {
    fn quantize(
        &self,
        image: &RgbaImage,
        options: &QuantizeOptions,
        is_transparent: &dyn Fn([u8; 4]) -> bool,
        is_excluded: &dyn Fn(u32, u32, [u8; 4]) -> bool,
    ) -> IndexedImage {
        let mut histogram: BTreeMap<Rgb, u64> = BTreeMap::new();
        for (x, y, pixel) in image.enumerate_pixels() {
            if !is_transparent(pixel.0) && !is_excluded(x, y, pixel.0) {
                *histogram.entry([pixel[0], pixel[1], pixel[2]]).or_default() += 1;
            }
        }

        let max_colors = options.max_colors.min(PALETTE_SIZE);
        let palette = if histogram.len() <= max_colors {
            histogram.into_keys().collect()
        } else {
            median_cut(histogram.into_iter().collect(), max_colors)
        };

        let indices = map_to_palette(image, &palette, options, is_transparent, is_excluded);
        IndexedImage {
            width: image.width(),
            height: image.height(),
            indices,
            palette,
        }
    }
}

struct ColorBox {
    colors: Vec<(Rgb, u64)>,
}

impl ColorBox {
    /// Channel with the widest range, and that range
    fn widest_channel(&self) -> (usize, u8) {
        (0..3)
            .map(|c| {
                let (min, max) = self
                    .colors
                    .iter()
                    .fold((u8::MAX, u8::MIN), |(lo, hi), (color, _)| (lo.min(color[c]), hi.max(color[c])));
                (c, max.saturating_sub(min))
            })
            .max_by_key(|&(c, range)| (range, std::cmp::Reverse(c)))
            .unwrap_or((0, 0))
    }

    fn split(mut self) -> (Self, Self) {
        let (channel, _) = self.widest_channel();
        self.colors.sort_by_key(|&(color, _)| (color[channel], color));

        let total: u64 = self.colors.iter().map(|&(_, count)| count).sum();
        let mut running = 0;
        let mut split_at = 1;
        for (i, &(_, count)) in self.colors.iter().enumerate() {
            running += count;
            if running * 2 >= total {
                split_at = i + 1;
                break;
            }
        }
        // Both halves must be non-empty
        let split_at = split_at.clamp(1, self.colors.len() - 1);

        let upper = self.colors.split_off(split_at);
        (self, Self { colors: upper })
    }

    fn average(&self) -> Rgb {
        let total: u64 = self.colors.iter().map(|&(_, count)| count).sum::<u64>().max(1);
        [0, 1, 2].map(|c| {
            let sum: u64 = self.colors.iter().map(|&(color, count)| u64::from(color[c]) * count).sum();
            ((sum + total / 2) / total) as u8
        })
    }
}

fn median_cut(colors: Vec<(Rgb, u64)>, max_colors: usize) -> Vec<Rgb> {
    if max_colors == 0 {
        return Vec::new();
    }

    let mut boxes = vec![ColorBox { colors }];
    while boxes.len() < max_colors {
        // Widest splittable box; ties go to the earliest
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.colors.len() > 1)
            .map(|(i, b)| (i, b.widest_channel().1))
            .max_by_key(|&(i, range)| (range, std::cmp::Reverse(i)));

        let Some((index, _)) = candidate else {
            break;
        };
        let (lower, upper) = boxes.swap_remove(index).split();
        boxes.push(lower);
        boxes.push(upper);
    }

    let mut palette: Vec<Rgb> = boxes.iter().map(ColorBox::average).collect();
    palette.sort_unstable();
    palette
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DitheringAlgorithm;
    use pretty_assertions::assert_eq;

    fn options(max_colors: usize) -> QuantizeOptions {
        QuantizeOptions {
            max_colors,
            dithering: DitheringAlgorithm::None,
            dither_scale: 0.0,
        }
    }

    fn gradient() -> RgbaImage {
        RgbaImage::from_fn(16, 16, |x, y| image::Rgba([(x * 16) as u8, (y * 16) as u8, 0, 255]))
    }

    #[test]
    fn test_exact_palette_when_few_colors() {
        let mut image = RgbaImage::from_pixel(2, 2, image::Rgba([200, 0, 0, 255]));
        image.put_pixel(1, 1, image::Rgba([0, 0, 200, 255]));

        let result = MedianCutQuantizer.quantize(&image, &options(16), &|_| false, &|_, _, _| false);
        assert_eq!(result.palette, vec![[0, 0, 200], [200, 0, 0]]);
        assert_eq!(result.indices, vec![1, 1, 1, 0]);
    }

    #[test]
    fn test_palette_size_is_bounded() {
        let result = MedianCutQuantizer.quantize(&gradient(), &options(10), &|_| false, &|_, _, _| false);
        assert_eq!(result.palette.len(), 10);
        assert!(result.indices.iter().all(|&i| (i as usize) < 10));
    }

    #[test]
    fn test_deterministic() {
        let a = MedianCutQuantizer.quantize(&gradient(), &options(7), &|_| false, &|_, _, _| false);
        let b = MedianCutQuantizer.quantize(&gradient(), &options(7), &|_| false, &|_, _, _| false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_excluded_pixels_do_not_select_colors() {
        let image = RgbaImage::from_fn(4, 1, |x, _| {
            if x < 2 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 255, 0, 255])
            }
        });
        let result = MedianCutQuantizer.quantize(&image, &options(4), &|_| false, &|x, _, _| x >= 2);
        assert_eq!(result.palette, vec![[255, 0, 0]]);
        // Excluded pixels still map to the nearest color
        assert_eq!(result.indices, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_transparent_pixels_do_not_select_colors() {
        let mut image = RgbaImage::from_pixel(2, 1, image::Rgba([9, 9, 9, 255]));
        image.put_pixel(1, 0, image::Rgba([200, 200, 200, 0]));
        let result = MedianCutQuantizer.quantize(&image, &options(4), &|p| p[3] < 128, &|_, _, _| false);
        assert_eq!(result.palette, vec![[9, 9, 9]]);
        assert_eq!(result.indices, vec![0, 255]);
    }
}
