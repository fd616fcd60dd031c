//! Indexed (palette) image I/O
//!
//! Full-color images go through the `image` crate. Palette images need their
//! palette and indices preserved exactly, so they are handled per format:
//! PNG via `png`, GIF via `gif`, and 8-bit (or lower) uncompressed BMP parsed
//! directly. Indexed BMP output uses the `image` BMP encoder's palette mode.

use crate::error::{Error, Result};
use crate::formats::mdl::Rgb;
use byteorder::{LittleEndian, ReadBytesExt};
use image::{ExtendedColorType, ImageFormat, RgbaImage};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Image extensions this crate can load
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "bmp", "gif", "jpg", "jpeg", "tga"];

/// An image stored as palette indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major, `width * height` entries
    pub indices: Vec<u8>,
    pub palette: Vec<Rgb>,
}

impl IndexedImage {
    /// Expand to RGBA, optionally treating one palette index as fully transparent.
    ///
    /// Indices outside the palette become black.
    #[must_use]
    pub fn to_rgba(&self, transparent_index: Option<u8>) -> RgbaImage {
        let mut image = RgbaImage::new(self.width, self.height);
        for (pixel, &index) in image.pixels_mut().zip(&self.indices) {
            let [r, g, b] = self.palette.get(index as usize).copied().unwrap_or([0, 0, 0]);
            let alpha = if Some(index) == transparent_index { 0 } else { 255 };
            *pixel = image::Rgba([r, g, b, alpha]);
        }
        image
    }

    fn flat_palette(&self) -> Vec<u8> {
        self.palette.iter().take(256).flatten().copied().collect()
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Whether the file extension is one of [`SUPPORTED_EXTENSIONS`]
#[must_use]
pub fn is_supported_image<P: AsRef<Path>>(path: P) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension(path.as_ref()).as_str())
}

/// Load any supported image as RGBA.
///
/// # Errors
/// Returns an error if the file cannot be read or decoded.
pub fn load_rgba<P: AsRef<Path>>(path: P) -> Result<RgbaImage> {
    let path = path.as_ref();
    if !is_supported_image(path) {
        return Err(Error::UnsupportedImageFormat {
            path: path.to_path_buf(),
        });
    }
    Ok(image::open(path)?.to_rgba8())
}

/// Save an RGBA image; the format follows the file extension.
///
/// # Errors
/// Returns an error if the extension is not supported or encoding fails.
pub fn save_rgba<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path).map_err(|_| Error::UnsupportedImageFormat {
        path: path.to_path_buf(),
    })?;

    match format {
        // No alpha channel in JPEG
        ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(image.clone())
            .to_rgb8()
            .save_with_format(path, format)?,
        ImageFormat::Png | ImageFormat::Bmp | ImageFormat::Gif | ImageFormat::Tga => {
            image.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedImageFormat {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Load a palette image without touching its palette or indices.
///
/// # Errors
/// Returns [`Error::NotIndexed`] if the file is a full-color image,
/// [`Error::UnsupportedImageFormat`] for formats without palette support,
/// or a decode error.
pub fn load_indexed<P: AsRef<Path>>(path: P) -> Result<IndexedImage> {
    let path = path.as_ref();
    match extension(path).as_str() {
        "png" => load_indexed_png(path),
        "gif" => load_indexed_gif(path),
        "bmp" => load_indexed_bmp(path),
        "jpg" | "jpeg" | "tga" => Err(Error::NotIndexed {
            path: path.to_path_buf(),
        }),
        _ => Err(Error::UnsupportedImageFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Save a palette image (PNG, GIF or BMP).
///
/// # Errors
/// Returns an error if the format cannot hold a palette or encoding fails.
pub fn save_indexed<P: AsRef<Path>>(image: &IndexedImage, path: P) -> Result<()> {
    let path = path.as_ref();
    match extension(path).as_str() {
        "png" => save_indexed_png(image, path),
        "gif" => save_indexed_gif(image, path),
        "bmp" => save_indexed_bmp(image, path),
        _ => Err(Error::UnsupportedImageFormat {
            path: path.to_path_buf(),
        }),
    }
}

// ============================================================================
// PNG
// ============================================================================

fn load_indexed_png(path: &Path) -> Result<IndexedImage> {
    let decode_err = |e: png::DecodingError| Error::IndexedDecodeFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut decoder = png::Decoder::new(BufReader::new(File::open(path)?));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().map_err(decode_err)?;

    let info = reader.info();
    if info.color_type != png::ColorType::Indexed {
        return Err(Error::NotIndexed {
            path: path.to_path_buf(),
        });
    }
    let palette: Vec<Rgb> = info
        .palette
        .as_ref()
        .map(|p| p.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
        .unwrap_or_default();

    let mut buffer = vec![0u8; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buffer).map_err(decode_err)?;
    let bits = frame.bit_depth as u8;

    let indices = unpack_rows(&buffer, frame.width, frame.height, frame.line_size, bits, false);
    Ok(IndexedImage {
        width: frame.width,
        height: frame.height,
        indices,
        palette,
    })
}

fn save_indexed_png(image: &IndexedImage, path: &Path) -> Result<()> {
    let encode_err = |e: png::EncodingError| Error::IndexedEncodeFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(writer, image.width, image.height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(image.flat_palette());

    let mut writer = encoder.write_header().map_err(encode_err)?;
    writer.write_image_data(&image.indices).map_err(encode_err)?;
    writer.finish().map_err(encode_err)?;
    Ok(())
}

// ============================================================================
// GIF
// ============================================================================

fn load_indexed_gif(path: &Path) -> Result<IndexedImage> {
    let decode_err = |e: gif::DecodingError| Error::IndexedDecodeFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options
        .read_info(BufReader::new(File::open(path)?))
        .map_err(decode_err)?;

    let width = u32::from(decoder.width());
    let height = u32::from(decoder.height());
    let global_palette = decoder.global_palette().map(<[u8]>::to_vec);

    let Some(frame) = decoder.read_next_frame().map_err(decode_err)? else {
        return Err(Error::IndexedDecodeFailed {
            path: path.to_path_buf(),
            message: "no image frames".to_string(),
        });
    };

    let flat = frame
        .palette
        .clone()
        .or(global_palette)
        .ok_or_else(|| Error::NotIndexed {
            path: path.to_path_buf(),
        })?;

    // Place the first frame on the logical screen
    let mut indices = vec![frame.transparent.unwrap_or(0); width as usize * height as usize];
    let frame_width = usize::from(frame.width);
    for (row, line) in frame.buffer.chunks_exact(frame_width.max(1)).enumerate() {
        let y = usize::from(frame.top) + row;
        if y >= height as usize {
            break;
        }
        for (col, &index) in line.iter().enumerate() {
            let x = usize::from(frame.left) + col;
            if x < width as usize {
                indices[y * width as usize + x] = index;
            }
        }
    }

    Ok(IndexedImage {
        width,
        height,
        indices,
        palette: flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
    })
}

fn save_indexed_gif(image: &IndexedImage, path: &Path) -> Result<()> {
    let encode_err = |e: gif::EncodingError| Error::IndexedEncodeFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let (Ok(width), Ok(height)) = (u16::try_from(image.width), u16::try_from(image.height)) else {
        return Err(Error::IndexedEncodeFailed {
            path: path.to_path_buf(),
            message: format!("{}x{} exceeds the GIF size limit", image.width, image.height),
        });
    };

    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = gif::Encoder::new(writer, width, height, &image.flat_palette()).map_err(encode_err)?;

    let frame = gif::Frame {
        width,
        height,
        buffer: Cow::Borrowed(&image.indices[..]),
        ..gif::Frame::default()
    };
    encoder.write_frame(&frame).map_err(encode_err)?;
    Ok(())
}

// ============================================================================
// BMP
// ============================================================================

const BMP_SIGNATURE: [u8; 2] = *b"BM";
const BMP_FILE_HEADER_SIZE: u64 = 14;
const BI_RGB: u32 = 0;

fn load_indexed_bmp(path: &Path) -> Result<IndexedImage> {
    let mut reader = BufReader::new(File::open(path)?);
    read_indexed_bmp(&mut reader, path)
}

fn read_indexed_bmp<R: Read + Seek>(reader: &mut R, path: &Path) -> Result<IndexedImage> {
    let invalid = |message: &str| Error::IndexedDecodeFailed {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let mut signature = [0u8; 2];
    reader.read_exact(&mut signature)?;
    if signature != BMP_SIGNATURE {
        return Err(invalid("missing BM signature"));
    }
    let _file_size = reader.read_u32::<LittleEndian>()?;
    let _reserved = reader.read_u32::<LittleEndian>()?;
    let data_offset = reader.read_u32::<LittleEndian>()?;

    let dib_size = reader.read_u32::<LittleEndian>()?;
    if dib_size < 40 {
        return Err(invalid("unsupported BMP header version"));
    }
    let width = reader.read_i32::<LittleEndian>()?;
    let height = reader.read_i32::<LittleEndian>()?;
    let _planes = reader.read_u16::<LittleEndian>()?;
    let bits = reader.read_u16::<LittleEndian>()?;
    let compression = reader.read_u32::<LittleEndian>()?;
    let _image_size = reader.read_u32::<LittleEndian>()?;
    let _x_ppm = reader.read_i32::<LittleEndian>()?;
    let _y_ppm = reader.read_i32::<LittleEndian>()?;
    let colors_used = reader.read_u32::<LittleEndian>()?;

    if !matches!(bits, 1 | 4 | 8) {
        return Err(Error::NotIndexed {
            path: path.to_path_buf(),
        });
    }
    if compression != BI_RGB {
        return Err(invalid("compressed BMP files are not supported"));
    }
    if width <= 0 || height == 0 {
        return Err(invalid("invalid BMP dimensions"));
    }

    let bottom_up = height > 0;
    let width = width.unsigned_abs();
    let height = height.unsigned_abs();

    let max_colors = 1u32 << bits;
    let color_count = if colors_used == 0 { max_colors } else { colors_used.min(max_colors) };

    // BGRA entries follow the DIB header
    reader.seek(SeekFrom::Start(BMP_FILE_HEADER_SIZE + u64::from(dib_size)))?;
    let mut palette = Vec::with_capacity(color_count as usize);
    for _ in 0..color_count {
        let mut bgra = [0u8; 4];
        reader.read_exact(&mut bgra)?;
        palette.push([bgra[2], bgra[1], bgra[0]]);
    }

    // Header dimensions are untrusted; the rows must fit in the file
    let stride = (u64::from(bits) * u64::from(width)).div_ceil(32) * 4;
    let file_length = reader.seek(SeekFrom::End(0))?;
    let available = file_length.saturating_sub(u64::from(data_offset));
    let row_bytes = stride
        .checked_mul(u64::from(height))
        .filter(|&size| size <= available)
        .ok_or_else(|| invalid("pixel data is larger than the file"))?;
    let stride = stride as usize;
    let mut rows = vec![0u8; row_bytes as usize];
    reader.seek(SeekFrom::Start(u64::from(data_offset)))?;
    reader.read_exact(&mut rows)?;

    let indices = unpack_rows(&rows, width, height, stride, bits as u8, bottom_up);
    Ok(IndexedImage {
        width,
        height,
        indices,
        palette,
    })
}

fn save_indexed_bmp(image: &IndexedImage, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let palette: Vec<Rgb> = image.palette.iter().take(256).copied().collect();
    image::codecs::bmp::BmpEncoder::new(&mut writer).encode_with_palette(
        &image.indices,
        image.width,
        image.height,
        ExtendedColorType::L8,
        Some(&palette),
    )?;
    writer.flush()?;
    Ok(())
}

/// Unpack 1/2/4/8-bit rows (MSB first) into one index per pixel
fn unpack_rows(data: &[u8], width: u32, height: u32, stride: usize, bits: u8, bottom_up: bool) -> Vec<u8> {
    let width = width as usize;
    let height = height as usize;
    let bits = usize::from(bits);
    let mask = ((1u16 << bits) - 1) as u8;

    let mut indices = Vec::with_capacity(width * height);
    for y in 0..height {
        let source_row = if bottom_up { height - 1 - y } else { y };
        let row = &data[source_row * stride..];
        for x in 0..width {
            let index = if bits == 8 {
                row[x]
            } else {
                let bit = x * bits;
                let shift = 8 - bits - (bit % 8);
                (row[bit / 8] >> shift) & mask
            };
            indices.push(index);
        }
    }
    indices
}
