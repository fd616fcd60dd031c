//! `.mdl` texture reading

use super::{
    MDL_SIGNATURE, MDL_VERSION, MdlSkinData, MdlTexture, MdlTextureFlags, MdlTextureInfo,
    PALETTE_ENTRY_SIZE, PALETTE_SIZE, Rgb, SKIN_REF_COUNT_OFFSET, TEXTURE_COUNT_OFFSET,
    TEXTURE_INFO_SIZE, TEXTURE_NAME_SIZE,
};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Path of the external texture file for a model: `<dir>/<stem>T.mdl`
#[must_use]
pub fn external_textures_path<P: AsRef<Path>>(model_path: P) -> PathBuf {
    let model_path = model_path.as_ref();
    let stem = model_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();
    model_path.with_file_name(format!("{stem}T.mdl"))
}

/// Read the texture table (names, flags, sizes and data offsets).
///
/// # Errors
///
/// Returns [`Error::InvalidMdlSignature`] or [`Error::UnsupportedMdlVersion`] for
/// files that are not v10 models, and [`Error::InvalidMdlStructure`] if the
/// texture table does not fit in the stream.
pub fn read_texture_infos<R: Read + Seek>(reader: &mut R) -> Result<Vec<MdlTextureInfo>> {
    verify_header(reader)?;
    read_texture_table(reader)
}

/// Read all textures stored in the given model stream.
///
/// # Errors
/// Returns an error if the header is invalid or a texture lies outside the stream.
pub fn read_textures<R: Read + Seek>(reader: &mut R) -> Result<Vec<MdlTexture>> {
    let infos = read_texture_infos(reader)?;
    let stream_len = reader.seek(SeekFrom::End(0))?;

    let mut textures = Vec::with_capacity(infos.len());
    for info in infos {
        let pixel_count = info.width as usize * info.height as usize;
        let end = u64::from(info.data_offset) + (pixel_count + PALETTE_SIZE * PALETTE_ENTRY_SIZE) as u64;
        if end > stream_len {
            return Err(Error::InvalidMdlStructure {
                message: format!(
                    "texture '{}' data ends at {end}, beyond the end of the file ({stream_len})",
                    info.name
                ),
            });
        }

        reader.seek(SeekFrom::Start(u64::from(info.data_offset)))?;
        let mut image_data = vec![0u8; pixel_count];
        reader.read_exact(&mut image_data)?;
        let palette = read_palette(reader)?;

        textures.push(MdlTexture::new(
            info.name,
            info.flags,
            info.width,
            info.height,
            image_data,
            palette,
        )?);
    }

    Ok(textures)
}

/// Read textures from a model file on disk.
///
/// If the model has no embedded textures and `include_external` is set, the
/// sibling `<model>T.mdl` file is read instead (when it exists).
///
/// # Errors
/// Returns an error if either file cannot be read or is not a valid v10 model.
pub fn read_textures_from_path<P: AsRef<Path>>(
    path: P,
    include_external: bool,
) -> Result<Vec<MdlTexture>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let textures = read_textures(&mut reader)?;

    if textures.is_empty() && include_external {
        let external_path = external_textures_path(path);
        if external_path.is_file() {
            tracing::debug!("Reading external textures from {}", external_path.display());
            let mut reader = BufReader::new(File::open(&external_path)?);
            return read_textures(&mut reader);
        }
    }

    Ok(textures)
}

/// Read the skin table.
///
/// # Errors
/// Returns an error if the header is invalid or the table lies outside the stream.
pub fn read_skin_data<R: Read + Seek>(reader: &mut R) -> Result<MdlSkinData> {
    verify_header(reader)?;

    reader.seek(SeekFrom::Start(SKIN_REF_COUNT_OFFSET))?;
    let skin_ref_count = reader.read_i32::<LittleEndian>()?;
    let skin_family_count = reader.read_i32::<LittleEndian>()?;
    let skin_offset = reader.read_i32::<LittleEndian>()?;

    let count = checked_count(skin_ref_count, "skin reference count")?
        * checked_count(skin_family_count, "skin family count")?;
    let offset = checked_offset(skin_offset, "skin data offset")?;

    let stream_len = reader.seek(SeekFrom::End(0))?;
    if offset + (count * 2) as u64 > stream_len {
        return Err(Error::InvalidMdlStructure {
            message: format!("skin table ({count} entries at {offset}) exceeds the file size ({stream_len})"),
        });
    }

    reader.seek(SeekFrom::Start(offset))?;
    let mut texture_ids = vec![0i16; count];
    reader.read_i16_into::<LittleEndian>(&mut texture_ids)?;

    Ok(MdlSkinData {
        skin_ref_count,
        skin_family_count,
        texture_ids,
    })
}

/// Check the "IDST" signature and version 10
pub(crate) fn verify_header<R: Read + Seek>(reader: &mut R) -> Result<()> {
    reader.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MDL_SIGNATURE {
        return Err(Error::InvalidMdlSignature(magic));
    }

    let version = reader.read_i32::<LittleEndian>()?;
    if version != MDL_VERSION {
        return Err(Error::UnsupportedMdlVersion { version });
    }

    Ok(())
}

/// Read the texture table; the header must already be verified
pub(crate) fn read_texture_table<R: Read + Seek>(reader: &mut R) -> Result<Vec<MdlTextureInfo>> {
    reader.seek(SeekFrom::Start(TEXTURE_COUNT_OFFSET))?;
    let texture_count = checked_count(reader.read_i32::<LittleEndian>()?, "texture count")?;
    let texture_offset = reader.read_i32::<LittleEndian>()?;
    if texture_count == 0 {
        return Ok(Vec::new());
    }

    let texture_offset = checked_offset(texture_offset, "texture table offset")?;
    let stream_len = reader.seek(SeekFrom::End(0))?;
    if texture_offset + (texture_count * TEXTURE_INFO_SIZE) as u64 > stream_len {
        return Err(Error::InvalidMdlStructure {
            message: format!(
                "texture table ({texture_count} entries at {texture_offset}) exceeds the file size ({stream_len})"
            ),
        });
    }

    reader.seek(SeekFrom::Start(texture_offset))?;
    let mut infos = Vec::with_capacity(texture_count);
    for _ in 0..texture_count {
        let name = read_name(reader)?;
        let flags = MdlTextureFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?);
        let width = reader.read_i32::<LittleEndian>()?;
        let height = reader.read_i32::<LittleEndian>()?;
        let data_offset = reader.read_i32::<LittleEndian>()?;

        if width < 0 || height < 0 || data_offset < 0 {
            return Err(Error::InvalidMdlStructure {
                message: format!("texture '{name}' has a negative size or offset"),
            });
        }

        infos.push(MdlTextureInfo {
            name,
            flags,
            width: width as u32,
            height: height as u32,
            data_offset: data_offset as u32,
        });
    }

    Ok(infos)
}

fn read_name<R: Read>(reader: &mut R) -> Result<String> {
    let mut name_bytes = [0u8; TEXTURE_NAME_SIZE];
    reader.read_exact(&mut name_bytes)?;

    // Find null terminator and extract name string
    let len = name_bytes.iter().position(|&b| b == 0).unwrap_or(TEXTURE_NAME_SIZE);
    Ok(String::from_utf8_lossy(&name_bytes[..len]).into_owned())
}

fn read_palette<R: Read>(reader: &mut R) -> Result<Vec<Rgb>> {
    let mut bytes = [0u8; PALETTE_SIZE * PALETTE_ENTRY_SIZE];
    reader.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(PALETTE_ENTRY_SIZE)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

fn checked_count(value: i32, field: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidMdlStructure {
        message: format!("negative {field}: {value}"),
    })
}

fn checked_offset(value: i32, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::InvalidMdlStructure {
        message: format!("negative {field}: {value}"),
    })
}
