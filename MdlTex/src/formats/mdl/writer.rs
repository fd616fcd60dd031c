//! `.mdl` texture writing
//!
//! Textures are either appended to a model that has none yet, or overwritten
//! in place. In-place replacement never moves data: texture records and
//! payload offsets stay where they are.

use super::reader::{read_texture_table, verify_header};
use super::{
    FILE_SIZE_OFFSET, HEADER_SIZE, MDL_SIGNATURE, MDL_VERSION, MODEL_NAME_OFFSET, MdlSkinData,
    MdlTexture, PALETTE_SIZE, SKIN_REF_COUNT_OFFSET, TEXTURE_COUNT_OFFSET, TEXTURE_INFO_SIZE,
    TEXTURE_NAME_SIZE,
};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Append textures and a skin table to a model that has no textures.
///
/// Returns `false` (leaving the stream untouched) if the model already
/// contains textures.
///
/// # Errors
/// Returns an error if the header is invalid or writing fails.
pub fn add_textures<S: Read + Write + Seek>(
    stream: &mut S,
    textures: &[MdlTexture],
    skin_data: &MdlSkinData,
) -> Result<bool> {
    verify_header(stream)?;
    if !read_texture_table(stream)?.is_empty() {
        tracing::warn!("Model already contains textures, not adding {} new textures", textures.len());
        return Ok(false);
    }

    // New data is appended at the current file size, which is stored in the header
    stream.seek(SeekFrom::Start(FILE_SIZE_OFFSET))?;
    let old_file_size = stream.read_i32::<LittleEndian>()?;

    // Skin table
    stream.seek(SeekFrom::Start(SKIN_REF_COUNT_OFFSET))?;
    stream.write_i32::<LittleEndian>(skin_data.skin_ref_count)?;
    stream.write_i32::<LittleEndian>(skin_data.skin_family_count)?;
    stream.write_i32::<LittleEndian>(old_file_size)?;

    stream.seek(SeekFrom::Start(u64::try_from(old_file_size).map_err(|_| {
        Error::InvalidMdlStructure {
            message: format!("negative file size: {old_file_size}"),
        }
    })?))?;
    for &id in &skin_data.texture_ids {
        stream.write_i16::<LittleEndian>(id)?;
    }

    let texture_info_offset = to_offset(stream.stream_position()?)?;
    let mut data_offset = texture_info_offset + (textures.len() * TEXTURE_INFO_SIZE) as u32;

    // Texture count and table offsets
    stream.seek(SeekFrom::Start(TEXTURE_COUNT_OFFSET))?;
    stream.write_i32::<LittleEndian>(textures.len() as i32)?;
    stream.write_u32::<LittleEndian>(texture_info_offset)?;
    stream.write_u32::<LittleEndian>(data_offset)?;

    // Texture records
    stream.seek(SeekFrom::Start(u64::from(texture_info_offset)))?;
    for texture in textures {
        write_name(stream, &texture.name)?;
        stream.write_u32::<LittleEndian>(texture.flags.bits())?;
        stream.write_u32::<LittleEndian>(texture.width)?;
        stream.write_u32::<LittleEndian>(texture.height)?;
        stream.write_u32::<LittleEndian>(data_offset)?;

        data_offset += texture.data_size() as u32;
    }

    // Texture payloads
    for texture in textures {
        write_texture_data(stream, texture)?;
    }

    let new_file_size = to_offset(stream.stream_position()?)?;
    stream.seek(SeekFrom::Start(FILE_SIZE_OFFSET))?;
    stream.write_u32::<LittleEndian>(new_file_size)?;
    stream.seek(SeekFrom::Start(0))?;

    Ok(true)
}

/// Overwrite the textures of a model in place.
///
/// The replacement list must have exactly as many entries as the model has
/// textures; otherwise nothing is written. Replacements whose dimensions
/// differ from the slot they replace are skipped. Returns the number of
/// textures that were written.
///
/// # Errors
/// Returns an error if the header is invalid or writing fails.
pub fn replace_textures<S: Read + Write + Seek>(
    stream: &mut S,
    textures: &[MdlTexture],
) -> Result<usize> {
    verify_header(stream)?;
    let infos = read_texture_table(stream)?;
    if infos.is_empty() {
        return Ok(0);
    }

    if textures.len() != infos.len() {
        tracing::warn!(
            "Texture count mismatch ({} replacements for {} textures). Textures will not be replaced.",
            textures.len(),
            infos.len()
        );
        return Ok(0);
    }

    stream.seek(SeekFrom::Start(TEXTURE_COUNT_OFFSET + 4))?;
    let texture_info_offset = u64::from(stream.read_u32::<LittleEndian>()?);

    let mut replaced = 0;
    for (i, (info, texture)) in infos.iter().zip(textures).enumerate() {
        if texture.width != info.width || texture.height != info.height {
            tracing::warn!(
                "'{}' has different dimensions ({} x {} instead of {} x {}). Skipping texture.",
                texture.name,
                texture.width,
                texture.height,
                info.width,
                info.height
            );
            continue;
        }

        // Width, height and data offset stay the same
        stream.seek(SeekFrom::Start(texture_info_offset + (i * TEXTURE_INFO_SIZE) as u64))?;
        write_name(stream, &texture.name)?;
        stream.write_u32::<LittleEndian>(texture.flags.bits())?;

        stream.seek(SeekFrom::Start(u64::from(info.data_offset)))?;
        write_texture_data(stream, texture)?;
        replaced += 1;
    }

    stream.seek(SeekFrom::Start(0))?;
    Ok(replaced)
}

/// Write a texture-only v10 model holding a single texture.
///
/// # Errors
/// Returns an error if writing fails.
pub fn write_standalone<W: Write>(writer: &mut W, texture: &MdlTexture) -> Result<()> {
    let mut stream = Cursor::new(vec![0u8; HEADER_SIZE]);
    stream.write_all(&MDL_SIGNATURE)?;
    stream.write_i32::<LittleEndian>(MDL_VERSION)?;
    stream.seek(SeekFrom::Start(MODEL_NAME_OFFSET))?;
    write_name(&mut stream, &texture.name)?;
    stream.seek(SeekFrom::Start(FILE_SIZE_OFFSET))?;
    stream.write_u32::<LittleEndian>(HEADER_SIZE as u32)?;

    add_textures(&mut stream, std::slice::from_ref(texture), &MdlSkinData::identity(1))?;

    writer.write_all(stream.get_ref())?;
    Ok(())
}

/// Write a texture-only v10 model holding a single texture to disk.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_standalone_file<P: AsRef<Path>>(path: P, texture: &MdlTexture) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_standalone(&mut writer, texture)?;
    writer.flush()?;
    Ok(())
}

fn write_name<W: Write>(writer: &mut W, name: &str) -> Result<()> {
    // 64 bytes, null-padded, always null-terminated
    let bytes = name.as_bytes();
    let mut buf = [0u8; TEXTURE_NAME_SIZE];
    let copy_len = bytes.len().min(TEXTURE_NAME_SIZE - 1);
    buf[..copy_len].copy_from_slice(&bytes[..copy_len]);
    writer.write_all(&buf)?;
    Ok(())
}

fn write_texture_data<W: Write>(writer: &mut W, texture: &MdlTexture) -> Result<()> {
    writer.write_all(&texture.image_data)?;
    for i in 0..PALETTE_SIZE {
        let color = texture.palette.get(i).copied().unwrap_or([0, 0, 0]);
        writer.write_all(&color)?;
    }
    Ok(())
}

fn to_offset(position: u64) -> Result<u32> {
    u32::try_from(position).map_err(|_| Error::InvalidMdlStructure {
        message: format!("offset {position} does not fit in 32 bits"),
    })
}
