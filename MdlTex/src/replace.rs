//! Texture replacement in existing models
//!
//! Builds the source groups of an input directory that match textures of a
//! model and writes them over those textures. Models with external
//! textures (`<model>T.mdl`) get all textures merged into the output model.

use crate::assembler::{AssembleOutcome, TextureAssembler};
use crate::build::collect_source_groups;
use crate::conversion::ConversionDirectory;
use crate::error::{Error, Result};
use crate::formats::mdl::{
    MdlTexture, MdlTextureFlags, add_textures, external_textures_path, read_skin_data, read_textures_from_path,
    replace_textures,
};
use crate::naming::group_name_for_model_texture;
use crate::quantize::MedianCutQuantizer;
use crate::settings::SettingsResolver;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::time::Instant;

/// Replace the textures of `model_path` with textures built from
/// `input_directory`, saving the result to `output_path` (which may be the
/// model itself).
///
/// Returns the number of replaced textures. Textures that fail to build or
/// whose size differs from the existing texture are logged and left as
/// they were.
///
/// # Errors
/// Returns [`Error::InvalidUsage`] for a missing input directory or model,
/// or a model without textures, and an error if the model cannot be read
/// or the output cannot be written.
pub fn replace_model_textures(
    input_directory: &Path,
    model_path: &Path,
    output_path: &Path,
    resolver: &SettingsResolver,
) -> Result<usize> {
    if !input_directory.is_dir() {
        return Err(Error::InvalidUsage(format!(
            "Unable to replace textures: the input directory '{}' does not exist.",
            input_directory.display()
        )));
    }
    if !model_path.is_file() {
        return Err(Error::InvalidUsage(format!(
            "Unable to replace textures: '{}' is not a file.",
            model_path.display()
        )));
    }

    let start = Instant::now();
    tracing::info!(
        "Replacing textures in '{}', using images from '{}', and saving the result to '{}'",
        model_path.display(),
        input_directory.display(),
        output_path.display()
    );

    let mut textures = read_textures_from_path(model_path, false)?;
    let has_external_textures = textures.is_empty();
    if has_external_textures {
        textures = read_textures_from_path(model_path, true)?;
    }
    if textures.is_empty() {
        return Err(Error::InvalidUsage(format!(
            "Unable to replace textures: '{}' has no textures.",
            model_path.display()
        )));
    }

    let replaced = replace_matching_textures(input_directory, resolver, &mut textures)?;

    let mut model = Cursor::new(fs::read(model_path)?);
    if has_external_textures {
        tracing::info!("Replacing textures and merging them into the output model file");
        let mut reader = BufReader::new(File::open(external_textures_path(model_path))?);
        let skin_data = read_skin_data(&mut reader)?;
        add_textures(&mut model, &textures, &skin_data)?;
    } else {
        tracing::info!("Replacing textures in the output model file");
        replace_textures(&mut model, &textures)?;
    }
    fs::write(output_path, model.into_inner())?;

    tracing::info!(
        "Replaced {replaced} textures in '{}' from '{}' in {:.3} seconds",
        model_path.display(),
        input_directory.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(replaced)
}

/// Build the source groups that match a model texture and put them in
/// place of that texture
fn replace_matching_textures(
    input_directory: &Path,
    resolver: &SettingsResolver,
    textures: &mut [MdlTexture],
) -> Result<usize> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    for (index, texture) in textures.iter().enumerate() {
        slots.entry(group_name_for_model_texture(&texture.name)).or_insert(index);
    }

    let settings = resolver.for_directory(input_directory)?;
    let conversion = ConversionDirectory::for_input(input_directory);
    let assembler = TextureAssembler::new(MedianCutQuantizer);

    let mut replaced = 0;
    for (texture_name, files) in collect_source_groups(input_directory, &settings)? {
        let Some(&index) = slots.get(&texture_name) else {
            continue;
        };

        let texture = match assembler.assemble(&texture_name, &files, &conversion) {
            AssembleOutcome::Built(texture) => texture,
            AssembleOutcome::Skipped(reason) => {
                tracing::warn!("Skipping '{texture_name}': {reason}");
                continue;
            }
            AssembleOutcome::Failed(e) => {
                tracing::warn!("Failed to make texture '{texture_name}': {e}");
                continue;
            }
        };

        let slot = &mut textures[index];
        if texture.width != slot.width || texture.height != slot.height {
            tracing::warn!(
                "'{}' has a different size than the existing texture ({} x {} instead of {} x {}). Skipping texture.",
                texture.name,
                texture.width,
                texture.height,
                slot.width,
                slot.height
            );
            continue;
        }

        tracing::info!("Replacing '{}' with '{}'", slot.name, texture.name);
        let mut flags = slot.flags;
        flags.set(MdlTextureFlags::MASKED, texture.is_masked());
        *slot = MdlTexture { flags, ..texture };
        replaced += 1;
    }
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::mdl::{FILE_SIZE_OFFSET, HEADER_SIZE, MDL_SIGNATURE, MDL_VERSION, read_texture_infos};
    use crate::formats::mdl::{MdlSkinData, write_standalone_file};
    use crate::formats::save_rgba;
    use byteorder::{LittleEndian, WriteBytesExt};
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use std::io::{Seek, SeekFrom, Write};

    fn texture(name: &str, flags: MdlTextureFlags, width: u32, height: u32) -> MdlTexture {
        let data = vec![3; (width * height) as usize];
        MdlTexture::new(name, flags, width, height, data, vec![[9, 9, 9]; 256]).unwrap()
    }

    fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    fn empty_model() -> Vec<u8> {
        let mut stream = Cursor::new(vec![0u8; HEADER_SIZE]);
        stream.write_all(&MDL_SIGNATURE).unwrap();
        stream.write_i32::<LittleEndian>(MDL_VERSION).unwrap();
        stream.seek(SeekFrom::Start(FILE_SIZE_OFFSET)).unwrap();
        stream.write_u32::<LittleEndian>(HEADER_SIZE as u32).unwrap();
        stream.into_inner()
    }

    #[test]
    fn test_replace_embedded_texture() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("gun.mdl");
        let flags = MdlTextureFlags::from_bits_retain(0x0002) | MdlTextureFlags::MASKED;
        write_standalone_file(&model, &texture("Chrome.BMP", flags, 4, 2)).unwrap();

        let input = dir.path().join("images");
        fs::create_dir(&input).unwrap();
        save_rgba(&solid_image(4, 2, [200, 10, 10, 255]), input.join("chrome.png")).unwrap();
        save_rgba(&solid_image(4, 2, [0, 0, 0, 255]), input.join("unrelated.png")).unwrap();

        let output = dir.path().join("out.mdl");
        let replaced = replace_model_textures(&input, &model, &output, &SettingsResolver::default()).unwrap();
        assert_eq!(replaced, 1);

        let textures = read_textures_from_path(&output, false).unwrap();
        assert_eq!(textures.len(), 1);
        assert_eq!(textures[0].name, "chrome.bmp");
        // Engine bits survive, MASKED follows the new opaque texture
        assert_eq!(textures[0].flags.bits(), 0x0002);
        assert_eq!(textures[0].palette[usize::from(textures[0].image_data[0])], [200, 10, 10]);

        // The source model is untouched
        assert_eq!(read_textures_from_path(&model, false).unwrap()[0].name, "Chrome.BMP");
    }

    #[test]
    fn test_size_mismatch_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("gun.mdl");
        let original = texture("skin.bmp", MdlTextureFlags::empty(), 4, 4);
        write_standalone_file(&model, &original).unwrap();
        save_rgba(&solid_image(8, 8, [1, 2, 3, 255]), dir.path().join("skin.png")).unwrap();

        let output = dir.path().join("out.mdl");
        let replaced = replace_model_textures(dir.path(), &model, &output, &SettingsResolver::default()).unwrap();

        assert_eq!(replaced, 0);
        assert_eq!(read_textures_from_path(&output, false).unwrap(), vec![original]);
    }

    #[test]
    fn test_replace_merges_external_textures() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("scientist.mdl");
        fs::write(&model, empty_model()).unwrap();
        write_standalone_file(
            external_textures_path(&model),
            &texture("Remap1_000_031_063.bmp", MdlTextureFlags::empty(), 2, 2),
        )
        .unwrap();

        let input = dir.path().join("images");
        fs::create_dir(&input).unwrap();
        save_rgba(&solid_image(2, 2, [50, 60, 70, 255]), input.join("remap1.png")).unwrap();

        let output = dir.path().join("merged.mdl");
        let replaced = replace_model_textures(&input, &model, &output, &SettingsResolver::default()).unwrap();
        assert_eq!(replaced, 1);

        let infos = read_texture_infos(&mut Cursor::new(fs::read(&output).unwrap())).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "remap1_256_255_255.bmp");
        let skins = read_skin_data(&mut Cursor::new(fs::read(&output).unwrap())).unwrap();
        assert_eq!(skins, MdlSkinData::identity(1));
    }

    #[test]
    fn test_invalid_usage() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("empty.mdl");
        fs::write(&model, empty_model()).unwrap();
        let resolver = SettingsResolver::default();

        let no_textures = replace_model_textures(dir.path(), &model, &model, &resolver);
        assert!(matches!(no_textures, Err(Error::InvalidUsage(_))));

        let missing_dir = replace_model_textures(&dir.path().join("nope"), &model, &model, &resolver);
        assert!(matches!(missing_dir, Err(Error::InvalidUsage(_))));
    }
}
