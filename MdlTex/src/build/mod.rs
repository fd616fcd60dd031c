//! Incremental texture builds
//!
//! Builds one texture per group of source images in an input directory and
//! writes it to the output directory. A build history kept in the input
//! directory lets later builds skip textures whose sources, settings and
//! output file are unchanged.

mod sources;
mod types;

pub use sources::{SourceGroups, collect_source_groups, input_file_paths};
pub use types::{BuildOptions, BuildProgress, BuildStats, OutputFormat};

use crate::assembler::{AssembleOutcome, TextureAssembler};
use crate::conversion::{ConversionDirectory, is_conversion_output_directory};
use crate::error::{Error, Result};
use crate::formats::mdl::{MdlTexture, write_standalone_file};
use crate::formats::save_indexed;
use crate::history::{BuildHistory, TextureHistory};
use crate::naming::output_name;
use crate::quantize::{MedianCutQuantizer, Quantizer};
use crate::settings::{FileFingerprint, SettingsResolver, SourceFileInfo};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Build textures from `input_directory` into `output_directory`.
///
/// # Errors
/// Returns [`Error::InvalidUsage`] if the input is not a directory, and an
/// error if the top-level directory cannot be read or its rule file is
/// invalid. Failures of single textures and sub-directories are logged and
/// the build continues.
pub fn build_textures(
    input_directory: &Path,
    output_directory: &Path,
    options: &BuildOptions,
    resolver: &SettingsResolver,
    progress: &dyn Fn(&BuildProgress),
) -> Result<BuildStats> {
    if input_directory.is_file() {
        return Err(Error::InvalidUsage(
            "Unable to create or update textures: the input must be a directory, not a file.".to_string(),
        ));
    }
    if !input_directory.is_dir() {
        return Err(Error::InvalidUsage(format!(
            "Unable to create or update textures: the input directory '{}' does not exist.",
            input_directory.display()
        )));
    }

    tracing::info!(
        "Creating model textures from '{}' and saving them to '{}'",
        input_directory.display(),
        output_directory.display()
    );
    let builder = TextureBuilder {
        resolver,
        assembler: TextureAssembler::new(MedianCutQuantizer),
        options,
        progress,
    };
    builder.build_directory(input_directory, output_directory)
}

struct TextureBuilder<'a, Q: Quantizer> {
    resolver: &'a SettingsResolver,
    assembler: TextureAssembler<Q>,
    options: &'a BuildOptions,
    progress: &'a dyn Fn(&BuildProgress),
}

impl<Q: Quantizer> TextureBuilder<'_, Q> {
    fn build_directory(&self, input: &Path, output: &Path) -> Result<BuildStats> {
        let previous = BuildHistory::load(input);
        let incremental = !self.options.full_rebuild && output.is_dir() && previous.is_some();
        let mut history = BuildHistory::new();

        let mut stats = self.build_textures_in(input, output, previous.as_ref(), incremental, &mut history)?;

        if self.options.include_subdirectories {
            stats += self.build_subdirectories(input, output, previous.as_ref(), &mut history)?;
        }

        if let Err(e) = history.save(input) {
            tracing::warn!("Failed to save build history for '{}': {e}", input.display());
        }
        Ok(stats)
    }

    /// Build the textures directly inside `input`. The converter output
    /// directory is removed before returning.
    fn build_textures_in(
        &self,
        input: &Path,
        output: &Path,
        previous: Option<&BuildHistory>,
        incremental: bool,
        history: &mut BuildHistory,
    ) -> Result<BuildStats> {
        let settings = self.resolver.for_directory(input)?;
        let conversion = ConversionDirectory::for_input(input);
        let groups = collect_source_groups(input, &settings)?;
        fs::create_dir_all(output)?;

        let mut stats = BuildStats::default();
        for (index, (texture_name, files)) in groups.iter().enumerate() {
            (self.progress)(&BuildProgress {
                directory: input.to_path_buf(),
                current: index + 1,
                total: groups.len(),
                texture_name: texture_name.clone(),
            });

            let name = output_name(texture_name, files);
            let output_path = output.join(format!("{name}.{}", self.options.format.extension()));
            let exists = output_path.is_file();

            let unchanged = incremental
                && exists
                && previous
                    .and_then(|h| h.texture(&name))
                    .is_some_and(|h| h.is_up_to_date(&output_path, files).unwrap_or(false));
            if unchanged {
                tracing::info!("No changes detected for '{texture_name}', skipping update");
                record(history, &output_path, files);
                continue;
            }

            let texture = match self.assembler.assemble(texture_name, files, &conversion) {
                AssembleOutcome::Built(texture) => texture,
                AssembleOutcome::Skipped(reason) => {
                    tracing::warn!("{reason}. Skipping texture.");
                    continue;
                }
                AssembleOutcome::Failed(e) => {
                    tracing::error!("Failed to build '{texture_name}': {e}");
                    continue;
                }
            };

            if let Err(e) = write_texture(&texture, &output_path, self.options.format) {
                tracing::error!("Failed to write texture '{}': {e}", output_path.display());
                continue;
            }
            record(history, &output_path, files);

            let more = match files.len() {
                0 | 1 => String::new(),
                n => format!(" + {} more files", n - 1),
            };
            let source = files.first().map(|f| f.path().display().to_string()).unwrap_or_default();
            if exists {
                stats.updated += 1;
                tracing::info!("Updated texture '{}' (from '{source}'{more})", output_path.display());
            } else {
                stats.added += 1;
                tracing::info!("Added texture '{}' (from '{source}'{more})", output_path.display());
            }
        }

        if let Some(previous) = previous {
            stats.removed += remove_stale_textures(previous, &groups, output, self.options.format);
        }

        drop(conversion);
        Ok(stats)
    }

    fn build_subdirectories(
        &self,
        input: &Path,
        output: &Path,
        previous: Option<&BuildHistory>,
        history: &mut BuildHistory,
    ) -> Result<BuildStats> {
        let mut stats = BuildStats::default();
        let mut current = HashSet::new();

        for sub_directory in sub_directories(input, output)? {
            let Some(name) = sub_directory.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            match self.build_directory(&sub_directory, &output.join(&name)) {
                Ok(sub_stats) => stats += sub_stats,
                Err(e) => tracing::error!("Failed to build textures in '{}': {e}", sub_directory.display()),
            }
            history.add_sub_directory(name.clone());
            current.insert(name);
        }

        if self.options.remove_subdirectories
            && let Some(previous) = previous
        {
            for name in previous.sub_directory_names() {
                let directory = output.join(name);
                if current.contains(name) || !directory.is_dir() {
                    continue;
                }
                match remove_output_textures(&directory) {
                    Ok(removed) => stats.removed += removed,
                    Err(e) => tracing::warn!("Failed to remove textures in '{}': {e}", directory.display()),
                }
            }
        }
        Ok(stats)
    }
}

/// Sub-directories to build: everything except converter output and the
/// output directory itself
fn sub_directories(input: &Path, output: &Path) -> Result<Vec<PathBuf>> {
    let mut directories = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_dir() && !is_conversion_output_directory(&path) && !same_directory(&path, output) {
            directories.push(path);
        }
    }
    directories.sort();
    Ok(directories)
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn write_texture(texture: &MdlTexture, path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Mdl => write_standalone_file(path, texture),
        OutputFormat::Bmp => save_indexed(&texture.to_indexed_image(), path),
    }
}

fn record(history: &mut BuildHistory, output_path: &Path, files: &[SourceFileInfo]) {
    match FileFingerprint::from_file(output_path) {
        Ok(fingerprint) => history.insert(TextureHistory::new(fingerprint, files.to_vec())),
        Err(e) => tracing::warn!("Failed to read '{}': {e}", output_path.display()),
    }
}

/// Delete outputs of textures that were built last time but no longer have
/// source files, or that were written in another output format
fn remove_stale_textures(
    previous: &BuildHistory,
    groups: &SourceGroups,
    output: &Path,
    format: OutputFormat,
) -> usize {
    let current: HashSet<String> = groups
        .iter()
        .map(|(name, files)| format!("{}.{}", output_name(name, files), format.extension()))
        .collect();

    let mut removed = 0;
    for name in previous.output_names() {
        let Some(file_name) = previous.texture(name).and_then(|t| t.output_file.path.file_name()) else {
            continue;
        };
        if current.contains(file_name.to_string_lossy().as_ref()) {
            continue;
        }
        let path = output.join(file_name);
        if !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                removed += 1;
                tracing::info!("Removed texture '{}'", path.display());
            }
            Err(e) => tracing::warn!("Failed to remove '{}': {e}", path.display()),
        }
    }
    removed
}

/// Remove every texture file below `directory`, then the directories that
/// are left empty. Returns the number of removed textures.
///
/// # Errors
/// Returns an error if the directory cannot be walked.
fn remove_output_textures(directory: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(directory).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            if fs::remove_dir(path).is_ok() {
                tracing::info!("Removed sub-directory '{}'", path.display());
            }
        } else if is_texture_output(path) {
            match fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove '{}': {e}", path.display()),
            }
        }
    }
    Ok(removed)
}

fn is_texture_output(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mdl") || ext.eq_ignore_ascii_case("bmp"))
}
