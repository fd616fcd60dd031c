//! External converter preprocessing
//!
//! Source files in formats the image codec cannot read (layered documents,
//! for example) can name a converter executable in a rule file:
//!
//! ```text
//! *.psd    converter: 'magick'  arguments: '"{input}[0]" "{output}.png"'
//! ```
//!
//! The converter writes into a temporary directory inside the input
//! directory. Every loadable image it produces becomes a source file of
//! the texture.

use crate::error::{Error, Result};
use crate::formats::is_supported_image;
use crate::settings::{FileFingerprint, SourceFileInfo, settings_from_filename};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Name of the temporary converter output directory
pub const CONVERTED_OUTPUT_DIR: &str = "_converted_output";

const INPUT_MARKER: &str = "{input}";
const OUTPUT_MARKER: &str = "{output}";

/// Converter output directory for an input directory
#[must_use]
pub fn conversion_output_directory<P: AsRef<Path>>(input_directory: P) -> PathBuf {
    input_directory.as_ref().join(CONVERTED_OUTPUT_DIR)
}

/// Whether a directory is a converter output directory, which is never
/// treated as input.
#[must_use]
pub fn is_conversion_output_directory<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .is_some_and(|name| name.eq_ignore_ascii_case(CONVERTED_OUTPUT_DIR))
}

/// Check that converter arguments contain both `{input}` and `{output}`.
///
/// # Errors
/// Returns [`Error::InvalidConverterArguments`] naming the missing marker.
pub fn validate_converter_arguments(arguments: &str) -> Result<()> {
    for marker in [INPUT_MARKER, OUTPUT_MARKER] {
        if !arguments.contains(marker) {
            return Err(Error::InvalidConverterArguments(format!(
                "'{arguments}' does not contain {marker}"
            )));
        }
    }
    Ok(())
}

/// Temporary converter output directory, removed when dropped.
#[derive(Debug)]
pub struct ConversionDirectory {
    path: PathBuf,
}

impl ConversionDirectory {
    /// Converter output directory for `input_directory`. Nothing is created
    /// until a converter runs.
    #[must_use]
    pub fn for_input<P: AsRef<Path>>(input_directory: P) -> Self {
        Self {
            path: conversion_output_directory(input_directory),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run converters for the files of one texture.
    ///
    /// Files without a converter are passed through. Each converted file is
    /// replaced by the images the converter produced, which inherit the
    /// original settings overridden by the settings in their own names.
    ///
    /// # Errors
    /// Returns an error if a converter is configured without arguments,
    /// fails to run, or produces no loadable image.
    pub fn convert_source_files(&self, texture_name: &str, files: &[SourceFileInfo]) -> Result<Vec<SourceFileInfo>> {
        let mut converted = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let Some(converter) = file.settings.converter.as_deref() else {
                converted.push(file.clone());
                continue;
            };
            let Some(arguments) = file.settings.converter_arguments.as_deref() else {
                return Err(Error::InvalidConverterArguments(format!(
                    "missing converter arguments for '{}'",
                    file.path().display()
                )));
            };

            let output_directory = self.path.join(texture_name).join(index.to_string());
            let outputs = run_converter(converter, arguments, file.path(), &output_directory)?;
            let supported: Vec<PathBuf> = outputs.into_iter().filter(|p| is_supported_image(p)).collect();
            if supported.is_empty() {
                return Err(Error::ConverterNoOutput {
                    path: file.path().to_path_buf(),
                });
            }

            for output in supported {
                let settings = file.settings.overridden_by(&settings_from_filename(&output));
                converted.push(SourceFileInfo::new(FileFingerprint::unhashed(&output), settings));
            }
        }
        Ok(converted)
    }
}

impl Drop for ConversionDirectory {
    fn drop(&mut self) {
        if self.path.is_dir()
            && let Err(e) = std::fs::remove_dir_all(&self.path)
        {
            tracing::warn!(
                "Failed to delete temporary conversion output directory '{}': {e}",
                self.path.display()
            );
        }
    }
}

/// Run a converter on one file and return the files it produced.
///
/// `{output}` is replaced by `<output_directory>/<input stem>`. Every file
/// in `output_directory` afterwards counts as produced, so each input needs
/// a directory of its own.
///
/// # Errors
/// Returns an error if the converter cannot be started or exits with a
/// failure status.
pub fn run_converter(converter: &str, arguments: &str, input: &Path, output_directory: &Path) -> Result<Vec<PathBuf>> {
    validate_converter_arguments(arguments)?;
    std::fs::create_dir_all(output_directory)?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let output = output_directory.join(&stem);
    let input_text = input.to_string_lossy();
    let output_text = output.to_string_lossy();

    let args: Vec<String> = split_arguments(arguments)
        .into_iter()
        .map(|arg| arg.replace(INPUT_MARKER, &input_text).replace(OUTPUT_MARKER, &output_text))
        .collect();

    tracing::debug!("Running converter: {converter} {}", args.join(" "));
    let result = Command::new(converter).args(&args).output().map_err(|e| Error::ConverterFailed {
        command: converter.to_string(),
        message: e.to_string(),
    })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(Error::ConverterFailed {
            command: converter.to_string(),
            message: format!(
                "exit code {}: {}",
                result.status.code().map_or_else(|| "unknown".to_string(), |c| c.to_string()),
                stderr.trim()
            ),
        });
    }

    let mut produced = Vec::new();
    for entry in std::fs::read_dir(output_directory)? {
        let path = entry?.path();
        if path.is_file() {
            produced.push(path);
        }
    }
    produced.sort();
    Ok(produced)
}

/// Split an argument string on whitespace, keeping double-quoted parts together.
fn split_arguments(arguments: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in arguments.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}
