use clap::Subcommand;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::build::{BuildOptions, OutputFormat};
use crate::extract::{ExtractFormat, ExtractOptions};

pub mod build;
pub mod extract;
pub mod replace;

#[derive(Subcommand)]
pub enum Commands {
    /// Build textures from the images in a directory
    Build {
        /// Directory with source images
        input: PathBuf,

        /// Output directory (default: `<input>_textures`)
        output: Option<PathBuf>,

        /// Rebuild all textures, ignoring the build history
        #[arg(long)]
        full: bool,

        /// Also build sub-directories
        #[arg(long)]
        subdirs: bool,

        /// Remove output sub-directories whose input sub-directory is gone
        #[arg(long, requires = "subdirs")]
        subdir_removal: bool,

        /// Output file format (mdl or bmp)
        #[arg(long, default_value = "mdl")]
        format: OutputFormat,

        /// Global rule file (default: modeltexturemaker.config next to the executable)
        #[arg(long)]
        global_config: Option<PathBuf>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Extract the textures of a model as editable images
    Extract {
        /// Model file
        model: PathBuf,

        /// Output directory (default: `<model>_extracted`)
        output: Option<PathBuf>,

        /// Image format (png, jpg, gif, bmp or tga)
        #[arg(long, default_value = "png")]
        format: ExtractFormat,

        /// Save each texture as a single palette image
        #[arg(long)]
        indexed: bool,

        /// Overwrite existing images
        #[arg(long)]
        overwrite: bool,
    },

    /// Replace the textures of a model with textures built from a directory
    Replace {
        /// Directory with source images
        input: PathBuf,

        /// Model file
        model: PathBuf,

        /// Output model (default: the input model, replaced in place)
        output: Option<PathBuf>,

        /// Global rule file (default: modeltexturemaker.config next to the executable)
        #[arg(long)]
        global_config: Option<PathBuf>,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Build {
                input,
                output,
                full,
                subdirs,
                subdir_removal,
                format,
                global_config,
                quiet,
            } => {
                let output = output
                    .clone()
                    .unwrap_or_else(|| sibling_with_suffix(input, "_textures"));
                let options = BuildOptions {
                    full_rebuild: *full,
                    include_subdirectories: *subdirs,
                    remove_subdirectories: *subdir_removal,
                    format: *format,
                };
                build::execute(input, &output, &options, global_config.as_deref(), !*quiet)
            }
            Commands::Extract {
                model,
                output,
                format,
                indexed,
                overwrite,
            } => {
                let output = output
                    .clone()
                    .unwrap_or_else(|| sibling_with_suffix(&model.with_extension(""), "_extracted"));
                let options = ExtractOptions {
                    format: *format,
                    indexed: *indexed,
                    overwrite: *overwrite,
                };
                extract::execute(model, &output, &options)
            }
            Commands::Replace {
                input,
                model,
                output,
                global_config,
            } => replace::execute(
                input,
                model,
                output.as_deref().unwrap_or(model),
                global_config.as_deref(),
            ),
        }
    }

    /// Path the log file is named after
    #[must_use]
    pub fn input_path(&self) -> &Path {
        match self {
            Commands::Build { input, .. } | Commands::Replace { input, .. } => input,
            Commands::Extract { model, .. } => model,
        }
    }
}

/// Global rule file given on the command line, or the one next to the executable
fn global_config_path(global_config: Option<&Path>) -> Option<PathBuf> {
    global_config
        .map(Path::to_path_buf)
        .or_else(crate::settings::SettingsResolver::default_global_config)
}

/// `dir/name` becomes `dir/name<suffix>`
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
