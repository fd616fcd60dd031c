//! CLI command for texture replacement

use std::path::Path;
use std::time::Instant;

use super::global_config_path;
use crate::cli::progress::{GEAR, print_done, print_step};
use crate::replace::replace_model_textures;
use crate::settings::SettingsResolver;

pub fn execute(input: &Path, model: &Path, output: &Path, global_config: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let resolver = SettingsResolver::new(global_config_path(global_config).as_deref())?;

    print_step(1, 1, GEAR, &format!("Replacing textures in '{}'...", model.display()));
    let replaced = replace_model_textures(input, model, output, &resolver)?;

    println!("Replaced {replaced} textures, saved to '{}'", output.display());
    print_done(start.elapsed());
    Ok(())
}
