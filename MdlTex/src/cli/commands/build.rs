//! CLI command for texture builds

use std::path::Path;
use std::time::Instant;

use super::global_config_path;
use crate::build::{BuildOptions, build_textures};
use crate::cli::progress::{PICTURE, print_done, print_step, simple_bar};
use crate::settings::SettingsResolver;

pub fn execute(
    input: &Path,
    output: &Path,
    options: &BuildOptions,
    global_config: Option<&Path>,
    progress: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let resolver = SettingsResolver::new(global_config_path(global_config).as_deref())?;

    print_step(1, 1, PICTURE, &format!("Building textures into '{}'...", output.display()));
    let pb = progress.then(|| simple_bar(0, "Building"));

    let stats = build_textures(input, output, options, &resolver, &|p| {
        if let Some(pb) = &pb {
            pb.set_length(p.total as u64);
            pb.set_position(p.current as u64);
            pb.set_message(p.texture_name.clone());
        }
    })?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if stats.is_unchanged() {
        println!("All textures are up to date");
    } else {
        println!("Textures {stats}");
    }
    print_done(start.elapsed());
    Ok(())
}
