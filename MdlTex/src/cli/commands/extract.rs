//! CLI command for texture extraction

use std::path::Path;
use std::time::Instant;

use crate::cli::progress::{DISK, print_done, print_step};
use crate::extract::{ExtractOptions, extract_textures};

pub fn execute(model: &Path, output: &Path, options: &ExtractOptions) -> anyhow::Result<()> {
    let start = Instant::now();

    print_step(1, 1, DISK, &format!("Extracting textures to '{}'...", output.display()));
    let created = extract_textures(model, output, options)?;

    println!("Created {created} images");
    print_done(start.elapsed());
    Ok(())
}
