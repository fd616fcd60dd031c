//! Source file discovery

use crate::error::Result;
use crate::formats::is_supported_image;
use crate::history::BuildHistory;
use crate::naming::texture_name;
use crate::settings::{CONFIG_FILE_NAME, DirectorySettings, SourceFileInfo};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Source files of one directory, grouped by texture name
pub type SourceGroups = BTreeMap<String, Vec<SourceFileInfo>>;

/// Files directly inside `directory`, sorted, without history and rule files
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn input_file_paths(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        let is_rule_file = path.file_name().is_some_and(|name| name == CONFIG_FILE_NAME);
        if path.is_file() && !is_rule_file && !BuildHistory::is_history_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Resolve the settings of every input file in `directory` and group the
/// usable ones by texture name.
///
/// Ignored files are dropped, as are files that neither the image codec
/// nor a converter can handle. Files that cannot be read are logged and
/// skipped.
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn collect_source_groups(directory: &Path, settings: &DirectorySettings) -> Result<SourceGroups> {
    let mut groups = SourceGroups::new();
    for path in input_file_paths(directory)? {
        let resolved = settings.resolve(&path);
        if resolved.is_ignored() || !(is_supported_image(&path) || resolved.converter.is_some()) {
            continue;
        }

        match settings.source_file_info(&path) {
            Ok(file) => groups.entry(texture_name(&path)).or_default().push(file),
            Err(e) => tracing::warn!("Failed to read '{}': {e}", path.display()),
        }
    }
    Ok(groups)
}
