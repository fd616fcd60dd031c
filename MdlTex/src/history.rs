//! Build history (`modeltexturemaker.dat`)
//!
//! Stored per input directory after every build pass. It records, per
//! output texture, the output file's fingerprint and the source files and
//! settings it was built from, plus the sub-directories that were built.
//! A missing or unreadable history only means the next pass rebuilds
//! everything.

use crate::error::Result;
use crate::settings::{FileFingerprint, SourceFileInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Name of the history file in each input directory
pub const HISTORY_FILE_NAME: &str = "modeltexturemaker.dat";

/// How one output texture was built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TextureHistory {
    pub output_file: FileFingerprint,
    #[serde(default)]
    pub input_files: Vec<SourceFileInfo>,
}

impl TextureHistory {
    #[must_use]
    pub fn new(output_file: FileFingerprint, input_files: Vec<SourceFileInfo>) -> Self {
        Self {
            output_file,
            input_files,
        }
    }

    /// Output name: the output file's stem
    #[must_use]
    pub fn output_name(&self) -> String {
        self.output_file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the output file still has the recorded content and the
    /// source files match the recorded ones by name, content and settings.
    ///
    /// # Errors
    /// Returns an error if the output file cannot be read.
    pub fn is_up_to_date(&self, output_path: &Path, input_files: &[SourceFileInfo]) -> Result<bool> {
        if input_files.len() != self.input_files.len() {
            return Ok(false);
        }

        let current_output = FileFingerprint::from_file(output_path)?;
        if !current_output.has_same_content(&self.output_file) {
            return Ok(false);
        }

        Ok(input_files.iter().all(|file| {
            let name = file.fingerprint.file_name();
            self.input_files
                .iter()
                .find(|previous| previous.fingerprint.file_name() == name)
                .is_some_and(|previous| file.is_unchanged_from(previous))
        }))
    }
}

/// On-disk layout: textures as a list, keyed by output name once loaded
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct HistoryFile {
    textures: Vec<TextureHistory>,
    sub_directory_names: Vec<String>,
}

/// History of the last build pass over one input directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildHistory {
    textures: BTreeMap<String, TextureHistory>,
    sub_directory_names: Vec<String>,
}

impl BuildHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the history of `directory`. Returns `None` if there is none or
    /// it cannot be read.
    #[must_use]
    pub fn load<P: AsRef<Path>>(directory: P) -> Option<Self> {
        let path = directory.as_ref().join(HISTORY_FILE_NAME);
        if !path.is_file() {
            return None;
        }

        let parsed = fs::read_to_string(&path)
            .map_err(crate::error::Error::from)
            .and_then(|content| Ok(serde_json::from_str::<HistoryFile>(&content)?));
        match parsed {
            Ok(file) => Some(Self::from(file)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable build history '{}': {e}", path.display());
                None
            }
        }
    }

    /// Write the history into `directory`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, directory: P) -> Result<()> {
        let file = HistoryFile {
            textures: self.textures.values().cloned().collect(),
            sub_directory_names: self.sub_directory_names.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        fs::write(directory.as_ref().join(HISTORY_FILE_NAME), content)?;
        Ok(())
    }

    /// Whether `path` is a history file
    #[must_use]
    pub fn is_history_file<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .file_name()
            .is_some_and(|name| name == HISTORY_FILE_NAME)
    }

    #[must_use]
    pub fn texture(&self, output_name: &str) -> Option<&TextureHistory> {
        self.textures.get(output_name)
    }

    /// Record a texture under its output name
    pub fn insert(&mut self, texture: TextureHistory) {
        self.textures.insert(texture.output_name(), texture);
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.textures.keys().map(String::as_str)
    }

    #[must_use]
    pub fn sub_directory_names(&self) -> &[String] {
        &self.sub_directory_names
    }

    pub fn add_sub_directory(&mut self, name: impl Into<String>) {
        self.sub_directory_names.push(name.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl From<HistoryFile> for BuildHistory {
    fn from(file: HistoryFile) -> Self {
        let mut history = Self {
            textures: BTreeMap::new(),
            sub_directory_names: file.sub_directory_names,
        };
        for texture in file.textures {
            history.insert(texture);
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ColorMask, TextureSettings};
    use pretty_assertions::assert_eq;

    fn history_for(dir: &Path, output: &Path, inputs: &[&Path]) -> (TextureHistory, Vec<SourceFileInfo>) {
        let files: Vec<SourceFileInfo> = inputs
            .iter()
            .map(|p| {
                SourceFileInfo::new(
                    FileFingerprint::from_file(dir.join(p)).unwrap(),
                    TextureSettings {
                        color_mask: Some(ColorMask::Main),
                        ..TextureSettings::default()
                    },
                )
            })
            .collect();
        let entry = TextureHistory::new(FileFingerprint::from_file(output).unwrap(), files.clone());
        (entry, files)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("skin.png"), b"source").unwrap();
        let output = dir.path().join("skin.mdl");
        std::fs::write(&output, b"output").unwrap();

        let (entry, _) = history_for(dir.path(), &output, &[Path::new("skin.png")]);
        let mut history = BuildHistory::new();
        history.insert(entry.clone());
        history.add_sub_directory("weapons");
        history.save(dir.path()).unwrap();

        let loaded = BuildHistory::load(dir.path()).unwrap();
        assert_eq!(loaded, history);
        assert_eq!(loaded.texture("skin"), Some(&entry));
        assert_eq!(loaded.sub_directory_names(), ["weapons".to_string()]);
    }

    #[test]
    fn test_missing_or_corrupt_history() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BuildHistory::load(dir.path()).is_none());

        std::fs::write(dir.path().join(HISTORY_FILE_NAME), b"{ not json").unwrap();
        assert!(BuildHistory::load(dir.path()).is_none());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "version": 3,
            "textures": [{
                "output-file": {
                    "path": "out/remap1_192_223_255.mdl",
                    "file-size": 10,
                    "file-hash": "abc",
                    "last-modified": 1700000000000,
                    "extra": true
                },
                "input-files": [{
                    "path": "remap1.png",
                    "file-size": 4,
                    "file-hash": "def",
                    "last-modified": 1700000000000,
                    "color-mask": "main",
                    "dither-scale": 0.5
                }]
            }],
            "sub-directory-names": ["a"]
        }"#;
        std::fs::write(dir.path().join(HISTORY_FILE_NAME), json).unwrap();

        let history = BuildHistory::load(dir.path()).unwrap();
        let texture = history.texture("remap1_192_223_255").unwrap();
        assert_eq!(texture.input_files[0].settings.dither_scale, Some(0.5));
        assert_eq!(texture.input_files[0].settings.color_mask, Some(ColorMask::Main));
        assert_eq!(history.output_names().collect::<Vec<_>>(), vec!["remap1_192_223_255"]);
    }

    #[test]
    fn test_up_to_date_detection() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"aaaa").unwrap();
        let output = dir.path().join("a.mdl");
        std::fs::write(&output, b"built").unwrap();

        let (entry, files) = history_for(dir.path(), &output, &[Path::new("a.png")]);
        assert!(entry.is_up_to_date(&output, &files).unwrap());

        // Same size, different content
        std::fs::write(dir.path().join("a.png"), b"aaab").unwrap();
        let (_, changed) = history_for(dir.path(), &output, &[Path::new("a.png")]);
        assert!(!entry.is_up_to_date(&output, &changed).unwrap());

        // Changed settings
        let mut resettled = files.clone();
        resettled[0].settings.dither_scale = Some(0.1);
        assert!(!entry.is_up_to_date(&output, &resettled).unwrap());

        // Output touched
        std::fs::write(&output, b"other").unwrap();
        assert!(!entry.is_up_to_date(&output, &files).unwrap());
    }
}
