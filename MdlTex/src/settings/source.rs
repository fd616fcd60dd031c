//! File fingerprints used for change detection

use super::TextureSettings;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Size, content hash and modification time of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileFingerprint {
    pub path: PathBuf,
    pub file_size: u64,
    /// Lower-case hex MD5 of the file contents
    pub file_hash: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
}

impl FileFingerprint {
    /// Fingerprint a file on disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let last_modified = metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());

        Ok(Self {
            path: path.to_path_buf(),
            file_size: metadata.len(),
            file_hash: file_hash(path)?,
            last_modified,
        })
    }

    /// Placeholder for a file whose contents are not known yet
    #[must_use]
    pub fn unhashed<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file_size: 0,
            file_hash: String::new(),
            last_modified: Utc::now(),
        }
    }

    /// File name (without directories) as a string
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Same size and same content hash
    #[must_use]
    pub fn has_same_content(&self, other: &Self) -> bool {
        self.file_size == other.file_size && self.file_hash == other.file_hash
    }
}

/// MD5 of a file's contents as lower-case hex
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn file_hash<P: AsRef<Path>>(path: P) -> Result<String> {
    let data = std::fs::read(path)?;
    Ok(format!("{:x}", md5::compute(&data)))
}

/// A source image together with the settings that apply to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFileInfo {
    #[serde(flatten)]
    pub fingerprint: FileFingerprint,
    /// Stored alongside the fingerprint fields
    #[serde(flatten)]
    pub settings: TextureSettings,
}

impl SourceFileInfo {
    #[must_use]
    pub fn new(fingerprint: FileFingerprint, settings: TextureSettings) -> Self {
        Self { fingerprint, settings }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.fingerprint.path
    }

    /// Same file name, content and settings
    #[must_use]
    pub fn is_unchanged_from(&self, previous: &Self) -> bool {
        self.fingerprint.file_name() == previous.fingerprint.file_name()
            && self.fingerprint.has_same_content(&previous.fingerprint)
            && self.settings == previous.settings
    }
}
