//! Build options and results

use crate::error::{Error, Result};
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;
use std::str::FromStr;

/// File format of built textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Standalone model file holding a single texture
    #[default]
    Mdl,
    /// 8-bit indexed bitmap
    Bmp,
}

impl OutputFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mdl => "mdl",
            Self::Bmp => "bmp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mdl" => Ok(Self::Mdl),
            "bmp" => Ok(Self::Bmp),
            _ => Err(Error::InvalidUsage(format!("unsupported output format: '{s}'"))),
        }
    }
}

/// Options for [`build_textures`](super::build_textures)
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Rebuild every texture, ignoring the build history
    pub full_rebuild: bool,
    /// Also build sub-directories, into matching output sub-directories
    pub include_subdirectories: bool,
    /// Remove output sub-directories whose input sub-directory was removed
    pub remove_subdirectories: bool,
    pub format: OutputFormat,
}

/// Texture counts of a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl BuildStats {
    /// No texture was written or removed
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

impl AddAssign for BuildStats {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "added {}, updated {} and removed {} textures",
            self.added, self.updated, self.removed
        )
    }
}

/// Progress of the texture builds in one directory
#[derive(Debug, Clone)]
pub struct BuildProgress {
    pub directory: PathBuf,
    /// Current texture number (1-indexed)
    pub current: usize,
    pub total: usize,
    pub texture_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_add() {
        let mut stats = BuildStats::default();
        assert!(stats.is_unchanged());
        stats += BuildStats {
            added: 1,
            updated: 2,
            removed: 3,
        };
        stats += BuildStats {
            added: 1,
            updated: 0,
            removed: 0,
        };
        assert_eq!(
            stats,
            BuildStats {
                added: 2,
                updated: 2,
                removed: 3
            }
        );
        assert_eq!(stats.to_string(), "added 2, updated 2 and removed 3 textures");
    }

    #[test]
    fn test_output_format() {
        assert_eq!("BMP".parse::<OutputFormat>().unwrap(), OutputFormat::Bmp);
        assert_eq!(OutputFormat::default().extension(), "mdl");
        assert!(matches!("png".parse::<OutputFormat>(), Err(Error::InvalidUsage(_))));
    }
}
