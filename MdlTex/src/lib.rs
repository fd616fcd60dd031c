//! # mdltex
//!
//! Texture tools for Half-Life (GoldSrc) `.mdl` models.
//!
//! ## Features
//!
//! - **Incremental builds** - Turn directories of images into indexed
//!   256-color textures, rebuilding only what changed since the last build
//! - **Color remap textures** - Assemble `dm_base`, `remapX` and model
//!   portrait textures from separately quantized color bands
//! - **Extraction** - Save model textures as editable images, split into
//!   remap band overlays
//! - **Replacement** - Write newly built textures over the textures of an
//!   existing model
//!
//! ## Quick Start
//!
//! ### Building Textures
//!
//! ```no_run
//! use mdltex::build::{BuildOptions, build_textures};
//! use mdltex::settings::SettingsResolver;
//! use std::path::Path;
//!
//! let resolver = SettingsResolver::new(None)?;
//! let stats = build_textures(
//!     Path::new("skins"),
//!     Path::new("skins_textures"),
//!     &BuildOptions::default(),
//!     &resolver,
//!     &|_progress| {},
//! )?;
//! println!("{stats}");
//! # Ok::<(), mdltex::Error>(())
//! ```
//!
//! ### Reading Model Textures
//!
//! ```no_run
//! use mdltex::formats::mdl::read_textures_from_path;
//!
//! for texture in read_textures_from_path("barney.mdl", true)? {
//!     println!("{} ({} x {})", texture.name, texture.width, texture.height);
//! }
//! # Ok::<(), mdltex::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `mdltex` command-line binary

pub mod assembler;
pub mod build;
pub mod conversion;
pub mod error;
pub mod extract;
pub mod formats;
pub mod history;
pub mod naming;
pub mod quantize;
pub mod replace;
pub mod settings;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};

    pub use crate::assembler::{AssembleOutcome, TextureAssembler};
    pub use crate::build::{BuildOptions, BuildProgress, BuildStats, OutputFormat, build_textures};
    pub use crate::extract::{ExtractFormat, ExtractOptions, extract_textures};
    pub use crate::formats::{IndexedImage, MdlSkinData, MdlTexture, MdlTextureFlags, MdlTextureInfo};
    pub use crate::history::BuildHistory;
    pub use crate::quantize::{MedianCutQuantizer, QuantizeOptions, Quantizer};
    pub use crate::replace::replace_model_textures;
    pub use crate::settings::{ColorMask, DitheringAlgorithm, SettingsResolver, SourceFileInfo, TextureSettings};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
