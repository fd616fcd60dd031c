//! File format handlers
//!
//! - [`mdl`]: texture storage inside Half-Life v10 models
//! - [`indexed`]: palette images (PNG, GIF, BMP) and full-color image I/O

pub mod indexed;
pub mod mdl;

// Re-export main types
pub use indexed::{IndexedImage, is_supported_image, load_indexed, load_rgba, save_indexed, save_rgba};
pub use mdl::{MdlSkinData, MdlTexture, MdlTextureFlags, MdlTextureInfo};
