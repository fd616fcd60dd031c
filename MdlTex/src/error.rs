//! Error types for `MdlTex`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `MdlTex` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Usage Errors ====================
    /// Invalid command-line usage (bad arguments, missing paths).
    ///
    /// Reported to the user as a single line, without further processing.
    #[error("{0}")]
    InvalidUsage(String),

    // ==================== MDL Format Errors ====================
    /// The file is not an MDL file (missing IDST signature).
    #[error("invalid MDL signature: expected IDST, found {0:?}")]
    InvalidMdlSignature([u8; 4]),

    /// The MDL version is not supported.
    #[error("unsupported MDL version: {version} (only v10 is supported)")]
    UnsupportedMdlVersion {
        /// The version number found in the file.
        version: i32,
    },

    /// A header field or texture record holds an impossible value.
    #[error("invalid MDL structure: {message}")]
    InvalidMdlStructure {
        /// Description of what is invalid.
        message: String,
    },

    // ==================== Texture Errors ====================
    /// The texture's pixel data does not match its declared dimensions.
    #[error("texture '{name}' has {actual} pixels, expected {expected}")]
    TextureDataMismatch {
        /// Texture name.
        name: String,
        /// Expected pixel count (`width * height`).
        expected: usize,
        /// Actual pixel count.
        actual: usize,
    },

    /// Source images for a single texture have different dimensions.
    #[error("source image '{path}' is {actual_width}x{actual_height}, expected {width}x{height}")]
    ImageSizeMismatch {
        /// The offending image.
        path: PathBuf,
        /// Expected width.
        width: u32,
        /// Expected height.
        height: u32,
        /// Actual width.
        actual_width: u32,
        /// Actual height.
        actual_height: u32,
    },

    // ==================== Image Codec Errors ====================
    /// Failed to decode or encode an image through the `image` crate.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// The image format is not supported for the requested operation.
    #[error("unsupported image format: {path}")]
    UnsupportedImageFormat {
        /// The path whose format was rejected.
        path: PathBuf,
    },

    /// The image is not stored in an indexed (palette) format.
    #[error("'{path}' is not an indexed image")]
    NotIndexed {
        /// The image path.
        path: PathBuf,
    },

    /// Failed to decode an indexed image.
    #[error("failed to decode indexed image '{path}': {message}")]
    IndexedDecodeFailed {
        /// The image path.
        path: PathBuf,
        /// The decoder error message.
        message: String,
    },

    /// Failed to encode an indexed image.
    #[error("failed to encode indexed image '{path}': {message}")]
    IndexedEncodeFailed {
        /// The image path.
        path: PathBuf,
        /// The encoder error message.
        message: String,
    },

    // ==================== Settings Errors ====================
    /// A rule in a settings file could not be parsed.
    #[error("{path}:{line}: {message}")]
    InvalidRule {
        /// The rule file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A settings value could not be parsed.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    // ==================== Converter Errors ====================
    /// Converter arguments are missing or lack the required markers.
    #[error("invalid converter arguments: {0}")]
    InvalidConverterArguments(String),

    /// The external converter could not be run or reported failure.
    #[error("converter '{command}' failed: {message}")]
    ConverterFailed {
        /// The converter executable.
        command: String,
        /// Failure description.
        message: String,
    },

    /// The external converter produced no usable image.
    #[error("converter produced no supported output for '{path}'")]
    ConverterNoOutput {
        /// The source file that was converted.
        path: PathBuf,
    },

    // ==================== Parsing Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ==================== File System Errors ====================
    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

/// A specialized Result type for `MdlTex` operations.
pub type Result<T> = std::result::Result<T, Error>;
