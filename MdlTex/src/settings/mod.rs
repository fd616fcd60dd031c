//! Per-file texture settings
//!
//! Settings come from three places, applied in this order (later wins):
//! the global rule file, the directory's rule file, and segments embedded
//! in the file name (`skin.color1 24.png`). Converter outputs can add a
//! fourth layer on top through their own file names.

mod filename;
mod rules;
mod source;

use crate::error::{Error, Result};
use crate::formats::mdl::Rgb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use filename::{insert_settings_into_filename, settings_from_filename};
pub use rules::{CONFIG_FILE_NAME, DirectorySettings, SettingsResolver};
pub use source::{FileFingerprint, SourceFileInfo, file_hash};

/// Dither scale used when none is configured
pub const DEFAULT_DITHER_SCALE: f32 = 0.75;

/// Pixels with an alpha below this value are transparent by default
pub const DEFAULT_TRANSPARENCY_THRESHOLD: u8 = 128;

/// Size of a color1 or color2 band when the band's file gives no count
pub const DEFAULT_REMAP_COLOR_COUNT: u32 = 32;

/// Which band of a color remap palette a source image fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMask {
    #[default]
    Main,
    Color1,
    Color2,
}

impl ColorMask {
    /// Band number as used in file names (`.color1`, `.color2`)
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Main => 0,
            Self::Color1 => 1,
            Self::Color2 => 2,
        }
    }
}

impl fmt::Display for ColorMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Color1 => write!(f, "color1"),
            Self::Color2 => write!(f, "color2"),
        }
    }
}

impl FromStr for ColorMask {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "main" => Ok(Self::Main),
            "color1" => Ok(Self::Color1),
            "color2" => Ok(Self::Color2),
            _ => Err(Error::InvalidSetting(format!("invalid color mask: '{s}'"))),
        }
    }
}

/// Error diffusion applied while quantizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DitheringAlgorithm {
    None,
    #[default]
    FloydSteinberg,
}

impl fmt::Display for DitheringAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::FloydSteinberg => write!(f, "floyd-steinberg"),
        }
    }
}

impl FromStr for DitheringAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "floyd-steinberg" => Ok(Self::FloydSteinberg),
            _ => Err(Error::InvalidSetting(format!("invalid dithering algorithm: '{s}'"))),
        }
    }
}

/// Sparse settings record: unset fields fall through to earlier sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TextureSettings {
    /// Treat the file as if it did not exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_mask: Option<ColorMask>,
    /// Band size for color1/color2 files; for main files of `remapX`
    /// textures this is where color1 starts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_count: Option<u32>,
    /// Color remap texture with color1 and color2 swapped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_model_portrait: Option<bool>,
    /// Use an indexed source image's palette and indices as-is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_palette: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dithering_algorithm: Option<DitheringAlgorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dither_scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparency_threshold: Option<u8>,
    /// Pixels of exactly this color are transparent
    #[serde(skip_serializing_if = "Option::is_none", with = "hex_color")]
    pub transparency_color: Option<Rgb>,
    /// External program run on the file before it is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter: Option<String>,
    /// Converter command line; must contain `{input}` and `{output}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter_arguments: Option<String>,
}

impl TextureSettings {
    /// Copy every field that is set in `other` over this one.
    pub fn override_with(&mut self, other: &Self) {
        if other.ignore.is_some() {
            self.ignore = other.ignore;
        }
        if other.color_mask.is_some() {
            self.color_mask = other.color_mask;
        }
        if other.color_count.is_some() {
            self.color_count = other.color_count;
        }
        if other.is_model_portrait.is_some() {
            self.is_model_portrait = other.is_model_portrait;
        }
        if other.preserve_palette.is_some() {
            self.preserve_palette = other.preserve_palette;
        }
        if other.dithering_algorithm.is_some() {
            self.dithering_algorithm = other.dithering_algorithm;
        }
        if other.dither_scale.is_some() {
            self.dither_scale = other.dither_scale;
        }
        if other.transparency_threshold.is_some() {
            self.transparency_threshold = other.transparency_threshold;
        }
        if other.transparency_color.is_some() {
            self.transparency_color = other.transparency_color;
        }
        if other.converter.is_some() {
            self.converter.clone_from(&other.converter);
        }
        if other.converter_arguments.is_some() {
            self.converter_arguments.clone_from(&other.converter_arguments);
        }
    }

    /// This record overridden by `other`
    #[must_use]
    pub fn overridden_by(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.override_with(other);
        merged
    }

    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignore.unwrap_or(false)
    }

    #[must_use]
    pub fn color_mask_or_default(&self) -> ColorMask {
        self.color_mask.unwrap_or_default()
    }

    #[must_use]
    pub fn is_portrait(&self) -> bool {
        self.is_model_portrait.unwrap_or(false)
    }

    #[must_use]
    pub fn preserves_palette(&self) -> bool {
        self.preserve_palette.unwrap_or(false)
    }

    #[must_use]
    pub fn dithering_or_default(&self) -> DitheringAlgorithm {
        self.dithering_algorithm.unwrap_or_default()
    }

    /// Dither scale, clamped to 0..=1
    #[must_use]
    pub fn dither_scale_or_default(&self) -> f32 {
        self.dither_scale.unwrap_or(DEFAULT_DITHER_SCALE).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn transparency_threshold_or_default(&self) -> u8 {
        self.transparency_threshold.unwrap_or(DEFAULT_TRANSPARENCY_THRESHOLD)
    }

    /// Whether a pixel counts as transparent under these settings
    #[must_use]
    pub fn is_transparent(&self, pixel: [u8; 4]) -> bool {
        let [r, g, b, a] = pixel;
        a < self.transparency_threshold_or_default() || self.transparency_color == Some([r, g, b])
    }
}

/// `transparency-color` is stored as an `RRGGBB` hex string
mod hex_color {
    use crate::formats::mdl::Rgb;
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(color: &Option<Rgb>, serializer: S) -> Result<S::Ok, S::Error> {
        match color {
            Some([r, g, b]) => serializer.serialize_str(&format!("{r:02X}{g:02X}{b:02X}")),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Rgb>, D::Error> {
        let Some(hex) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let hex = hex.trim_start_matches('#');
        // RRGGBB or RRGGBBAA; alpha is ignored
        if (hex.len() != 6 && hex.len() != 8) || !hex.is_ascii() {
            return Err(de::Error::custom(format!("invalid color: '{hex}'")));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(de::Error::custom);
        Ok(Some([channel(0)?, channel(2)?, channel(4)?]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_override_only_set_fields() {
        let mut base = TextureSettings {
            color_mask: Some(ColorMask::Color1),
            dither_scale: Some(0.5),
            ..TextureSettings::default()
        };
        let overrides = TextureSettings {
            color_count: Some(24),
            dither_scale: Some(0.25),
            ..TextureSettings::default()
        };

        base.override_with(&overrides);
        assert_eq!(base.color_mask, Some(ColorMask::Color1));
        assert_eq!(base.color_count, Some(24));
        assert_eq!(base.dither_scale, Some(0.25));
    }

    #[test]
    fn test_defaults() {
        let settings = TextureSettings::default();
        assert_eq!(settings.color_mask_or_default(), ColorMask::Main);
        assert_eq!(settings.dithering_or_default(), DitheringAlgorithm::FloydSteinberg);
        assert!((settings.dither_scale_or_default() - 0.75).abs() < f32::EPSILON);
        assert_eq!(settings.transparency_threshold_or_default(), 128);
    }

    #[test]
    fn test_transparency_predicate() {
        let settings = TextureSettings {
            transparency_color: Some([0, 0, 255]),
            ..TextureSettings::default()
        };
        assert!(settings.is_transparent([10, 10, 10, 127]));
        assert!(!settings.is_transparent([10, 10, 10, 128]));
        assert!(settings.is_transparent([0, 0, 255, 255]));
    }

    #[test]
    fn test_json_uses_kebab_case_keys() {
        let settings = TextureSettings {
            color_mask: Some(ColorMask::Color2),
            dithering_algorithm: Some(DitheringAlgorithm::FloydSteinberg),
            transparency_color: Some([255, 0, 128]),
            ..TextureSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(
            json,
            r#"{"color-mask":"color2","dithering-algorithm":"floyd-steinberg","transparency-color":"FF0080"}"#
        );

        let parsed: TextureSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Color1".parse::<ColorMask>().unwrap(), ColorMask::Color1);
        assert_eq!("none".parse::<DitheringAlgorithm>().unwrap(), DitheringAlgorithm::None);
        assert!("color3".parse::<ColorMask>().is_err());
    }
}
