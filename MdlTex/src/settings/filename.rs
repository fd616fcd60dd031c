//! Settings embedded in file names
//!
//! Everything after the first dot of the file stem is a list of
//! dot-separated segments: `colorN [count]`, `main [count]` and `portrait`.
//! Later segments override earlier ones.

use super::{ColorMask, TextureSettings};
use crate::naming::is_dm_base_texture;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static COLOR_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^color(?<mask>[12])(?:\s+(?<count>\d{1,3}))?$").expect("valid regex"));

static MAIN_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^main(?:\s+(?<count>\d{1,3}))?$").expect("valid regex"));

/// Parse the settings segments of a file name.
#[must_use]
pub fn settings_from_filename<P: AsRef<Path>>(path: P) -> TextureSettings {
    let stem = path
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut settings = TextureSettings::default();
    for segment in stem.split('.').skip(1).map(|s| s.trim().to_lowercase()) {
        if let Some((mask, count)) = parse_color_segment(&segment) {
            settings.color_mask = Some(mask);
            settings.color_count = count;
        } else if segment == "portrait" {
            settings.is_model_portrait = Some(true);
        }
    }
    settings
}

fn parse_color_segment(segment: &str) -> Option<(ColorMask, Option<u32>)> {
    let count_of = |caps: &regex::Captures<'_>| caps.name("count").and_then(|m| m.as_str().parse().ok());

    if let Some(caps) = COLOR_SEGMENT.captures(segment) {
        let mask = if &caps["mask"] == "1" { ColorMask::Color1 } else { ColorMask::Color2 };
        return Some((mask, count_of(&caps)));
    }
    MAIN_SEGMENT.captures(segment).map(|caps| (ColorMask::Main, count_of(&caps)))
}

/// Insert settings segments before the extension: `remap1.png` becomes
/// `remap1.main 64.png`.
///
/// `dm_base` textures have fixed bands, so only their overlay masks are
/// written. The portrait flag is only written on main images.
#[must_use]
pub fn insert_settings_into_filename(file_name: &str, settings: &TextureSettings) -> String {
    let (stem, extension) = match file_name.rfind('.') {
        Some(dot) => file_name.split_at(dot),
        None => (file_name, ""),
    };

    let mut segments = String::new();
    if let Some(mask) = settings.color_mask {
        if is_dm_base_texture(file_name) {
            if mask != ColorMask::Main {
                segments.push_str(&format!(".color{}", mask.index()));
            }
        } else {
            match mask {
                ColorMask::Main => segments.push_str(".main"),
                _ => segments.push_str(&format!(".color{}", mask.index())),
            }
            if let Some(count) = settings.color_count {
                segments.push_str(&format!(" {count}"));
            }
        }
    }

    if settings.is_portrait() && settings.color_mask_or_default() == ColorMask::Main {
        segments.push_str(".portrait");
    }

    format!("{stem}{segments}{extension}")
}
