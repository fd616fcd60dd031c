//! Texture names and color remap band layouts
//!
//! Source files are grouped by texture name: the file name up to its first
//! dot, lower-cased. Color remap textures (`dm_base` and `remapX`) carry
//! their band boundaries in the output name, `remap1_064_095_127`: color1
//! starts at 64 and ends at 95, color2 ends at 127.

use crate::settings::{ColorMask, DEFAULT_REMAP_COLOR_COUNT, SourceFileInfo};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Number of palette entries in every texture
pub const PALETTE_COLORS: i32 = 256;

static DM_BASE_GROUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^dm_base$").expect("valid regex"));

static DM_BASE_TEXTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^dm_base(?:\.bmp)?").expect("valid regex"));

static REMAP_GROUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^remap[0-9a-z]$").expect("valid regex"));

static REMAP_TEXTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?<base>remap[0-9a-z])_(?<start1>\d{3})_(?<end1>\d{3})_(?<end2>\d{3})(?:\.bmp)?$")
        .expect("valid regex")
});

/// Texture name of a source file: the file name up to its first dot, lower-cased
#[must_use]
pub fn texture_name<P: AsRef<Path>>(path: P) -> String {
    let file_name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name.split('.').next().unwrap_or_default().to_lowercase()
}

/// `dm_base` source group
#[must_use]
pub fn is_dm_base_group(name: &str) -> bool {
    DM_BASE_GROUP.is_match(name)
}

/// Model texture (or file) name that starts with `dm_base`
#[must_use]
pub fn is_dm_base_texture(name: &str) -> bool {
    DM_BASE_TEXTURE.is_match(name)
}

/// `remapX` source group, where X is a single digit or letter
#[must_use]
pub fn is_remap_group(name: &str) -> bool {
    REMAP_GROUP.is_match(name)
}

/// Band layout encoded in a model texture name such as `remap1_064_095_127.bmp`
#[must_use]
pub fn parse_remap_texture_name(name: &str) -> Option<BandLayout> {
    let caps = REMAP_TEXTURE.captures(name)?;
    let number = |group: &str| caps[group].parse::<i32>().ok();
    let (start1, end1, end2) = (number("start1")?, number("end1")?, number("end2")?);

    let color1_count = end1 - start1 + 1;
    let color2_count = end2 - end1;
    Some(BandLayout {
        main_count: PALETTE_COLORS - color1_count - color2_count,
        color1_start: start1,
        color1_count,
        color2_count,
    })
}

/// Band layout of a model texture, by name: remap names carry their own
/// boundaries, `dm_base` uses the fixed legacy bands.
#[must_use]
pub fn texture_band_layout(name: &str) -> Option<BandLayout> {
    parse_remap_texture_name(name).or_else(|| is_dm_base_texture(name).then_some(BandLayout::LEGACY))
}

/// Source group name for a texture stored in a model: lower-cased stem,
/// with band suffixes removed (`Remap1_064_095_127.bmp` becomes `remap1`).
#[must_use]
pub fn group_name_for_model_texture(name: &str) -> String {
    if let Some(caps) = REMAP_TEXTURE.captures(name) {
        return caps["base"].to_lowercase();
    }
    if is_dm_base_texture(name) {
        return "dm_base".to_string();
    }
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.to_lowercase()
}

/// How the palette of a color remap texture is divided
///
/// Color1 occupies `color1_start..color1_start + color1_count` and color2
/// follows directly. The main band holds `main_count` colors starting at 0;
/// when that is more than `color1_start`, the remainder continues after
/// color2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandLayout {
    pub main_count: i32,
    pub color1_start: i32,
    pub color1_count: i32,
    pub color2_count: i32,
}

impl BandLayout {
    /// `dm_base` and model portrait layout: main 0-159, color1 160-191,
    /// color2 192-223. 224-255 stay unused.
    pub const LEGACY: Self = Self {
        main_count: 160,
        color1_start: 160,
        color1_count: 32,
        color2_count: 32,
    };

    /// Layout for a `remapX` group: band sizes come from the color1 and
    /// color2 files (0 when absent), color1 starts at the main file's color
    /// count or directly after the main band.
    #[must_use]
    pub fn for_remap_group(files: &[SourceFileInfo]) -> Self {
        let band_count = |mask: ColorMask| {
            find_band_file(files, mask)
                .map_or(0, |f| f.settings.color_count.unwrap_or(DEFAULT_REMAP_COLOR_COUNT) as i32)
        };
        let color1_count = band_count(ColorMask::Color1);
        let color2_count = band_count(ColorMask::Color2);
        let main_count = PALETTE_COLORS - color1_count - color2_count;
        let color1_start = find_band_file(files, ColorMask::Main)
            .and_then(|f| f.settings.color_count)
            .map_or(main_count, |count| count as i32);

        Self {
            main_count,
            color1_start,
            color1_count,
            color2_count,
        }
    }

    /// Layout for any source group, or `None` if the group is not a color
    /// remap texture.
    #[must_use]
    pub fn for_group(name: &str, files: &[SourceFileInfo]) -> Option<Self> {
        if is_remap_group(name) {
            Some(Self::for_remap_group(files))
        } else if is_dm_base_group(name) || files.iter().any(|f| f.settings.is_portrait()) {
            Some(Self::LEGACY)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn color2_start(&self) -> i32 {
        self.color1_start + self.color1_count
    }

    #[must_use]
    pub const fn color1_end(&self) -> i32 {
        self.color1_start + self.color1_count - 1
    }

    #[must_use]
    pub const fn color2_end(&self) -> i32 {
        self.color1_end() + self.color2_count
    }

    /// Main band continues after color2
    #[must_use]
    pub const fn is_main_split(&self) -> bool {
        self.main_count > self.color1_start
    }

    /// All bands fit in a 256-color palette without overlapping
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.main_count >= 0
            && self.color1_count >= 0
            && self.color2_count >= 0
            && self.color1_start >= 0
            && self.color2_start() + self.color2_count <= PALETTE_COLORS
            && self.main_count - self.color1_start.min(self.main_count)
                <= PALETTE_COLORS - self.color2_start() - self.color2_count
    }

    /// Palette range of a band, as half-open ranges (the main band may be split)
    #[must_use]
    pub fn ranges(&self, mask: ColorMask) -> Vec<std::ops::Range<usize>> {
        let range = |start: i32, count: i32| start.max(0) as usize..(start + count).max(0) as usize;
        match mask {
            ColorMask::Main if self.is_main_split() => vec![
                range(0, self.color1_start),
                range(
                    self.color2_start() + self.color2_count,
                    self.main_count - self.color1_start,
                ),
            ],
            ColorMask::Main => vec![range(0, self.main_count)],
            ColorMask::Color1 => vec![range(self.color1_start, self.color1_count)],
            ColorMask::Color2 => vec![range(self.color2_start(), self.color2_count)],
        }
    }

    /// Band that a palette index belongs to, if any
    #[must_use]
    pub fn band_of(&self, index: u8) -> Option<ColorMask> {
        let index = usize::from(index);
        [ColorMask::Main, ColorMask::Color1, ColorMask::Color2]
            .into_iter()
            .find(|&mask| self.ranges(mask).iter().any(|r| r.contains(&index)))
    }

    /// `_SSS_EEE_FFF` suffix for output names
    #[must_use]
    pub fn name_suffix(&self) -> String {
        format!(
            "_{:03}_{:03}_{:03}",
            self.color1_start,
            self.color1_end(),
            self.color2_end()
        )
    }
}

/// First file of a group that fills the given band
#[must_use]
pub fn find_band_file(files: &[SourceFileInfo], mask: ColorMask) -> Option<&SourceFileInfo> {
    files.iter().find(|f| f.settings.color_mask_or_default() == mask)
}

/// Output name (without extension) for a group: `dm_base` and `remapX`
/// groups get their band boundaries appended.
#[must_use]
pub fn output_name(name: &str, files: &[SourceFileInfo]) -> String {
    if is_remap_group(name) {
        format!("{name}{}", BandLayout::for_remap_group(files).name_suffix())
    } else if is_dm_base_group(name) {
        format!("{name}{}", BandLayout::LEGACY.name_suffix())
    } else {
        name.to_string()
    }
}
