//! Rule files (`modeltexturemaker.config`)
//!
//! One rule per line: a file name pattern followed by `key: value` settings.
//!
//! ```text
//! // comments start with two slashes
//! *.png          dithering: none
//! remap1.png     color-mask: main  color-count: 64
//! *.psd          converter: 'magick'  arguments: '{input} {output}.png'
//! ```
//!
//! Patterns with `*` are wildcards (`\*` is a literal star); other patterns
//! match the lower-cased file name or texture name exactly. Matching rules
//! are applied in declaration order, wildcard rules before exact rules.

use super::filename::settings_from_filename;
use super::source::{FileFingerprint, SourceFileInfo};
use super::{ColorMask, DitheringAlgorithm, TextureSettings};
use crate::conversion::validate_converter_arguments;
use crate::error::{Error, Result};
use crate::naming::texture_name;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the rule file looked up in each input directory
pub const CONFIG_FILE_NAME: &str = "modeltexturemaker.config";

#[derive(Debug, Clone)]
struct Rule {
    order: usize,
    pattern: String,
    settings: TextureSettings,
}

/// Settings resolution context for one build, extract or replace run.
///
/// Holds the global rules; per-directory rules are layered on top by
/// [`SettingsResolver::for_directory`].
#[derive(Debug, Clone, Default)]
pub struct SettingsResolver {
    global_rules: Vec<Rule>,
}

impl SettingsResolver {
    /// Create a resolver, reading global rules from `global_config` if it exists.
    ///
    /// # Errors
    /// Returns an error if the global rule file exists but cannot be parsed.
    pub fn new(global_config: Option<&Path>) -> Result<Self> {
        let mut global_rules = Vec::new();
        if let Some(path) = global_config.filter(|p| p.is_file()) {
            tracing::debug!("Reading global rules from {}", path.display());
            parse_rule_file(path, &mut global_rules)?;
        }
        Ok(Self { global_rules })
    }

    /// Global rule file next to the running executable
    #[must_use]
    pub fn default_global_config() -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        Some(exe.parent()?.join(CONFIG_FILE_NAME))
    }

    /// Rules for files in `directory`: the global rules followed by the
    /// directory's own rule file, if any.
    ///
    /// # Errors
    /// Returns an error if the directory's rule file cannot be parsed.
    pub fn for_directory<P: AsRef<Path>>(&self, directory: P) -> Result<DirectorySettings> {
        let mut rules = self.global_rules.clone();
        let path = directory.as_ref().join(CONFIG_FILE_NAME);
        if path.is_file() {
            parse_rule_file(&path, &mut rules)?;
        }
        Ok(DirectorySettings::new(rules))
    }
}

/// Compiled rules for a single directory
#[derive(Debug, Default)]
pub struct DirectorySettings {
    exact_rules: HashMap<String, Vec<Rule>>,
    wildcard_rules: Vec<(Regex, Rule)>,
}

impl DirectorySettings {
    fn new(rules: Vec<Rule>) -> Self {
        let mut settings = Self::default();
        for rule in rules {
            if rule.pattern.contains('*') {
                match Regex::new(&wildcard_regex_source(&rule.pattern)) {
                    Ok(regex) => settings.wildcard_rules.push((regex, rule)),
                    Err(e) => tracing::warn!("Ignoring rule pattern '{}': {e}", rule.pattern),
                }
            } else {
                settings.exact_rules.entry(rule.pattern.clone()).or_default().push(rule);
            }
        }
        settings
    }

    /// Settings for a file: matching rules, then the file name's own settings.
    #[must_use]
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> TextureSettings {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut settings = TextureSettings::default();
        for rule in self.matching_rules(&file_name) {
            settings.override_with(&rule.settings);
        }
        settings.override_with(&settings_from_filename(path));
        settings
    }

    /// Fingerprint a file and resolve its settings.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn source_file_info<P: AsRef<Path>>(&self, path: P) -> Result<SourceFileInfo> {
        let path = path.as_ref();
        Ok(SourceFileInfo::new(FileFingerprint::from_file(path)?, self.resolve(path)))
    }

    fn matching_rules(&self, file_name: &str) -> Vec<&Rule> {
        let mut wildcard: Vec<&Rule> = self
            .wildcard_rules
            .iter()
            .filter(|(regex, _)| regex.is_match(file_name))
            .map(|(_, rule)| rule)
            .collect();
        wildcard.sort_by_key(|rule| rule.order);

        let name = texture_name(file_name);
        let mut exact: Vec<&Rule> = self
            .exact_rules
            .get(file_name)
            .or_else(|| self.exact_rules.get(&name))
            .map(|rules| rules.iter().collect())
            .unwrap_or_default();
        exact.sort_by_key(|rule| rule.order);

        wildcard.extend(exact);
        wildcard
    }
}

/// `*` matches anything, `\*` is a literal star, everything else is literal
fn wildcard_regex_source(pattern: &str) -> String {
    let mut source = String::from("^");
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'*') => {
                chars.next();
                literal.push('*');
            }
            '*' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(".*");
            }
            _ => literal.push(c),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');
    source
}

fn parse_rule_file(path: &Path, rules: &mut Vec<Rule>) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    for (index, line) in content.lines().enumerate() {
        let rule = parse_rule_line(line, rules.len()).map_err(|message| Error::InvalidRule {
            path: path.to_path_buf(),
            line: index + 1,
            message,
        })?;
        if let Some(rule) = rule {
            rules.push(rule);
        }
    }
    Ok(())
}

fn parse_rule_line(line: &str, order: usize) -> std::result::Result<Option<Rule>, String> {
    let tokens = tokenize(line)?;
    let mut tokens = tokens.into_iter();
    let Some(pattern) = tokens.next() else {
        return Ok(None);
    };

    // Directories in patterns are ignored
    let pattern = pattern.rsplit('/').next().unwrap_or_default().to_lowercase();
    let mut parser = RuleParser { tokens };
    let mut settings = TextureSettings::default();

    while let Some(key) = parser.tokens.next() {
        parser.expect_colon()?;
        match key.to_lowercase().as_str() {
            "ignore" => settings.ignore = Some(parser.value("boolean", parse_bool)?),
            "color-mask" => {
                settings.color_mask = Some(parser.value("remap color mask", |s| s.parse::<ColorMask>().ok())?);
            }
            "color-count" => settings.color_count = Some(parser.value("remap color count", |s| s.parse().ok())?),
            "is-model-portrait" => settings.is_model_portrait = Some(parser.value("boolean", parse_bool)?),
            "preserve-palette" => settings.preserve_palette = Some(parser.value("boolean", parse_bool)?),
            "dithering" => {
                settings.dithering_algorithm =
                    Some(parser.value("dithering algorithm", |s| s.parse::<DitheringAlgorithm>().ok())?);
            }
            "dither-scale" => settings.dither_scale = Some(parser.value("dither scale", |s| s.parse().ok())?),
            "transparency-threshold" => {
                settings.transparency_threshold = Some(parser.value("transparency threshold", |s| s.parse().ok())?);
            }
            "transparency-color" => {
                let r = parser.value("color channel", |s| s.parse().ok())?;
                let g = parser.value("color channel", |s| s.parse().ok())?;
                let b = parser.value("color channel", |s| s.parse().ok())?;
                settings.transparency_color = Some([r, g, b]);
            }
            "converter" => settings.converter = Some(parser.value("converter command string", |s| Some(s.to_string()))?),
            "arguments" => {
                let arguments = parser.value("converter arguments string", |s| Some(s.to_string()))?;
                validate_converter_arguments(&arguments).map_err(|e| e.to_string())?;
                settings.converter_arguments = Some(arguments);
            }
            _ => return Err(format!("unknown setting: '{key}'")),
        }
    }

    Ok(Some(Rule {
        order,
        pattern,
        settings,
    }))
}

struct RuleParser {
    tokens: std::vec::IntoIter<String>,
}

impl RuleParser {
    fn expect_colon(&mut self) -> std::result::Result<(), String> {
        match self.tokens.next() {
            Some(token) if token == ":" => Ok(()),
            Some(token) => Err(format!("expected a ':', but found '{token}'")),
            None => Err("expected a ':', but found end of line".to_string()),
        }
    }

    fn value<T>(&mut self, label: &str, parse: impl Fn(&str) -> Option<T>) -> std::result::Result<T, String> {
        let token = self
            .tokens
            .next()
            .ok_or_else(|| format!("expected a {label}, but found end of line"))?;
        parse(&token).ok_or_else(|| format!("expected a {label}, but found '{token}'"))
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Split a rule line into tokens.
///
/// Whitespace separates tokens, `:` is always a token of its own, `'...'`
/// quotes a string (with `\'` for a literal quote) and `//` starts a comment.
fn tokenize(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                take_token(&mut current, &mut tokens);
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        None => return Err("expected a ' but found end of line".to_string()),
                        Some('\\') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            quoted.push('\'');
                        }
                        Some('\'') => break,
                        Some(ch) => quoted.push(ch),
                    }
                }
                tokens.push(quoted);
            }
            '/' if chars.peek() == Some(&'/') => break,
            ':' => {
                take_token(&mut current, &mut tokens);
                tokens.push(":".to_string());
            }
            c if c.is_whitespace() => take_token(&mut current, &mut tokens),
            c => current.push(c),
        }
    }
    take_token(&mut current, &mut tokens);
    Ok(tokens)
}

fn take_token(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings_for(config: &str, file: &str) -> TextureSettings {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), config).unwrap();
        let resolver = SettingsResolver::default();
        resolver.for_directory(dir.path()).unwrap().resolve(dir.path().join(file))
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize(r"*.psd converter:'my tool' arguments: '{input} \'{output}\'' // note").unwrap(),
            vec!["*.psd", "converter", ":", "my tool", "arguments", ":", "{input} '{output}'"]
        );
        assert!(tokenize("a converter: 'unterminated").is_err());
        assert!(tokenize("// only a comment").unwrap().is_empty());
    }

    #[test]
    fn test_wildcard_regex() {
        let regex = Regex::new(&wildcard_regex_source(r"skin*.png")).unwrap();
        assert!(regex.is_match("skin.color1.png"));
        assert!(!regex.is_match("skinxpng"));

        let literal = Regex::new(&wildcard_regex_source(r"a\*b")).unwrap();
        assert!(literal.is_match("a*b"));
        assert!(!literal.is_match("axb"));
    }

    #[test]
    fn test_later_rules_win_and_exact_overrides_wildcard() {
        let config = "\
skin.png dithering: none
*.png dithering: floyd-steinberg dither-scale: 0.5
*.png dither-scale: 0.25
";
        let settings = settings_for(config, "skin.png");
        assert_eq!(settings.dithering_algorithm, Some(DitheringAlgorithm::None));
        assert_eq!(settings.dither_scale, Some(0.25));
    }

    #[test]
    fn test_exact_rule_matches_texture_name() {
        let settings = settings_for("remap1 color-count: 24\n", "remap1.color1.png");
        assert_eq!(settings.color_count, Some(24));
        assert_eq!(settings.color_mask, Some(ColorMask::Color1));
    }

    #[test]
    fn test_filename_settings_win() {
        let settings = settings_for("*.png color-mask: color2 color-count: 8\n", "remap1.color1.png");
        assert_eq!(settings.color_mask, Some(ColorMask::Color1));
        // A mask without a count leaves the rule's count in place
        assert_eq!(settings.color_count, Some(8));
    }

    #[test]
    fn test_transparency_color_and_booleans() {
        let settings = settings_for("a.png transparency-color: 0 0 255 ignore: True\n", "a.png");
        assert_eq!(settings.transparency_color, Some([0, 0, 255]));
        assert_eq!(settings.ignore, Some(true));
    }

    #[test]
    fn test_invalid_rules_report_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "// header\na.png bogus: 1\n").unwrap();
        let err = SettingsResolver::default().for_directory(dir.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidRule { line: 2, .. }));

        assert!(parse_rule_line("a.png dither-scale 0.5", 0).is_err());
        assert!(parse_rule_line("a.png arguments: '{input}'", 0).is_err());
    }

    #[test]
    fn test_global_rules_come_first() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.config");
        std::fs::write(&global, "*.png dither-scale: 0.1 preserve-palette: true\n").unwrap();
        let input = dir.path().join("input");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join(CONFIG_FILE_NAME), "*.png dither-scale: 0.9\n").unwrap();

        let resolver = SettingsResolver::new(Some(&global)).unwrap();
        let settings = resolver.for_directory(&input).unwrap().resolve(input.join("a.png"));
        assert_eq!(settings.dither_scale, Some(0.9));
        assert_eq!(settings.preserve_palette, Some(true));
    }
}
