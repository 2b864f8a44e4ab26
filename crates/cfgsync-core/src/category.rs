//! Path classification and logical key derivation
//!
//! Every physical file under the configuration root either belongs to exactly
//! one logical artifact or is excluded from sync. [`KeyDeriver`] decides which,
//! and maps the file to the key its artifact lives under in the replicated
//! store. The mapping depends only on (category, name, term), so every
//! constituent file of an artifact lands on the same key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Prefix of every key owned by the customization sync namespace
pub const SYNC_PREFIX: &str = "ix:";

/// Upper bound appended to a prefix to build an exclusive range end
pub const RANGE_END: char = '\u{10ffff}';

/// Key of an artifact in the replicated store
pub type LogicalKey = String;

const MANIFEST_FILE: &str = "manifest.json";
const MAIN_SCRIPT_FILE: &str = "main.js";
const STYLESHEET_FILE: &str = "styles.css";
const THEME_STYLESHEET_FILE: &str = "theme.css";
const DATA_FILE: &str = "data.json";

/// Classification of a physical path
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Category {
    /// A top-level settings file (`<config>/app.json`)
    #[serde(rename = "CONFIG")]
    Config,
    /// A theme folder (`<config>/themes/<theme>/...`)
    #[serde(rename = "THEME")]
    Theme,
    /// A CSS snippet (`<config>/snippets/<file>.css`)
    #[serde(rename = "SNIPPET")]
    Snippet,
    /// The code of an extension: manifest, main script and stylesheet
    #[serde(rename = "PLUGIN_MAIN")]
    PluginMain,
    /// The data file of an extension
    #[serde(rename = "PLUGIN_DATA")]
    PluginData,
    /// Any other extension file, tracked file-pair-wise.
    ///
    /// Only documents written by older versions carry this category;
    /// [`KeyDeriver::classify`] never produces it.
    #[serde(rename = "PLUGIN_ETC")]
    PluginEtc,
    /// Not a sync target
    #[default]
    #[serde(rename = "")]
    Untracked,
}

impl Category {
    /// Name used in keys and document bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Config => "CONFIG",
            Category::Theme => "THEME",
            Category::Snippet => "SNIPPET",
            Category::PluginMain => "PLUGIN_MAIN",
            Category::PluginData => "PLUGIN_DATA",
            Category::PluginEtc => "PLUGIN_ETC",
            Category::Untracked => "",
        }
    }

    /// Whether files of this category are synchronized at all
    pub fn is_tracked(&self) -> bool {
        !matches!(self, Category::Untracked)
    }

    /// Whether applying an artifact of this category requires an extension reload
    pub fn is_plugin(&self) -> bool {
        matches!(
            self,
            Category::PluginMain | Category::PluginData | Category::PluginEtc
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIG" => Ok(Category::Config),
            "THEME" => Ok(Category::Theme),
            "SNIPPET" => Ok(Category::Snippet),
            "PLUGIN_MAIN" => Ok(Category::PluginMain),
            "PLUGIN_DATA" => Ok(Category::PluginData),
            "PLUGIN_ETC" => Ok(Category::PluginEtc),
            "" => Ok(Category::Untracked),
            other => Err(CodecError::UnknownCategory(other.to_string())),
        }
    }
}

/// Key namespace owned by one device/vault
pub fn key_namespace(term: &str) -> String {
    format!("{SYNC_PREFIX}{term}/")
}

/// Key of the settings-table entry for an artifact (`CATEGORY/name`)
pub fn settings_key(category: Category, name: &str) -> String {
    format!("{category}/{name}")
}

/// Build the key for an artifact from its identity
pub fn key_for(category: Category, name: &str, term: &str) -> LogicalKey {
    format!("{SYNC_PREFIX}{term}/{category}/{name}.md")
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn penultimate_segment(path: &str) -> &str {
    path.rsplit('/').nth(1).unwrap_or("")
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Classifies physical paths and derives logical keys
///
/// Paths are vault-relative and `/`-separated, e.g.
/// `.obsidian/plugins/calendar/main.js`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeriver {
    config_dir: String,
}

impl KeyDeriver {
    /// Create a deriver for the given configuration root
    pub fn new(config_dir: impl Into<String>) -> Self {
        let config_dir = config_dir.into().trim_end_matches('/').to_string();
        Self { config_dir }
    }

    /// The configuration root
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    /// Path relative to the configuration root, if the path is inside it
    fn relative<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.config_dir.as_str())?
            .strip_prefix('/')
            .filter(|rest| !rest.is_empty())
    }

    /// Classify a path; first matching rule wins
    pub fn classify(&self, path: &str) -> Category {
        let Some(rel) = self.relative(path) else {
            return Category::Untracked;
        };
        let depth = rel.split('/').count();

        if depth == 1 && rel.ends_with(".json") {
            return Category::Config;
        }
        if depth == 3 && rel.starts_with("themes/") {
            return Category::Theme;
        }
        if rel.starts_with("snippets/") && rel.ends_with(".css") {
            return Category::Snippet;
        }
        if rel.starts_with("plugins/") {
            let file = last_segment(rel);
            if depth > 2 && matches!(file, MANIFEST_FILE | MAIN_SCRIPT_FILE | STYLESHEET_FILE) {
                return Category::PluginMain;
            }
            if depth > 2 && file == DATA_FILE {
                return Category::PluginData;
            }
        }
        Category::Untracked
    }

    /// Whether a path is inside the configuration root and classifiable
    pub fn is_target_path(&self, path: &str) -> bool {
        self.classify(path).is_tracked()
    }

    /// Logical short name stored in the bundle
    pub fn artifact_name(&self, category: Category, path: &str) -> String {
        match category {
            Category::Config | Category::Snippet => last_segment(path).to_string(),
            _ => penultimate_segment(path).to_string(),
        }
    }

    /// Name component of the key
    fn key_name(&self, category: Category, path: &str) -> String {
        match category {
            Category::Config | Category::Snippet => last_segment(path).to_string(),
            Category::PluginEtc => {
                format!("{}/{}", penultimate_segment(path), last_segment(path))
            }
            _ => penultimate_segment(path).to_string(),
        }
    }

    /// Key of the artifact a path belongs to, classified by path
    pub fn derive_key(&self, path: &str, term: &str) -> Option<LogicalKey> {
        let category = self.classify(path);
        category
            .is_tracked()
            .then(|| self.derive_key_as(category, path, term))
    }

    /// Key of the artifact a path belongs to under an explicit category
    pub fn derive_key_as(&self, category: Category, path: &str, term: &str) -> LogicalKey {
        key_for(category, &self.key_name(category, path), term)
    }

    /// Physical files that together form the artifact of `path`
    pub fn sibling_files(&self, path: &str) -> Vec<String> {
        self.sibling_files_as(self.classify(path), path)
    }

    /// Physical files of the artifact of `path` under an explicit category
    pub fn sibling_files_as(&self, category: Category, path: &str) -> Vec<String> {
        let parent = parent_of(path);
        let expand = |names: &[&str]| -> Vec<String> {
            names.iter().map(|name| format!("{parent}/{name}")).collect()
        };
        match category {
            Category::PluginMain => expand(&[MANIFEST_FILE, MAIN_SCRIPT_FILE, STYLESHEET_FILE]),
            Category::Theme => expand(&[MANIFEST_FILE, THEME_STYLESHEET_FILE]),
            Category::Config
            | Category::Snippet
            | Category::PluginData
            | Category::PluginEtc
            | Category::Untracked => vec![path.to_string()],
        }
    }

    /// Filename recorded in the bundle: the path relative to the configuration root
    pub fn filename_in_config(&self, path: &str) -> String {
        self.relative(path).unwrap_or(path).to_string()
    }

    /// Inverse of [`filename_in_config`](Self::filename_in_config)
    pub fn physical_path(&self, filename: &str) -> String {
        format!("{}/{}", self.config_dir, filename)
    }

    /// Install directory of the extension named `name`
    pub fn plugin_dir(&self, name: &str) -> String {
        format!("{}/plugins/{}", self.config_dir, name)
    }

    /// Whether a file name looks like an extension or theme manifest
    pub fn is_manifest(path: &str) -> bool {
        path.to_lowercase().ends_with(&format!("/{MANIFEST_FILE}"))
    }
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(".obsidian")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deriver() -> KeyDeriver {
        KeyDeriver::new(".obsidian")
    }

    #[test]
    fn test_classify_rules() {
        let d = deriver();
        assert_eq!(d.classify(".obsidian/app.json"), Category::Config);
        assert_eq!(d.classify(".obsidian/themes/Minimal/theme.css"), Category::Theme);
        assert_eq!(d.classify(".obsidian/themes/Minimal/manifest.json"), Category::Theme);
        assert_eq!(d.classify(".obsidian/snippets/wide.css"), Category::Snippet);
        assert_eq!(
            d.classify(".obsidian/plugins/calendar/main.js"),
            Category::PluginMain
        );
        assert_eq!(
            d.classify(".obsidian/plugins/calendar/styles.css"),
            Category::PluginMain
        );
        assert_eq!(
            d.classify(".obsidian/plugins/calendar/data.json"),
            Category::PluginData
        );
    }

    #[test]
    fn test_classify_untracked() {
        let d = deriver();
        assert_eq!(d.classify(".obsidian/plugins/calendar/cache.bin"), Category::Untracked);
        assert_eq!(d.classify(".obsidian/snippets/readme.md"), Category::Untracked);
        assert_eq!(d.classify("notes/app.json"), Category::Untracked);
        assert_eq!(d.classify(".obsidian"), Category::Untracked);
        assert_eq!(d.classify(".obsidian/workspace"), Category::Untracked);
        assert_eq!(d.classify(".obsidiananother/app.json"), Category::Untracked);
        assert!(!d.is_target_path(".obsidian/plugins/calendar/cache.bin"));
        assert!(d.is_target_path(".obsidian/app.json"));
    }

    #[test]
    fn test_derive_key_shapes() {
        let d = deriver();
        assert_eq!(
            d.derive_key(".obsidian/appearance.json", "laptop").as_deref(),
            Some("ix:laptop/CONFIG/appearance.json.md")
        );
        assert_eq!(
            d.derive_key(".obsidian/snippets/wide.css", "laptop").as_deref(),
            Some("ix:laptop/SNIPPET/wide.css.md")
        );
        assert_eq!(
            d.derive_key(".obsidian/themes/Minimal/theme.css", "laptop").as_deref(),
            Some("ix:laptop/THEME/Minimal.md")
        );
        assert_eq!(
            d.derive_key(".obsidian/plugins/calendar/data.json", "laptop").as_deref(),
            Some("ix:laptop/PLUGIN_DATA/calendar.md")
        );
        assert_eq!(
            d.derive_key_as(Category::PluginEtc, ".obsidian/plugins/calendar/cache.bin", "laptop"),
            "ix:laptop/PLUGIN_ETC/calendar/cache.bin.md"
        );
        assert_eq!(d.derive_key(".obsidian/plugins/calendar/cache.bin", "laptop"), None);
    }

    #[test]
    fn test_siblings_share_key() {
        let d = deriver();
        let keys: Vec<_> = ["manifest.json", "main.js", "styles.css"]
            .iter()
            .map(|f| d.derive_key(&format!(".obsidian/plugins/calendar/{f}"), "desk"))
            .collect();
        assert!(keys.iter().all(|k| k == &keys[0]));
        assert_eq!(keys[0].as_deref(), Some("ix:desk/PLUGIN_MAIN/calendar.md"));
    }

    #[test]
    fn test_derive_key_is_pure() {
        let d = deriver();
        let first = d.derive_key(".obsidian/plugins/calendar/main.js", "desk");
        let _ = d.derive_key(".obsidian/app.json", "other");
        let second = d.derive_key(".obsidian/plugins/calendar/main.js", "desk");
        assert_eq!(first, second);
    }

    #[test]
    fn test_sibling_files() {
        let d = deriver();
        assert_eq!(
            d.sibling_files(".obsidian/plugins/calendar/styles.css"),
            vec![
                ".obsidian/plugins/calendar/manifest.json",
                ".obsidian/plugins/calendar/main.js",
                ".obsidian/plugins/calendar/styles.css",
            ]
        );
        assert_eq!(
            d.sibling_files(".obsidian/themes/Minimal/manifest.json"),
            vec![
                ".obsidian/themes/Minimal/manifest.json",
                ".obsidian/themes/Minimal/theme.css",
            ]
        );
        assert_eq!(
            d.sibling_files(".obsidian/plugins/calendar/data.json"),
            vec![".obsidian/plugins/calendar/data.json"]
        );
    }

    #[test]
    fn test_filename_round_trip() {
        let d = deriver();
        let filename = d.filename_in_config(".obsidian/plugins/calendar/main.js");
        assert_eq!(filename, "plugins/calendar/main.js");
        assert_eq!(d.physical_path(&filename), ".obsidian/plugins/calendar/main.js");
    }

    #[test]
    fn test_custom_config_dir() {
        let d = KeyDeriver::new("config/");
        assert_eq!(d.config_dir(), "config");
        assert_eq!(d.classify("config/appearance.json"), Category::Config);
        assert_eq!(
            d.derive_key("config/appearance.json", "laptop").as_deref(),
            Some("ix:laptop/CONFIG/appearance.json.md")
        );
    }

    #[test]
    fn test_category_wire_names() {
        for category in [
            Category::Config,
            Category::Theme,
            Category::Snippet,
            Category::PluginMain,
            Category::PluginData,
            Category::PluginEtc,
            Category::Untracked,
        ] {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("WIDGET".parse::<Category>().is_err());
        assert_eq!(settings_key(Category::PluginMain, "calendar"), "PLUGIN_MAIN/calendar");
    }
}
