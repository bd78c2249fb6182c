//! Rule configuration files.
//!
//! Rules are stored in TOML or JSON, picked by file extension. Directory keys
//! in `[dir_names]` give each destination a short name that `[ext_to_dir]`
//! refers to.
//!
//! # Configuration File Format
//!
//! ```toml
//! [dir_names]
//! images = "Images"
//! python = "Programming/Python"
//!
//! [ext_to_dir]
//! images = ["jpg", "png"]
//! python = ["py", "pyw"]
//!
//! [ext_to_re]
//! png = '\x89PNG'
//! py = '#!/.+?python'
//!
//! [ignore]
//! names = ["Thumbs.db"]
//! patterns = ["~$*"]
//!
//! [settings]
//! max_move_retries = 3
//! retry_delay_ms = 100
//! max_collision_attempts = 99
//! ```

use crate::error::ConfigError;
use crate::events::EventKind;
use crate::mover::MovePolicy;
use crate::rules::RuleSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Files looked up in the current directory, in order.
pub const LOCAL_CONFIG_FILES: [&str; 2] = [".dirsortrc.toml", ".dirsortrc.json"];

const REQUIRED_SECTIONS: [&str; 2] = ["dir_names", "ext_to_dir"];

/// On-disk format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Picks the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// A rule configuration as written in a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Directory key to destination directory, relative to the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir_names: Option<BTreeMap<String, String>>,

    /// Directory key to the extensions it receives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_to_dir: Option<BTreeMap<String, Vec<String>>>,

    /// Extension to binary signature pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_to_re: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub ignore: IgnoreConfig,

    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Extra entries never touched, on top of the reserved system files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Exact entry names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    /// Glob patterns matched against the entry name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

/// Move tunables. Unset values fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_move_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_collision_attempts: Option<usize>,
}

impl SettingsConfig {
    /// Overlays the configured values on `policy`.
    pub fn apply(&self, mut policy: MovePolicy) -> MovePolicy {
        if let Some(retries) = self.max_move_retries {
            policy.max_move_retries = retries;
        }
        if let Some(delay) = self.retry_delay_ms {
            policy.retry_delay = Duration::from_millis(delay);
        }
        if let Some(attempts) = self.max_collision_attempts {
            policy.max_collision_attempts = attempts;
        }
        policy
    }
}

impl RuleConfig {
    /// Load configuration from a file, with fallback to the built-in rules.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.dirsortrc.toml`, then `.dirsortrc.json`, in the current directory
    /// 3. Look for `~/.config/dirsort/config.toml` in the home directory
    /// 4. Fall back to the built-in rules
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is found but cannot be used.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        for name in LOCAL_CONFIG_FILES {
            let local_config = PathBuf::from(name);
            if local_config.exists() {
                return Self::load_from_file(&local_config);
            }
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("dirsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        tracing::info!(action = %EventKind::Config, "Using built-in rules");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file does not exist,
    /// `ConfigError::UnsupportedFormat` for an unknown extension,
    /// `ConfigError::Parse` if the content is malformed and
    /// `ConfigError::MissingFields` if a required section is absent.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::parse(&content, format).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        config.validate()?;

        tracing::info!(
            action = %EventKind::Config,
            path = %path.display(),
            "Loaded rules from '{}'",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        Ok(config)
    }

    /// Parses configuration text without checking required sections.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, String> {
        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Checks that every required section is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let present = [self.dir_names.is_some(), self.ext_to_dir.is_some()];
        let missing: Vec<String> = REQUIRED_SECTIONS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(name, _)| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingFields(missing))
        }
    }

    /// Resolves `[ext_to_dir]` keys into `(extension, directory)` pairs.
    ///
    /// Keys that are not in `[dir_names]` are skipped with a warning.
    pub fn extension_rules(&self) -> Vec<(String, String)> {
        let (Some(dir_names), Some(ext_to_dir)) = (&self.dir_names, &self.ext_to_dir) else {
            return Vec::new();
        };

        let mut rules = Vec::new();
        for (key, extensions) in ext_to_dir {
            let Some(directory) = dir_names.get(key) else {
                tracing::warn!(
                    action = %EventKind::Config,
                    "'{}' not a key in `dir_names`, skipping",
                    key
                );
                continue;
            };
            rules.extend(
                extensions
                    .iter()
                    .map(|ext| (ext.clone(), directory.clone())),
            );
        }
        rules
    }

    /// Builds the validated rule set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingFields` if a required section is absent.
    pub fn to_rule_set(&self) -> Result<RuleSet, ConfigError> {
        self.validate()?;

        let directories = self.dir_names.iter().flat_map(|names| names.values());
        let rules = RuleSet::new(directories, self.extension_rules(), self.ext_to_re.as_ref());

        Ok(rules.with_ignore_rules(&self.ignore.names, &self.ignore.patterns))
    }

    /// The move policy from `[settings]`, over the built-in defaults.
    pub fn move_policy(&self) -> MovePolicy {
        self.settings.apply(MovePolicy::default())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }
}

impl Default for RuleConfig {
    /// The built-in rules.
    fn default() -> Self {
        let dir_names = DEFAULT_DIRECTORIES
            .iter()
            .map(|(key, dir)| (key.to_string(), dir.to_string()))
            .collect();

        let ext_to_dir = DEFAULT_EXTENSIONS
            .iter()
            .map(|(key, exts)| (key.to_string(), exts.iter().map(|e| e.to_string()).collect()))
            .collect();

        let ext_to_re = DEFAULT_SIGNATURES
            .iter()
            .map(|(ext, pattern)| (ext.to_string(), pattern.to_string()))
            .collect();

        Self {
            dir_names: Some(dir_names),
            ext_to_dir: Some(ext_to_dir),
            ext_to_re: Some(ext_to_re),
            ignore: IgnoreConfig::default(),
            settings: SettingsConfig::default(),
        }
    }
}

const DEFAULT_DIRECTORIES: [(&str, &str); 17] = [
    ("3d", "3D"),
    ("3d_blender", "3D/Blender"),
    ("3d_maya", "3D/Maya"),
    ("audio", "Audio"),
    ("archives", "Archives"),
    ("documents", "Documents"),
    ("spreadsheets", "Documents/Spreadsheets"),
    ("images", "Images"),
    ("images_raw", "Images/Raw"),
    ("misc", "Misc"),
    ("programming", "Programming"),
    ("assembly", "Programming/Assembly"),
    ("c_cpp", "Programming/C_Cpp"),
    ("javascript", "Programming/JavaScript"),
    ("python", "Programming/Python"),
    ("shell", "Programming/Shell"),
    ("videos", "Videos"),
];

const DEFAULT_EXTENSIONS: [(&str, &[&str]); 16] = [
    ("3d", &["abc", "fbx", "obj"]),
    ("3d_blender", &["blend", "blend1"]),
    ("3d_maya", &["ma", "mb"]),
    ("audio", &["mp3"]),
    ("archives", &["7z", "aar", "zip", "gz", "xz", "tar", "txz"]),
    ("documents", &["txt", "md", "rst", "doc", "docx", "pages", "indd", "pdf"]),
    ("spreadsheets", &["csv", "tsv", "xls", "xlsx", "numbers"]),
    (
        "images",
        &[
            "exr", "gif", "heic", "jpeg", "jpg", "png", "webp", "tif", "tiff", "clip", "cmc",
            "kra", "psb", "psd",
        ],
    ),
    ("images_raw", &["dng", "orf"]),
    ("programming", &["cfg", "env", "db", "json", "xml", "yml"]),
    ("assembly", &["s"]),
    ("c_cpp", &["c", "cc", "cpp", "h", "hh", "hpp", "cmake"]),
    ("javascript", &["gs", "js"]),
    ("python", &["py", "pyc", "pyi"]),
    ("shell", &["bash", "sh", "zsh", "zwc"]),
    ("videos", &["mkv", "mov", "mp4", "skba"]),
];

const DEFAULT_SIGNATURES: [(&str, &str); 7] = [
    ("png", r"\x89PNG\r\n\x1a\n"),
    ("jpg", r"\xff\xd8\xff"),
    ("pdf", r"%PDF-"),
    ("zip", r"PK\x03\x04"),
    ("gz", r"\x1f\x8b"),
    ("py", r"#!/.+?python"),
    ("sh", r"#!/(usr/)?bin/(env )?(ba|z)?sh"),
];
