use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::models::SourceKind;

/// Root configuration, loaded from `~/.config/bookfuse/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub normalize: NormalizeConfig,
    pub dedup: DedupConfig,
    pub survivorship: SurvivorshipConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub landing_dir: String,
    pub scrape_file: String,
    pub api_file: String,
    pub standard_dir: String,
    pub docs_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Separators used to split single-string author and category values.
    pub list_separators: Vec<String>,
    pub language_max_len: usize,
    /// Fill a missing ISBN-13 from a checksum-valid ISBN-10.
    pub derive_isbn13_from_isbn10: bool,

    /// Per-source replacements for the built-in field mapping table:
    /// `{source: {canonical_field: [source_field, ...]}}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_overrides: BTreeMap<SourceKind, BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Hex characters kept from the SHA-1 fallback fingerprint.
    pub fingerprint_hex_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivorshipConfig {
    /// Sources in descending priority.
    pub source_priority: Vec<SourceKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            landing_dir: "landing".to_string(),
            scrape_file: "goodreads_books.json".to_string(),
            api_file: "googlebooks_books.csv".to_string(),
            standard_dir: "standard".to_string(),
            docs_dir: "docs".to_string(),
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            list_separators: vec![";".to_string(), "|".to_string(), ",".to_string()],
            language_max_len: 5,
            derive_isbn13_from_isbn10: false,
            field_overrides: BTreeMap::new(),
        }
    }
}

/// Fallback keys of this width could collide with ISBN-13 keys.
pub const ISBN13_LEN: usize = 13;

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            fingerprint_hex_len: 16,
        }
    }
}

impl Default for SurvivorshipConfig {
    fn default() -> Self {
        Self {
            source_priority: vec![SourceKind::BibliographicApi, SourceKind::CatalogScrape],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/bookfuse/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BOOKFUSE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("bookfuse")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let hex_len = self.dedup.fingerprint_hex_len;
        if !(8..=40).contains(&hex_len) || hex_len == ISBN13_LEN {
            return Err(CatalogError::ConfigError(format!(
                "dedup.fingerprint_hex_len must be within 8..=40 and not {ISBN13_LEN}, got {hex_len}"
            )));
        }
        if self.normalize.language_max_len == 0 {
            return Err(CatalogError::ConfigError(
                "normalize.language_max_len must be positive".to_string(),
            ));
        }
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    pub fn scrape_path(&self) -> PathBuf {
        PathBuf::from(&self.paths.landing_dir).join(&self.paths.scrape_file)
    }

    pub fn api_path(&self) -> PathBuf {
        PathBuf::from(&self.paths.landing_dir).join(&self.paths.api_file)
    }

    pub fn standard_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.standard_dir)
    }

    pub fn docs_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.docs_dir)
    }

    /// Re-roots the output directories under `root`.
    pub fn set_output_root(&mut self, root: &Path) {
        self.paths.standard_dir = root.join("standard").to_string_lossy().to_string();
        self.paths.docs_dir = root.join("docs").to_string_lossy().to_string();
    }
}
