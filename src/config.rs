//! Presenter configuration.
//!
//! Configuration is layered. Each layer only needs the keys it wants to
//! change; later layers win:
//!
//! ```text
//! stock defaults
//!   → config.toml            (--config FILE, missing file = defaults)
//!     → command line         (--listen ADDR, positional Zettelstore URL)
//!       → config zettel      (00009000001000 in the Zettelstore, [slides] keys only)
//! ```
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! listen_addr = "127.0.0.1:23120"   # Where the presenter serves HTTP
//!
//! [zettelstore]
//! url = "http://127.0.0.1:23123"    # Base URL of the Zettelstore
//! timeout_secs = 30                 # Per HTTP request to the Zettelstore
//! request_budget_secs = 120         # Whole slide-set build per page request
//!
//! [slides]
//! slideset_role = "slideset"        # Zettel role that marks a slide set
//! author = ""                       # Fallback when a slide set names no author
//! copyright = ""                    # Fallback copyright notice
//! license = ""                      # Fallback license notice
//! lang = ""                         # Fallback document language
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! ## Config Zettel
//!
//! On startup the presenter reads the metadata of zettel `00009000001000`
//! and lets its `slideset-role`, `author`, `copyright`, `license` and `lang`
//! keys override the `[slides]` section. A missing or unreachable config
//! zettel keeps the local values.

use crate::meta::{self, KEY_AUTHOR, KEY_COPYRIGHT, KEY_LANG, KEY_LICENSE, KEY_SLIDESET_ROLE, Meta};
use crate::source::ContentSource;
use crate::zid::ZettelId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Tracing target for configuration loading.
pub const TRACING_TARGET: &str = "zettel_presenter::config";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Presenter configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresenterConfig {
    /// Socket address the HTTP server binds to.
    pub listen_addr: String,
    /// Connection to the Zettelstore.
    pub zettelstore: ZettelstoreConfig,
    /// Slide-set defaults.
    pub slides: SlidesConfig,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:23120".to_string(),
            zettelstore: ZettelstoreConfig::default(),
            slides: SlidesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZettelstoreConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub request_budget_secs: u64,
}

impl Default for ZettelstoreConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:23123".to_string(),
            timeout_secs: 30,
            request_budget_secs: 120,
        }
    }
}

impl ZettelstoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.request_budget_secs)
    }
}

/// Defaults for slide-set metadata. Empty strings mean "no default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlidesConfig {
    pub slideset_role: String,
    pub author: String,
    pub copyright: String,
    pub license: String,
    pub lang: String,
}

impl Default for SlidesConfig {
    fn default() -> Self {
        Self {
            slideset_role: "slideset".to_string(),
            author: String::new(),
            copyright: String::new(),
            license: String::new(),
            lang: String::new(),
        }
    }
}

impl SlidesConfig {
    /// Let the metadata of the config zettel override these values.
    pub fn overlay_meta(&mut self, meta: &Meta) {
        let fields = [
            (KEY_SLIDESET_ROLE, &mut self.slideset_role),
            (KEY_AUTHOR, &mut self.author),
            (KEY_COPYRIGHT, &mut self.copyright),
            (KEY_LICENSE, &mut self.license),
            (KEY_LANG, &mut self.lang),
        ];
        for (key, field) in fields {
            if let Some(value) = meta::resolve(&[meta.text(key).as_deref()]) {
                *field = value;
            }
        }
    }
}

impl PresenterConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_socket_addr()?;
        let url = url::Url::parse(&self.zettelstore.url).map_err(|e| {
            ConfigError::Validation(format!("zettelstore.url is not a URL: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(
                "zettelstore.url must use http or https".into(),
            ));
        }
        if self.zettelstore.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "zettelstore.timeout_secs must be non-zero".into(),
            ));
        }
        if self.zettelstore.request_budget_secs == 0 {
            return Err(ConfigError::Validation(
                "zettelstore.request_budget_secs must be non-zero".into(),
            ));
        }
        if self.slides.slideset_role.trim().is_empty() {
            return Err(ConfigError::Validation(
                "slides.slideset_role must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr.parse().map_err(|e| {
            ConfigError::Validation(format!(
                "listen_addr {:?} is not a socket address: {e}",
                self.listen_addr
            ))
        })
    }

    /// Apply the config zettel from the Zettelstore on top of this config.
    ///
    /// Any failure to read the zettel keeps the current values.
    pub async fn with_config_zettel(mut self, source: &dyn ContentSource) -> Self {
        let zid = ZettelId::config();
        match source.fetch_meta(&zid).await {
            Ok(meta) => {
                self.slides.overlay_meta(&meta);
                tracing::info!(
                    target: TRACING_TARGET,
                    zid = %zid,
                    slideset_role = %self.slides.slideset_role,
                    "applied config zettel"
                );
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(target: TRACING_TARGET, zid = %zid, "no config zettel");
            }
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    zid = %zid,
                    error = %err,
                    "cannot read config zettel, keeping local config"
                );
            }
        }
        self
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PresenterConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist, `Err` if it exists but
/// contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Command-line values that override the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub listen_addr: Option<String>,
    pub zettelstore_url: Option<String>,
}

impl CliOverrides {
    /// The overrides as a sparse TOML table, `None` if there are none.
    pub fn to_toml(&self) -> Option<toml::Value> {
        let mut table = toml::Table::new();
        if let Some(addr) = &self.listen_addr {
            table.insert("listen_addr".into(), toml::Value::String(addr.clone()));
        }
        if let Some(url) = &self.zettelstore_url {
            let mut zs = toml::Table::new();
            zs.insert("url".into(), toml::Value::String(url.clone()));
            table.insert("zettelstore".into(), toml::Value::Table(zs));
        }
        (!table.is_empty()).then_some(toml::Value::Table(table))
    }
}

/// Merge optional overlays onto a base value in order, then deserialize and
/// validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = Option<toml::Value>>,
) -> Result<PresenterConfig, ConfigError> {
    let merged = overlays
        .into_iter()
        .flatten()
        .fold(base, merge_toml);
    let config: PresenterConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config: stock defaults, then the file at `path` (if any), then the
/// command-line overrides. Rejects unknown keys and validates the result.
pub fn load_config(path: Option<&Path>, cli: &CliOverrides) -> Result<PresenterConfig, ConfigError> {
    let file = match path {
        Some(path) => load_raw_config(path)?,
        None => None,
    };
    resolve_config(stock_defaults_value(), [file, cli.to_toml()])
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Zettel Presenter Configuration
# ==============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line flags override this file, and the config zettel
# 00009000001000 in the Zettelstore overrides the [slides] section.
# Unknown keys will cause an error.

# Socket address the presenter listens on.
listen_addr = "127.0.0.1:23120"

# ---------------------------------------------------------------------------
# Zettelstore connection
# ---------------------------------------------------------------------------
[zettelstore]
# Base URL of the Zettelstore. Can also be given as the first argument.
url = "http://127.0.0.1:23123"

# Timeout for a single HTTP request to the Zettelstore, in seconds.
timeout_secs = 30

# Time allowed for loading one slide set including all linked zettel and
# images, in seconds. Requests exceeding it fail with 503.
request_budget_secs = 120

# ---------------------------------------------------------------------------
# Slide sets
# ---------------------------------------------------------------------------
[slides]
# Zettel with this role are shown as slide sets (table of contents).
slideset_role = "slideset"

# Fallbacks used when a slide-set zettel does not name them itself.
author = ""
copyright = ""
license = ""
lang = ""
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaValue;
    use crate::source::tests::MockSource;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = PresenterConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:23120");
        assert_eq!(config.zettelstore.url, "http://127.0.0.1:23123");
        assert_eq!(config.zettelstore.timeout(), Duration::from_secs(30));
        assert_eq!(config.slides.slideset_role, "slideset");
        assert!(config.slides.author.is_empty());
    }

    #[test]
    fn parse_partial_config() {
        let config: PresenterConfig = toml::from_str(
            r#"
[slides]
author = "Jane Doe"
"#,
        )
        .unwrap();
        assert_eq!(config.slides.author, "Jane Doe");
        assert_eq!(config.slides.slideset_role, "slideset");
        assert_eq!(config.zettelstore.timeout_secs, 30);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config =
            load_config(Some(&tmp.path().join("config.toml")), &CliOverrides::default()).unwrap();
        assert_eq!(config, PresenterConfig::default());
    }

    #[test]
    fn load_config_without_path_is_default() {
        let config = load_config(None, &CliOverrides::default()).unwrap();
        assert_eq!(config, PresenterConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
listen_addr = "0.0.0.0:8080"

[zettelstore]
url = "https://zs.example.org"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path), &CliOverrides::default()).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.zettelstore.url, "https://zs.example.org");
        // Unspecified values should be defaults
        assert_eq!(config.zettelstore.timeout_secs, 30);
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
listen_addr = "0.0.0.0:8080"

[zettelstore]
url = "https://zs.example.org"
timeout_secs = 5
"#,
        )
        .unwrap();

        let cli = CliOverrides {
            listen_addr: None,
            zettelstore_url: Some("http://localhost:9999".to_string()),
        };
        let config = load_config(Some(&path), &cli).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.zettelstore.url, "http://localhost:9999");
        assert_eq!(config.zettelstore.timeout_secs, 5);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(Some(&path), &CliOverrides::default());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[s]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[s]\ny = 5").unwrap();
        let merged = merge_toml(base, overlay);
        let s = merged.get("s").unwrap();
        assert_eq!(s.get("x").unwrap().as_integer(), Some(1));
        assert_eq!(s.get("y").unwrap().as_integer(), Some(5));
    }

    // =========================================================================
    // Unknown keys and validation
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<PresenterConfig, _> = toml::from_str("listen = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result: Result<PresenterConfig, _> = toml::from_str("[slides]\nauthr = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(PresenterConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_listen_addr() {
        let mut config = PresenterConfig::default();
        config.listen_addr = ":23120".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_non_http_url() {
        let mut config = PresenterConfig::default();
        config.zettelstore.url = "ftp://example.org".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = PresenterConfig::default();
        config.zettelstore.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_empty_slideset_role() {
        let mut config = PresenterConfig::default();
        config.slides.slideset_role = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str("[zettelstore]\ntimeout_secs = 0").unwrap();
        let result = resolve_config(stock_defaults_value(), [Some(overlay)]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Config zettel overlay
    // =========================================================================

    #[test]
    fn overlay_meta_replaces_only_present_keys() {
        let mut slides = SlidesConfig {
            author: "Local".to_string(),
            copyright: "Local (c)".to_string(),
            ..SlidesConfig::default()
        };
        let meta = Meta::new()
            .with(KEY_SLIDESET_ROLE, "deck")
            .with(KEY_AUTHOR, "Remote")
            .with(KEY_COPYRIGHT, "");
        slides.overlay_meta(&meta);
        assert_eq!(slides.slideset_role, "deck");
        assert_eq!(slides.author, "Remote");
        assert_eq!(slides.copyright, "Local (c)");
    }

    #[tokio::test]
    async fn config_zettel_overrides_slides_section() {
        let mut meta = Meta::new().with(KEY_AUTHOR, "Zettel Author");
        meta.insert(KEY_LICENSE, MetaValue::Text("CC-BY".to_string()));
        let source = MockSource::new().with_zettel(ZettelId::CONFIG, meta, vec![]);

        let config = PresenterConfig::default()
            .with_config_zettel(&source)
            .await;
        assert_eq!(config.slides.author, "Zettel Author");
        assert_eq!(config.slides.license, "CC-BY");
        assert_eq!(config.slides.slideset_role, "slideset");
    }

    #[tokio::test]
    async fn missing_config_zettel_keeps_local_values() {
        let source = MockSource::new();
        let config = PresenterConfig::default()
            .with_config_zettel(&source)
            .await;
        assert_eq!(config, PresenterConfig::default());
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: PresenterConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, PresenterConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        assert!(content.contains("[zettelstore]"));
        assert!(content.contains("[slides]"));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        assert!(val.get("zettelstore").is_some());
        assert!(val.get("slides").is_some());
    }
}
