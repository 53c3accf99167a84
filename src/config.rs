//! Configuration loading.
//!
//! Settings come from a `leaseflow.toml` file (explicit path, or discovered
//! next to the data directory) with serde defaults for everything, so an
//! empty file and no file at all are both valid configurations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default adapter chain per MIME category. The order encodes the
/// quality/cost preference: best structural engine first, generic fallback
/// last.
fn default_chains() -> BTreeMap<String, Vec<String>> {
    let mut chains = BTreeMap::new();
    chains.insert(
        "pdf".to_string(),
        vec!["layout".into(), "docparse".into(), "plaintext".into()],
    );
    chains.insert(
        "spreadsheet".to_string(),
        vec!["layout".into(), "plaintext".into()],
    );
    chains.insert(
        "image".to_string(),
        vec!["layout".into(), "docparse".into()],
    );
    chains.insert(
        "text".to_string(),
        vec!["docparse".into(), "plaintext".into()],
    );
    chains
}

fn default_fallback_parser() -> String {
    "plaintext".to_string()
}

fn default_adapter_timeout_secs() -> u64 {
    30
}

fn default_confidence_threshold() -> f64 {
    0.85
}

fn default_field_floor() -> f64 {
    0.70
}

fn default_critical_threshold() -> f64 {
    0.80
}

fn default_claim_timeout_minutes() -> i64 {
    30
}

fn default_db_file() -> String {
    "leaseflow.db".to_string()
}

/// Parser pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Ordered adapter names per MIME category.
    pub chains: BTreeMap<String, Vec<String>>,
    /// The designated low-quality fallback; its use alone flags review.
    pub fallback_parser: String,
    /// Per-adapter deadline in seconds.
    pub adapter_timeout_secs: u64,
    /// Override endpoint for the layout engine.
    pub layout_endpoint: Option<String>,
    /// Override endpoint for the docparse engine.
    pub docparse_endpoint: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chains: default_chains(),
            fallback_parser: default_fallback_parser(),
            adapter_timeout_secs: default_adapter_timeout_secs(),
            layout_endpoint: None,
            docparse_endpoint: None,
        }
    }
}

/// Review queue settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// Extractions below this overall confidence are queued.
    pub confidence_threshold: f64,
    /// Any field below this confidence flags the extraction for review.
    pub field_floor: f64,
    /// Critical fields below this confidence add priority weight.
    pub critical_threshold: f64,
    /// Claims older than this are returned to pending.
    pub claim_timeout_minutes: i64,
    /// Overrides the critical-field set from the schema when non-empty.
    pub critical_fields: Vec<String>,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            field_floor: default_field_floor(),
            critical_threshold: default_critical_threshold(),
            claim_timeout_minutes: default_claim_timeout_minutes(),
            critical_fields: Vec::new(),
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    pub review: ReviewSettings,
    /// Database file name, resolved relative to the data directory.
    #[serde(rename = "database")]
    pub database_file: Option<String>,
}

impl Settings {
    /// Load settings: explicit path wins, otherwise look for
    /// `leaseflow.toml` or `config.toml` next to the data directory.
    /// Missing files mean defaults.
    pub fn load(config_path: Option<&Path>, data_dir: &Path) -> anyhow::Result<Self> {
        let path = match config_path {
            Some(p) => Some(p.to_path_buf()),
            None => find_config_next_to_data(data_dir),
        };

        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(&p)?;
                let settings: Settings = toml::from_str(&raw)?;
                tracing::debug!(config = %p.display(), "loaded settings");
                Ok(settings)
            }
            None => Ok(Settings::default()),
        }
    }

    /// Resolve the database path under the data directory.
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        let file = self.database_file.clone().unwrap_or_else(default_db_file);
        data_dir.join(file)
    }
}

/// Look for a config file next to the database.
fn find_config_next_to_data(data_dir: &Path) -> Option<PathBuf> {
    for basename in ["leaseflow", "config"] {
        let path = data_dir.join(format!("{basename}.toml"));
        if path.exists() {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.pipeline.fallback_parser, "plaintext");
        assert_eq!(settings.review.confidence_threshold, 0.85);
        assert_eq!(settings.review.claim_timeout_minutes, 30);
        assert_eq!(
            settings.pipeline.chains.get("pdf").unwrap(),
            &vec!["layout".to_string(), "docparse".into(), "plaintext".into()]
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [review]
            confidence_threshold = 0.9
        "#,
        )
        .unwrap();
        assert_eq!(settings.review.confidence_threshold, 0.9);
        assert_eq!(settings.review.field_floor, 0.70);
        assert_eq!(settings.pipeline.adapter_timeout_secs, 30);
    }

    #[test]
    fn test_chain_override() {
        let settings: Settings = toml::from_str(
            r#"
            [pipeline.chains]
            pdf = ["docparse", "plaintext"]
        "#,
        )
        .unwrap();
        assert_eq!(
            settings.pipeline.chains.get("pdf").unwrap(),
            &vec!["docparse".to_string(), "plaintext".into()]
        );
    }
}
