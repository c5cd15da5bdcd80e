//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.metadispatch.toml` files.

use crate::predicates::PredicateSpec;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".metadispatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Registered analyses, in execution order.
    #[serde(default = "default_analyses", rename = "analysis")]
    pub analyses: Vec<AnalysisConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            analyses: default_analyses(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directories whose subdirectories are projects.
    #[serde(default = "default_base_dirs")]
    pub base_dirs: Vec<String>,

    /// Metadata document name inside each project.
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    /// Spaces per tab when normalizing metadata.
    #[serde(default = "default_tab_width")]
    pub tab_width: usize,

    /// Number of projects processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Stop the pass at the first analysis failure.
    #[serde(default)]
    pub fail_fast: bool,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Directory for log files. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// YAML or JSON mapping of lower-cased project names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_map: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            base_dirs: default_base_dirs(),
            metadata_file: default_metadata_file(),
            tab_width: default_tab_width(),
            concurrency: default_concurrency(),
            fail_fast: false,
            verbose: false,
            log_dir: None,
            reference_map: None,
        }
    }
}

fn default_base_dirs() -> Vec<String> {
    vec!["stablecoin".to_string(), "cex".to_string()]
}

fn default_metadata_file() -> String {
    "data.yml".to_string()
}

fn default_tab_width() -> usize {
    4
}

fn default_concurrency() -> usize {
    1
}

/// One registered analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Name used in logs.
    pub name: String,

    /// Eligibility predicate, e.g. `always` or `social_link:twitter`.
    #[serde(default = "default_predicate")]
    pub predicate: PredicateSpec,

    /// Substring the project path must contain. Empty matches all.
    #[serde(default)]
    pub scope: String,

    /// Program and arguments; `{dir}` and `{project}` are substituted.
    pub command: Vec<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_predicate() -> PredicateSpec {
    PredicateSpec::Always
}

fn default_true() -> bool {
    true
}

/// The exchange crawlers registered by the daily scheduler.
fn default_analyses() -> Vec<AnalysisConfig> {
    [
        "CoinGeckoCrawler",
        "CoinMarketCapCrawler",
        "OkLinkAnalysis",
        "TransactionCrawler",
    ]
    .into_iter()
    .map(|name| AnalysisConfig {
        name: name.to_string(),
        predicate: PredicateSpec::Always,
        scope: "cex".to_string(),
        command: vec![
            "pyinsightic".to_string(),
            name.to_string(),
            "{dir}".to_string(),
        ],
        enabled: true,
    })
    .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref base_dirs) = args.base_dir {
            self.general.base_dirs = base_dirs
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
        }
        if let Some(ref metadata_file) = args.metadata_file {
            self.general.metadata_file = metadata_file.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref log_dir) = args.log_dir {
            self.general.log_dir = Some(log_dir.to_string_lossy().to_string());
        }
        if let Some(ref reference_map) = args.reference_map {
            self.general.reference_map = Some(reference_map.to_string_lossy().to_string());
        }

        // Flags always override
        if args.fail_fast {
            self.general.fail_fast = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.base_dirs, vec!["stablecoin", "cex"]);
        assert_eq!(config.general.metadata_file, "data.yml");
        assert_eq!(config.general.tab_width, 4);
        assert_eq!(config.general.concurrency, 1);
        assert_eq!(config.analyses.len(), 4);
        assert!(config.analyses.iter().all(|a| a.scope == "cex"));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
base_dirs = ["projects"]
concurrency = 4
reference_map = "mapping.yml"

[[analysis]]
name = "Twitter"
predicate = "social_link:twitter"
command = ["pyinsightic", "Twitter", "{dir}"]

[[analysis]]
name = "ZANAnalysis"
predicate = "token_launch"
scope = "stablecoin"
command = ["zan", "--dir", "{dir}"]
enabled = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.base_dirs, vec!["projects"]);
        assert_eq!(config.general.metadata_file, "data.yml");
        assert_eq!(config.general.concurrency, 4);
        assert_eq!(config.general.reference_map.as_deref(), Some("mapping.yml"));
        assert_eq!(config.analyses.len(), 2);
        assert_eq!(
            config.analyses[0].predicate,
            PredicateSpec::SocialLink("twitter".to_string())
        );
        assert_eq!(config.analyses[0].scope, "");
        assert!(config.analyses[0].enabled);
        assert_eq!(config.analyses[1].predicate, PredicateSpec::TokenLaunch);
        assert!(!config.analyses[1].enabled);
    }

    #[test]
    fn test_missing_analysis_section_uses_defaults() {
        let config: Config = toml::from_str("[general]\nfail_fast = true\n").unwrap();
        assert!(config.general.fail_fast);
        assert_eq!(config.analyses.len(), 4);
    }

    #[test]
    fn test_unknown_predicate_rejected() {
        let toml_content = r#"
[[analysis]]
name = "Twitter"
predicate = "sometimes"
command = ["true"]
"#;
        let err = toml::from_str::<Config>(toml_content).unwrap_err();
        assert!(err.to_string().contains("Unknown predicate"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[[analysis]]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.analyses, Config::default().analyses);
    }
}
