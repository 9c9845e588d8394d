use super::forecast::ForecastSettings;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

fn default_currency() -> String {
    "$".to_string()
}

fn default_insight_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_insight_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    200
}

fn default_temperature() -> f32 {
    0.7
}

fn default_rows() -> usize {
    5000
}

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct InsightConfig {
    #[serde(default = "default_insight_base_url")]
    pub base_url: String,
    #[serde(default = "default_insight_model")]
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for InsightConfig {
    fn default() -> Self {
        InsightConfig {
            base_url: default_insight_base_url(),
            model: default_insight_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Shape of the data synthesized when the configured CSV does not exist.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SyntheticConfig {
    #[serde(default = "default_rows")]
    pub rows: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            rows: default_rows(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    pub data_path: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub forecast: ForecastSettings,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
    pub insight: Option<InsightConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_path: None,
            currency: default_currency(),
            forecast: ForecastSettings::default(),
            synthetic: SyntheticConfig::default(),
            insight: None,
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to the
    /// built-in defaults when no file has been set up yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("io", "salesight", "salesight")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    /// The transaction CSV to load, honoring `data_path` when set.
    pub fn data_file(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().join("superstore.csv"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
data_path: "/tmp/sales.csv"
currency: "€"
forecast:
  horizon: 6
  seasonal_order: [0, 1, 1, 12]
synthetic:
  rows: 100
insight:
  model: "gpt-4o"
  api_key: "sk-test"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.data_path.as_deref(), Some("/tmp/sales.csv"));
        assert_eq!(config.currency, "€");
        assert_eq!(config.forecast.horizon, 6);
        assert_eq!(config.forecast.order, [1, 1, 1]);
        assert_eq!(config.forecast.seasonal_order, [0, 1, 1, 12]);
        assert_eq!(config.forecast.confidence, 0.95);
        assert_eq!(config.synthetic.rows, 100);
        assert_eq!(config.synthetic.seed, 42);

        let insight = config.insight.as_ref().expect("insight section");
        assert_eq!(insight.model, "gpt-4o");
        assert_eq!(insight.api_key.as_deref(), Some("sk-test"));
        assert_eq!(insight.base_url, "https://api.openai.com/v1");
        assert_eq!(insight.max_tokens, 200);

        assert_eq!(
            config.data_file().unwrap(),
            PathBuf::from("/tmp/sales.csv")
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.insight.is_none());
        assert_eq!(config.currency, "$");
    }

    #[test]
    fn test_example_config_parses() {
        let config: AppConfig =
            serde_yaml::from_str(include_str!("../../docs/example_config.yaml")).unwrap();
        assert_eq!(config.forecast, ForecastSettings::default());
        assert!(config.insight.is_some());
    }

    #[test]
    fn test_load_from_missing_path_fails_with_context() {
        let err = AppConfig::load_from_path("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().starts_with("Failed to read config file"));
    }
}
