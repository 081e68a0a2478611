use anyhow::{Context, bail};
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scrape_interval_sec: u64,
    /// Number of scrapes after which the ledger is cut back to the newest record.
    pub cycle_interval: usize,
    pub ledger_path: PathBuf,
    pub user_agent: String,
    pub pairs: Vec<PairSource>,
    pub web: WebConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairSource {
    pub pair: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let pairs = [
            ("BTC/USDT", "https://www.coinbase.com/converter/btc/usdt"),
            ("USDT/ETH", "https://www.coinbase.com/converter/usdt/eth"),
            ("USDT/PHP", "https://www.coinbase.com/converter/usdt/php"),
        ];

        Self {
            scrape_interval_sec: 60,
            cycle_interval: 5,
            ledger_path: PathBuf::from("USDT.json"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pairs: pairs
                .into_iter()
                .map(|(pair, url)| PairSource {
                    pair: pair.to_string(),
                    url: url.to_string(),
                })
                .collect(),
            web: WebConfig::default(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let toml_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&toml_str)
    }

    /// Like [`Config::from_file`], but a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::from_file(path)
    }

    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(toml_str).context("Failed to parse config")?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cycle_interval == 0 {
            bail!("cycle_interval must be at least 1");
        }
        if self.scrape_interval_sec == 0 {
            bail!("scrape_interval_sec must be at least 1");
        }
        if self.pairs.is_empty() {
            bail!("at least one pair must be configured");
        }

        let mut seen = HashSet::new();
        for source in &self.pairs {
            if !seen.insert(source.pair.as_str()) {
                bail!("pair {} is configured twice", source.pair);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.cycle_interval, 5);
        assert_eq!(config.ledger_path, PathBuf::from("USDT.json"));
        let pairs = config.pairs.iter().map(|p| p.pair.as_str()).collect::<Vec<_>>();
        assert_eq!(pairs, vec!["BTC/USDT", "USDT/ETH", "USDT/PHP"]);
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config = Config::from_toml(include_str!("../config.example.toml")).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_toml(
            r#"
            scrape_interval_sec = 10
            cycle_interval = 3
            ledger_path = "data/prices.json"

            [[pairs]]
            pair = "BTC/USDT"
            url = "http://localhost/btc"

            [web]
            enabled = true
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.scrape_interval_sec, 10);
        assert_eq!(config.cycle_interval, 3);
        assert_eq!(config.pairs.len(), 1);
        assert!(config.web.enabled);
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(Config::from_toml("cycle_interval = 0").is_err());
        assert!(Config::from_toml("scrape_interval_sec = 0").is_err());
        assert!(Config::from_toml("pairs = []").is_err());
        assert!(
            Config::from_toml(
                r#"
                [[pairs]]
                pair = "BTC/USDT"
                url = "a"
                [[pairs]]
                pair = "BTC/USDT"
                url = "b"
                "#
            )
            .is_err()
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join(format!("missing_{}.toml", uuid::Uuid::new_v4()));

        assert_eq!(Config::load(&path).unwrap(), Config::default());
        assert!(Config::from_file(&path).is_err());
    }
}
