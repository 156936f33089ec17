use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use kwic_align_core::review::ReviewPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReviewConfig {
    /// Minutes after which a held review lock may be reclaimed by
    /// another reviewer.
    #[serde(default = "default_stale_after_minutes")]
    pub stale_after_minutes: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            stale_after_minutes: default_stale_after_minutes(),
        }
    }
}

fn default_stale_after_minutes() -> i64 {
    5
}

impl Config {
    pub fn review_policy(&self) -> ReviewPolicy {
        ReviewPolicy {
            stale_after: Duration::minutes(self.review.stale_after_minutes),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.review.stale_after_minutes < 1 {
        anyhow::bail!("review.stale_after_minutes must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_section_is_optional() {
        let config: Config = toml::from_str("[db]\npath = \"data/kwic.sqlite\"\n").unwrap();
        assert_eq!(config.review.stale_after_minutes, 5);
    }

    #[test]
    fn policy_reflects_configured_threshold() {
        let config: Config =
            toml::from_str("[db]\npath = \"x\"\n\n[review]\nstale_after_minutes = 30\n").unwrap();
        assert_eq!(config.review_policy().stale_after, Duration::minutes(30));
    }
}
