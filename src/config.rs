//! TOML configuration.
//!
//! The [`Config`] value is built once by [`load_config`] (file + environment
//! overrides) and then passed by reference to every command, pipeline and
//! server handler. Nothing else reads the environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::SourceTag;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sources: HashMap<SourceTag, SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            max_bytes: default_max_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}
fn default_max_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_user_agent() -> String {
    format!(
        "rural-gazette/{} (+official bulletin monitor)",
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// Per-source settings. Anything left unset falls back to the built-in
/// profile in [`crate::sources`].
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourceConfig {
    /// Listing URL template; `{date}` is replaced by the formatted target date.
    #[serde(default)]
    pub listing_url: Option<String>,
    /// Bearer token sent with listing requests.
    #[serde(default)]
    pub token: Option<String>,
    /// `chrono` format string for `{date}`.
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub inclusion_stems: Option<Vec<String>>,
    #[serde(default)]
    pub exclusion_stems: Option<Vec<String>>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Config {
    /// Settings for one source, if the config file or environment mentions it.
    pub fn source(&self, tag: SourceTag) -> Option<&SourceConfig> {
        self.sources.get(&tag)
    }

    /// Sources that have a listing endpoint and are not disabled.
    pub fn enabled_sources(&self) -> Vec<SourceTag> {
        SourceTag::ALL
            .into_iter()
            .filter(|tag| {
                self.source(*tag)
                    .map(|s| s.enabled && s.listing_url.is_some())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Fold `GAZETTE_<TAG>_LISTING_URL` / `GAZETTE_<TAG>_TOKEN` into the config.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for tag in SourceTag::ALL {
            let prefix = format!("GAZETTE_{}", tag.as_str().to_uppercase());
            let url = lookup(&format!("{}_LISTING_URL", prefix)).filter(|v| !v.trim().is_empty());
            let token = lookup(&format!("{}_TOKEN", prefix)).filter(|v| !v.trim().is_empty());
            if url.is_none() && token.is_none() {
                continue;
            }
            let entry = self.sources.entry(tag).or_default();
            if let Some(url) = url {
                entry.listing_url = Some(url);
            }
            if let Some(token) = token {
                entry.token = Some(token);
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    validate(&config)?;

    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

pub fn validate(config: &Config) -> Result<()> {
    if config.fetch.timeout_secs == 0 {
        bail!("fetch.timeout_secs must be > 0");
    }

    if config.fetch.max_redirects > 20 {
        bail!("fetch.max_redirects must be <= 20");
    }

    if config.fetch.max_bytes == 0 {
        bail!("fetch.max_bytes must be > 0");
    }

    for (tag, source) in &config.sources {
        if let Some(url) = &source.listing_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!(
                    "sources.{}.listing_url must be an http(s) URL, got '{}'",
                    tag,
                    url
                );
            }
        }
    }

    Ok(())
}
