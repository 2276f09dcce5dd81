//! Project configuration loaded from `.dora/config.toml` and the environment.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

const CONFIG_DIR: &str = ".dora";
const CONFIG_FILE: &str = "config.toml";

/// Longest accepted freshness window, roughly a century.
pub const MAX_TTL_DAYS: u32 = 36_500;

const ENV_ENABLED: &str = "MEMORY_CACHE_ENABLED";
const ENV_PATH: &str = "MEMORY_CACHE_PATH";
const ENV_TTL_DAYS: &str = "MEMORY_CACHE_TTL_DAYS";
const ENV_MAX_SIZE_MB: &str = "MEMORY_CACHE_MAX_SIZE_MB";

/// Top-level project configuration loaded from `.dora/config.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    /// The `[cache]` section.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ProjectConfig {
    /// Load the config file under `workdir`, then apply `MEMORY_CACHE_*`
    /// overrides from the process environment.
    pub fn load(workdir: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_workdir(workdir)?;
        config.cache.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a known working directory, ignoring the environment.
    pub fn from_workdir(workdir: impl AsRef<Path>) -> Result<Self> {
        let config_path = workdir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.cache.validate()
    }
}

/// Settings of the `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether caching is active at all.
    pub enabled: bool,
    /// Database file location. Relative paths resolve against the process cwd.
    pub path: PathBuf,
    /// Freshness window in days.
    pub ttl_days: u32,
    /// Advisory size budget in megabytes.
    pub max_size_mb: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./cache/dora_memory.db"),
            ttl_days: 7,
            max_size_mb: 100,
        }
    }
}

impl CacheConfig {
    /// Enabled configuration pointing at `path` with default limits.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Configuration with caching switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Apply `MEMORY_CACHE_*` overrides read through `lookup`.
    ///
    /// Unset variables leave the current value alone; malformed ones are errors.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_ENABLED) {
            self.enabled = parse_flag(&raw).with_context(|| format!("invalid {ENV_ENABLED}"))?;
        }
        if let Some(raw) = lookup(ENV_PATH) {
            self.path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_TTL_DAYS) {
            self.ttl_days = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_TTL_DAYS}: {raw:?}"))?;
        }
        if let Some(raw) = lookup(ENV_MAX_SIZE_MB) {
            self.max_size_mb = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_MAX_SIZE_MB}: {raw:?}"))?;
        }
        Ok(())
    }

    /// Reject settings the store cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_days == 0 {
            bail!("cache.ttl_days must be at least 1");
        }
        if self.ttl_days > MAX_TTL_DAYS {
            bail!("cache.ttl_days must be at most {MAX_TTL_DAYS}, got {}", self.ttl_days);
        }
        if self.max_size_mb == 0 {
            bail!("cache.max_size_mb must be at least 1");
        }
        if self.path.as_os_str().is_empty() {
            bail!("cache.path must not be empty");
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}
