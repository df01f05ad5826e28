//! Runtime configuration loaded from `booksalon.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::{books::DEFAULT_BOOK_API_BASE, jobs::schedule::Schedule};

pub const DEFAULT_CONFIG_FILE: &str = "booksalon.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalonConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub books: BookApiSettings,
    #[serde(default)]
    pub blobs: BlobSettings,
    #[serde(default)]
    pub jobs: JobSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: default_redis_url(),
            prefix: default_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_prefix() -> String {
    "booksalon".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookApiSettings {
    #[serde(default = "default_book_api_base")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for BookApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_book_api_base(),
            api_key: String::new(),
        }
    }
}

fn default_book_api_base() -> String {
    DEFAULT_BOOK_API_BASE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobSettings {
    #[serde(default = "default_blob_root")]
    pub root: PathBuf,
    #[serde(default = "default_blob_base_url")]
    pub base_url: String,
}

impl Default for BlobSettings {
    fn default() -> Self {
        Self {
            root: default_blob_root(),
            base_url: default_blob_base_url(),
        }
    }
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("blobs")
}

fn default_blob_base_url() -> String {
    "http://localhost:8080/blobs".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// Offset of the calendar the daily window is computed in, e.g. `+09:00`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    #[serde(default = "default_daily_schedule")]
    pub daily_metrics: String,
    #[serde(default = "default_hourly_schedule")]
    pub leaderboards: String,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            daily_metrics: default_daily_schedule(),
            leaderboards: default_hourly_schedule(),
        }
    }
}

fn default_utc_offset() -> String {
    "+09:00".to_string()
}

fn default_daily_schedule() -> String {
    "0 0 * * *".to_string()
}

fn default_hourly_schedule() -> String {
    "0 * * * *".to_string()
}

impl JobSettings {
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_offset(&self.utc_offset)
    }

    pub fn daily_schedule(&self) -> Result<Schedule> {
        self.daily_metrics
            .parse()
            .with_context(|| format!("invalid daily_metrics schedule '{}'", self.daily_metrics))
    }

    pub fn leaderboard_schedule(&self) -> Result<Schedule> {
        self.leaderboards
            .parse()
            .with_context(|| format!("invalid leaderboards schedule '{}'", self.leaderboards))
    }
}

/// Parses `+HH:MM` / `-HH:MM` (or `Z`) into a fixed offset.
pub fn parse_offset(value: &str) -> Result<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).context("zero offset");
    }
    let (sign, rest) = match value.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => bail!("offset '{value}' must start with + or -"),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().with_context(|| format!("invalid offset hours in '{value}'"))?;
    let minutes: i32 = minutes.parse().with_context(|| format!("invalid offset minutes in '{value}'"))?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        bail!("offset '{value}' is out of range");
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).with_context(|| format!("offset '{value}' is out of range"))
}

impl SalonConfig {
    /// Reads a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SalonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.jobs.offset()?;
        self.jobs.daily_schedule()?;
        self.jobs.leaderboard_schedule()?;
        if self.store.prefix.trim().is_empty() {
            bail!("store.prefix must not be empty");
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = SalonConfig::from_toml("").expect("parse");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.prefix, "booksalon");
        assert_eq!(config.jobs.offset().expect("offset").local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn reads_sections() {
        let config = SalonConfig::from_toml(
            r#"
            [store]
            backend = "redis"
            redis_url = "redis://cache:6379/"

            [jobs]
            utc_offset = "-05:30"
            leaderboards = "15 * * * *"
            "#,
        )
        .expect("parse");
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.redis_url, "redis://cache:6379/");
        assert_eq!(config.jobs.offset().expect("offset").local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert!(config.jobs.leaderboard_schedule().is_ok());
    }

    #[test]
    fn rejects_bad_schedule_and_offset() {
        assert!(SalonConfig::from_toml("[jobs]\ndaily_metrics = \"every day\"").is_err());
        assert!(parse_offset("09:00").is_err());
        assert!(parse_offset("+25:00").is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SalonConfig::load(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(config.books.base_url, DEFAULT_BOOK_API_BASE);
    }
}
