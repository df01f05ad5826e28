use anyhow::{Context, Result};
use booksalon::{
    AnyStore, KakaoBookClient, Salon, SalonConfig,
    config::StoreBackend,
};
use std::path::{Path, PathBuf};

/// Settings taken from flags or the environment, applied over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub redis_url: Option<String>,
    pub book_api_key: Option<String>,
}

/// Resolved configuration for one CLI invocation
pub struct AppContext {
    pub config_path: PathBuf,
    pub config: SalonConfig,
}

impl AppContext {
    pub fn load(config_path: &Path, overrides: Overrides) -> Result<Self> {
        let mut config = SalonConfig::load(config_path)?;
        if let Some(url) = overrides.redis_url {
            config.store.backend = StoreBackend::Redis;
            config.store.redis_url = url;
        }
        if let Some(key) = overrides.book_api_key {
            config.books.api_key = key;
        }
        config.validate()?;
        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
        })
    }

    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }

    pub async fn salon(&self) -> Result<Salon<AnyStore>> {
        Salon::from_config(&self.config)
            .await
            .with_context(|| format!("failed to open the {:?} store", self.config.store.backend))
    }

    pub fn book_client(&self) -> Result<KakaoBookClient> {
        if self.config.books.api_key.trim().is_empty() {
            anyhow::bail!("no book API key configured; set BOOK_API_KEY or books.api_key");
        }
        Ok(KakaoBookClient::new(
            self.config.books.base_url.as_str(),
            self.config.books.api_key.as_str(),
        )?)
    }
}
