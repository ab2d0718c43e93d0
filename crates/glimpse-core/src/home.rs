//! The glimpse home directory: config plus the on-disk story store.
//!
//! Layout:
//!
//! ```text
//! <home>/
//!   config.toml          optional, see `Config`
//!   store/<key>.json     persisted story list
//! ```

use crate::clock::Clock;
use crate::config::Config;
use crate::repository::StoreRepository;
use crate::store::FileStore;
use dirs_next::home_dir;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable that overrides the default home directory.
pub const HOME_ENV: &str = "GLIMPSE_HOME";

#[derive(Debug, Clone)]
pub struct GlimpseHome {
    pub dir: PathBuf,
    pub store_dir: PathBuf,
    pub config: Config,
}

impl GlimpseHome {
    /// Load the home directory, creating it if needed.
    ///
    /// Precedence for the directory:
    /// 1. `home_override` (from the --home CLI flag)
    /// 2. `GLIMPSE_HOME` environment variable
    /// 3. `~/.glimpse`
    pub fn load(home_override: Option<PathBuf>) -> io::Result<Self> {
        let dir = if let Some(path) = home_override {
            path
        } else if let Ok(env_home) = std::env::var(HOME_ENV) {
            PathBuf::from(env_home)
        } else {
            let home = home_dir()
                .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "Home directory not found"))?;
            home.join(".glimpse")
        };
        let store_dir = dir.join("store");

        fs::create_dir_all(&dir)?;
        fs::create_dir_all(&store_dir)?;

        let config_path = dir.join("config.toml");
        let config = if config_path.exists() {
            Config::from_toml(&fs::read_to_string(&config_path)?)?
        } else {
            Config::default()
        };

        Ok(Self {
            dir,
            store_dir,
            config,
        })
    }

    /// Repository over this home's store, keyed and expiring per the config.
    pub fn repository(&self, clock: Arc<dyn Clock>) -> StoreRepository<FileStore> {
        StoreRepository::new(FileStore::new(&self.store_dir), clock)
            .with_key(self.config.storage_key.clone())
            .with_retention_ms(self.config.retention_ms())
    }
}
