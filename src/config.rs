use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::error::Result;
use crate::pagination::{
    PaginationConfig, DEFAULT_CHUNKS_PER_PAGE, DEFAULT_MAX_CHUNK_CHARS, DEFAULT_WORDS_PER_CHUNK,
};
use crate::session::DEFAULT_ADVANCE_DELAY_MS;

/// User settings persisted between runs. Missing fields take defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub words_per_chunk: usize,
    pub max_chunk_chars: usize,
    pub chunks_per_page: usize,
    pub advance_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            words_per_chunk: DEFAULT_WORDS_PER_CHUNK,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            chunks_per_page: DEFAULT_CHUNKS_PER_PAGE,
            advance_delay_ms: DEFAULT_ADVANCE_DELAY_MS,
        }
    }
}

impl Config {
    /// Validated pagination limits.
    pub fn pagination(&self) -> Result<PaginationConfig> {
        PaginationConfig::new(
            self.words_per_chunk,
            self.max_chunk_chars,
            self.chunks_per_page,
        )
    }

    pub fn advance_delay(&self) -> Duration {
        Duration::from_millis(self.advance_delay_ms)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("tovel_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable config {}: {e}", self.path.display());
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
