use crate::registry::{self, GameDef};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const DEFAULT_BACKEND_PROGRAM: &str = "playdeck-backend";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BackendCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_BACKEND_PROGRAM.to_string(),
            args: Vec::new(),
        }
    }
}

/// Where the side panel gets its entries from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    #[default]
    Profiles,
    Games,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendCommand,
    #[serde(default)]
    pub entry_source: EntrySource,
    #[serde(default = "registry::default_catalog")]
    pub games: Vec<GameDef>,
    #[serde(default = "default_true")]
    pub side_panel_open: bool,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?)
    }

    pub fn load_or_create_in(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let mut config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            config.data_dir = data_dir.to_path_buf();
            return Ok(config);
        }

        let config = AppConfig {
            data_dir: data_dir.to_path_buf(),
            ..AppConfig::default()
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).context("create app data dir")?;
        let path = self.data_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("playdeck.log")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendCommand::default(),
            entry_source: EntrySource::default(),
            games: registry::default_catalog(),
            side_panel_open: true,
            data_dir: PathBuf::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("playdeck"))
}
