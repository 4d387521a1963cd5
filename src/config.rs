use crate::{
    error::EngineError,
    game::{self, GameInstallation},
};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub steam_path: Option<PathBuf>,
    #[serde(default)]
    pub game_paths: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_true")]
    pub confirm_mod_delete: bool,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(base_data_dir()?)
    }

    pub fn load_or_create_in(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).context("create app data dir")?;
        let path = data_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let mut config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            config.data_dir = data_dir;
            return Ok(config);
        }

        let config = AppConfig {
            data_dir,
            steam_path: game::default_steam_path(),
            game_paths: BTreeMap::new(),
            active_profile: None,
            use_cache: true,
            confirm_mod_delete: true,
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).context("create app data dir")?;
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(self.data_dir.join("config.json"), raw).context("write app config")?;
        Ok(())
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.data_dir.join("profiles.json")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn index_cache_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }

    /// Explicit override first, then the Steam library that holds the game.
    pub fn game_root(&self, game_identifier: &str) -> Result<PathBuf, EngineError> {
        if let Some(path) = self.game_paths.get(game_identifier) {
            return Ok(path.clone());
        }
        self.steam_path
            .as_deref()
            .and_then(|steam| game::detect_game_root(steam, game_identifier))
            .ok_or_else(|| EngineError::NoGamePathConfigured(game_identifier.to_string()))
    }

    pub fn installation(&self, game_identifier: &str) -> Result<GameInstallation, EngineError> {
        self.game_root(game_identifier).map(GameInstallation::new)
    }

    pub fn set_game_path(&mut self, game_identifier: &str, path: &Path) {
        self.game_paths
            .insert(game_identifier.to_string(), path.to_path_buf());
    }
}

fn default_true() -> bool {
    true
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("modforge"))
}
