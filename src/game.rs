use crate::{
    error::{EngineError, EngineResult},
    package::strip_version,
};
use directories::BaseDirs;
use regex::Regex;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::debug;

const PLUGIN_SUBDIR: [&str; 2] = ["BepInEx", "plugins"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownGame {
    pub identifier: &'static str,
    pub display_name: &'static str,
    pub steam_app_id: &'static str,
}

const KNOWN_GAMES: &[KnownGame] = &[
    KnownGame {
        identifier: "lethal-company",
        display_name: "Lethal Company",
        steam_app_id: "1966720",
    },
    KnownGame {
        identifier: "risk-of-rain-2",
        display_name: "Risk of Rain 2",
        steam_app_id: "632360",
    },
];

pub fn known_games() -> &'static [KnownGame] {
    KNOWN_GAMES
}

pub fn known_game(identifier: &str) -> Option<&'static KnownGame> {
    KNOWN_GAMES.iter().find(|game| game.identifier == identifier)
}

/// A game root on disk. Every mod lives in one directory under the plugin dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInstallation {
    root: PathBuf,
}

impl GameInstallation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plugin_dir(&self) -> PathBuf {
        PLUGIN_SUBDIR
            .iter()
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    pub fn mod_dir(&self, name: &str) -> PathBuf {
        self.plugin_dir().join(name)
    }

    pub fn has_mod(&self, name: &str) -> bool {
        self.mod_dir(name).is_dir()
    }

    /// Names of the child directories of the plugin dir, sorted. A missing plugin
    /// dir means nothing is installed.
    pub fn list_installed_mod_names(&self) -> EngineResult<Vec<String>> {
        let plugin_dir = self.plugin_dir();
        let entries = match fs::read_dir(&plugin_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(EngineError::fs(plugin_dir, err)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| EngineError::fs(&plugin_dir, err))?;
            let is_dir = entry
                .file_type()
                .map(|kind| kind.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Returns whether a directory was removed.
    pub fn delete_mod_dir(&self, name: &str) -> EngineResult<bool> {
        let path = self.mod_dir(name);
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(EngineError::fs(path, err)),
        }
    }

    /// Directories holding `base_name`: the exact name first, then legacy
    /// `base_name-X.Y.Z` directories.
    pub fn mod_dirs_for(&self, base_name: &str) -> EngineResult<Vec<String>> {
        let mut dirs: Vec<String> = self
            .list_installed_mod_names()?
            .into_iter()
            .filter(|name| strip_version(name) == base_name)
            .collect();
        dirs.sort_by_key(|name| name != base_name);
        Ok(dirs)
    }

    pub fn find_mod_dir(&self, base_name: &str) -> EngineResult<Option<String>> {
        Ok(self.mod_dirs_for(base_name)?.into_iter().next())
    }

    /// Deletes every directory holding `base_name`. Returns how many went.
    pub fn delete_mod_dirs_for(&self, base_name: &str) -> EngineResult<usize> {
        let mut removed = 0;
        for name in self.mod_dirs_for(base_name)? {
            if self.delete_mod_dir(&name)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

pub fn default_steam_path() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    let home = base.home_dir();
    [
        home.join("Library/Application Support/Steam"),
        home.join(".local/share/Steam"),
        home.join(".steam/steam"),
    ]
    .into_iter()
    .find(|path| path.exists())
}

/// Locates a known game through Steam's app manifests, checking the default
/// library first and then every folder in `libraryfolders.vdf`.
pub fn detect_game_root(steam_root: &Path, game_identifier: &str) -> Option<PathBuf> {
    let game = known_game(game_identifier)?;
    let manifest_name = format!("appmanifest_{}.acf", game.steam_app_id);

    let default_manifest = steam_root.join("steamapps").join(&manifest_name);
    if default_manifest.exists() {
        return install_dir_from_manifest(&default_manifest);
    }

    let folders = fs::read_to_string(steam_root.join("steamapps").join("libraryfolders.vdf")).ok()?;
    let path_re = Regex::new(r#""path"\s+"([^"]+)""#).ok()?;
    for cap in path_re.captures_iter(&folders) {
        let manifest = Path::new(&cap[1]).join("steamapps").join(&manifest_name);
        if manifest.exists() {
            return install_dir_from_manifest(&manifest);
        }
    }
    debug!(game = game_identifier, "no steam manifest found");
    None
}

fn install_dir_from_manifest(manifest: &Path) -> Option<PathBuf> {
    let content = fs::read_to_string(manifest).ok()?;
    let dir_re = Regex::new(r#""installdir"\s+"([^"]+)""#).ok()?;
    let cap = dir_re.captures(&content)?;
    let path = manifest.parent()?.join("common").join(&cap[1]);
    path.exists().then_some(path)
}
