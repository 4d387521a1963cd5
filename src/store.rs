use crate::{
    cache::ModCache,
    error::{EngineError, EngineResult},
    game::GameInstallation,
    profile::{now_millis, InstalledModEntry, Profile},
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Whole-collection persistence. There is no partial update format.
pub trait ProfileRepository {
    fn load_profiles(&self) -> EngineResult<Vec<Profile>>;
    fn save_profiles(&self, profiles: &[Profile]) -> EngineResult<()>;
}

/// `profiles.json` holding the full profile array.
#[derive(Debug, Clone)]
pub struct JsonProfileRepository {
    path: PathBuf,
}

impl JsonProfileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileRepository for JsonProfileRepository {
    fn load_profiles(&self) -> EngineResult<Vec<Profile>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| EngineError::fs(&self.path, err))?;
        serde_json::from_str(&raw).map_err(|err| EngineError::Persistence(err.to_string()))
    }

    fn save_profiles(&self, profiles: &[Profile]) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| EngineError::fs(parent, err))?;
        }
        let raw = serde_json::to_string_pretty(profiles)
            .map_err(|err| EngineError::Persistence(err.to_string()))?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, raw).map_err(|err| EngineError::fs(&temp, err))?;
        fs::rename(&temp, &self.path).map_err(|err| EngineError::fs(&self.path, err))?;
        Ok(())
    }
}

/// Metadata a caller may change on an existing profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub game_identifier: Option<String>,
    pub mods: Option<Vec<InstalledModEntry>>,
}

/// In-memory profile collection. Every mutation rewrites the full collection.
pub struct ProfileStore<R: ProfileRepository> {
    repo: R,
    profiles: Vec<Profile>,
    active_profile_id: Option<String>,
}

impl<R: ProfileRepository> ProfileStore<R> {
    pub fn load(repo: R) -> EngineResult<Self> {
        let profiles = repo.load_profiles()?;
        Ok(Self {
            repo,
            profiles,
            active_profile_id: None,
        })
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile(&self, profile_id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|profile| profile.id == profile_id)
    }

    pub fn require(&self, profile_id: &str) -> EngineResult<&Profile> {
        self.profile(profile_id)
            .ok_or_else(|| EngineError::UnknownProfile(profile_id.to_string()))
    }

    pub fn active_profile_id(&self) -> Option<&str> {
        self.active_profile_id.as_deref()
    }

    pub fn active_profile(&self) -> EngineResult<&Profile> {
        let id = self
            .active_profile_id
            .as_deref()
            .ok_or(EngineError::NoProfileSelected)?;
        self.require(id)
    }

    /// Marks the profile active and persists its refreshed last-used time.
    pub fn select_profile(&mut self, profile_id: &str) -> EngineResult<()> {
        self.mutate(profile_id, Profile::touch)?;
        self.active_profile_id = Some(profile_id.to_string());
        Ok(())
    }

    /// Creates and selects a new profile. Returns its id.
    pub fn create_profile(&mut self, name: &str, game_identifier: &str) -> EngineResult<String> {
        let profile = Profile::new(name, game_identifier);
        let id = profile.id.clone();
        let mut next = self.profiles.clone();
        next.push(profile);
        self.commit(next)?;
        self.active_profile_id = Some(id.clone());
        Ok(id)
    }

    /// Removes the profile record and clears its cached payloads. Cache cleanup
    /// failure is logged; the record goes regardless. The plugin dir is shared by
    /// every profile of the game, so installed files stay until the next sync.
    pub fn delete_profile(&mut self, profile_id: &str, cache: Option<&ModCache>) -> EngineResult<()> {
        if let Some(cache) = cache {
            if let Err(err) = cache.remove_profile(profile_id) {
                warn!(profile = profile_id, error = %err, "failed to delete profile cache");
            }
        }
        let next: Vec<Profile> = self
            .profiles
            .iter()
            .filter(|profile| profile.id != profile_id)
            .cloned()
            .collect();
        self.commit(next)?;
        if self.active_profile_id.as_deref() == Some(profile_id) {
            self.active_profile_id = None;
        }
        Ok(())
    }

    pub fn update_profile(&mut self, profile_id: &str, update: ProfileUpdate) -> EngineResult<()> {
        self.mutate(profile_id, |profile| {
            if let Some(name) = update.name {
                profile.name = name;
            }
            if let Some(game) = update.game_identifier {
                profile.game_identifier = game;
            }
            if let Some(mods) = update.mods {
                profile.mods = mods;
            }
            profile.last_used = now_millis();
        })
    }

    /// Appends the entry unless one with the same install id is already present.
    pub fn add_mod(&mut self, profile_id: &str, entry: InstalledModEntry) -> EngineResult<bool> {
        let profile = self.require(profile_id)?;
        if profile.find_mod(&entry.uuid4).is_some() {
            debug!(profile = profile_id, mod_name = %entry.full_name, "mod already in profile");
            return Ok(false);
        }
        self.mutate(profile_id, |profile| profile.mods.push(entry))?;
        Ok(true)
    }

    /// Replaces the entry with the same install id, or appends it.
    pub fn upsert_mod(&mut self, profile_id: &str, entry: InstalledModEntry) -> EngineResult<()> {
        self.mutate(profile_id, |profile| {
            match profile.mods.iter_mut().find(|m| m.uuid4 == entry.uuid4) {
                Some(existing) => *existing = entry,
                None => profile.mods.push(entry),
            }
        })
    }

    /// Deletes the mod's files (best effort) and then drops the entry. The entry is
    /// removed even when the file deletion fails.
    pub fn remove_mod(
        &mut self,
        profile_id: &str,
        mod_id: &str,
        game: Option<&GameInstallation>,
    ) -> EngineResult<()> {
        let profile = self.require(profile_id)?;
        let Some(entry) = profile.find_mod(mod_id) else {
            return Err(EngineError::UnknownMod {
                profile_id: profile_id.to_string(),
                mod_id: mod_id.to_string(),
            });
        };
        if let Some(game) = game {
            if let Err(err) = game.delete_mod_dirs_for(entry.base_name()) {
                warn!(mod_name = %entry.full_name, error = %err, "failed to remove mod files");
            }
        }
        self.mutate(profile_id, |profile| {
            profile.mods.retain(|m| m.uuid4 != mod_id);
        })
    }

    pub fn toggle_mod(&mut self, profile_id: &str, mod_id: &str) -> EngineResult<bool> {
        let profile = self.require(profile_id)?;
        if profile.find_mod(mod_id).is_none() {
            return Err(EngineError::UnknownMod {
                profile_id: profile_id.to_string(),
                mod_id: mod_id.to_string(),
            });
        }
        let mut enabled = false;
        self.mutate(profile_id, |profile| {
            if let Some(entry) = profile.mods.iter_mut().find(|m| m.uuid4 == mod_id) {
                entry.enabled = !entry.enabled;
                enabled = entry.enabled;
            }
        })?;
        Ok(enabled)
    }

    fn mutate(&mut self, profile_id: &str, apply: impl FnOnce(&mut Profile)) -> EngineResult<()> {
        let mut next = self.profiles.clone();
        let profile = next
            .iter_mut()
            .find(|profile| profile.id == profile_id)
            .ok_or_else(|| EngineError::UnknownProfile(profile_id.to_string()))?;
        apply(profile);
        self.commit(next)
    }

    /// Applies the new collection in memory, then writes it out whole.
    fn commit(&mut self, next: Vec<Profile>) -> EngineResult<()> {
        self.profiles = next;
        self.repo.save_profiles(&self.profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct MemoryRepo {
        saved: Rc<RefCell<Vec<Vec<Profile>>>>,
    }

    impl ProfileRepository for MemoryRepo {
        fn load_profiles(&self) -> EngineResult<Vec<Profile>> {
            Ok(self.saved.borrow().last().cloned().unwrap_or_default())
        }

        fn save_profiles(&self, profiles: &[Profile]) -> EngineResult<()> {
            self.saved.borrow_mut().push(profiles.to_vec());
            Ok(())
        }
    }

    fn entry(id: &str, full_name: &str) -> InstalledModEntry {
        InstalledModEntry {
            uuid4: id.to_string(),
            full_name: full_name.to_string(),
            version_number: "1.0.0".to_string(),
            icon_url: None,
            enabled: true,
        }
    }

    #[test]
    fn every_mutation_writes_full_collection() {
        let repo = MemoryRepo::default();
        let mut store = ProfileStore::load(repo.clone()).unwrap();
        let id = store.create_profile("Main", "lethal-company").unwrap();
        assert_eq!(store.active_profile_id(), Some(id.as_str()));
        assert!(store.add_mod(&id, entry("m1", "A-One-1.0.0")).unwrap());
        assert!(!store.add_mod(&id, entry("m1", "A-One-1.0.0")).unwrap());
        assert!(!store.toggle_mod(&id, "m1").unwrap());

        let saves = repo.saved.borrow();
        assert_eq!(saves.len(), 3);
        assert_eq!(saves[2][0].mods.len(), 1);
        assert!(!saves[2][0].mods[0].enabled);
    }

    #[test]
    fn remove_mod_drops_entry_even_when_files_missing() {
        let dir = TempDir::new().unwrap();
        let game = GameInstallation::new(dir.path());
        let mut store = ProfileStore::load(MemoryRepo::default()).unwrap();
        let id = store.create_profile("Main", "lethal-company").unwrap();
        store.add_mod(&id, entry("m1", "A-One-1.0.0")).unwrap();
        store.add_mod(&id, entry("m2", "B-Two-1.0.0")).unwrap();
        fs::create_dir_all(game.mod_dir("B-Two")).unwrap();

        store.remove_mod(&id, "m1", Some(&game)).unwrap();
        store.remove_mod(&id, "m2", Some(&game)).unwrap();
        assert!(store.require(&id).unwrap().mods.is_empty());
        assert!(!game.has_mod("B-Two"));
        assert!(matches!(
            store.remove_mod(&id, "m3", None),
            Err(EngineError::UnknownMod { .. })
        ));
    }

    #[test]
    fn select_refreshes_last_used_and_persists() {
        let repo = MemoryRepo::default();
        let mut stale = Profile::new("Main", "lethal-company");
        stale.last_used = 0;
        let id = stale.id.clone();
        repo.saved.borrow_mut().push(vec![stale]);

        let mut store = ProfileStore::load(repo.clone()).unwrap();
        assert_eq!(store.active_profile_id(), None);
        store.select_profile(&id).unwrap();
        assert_eq!(store.active_profile_id(), Some(id.as_str()));
        assert!(store.require(&id).unwrap().last_used > 0);
        assert!(repo.saved.borrow().last().unwrap()[0].last_used > 0);
        assert!(matches!(
            store.select_profile("missing"),
            Err(EngineError::UnknownProfile(_))
        ));
    }

    #[test]
    fn remove_mod_deletes_legacy_versioned_dir() {
        let dir = TempDir::new().unwrap();
        let game = GameInstallation::new(dir.path());
        let mut store = ProfileStore::load(MemoryRepo::default()).unwrap();
        let id = store.create_profile("Main", "lethal-company").unwrap();
        store.add_mod(&id, entry("m1", "A-One-1.0.0")).unwrap();
        fs::create_dir_all(game.mod_dir("A-One-1.0.0")).unwrap();
        fs::create_dir_all(game.mod_dir("A-OneMore")).unwrap();

        store.remove_mod(&id, "m1", Some(&game)).unwrap();
        assert_eq!(game.list_installed_mod_names().unwrap(), vec!["A-OneMore".to_string()]);
    }

    #[test]
    fn delete_clears_selection() {
        let mut store = ProfileStore::load(MemoryRepo::default()).unwrap();
        let id = store.create_profile("Main", "lethal-company").unwrap();
        store.delete_profile(&id, None).unwrap();
        assert!(store.profiles().is_empty());
        assert!(matches!(
            store.active_profile(),
            Err(EngineError::NoProfileSelected)
        ));
    }

    #[test]
    fn json_repository_round_trips() {
        let dir = TempDir::new().unwrap();
        let repo = JsonProfileRepository::new(dir.path().join("profiles.json"));
        let mut store = ProfileStore::load(repo.clone()).unwrap();
        let id = store.create_profile("Main", "risk-of-rain-2").unwrap();
        store
            .update_profile(
                &id,
                ProfileUpdate {
                    name: Some("Renamed".into()),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();

        let reloaded = ProfileStore::load(repo).unwrap();
        assert_eq!(reloaded.profiles().len(), 1);
        assert_eq!(reloaded.profiles()[0].name, "Renamed");
    }
}
