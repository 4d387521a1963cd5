use crate::{
    error::{EngineError, EngineResult},
    index::PackageIndex,
    package::{Package, PackageIdentity, PackageVersion},
    profile::{InstalledModEntry, Profile},
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalChoice {
    ModOnly,
    WithOrphans,
    WithAllDependencies,
}

/// The three removal sets offered when uninstalling a mod.
#[derive(Debug, Clone)]
pub struct RemovalPlan {
    pub target: InstalledModEntry,
    /// Installed dependencies no other mod in the profile needs.
    pub orphans: Vec<InstalledModEntry>,
    /// Every installed dependency of the target, shared or not.
    pub all_deps: Vec<InstalledModEntry>,
}

impl RemovalPlan {
    /// With no installed dependencies the caller confirms and removes directly.
    pub fn needs_choice(&self) -> bool {
        !self.all_deps.is_empty()
    }

    /// Entries to remove for a choice, the target first.
    pub fn entries(&self, choice: RemovalChoice) -> Vec<&InstalledModEntry> {
        let extra: &[InstalledModEntry] = match choice {
            RemovalChoice::ModOnly => &[],
            RemovalChoice::WithOrphans => &self.orphans,
            RemovalChoice::WithAllDependencies => &self.all_deps,
        };
        std::iter::once(&self.target).chain(extra.iter()).collect()
    }
}

pub struct OrphanDetector<'a> {
    index: &'a dyn PackageIndex,
    game_id: &'a str,
}

impl<'a> OrphanDetector<'a> {
    pub fn new(index: &'a dyn PackageIndex, game_id: &'a str) -> Self {
        Self { index, game_id }
    }

    pub fn analyze(&self, profile: &Profile, mod_id: &str) -> EngineResult<RemovalPlan> {
        let target = profile
            .find_mod(mod_id)
            .ok_or_else(|| EngineError::UnknownMod {
                profile_id: profile.id.clone(),
                mod_id: mod_id.to_string(),
            })?
            .clone();

        let names: Vec<String> = profile
            .mods
            .iter()
            .map(|entry| entry.base_name().to_string())
            .collect();
        let lookup = self.index.lookup_by_names(self.game_id, &names)?;
        let packages: HashMap<PackageIdentity, Package> = lookup
            .found
            .into_iter()
            .map(|package| (package.identity(), package))
            .collect();

        let target_deps: Vec<PackageIdentity> = installed_version(&packages, &target)
            .map(|version| {
                version
                    .dependency_specifiers()
                    .into_iter()
                    .map(|spec| spec.identity)
                    .filter(|identity| !identity.is_bootstrap())
                    .collect()
            })
            .unwrap_or_default();

        let shared: HashSet<PackageIdentity> = profile
            .mods
            .iter()
            .filter(|entry| entry.uuid4 != target.uuid4)
            .filter_map(|entry| installed_version(&packages, entry))
            .flat_map(|version| version.dependency_specifiers())
            .map(|spec| spec.identity)
            .collect();

        let mut seen = HashSet::new();
        let mut orphans = Vec::new();
        let mut all_deps = Vec::new();
        for identity in target_deps {
            if !seen.insert(identity.clone()) {
                continue;
            }
            let Some(entry) = profile.find_by_identity(&identity) else {
                continue;
            };
            if entry.uuid4 == target.uuid4 {
                continue;
            }
            if !shared.contains(&identity) {
                orphans.push(entry.clone());
            }
            all_deps.push(entry.clone());
        }

        debug!(
            mod_name = %target.full_name,
            orphans = orphans.len(),
            all_deps = all_deps.len(),
            "computed removal plan"
        );
        Ok(RemovalPlan {
            target,
            orphans,
            all_deps,
        })
    }
}

/// The index version matching what the entry has installed, else the latest.
fn installed_version<'p>(
    packages: &'p HashMap<PackageIdentity, Package>,
    entry: &InstalledModEntry,
) -> Option<&'p PackageVersion> {
    let package = packages.get(&entry.identity()?)?;
    package
        .version(&entry.version_number)
        .or_else(|| package.latest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;

    const GAME: &str = "lethal-company";

    fn package(full_name: &str, deps: &[&str]) -> Package {
        let (owner, name) = full_name.split_once('-').unwrap();
        Package {
            name: name.to_string(),
            full_name: full_name.to_string(),
            owner: owner.to_string(),
            package_url: String::new(),
            date_created: String::new(),
            date_updated: String::new(),
            uuid4: String::new(),
            rating_score: 0,
            is_pinned: false,
            is_deprecated: false,
            has_nsfw_content: false,
            categories: Vec::new(),
            versions: vec![PackageVersion {
                name: name.to_string(),
                full_name: format!("{full_name}-1.0.0"),
                description: String::new(),
                icon: None,
                version_number: "1.0.0".into(),
                dependencies: deps.iter().map(|d| format!("{d}-1.0.0")).collect(),
                download_url: String::new(),
                downloads: 0,
                date_created: String::new(),
                file_size: 0,
                uuid4: String::new(),
            }],
        }
    }

    fn entry(name: &str) -> InstalledModEntry {
        InstalledModEntry {
            uuid4: format!("id-{name}"),
            full_name: format!("{name}-1.0.0"),
            version_number: "1.0.0".into(),
            icon_url: None,
            enabled: true,
        }
    }

    fn profile(names: &[&str]) -> Profile {
        let mut profile = Profile::new("p", GAME);
        profile.mods = names.iter().map(|name| entry(name)).collect();
        profile
    }

    #[test]
    fn shared_dependency_is_not_an_orphan() {
        let index = MemoryIndex::new().with_game(
            GAME,
            vec![
                package("T-M", &["T-X", "T-Y", "BepInEx-BepInExPack"]),
                package("T-N", &["T-X"]),
                package("T-X", &[]),
                package("T-Y", &[]),
                package("BepInEx-BepInExPack", &[]),
            ],
        );
        let profile = profile(&["T-M", "T-N", "T-X", "T-Y", "BepInEx-BepInExPack"]);
        let plan = OrphanDetector::new(&index, GAME)
            .analyze(&profile, "id-T-M")
            .unwrap();

        let orphans: Vec<&str> = plan.orphans.iter().map(|e| e.base_name()).collect();
        let all: Vec<&str> = plan.all_deps.iter().map(|e| e.base_name()).collect();
        assert_eq!(orphans, vec!["T-Y"]);
        assert_eq!(all, vec!["T-X", "T-Y"]);
        assert!(plan.needs_choice());
        assert_eq!(plan.entries(RemovalChoice::ModOnly).len(), 1);
        assert_eq!(plan.entries(RemovalChoice::WithOrphans).len(), 2);
        assert_eq!(plan.entries(RemovalChoice::WithAllDependencies).len(), 3);
    }

    #[test]
    fn uninstalled_dependencies_are_not_offered() {
        let index = MemoryIndex::new().with_game(
            GAME,
            vec![package("T-M", &["T-X"]), package("T-X", &[])],
        );
        let profile = profile(&["T-M"]);
        let plan = OrphanDetector::new(&index, GAME)
            .analyze(&profile, "id-T-M")
            .unwrap();
        assert!(plan.all_deps.is_empty());
        assert!(!plan.needs_choice());
    }

    #[test]
    fn unknown_mod_is_an_error() {
        let index = MemoryIndex::new().with_game(GAME, Vec::new());
        let err = OrphanDetector::new(&index, GAME)
            .analyze(&profile(&[]), "missing")
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownMod { .. }));
    }
}
