//! Operations that compose the resolver, installer, orphan detector and
//! reconciler against explicit profile and game arguments.

use crate::{
    error::{EngineError, EngineResult, ItemFailure},
    game::GameInstallation,
    index::PackageIndex,
    installer::{InstallOutcome, Installer},
    orphans::{OrphanDetector, RemovalChoice, RemovalPlan},
    package::{split_version_suffix, SemVer},
    profile::{InstalledModEntry, Profile},
    progress::{InstallStage, ProgressEvent, ProgressSink},
    reconcile::{Reconciler, SyncReport},
    resolver::{DependencyResolver, ResolvedPackage},
    store::{ProfileRepository, ProfileStore},
    transfer::ProfileExport,
};
use serde::Serialize;
use std::thread;
use tracing::{info, warn};

/// Installs issued concurrently before the next barrier.
pub const BATCH_SIZE: usize = 5;

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub root: String,
    /// Dependencies first, the root last when it succeeded.
    pub installed: Vec<String>,
    pub unknown: Vec<String>,
    pub failures: Vec<ItemFailure>,
    pub already_installed: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UninstallReport {
    pub removed: Vec<String>,
    /// No installed dependencies, so no choice applied.
    pub direct: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub installed: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        let names: Vec<&str> = self
            .failures
            .iter()
            .map(|failure| failure.full_name.as_str())
            .collect();
        format!(
            "{}/{} installed, failed: [{}]",
            self.installed.len(),
            self.total,
            names.join(", ")
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub profile_id: String,
    pub batch: BatchReport,
    /// Exported names the index could not resolve.
    pub unknown: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutdatedMod {
    pub mod_id: String,
    pub name: String,
    pub current: String,
    pub latest: String,
}

pub struct Engine {
    index: Box<dyn PackageIndex>,
    installer: Installer,
    progress: ProgressSink,
}

impl Engine {
    pub fn new(index: Box<dyn PackageIndex>, installer: Installer) -> Self {
        Self {
            index,
            installer,
            progress: ProgressSink::silent(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn index(&self) -> &dyn PackageIndex {
        self.index.as_ref()
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    /// Looks up `Team-Mod` or `Team-Mod-1.2.3`. A missing version falls back to latest.
    pub fn resolve_package(&self, game_id: &str, specifier: &str) -> EngineResult<ResolvedPackage> {
        let (base, version) = split_version_suffix(specifier.trim());
        let package = self
            .index
            .get_by_name(game_id, base)?
            .ok_or_else(|| EngineError::NotFound(specifier.to_string()))?;
        let version = package
            .version_or_latest(version)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(specifier.to_string()))?;
        Ok(ResolvedPackage::new(package, version))
    }

    /// Installs `target` and every missing transitive dependency, dependencies
    /// first. Dependency failures are recorded; a root failure is returned.
    pub fn install_with_dependencies<R: ProfileRepository>(
        &self,
        store: &mut ProfileStore<R>,
        profile_id: &str,
        game: &GameInstallation,
        target: ResolvedPackage,
        use_cache: bool,
    ) -> EngineResult<InstallReport> {
        let profile = store.require(profile_id)?.clone();
        let mut report = InstallReport {
            root: target.full_name().to_string(),
            ..InstallReport::default()
        };
        if profile.is_installed(&target.identity()) {
            info!(mod_name = target.full_name(), "already installed");
            report.already_installed = true;
            return Ok(report);
        }

        self.progress.stage(target.full_name(), InstallStage::Resolving);
        let resolution = DependencyResolver::new(self.index.as_ref(), &profile.game_identifier)
            .resolve(target, &profile);
        report.unknown = resolution.unknown.clone();
        report.failures = resolution.failures.clone();

        for dependency in resolution.dependencies() {
            match self.install_one(dependency, game, profile_id, use_cache) {
                Ok(_) => {
                    store.add_mod(profile_id, entry_for(dependency, true))?;
                    report.installed.push(dependency.full_name().to_string());
                }
                Err(err) => {
                    warn!(mod_name = dependency.full_name(), error = %err, "dependency install failed");
                    self.report_failure(dependency.full_name(), &err);
                    report
                        .failures
                        .push(ItemFailure::new(dependency.full_name(), &err));
                }
            }
        }

        let Some(root) = resolution.root() else {
            return Ok(report);
        };
        if let Err(err) = self.install_one(root, game, profile_id, use_cache) {
            self.report_failure(root.full_name(), &err);
            return Err(err);
        }
        store.add_mod(profile_id, entry_for(root, true))?;
        report.installed.push(root.full_name().to_string());
        info!(
            mod_name = root.full_name(),
            dependencies = report.installed.len() - 1,
            "installed"
        );
        Ok(report)
    }

    pub fn removal_plan(&self, profile: &Profile, mod_id: &str) -> EngineResult<RemovalPlan> {
        OrphanDetector::new(self.index.as_ref(), &profile.game_identifier).analyze(profile, mod_id)
    }

    /// Removes a mod, plus the dependency set `choice` selects. With no installed
    /// dependencies the mod is removed directly and `choice` is ignored.
    pub fn uninstall<R: ProfileRepository>(
        &self,
        store: &mut ProfileStore<R>,
        profile_id: &str,
        game: &GameInstallation,
        mod_id: &str,
        choice: RemovalChoice,
    ) -> EngineResult<UninstallReport> {
        let profile = store.require(profile_id)?.clone();
        let plan = self.removal_plan(&profile, mod_id)?;
        let direct = !plan.needs_choice();
        let entries: Vec<InstalledModEntry> = if direct {
            vec![plan.target.clone()]
        } else {
            plan.entries(choice).into_iter().cloned().collect()
        };

        let mut report = UninstallReport {
            removed: Vec::new(),
            direct,
        };
        for entry in entries {
            store.remove_mod(profile_id, &entry.uuid4, Some(game))?;
            self.progress.emit(ProgressEvent::Removed {
                name: entry.full_name.clone(),
            });
            report.removed.push(entry.full_name);
        }
        Ok(report)
    }

    /// Installs `targets` in batches. Items within a batch run concurrently; a batch
    /// finishes completely before the next starts. The profile is not touched.
    pub fn batch_install(
        &self,
        targets: &[ResolvedPackage],
        game: &GameInstallation,
        profile_id: &str,
        use_cache: bool,
    ) -> (BatchReport, Vec<ResolvedPackage>) {
        let mut report = BatchReport {
            total: targets.len(),
            ..BatchReport::default()
        };
        let mut succeeded = Vec::new();
        let batches = targets.len().div_ceil(BATCH_SIZE);

        for (batch_index, batch) in targets.chunks(BATCH_SIZE).enumerate() {
            let results: Vec<EngineResult<InstallOutcome>> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|target| {
                        scope.spawn(move || self.install_one(target, game, profile_id, use_cache))
                    })
                    .collect();
                handles
                    .into_iter()
                    .zip(batch)
                    .map(|(handle, target)| {
                        handle.join().unwrap_or_else(|_| {
                            Err(EngineError::Extraction {
                                name: target.full_name().to_string(),
                                message: "install worker panicked".to_string(),
                            })
                        })
                    })
                    .collect()
            });

            for (target, result) in batch.iter().zip(results) {
                match result {
                    Ok(_) => {
                        report.installed.push(target.full_name().to_string());
                        succeeded.push(target.clone());
                    }
                    Err(err) => {
                        warn!(mod_name = target.full_name(), error = %err, "batch install failed");
                        self.report_failure(target.full_name(), &err);
                        report.failures.push(ItemFailure::new(target.full_name(), &err));
                    }
                }
            }
            self.progress.emit(ProgressEvent::BatchCompleted {
                batch: batch_index + 1,
                batches,
                done: report.installed.len() + report.failures.len(),
                total: report.total,
            });
        }

        info!("{}", report.summary());
        (report, succeeded)
    }

    /// Creates a profile from an export and installs its mods. Unresolvable names
    /// are reported, never fatal. Disabled mods are recorded without files. A name
    /// listed twice is installed once.
    pub fn import_profile<R: ProfileRepository>(
        &self,
        store: &mut ProfileStore<R>,
        export: &ProfileExport,
        game_id: &str,
        game: &GameInstallation,
        use_cache: bool,
    ) -> EngineResult<ImportReport> {
        let profile_id = store.create_profile(&export.profile_name, game_id)?;
        let lookup = self.index.lookup_by_names(game_id, &export.names())?;
        for name in &lookup.unknown {
            warn!(mod_name = %name, "imported mod not found in index");
        }

        let mut enabled = Vec::new();
        let mut disabled = Vec::new();
        for package in &lookup.found {
            let exported = export.find(&package.full_name);
            let wanted = exported.and_then(|entry| entry.version);
            let Some(version) = package.version_or_latest(wanted) else {
                warn!(mod_name = %package.full_name, "package has no versions");
                continue;
            };
            let target = ResolvedPackage::new(package.clone(), version.clone());
            if exported.map_or(true, |entry| entry.enabled) {
                enabled.push(target);
            } else {
                disabled.push(target);
            }
        }

        let (batch, installed) = self.batch_install(&enabled, game, &profile_id, use_cache);
        for target in &installed {
            store.add_mod(&profile_id, entry_for(target, true))?;
        }
        for target in &disabled {
            store.add_mod(&profile_id, entry_for(target, false))?;
        }

        Ok(ImportReport {
            profile_id,
            batch,
            unknown: lookup.unknown,
        })
    }

    /// Entries whose index has a newer version than the one installed.
    pub fn outdated(&self, profile: &Profile) -> EngineResult<Vec<OutdatedMod>> {
        let names: Vec<String> = profile
            .mods
            .iter()
            .map(|entry| entry.base_name().to_string())
            .collect();
        let lookup = self.index.lookup_by_names(&profile.game_identifier, &names)?;

        let mut outdated = Vec::new();
        for entry in &profile.mods {
            let Some(package) = lookup
                .found
                .iter()
                .find(|package| package.full_name == entry.base_name())
            else {
                continue;
            };
            let Some(latest) = package.latest() else {
                continue;
            };
            if is_newer(&latest.version_number, &entry.version_number) {
                outdated.push(OutdatedMod {
                    mod_id: entry.uuid4.clone(),
                    name: entry.base_name().to_string(),
                    current: entry.version_number.clone(),
                    latest: latest.version_number.clone(),
                });
            }
        }
        Ok(outdated)
    }

    /// Replaces a mod with its latest version. Returns the new full name, or `None`
    /// when already current. Disabled mods only have their entry updated.
    pub fn update_mod<R: ProfileRepository>(
        &self,
        store: &mut ProfileStore<R>,
        profile_id: &str,
        game: &GameInstallation,
        mod_id: &str,
    ) -> EngineResult<Option<String>> {
        let profile = store.require(profile_id)?;
        let entry = profile
            .find_mod(mod_id)
            .ok_or_else(|| EngineError::UnknownMod {
                profile_id: profile_id.to_string(),
                mod_id: mod_id.to_string(),
            })?
            .clone();
        let game_id = profile.game_identifier.clone();

        let package = self
            .index
            .get_by_name(&game_id, entry.base_name())?
            .ok_or_else(|| EngineError::NotFound(entry.base_name().to_string()))?;
        let latest = package
            .latest()
            .cloned()
            .ok_or_else(|| EngineError::NotFound(entry.base_name().to_string()))?;
        if !is_newer(&latest.version_number, &entry.version_number) {
            return Ok(None);
        }

        if entry.enabled {
            game.delete_mod_dirs_for(entry.base_name())?;
            self.installer.install(
                &latest.download_url,
                &latest.full_name,
                game,
                profile_id,
                false,
                &self.progress,
            )?;
        }
        let mut updated = InstalledModEntry::from_version(&package, &latest);
        updated.uuid4 = entry.uuid4.clone();
        updated.enabled = entry.enabled;
        store.upsert_mod(profile_id, updated)?;
        info!(from = %entry.full_name, to = %latest.full_name, "updated mod");
        Ok(Some(latest.full_name))
    }

    pub fn sync(
        &self,
        profile: &Profile,
        game: &GameInstallation,
        use_cache: bool,
    ) -> EngineResult<SyncReport> {
        Reconciler::new(self.index.as_ref(), &self.installer).sync(
            profile,
            game,
            use_cache,
            &self.progress,
        )
    }

    fn install_one(
        &self,
        target: &ResolvedPackage,
        game: &GameInstallation,
        profile_id: &str,
        use_cache: bool,
    ) -> EngineResult<InstallOutcome> {
        self.installer.install(
            &target.version.download_url,
            target.full_name(),
            game,
            profile_id,
            use_cache,
            &self.progress,
        )
    }

    fn report_failure(&self, full_name: &str, err: &EngineError) {
        self.progress.emit(ProgressEvent::Failed {
            full_name: full_name.to_string(),
            message: err.to_string(),
        });
    }
}

fn entry_for(target: &ResolvedPackage, enabled: bool) -> InstalledModEntry {
    let mut entry = InstalledModEntry::from_version(&target.package, &target.version);
    entry.enabled = enabled;
    entry
}

/// Unparsable versions never count as newer.
fn is_newer(candidate: &str, current: &str) -> bool {
    match (candidate.parse::<SemVer>(), current.parse::<SemVer>()) {
        (Ok(candidate), Ok(current)) => candidate > current,
        _ => false,
    }
}
