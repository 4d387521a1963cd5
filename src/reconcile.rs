use crate::{
    error::{EngineError, EngineResult, ItemFailure},
    game::GameInstallation,
    index::PackageIndex,
    installer::{InstallSource, Installer},
    package::strip_version,
    profile::{InstalledModEntry, Profile},
    progress::{ProgressEvent, ProgressSink},
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Declared-vs-physical difference for one profile and game installation.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Plugin directories with no enabled profile entry.
    pub to_remove: Vec<String>,
    pub to_install: Vec<InstalledModEntry>,
    /// Enabled entries whose directory is already present. Versions are not compared.
    pub already_installed: Vec<InstalledModEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub removed: usize,
    pub to_install: Vec<String>,
    pub installed: Vec<String>,
    pub already_installed: usize,
    pub cached: usize,
    pub failures: Vec<ItemFailure>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.removed == 0 && self.to_install.is_empty() && self.cached == 0
    }

    pub fn summary(&self) -> String {
        if self.is_noop() && self.failures.is_empty() {
            return format!(
                "Nothing to do: {} mod(s) already in sync",
                self.already_installed
            );
        }
        let mut summary = format!(
            "Removed {}, installed {}/{}, cached {}, unchanged {}",
            self.removed,
            self.installed.len(),
            self.to_install.len(),
            self.cached,
            self.already_installed
        );
        if !self.failures.is_empty() {
            let names: Vec<&str> = self
                .failures
                .iter()
                .map(|failure| failure.full_name.as_str())
                .collect();
            summary.push_str(&format!(", failed: [{}]", names.join(", ")));
        }
        summary
    }
}

/// Computes the diff. Directory names carrying a version suffix are matched by
/// their `namespace-name`.
pub fn plan(profile: &Profile, game: &GameInstallation) -> EngineResult<SyncPlan> {
    let physical = game.list_installed_mod_names()?;
    let present: HashSet<&str> = physical.iter().map(|name| strip_version(name)).collect();
    let enabled: HashMap<&str, &InstalledModEntry> = profile
        .enabled_mods()
        .map(|entry| (entry.base_name(), entry))
        .collect();

    let mut plan = SyncPlan::default();
    for name in &physical {
        if !enabled.contains_key(strip_version(name)) {
            plan.to_remove.push(name.clone());
        }
    }
    let mut seen = HashSet::new();
    for entry in profile.enabled_mods() {
        if !seen.insert(entry.base_name()) {
            continue;
        }
        if present.contains(entry.base_name()) {
            plan.already_installed.push(entry.clone());
        } else {
            plan.to_install.push(entry.clone());
        }
    }
    Ok(plan)
}

pub struct Reconciler<'a> {
    index: &'a dyn PackageIndex,
    installer: &'a Installer,
}

impl<'a> Reconciler<'a> {
    pub fn new(index: &'a dyn PackageIndex, installer: &'a Installer) -> Self {
        Self { index, installer }
    }

    /// Converges the plugin directory on the profile's enabled mods. All removals
    /// finish before the first install. Per-mod failures land in the report.
    pub fn sync(
        &self,
        profile: &Profile,
        game: &GameInstallation,
        use_legacy_cache: bool,
        progress: &ProgressSink,
    ) -> EngineResult<SyncReport> {
        let plan = plan(profile, game)?;
        let mut report = SyncReport {
            to_install: plan
                .to_install
                .iter()
                .map(|entry| entry.full_name.clone())
                .collect(),
            already_installed: plan.already_installed.len(),
            ..SyncReport::default()
        };

        for name in &plan.to_remove {
            match game.delete_mod_dir(name) {
                Ok(_) => {
                    report.removed += 1;
                    progress.emit(ProgressEvent::Removed { name: name.clone() });
                }
                Err(err) => {
                    warn!(mod_name = %name, error = %err, "failed to remove stale mod");
                    report.failures.push(ItemFailure::new(name.clone(), &err));
                }
            }
        }

        for entry in &plan.to_install {
            match self.install_entry(profile, entry, game, use_legacy_cache, progress) {
                Ok(_) => report.installed.push(entry.full_name.clone()),
                Err(err) => {
                    warn!(mod_name = %entry.full_name, error = %err, "sync install failed");
                    progress.emit(ProgressEvent::Failed {
                        full_name: entry.full_name.clone(),
                        message: err.to_string(),
                    });
                    report.failures.push(ItemFailure::new(entry.full_name.clone(), &err));
                }
            }
        }

        if use_legacy_cache {
            let cache = self.installer.cache();
            for entry in &plan.already_installed {
                if cache.has(&profile.id, &entry.full_name) {
                    continue;
                }
                let source = match game.find_mod_dir(entry.base_name()) {
                    Ok(Some(name)) => game.mod_dir(&name),
                    Ok(None) => continue,
                    Err(err) => {
                        warn!(mod_name = %entry.full_name, error = %err, "failed to locate installed mod");
                        continue;
                    }
                };
                match cache.store(&profile.id, &entry.full_name, &source) {
                    Ok(()) => report.cached += 1,
                    Err(err) => {
                        warn!(mod_name = %entry.full_name, error = %err, "failed to cache installed mod")
                    }
                }
            }
        }

        info!(profile = %profile.name, "{}", report.summary());
        Ok(report)
    }

    fn install_entry(
        &self,
        profile: &Profile,
        entry: &InstalledModEntry,
        game: &GameInstallation,
        use_cache: bool,
        progress: &ProgressSink,
    ) -> EngineResult<InstallSource> {
        if use_cache && self.installer.cache().has(&profile.id, &entry.full_name) {
            let outcome = self
                .installer
                .install("", &entry.full_name, game, &profile.id, true, progress)?;
            return Ok(outcome.source);
        }

        let package = self
            .index
            .get_by_name(&profile.game_identifier, entry.base_name())?
            .ok_or_else(|| EngineError::NotFound(entry.base_name().to_string()))?;
        let version = match package.version(&entry.version_number) {
            Some(version) => version,
            None => {
                warn!(
                    mod_name = %entry.full_name,
                    "declared version missing from index, using latest"
                );
                package
                    .latest()
                    .ok_or_else(|| EngineError::NotFound(entry.full_name.clone()))?
            }
        };
        let outcome = self.installer.install(
            &version.download_url,
            &entry.full_name,
            game,
            &profile.id,
            use_cache,
            progress,
        )?;
        Ok(outcome.source)
    }
}
