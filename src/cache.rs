use crate::error::{EngineError, EngineResult};
use filetime::{set_file_mtime, FileTime};
use serde::Serialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::UNIX_EPOCH,
};
use tracing::debug;
use walkdir::WalkDir;

static STAGE_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheClearReport {
    pub cleared: usize,
    pub bytes_freed: u64,
}

/// Extracted payloads laid out as `<root>/<profile id>/<full name>/`.
#[derive(Debug, Clone)]
pub struct ModCache {
    root: PathBuf,
}

impl ModCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_dir(&self, profile_id: &str, full_name: &str) -> PathBuf {
        self.root.join(profile_id).join(full_name)
    }

    pub fn has(&self, profile_id: &str, full_name: &str) -> bool {
        self.entry_dir(profile_id, full_name).is_dir()
    }

    pub fn entries(&self, profile_id: &str) -> Vec<String> {
        let Ok(read) = fs::read_dir(self.root.join(profile_id)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = read
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    /// Copies a cached payload into `dest`, replacing whatever is there.
    /// Returns false on a cache miss.
    pub fn copy_from(&self, profile_id: &str, full_name: &str, dest: &Path) -> EngineResult<bool> {
        let source = self.entry_dir(profile_id, full_name);
        if !source.is_dir() {
            return Ok(false);
        }
        replace_dir(&source, dest)?;
        debug!(profile = profile_id, mod_name = full_name, "restored from cache");
        Ok(true)
    }

    /// Stores a copy of `source`. The entry only becomes visible once complete.
    pub fn store(&self, profile_id: &str, full_name: &str, source: &Path) -> EngineResult<()> {
        let target = self.entry_dir(profile_id, full_name);
        let parent = self.root.join(profile_id);
        fs::create_dir_all(&parent).map_err(|err| EngineError::fs(&parent, err))?;

        let counter = STAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let staging = parent.join(format!(".stage-{}-{counter}", std::process::id()));
        if let Err(err) = copy_dir(source, &staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }
        if target.exists() {
            fs::remove_dir_all(&target).map_err(|err| EngineError::fs(&target, err))?;
        }
        fs::rename(&staging, &target).map_err(|err| {
            let _ = fs::remove_dir_all(&staging);
            EngineError::fs(&target, err)
        })?;
        debug!(profile = profile_id, mod_name = full_name, "stored in cache");
        Ok(())
    }

    pub fn remove_profile(&self, profile_id: &str) -> EngineResult<bool> {
        let dir = self.root.join(profile_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(EngineError::fs(dir, err)),
        }
    }

    /// Removes every cached payload for every profile.
    pub fn clear_all(&self) -> EngineResult<CacheClearReport> {
        let mut report = CacheClearReport::default();
        let profiles = match fs::read_dir(&self.root) {
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(err) => return Err(EngineError::fs(&self.root, err)),
        };
        for profile in profiles.filter_map(Result::ok) {
            let path = profile.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(profile_id) = path.file_name().and_then(|name| name.to_str()) {
                report.cleared += self.entries(profile_id).len();
            }
            report.bytes_freed += dir_size(&path);
            fs::remove_dir_all(&path).map_err(|err| EngineError::fs(&path, err))?;
        }
        Ok(report)
    }
}

pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Removes `dest` if present, then copies `source` into it.
pub(crate) fn replace_dir(source: &Path, dest: &Path) -> EngineResult<()> {
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|err| EngineError::fs(dest, err))?;
    }
    copy_dir(source, dest)
}

pub(crate) fn copy_dir(source: &Path, dest: &Path) -> EngineResult<()> {
    fs::create_dir_all(dest).map_err(|err| EngineError::fs(dest, err))?;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(source).to_path_buf();
            EngineError::fs(path, io::Error::new(io::ErrorKind::Other, err.to_string()))
        })?;
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| EngineError::fs(&target, err))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|err| EngineError::fs(parent, err))?;
            }
            fs::copy(entry.path(), &target).map_err(|err| EngineError::fs(&target, err))?;
            preserve_mtime(entry.path(), &target);
        }
    }
    Ok(())
}

fn preserve_mtime(source: &Path, dest: &Path) {
    let Ok(meta) = fs::metadata(source) else {
        return;
    };
    let Ok(modified) = meta.modified() else {
        return;
    };
    let Ok(duration) = modified.duration_since(UNIX_EPOCH) else {
        return;
    };
    let mtime = FileTime::from_unix_time(duration.as_secs() as i64, 0);
    let _ = set_file_mtime(dest, mtime);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(dir: &Path) -> PathBuf {
        let source = dir.join("payload");
        fs::create_dir_all(source.join("sub")).unwrap();
        fs::write(source.join("plugin.dll"), b"0123456789").unwrap();
        fs::write(source.join("sub/config.cfg"), b"abc").unwrap();
        source
    }

    #[test]
    fn store_then_copy_from() {
        let dir = TempDir::new().unwrap();
        let cache = ModCache::new(dir.path().join("cache"));
        let source = payload(dir.path());

        assert!(!cache.has("p1", "Team-Mod-1.0.0"));
        let dest = dir.path().join("game/Team-Mod");
        assert!(!cache.copy_from("p1", "Team-Mod-1.0.0", &dest).unwrap());

        cache.store("p1", "Team-Mod-1.0.0", &source).unwrap();
        assert!(cache.has("p1", "Team-Mod-1.0.0"));
        assert_eq!(cache.entries("p1"), vec!["Team-Mod-1.0.0".to_string()]);

        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), b"old").unwrap();
        assert!(cache.copy_from("p1", "Team-Mod-1.0.0", &dest).unwrap());
        assert!(dest.join("sub/config.cfg").is_file());
        assert!(!dest.join("stale.txt").exists());
    }

    #[test]
    fn clear_all_reports_entries_and_bytes() {
        let dir = TempDir::new().unwrap();
        let cache = ModCache::new(dir.path().join("cache"));
        let source = payload(dir.path());
        cache.store("p1", "A-One-1.0.0", &source).unwrap();
        cache.store("p2", "B-Two-1.0.0", &source).unwrap();

        let report = cache.clear_all().unwrap();
        assert_eq!(report.cleared, 2);
        assert_eq!(report.bytes_freed, 26);
        assert!(!cache.has("p1", "A-One-1.0.0"));
        assert_eq!(cache.clear_all().unwrap(), CacheClearReport::default());
    }

    #[test]
    fn remove_profile_only_touches_that_profile() {
        let dir = TempDir::new().unwrap();
        let cache = ModCache::new(dir.path().join("cache"));
        let source = payload(dir.path());
        cache.store("p1", "A-One-1.0.0", &source).unwrap();
        cache.store("p2", "A-One-1.0.0", &source).unwrap();
        assert!(cache.remove_profile("p1").unwrap());
        assert!(!cache.remove_profile("p1").unwrap());
        assert!(cache.has("p2", "A-One-1.0.0"));
    }
}
