use crate::{
    archive::ArchiveExtractor,
    cache::{copy_dir, ModCache},
    error::{EngineError, EngineResult},
    game::GameInstallation,
    package::strip_version,
    progress::{InstallStage, ProgressEvent, ProgressSink},
    transport::DownloadTransport,
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};
use tracing::{debug, warn};

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallSource {
    Cache,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub full_name: String,
    pub mod_dir: PathBuf,
    pub source: InstallSource,
}

/// Removes a temporary file or directory on drop unless disarmed.
struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.path.is_dir() {
            let _ = fs::remove_dir_all(&self.path);
        } else {
            let _ = fs::remove_file(&self.path);
        }
    }
}

pub struct Installer {
    transport: Box<dyn DownloadTransport>,
    extractor: Box<dyn ArchiveExtractor>,
    cache: ModCache,
    temp_dir: PathBuf,
}

impl Installer {
    pub fn new(
        transport: Box<dyn DownloadTransport>,
        extractor: Box<dyn ArchiveExtractor>,
        cache: ModCache,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            extractor,
            cache,
            temp_dir: temp_dir.into(),
        }
    }

    pub fn cache(&self) -> &ModCache {
        &self.cache
    }

    /// Installs `full_name` into its mod directory under the game's plugin dir.
    ///
    /// With `use_cache` a cached payload is copied without touching the network;
    /// a fresh download is cached afterwards. The mod directory is only replaced
    /// once extraction has succeeded.
    pub fn install(
        &self,
        download_url: &str,
        full_name: &str,
        game: &GameInstallation,
        profile_id: &str,
        use_cache: bool,
        progress: &ProgressSink,
    ) -> EngineResult<InstallOutcome> {
        let mod_dir = game.mod_dir(strip_version(full_name));

        if use_cache {
            progress.stage(full_name, InstallStage::CopyingFromCache);
            if self.cache.copy_from(profile_id, full_name, &mod_dir)? {
                progress.emit(ProgressEvent::Installed {
                    full_name: full_name.to_string(),
                    from_cache: true,
                });
                return Ok(InstallOutcome {
                    full_name: full_name.to_string(),
                    mod_dir,
                    source: InstallSource::Cache,
                });
            }
        }

        progress.stage(full_name, InstallStage::Downloading);
        let bytes = self.transport.download(download_url)?;
        debug!(mod_name = full_name, bytes = bytes.len(), "download complete");

        fs::create_dir_all(&self.temp_dir).map_err(|err| EngineError::fs(&self.temp_dir, err))?;
        let label = sanitize_label(full_name);
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let archive_path = self
            .temp_dir
            .join(format!("{label}-{}-{counter}.zip", std::process::id()));
        let _archive_guard = TempGuard::new(archive_path.clone());
        fs::write(&archive_path, &bytes).map_err(|err| EngineError::fs(&archive_path, err))?;

        progress.stage(full_name, InstallStage::Extracting);
        let staging = self
            .temp_dir
            .join(format!("{label}-{}-{counter}.d", std::process::id()));
        let mut staging_guard = TempGuard::new(staging.clone());
        self.extractor.extract(&archive_path, &staging)?;
        place_dir(&staging, &mod_dir)?;
        staging_guard.disarm();

        if use_cache {
            progress.stage(full_name, InstallStage::Caching);
            if let Err(err) = self.cache.store(profile_id, full_name, &mod_dir) {
                warn!(mod_name = full_name, error = %err, "failed to cache payload");
            }
        }

        progress.emit(ProgressEvent::Installed {
            full_name: full_name.to_string(),
            from_cache: false,
        });
        Ok(InstallOutcome {
            full_name: full_name.to_string(),
            mod_dir,
            source: InstallSource::Download,
        })
    }
}

/// Moves a finished staging dir into place, replacing `dest`. Falls back to a
/// copy when the rename crosses filesystems.
fn place_dir(staging: &Path, dest: &Path) -> EngineResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|err| EngineError::fs(parent, err))?;
    }
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|err| EngineError::fs(dest, err))?;
    }
    if fs::rename(staging, dest).is_ok() {
        return Ok(());
    }
    let copied = copy_dir(staging, dest);
    let _ = fs::remove_dir_all(staging);
    if copied.is_err() {
        let _ = fs::remove_dir_all(dest);
    }
    copied
}

fn sanitize_label(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ZipExtractor;
    use std::{
        io::{Cursor, Write},
        sync::Arc,
    };
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    struct CountingTransport {
        calls: Arc<AtomicUsize>,
        body: Vec<u8>,
    }

    impl DownloadTransport for CountingTransport {
        fn download(&self, _url: &str) -> EngineResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    struct FailingTransport;

    impl DownloadTransport for FailingTransport {
        fn download(&self, url: &str) -> EngineResult<Vec<u8>> {
            Err(EngineError::RedirectLimitExceeded(url.to_string()))
        }
    }

    fn zip_bytes() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("plugins/Mod.dll", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"payload").unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn installer(root: &Path, transport: Box<dyn DownloadTransport>) -> Installer {
        Installer::new(
            transport,
            Box::new(ZipExtractor),
            ModCache::new(root.join("cache")),
            root.join("tmp"),
        )
    }

    #[test]
    fn download_then_cache_fast_path() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let installer = installer(
            dir.path(),
            Box::new(CountingTransport {
                calls: calls.clone(),
                body: zip_bytes(),
            }),
        );
        let game = GameInstallation::new(dir.path().join("game"));
        let sink = ProgressSink::silent();

        let first = installer
            .install("https://x/a.zip", "Team-Mod-1.0.0", &game, "p1", true, &sink)
            .unwrap();
        assert_eq!(first.source, InstallSource::Download);
        assert_eq!(first.mod_dir, game.mod_dir("Team-Mod"));
        assert!(game.mod_dir("Team-Mod").join("plugins/Mod.dll").is_file());
        assert!(installer.cache().has("p1", "Team-Mod-1.0.0"));

        game.delete_mod_dir("Team-Mod").unwrap();
        let second = installer
            .install("https://x/a.zip", "Team-Mod-1.0.0", &game, "p1", true, &sink)
            .unwrap();
        assert_eq!(second.source, InstallSource::Cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(game.mod_dir("Team-Mod").join("plugins/Mod.dll").is_file());

        let leftovers = fs::read_dir(dir.path().join("tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn no_cache_mode_skips_cache() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let installer = installer(
            dir.path(),
            Box::new(CountingTransport {
                calls: calls.clone(),
                body: zip_bytes(),
            }),
        );
        let game = GameInstallation::new(dir.path().join("game"));
        installer
            .install("u", "Team-Mod-1.0.0", &game, "p1", false, &ProgressSink::silent())
            .unwrap();
        assert!(!installer.cache().has("p1", "Team-Mod-1.0.0"));
    }

    #[test]
    fn failures_leave_no_mod_dir() {
        let dir = TempDir::new().unwrap();
        let game = GameInstallation::new(dir.path().join("game"));
        let sink = ProgressSink::silent();

        let redirect = installer(dir.path(), Box::new(FailingTransport));
        let err = redirect
            .install("u", "Team-Mod-1.0.0", &game, "p1", true, &sink)
            .unwrap_err();
        assert!(matches!(err, EngineError::RedirectLimitExceeded(_)));
        assert!(!game.has_mod("Team-Mod"));

        let corrupt = installer(
            dir.path(),
            Box::new(CountingTransport {
                calls: Arc::new(AtomicUsize::new(0)),
                body: b"garbage".to_vec(),
            }),
        );
        let err = corrupt
            .install("u", "Team-Mod-1.0.0", &game, "p1", true, &sink)
            .unwrap_err();
        assert!(matches!(err, EngineError::Extraction { .. }));
        assert!(!game.has_mod("Team-Mod"));
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }
}
