#![allow(dead_code)]

use modforge::{
    archive::ZipExtractor,
    cache::ModCache,
    engine::Engine,
    error::{EngineError, EngineResult},
    game::GameInstallation,
    index::MemoryIndex,
    installer::Installer,
    package::{Package, PackageVersion},
    profile::InstalledModEntry,
    store::{JsonProfileRepository, ProfileStore},
    transport::DownloadTransport,
};
use std::{
    fs,
    io::{Cursor, Write},
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const GAME: &str = "lethal-company";

/// Serves a one-file zip for every URL and counts the requests. URLs containing
/// one of `broken` get a 404 instead.
pub struct StubTransport {
    pub calls: Arc<AtomicUsize>,
    pub broken: Vec<String>,
}

impl DownloadTransport for StubTransport {
    fn download(&self, url: &str) -> EngineResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.iter().any(|part| url.contains(part.as_str())) {
            return Err(EngineError::HttpStatus {
                url: url.to_string(),
                status: 404,
            });
        }
        Ok(zip_bytes(url))
    }
}

pub fn zip_bytes(content: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("plugin.dll", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(content.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

/// `full_name` is `Team-Name`; every package has a single 1.0.0 version.
pub fn package(full_name: &str, deps: &[&str]) -> Package {
    let (owner, name) = full_name.split_once('-').unwrap();
    Package {
        name: name.to_string(),
        full_name: full_name.to_string(),
        owner: owner.to_string(),
        package_url: format!("https://thunderstore.test/{full_name}/"),
        date_created: "2024-01-01T00:00:00Z".into(),
        date_updated: "2024-01-01T00:00:00Z".into(),
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
            dependencies: deps.iter().map(|dep| format!("{dep}-1.0.0")).collect(),
            download_url: format!("https://cdn.test/{full_name}-1.0.0.zip"),
            downloads: 0,
            date_created: String::new(),
            file_size: 0,
            uuid4: String::new(),
        }],
    }
}

/// Adds `version_number` next to the package's existing versions.
pub fn with_version(mut package: Package, version_number: &str) -> Package {
    let mut version = package.versions[0].clone();
    version.full_name = format!("{}-{version_number}", package.full_name);
    version.version_number = version_number.to_string();
    version.download_url = format!("https://cdn.test/{}.zip", version.full_name);
    package.versions.push(version);
    package
}

pub fn entry(base_name: &str) -> InstalledModEntry {
    InstalledModEntry {
        uuid4: format!("id-{base_name}"),
        full_name: format!("{base_name}-1.0.0"),
        version_number: "1.0.0".into(),
        icon_url: None,
        enabled: true,
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub engine: Engine,
    pub store: ProfileStore<JsonProfileRepository>,
    pub game: GameInstallation,
    pub downloads: Arc<AtomicUsize>,
    pub profile_id: String,
}

impl Harness {
    pub fn new(packages: Vec<Package>) -> Self {
        Self::with_broken_downloads(packages, &[])
    }

    /// Downloads whose URL contains one of `broken` fail with a 404.
    pub fn with_broken_downloads(packages: Vec<Package>, broken: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let downloads = Arc::new(AtomicUsize::new(0));
        let installer = Installer::new(
            Box::new(StubTransport {
                calls: downloads.clone(),
                broken: broken.iter().map(|part| part.to_string()).collect(),
            }),
            Box::new(ZipExtractor),
            ModCache::new(dir.path().join("cache")),
            dir.path().join("tmp"),
        );
        let engine = Engine::new(
            Box::new(MemoryIndex::new().with_game(GAME, packages)),
            installer,
        );
        let mut store =
            ProfileStore::load(JsonProfileRepository::new(dir.path().join("profiles.json")))
                .unwrap();
        let profile_id = store.create_profile("test", GAME).unwrap();
        let game = GameInstallation::new(dir.path().join("game"));
        Self {
            dir,
            engine,
            store,
            game,
            downloads,
            profile_id,
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn add(&mut self, base_name: &str) {
        self.store.add_mod(&self.profile_id, entry(base_name)).unwrap();
    }

    pub fn install(&mut self, name: &str) -> modforge::engine::InstallReport {
        self.try_install(name).unwrap()
    }

    pub fn try_install(&mut self, name: &str) -> EngineResult<modforge::engine::InstallReport> {
        let target = self.engine.resolve_package(GAME, name)?;
        self.engine
            .install_with_dependencies(&mut self.store, &self.profile_id, &self.game, target, true)
    }

    pub fn mod_id(&self, base_name: &str) -> String {
        self.store
            .require(&self.profile_id)
            .unwrap()
            .mods
            .iter()
            .find(|entry| entry.base_name() == base_name)
            .unwrap()
            .uuid4
            .clone()
    }

    pub fn profile_mods(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .require(&self.profile_id)
            .unwrap()
            .mods
            .iter()
            .map(|entry| entry.base_name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn installed_dirs(&self) -> Vec<String> {
        self.game.list_installed_mod_names().unwrap()
    }

    pub fn plant_dir(&self, name: &str) {
        let dir = self.game.mod_dir(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("plugin.dll"), name).unwrap();
    }
}

pub fn read_plugin(dir: &Path) -> String {
    fs::read_to_string(dir.join("plugin.dll")).unwrap()
}
