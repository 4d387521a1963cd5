use crate::{
    error::{EngineError, EngineResult},
    package::{strip_version, Package},
    transport::USER_AGENT,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap},
    fs,
    io::{BufReader, BufWriter},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant, SystemTime},
};
use tracing::{debug, info, warn};

const API_ROOT: &str = "https://thunderstore.io";
const LISTING_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    LastUpdated,
    Downloads,
    Rating,
    Name,
    DateCreated,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "last_updated" | "updated" => Some(SortKey::LastUpdated),
            "downloads" => Some(SortKey::Downloads),
            "rating" => Some(SortKey::Rating),
            "name" => Some(SortKey::Name),
            "date_created" | "created" => Some(SortKey::DateCreated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortOptions {
    pub key: SortKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterOptions {
    pub nsfw: bool,
    pub deprecated: bool,
    pub mods: bool,
    pub modpacks: bool,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: usize,
    pub page_size: usize,
    pub search: String,
    pub sort: SortOptions,
    pub filter: FilterOptions,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 20,
            search: String::new(),
            sort: SortOptions::default(),
            filter: FilterOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LookupResult {
    pub found: Vec<Package>,
    pub unknown: Vec<String>,
}

/// One Thunderstore community (a supported game).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub identifier: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct CommunityPage {
    #[serde(default)]
    results: Vec<Community>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    next_link: Option<String>,
}

/// Read side of the community package index.
pub trait PackageIndex: Send + Sync {
    /// Loads the listing for a game. Returns the package count.
    fn fetch_by_game(&self, game_id: &str) -> EngineResult<usize>;
    fn get_page(&self, game_id: &str, query: &PageQuery) -> EngineResult<Vec<Package>>;
    fn get_by_name(&self, game_id: &str, full_name: &str) -> EngineResult<Option<Package>>;
    /// Names may carry a version suffix; it is stripped before matching.
    fn lookup_by_names(&self, game_id: &str, names: &[String]) -> EngineResult<LookupResult>;
    fn available_categories(&self, game_id: &str) -> EngineResult<Vec<String>>;
}

/// One game's package listing with a name index.
#[derive(Debug, Clone, Default)]
pub struct PackageCatalog {
    packages: Vec<Package>,
    by_name: HashMap<String, usize>,
}

impl PackageCatalog {
    pub fn new(packages: Vec<Package>) -> Self {
        let by_name = packages
            .iter()
            .enumerate()
            .map(|(idx, package)| (package.full_name.to_lowercase(), idx))
            .collect();
        Self { packages, by_name }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn get(&self, full_name: &str) -> Option<&Package> {
        let key = strip_version(full_name).to_lowercase();
        self.by_name.get(&key).map(|idx| &self.packages[*idx])
    }

    pub fn lookup(&self, names: &[String]) -> LookupResult {
        let mut result = LookupResult::default();
        for name in names {
            match self.get(name) {
                Some(package) => result.found.push(package.clone()),
                None => result.unknown.push(name.clone()),
            }
        }
        result
    }

    pub fn categories(&self) -> Vec<String> {
        self.packages
            .iter()
            .flat_map(|package| package.categories.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn page(&self, query: &PageQuery) -> Vec<Package> {
        let search = query.search.trim().to_lowercase();
        let mut matches: Vec<&Package> = self
            .packages
            .iter()
            .filter(|package| {
                search.is_empty()
                    || package.name.to_lowercase().contains(&search)
                    || package.full_name.to_lowercase().contains(&search)
            })
            .filter(|package| passes_filter(package, &query.filter))
            .collect();

        sort_packages(&mut matches, query.sort);

        let start = query.page.saturating_mul(query.page_size);
        matches
            .into_iter()
            .skip(start)
            .take(query.page_size)
            .cloned()
            .collect()
    }
}

fn passes_filter(package: &Package, filter: &FilterOptions) -> bool {
    if package.has_nsfw_content && !filter.nsfw {
        return false;
    }
    if package.is_deprecated && !filter.deprecated {
        return false;
    }
    if filter.mods != filter.modpacks {
        let want_modpack = filter.modpacks;
        if package.is_modpack() != want_modpack {
            return false;
        }
    }
    filter.categories.is_empty()
        || filter
            .categories
            .iter()
            .any(|category| package.categories.contains(category))
}

fn sort_packages(packages: &mut [&Package], sort: SortOptions) {
    packages.sort_by(|a, b| {
        let ordering = match sort.key {
            SortKey::LastUpdated => a.date_updated.cmp(&b.date_updated),
            SortKey::DateCreated => a.date_created.cmp(&b.date_created),
            SortKey::Downloads => a.total_downloads().cmp(&b.total_downloads()),
            SortKey::Rating => a.rating_score.cmp(&b.rating_score),
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        };
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

/// Fixed listings keyed by game. Used offline and by tests.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    games: HashMap<String, PackageCatalog>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game(mut self, game_id: &str, packages: Vec<Package>) -> Self {
        self.games
            .insert(game_id.to_string(), PackageCatalog::new(packages));
        self
    }

    fn catalog(&self, game_id: &str) -> EngineResult<&PackageCatalog> {
        self.games
            .get(game_id)
            .ok_or_else(|| EngineError::NotFound(format!("game {game_id}")))
    }
}

impl PackageIndex for MemoryIndex {
    fn fetch_by_game(&self, game_id: &str) -> EngineResult<usize> {
        self.catalog(game_id).map(PackageCatalog::len)
    }

    fn get_page(&self, game_id: &str, query: &PageQuery) -> EngineResult<Vec<Package>> {
        Ok(self.catalog(game_id)?.page(query))
    }

    fn get_by_name(&self, game_id: &str, full_name: &str) -> EngineResult<Option<Package>> {
        Ok(self.catalog(game_id)?.get(full_name).cloned())
    }

    fn lookup_by_names(&self, game_id: &str, names: &[String]) -> EngineResult<LookupResult> {
        Ok(self.catalog(game_id)?.lookup(names))
    }

    fn available_categories(&self, game_id: &str) -> EngineResult<Vec<String>> {
        Ok(self.catalog(game_id)?.categories())
    }
}

/// HTTP client for the public Thunderstore API. Listings are cached on disk for an
/// hour and kept in memory for the process lifetime.
pub struct ThunderstoreIndex {
    agent: ureq::Agent,
    cache_dir: PathBuf,
    games: Mutex<HashMap<String, Arc<PackageCatalog>>>,
}

impl ThunderstoreIndex {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(120))
            .timeout_write(Duration::from_secs(10))
            .build();
        Self {
            agent,
            cache_dir: cache_dir.into(),
            games: Mutex::new(HashMap::new()),
        }
    }

    fn listing_cache_path(&self, game_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{game_id}_packages.json"))
    }

    fn catalog(&self, game_id: &str) -> EngineResult<Arc<PackageCatalog>> {
        if let Some(catalog) = self.cached_catalog(game_id) {
            return Ok(catalog);
        }
        self.fetch_by_game(game_id)?;
        self.cached_catalog(game_id)
            .ok_or_else(|| EngineError::NotFound(format!("game {game_id}")))
    }

    fn cached_catalog(&self, game_id: &str) -> Option<Arc<PackageCatalog>> {
        let games = self.games.lock().ok()?;
        games.get(game_id).cloned()
    }

    fn read_fresh_listing(&self, game_id: &str) -> Option<Vec<Package>> {
        let path = self.listing_cache_path(game_id);
        let modified = fs::metadata(&path).ok()?.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;
        if age >= LISTING_TTL {
            return None;
        }
        let file = fs::File::open(&path).ok()?;
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(packages) => Some(packages),
            Err(err) => {
                warn!(path = ?path, error = %err, "discarding unreadable listing cache");
                None
            }
        }
    }

    fn write_listing(&self, game_id: &str, packages: &[Package]) {
        if let Err(err) = fs::create_dir_all(&self.cache_dir) {
            warn!(error = %err, "failed to create listing cache dir");
            return;
        }
        let path = self.listing_cache_path(game_id);
        let written = fs::File::create(&path)
            .map_err(|err| err.to_string())
            .and_then(|file| {
                serde_json::to_writer(BufWriter::new(file), packages).map_err(|err| err.to_string())
            });
        match written {
            Ok(()) => debug!(path = ?path, "listing cache saved"),
            Err(err) => warn!(path = ?path, error = %err, "failed to write listing cache"),
        }
    }

    fn fetch_listing(&self, game_id: &str) -> EngineResult<Vec<Package>> {
        let url = format!("{API_ROOT}/c/{game_id}/api/v1/package/");
        let started = Instant::now();
        let response = self
            .agent
            .get(&url)
            .set("User-Agent", USER_AGENT)
            .call()
            .map_err(|err| map_ureq_error(&url, err))?;
        let packages: Vec<Package> = response
            .into_json()
            .map_err(|err| EngineError::network(&url, err))?;
        info!(
            game = game_id,
            count = packages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched package listing"
        );
        Ok(packages)
    }

    /// Every community Thunderstore hosts, following `pagination.next_link`.
    pub fn fetch_communities(&self) -> EngineResult<Vec<Community>> {
        let mut next = Some(format!("{API_ROOT}/api/experimental/community/"));
        let mut seen = BTreeSet::new();
        let mut communities = Vec::new();
        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                warn!(url = %url, "community pagination loops, stopping");
                break;
            }
            let page: CommunityPage = self
                .agent
                .get(&url)
                .set("User-Agent", USER_AGENT)
                .call()
                .map_err(|err| map_ureq_error(&url, err))?
                .into_json()
                .map_err(|err| EngineError::network(&url, err))?;
            debug!(url = %url, count = page.results.len(), "fetched community page");
            communities.extend(page.results);
            next = page.pagination.next_link.filter(|link| !link.is_empty());
        }
        info!(count = communities.len(), "fetched communities");
        Ok(communities)
    }

    fn fetch_single(&self, full_name: &str) -> EngineResult<Option<Package>> {
        let base = strip_version(full_name);
        let Some((namespace, name)) = base.split_once('-') else {
            return Ok(None);
        };
        let url = format!("{API_ROOT}/api/v1/package/{namespace}/{name}/");
        match self.agent.get(&url).set("User-Agent", USER_AGENT).call() {
            Ok(response) => response
                .into_json()
                .map(Some)
                .map_err(|err| EngineError::network(&url, err)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(err) => Err(map_ureq_error(&url, err)),
        }
    }
}

impl PackageIndex for ThunderstoreIndex {
    fn fetch_by_game(&self, game_id: &str) -> EngineResult<usize> {
        if let Some(catalog) = self.cached_catalog(game_id) {
            if !catalog.is_empty() {
                return Ok(catalog.len());
            }
        }

        let packages = match self.read_fresh_listing(game_id) {
            Some(packages) => {
                debug!(game = game_id, "serving listing from disk cache");
                packages
            }
            None => {
                let packages = self.fetch_listing(game_id)?;
                self.write_listing(game_id, &packages);
                packages
            }
        };

        let catalog = Arc::new(PackageCatalog::new(packages));
        let count = catalog.len();
        let mut games = self
            .games
            .lock()
            .map_err(|_| EngineError::Persistence("package index lock poisoned".into()))?;
        games.insert(game_id.to_string(), catalog);
        Ok(count)
    }

    fn get_page(&self, game_id: &str, query: &PageQuery) -> EngineResult<Vec<Package>> {
        Ok(self.catalog(game_id)?.page(query))
    }

    fn get_by_name(&self, game_id: &str, full_name: &str) -> EngineResult<Option<Package>> {
        if let Some(package) = self.catalog(game_id)?.get(full_name) {
            return Ok(Some(package.clone()));
        }
        debug!(name = full_name, "listing miss, asking the API");
        self.fetch_single(full_name)
    }

    fn lookup_by_names(&self, game_id: &str, names: &[String]) -> EngineResult<LookupResult> {
        Ok(self.catalog(game_id)?.lookup(names))
    }

    fn available_categories(&self, game_id: &str) -> EngineResult<Vec<String>> {
        Ok(self.catalog(game_id)?.categories())
    }
}

fn map_ureq_error(url: &str, err: ureq::Error) -> EngineError {
    match err {
        ureq::Error::Status(status, _) => EngineError::HttpStatus {
            url: url.to_string(),
            status,
        },
        other => EngineError::network(url, other),
    }
}
