use crate::{
    archive::ZipExtractor,
    cache::ModCache,
    config::AppConfig,
    engine::Engine,
    error::EngineError,
    game,
    index::{PageQuery, SortDirection, SortKey, ThunderstoreIndex},
    installer::Installer,
    logging::{self, Verbosity},
    orphans::RemovalChoice,
    profile::Profile,
    progress::{ProgressEvent, ProgressSink},
    share::ShareClient,
    store::{JsonProfileRepository, ProfileStore},
    transfer,
    transport::HttpTransport,
};
use anyhow::{anyhow, bail, Context as _, Result};
use serde::Serialize;
use std::{
    path::PathBuf,
    sync::mpsc::Receiver,
    thread::{self, JoinHandle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct GlobalOptions {
    format: OutputFormat,
    profile: Option<String>,
    verbosity: Verbosity,
}

#[derive(Debug, PartialEq, Eq)]
enum ImportSource {
    File(PathBuf),
    Code(String),
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    ProfilesList,
    ProfilesCreate { name: String, game: String },
    ProfilesDelete(String),
    ProfilesSelect(String),
    ModsList,
    Install(String),
    Uninstall { query: String, choice: RemovalChoice },
    Toggle(String),
    Sync { use_cache: bool },
    Outdated,
    Update(String),
    Search { game: String, query: PageQuery },
    Import { source: ImportSource, game: Option<String> },
    Export(PathBuf),
    Share,
    CacheClear,
    GamesList { remote: bool },
    GamesSetPath { game: String, path: PathBuf },
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args);
    let command = parse_command(&tokens)?;
    match command {
        CliCommand::Help => {
            print_help();
            return Ok(());
        }
        CliCommand::Version => {
            println!("modforge v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    logging::init(global.verbosity);
    let (sink, events) = ProgressSink::channel();
    let printer = (global.format == OutputFormat::Text && global.verbosity != Verbosity::Quiet)
        .then(|| spawn_progress_printer(events));

    let result = {
        let mut context = Context::open(sink)?;
        context.run(command, &global)
    };
    if let Some(printer) = printer {
        let _ = printer.join();
    }
    result
}

fn parse_global_options(args: &[String]) -> (GlobalOptions, Vec<String>) {
    let mut format = OutputFormat::Text;
    let mut profile = None;
    let mut verbosity = Verbosity::Normal;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            if let Some(parsed) = OutputFormat::parse(value) {
                format = parsed;
            }
            continue;
        }
        if arg == "--format" {
            if let Some(parsed) = iter.next().and_then(|value| OutputFormat::parse(value)) {
                format = parsed;
            }
            continue;
        }
        if let Some(value) = arg.strip_prefix("--profile=") {
            profile = Some(value.to_string());
            continue;
        }
        if arg == "--profile" {
            if let Some(value) = iter.next() {
                profile = Some(value.to_string());
            }
            continue;
        }
        match arg.as_str() {
            "-q" | "--quiet" => verbosity = Verbosity::Quiet,
            "--verbose" => verbosity = Verbosity::Verbose,
            _ if arg.starts_with("-v") && !arg.starts_with("--") => {
                let count = arg.chars().filter(|ch| *ch == 'v').count();
                verbosity = if count >= 2 {
                    Verbosity::Debug
                } else {
                    Verbosity::Verbose
                };
            }
            _ => tokens.push(arg.to_string()),
        }
    }

    (
        GlobalOptions {
            format,
            profile,
            verbosity,
        },
        tokens,
    )
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let arg = |index: usize, what: &str| -> Result<String> {
        tokens
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("missing {what}"))
    };
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    let command = match head.as_str() {
        "--help" | "-h" | "help" => CliCommand::Help,
        "--version" | "-V" | "version" => CliCommand::Version,
        "profiles" => match tokens.get(1).map(|value| value.as_str()).unwrap_or("list") {
            "list" => CliCommand::ProfilesList,
            "create" => CliCommand::ProfilesCreate {
                name: arg(2, "profile name")?,
                game: arg(3, "game identifier")?,
            },
            "delete" => CliCommand::ProfilesDelete(arg(2, "profile id")?),
            "select" => CliCommand::ProfilesSelect(arg(2, "profile id")?),
            other => bail!("Unknown profiles command: {other} (use 'list', 'create', 'delete', or 'select')"),
        },
        "mods" => CliCommand::ModsList,
        "install" => CliCommand::Install(arg(1, "package name")?),
        "uninstall" => {
            let mut choice = RemovalChoice::ModOnly;
            for flag in tokens.iter().skip(2) {
                match flag.as_str() {
                    "--orphans" => choice = RemovalChoice::WithOrphans,
                    "--all-deps" => choice = RemovalChoice::WithAllDependencies,
                    other => bail!("Unknown uninstall option: {other}"),
                }
            }
            CliCommand::Uninstall {
                query: arg(1, "mod")?,
                choice,
            }
        }
        "toggle" => CliCommand::Toggle(arg(1, "mod")?),
        "sync" => CliCommand::Sync {
            use_cache: !tokens.iter().any(|token| token == "--no-cache"),
        },
        "outdated" => CliCommand::Outdated,
        "update" => CliCommand::Update(arg(1, "mod")?),
        "search" => CliCommand::Search {
            game: arg(1, "game identifier")?,
            query: parse_search(tokens.get(2..).unwrap_or(&[]))?,
        },
        "import" => match tokens.get(1).map(|value| value.as_str()) {
            Some("--code") => CliCommand::Import {
                source: ImportSource::Code(arg(2, "share code")?),
                game: tokens.get(3).cloned(),
            },
            _ => CliCommand::Import {
                source: ImportSource::File(PathBuf::from(arg(1, "export file")?)),
                game: tokens.get(2).cloned(),
            },
        },
        "export" => CliCommand::Export(PathBuf::from(arg(1, "export file")?)),
        "share" => CliCommand::Share,
        "cache" => match tokens.get(1).map(|value| value.as_str()) {
            Some("clear") => CliCommand::CacheClear,
            _ => bail!("Unknown cache command (use 'clear')"),
        },
        "games" => match tokens.get(1).map(|value| value.as_str()).unwrap_or("list") {
            "list" => CliCommand::GamesList {
                remote: tokens.iter().any(|token| token == "--remote"),
            },
            "set-path" => CliCommand::GamesSetPath {
                game: arg(2, "game identifier")?,
                path: PathBuf::from(arg(3, "game path")?),
            },
            other => bail!("Unknown games command: {other} (use 'list' or 'set-path')"),
        },
        other => bail!("Unknown command: {other} (see 'modforge help')"),
    };
    Ok(command)
}

fn parse_search(args: &[String]) -> Result<PageQuery> {
    let mut query = PageQuery::default();
    let mut words = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--page" => {
                let value = iter.next().context("--page requires a value")?;
                let page: usize = value.parse().context("parse page number")?;
                query.page = page.saturating_sub(1);
            }
            "--sort" => {
                let value = iter.next().context("--sort requires a value")?;
                query.sort.key =
                    SortKey::parse(value).ok_or_else(|| anyhow!("Unknown sort key: {value}"))?;
            }
            "--asc" => query.sort.direction = SortDirection::Asc,
            "--nsfw" => query.filter.nsfw = true,
            "--deprecated" => query.filter.deprecated = true,
            "--modpacks" => query.filter.modpacks = true,
            "--mods" => query.filter.mods = true,
            "--category" => {
                let value = iter.next().context("--category requires a value")?;
                query.filter.categories.push(value.to_string());
            }
            _ => words.push(arg.as_str()),
        }
    }
    query.search = words.join(" ");
    Ok(query)
}

struct Context {
    config: AppConfig,
    store: ProfileStore<JsonProfileRepository>,
    engine: Engine,
}

impl Context {
    fn open(progress: ProgressSink) -> Result<Self> {
        let config = AppConfig::load_or_create()?;
        let mut store = ProfileStore::load(JsonProfileRepository::new(config.profiles_path()))
            .context("load profiles")?;
        if let Some(active) = config.active_profile.as_deref() {
            if store.select_profile(active).is_err() {
                tracing::warn!(profile = active, "configured profile no longer exists");
            }
        }
        let installer = Installer::new(
            Box::new(HttpTransport::new()),
            Box::new(ZipExtractor),
            ModCache::new(config.cache_dir()),
            config.temp_dir(),
        );
        let engine = Engine::new(
            Box::new(ThunderstoreIndex::new(config.index_cache_dir())),
            installer,
        )
        .with_progress(progress);
        Ok(Self {
            config,
            store,
            engine,
        })
    }

    /// `--profile` accepts an id or a name; otherwise the selected profile.
    fn profile(&self, global: &GlobalOptions) -> Result<Profile> {
        if let Some(wanted) = global.profile.as_deref() {
            return self
                .store
                .profiles()
                .iter()
                .find(|profile| profile.id == wanted || profile.name == wanted)
                .cloned()
                .ok_or_else(|| EngineError::UnknownProfile(wanted.to_string()).into());
        }
        Ok(self.store.active_profile()?.clone())
    }

    fn select(&mut self, profile_id: Option<String>) -> Result<()> {
        self.config.active_profile = profile_id;
        self.config.save()
    }

    fn run(&mut self, command: CliCommand, global: &GlobalOptions) -> Result<()> {
        let format = global.format;
        match command {
            CliCommand::ProfilesList => {
                let active = self.store.active_profile_id().map(str::to_string);
                let items: Vec<ProfileListItem> = self
                    .store
                    .profiles()
                    .iter()
                    .map(|profile| ProfileListItem {
                        id: profile.id.clone(),
                        name: profile.name.clone(),
                        game: profile.game_identifier.clone(),
                        mods: profile.mods.len(),
                        active: active.as_deref() == Some(profile.id.as_str()),
                    })
                    .collect();
                emit(format, &items, |items| {
                    for item in items {
                        let marker = if item.active { "*" } else { " " };
                        println!(
                            "{marker} {id}  {name} ({game}, {mods} mods)",
                            id = item.id,
                            name = item.name,
                            game = item.game,
                            mods = item.mods
                        );
                    }
                })
            }
            CliCommand::ProfilesCreate { name, game } => {
                if game::known_game(&game).is_none() {
                    tracing::warn!(game = %game, "game identifier not in the known games table");
                }
                let id = self.store.create_profile(&name, &game)?;
                self.select(Some(id.clone()))?;
                emit(format, &id, |id| println!("Created profile {name} ({id})"))
            }
            CliCommand::ProfilesDelete(id) => {
                let cache = self.engine.installer().cache().clone();
                self.store.delete_profile(&id, Some(&cache))?;
                if self.config.active_profile.as_deref() == Some(id.as_str()) {
                    self.select(None)?;
                }
                emit(format, &id, |id| println!("Deleted profile {id}"))
            }
            CliCommand::ProfilesSelect(id) => {
                self.store.select_profile(&id)?;
                self.select(Some(id.clone()))?;
                emit(format, &id, |id| println!("Selected profile {id}"))
            }
            CliCommand::ModsList => {
                let profile = self.profile(global)?;
                emit(format, &profile.mods, |mods| {
                    for entry in mods {
                        let enabled = if entry.enabled { "x" } else { " " };
                        println!(
                            "[{enabled}] {name:<40} {version:<10} {id}",
                            name = entry.base_name(),
                            version = entry.version_number,
                            id = entry.uuid4
                        );
                    }
                })
            }
            CliCommand::Install(specifier) => {
                let profile = self.profile(global)?;
                let installation = self.config.installation(&profile.game_identifier)?;
                let target = self
                    .engine
                    .resolve_package(&profile.game_identifier, &specifier)?;
                let report = self.engine.install_with_dependencies(
                    &mut self.store,
                    &profile.id,
                    &installation,
                    target,
                    self.config.use_cache,
                )?;
                emit(format, &report, |report| {
                    if report.already_installed {
                        println!("{} is already installed", report.root);
                        return;
                    }
                    println!("Installed {}", report.installed.join(", "));
                    for name in &report.unknown {
                        println!("Warning: dependency {name} not found");
                    }
                    for failure in &report.failures {
                        println!("Failed: {} ({})", failure.full_name, failure.message);
                    }
                })
            }
            CliCommand::Uninstall { query, choice } => {
                let profile = self.profile(global)?;
                let installation = self.config.installation(&profile.game_identifier)?;
                let mod_id = find_mod_id(&profile, &query)?;
                if choice == RemovalChoice::ModOnly && format == OutputFormat::Text {
                    let plan = self.engine.removal_plan(&profile, &mod_id)?;
                    if !plan.orphans.is_empty() {
                        let names: Vec<&str> =
                            plan.orphans.iter().map(|entry| entry.base_name()).collect();
                        println!(
                            "Leaving dependencies nothing else needs: {} (use --orphans to remove)",
                            names.join(", ")
                        );
                    }
                }
                let report = self.engine.uninstall(
                    &mut self.store,
                    &profile.id,
                    &installation,
                    &mod_id,
                    choice,
                )?;
                emit(format, &report, |report| {
                    println!("Removed {}", report.removed.join(", "))
                })
            }
            CliCommand::Toggle(query) => {
                let profile = self.profile(global)?;
                let mod_id = find_mod_id(&profile, &query)?;
                let enabled = self.store.toggle_mod(&profile.id, &mod_id)?;
                emit(format, &enabled, |enabled| {
                    let state = if *enabled { "enabled" } else { "disabled" };
                    println!("{query} {state} (run 'modforge sync' to apply)");
                })
            }
            CliCommand::Sync { use_cache } => {
                let profile = self.profile(global)?;
                let installation = self.config.installation(&profile.game_identifier)?;
                let report = self
                    .engine
                    .sync(&profile, &installation, use_cache && self.config.use_cache)?;
                emit(format, &report, |report| println!("{}", report.summary()))
            }
            CliCommand::Outdated => {
                let profile = self.profile(global)?;
                let outdated = self.engine.outdated(&profile)?;
                emit(format, &outdated, |outdated| {
                    if outdated.is_empty() {
                        println!("All mods are up to date");
                    }
                    for item in outdated {
                        println!("{} {} -> {}", item.name, item.current, item.latest);
                    }
                })
            }
            CliCommand::Update(query) => {
                let profile = self.profile(global)?;
                let installation = self.config.installation(&profile.game_identifier)?;
                let mod_id = find_mod_id(&profile, &query)?;
                let updated =
                    self.engine
                        .update_mod(&mut self.store, &profile.id, &installation, &mod_id)?;
                emit(format, &updated, |updated| match updated {
                    Some(name) => println!("Updated to {name}"),
                    None => println!("{query} is up to date"),
                })
            }
            CliCommand::Search { game, query } => {
                let packages = self.engine.index().get_page(&game, &query)?;
                let items: Vec<SearchItem> = packages
                    .iter()
                    .map(|package| SearchItem {
                        name: package.full_name.clone(),
                        version: package
                            .latest()
                            .map(|version| version.version_number.clone())
                            .unwrap_or_default(),
                        downloads: package.total_downloads(),
                        rating: package.rating_score,
                        description: package
                            .latest()
                            .map(|version| version.description.clone())
                            .unwrap_or_default(),
                    })
                    .collect();
                emit(format, &items, |items| {
                    for item in items {
                        println!(
                            "{name:<40} {version:<10} {downloads:>10} {rating:>5}  {description}",
                            name = item.name,
                            version = item.version,
                            downloads = item.downloads,
                            rating = item.rating,
                            description = item.description
                        );
                    }
                })
            }
            CliCommand::Import { source, game } => {
                let export = match source {
                    ImportSource::File(path) => transfer::read_export(&path)?,
                    ImportSource::Code(code) => ShareClient::new().fetch_export(&code)?,
                };
                let game_id = match game {
                    Some(game) => game,
                    None => self.profile(global)?.game_identifier,
                };
                let installation = self.config.installation(&game_id)?;
                let report = self.engine.import_profile(
                    &mut self.store,
                    &export,
                    &game_id,
                    &installation,
                    self.config.use_cache,
                )?;
                self.select(Some(report.profile_id.clone()))?;
                emit(format, &report, |report| {
                    println!("{}", report.batch.summary());
                    if !report.unknown.is_empty() {
                        println!("Not found: {}", report.unknown.join(", "));
                    }
                })
            }
            CliCommand::Export(path) => {
                let profile = self.profile(global)?;
                transfer::write_export(&profile, &path)?;
                emit(format, &path, |path| println!("Exported to {}", path.display()))
            }
            CliCommand::Share => {
                let profile = self.profile(global)?;
                let code = ShareClient::new().share_profile(&profile)?;
                emit(format, &code, |code| {
                    println!("Share code for {}: {code}", profile.name)
                })
            }
            CliCommand::CacheClear => {
                let report = self.engine.installer().cache().clear_all()?;
                emit(format, &report, |report| {
                    println!(
                        "Cleared {} cached mod(s), freed {} bytes",
                        report.cleared, report.bytes_freed
                    )
                })
            }
            CliCommand::GamesList { remote } => {
                let games: Vec<(String, String)> = if remote {
                    ThunderstoreIndex::new(self.config.index_cache_dir())
                        .fetch_communities()?
                        .into_iter()
                        .map(|community| (community.identifier, community.name))
                        .collect()
                } else {
                    game::known_games()
                        .iter()
                        .map(|known| (known.identifier.to_string(), known.display_name.to_string()))
                        .collect()
                };
                let items: Vec<GameItem> = games
                    .into_iter()
                    .map(|(identifier, name)| GameItem {
                        path: self.config.game_root(&identifier).ok(),
                        identifier,
                        name,
                    })
                    .collect();
                emit(format, &items, |items| {
                    for item in items {
                        let path = item
                            .path
                            .as_ref()
                            .map(|path| path.display().to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!("{:<24} {:<28} {path}", item.identifier, item.name);
                    }
                })
            }
            CliCommand::GamesSetPath { game, path } => {
                self.config.set_game_path(&game, &path);
                self.config.save()?;
                emit(format, &path, |path| {
                    println!("{game} -> {}", path.display())
                })
            }
            CliCommand::Help | CliCommand::Version => Ok(()),
        }
    }
}

#[derive(Serialize)]
struct ProfileListItem {
    id: String,
    name: String,
    game: String,
    mods: usize,
    active: bool,
}

#[derive(Serialize)]
struct SearchItem {
    name: String,
    version: String,
    downloads: u64,
    rating: i64,
    description: String,
}

#[derive(Serialize)]
struct GameItem {
    identifier: String,
    name: String,
    path: Option<PathBuf>,
}

fn emit<T: Serialize + ?Sized>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

/// Matches an install id, then `namespace-name`, then the versioned name.
fn find_mod_id(profile: &Profile, query: &str) -> Result<String> {
    profile
        .mods
        .iter()
        .find(|entry| entry.uuid4 == query)
        .or_else(|| {
            profile
                .mods
                .iter()
                .find(|entry| entry.base_name().eq_ignore_ascii_case(query))
        })
        .or_else(|| profile.mods.iter().find(|entry| entry.full_name == query))
        .map(|entry| entry.uuid4.clone())
        .ok_or_else(|| {
            EngineError::UnknownMod {
                profile_id: profile.id.clone(),
                mod_id: query.to_string(),
            }
            .into()
        })
}

fn spawn_progress_printer(events: Receiver<ProgressEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in events {
            match event {
                ProgressEvent::Stage { full_name, stage } => {
                    eprintln!("{}: {full_name}", stage.label())
                }
                ProgressEvent::Installed {
                    full_name,
                    from_cache,
                } => {
                    let source = if from_cache { " (cache)" } else { "" };
                    eprintln!("Installed {full_name}{source}");
                }
                ProgressEvent::Failed { full_name, message } => {
                    eprintln!("Failed {full_name}: {message}")
                }
                ProgressEvent::Removed { name } => eprintln!("Removed {name}"),
                ProgressEvent::BatchCompleted {
                    batch,
                    batches,
                    done,
                    total,
                } => eprintln!("Batch {batch}/{batches} done ({done}/{total})"),
            }
        }
    })
}

fn print_help() {
    println!("modforge v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  modforge profiles list                 List profiles");
    println!("  modforge profiles create <name> <game> Create and select a profile");
    println!("  modforge profiles delete <id>          Delete a profile and its cache");
    println!("  modforge profiles select <id>          Select the active profile");
    println!("  modforge mods list                     List mods in the profile");
    println!("  modforge install <package>             Install with dependencies");
    println!("  modforge uninstall <mod> [--orphans|--all-deps]");
    println!("  modforge toggle <mod>                  Enable or disable a mod");
    println!("  modforge sync [--no-cache]             Make the game match the profile");
    println!("  modforge outdated                      List mods with newer versions");
    println!("  modforge update <mod>                  Install the latest version");
    println!("  modforge search <game> [query] [--page N] [--sort key] [--asc]");
    println!("  modforge import <file> [game]          Create a profile from an export");
    println!("  modforge import --code <code> [game]   Create a profile from a share code");
    println!("  modforge export <file>                 Export the profile");
    println!("  modforge share                         Upload the profile, print a share code");
    println!("  modforge cache clear                   Delete every cached mod");
    println!("  modforge games list [--remote]         Show games and paths (--remote: all communities)");
    println!("  modforge games set-path <game> <path>  Override a game's install path");
    println!();
    println!("Global options:");
    println!("  --format <json|text>                   Output format");
    println!("  --profile <id|name>                    Profile to operate on");
    println!("  -q, --quiet                            Errors only");
    println!("  -v, -vv                                Increase verbosity");
    println!("  -h, --help                             Show help");
    println!("  -V, --version                          Show version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn global_options_are_pulled_out() {
        let (global, tokens) =
            parse_global_options(&strings(&["--format", "json", "sync", "-vv", "--profile=abc"]));
        assert_eq!(global.format, OutputFormat::Json);
        assert_eq!(global.profile.as_deref(), Some("abc"));
        assert_eq!(global.verbosity, Verbosity::Debug);
        assert_eq!(tokens, strings(&["sync"]));
    }

    #[test]
    fn uninstall_flags_pick_the_choice() {
        let command = parse_command(&strings(&["uninstall", "Team-Mod", "--orphans"])).unwrap();
        assert_eq!(
            command,
            CliCommand::Uninstall {
                query: "Team-Mod".into(),
                choice: RemovalChoice::WithOrphans,
            }
        );
        assert!(parse_command(&strings(&["uninstall"])).is_err());
    }

    #[test]
    fn search_pages_are_one_based() {
        let command =
            parse_command(&strings(&["search", "lethal-company", "more", "suits", "--page", "2"]))
                .unwrap();
        let CliCommand::Search { game, query } = command else {
            panic!("expected search");
        };
        assert_eq!(game, "lethal-company");
        assert_eq!(query.page, 1);
        assert_eq!(query.search, "more suits");
    }

    #[test]
    fn import_reads_a_file_or_a_share_code() {
        assert_eq!(
            parse_command(&strings(&["import", "friday.r2z"])).unwrap(),
            CliCommand::Import {
                source: ImportSource::File(PathBuf::from("friday.r2z")),
                game: None,
            }
        );
        assert_eq!(
            parse_command(&strings(&["import", "--code", "0192c3a8", "lethal-company"])).unwrap(),
            CliCommand::Import {
                source: ImportSource::Code("0192c3a8".into()),
                game: Some("lethal-company".into()),
            }
        );
        assert!(parse_command(&strings(&["import", "--code"])).is_err());
        assert_eq!(parse_command(&strings(&["share"])).unwrap(), CliCommand::Share);
        assert_eq!(
            parse_command(&strings(&["games", "list", "--remote"])).unwrap(),
            CliCommand::GamesList { remote: true }
        );
        assert_eq!(
            parse_command(&strings(&["games"])).unwrap(),
            CliCommand::GamesList { remote: false }
        );
    }

    #[test]
    fn sync_no_cache() {
        assert_eq!(
            parse_command(&strings(&["sync", "--no-cache"])).unwrap(),
            CliCommand::Sync { use_cache: false }
        );
        assert_eq!(parse_command(&[]).unwrap(), CliCommand::Help);
    }
}
