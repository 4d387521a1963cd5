mod common;

use common::{package, Harness, GAME};
use modforge::{
    engine::BATCH_SIZE,
    error::EngineError,
    progress::{ProgressEvent, ProgressSink},
};

fn position(names: &[String], name: &str) -> usize {
    names.iter().position(|n| n == name).unwrap()
}

#[test]
fn installs_every_dependency_once_before_its_dependents() {
    let mut harness = Harness::new(vec![
        package("T-Root", &["T-C", "T-B"]),
        package("T-C", &["T-B", "T-D"]),
        package("T-B", &["T-D"]),
        package("T-D", &[]),
    ]);
    let report = harness.install("T-Root");

    assert_eq!(report.installed.len(), 4);
    assert!(position(&report.installed, "T-D-1.0.0") < position(&report.installed, "T-B-1.0.0"));
    assert!(position(&report.installed, "T-B-1.0.0") < position(&report.installed, "T-C-1.0.0"));
    assert_eq!(report.installed.last().map(String::as_str), Some("T-Root-1.0.0"));
    assert_eq!(harness.profile_mods(), vec!["T-B", "T-C", "T-D", "T-Root"]);
    assert_eq!(harness.installed_dirs(), vec!["T-B", "T-C", "T-D", "T-Root"]);
    assert_eq!(harness.downloads(), 4);
}

#[test]
fn cyclic_dependencies_install_once() {
    let mut harness = Harness::new(vec![package("T-A", &["T-B"]), package("T-B", &["T-A"])]);
    let report = harness.install("T-A");

    assert_eq!(report.installed, vec!["T-B-1.0.0".to_string(), "T-A-1.0.0".to_string()]);
    assert_eq!(harness.profile_mods(), vec!["T-A", "T-B"]);
    assert_eq!(harness.downloads(), 2);
}

#[test]
fn unknown_dependency_does_not_block_the_root() {
    let mut harness = Harness::new(vec![package("T-A", &["Ghost-Dep"])]);
    let report = harness.install("T-A");
    assert_eq!(report.installed, vec!["T-A-1.0.0".to_string()]);
    assert_eq!(report.unknown, vec!["Ghost-Dep".to_string()]);
}

#[test]
fn reinstalling_an_installed_mod_is_skipped() {
    let mut harness = Harness::new(vec![package("T-A", &[])]);
    harness.install("T-A");
    let again = harness.install("T-A");
    assert!(again.already_installed);
    assert_eq!(harness.downloads(), 1);
    assert_eq!(harness.profile_mods(), vec!["T-A"]);
}

#[test]
fn unknown_root_is_not_found() {
    let harness = Harness::new(Vec::new());
    let err = harness.engine.resolve_package(GAME, "Ghost-Mod").unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[test]
fn batches_report_progress_after_each_barrier() {
    let names: Vec<String> = (0..7).map(|idx| format!("T-Mod{idx}")).collect();
    let packages = names.iter().map(|name| package(name, &[])).collect();
    let harness = Harness::new(packages);
    let (sink, events) = ProgressSink::channel();
    let Harness {
        dir: _dir,
        engine,
        game,
        downloads,
        profile_id,
        ..
    } = harness;
    let engine = engine.with_progress(sink);

    let targets: Vec<_> = names
        .iter()
        .map(|name| engine.resolve_package(GAME, name).unwrap())
        .collect();
    let (report, installed) = engine.batch_install(&targets, &game, &profile_id, false);
    drop(engine);

    assert_eq!(report.summary(), "7/7 installed, failed: []");
    assert_eq!(installed.len(), 7);
    assert_eq!(downloads.load(std::sync::atomic::Ordering::SeqCst), 7);
    let batches: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::BatchCompleted { batch, done, .. } => Some((batch, done)),
            _ => None,
        })
        .collect();
    assert_eq!(batches, vec![(1, BATCH_SIZE), (2, 7)]);
}

#[test]
fn failed_dependency_download_is_recorded_and_root_still_installs() {
    let mut harness = Harness::with_broken_downloads(
        vec![package("T-Root", &["T-Dep", "T-Fine"]), package("T-Dep", &[]), package("T-Fine", &[])],
        &["T-Dep-"],
    );
    let report = harness.install("T-Root");

    assert_eq!(
        report.installed,
        vec!["T-Fine-1.0.0".to_string(), "T-Root-1.0.0".to_string()]
    );
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].full_name, "T-Dep-1.0.0");
    assert!(report.failures[0].message.contains("404"));
    assert_eq!(harness.profile_mods(), vec!["T-Fine", "T-Root"]);
    assert_eq!(harness.installed_dirs(), vec!["T-Fine", "T-Root"]);
}

#[test]
fn failed_root_download_is_returned_as_error() {
    let mut harness = Harness::with_broken_downloads(
        vec![package("T-Root", &["T-Dep"]), package("T-Dep", &[])],
        &["T-Root-"],
    );
    let err = harness.try_install("T-Root").unwrap_err();

    assert!(matches!(err, EngineError::HttpStatus { status: 404, .. }));
    assert_eq!(harness.profile_mods(), vec!["T-Dep"]);
    assert_eq!(harness.installed_dirs(), vec!["T-Dep"]);
}

#[test]
fn batch_keeps_going_past_failed_items() {
    let names: Vec<String> = (0..3).map(|idx| format!("T-Mod{idx}")).collect();
    let packages = names.iter().map(|name| package(name, &[])).collect();
    let harness = Harness::with_broken_downloads(packages, &["T-Mod1-"]);
    let targets: Vec<_> = names
        .iter()
        .map(|name| harness.engine.resolve_package(GAME, name).unwrap())
        .collect();

    let (report, installed) =
        harness
            .engine
            .batch_install(&targets, &harness.game, &harness.profile_id, false);

    assert_eq!(report.summary(), "2/3 installed, failed: [T-Mod1-1.0.0]");
    let names: Vec<&str> = installed.iter().map(|target| target.full_name()).collect();
    assert_eq!(names, vec!["T-Mod0-1.0.0", "T-Mod2-1.0.0"]);
    assert_eq!(harness.installed_dirs(), vec!["T-Mod0", "T-Mod2"]);
    assert_eq!(harness.downloads(), 3);
}
