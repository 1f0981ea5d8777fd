//! Integration tests for module redirection
//!
//! A fake module is laid out in a temporary directory, woven through a
//! [`ModuleRedirector`], and the copy plus the local go.mod are inspected.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use weaver::package::{InMemoryLoader, LoadedPackage, ModuleInfo};
use weaver::persist::{Formatter, ModuleRedirector, RedirectConfig};
use weaver::{GoPackageLoader, PackageOrchestrator, PackageWeave, TargetUnit, WeaveSet};

const STORE: &str = "package store\n\nfunc Get(key string) string {\n\treturn key\n}\n";

const STORE_WEAVE: &str =
    "package store\n\n// +weaver replace\nfunc Get(key string) string {\n\treturn \"woven:\" + key\n}\n";

/// `<tmp>/lib` holding module example.com/Lib with package `store`.
fn module_fixture() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("lib");
    fs::create_dir_all(root.join("store")).unwrap();
    fs::write(root.join("go.mod"), "module example.com/Lib\n\ngo 1.21\n").unwrap();
    fs::write(root.join("README.md"), "lib\n").unwrap();
    fs::write(root.join("store/store.go"), STORE).unwrap();
    (tmp, root)
}

fn weave() -> PackageWeave {
    PackageWeave::from_sets([WeaveSet::from_source("store.go", STORE_WEAVE).unwrap()])
}

fn redirector(write_root: &Path, go_mod: &Path) -> ModuleRedirector {
    ModuleRedirector::new(
        RedirectConfig {
            tag: "woven".to_string(),
            write_root: Some(write_root.to_path_buf()),
            go_mod: go_mod.to_path_buf(),
        },
        Formatter::none(),
    )
}

fn replace_lines(go_mod: &Path) -> Vec<String> {
    fs::read_to_string(go_mod)
        .unwrap()
        .lines()
        .filter(|l| l.starts_with("replace "))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_redirect_copies_module_and_adds_replace() {
    let (tmp, root) = module_fixture();
    let write_root = tmp.path().join("woven");
    let go_mod = tmp.path().join("app.mod");
    fs::write(&go_mod, "module example.com/app\n\ngo 1.21\n").unwrap();

    let weave = weave();
    let loader = GoPackageLoader::new("go");
    let mut orchestrator =
        PackageOrchestrator::new(&weave, loader, redirector(&write_root, &go_mod));
    let report = orchestrator.run(root.join("store").to_str().unwrap()).unwrap();
    assert_eq!(report.woven(), 1);

    let destination = orchestrator
        .persistence()
        .destination()
        .unwrap()
        .to_path_buf();
    assert_eq!(
        destination,
        write_root.join("example.com/!lib@v0.0.0-woven"),
        "uppercase letters are escaped like the module cache does"
    );

    // whole module mirrored, woven unit overwritten
    assert!(destination.join("README.md").is_file());
    assert!(destination.join("go.mod").is_file());
    let woven = fs::read_to_string(destination.join("store/store.go")).unwrap();
    assert!(woven.contains("\"woven:\" + key"));

    // the original module is untouched
    assert_eq!(fs::read_to_string(root.join("store/store.go")).unwrap(), STORE);

    let expected = format!("replace example.com/Lib => {}", destination.display());
    assert_eq!(replace_lines(&go_mod), vec![expected]);
    assert!(fs::read_to_string(&go_mod)
        .unwrap()
        .starts_with("module example.com/app\n"));
}

#[test]
fn test_second_run_keeps_a_single_replace() {
    let (tmp, root) = module_fixture();
    let write_root = tmp.path().join("woven");
    let go_mod = tmp.path().join("app.mod");
    fs::write(&go_mod, "module example.com/app\n").unwrap();

    let weave = weave();
    for _ in 0..2 {
        let loader = GoPackageLoader::new("go");
        let mut orchestrator =
            PackageOrchestrator::new(&weave, loader, redirector(&write_root, &go_mod));
        let report = orchestrator.run(root.join("store").to_str().unwrap()).unwrap();
        assert!(report.is_clean(), "{}", report.summary());
    }
    assert_eq!(replace_lines(&go_mod).len(), 1);
}

#[test]
fn test_missing_go_mod_is_created() {
    let tmp = TempDir::new().unwrap();
    let write_root = tmp.path().join("woven");
    let go_mod = tmp.path().join("go.mod");

    // a cached module from before go.mod existed
    let root = tmp.path().join("cache/example.com/old@v1.0.0");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("old.go"), "package old\n\nfunc Get() {}\n").unwrap();

    let unit = TargetUnit::parse(root.join("old.go"), "package old\n\nfunc Get() {}\n").unwrap();
    let module = ModuleInfo {
        path: "example.com/old".to_string(),
        version: Some("v1.0.0".to_string()),
        root: root.clone(),
    };
    let package = LoadedPackage::new("example.com/old", &root, Some(module), vec![unit]).unwrap();

    let weave = PackageWeave::from_sets([WeaveSet::from_source(
        "old.go",
        "package old\n\n// +weaver delete\nfunc Get() {}\n",
    )
    .unwrap()]);
    let mut orchestrator = PackageOrchestrator::new(
        &weave,
        InMemoryLoader::new(package),
        redirector(&write_root, &go_mod),
    );
    orchestrator.run("example.com/old").unwrap();

    let destination = write_root.join("example.com/old@v1.0.0-woven");
    assert_eq!(
        fs::read_to_string(destination.join("go.mod")).unwrap(),
        "module example.com/old\n"
    );
    assert!(!fs::read_to_string(destination.join("old.go"))
        .unwrap()
        .contains("func Get"));
    assert_eq!(
        replace_lines(&go_mod),
        vec![format!("replace example.com/old => {}", destination.display())]
    );
}

#[test]
fn test_package_outside_module_fails_to_prepare() {
    let tmp = TempDir::new().unwrap();
    let package = InMemoryLoader::from_sources(tmp.path(), [("store.go", STORE)]).unwrap();
    let weave = weave();
    let mut orchestrator = PackageOrchestrator::new(
        &weave,
        package,
        redirector(&tmp.path().join("woven"), &tmp.path().join("go.mod")),
    );
    let err = orchestrator.run("store").unwrap_err();
    assert!(matches!(err, weaver::WeaveError::NotInModule { .. }));
}
