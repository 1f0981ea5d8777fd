//! Package orchestration: load, transform every unit, persist, report.
//!
//! Fatal errors ([`WeaveError`]) abort the run before or during loading.
//! Once units are being transformed, failures stay with their unit: a
//! structural fault or a panic skips it, a write failure marks it failed,
//! and the remaining units are still processed.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::error::{TransformError, WeaveError, WeaveResult};
use crate::package::PackageLoader;
use crate::persist::Persistence;
use crate::syntax::TargetUnit;
use crate::transform::TransformEngine;
use crate::weave::{PackageWeave, WeaveSet};

/// What happened to one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// No weave targeted the unit; it was written back verbatim
    Unchanged,
    Woven,
    /// The transform failed; nothing was written
    Skipped { reason: String },
    /// The transform succeeded but writing failed
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub file: String,
    /// Weave file applied to this unit
    pub weave: Option<String>,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
    pub written_to: Option<PathBuf>,
}

/// Summary of a run, printed as JSON by the CLI on request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaveReport {
    pub package: String,
    pub units: Vec<UnitReport>,
    /// Weave files whose name matched no unit
    pub unmatched_weaves: Vec<String>,
}

impl WeaveReport {
    fn count(&self, pred: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.outcome)).count()
    }

    pub fn woven(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Woven))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Failed { .. }))
    }

    /// No unit was skipped or failed.
    pub fn is_clean(&self) -> bool {
        self.skipped() == 0 && self.failed() == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "package {}: {} woven, {} unchanged, {} skipped, {} failed",
            self.package,
            self.woven(),
            self.unchanged(),
            self.skipped(),
            self.failed()
        )
    }
}

/// The package to weave: the explicit identifier, else the one the weave
/// files declare.
pub fn resolve_package(explicit: Option<&str>, weave: &PackageWeave) -> WeaveResult<String> {
    let declared = weave.declared_package();
    match (explicit, declared) {
        (Some(explicit), Ok(Some(declared))) if explicit != declared => {
            warn!(
                "Weave files declare {}, weaving {} as requested",
                declared, explicit
            );
            Ok(explicit.to_string())
        }
        (Some(explicit), _) => Ok(explicit.to_string()),
        (None, Ok(Some(declared))) => Ok(declared.to_string()),
        (None, Ok(None)) => Err(WeaveError::MissingPackage),
        (None, Err(e)) => Err(e),
    }
}

/// Drives one weaving run over a package.
pub struct PackageOrchestrator<'w, L, P> {
    weave: &'w PackageWeave,
    loader: L,
    persistence: P,
    engine: TransformEngine,
}

impl<'w, L: PackageLoader, P: Persistence> PackageOrchestrator<'w, L, P> {
    pub fn new(weave: &'w PackageWeave, loader: L, persistence: P) -> Self {
        Self {
            weave,
            loader,
            persistence,
            engine: TransformEngine::new(),
        }
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn into_persistence(self) -> P {
        self.persistence
    }

    /// Weave `package`. Units are processed in load order.
    pub fn run(&mut self, package: &str) -> WeaveResult<WeaveReport> {
        info!(
            "Weaving package {} with {} weave file(s)",
            package,
            self.weave.len()
        );
        let loaded = self.loader.load(package)?;
        self.persistence.prepare(&loaded)?;

        let mut report = WeaveReport {
            package: loaded.name.clone(),
            ..WeaveReport::default()
        };
        let mut matched = BTreeSet::new();

        for unit in loaded.units {
            let file = unit.file_name();
            let set = self.weave.for_file(&file);
            if let Some(set) = set {
                matched.insert(set.file_name().to_string());
            }

            let (unit, outcome) = match set {
                None => {
                    debug!("No weave for {}, writing it back unchanged", file);
                    (Some(unit), UnitOutcome::Unchanged)
                }
                Some(set) => match transform_contained(&self.engine, unit, set) {
                    Ok(unit) => (Some(unit), UnitOutcome::Woven),
                    Err(e) => {
                        error!("Skipping {}: {}", file, e);
                        (
                            None,
                            UnitOutcome::Skipped {
                                reason: e.to_string(),
                            },
                        )
                    }
                },
            };

            let mut written_to = None;
            let outcome = match unit {
                Some(unit) => match self.persistence.persist(&unit) {
                    Ok(path) => {
                        written_to = Some(path);
                        outcome
                    }
                    Err(e) => {
                        error!("Failed to write {}: {}", file, e);
                        UnitOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                },
                None => outcome,
            };

            report.units.push(UnitReport {
                file,
                weave: set.map(|s| s.file_name().to_string()),
                outcome,
                written_to,
            });
        }

        report.unmatched_weaves = self
            .weave
            .file_names()
            .filter(|name| !matched.contains(*name))
            .map(str::to_string)
            .collect();
        for name in &report.unmatched_weaves {
            warn!("Weave {} matched no file in package {}", name, report.package);
        }

        info!("{}", report.summary());
        Ok(report)
    }
}

/// Transform one unit, turning a panic into a [`TransformError`].
pub fn transform_contained(
    engine: &TransformEngine,
    unit: TargetUnit,
    set: &WeaveSet,
) -> Result<TargetUnit, TransformError> {
    match panic::catch_unwind(AssertUnwindSafe(|| engine.apply(unit, Some(set)))) {
        Ok(result) => result,
        Err(payload) => Err(TransformError::Panicked {
            message: panic_message(payload),
        }),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{InMemoryLoader, LoadedPackage};
    use std::collections::HashMap;

    /// Keeps persisted text in memory; optionally refuses one file.
    #[derive(Default)]
    struct MemoryStore {
        written: HashMap<String, String>,
        refuse: Option<String>,
        prepared: bool,
    }

    impl Persistence for MemoryStore {
        fn prepare(&mut self, _package: &LoadedPackage) -> WeaveResult<()> {
            self.prepared = true;
            Ok(())
        }

        fn persist(&mut self, unit: &TargetUnit) -> WeaveResult<PathBuf> {
            let name = unit.file_name();
            if self.refuse.as_deref() == Some(name.as_str()) {
                return Err(WeaveError::config("disk full"));
            }
            self.written.insert(name.clone(), unit.render());
            Ok(PathBuf::from("/mem").join(name))
        }
    }

    fn loader() -> InMemoryLoader {
        InMemoryLoader::from_sources(
            "/virtual/demo",
            [
                ("broken.go", "package demo\n\nfunc broken( {\n"),
                ("other.go", "package demo\n\nfunc Other() {}\n"),
                ("server.go", "package demo\n\nfunc Serve() {}\n"),
            ],
        )
        .unwrap()
    }

    fn weave(sets: &[(&str, &str)]) -> PackageWeave {
        PackageWeave::from_sets(
            sets.iter()
                .map(|(name, source)| WeaveSet::from_source(name, source).unwrap()),
        )
    }

    #[test]
    fn test_run_weaves_and_isolates_faults() {
        let weave = weave(&[
            ("server.go", "package demo\n\n// +weaver insert\nfunc Added() {}\n"),
            ("broken.go", "package demo\n\n// +weaver delete\nfunc X() {}\n"),
            ("missing.go", "package demo\n\n// +weaver delete\nfunc Y() {}\n"),
        ]);
        let mut orchestrator = PackageOrchestrator::new(&weave, loader(), MemoryStore::default());
        let report = orchestrator.run("demo").unwrap();

        assert_eq!(report.package, "demo");
        assert_eq!(report.woven(), 1);
        assert_eq!(report.unchanged(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.unmatched_weaves, vec!["missing.go"]);

        let store = orchestrator.into_persistence();
        assert!(store.prepared);
        assert!(!store.written.contains_key("broken.go"));
        assert_eq!(store.written["other.go"], "package demo\n\nfunc Other() {}\n");
        let server = &store.written["server.go"];
        assert!(server.find("func Added()").unwrap() < server.find("func Serve()").unwrap());
    }

    #[test]
    fn test_persist_failure_is_reported_per_unit() {
        let weave = weave(&[]);
        let store = MemoryStore {
            refuse: Some("other.go".to_string()),
            ..MemoryStore::default()
        };
        let mut orchestrator = PackageOrchestrator::new(&weave, loader(), store);
        let report = orchestrator.run("demo").unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.unchanged(), 2);
        assert_eq!(orchestrator.persistence().written.len(), 2);
    }

    #[test]
    fn test_report_serializes() {
        let report = WeaveReport {
            package: "demo".into(),
            units: vec![UnitReport {
                file: "a.go".into(),
                weave: None,
                outcome: UnitOutcome::Skipped {
                    reason: "bad".into(),
                },
                written_to: None,
            }],
            unmatched_weaves: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["units"][0]["outcome"], "skipped");
        assert_eq!(json["units"][0]["reason"], "bad");

        let back: WeaveReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(3_u8)), "unknown panic payload");
    }

    #[test]
    fn test_resolve_package() {
        let declared = weave(&[(
            "a.go",
            "// +weaver packageFQN example.com/demo\npackage demo\n",
        )]);
        let empty = weave(&[]);

        assert_eq!(resolve_package(None, &declared).unwrap(), "example.com/demo");
        assert_eq!(resolve_package(Some("./demo"), &declared).unwrap(), "./demo");
        assert_eq!(resolve_package(Some("./demo"), &empty).unwrap(), "./demo");
        assert!(matches!(
            resolve_package(None, &empty),
            Err(WeaveError::MissingPackage)
        ));
    }
}
