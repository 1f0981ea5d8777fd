//! Go Source Weaver Library
//!
//! Rewrites the source of a Go package from *weave files*: ordinary Go files
//! whose top-level declarations carry annotation comments.
//!
//! # Annotations
//!
//! - `// +weaver insert`: add the declaration before the first function
//! - `// +weaver delete`: drop the same-named declaration
//! - `// +weaver replace`: swap the same-named declaration
//! - `// +weaver replaceAndCallOriginal`: swap it, keeping the original as
//!   `<name>Original` so the replacement can call through
//! - `// +weaver packageFQN <import path>`: name the target package
//! - `// +weaver anchor <name>`: splice inserts before `<name>` instead
//!
//! A weave file applies to the target file with the same base name.
//!
//! # Pipeline
//!
//! 1. [`weave::PackageWeave`] loads and classifies weave files
//! 2. [`package::PackageLoader`] resolves and parses the target package
//! 3. [`transform::TransformEngine`] rewrites each matching unit
//! 4. [`persist::Persistence`] writes results, either to a directory or to
//!    a redirected module copy wired in with a go.mod `replace`
//!
//! [`orchestrator::PackageOrchestrator`] drives the steps and isolates
//! per-unit faults.
//!
//! # Usage
//!
//! ```bash
//! # Weave ./server with every weave file in ./weaves, into ./out
//! gweaver --package ./server --weave-dir ./weaves --out ./out
//!
//! # Redirect a dependency: the package comes from packageFQN
//! gweaver --weave weaves/client.go --tag patched --format
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod annotation;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod package;
pub mod persist;
pub mod syntax;
pub mod transform;
pub mod weave;

pub use annotation::{classify, Annotation, Operation};
pub use config::WeaverConfig;
pub use error::{TransformError, WeaveError, WeaveResult};
pub use orchestrator::{resolve_package, PackageOrchestrator, UnitOutcome, WeaveReport};
pub use package::{GoPackageLoader, LoadedPackage, PackageLoader};
pub use persist::{DirectoryWriter, Formatter, ModuleRedirector, Persistence};
pub use syntax::{Declaration, TargetUnit};
pub use transform::TransformEngine;
pub use weave::{PackageWeave, WeaveSet};
