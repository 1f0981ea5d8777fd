//! Package loading: from an identifier to parsed compilation units.
//!
//! The loader is a seam: the orchestrator only needs *some* way to get the
//! package's units, so tests can hand over in-memory packages while the CLI
//! resolves directories and import paths through the Go toolchain.

pub mod modules;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub use modules::{escape_module_path, find_enclosing_module, ModuleIndex, ModuleInfo};

use crate::error::{WeaveError, WeaveResult};
use crate::syntax::TargetUnit;
use crate::weave::package::go_files;

/// Something that can produce the compilation units of a package.
pub trait PackageLoader {
    fn load(&self, package: &str) -> WeaveResult<LoadedPackage>;
}

/// A loaded target package.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    /// Package name from the package clauses
    pub name: String,
    /// Identifier the package was requested by
    pub identifier: String,
    pub dir: PathBuf,
    pub module: Option<ModuleInfo>,
    /// Units in load (file name) order
    pub units: Vec<TargetUnit>,
}

impl LoadedPackage {
    /// Validate that the units form exactly one package.
    pub fn new(
        identifier: impl Into<String>,
        dir: impl Into<PathBuf>,
        module: Option<ModuleInfo>,
        units: Vec<TargetUnit>,
    ) -> WeaveResult<Self> {
        let identifier = identifier.into();
        let names: BTreeSet<&str> = units.iter().map(TargetUnit::package).collect();
        let name = match names.len() {
            1 => names.into_iter().next().unwrap_or_default().to_string(),
            found => return Err(WeaveError::package_resolution(identifier, found)),
        };
        Ok(Self {
            name,
            identifier,
            dir: dir.into(),
            module,
            units,
        })
    }
}

/// Loads packages from disk, resolving import paths with the `go` tool.
#[derive(Debug, Clone)]
pub struct GoPackageLoader {
    go_command: String,
    working_dir: PathBuf,
}

impl GoPackageLoader {
    pub fn new(go_command: impl Into<String>) -> Self {
        Self {
            go_command: go_command.into(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Resolve relative directories and run `go list` from `dir`.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Directory and module of a package given as a path or an import path.
    fn resolve(&self, package: &str) -> WeaveResult<(PathBuf, Option<ModuleInfo>)> {
        let as_dir = self.working_dir.join(package);
        if as_dir.is_dir() {
            let dir = as_dir.canonicalize()?;
            let module = find_enclosing_module(&dir)?;
            return Ok((dir, module));
        }

        let index = ModuleIndex::from_go_list(&self.go_command, &self.working_dir)?;
        let (module_path, version) = index
            .resolve(package)
            .ok_or_else(|| WeaveError::package_resolution(package, 0))?;
        let root = match version {
            Some(version) => modules::module_cache(&self.go_command)?
                .join(format!("{}@{}", escape_module_path(module_path), version)),
            None => find_enclosing_module(&self.working_dir.canonicalize()?)?
                .filter(|m| m.path == module_path)
                .map(|m| m.root)
                .ok_or_else(|| WeaveError::package_resolution(package, 0))?,
        };
        let sub = package
            .strip_prefix(module_path)
            .unwrap_or("")
            .trim_start_matches('/');
        let dir = root.join(sub);
        if !dir.is_dir() {
            return Err(WeaveError::package_resolution(package, 0));
        }
        debug!("Resolved {} to {}", package, dir.display());
        let module = ModuleInfo {
            path: module_path.to_string(),
            version: version.map(str::to_string),
            root,
        };
        Ok((dir, Some(module)))
    }
}

impl PackageLoader for GoPackageLoader {
    fn load(&self, package: &str) -> WeaveResult<LoadedPackage> {
        let (dir, module) = self.resolve(package)?;
        let files = go_files(&dir)?;
        info!("Loading package {} ({} files) from {}", package, files.len(), dir.display());

        let mut units = Vec::with_capacity(files.len());
        for file in files {
            let source = fs::read_to_string(&file)?;
            let unit = TargetUnit::parse(&file, source)?;
            if let Some(line) = unit.error_line() {
                error!(
                    "{}:{}: syntax error, the file will be skipped if a weave targets it",
                    file.display(),
                    line
                );
            }
            units.push(unit);
        }
        LoadedPackage::new(package, dir, module, units)
    }
}

/// A package already held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryLoader {
    package: LoadedPackage,
}

impl InMemoryLoader {
    pub fn new(package: LoadedPackage) -> Self {
        Self { package }
    }

    /// Parse `(file name, source)` pairs into a package rooted at `dir`.
    pub fn from_sources<'a>(
        dir: impl AsRef<Path>,
        sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> WeaveResult<Self> {
        let dir = dir.as_ref();
        let units = sources
            .into_iter()
            .map(|(name, source)| TargetUnit::parse(dir.join(name), source))
            .collect::<WeaveResult<Vec<_>>>()?;
        let identifier = dir.display().to_string();
        Ok(Self::new(LoadedPackage::new(identifier, dir, None, units)?))
    }
}

impl PackageLoader for InMemoryLoader {
    fn load(&self, _package: &str) -> WeaveResult<LoadedPackage> {
        Ok(self.package.clone())
    }
}
