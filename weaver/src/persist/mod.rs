//! Persistence: where transformed units end up.
//!
//! Two strategies exist. [`DirectoryWriter`] writes every unit into a plain
//! output directory. [`ModuleRedirector`] copies the package's module to a
//! tagged location, writes the units there and points the local go.mod at
//! the copy with a `replace` directive.

pub mod format;
pub mod redirect;

pub use format::Formatter;
pub use redirect::{ModuleRedirector, RedirectConfig};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::WeaveResult;
use crate::package::LoadedPackage;
use crate::syntax::TargetUnit;

/// A destination for woven units.
pub trait Persistence {
    /// Called once per run, before any unit is persisted.
    fn prepare(&mut self, package: &LoadedPackage) -> WeaveResult<()>;

    /// Write one unit; returns the path written.
    fn persist(&mut self, unit: &TargetUnit) -> WeaveResult<PathBuf>;
}

impl<P: Persistence + ?Sized> Persistence for Box<P> {
    fn prepare(&mut self, package: &LoadedPackage) -> WeaveResult<()> {
        (**self).prepare(package)
    }

    fn persist(&mut self, unit: &TargetUnit) -> WeaveResult<PathBuf> {
        (**self).persist(unit)
    }
}

/// Writes units by file name into one directory.
#[derive(Debug, Clone)]
pub struct DirectoryWriter {
    out_dir: PathBuf,
    formatter: Formatter,
}

impl DirectoryWriter {
    pub fn new(out_dir: impl Into<PathBuf>, formatter: Formatter) -> Self {
        Self {
            out_dir: out_dir.into(),
            formatter,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

impl Persistence for DirectoryWriter {
    fn prepare(&mut self, package: &LoadedPackage) -> WeaveResult<()> {
        fs::create_dir_all(&self.out_dir)?;
        info!(
            "Writing package {} to {}",
            package.name,
            self.out_dir.display()
        );
        Ok(())
    }

    fn persist(&mut self, unit: &TargetUnit) -> WeaveResult<PathBuf> {
        let target = self.out_dir.join(unit.file_name());
        fs::write(&target, self.formatter.render(unit))?;
        debug!("Wrote {}", target.display());
        Ok(target)
    }
}
