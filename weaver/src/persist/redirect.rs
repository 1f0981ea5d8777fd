//! Module redirection: write into a tagged copy of the target's module and
//! point the local build at it.
//!
//! For module `example.com/lib` at `v1.4.0` with tag `-woven`, the copy lands
//! in `<write_root>/example.com/lib@v1.4.0-woven` (module cache escaping
//! applies), or next to the module root when no write root is configured.
//! The local go.mod gains `replace example.com/lib => <copy>`.

use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{Formatter, Persistence};
use crate::error::{WeaveError, WeaveResult};
use crate::package::{escape_module_path, LoadedPackage, ModuleInfo};
use crate::syntax::TargetUnit;

/// Version used for main modules, which have none.
pub const DEFAULT_VERSION: &str = "v0.0.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectConfig {
    /// Suffix appended to the copy's version, normalised to start with `-`
    pub tag: String,
    /// Parent directory for copies; `None` puts them beside the module
    pub write_root: Option<PathBuf>,
    /// The go.mod that gets the replace directive
    pub go_mod: PathBuf,
}

/// Where one run writes.
#[derive(Debug, Clone)]
struct Layout {
    module: ModuleInfo,
    destination: PathBuf,
    package_dir: PathBuf,
}

/// Persists woven units into a redirected copy of their module.
#[derive(Debug, Clone)]
pub struct ModuleRedirector {
    config: RedirectConfig,
    formatter: Formatter,
    layout: Option<Layout>,
}

impl ModuleRedirector {
    pub fn new(config: RedirectConfig, formatter: Formatter) -> Self {
        Self {
            config,
            formatter,
            layout: None,
        }
    }

    /// Root of the module copy, once prepared.
    pub fn destination(&self) -> Option<&Path> {
        self.layout.as_ref().map(|l| l.destination.as_path())
    }

    fn plan(&self, package: &LoadedPackage) -> WeaveResult<Layout> {
        let module = package.module.clone().ok_or_else(|| WeaveError::NotInModule {
            dir: package.dir.clone(),
        })?;
        let tag = normalize_tag(&self.config.tag);
        let version = module.version.as_deref().unwrap_or(DEFAULT_VERSION);

        let destination = match &self.config.write_root {
            Some(root) => root.join(format!(
                "{}@{}{}",
                escape_module_path(&module.path),
                version,
                tag
            )),
            None => {
                let dir_name = module
                    .root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        WeaveError::config(format!(
                            "module root {} has no directory name",
                            module.root.display()
                        ))
                    })?;
                // Cache directories already end in @version.
                let name = match module.version {
                    Some(_) => format!("{}{}", dir_name, tag),
                    None => format!("{}@{}{}", dir_name, version, tag),
                };
                module.root.with_file_name(name)
            }
        };

        let relative = package.dir.strip_prefix(&module.root).map_err(|_| {
            WeaveError::config(format!(
                "package {} is outside its module root {}",
                package.dir.display(),
                module.root.display()
            ))
        })?;
        let package_dir = destination.join(relative);

        Ok(Layout {
            module,
            destination,
            package_dir,
        })
    }

    /// Mirror the module tree into the destination, writable.
    fn copy_module(&self, layout: &Layout) -> WeaveResult<usize> {
        let from = &layout.module.root;
        let to = &layout.destination;
        let walker = WalkBuilder::new(from)
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .build();

        let mut copied = 0;
        for entry in walker {
            let entry = entry.map_err(|e| WeaveError::Io(std::io::Error::other(e)))?;
            let path = entry.path();
            if path.starts_with(to) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(from) else {
                continue;
            };
            let target = to.join(relative);
            match entry.file_type() {
                Some(t) if t.is_dir() => fs::create_dir_all(&target)?,
                Some(t) if t.is_file() => {
                    fs::copy(path, &target)?;
                    make_writable(&target)?;
                    copied += 1;
                }
                _ => {}
            }
        }
        debug!("Copied {} files into {}", copied, to.display());
        Ok(copied)
    }

    /// The copy needs a go.mod to be a module in its own right.
    fn ensure_copy_go_mod(&self, layout: &Layout) -> WeaveResult<()> {
        let go_mod = layout.destination.join("go.mod");
        if !go_mod.exists() {
            fs::write(&go_mod, format!("module {}\n", layout.module.path))?;
            debug!("Created {}", go_mod.display());
        }
        Ok(())
    }

    /// Add or refresh the replace directive in the local go.mod.
    fn ensure_replace(&self, layout: &Layout) -> WeaveResult<bool> {
        let directive = format!(
            "replace {} => {}",
            layout.module.path,
            layout.destination.display()
        );
        let go_mod = &self.config.go_mod;
        let existing = match fs::read_to_string(go_mod) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let updated = with_replace(&existing, &layout.module.path, &directive);
        if updated == existing {
            debug!("{} already redirects {}", go_mod.display(), layout.module.path);
            return Ok(false);
        }
        fs::write(go_mod, updated)?;
        info!("{}: {}", go_mod.display(), directive);
        Ok(true)
    }
}

impl Persistence for ModuleRedirector {
    fn prepare(&mut self, package: &LoadedPackage) -> WeaveResult<()> {
        let layout = self.plan(package)?;
        info!(
            "Redirecting module {} to {}",
            layout.module.path,
            layout.destination.display()
        );
        fs::create_dir_all(&layout.destination)?;
        self.copy_module(&layout)?;
        self.ensure_copy_go_mod(&layout)?;
        fs::create_dir_all(&layout.package_dir)?;
        self.ensure_replace(&layout)?;
        self.layout = Some(layout);
        Ok(())
    }

    fn persist(&mut self, unit: &TargetUnit) -> WeaveResult<PathBuf> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| WeaveError::config("module redirector used before prepare"))?;
        let target = layout.package_dir.join(unit.file_name());
        fs::write(&target, self.formatter.render(unit))?;
        debug!("Wrote {}", target.display());
        Ok(target)
    }
}

/// Tags always start with `-` so they read as a version suffix.
pub fn normalize_tag(tag: &str) -> String {
    let tag = tag.trim();
    if tag.is_empty() || tag.starts_with('-') {
        tag.to_string()
    } else {
        format!("-{}", tag)
    }
}

/// `go_mod` with exactly one replace directive for `module`.
fn with_replace(go_mod: &str, module: &str, directive: &str) -> String {
    let prefix = format!("replace {} ", module);
    let mut found = false;
    let mut lines: Vec<String> = Vec::new();
    for line in go_mod.lines() {
        if line.trim_start().starts_with(&prefix) {
            if !found {
                lines.push(directive.to_string());
                found = true;
            }
            continue;
        }
        lines.push(line.to_string());
    }
    if !found {
        if lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(directive.to_string());
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(unix)]
fn make_writable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    let mode = permissions.mode();
    if mode & 0o200 == 0 {
        permissions.set_mode(mode | 0o200);
        fs::set_permissions(path, permissions)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_writable(path: &Path) -> std::io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }
    Ok(())
}
