//! Go module metadata: `go list -m all`, the module cache and go.mod files.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace};

use crate::error::{WeaveError, WeaveResult};

/// A Go module on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Module path from the `module` directive
    pub path: String,
    /// `None` for a main (non-cache) module
    pub version: Option<String>,
    /// Directory holding the module's go.mod
    pub root: PathBuf,
}

/// Modules visible from the current build, as listed by `go list -m all`.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    modules: Vec<(String, Option<String>)>,
}

impl ModuleIndex {
    /// Parse `go list -m all` output: `path [version] [=> replacement]`.
    pub fn parse(output: &str) -> Self {
        let mut modules = Vec::new();
        for line in output.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                [] => {}
                [path] => modules.push((path.to_string(), None)),
                [path, version, rest @ ..] => {
                    if !rest.is_empty() {
                        trace!("go list: ignoring {:?} after {} {}", rest, path, version);
                    }
                    modules.push((path.to_string(), Some(version.to_string())));
                }
            }
        }
        Self { modules }
    }

    /// Run `go list -m all` in `dir`.
    pub fn from_go_list(go: &str, dir: &Path) -> WeaveResult<Self> {
        let command = format!("{} list -m all", go);
        debug!("Running `{}` in {}", command, dir.display());
        let output = Command::new(go)
            .args(["list", "-m", "all"])
            .current_dir(dir)
            .output()
            .map_err(|e| WeaveError::command(&command, e.to_string()))?;
        if !output.status.success() {
            return Err(WeaveError::command(
                command,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(Self::parse(&String::from_utf8_lossy(&output.stdout)))
    }

    /// The module providing `import_path`: the longest matching module path.
    pub fn resolve(&self, import_path: &str) -> Option<(&str, Option<&str>)> {
        self.modules
            .iter()
            .filter(|(path, _)| {
                import_path == path
                    || import_path
                        .strip_prefix(path.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(path, _)| path.len())
            .map(|(path, version)| (path.as_str(), version.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Root of the module cache: `$GOMODCACHE`, else `go env GOMODCACHE`.
pub fn module_cache(go: &str) -> WeaveResult<PathBuf> {
    if let Ok(cache) = std::env::var("GOMODCACHE") {
        if !cache.trim().is_empty() {
            return Ok(PathBuf::from(cache.trim()));
        }
    }
    let command = format!("{} env GOMODCACHE", go);
    let output = Command::new(go)
        .args(["env", "GOMODCACHE"])
        .output()
        .map_err(|e| WeaveError::command(&command, e.to_string()))?;
    if !output.status.success() {
        return Err(WeaveError::command(
            command,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(PathBuf::from(String::from_utf8_lossy(&output.stdout).trim()))
}

/// Module cache escaping: each upper-case letter becomes `!` + lower case.
pub fn escape_module_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// The module directive of a go.mod file.
pub fn module_directive(go_mod: &str) -> Option<String> {
    go_mod.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.split("//").next().unwrap_or("").trim();
        let path = path.trim_matches(|c| c == '"' || c == '`');
        (!path.is_empty()).then(|| path.to_string())
    })
}

/// The nearest module containing `dir`.
pub fn find_enclosing_module(dir: &Path) -> WeaveResult<Option<ModuleInfo>> {
    for ancestor in dir.ancestors() {
        let go_mod = ancestor.join("go.mod");
        if !go_mod.is_file() {
            continue;
        }
        let content = fs::read_to_string(&go_mod)?;
        let path = module_directive(&content).ok_or_else(|| {
            WeaveError::config(format!("{} has no module directive", go_mod.display()))
        })?;
        return Ok(Some(ModuleInfo {
            path,
            version: version_from_dir(ancestor),
            root: ancestor.to_path_buf(),
        }));
    }
    Ok(None)
}

/// `v1.2.3` from a cache directory named `name@v1.2.3`.
fn version_from_dir(dir: &Path) -> Option<String> {
    let name = dir.file_name()?.to_str()?;
    let (_, version) = name.rsplit_once('@')?;
    (!version.is_empty()).then(|| version.to_string())
}
