//! Package weaves: every weave set for one target package, by file name.

use ignore::WalkBuilder;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::set::WeaveSet;
use crate::error::{WeaveError, WeaveResult};

/// Weave sets keyed by target file name.
#[derive(Debug, Clone, Default)]
pub struct PackageWeave {
    weaves: BTreeMap<String, WeaveSet>,
}

impl PackageWeave {
    /// Load weave files. A later file with the same base name replaces an
    /// earlier one.
    pub fn load<P: AsRef<Path>>(files: &[P]) -> WeaveResult<Self> {
        let mut weave = Self::default();
        for file in files {
            weave.add(WeaveSet::from_file(file.as_ref())?);
        }
        info!("Loaded {} weave file(s)", weave.len());
        Ok(weave)
    }

    pub fn from_sets(sets: impl IntoIterator<Item = WeaveSet>) -> Self {
        let mut weave = Self::default();
        for set in sets {
            weave.add(set);
        }
        weave
    }

    fn add(&mut self, set: WeaveSet) {
        let key = normalize_file_name(set.file_name());
        if self.weaves.insert(key.clone(), set).is_some() {
            warn!("Weave file {} given twice, the later one wins", key);
        }
    }

    /// Non-test `.go` files directly inside `dir`, sorted.
    pub fn discover(dir: &Path) -> WeaveResult<Vec<PathBuf>> {
        go_files(dir)
    }

    /// The weave set for a target file, matched by extension-normalised name.
    pub fn for_file(&self, file_name: &str) -> Option<&WeaveSet> {
        self.weaves.get(&normalize_file_name(file_name))
    }

    /// The single package identity declared across all sets.
    pub fn declared_package(&self) -> WeaveResult<Option<&str>> {
        let declared: BTreeSet<&str> = self
            .weaves
            .values()
            .filter_map(WeaveSet::package_identity)
            .collect();
        match declared.len() {
            0 => Ok(None),
            1 => Ok(declared.into_iter().next()),
            _ => Err(WeaveError::AmbiguousPackage {
                declared: declared.into_iter().map(str::to_string).collect(),
            }),
        }
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.weaves.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weaves.is_empty()
    }
}

/// Base name with a `.go` extension.
pub fn normalize_file_name(file_name: &str) -> String {
    let base = Path::new(file_name.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if base.ends_with(".go") {
        base
    } else {
        format!("{}.go", base)
    }
}

/// Non-test `.go` files directly inside `dir`, sorted by path.
pub(crate) fn go_files(dir: &Path) -> WeaveResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(dir)
        .max_depth(Some(1))
        .hidden(false)
        .git_ignore(false)
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| WeaveError::Io(std::io::Error::other(e)))?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.ends_with(".go") && !name.ends_with("_test.go") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn set(name: &str, identity: Option<&str>) -> WeaveSet {
        let mut set = WeaveSet::new(name);
        if let Some(identity) = identity {
            set.set_package_identity(identity);
        }
        set
    }

    #[test]
    fn test_normalize_file_name() {
        assert_eq!(normalize_file_name("server.go"), "server.go");
        assert_eq!(normalize_file_name("server"), "server.go");
        assert_eq!(normalize_file_name("pkg/server.go"), "server.go");
    }

    #[test]
    fn test_lookup_by_file_name() {
        let weave = PackageWeave::from_sets([set("server.go", None)]);
        assert!(weave.for_file("server.go").is_some());
        assert!(weave.for_file("/tmp/pkg/server.go").is_some());
        assert!(weave.for_file("client.go").is_none());
    }

    #[test]
    fn test_declared_package() {
        let weave = PackageWeave::from_sets([set("a.go", Some("x/y")), set("b.go", None)]);
        assert_eq!(weave.declared_package().unwrap(), Some("x/y"));

        let weave = PackageWeave::from_sets([set("a.go", Some("x/y")), set("b.go", Some("x/z"))]);
        assert!(matches!(
            weave.declared_package(),
            Err(WeaveError::AmbiguousPackage { .. })
        ));

        let weave = PackageWeave::from_sets([set("a.go", None)]);
        assert_eq!(weave.declared_package().unwrap(), None);
    }

    #[test]
    fn test_duplicate_file_name_later_wins() {
        let weave = PackageWeave::from_sets([set("a.go", Some("first")), set("a.go", Some("second"))]);
        assert_eq!(weave.len(), 1);
        assert_eq!(weave.for_file("a.go").unwrap().package_identity(), Some("second"));
    }

    #[test]
    fn test_discover_skips_tests_and_subdirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.go"), "package p\n").unwrap();
        fs::write(dir.path().join("a.go"), "package p\n").unwrap();
        fs::write(dir.path().join("a_test.go"), "package p\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.go"), "package sub\n").unwrap();

        let files = PackageWeave::discover(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.go", "b.go"]);
    }
}
