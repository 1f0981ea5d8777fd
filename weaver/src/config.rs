//! Run configuration
//!
//! Layers, lowest first: defaults, an optional TOML file, `WEAVER_*`
//! environment variables, then command-line overrides applied by the binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::WeaveResult;
use crate::persist::{DirectoryWriter, Formatter, ModuleRedirector, Persistence, RedirectConfig};

/// Configuration for one weaving run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaverConfig {
    /// Target package: directory or import path. Falls back to packageFQN.
    pub package: Option<String>,
    /// Weave files, in load order
    pub weave_files: Vec<PathBuf>,
    /// Directory whose non-test `.go` files are all weave files
    pub weave_dir: Option<PathBuf>,
    /// Write units here instead of redirecting the module
    pub output_dir: Option<PathBuf>,
    /// Suffix for the redirected module copy
    pub tag: String,
    /// Parent of redirected module copies
    pub write_root: Option<PathBuf>,
    /// go.mod receiving the replace directive
    pub go_mod: PathBuf,
    /// Run transformed units through `format_command`
    pub format: bool,
    pub format_command: String,
    /// The `go` binary used for module resolution
    pub go_command: String,
    /// Base for relative paths
    pub working_dir: PathBuf,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            package: None,
            weave_files: Vec::new(),
            weave_dir: None,
            output_dir: None,
            tag: "woven".to_string(),
            write_root: None,
            go_mod: PathBuf::from("go.mod"),
            format: false,
            format_command: "gofmt".to_string(),
            go_command: "go".to_string(),
            working_dir: PathBuf::from("."),
        }
    }
}

impl WeaverConfig {
    /// Load a TOML config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> WeaveResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Defaults overridden by `WEAVER_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Override fields from environment-style variables.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(package) = var("WEAVER_PACKAGE") {
            self.package = Some(package);
        }
        if let Some(dir) = var("WEAVER_WEAVE_DIR") {
            self.weave_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = var("WEAVER_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(tag) = var("WEAVER_TAG") {
            self.tag = tag;
        }
        if let Some(root) = var("WEAVER_WRITE_ROOT") {
            self.write_root = Some(PathBuf::from(root));
        }
        if let Some(path) = var("WEAVER_GO_MOD") {
            self.go_mod = PathBuf::from(path);
        }
        if let Some(val) = var("WEAVER_FORMAT") {
            self.format = val.to_lowercase() == "true" || val == "1";
        }
        if let Some(command) = var("WEAVER_FORMAT_COMMAND") {
            self.format_command = command;
        }
        if let Some(command) = var("WEAVER_GO") {
            self.go_command = command;
        }
        if let Some(dir) = var("WEAVER_WORKING_DIR") {
            self.working_dir = PathBuf::from(dir);
        }
    }

    /// Resolve paths relative to the working directory
    pub fn resolve_paths(&mut self) {
        let base = self.working_dir.clone();
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        self.weave_files.iter_mut().for_each(resolve);
        if let Some(dir) = self.weave_dir.as_mut() {
            resolve(dir);
        }
        if let Some(dir) = self.output_dir.as_mut() {
            resolve(dir);
        }
        if let Some(dir) = self.write_root.as_mut() {
            resolve(dir);
        }
        resolve(&mut self.go_mod);
    }

    pub fn formatter(&self) -> Formatter {
        if self.format {
            Formatter::command(&self.format_command)
        } else {
            Formatter::none()
        }
    }

    pub fn redirect_config(&self) -> RedirectConfig {
        RedirectConfig {
            tag: self.tag.clone(),
            write_root: self.write_root.clone(),
            go_mod: self.go_mod.clone(),
        }
    }

    /// Directory writer when `output_dir` is set, module redirection otherwise.
    pub fn persistence(&self) -> Box<dyn Persistence> {
        match &self.output_dir {
            Some(dir) => Box::new(DirectoryWriter::new(dir, self.formatter())),
            None => Box::new(ModuleRedirector::new(
                self.redirect_config(),
                self.formatter(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = WeaverConfig::default();
        assert_eq!(config.tag, "woven");
        assert_eq!(config.go_mod, PathBuf::from("go.mod"));
        assert!(!config.format);
        assert!(!config.formatter().is_enabled());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("WEAVER_TAG", "patched"),
            ("WEAVER_FORMAT", "TRUE"),
            ("WEAVER_OUTPUT_DIR", "/tmp/out"),
        ]
        .into_iter()
        .collect();
        let mut config = WeaverConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.tag, "patched");
        assert!(config.format);
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(config.go_command, "go");
    }

    #[test]
    fn test_from_file_keeps_defaults_for_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weaver.toml");
        fs::write(
            &path,
            "package = \"example.com/demo\"\nweave_files = [\"w/server.go\"]\nformat = true\n",
        )
        .unwrap();

        let config = WeaverConfig::from_file(&path).unwrap();
        assert_eq!(config.package.as_deref(), Some("example.com/demo"));
        assert_eq!(config.weave_files, vec![PathBuf::from("w/server.go")]);
        assert!(config.format);
        assert_eq!(config.tag, "woven");
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weaver.toml");
        fs::write(&path, "format = [").unwrap();
        assert!(WeaverConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = WeaverConfig {
            working_dir: PathBuf::from("/work"),
            weave_files: vec![PathBuf::from("a.go"), PathBuf::from("/abs/b.go")],
            output_dir: Some(PathBuf::from("out")),
            ..WeaverConfig::default()
        };
        config.resolve_paths();
        assert_eq!(
            config.weave_files,
            vec![PathBuf::from("/work/a.go"), PathBuf::from("/abs/b.go")]
        );
        assert_eq!(config.output_dir, Some(PathBuf::from("/work/out")));
        assert_eq!(config.go_mod, PathBuf::from("/work/go.mod"));
    }
}
