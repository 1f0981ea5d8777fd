//! Weaver error types
//!
//! Two tiers of failure exist. [`WeaveError`] is fatal: it aborts the whole
//! run (malformed annotations, package resolution, missing files).
//! [`TransformError`] is contained at the compilation-unit boundary: the
//! offending unit is skipped and the run continues.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fatal weaver operations
pub type WeaveResult<T> = Result<T, WeaveError>;

/// Fatal configuration errors. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum WeaveError {
    /// An annotation comment was recognised but its syntax is wrong
    #[error("Malformed annotation in {file}:{line}: {message} (text: {text:?})")]
    MalformedAnnotation {
        file: String,
        line: usize,
        text: String,
        message: String,
    },

    /// An annotated declaration group has no specs, so it cannot be named
    #[error("Declaration group in {file}:{line} has no specs")]
    EmptyDeclarationGroup { file: String, line: usize },

    /// Source that must parse cleanly did not
    #[error("Syntax error in {file}:{line}: {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },

    /// The package identifier resolved to zero or several packages
    #[error("Package {package:?} resolved to {found} packages (expected exactly 1)")]
    PackageResolution { package: String, found: usize },

    /// Weave files declare different target packages
    #[error("Weave files declare conflicting target packages: {}", .declared.join(", "))]
    AmbiguousPackage { declared: Vec<String> },

    /// No package identifier was given and no weave file declares one
    #[error("No target package given and no weave file declares a packageFQN")]
    MissingPackage,

    /// The loaded package does not live inside a Go module
    #[error("Package directory {dir} is not inside a Go module (no go.mod found)")]
    NotInModule { dir: PathBuf },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// An external command (go, gofmt) failed
    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// The tree-sitter grammar could not be loaded
    #[error("Failed to load Go grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl WeaveError {
    /// Create a malformed annotation error
    pub fn malformed_annotation(
        file: impl Into<String>,
        line: usize,
        text: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedAnnotation {
            file: file.into(),
            line,
            text: text.into(),
            message: message.into(),
        }
    }

    /// Create a syntax error
    pub fn syntax(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a package resolution error
    pub fn package_resolution(package: impl Into<String>, found: usize) -> Self {
        Self::PackageResolution {
            package: package.into(),
            found,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a command error
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Attach a location to annotation errors raised by the context-free classifier.
    pub fn at(self, name: &str, at_line: usize) -> Self {
        match self {
            Self::MalformedAnnotation {
                file, text, message, ..
            } if file.is_empty() => Self::MalformedAnnotation {
                file: name.to_string(),
                line: at_line,
                text,
                message,
            },
            other => other,
        }
    }

    /// Get a hint for fixing this error, printed by the CLI
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MalformedAnnotation { .. } => Some(
                "Directive annotations take exactly one argument, e.g. \
                 `// +weaver packageFQN github.com/org/module/pkg`",
            ),
            Self::EmptyDeclarationGroup { .. } => {
                Some("Remove the annotation from the empty group or add a spec to it")
            }
            Self::PackageResolution { found: 0, .. } => Some(
                "Pass a package directory, or an import path listed by `go list -m all` \
                 in the current module",
            ),
            Self::PackageResolution { .. } => {
                Some("Every non-test .go file in the directory must declare the same package")
            }
            Self::AmbiguousPackage { .. } => {
                Some("Weave one package per run, or pass --package explicitly")
            }
            Self::MissingPackage => Some(
                "Pass --package or add `// +weaver packageFQN <import path>` to a weave file",
            ),
            Self::NotInModule { .. } => {
                Some("Use --out to write to a plain directory instead of redirecting a module")
            }
            _ => None,
        }
    }
}

/// Structural faults raised while transforming one compilation unit.
///
/// These never abort the run: the orchestrator logs them and skips the unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The unit did not parse cleanly, so its declarations cannot be trusted
    #[error("{file} has syntax errors near line {line}")]
    Syntax { file: String, line: usize },

    /// A replacement cannot be spliced where its target sits
    #[error("cannot splice {found} `{name}` into a `{expected}` group")]
    KindMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// The transform panicked; the payload message is kept for the log
    #[error("transform panicked: {message}")]
    Panicked { message: String },
}

impl TransformError {
    /// Create a kind mismatch error
    pub fn kind_mismatch(
        name: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::KindMismatch {
            name: name.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}
