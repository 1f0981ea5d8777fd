//! Annotation classifier: turns one comment line into a weave operation.
//!
//! Weave files mark declarations with comments such as `// +weaver insert`.
//! Two vocabularies are recognised:
//!
//! - canonical `+weaver`: `insert`, `delete`, `replace`,
//!   `replaceAndCallOriginal`, plus the `packageFQN` and `anchor` directives
//! - deprecated `+weaving`: `create` (read as insert), `replace`, `surround`
//!
//! Keyword matching is a case-insensitive suffix test in fixed precedence.
//! Directives must have exactly four whitespace-separated tokens, the comment
//! leader included: `// +weaver packageFQN github.com/org/mod/pkg`.

use crate::error::{WeaveError, WeaveResult};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{trace, warn};

/// Canonical annotation marker.
pub const MARKER: &str = "+weaver";
/// Deprecated annotation marker.
pub const LEGACY_MARKER: &str = "+weaving";

// Keywords are compared against lower-cased text, keep them lower case.
const INSERT: &str = "insert";
const DELETE: &str = "delete";
const REPLACE: &str = "replace";
const REPLACE_AND_CALL_ORIGINAL: &str = "replaceandcalloriginal";
const PACKAGE_FQN: &str = "packagefqn";
const ANCHOR: &str = "anchor";
const LEGACY_CREATE: &str = "create";
const LEGACY_SURROUND: &str = "surround";

/// Token count of a directive: leader, marker, keyword, argument.
const DIRECTIVE_TOKENS: usize = 4;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE regex should compile"));

/// What one comment line asks the weaver to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// Not an annotation.
    Nop,
    Insert,
    Delete,
    Replace,
    ReplaceAndCallOriginal,
    /// Declares the import path of the package the weave file targets.
    PackageFqn(String),
    /// Declares the target declaration that inserts are spliced before.
    Anchor(String),
    /// Legacy `+weaving surround`. Recognised, never applied.
    Surround,
}

/// The four operations a declaration can be recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Delete,
    Replace,
    ReplaceAndCallOriginal,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Delete => write!(f, "delete"),
            Self::Replace => write!(f, "replace"),
            Self::ReplaceAndCallOriginal => write!(f, "replaceAndCallOriginal"),
        }
    }
}

impl Annotation {
    pub fn is_nop(&self) -> bool {
        matches!(self, Self::Nop)
    }

    /// The declaration operation this annotation asks for, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Insert => Some(Operation::Insert),
            Self::Delete => Some(Operation::Delete),
            Self::Replace => Some(Operation::Replace),
            Self::ReplaceAndCallOriginal => Some(Operation::ReplaceAndCallOriginal),
            Self::Nop | Self::PackageFqn(_) | Self::Anchor(_) | Self::Surround => None,
        }
    }
}

/// Classify one comment line.
///
/// The line is the raw comment text (leader included). Errors carry no file
/// location; callers attach one with [`WeaveError::at`].
pub fn classify(line: &str) -> WeaveResult<Annotation> {
    let raw = line.trim();
    let raw = raw.strip_suffix("*/").map(str::trim_end).unwrap_or(raw);
    let normalized = raw.to_lowercase();

    if normalized.contains(MARKER) {
        classify_canonical(raw, &normalized)
    } else if normalized.contains(LEGACY_MARKER) {
        Ok(classify_legacy(raw, &normalized))
    } else {
        Ok(Annotation::Nop)
    }
}

fn classify_canonical(raw: &str, normalized: &str) -> WeaveResult<Annotation> {
    // Directives are recognised by the keyword after the marker, so an
    // argument such as `Insert` is never read as an operation suffix.
    match directive_keyword(normalized) {
        Some(PACKAGE_FQN) => {
            return Ok(Annotation::PackageFqn(directive_argument(raw, PACKAGE_FQN)?))
        }
        Some(ANCHOR) => return Ok(Annotation::Anchor(directive_argument(raw, ANCHOR)?)),
        _ => {}
    }

    let annotation = if normalized.ends_with(INSERT) {
        Annotation::Insert
    } else if normalized.ends_with(DELETE) {
        Annotation::Delete
    } else if normalized.ends_with(REPLACE) {
        Annotation::Replace
    } else if normalized.ends_with(REPLACE_AND_CALL_ORIGINAL) {
        Annotation::ReplaceAndCallOriginal
    } else if normalized.contains(PACKAGE_FQN) {
        Annotation::PackageFqn(directive_argument(raw, PACKAGE_FQN)?)
    } else if normalized.contains(ANCHOR) {
        Annotation::Anchor(directive_argument(raw, ANCHOR)?)
    } else {
        trace!("classify: marker without a known keyword: {}", raw);
        Annotation::Nop
    };
    Ok(annotation)
}

fn classify_legacy(raw: &str, normalized: &str) -> Annotation {
    let annotation = if normalized.ends_with(LEGACY_CREATE) {
        Annotation::Insert
    } else if normalized.ends_with(LEGACY_SURROUND) {
        Annotation::Surround
    } else if normalized.ends_with(REPLACE) {
        Annotation::Replace
    } else {
        Annotation::Nop
    };
    if !annotation.is_nop() {
        warn!(
            "`{}` annotations are deprecated, use `{}` (found: {})",
            LEGACY_MARKER, MARKER, raw
        );
    }
    annotation
}

/// The directive keyword directly following the marker token, if any.
fn directive_keyword(normalized: &str) -> Option<&'static str> {
    let mut tokens = normalized.split_whitespace();
    tokens.find(|token| token.ends_with(MARKER))?;
    match tokens.next()? {
        PACKAGE_FQN => Some(PACKAGE_FQN),
        ANCHOR => Some(ANCHOR),
        _ => None,
    }
}

/// Extract the argument of a four-token directive, keeping its original case.
fn directive_argument(raw: &str, keyword: &str) -> WeaveResult<String> {
    let collapsed = WHITESPACE.replace_all(raw, " ");
    let tokens: Vec<&str> = collapsed.split(' ').collect();
    if tokens.len() != DIRECTIVE_TOKENS {
        for (i, token) in tokens.iter().enumerate() {
            trace!("directive_argument: i: {} token: {}", i, token);
        }
        return Err(WeaveError::malformed_annotation(
            "",
            0,
            raw,
            format!(
                "`{}` expects {} tokens, found {}",
                keyword,
                DIRECTIVE_TOKENS,
                tokens.len()
            ),
        ));
    }
    Ok(tokens[DIRECTIVE_TOKENS - 1].to_string())
}

/// Classify a run of comment lines: the first line that is not a `Nop` wins.
///
/// Later lines are never consulted, so a malformed directive after the first
/// match does not fail the load here.
pub fn classify_run<'a>(lines: impl IntoIterator<Item = &'a str>) -> WeaveResult<Annotation> {
    for line in lines {
        let annotation = classify(line)?;
        if !annotation.is_nop() {
            return Ok(annotation);
        }
    }
    Ok(Annotation::Nop)
}
