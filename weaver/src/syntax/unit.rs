//! Target compilation units: one parsed `.go` file of the package being woven.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::comments::CommentIndex;
use super::decl::Declaration;
use super::lift::lift;
use super::{first_error_line, node_text, parse};
use crate::error::{WeaveError, WeaveResult};

/// A top-level declaration plus any comment text floating above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Comments between the previous item and this one's doc group
    pub floating: Option<String>,
    pub decl: Declaration,
}

impl Item {
    pub fn new(decl: Declaration) -> Self {
        Self {
            floating: None,
            decl,
        }
    }
}

/// One Go source file, split into a preamble and top-level items.
#[derive(Debug, Clone)]
pub struct TargetUnit {
    path: PathBuf,
    package: String,
    source: String,
    /// Everything up to and including the package clause
    preamble: String,
    items: Vec<Item>,
    /// Comments after the last declaration
    epilogue: Option<String>,
    error_line: Option<usize>,
    modified: bool,
}

impl TargetUnit {
    /// Parse a unit. Syntax errors are recorded, not raised; a missing
    /// package clause is the only fatal condition.
    pub fn parse(path: impl Into<PathBuf>, source: impl Into<String>) -> WeaveResult<Self> {
        let path = path.into();
        let source = source.into();
        let file = path.display().to_string();

        let tree = parse(&source).map_err(|e| match e {
            WeaveError::Syntax { line, message, .. } => WeaveError::syntax(&file, line, message),
            other => other,
        })?;
        let root = tree.root_node();
        let comments = CommentIndex::collect(root, &source);
        let mut error_line = first_error_line(root);

        let mut package = None;
        let mut preamble_end = 0;
        let mut prev_end = 0;
        let mut items = Vec::new();

        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            match node.kind() {
                "comment" => {}
                "package_clause" => {
                    package = package_name(node, &source);
                    prev_end = end_with_trailing(node, &comments);
                    preamble_end = prev_end;
                }
                kind => match lift(node, &source, &comments) {
                    Some(decl) => {
                        let lead = comments
                            .slice(comments.doc_group(node))
                            .first()
                            .map_or(node.start_byte(), |c| c.start_byte);
                        let floating = source
                            .get(prev_end..lead.max(prev_end))
                            .map(str::trim)
                            .filter(|text| !text.is_empty())
                            .map(str::to_string);
                        prev_end = end_with_trailing(node, &comments);
                        items.push(Item { floating, decl });
                    }
                    None => {
                        let line = node.start_position().row + 1;
                        warn!("{}:{}: unsupported top-level `{}`", file, line, kind);
                        error_line.get_or_insert(line);
                        prev_end = node.end_byte();
                    }
                },
            }
        }

        let package = package
            .ok_or_else(|| WeaveError::syntax(&file, 1, "missing package clause"))?;
        let preamble = source[..preamble_end].trim_end().to_string();
        let epilogue = source
            .get(prev_end..)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        debug!(
            "Parsed {} (package {}, {} declarations)",
            file,
            package,
            items.len()
        );

        Ok(Self {
            path,
            package,
            source,
            preamble,
            items,
            epilogue,
            error_line,
            modified: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the file, e.g. `server.go`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.items.iter().map(|item| &item.decl)
    }

    /// Every top-level name, in source order.
    pub fn declaration_names(&self) -> Vec<String> {
        self.declarations()
            .flat_map(|d| d.names())
            .map(str::to_string)
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.error_line.is_some()
    }

    pub fn error_line(&self) -> Option<usize> {
        self.error_line
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Item> {
        &mut self.items
    }

    pub(crate) fn take_items(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.items)
    }

    /// Install the transformed items. Comments left over after the last item
    /// go in front of the epilogue.
    pub(crate) fn set_items(&mut self, items: Vec<Item>, leftover: Option<String>) {
        self.items = items;
        if let Some(leftover) = leftover {
            self.epilogue = Some(match self.epilogue.take() {
                Some(epilogue) => format!("{}\n\n{}", leftover, epilogue),
                None => leftover,
            });
        }
        self.modified = true;
    }

    /// The unit as Go source.
    ///
    /// Untouched units come back byte for byte. Transformed units are
    /// re-emitted with one blank line between declarations; a formatter can
    /// normalise the rest.
    pub fn render(&self) -> String {
        if !self.modified {
            return self.source.clone();
        }

        let mut out = self.preamble.clone();
        for item in &self.items {
            out.push_str("\n\n");
            if let Some(floating) = &item.floating {
                out.push_str(floating);
                out.push_str("\n\n");
            }
            out.push_str(&item.decl.render());
        }
        if let Some(epilogue) = &self.epilogue {
            out.push_str("\n\n");
            out.push_str(epilogue);
        }
        out.push('\n');
        out
    }
}

fn package_name(clause: tree_sitter::Node, source: &str) -> Option<String> {
    let mut cursor = clause.walk();
    let name = clause
        .named_children(&mut cursor)
        .find(|c| c.kind() == "package_identifier")
        .map(|c| node_text(c, source).to_string());
    name
}

fn end_with_trailing(node: tree_sitter::Node, comments: &CommentIndex) -> usize {
    comments
        .trailing(node)
        .and_then(|i| comments.get(i))
        .map_or(node.end_byte(), |c| c.end_byte.max(node.end_byte()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = r#"// Package demo is a demo.
package demo // trailing

import "fmt"

// Detached note.

// Hello greets.
func Hello() string {
	return "Hello"
}

var (
	a = 1
	b = 2
)

// end of file
"#;

    #[test]
    fn test_parse_unit() {
        let unit = TargetUnit::parse("pkg/server.go", SERVER).unwrap();
        assert_eq!(unit.package(), "demo");
        assert_eq!(unit.file_name(), "server.go");
        assert!(!unit.has_errors());
        assert_eq!(unit.items().len(), 3);
        assert_eq!(unit.declaration_names(), vec!["Hello", "a", "b"]);
        assert_eq!(unit.items()[1].floating.as_deref(), Some("// Detached note."));
        assert_eq!(unit.items()[1].decl.doc(), Some("// Hello greets."));
    }

    #[test]
    fn test_untouched_unit_renders_verbatim() {
        let unit = TargetUnit::parse("server.go", SERVER).unwrap();
        assert_eq!(unit.render(), SERVER);
    }

    #[test]
    fn test_modified_unit_keeps_comments() {
        let mut unit = TargetUnit::parse("server.go", SERVER).unwrap();
        let items = unit.take_items();
        unit.set_items(items, None);
        let out = unit.render();
        assert!(out.starts_with("// Package demo is a demo.\npackage demo // trailing\n\nimport \"fmt\""));
        assert!(out.contains("// Detached note.\n\n// Hello greets.\nfunc Hello() string {"));
        assert!(out.contains("var (\n\ta = 1\n\tb = 2\n)"));
        assert!(out.trim_end().ends_with("// end of file"));
    }

    #[test]
    fn test_missing_package_clause_is_fatal() {
        let err = TargetUnit::parse("x.go", "func main() {}\n").unwrap_err();
        assert!(err.to_string().contains("missing package clause"));
    }

    #[test]
    fn test_syntax_errors_are_recorded() {
        let unit = TargetUnit::parse("bad.go", "package p\n\nfunc broken( {\n").unwrap();
        assert!(unit.has_errors());
        assert!(unit.error_line().is_some());
    }
}
