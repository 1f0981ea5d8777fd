//! Go syntax layer built on tree-sitter-go.
//!
//! Parses Go source, indexes its comments, and lifts top-level nodes into the
//! closed [`Declaration`] type used by both weave extraction and the
//! transform engine. Everything downstream works on declaration text
//! captured verbatim from the source; nothing is re-printed from an AST.

pub mod comments;
pub mod decl;
pub mod lift;
pub mod unit;

pub use comments::{Comment, CommentIndex};
pub use decl::{
    Declaration, FuncDecl, ImportGroup, ImportSpec, Keyword, MethodDecl, Spec, SpecGroup,
    ORIGINAL_SUFFIX,
};
pub use unit::{Item, TargetUnit};

use crate::error::{WeaveError, WeaveResult};
use tree_sitter::{Node, Parser, Tree};

/// Parse Go source into a tree-sitter tree.
///
/// tree-sitter is error tolerant: a tree is returned for broken input too.
/// Use [`first_error_line`] to find out whether the parse was clean.
pub fn parse(source: &str) -> WeaveResult<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
    parser
        .parse(source, None)
        .ok_or_else(|| WeaveError::syntax("", 0, "parser produced no tree"))
}

/// 1-based line of the first error or missing node, if any.
pub fn first_error_line(root: Node) -> Option<usize> {
    first_error(root).map(|node| node.start_position().row + 1)
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    // has_error() but no error child: the node itself is the best location
    Some(node)
}

/// Source text covered by a node.
pub(crate) fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}
