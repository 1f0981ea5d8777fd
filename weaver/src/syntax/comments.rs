//! Comment index: every comment of a file, with Go's attachment rules.
//!
//! tree-sitter treats comments as extras that float between nodes, so
//! attachment is recomputed from positions:
//!
//! - a *doc group* is the run of own-line comments on adjacent lines that
//!   ends on the line directly above a node;
//! - a *trailing* comment starts on the row where a node ends.

use std::ops::Range;
use tree_sitter::Node;

use super::node_text;

/// One comment node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Raw text, leader included (`// ...` or `/* ... */`).
    pub text: String,
    pub start_byte: usize,
    pub end_byte: usize,
    /// 0-indexed
    pub start_row: usize,
    /// 0-indexed
    pub end_row: usize,
    /// Only whitespace precedes the comment on its first line.
    pub own_line: bool,
}

impl Comment {
    fn from_node(node: Node, source: &str) -> Self {
        let start_byte = node.start_byte();
        let line_start = source[..start_byte].rfind('\n').map_or(0, |i| i + 1);
        let own_line = source[line_start..start_byte].trim().is_empty();
        Self {
            text: node_text(node, source).to_string(),
            start_byte,
            end_byte: node.end_byte(),
            start_row: node.start_position().row,
            end_row: node.end_position().row,
            own_line,
        }
    }
}

/// All comments of one file, ordered by position.
#[derive(Debug, Clone, Default)]
pub struct CommentIndex {
    comments: Vec<Comment>,
}

impl CommentIndex {
    /// Collect every comment under `root`.
    pub fn collect(root: Node, source: &str) -> Self {
        let mut comments = Vec::new();
        Self::walk(root, source, &mut comments);
        comments.sort_by_key(|c| c.start_byte);
        Self { comments }
    }

    fn walk(node: Node, source: &str, out: &mut Vec<Comment>) {
        if node.kind() == "comment" {
            out.push(Comment::from_node(node, source));
            return;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            Self::walk(child, source, out);
        }
    }

    pub fn all(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Comment> {
        self.comments.get(index)
    }

    pub fn slice(&self, range: Range<usize>) -> &[Comment] {
        self.comments.get(range).unwrap_or(&[])
    }

    /// Indices of the doc comment group attached to `node` (empty when none).
    pub fn doc_group(&self, node: Node) -> Range<usize> {
        let node_row = node.start_position().row;
        let end = self
            .comments
            .partition_point(|c| c.end_byte <= node.start_byte());
        if end == 0 {
            return 0..0;
        }

        let last = &self.comments[end - 1];
        if !last.own_line || last.end_row + 1 != node_row {
            return end..end;
        }

        let mut start = end - 1;
        while start > 0 {
            let prev = &self.comments[start - 1];
            if prev.own_line && prev.end_row + 1 >= self.comments[start].start_row {
                start -= 1;
            } else {
                break;
            }
        }
        start..end
    }

    /// Index of the comment trailing `node` on its last line, if any.
    pub fn trailing(&self, node: Node) -> Option<usize> {
        let end_row = node.end_position().row;
        let idx = self
            .comments
            .partition_point(|c| c.start_byte < node.end_byte());

        if let Some(next) = self.comments.get(idx) {
            if next.start_row == end_row {
                return Some(idx);
            }
        }

        // The parser may have kept the comment inside the node.
        if idx > 0 {
            let last = &self.comments[idx - 1];
            if last.end_byte == node.end_byte()
                && last.start_byte > node.start_byte()
                && last.start_row == end_row
                && !last.own_line
            {
                return Some(idx - 1);
            }
        }
        None
    }

    /// Verbatim source of a comment range, from the first comment to the last.
    pub fn text_of(&self, range: Range<usize>, source: &str) -> Option<String> {
        let group = self.slice(range);
        let (first, last) = (group.first()?, group.last()?);
        source
            .get(first.start_byte..last.end_byte)
            .map(str::to_string)
    }
}
