//! Lift tree-sitter nodes into [`Declaration`]s.

use tree_sitter::Node;

use super::comments::CommentIndex;
use super::decl::{
    Declaration, FuncDecl, ImportGroup, ImportSpec, Keyword, MethodDecl, Spec, SpecGroup,
};
use super::node_text;

/// Lift a top-level node. Returns `None` for nodes that are not declarations.
pub fn lift(node: Node, source: &str, comments: &CommentIndex) -> Option<Declaration> {
    match node.kind() {
        "function_declaration" => lift_function(node, source, comments).map(Declaration::Function),
        "method_declaration" => lift_method(node, source, comments).map(Declaration::Method),
        "import_declaration" => Some(Declaration::Import(lift_import_group(
            node, source, comments,
        ))),
        kind => Keyword::from_node_kind(kind).map(|keyword| {
            Declaration::from_spec_group(lift_spec_group(node, keyword, source, comments))
        }),
    }
}

pub fn lift_function(node: Node, source: &str, comments: &CommentIndex) -> Option<FuncDecl> {
    let name = node.child_by_field_name("name")?;
    Some(FuncDecl {
        name: node_text(name, source).to_string(),
        doc: comments.text_of(comments.doc_group(node), source),
        source: node_text(node, source).to_string(),
        trailing: trailing_text(node, source, comments),
        name_span: relative_span(node, name),
    })
}

pub fn lift_method(node: Node, source: &str, comments: &CommentIndex) -> Option<MethodDecl> {
    let receiver = node
        .child_by_field_name("receiver")
        .map(|r| receiver_type(r, source))
        .unwrap_or_default();
    Some(MethodDecl {
        receiver,
        func: lift_function(node, source, comments)?,
    })
}

fn receiver_type(receiver: Node, source: &str) -> String {
    let mut cursor = receiver.walk();
    let declared = receiver
        .named_children(&mut cursor)
        .find(|c| c.kind() == "parameter_declaration")
        .and_then(|p| p.child_by_field_name("type"));
    match declared {
        Some(ty) => node_text(ty, source).to_string(),
        None => node_text(receiver, source)
            .trim_matches(|c| c == '(' || c == ')')
            .trim()
            .to_string(),
    }
}

/// Spec nodes of a general declaration, in source order, through any spec lists.
pub fn spec_nodes<'t>(decl: Node<'t>) -> Vec<Node<'t>> {
    let mut specs = Vec::new();
    collect_specs(decl, &mut specs);
    specs
}

fn collect_specs<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "type_spec" | "type_alias" | "var_spec" | "const_spec" | "import_spec" => {
                out.push(child)
            }
            kind if kind.ends_with("_spec_list") => collect_specs(child, out),
            _ => {}
        }
    }
}

/// Whether a general declaration is written with parentheses.
pub fn is_grouped(decl: Node) -> bool {
    let mut cursor = decl.walk();
    let grouped = decl
        .children(&mut cursor)
        .any(|c| c.kind() == "(" || c.kind().ends_with("_spec_list"));
    grouped
}

pub fn lift_spec_group(
    node: Node,
    keyword: Keyword,
    source: &str,
    comments: &CommentIndex,
) -> SpecGroup {
    let grouped = is_grouped(node);
    let specs = spec_nodes(node)
        .into_iter()
        .map(|spec| lift_spec(spec, source, comments, grouped))
        .collect();
    SpecGroup {
        keyword,
        doc: comments.text_of(comments.doc_group(node), source),
        specs,
        grouped,
        // An ungrouped declaration ends with its spec; the spec owns the comment.
        trailing: grouped
            .then(|| trailing_text(node, source, comments))
            .flatten(),
    }
}

/// Lift one spec. `in_group` decides whether it can own a doc comment.
pub fn lift_spec(node: Node, source: &str, comments: &CommentIndex, in_group: bool) -> Spec {
    let idents: Vec<Node> = match node.kind() {
        "type_spec" | "type_alias" => node.child_by_field_name("name").into_iter().collect(),
        _ => {
            let mut cursor = node.walk();
            let names: Vec<Node> = node
                .children_by_field_name("name", &mut cursor)
                .filter(|n| n.kind() == "identifier")
                .collect();
            names
        }
    };
    Spec {
        idents: idents
            .iter()
            .map(|n| node_text(*n, source).to_string())
            .collect(),
        doc: in_group
            .then(|| comments.text_of(comments.doc_group(node), source))
            .flatten(),
        source: node_text(node, source).to_string(),
        trailing: trailing_text(node, source, comments),
        name_span: idents.first().map(|first| relative_span(node, *first)),
    }
}

pub fn lift_import_group(node: Node, source: &str, comments: &CommentIndex) -> ImportGroup {
    let grouped = is_grouped(node);
    ImportGroup {
        doc: comments.text_of(comments.doc_group(node), source),
        specs: spec_nodes(node)
            .into_iter()
            .map(|spec| lift_import_spec(spec, source, comments, grouped))
            .collect(),
        grouped,
        trailing: grouped
            .then(|| trailing_text(node, source, comments))
            .flatten(),
    }
}

pub fn lift_import_spec(
    node: Node,
    source: &str,
    comments: &CommentIndex,
    in_group: bool,
) -> ImportSpec {
    let path = node
        .child_by_field_name("path")
        .map(|p| clean_import_path(node_text(p, source)))
        .unwrap_or_default();
    ImportSpec {
        alias: node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string()),
        path,
        doc: in_group
            .then(|| comments.text_of(comments.doc_group(node), source))
            .flatten(),
        source: node_text(node, source).to_string(),
        trailing: trailing_text(node, source, comments),
    }
}

/// Strip quotes, backquotes and backslashes from an import path literal.
pub fn clean_import_path(literal: &str) -> String {
    literal
        .chars()
        .filter(|c| !matches!(c, '"' | '`' | '\\'))
        .collect()
}

fn trailing_text(node: Node, source: &str, comments: &CommentIndex) -> Option<String> {
    let index = comments.trailing(node)?;
    comments.text_of(index..index + 1, source)
}

fn relative_span(outer: Node, inner: Node) -> std::ops::Range<usize> {
    let base = outer.start_byte();
    inner.start_byte() - base..inner.end_byte() - base
}
