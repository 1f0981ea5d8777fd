//! Weave sets: the classified content of one weave file.

use std::fs;
use std::path::Path;
use tracing::{debug, info, trace, warn};
use tree_sitter::Node;

use super::ordered::DeclMap;
use crate::annotation::{classify_run, Annotation, Operation};
use crate::error::{WeaveError, WeaveResult};
use crate::syntax::lift::{lift, lift_import_group, lift_spec_group, spec_nodes};
use crate::syntax::{self, CommentIndex, Declaration, ImportSpec, Keyword, Spec, SpecGroup};

/// Key recorded for specs that bind several identifiers.
pub const UNKNOWN_NAME: &str = "<unknown>";

/// Everything one weave file asks for, keyed by declaration name.
///
/// A name lives in at most one of the four operation maps: the last
/// annotation seen for it wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeaveSet {
    file_name: String,
    inserts: DeclMap,
    deletes: DeclMap,
    replaces: DeclMap,
    replace_and_call_originals: DeclMap,
    import_adds: Vec<ImportSpec>,
    import_deletes: Vec<ImportSpec>,
    package_identity: Option<String>,
    anchor: Option<String>,
}

impl WeaveSet {
    /// An empty set for the named target file.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Load a weave file from disk.
    pub fn from_file(path: &Path) -> WeaveResult<Self> {
        let source = fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                WeaveError::config(format!("weave path {} has no file name", path.display()))
            })?;
        Self::from_source(&file_name, &source)
    }

    /// Classify the declarations of a weave file held in memory.
    pub fn from_source(file_name: &str, source: &str) -> WeaveResult<Self> {
        let tree = syntax::parse(source).map_err(|e| match e {
            WeaveError::Syntax { line, message, .. } => {
                WeaveError::syntax(file_name, line, message)
            }
            other => other,
        })?;
        let root = tree.root_node();
        if let Some(line) = syntax::first_error_line(root) {
            return Err(WeaveError::syntax(
                file_name,
                line,
                "weave files must parse cleanly",
            ));
        }

        let mut extractor = Extractor::new(file_name, source, root)?;
        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            extractor.visit(node)?;
        }
        let set = extractor.set;

        info!(
            "Loaded weave {}: {} insert, {} delete, {} replace, {} replaceAndCallOriginal, {} import add, {} import delete",
            set.file_name,
            set.inserts.len(),
            set.deletes.len(),
            set.replaces.len(),
            set.replace_and_call_originals.len(),
            set.import_adds.len(),
            set.import_deletes.len()
        );
        Ok(set)
    }

    /// Target file name (the weave file's base name).
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn inserts(&self) -> &DeclMap {
        &self.inserts
    }

    pub fn deletes(&self) -> &DeclMap {
        &self.deletes
    }

    pub fn replaces(&self) -> &DeclMap {
        &self.replaces
    }

    pub fn replace_and_call_originals(&self) -> &DeclMap {
        &self.replace_and_call_originals
    }

    pub fn import_adds(&self) -> &[ImportSpec] {
        &self.import_adds
    }

    pub fn import_deletes(&self) -> &[ImportSpec] {
        &self.import_deletes
    }

    /// Import path declared with `+weaver packageFQN`, if any.
    pub fn package_identity(&self) -> Option<&str> {
        self.package_identity.as_deref()
    }

    /// Insertion anchor declared with `+weaver anchor`, if any.
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// True when the set asks for no change at all.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.deletes.is_empty()
            && self.replaces.is_empty()
            && self.replace_and_call_originals.is_empty()
            && self.import_adds.is_empty()
            && self.import_deletes.is_empty()
    }

    /// Record a declaration under one operation, dropping the name from the
    /// other three.
    pub fn record(&mut self, op: Operation, name: impl Into<String>, decl: Declaration) {
        let name = name.into();
        for map in [
            &mut self.inserts,
            &mut self.deletes,
            &mut self.replaces,
            &mut self.replace_and_call_originals,
        ] {
            if map.remove(&name).is_some() {
                debug!("{}: `{}` re-annotated, last annotation wins", self.file_name, name);
            }
        }
        trace!("{}: {} `{}`", self.file_name, op, name);
        let map = match op {
            Operation::Insert => &mut self.inserts,
            Operation::Delete => &mut self.deletes,
            Operation::Replace => &mut self.replaces,
            Operation::ReplaceAndCallOriginal => &mut self.replace_and_call_originals,
        };
        map.insert(name, decl);
    }

    /// Record an import binding to add.
    pub fn add_import(&mut self, spec: ImportSpec) {
        self.import_adds.push(spec);
    }

    /// Record an import path to remove.
    pub fn delete_import(&mut self, spec: ImportSpec) {
        self.import_deletes.push(spec);
    }

    pub fn set_package_identity(&mut self, identity: impl Into<String>) {
        self.package_identity = Some(identity.into());
    }

    pub fn set_anchor(&mut self, anchor: impl Into<String>) {
        self.anchor = Some(anchor.into());
    }
}

/// Walks one weave file and fills a [`WeaveSet`].
struct Extractor<'s> {
    file_name: &'s str,
    source: &'s str,
    comments: CommentIndex,
    /// Classification of each comment, parallel to `comments`
    annotations: Vec<Annotation>,
    set: WeaveSet,
}

impl<'s> Extractor<'s> {
    fn new(file_name: &'s str, source: &'s str, root: Node) -> WeaveResult<Self> {
        let comments = CommentIndex::collect(root, source);
        let mut set = WeaveSet::new(file_name);
        let mut annotations = Vec::with_capacity(comments.len());

        for comment in comments.all() {
            let annotation = classify_run(comment.text.lines())
                .map_err(|e| e.at(file_name, comment.start_row + 1))?;
            match &annotation {
                Annotation::PackageFqn(identity) => {
                    debug!("{}: packageFQN {}", file_name, identity);
                    set.set_package_identity(identity.clone());
                }
                Annotation::Anchor(anchor) => {
                    debug!("{}: anchor {}", file_name, anchor);
                    set.set_anchor(anchor.clone());
                }
                _ => {}
            }
            annotations.push(annotation);
        }

        Ok(Self {
            file_name,
            source,
            comments,
            annotations,
            set,
        })
    }

    fn visit(&mut self, node: Node) -> WeaveResult<()> {
        match node.kind() {
            "function_declaration" | "method_declaration" => {
                self.visit_callable(node);
                Ok(())
            }
            "import_declaration" => self.visit_imports(node),
            kind => match Keyword::from_node_kind(kind) {
                Some(keyword) => self.visit_specs(node, keyword),
                None => Ok(()),
            },
        }
    }

    fn visit_callable(&mut self, node: Node) {
        let annotation = self.doc_annotation(node);
        let Some(op) = self.operation(&annotation, node) else {
            return;
        };
        let Some(decl) = lift(node, self.source, &self.comments) else {
            return;
        };
        if let Declaration::Method(method) = &decl {
            debug!(
                "{}: method `{}` on `{}` is matched by name only",
                self.file_name, method.func.name, method.receiver
            );
        }
        let name = decl.name().unwrap_or(UNKNOWN_NAME).to_string();
        self.set.record(op, name, decl);
    }

    fn visit_imports(&mut self, node: Node) -> WeaveResult<()> {
        let group_annotation = self.doc_annotation(node);
        let nodes = spec_nodes(node);
        if nodes.is_empty() {
            return self.empty_group(node, &group_annotation);
        }
        let group = lift_import_group(node, self.source, &self.comments);

        for (spec, spec_node) in group.specs.into_iter().zip(nodes) {
            let own = self.trailing_annotation(spec_node);
            let annotation = if own.is_nop() { &group_annotation } else { &own };
            match self.operation(annotation, spec_node) {
                Some(Operation::Insert) => {
                    debug!("{}: add import {}", self.file_name, spec.path);
                    self.set.add_import(spec);
                }
                Some(Operation::Delete) => {
                    debug!("{}: delete import {}", self.file_name, spec.path);
                    self.set.delete_import(spec);
                }
                Some(other) => debug!(
                    "{}: `{}` has no meaning on import {}, ignored",
                    self.file_name, other, spec.path
                ),
                None => {}
            }
        }
        Ok(())
    }

    /// An annotated group without specs has no name to record under.
    fn empty_group(&self, node: Node, annotation: &Annotation) -> WeaveResult<()> {
        if annotation.is_nop() {
            return Ok(());
        }
        Err(WeaveError::EmptyDeclarationGroup {
            file: self.file_name.to_string(),
            line: node.start_position().row + 1,
        })
    }

    fn visit_specs(&mut self, node: Node, keyword: Keyword) -> WeaveResult<()> {
        let group_annotation = self.doc_annotation(node);
        let nodes = spec_nodes(node);

        if nodes.is_empty() {
            return self.empty_group(node, &group_annotation);
        }

        let own: Vec<Annotation> = nodes.iter().map(|n| self.trailing_annotation(*n)).collect();
        if group_annotation.is_nop() && own.iter().all(Annotation::is_nop) {
            return Ok(());
        }

        let group = lift_spec_group(node, keyword, self.source, &self.comments);
        let group_op = self.operation(&group_annotation, node);
        let mut inherited: Vec<(Spec, usize)> = Vec::new();

        for ((spec, spec_node), annotation) in group.specs.into_iter().zip(&nodes).zip(&own) {
            let line = spec_node.start_position().row + 1;
            if !annotation.is_nop() {
                if let Some(op) = self.operation(annotation, *spec_node) {
                    let spec = with_group_doc(spec, group.grouped, group.doc.as_deref());
                    self.record_spec(op, keyword, spec, line);
                }
            } else if group_op.is_some() {
                inherited.push((spec, line));
            }
        }

        match group_op {
            Some(Operation::Insert) if group.grouped && !inherited.is_empty() => {
                let key = self.spec_key(&inherited[0].0, inherited[0].1);
                let specs = inherited.into_iter().map(|(spec, _)| spec).collect();
                let decl = Declaration::from_spec_group(SpecGroup {
                    keyword,
                    doc: group.doc,
                    specs,
                    grouped: true,
                    trailing: None,
                });
                self.set.record(Operation::Insert, key, decl);
            }
            Some(op) => {
                for (spec, line) in inherited {
                    let spec = with_group_doc(spec, group.grouped, group.doc.as_deref());
                    self.record_spec(op, keyword, spec, line);
                }
            }
            None => {}
        }
        Ok(())
    }

    fn record_spec(&mut self, op: Operation, keyword: Keyword, spec: Spec, line: usize) {
        let key = self.spec_key(&spec, line);
        let decl = Declaration::from_spec_group(SpecGroup::single(keyword, spec));
        self.set.record(op, key, decl);
    }

    fn spec_key(&self, spec: &Spec, line: usize) -> String {
        match spec.name() {
            Some(name) => name.to_string(),
            None => {
                warn!(
                    "{}:{}: spec binds {} identifiers ({}), recorded as {}",
                    self.file_name,
                    line,
                    spec.idents.len(),
                    spec.idents.join(", "),
                    UNKNOWN_NAME
                );
                UNKNOWN_NAME.to_string()
            }
        }
    }

    /// The first annotation in the node's doc group.
    fn doc_annotation(&self, node: Node) -> Annotation {
        self.comments
            .doc_group(node)
            .filter_map(|i| self.annotations.get(i))
            .find(|a| !a.is_nop())
            .cloned()
            .unwrap_or(Annotation::Nop)
    }

    fn trailing_annotation(&self, node: Node) -> Annotation {
        self.comments
            .trailing(node)
            .and_then(|i| self.annotations.get(i))
            .cloned()
            .unwrap_or(Annotation::Nop)
    }

    fn operation(&self, annotation: &Annotation, node: Node) -> Option<Operation> {
        if matches!(annotation, Annotation::Surround) {
            warn!(
                "{}:{}: `surround` is not supported, declaration ignored",
                self.file_name,
                node.start_position().row + 1
            );
        }
        annotation.operation()
    }
}

/// An ungrouped declaration keeps its doc on the group; give it to the spec
/// so it survives being recorded standalone.
fn with_group_doc(mut spec: Spec, grouped: bool, group_doc: Option<&str>) -> Spec {
    if !grouped && spec.doc.is_none() {
        spec.doc = group_doc.map(str::to_string);
    }
    spec
}
