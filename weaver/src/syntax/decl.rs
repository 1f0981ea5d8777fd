//! Declaration model.
//!
//! A closed set of top-level Go declarations with just enough structure for
//! name matching, renaming and re-rendering. Bodies, signatures and spec
//! types are kept as verbatim source text.

use std::fmt;
use std::ops::Range;

/// Appended to a declaration renamed by replace-and-call-original.
pub const ORIGINAL_SUFFIX: &str = "Original";

/// Keyword of a general (spec-carrying) declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Type,
    Var,
    Const,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Var => "var",
            Self::Const => "const",
        }
    }

    /// Keyword for a tree-sitter declaration node kind.
    pub fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "type_declaration" => Some(Self::Type),
            "var_declaration" => Some(Self::Var),
            "const_declaration" => Some(Self::Const),
            _ => None,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function declaration, or the function part of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    pub doc: Option<String>,
    /// `func ... { ... }` exactly as written
    pub source: String,
    pub trailing: Option<String>,
    /// Byte span of the name inside `source`
    pub(crate) name_span: Range<usize>,
}

impl FuncDecl {
    fn rename(&mut self, new_name: &str) {
        let start = self.name_span.start;
        self.source.replace_range(self.name_span.clone(), new_name);
        self.name_span = start..start + new_name.len();
        self.name = new_name.to_string();
    }
}

/// A method: a function with a receiver. Matched by name only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    /// Receiver type as written, e.g. `*Server`
    pub receiver: String,
    pub func: FuncDecl,
}

/// One spec of a `type`, `var` or `const` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spec {
    /// Bound identifiers in order (`a, b = 1, 2` binds two)
    pub idents: Vec<String>,
    /// Doc comment inside a parenthesised group
    pub doc: Option<String>,
    /// Spec text without the keyword, e.g. `x int = 3`
    pub source: String,
    pub trailing: Option<String>,
    /// Byte span of the first identifier inside `source`
    pub(crate) name_span: Option<Range<usize>>,
}

impl Spec {
    /// The spec's name when it binds exactly one identifier.
    pub fn name(&self) -> Option<&str> {
        match self.idents.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    fn rename(&mut self, new_name: &str) -> bool {
        let Some(span) = self.name_span.clone() else {
            return false;
        };
        if self.idents.len() != 1 {
            return false;
        }
        self.source.replace_range(span.clone(), new_name);
        self.name_span = Some(span.start..span.start + new_name.len());
        self.idents[0] = new_name.to_string();
        true
    }

    fn render_into(&self, out: &mut String, indent: &str) {
        push_doc(out, self.doc.as_deref(), indent);
        out.push_str(indent);
        out.push_str(&self.source);
        push_trailing(out, self.trailing.as_deref());
        out.push('\n');
    }
}

/// A `type`, `var` or `const` declaration with its specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecGroup {
    pub keyword: Keyword,
    pub doc: Option<String>,
    pub specs: Vec<Spec>,
    /// Written with parentheses
    pub grouped: bool,
    /// Comment after the closing parenthesis
    pub trailing: Option<String>,
}

impl SpecGroup {
    /// A standalone declaration holding one spec; the spec's doc moves up.
    pub fn single(keyword: Keyword, mut spec: Spec) -> Self {
        let doc = spec.doc.take();
        Self {
            keyword,
            doc,
            specs: vec![spec],
            grouped: false,
            trailing: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self.specs.as_slice() {
            [only] => only.name(),
            _ => None,
        }
    }

    fn render_into(&self, out: &mut String) {
        push_doc(out, self.doc.as_deref(), "");
        match self.specs.as_slice() {
            [only] if !self.grouped => {
                push_doc(out, only.doc.as_deref(), "");
                out.push_str(self.keyword.as_str());
                out.push(' ');
                out.push_str(&only.source);
                push_trailing(out, only.trailing.as_deref());
            }
            specs => {
                out.push_str(self.keyword.as_str());
                out.push_str(" (\n");
                for spec in specs {
                    spec.render_into(out, "\t");
                }
                out.push(')');
                push_trailing(out, self.trailing.as_deref());
            }
        }
    }
}

/// One import binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit name: an alias, `.` or `_`
    pub alias: Option<String>,
    /// Import path with quotes and escapes stripped
    pub path: String,
    pub doc: Option<String>,
    pub source: String,
    pub trailing: Option<String>,
}

impl ImportSpec {
    /// A fresh binding with canonical source text.
    pub fn new(alias: Option<String>, path: &str) -> Self {
        let source = match &alias {
            Some(alias) => format!("{} \"{}\"", alias, path),
            None => format!("\"{}\"", path),
        };
        Self {
            alias,
            path: path.to_string(),
            doc: None,
            source,
            trailing: None,
        }
    }

    /// Same path and same alias.
    pub fn binds(&self, other: &ImportSpec) -> bool {
        self.path == other.path && self.alias == other.alias
    }

    fn render_into(&self, out: &mut String, indent: &str) {
        push_doc(out, self.doc.as_deref(), indent);
        out.push_str(indent);
        out.push_str(&self.source);
        push_trailing(out, self.trailing.as_deref());
        out.push('\n');
    }
}

/// An `import` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportGroup {
    pub doc: Option<String>,
    pub specs: Vec<ImportSpec>,
    pub grouped: bool,
    pub trailing: Option<String>,
}

impl ImportGroup {
    pub fn single(spec: ImportSpec) -> Self {
        Self {
            doc: None,
            specs: vec![spec],
            grouped: false,
            trailing: None,
        }
    }

    fn render_into(&self, out: &mut String) {
        push_doc(out, self.doc.as_deref(), "");
        match self.specs.as_slice() {
            [only] if !self.grouped => {
                out.push_str("import ");
                out.push_str(&only.source);
                push_trailing(out, only.trailing.as_deref());
            }
            specs => {
                out.push_str("import (\n");
                for spec in specs {
                    spec.render_into(out, "\t");
                }
                out.push(')');
                push_trailing(out, self.trailing.as_deref());
            }
        }
    }
}

/// A top-level Go declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Function(FuncDecl),
    Method(MethodDecl),
    Type(SpecGroup),
    /// `var` or `const`
    Value(SpecGroup),
    Import(ImportGroup),
}

impl Declaration {
    /// Wrap a spec group in the variant matching its keyword.
    pub fn from_spec_group(group: SpecGroup) -> Self {
        match group.keyword {
            Keyword::Type => Self::Type(group),
            Keyword::Var | Keyword::Const => Self::Value(group),
        }
    }

    /// The name this declaration is matched by.
    ///
    /// Spec groups only have one when they hold exactly one single-identifier
    /// spec; imports never have one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Function(f) => Some(&f.name),
            Self::Method(m) => Some(&m.func.name),
            Self::Type(g) | Self::Value(g) => g.name(),
            Self::Import(_) => None,
        }
    }

    /// Every name bound at top level, for anchor lookup and reporting.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Function(f) => vec![f.name.as_str()],
            Self::Method(m) => vec![m.func.name.as_str()],
            Self::Type(g) | Self::Value(g) => g
                .specs
                .iter()
                .flat_map(|s| s.idents.iter().map(String::as_str))
                .collect(),
            Self::Import(_) => Vec::new(),
        }
    }

    /// Short kind label used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Function(_) => "func",
            Self::Method(_) => "method",
            Self::Type(g) | Self::Value(g) => g.keyword.as_str(),
            Self::Import(_) => "import",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_) | Self::Method(_))
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            Self::Function(f) => f.doc.as_deref(),
            Self::Method(m) => m.func.doc.as_deref(),
            Self::Type(g) | Self::Value(g) => g.doc.as_deref(),
            Self::Import(g) => g.doc.as_deref(),
        }
    }

    pub fn spec_group(&self) -> Option<&SpecGroup> {
        match self {
            Self::Type(g) | Self::Value(g) => Some(g),
            _ => None,
        }
    }

    /// Append [`ORIGINAL_SUFFIX`] to the declared name, leaving the rest of
    /// the text untouched. Returns the new name.
    pub fn rename_original(&mut self) -> Option<String> {
        let new_name = format!("{}{}", self.name()?, ORIGINAL_SUFFIX);
        let renamed = match self {
            Self::Function(f) => {
                f.rename(&new_name);
                true
            }
            Self::Method(m) => {
                m.func.rename(&new_name);
                true
            }
            Self::Type(g) | Self::Value(g) => g
                .specs
                .first_mut()
                .map(|spec| spec.rename(&new_name))
                .unwrap_or(false),
            Self::Import(_) => false,
        };
        renamed.then_some(new_name)
    }

    /// Canonical Go text for this declaration, without a final newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Function(f) => render_func(&mut out, f),
            Self::Method(m) => render_func(&mut out, &m.func),
            Self::Type(g) | Self::Value(g) => g.render_into(&mut out),
            Self::Import(g) => g.render_into(&mut out),
        }
        out
    }
}

fn render_func(out: &mut String, func: &FuncDecl) {
    push_doc(out, func.doc.as_deref(), "");
    out.push_str(&func.source);
    push_trailing(out, func.trailing.as_deref());
}

/// Comment lines are re-indented; the interior of a block comment is
/// written as captured.
fn push_doc(out: &mut String, doc: Option<&str>, indent: &str) {
    let Some(doc) = doc else { return };
    let mut in_block = false;
    for line in doc.lines() {
        if in_block {
            out.push_str(line);
            in_block = !line.contains("*/");
        } else {
            let line = line.trim_start();
            out.push_str(indent);
            out.push_str(line);
            in_block = line
                .strip_prefix("/*")
                .is_some_and(|rest| !rest.contains("*/"));
        }
        out.push('\n');
    }
}

fn push_trailing(out: &mut String, trailing: Option<&str>) {
    if let Some(comment) = trailing {
        out.push(' ');
        out.push_str(comment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str, source: &str) -> FuncDecl {
        let start = source.find(name).unwrap();
        FuncDecl {
            name: name.to_string(),
            doc: None,
            source: source.to_string(),
            trailing: None,
            name_span: start..start + name.len(),
        }
    }

    fn spec(name: &str, source: &str) -> Spec {
        Spec {
            idents: vec![name.to_string()],
            doc: None,
            source: source.to_string(),
            trailing: None,
            name_span: Some(0..name.len()),
        }
    }

    #[test]
    fn test_rename_function_keeps_body() {
        let mut decl = Declaration::Function(func("Hello", "func Hello() string { return \"Hello\" }"));
        assert_eq!(decl.rename_original().as_deref(), Some("HelloOriginal"));
        assert_eq!(decl.name(), Some("HelloOriginal"));
        assert_eq!(
            decl.render(),
            "func HelloOriginal() string { return \"Hello\" }"
        );
    }

    #[test]
    fn test_rename_method_keeps_receiver() {
        let mut decl = Declaration::Method(MethodDecl {
            receiver: "*T".to_string(),
            func: func("Run", "func (t *T) Run() {}"),
        });
        decl.rename_original();
        assert_eq!(decl.render(), "func (t *T) RunOriginal() {}");
    }

    #[test]
    fn test_rename_spec() {
        let mut decl = Declaration::from_spec_group(SpecGroup::single(
            Keyword::Var,
            spec("limit", "limit = 3"),
        ));
        assert_eq!(decl.rename_original().as_deref(), Some("limitOriginal"));
        assert_eq!(decl.render(), "var limitOriginal = 3");
    }

    #[test]
    fn test_multi_ident_spec_has_no_name() {
        let multi = Spec {
            idents: vec!["a".into(), "b".into()],
            doc: None,
            source: "a, b = 1, 2".into(),
            trailing: None,
            name_span: Some(0..1),
        };
        let mut decl = Declaration::from_spec_group(SpecGroup::single(Keyword::Var, multi));
        assert_eq!(decl.name(), None);
        assert_eq!(decl.names(), vec!["a", "b"]);
        assert_eq!(decl.rename_original(), None);
    }

    #[test]
    fn test_render_grouped_specs() {
        let mut documented = spec("b", "b = 2");
        documented.doc = Some("// b doc".into());
        documented.trailing = Some("// tail".into());
        let group = SpecGroup {
            keyword: Keyword::Const,
            doc: Some("// Limits".into()),
            specs: vec![spec("a", "a = 1"), documented],
            grouped: true,
            trailing: None,
        };
        assert_eq!(
            Declaration::from_spec_group(group).render(),
            "// Limits\nconst (\n\ta = 1\n\t// b doc\n\tb = 2 // tail\n)"
        );
    }

    #[test]
    fn test_render_keeps_block_comment_layout() {
        let mut f = func("G", "func G() {}");
        f.doc = Some("/*\n   indented\n     block\n*/".into());
        assert_eq!(
            Declaration::Function(f).render(),
            "/*\n   indented\n     block\n*/\nfunc G() {}"
        );

        let mut documented = spec("b", "b = 2");
        documented.doc = Some("// one\n\t// two".into());
        let group = SpecGroup {
            keyword: Keyword::Var,
            doc: None,
            specs: vec![documented],
            grouped: true,
            trailing: None,
        };
        assert_eq!(
            Declaration::from_spec_group(group).render(),
            "var (\n\t// one\n\t// two\n\tb = 2\n)",
            "line comments are re-indented"
        );
    }

    #[test]
    fn test_render_imports() {
        let single = ImportGroup::single(ImportSpec::new(None, "fmt"));
        assert_eq!(Declaration::Import(single).render(), "import \"fmt\"");

        let grouped = ImportGroup {
            doc: None,
            specs: vec![
                ImportSpec::new(None, "fmt"),
                ImportSpec::new(Some("str".into()), "strings"),
            ],
            grouped: true,
            trailing: None,
        };
        assert_eq!(
            Declaration::Import(grouped).render(),
            "import (\n\t\"fmt\"\n\tstr \"strings\"\n)"
        );
    }

    #[test]
    fn test_import_binding_identity() {
        let plain = ImportSpec::new(None, "fmt");
        let aliased = ImportSpec::new(Some("f".into()), "fmt");
        assert!(plain.binds(&ImportSpec::new(None, "fmt")));
        assert!(!plain.binds(&aliased));
    }

    #[test]
    fn test_keyword_from_node_kind() {
        assert_eq!(Keyword::from_node_kind("const_declaration"), Some(Keyword::Const));
        assert_eq!(Keyword::from_node_kind("function_declaration"), None);
    }
}
