//! Import synchronisation for one target unit.

use tracing::{debug, trace};

use crate::syntax::{Declaration, ImportGroup, ImportSpec, Item};
use crate::weave::WeaveSet;

/// Pseudo-package of cgo.
const CGO: &str = "C";

/// Apply a weave set's import adds, then its import deletes.
///
/// Returns comment text orphaned by a dropped trailing import declaration.
pub(crate) fn sync(items: &mut Vec<Item>, weave: &WeaveSet) -> Option<String> {
    for spec in weave.import_adds() {
        if add(items, spec) {
            debug!("{}: added import {}", weave.file_name(), spec.path);
        }
    }
    let mut orphaned: Option<String> = None;
    for spec in weave.import_deletes() {
        let (removed, leftover) = delete(items, &spec.path);
        debug!(
            "{}: removed {} binding(s) of import {}",
            weave.file_name(),
            removed,
            spec.path
        );
        if let Some(text) = leftover {
            orphaned = Some(match orphaned.take() {
                Some(before) => format!("{}\n\n{}", before, text),
                None => text,
            });
        }
    }
    orphaned
}

/// Add a binding unless the same path is already bound under the same alias.
pub(crate) fn add(items: &mut Vec<Item>, wanted: &ImportSpec) -> bool {
    let present = items.iter().any(|item| match &item.decl {
        Declaration::Import(group) => group.specs.iter().any(|s| s.binds(wanted)),
        _ => false,
    });
    if present {
        trace!("import {} already present", wanted.path);
        return false;
    }

    let spec = ImportSpec::new(wanted.alias.clone(), &wanted.path);
    // `import "C"` carries the cgo preamble and must stay alone.
    let first_group = items.iter_mut().find_map(|item| match &mut item.decl {
        Declaration::Import(group) if !binds_cgo(group) => Some(group),
        _ => None,
    });
    match first_group {
        Some(group) => {
            group.specs.push(spec);
            group.grouped = group.grouped || group.specs.len() > 1;
        }
        None => {
            let after_imports = items
                .iter()
                .rposition(|item| matches!(item.decl, Declaration::Import(_)))
                .map_or(0, |i| i + 1);
            items.insert(
                after_imports,
                Item::new(Declaration::Import(ImportGroup::single(spec))),
            );
        }
    }
    true
}

fn binds_cgo(group: &ImportGroup) -> bool {
    group.specs.iter().any(|s| s.path == CGO)
}

/// Remove every binding of `path`, whatever its alias. Emptied import
/// declarations are dropped; their floating comments move to the next item,
/// or are returned when no item follows.
pub(crate) fn delete(items: &mut Vec<Item>, path: &str) -> (usize, Option<String>) {
    let mut removed = 0;
    let mut kept = Vec::with_capacity(items.len());
    let mut carried: Option<String> = None;

    for mut item in items.drain(..) {
        if let Some(text) = carried.take() {
            item.floating = Some(match item.floating.take() {
                Some(own) => format!("{}\n\n{}", text, own),
                None => text,
            });
        }
        if let Declaration::Import(group) = &mut item.decl {
            let before = group.specs.len();
            group.specs.retain(|s| s.path != path);
            removed += before - group.specs.len();
            if group.specs.is_empty() {
                carried = item.floating.take();
                continue;
            }
        }
        kept.push(item);
    }
    *items = kept;
    (removed, carried)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::TargetUnit;

    fn items(source: &str) -> Vec<Item> {
        TargetUnit::parse("t.go", source).unwrap().items().to_vec()
    }

    fn paths(items: &[Item]) -> Vec<String> {
        items
            .iter()
            .filter_map(|i| match &i.decl {
                Declaration::Import(g) => Some(g.specs.iter().map(|s| s.path.clone())),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn items_only_imports() -> Vec<Item> {
        items("package p\n\n// lonely\n\nimport \"fmt\"\n")
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut items = items("package p\n\nimport \"fmt\"\n\nfunc F() {}\n");
        assert!(!add(&mut items, &ImportSpec::new(None, "fmt")));
        assert!(add(&mut items, &ImportSpec::new(None, "os")));
        assert!(!add(&mut items, &ImportSpec::new(None, "os")));
        assert_eq!(paths(&items), vec!["fmt", "os"]);
        match &items[0].decl {
            Declaration::Import(g) => assert!(g.grouped),
            other => panic!("expected import, got {:?}", other),
        }
    }

    #[test]
    fn test_add_aliased_alongside_plain() {
        let mut items = items("package p\n\nimport \"fmt\"\n");
        assert!(add(&mut items, &ImportSpec::new(Some("f".into()), "fmt")));
        assert_eq!(paths(&items), vec!["fmt", "fmt"]);
    }

    #[test]
    fn test_add_without_imports_creates_declaration() {
        let mut items = items("package p\n\nfunc F() {}\n");
        add(&mut items, &ImportSpec::new(None, "fmt"));
        assert_eq!(items[0].decl.render(), "import \"fmt\"");
        assert_eq!(items[1].decl.name(), Some("F"));
    }

    #[test]
    fn test_add_never_joins_cgo_import() {
        let mut items = items("package p\n\n// #include <stdio.h>\nimport \"C\"\n\nfunc F() {}\n");
        assert!(add(&mut items, &ImportSpec::new(None, "fmt")));
        assert_eq!(
            items[0].decl.render(),
            "// #include <stdio.h>\nimport \"C\"",
            "cgo import keeps its preamble and stays alone"
        );
        assert_eq!(items[1].decl.render(), "import \"fmt\"");
        assert_eq!(items[2].decl.name(), Some("F"));

        let mut items = self::items("package p\n\nimport \"C\"\n\nimport (\n\t\"os\"\n)\n");
        add(&mut items, &ImportSpec::new(None, "fmt"));
        assert_eq!(items[1].decl.render(), "import (\n\t\"os\"\n\t\"fmt\"\n)");
    }

    #[test]
    fn test_delete_removes_every_alias() {
        let mut items =
            items("package p\n\nimport (\n\t\"fmt\"\n\tf \"fmt\"\n\t\"os\"\n)\n\nfunc F() {}\n");
        assert_eq!(delete(&mut items, "fmt"), (2, None));
        assert_eq!(paths(&items), vec!["os"]);
    }

    #[test]
    fn test_delete_drops_empty_declaration() {
        let mut items = items("package p\n\n// note\n\nimport \"fmt\"\n\nfunc F() {}\n");
        assert_eq!(delete(&mut items, "fmt"), (1, None));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].floating.as_deref(), Some("// note"));
        assert_eq!(delete(&mut items, "missing"), (0, None));

        let mut items = items_only_imports();
        assert_eq!(delete(&mut items, "fmt"), (1, Some("// lonely".to_string())));
        assert!(items.is_empty());
    }
}
