//! Transform engine: applies one weave set to one target unit.
//!
//! The walk visits top-level declarations in source order. Per declaration:
//!
//! 1. the first function or method (or the declared anchor) gets every
//!    insert spliced in front of it;
//! 2. a replace swaps the declaration for the weave's version;
//! 3. a replace-and-call-original emits the weave's version, then keeps the
//!    target renamed with an `Original` suffix;
//! 4. a delete drops whatever name is current after steps 2 and 3.
//!
//! Grouped `type`/`var`/`const` declarations go through the same steps one
//! spec at a time and are reassembled afterwards.

pub(crate) mod imports;

use tracing::{debug, trace, warn};

use crate::error::TransformError;
use crate::syntax::{Declaration, Item, SpecGroup, TargetUnit};
use crate::weave::WeaveSet;

/// Stateless: every call computes its own insertion anchor.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformEngine;

impl TransformEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply `weave` to `unit`. Without a weave set the unit is returned
    /// untouched.
    pub fn apply(
        &self,
        mut unit: TargetUnit,
        weave: Option<&WeaveSet>,
    ) -> Result<TargetUnit, TransformError> {
        let Some(weave) = weave else {
            return Ok(unit);
        };
        if let Some(line) = unit.error_line() {
            return Err(TransformError::Syntax {
                file: unit.path().display().to_string(),
                line,
            });
        }

        let orphaned = imports::sync(unit.items_mut(), weave);
        let items = unit.take_items();
        let anchor = anchor_index(&items, weave);
        if anchor.is_none() && !weave.inserts().is_empty() {
            warn!(
                "{}: no function or method to anchor {} insert(s), they are dropped",
                unit.file_name(),
                weave.inserts().len()
            );
        }

        let mut pass = Pass::new(weave, orphaned);
        for (index, item) in items.into_iter().enumerate() {
            if Some(index) == anchor {
                pass.splice_inserts();
            }
            pass.visit(item)?;
        }
        let (items, leftover) = pass.finish();
        unit.set_items(items, leftover);

        debug!("Transformed {}", unit.file_name());
        Ok(unit)
    }
}

/// Index of the item inserts are spliced before.
fn anchor_index(items: &[Item], weave: &WeaveSet) -> Option<usize> {
    if let Some(anchor) = weave.anchor() {
        if let Some(index) = items.iter().position(|i| i.decl.names().contains(&anchor)) {
            return Some(index);
        }
        debug!(
            "{}: anchor `{}` not found, using the first function",
            weave.file_name(),
            anchor
        );
    }
    items.iter().position(|i| i.decl.is_callable())
}

/// Output of one walk.
struct Pass<'w> {
    weave: &'w WeaveSet,
    out: Vec<Item>,
    /// Floating comments waiting for the next emitted item
    pending: Option<String>,
}

impl<'w> Pass<'w> {
    fn new(weave: &'w WeaveSet, pending: Option<String>) -> Self {
        Self {
            weave,
            out: Vec::new(),
            pending,
        }
    }

    fn hold(&mut self, floating: Option<String>) {
        if let Some(text) = floating {
            self.pending = Some(match self.pending.take() {
                Some(before) => format!("{}\n\n{}", before, text),
                None => text,
            });
        }
    }

    fn emit(&mut self, decl: Declaration) {
        let floating = self.pending.take();
        self.out.push(Item { floating, decl });
    }

    fn splice_inserts(&mut self) {
        let weave = self.weave;
        for (name, decl) in weave.inserts().iter() {
            trace!("{}: insert `{}`", weave.file_name(), name);
            self.emit(decl.clone());
        }
    }

    fn visit(&mut self, item: Item) -> Result<(), TransformError> {
        self.hold(item.floating);
        match item.decl {
            Declaration::Type(group) | Declaration::Value(group) if group.grouped => {
                self.visit_group(group)
            }
            decl @ Declaration::Import(_) => {
                self.emit(decl);
                Ok(())
            }
            decl => {
                for produced in self.weave_decl(decl) {
                    self.emit(produced);
                }
                Ok(())
            }
        }
    }

    /// Replace, replace-and-call-original and delete for one declaration.
    fn weave_decl(&self, decl: Declaration) -> Vec<Declaration> {
        let weave = self.weave;
        let mut produced = Vec::new();
        let mut current = decl;

        if let Some(replacement) = current.name().and_then(|n| weave.replaces().get(n)) {
            debug!(
                "{}: replace `{}`",
                weave.file_name(),
                replacement.name().unwrap_or_default()
            );
            current = replacement.clone();
        }

        if let Some(replacement) = current
            .name()
            .and_then(|n| weave.replace_and_call_originals().get(n))
        {
            produced.push(replacement.clone());
            if let Some(renamed) = current.rename_original() {
                debug!(
                    "{}: replace `{}`, original kept as `{}`",
                    weave.file_name(),
                    replacement.name().unwrap_or_default(),
                    renamed
                );
            }
        }

        if current.name().is_some_and(|n| weave.deletes().contains_key(n)) {
            debug!("{}: delete `{}`", weave.file_name(), current.name().unwrap_or_default());
            return produced;
        }

        produced.push(current);
        produced
    }

    /// Run every spec of a parenthesised group through [`Self::weave_decl`]
    /// and reassemble what survives.
    fn visit_group(&mut self, group: SpecGroup) -> Result<(), TransformError> {
        let SpecGroup {
            keyword,
            doc,
            specs,
            grouped,
            trailing,
        } = group;

        let mut kept = Vec::with_capacity(specs.len());
        for spec in specs {
            let single = Declaration::from_spec_group(SpecGroup::single(keyword, spec));
            for produced in self.weave_decl(single) {
                match produced {
                    Declaration::Type(g) | Declaration::Value(g) if g.keyword == keyword => {
                        let mut specs = g.specs;
                        if let Some(first) = specs.first_mut() {
                            if first.doc.is_none() {
                                first.doc = g.doc;
                            }
                        }
                        kept.extend(specs);
                    }
                    other => {
                        return Err(TransformError::kind_mismatch(
                            other.name().unwrap_or_default(),
                            keyword.as_str(),
                            other.kind(),
                        ))
                    }
                }
            }
        }

        if kept.is_empty() {
            debug!("{}: {} group emptied, dropped", self.weave.file_name(), keyword);
            return Ok(());
        }
        self.emit(Declaration::from_spec_group(SpecGroup {
            keyword,
            doc,
            specs: kept,
            grouped,
            trailing,
        }));
        Ok(())
    }

    fn finish(self) -> (Vec<Item>, Option<String>) {
        (self.out, self.pending)
    }
}
