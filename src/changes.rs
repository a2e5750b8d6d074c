// Copyright (C) 2026 by GiGa infosystems

//! Classify the change between two dependency lists for a single dependency & render it as a
//! commit message, see [`Changes::between`].

use crate::dependency::{Dependency, DependencyIdent, Stack, find_on_stack};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeSet;

/// What happened to a dependency between an old and a new dependency list, for all stacks
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Changes {
    /// The dependency version that was updated
    pub dependency: DependencyIdent,
    /// At least one record of `dependency` wasn't present before
    pub added: bool,
    /// At least one record of `dependency` was present before, but with a different hash or URI
    pub rebuilt: bool,
    /// Versions of the same identifier that are no longer provided for at least one of their stacks
    pub removed: BTreeSet<DependencyIdent>,
    /// The stacks on which something was added, rebuilt or removed
    pub stacks: BTreeSet<Stack>,
}

impl Changes {
    /// Returns the changes for `dependency` between `old` and `new`.
    ///
    /// Records are compared per stack (see [`find_on_stack`]), so a version that is still provided
    /// for some of its stacks only counts as removed for the others. Only `dependency` itself can
    /// be added or rebuilt, any version of its identifier can be removed.
    pub fn between(old: &[Dependency], new: &[Dependency], dependency: DependencyIdent) -> Self {
        let mut added = false;
        let mut rebuilt = false;
        let mut removed = BTreeSet::new();
        let mut stacks = BTreeSet::new();

        for dep in new.iter().filter(|dep| dep.is(&dependency)) {
            for stack in &dep.stacks {
                match find_on_stack(old, &dependency, stack) {
                    Some(old_dep) if old_dep.content_differs(dep) => rebuilt = true,
                    Some(_) => continue,
                    None => added = true,
                }
                stacks.insert(stack.clone());
            }
        }

        for dep in old.iter().filter(|dep| dep.id == dependency.id) {
            let ident = dep.ident();
            for stack in &dep.stacks {
                if find_on_stack(new, &ident, stack).is_none() {
                    removed.insert(ident.clone());
                    stacks.insert(stack.clone());
                }
            }
        }

        Changes {
            dependency,
            added,
            rebuilt,
            removed,
            stacks,
        }
    }

    /// Nothing was added, rebuilt or removed
    pub fn is_empty(&self) -> bool {
        !self.added && !self.rebuilt && self.removed.is_empty()
    }

    /// The default commit message for these changes, or `None` if there weren't any.
    ///
    /// For example:
    ///
    /// ```text
    /// Add go 1.21, remove go 1.19, go 1.20
    ///
    /// for stack(s) cflinuxfs3, cflinuxfs4 [#123]
    /// ```
    pub fn commit_message(&self, ticket: u64) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let verb = if self.added { "Add" } else { "Rebuild" };
        let mut message = format!("{verb} {}", self.dependency);

        if !self.removed.is_empty() {
            message += &format!(", remove {}", self.removed.iter().join(", "));
        }

        message += &format!(
            "\n\nfor stack(s) {} [#{ticket}]",
            self.stacks.iter().join(", ")
        );

        Some(message)
    }
}

/// Render the commit message for the change of `id` at `version` between `old` and `new`, or an
/// empty string if nothing changed
pub fn render(
    old: &[Dependency],
    new: &[Dependency],
    id: &str,
    version: &str,
    ticket: u64,
) -> String {
    Changes::between(old, new, DependencyIdent::new(id, version))
        .commit_message(ticket)
        .unwrap_or_default()
}
