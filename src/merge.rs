// Copyright (C) 2026 by GiGa infosystems

//! Merge newly built dependency records into a manifest, see [`merge`].

use crate::dependency::{
    DEPENDENCIES_KEY, DecodeError, Dependency, DependencyIdent, DependencySet, Metadata, Stack,
    decode_dependencies, validate_stacks,
};
use crate::version::{VersionLine, parse_version};
use semver::Version;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{debug, info};

/// A failure to merge new records into a manifest
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("failed to decode dependencies")]
    Decode(#[from] DecodeError),
    #[error("invalid version {version:?} for dependency `{id}`")]
    InvalidVersion {
        id: String,
        version: String,
        #[source]
        source: semver::Error,
    },
    #[error("failed to encode the updated dependencies")]
    Encode(#[source] toml::ser::Error),
}

/// The result of a successful [`merge`]
#[derive(Debug)]
pub struct MergeOutcome {
    /// The records as they were decoded from the manifest
    pub previous: DependencySet,
    /// The records now stored in the manifest
    pub dependencies: DependencySet,
    /// The candidates that were added or replaced an existing record, and remained after pruning
    pub applied: DependencySet,
}

fn version_of(dep: &Dependency) -> Result<Version, MergeError> {
    parse_version(&dep.version).map_err(|source| MergeError::InvalidVersion {
        id: dep.id.clone(),
        version: dep.version.clone(),
        source,
    })
}

/// Whether `dep` is a record of `id` on the version line `line`
fn on_line(dep: &Dependency, id: &str, line: &VersionLine) -> Result<bool, MergeError> {
    if dep.id != id {
        return Ok(false);
    }
    Ok(line.matches(&version_of(dep)?))
}

/// Add or replace the candidates for `target.id` on `line` in `deps`, returning for every record
/// whether it changed.
///
/// Every existing record of the candidate's version that shares a stack with it is a rebuild
/// target. The candidate takes the place of the first one, and all of them lose the candidate's
/// stacks, so each `(id, version, stack)` stays provided by a single record.
fn apply_candidates(
    deps: &mut DependencySet,
    target: &DependencyIdent,
    candidates: &[Dependency],
    line: &VersionLine,
) -> Result<Vec<bool>, MergeError> {
    let mut changed = vec![false; deps.len()];

    for candidate in candidates {
        if !on_line(candidate, &target.id, line)? {
            continue;
        }

        let overlapping = (0..deps.len())
            .filter(|&idx| deps[idx].overlaps(candidate))
            .collect::<Vec<_>>();
        let Some(&first) = overlapping.first() else {
            debug!(dependency = %candidate.ident(), stacks = ?candidate.stacks, "addition");
            deps.push(candidate.clone());
            changed.push(true);
            continue;
        };

        let present = candidate
            .stacks
            .iter()
            .all(|stack| overlapping.iter().any(|&idx| deps[idx].is_on(stack)))
            && overlapping
                .iter()
                .all(|&idx| !deps[idx].content_differs(candidate));
        if present {
            debug!(dependency = %candidate.ident(), "already present");
            continue;
        }

        debug!(dependency = %candidate.ident(), stacks = ?candidate.stacks, "rebuild");
        for &idx in &overlapping {
            deps[idx].stacks.retain(|stack| !candidate.is_on(stack));
        }
        deps.insert(first, candidate.clone());
        changed.insert(first, true);

        let mut idx = 0;
        while idx < deps.len() {
            if deps[idx].stacks.is_empty() {
                deps.remove(idx);
                changed.remove(idx);
            } else {
                idx += 1;
            }
        }
    }

    Ok(changed)
}

/// Keep at most `keep` distinct versions of `id` on `line` per stack, evicting the oldest ones
/// first.
///
/// Evicting a multi-stack record only removes the stack in question from it, records without any
/// remaining stacks are dropped. Returns for every surviving record its previous index.
fn prune(
    deps: &mut DependencySet,
    id: &str,
    line: &VersionLine,
    keep: NonZeroUsize,
) -> Result<Vec<usize>, MergeError> {
    let mut per_stack = BTreeMap::<Stack, BTreeMap<Version, Vec<usize>>>::new();
    for (idx, dep) in deps.iter().enumerate() {
        if !on_line(dep, id, line)? {
            continue;
        }
        let version = version_of(dep)?;
        for stack in dep.stack_set() {
            per_stack
                .entry(stack.clone())
                .or_default()
                .entry(version.clone())
                .or_default()
                .push(idx);
        }
    }

    for (stack, versions) in per_stack {
        let evicted = versions.len().saturating_sub(keep.get());
        for (version, records) in versions.into_iter().take(evicted) {
            debug!(%id, %version, %stack, "evicting old version");
            for idx in records {
                deps[idx].stacks.retain(|other| *other != stack);
            }
        }
    }

    let mut survivors = Vec::with_capacity(deps.len());
    let mut idx = 0;
    deps.retain(|dep| {
        let keep = !dep.stacks.is_empty();
        if keep {
            survivors.push(idx);
        }
        idx += 1;
        keep
    });

    Ok(survivors)
}

/// Merge the `candidates` for `target` that lie on the version line `line` into the dependency
/// list in `metadata`, keeping at most `keep` versions per stack on that line.
///
/// A candidate sharing a stack with an existing record of the same identifier & version that
/// differs in `sha256`, `uri` or stacks is a rebuild and replaces it in place, anything else not
/// present yet is appended.
///
/// `metadata` is only changed if the merge succeeded.
pub fn merge(
    metadata: &mut Metadata,
    target: &DependencyIdent,
    candidates: &[Dependency],
    line: &VersionLine,
    keep: NonZeroUsize,
) -> Result<MergeOutcome, MergeError> {
    let previous = decode_dependencies(metadata)?;
    validate_stacks(candidates)?;

    let mut dependencies = previous.clone();
    let changed = apply_candidates(&mut dependencies, target, candidates, line)?;
    let survivors = prune(&mut dependencies, &target.id, line, keep)?;

    let applied = survivors
        .iter()
        .zip(&dependencies)
        .filter(|(old_idx, _)| changed[**old_idx])
        .map(|(_, dep)| dep.clone())
        .collect::<DependencySet>();

    let encoded = toml::Value::try_from(&dependencies).map_err(MergeError::Encode)?;

    info!(
        dependency = %target,
        %line,
        before = previous.len(),
        after = dependencies.len(),
        applied = applied.len(),
        "merged dependencies"
    );

    metadata.insert(DEPENDENCIES_KEY.to_owned(), encoded);

    Ok(MergeOutcome {
        previous,
        dependencies,
        applied,
    })
}
