// Copyright (C) 2026 by GiGa infosystems

//! The dependency records stored under `[metadata]` in a `buildpack.toml`, and their decoding from
//! the generic metadata table

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// The generic key-value table under `[metadata]` in a `buildpack.toml`
pub type Metadata = toml::Table;

/// The key in [`Metadata`] holding the list of [`Dependency`] records
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// A stack identifier (such as `io.buildpacks.stacks.jammy` or `cflinuxfs4`)
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stack(pub String);

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Stack {
    fn from(stack: &str) -> Self {
        Stack(stack.to_owned())
    }
}

/// A dependency identifier with a specific version
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct DependencyIdent {
    pub id: String,
    pub version: String,
}

impl DependencyIdent {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        DependencyIdent {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for DependencyIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// A single built dependency as listed in `[[metadata.dependencies]]`
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Opaque to everything except retention pruning & version lines, see
    /// [`crate::version::parse_version`]
    pub version: String,
    /// The stacks this build is compatible with, never empty after decoding
    pub stacks: Vec<Stack>,
    pub uri: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_date: Option<String>,
    /// Any further keys (licenses, `cpe`, `purl`, ...), carried through unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

/// An ordered list of dependency records
pub type DependencySet = Vec<Dependency>;

impl Dependency {
    pub fn ident(&self) -> DependencyIdent {
        DependencyIdent::new(&self.id, &self.version)
    }

    pub fn is(&self, ident: &DependencyIdent) -> bool {
        self.id == ident.id && self.version == ident.version
    }

    /// The stack list as a set, ignoring order & duplicates
    pub fn stack_set(&self) -> BTreeSet<&Stack> {
        self.stacks.iter().collect()
    }

    /// Whether the record lists `stack`
    pub fn is_on(&self, stack: &Stack) -> bool {
        self.stacks.contains(stack)
    }

    /// Whether both are records of the same identifier & version for at least one common stack.
    /// Content (`sha256`, `uri`) is not compared.
    pub fn overlaps(&self, other: &Dependency) -> bool {
        self.id == other.id
            && self.version == other.version
            && self.stacks.iter().any(|stack| other.is_on(stack))
    }

    /// Whether the same record was re-published with different contents
    pub fn content_differs(&self, other: &Dependency) -> bool {
        self.sha256 != other.sha256 || self.uri != other.uri
    }
}

/// Find the record of `ident` in `deps` that lists `stack`. Each `(id, version, stack)` is
/// provided by at most one record.
pub fn find_on_stack<'a>(
    deps: &'a [Dependency],
    ident: &DependencyIdent,
    stack: &Stack,
) -> Option<&'a Dependency> {
    deps.iter().find(|dep| dep.is(ident) && dep.is_on(stack))
}

/// The metadata didn't have the expected shape
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid `{key}` entry")]
    Shape {
        key: &'static str,
        #[source]
        source: toml::de::Error,
    },
    #[error("dependency `{0}` doesn't list any stacks")]
    NoStacks(DependencyIdent),
}

/// Decode the [`Dependency`] list from [`Metadata`]. A missing key is an empty list.
pub fn decode_dependencies(metadata: &Metadata) -> Result<DependencySet, DecodeError> {
    let Some(value) = metadata.get(DEPENDENCIES_KEY) else {
        return Ok(DependencySet::new());
    };

    let deps = value
        .clone()
        .try_into::<DependencySet>()
        .map_err(|source| DecodeError::Shape {
            key: DEPENDENCIES_KEY,
            source,
        })?;

    validate_stacks(&deps)?;
    Ok(deps)
}

/// Reject records with an empty stack list
pub fn validate_stacks(deps: &[Dependency]) -> Result<(), DecodeError> {
    match deps.iter().find(|dep| dep.stacks.is_empty()) {
        Some(dep) => Err(DecodeError::NoStacks(dep.ident())),
        None => Ok(()),
    }
}
