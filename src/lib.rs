// Copyright (C) 2026 by GiGa infosystems

//! `cnb-dependency-update` merges freshly built dependency versions into the `buildpack.toml` of a
//! Cloud Native Buildpack and describes the change as a commit message.
//!
//! The order of operations is:
//! * Merge the candidate records into the manifest under a version line and retention count with
//!   [`merge::merge`]
//! * Point `[[order.group]]` pins at the new version with [`order::sync_groups`]
//! * Classify what changed per stack and render it with [`changes::Changes`]
//!
//! These three steps are pure. Reading & writing `buildpack.toml` ([`buildpack`]) and committing
//! the result ([`git`]) are done by the `update-cnb-dependency` binary.

pub mod buildpack;
pub mod changes;
pub mod dependency;
pub mod git;
pub mod merge;
pub mod order;
pub mod version;

pub use dependency::{Dependency, DependencyIdent, DependencySet, Stack};
