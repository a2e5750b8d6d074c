// Copyright (C) 2026 by GiGa infosystems

//! The `[[order]]` build plans of a meta-buildpack, whose `[[order.group]]` entries pin the
//! versions of other buildpacks

use crate::dependency::{DecodeError, DependencyIdent};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The key in a `buildpack.toml` holding the list of [`Order`]s
pub const ORDER_KEY: &str = "order";

/// A single pinned buildpack in an [`Order`]
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

/// One `[[order]]` entry
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub group: Vec<Group>,
}

/// Decode the list of [`Order`]s from the top level table of a `buildpack.toml`. A missing key is
/// an empty list.
pub fn decode_orders(document: &toml::Table) -> Result<Vec<Order>, DecodeError> {
    let Some(value) = document.get(ORDER_KEY) else {
        return Ok(Vec::new());
    };

    value
        .clone()
        .try_into()
        .map_err(|source| DecodeError::Shape {
            key: ORDER_KEY,
            source,
        })
}

/// Point every group entry for `dep.id` at `dep.version`.
///
/// Entries only match by identifier: groups don't carry a stack, so every pin of the identifier is
/// rewritten. The order of orders & groups is kept.
pub fn sync_groups(mut orders: Vec<Order>, dep: &DependencyIdent) -> Vec<Order> {
    for group in orders.iter_mut().flat_map(|order| &mut order.group) {
        if group.id == dep.id && group.version != dep.version {
            debug!(id = %group.id, from = %group.version, to = %dep.version, "updating group pin");
            group.version.clone_from(&dep.version);
        }
    }

    orders
}
