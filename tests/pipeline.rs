// Copyright (C) 2026 by GiGa infosystems

//! Runs merge, group sync & classification together, the way a CI job does for one dependency

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use cnb_dependency_update::changes::{Changes, render};
use cnb_dependency_update::dependency::{DEPENDENCIES_KEY, Metadata, decode_dependencies};
use cnb_dependency_update::merge::merge;
use cnb_dependency_update::order::{Group, Order, sync_groups};
use cnb_dependency_update::version::VersionLine;
use cnb_dependency_update::{Dependency, DependencyIdent, Stack};

fn dep(id: &str, version: &str, stacks: &[&str], sha256: &str) -> Dependency {
    Dependency {
        id: id.to_owned(),
        name: None,
        version: version.to_owned(),
        stacks: stacks.iter().copied().map(Stack::from).collect(),
        uri: format!("https://buildpacks.example.com/{id}-{version}-{sha256}.tgz"),
        sha256: sha256.to_owned(),
        source: None,
        source_sha256: None,
        deprecation_date: None,
        extra: BTreeMap::new(),
    }
}

fn metadata_with(deps: &[Dependency]) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        DEPENDENCIES_KEY.to_owned(),
        toml::Value::try_from(deps).unwrap(),
    );
    metadata
}

/// Merge `candidates` for `target` into `old` & render the message
fn run(
    old: &[Dependency],
    target: &DependencyIdent,
    candidates: &[Dependency],
    ticket: u64,
) -> (Vec<Dependency>, String) {
    let mut metadata = metadata_with(old);
    let outcome = merge(
        &mut metadata,
        target,
        candidates,
        &VersionLine::LATEST,
        NonZeroUsize::new(2).unwrap(),
    )
    .unwrap();

    let message = Changes::between(&outcome.previous, &outcome.dependencies, target.clone())
        .commit_message(ticket)
        .unwrap_or_default();
    (outcome.dependencies, message)
}

#[test]
fn adding_a_new_dependency() {
    let old = [dep("node", "18.0.0", &["cflinuxfs4"], "n")];
    let new = dep("go", "1.21", &["cflinuxfs4"], "b");

    let (deps, message) = run(&old, &new.ident(), std::slice::from_ref(&new), 123);

    assert_eq!(deps.len(), old.len() + 1);
    assert_eq!(message, "Add go 1.21\n\nfor stack(s) cflinuxfs4 [#123]");
}

#[test]
fn rebuilding_keeps_the_size() {
    let old = [
        dep("go", "1.20", &["cflinuxfs4"], "a"),
        dep("go", "1.21", &["cflinuxfs4"], "b"),
    ];
    let rebuilt = dep("go", "1.21", &["cflinuxfs4"], "c");

    let (deps, message) = run(&old, &rebuilt.ident(), std::slice::from_ref(&rebuilt), 8);

    assert_eq!(deps, [old[0].clone(), rebuilt]);
    assert_eq!(message, "Rebuild go 1.21\n\nfor stack(s) cflinuxfs4 [#8]");
}

#[test]
fn retention_removes_old_versions_and_reports_them() {
    let old = [
        dep("go", "1.19", &["cflinuxfs3"], "a"),
        dep("go", "1.20", &["cflinuxfs3"], "b"),
        dep("go", "1.19", &["cflinuxfs4"], "c"),
        dep("go", "1.20", &["cflinuxfs4"], "d"),
    ];
    let candidates = [
        dep("go", "1.21", &["cflinuxfs3"], "e"),
        dep("go", "1.21", &["cflinuxfs4"], "f"),
    ];
    let target = DependencyIdent::new("go", "1.21");

    let (deps, message) = run(&old, &target, &candidates, 5);

    let versions = deps.iter().map(|dep| dep.version.as_str()).collect::<Vec<_>>();
    assert_eq!(versions, ["1.20", "1.20", "1.21", "1.21"]);
    assert_eq!(
        message,
        "Add go 1.21, remove go 1.19\n\nfor stack(s) cflinuxfs3, cflinuxfs4 [#5]"
    );
}

#[test]
fn rebuild_gaining_a_stack_keeps_older_versions() {
    let old = [
        dep("go", "1.19", &["bionic", "tiny"], "a"),
        dep("go", "1.20", &["bionic", "tiny"], "b"),
    ];
    let rebuilt = dep("go", "1.20", &["bionic", "tiny", "jammy"], "c");

    let (deps, message) = run(&old, &rebuilt.ident(), std::slice::from_ref(&rebuilt), 1);

    assert_eq!(deps, [old[0].clone(), rebuilt]);
    assert_eq!(
        message,
        "Add go 1.20\n\nfor stack(s) bionic, jammy, tiny [#1]"
    );
}

#[test]
fn partial_eviction_only_reports_the_evicted_stack() {
    let old = [
        dep("go", "1.20", &["cflinuxfs4", "jammy"], "a"),
        dep("go", "1.21", &["cflinuxfs4"], "b"),
    ];
    let new = dep("go", "1.22", &["cflinuxfs4"], "c");

    let (deps, message) = run(&old, &new.ident(), std::slice::from_ref(&new), 1);

    let stacks = deps
        .iter()
        .map(|dep| (dep.version.as_str(), dep.stacks.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        stacks,
        [
            ("1.20", vec![Stack::from("jammy")]),
            ("1.21", vec![Stack::from("cflinuxfs4")]),
            ("1.22", vec![Stack::from("cflinuxfs4")]),
        ]
    );
    assert_eq!(
        message,
        "Add go 1.22, remove go 1.20\n\nfor stack(s) cflinuxfs4 [#1]"
    );
}

#[test]
fn rerunning_on_the_merged_manifest_is_a_no_op() {
    let old = [dep("go", "1.20", &["cflinuxfs4"], "a")];
    let candidates = [
        dep("go", "1.21", &["cflinuxfs4"], "b"),
        dep("go", "1.21", &["jammy"], "c"),
    ];
    let target = DependencyIdent::new("go", "1.21");

    let (merged, message) = run(&old, &target, &candidates, 1);
    assert!(!message.is_empty());

    let (remerged, message) = run(&merged, &target, &candidates, 1);
    assert_eq!(remerged, merged);
    assert_eq!(message, "");

    // The classification itself is pure
    assert_eq!(
        render(&old, &merged, "go", "1.21", 1),
        render(&old, &merged, "go", "1.21", 1)
    );
}

#[test]
fn message_scenarios() {
    let unchanged = [dep("go", "1.20", &["cflinuxfs4"], "a")];
    assert_eq!(render(&unchanged, &unchanged, "go", "1.20", 1), "");

    let added = [dep("go", "1.21", &["cflinuxfs4"], "b")];
    assert_eq!(
        render(&[], &added, "go", "1.21", 123),
        "Add go 1.21\n\nfor stack(s) cflinuxfs4 [#123]"
    );

    assert_eq!(
        render(&unchanged, &added, "go", "1.21", 5),
        "Add go 1.21, remove go 1.20\n\nfor stack(s) cflinuxfs4 [#5]"
    );
}

#[test]
fn merged_metadata_decodes_to_the_outcome() {
    let old = [dep("go", "1.20", &["cflinuxfs4"], "a")];
    let new = dep("go", "1.21", &["cflinuxfs4"], "b");
    let mut metadata = metadata_with(&old);
    metadata.insert("include-files".to_owned(), toml::Value::Array(Vec::new()));

    let outcome = merge(
        &mut metadata,
        &new.ident(),
        std::slice::from_ref(&new),
        &VersionLine::LATEST,
        NonZeroUsize::new(2).unwrap(),
    )
    .unwrap();

    assert_eq!(decode_dependencies(&metadata).unwrap(), outcome.dependencies);
    assert!(metadata.contains_key("include-files"));
}

#[test]
fn groups_follow_the_new_version_on_every_stack() {
    let group = |id: &str, version: &str| Group {
        id: id.to_owned(),
        version: version.to_owned(),
        optional: None,
    };
    let orders = vec![
        Order {
            group: vec![group("go", "1.19"), group("node", "18.0.0")],
        },
        Order {
            group: vec![group("go", "1.20")],
        },
    ];

    let synced = sync_groups(orders, &DependencyIdent::new("go", "1.21"));

    assert_eq!(
        synced,
        [
            Order {
                group: vec![group("go", "1.21"), group("node", "18.0.0")],
            },
            Order {
                group: vec![group("go", "1.21")],
            },
        ]
    );
}
