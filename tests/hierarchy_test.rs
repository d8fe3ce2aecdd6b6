//! Integration tests for hierarchy.js listings on disk.

use std::fs;
use std::path::PathBuf;

use trafficpulse::domain::hierarchy::{self, HierarchyIssue};

fn resource(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources")
        .join(name)
}

fn listing(name: &str) -> Vec<hierarchy::HierarchyNode> {
    let content = fs::read_to_string(resource(name)).unwrap();
    hierarchy::parse_hierarchy_js(&content).unwrap()
}

fn pair(base: &str, derived: &str) -> (String, String) {
    (base.to_string(), derived.to_string())
}

#[test]
fn given_listing_file_when_parsing_then_roots_and_children_preserved() {
    let forest = listing("hierarchy_v1.js");

    assert_eq!(forest.len(), 14);
    let entity = forest.iter().find(|n| n.name == "PulseEntity").unwrap();
    let children: Vec<&str> = entity.children().iter().map(|n| n.name.as_str()).collect();
    assert_eq!(
        children,
        vec!["PulseIntersection", "PulseTrafficLight", "PulseVehicle"]
    );
    assert_eq!(entity.link.as_deref(), Some("classPulseEntity.html"));
    assert!(forest[0].children.is_none());
}

#[test]
fn given_well_formed_listings_when_validating_then_no_issues() {
    assert!(hierarchy::validate(&listing("hierarchy_v1.js")).is_empty());
    assert!(hierarchy::validate(&listing("hierarchy_v2.js")).is_empty());
}

#[test]
fn given_broken_listing_when_validating_then_all_issues_reported() {
    let issues = hierarchy::validate(&listing("hierarchy_broken.js"));

    assert_eq!(
        issues,
        vec![
            HierarchyIssue::EmptyLink {
                name: "PulseVehicle".into()
            },
            HierarchyIssue::EmptyChildren {
                name: "PulseVehicle".into()
            },
            HierarchyIssue::DuplicateName {
                name: "PulseVehicle".into(),
                count: 2
            },
        ]
    );
}

#[test]
fn given_two_versions_when_diffing_then_additions_are_reported() {
    let diff = hierarchy::diff(&listing("hierarchy_v1.js"), &listing("hierarchy_v2.js"));

    assert_eq!(
        diff.added_nodes,
        vec!["PulseEvent", "PulseException", "std::runtime_error"]
    );
    assert!(diff.removed_nodes.is_empty());
    assert_eq!(
        diff.added_edges,
        vec![
            pair("IObserver", "Logger"),
            pair("std::runtime_error", "PulseException"),
        ]
    );
    assert!(diff.removed_edges.is_empty());
}

#[test]
fn given_two_versions_when_diffing_backwards_then_removals_mirror_additions() {
    let forward = hierarchy::diff(&listing("hierarchy_v1.js"), &listing("hierarchy_v2.js"));
    let backward = hierarchy::diff(&listing("hierarchy_v2.js"), &listing("hierarchy_v1.js"));

    assert_eq!(backward.removed_nodes, forward.added_nodes);
    assert_eq!(backward.removed_edges, forward.added_edges);
    assert!(backward.added_nodes.is_empty());
}

#[test]
fn given_listing_when_rendering_then_tree_shows_nesting_and_links() {
    let forest = listing("hierarchy_v2.js");

    let rendered = hierarchy::render("v2", &forest).to_string();

    assert!(rendered.starts_with("v2\n"));
    assert!(rendered.contains("IObserver (classIObserver.html)"));
    assert!(rendered.contains("Logger (classLogger.html)"));
    // null link renders the bare name
    assert!(rendered.contains("std::runtime_error\n"));
}
