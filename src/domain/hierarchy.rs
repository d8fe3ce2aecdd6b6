//! Class-hierarchy listings as emitted by Doxygen (`hierarchy.js`).
//!
//! A listing is a forest of `[name, link, children]` triples where `link` is
//! an HTML page (or null) and `children` is a nested listing (or null):
//!
//! ```text
//! var hierarchy =
//! [
//!     [ "IObserver", "classIObserver.html", [
//!       [ "Logger", "classLogger.html", null ]
//!     ] ],
//!     [ "PulsePosition", "structPulsePosition.html", null ]
//! ];
//! ```
//!
//! Listings are generated wholesale on each documentation build, so this module
//! only reads, checks and compares them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;
use termtree::Tree;

use crate::domain::DomainError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub name: String,
    pub link: Option<String>,
    pub children: Option<Vec<HierarchyNode>>,
}

impl HierarchyNode {
    pub fn leaf(name: &str, link: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            link: link.map(str::to_string),
            children: None,
        }
    }

    pub fn with_children(name: &str, link: Option<&str>, children: Vec<HierarchyNode>) -> Self {
        Self {
            name: name.to_string(),
            link: link.map(str::to_string),
            children: Some(children),
        }
    }

    pub fn children(&self) -> &[HierarchyNode] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// Structural problem found in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyIssue {
    EmptyName,
    DuplicateName { name: String, count: usize },
    EmptyLink { name: String },
    /// Doxygen writes `null` for childless nodes, never `[]`.
    EmptyChildren { name: String },
}

impl fmt::Display for HierarchyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HierarchyIssue::EmptyName => write!(f, "node with empty name"),
            HierarchyIssue::DuplicateName { name, count } => {
                write!(f, "name '{}' appears {} times", name, count)
            }
            HierarchyIssue::EmptyLink { name } => write!(f, "node '{}' has an empty link", name),
            HierarchyIssue::EmptyChildren { name } => {
                write!(f, "node '{}' has an empty child list", name)
            }
        }
    }
}

/// Differences between two snapshots of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyDiff {
    pub added_nodes: Vec<String>,
    pub removed_nodes: Vec<String>,
    pub added_edges: Vec<(String, String)>,
    pub removed_edges: Vec<(String, String)>,
}

impl HierarchyDiff {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }
}

/// Parse the contents of a `hierarchy.js` file.
///
/// The `var <name> =` prefix and the trailing `;` are optional, so a bare
/// JSON array is accepted too.
pub fn parse_hierarchy_js(content: &str) -> Result<Vec<HierarchyNode>, DomainError> {
    let mut body = content.trim();
    if body.starts_with("var ") {
        body = match body.split_once('=') {
            Some((_, rest)) => rest.trim(),
            None => {
                return Err(malformed("<root>", "missing '=' after variable declaration"));
            }
        };
    }
    let body = body.trim_end_matches(';').trim_end();

    let value: Value =
        serde_json::from_str(body).map_err(|e| malformed("<root>", &e.to_string()))?;
    let items = value
        .as_array()
        .ok_or_else(|| malformed("<root>", "expected an array of nodes"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| node_from_value(item, &format!("[{}]", i)))
        .collect()
}

fn node_from_value(value: &Value, path: &str) -> Result<HierarchyNode, DomainError> {
    let fields = value
        .as_array()
        .ok_or_else(|| malformed(path, "expected [name, link, children]"))?;
    if fields.len() != 3 {
        return Err(malformed(
            path,
            &format!("expected 3 fields, found {}", fields.len()),
        ));
    }

    let name = fields[0]
        .as_str()
        .ok_or_else(|| malformed(path, "name must be a string"))?
        .to_string();

    let link = match &fields[1] {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        _ => return Err(malformed(path, "link must be a string or null")),
    };

    let children = match &fields[2] {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| node_from_value(item, &format!("{}.children[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => return Err(malformed(path, "children must be an array or null")),
    };

    Ok(HierarchyNode {
        name,
        link,
        children,
    })
}

fn malformed(path: &str, reason: &str) -> DomainError {
    DomainError::MalformedHierarchy {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Depth-first, pre-order walk over the whole forest.
fn walk(forest: &[HierarchyNode]) -> Vec<&HierarchyNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&HierarchyNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        for child in node.children().iter().rev() {
            stack.push(child);
        }
    }
    out
}

/// Check a listing for structural problems. An empty result means well-formed.
pub fn validate(forest: &[HierarchyNode]) -> Vec<HierarchyIssue> {
    let mut issues = Vec::new();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

    for node in walk(forest) {
        if node.name.trim().is_empty() {
            issues.push(HierarchyIssue::EmptyName);
        } else {
            *counts.entry(node.name.as_str()).or_default() += 1;
        }
        if matches!(&node.link, Some(link) if link.trim().is_empty()) {
            issues.push(HierarchyIssue::EmptyLink {
                name: node.name.clone(),
            });
        }
        if matches!(&node.children, Some(children) if children.is_empty()) {
            issues.push(HierarchyIssue::EmptyChildren {
                name: node.name.clone(),
            });
        }
    }

    issues.extend(
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, count)| HierarchyIssue::DuplicateName {
                name: name.to_string(),
                count,
            }),
    );
    issues
}

pub fn names(forest: &[HierarchyNode]) -> BTreeSet<String> {
    walk(forest).into_iter().map(|n| n.name.clone()).collect()
}

/// Inheritance edges as `(base, derived)` pairs.
pub fn edges(forest: &[HierarchyNode]) -> BTreeSet<(String, String)> {
    walk(forest)
        .into_iter()
        .flat_map(|parent| {
            parent
                .children()
                .iter()
                .map(move |child| (parent.name.clone(), child.name.clone()))
        })
        .collect()
}

pub fn diff(old: &[HierarchyNode], new: &[HierarchyNode]) -> HierarchyDiff {
    let (old_names, new_names) = (names(old), names(new));
    let (old_edges, new_edges) = (edges(old), edges(new));

    HierarchyDiff {
        added_nodes: new_names.difference(&old_names).cloned().collect(),
        removed_nodes: old_names.difference(&new_names).cloned().collect(),
        added_edges: new_edges.difference(&old_edges).cloned().collect(),
        removed_edges: old_edges.difference(&new_edges).cloned().collect(),
    }
}

/// Render a forest under a single labelled root for terminal display.
pub fn render(label: &str, forest: &[HierarchyNode]) -> Tree<String> {
    fn build(node: &HierarchyNode) -> Tree<String> {
        let label = match &node.link {
            Some(link) => format!("{} ({})", node.name, link),
            None => node.name.clone(),
        };
        Tree::new(label).with_leaves(node.children().iter().map(build))
    }

    Tree::new(label.to_string()).with_leaves(forest.iter().map(build))
}

/// The listing of this crate's own public types.
pub fn entity_hierarchy() -> Vec<HierarchyNode> {
    use HierarchyNode as N;

    vec![
        N::with_children(
            "Entity",
            Some("trait.Entity.html"),
            vec![
                N::leaf("Intersection", Some("struct.Intersection.html")),
                N::leaf("TrafficLight", Some("struct.TrafficLight.html")),
                N::leaf("Vehicle", Some("struct.Vehicle.html")),
            ],
        ),
        N::leaf("EntityFactory", Some("struct.EntityFactory.html")),
        N::leaf("GreenWave", Some("struct.GreenWave.html")),
        N::leaf("GreenWaveCorridor", Some("struct.GreenWaveCorridor.html")),
        N::leaf("IntersectionStatistics", Some("struct.IntersectionStatistics.html")),
        N::leaf("DataManager", Some("struct.DataManager.html")),
        N::leaf("NetworkLoader", Some("struct.NetworkLoader.html")),
        N::with_children(
            "Observer",
            Some("trait.Observer.html"),
            vec![N::leaf("EventLogger", Some("struct.EventLogger.html"))],
        ),
        N::leaf("Event", Some("struct.Event.html")),
        N::leaf("Position", Some("struct.Position.html")),
        N::leaf("RoadConnection", Some("struct.RoadConnection.html")),
        N::with_children(
            "SimulationBackend",
            Some("trait.SimulationBackend.html"),
            vec![N::leaf("SumoIntegration", Some("struct.SumoIntegration.html"))],
        ),
        N::with_children(
            "Subject",
            Some("trait.Subject.html"),
            vec![N::leaf("TrafficSystem", Some("struct.TrafficSystem.html"))],
        ),
        N::with_children(
            "std::error::Error",
            None,
            vec![N::leaf("SimulationError", Some("struct.SimulationError.html"))],
        ),
        N::leaf("TrafficLightDurations", Some("struct.TrafficLightDurations.html")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"var hierarchy =
[
    [ "IObserver", "classIObserver.html", [
      [ "Logger", "classLogger.html", null ]
    ] ],
    [ "PulseEntity", "classPulseEntity.html", [
      [ "PulseIntersection", "classPulseIntersection.html", null ],
      [ "PulseVehicle", "classPulseVehicle.html", null ]
    ] ],
    [ "PulsePosition", "structPulsePosition.html", null ]
];"#;

    #[test]
    fn test_parse_sample_listing() {
        let forest = parse_hierarchy_js(SAMPLE).unwrap();

        assert_eq!(forest.len(), 3);
        assert_eq!(forest[0].name, "IObserver");
        assert_eq!(forest[0].link.as_deref(), Some("classIObserver.html"));
        assert_eq!(forest[0].children()[0].name, "Logger");
        assert_eq!(forest[1].children().len(), 2);
        assert!(forest[2].children.is_none());
    }

    #[test]
    fn test_parse_accepts_bare_array() {
        let forest = parse_hierarchy_js(r#"[["A", null, null]]"#).unwrap();
        assert_eq!(forest, vec![HierarchyNode::leaf("A", None)]);
    }

    #[test]
    fn test_parse_reports_path_of_bad_node() {
        let err = parse_hierarchy_js(r#"[["A", null, [["B", 7, null]]]]"#).unwrap_err();
        assert_eq!(
            err,
            DomainError::MalformedHierarchy {
                path: "[0].children[0]".into(),
                reason: "link must be a string or null".into()
            }
        );
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        let err = parse_hierarchy_js(r#"[["A", null]]"#).unwrap_err();
        assert!(matches!(err, DomainError::MalformedHierarchy { path, .. } if path == "[0]"));
    }

    #[test]
    fn test_parse_rejects_non_array_root() {
        assert!(parse_hierarchy_js(r#"var h = {"a": 1};"#).is_err());
    }

    #[test]
    fn test_validate_clean_listing() {
        let forest = parse_hierarchy_js(SAMPLE).unwrap();
        assert!(validate(&forest).is_empty());
    }

    #[test]
    fn test_validate_flags_duplicates_and_empties() {
        let forest = vec![
            HierarchyNode::with_children("A", Some(""), vec![HierarchyNode::leaf("B", None)]),
            HierarchyNode::with_children("B", None, vec![]),
            HierarchyNode::leaf(" ", None),
        ];

        let issues = validate(&forest);

        assert!(issues.contains(&HierarchyIssue::EmptyLink { name: "A".into() }));
        assert!(issues.contains(&HierarchyIssue::EmptyChildren { name: "B".into() }));
        assert!(issues.contains(&HierarchyIssue::EmptyName));
        assert!(issues.contains(&HierarchyIssue::DuplicateName {
            name: "B".into(),
            count: 2
        }));
    }

    #[test]
    fn test_edges_are_parent_child_pairs() {
        let forest = parse_hierarchy_js(SAMPLE).unwrap();
        let edges = edges(&forest);

        assert_eq!(edges.len(), 3);
        assert!(edges.contains(&("IObserver".to_string(), "Logger".to_string())));
        assert!(edges.contains(&("PulseEntity".to_string(), "PulseVehicle".to_string())));
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let forest = parse_hierarchy_js(SAMPLE).unwrap();
        assert!(diff(&forest, &forest).is_empty());
    }

    #[test]
    fn test_render_includes_links() {
        let forest = vec![HierarchyNode::with_children(
            "Base",
            Some("base.html"),
            vec![HierarchyNode::leaf("Derived", None)],
        )];
        let text = render("classes", &forest).to_string();

        assert!(text.starts_with("classes"));
        assert!(text.contains("Base (base.html)"));
        assert!(text.contains("Derived"));
    }

    #[test]
    fn test_entity_hierarchy_is_well_formed() {
        let forest = entity_hierarchy();
        assert!(validate(&forest).is_empty());
        assert!(edges(&forest).contains(&("Subject".to_string(), "TrafficSystem".to_string())));
    }
}
