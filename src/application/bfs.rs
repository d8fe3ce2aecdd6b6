//! Breadth-first traversal over string-keyed graphs.

use std::collections::{HashSet, VecDeque};

/// Visit order from `root` together with each node's BFS parent.
///
/// Each node is visited once; neighbours are explored in the order
/// `neighbors_of` yields them. An empty root yields nothing.
pub fn spanning_tree<F, I>(root: &str, mut neighbors_of: F) -> Vec<(String, Option<String>)>
where
    F: FnMut(&str) -> I,
    I: IntoIterator<Item = String>,
{
    if root.is_empty() {
        return vec![];
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut order = vec![];

    visited.insert(root.to_string());
    queue.push_back(root.to_string());
    order.push((root.to_string(), None));

    while let Some(current) = queue.pop_front() {
        for next in neighbors_of(&current) {
            if visited.insert(next.clone()) {
                order.push((next.clone(), Some(current.clone())));
                queue.push_back(next);
            }
        }
    }
    order
}

/// Breadth-first visit order from `root`.
pub fn run_bfs<F, I>(root: &str, neighbors_of: F) -> Vec<String>
where
    F: FnMut(&str) -> I,
    I: IntoIterator<Item = String>,
{
    spanning_tree(root, neighbors_of)
        .into_iter()
        .map(|(node, _)| node)
        .collect()
}
