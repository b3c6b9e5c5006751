//! Depth-first search over the target surface's object graph.

use std::collections::BTreeMap;

use tracing::debug;

use crate::node::NodeRef;

/// Occurrences per concrete type name.
pub type TypeHistogram = BTreeMap<String, usize>;

/// Render a histogram as `count  type` lines, most frequent first.
pub fn render_histogram(histogram: &TypeHistogram) -> String {
    let mut rows: Vec<(&String, &usize)> = histogram.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let total: usize = histogram.values().sum();
    let mut report = format!("{} nodes, {} types\n", total, histogram.len());
    for (type_name, count) in rows {
        report.push_str(&format!("{:>6}  {}\n", count, type_name));
    }
    report
}

/// Traversal over externally owned, tree-shaped node graphs.
///
/// Nodes are visited parent-first, children in the container's native order.
/// A node whose child collection cannot be enumerated is treated as a leaf.
pub struct TreeSearch;

impl TreeSearch {
    /// Collect every node accepted by `matches`.
    ///
    /// With `stop_on_first`, returns as soon as one node matched without
    /// visiting the remaining siblings or subtrees.
    pub fn find_all<F>(root: Option<&NodeRef>, mut matches: F, stop_on_first: bool) -> Vec<NodeRef>
    where
        F: FnMut(&NodeRef) -> bool,
    {
        let mut found = Vec::new();
        Self::walk(root, |node| {
            if matches(node) {
                found.push(node.clone());
                if stop_on_first {
                    return false;
                }
            }
            true
        });
        found
    }

    /// First node accepted by `matches`, in traversal order.
    pub fn find_first<F>(root: Option<&NodeRef>, matches: F) -> Option<NodeRef>
    where
        F: FnMut(&NodeRef) -> bool,
    {
        Self::find_all(root, matches, true).into_iter().next()
    }

    /// Count nodes per concrete type, optionally keeping only types whose name
    /// starts with `prefix`.
    pub fn collect_type_histogram(root: Option<&NodeRef>, prefix: Option<&str>) -> TypeHistogram {
        let mut histogram = TypeHistogram::new();
        Self::walk(root, |node| {
            let type_name = node.type_name();
            if prefix.is_none_or(|p| type_name.starts_with(p)) {
                *histogram.entry(type_name.to_string()).or_insert(0) += 1;
            }
            true
        });
        histogram
    }

    /// Whether a node's type name contains any of the given patterns.
    pub fn type_matches(node: &NodeRef, patterns: &[String]) -> bool {
        let type_name = node.type_name();
        patterns.iter().any(|p| type_name.contains(p.as_str()))
    }

    /// Pre-order walk; `visit` returns `false` to stop.
    fn walk<F>(root: Option<&NodeRef>, mut visit: F)
    where
        F: FnMut(&NodeRef) -> bool,
    {
        let Some(root) = root else {
            return;
        };

        let mut stack: Vec<NodeRef> = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if !visit(&node) {
                return;
            }

            match node.children() {
                Ok(Some(children)) => {
                    stack.extend(children.into_iter().rev());
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("Treating {} as a leaf: {}", node.type_name(), e);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
