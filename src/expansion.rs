use std::collections::HashMap;

use crate::TreeNode;

/// Per-node expand/collapse flags, keyed by item id.
///
/// Kept apart from the tree itself so that flags survive a rebuild for every
/// id that is still present. Unknown ids read as collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: HashMap<String, bool>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.get(id).copied().unwrap_or(false)
    }

    /// Flips the flag for `id` and returns the new value.
    pub fn toggle(&mut self, id: &str) -> bool {
        let flag = self.expanded.entry(id.to_string()).or_insert(false);
        *flag = !*flag;
        *flag
    }

    pub fn set(&mut self, id: impl Into<String>, expanded: bool) {
        self.expanded.insert(id.into(), expanded);
    }

    /// Expands every node that has children.
    pub fn expand_all(&mut self, nodes: &[TreeNode]) {
        for node in nodes {
            if node.has_children() {
                self.set(node.id.clone(), true);
            }
            self.expand_all(&node.children);
        }
    }

    pub fn reset(&mut self) {
        self.expanded.clear();
    }
}
