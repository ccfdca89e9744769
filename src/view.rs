use crate::{ExpansionState, TreeNode, TreeStrategy};

/// One visible line of the item tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub id: String,
    pub depth: usize,
    pub label: String,
    pub secondary: String,
    pub expandable: bool,
    pub expanded: bool,
}

/// Flattens the tree into the rows currently visible, descending only into
/// expanded nodes.
pub fn visible_rows(
    nodes: &[TreeNode],
    strategy: &TreeStrategy,
    expansion: &ExpansionState,
) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    push_rows(nodes, 0, strategy, expansion, &mut rows);
    rows
}

fn push_rows(
    nodes: &[TreeNode],
    depth: usize,
    strategy: &TreeStrategy,
    expansion: &ExpansionState,
    rows: &mut Vec<TreeRow>,
) {
    for node in nodes {
        let expandable = strategy.is_expandable(node);
        let expanded = expandable && expansion.is_expanded(&node.id);
        rows.push(TreeRow {
            id: node.id.clone(),
            depth,
            label: node.name.clone(),
            secondary: strategy.secondary_text(node),
            expandable,
            expanded,
        });
        if expanded {
            push_rows(&node.children, depth + 1, strategy, expansion, rows);
        }
    }
}

impl TreeRow {
    /// Plain-text rendering with a disclosure marker.
    pub fn render(&self) -> String {
        let marker = match (self.expandable, self.expanded) {
            (true, true) => "v ",
            (true, false) => "> ",
            (false, _) => "  ",
        };
        format!(
            "{}{}{} ({})",
            "    ".repeat(self.depth),
            marker,
            self.label,
            self.secondary
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RemoteItem;

    fn hubspot_tree() -> Vec<TreeNode> {
        let items = vec![
            RemoteItem::new("crm", "HubSpot CRM", "CRM"),
            RemoteItem::new("contacts", "Contacts", "ContactList").with_parent("crm"),
            RemoteItem::new("c1", "Ada Lovelace", "Contact").with_parent("contacts"),
        ];
        TreeStrategy::ParentPointer.build(&items)
    }

    #[test]
    fn collapsed_tree_shows_only_roots() {
        let rows = visible_rows(
            &hubspot_tree(),
            &TreeStrategy::ParentPointer,
            &ExpansionState::new(),
        );
        assert_eq!(rows.len(), 1);
        assert!(rows[0].expandable);
        assert!(!rows[0].expanded);
        assert_eq!(rows[0].render(), "> HubSpot CRM (CRM)");
    }

    #[test]
    fn expanded_nodes_reveal_children_with_depth() {
        let mut expansion = ExpansionState::new();
        expansion.set("crm", true);
        expansion.set("contacts", true);
        let rows = visible_rows(&hubspot_tree(), &TreeStrategy::ParentPointer, &expansion);
        let depths: Vec<_> = rows.iter().map(|row| (row.id.as_str(), row.depth)).collect();
        assert_eq!(depths, [("crm", 0), ("contacts", 1), ("c1", 2)]);
        assert!(!rows[2].expandable);
        assert_eq!(rows[2].render(), "          Ada Lovelace (Contact)");
    }

    #[test]
    fn typed_container_without_tables_is_still_expandable() {
        let strategy = TreeStrategy::typed("Base", "Table");
        let tree = strategy.build(&[RemoteItem::new("b1", "Empty base", "Base")]);
        let mut expansion = ExpansionState::new();
        expansion.toggle("b1");
        let rows = visible_rows(&tree, &strategy, &expansion);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].expanded);
        assert_eq!(rows[0].secondary, "0 tables");
    }
}
