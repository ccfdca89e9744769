use std::collections::HashMap;

use crate::RemoteItem;

/// A remote item reconstructed into its place in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    pub item_type: String,
    pub parent_path_or_name: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn from_item(item: &RemoteItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            item_type: item.item_type.clone(),
            parent_path_or_name: item.parent_path_or_name.clone(),
            children: Vec::new(),
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(TreeNode::depth).max().unwrap_or(0)
    }
}

/// How a flat item list is grouped into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeStrategy {
    /// Two fixed levels: containers of `container_type` hold leaves of
    /// `leaf_type`. Leaves whose container was not seen earlier in the list
    /// are dropped, as are items of any other type.
    Typed {
        container_type: String,
        leaf_type: String,
    },
    /// Arbitrary depth: roots are items without a parent, and the children of
    /// a node are every item whose parent id equals the node's id.
    ParentPointer,
}

impl TreeStrategy {
    pub fn typed(container_type: impl Into<String>, leaf_type: impl Into<String>) -> Self {
        Self::Typed {
            container_type: container_type.into(),
            leaf_type: leaf_type.into(),
        }
    }

    pub fn build(&self, items: &[RemoteItem]) -> Vec<TreeNode> {
        match self {
            Self::Typed {
                container_type,
                leaf_type,
            } => build_typed(items, container_type, leaf_type),
            Self::ParentPointer => build_parent_pointer(items),
        }
    }

    /// Secondary line shown under a node's name.
    pub fn secondary_text(&self, node: &TreeNode) -> String {
        match self {
            Self::Typed {
                container_type,
                leaf_type,
            } => {
                if node.item_type == *container_type {
                    format!(
                        "{} {}s",
                        node.children.len(),
                        leaf_type.to_lowercase()
                    )
                } else {
                    format!(
                        "{}: {}",
                        container_type,
                        node.parent_path_or_name.as_deref().unwrap_or_default()
                    )
                }
            }
            Self::ParentPointer => node.item_type.clone(),
        }
    }

    /// Whether a node can be expanded in the view.
    pub fn is_expandable(&self, node: &TreeNode) -> bool {
        match self {
            Self::Typed { container_type, .. } => node.item_type == *container_type,
            Self::ParentPointer => node.has_children(),
        }
    }
}

fn build_typed(items: &[RemoteItem], container_type: &str, leaf_type: &str) -> Vec<TreeNode> {
    let mut roots: Vec<TreeNode> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for item in items {
        if item.item_type == container_type {
            let node = TreeNode::from_item(item);
            // A repeated container id starts over but keeps its first position.
            match index.get(item.id.as_str()) {
                Some(&position) => roots[position] = node,
                None => {
                    index.insert(item.id.as_str(), roots.len());
                    roots.push(node);
                }
            }
        } else if item.item_type == leaf_type {
            let Some(&position) = item.parent().and_then(|parent| index.get(parent)) else {
                tracing::debug!(id = %item.id, parent_id = ?item.parent_id, "dropping orphan leaf");
                continue;
            };
            roots[position].children.push(TreeNode::from_item(item));
        }
    }

    roots
}

// Children are found by scanning the whole list for every node, so the cost
// is quadratic in the number of items.
fn build_parent_pointer(items: &[RemoteItem]) -> Vec<TreeNode> {
    let mut ancestors = Vec::new();
    items
        .iter()
        .filter(|item| item.parent().is_none())
        .map(|item| build_subtree(items, item, &mut ancestors))
        .collect()
}

fn build_subtree<'a>(
    items: &'a [RemoteItem],
    item: &'a RemoteItem,
    ancestors: &mut Vec<&'a str>,
) -> TreeNode {
    let mut node = TreeNode::from_item(item);
    if ancestors.contains(&item.id.as_str()) {
        tracing::warn!(id = %item.id, "item repeats an ancestor id, not descending");
        return node;
    }

    ancestors.push(item.id.as_str());
    node.children = items
        .iter()
        .filter(|child| child.parent() == Some(item.id.as_str()))
        .map(|child| build_subtree(items, child, ancestors))
        .collect();
    ancestors.pop();

    node
}
