use super::builder::CalendarTree;
use super::node::{NodeKey, NodeKind};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollapsibleState {
    None,
    Collapsed,
    Expanded,
}

/// Theme variants of an icon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconPath {
    pub dark: PathBuf,
    pub light: PathBuf,
}

impl IconPath {
    pub fn new(resources: &Path, name: &str) -> Self {
        let file = format!("{}.svg", name);
        Self {
            dark: resources.join("icons").join("dark").join(&file),
            light: resources.join("icons").join("light").join(&file),
        }
    }
}

/// Display representation of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeItem {
    pub id: u64,
    /// Empty for past items, whose text moves to `description`
    pub label: String,
    pub description: Option<String>,
    pub tooltip: Option<String>,
    pub icon: String,
    pub collapsible_state: CollapsibleState,
    pub context_value: Option<String>,
    pub url: Option<String>,
}

impl TreeItem {
    /// Text a renderer should show
    pub fn text(&self) -> &str {
        match &self.description {
            Some(description) if self.label.is_empty() => description,
            _ => &self.label,
        }
    }

    pub fn icon_path(&self, resources: &Path) -> IconPath {
        IconPath::new(resources, &self.icon)
    }
}

impl CalendarTree {
    /// Map a node to its display item
    pub fn tree_item(&self, key: NodeKey) -> TreeItem {
        let node = self.node(key);
        let mut item = TreeItem {
            id: node.id,
            label: node.label.clone(),
            description: None,
            tooltip: node.tooltip.clone(),
            icon: node.icon.to_string(),
            collapsible_state: CollapsibleState::None,
            context_value: node.context_value.map(str::to_string),
            url: node.event().and_then(|event| event.html_link.clone()),
        };

        if node.is_past {
            item.description = Some(std::mem::take(&mut item.label));
        }

        // A day with a single event takes that event's icon and label as tooltip
        if let (NodeKind::Date { .. }, [only]) = (&node.kind, node.children.as_slice()) {
            let child = self.node(*only);
            item.icon = child.icon.to_string();
            item.tooltip = Some(child.label.clone());
        }

        if !node.children.is_empty() {
            let expanded = node
                .expansion_key()
                .and_then(|key| self.expanded_nodes.get(&key).copied())
                .unwrap_or(self.expanded_by_default);
            item.collapsible_state = if expanded {
                CollapsibleState::Expanded
            } else {
                CollapsibleState::Collapsed
            };
        }

        item
    }

    /// Remember the expansion state of a date node
    pub fn set_expanded(&mut self, key: NodeKey, expanded: bool) -> Option<String> {
        let expansion_key = self.node(key).expansion_key()?;
        self.expanded_nodes.insert(expansion_key.clone(), expanded);
        Some(expansion_key)
    }

    pub fn expanded_nodes(&self) -> &HashMap<String, bool> {
        &self.expanded_nodes
    }

    pub fn set_expanded_nodes(&mut self, expanded_nodes: HashMap<String, bool>) {
        self.expanded_nodes = expanded_nodes;
    }

    pub fn clear_expansion_state(&mut self) {
        self.expanded_nodes.clear();
    }

    /// Default state of date nodes without a remembered state
    pub fn set_expanded_by_default(&mut self, expanded: bool) {
        self.expanded_by_default = expanded;
    }
}
