use crate::tree::{CalendarTree, CollapsibleState, NodeKey};
use std::fmt::Write;

const INDENT: &str = "  ";

/// Plain-text rendering of the visible tree. Collapsed nodes hide their children.
pub fn render_tree(tree: &CalendarTree, show_ids: bool) -> String {
    let mut out = String::new();
    for key in tree.children(None) {
        render_node(tree, key, 0, show_ids, &mut out);
    }
    out
}

fn render_node(tree: &CalendarTree, key: NodeKey, depth: usize, show_ids: bool, out: &mut String) {
    let item = tree.tree_item(key);
    let marker = match item.collapsible_state {
        CollapsibleState::Expanded => "▾ ",
        CollapsibleState::Collapsed => "▸ ",
        CollapsibleState::None => "  ",
    };

    let _ = write!(out, "{}{}{}", INDENT.repeat(depth), marker, item.text());
    if show_ids {
        let _ = write!(out, "  [#{}", item.id);
        if let Some(event_id) = tree.node(key).event().map(|event| event.id.as_str()) {
            let _ = write!(out, " {}", event_id);
        }
        out.push(']');
    }
    out.push('\n');

    if item.collapsible_state == CollapsibleState::Expanded {
        for child in tree.children(Some(key)) {
            render_node(tree, child, depth + 1, show_ids, out);
        }
    }
}
