use super::builder::CalendarTree;
use super::node::NodeKey;
use crate::error::{CalendarResult, Error};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Compile a filter term as a case-insensitive regular expression
pub fn compile_filter(term: &str) -> CalendarResult<Regex> {
    RegexBuilder::new(term)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::InvalidFilter {
            term: term.to_string(),
            reason: e.to_string(),
        })
}

impl CalendarTree {
    /// Show nodes whose label matches `term`, plus the ancestors of matches
    pub fn filter(&mut self, term: &str) -> CalendarResult<()> {
        if term.is_empty() {
            self.clear_filter();
            return Ok(());
        }

        let matcher = compile_filter(term)?;
        debug!("Filtering tree by '{}'", term);
        let roots = self.roots.clone();
        for key in roots {
            self.filter_node(key, &matcher);
        }
        Ok(())
    }

    fn filter_node(&mut self, key: NodeKey, matcher: &Regex) -> bool {
        if matcher.is_match(&self.nodes[key.0].label) {
            self.set_subtree_visible(key);
            return true;
        }

        let children = self.nodes[key.0].children.clone();
        let mut any_visible = false;
        for child in children {
            any_visible |= self.filter_node(child, matcher);
        }
        self.nodes[key.0].visible = any_visible;
        any_visible
    }

    fn set_subtree_visible(&mut self, key: NodeKey) {
        self.nodes[key.0].visible = true;
        let children = self.nodes[key.0].children.clone();
        for child in children {
            self.set_subtree_visible(child);
        }
    }

    /// Make every node visible again
    pub fn clear_filter(&mut self) {
        for node in &mut self.nodes {
            node.visible = true;
        }
    }
}
