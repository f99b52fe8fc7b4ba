use crate::components::google_calendar::models::CalendarEvent;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable index of a node in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey(pub(crate) usize);

impl NodeKey {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Provider an event node came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Google,
    Outlook,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Google => write!(f, "google"),
            EventSource::Outlook => write!(f, "outlook"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    Date {
        start_date: NaiveDate,
        /// Last day of a multi-day span
        end_date: Option<NaiveDate>,
    },
    Event {
        event: Box<CalendarEvent>,
        source: EventSource,
    },
    Location {
        event_id: String,
        source: EventSource,
    },
    Reminder {
        event_id: String,
        source: EventSource,
        minutes_before: i64,
        reminder_index: usize,
    },
}

/// One node of the calendar tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    /// Display id, regenerated on every refresh
    pub id: u64,
    pub kind: NodeKind,
    pub label: String,
    pub tooltip: Option<String>,
    pub icon: &'static str,
    pub context_value: Option<&'static str>,
    pub visible: bool,
    pub is_past: bool,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
}

impl Node {
    pub fn is_date(&self) -> bool {
        matches!(self.kind, NodeKind::Date { .. })
    }

    pub fn is_event(&self) -> bool {
        matches!(self.kind, NodeKind::Event { .. })
    }

    /// The wrapped event of an event node
    pub fn event(&self) -> Option<&CalendarEvent> {
        match &self.kind {
            NodeKind::Event { event, .. } => Some(event),
            _ => None,
        }
    }

    /// Event id this node belongs to
    pub fn event_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Date { .. } => None,
            NodeKind::Event { event, .. } => Some(&event.id),
            NodeKind::Location { event_id, .. } | NodeKind::Reminder { event_id, .. } => {
                Some(event_id)
            }
        }
    }

    pub fn source(&self) -> Option<EventSource> {
        match &self.kind {
            NodeKind::Date { .. } => None,
            NodeKind::Event { source, .. }
            | NodeKind::Location { source, .. }
            | NodeKind::Reminder { source, .. } => Some(*source),
        }
    }

    /// Key used to remember the expansion state of a date node across rebuilds
    pub fn expansion_key(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Date {
                start_date,
                end_date,
            } => Some(format!(
                "{}{}",
                start_date,
                end_date.map(|d| d.to_string()).unwrap_or_default()
            )),
            _ => None,
        }
    }
}

pub mod context {
    pub const EVENT: &str = "canEdit canDelete canOpen canSetLocation canSetReminder";
    pub const LOCATION: &str = "canEdit canDelete canSetLocation";
    pub const REMINDER: &str = "canEdit canDelete canSetReminder";
}
