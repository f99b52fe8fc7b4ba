use super::icons;
use super::labels::LabelFormatter;
use super::node::{context, EventSource, Node, NodeKey, NodeKind};
use crate::components::google_calendar::models::CalendarEvent;
use crate::components::google_calendar::time::{event_end, event_start, EventTime};
use crate::error::CalendarResult;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::debug;

/// Display ids are `build_counter * ID_STRIDE + node_counter`
pub const ID_STRIDE: u64 = 1_000_000;

/// Day-grouped tree of calendar events, stored as an arena of nodes
#[derive(Debug, Clone)]
pub struct CalendarTree {
    pub(super) nodes: Vec<Node>,
    pub(super) roots: Vec<NodeKey>,
    build_counter: u64,
    node_counter: u64,
    pub(super) expanded_nodes: HashMap<String, bool>,
    pub(super) expanded_by_default: bool,
    labels: LabelFormatter,
    tz: Tz,
}

impl CalendarTree {
    pub fn new(labels: LabelFormatter, tz: Tz) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            build_counter: 1,
            node_counter: 1,
            expanded_nodes: HashMap::new(),
            expanded_by_default: false,
            labels,
            tz,
        }
    }

    /// Continue numbering from a persisted build counter
    pub fn with_build_counter(mut self, build_counter: u64) -> Self {
        self.build_counter = build_counter.max(1);
        self
    }

    pub fn build_counter(&self) -> u64 {
        self.build_counter
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Swap label policy and timezone; takes effect on the next rebuild
    pub fn set_presentation(&mut self, labels: LabelFormatter, tz: Tz) {
        self.labels = labels;
        self.tz = tz;
    }

    pub fn has_content(&self) -> bool {
        !self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, key: NodeKey) -> &Node {
        &self.nodes[key.0]
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key.0)
    }

    /// All date nodes in display order, visible or not
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Drop all nodes before a fresh fetch
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    fn next_id(&mut self) -> u64 {
        let id = self.build_counter * ID_STRIDE + self.node_counter;
        self.node_counter += 1;
        id
    }

    fn push(&mut self, node: Node) -> NodeKey {
        let key = NodeKey(self.nodes.len());
        self.nodes.push(node);
        key
    }

    fn find_date_node(&self, date: NaiveDate) -> Option<NodeKey> {
        self.roots.iter().copied().find(|key| {
            matches!(
                self.nodes[key.0].kind,
                NodeKind::Date { start_date, end_date: None } if start_date == date
            )
        })
    }

    /// Insert one event, creating its date node when needed
    pub fn add(&mut self, event: &CalendarEvent, source: EventSource) -> CalendarResult<NodeKey> {
        let now = Utc::now().with_timezone(&self.tz);
        self.add_at(event, source, now)
    }

    /// Insert one event relative to the given current time
    pub fn add_at(
        &mut self,
        event: &CalendarEvent,
        source: EventSource,
        now: DateTime<Tz>,
    ) -> CalendarResult<NodeKey> {
        let tz = self.tz;
        let today = now.date_naive();
        let start = event_start(event, &tz)?;
        let start_date = start.date();
        let all_day = start.is_all_day();

        // Exclusive end date of all-day events; a span covers more than one day
        let span_end = event
            .end
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .filter(|end| LabelFormatter::days_from(start_date, *end) > 1)
            .map(|end| end - Duration::days(1));

        let is_date_past = start_date < today;

        let date_key = match (span_end, self.find_date_node(start_date)) {
            (None, Some(key)) => key,
            _ => {
                let label = match span_end {
                    Some(end) => self.labels.span_label(start_date, end, today),
                    None => self.labels.date_label(start_date, today),
                };
                let node = Node {
                    id: self.next_id(),
                    kind: NodeKind::Date {
                        start_date,
                        end_date: span_end,
                    },
                    label,
                    tooltip: Some(self.labels.full_date_label(start_date)),
                    icon: icons::CALENDAR,
                    context_value: None,
                    visible: true,
                    is_past: is_date_past,
                    parent: None,
                    children: Vec::new(),
                };
                let key = self.push(node);
                self.roots.push(key);
                let nodes = &self.nodes;
                self.roots.sort_by_key(|key| match nodes[key.0].kind {
                    NodeKind::Date { start_date, .. } => start_date,
                    _ => NaiveDate::MIN,
                });
                key
            }
        };

        let label = self.event_label(event, &start);
        let mut tooltip = event
            .location
            .as_deref()
            .map(|location| {
                t!(
                    "location_tooltip",
                    locale = self.labels.locale().language,
                    location = location
                )
                .to_string()
            })
            .unwrap_or_default();
        if let Some(description) = &event.description {
            if !tooltip.trim().is_empty() {
                tooltip.push('\n');
            }
            tooltip.push_str(description);
        }

        let start_instant = start.instant(&tz);
        let is_event_past = is_date_past || (!all_day && start_instant < now);

        let event_node = Node {
            id: self.next_id(),
            kind: NodeKind::Event {
                event: Box::new(event.clone()),
                source,
            },
            label,
            tooltip: (!tooltip.is_empty()).then_some(tooltip),
            icon: icons::icon_for_summary(event.summary_or_default(), all_day),
            context_value: Some(context::EVENT),
            visible: true,
            is_past: is_event_past,
            parent: Some(date_key),
            children: Vec::new(),
        };
        let event_key = self.push(event_node);

        let mut reminders: Vec<(usize, i64, String)> = event
            .reminder_overrides()
            .iter()
            .enumerate()
            .map(|(index, reminder)| (index, reminder.minutes, reminder.method.clone()))
            .collect();
        // Earliest firing reminder first
        reminders.sort_by(|a, b| b.1.cmp(&a.1));

        for (reminder_index, minutes_before, method) in reminders {
            let fires_at = start_instant - Duration::minutes(minutes_before);
            let label = t!(
                "reminder_label",
                locale = self.labels.locale().language,
                method = method,
                time = self.labels.time_label(&fires_at),
                date = self.labels.short_date_label(fires_at.date_naive())
            )
            .to_string();
            let node = Node {
                id: self.next_id(),
                kind: NodeKind::Reminder {
                    event_id: event.id.clone(),
                    source,
                    minutes_before,
                    reminder_index,
                },
                label,
                tooltip: None,
                icon: icons::REMINDER,
                context_value: Some(context::REMINDER),
                visible: true,
                is_past: start_instant < now,
                parent: Some(event_key),
                children: Vec::new(),
            };
            let key = self.push(node);
            self.nodes[event_key.0].children.push(key);
        }

        if let Some(location) = &event.location {
            let node = Node {
                id: self.next_id(),
                kind: NodeKind::Location {
                    event_id: event.id.clone(),
                    source,
                },
                label: t!(
                    "location_label",
                    locale = self.labels.locale().language,
                    location = location
                )
                .to_string(),
                tooltip: None,
                icon: icons::LOCATION,
                context_value: Some(context::LOCATION),
                visible: true,
                is_past: start_instant < now,
                parent: Some(event_key),
                children: Vec::new(),
            };
            let key = self.push(node);
            self.nodes[event_key.0].children.push(key);
        }

        self.nodes[date_key.0].children.push(event_key);
        debug!("Added event '{}' under '{}'", event.id, self.nodes[date_key.0].label);
        Ok(event_key)
    }

    fn event_label(&self, event: &CalendarEvent, start: &EventTime) -> String {
        let language = self.labels.locale().language;
        let mut label = match start {
            EventTime::AllDay(_) => String::new(),
            EventTime::Timed(start_time) => {
                let start_label = self.labels.time_label(start_time);
                match event_end(event, &self.tz) {
                    Some(EventTime::Timed(end_time)) if end_time != *start_time => t!(
                        "time_range",
                        locale = language,
                        start = start_label,
                        end = self.labels.time_label(&end_time)
                    )
                    .to_string(),
                    _ => start_label,
                }
            }
        };

        if !label.is_empty() {
            label.push_str(", ");
        }
        match event.summary.as_deref() {
            Some(summary) => label.push_str(summary),
            None => label.push_str(&t!("untitled_event", locale = language)),
        }
        label
    }

    /// Regenerate display ids from the next build counter
    pub fn refresh(&mut self) {
        self.build_counter += 1;
        self.node_counter = 1;
        let roots = self.roots.clone();
        self.renumber(&roots);
    }

    fn renumber(&mut self, keys: &[NodeKey]) {
        for key in keys {
            let id = self.next_id();
            self.nodes[key.0].id = id;
            let children = self.nodes[key.0].children.clone();
            self.renumber(&children);
        }
    }

    /// Visible children of a node, or the visible date nodes for `None`
    pub fn children(&self, parent: Option<NodeKey>) -> Vec<NodeKey> {
        let keys = match parent {
            None => &self.roots,
            Some(key) => &self.nodes[key.0].children,
        };
        keys.iter()
            .copied()
            .filter(|key| self.nodes[key.0].visible)
            .collect()
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes[key.0].parent
    }

    /// Node key of the event node with the given event id
    pub fn find_event(&self, event_id: &str) -> Option<NodeKey> {
        self.nodes
            .iter()
            .position(|node| node.is_event() && node.event_id() == Some(event_id))
            .map(NodeKey)
    }

    /// Node with the given display id
    pub fn find_by_id(&self, id: u64) -> Option<NodeKey> {
        self.nodes.iter().position(|node| node.id == id).map(NodeKey)
    }

    /// Events currently in the tree with their sources
    pub fn events(&self) -> impl Iterator<Item = (&CalendarEvent, EventSource)> {
        self.nodes.iter().filter_map(|node| match &node.kind {
            NodeKind::Event { event, source } => Some((event.as_ref(), *source)),
            _ => None,
        })
    }
}
