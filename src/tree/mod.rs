//! Calendar events grouped by day.
//!
//! Nodes live in an arena owned by [`CalendarTree`] and are addressed by
//! [`NodeKey`]. The tree is rebuilt wholesale on every fetch: `clear`, then
//! `add` for each event, then `refresh` to hand out fresh display ids.

mod builder;
mod filter;
pub mod icons;
mod item;
pub mod labels;
pub mod node;

pub use builder::{CalendarTree, ID_STRIDE};
pub use filter::compile_filter;
pub use item::{CollapsibleState, IconPath, TreeItem};
pub use labels::LabelFormatter;
pub use node::{EventSource, Node, NodeKey, NodeKind};
