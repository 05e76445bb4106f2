//! Board changes carried by a task.
//!
//! Each variant carries only what its mutation needs. The widget fields
//! themselves (`data`) stay opaque JSON: their schema belongs to the board
//! platform and the handler, the queue forwards them verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mutation type of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Create,
    Update,
    Delete,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Create => "create",
            TaskKind::Update => "update",
            TaskKind::Delete => "delete",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board item families the add-in renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Shape,
    StickyNote,
    Card,
    Text,
    Frame,
    Connector,
}

/// Create a new board item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateItem {
    pub item_type: ItemType,
    /// Opaque item fields (content, style, geometry, ...).
    pub data: serde_json::Value,
}

/// Patch an existing board item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub item_type: ItemType,
    /// Opaque partial item fields.
    pub data: serde_json::Value,
}

/// The payload of a task, tagged by mutation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardChange {
    Create(CreateItem),
    Update(UpdateItem),
    Delete,
}

impl BoardChange {
    pub fn kind(&self) -> TaskKind {
        match self {
            BoardChange::Create(_) => TaskKind::Create,
            BoardChange::Update(_) => TaskKind::Update,
            BoardChange::Delete => TaskKind::Delete,
        }
    }
}
