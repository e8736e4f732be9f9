//! Types and enums used across the browser engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys;

/// One entry of the raw, flat item list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub key: String,
    pub modified: Option<DateTime<Utc>>,
    pub size: u64,
    /// Placeholder row for a folder that is still being named
    #[serde(default)]
    pub draft: bool,
}

impl Item {
    pub fn new(key: impl Into<String>, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            modified,
            size,
            draft: false,
        }
    }

    /// Folder item standing in for a folder that only exists implicitly
    pub fn folder(key: impl Into<String>) -> Self {
        Self::new(key, 0, None)
    }

    pub fn draft(key: impl Into<String>) -> Self {
        Self {
            draft: true,
            ..Self::folder(key)
        }
    }

    pub fn is_folder(&self) -> bool {
        keys::is_folder(&self.key)
    }

    pub fn name(&self) -> &str {
        keys::name(&self.key)
    }
}

/// Derived, ephemeral tree node rebuilt on every pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(Item),
    Folder { item: Item, children: Vec<Node> },
}

impl Node {
    pub fn item(&self) -> &Item {
        match self {
            Node::File(item) => item,
            Node::Folder { item, .. } => item,
        }
    }

    pub fn key(&self) -> &str {
        &self.item().key
    }

    /// Children (empty for files)
    pub fn children(&self) -> &[Node] {
        match self {
            Node::File(_) => &[],
            Node::Folder { children, .. } => children,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder { .. })
    }
}

/// Kind of item a click landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    pub fn of(key: &str) -> Self {
        if keys::is_folder(key) {
            ItemKind::Folder
        } else {
            ItemKind::File
        }
    }
}

/// A file handed to the create-files collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub size: u64,
}

/// Mutually exclusive interaction modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Rename,
    Delete,
    Move,
    CreateFolder,
}

/// Commands the action bar may offer for the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    CreateFolder,
    Rename,
    Delete,
    Download,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    ByName,
    ByModified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStyle {
    List,
    Table,
}

/// Scroll position of the file list viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollEvent {
    pub scroll_height: u32,
    pub scroll_top: u32,
    pub client_height: u32,
}

impl ScrollEvent {
    pub fn at_bottom(&self) -> bool {
        self.scroll_height.saturating_sub(self.scroll_top) <= self.client_height
    }
}

/// One row of the flattened, visibility-filtered sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub item: Item,
    /// Indentation level; always 0 while a name filter is active
    pub depth: usize,
}

impl Row {
    pub fn key(&self) -> &str {
        &self.item.key
    }
}
