//! Drag-and-drop hooks. Drops are translated into bulk moves.

use crate::keys;

use super::types::Item;

/// Decides which rows can be dragged and where they can land
pub trait DragDropPolicy: Send + Sync {
    fn can_drag(&self, item: &Item) -> bool {
        !item.draft
    }

    /// Default: folders (or the root) that are not one of the dragged keys
    /// or inside one of them
    fn can_drop(&self, targets: &[String], destination: &str) -> bool {
        (destination.is_empty() || keys::is_folder(destination))
            && !targets
                .iter()
                .any(|t| t == destination || keys::is_ancestor(t, destination))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDragDrop;

impl DragDropPolicy for DefaultDragDrop {}

/// What the drag source sees once the drag ends
pub trait DropMonitor {
    fn did_drop(&self) -> bool;

    /// Folder key of the drop target, `""` for the root
    fn drop_path(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropResult {
    pub dropped: bool,
    pub path: Option<String>,
}

impl DropResult {
    pub fn onto(path: impl Into<String>) -> Self {
        Self {
            dropped: true,
            path: Some(path.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self::default()
    }
}

impl DropMonitor for DropResult {
    fn did_drop(&self) -> bool {
        self.dropped
    }

    fn drop_path(&self) -> Option<String> {
        self.path.clone()
    }
}
