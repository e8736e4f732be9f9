//! Render-ready snapshot of the browser

use serde::Serialize;

use super::types::{Action, Command, Item, RenderStyle};
use super::Browser;

/// One visible row with its interaction flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRow {
    pub item: Item,
    pub depth: usize,
    pub selected: bool,
    /// Folder rows only; every folder counts as open while filtering
    pub open: bool,
    pub renaming: bool,
    pub deleting: bool,
    /// Placeholder for a folder still being named
    pub draft: bool,
    pub draggable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserView {
    pub rows: Vec<ViewRow>,
    /// Rows before paging
    pub total_rows: usize,
    /// Filtered results were cut at the current page size
    pub has_more: bool,
    pub empty_message: Option<String>,
    pub selected_count: usize,
    /// Most recently selected key, shown in the details pane
    pub preview: Option<String>,
    #[serde(skip)]
    pub commands: Vec<Command>,
    pub render_style: RenderStyle,
    pub name_filter: String,
    pub can_filter: bool,
    pub active_action: Option<Action>,
    pub action_targets: Vec<String>,
}

impl Browser {
    pub fn view(&self) -> BrowserView {
        let pipeline = self.pipeline();
        let filtering = !self.name_filter.is_empty();
        let active_action = self.action.active();

        let total_rows = pipeline.rows.len();
        let shown = if filtering {
            total_rows.min(self.search_results_shown)
        } else {
            total_rows
        };

        let rows: Vec<ViewRow> = pipeline
            .rows
            .into_iter()
            .take(shown)
            .map(|row| {
                let key = row.item.key.as_str();
                let targeted = self.action.targets_include(key);
                let open = row.item.is_folder() && (filtering || self.is_open(key));
                let draggable = self.capabilities.can_move()
                    && self
                        .drag_drop
                        .as_ref()
                        .is_some_and(|policy| policy.can_drag(&row.item));

                ViewRow {
                    selected: self.selection.contains(key),
                    open,
                    renaming: targeted
                        && matches!(active_action, Some(Action::Rename | Action::CreateFolder)),
                    deleting: targeted && active_action == Some(Action::Delete),
                    draft: row.item.draft,
                    draggable,
                    depth: row.depth,
                    item: row.item,
                }
            })
            .collect();

        let empty_message = rows.is_empty().then(|| {
            if filtering {
                format!("No files matching \"{}\".", self.name_filter)
            } else {
                self.settings.no_files_message.clone()
            }
        });

        BrowserView {
            has_more: filtering && total_rows > shown,
            total_rows,
            rows,
            empty_message,
            selected_count: self.selection.len(),
            preview: self.selection.keys().last().cloned(),
            commands: self.commands(),
            render_style: self.settings.render_style,
            name_filter: self.name_filter.clone(),
            can_filter: self.settings.can_filter,
            active_action,
            action_targets: self.action.targets().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::browser::selection::Modifiers;
    use crate::browser::DefaultDragDrop;
    use crate::collaborators::{CallLog, Collaborators};
    use crate::settings::BrowserSettings;

    fn many_files(count: usize) -> Vec<Item> {
        (0..count)
            .map(|i| Item::new(format!("logs/day-{i:02}.log"), 100, None))
            .collect()
    }

    #[test]
    fn test_search_results_are_paged() {
        let log = CallLog::new();
        let mut browser = Browser::new(BrowserSettings::default(), log.collaborators());
        browser.set_items(many_files(45));

        // Unfiltered views are never cut
        browser.toggle_folder("logs/");
        assert_eq!(browser.view().rows.len(), 46);
        assert!(!browser.view().has_more);

        browser.update_filter("log");
        let view = browser.view();
        assert_eq!(view.rows.len(), 20);
        assert_eq!(view.total_rows, 45);
        assert!(view.has_more);

        browser.show_more();
        browser.show_more();
        let view = browser.view();
        assert_eq!(view.rows.len(), 45);
        assert!(!view.has_more);
    }

    #[test]
    fn test_empty_messages() {
        let settings = BrowserSettings {
            no_files_message: "Nothing here yet.".into(),
            ..BrowserSettings::default()
        };
        let mut browser = Browser::new(settings, CallLog::new().collaborators());
        assert_eq!(
            browser.view().empty_message.as_deref(),
            Some("Nothing here yet.")
        );

        browser.set_items(many_files(3));
        assert_eq!(browser.view().empty_message, None);

        browser.update_filter("zzz");
        assert_eq!(
            browser.view().empty_message.as_deref(),
            Some("No files matching \"zzz\".")
        );
    }

    #[test]
    fn test_row_flags_follow_action() {
        let log = CallLog::new();
        let mut browser = Browser::new(BrowserSettings::default(), log.collaborators());
        browser.set_items(vec![Item::new("a.txt", 1, None), Item::new("b.txt", 1, None)]);

        browser.select("a.txt", Modifiers::default());
        browser.begin_delete().unwrap();
        let view = browser.view();
        assert!(view.rows[0].selected && view.rows[0].deleting);
        assert!(!view.rows[1].selected && !view.rows[1].deleting);
        assert_eq!(view.preview.as_deref(), Some("a.txt"));
        assert_eq!(view.selected_count, 1);

        browser.begin_rename().unwrap();
        let view = browser.view();
        assert!(view.rows[0].renaming && !view.rows[0].deleting);

        browser.select("b.txt", Modifiers::ctrl());
        assert_eq!(browser.view().preview.as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_draft_row_is_flagged() {
        let log = CallLog::new();
        let mut browser = Browser::new(BrowserSettings::default(), log.collaborators());
        browser.set_items(vec![Item::new("a.txt", 1, None)]);
        browser.begin_create_folder().unwrap();

        let view = browser.view();
        let draft = view.rows.iter().find(|r| r.draft).unwrap();
        assert_eq!(draft.item.key, "__new__/");
        assert!(draft.selected && draft.renaming);
        assert!(!draft.draggable);
    }

    #[test]
    fn test_rows_are_draggable_only_when_moves_are_possible() {
        let items = vec![Item::new("a.txt", 1, None)];

        let mut browser = Browser::new(BrowserSettings::default(), CallLog::new().collaborators())
            .with_drag_drop(Arc::new(DefaultDragDrop));
        browser.set_items(items.clone());
        assert!(browser.view().rows[0].draggable);

        let mut browser = Browser::new(BrowserSettings::default(), Collaborators::new())
            .with_drag_drop(Arc::new(DefaultDragDrop));
        browser.set_items(items.clone());
        assert!(!browser.view().rows[0].draggable);

        let mut browser = Browser::new(BrowserSettings::default(), CallLog::new().collaborators());
        browser.set_items(items);
        assert!(!browser.view().rows[0].draggable);
    }

    #[test]
    fn test_zero_page_size_falls_back_to_default() {
        let settings = BrowserSettings {
            results_per_page: 0,
            ..BrowserSettings::default()
        };
        let mut browser = Browser::new(settings, CallLog::new().collaborators());
        browser.set_items(many_files(25));
        assert_eq!(
            browser.settings().results_per_page,
            BrowserSettings::default().results_per_page
        );

        browser.update_filter("log");
        let view = browser.view();
        assert_eq!(view.rows.len(), 20);
        assert!(view.has_more);

        browser.show_more();
        assert_eq!(browser.view().rows.len(), 25);
    }
}
