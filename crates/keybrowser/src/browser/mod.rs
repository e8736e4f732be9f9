//! Browser state engine
//!
//! [`Browser`] is the single owner of selection, action, open folders and
//! the name filter. Everything a presentation layer needs is read through
//! it, and every interaction goes through one of its methods.

pub mod action;
mod dnd;
mod mutation;
pub mod selection;
pub mod tree;
pub mod types;
mod view;

pub use dnd::{DefaultDragDrop, DragDropPolicy, DropMonitor, DropResult};
pub use mutation::MoveOutcome;
pub use view::{BrowserView, ViewRow};

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collaborators::{Capabilities, Capability, Collaborators};
use crate::error::BrowserError;
use crate::keys;
use crate::persist::Persistence;
use crate::settings::BrowserSettings;
use crate::store::{PersistedState, StateStore};

use action::{draft_folder_key, selection_is_abandoned_draft, ActionState};
use selection::{Modifiers, Selection};
use tree::{GroupByFolder, Grouper, Pipeline, PipelineOptions, Sorter};
use types::{Action, Command, Item, ItemKind, ScrollEvent};

pub struct Browser {
    settings: BrowserSettings,
    collaborators: Collaborators,
    /// Computed once from the collaborators
    capabilities: Capabilities,
    grouper: Option<Arc<dyn Grouper>>,
    sorter: Option<Arc<dyn Sorter>>,
    drag_drop: Option<Arc<dyn DragDropPolicy>>,
    /// Raw item list, owned by the caller and replaced wholesale
    items: Vec<Item>,
    open_folders: BTreeSet<String>,
    selection: Selection,
    action: ActionState,
    name_filter: String,
    /// Number of search results currently shown
    search_results_shown: usize,
    /// Whether click-outside events are being listened to
    active: bool,
    persistence: Option<Persistence>,
}

impl Browser {
    pub fn new(mut settings: BrowserSettings, collaborators: Collaborators) -> Self {
        if let Err(problem) = settings.validate() {
            warn!("invalid browser settings: {problem}");
            if settings.results_per_page == 0 {
                settings.results_per_page = BrowserSettings::default().results_per_page;
            }
        }

        let capabilities = collaborators.capabilities();
        let sorter = Some(tree::sorter_for(settings.sort));
        let search_results_shown = settings.results_per_page;

        Self {
            settings,
            collaborators,
            capabilities,
            grouper: Some(Arc::new(GroupByFolder)),
            sorter,
            drag_drop: None,
            items: Vec::new(),
            open_folders: BTreeSet::new(),
            selection: Selection::default(),
            action: ActionState::default(),
            name_filter: String::new(),
            search_results_shown,
            active: false,
            persistence: None,
        }
    }

    /// Replace the grouping strategy; `None` renders files only
    pub fn with_grouper(mut self, grouper: Option<Arc<dyn Grouper>>) -> Self {
        self.grouper = grouper;
        self
    }

    pub fn with_sorter(mut self, sorter: Option<Arc<dyn Sorter>>) -> Self {
        self.sorter = sorter;
        self
    }

    /// Enable drag-and-drop moves through `policy`
    pub fn with_drag_drop(mut self, policy: Arc<dyn DragDropPolicy>) -> Self {
        self.drag_drop = Some(policy);
        self
    }

    /// Load persisted open folders (best-effort) and save every later change
    /// under `storage_key`. Must be called inside a tokio runtime.
    pub async fn attach_persistence(
        &mut self,
        store: Arc<dyn StateStore>,
        storage_key: impl Into<String>,
    ) {
        let mut persistence = Persistence::spawn(store, storage_key);
        if let Some(state) = persistence.load().await {
            debug!(
                key = persistence.storage_key(),
                open = state.open_folders.len(),
                "restored browser state"
            );
            self.open_folders = state.open_folders;
        }
        self.persistence = Some(persistence);
    }

    /// Wait until queued saves have been written
    pub async fn flush(&self) -> anyhow::Result<()> {
        match &self.persistence {
            Some(persistence) => persistence.flush().await,
            None => Ok(()),
        }
    }

    /// Stop the persistence writer after flushing it
    pub async fn detach_persistence(&mut self) -> anyhow::Result<()> {
        match self.persistence.take() {
            Some(persistence) => persistence.shutdown().await,
            None => Ok(()),
        }
    }

    pub fn set_items(&mut self, items: Vec<Item>) {
        self.items = items;
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn selection(&self) -> &[String] {
        self.selection.keys()
    }

    pub fn anchor(&self) -> Option<&str> {
        self.selection.anchor()
    }

    pub fn open_folders(&self) -> &BTreeSet<String> {
        &self.open_folders
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.open_folders.contains(key)
    }

    pub fn active_action(&self) -> Option<Action> {
        self.action.active()
    }

    pub fn action_targets(&self) -> &[String] {
        self.action.targets()
    }

    pub fn name_filter(&self) -> &str {
        &self.name_filter
    }

    /// Raw items plus the draft placeholder while a folder is being created
    pub fn working_items(&self) -> Vec<Item> {
        let mut items = self.items.clone();
        if let Some(draft) = self.action.draft_key() {
            items.push(Item::draft(draft));
        }
        items
    }

    pub fn pipeline(&self) -> Pipeline {
        let options = PipelineOptions {
            name_filter: &self.name_filter,
            show_folders_on_filter: self.settings.show_folders_on_filter,
            nest_children: self.settings.nest_children,
            group: self.grouper.as_deref(),
            sort: self.sorter.as_deref(),
            open_folders: &self.open_folders,
        };
        tree::build(&self.working_items(), &options)
    }

    /// Keys of the flattened, visible rows
    pub fn visible_keys(&self) -> Vec<String> {
        self.pipeline().keys()
    }

    /// The item stored under `key`, or a stand-in folder when `key` is only
    /// implied by the keys below it
    pub fn item(&self, key: &str) -> Option<Item> {
        let mut has_prefix = false;
        for item in &self.items {
            if item.key == key {
                return Some(item.clone());
            }
            if item.key.starts_with(key) {
                has_prefix = true;
            }
        }
        has_prefix.then(|| Item::folder(key))
    }

    /// Items of the current tree that are selected
    pub fn selected_items(&self) -> Vec<Item> {
        fn collect(nodes: &[types::Node], selection: &Selection, out: &mut Vec<Item>) {
            for node in nodes {
                if selection.contains(node.key()) {
                    out.push(node.item().clone());
                }
                collect(node.children(), selection, out);
            }
        }

        let mut out = Vec::new();
        collect(&self.pipeline().tree, &self.selection, &mut out);
        out
    }

    /// Handle a click on `key`; returns the new selection
    pub fn select(&mut self, key: &str, modifiers: Modifiers) -> Vec<String> {
        let previous = self.selection.keys().to_vec();
        let stale_action =
            !self.action.targets().is_empty() && !self.action.targets_include(key);

        let visible = if modifiers.shift {
            self.visible_keys()
        } else {
            Vec::new()
        };
        self.selection.select(
            key,
            ItemKind::of(key),
            modifiers,
            self.settings.multiple_selection,
            &visible,
        );

        if stale_action {
            debug!(key, "click outside action targets, ending action");
            self.action.reset();
        }
        self.commit(previous);
        self.selection.keys().to_vec()
    }

    /// Override the selection directly; always ends the active action
    pub fn set_selection(&mut self, keys: Vec<String>, anchor: Option<String>) {
        let previous = self.selection.keys().to_vec();
        self.selection.set(keys, anchor);
        self.action.reset();
        self.commit(previous);
    }

    pub fn select_all(&mut self) {
        let keys = self.visible_keys();
        self.set_selection(keys, None);
    }

    pub fn toggle_folder(&mut self, key: &str) {
        if self.open_folders.remove(key) {
            self.notify_folder_closed(key);
        } else {
            self.open_folders.insert(key.to_string());
            self.notify_folder_opened(key);
        }
        self.persist();
    }

    pub fn open_folder(&mut self, key: &str) {
        self.open_folders.insert(key.to_string());
        self.notify_folder_opened(key);
        self.persist();
    }

    pub fn close_folder(&mut self, key: &str) {
        if self.open_folders.remove(key) {
            self.notify_folder_closed(key);
            self.persist();
        }
    }

    /// Enter `action` for `targets`, preempting any running action
    pub fn begin_action(&mut self, action: Action, targets: Vec<String>) {
        self.action.begin(action, targets);
    }

    /// Leave the running action. Never rolls back collaborator calls.
    pub fn end_action(&mut self) {
        let previous = self.selection.keys().to_vec();
        if selection_is_abandoned_draft(self.selection.keys()) {
            self.selection.clear();
        }
        self.action.reset();
        self.commit(previous);
    }

    /// Commands the action bar can offer for the current selection
    pub fn commands(&self) -> Vec<Command> {
        [
            Command::CreateFolder,
            Command::Rename,
            Command::Delete,
            Command::Download,
            Command::Move,
        ]
        .into_iter()
        .filter(|command| self.check(*command).is_ok())
        .collect()
    }

    /// Whether `command` can run against the current selection
    pub fn check(&self, command: Command) -> Result<(), BrowserError> {
        let caps = &self.capabilities;
        let selection = self.selection.keys();
        let (folders, files) = keys::split_by_kind(selection);
        let single_folder = selection.len() == 1 && folders.len() == 1;

        let require = |enabled: bool, capability: Capability| {
            if enabled {
                Ok(())
            } else {
                Err(BrowserError::Disabled(capability))
            }
        };

        match command {
            Command::CreateFolder => require(caps.create_folder, Capability::CreateFolder),
            _ if selection.is_empty() => Err(BrowserError::NothingSelected),
            Command::Rename if single_folder => {
                require(caps.rename_folder, Capability::RenameFolder)
            }
            Command::Rename => require(caps.rename_file, Capability::RenameFile),
            Command::Download if single_folder => {
                require(caps.download_folder, Capability::DownloadFolder)
            }
            Command::Download => require(caps.download_file, Capability::DownloadFile),
            Command::Delete => {
                if !folders.is_empty() {
                    require(caps.delete_folder, Capability::DeleteFolder)?;
                }
                if !files.is_empty() {
                    require(caps.delete_file, Capability::DeleteFile)?;
                }
                Ok(())
            }
            Command::Move => {
                if !folders.is_empty() {
                    require(caps.move_folder, Capability::MoveFolder)?;
                }
                if !files.is_empty() {
                    require(caps.move_file, Capability::MoveFile)?;
                }
                Ok(())
            }
        }
    }

    pub fn begin_rename(&mut self) -> Result<(), BrowserError> {
        self.check(Command::Rename)?;
        self.begin_action(Action::Rename, self.selection.keys().to_vec());
        Ok(())
    }

    pub fn begin_delete(&mut self) -> Result<(), BrowserError> {
        self.check(Command::Delete)?;
        self.begin_action(Action::Delete, self.selection.keys().to_vec());
        Ok(())
    }

    pub fn begin_move(&mut self) -> Result<(), BrowserError> {
        self.check(Command::Move)?;
        self.begin_action(Action::Move, self.selection.keys().to_vec());
        Ok(())
    }

    /// Start naming a new folder: adds a draft row and selects it
    pub fn begin_create_folder(&mut self) -> Result<(), BrowserError> {
        self.check(Command::CreateFolder)?;
        if self.action.is(Action::CreateFolder) {
            return Ok(());
        }

        let previous = self.selection.keys().to_vec();
        let draft = draft_folder_key(self.selection.keys());
        let base = keys::parent(&draft);
        if !base.is_empty() {
            self.open_folders.insert(base.to_string());
        }

        self.action.begin(Action::CreateFolder, vec![draft.clone()]);
        self.selection.set(vec![draft], None);
        self.commit(previous);
        Ok(())
    }

    /// Change the name filter; resets the shown search results to one page
    pub fn update_filter(&mut self, value: impl Into<String>) {
        if !self.settings.can_filter {
            debug!("filtering is disabled, ignoring filter update");
            return;
        }
        self.name_filter = value.into();
        self.search_results_shown = self.settings.results_per_page;
    }

    pub fn show_more(&mut self) {
        self.search_results_shown += self.settings.results_per_page;
    }

    pub fn search_results_shown(&self) -> usize {
        self.search_results_shown
    }

    /// Forward the scroll position; notifies when the end is reached
    pub fn handle_scroll(&self, event: &ScrollEvent) -> bool {
        match &self.collaborators.scrolled_to_bottom {
            Some(callback) if event.at_bottom() => {
                callback(event);
                true
            }
            _ => false,
        }
    }

    /// Start listening to clicks outside the browser
    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// A click landed outside the browser. Clears selection and action
    /// unless a delete, move or folder creation is in progress.
    pub fn handle_click_outside(&mut self) -> bool {
        if !self.active {
            return false;
        }
        if !matches!(self.action.active(), None | Some(Action::Rename)) {
            return false;
        }

        let previous = self.selection.keys().to_vec();
        self.selection.clear();
        self.action.reset();
        self.commit(previous);
        true
    }

    /// Move open markers of `old` and every folder below it to `new`
    fn migrate_open_markers(&mut self, old: &str, new: &str) {
        let affected: Vec<String> = self
            .open_folders
            .iter()
            .filter(|k| k.starts_with(old))
            .cloned()
            .collect();

        for key in affected {
            self.open_folders.remove(&key);
            if let Some(rebased) = keys::rebase(&key, old, new) {
                self.open_folders.insert(rebased);
            }
            if key == old {
                self.notify_folder_opened(new);
            }
        }
    }

    /// Drop open markers of `key` and every folder below it
    fn forget_open_markers(&mut self, key: &str) {
        let was_open = self.open_folders.contains(key);
        self.open_folders.retain(|k| !k.starts_with(key));
        if was_open {
            self.notify_folder_closed(key);
        }
    }

    fn notify_folder_opened(&self, key: &str) {
        if let Some(callback) = &self.collaborators.folder_opened {
            callback(self.item(key).as_ref());
        }
    }

    fn notify_folder_closed(&self, key: &str) {
        if let Some(callback) = &self.collaborators.folder_closed {
            callback(self.item(key).as_ref());
        }
    }

    /// Finish a state update: notify selection changes and queue a save
    fn commit(&mut self, previous_selection: Vec<String>) {
        if self.selection.keys() != previous_selection.as_slice() {
            if let Some(callback) = &self.collaborators.selection_changed {
                callback(self.selection.keys());
            }
        }
        self.persist();
    }

    fn persist(&mut self) {
        if let Some(persistence) = &mut self.persistence {
            persistence.save(PersistedState {
                open_folders: self.open_folders.clone(),
            });
        }
    }
}
