//! The single active action and the keys it applies to

use super::types::Action;
use crate::keys;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionState {
    active: Option<Action>,
    targets: Vec<String>,
}

impl ActionState {
    pub fn active(&self) -> Option<Action> {
        self.active
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn is(&self, action: Action) -> bool {
        self.active == Some(action)
    }

    pub fn targets_include(&self, key: &str) -> bool {
        self.targets.iter().any(|t| t == key)
    }

    /// Enter `action`, preempting whatever was active
    pub fn begin(&mut self, action: Action, targets: Vec<String>) {
        self.active = Some(action);
        self.targets = targets;
    }

    pub fn reset(&mut self) {
        self.active = None;
        self.targets.clear();
    }

    /// Key of the draft row while a folder is being created
    pub fn draft_key(&self) -> Option<&str> {
        if self.is(Action::CreateFolder) {
            self.targets.first().map(String::as_str)
        } else {
            None
        }
    }
}

/// True when ending an action must also drop the selection: every selected
/// key is a placeholder for an item that was never created.
pub fn selection_is_abandoned_draft(selection: &[String]) -> bool {
    !selection.is_empty() && selection.iter().all(|k| keys::is_draft_key(k))
}

/// Key of the placeholder row for a new folder.
///
/// The new folder goes into the selected folder, or next to the selected
/// file, or at the root when nothing is selected.
pub fn draft_folder_key(selection: &[String]) -> String {
    let base = match selection.first() {
        Some(key) if keys::is_folder(key) => key.as_str(),
        Some(key) => keys::parent(key),
        None => "",
    };

    if keys::is_draft_key(base) {
        base.to_string()
    } else {
        format!("{}{}{}", base, keys::DRAFT_SEGMENT, keys::SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_replaces_previous_action() {
        let mut state = ActionState::default();
        state.begin(Action::Rename, vec!["a.txt".into()]);
        state.begin(Action::Delete, vec!["b.txt".into(), "c/".into()]);
        assert_eq!(state.active(), Some(Action::Delete));
        assert_eq!(state.targets(), ["b.txt", "c/"]);

        state.reset();
        assert_eq!(state.active(), None);
        assert!(state.targets().is_empty());
    }

    #[test]
    fn test_draft_key_only_while_creating() {
        let mut state = ActionState::default();
        state.begin(Action::Move, vec!["a/".into()]);
        assert_eq!(state.draft_key(), None);
        state.begin(Action::CreateFolder, vec!["a/__new__/".into()]);
        assert_eq!(state.draft_key(), Some("a/__new__/"));
    }

    #[test]
    fn test_draft_folder_key() {
        assert_eq!(draft_folder_key(&[]), "__new__/");
        assert_eq!(draft_folder_key(&["docs/".into()]), "docs/__new__/");
        assert_eq!(draft_folder_key(&["docs/a.md".into()]), "docs/__new__/");
        assert_eq!(draft_folder_key(&["top.md".into()]), "__new__/");
        assert_eq!(draft_folder_key(&["docs/__new__/".into()]), "docs/__new__/");
        assert_eq!(draft_folder_key(&["__new__/".into()]), "__new__/");
    }

    #[test]
    fn test_abandoned_draft_detection() {
        assert!(selection_is_abandoned_draft(&["a/__new__/".into()]));
        assert!(!selection_is_abandoned_draft(&[]));
        assert!(!selection_is_abandoned_draft(&["a/fresh/".into()]));
        assert!(!selection_is_abandoned_draft(&[
            "a/__new__/".into(),
            "b.txt".into()
        ]));
    }
}
