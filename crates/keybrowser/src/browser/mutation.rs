//! Mutations: local state transition first, then the collaborator call

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collaborators::Capability;
use crate::error::BrowserError;
use crate::keys;

use super::dnd::DropMonitor;
use super::types::{Command, NewFile};
use super::Browser;

/// Result of a bulk move
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    /// `(old, new)` pairs handed to the collaborators
    pub moved: Vec<(String, String)>,
    /// Items already at the destination
    pub skipped: Vec<String>,
    /// Folder that would have been moved into itself; nothing after it ran
    pub aborted: Option<String>,
}

impl MoveOutcome {
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

/// Planned bulk move, computed before any call is made
#[derive(Debug, Default)]
struct MovePlan {
    files: Vec<(String, String)>,
    folders: Vec<(String, String)>,
    skipped: Vec<String>,
    aborted: Option<String>,
}

fn plan_move(targets: &[String], destination: &str) -> MovePlan {
    let targets = keys::without_nested(targets);
    let (mut folders, files) = keys::split_by_kind(&targets);
    let mut plan = MovePlan::default();

    for file in files {
        let new_key = format!("{destination}{}", keys::name(&file));
        if keys::is_direct_child(destination, &file) {
            plan.skipped.push(file);
        } else {
            plan.files.push((file, new_key));
        }
    }

    // Deepest first
    folders.sort_by(|a, b| b.len().cmp(&a.len()));
    for folder in folders {
        let new_key = format!("{destination}{}{}", keys::name(&folder), keys::SEPARATOR);
        if keys::is_direct_child(destination, &folder) {
            plan.skipped.push(folder);
        } else if new_key.starts_with(&folder) {
            plan.aborted = Some(folder);
            break;
        } else {
            plan.folders.push((folder, new_key));
        }
    }

    plan
}

impl Browser {
    /// Hand uploaded files to the collaborator, optionally under `prefix`
    pub async fn create_files(&mut self, files: Vec<NewFile>, prefix: Option<String>) -> Result<()> {
        let callback = self
            .collaborators
            .create_files
            .clone()
            .ok_or(BrowserError::Disabled(Capability::CreateFiles))?;

        let previous = self.selection.keys().to_vec();
        self.selection.clear();
        if let Some(prefix) = prefix.as_deref().filter(|p| !p.is_empty()) {
            self.open_folders.insert(prefix.to_string());
        }
        self.commit(previous);

        let count = files.len();
        callback(files, prefix)
            .await
            .with_context(|| format!("Failed to create {count} files"))
    }

    /// Commit the draft folder under its final key
    pub async fn create_folder(&mut self, key: &str) -> Result<()> {
        let callback = self
            .collaborators
            .create_folder
            .clone()
            .ok_or(BrowserError::Disabled(Capability::CreateFolder))?;

        let previous = self.selection.keys().to_vec();
        self.action.reset();
        self.selection.set(vec![key.to_string()], None);
        self.commit(previous);

        callback(key.to_string())
            .await
            .with_context(|| format!("Failed to create folder {key}"))
    }

    pub async fn rename_file(&mut self, old: &str, new: &str) -> Result<()> {
        let callback = self
            .collaborators
            .rename_file
            .clone()
            .ok_or(BrowserError::Disabled(Capability::RenameFile))?;

        let previous = self.selection.keys().to_vec();
        self.action.reset();
        self.selection.set(vec![new.to_string()], Some(new.to_string()));
        self.commit(previous);

        callback(old.to_string(), new.to_string())
            .await
            .with_context(|| format!("Failed to rename {old} to {new}"))
    }

    /// Rename a folder. Selected keys and open markers under it follow.
    pub async fn rename_folder(&mut self, old: &str, new: &str) -> Result<()> {
        let callback = self
            .collaborators
            .rename_folder
            .clone()
            .ok_or(BrowserError::Disabled(Capability::RenameFolder))?;

        let previous = self.selection.keys().to_vec();
        self.action.reset();

        let rebase = |key: &str| keys::rebase(key, old, new).unwrap_or_else(|| key.to_string());
        let rebased: Vec<String> = previous.iter().map(|k| rebase(k.as_str())).collect();
        let anchor = self.selection.anchor().map(rebase);
        self.selection.set(rebased, anchor);
        self.migrate_open_markers(old, new);
        self.commit(previous);

        callback(old.to_string(), new.to_string())
            .await
            .with_context(|| format!("Failed to rename folder {old} to {new}"))
    }

    pub async fn delete_file(&mut self, keys: Vec<String>) -> Result<()> {
        let callback = self
            .collaborators
            .delete_file
            .clone()
            .ok_or(BrowserError::Disabled(Capability::DeleteFile))?;

        let previous = self.selection.keys().to_vec();
        self.action.reset();
        self.selection.clear();
        self.commit(previous);

        let count = keys.len();
        callback(keys)
            .await
            .with_context(|| format!("Failed to delete {count} files"))
    }

    pub async fn delete_folder(&mut self, key: &str) -> Result<()> {
        let callback = self
            .collaborators
            .delete_folder
            .clone()
            .ok_or(BrowserError::Disabled(Capability::DeleteFolder))?;

        let previous = self.selection.keys().to_vec();
        self.action.reset();
        self.selection.clear();
        self.forget_open_markers(key);
        self.commit(previous);

        callback(key.to_string())
            .await
            .with_context(|| format!("Failed to delete folder {key}"))
    }

    /// Confirm a pending delete: one call for all files, one per folder.
    /// Keys inside another selected folder are left to that folder.
    pub async fn delete_selection(&mut self) -> Result<()> {
        self.check(Command::Delete)?;

        let targets = keys::without_nested(self.selection.keys());
        let (folders, files) = keys::split_by_kind(&targets);
        info!(files = files.len(), folders = folders.len(), "deleting selection");

        if !files.is_empty() {
            self.delete_file(files).await?;
        }
        for folder in folders {
            self.delete_folder(&folder).await?;
        }
        Ok(())
    }

    pub async fn download_file(&mut self, keys: Vec<String>) -> Result<()> {
        let callback = self
            .collaborators
            .download_file
            .clone()
            .ok_or(BrowserError::Disabled(Capability::DownloadFile))?;

        let previous = self.selection.keys().to_vec();
        self.action.reset();
        self.commit(previous);

        callback(keys).await.context("Failed to download files")
    }

    pub async fn download_folder(&mut self, keys: Vec<String>) -> Result<()> {
        let callback = self
            .collaborators
            .download_folder
            .clone()
            .ok_or(BrowserError::Disabled(Capability::DownloadFolder))?;

        let previous = self.selection.keys().to_vec();
        self.action.reset();
        self.commit(previous);

        callback(keys).await.context("Failed to download folder")
    }

    /// Download whatever is selected
    pub async fn download_selection(&mut self) -> Result<()> {
        self.check(Command::Download)?;

        let selected: Vec<String> = self
            .selected_items()
            .into_iter()
            .map(|item| item.key)
            .collect();
        match selected.as_slice() {
            [] => Err(BrowserError::NothingSelected.into()),
            [only] if keys::is_folder(only) => self.download_folder(selected).await,
            _ => self.download_file(selected).await,
        }
    }

    /// Move `targets` into `destination` (`""` is the root).
    ///
    /// Files go first and concurrently; folders follow one at a time, deepest
    /// first. A folder that would land inside itself stops the run before its
    /// own call. Open markers follow each moved folder, and the moved items
    /// become the selection.
    pub async fn move_items(&mut self, targets: &[String], destination: &str) -> Result<MoveOutcome> {
        let plan = plan_move(targets, destination);

        if !plan.files.is_empty() && self.collaborators.move_file.is_none() {
            return Err(BrowserError::Disabled(Capability::MoveFile).into());
        }
        if !plan.folders.is_empty() && self.collaborators.move_folder.is_none() {
            return Err(BrowserError::Disabled(Capability::MoveFolder).into());
        }

        if !destination.is_empty() {
            self.open_folder(destination);
        }

        let mut outcome = MoveOutcome {
            skipped: plan.skipped.clone(),
            ..MoveOutcome::default()
        };
        let result = self.run_move(&plan, &mut outcome).await;

        let previous = self.selection.keys().to_vec();
        self.action.reset();
        if !outcome.moved.is_empty() {
            let moved = outcome.moved.iter().map(|(_, new)| new.clone()).collect();
            self.selection.set(moved, None);
        }
        self.commit(previous);

        if let Some(folder) = &plan.aborted {
            debug!(%folder, destination, "move aborted, folder cannot contain itself");
            outcome.aborted = Some(folder.clone());
        }
        result.map(|_| outcome)
    }

    async fn run_move(&mut self, plan: &MovePlan, outcome: &mut MoveOutcome) -> Result<()> {
        if let Some(move_file) = self.collaborators.move_file.clone() {
            // Every issued call runs to completion; the first failure is
            // reported once all of them have settled.
            let results = join_all(
                plan.files
                    .iter()
                    .map(|(old, new)| move_file(old.clone(), new.clone())),
            )
            .await;

            let mut first_error = None;
            for ((old, new), result) in plan.files.iter().zip(results) {
                match result {
                    Ok(()) => outcome.moved.push((old.clone(), new.clone())),
                    Err(e) if first_error.is_none() => {
                        first_error = Some(e.context(format!("Failed to move {old} to {new}")));
                    }
                    Err(e) => warn!(%old, %new, "file move failed: {e:#}"),
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        if let Some(move_folder) = self.collaborators.move_folder.clone() {
            for (old, new) in &plan.folders {
                move_folder(old.clone(), new.clone())
                    .await
                    .with_context(|| format!("Failed to move folder {old} to {new}"))?;
                self.migrate_open_markers(old, new);
                outcome.moved.push((old.clone(), new.clone()));
            }
        }
        Ok(())
    }

    /// Move the pending action targets into the chosen folder
    pub async fn handle_move_target_select(&mut self, destination: &str) -> Result<MoveOutcome> {
        let targets = self.action.targets().to_vec();
        if targets.is_empty() {
            return Err(BrowserError::NothingSelected.into());
        }
        let result = self.move_items(&targets, destination).await;
        self.end_action();
        result
    }

    /// Finish a drag: move the selection to the drop target if allowed
    pub async fn handle_drop(&mut self, monitor: &dyn DropMonitor) -> Result<Option<MoveOutcome>> {
        let Some(policy) = self.drag_drop.clone() else {
            return Ok(None);
        };
        if !monitor.did_drop() {
            return Ok(None);
        }
        let Some(destination) = monitor.drop_path() else {
            return Ok(None);
        };

        let targets = self.selection.keys().to_vec();
        if targets.is_empty() || !policy.can_drop(&targets, &destination) {
            debug!(%destination, "drop refused");
            return Ok(None);
        }
        self.move_items(&targets, &destination).await.map(Some)
    }
}
