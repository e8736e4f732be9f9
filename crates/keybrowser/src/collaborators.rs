//! External collaborators: the storage backend and notification hooks
//!
//! Every callback is optional. A missing mutating callback disables the
//! matching action; [`Capabilities`] is the explicit record of what is on.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};

use crate::browser::types::{Item, NewFile, ScrollEvent};

pub type CallFuture = BoxFuture<'static, Result<()>>;

type CreateFilesFn = Arc<dyn Fn(Vec<NewFile>, Option<String>) -> CallFuture + Send + Sync>;
type KeyFn = Arc<dyn Fn(String) -> CallFuture + Send + Sync>;
type KeysFn = Arc<dyn Fn(Vec<String>) -> CallFuture + Send + Sync>;
type KeyPairFn = Arc<dyn Fn(String, String) -> CallFuture + Send + Sync>;
type SelectFn = Arc<dyn Fn(&[String]) + Send + Sync>;
type FolderFn = Arc<dyn Fn(Option<&Item>) + Send + Sync>;
type ScrollFn = Arc<dyn Fn(&ScrollEvent) + Send + Sync>;

/// Callback table handed to the browser
#[derive(Clone, Default)]
pub struct Collaborators {
    pub(crate) create_files: Option<CreateFilesFn>,
    pub(crate) create_folder: Option<KeyFn>,
    pub(crate) move_file: Option<KeyPairFn>,
    pub(crate) move_folder: Option<KeyPairFn>,
    pub(crate) rename_file: Option<KeyPairFn>,
    pub(crate) rename_folder: Option<KeyPairFn>,
    pub(crate) delete_file: Option<KeysFn>,
    pub(crate) delete_folder: Option<KeyFn>,
    pub(crate) download_file: Option<KeysFn>,
    pub(crate) download_folder: Option<KeysFn>,
    pub(crate) selection_changed: Option<SelectFn>,
    pub(crate) folder_opened: Option<FolderFn>,
    pub(crate) folder_closed: Option<FolderFn>,
    pub(crate) scrolled_to_bottom: Option<ScrollFn>,
}

fn key_pair<F, Fut>(f: F) -> KeyPairFn
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |old, new| f(old, new).boxed())
}

fn single_key<F, Fut>(f: F) -> KeyFn
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |key| f(key).boxed())
}

fn key_list<F, Fut>(f: F) -> KeysFn
where
    F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |keys| f(keys).boxed())
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create_files<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<NewFile>, Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.create_files = Some(Arc::new(move |files, prefix| f(files, prefix).boxed()));
        self
    }

    pub fn on_create_folder<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.create_folder = Some(single_key(f));
        self
    }

    pub fn on_move_file<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.move_file = Some(key_pair(f));
        self
    }

    pub fn on_move_folder<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.move_folder = Some(key_pair(f));
        self
    }

    pub fn on_rename_file<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.rename_file = Some(key_pair(f));
        self
    }

    pub fn on_rename_folder<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.rename_folder = Some(key_pair(f));
        self
    }

    pub fn on_delete_file<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.delete_file = Some(key_list(f));
        self
    }

    pub fn on_delete_folder<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.delete_folder = Some(single_key(f));
        self
    }

    pub fn on_download_file<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.download_file = Some(key_list(f));
        self
    }

    pub fn on_download_folder<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.download_folder = Some(key_list(f));
        self
    }

    pub fn on_select<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.selection_changed = Some(Arc::new(f));
        self
    }

    pub fn on_folder_open<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Item>) + Send + Sync + 'static,
    {
        self.folder_opened = Some(Arc::new(f));
        self
    }

    pub fn on_folder_close<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Item>) + Send + Sync + 'static,
    {
        self.folder_closed = Some(Arc::new(f));
        self
    }

    pub fn on_scrolled_to_bottom<F>(mut self, f: F) -> Self
    where
        F: Fn(&ScrollEvent) + Send + Sync + 'static,
    {
        self.scrolled_to_bottom = Some(Arc::new(f));
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            create_files: self.create_files.is_some(),
            create_folder: self.create_folder.is_some(),
            move_file: self.move_file.is_some(),
            move_folder: self.move_folder.is_some(),
            rename_file: self.rename_file.is_some(),
            rename_folder: self.rename_folder.is_some(),
            delete_file: self.delete_file.is_some(),
            delete_folder: self.delete_folder.is_some(),
            download_file: self.download_file.is_some(),
            download_folder: self.download_folder.is_some(),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("capabilities", &self.capabilities())
            .finish_non_exhaustive()
    }
}

/// Which mutating actions have a collaborator behind them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub create_files: bool,
    pub create_folder: bool,
    pub move_file: bool,
    pub move_folder: bool,
    pub rename_file: bool,
    pub rename_folder: bool,
    pub delete_file: bool,
    pub delete_folder: bool,
    pub download_file: bool,
    pub download_folder: bool,
}

impl Capabilities {
    pub fn can_move(&self) -> bool {
        self.move_file || self.move_folder
    }
}

/// Name of a single capability, used in refusals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateFiles,
    CreateFolder,
    MoveFile,
    MoveFolder,
    RenameFile,
    RenameFolder,
    DeleteFile,
    DeleteFolder,
    DownloadFile,
    DownloadFolder,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::CreateFiles => "create files",
            Capability::CreateFolder => "create folder",
            Capability::MoveFile => "move file",
            Capability::MoveFolder => "move folder",
            Capability::RenameFile => "rename file",
            Capability::RenameFolder => "rename folder",
            Capability::DeleteFile => "delete file",
            Capability::DeleteFolder => "delete folder",
            Capability::DownloadFile => "download file",
            Capability::DownloadFolder => "download folder",
        };
        f.write_str(name)
    }
}

/// One collaborator invocation, as seen by [`CallLog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateFiles(Vec<String>, Option<String>),
    CreateFolder(String),
    MoveFile(String, String),
    MoveFolder(String, String),
    RenameFile(String, String),
    RenameFolder(String, String),
    DeleteFile(Vec<String>),
    DeleteFolder(String),
    DownloadFile(Vec<String>),
    DownloadFolder(Vec<String>),
    Select(Vec<String>),
    FolderOpened(String),
    FolderClosed(String),
    ScrolledToBottom,
}

/// Collaborator set that records every call instead of touching storage.
///
/// Used for dry runs and as a test double.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Recorded calls that mutate storage, without notifications
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !matches!(
                    c,
                    Call::Select(_)
                        | Call::FolderOpened(_)
                        | Call::FolderClosed(_)
                        | Call::ScrolledToBottom
                )
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Every callback wired to this log
    pub fn collaborators(&self) -> Collaborators {
        let log = self.clone();
        let mut collaborators = Collaborators::new();

        let l = log.clone();
        collaborators = collaborators.on_create_files(move |files, prefix| {
            let names = files.into_iter().map(|f| f.name).collect();
            l.record(Call::CreateFiles(names, prefix));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_create_folder(move |key| {
            l.record(Call::CreateFolder(key));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_move_file(move |old, new| {
            l.record(Call::MoveFile(old, new));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_move_folder(move |old, new| {
            l.record(Call::MoveFolder(old, new));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_rename_file(move |old, new| {
            l.record(Call::RenameFile(old, new));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_rename_folder(move |old, new| {
            l.record(Call::RenameFolder(old, new));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_delete_file(move |keys| {
            l.record(Call::DeleteFile(keys));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_delete_folder(move |key| {
            l.record(Call::DeleteFolder(key));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_download_file(move |keys| {
            l.record(Call::DownloadFile(keys));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_download_folder(move |keys| {
            l.record(Call::DownloadFolder(keys));
            async { Ok(()) }
        });
        let l = log.clone();
        collaborators = collaborators.on_select(move |keys| l.record(Call::Select(keys.to_vec())));
        let l = log.clone();
        collaborators = collaborators.on_folder_open(move |item| {
            l.record(Call::FolderOpened(
                item.map(|i| i.key.clone()).unwrap_or_default(),
            ))
        });
        let l = log.clone();
        collaborators = collaborators.on_folder_close(move |item| {
            l.record(Call::FolderClosed(
                item.map(|i| i.key.clone()).unwrap_or_default(),
            ))
        });
        collaborators.on_scrolled_to_bottom(move |_| log.record(Call::ScrolledToBottom))
    }
}
