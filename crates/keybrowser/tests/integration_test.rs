use keybrowser::browser::{DefaultDragDrop, DropResult};
use keybrowser::collaborators::{Call, CallLog};
use keybrowser::scan::scan_directory;
use keybrowser::store::{SqliteStore, StateStore};
use keybrowser::{Action, Browser, BrowserSettings, Collaborators, Modifiers};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_filesystem() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    fs::write(root.join("file1.txt"), b"hello world").unwrap();
    fs::write(root.join("file2.txt"), b"test data").unwrap();

    fs::create_dir(root.join("subdir")).unwrap();
    fs::write(root.join("subdir/file3.txt"), b"nested file").unwrap();
    fs::write(root.join("subdir/large.bin"), vec![0u8; 1024]).unwrap();

    fs::create_dir(root.join("subdir/nested")).unwrap();
    fs::write(root.join("subdir/nested/deep.txt"), b"deep file content").unwrap();

    fs::create_dir(root.join("empty_dir")).unwrap();

    temp_dir
}

/// Collaborators that apply moves to the directory under `root`
fn filesystem_collaborators(root: &Path) -> Collaborators {
    let files_root = root.to_path_buf();
    let folders_root = root.to_path_buf();

    fn rename(root: PathBuf, old: String, new: String) -> impl std::future::Future<Output = anyhow::Result<()>> {
        async move {
            let to = root.join(new.trim_end_matches('/'));
            if let Some(parent) = to.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::rename(root.join(old.trim_end_matches('/')), to).await?;
            Ok(())
        }
    }

    Collaborators::new()
        .on_move_file(move |old, new| rename(files_root.clone(), old, new))
        .on_move_folder(move |old, new| rename(folders_root.clone(), old, new))
}

fn browser_for(root: &Path, collaborators: Collaborators) -> Browser {
    let (items, _) = scan_directory(root).unwrap();
    let mut browser = Browser::new(BrowserSettings::default(), collaborators);
    browser.set_items(items);
    browser
}

#[test]
fn test_scanned_tree_renders_closed_then_open() {
    let fs_root = create_test_filesystem();
    let mut browser = browser_for(fs_root.path(), Collaborators::new());

    assert_eq!(
        browser.visible_keys(),
        vec!["empty_dir/", "subdir/", "file1.txt", "file2.txt"]
    );

    browser.toggle_folder("subdir/");
    browser.toggle_folder("subdir/nested/");
    let view = browser.view();
    let rows: Vec<(&str, usize)> = view
        .rows
        .iter()
        .map(|r| (r.item.key.as_str(), r.depth))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("empty_dir/", 0),
            ("subdir/", 0),
            ("subdir/nested/", 1),
            ("subdir/nested/deep.txt", 2),
            ("subdir/file3.txt", 1),
            ("subdir/large.bin", 1),
            ("file1.txt", 0),
            ("file2.txt", 0),
        ]
    );
}

#[test]
fn test_filter_flattens_matches() {
    let fs_root = create_test_filesystem();
    let mut browser = browser_for(fs_root.path(), Collaborators::new());

    browser.update_filter("TXT sub");
    let view = browser.view();
    let keys: Vec<&str> = view.rows.iter().map(|r| r.item.key.as_str()).collect();
    assert_eq!(keys, vec!["subdir/nested/deep.txt", "subdir/file3.txt"]);
    assert!(view.rows.iter().all(|r| r.depth == 0));
}

#[tokio::test]
async fn test_bulk_move_on_disk() {
    let fs_root = create_test_filesystem();
    let root = fs_root.path();
    let mut browser = browser_for(root, filesystem_collaborators(root));

    browser.select("file1.txt", Modifiers::default());
    browser.select("subdir/", Modifiers::ctrl());
    browser.begin_move().unwrap();
    assert_eq!(browser.active_action(), Some(Action::Move));

    let outcome = browser.handle_move_target_select("empty_dir/").await.unwrap();
    assert_eq!(outcome.moved.len(), 2);
    assert!(!outcome.is_aborted());

    assert!(root.join("empty_dir/file1.txt").exists());
    assert!(root.join("empty_dir/subdir/nested/deep.txt").exists());
    assert!(!root.join("subdir").exists());

    // The caller refreshes the item list after the storage change
    let (items, _) = scan_directory(root).unwrap();
    browser.set_items(items);
    assert_eq!(browser.selection(), ["empty_dir/file1.txt", "empty_dir/subdir/"]);
    assert!(browser.is_open("empty_dir/"));
    assert_eq!(
        browser.visible_keys(),
        vec![
            "empty_dir/",
            "empty_dir/subdir/",
            "empty_dir/file1.txt",
            "file2.txt"
        ]
    );
}

#[tokio::test]
async fn test_move_into_own_subtree_leaves_disk_alone() {
    let fs_root = create_test_filesystem();
    let root = fs_root.path();
    let mut browser = browser_for(root, filesystem_collaborators(root));

    let outcome = browser
        .move_items(&["subdir/".to_string()], "subdir/nested/")
        .await
        .unwrap();

    assert_eq!(outcome.aborted.as_deref(), Some("subdir/"));
    assert!(outcome.moved.is_empty());
    assert!(root.join("subdir/nested/deep.txt").exists());
}

#[tokio::test]
async fn test_drag_and_drop_dry_run() {
    let fs_root = create_test_filesystem();
    let log = CallLog::new();
    let mut browser =
        browser_for(fs_root.path(), log.collaborators()).with_drag_drop(Arc::new(DefaultDragDrop));

    browser.select("file2.txt", Modifiers::default());
    let outcome = browser
        .handle_drop(&DropResult::onto("subdir/nested/"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.moved.len(), 1);
    assert_eq!(
        log.mutations(),
        vec![Call::MoveFile(
            "file2.txt".into(),
            "subdir/nested/file2.txt".into()
        )]
    );
    assert!(fs_root.path().join("file2.txt").exists());
}

#[tokio::test]
async fn test_open_folders_survive_restart() {
    let fs_root = create_test_filesystem();
    let db_dir = TempDir::new().unwrap();
    let db_path = db_dir.path().join("state.db");

    {
        let store = Arc::new(SqliteStore::new(&db_path).await.unwrap());
        let mut browser = browser_for(fs_root.path(), Collaborators::new());
        browser.attach_persistence(store, "project").await;
        browser.toggle_folder("subdir/");
        browser.toggle_folder("subdir/nested/");
        browser.detach_persistence().await.unwrap();
    }

    let store = Arc::new(SqliteStore::new(&db_path).await.unwrap());
    assert_eq!(store.list_keys().await.unwrap(), vec!["project"]);

    let mut browser = browser_for(fs_root.path(), Collaborators::new());
    browser.attach_persistence(store, "project").await;
    assert!(browser.is_open("subdir/"));
    assert!(browser.is_open("subdir/nested/"));
    assert!(browser.visible_keys().contains(&"subdir/nested/deep.txt".to_string()));
}
