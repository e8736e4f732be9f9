use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use keybrowser::browser::BrowserView;
use keybrowser::collaborators::{Call, CallLog};
use keybrowser::scan::scan_directory;
use keybrowser::keys;
use keybrowser::store::{JsonFileStore, SqliteStore, StateStore};
use keybrowser::{Browser, Collaborators, Settings, SortMode};

#[derive(Parser)]
#[command(name = "keybrowser")]
#[command(about = "Browse a directory as a keyed file tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the browser state database
    #[arg(short, long, default_value = "~/.config/keybrowser/state.db")]
    db: String,

    /// Keep browser state as JSON files in this directory instead of the database
    #[arg(long)]
    state_dir: Option<String>,

    /// Path to settings file
    #[arg(short = 'c', long)]
    config: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Modified,
}

impl From<SortArg> for SortMode {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortMode::ByName,
            SortArg::Modified => SortMode::ByModified,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the visible rows of a directory
    List {
        root: PathBuf,
        /// Whitespace-separated terms every shown key must contain
        #[arg(short, long)]
        filter: Option<String>,
        /// Open a folder before listing (repeatable, persisted)
        #[arg(short, long)]
        open: Vec<String>,
        #[arg(short, long, value_enum)]
        sort: Option<SortArg>,
        /// Number of result pages to show while filtering
        #[arg(long, default_value_t = 1)]
        pages: usize,
        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Open or close a folder and remember it
    Toggle {
        root: PathBuf,
        /// Folder key, e.g. `docs/`
        folder: String,
    },
    /// Show the calls a bulk move would make, without touching any file
    PlanMove {
        root: PathBuf,
        /// Destination folder, e.g. `docs/` (or `docs`); empty for the root
        #[arg(long, default_value = "")]
        to: String,
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// List storage keys with saved browser state
    States,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings_path = match &cli.config {
        Some(config) => PathBuf::from(shellexpand::tilde(config).to_string()),
        None => Settings::default_path(),
    };
    let settings = Settings::load(&settings_path).context("Failed to load settings")?;

    let store: Arc<dyn StateStore> = match &cli.state_dir {
        Some(dir) => Arc::new(JsonFileStore::new(shellexpand::tilde(dir).to_string())),
        None => {
            let db_path = shellexpand::tilde(&cli.db).to_string();
            Arc::new(
                SqliteStore::new(&db_path)
                    .await
                    .context("Failed to open state database")?,
            )
        }
    };

    match cli.command {
        Commands::List {
            root,
            filter,
            open,
            sort,
            pages,
            json,
        } => {
            let mut settings = settings;
            if let Some(sort) = sort {
                settings.browser.sort = sort.into();
            }

            let mut browser = open_browser(&root, &settings, Collaborators::new()).await?;
            attach_state(&mut browser, &root, &settings, store).await?;
            for key in &open {
                browser.open_folder(key);
            }
            if let Some(filter) = filter {
                browser.update_filter(filter);
                for _ in 1..pages {
                    browser.show_more();
                }
            }

            let view = browser.view();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
            browser.detach_persistence().await?;
        }
        Commands::Toggle { root, folder } => {
            let mut browser = open_browser(&root, &settings, Collaborators::new()).await?;
            attach_state(&mut browser, &root, &settings, store).await?;
            browser.toggle_folder(&folder);
            let state = if browser.is_open(&folder) { "open" } else { "closed" };
            println!("{folder} is now {state}");
            browser.detach_persistence().await?;
        }
        Commands::PlanMove { root, to, targets } => {
            let to = destination_key(&to);
            let log = CallLog::new();
            // Dry run: no state is attached, so nothing is persisted either
            let mut browser = open_browser(&root, &settings, log.collaborators()).await?;

            let outcome = browser.move_items(&targets, &to).await?;
            for call in log.mutations() {
                match call {
                    Call::MoveFile(old, new) => println!("move file   {old} -> {new}"),
                    Call::MoveFolder(old, new) => println!("move folder {old} -> {new}"),
                    other => println!("{other:?}"),
                }
            }
            for key in &outcome.skipped {
                println!("skip        {key} (already there)");
            }
            if let Some(folder) = &outcome.aborted {
                println!("abort       {folder} cannot be moved into itself");
            }
        }
        Commands::States => {
            let keys = store.list_keys().await?;
            if keys.is_empty() {
                println!("No saved browser state.");
            }
            for key in keys {
                println!("{key}");
            }
        }
    }

    Ok(())
}

/// Folder key for a move destination; `docs` and `docs/` name the same folder
fn destination_key(to: &str) -> String {
    if to.is_empty() || keys::is_folder(to) {
        to.to_string()
    } else {
        format!("{to}{}", keys::SEPARATOR)
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(root).with_context(|| format!("Failed to resolve {}", root.display()))
}

/// Scan `root` off the runtime threads into a fresh browser
async fn open_browser(
    root: &Path,
    settings: &Settings,
    collaborators: Collaborators,
) -> Result<Browser> {
    let root = resolve_root(root)?;

    let scan_root = root.clone();
    let (items, stats) = tokio::task::spawn_blocking(move || scan_directory(scan_root)).await??;
    info!(
        files = stats.total_files,
        dirs = stats.total_dirs,
        skipped = stats.skipped,
        "scanned {}",
        root.display()
    );

    let mut browser = Browser::new(settings.browser.clone(), collaborators);
    browser.set_items(items);
    Ok(browser)
}

/// Restore open folders saved for `root` and keep saving them
async fn attach_state(
    browser: &mut Browser,
    root: &Path,
    settings: &Settings,
    store: Arc<dyn StateStore>,
) -> Result<()> {
    let storage_key = match &settings.browser.storage_key {
        Some(key) => key.clone(),
        None => resolve_root(root)?.display().to_string(),
    };
    browser.attach_persistence(store, storage_key).await;
    Ok(())
}

fn print_view(view: &BrowserView) {
    if let Some(message) = &view.empty_message {
        println!("{message}");
        return;
    }

    for row in &view.rows {
        let indent = "  ".repeat(row.depth);
        if row.item.is_folder() {
            let marker = if row.open { "▾" } else { "▸" };
            println!("{indent}{marker} 📁 {}", row.item.name());
        } else {
            println!(
                "{indent}  📄 {} ({})",
                row.item.name(),
                format_size(row.item.size)
            );
        }
    }

    if view.has_more {
        println!(
            "... {} more matches (use --pages to show more)",
            view.total_rows - view.rows.len()
        );
    }
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
