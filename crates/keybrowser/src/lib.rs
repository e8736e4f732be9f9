//! State engine for a file browser over flat, slash-delimited keys.
//!
//! Storage lives behind [`Collaborators`]; the engine owns selection, the
//! running action, open folders and the name filter, and turns a flat item
//! list into visible rows.

pub mod browser;
pub mod collaborators;
pub mod error;
pub mod keys;
pub mod persist;
pub mod scan;
pub mod settings;
pub mod store;

pub use browser::selection::Modifiers;
pub use browser::types::{Action, Command, Item, NewFile, RenderStyle, SortMode};
pub use browser::{Browser, BrowserView, MoveOutcome};
pub use collaborators::{Capabilities, Capability, Collaborators};
pub use error::BrowserError;
pub use settings::{BrowserSettings, Settings};
