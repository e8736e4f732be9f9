use thiserror::Error;

use crate::collaborators::Capability;

/// Refusals raised by the browser itself.
///
/// Collaborator and I/O failures are passed through as `anyhow::Error`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("{0} is not enabled for this browser")]
    Disabled(Capability),

    #[error("nothing is selected")]
    NothingSelected,
}
