//! Configuration profiles for Liasse.
//!
//! A profile pairs a spreadsheet with a working folder. Users switch between named profiles, edit
//! the two paths freely (edits are kept in a single unsaved draft until promoted under a name),
//! and get their last selection back on the next start.
//!
//! [`ProfileCoordinator`] is the entry point for a user interface. It runs on top of any
//! [`Storage`]; [`Repository`] is the embedded-database implementation.

use thiserror::Error;

pub mod coordinator;
pub mod fs;
pub mod profile;
pub mod registry;
pub mod repository;
pub mod selection;
pub mod validation;

pub use coordinator::{DraftState, Field, ProfileCoordinator};
pub use profile::{Profile, ProfileId};
pub use registry::ProfileRegistry;
pub use repository::{Repository, Storage, StorageError};
pub use validation::ValidationError;

pub type Result<T> = std::result::Result<T, Error>;

/// Why an operation was refused or failed. The `Display` output is meant for the user.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The cause is logged where it happens, the message stays generic.
    #[error("Profiles could not be saved or loaded, please try again")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] repository::ConfigError),
    #[error("The default profile cannot be deactivated")]
    DeactivateDefault,
    #[error("The default profile cannot be renamed")]
    RenameDefault,
    #[error("Unsaved changes must be saved under a name before they can be renamed")]
    RenameDraft,
    #[error("No profile has id {0}")]
    UnknownProfile(ProfileId),
    #[error("Another change is still being saved")]
    Busy,
}

/// Result of an operation as a user interface consumes it: a success flag and an optional
/// message to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub error: Option<String>,
}

impl<T> From<Result<T>> for Outcome {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                error: None,
            },
            Err(err) => Self {
                success: false,
                error: Some(err.to_string()),
            },
        }
    }
}
