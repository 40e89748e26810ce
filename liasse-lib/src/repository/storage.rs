//! The persistence contract the profile engine is written against.

use std::future::Future;

use thiserror::Error;

use crate::profile::{Profile, ProfileId};

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// The backing store could not be reached, or a read or write failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Internal database error {0}")]
    Internal(#[from] agdb::DbError),
    #[error("Could not open the database: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database returned no element for {0}")]
    MissingElement(&'static str),
    #[error("Stored id {0} is out of range")]
    IdOutOfRange(u64),
    #[error("No stored profile has id {0}")]
    UnknownProfile(ProfileId),
    #[error("Database model version {found} is newer than supported version {supported}")]
    UnsupportedModelVersion { found: u64, supported: u64 },
    #[error("{0}")]
    Unavailable(String),
}

/// Durable keyed records for profiles plus a generic key/value state table.
///
/// All paths are stored exactly as given. Callers normalize them first.
pub trait Storage: Send + Sync {
    /// Every profile with `is_active` set, drafts included, in no particular order.
    fn list_active_profiles(&self) -> impl Future<Output = StorageResult<Vec<Profile>>> + Send;

    fn insert_profile(
        &self,
        name: &str,
        excel_path: Option<&str>,
        folder_path: Option<&str>,
        is_draft: bool,
    ) -> impl Future<Output = StorageResult<ProfileId>> + Send;

    fn update_profile_excel_path(
        &self,
        id: ProfileId,
        path: Option<&str>,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    fn update_profile_folder_path(
        &self,
        id: ProfileId,
        path: Option<&str>,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    fn update_profile_name(
        &self,
        id: ProfileId,
        name: &str,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Soft-delete. The record stays in storage with `is_active` cleared.
    fn deactivate_profile(&self, id: ProfileId) -> impl Future<Output = StorageResult<()>> + Send;

    /// The active draft, if there is one.
    fn get_draft(&self) -> impl Future<Output = StorageResult<Option<Profile>>> + Send;

    /// Write both paths to the active draft, creating it first if needed.
    fn upsert_draft(
        &self,
        excel_path: Option<&str>,
        folder_path: Option<&str>,
    ) -> impl Future<Output = StorageResult<ProfileId>> + Send;

    /// Soft-delete the active draft. Does nothing when there is none.
    fn clear_draft(&self) -> impl Future<Output = StorageResult<()>> + Send;

    fn get_state(&self, key: &str) -> impl Future<Output = StorageResult<Option<String>>> + Send;

    fn set_state(&self, key: &str, value: &str) -> impl Future<Output = StorageResult<()>> + Send;
}
