use agdb::{DbElement, DbId};
use chrono::DateTime;

use crate::{
    profile::{Profile, ProfileId, normalize_path},
    repository::storage::{StorageError, StorageResult},
};

/// A stored profile. Absent paths are stored as empty strings.
#[derive(Debug, Clone, DbElement, PartialEq)]
pub(crate) struct ProfileModel {
    pub(crate) db_id: Option<DbId>,
    pub(crate) uid: u64,
    pub(crate) name: String,
    pub(crate) excel_path: String,
    pub(crate) folder_path: String,
    pub(crate) is_active: bool,
    pub(crate) is_draft: bool,
    /// Unix milliseconds
    pub(crate) created_at: i64,
    /// Unix milliseconds
    pub(crate) updated_at: i64,
}

impl ProfileModel {
    pub fn new(
        uid: u64,
        name: &str,
        excel_path: Option<&str>,
        folder_path: Option<&str>,
        is_draft: bool,
        now: i64,
    ) -> Self {
        Self {
            db_id: None,
            uid,
            name: name.to_string(),
            excel_path: excel_path.unwrap_or_default().to_string(),
            folder_path: folder_path.unwrap_or_default().to_string(),
            is_active: true,
            is_draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> StorageResult<ProfileId> {
        i64::try_from(self.uid)
            .map(ProfileId::new)
            .map_err(|_| StorageError::IdOutOfRange(self.uid))
    }

    pub fn uid_matches(&self, id: ProfileId) -> bool {
        i64::try_from(self.uid).is_ok_and(|uid| uid == id.get())
    }

    pub fn into_profile(self) -> StorageResult<Profile> {
        Ok(Profile::stored(
            self.id()?,
            &self.name,
            normalize_path(&self.excel_path),
            normalize_path(&self.folder_path),
            self.is_active,
            self.is_draft,
            DateTime::from_timestamp_millis(self.created_at),
            DateTime::from_timestamp_millis(self.updated_at),
        ))
    }
}
