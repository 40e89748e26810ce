use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use getset::{CopyGetters, Getters};

/// Identity of a [`Profile`].
///
/// `0` is the synthetic Default profile and is never persisted. Positive values are assigned by
/// storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
pub struct ProfileId(i64);

impl ProfileId {
    pub const DEFAULT: Self = Self(0);

    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// A named pair of spreadsheet path and working folder the user can switch between.
///
/// Instances are snapshots: they never change after being read from storage. Any mutation goes
/// through the coordinator, which publishes fresh snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Profile {
    #[getset(get_copy = "pub")]
    id: ProfileId,
    #[getset(get = "pub")]
    name: String,
    excel_path: Option<String>,
    folder_path: Option<String>,
    #[getset(get_copy = "pub")]
    is_active: bool,
    #[getset(get_copy = "pub")]
    is_draft: bool,
    #[getset(get_copy = "pub")]
    created_at: Option<DateTime<Utc>>,
    #[getset(get_copy = "pub")]
    updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// The synthetic, never persisted profile with empty paths.
    pub fn default_profile(name: &str) -> Self {
        Self {
            id: ProfileId::DEFAULT,
            name: name.to_string(),
            excel_path: None,
            folder_path: None,
            is_active: true,
            is_draft: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// Build a profile from a stored record.
    #[allow(clippy::too_many_arguments)]
    pub fn stored(
        id: ProfileId,
        name: &str,
        excel_path: Option<String>,
        folder_path: Option<String>,
        is_active: bool,
        is_draft: bool,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            excel_path,
            folder_path,
            is_active,
            is_draft,
            created_at,
            updated_at,
        }
    }

    pub fn excel_path(&self) -> Option<&str> {
        self.excel_path.as_deref()
    }

    pub fn folder_path(&self) -> Option<&str> {
        self.folder_path.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.id == ProfileId::DEFAULT
    }

    /// Case-insensitive name comparison, the rule used for both uniqueness and reserved names.
    pub fn has_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }
}

pub(crate) fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Trim a path typed by the user. Blank input means "no path".
pub fn normalize_path(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
