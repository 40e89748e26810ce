use std::{cmp::Ordering, sync::Arc};

use crate::{
    profile::{Profile, ProfileId},
    repository::{Storage, StorageResult},
};

/// Ordered snapshot of the profiles a user can pick from.
///
/// Always headed by the synthetic Default profile, followed by the draft when there is one, then
/// every other active profile by case-insensitive name. A registry is never edited in place: the
/// coordinator builds a new one after each mutation and swaps it in whole.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRegistry {
    default: Profile,
    /// Every entry in display order, `default` included.
    profiles: Arc<[Profile]>,
}

impl ProfileRegistry {
    /// A registry holding nothing but the Default profile.
    pub fn default_only(default_name: &str) -> Self {
        let default = Profile::default_profile(default_name);

        Self {
            profiles: Arc::from([default.clone()]),
            default,
        }
    }

    /// Fetch every active profile from storage and order it.
    pub async fn load<S: Storage>(storage: &S, default_name: &str) -> StorageResult<Self> {
        let stored = storage.list_active_profiles().await?;
        Ok(Self::from_stored(default_name, stored))
    }

    /// Build a registry from stored records.
    ///
    /// Inactive records and records named like the Default profile are dropped. Should storage
    /// ever return several active drafts, only the most recent one is kept.
    pub fn from_stored(default_name: &str, stored: Vec<Profile>) -> Self {
        let default = Profile::default_profile(default_name);

        let (drafts, mut named): (Vec<_>, Vec<_>) = stored
            .into_iter()
            .filter(|p| p.is_active() && !p.has_name(default_name) && !p.is_default())
            .partition(Profile::is_draft);

        let draft = drafts.into_iter().max_by_key(|p| p.id());
        named.sort_by(by_name);

        let profiles: Vec<Profile> = std::iter::once(default.clone())
            .chain(draft)
            .chain(named)
            .collect();

        Self {
            default,
            profiles: profiles.into(),
        }
    }

    pub fn find_by_id(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id() == id)
    }

    pub fn find_draft(&self) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.is_draft())
    }

    /// The Default profile. Always present.
    pub fn default_profile(&self) -> &Profile {
        &self.default
    }

    /// Active profiles that are neither Default nor the draft. These are the names a new
    /// profile must not collide with.
    pub fn named(&self) -> impl Iterator<Item = &Profile> {
        self.profiles
            .iter()
            .filter(|p| !p.is_default() && !p.is_draft())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    /// Share the underlying list without copying it.
    pub fn snapshot(&self) -> Arc<[Profile]> {
        Arc::clone(&self.profiles)
    }
}

fn by_name(a: &Profile, b: &Profile) -> Ordering {
    a.name()
        .to_lowercase()
        .cmp(&b.name().to_lowercase())
        .then_with(|| a.name().cmp(b.name()))
        .then_with(|| a.id().cmp(&b.id()))
}
