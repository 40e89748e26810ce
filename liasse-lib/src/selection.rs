//! Remembering which profile was selected between sessions.
//!
//! The selection is stored as a single state entry holding one of three markers: `DEFAULT`,
//! `DRAFT`, or the decimal id of a named profile. Draft and Default are stored symbolically since
//! their identity is not stable across sessions.

use std::{fmt, str::FromStr};

use tracing::{debug, warn};

use crate::{
    profile::{Profile, ProfileId},
    registry::ProfileRegistry,
    repository::Storage,
};

const DEFAULT_MARKER: &str = "DEFAULT";
const DRAFT_MARKER: &str = "DRAFT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMarker {
    Default,
    Draft,
    Profile(ProfileId),
}

impl SelectionMarker {
    /// The marker remembering `profile`.
    pub fn for_profile(profile: &Profile, default_name: &str) -> Self {
        if profile.is_default() || profile.has_name(default_name) {
            Self::Default
        } else if profile.is_draft() {
            Self::Draft
        } else {
            Self::Profile(profile.id())
        }
    }

    /// Resolve this marker against a freshly loaded registry, falling back to Default whenever
    /// the remembered profile is gone.
    pub fn resolve<'a>(&self, registry: &'a ProfileRegistry) -> &'a Profile {
        match self {
            Self::Default => None,
            Self::Draft => registry.find_draft(),
            Self::Profile(id) => registry.find_by_id(*id),
        }
        .unwrap_or_else(|| registry.default_profile())
    }
}

impl fmt::Display for SelectionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str(DEFAULT_MARKER),
            Self::Draft => f.write_str(DRAFT_MARKER),
            Self::Profile(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized selection marker: {0:?}")]
pub struct UnknownMarker(String);

impl FromStr for SelectionMarker {
    type Err = UnknownMarker;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            DEFAULT_MARKER => Ok(Self::Default),
            DRAFT_MARKER => Ok(Self::Draft),
            other => other
                .parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .map(|id| Self::Profile(ProfileId::new(id)))
                .ok_or_else(|| UnknownMarker(s.to_string())),
        }
    }
}

/// Pick the profile to select at startup from the last stored marker.
///
/// Total: missing, blank and unrecognized markers, as well as markers naming a profile that is no
/// longer in the registry, all resolve to the Default profile.
pub fn restore_selection<'a>(last_marker: Option<&str>, registry: &'a ProfileRegistry) -> &'a Profile {
    let marker = last_marker
        .map(SelectionMarker::from_str)
        .and_then(Result::ok)
        .unwrap_or(SelectionMarker::Default);

    let profile = marker.resolve(registry);

    debug!(?last_marker, profile_id = %profile.id(), "Restored selection");

    profile
}

/// Remember `profile` as the current selection.
///
/// Best effort: a failed write is logged and otherwise ignored, losing the remembered selection
/// is never worth interrupting the user for.
pub async fn persist_selection<S: Storage>(
    storage: &S,
    key: &str,
    profile: &Profile,
    default_name: &str,
) {
    let marker = SelectionMarker::for_profile(profile, default_name).to_string();

    if let Err(err) = storage.set_state(key, &marker).await {
        warn!(
            event = "selection_persist_failed",
            marker = %marker,
            error = %err,
            "Could not remember the selected profile"
        );
    }
}

/// Read the last stored marker. Read failures count as "nothing remembered".
pub async fn last_marker<S: Storage>(storage: &S, key: &str) -> Option<String> {
    match storage.get_state(key).await {
        Ok(marker) => marker,
        Err(err) => {
            warn!(
                event = "selection_restore_failed",
                error = %err,
                "Could not read the remembered profile"
            );
            None
        }
    }
}
