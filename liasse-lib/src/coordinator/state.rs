use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use strum::Display;

use crate::{
    Error, Result,
    profile::{Profile, normalize_path},
    registry::ProfileRegistry,
    validation::ValidationError,
};

/// Where the draft lifecycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DraftState {
    /// There is no draft.
    NoDraft,
    /// A draft exists. It is the selection unless the user picked another profile since.
    DraftPending,
    /// A storage round-trip started by the coordinator is in flight.
    Reconciling,
}

/// One of the two editable path fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    ExcelPath,
    FolderPath,
}

/// Text of an editable field and the message from its last validation.
#[derive(Debug, Clone, Default)]
pub(super) struct PathField {
    pub text: String,
    pub error: Option<ValidationError>,
}

impl PathField {
    /// The path to store for this field.
    pub fn value(&self) -> Option<String> {
        normalize_path(&self.text)
    }
}

/// Everything the coordinator mutates. Lives behind a mutex that is never held across an
/// `.await`.
#[derive(Debug)]
pub(super) struct Inner {
    pub registry: ProfileRegistry,
    pub selected: Profile,
    pub excel: PathField,
    pub folder: PathField,
    pub state: DraftState,
    /// Number of selection changes currently populating fields.
    pub suspended: u32,
    pub loading: bool,
}

impl Inner {
    pub fn new(default_name: &str) -> Self {
        let registry = ProfileRegistry::default_only(default_name);
        let selected = registry.default_profile().clone();

        Self {
            registry,
            selected,
            excel: PathField::default(),
            folder: PathField::default(),
            state: DraftState::NoDraft,
            suspended: 0,
            loading: false,
        }
    }

    pub fn field(&self, field: Field) -> &PathField {
        match field {
            Field::ExcelPath => &self.excel,
            Field::FolderPath => &self.folder,
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut PathField {
        match field {
            Field::ExcelPath => &mut self.excel,
            Field::FolderPath => &mut self.folder,
        }
    }

    /// Refuse to start a storage operation while another is in flight.
    pub fn ensure_idle(&self) -> Result<()> {
        if self.state == DraftState::Reconciling {
            Err(Error::Busy)
        } else {
            Ok(())
        }
    }

    /// Swap in a freshly loaded registry. The selection is not touched.
    pub fn install(&mut self, registry: ProfileRegistry) {
        self.registry = registry;
        if self.state != DraftState::Reconciling {
            self.state = self.settled_state();
        }
    }

    /// Make `profile` the selection and load its paths into the fields, dropping any
    /// validation message.
    pub fn populate(&mut self, profile: Profile) {
        self.excel = PathField {
            text: profile.excel_path().unwrap_or_default().to_string(),
            error: None,
        };
        self.folder = PathField {
            text: profile.folder_path().unwrap_or_default().to_string(),
            error: None,
        };
        self.selected = profile;
    }

    /// The state once nothing is in flight, derived from the registry.
    pub fn settled_state(&self) -> DraftState {
        if self.registry.find_draft().is_some() {
            DraftState::DraftPending
        } else {
            DraftState::NoDraft
        }
    }
}

/// Marks a storage operation as in flight for as long as it lives.
///
/// Dropping it, on success, error or cancellation of the surrounding future, settles the state
/// again from whatever registry is installed by then.
pub(super) struct ReconcileGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl<'a> ReconcileGuard<'a> {
    /// Must be called with `locked` borrowed from `inner`. The caller checks the state first.
    pub fn begin(locked: &mut Inner, inner: &'a Mutex<Inner>) -> Self {
        locked.state = DraftState::Reconciling;
        Self { inner }
    }
}

impl Drop for ReconcileGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        inner.state = inner.settled_state();
    }
}

/// Suspends edit detection while a selection change populates the fields.
///
/// Borrows the locked state so the suspension can never outlive the population it covers. It is
/// lifted on drop, including when populating panics.
pub(super) struct SuspendGuard<'a> {
    inner: &'a mut Inner,
}

impl<'a> SuspendGuard<'a> {
    pub fn begin(inner: &'a mut Inner) -> Self {
        inner.suspended = inner.suspended.saturating_add(1);
        Self { inner }
    }
}

impl Deref for SuspendGuard<'_> {
    type Target = Inner;

    fn deref(&self) -> &Inner {
        self.inner
    }
}

impl DerefMut for SuspendGuard<'_> {
    fn deref_mut(&mut self) -> &mut Inner {
        self.inner
    }
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.inner.suspended = self.inner.suspended.saturating_sub(1);
    }
}

/// Set while a load runs so a second one is ignored.
pub(super) struct LoadGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl<'a> LoadGuard<'a> {
    pub fn begin(inner: &'a Mutex<Inner>) -> Option<Self> {
        let mut locked = inner.lock();
        if locked.loading {
            return None;
        }
        locked.loading = true;

        Some(Self { inner })
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.inner.lock().loading = false;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reconcile_guard_settles_on_drop() {
        let inner = Mutex::new(Inner::new("Default"));

        {
            let _reconcile = {
                let mut locked = inner.lock();
                ReconcileGuard::begin(&mut locked, &inner)
            };

            let locked = inner.lock();
            assert_eq!(locked.state, DraftState::Reconciling);
            assert!(locked.ensure_idle().is_err());
        }

        let locked = inner.lock();
        assert_eq!(locked.state, DraftState::NoDraft);
    }

    #[test]
    fn test_suspension_covers_population_only() {
        let mut inner = Inner::new("Default");

        {
            let mut suspended = SuspendGuard::begin(&mut inner);
            assert_eq!(suspended.suspended, 1);
            suspended.populate(Profile::default_profile("Default"));
        }

        assert_eq!(inner.suspended, 0);
    }

    #[test]
    fn test_suspension_is_lifted_on_panic() {
        let mut inner = Inner::new("Default");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _suspended = SuspendGuard::begin(&mut inner);
            panic!("population failed");
        }));

        assert!(result.is_err());
        assert_eq!(inner.suspended, 0);
    }

    #[test]
    fn test_second_load_is_refused() {
        let inner = Mutex::new(Inner::new("Default"));

        let first = LoadGuard::begin(&inner);
        assert!(first.is_some());
        assert!(LoadGuard::begin(&inner).is_none());

        drop(first);
        assert!(LoadGuard::begin(&inner).is_some());
    }

    #[test]
    fn test_populate_clears_messages() {
        let mut inner = Inner::new("Default");
        inner.excel.error = Some(ValidationError::FileNotFound("x".into()));

        let profile = crate::Profile::stored(
            crate::ProfileId::new(1),
            "Weekly",
            Some("C:\\a.xlsx".into()),
            None,
            true,
            false,
            None,
            None,
        );
        inner.populate(profile);

        assert_eq!(inner.excel.text, "C:\\a.xlsx");
        assert_eq!(inner.folder.text, "");
        assert!(inner.excel.error.is_none());
        assert_eq!(inner.selected.name(), "Weekly");
    }
}
