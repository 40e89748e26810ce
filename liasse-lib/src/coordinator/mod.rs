//! The profile lifecycle engine.
//!
//! [`ProfileCoordinator`] owns the registry, the current selection and the two editable path
//! fields. Editing a field while a saved profile (or Default) is selected silently moves the
//! edits into the single draft profile, which can later be promoted under a name or discarded.
//!
//! Every operation that writes to storage ends by reloading the registry and reselecting, so the
//! in-memory view never drifts from what is stored.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    coordinator::state::{Inner, LoadGuard, ReconcileGuard, SuspendGuard},
    profile::{Profile, ProfileId},
    registry::ProfileRegistry,
    repository::{Storage, StorageError, config::Cfg},
    selection::{last_marker, persist_selection, restore_selection},
    validation::{
        ValidationError, validate_folder_path, validate_profile_name, validate_workbook_path,
    },
};

mod state;

pub use state::{DraftState, Field};

pub struct ProfileCoordinator<S> {
    storage: S,
    cfg: Cfg,
    inner: Mutex<Inner>,
}

impl<S: Storage> ProfileCoordinator<S> {
    /// Create a coordinator holding only the Default profile. Call [`Self::load`] next.
    pub fn new(storage: S, cfg: Cfg) -> Self {
        let inner = Inner::new(cfg.read().default_profile_name());

        Self {
            storage,
            cfg,
            inner: Mutex::new(inner),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // Presentation state

    /// The ordered profile list to display.
    pub fn profiles(&self) -> Arc<[Profile]> {
        self.inner.lock().registry.snapshot()
    }

    pub fn registry(&self) -> ProfileRegistry {
        self.inner.lock().registry.clone()
    }

    pub fn selected(&self) -> Profile {
        self.inner.lock().selected.clone()
    }

    pub fn draft(&self) -> Option<Profile> {
        self.inner.lock().registry.find_draft().cloned()
    }

    pub fn draft_state(&self) -> DraftState {
        self.inner.lock().state
    }

    /// Current text of an editable field, exactly as typed.
    pub fn field_text(&self, field: Field) -> String {
        self.inner.lock().field(field).text.clone()
    }

    /// The validation message for a field, if its text is currently invalid.
    pub fn field_error(&self, field: Field) -> Option<ValidationError> {
        self.inner.lock().field(field).error.clone()
    }

    // Operations

    /// Load the registry from storage and restore the remembered selection.
    ///
    /// When storage can't be read the coordinator falls back to the Default profile alone and
    /// the error is returned. A load started while another is running is ignored, one started
    /// while another operation is in flight is refused.
    pub async fn load(&self) -> Result<()> {
        let Some(_loading) = LoadGuard::begin(&self.inner) else {
            debug!("Load already in progress, ignoring");
            return Ok(());
        };
        let guard = {
            let mut inner = self.inner.lock();
            inner.ensure_idle()?;
            ReconcileGuard::begin(&mut inner, &self.inner)
        };

        let default_name = self.default_name();
        let (registry, marker, result) =
            match ProfileRegistry::load(&self.storage, &default_name).await {
                Ok(registry) => {
                    let marker = last_marker(&self.storage, &self.selection_key()).await;
                    (registry, marker, Ok(()))
                }
                Err(err) => (
                    ProfileRegistry::default_only(&default_name),
                    None,
                    Err(storage_failure("load", err)),
                ),
            };

        let selected = restore_selection(marker.as_deref(), &registry).clone();

        debug!(
            profiles = registry.iter().count(),
            selected = %selected.id(),
            "Loaded profiles"
        );

        {
            let mut inner = self.inner.lock();
            inner.install(registry);
            inner.populate(selected);
        }
        drop(guard);

        result
    }

    /// Change the selection to the registry entry with `id`.
    ///
    /// Fields are loaded from the profile and their messages cleared. Edit detection is suspended
    /// while the fields are populated so that never creates a draft. Storage is never written,
    /// apart from the remembered selection.
    pub async fn select(&self, id: ProfileId) -> Result<()> {
        let profile = {
            let mut inner = self.inner.lock();
            let profile = inner
                .registry
                .find_by_id(id)
                .cloned()
                .ok_or(Error::UnknownProfile(id))?;

            if inner.selected.id() == id {
                return Ok(());
            }

            SuspendGuard::begin(&mut inner).populate(profile.clone());
            profile
        };

        debug!(profile_id = %id, "Selected profile: {}", profile.name());

        self.remember(&profile).await;

        Ok(())
    }

    /// Set the spreadsheet path field, as typed by the user.
    pub async fn set_excel_path(&self, text: &str) -> Result<()> {
        self.edit(Field::ExcelPath, text).await
    }

    /// Set the working folder field, as typed by the user.
    pub async fn set_folder_path(&self, text: &str) -> Result<()> {
        self.edit(Field::FolderPath, text).await
    }

    /// Store the spreadsheet field on the selected profile. See [`Self::commit`].
    pub async fn commit_excel_path(&self) -> Result<()> {
        self.commit(Field::ExcelPath).await
    }

    /// Store the folder field on the selected profile. See [`Self::commit`].
    pub async fn commit_folder_path(&self) -> Result<()> {
        self.commit(Field::FolderPath).await
    }

    /// Promote the current field values into a new profile called `name`.
    ///
    /// The draft, if any, is discarded and the new profile becomes the selection. Nothing changes
    /// when the name is refused.
    pub async fn save_as(&self, name: &str) -> Result<ProfileId> {
        let reserved = self.reserved_names();
        let (name, excel, folder, guard) = {
            let mut inner = self.inner.lock();
            inner.ensure_idle()?;
            let name = validate_profile_name(
                name,
                &reserved.each_ref().map(String::as_str),
                inner.registry.named(),
                None,
            )?;
            let excel = inner.excel.value();
            let folder = inner.folder.value();

            (name, excel, folder, ReconcileGuard::begin(&mut inner, &self.inner))
        };

        let result = async {
            self.ensure_name_free(&name, None).await?;
            async {
                let id = self
                    .storage
                    .insert_profile(&name, excel.as_deref(), folder.as_deref(), false)
                    .await?;
                self.storage.clear_draft().await?;
                let registry = ProfileRegistry::load(&self.storage, &self.default_name()).await?;
                Ok::<_, StorageError>((id, registry))
            }
            .await
            .map_err(|err| storage_failure("save_as", err))
        }
        .await;
        let (id, registry) = self.recover(result).await?;

        let profile = self.install_and_select(registry, id, guard)?;

        info!(profile_id = %id, "Saved profile: {name}");

        self.remember(&profile).await;

        Ok(id)
    }

    /// Create an empty profile called `name` and select it. Any draft is left alone.
    pub async fn add_profile(&self, name: &str) -> Result<ProfileId> {
        let reserved = self.reserved_names();
        let (name, guard) = {
            let mut inner = self.inner.lock();
            inner.ensure_idle()?;
            let name = validate_profile_name(
                name,
                &reserved.each_ref().map(String::as_str),
                inner.registry.named(),
                None,
            )?;

            (name, ReconcileGuard::begin(&mut inner, &self.inner))
        };

        let result = async {
            self.ensure_name_free(&name, None).await?;
            async {
                let id = self.storage.insert_profile(&name, None, None, false).await?;
                let registry = ProfileRegistry::load(&self.storage, &self.default_name()).await?;
                Ok::<_, StorageError>((id, registry))
            }
            .await
            .map_err(|err| storage_failure("add_profile", err))
        }
        .await;
        let (id, registry) = self.recover(result).await?;

        let profile = self.install_and_select(registry, id, guard)?;

        info!(profile_id = %id, "Added profile: {name}");

        self.remember(&profile).await;

        Ok(id)
    }

    /// Soft-delete the selected profile and fall back to Default.
    ///
    /// Deactivating the draft discards it. Default itself can't be deactivated.
    pub async fn deactivate_selected(&self) -> Result<()> {
        let (selected, guard) = {
            let mut inner = self.inner.lock();
            inner.ensure_idle()?;
            if inner.selected.is_default() {
                return Err(Error::DeactivateDefault);
            }
            let selected = inner.selected.clone();

            (selected, ReconcileGuard::begin(&mut inner, &self.inner))
        };

        let registry = async {
            if selected.is_draft() {
                self.storage.clear_draft().await?;
            } else {
                self.storage.deactivate_profile(selected.id()).await?;
            }
            ProfileRegistry::load(&self.storage, &self.default_name()).await
        }
        .await
        .map_err(|err| storage_failure("deactivate", err));
        let registry = self.recover(registry).await?;

        let default = self.install_and_select(registry, ProfileId::DEFAULT, guard)?;

        info!(
            profile_id = %selected.id(),
            is_draft = selected.is_draft(),
            "Deactivated profile: {}",
            selected.name()
        );

        self.remember(&default).await;

        Ok(())
    }

    /// Rename the selected profile.
    ///
    /// Only saved profiles can be renamed. Changing just the casing of the current name is
    /// allowed.
    pub async fn rename_selected(&self, name: &str) -> Result<()> {
        let reserved = self.reserved_names();
        let (id, name, guard) = {
            let mut inner = self.inner.lock();
            inner.ensure_idle()?;
            if inner.selected.is_default() {
                return Err(Error::RenameDefault);
            }
            if inner.selected.is_draft() {
                return Err(Error::RenameDraft);
            }
            let id = inner.selected.id();
            let name = validate_profile_name(
                name,
                &reserved.each_ref().map(String::as_str),
                inner.registry.named(),
                Some(id),
            )?;

            (id, name, ReconcileGuard::begin(&mut inner, &self.inner))
        };

        let result = async {
            self.ensure_name_free(&name, Some(id)).await?;
            async {
                self.storage.update_profile_name(id, &name).await?;
                ProfileRegistry::load(&self.storage, &self.default_name()).await
            }
            .await
            .map_err(|err| storage_failure("rename", err))
        }
        .await;
        let registry = self.recover(result).await?;

        self.install_and_select(registry, id, guard)?;

        info!(profile_id = %id, "Renamed profile to {name}");

        Ok(())
    }

    /// Record an edit and route it to the draft.
    async fn edit(&self, field: Field, text: &str) -> Result<()> {
        let extensions = self.cfg.read().workbook_extensions().to_vec();
        {
            let mut inner = self.inner.lock();
            let slot = inner.field_mut(field);
            if slot.text == text {
                return Ok(());
            }

            slot.text = text.to_string();
            slot.error = match field {
                Field::ExcelPath => validate_workbook_path(text, &extensions),
                Field::FolderPath => validate_folder_path(text),
            }
            .err();

            if inner.suspended > 0 {
                debug!(%field, "Field populated by a selection change");
                return Ok(());
            }
        }

        self.reconcile_draft().await
    }

    /// Flush both fields into the draft, creating it if needed, and make it the selection.
    ///
    /// Invalid paths are drafted as typed so nothing the user entered is lost. An edit arriving
    /// while this runs only updates its field; the next edit flushes it.
    async fn reconcile_draft(&self) -> Result<()> {
        let (origin, excel, folder, guard) = {
            let mut inner = self.inner.lock();
            if inner.state == DraftState::Reconciling {
                debug!("Draft reconciliation in flight, edit will be flushed by the next one");
                return Ok(());
            }
            let origin = inner.selected.clone();
            let excel = inner.excel.value();
            let folder = inner.folder.value();

            (origin, excel, folder, ReconcileGuard::begin(&mut inner, &self.inner))
        };

        let result = async {
            self.storage
                .upsert_draft(excel.as_deref(), folder.as_deref())
                .await?;
            let registry = ProfileRegistry::load(&self.storage, &self.default_name()).await?;
            let draft = registry
                .find_draft()
                .cloned()
                .ok_or(StorageError::MissingElement("draft"))?;
            Ok::<_, StorageError>((draft, registry))
        }
        .await
        .map_err(|err| storage_failure("reconcile_draft", err));
        let (draft, registry) = self.recover(result).await?;

        let switched = {
            let mut inner = self.inner.lock();
            inner.install(registry);

            // The user may have picked another profile while storage was busy.
            if inner.selected.id() == origin.id() {
                inner.selected = draft.clone();
                !origin.is_draft()
            } else {
                false
            }
        };
        drop(guard);

        if switched {
            debug!(
                profile_id = %draft.id(),
                from = %origin.id(),
                "Switched to draft after edit"
            );
            self.remember(&draft).await;
        }

        Ok(())
    }

    /// Store one field on the selected profile, if it currently validates.
    ///
    /// Default is never stored, committing while it is selected does nothing. The field text is
    /// left as typed.
    pub async fn commit(&self, field: Field) -> Result<()> {
        let (id, value, guard) = {
            let mut inner = self.inner.lock();
            inner.ensure_idle()?;
            if inner.selected.is_default() {
                return Ok(());
            }
            let slot = inner.field(field);
            if let Some(err) = &slot.error {
                return Err(err.clone().into());
            }
            let value = slot.value();
            let id = inner.selected.id();

            (id, value, ReconcileGuard::begin(&mut inner, &self.inner))
        };

        let registry = async {
            match field {
                Field::ExcelPath => {
                    self.storage
                        .update_profile_excel_path(id, value.as_deref())
                        .await?
                }
                Field::FolderPath => {
                    self.storage
                        .update_profile_folder_path(id, value.as_deref())
                        .await?
                }
            }
            ProfileRegistry::load(&self.storage, &self.default_name()).await
        }
        .await
        .map_err(|err| storage_failure("commit", err));
        let registry = self.recover(registry).await?;

        {
            let mut inner = self.inner.lock();
            let refreshed = registry
                .find_by_id(id)
                .cloned()
                .ok_or(Error::UnknownProfile(id))?;
            inner.install(registry);
            inner.selected = refreshed;
        }
        drop(guard);

        debug!(profile_id = %id, %field, "Committed field");

        Ok(())
    }

    /// Install a reloaded registry, select `id` from it and release the in-flight marker.
    fn install_and_select(
        &self,
        registry: ProfileRegistry,
        id: ProfileId,
        guard: ReconcileGuard<'_>,
    ) -> Result<Profile> {
        let profile = registry
            .find_by_id(id)
            .cloned()
            .ok_or(Error::UnknownProfile(id))?;

        {
            let mut inner = self.inner.lock();
            inner.install(registry);
            inner.populate(profile.clone());
        }
        drop(guard);

        Ok(profile)
    }

    /// Check `name` against what storage holds right now rather than the installed registry,
    /// which may lag behind after a failed operation.
    async fn ensure_name_free(&self, name: &str, renaming: Option<ProfileId>) -> Result<()> {
        let stored = ProfileRegistry::load(&self.storage, &self.default_name())
            .await
            .map_err(|err| storage_failure("check_name", err))?;
        let reserved = self.reserved_names();

        validate_profile_name(
            name,
            &reserved.each_ref().map(String::as_str),
            stored.named(),
            renaming,
        )?;

        Ok(())
    }

    /// Pass `result` through. On failure, install whatever storage now holds so a write that
    /// went through before the failure is not invisible to the next attempt.
    async fn recover<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            return result;
        }

        match ProfileRegistry::load(&self.storage, &self.default_name()).await {
            Ok(registry) => self.inner.lock().install(registry),
            Err(err) => {
                warn!(event = "storage_resync_failed", error = %err, "Could not reload profiles");
            }
        }

        result
    }

    async fn remember(&self, profile: &Profile) {
        persist_selection(
            &self.storage,
            &self.selection_key(),
            profile,
            &self.default_name(),
        )
        .await;
    }

    fn default_name(&self) -> String {
        self.cfg.read().default_profile_name().to_string()
    }

    fn selection_key(&self) -> String {
        self.cfg.read().selection_state_key().to_string()
    }

    fn reserved_names(&self) -> [String; 2] {
        self.cfg.read().reserved_names().map(str::to_string)
    }
}

/// Log a storage failure with its cause and turn it into the generic user-facing error.
fn storage_failure(operation: &'static str, err: StorageError) -> Error {
    warn!(event = "storage_failure", operation, error = %err, "Profile storage failed");
    Error::Storage(err)
}
