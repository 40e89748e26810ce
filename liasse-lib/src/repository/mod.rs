use agdb::{DbId, DbKeyValue, QueryBuilder};
use chrono::Utc;
use tracing::debug;

use crate::{
    profile::{Profile, ProfileId},
    repository::{
        config::Cfg,
        db::{
            Db, NEXT_UID, PROFILES, STATE,
            models::{ProfileModel, StateModel},
        },
    },
};

mod db;

pub mod config;
pub mod storage;

pub use config::{ConfigError, CoreConfig};
pub use storage::{Storage, StorageError, StorageResult};

/// Central access point for all persistent data.
///
/// The [`Repository`] is the embedded-database implementation of [`Storage`]: profiles and the
/// key/value state table live in a single `agdb` database shared between clones.
#[derive(Clone, Debug)]
pub struct Repository {
    db: Db,
    cfg: Cfg,
}

impl Repository {
    /// Open the on-disk database in the state directory.
    pub fn open(cfg: Cfg) -> StorageResult<Self> {
        Ok(Self {
            db: Db::open()?,
            cfg,
        })
    }

    /// A repository backed by a fresh in-memory database. Nothing survives the process.
    pub fn in_memory(cfg: Cfg) -> StorageResult<Self> {
        Ok(Self {
            db: Db::in_memory("liasse")?,
            cfg,
        })
    }

    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    /// Look up any stored profile, including deactivated ones.
    pub fn profile(&self, id: ProfileId) -> StorageResult<Option<Profile>> {
        self.profile_models()?
            .into_iter()
            .find(|m| m.uid_matches(id))
            .map(ProfileModel::into_profile)
            .transpose()
    }

    fn profile_models(&self) -> StorageResult<Vec<ProfileModel>> {
        Ok(self
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<ProfileModel>()
                    .search()
                    .from(PROFILES)
                    .where_()
                    .node()
                    .and()
                    .neighbor()
                    .query(),
            )?
            .try_into()?)
    }

    fn active_profile_models(&self) -> StorageResult<Vec<ProfileModel>> {
        Ok(self
            .profile_models()?
            .into_iter()
            .filter(|m| m.is_active)
            .collect())
    }

    fn active_draft_model(&self) -> StorageResult<Option<ProfileModel>> {
        Ok(self
            .active_profile_models()?
            .into_iter()
            .find(|m| m.is_draft))
    }

    fn profile_db_id(&self, id: ProfileId) -> StorageResult<DbId> {
        self.profile_models()?
            .into_iter()
            .find(|m| m.uid_matches(id))
            .and_then(|m| m.db_id)
            .ok_or(StorageError::UnknownProfile(id))
    }

    fn insert_profile_model(
        &self,
        name: &str,
        excel_path: Option<&str>,
        folder_path: Option<&str>,
        is_draft: bool,
    ) -> StorageResult<ProfileId> {
        let now = Utc::now().timestamp_millis();

        let uid = self.db.write().transaction_mut(|t| -> StorageResult<u64> {
            let uid = t
                .exec(QueryBuilder::select().values(NEXT_UID).ids(NEXT_UID).query())?
                .elements
                .pop()
                .and_then(|mut element| element.values.pop())
                .ok_or(StorageError::MissingElement(NEXT_UID))?
                .value
                .to_u64()?;

            t.exec_mut(
                QueryBuilder::insert()
                    .values([[(NEXT_UID, uid + 1).into()]])
                    .ids(NEXT_UID)
                    .query(),
            )?;

            let model = ProfileModel::new(uid, name, excel_path, folder_path, is_draft, now);
            let profile_id = t
                .exec_mut(QueryBuilder::insert().element(model).query())?
                .elements
                .first()
                .ok_or(StorageError::MissingElement(PROFILES))?
                .id;

            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from(PROFILES)
                    .to(profile_id)
                    .query(),
            )?;

            Ok(uid)
        })?;

        let id = ProfileId::new(i64::try_from(uid).map_err(|_| StorageError::IdOutOfRange(uid))?);

        debug!(profile_id = %id, is_draft, "Inserted profile: {name}");

        Ok(id)
    }

    /// Overwrite some fields of a stored profile and refresh its `updated_at`.
    fn set_profile_fields<const N: usize>(
        &self,
        id: ProfileId,
        fields: [DbKeyValue; N],
    ) -> StorageResult<()> {
        let db_id = self.profile_db_id(id)?;
        let now = Utc::now().timestamp_millis();

        self.db.write().transaction_mut(|t| -> StorageResult<()> {
            t.exec_mut(QueryBuilder::insert().values([fields]).ids(db_id).query())?;
            t.exec_mut(
                QueryBuilder::insert()
                    .values([[("updated_at", now).into()]])
                    .ids(db_id)
                    .query(),
            )?;

            Ok(())
        })
    }

    fn state_model(&self, key: &str) -> StorageResult<Option<StateModel>> {
        let entries: Vec<StateModel> = self
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<StateModel>()
                    .search()
                    .from(STATE)
                    .where_()
                    .node()
                    .and()
                    .neighbor()
                    .query(),
            )?
            .try_into()?;

        Ok(entries.into_iter().find(|e| e.key == key))
    }

    fn write_state(&self, key: &str, value: &str) -> StorageResult<()> {
        if let Some(db_id) = self.state_model(key)?.and_then(|e| e.db_id) {
            self.db.write().exec_mut(
                QueryBuilder::insert()
                    .values([[("value", value).into()]])
                    .ids(db_id)
                    .query(),
            )?;

            return Ok(());
        }

        self.db.write().transaction_mut(|t| -> StorageResult<()> {
            let entry_id = t
                .exec_mut(
                    QueryBuilder::insert()
                        .element(StateModel::new(key, value))
                        .query(),
                )?
                .elements
                .first()
                .ok_or(StorageError::MissingElement(STATE))?
                .id;

            t.exec_mut(QueryBuilder::insert().edges().from(STATE).to(entry_id).query())?;

            Ok(())
        })
    }

    /// Return a mock version of a [`Repository`] with an in-memory database and configuration.
    #[cfg(test)]
    pub(crate) fn mock() -> Self {
        Self::in_memory(CoreConfig::mock().handle()).unwrap()
    }
}

impl Storage for Repository {
    async fn list_active_profiles(&self) -> StorageResult<Vec<Profile>> {
        self.active_profile_models()?
            .into_iter()
            .map(ProfileModel::into_profile)
            .collect()
    }

    async fn insert_profile(
        &self,
        name: &str,
        excel_path: Option<&str>,
        folder_path: Option<&str>,
        is_draft: bool,
    ) -> StorageResult<ProfileId> {
        self.insert_profile_model(name, excel_path, folder_path, is_draft)
    }

    async fn update_profile_excel_path(
        &self,
        id: ProfileId,
        path: Option<&str>,
    ) -> StorageResult<()> {
        self.set_profile_fields(id, [("excel_path", path.unwrap_or_default()).into()])
    }

    async fn update_profile_folder_path(
        &self,
        id: ProfileId,
        path: Option<&str>,
    ) -> StorageResult<()> {
        self.set_profile_fields(id, [("folder_path", path.unwrap_or_default()).into()])
    }

    async fn update_profile_name(&self, id: ProfileId, name: &str) -> StorageResult<()> {
        self.set_profile_fields(id, [("name", name).into()])
    }

    async fn deactivate_profile(&self, id: ProfileId) -> StorageResult<()> {
        self.set_profile_fields(id, [("is_active", false).into()])?;

        debug!(profile_id = %id, "Deactivated profile");

        Ok(())
    }

    async fn get_draft(&self) -> StorageResult<Option<Profile>> {
        self.active_draft_model()?
            .map(ProfileModel::into_profile)
            .transpose()
    }

    async fn upsert_draft(
        &self,
        excel_path: Option<&str>,
        folder_path: Option<&str>,
    ) -> StorageResult<ProfileId> {
        if let Some(draft) = self.active_draft_model()? {
            let id = draft.id()?;
            self.set_profile_fields(
                id,
                [
                    ("excel_path", excel_path.unwrap_or_default()).into(),
                    ("folder_path", folder_path.unwrap_or_default()).into(),
                ],
            )?;

            return Ok(id);
        }

        let name = self.cfg.read().draft_profile_name().to_string();
        self.insert_profile_model(&name, excel_path, folder_path, true)
    }

    async fn clear_draft(&self) -> StorageResult<()> {
        // There is never more than one, but sweep them all so a damaged database heals itself.
        for draft in self
            .active_profile_models()?
            .into_iter()
            .filter(|m| m.is_draft)
        {
            let id = draft.id()?;
            self.set_profile_fields(id, [("is_active", false).into()])?;

            debug!(profile_id = %id, "Cleared draft");
        }

        Ok(())
    }

    async fn get_state(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.state_model(key)?.map(|e| e.value))
    }

    async fn set_state(&self, key: &str, value: &str) -> StorageResult<()> {
        self.write_state(key, value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_positive_increasing_ids() {
        let repo = Repository::mock();

        let first = repo.insert_profile("Weekly", None, None, false).await.unwrap();
        let second = repo.insert_profile("Monthly", None, None, false).await.unwrap();

        assert!(first > ProfileId::DEFAULT);
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_list_active_profiles() {
        let repo = Repository::mock();

        assert!(repo.list_active_profiles().await.unwrap().is_empty());

        let id = repo
            .insert_profile("Weekly", Some("C:\\a.xlsx"), Some("C:\\a"), false)
            .await
            .unwrap();

        let profiles = repo.list_active_profiles().await.unwrap();
        let profile = profiles.first().unwrap();

        assert_eq!(profiles.len(), 1);
        assert_eq!(profile.id(), id);
        assert_eq!(profile.name(), "Weekly");
        assert_eq!(profile.excel_path(), Some("C:\\a.xlsx"));
        assert_eq!(profile.folder_path(), Some("C:\\a"));
        assert!(profile.is_active());
        assert!(!profile.is_draft());
        assert!(profile.created_at().is_some());
    }

    #[tokio::test]
    async fn test_update_paths() {
        let repo = Repository::mock();
        let id = repo
            .insert_profile("Weekly", Some("C:\\a.xlsx"), None, false)
            .await
            .unwrap();

        repo.update_profile_excel_path(id, None).await.unwrap();
        repo.update_profile_folder_path(id, Some("C:\\b"))
            .await
            .unwrap();
        repo.update_profile_name(id, "Daily").await.unwrap();

        let profile = repo.profile(id).unwrap().unwrap();
        assert_eq!(profile.excel_path(), None);
        assert_eq!(profile.folder_path(), Some("C:\\b"));
        assert_eq!(profile.name(), "Daily");
        assert!(profile.updated_at() >= profile.created_at());
    }

    #[tokio::test]
    async fn test_update_unknown_profile() {
        let repo = Repository::mock();

        assert!(matches!(
            repo.update_profile_name(ProfileId::new(42), "Nope").await,
            Err(StorageError::UnknownProfile(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_keeps_record() {
        let repo = Repository::mock();
        let id = repo.insert_profile("Weekly", None, None, false).await.unwrap();

        repo.deactivate_profile(id).await.unwrap();

        assert!(repo.list_active_profiles().await.unwrap().is_empty());
        let stored = repo.profile(id).unwrap().unwrap();
        assert!(!stored.is_active());
        assert_eq!(stored.name(), "Weekly");
    }

    #[tokio::test]
    async fn test_upsert_draft_reuses_the_active_draft() {
        let repo = Repository::mock();

        let first = repo.upsert_draft(None, Some("C:\\a")).await.unwrap();
        let second = repo
            .upsert_draft(Some("C:\\a.xlsx"), Some("C:\\b"))
            .await
            .unwrap();

        assert_eq!(first, second);

        let draft = repo.get_draft().await.unwrap().unwrap();
        assert_eq!(draft.id(), first);
        assert_eq!(draft.name(), "CONFIG_NON_SAUVEGARDEE");
        assert_eq!(draft.excel_path(), Some("C:\\a.xlsx"));
        assert_eq!(draft.folder_path(), Some("C:\\b"));
        assert!(draft.is_draft());
    }

    #[tokio::test]
    async fn test_clear_draft() {
        let repo = Repository::mock();

        // Clearing without a draft is fine
        repo.clear_draft().await.unwrap();

        let id = repo.upsert_draft(None, None).await.unwrap();
        repo.clear_draft().await.unwrap();

        assert!(repo.get_draft().await.unwrap().is_none());
        assert!(!repo.profile(id).unwrap().unwrap().is_active());

        // A new draft gets a fresh id
        let next = repo.upsert_draft(None, None).await.unwrap();
        assert_ne!(next, id);
    }

    #[tokio::test]
    async fn test_state() {
        let repo = Repository::mock();

        assert_eq!(repo.get_state("LastProfileKey").await.unwrap(), None);

        repo.set_state("LastProfileKey", "DRAFT").await.unwrap();
        repo.set_state("LastProfileKey", "3").await.unwrap();
        repo.set_state("Other", "x").await.unwrap();

        assert_eq!(
            repo.get_state("LastProfileKey").await.unwrap().as_deref(),
            Some("3")
        );
        assert_eq!(repo.get_state("Other").await.unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_clones_share_the_database() {
        let repo = Repository::mock();
        let clone = repo.clone();

        repo.insert_profile("Weekly", None, None, false).await.unwrap();

        assert_eq!(clone.list_active_profiles().await.unwrap().len(), 1);
    }
}
