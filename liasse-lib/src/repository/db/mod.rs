use std::{io, sync::Arc};

use agdb::{DbAny, QueryBuilder};
use derive_more::Deref;
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    fs::state_dir,
    repository::{
        db::models::{CURRENT_MODEL_VERSION, ModelVersion},
        storage::{StorageError, StorageResult},
    },
};

pub(crate) mod models;

/// Root alias every profile node hangs from.
pub(crate) const PROFILES: &str = "profiles";
/// Root alias every state entry hangs from.
pub(crate) const STATE: &str = "state";
const MODEL_VERSION: &str = "model_version";
/// Counter holding the id the next inserted profile receives.
pub(crate) const NEXT_UID: &str = "next_uid";

#[derive(Debug, Clone, Deref)]
pub(crate) struct Db {
    #[deref]
    db: Arc<RwLock<DbAny>>,
}

impl Db {
    /// Open (or create) the database file in the state directory.
    pub fn open() -> StorageResult<Self> {
        let path = state_dir()?.join("data.db");
        let path_str = path.to_str().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "database path is not valid UTF-8")
        })?;

        let db = Self {
            db: Arc::new(RwLock::new(DbAny::new_file(path_str)?)),
        };

        db.init()?;

        debug!("Opened database at {}", path.display());

        Ok(db)
    }

    /// Create a memory backed database
    pub fn in_memory(name: &str) -> StorageResult<Self> {
        let db = Self {
            db: Arc::new(RwLock::new(DbAny::new_memory(name)?)),
        };

        db.init()?;

        Ok(db)
    }

    fn init(&self) -> StorageResult<()> {
        let alias_count = self
            .db
            .read()
            .exec(QueryBuilder::select().aliases().query())?
            .result;

        if alias_count == 0 {
            self.db
                .write()
                .transaction_mut(|t| -> StorageResult<()> {
                    t.exec_mut(
                        QueryBuilder::insert()
                            .nodes()
                            .aliases([PROFILES, STATE, MODEL_VERSION, NEXT_UID])
                            .query(),
                    )?;

                    // Storage assigned ids are positive, 0 belongs to the Default profile.
                    t.exec_mut(
                        QueryBuilder::insert()
                            .values([[(NEXT_UID, 1_u64).into()]])
                            .ids(NEXT_UID)
                            .query(),
                    )?;

                    let model_version_id = t
                        .exec_mut(
                            QueryBuilder::insert()
                                .element(ModelVersion::default())
                                .query(),
                        )?
                        .elements
                        .first()
                        .ok_or(StorageError::MissingElement(MODEL_VERSION))?
                        .id;

                    t.exec_mut(
                        QueryBuilder::insert()
                            .edges()
                            .from(MODEL_VERSION)
                            .to(model_version_id)
                            .query(),
                    )?;

                    Ok(())
                })?;
        }

        let versions: Vec<ModelVersion> = self
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<ModelVersion>()
                    .search()
                    .from(MODEL_VERSION)
                    .where_()
                    .neighbor()
                    .query(),
            )?
            .try_into()?;

        match versions.first() {
            Some(mv) if mv.version() > CURRENT_MODEL_VERSION => {
                Err(StorageError::UnsupportedModelVersion {
                    found: mv.version(),
                    supported: CURRENT_MODEL_VERSION,
                })
            }
            Some(_) => Ok(()),
            None => Err(StorageError::MissingElement(MODEL_VERSION)),
        }
    }
}
