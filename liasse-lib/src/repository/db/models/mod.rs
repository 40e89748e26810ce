use agdb::{DbElement, DbId};

mod profiles;
mod state;

pub(crate) use profiles::ProfileModel;
pub(crate) use state::StateModel;

pub(crate) const CURRENT_MODEL_VERSION: u64 = 1;

/// Version of the data model a database was written with.
#[derive(Debug, Clone, DbElement, PartialEq)]
pub(crate) struct ModelVersion {
    db_id: Option<DbId>,
    version: u64,
}

impl ModelVersion {
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self {
            db_id: None,
            version: CURRENT_MODEL_VERSION,
        }
    }
}
