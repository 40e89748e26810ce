use agdb::{DbElement, DbId};

/// One entry of the key/value state table.
#[derive(Debug, Clone, DbElement, PartialEq)]
pub(crate) struct StateModel {
    pub(crate) db_id: Option<DbId>,
    pub(crate) key: String,
    pub(crate) value: String,
}

impl StateModel {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            db_id: None,
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}
