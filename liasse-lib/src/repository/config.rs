use std::{fs, io, path::PathBuf, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::fs::config_dir;

const CURRENT_CONFIG_VERSION: u16 = 1;
const FILE_NAME: &str = "core.toml";

/// Handle to the core configuration shared by the repository and the coordinator.
pub type Cfg = Arc<RwLock<CoreConfig>>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not access the configuration file: {0}")]
    Io(#[from] io::Error),
    #[error("Configuration file is malformed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration could not be serialized: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// The core configuration, serialized to TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    version: u16,
    /// Display name of the synthetic profile. Reserved.
    default_profile_name: String,
    /// Name given to the draft profile. Reserved.
    draft_profile_name: String,
    /// State key under which the last selection is remembered.
    selection_state_key: String,
    /// Accepted spreadsheet extensions, without the leading dot.
    workbook_extensions: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            default_profile_name: "Default".into(),
            draft_profile_name: "CONFIG_NON_SAUVEGARDEE".into(),
            selection_state_key: "LastProfileKey".into(),
            workbook_extensions: vec!["xlsx".into(), "xlsm".into(), "xls".into()],
        }
    }
}

impl CoreConfig {
    /// Read the configuration file, writing the defaults first if there isn't one yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let cfg = Self::default();
            cfg.save()?;
            debug!("Wrote default configuration to {}", path.display());
            Ok(cfg)
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(Self::path()?, contents)?;

        Ok(())
    }

    pub fn handle(self) -> Cfg {
        Arc::new(RwLock::new(self))
    }

    pub fn default_profile_name(&self) -> &str {
        &self.default_profile_name
    }

    pub fn draft_profile_name(&self) -> &str {
        &self.draft_profile_name
    }

    pub fn selection_state_key(&self) -> &str {
        &self.selection_state_key
    }

    pub fn workbook_extensions(&self) -> &[String] {
        &self.workbook_extensions
    }

    /// Names a user can never give to a profile.
    pub fn reserved_names(&self) -> [&str; 2] {
        [&self.default_profile_name, &self.draft_profile_name]
    }

    fn path() -> io::Result<PathBuf> {
        Ok(config_dir()?.join(FILE_NAME))
    }

    /// Return a mock configuration for tests. Nothing is read from or written to disk.
    #[cfg(test)]
    pub(crate) fn mock() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg: CoreConfig = toml::from_str("draft_profile_name = \"UNSAVED\"").unwrap();

        assert_eq!(cfg.draft_profile_name(), "UNSAVED");
        assert_eq!(cfg.default_profile_name(), "Default");
        assert_eq!(cfg.selection_state_key(), "LastProfileKey");
        assert_eq!(cfg.workbook_extensions(), ["xlsx", "xlsm", "xls"]);
    }

    #[test]
    fn test_round_trip() {
        let cfg = CoreConfig::mock();
        let contents = toml::to_string_pretty(&cfg).unwrap();
        let parsed: CoreConfig = toml::from_str(&contents).unwrap();

        assert_eq!(parsed.reserved_names(), ["Default", "CONFIG_NON_SAUVEGARDEE"]);
    }
}
