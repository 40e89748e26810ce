//! Pure checks for user input. Nothing here touches storage or engine state.

use std::path::Path;

use thiserror::Error;

use crate::profile::{Profile, ProfileId, names_match};

/// A user-correctable input problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Unsupported file extension (expected one of: {accepted})")]
    UnsupportedExtension { accepted: String },
    #[error("Folder not found: {0}")]
    FolderNotFound(String),
    #[error("Profile name cannot be empty")]
    EmptyName,
    #[error("\"{0}\" is a reserved profile name")]
    ReservedName(String),
    #[error("A profile named \"{0}\" already exists")]
    DuplicateName(String),
}

/// Check a spreadsheet path. Blank is valid and means no file was chosen.
///
/// The file has to exist and carry one of the `accepted` extensions (compared without the dot,
/// ignoring case). Its contents are never opened.
pub fn validate_workbook_path(text: &str, accepted: &[String]) -> Result<(), ValidationError> {
    let path = text.trim();
    if path.is_empty() {
        return Ok(());
    }

    if !Path::new(path).is_file() {
        return Err(ValidationError::FileNotFound(path.to_string()));
    }

    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match extension {
        Some(ext) if accepted.iter().any(|a| a.to_lowercase() == ext) => Ok(()),
        _ => Err(ValidationError::UnsupportedExtension {
            accepted: accepted.join(", "),
        }),
    }
}

/// Check a working folder path. Blank is valid.
pub fn validate_folder_path(text: &str) -> Result<(), ValidationError> {
    let path = text.trim();
    if path.is_empty() || Path::new(path).is_dir() {
        Ok(())
    } else {
        Err(ValidationError::FolderNotFound(path.to_string()))
    }
}

/// Check a proposed profile name and return it trimmed.
///
/// `existing` are the profiles the name must not collide with. A profile whose id equals
/// `renaming` is skipped so a profile can be renamed to a different casing of its own name.
pub fn validate_profile_name<'a>(
    name: &str,
    reserved: &[&str],
    existing: impl IntoIterator<Item = &'a Profile>,
    renaming: Option<ProfileId>,
) -> Result<String, ValidationError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if reserved.iter().any(|r| names_match(r, name)) {
        return Err(ValidationError::ReservedName(name.to_string()));
    }

    if existing
        .into_iter()
        .filter(|p| Some(p.id()) != renaming)
        .any(|p| p.has_name(name))
    {
        return Err(ValidationError::DuplicateName(name.to_string()));
    }

    Ok(name.to_string())
}
