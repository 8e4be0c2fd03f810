use std::path::{Path, PathBuf};

/// Extension of project data files
pub const PROJECT_FILE_EXTENSION: &str = "csv";

/// Error type for invalid input, raised before any I/O happens
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("project name can not be empty")]
    EmptyProjectName,
    #[error("invalid project name {0:?}: must not contain path separators or start with '.'")]
    InvalidProjectName(String),
    #[error("path to datadir can not be empty")]
    EmptyDatadir,
    #[error("{action} needs a value")]
    EmptyValue { action: &'static str },
}

/// A named append-only log, backed by `<datadir>/<name>.csv`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Project {
    pub name: String,
    pub datadir: PathBuf,
}

impl Project {
    /// Build a project after validating its name and data directory.
    pub fn new(name: &str, datadir: &Path) -> Result<Self, ValidationError> {
        validate_name(name)?;
        if datadir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyDatadir);
        }
        Ok(Project {
            name: name.to_string(),
            datadir: datadir.to_path_buf(),
        })
    }

    /// File name of the backing file, relative to the data directory
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, PROJECT_FILE_EXTENSION)
    }

    pub fn file_path(&self) -> PathBuf {
        self.datadir.join(self.file_name())
    }

    pub fn exists(&self) -> bool {
        self.file_path().is_file()
    }

    /// A project is empty when it has no backing file
    pub fn is_empty(&self) -> bool {
        !self.exists()
    }

    /// True when `other` is a subproject of this project: its name starts
    /// with this project's name and is not identical to it.
    pub fn is_subproject(&self, other: &Project) -> bool {
        self.name != other.name && other.name.starts_with(&self.name)
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyProjectName);
    }
    if name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(ValidationError::InvalidProjectName(name.to_string()));
    }
    Ok(())
}
