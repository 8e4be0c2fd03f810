use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::{ReaderBuilder, StringRecord};

use crate::io::lock::{LockError, ProjectLock};
use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::model::config::Config;
use crate::model::project::{PROJECT_FILE_EXTENSION, Project, ValidationError};
use crate::model::record::{Note, Record, RecordKind, Todo, Track};
use crate::parse::record_codec::{self, DecodeError};

/// Error type for project store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no project with the name {0}")]
    NotFound(String),
    #[error("the project {0} already exists")]
    AlreadyExists(String),
    #[error("can not merge project {0} into itself")]
    SameProject(String),
    #[error("could not access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl StoreError {
    /// True for errors caused by the target of a rename/merge already
    /// existing or being the source itself.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_) | StoreError::SameProject(_))
    }

    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The set of project files in one data directory.
///
/// Every operation is synchronous and scoped to a single project file.
/// Without `lock_writes`, concurrent writers to the same file are not
/// coordinated.
#[derive(Debug, Clone)]
pub struct Store {
    datadir: PathBuf,
    lock_writes: bool,
}

impl Store {
    pub fn new(datadir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let datadir = datadir.into();
        if datadir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyDatadir.into());
        }
        Ok(Store {
            datadir,
            lock_writes: false,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        Ok(Store::new(config.datadir.clone())?.with_locking(config.lock_writes))
    }

    /// Hold a per-project advisory lock during mutating operations
    pub fn with_locking(mut self, lock_writes: bool) -> Self {
        self.lock_writes = lock_writes;
        self
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// Resolve a project name inside this store's data directory
    pub fn project(&self, name: &str) -> Result<Project, StoreError> {
        Ok(Project::new(name, &self.datadir)?)
    }

    /// All projects in the data directory, sorted by name.
    ///
    /// Hidden files and files without the project extension are skipped.
    /// A missing data directory has no projects.
    pub fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let entries = match fs::read_dir(&self.datadir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.datadir, e)),
        };

        let mut projects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.datadir, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            if file_name.starts_with('.') {
                continue;
            }

            let Some(name) = file_name
                .strip_suffix(PROJECT_FILE_EXTENSION)
                .and_then(|stem| stem.strip_suffix('.'))
            else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            projects.push(Project {
                name: name.to_string(),
                datadir: self.datadir.clone(),
            });
        }

        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    pub fn exists(&self, project: &Project) -> bool {
        project.exists()
    }

    pub fn require_exists(&self, project: &Project) -> Result<(), StoreError> {
        if self.exists(project) {
            Ok(())
        } else {
            Err(StoreError::NotFound(project.name.clone()))
        }
    }

    pub fn read_notes(&self, project: &Project) -> Result<Vec<Note>, StoreError> {
        Ok(self
            .read_kind(project, RecordKind::Note)?
            .into_iter()
            .filter_map(|r| match r {
                Record::Note(note) => Some(note),
                _ => None,
            })
            .collect())
    }

    pub fn read_todos(&self, project: &Project) -> Result<Vec<Todo>, StoreError> {
        Ok(self
            .read_kind(project, RecordKind::Todo)?
            .into_iter()
            .filter_map(|r| match r {
                Record::Todo(todo) => Some(todo),
                _ => None,
            })
            .collect())
    }

    pub fn read_tracks(&self, project: &Project) -> Result<Vec<Track>, StoreError> {
        Ok(self
            .read_kind(project, RecordKind::Track)?
            .into_iter()
            .filter_map(|r| match r {
                Record::Track(track) => Some(track),
                _ => None,
            })
            .collect())
    }

    /// Every decodable record of a project, in file order
    pub fn read_all(&self, project: &Project) -> Result<Vec<Record>, StoreError> {
        self.scan(project, |row| record_codec::decode_any(&project.name, row))
    }

    fn read_kind(&self, project: &Project, kind: RecordKind) -> Result<Vec<Record>, StoreError> {
        self.scan(project, |row| record_codec::decode(&project.name, row, kind))
    }

    /// Decode every row of a project file, skipping rows that fail to decode.
    fn scan<F>(&self, project: &Project, mut decode: F) -> Result<Vec<Record>, StoreError>
    where
        F: FnMut(&StringRecord) -> Result<Record, DecodeError>,
    {
        let path = project.file_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let mut out = Vec::new();
        let mut row = StringRecord::new();
        loop {
            match reader.read_record(&mut row) {
                Ok(false) => break,
                Ok(true) => {}
                Err(e) if e.is_io_error() => return Err(StoreError::Csv(e)),
                Err(e) => {
                    tracing::warn!(project = %project.name, error = %e, "skipping unreadable row");
                    continue;
                }
            }

            match decode(&row) {
                Ok(record) => out.push(record),
                // Rows of other kinds are expected in a mixed file
                Err(DecodeError::FieldCount { .. }) | Err(DecodeError::KindMismatch { .. }) => {}
                Err(e) => {
                    tracing::warn!(
                        project = %project.name,
                        line = ?row.position().map(|p| p.line()),
                        error = %e,
                        "skipping malformed row"
                    );
                }
            }
        }

        Ok(out)
    }

    /// Append one record to its project file, creating the data directory
    /// and the file as needed.
    ///
    /// The row is written with a single write and synced. If the write fails
    /// the file is truncated back to its previous length and the row is kept
    /// in the recovery log.
    pub fn append(&self, record: &Record) -> Result<(), StoreError> {
        self.append_with(record, write_row)
    }

    fn append_with<W>(&self, record: &Record, write: W) -> Result<(), StoreError>
    where
        W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        let project = self.project(record.project())?;
        fs::create_dir_all(&self.datadir).map_err(|e| StoreError::io(&self.datadir, e))?;
        let _lock = self.lock(&project)?;

        let mut line = record_codec::encode_line(record)?;
        let path = project.file_path();
        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;

        let before = file.metadata().map_err(|e| StoreError::io(&path, e))?.len();
        if before > 0 && !ends_with_newline(&mut file).map_err(|e| StoreError::io(&path, e))? {
            line.insert(0, b'\n');
        }

        if let Err(e) = write(&mut file, &line) {
            if let Err(trunc) = file.set_len(before) {
                tracing::error!(path = %path.display(), error = %trunc, "could not roll back partial row");
            }
            recovery::log_recovery(
                &self.datadir,
                RecoveryEntry {
                    timestamp: Utc::now(),
                    category: RecoveryCategory::Append,
                    description: format!("{} append failed", record.kind()),
                    fields: vec![
                        ("Project".to_string(), project.name.clone()),
                        ("Error".to_string(), e.to_string()),
                    ],
                    body: String::from_utf8_lossy(&line).trim_start().to_string(),
                },
            );
            return Err(StoreError::io(&path, e));
        }

        tracing::debug!(project = %project.name, kind = %record.kind(), "appended record");
        Ok(())
    }

    /// Append the rows of `src` to `dst` and remove `src`.
    ///
    /// Both projects must exist. The destination is rewritten atomically, so
    /// a failure leaves both files untouched.
    pub fn merge(&self, src: &Project, dst: &Project) -> Result<(), StoreError> {
        if src.name == dst.name {
            return Err(StoreError::SameProject(src.name.clone()));
        }
        self.require_exists(src)?;
        self.require_exists(dst)?;
        let _locks = self.lock_pair(src, dst)?;

        let src_path = src.file_path();
        let dst_path = dst.file_path();
        let src_bytes = fs::read(&src_path).map_err(|e| StoreError::io(&src_path, e))?;
        let mut merged = fs::read(&dst_path).map_err(|e| StoreError::io(&dst_path, e))?;
        if !merged.is_empty() && !merged.ends_with(b"\n") {
            merged.push(b'\n');
        }
        merged.extend_from_slice(&src_bytes);

        if let Err(e) = recovery::atomic_write(&dst_path, &merged) {
            recovery::log_recovery(
                &self.datadir,
                RecoveryEntry {
                    timestamp: Utc::now(),
                    category: RecoveryCategory::Merge,
                    description: format!("merge of {} into {} failed", src.name, dst.name),
                    fields: vec![("Error".to_string(), e.to_string())],
                    body: String::new(),
                },
            );
            return Err(StoreError::io(&dst_path, e));
        }

        fs::remove_file(&src_path).map_err(|e| StoreError::io(&src_path, e))?;
        tracing::info!(src = %src.name, dst = %dst.name, "merged projects");
        Ok(())
    }

    /// Rename a project file. The new name must not be taken.
    pub fn rename(&self, old: &Project, new: &Project) -> Result<(), StoreError> {
        self.require_exists(old)?;
        if self.exists(new) {
            return Err(StoreError::AlreadyExists(new.name.clone()));
        }
        let _locks = self.lock_pair(old, new)?;

        let old_path = old.file_path();
        fs::rename(&old_path, new.file_path()).map_err(|e| StoreError::io(&old_path, e))?;
        tracing::info!(old = %old.name, new = %new.name, "renamed project");
        Ok(())
    }

    /// Delete a project file
    pub fn remove(&self, project: &Project) -> Result<(), StoreError> {
        self.require_exists(project)?;
        let _lock = self.lock(project)?;

        let path = project.file_path();
        fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
        tracing::info!(project = %project.name, "removed project");
        Ok(())
    }

    fn lock(&self, project: &Project) -> Result<Option<ProjectLock>, StoreError> {
        if !self.lock_writes {
            return Ok(None);
        }
        Ok(Some(ProjectLock::acquire_default(&self.datadir, &project.name)?))
    }

    /// Locks two projects in name order.
    fn lock_pair(
        &self,
        a: &Project,
        b: &Project,
    ) -> Result<(Option<ProjectLock>, Option<ProjectLock>), StoreError> {
        let (first, second) = if a.name <= b.name { (a, b) } else { (b, a) };
        let first = self.lock(first)?;
        let second = self.lock(second)?;
        Ok((first, second))
    }
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn write_row(file: &mut File, line: &[u8]) -> io::Result<()> {
    file.write_all(line)?;
    file.sync_data()
}
