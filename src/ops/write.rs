use std::path::Path;

use chrono::{DateTime, FixedOffset};

use crate::io::hook::{CommitHook, HookError};
use crate::io::store::{Store, StoreError};
use crate::model::project::{ValidationError, validate_name};
use crate::model::record::{Note, Record, Timestamped, Todo, Track};
use crate::parse::timestamp::format_timestamp;

/// Error type for the write/commit pipeline
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The data operation succeeded; only the commit bookkeeping failed.
    /// `Pipeline::commit_all` stages the files again and commits them.
    #[error("data was saved but the commit step did not complete ({message}): {source}")]
    Hook { message: String, source: HookError },
}

impl WriteError {
    /// Only a failed commit step can be retried without risking a
    /// duplicate row.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WriteError::Hook { .. })
    }
}

/// What a write request records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Note,
    Todo,
    Done,
    Track,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Note => "note",
            Action::Todo => "todo",
            Action::Done => "done",
            Action::Track => "track",
        }
    }

    /// Tracks may carry an empty annotation
    fn requires_value(self) -> bool {
        !matches!(self, Action::Track)
    }
}

#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub project: String,
    pub action: Action,
    pub value: String,
    pub timestamp: DateTime<FixedOffset>,
}

impl WriteRequest {
    /// Check the request and build the record it describes. No I/O.
    pub fn validate(&self) -> Result<Record, ValidationError> {
        validate_name(&self.project)?;
        if self.action.requires_value() && self.value.trim().is_empty() {
            return Err(ValidationError::EmptyValue {
                action: self.action.name(),
            });
        }

        let project = self.project.clone();
        let timestamp = self.timestamp;
        let record = match self.action {
            Action::Note => Record::Note(Note {
                project,
                timestamp,
                text: self.value.clone(),
            }),
            Action::Todo | Action::Done => Record::Todo(Todo {
                project,
                timestamp,
                value: self.value.clone(),
                done: self.action == Action::Done,
            }),
            Action::Track => Record::Track(Track {
                project,
                timestamp,
                value: self.value.clone(),
            }),
        };
        Ok(record)
    }
}

/// Commit message for an appended record: `<project> - <action> - <timestamp>`
pub fn commit_message(record: &Record) -> String {
    format!(
        "{} - {} - {}",
        record.project(),
        record.action(),
        format_timestamp(&record.timestamp())
    )
}

/// Runs store mutations followed by the optional commit hook.
pub struct Pipeline<'a> {
    store: &'a Store,
    hook: Option<&'a dyn CommitHook>,
    auto_push: bool,
}

impl<'a> Pipeline<'a> {
    /// A pipeline without a hook only touches the data directory.
    pub fn new(store: &'a Store, hook: Option<&'a dyn CommitHook>) -> Self {
        Pipeline {
            store,
            hook,
            auto_push: false,
        }
    }

    /// Push after every successful commit
    pub fn with_auto_push(mut self, auto_push: bool) -> Self {
        self.auto_push = auto_push;
        self
    }

    /// Validate, append, then commit when a hook is configured.
    pub fn write(&self, request: &WriteRequest) -> Result<Record, WriteError> {
        let record = request.validate()?;
        self.store.append(&record)?;

        let project = self.store.project(record.project())?;
        let message = commit_message(&record);
        self.commit(&message, |hook| hook.add(Path::new(&project.file_name())))?;
        Ok(record)
    }

    /// Merge `src` into `dst`; both must exist.
    pub fn merge(&self, src: &str, dst: &str) -> Result<(), WriteError> {
        let src = self.store.project(src)?;
        let dst = self.store.project(dst)?;
        self.store.merge(&src, &dst)?;

        let message = format!("{} - merged - {}", src.name, dst.name);
        self.commit(&message, |hook| {
            hook.remove(Path::new(&src.file_name()))?;
            hook.add(Path::new(&dst.file_name()))
        })
    }

    /// Rename `old` to `new`; `new` must not exist yet.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), WriteError> {
        let old = self.store.project(old)?;
        let new = self.store.project(new)?;
        self.store.rename(&old, &new)?;

        let message = format!("{} - renamed - {}", old.name, new.name);
        self.commit(&message, |hook| {
            hook.rename(Path::new(&old.file_name()), Path::new(&new.file_name()))
        })
    }

    /// Delete a project file
    pub fn remove(&self, name: &str) -> Result<(), WriteError> {
        let project = self.store.project(name)?;
        self.store.remove(&project)?;

        let message = format!("{} - removed", project.name);
        self.commit(&message, |hook| {
            hook.remove(Path::new(&project.file_name()))
        })
    }

    /// Stage every project file, then commit. Picks up writes made
    /// without a hook and writes whose commit step failed.
    pub fn commit_all(&self, message: &str) -> Result<(), WriteError> {
        let projects = self.store.list_projects()?;
        self.commit(message, |hook| {
            projects
                .iter()
                .try_for_each(|p| hook.add(Path::new(&p.file_name())))
        })
    }

    /// Push without committing
    pub fn push(&self) -> Result<(), WriteError> {
        match self.hook {
            Some(hook) => hook.push().map_err(|source| WriteError::Hook {
                message: "push".to_string(),
                source,
            }),
            None => Ok(()),
        }
    }

    fn commit<F>(&self, message: &str, stage: F) -> Result<(), WriteError>
    where
        F: FnOnce(&dyn CommitHook) -> Result<(), HookError>,
    {
        let Some(hook) = self.hook else {
            return Ok(());
        };

        let result = stage(hook)
            .and_then(|()| hook.commit(message))
            .and_then(|()| if self.auto_push { hook.push() } else { Ok(()) });

        result.map_err(|source| {
            tracing::warn!(message, error = %source, "commit hook failed");
            WriteError::Hook {
                message: message.to_string(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Records every hook call; fails the commit when asked to.
    #[derive(Default)]
    struct RecordingHook {
        calls: RefCell<Vec<String>>,
        fail_commit: bool,
    }

    impl RecordingHook {
        fn failing() -> Self {
            RecordingHook {
                fail_commit: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CommitHook for RecordingHook {
        fn add(&self, file: &Path) -> Result<(), HookError> {
            self.calls.borrow_mut().push(format!("add {}", file.display()));
            Ok(())
        }

        fn commit(&self, message: &str) -> Result<(), HookError> {
            self.calls.borrow_mut().push(format!("commit {}", message));
            if self.fail_commit {
                return Err(HookError::Failed {
                    command: "git commit".into(),
                    status: "exit status: 1".into(),
                    output: "index.lock exists".into(),
                });
            }
            Ok(())
        }

        fn rename(&self, old: &Path, new: &Path) -> Result<(), HookError> {
            self.calls
                .borrow_mut()
                .push(format!("rename {} {}", old.display(), new.display()));
            Ok(())
        }

        fn remove(&self, file: &Path) -> Result<(), HookError> {
            self.calls.borrow_mut().push(format!("remove {}", file.display()));
            Ok(())
        }

        fn push(&self) -> Result<(), HookError> {
            self.calls.borrow_mut().push("push".to_string());
            Ok(())
        }
    }

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn request(project: &str, action: Action, value: &str) -> WriteRequest {
        WriteRequest {
            project: project.into(),
            action,
            value: value.into(),
            timestamp: ts("2014-10-31T21:36:31.49146148+01:00"),
        }
    }

    #[test]
    fn test_validation_happens_before_io() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path().join("data")).unwrap();
        let pipeline = Pipeline::new(&store, None);

        let err = pipeline.write(&request("", Action::Note, "x")).unwrap_err();
        assert!(matches!(err, WriteError::Validation(ValidationError::EmptyProjectName)));

        let err = pipeline.write(&request("p", Action::Todo, "  ")).unwrap_err();
        assert!(matches!(
            err,
            WriteError::Validation(ValidationError::EmptyValue { action: "todo" })
        ));
        assert!(!err.is_retryable());
        assert!(!tmp.path().join("data").exists());
    }

    #[test]
    fn test_whitespace_only_value_is_rejected() {
        for action in [Action::Note, Action::Todo, Action::Done] {
            let err = request("p", action, " \t\n").validate().unwrap_err();
            assert!(matches!(
                err,
                ValidationError::EmptyValue { action: name } if name == action.name()
            ));
        }
        assert!(request("p", Action::Track, " ").validate().is_ok());
        assert!(request("p", Action::Note, " x ").validate().is_ok());
    }

    #[test]
    fn test_track_allows_empty_value() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let record = Pipeline::new(&store, None)
            .write(&request("timed", Action::Track, ""))
            .unwrap();
        assert_eq!(record.action(), "track");
        let project = store.project("timed").unwrap();
        assert_eq!(store.read_tracks(&project).unwrap().len(), 1);
    }

    #[test]
    fn test_write_commits_with_message() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let hook = RecordingHook::default();
        let pipeline = Pipeline::new(&store, Some(&hook));

        pipeline.write(&request("X", Action::Done, "fix bug")).unwrap();

        assert_eq!(
            hook.calls(),
            vec![
                "add X.csv".to_string(),
                "commit X - done - 2014-10-31T21:36:31.49146148+01:00".to_string(),
            ]
        );
    }

    #[test]
    fn test_auto_push_follows_commit() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let hook = RecordingHook::default();
        let pipeline = Pipeline::new(&store, Some(&hook)).with_auto_push(true);

        pipeline.write(&request("X", Action::Note, "hello")).unwrap();
        assert_eq!(hook.calls().last().map(String::as_str), Some("push"));
    }

    #[test]
    fn test_hook_failure_keeps_data() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let hook = RecordingHook::failing();
        let pipeline = Pipeline::new(&store, Some(&hook));

        let err = pipeline.write(&request("X", Action::Note, "kept")).unwrap_err();
        assert!(err.is_retryable());
        match &err {
            WriteError::Hook { message, .. } => {
                assert_eq!(message, "X - note - 2014-10-31T21:36:31.49146148+01:00")
            }
            other => panic!("expected hook error, got {:?}", other),
        }

        let project = store.project("X").unwrap();
        assert_eq!(store.read_notes(&project).unwrap()[0].text, "kept");
    }

    #[test]
    fn test_commit_all_recovers_failed_commit() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let broken = RecordingHook::failing();
        let err = Pipeline::new(&store, Some(&broken))
            .write(&request("X", Action::Note, "kept"))
            .unwrap_err();
        assert!(err.is_retryable());

        let hook = RecordingHook::default();
        Pipeline::new(&store, Some(&hook))
            .commit_all("X - note - again")
            .unwrap();
        // the file is staged again, not just committed
        assert_eq!(
            hook.calls(),
            vec!["add X.csv".to_string(), "commit X - note - again".to_string()]
        );
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_commit_all_stages_every_project() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        Pipeline::new(&store, None)
            .write(&request("b", Action::Note, "x"))
            .unwrap();
        Pipeline::new(&store, None)
            .write(&request("a", Action::Todo, "y"))
            .unwrap();

        let hook = RecordingHook::default();
        Pipeline::new(&store, Some(&hook))
            .commit_all("catch up")
            .unwrap();
        assert_eq!(
            hook.calls(),
            vec![
                "add a.csv".to_string(),
                "add b.csv".to_string(),
                "commit catch up".to_string(),
            ]
        );
    }

    #[test]
    fn test_merge_rename_remove_notify_hook() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let quiet = Pipeline::new(&store, None);
        quiet.write(&request("A", Action::Note, "a")).unwrap();
        quiet.write(&request("B", Action::Note, "b")).unwrap();

        let hook = RecordingHook::default();
        let pipeline = Pipeline::new(&store, Some(&hook));
        pipeline.merge("A", "B").unwrap();
        pipeline.rename("B", "C").unwrap();
        pipeline.remove("C").unwrap();

        assert_eq!(
            hook.calls(),
            vec![
                "remove A.csv",
                "add B.csv",
                "commit A - merged - B",
                "rename B.csv C.csv",
                "commit B - renamed - C",
                "remove C.csv",
                "commit C - removed",
            ]
        );
        assert!(store.list_projects().unwrap().is_empty());
    }

    #[test]
    fn test_failed_store_step_skips_hook() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let hook = RecordingHook::default();
        let pipeline = Pipeline::new(&store, Some(&hook));

        let err = pipeline.rename("missing", "other").unwrap_err();
        assert!(matches!(err, WriteError::Store(StoreError::NotFound(_))));
        assert!(hook.calls().is_empty());
    }
}
