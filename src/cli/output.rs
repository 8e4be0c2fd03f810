use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::format::ProjectSection;
use crate::model::project::Project;
use crate::model::record::{Note, Record, Timestamped, Todo, Track};
use crate::ops::search::SearchHit;
use crate::parse::timestamp::{DATE_FORMAT, format_timestamp};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NoteJson {
    pub project: String,
    pub timestamp: String,
    pub text: String,
}

#[derive(Serialize)]
pub struct TodoJson {
    pub project: String,
    pub timestamp: String,
    pub value: String,
    pub done: bool,
}

#[derive(Serialize)]
pub struct TrackJson {
    pub project: String,
    pub timestamp: String,
    pub value: String,
}

#[derive(Serialize)]
pub struct EntriesJson {
    pub project: String,
    pub todos: Vec<TodoJson>,
    pub notes: Vec<NoteJson>,
}

#[derive(Serialize)]
pub struct ProjectJson {
    pub name: String,
    pub path: String,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub project: String,
    pub timestamp: String,
    pub line: String,
}

/// Result of a write command
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WrittenJson {
    Note(NoteJson),
    Todo(TodoJson),
    Track(TrackJson),
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn note_to_json(note: &Note) -> NoteJson {
    NoteJson {
        project: note.project.clone(),
        timestamp: format_timestamp(&note.timestamp),
        text: note.text.clone(),
    }
}

pub fn todo_to_json(todo: &Todo) -> TodoJson {
    TodoJson {
        project: todo.project.clone(),
        timestamp: format_timestamp(&todo.timestamp),
        value: todo.value.clone(),
        done: todo.done,
    }
}

pub fn track_to_json(track: &Track) -> TrackJson {
    TrackJson {
        project: track.project.clone(),
        timestamp: format_timestamp(&track.timestamp),
        value: track.value.clone(),
    }
}

pub fn record_to_json(record: &Record) -> WrittenJson {
    match record {
        Record::Note(n) => WrittenJson::Note(note_to_json(n)),
        Record::Todo(t) => WrittenJson::Todo(todo_to_json(t)),
        Record::Track(t) => WrittenJson::Track(track_to_json(t)),
    }
}

pub fn project_to_json(project: &Project) -> ProjectJson {
    ProjectJson {
        name: project.name.clone(),
        path: project.file_path().display().to_string(),
    }
}

pub fn entries_to_json(section: &ProjectSection) -> EntriesJson {
    EntriesJson {
        project: section.project.clone(),
        todos: section.todos.iter().map(todo_to_json).collect(),
        notes: section.notes.iter().map(note_to_json).collect(),
    }
}

pub fn search_hit_to_json(hit: &SearchHit) -> SearchHitJson {
    SearchHitJson {
        project: hit.project.clone(),
        timestamp: format_timestamp(&hit.timestamp),
        line: hit.line.clone(),
    }
}

pub fn dates_to_json(dates: &BTreeSet<NaiveDate>) -> Vec<String> {
    dates
        .iter()
        .map(|d| d.format(DATE_FORMAT).to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One search hit: `[project] <timestamp> <line>`
pub fn format_search_hit(hit: &SearchHit) -> String {
    format!(
        "[{}] {} {}",
        hit.project,
        format_timestamp(&hit.timestamp),
        hit.line
    )
}

/// Confirmation line for a write: `<action> <project> <timestamp>`
pub fn format_written(record: &Record) -> String {
    format!(
        "{} {} {}",
        record.action(),
        record.project(),
        format_timestamp(&record.timestamp())
    )
}
