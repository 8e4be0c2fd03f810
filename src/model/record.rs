use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};

/// Track value that marks the end of a tracked span.
pub const TRACK_STOP_MARKER: &str = "stop";

/// The kind of a record, as stored in the `type` column of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Note,
    Todo,
    Track,
}

impl RecordKind {
    /// The discriminator written to the second column
    pub fn tag(self) -> &'static str {
        match self {
            RecordKind::Note => "note",
            RecordKind::Todo => "todo",
            RecordKind::Track => "track",
        }
    }

    /// Number of CSV fields a row of this kind carries
    pub fn field_count(self) -> usize {
        match self {
            RecordKind::Note => 3,
            RecordKind::Todo => 4,
            RecordKind::Track => 3,
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "note" => Some(RecordKind::Note),
            "todo" => Some(RecordKind::Todo),
            "track" => Some(RecordKind::Track),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A `type` column that names no known record kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record type {0:?}")]
pub struct UnknownKind(pub String);

impl FromStr for RecordKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::from_tag(s).ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// A timestamped free-text entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub project: String,
    pub timestamp: DateTime<FixedOffset>,
    pub text: String,
}

/// A task description with a done flag. Later todos with the same value
/// supersede earlier ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    pub project: String,
    pub timestamp: DateTime<FixedOffset>,
    pub value: String,
    pub done: bool,
}

/// A time-tracking marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub project: String,
    pub timestamp: DateTime<FixedOffset>,
    pub value: String,
}

impl Track {
    /// False for a stop marker, true for every other track (including an
    /// empty annotation).
    pub fn is_active(&self) -> bool {
        !self.value.trim().eq_ignore_ascii_case(TRACK_STOP_MARKER)
    }
}

/// One row of a project file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Note(Note),
    Todo(Todo),
    Track(Track),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Note(_) => RecordKind::Note,
            Record::Todo(_) => RecordKind::Todo,
            Record::Track(_) => RecordKind::Track,
        }
    }

    pub fn project(&self) -> &str {
        match self {
            Record::Note(n) => &n.project,
            Record::Todo(t) => &t.project,
            Record::Track(t) => &t.project,
        }
    }

    /// The user-facing action that produced this record, used in commit
    /// messages (`note`, `todo`, `done`, `track`).
    pub fn action(&self) -> &'static str {
        match self {
            Record::Todo(t) if t.done => "done",
            other => other.kind().tag(),
        }
    }
}

/// Anything carrying a record timestamp
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<FixedOffset>;
}

impl Timestamped for Note {
    fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }
}

impl Timestamped for Todo {
    fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }
}

impl Timestamped for Track {
    fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }
}

impl Timestamped for Record {
    fn timestamp(&self) -> DateTime<FixedOffset> {
        match self {
            Record::Note(n) => n.timestamp,
            Record::Todo(t) => t.timestamp,
            Record::Track(t) => t.timestamp,
        }
    }
}

impl From<Note> for Record {
    fn from(note: Note) -> Self {
        Record::Note(note)
    }
}

impl From<Todo> for Record {
    fn from(todo: Todo) -> Self {
        Record::Todo(todo)
    }
}

impl From<Track> for Record {
    fn from(track: Track) -> Self {
        Record::Track(track)
    }
}
