use csv::{StringRecord, Terminator, WriterBuilder};

use crate::model::record::{Note, Record, RecordKind, Todo, Track, UnknownKind};
use crate::parse::timestamp::{format_timestamp, parse_timestamp};

/// Error for a single row that can not be decoded. Readers skip such rows.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("expected {expected} fields for a {kind} row, found {found}")]
    FieldCount {
        kind: RecordKind,
        expected: usize,
        found: usize,
    },
    #[error("expected a {expected} row, found type {found:?}")]
    KindMismatch { expected: RecordKind, found: String },
    #[error(transparent)]
    UnknownKind(#[from] UnknownKind),
    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("invalid done flag {0:?}")]
    DoneFlag(String),
}

/// Encode a record as CSV fields: `[timestamp, type, ...fields]`.
pub fn encode(record: &Record) -> Vec<String> {
    match record {
        Record::Note(note) => vec![
            format_timestamp(&note.timestamp),
            RecordKind::Note.tag().to_string(),
            note.text.clone(),
        ],
        Record::Todo(todo) => vec![
            format_timestamp(&todo.timestamp),
            RecordKind::Todo.tag().to_string(),
            todo.value.clone(),
            todo.done.to_string(),
        ],
        Record::Track(track) => vec![
            format_timestamp(&track.timestamp),
            RecordKind::Track.tag().to_string(),
            track.value.clone(),
        ],
    }
}

/// Encode a record as one complete CSV line, terminator included.
pub fn encode_line(record: &Record) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(encode(record))?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Decode a row as a record of the given kind.
///
/// The field count must match the kind exactly and the discriminator column
/// must carry the kind's tag.
pub fn decode(project: &str, row: &StringRecord, kind: RecordKind) -> Result<Record, DecodeError> {
    if row.len() != kind.field_count() {
        return Err(DecodeError::FieldCount {
            kind,
            expected: kind.field_count(),
            found: row.len(),
        });
    }

    let tag = &row[1];
    if tag != kind.tag() {
        return Err(DecodeError::KindMismatch {
            expected: kind,
            found: tag.to_string(),
        });
    }

    let raw_ts = &row[0];
    let timestamp = parse_timestamp(raw_ts).map_err(|source| DecodeError::Timestamp {
        value: raw_ts.to_string(),
        source,
    })?;
    let project = project.to_string();

    let record = match kind {
        RecordKind::Note => Record::Note(Note {
            project,
            timestamp,
            text: row[2].to_string(),
        }),
        RecordKind::Todo => Record::Todo(Todo {
            project,
            timestamp,
            value: row[2].to_string(),
            done: parse_done(&row[3])?,
        }),
        RecordKind::Track => Record::Track(Track {
            project,
            timestamp,
            value: row[2].to_string(),
        }),
    };
    Ok(record)
}

/// Decode a row of any kind, dispatching on its discriminator column.
pub fn decode_any(project: &str, row: &StringRecord) -> Result<Record, DecodeError> {
    let tag = row.get(1).ok_or(DecodeError::FieldCount {
        kind: RecordKind::Note,
        expected: RecordKind::Note.field_count(),
        found: row.len(),
    })?;
    let kind: RecordKind = tag.parse()?;
    decode(project, row, kind)
}

/// Accepts the same spellings as the flags written by older versions of the
/// tool.
fn parse_done(value: &str) -> Result<bool, DecodeError> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(DecodeError::DoneFlag(other.to_string())),
    }
}
