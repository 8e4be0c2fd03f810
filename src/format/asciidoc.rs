use std::collections::BTreeSet;
use std::io::{self, Write};

use chrono::NaiveDate;

use crate::model::record::{Note, Todo, Track};
use crate::parse::timestamp::{DATE_FORMAT, format_timestamp};

/// Document attributes written below every report title
pub const ASCIIDOC_SETTINGS: &str = "\
:toc: right
:toclevels: 2
:sectanchors:
:sectlink:
:icons: font
:linkattrs:
:numbered:
:idprefix:
:idseparator: -
:doctype: book
:source-highlighter: pygments
:listing-caption: Listing";

/// One project's records, already filtered and sorted for display
#[derive(Debug, Clone, Default)]
pub struct ProjectSection {
    pub project: String,
    pub notes: Vec<Note>,
    pub todos: Vec<Todo>,
    pub tracks: Vec<Track>,
}

fn write_header(w: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(w, "= {}", title)?;
    writeln!(w, "{}", ASCIIDOC_SETTINGS)?;
    writeln!(w)
}

fn write_project_title(w: &mut impl Write, project: &str, level: usize) -> io::Result<()> {
    writeln!(w, "{} {}", "=".repeat(level), project)?;
    writeln!(w)
}

fn write_note_items(w: &mut impl Write, notes: &[Note], level: usize) -> io::Result<()> {
    for note in notes {
        writeln!(w, "{} {}", "=".repeat(level), format_timestamp(&note.timestamp))?;
        // section titles inside the note nest below the note's own title
        let nested = "=".repeat(level);
        for line in note.text.trim_end().lines() {
            if line.starts_with('=') {
                writeln!(w, "{}{}", nested, line)?;
            } else {
                writeln!(w, "{}", line)?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

fn write_todo_items(w: &mut impl Write, todos: &[Todo]) -> io::Result<()> {
    for todo in todos {
        writeln!(w, "* {}", todo.value)?;
    }
    writeln!(w)
}

fn write_track_items(w: &mut impl Write, tracks: &[Track]) -> io::Result<()> {
    for track in tracks {
        let ts = format_timestamp(&track.timestamp);
        if track.value.is_empty() {
            writeln!(w, "* {}", ts)?;
        } else {
            writeln!(w, "* {} - {}", ts, track.value)?;
        }
    }
    writeln!(w)
}

/// Notes report. Projects without notes are skipped.
pub fn write_notes(w: &mut impl Write, sections: &[ProjectSection]) -> io::Result<()> {
    write_header(w, "Notes")?;
    for section in sections.iter().filter(|s| !s.notes.is_empty()) {
        write_project_title(w, &section.project, 2)?;
        write_note_items(w, &section.notes, 3)?;
    }
    Ok(())
}

/// Todos report. Projects without todos are skipped.
pub fn write_todos(w: &mut impl Write, sections: &[ProjectSection]) -> io::Result<()> {
    write_header(w, "Todos")?;
    for section in sections.iter().filter(|s| !s.todos.is_empty()) {
        write_project_title(w, &section.project, 2)?;
        write_todo_items(w, &section.todos)?;
    }
    Ok(())
}

/// Tracks report. Projects without tracks are skipped.
pub fn write_tracks(w: &mut impl Write, sections: &[ProjectSection]) -> io::Result<()> {
    write_header(w, "Tracks")?;
    for section in sections.iter().filter(|s| !s.tracks.is_empty()) {
        write_project_title(w, &section.project, 2)?;
        write_track_items(w, &section.tracks)?;
    }
    Ok(())
}

/// Combined report of todos and notes per project
pub fn write_entries(w: &mut impl Write, sections: &[ProjectSection]) -> io::Result<()> {
    write_header(w, "Entries")?;
    for section in sections {
        if section.notes.is_empty() && section.todos.is_empty() {
            continue;
        }
        write_project_title(w, &section.project, 2)?;
        if !section.todos.is_empty() {
            writeln!(w, "=== Todos")?;
            writeln!(w)?;
            write_todo_items(w, &section.todos)?;
        }
        if !section.notes.is_empty() {
            writeln!(w, "=== Notes")?;
            writeln!(w)?;
            write_note_items(w, &section.notes, 4)?;
        }
    }
    Ok(())
}

/// Bullet list of activity dates
pub fn write_dates(w: &mut impl Write, dates: &BTreeSet<NaiveDate>) -> io::Result<()> {
    write_header(w, "Dates")?;
    for date in dates {
        writeln!(w, "* {}", date.format(DATE_FORMAT))?;
    }
    Ok(())
}
