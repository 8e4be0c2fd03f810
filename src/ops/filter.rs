use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;

use crate::model::project::Project;
use crate::model::record::{Note, Timestamped, Todo, Track};

/// Keep records with `start <= timestamp <= end`.
pub fn filter_by_time_range<T: Timestamped>(
    records: impl IntoIterator<Item = T>,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Vec<T> {
    records
        .into_iter()
        .filter(|r| {
            let ts = r.timestamp();
            start <= ts && ts <= end
        })
        .collect()
}

/// Stable sort by timestamp; equal timestamps keep their input order.
pub fn sort_by_timestamp<T: Timestamped>(records: &mut [T]) {
    records.sort_by_key(|r| r.timestamp());
}

/// Stable sort of todos by value.
pub fn sort_todos_by_value(todos: &mut [Todo]) {
    todos.sort_by(|a, b| a.value.cmp(&b.value));
}

/// Stable sort of projects by name.
pub fn sort_projects_by_name(projects: &mut [Project]) {
    projects.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Reduce a todo history to the most recent record per value.
///
/// Ties on timestamp go to the record that comes later in the input. The
/// result is ordered by timestamp, then by input order.
pub fn latest_todos(todos: impl IntoIterator<Item = Todo>) -> Vec<Todo> {
    let mut ordered: Vec<(usize, Todo)> = todos.into_iter().enumerate().collect();
    ordered.sort_by_key(|(_, todo)| todo.timestamp);

    let mut latest: IndexMap<String, (usize, Todo)> = IndexMap::new();
    for (rank, (_, todo)) in ordered.into_iter().enumerate() {
        latest.insert(todo.value.clone(), (rank, todo));
    }

    let mut out: Vec<(usize, Todo)> = latest.into_values().collect();
    out.sort_by_key(|(rank, _)| *rank);
    out.into_iter().map(|(_, todo)| todo).collect()
}

/// Drop todos marked done.
pub fn undone(todos: impl IntoIterator<Item = Todo>) -> Vec<Todo> {
    todos.into_iter().filter(|t| !t.done).collect()
}

/// The todos whose most recent record is not done.
pub fn latest_undone_todos(todos: impl IntoIterator<Item = Todo>) -> Vec<Todo> {
    undone(latest_todos(todos))
}

/// The todos open during `start..=end`: records outside the window are
/// dropped before the history is reduced, so a todo finished after `end`
/// still shows.
pub fn open_todos_in_range(
    todos: impl IntoIterator<Item = Todo>,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Vec<Todo> {
    latest_undone_todos(filter_by_time_range(todos, start, end))
}

/// Calendar dates (in each record's own offset) with at least one record.
pub fn dates_with_activity<'a, T: Timestamped + 'a>(
    records: impl IntoIterator<Item = &'a T>,
) -> BTreeSet<NaiveDate> {
    records
        .into_iter()
        .map(|r| r.timestamp().date_naive())
        .collect()
}

/// Drop notes with empty or whitespace-only text.
pub fn non_empty_notes(notes: impl IntoIterator<Item = Note>) -> Vec<Note> {
    notes
        .into_iter()
        .filter(|n| !n.text.trim().is_empty())
        .collect()
}

/// Whether the most recent track marks the project as active. A project
/// without tracks is inactive.
pub fn is_active(tracks: &[Track]) -> bool {
    // max_by_key returns the last maximum, so later rows win ties
    tracks
        .iter()
        .max_by_key(|t| t.timestamp)
        .is_some_and(Track::is_active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn todo(at: &str, value: &str, done: bool) -> Todo {
        Todo {
            project: "X".into(),
            timestamp: ts(at),
            value: value.into(),
            done,
        }
    }

    fn note(at: &str, text: &str) -> Note {
        Note {
            project: "Y".into(),
            timestamp: ts(at),
            text: text.into(),
        }
    }

    fn track(at: &str, value: &str) -> Track {
        Track {
            project: "Z".into(),
            timestamp: ts(at),
            value: value.into(),
        }
    }

    fn values(todos: &[Todo]) -> Vec<&str> {
        todos.iter().map(|t| t.value.as_str()).collect()
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let at = ts("2014-10-31T21:36:31.5+01:00");
        let notes = vec![note("2014-10-31T21:36:31.5+01:00", "only")];

        assert_eq!(filter_by_time_range(notes.clone(), at, at).len(), 1);

        let one_ns = Duration::nanoseconds(1);
        assert!(filter_by_time_range(notes.clone(), at + one_ns, at + one_ns * 10).is_empty());
        assert!(filter_by_time_range(notes, at - one_ns * 10, at - one_ns).is_empty());
    }

    #[test]
    fn test_time_range_compares_instants_across_offsets() {
        let notes = vec![note("2014-10-31T23:00:00+02:00", "a")];
        let start = ts("2014-10-31T21:00:00Z");
        let end = ts("2014-10-31T21:00:00Z");
        assert_eq!(filter_by_time_range(notes, start, end).len(), 1);
    }

    #[test]
    fn test_done_supersedes_earlier_todo() {
        let todos = vec![
            todo("2014-10-31T10:00:00Z", "fix bug", false),
            todo("2014-10-31T11:00:00Z", "fix bug", true),
        ];
        assert!(latest_undone_todos(todos).is_empty());
    }

    #[test]
    fn test_reopened_todo_is_undone() {
        let todos = vec![
            todo("2014-10-31T10:00:00Z", "fix bug", false),
            todo("2014-10-31T11:00:00Z", "fix bug", true),
            todo("2014-10-31T12:00:00Z", "fix bug", false),
            todo("2014-10-31T09:00:00Z", "write docs", false),
        ];
        let out = latest_undone_todos(todos);
        assert_eq!(values(&out), vec!["write docs", "fix bug"]);
        assert_eq!(out[1].timestamp, ts("2014-10-31T12:00:00Z"));
    }

    #[test]
    fn test_latest_uses_timestamp_not_file_order() {
        let todos = vec![
            todo("2014-10-31T11:00:00Z", "fix bug", true),
            todo("2014-10-31T10:00:00Z", "fix bug", false),
        ];
        assert!(latest_undone_todos(todos).is_empty());
    }

    #[test]
    fn test_equal_timestamps_later_input_wins() {
        let todos = vec![
            todo("2014-10-31T10:00:00Z", "fix bug", false),
            todo("2014-10-31T10:00:00Z", "fix bug", true),
        ];
        assert!(latest_undone_todos(todos).is_empty());

        let todos = vec![
            todo("2014-10-31T10:00:00Z", "fix bug", true),
            todo("2014-10-31T10:00:00Z", "fix bug", false),
        ];
        assert_eq!(latest_undone_todos(todos).len(), 1);
    }

    #[test]
    fn test_latest_undone_is_idempotent() {
        let todos = vec![
            todo("2014-10-31T12:00:00Z", "c", false),
            todo("2014-10-31T10:00:00Z", "a", false),
            todo("2014-10-31T10:00:00Z", "b", false),
            todo("2014-10-31T11:00:00Z", "a", false),
            todo("2014-10-31T09:00:00Z", "d", false),
            todo("2014-10-31T13:00:00Z", "d", true),
        ];
        let once = latest_undone_todos(todos);
        let twice = latest_undone_todos(once.clone());
        assert_eq!(twice, once);
        assert_eq!(values(&once), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_todo_done_after_window_is_open_in_it() {
        let todos = vec![
            todo("2014-10-31T10:00:00Z", "fix bug", false),
            todo("2014-11-05T10:00:00Z", "fix bug", true),
            todo("2014-11-06T10:00:00Z", "later", false),
        ];
        let start = ts("2014-10-30T00:00:00Z");
        let end = ts("2014-11-01T00:00:00Z");
        let open = open_todos_in_range(todos.clone(), start, end);
        assert_eq!(values(&open), vec!["fix bug"]);

        let whole = ts("2014-12-01T00:00:00Z");
        let open = open_todos_in_range(todos, start, whole);
        assert_eq!(values(&open), vec!["later"]);
    }

    #[test]
    fn test_latest_todos_keeps_done() {
        let todos = vec![
            todo("2014-10-31T10:00:00Z", "a", false),
            todo("2014-10-31T11:00:00Z", "a", true),
        ];
        let latest = latest_todos(todos);
        assert_eq!(latest.len(), 1);
        assert!(latest[0].done);
        assert!(undone(latest).is_empty());
    }

    #[test]
    fn test_sort_todos_by_value_is_stable() {
        let mut todos = vec![
            todo("2014-10-31T12:00:00Z", "b", false),
            todo("2014-10-31T10:00:00Z", "a", false),
            todo("2014-10-31T11:00:00Z", "a", true),
        ];
        sort_todos_by_value(&mut todos);
        assert_eq!(values(&todos), vec!["a", "a", "b"]);
        assert!(!todos[0].done);
        assert!(todos[1].done);
    }

    #[test]
    fn test_sort_by_timestamp_is_stable() {
        let mut notes = vec![
            note("2014-10-31T10:00:00Z", "second"),
            note("2014-10-31T09:00:00Z", "first"),
            note("2014-10-31T10:00:00Z", "third"),
        ];
        sort_by_timestamp(&mut notes);
        let texts: Vec<&str> = notes.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_dates_with_activity() {
        let notes = vec![
            note("2014-10-31T21:36:31+01:00", "a"),
            note("2014-10-31T23:59:59+01:00", "b"),
            note("2014-11-02T00:10:00+01:00", "c"),
        ];
        let dates: Vec<String> = dates_with_activity(&notes)
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(dates, vec!["2014-10-31", "2014-11-02"]);
    }

    #[test]
    fn test_non_empty_notes() {
        let notes = vec![
            note("2014-10-31T10:00:00Z", ""),
            note("2014-10-31T10:00:01Z", "  \n\t"),
            note("2014-10-31T10:00:02Z", "kept"),
        ];
        let kept = non_empty_notes(notes);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "kept");
    }

    #[test]
    fn test_is_active() {
        assert!(!is_active(&[]));
        assert!(is_active(&[track("2014-10-31T10:00:00Z", "")]));
        assert!(!is_active(&[
            track("2014-10-31T10:00:00Z", "coding"),
            track("2014-10-31T11:00:00Z", "stop"),
        ]));
        assert!(is_active(&[
            track("2014-10-31T11:00:00Z", "stop"),
            track("2014-10-31T10:00:00Z", "coding"),
            track("2014-10-31T11:00:00Z", "review"),
        ]));
    }
}
