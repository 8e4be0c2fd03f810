use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::Serialize;

use crate::io::store::{Store, StoreError};
use crate::model::project::Project;
use crate::ops::filter;

/// A note line matching a search pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub project: String,
    pub timestamp: DateTime<FixedOffset>,
    pub line: String,
}

/// Search every line of every note in the given projects.
///
/// Hits are grouped by project (in the given order) and ordered by note
/// timestamp, then line, within a project.
pub fn search_notes(
    store: &Store,
    projects: &[Project],
    re: &Regex,
) -> Result<Vec<SearchHit>, StoreError> {
    let mut hits = Vec::new();
    for project in projects {
        let mut notes = store.read_notes(project)?;
        filter::sort_by_timestamp(&mut notes);
        for note in &notes {
            hits.extend(
                note.text
                    .lines()
                    .filter(|line| re.is_match(line))
                    .map(|line| SearchHit {
                        project: project.name.clone(),
                        timestamp: note.timestamp,
                        line: line.to_string(),
                    }),
            );
        }
    }
    Ok(hits)
}
