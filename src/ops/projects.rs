use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::io::store::{Store, StoreError};
use crate::model::project::Project;
use crate::ops::filter;

/// Resolve the projects a read command works on.
///
/// With no names, every project in the store. Otherwise the named projects,
/// each of which must exist. With `include_subprojects`, named projects
/// without a file are dropped instead and every project whose name extends
/// a named one is added. The result is sorted by name without duplicates.
pub fn resolve_projects(
    store: &Store,
    names: &[String],
    include_subprojects: bool,
) -> Result<Vec<Project>, StoreError> {
    let named: Vec<Project> = if names.is_empty() {
        store.list_projects()?
    } else {
        names
            .iter()
            .map(|name| store.project(name))
            .collect::<Result<_, _>>()?
    };

    if !include_subprojects {
        for project in &named {
            store.require_exists(project)?;
        }
        return Ok(named);
    }

    let all = store.list_projects()?;
    let mut out: Vec<Project> = named.iter().filter(|p| !p.is_empty()).cloned().collect();
    for project in &named {
        out.extend(all.iter().filter(|sub| project.is_subproject(sub)).cloned());
    }

    filter::sort_projects_by_name(&mut out);
    out.dedup_by(|a, b| a.name == b.name);
    Ok(out)
}

/// Dates on which any of the projects has a note or an open todo within
/// `[start, end]`.
pub fn project_dates(
    store: &Store,
    projects: &[Project],
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Result<BTreeSet<NaiveDate>, StoreError> {
    let mut dates = BTreeSet::new();
    for project in projects {
        let notes = filter::filter_by_time_range(store.read_notes(project)?, start, end);
        let todos = filter::filter_by_time_range(
            filter::latest_undone_todos(store.read_todos(project)?),
            start,
            end,
        );
        dates.extend(filter::dates_with_activity(&notes));
        dates.extend(filter::dates_with_activity(&todos));
    }
    Ok(dates)
}

/// Whether a project's latest track marks it as active
pub fn project_is_active(store: &Store, project: &Project) -> Result<bool, StoreError> {
    Ok(filter::is_active(&store.read_tracks(project)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::{Note, Record, Todo, Track};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn seed(store: &Store, project: &str) {
        store
            .append(&Record::Note(Note {
                project: project.into(),
                timestamp: ts("2014-10-31T21:36:31+01:00"),
                text: "hello".into(),
            }))
            .unwrap();
    }

    fn names(projects: &[Project]) -> Vec<&str> {
        projects.iter().map(|p| p.name.as_str()).collect()
    }

    fn args(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_all_projects() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        for name in ["work", "home", "work.api"] {
            seed(&store, name);
        }
        let projects = resolve_projects(&store, &[], false).unwrap();
        assert_eq!(names(&projects), vec!["home", "work", "work.api"]);
    }

    #[test]
    fn test_resolve_named_projects_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        for name in ["alpha", "zeta"] {
            seed(&store, name);
        }
        let projects = resolve_projects(&store, &args(&["zeta", "alpha"]), false).unwrap();
        assert_eq!(names(&projects), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_resolve_named_project_must_exist() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        seed(&store, "work");
        assert!(matches!(
            resolve_projects(&store, &args(&["work", "wrok"]), false),
            Err(StoreError::NotFound(ref name)) if name == "wrok"
        ));
    }

    #[test]
    fn test_resolve_subprojects() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        for name in ["work.api", "work.web", "home"] {
            seed(&store, name);
        }
        // "work" itself has no file, so only its subprojects remain
        let projects =
            resolve_projects(&store, &args(&["work", "work.api"]), true).unwrap();
        assert_eq!(names(&projects), vec!["work.api", "work.web"]);
    }

    #[test]
    fn test_resolve_rejects_invalid_names() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        assert!(matches!(
            resolve_projects(&store, &args(&["../etc"]), false),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_project_dates() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let records = vec![
            Record::Note(Note {
                project: "a".into(),
                timestamp: ts("2014-10-31T10:00:00Z"),
                text: "n".into(),
            }),
            Record::Todo(Todo {
                project: "b".into(),
                timestamp: ts("2014-11-02T10:00:00Z"),
                value: "open".into(),
                done: false,
            }),
            Record::Todo(Todo {
                project: "b".into(),
                timestamp: ts("2014-11-03T10:00:00Z"),
                value: "closed".into(),
                done: true,
            }),
            Record::Note(Note {
                project: "b".into(),
                timestamp: ts("2014-12-01T10:00:00Z"),
                text: "late".into(),
            }),
        ];
        for record in &records {
            store.append(record).unwrap();
        }

        let projects = store.list_projects().unwrap();
        let dates: Vec<String> = project_dates(
            &store,
            &projects,
            ts("2014-10-01T00:00:00Z"),
            ts("2014-11-30T00:00:00Z"),
        )
        .unwrap()
        .iter()
        .map(|d| d.to_string())
        .collect();
        assert_eq!(dates, vec!["2014-10-31", "2014-11-02"]);
    }

    #[test]
    fn test_project_is_active() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let project = store.project("timed").unwrap();
        assert!(!project_is_active(&store, &project).unwrap());

        store
            .append(&Record::Track(Track {
                project: "timed".into(),
                timestamp: ts("2014-11-02T00:46:27Z"),
                value: "start".into(),
            }))
            .unwrap();
        assert!(project_is_active(&store, &project).unwrap());

        store
            .append(&Record::Track(Track {
                project: "timed".into(),
                timestamp: ts("2014-11-02T01:46:27Z"),
                value: "stop".into(),
            }))
            .unwrap();
        assert!(!project_is_active(&store, &project).unwrap());
    }
}
