use crate::io::database::Database;
use crate::model::{Note, Project};

/// A note with its project resolved.
#[derive(Debug, Clone, Copy)]
pub struct NoteView<'a> {
    pub note: &'a Note,
    pub project: Option<&'a Project>,
}

/// Every note with its project, in store order.
pub fn note_views(db: &Database) -> Vec<NoteView<'_>> {
    db.notes
        .get_all()
        .map(|note| NoteView {
            note,
            project: db.project_of(note),
        })
        .collect()
}

#[derive(Debug)]
pub struct ProjectGroup<'a> {
    pub project: &'a Project,
    pub notes: Vec<&'a Note>,
}

/// Notes grouped under their projects.
#[derive(Debug)]
pub struct NoteTree<'a> {
    pub projects: Vec<ProjectGroup<'a>>,
    /// Notes without a project, or whose project no longer exists
    pub unassigned: Vec<&'a Note>,
}

/// Projects sorted by display name (case-insensitively), notes by file name.
/// Empty projects are kept.
pub fn build_tree(db: &Database) -> NoteTree<'_> {
    let mut projects: Vec<ProjectGroup<'_>> = db
        .projects
        .get_all()
        .map(|project| ProjectGroup {
            project,
            notes: Vec::new(),
        })
        .collect();
    projects.sort_by_cached_key(|g| (g.project.display_name().to_lowercase(), g.project.id));

    let mut unassigned = Vec::new();
    for note in db.notes.get_all() {
        let group = note
            .project_id
            .and_then(|id| projects.iter_mut().find(|g| g.project.id == id));
        match group {
            Some(group) => group.notes.push(note),
            None => unassigned.push(note),
        }
    }

    let by_name = |a: &&Note, b: &&Note| {
        a.file_name()
            .to_lowercase()
            .cmp(&b.file_name().to_lowercase())
            .then(a.id.cmp(&b.id))
    };
    for group in &mut projects {
        group.notes.sort_by(by_name);
    }
    unassigned.sort_by(by_name);

    NoteTree {
        projects,
        unassigned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::kv::MemoryStore;
    use crate::model::Location;
    use std::sync::Arc;

    #[test]
    fn groups_and_sorts() {
        let mut db = Database::new(Arc::new(MemoryStore::new()));
        db.projects.add_or_update_all([
            Project {
                id: 1,
                location: Location::new("/zeta"),
                name: None,
            },
            Project {
                id: 2,
                location: Location::new("/x"),
                name: Some("alpha".into()),
            },
            Project {
                id: 3,
                location: Location::new("/empty"),
                name: None,
            },
        ]);
        db.notes.add_or_update_all([
            Note {
                id: 1,
                location: Location::new("/zeta/b.md"),
                project_id: Some(1),
            },
            Note {
                id: 2,
                location: Location::new("/zeta/A.md"),
                project_id: Some(1),
            },
            Note {
                id: 3,
                location: Location::new("/tmp/loose.md"),
                project_id: None,
            },
            Note {
                id: 4,
                location: Location::new("/gone/orphan.md"),
                project_id: Some(42),
            },
        ]);

        let tree = build_tree(&db);
        let names: Vec<String> = tree.projects.iter().map(|g| g.project.display_name()).collect();
        assert_eq!(names, vec!["alpha", "empty", "zeta"]);
        let zeta: Vec<&str> = tree.projects[2].notes.iter().map(|n| n.file_name()).collect();
        assert_eq!(zeta, vec!["A.md", "b.md"]);
        let loose: Vec<u64> = tree.unassigned.iter().map(|n| n.id).collect();
        assert_eq!(loose, vec![3, 4]);

        let views = note_views(&db);
        assert_eq!(views[0].project.map(|p| p.id), Some(1));
        assert!(views[3].project.is_none());
    }
}
