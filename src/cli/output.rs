use serde::Serialize;

use crate::model::{Note, Project};
use crate::ops::tree::{NoteTree, NoteView};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ProjectJson {
    pub id: u64,
    pub name: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<usize>,
}

#[derive(Serialize)]
pub struct NoteJson {
    pub id: u64,
    pub name: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

#[derive(Serialize)]
pub struct ProjectGroupJson {
    #[serde(flatten)]
    pub project: ProjectJson,
    pub note_list: Vec<NoteJson>,
}

#[derive(Serialize)]
pub struct TreeJson {
    pub projects: Vec<ProjectGroupJson>,
    pub unassigned: Vec<NoteJson>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn project_to_json(project: &Project, notes: Option<usize>) -> ProjectJson {
    ProjectJson {
        id: project.id,
        name: project.display_name(),
        location: project.location.to_string(),
        notes,
    }
}

pub fn note_to_json(note: &Note, project: Option<&Project>) -> NoteJson {
    NoteJson {
        id: note.id,
        name: note.file_name().to_string(),
        location: note.location.to_string(),
        project_id: note.project_id,
        project: project.map(|p| p.display_name()),
    }
}

pub fn view_to_json(view: &NoteView<'_>) -> NoteJson {
    note_to_json(view.note, view.project)
}

pub fn tree_to_json(tree: &NoteTree<'_>) -> TreeJson {
    TreeJson {
        projects: tree
            .projects
            .iter()
            .map(|group| ProjectGroupJson {
                project: project_to_json(group.project, Some(group.notes.len())),
                note_list: group
                    .notes
                    .iter()
                    .map(|n| note_to_json(n, Some(group.project)))
                    .collect(),
            })
            .collect(),
        unassigned: tree
            .unassigned
            .iter()
            .map(|n| note_to_json(n, None))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// `#<id> <file name>  <location>`
pub fn format_note_line(note: &Note) -> String {
    format!("#{} {}  {}", note.id, note.file_name(), note.location)
}

pub fn format_project_line(project: &Project) -> String {
    format!("#{} {}  {}", project.id, project.display_name(), project.location)
}

/// The project tree, one project header per group with its notes indented.
pub fn format_tree(tree: &NoteTree<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    for group in &tree.projects {
        lines.push(format!(
            "== {} (#{}) ==",
            group.project.display_name(),
            group.project.id
        ));
        for note in &group.notes {
            lines.push(format!("  #{} {}", note.id, note.file_name()));
        }
    }
    if !tree.unassigned.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("-- No project --".to_string());
        for note in &tree.unassigned {
            lines.push(format!("  #{} {}", note.id, note.file_name()));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::database::Database;
    use crate::io::kv::MemoryStore;
    use crate::model::Location;
    use crate::ops::tree::build_tree;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn tree_lists_projects_then_loose_notes() {
        let mut db = Database::new(Arc::new(MemoryStore::new()));
        db.projects.add_or_update(Project {
            id: 1,
            location: Location::new("/ws"),
            name: None,
        });
        db.notes.add_or_update_all([
            Note {
                id: 1,
                location: Location::new("/ws/note-todo.md"),
                project_id: Some(1),
            },
            Note {
                id: 2,
                location: Location::new("/tmp/note-x.md"),
                project_id: None,
            },
        ]);

        let tree = build_tree(&db);
        assert_eq!(
            format_tree(&tree),
            vec![
                "== ws (#1) ==",
                "  #1 note-todo.md",
                "",
                "-- No project --",
                "  #2 note-x.md",
            ]
        );

        let json = serde_json::to_value(tree_to_json(&tree)).unwrap();
        assert_eq!(json["projects"][0]["notes"], 1);
        assert_eq!(json["projects"][0]["note_list"][0]["project"], "ws");
        assert_eq!(json["unassigned"][0]["id"], 2);
    }
}
