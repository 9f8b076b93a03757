use std::io;
use std::path::{Path, PathBuf};

use crate::io::database::Database;
use crate::io::fs::FileSystem;
use crate::model::{DraftConfig, Location, Note};
use crate::ops::ignore_ops;
use crate::ops::note_ops::{self, NoteOpError};

/// Where drafts are created: the configured folder, else `drafts/` under
/// the data directory.
pub fn draft_folder(config: &DraftConfig, data_dir: &Path) -> PathBuf {
    match config.folder.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(folder) => PathBuf::from(folder),
        None => data_dir.join("drafts"),
    }
}

/// Create an empty draft file in `folder` and start tracking it.
pub fn create_draft(
    db: &mut Database,
    fs: &dyn FileSystem,
    folder: &Path,
    name: &str,
) -> Result<Note, NoteOpError> {
    if name.trim().is_empty() || name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        return Err(NoteOpError::InvalidName(name.to_string()));
    }
    let location = Location::new(folder.join(name));
    let create_failed = |source: io::Error| NoteOpError::CreateFailed {
        location: location.clone(),
        source,
    };

    fs.create_dir_all(folder).map_err(create_failed)?;
    fs.create_file(location.as_path()).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            NoteOpError::TargetExists(location.clone())
        } else {
            create_failed(e)
        }
    })?;

    ignore_ops::unignore(db, &location);
    Ok(note_ops::new_note(db, location, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fs::LocalFs;
    use crate::io::kv::MemoryStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn folder_defaults_under_data_dir() {
        let data = Path::new("/data/notekeeper");
        assert_eq!(
            draft_folder(&DraftConfig::default(), data),
            PathBuf::from("/data/notekeeper/drafts")
        );
        let config = DraftConfig {
            folder: Some("/home/me/drafts".into()),
        };
        assert_eq!(draft_folder(&config, data), PathBuf::from("/home/me/drafts"));
    }

    #[test]
    fn create_draft_makes_folder_and_tracks_file() {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("drafts");
        let mut db = Database::new(Arc::new(MemoryStore::new()));

        let note = create_draft(&mut db, &LocalFs, &folder, "note-idea.md").unwrap();
        assert!(folder.join("note-idea.md").is_file());
        assert_eq!(note.project_id, None);
        assert_eq!(db.notes.len(), 1);
    }

    #[test]
    fn existing_draft_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("note-idea.md"), "keep me").unwrap();
        let mut db = Database::new(Arc::new(MemoryStore::new()));

        assert!(matches!(
            create_draft(&mut db, &LocalFs, tmp.path(), "note-idea.md"),
            Err(NoteOpError::TargetExists(_))
        ));
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("note-idea.md")).unwrap(),
            "keep me"
        );
        assert!(db.notes.is_empty());
    }
}
