use std::collections::HashSet;

use tracing::{debug, warn};

use crate::io::fs::FileSystem;
use crate::model::{Location, ScanRules};
use crate::ops::cancel::CancellationToken;

/// Find the project a note belongs to by walking up from its folder.
///
/// The first ancestor that is either already a known project or holds a
/// project marker wins, so the nearest project always takes precedence.
/// Returns `None` when the filesystem root is passed without a match, when a
/// folder cannot be listed, or when `cancel` fires.
pub fn infer_project(
    fs: &dyn FileSystem,
    rules: &ScanRules,
    note: &Location,
    known_projects: &HashSet<Location>,
    cancel: &CancellationToken,
) -> Option<Location> {
    let mut current = note.parent()?;
    loop {
        if cancel.is_cancelled() {
            return None;
        }
        if known_projects.contains(&current) {
            return Some(current);
        }

        match fs.list_directory(current.as_path()) {
            Ok(entries) => {
                if entries.iter().any(|e| rules.is_project_marker(&e.name)) {
                    debug!(note = %note, project = %current, "inferred project from marker");
                    return Some(current);
                }
            }
            Err(e) => {
                warn!(folder = %current, error = %e, "could not list folder during project inference");
                return None;
            }
        }

        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fs::{DirEntry, FileStat, LocalFs};
    use crate::model::ScanConfig;
    use std::fs;
    use std::io;
    use std::path::Path;
    use tempfile::TempDir;

    fn rules() -> ScanRules {
        ScanRules::compile(&ScanConfig {
            project_marker_regex: r"^\.marker$".into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn setup() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("ws/other/deep")).unwrap();
        fs::create_dir_all(tmp.path().join("ws/sub/inner")).unwrap();
        fs::write(tmp.path().join("ws/.marker"), "").unwrap();
        fs::write(tmp.path().join("ws/sub/.marker"), "").unwrap();
        fs::write(tmp.path().join("ws/other/deep/note.txt"), "").unwrap();
        fs::write(tmp.path().join("ws/sub/inner/note.md"), "").unwrap();
        tmp
    }

    #[test]
    fn finds_nearest_marked_ancestor() {
        let tmp = setup();
        let note = Location::new(tmp.path().join("ws/other/deep/note.txt"));
        let found = infer_project(
            &LocalFs,
            &rules(),
            &note,
            &HashSet::new(),
            &CancellationToken::new(),
        );
        assert_eq!(found, Some(Location::new(tmp.path().join("ws"))));
    }

    #[test]
    fn closer_marker_wins() {
        let tmp = setup();
        let note = Location::new(tmp.path().join("ws/sub/inner/note.md"));
        let found = infer_project(
            &LocalFs,
            &rules(),
            &note,
            &HashSet::new(),
            &CancellationToken::new(),
        );
        assert_eq!(found, Some(Location::new(tmp.path().join("ws/sub"))));
    }

    #[test]
    fn known_project_short_circuits_listing() {
        let tmp = setup();
        let known: HashSet<Location> = [Location::new(tmp.path().join("ws/other"))].into();
        let note = Location::new(tmp.path().join("ws/other/deep/note.txt"));
        let found = infer_project(&LocalFs, &rules(), &note, &known, &CancellationToken::new());
        assert_eq!(found, Some(Location::new(tmp.path().join("ws/other"))));
    }

    #[test]
    fn no_marker_anywhere_gives_none() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        let note = Location::new(tmp.path().join("a/b/note.md"));
        let rules = ScanRules::compile(&ScanConfig {
            project_marker_regex: r"^\.never-present-marker-[0-9a-f]{32}$".into(),
            ..Default::default()
        })
        .unwrap();
        let found = infer_project(
            &LocalFs,
            &rules,
            &note,
            &HashSet::new(),
            &CancellationToken::new(),
        );
        assert_eq!(found, None);
    }

    #[test]
    fn cancelled_inference_gives_none() {
        let tmp = setup();
        let token = CancellationToken::new();
        token.cancel();
        let note = Location::new(tmp.path().join("ws/other/deep/note.txt"));
        assert_eq!(
            infer_project(&LocalFs, &rules(), &note, &HashSet::new(), &token),
            None
        );
    }

    /// Refuses to list one folder.
    struct FailingFs {
        broken: Location,
    }

    impl FileSystem for FailingFs {
        fn list_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
            if Location::new(path) == self.broken {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            LocalFs.list_directory(path)
        }
        fn stat(&self, path: &Path) -> io::Result<FileStat> {
            LocalFs.stat(path)
        }
        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            LocalFs.rename(from, to)
        }
        fn delete(&self, path: &Path) -> io::Result<()> {
            LocalFs.delete(path)
        }
        fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            LocalFs.create_dir_all(path)
        }
        fn create_file(&self, path: &Path) -> io::Result<()> {
            LocalFs.create_file(path)
        }
    }

    #[test]
    fn unlistable_ancestor_gives_none() {
        let tmp = setup();
        // The marker sits in ws/, above the folder that cannot be listed
        let fs = FailingFs {
            broken: Location::new(tmp.path().join("ws/other")),
        };
        let note = Location::new(tmp.path().join("ws/other/deep/note.txt"));
        let found = infer_project(&fs, &rules(), &note, &HashSet::new(), &CancellationToken::new());
        assert_eq!(found, None);
    }
}
