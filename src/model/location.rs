use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A canonical filesystem location for a note or project.
///
/// Locations are normalized lexically: redundant separators, `.` components
/// and trailing slashes are dropped, so two spellings of the same path compare
/// equal. The filesystem is never consulted, which keeps locations usable for
/// files that no longer exist. They serialize as plain path strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Location(PathBuf);

impl Location {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Location(normalize(path.as_ref()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Final path segment, if any (`None` for a filesystem root).
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|n| n.to_str())
    }

    /// The containing directory, or `None` once no ancestor segment remains.
    pub fn parent(&self) -> Option<Location> {
        self.0
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Location::new)
    }

    pub fn join(&self, name: &str) -> Location {
        Location(self.0.join(name))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

impl From<String> for Location {
    fn from(value: String) -> Self {
        Location::new(value)
    }
}

impl From<Location> for String {
    fn from(value: Location) -> Self {
        value.0.to_string_lossy().into_owned()
    }
}

impl From<&Path> for Location {
    fn from(value: &Path) -> Self {
        Location::new(value)
    }
}

impl From<PathBuf> for Location {
    fn from(value: PathBuf) -> Self {
        Location::new(value)
    }
}

impl AsRef<Path> for Location {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
