use serde::{Deserialize, Serialize};

use super::location::Location;

/// Store-assigned integer identity.
pub type EntityId = u64;

/// Anything kept in an [`EntityCollection`](crate::io::database::EntityCollection).
pub trait Entity: Clone {
    fn id(&self) -> EntityId;
}

/// A folder that groups notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: EntityId,
    pub location: Location,
    /// Overrides the name shown for the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Project {
    /// The display name, falling back to the folder name.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .location
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| self.location.to_string()),
        }
    }
}

/// A tracked note file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: EntityId,
    pub location: Location,
    /// Owning project, resolved through the store. May dangle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityId>,
}

impl Note {
    pub fn file_name(&self) -> &str {
        self.location.file_name().unwrap_or("")
    }
}

/// A location the user removed from tracking; scans and auto-import skip it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredNote {
    pub id: EntityId,
    pub location: Location,
}

impl Entity for Project {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl Entity for Note {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl Entity for IgnoredNote {
    fn id(&self) -> EntityId {
        self.id
    }
}
