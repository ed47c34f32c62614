// 🏥 Organisation Unit - where tracked data is captured
//
// Read-only metadata. Loaded once into the snapshot and never mutated by the
// tracker pipeline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationUnit {
    /// Stable identifier (11 character DHIS2 uid)
    #[serde(rename = "id")]
    pub uid: String,

    pub name: String,

    /// Parent org unit uid (None for the hierarchy root)
    #[serde(default)]
    pub parent: Option<String>,
}

impl OrganisationUnit {
    pub fn new(uid: &str, name: &str) -> Self {
        OrganisationUnit {
            uid: uid.to_string(),
            name: name.to_string(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }
}
