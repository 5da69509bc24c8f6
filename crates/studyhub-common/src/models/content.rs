//! Community content subtrees (messages, resources, announcements).
//!
//! Their CRUD lives outside the engine; the engine only needs to find what a user
//! authored and tear subtrees down during cascades.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Messages,
    Resources,
    Announcements,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [Self::Messages, Self::Resources, Self::Announcements];

    /// Name of the subcollection under `communities/{id}`.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Resources => "resources",
            Self::Announcements => "announcements",
        }
    }

    /// Field holding the author's user id.
    pub fn author_field(self) -> &'static str {
        match self {
            Self::Messages => "senderId",
            Self::Resources => "uploadedBy",
            Self::Announcements => "authorId",
        }
    }
}
