// Domain model for comments attached to external entities (posts and games)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on comment body length, in characters.
pub const MAX_COMMENT_TEXT_LEN: usize = 10_000;

/// Kind of external resource a comment thread is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Post,
    Game,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Post => "post",
            EntityType::Game => "game",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(EntityType::Post),
            "game" => Ok(EntityType::Game),
            other => Err(format!("unknown entity type: {}", other)),
        }
    }
}

/// A user's reaction to a single comment. Absence of a reaction row means
/// "no reaction"; there is no neutral variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            other => Err(format!("unknown reaction: {}", other)),
        }
    }
}

/// A stored comment. The author fields are a snapshot taken at creation time
/// and are never synced with later profile edits. `rating` and `is_positive`
/// are derived from the reaction rows and only written by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub entity_id: i64,
    pub entity_type: EntityType,
    pub author_id: i64,
    pub author_username: String,
    pub author_avatar: Option<String>,
    pub text: String,
    /// `None` marks a root comment. A reply always carries its parent's
    /// entity binding, resolved at the request boundary.
    pub parent_id: Option<i64>,
    pub rating: i64,
    pub is_positive: bool,
    pub time_created: i64,
    pub time_updated: i64,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
