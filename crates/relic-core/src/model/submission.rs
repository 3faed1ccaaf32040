use serde::{Deserialize, Serialize};

use super::slug::ItemSlug;

/// Immutable record of one posting event.
///
/// Never mutated after insert, except to attach the canonical slug the
/// submission resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSubmission {
    pub id: i64,
    /// The raw identify text exactly as posted.
    pub body: String,
    pub submitter: Option<String>,
    /// Originating in-game location, when the poster supplied one.
    pub origin: Option<String>,
    /// The canonical item this submission resolved to, once known.
    pub item_slug: Option<ItemSlug>,
    pub submitted_at_us: i64,
}

/// Borrowed fields for inserting a new submission row.
#[derive(Debug, Clone, Copy)]
pub struct NewSubmission<'a> {
    pub body: &'a str,
    pub submitter: Option<&'a str>,
    pub origin: Option<&'a str>,
    pub submitted_at_us: i64,
}

/// A contributor row in the user/score table.
///
/// First-post credit matches on either the account name or the in-game
/// character name; no row is created when neither matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub username: String,
    pub character: Option<String>,
    pub score: i64,
}
