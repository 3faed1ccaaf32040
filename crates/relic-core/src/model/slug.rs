//! Canonical item identifiers.
//!
//! An [`ItemSlug`] is a pure function of the extracted item name: case-fold,
//! strip everything that is not alphanumeric/space/hyphen, collapse
//! whitespace runs to single hyphens, collapse repeated hyphens, and trim
//! edge hyphens. Two submissions whose names differ only by case,
//! punctuation, or whitespace therefore resolve to the same slug.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unique key of a canonical item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemSlug(String);

impl ItemSlug {
    /// Derive a slug from a display name. Returns `None` when the name
    /// slugifies to nothing (all punctuation, empty, etc.).
    #[must_use]
    pub fn derive(name: &str) -> Option<Self> {
        let slug = slugify(name);
        if slug.is_empty() { None } else { Some(Self(slug)) }
    }

    /// Wrap an already-derived slug string without re-normalizing.
    ///
    /// Intended for store reads, where the value was derived at write time.
    #[must_use]
    pub fn new_unchecked(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ItemSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a display name into slug form.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_hyphen = false;

    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
            prev_hyphen = false;
        } else if c.is_whitespace() || c == '-' {
            if !prev_hyphen && !out.is_empty() {
                out.push('-');
            }
            prev_hyphen = true;
        }
        // All other characters are stripped.
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}
