//! Append-only visibility ledger with deterministic replay.
//!
//! Every hide/restore decision is an immutable [`VisibilityEvent`]. The
//! ordered event sequence for a slug is the source of truth for that item's
//! hidden flag; the flag on the canonical item row is a materialized cache
//! of "replay the full history". [`fold_visibility`] is the pure fold at the
//! center: storage is wired only at the edges (events in, flags out), which
//! keeps the replay unit-testable without a database.
//!
//! A moderation action that matches the current state is still appended —
//! the audit trail records the decision that was made, not just the ones
//! that changed anything — but the item row is only rewritten on a real
//! flip.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::model::ItemSlug;
use crate::store::{Store, StoreError};

/// The two moderation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityAction {
    Hide,
    Restore,
}

impl VisibilityAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hide => "hide",
            Self::Restore => "restore",
        }
    }

    /// The hidden flag this action drives the item towards.
    #[must_use]
    pub const fn hides(self) -> bool {
        matches!(self, Self::Hide)
    }
}

impl fmt::Display for VisibilityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction {
    pub raw: String,
}

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action '{}': expected hide or restore", self.raw)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for VisibilityAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hide" => Ok(Self::Hide),
            "restore" => Ok(Self::Restore),
            _ => Err(UnknownAction { raw: s.to_string() }),
        }
    }
}

/// One immutable moderation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityEvent {
    pub id: i64,
    pub slug: ItemSlug,
    pub action: VisibilityAction,
    pub actor: String,
    pub created_at_us: i64,
}

/// Fold an ordered event stream to per-slug hidden flags, last action wins.
///
/// The input must already be in chronological order; the fold is
/// order-sensitive by design and idempotent over repeated runs.
pub fn fold_visibility<'a, I>(events: I) -> BTreeMap<ItemSlug, bool>
where
    I: IntoIterator<Item = &'a VisibilityEvent>,
{
    let mut flags = BTreeMap::new();
    for event in events {
        flags.insert(event.slug.clone(), event.action.hides());
    }
    flags
}

/// Errors surfaced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemSlug),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Statistics from a full ledger replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Events read from the ledger.
    pub events: usize,
    /// Items whose hidden flag was written.
    pub flags_written: usize,
    /// Slugs with history but no surviving canonical item.
    pub missing_items: usize,
}

/// Storage-wired ledger operations.
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a moderation decision against an existing item.
    ///
    /// The event is appended unconditionally; the item's hidden flag is
    /// rewritten only when the action actually changes it.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ItemNotFound`] when no canonical item has this slug;
    /// store failures otherwise.
    pub fn apply(
        &self,
        slug: &ItemSlug,
        action: VisibilityAction,
        actor: &str,
    ) -> Result<VisibilityEvent, LedgerError> {
        let item = self
            .store
            .item(slug)?
            .ok_or_else(|| LedgerError::ItemNotFound(slug.clone()))?;

        let event = self
            .store
            .append_visibility_event(slug, action, actor, crate::time::now_us())?;

        if item.hidden == action.hides() {
            tracing::debug!(slug = %slug, action = %action, "no-op moderation action logged");
        } else {
            self.store.set_item_hidden(slug, action.hides())?;
            tracing::info!(slug = %slug, action = %action, actor, "visibility changed");
        }

        Ok(event)
    }

    /// Recompute every item's hidden flag from the full event history.
    ///
    /// Used after a bulk reparse wipes and rebuilds the canonical items:
    /// moderation decisions are restored by replay instead of being
    /// re-derived. Slugs whose item no longer exists (e.g. its only
    /// submissions now parse to a skip) are counted and ignored.
    ///
    /// # Errors
    ///
    /// Returns store failures; the replay itself cannot fail.
    pub fn replay_all(&self) -> Result<ReplayStats, StoreError> {
        let events = self.store.visibility_events_oldest_first()?;
        let flags = fold_visibility(&events);

        let mut stats = ReplayStats {
            events: events.len(),
            ..ReplayStats::default()
        };

        for (slug, hidden) in flags {
            if self.store.item(&slug)?.is_some() {
                self.store.set_item_hidden(&slug, hidden)?;
                stats.flags_written += 1;
            } else {
                tracing::warn!(slug = %slug, "visibility history references missing item");
                stats.missing_items += 1;
            }
        }

        tracing::info!(
            events = stats.events,
            flags_written = stats.flags_written,
            missing_items = stats.missing_items,
            "visibility ledger replayed"
        );
        Ok(stats)
    }

    /// The moderation history for one slug, most recent first.
    ///
    /// # Errors
    ///
    /// Returns store failures.
    pub fn history(&self, slug: &ItemSlug) -> Result<Vec<VisibilityEvent>, StoreError> {
        self.store.visibility_history(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::{VisibilityAction, VisibilityEvent, fold_visibility};
    use crate::model::ItemSlug;
    use std::str::FromStr;

    fn event(id: i64, slug: &str, action: VisibilityAction) -> VisibilityEvent {
        VisibilityEvent {
            id,
            slug: ItemSlug::new_unchecked(slug),
            action,
            actor: "mod".into(),
            created_at_us: id * 1_000_000,
        }
    }

    #[test]
    fn action_roundtrip_and_rejects_unknown() {
        assert_eq!(VisibilityAction::from_str("hide").expect("parse"), VisibilityAction::Hide);
        assert_eq!(
            VisibilityAction::from_str(" Restore ").expect("parse"),
            VisibilityAction::Restore
        );
        assert!(VisibilityAction::from_str("purge").is_err());
        assert_eq!(VisibilityAction::Hide.to_string(), "hide");
    }

    #[test]
    fn fold_last_action_wins() {
        let events = [
            event(1, "cursed-ring", VisibilityAction::Hide),
            event(2, "cursed-ring", VisibilityAction::Restore),
            event(3, "cursed-ring", VisibilityAction::Hide),
        ];
        let flags = fold_visibility(&events);
        assert_eq!(flags.get(&ItemSlug::new_unchecked("cursed-ring")), Some(&true));
    }

    #[test]
    fn fold_is_idempotent() {
        let events = [
            event(1, "cursed-ring", VisibilityAction::Hide),
            event(2, "rusty-dagger", VisibilityAction::Hide),
            event(3, "rusty-dagger", VisibilityAction::Restore),
        ];
        let once = fold_visibility(&events);
        let twice = fold_visibility(&events);
        assert_eq!(once, twice);
        assert_eq!(once.get(&ItemSlug::new_unchecked("rusty-dagger")), Some(&false));
    }

    #[test]
    fn fold_tracks_slugs_independently() {
        let events = [
            event(1, "a", VisibilityAction::Hide),
            event(2, "b", VisibilityAction::Restore),
        ];
        let flags = fold_visibility(&events);
        assert_eq!(flags.len(), 2);
        assert_eq!(flags.get(&ItemSlug::new_unchecked("a")), Some(&true));
        assert_eq!(flags.get(&ItemSlug::new_unchecked("b")), Some(&false));
    }

    #[test]
    fn fold_of_nothing_is_empty() {
        let events: Vec<VisibilityEvent> = vec![];
        assert!(fold_visibility(&events).is_empty());
    }

    #[test]
    fn duplicate_no_op_events_do_not_change_the_fold() {
        let events = [
            event(1, "a", VisibilityAction::Hide),
            event(2, "a", VisibilityAction::Hide),
            event(3, "a", VisibilityAction::Hide),
        ];
        assert_eq!(
            fold_visibility(&events).get(&ItemSlug::new_unchecked("a")),
            Some(&true)
        );
    }
}
