//! Canonical upsert engine.
//!
//! Every parsed submission funnels through [`UpsertEngine::apply`], which
//! either creates the canonical item for a slug or merges the draft into the
//! existing row. Writes for the same slug are serialized through an
//! in-process keyed mutex; a create that loses a cross-process race (unique
//! slug violation) is retried as a merge, so the operation is idempotent by
//! slug in every interleaving.
//!
//! Merge rules, in one place:
//! - `slug`, `hidden`, `first_poster`, `visible_after_us`, and
//!   `created_at_us` are fixed at creation and never rewritten by merges
//! - `locations` is append-only distinct, in first-sighting order
//! - parsed scalar fields take the new draft's value when it has one and
//!   keep the stored value otherwise

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::model::{CanonicalItem, ItemSlug, default_hidden};
use crate::parse::ItemDraft;
use crate::store::{Store, StoreError};
use crate::time::{duration_us, now_us};

/// Default delay before a delayed submission's item becomes visible.
pub const DEFAULT_VISIBILITY_DELAY: Duration = Duration::from_secs(12 * 60 * 60);

/// Why a submission was deliberately not turned into a canonical item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Level-1 gear is starter noise, not catalog material.
    LevelOne,
    /// Corpses are transient world objects.
    Corpse,
    /// Keys are quest state, not equipment.
    Key,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LevelOne => "level-1 item",
            Self::Corpse => "corpse",
            Self::Key => "key",
        }
    }
}

/// What an upsert did with a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting; a new canonical item was created.
    Created(ItemSlug),
    /// The draft was merged into an existing canonical item.
    Updated(ItemSlug),
    /// The draft matched a skip rule; nothing was written.
    Skipped(SkipReason),
}

impl UpsertOutcome {
    /// The slug touched, when the outcome produced or updated an item.
    #[must_use]
    pub const fn slug(&self) -> Option<&ItemSlug> {
        match self {
            Self::Created(slug) | Self::Updated(slug) => Some(slug),
            Self::Skipped(_) => None,
        }
    }
}

/// Errors surfaced by the upsert engine.
#[derive(Debug, thiserror::Error)]
pub enum UpsertError {
    /// The draft carries no extractable item name, so no slug exists to
    /// upsert under.
    #[error("no item name could be extracted from the submission text")]
    NoItemName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-submission context the engine folds into the canonical row.
#[derive(Debug, Clone, Copy)]
pub struct UpsertContext<'a> {
    pub submission_id: i64,
    pub submitter: Option<&'a str>,
    pub origin: Option<&'a str>,
    /// Marked delayed by the poster: withhold from listings for the
    /// configured window.
    pub delayed: bool,
    /// Credit the submitter's contributor score on a first post. Bulk
    /// reparse passes `false` so scores are not double-counted.
    pub credit: bool,
}

/// In-process keyed mutex serializing writes per slug.
struct SlugLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SlugLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn for_slug(&self, slug: &ItemSlug) -> Arc<Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(
            map.entry(slug.as_str().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

/// The canonical upsert engine.
pub struct UpsertEngine {
    store: Arc<dyn Store>,
    locks: SlugLocks,
    visibility_delay: Duration,
}

impl UpsertEngine {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, visibility_delay: Duration) -> Self {
        Self {
            store,
            locks: SlugLocks::new(),
            visibility_delay,
        }
    }

    /// Apply one parsed draft to the canonical catalog.
    ///
    /// A draft with no derivable name is an error, checked before the skip
    /// rules so broken input is never reported as an intentional skip. On a
    /// create the submitter becomes the immutable first poster and, when
    /// [`UpsertContext::credit`] is set, earns a contributor point.
    ///
    /// # Errors
    ///
    /// [`UpsertError::NoItemName`] when the draft has no derivable slug;
    /// store failures otherwise.
    pub fn apply(
        &self,
        draft: &ItemDraft,
        ctx: &UpsertContext<'_>,
    ) -> Result<UpsertOutcome, UpsertError> {
        let slug = draft.slug().ok_or(UpsertError::NoItemName)?;

        if let Some(reason) = skip_reason(draft) {
            tracing::debug!(
                submission_id = ctx.submission_id,
                reason = reason.as_str(),
                "submission skipped"
            );
            return Ok(UpsertOutcome::Skipped(reason));
        }

        let guard = self.locks.for_slug(&slug);
        let _held = guard.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let outcome = match self.store.item(&slug)? {
            Some(existing) => self.merge(existing, draft, ctx)?,
            None => match self.create(&slug, draft, ctx) {
                Ok(outcome) => outcome,
                // Lost a cross-process create race: the slug now exists,
                // so fall back to a merge.
                Err(UpsertError::Store(StoreError::Conflict { .. })) => {
                    let existing = self.store.item(&slug)?.ok_or(StoreError::NotFound {
                        entity: "item",
                        key: slug.to_string(),
                    })?;
                    self.merge(existing, draft, ctx)?
                }
                Err(e) => return Err(e),
            },
        };

        self.store.link_submission(ctx.submission_id, &slug)?;
        Ok(outcome)
    }

    fn create(
        &self,
        slug: &ItemSlug,
        draft: &ItemDraft,
        ctx: &UpsertContext<'_>,
    ) -> Result<UpsertOutcome, UpsertError> {
        let now = now_us();
        let category = draft.category.clone().unwrap_or_default();

        let item = CanonicalItem {
            slug: slug.clone(),
            name: draft.name.clone().unwrap_or_default(),
            level: draft.level,
            category: category.clone(),
            slot: draft.slot.clone(),
            damage_type: draft.damage_type,
            avg_damage: draft.avg_damage,
            ac_apply: draft.ac_apply,
            ac_bonus: draft.ac_bonus,
            damroll_bonus: draft.damroll_bonus,
            stat_mods: draft.stat_mods,
            locations: ctx.origin.map(str::to_string).into_iter().collect(),
            hidden: default_hidden(&category),
            visible_after_us: ctx
                .delayed
                .then(|| now.saturating_add(duration_us(self.visibility_delay))),
            first_poster: ctx.submitter.map(str::to_string),
            search_text: draft.search_text.clone(),
            created_at_us: now,
            updated_at_us: now,
        };

        self.store.insert_item(&item)?;

        if ctx.credit {
            if let Some(submitter) = ctx.submitter {
                let credited = self.store.credit_contributor(submitter)?;
                if credited {
                    tracing::debug!(submitter, slug = %slug, "first-post credit awarded");
                }
            }
        }

        tracing::info!(slug = %slug, hidden = item.hidden, "canonical item created");
        Ok(UpsertOutcome::Created(slug.clone()))
    }

    fn merge(
        &self,
        mut item: CanonicalItem,
        draft: &ItemDraft,
        ctx: &UpsertContext<'_>,
    ) -> Result<UpsertOutcome, UpsertError> {
        if let Some(name) = &draft.name {
            item.name.clone_from(name);
        }
        if let Some(category) = &draft.category {
            item.category.clone_from(category);
        }
        item.level = draft.level;
        item.slot = draft.slot.clone().or(item.slot);
        item.damage_type = draft.damage_type.or(item.damage_type);
        item.avg_damage = draft.avg_damage.or(item.avg_damage);
        item.ac_apply = draft.ac_apply.or(item.ac_apply);
        item.ac_bonus = draft.ac_bonus.or(item.ac_bonus);
        item.damroll_bonus = draft.damroll_bonus.or(item.damroll_bonus);
        if !draft.stat_mods.is_empty() {
            item.stat_mods = draft.stat_mods;
        }
        if !draft.search_text.is_empty() {
            item.search_text.clone_from(&draft.search_text);
        }

        if let Some(origin) = ctx.origin {
            if item.observe_location(origin) {
                tracing::debug!(slug = %item.slug, origin, "new location observed");
            }
        }

        item.updated_at_us = now_us();
        self.store.update_item(&item)?;

        tracing::debug!(slug = %item.slug, "canonical item merged");
        Ok(UpsertOutcome::Updated(item.slug))
    }
}

/// First matching skip rule for a draft, if any.
#[must_use]
pub fn skip_reason(draft: &ItemDraft) -> Option<SkipReason> {
    if draft.level == 1 {
        return Some(SkipReason::LevelOne);
    }
    if let Some(category) = &draft.category {
        let lowered = category.to_ascii_lowercase();
        if lowered.contains("corpse") {
            return Some(SkipReason::Corpse);
        }
        if lowered.contains("key") {
            return Some(SkipReason::Key);
        }
    }
    None
}
