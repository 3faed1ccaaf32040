//! Domain model: canonical items, raw submissions, contributors, and the
//! slug identifier that keys everything.

pub mod item;
pub mod slug;
pub mod submission;

pub use item::{CONSUMABLE_CATEGORIES, CanonicalItem, DamageType, StatMods, default_hidden};
pub use slug::{ItemSlug, slugify};
pub use submission::{Contributor, NewSubmission, RawSubmission};
