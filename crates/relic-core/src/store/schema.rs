//! Canonical SQLite schema for the relic store.
//!
//! - `submissions` is the append-only record of every accepted posting
//! - `items` keeps the merged canonical view keyed by slug
//! - `visibility_events` is the immutable moderation ledger
//! - `contributors` is the user/score table credited on first posts
//! - `store_meta` tracks the schema version for migrations

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    body TEXT NOT NULL CHECK (length(trim(body)) > 0),
    submitter TEXT,
    origin TEXT,
    item_slug TEXT,
    submitted_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
    slug TEXT PRIMARY KEY CHECK (length(slug) > 0),
    name TEXT NOT NULL,
    level INTEGER NOT NULL,
    category TEXT NOT NULL,
    slot TEXT,
    damage_type TEXT,
    avg_damage INTEGER,
    ac_apply INTEGER,
    ac_bonus INTEGER,
    damroll_bonus INTEGER,
    str_mod INTEGER,
    dex_mod INTEGER,
    con_mod INTEGER,
    mana_mod INTEGER,
    hp_mod INTEGER,
    hitroll_mod INTEGER,
    locations TEXT NOT NULL DEFAULT '[]',
    hidden INTEGER NOT NULL DEFAULT 0 CHECK (hidden IN (0, 1)),
    visible_after_us INTEGER,
    first_poster TEXT,
    search_text TEXT NOT NULL DEFAULT '',
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS visibility_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_slug TEXT NOT NULL CHECK (length(item_slug) > 0),
    action TEXT NOT NULL CHECK (action IN ('hide', 'restore')),
    actor TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS contributors (
    username TEXT PRIMARY KEY CHECK (length(trim(username)) > 0),
    character TEXT,
    score INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_submissions_slug
    ON submissions(item_slug);

CREATE INDEX IF NOT EXISTS idx_submissions_submitted
    ON submissions(submitted_at_us);

CREATE INDEX IF NOT EXISTS idx_visibility_events_slug_created
    ON visibility_events(item_slug, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_visibility_events_created
    ON visibility_events(created_at_us);

CREATE INDEX IF NOT EXISTS idx_items_hidden_level
    ON items(hidden, level);

CREATE INDEX IF NOT EXISTS idx_contributors_character
    ON contributors(character);
";
