//! SQLite implementation of the [`Store`] repository contract.

use rusqlite::{Connection, OptionalExtension, params, types::Type};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{Store, StoreError, schema};
use crate::ledger::{VisibilityAction, VisibilityEvent};
use crate::model::{
    CanonicalItem, Contributor, DamageType, ItemSlug, NewSubmission, RawSubmission, StatMods,
};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Latest schema version written by [`migrate`].
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// Durable store backed by a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database, apply runtime pragmas, and migrate
    /// the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if opening/configuring/migrating fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create store directory: {e}")))?;
        }

        let mut conn = Connection::open(path)?;
        configure_connection(&conn)?;
        migrate(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store. Intended for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if configuring/migrating fails.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        migrate(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".into()))
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Apply pending schema migrations.
///
/// # Errors
///
/// Returns an error when a migration statement fails.
pub fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    conn.execute_batch(schema::MIGRATION_V1_SQL)?;

    if current_schema_version(conn)? < 2 {
        conn.execute_batch(schema::MIGRATION_V2_SQL)?;
        conn.execute("UPDATE store_meta SET schema_version = 2 WHERE id = 1", [])?;
    }
    Ok(())
}

/// Read the schema version recorded in `store_meta`.
///
/// # Errors
///
/// Returns an error when the meta table cannot be read.
pub fn current_schema_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: u32 =
        conn.query_row("SELECT schema_version FROM store_meta WHERE id = 1", [], |row| {
            row.get(0)
        })?;
    Ok(version)
}

const ITEM_COLUMNS: &str = "slug, name, level, category, slot, damage_type, avg_damage, \
     ac_apply, ac_bonus, damroll_bonus, str_mod, dex_mod, con_mod, mana_mod, hp_mod, \
     hitroll_mod, locations, hidden, visible_after_us, first_poster, search_text, \
     created_at_us, updated_at_us";

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CanonicalItem> {
    let damage_type: Option<String> = row.get(5)?;
    let damage_type = damage_type
        .map(|raw| {
            DamageType::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
            })
        })
        .transpose()?;

    let locations_json: String = row.get(16)?;
    let locations: Vec<String> = serde_json::from_str(&locations_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(16, Type::Text, Box::new(e)))?;

    Ok(CanonicalItem {
        slug: ItemSlug::new_unchecked(row.get::<_, String>(0)?),
        name: row.get(1)?,
        level: row.get(2)?,
        category: row.get(3)?,
        slot: row.get(4)?,
        damage_type,
        avg_damage: row.get(6)?,
        ac_apply: row.get(7)?,
        ac_bonus: row.get(8)?,
        damroll_bonus: row.get(9)?,
        stat_mods: StatMods {
            strength: row.get(10)?,
            dexterity: row.get(11)?,
            constitution: row.get(12)?,
            mana: row.get(13)?,
            health: row.get(14)?,
            hit_roll: row.get(15)?,
        },
        locations,
        hidden: row.get(17)?,
        visible_after_us: row.get(18)?,
        first_poster: row.get(19)?,
        search_text: row.get(20)?,
        created_at_us: row.get(21)?,
        updated_at_us: row.get(22)?,
    })
}

fn submission_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubmission> {
    let item_slug: Option<String> = row.get(4)?;
    Ok(RawSubmission {
        id: row.get(0)?,
        body: row.get(1)?,
        submitter: row.get(2)?,
        origin: row.get(3)?,
        item_slug: item_slug.map(ItemSlug::new_unchecked),
        submitted_at_us: row.get(5)?,
    })
}

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VisibilityEvent> {
    let action: String = row.get(2)?;
    let action = VisibilityAction::from_str(&action)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(VisibilityEvent {
        id: row.get(0)?,
        slug: ItemSlug::new_unchecked(row.get::<_, String>(1)?),
        action,
        actor: row.get(3)?,
        created_at_us: row.get(4)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Store for SqliteStore {
    fn insert_submission(&self, submission: &NewSubmission<'_>) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO submissions (body, submitter, origin, submitted_at_us)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                submission.body,
                submission.submitter,
                submission.origin,
                submission.submitted_at_us
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn submission(&self, id: i64) -> Result<Option<RawSubmission>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, body, submitter, origin, item_slug, submitted_at_us
                 FROM submissions WHERE id = ?1",
                params![id],
                submission_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn link_submission(&self, id: i64, slug: &ItemSlug) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE submissions SET item_slug = ?1 WHERE id = ?2",
            params![slug.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "submission",
                key: id.to_string(),
            });
        }
        Ok(())
    }

    fn clear_submission_links(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE submissions SET item_slug = NULL WHERE item_slug IS NOT NULL",
            [],
        )?;
        Ok(changed)
    }

    fn submissions_oldest_first(&self) -> Result<Vec<RawSubmission>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, body, submitter, origin, item_slug, submitted_at_us
             FROM submissions ORDER BY submitted_at_us ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([], submission_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn item(&self, slug: &ItemSlug) -> Result<Option<CanonicalItem>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE slug = ?1"),
                params![slug.as_str()],
                item_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn insert_item(&self, item: &CanonicalItem) -> Result<(), StoreError> {
        let locations = serde_json::to_string(&item.locations)
            .map_err(|e| StoreError::Backend(format!("encode locations: {e}")))?;

        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO items (slug, name, level, category, slot, damage_type, avg_damage,
                 ac_apply, ac_bonus, damroll_bonus, str_mod, dex_mod, con_mod, mana_mod,
                 hp_mod, hitroll_mod, locations, hidden, visible_after_us, first_poster,
                 search_text, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
            params![
                item.slug.as_str(),
                item.name,
                item.level,
                item.category,
                item.slot,
                item.damage_type.map(DamageType::as_str),
                item.avg_damage,
                item.ac_apply,
                item.ac_bonus,
                item.damroll_bonus,
                item.stat_mods.strength,
                item.stat_mods.dexterity,
                item.stat_mods.constitution,
                item.stat_mods.mana,
                item.stat_mods.health,
                item.stat_mods.hit_roll,
                locations,
                item.hidden,
                item.visible_after_us,
                item.first_poster,
                item.search_text,
                item.created_at_us,
                item.updated_at_us
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict {
                entity: "item",
                key: item.slug.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn update_item(&self, item: &CanonicalItem) -> Result<(), StoreError> {
        let locations = serde_json::to_string(&item.locations)
            .map_err(|e| StoreError::Backend(format!("encode locations: {e}")))?;

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE items SET name = ?2, level = ?3, category = ?4, slot = ?5,
                 damage_type = ?6, avg_damage = ?7, ac_apply = ?8, ac_bonus = ?9,
                 damroll_bonus = ?10, str_mod = ?11, dex_mod = ?12, con_mod = ?13,
                 mana_mod = ?14, hp_mod = ?15, hitroll_mod = ?16, locations = ?17,
                 hidden = ?18, visible_after_us = ?19, first_poster = ?20,
                 search_text = ?21, created_at_us = ?22, updated_at_us = ?23
             WHERE slug = ?1",
            params![
                item.slug.as_str(),
                item.name,
                item.level,
                item.category,
                item.slot,
                item.damage_type.map(DamageType::as_str),
                item.avg_damage,
                item.ac_apply,
                item.ac_bonus,
                item.damroll_bonus,
                item.stat_mods.strength,
                item.stat_mods.dexterity,
                item.stat_mods.constitution,
                item.stat_mods.mana,
                item.stat_mods.health,
                item.stat_mods.hit_roll,
                locations,
                item.hidden,
                item.visible_after_us,
                item.first_poster,
                item.search_text,
                item.created_at_us,
                item.updated_at_us
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "item",
                key: item.slug.to_string(),
            });
        }
        Ok(())
    }

    fn delete_all_items(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM items", [])?;
        Ok(deleted)
    }

    fn item_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn list_items(&self, include_hidden: bool) -> Result<Vec<CanonicalItem>, StoreError> {
        let conn = self.conn()?;
        let sql = if include_hidden {
            format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY slug ASC")
        } else {
            format!("SELECT {ITEM_COLUMNS} FROM items WHERE hidden = 0 ORDER BY slug ASC")
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn search_items(&self, query: &str) -> Result<Vec<CanonicalItem>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE instr(lower(name), lower(?1)) > 0
                OR instr(lower(search_text), lower(?1)) > 0
             ORDER BY slug ASC"
        ))?;
        let rows = stmt
            .query_map(params![query], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn append_visibility_event(
        &self,
        slug: &ItemSlug,
        action: VisibilityAction,
        actor: &str,
        created_at_us: i64,
    ) -> Result<VisibilityEvent, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO visibility_events (item_slug, action, actor, created_at_us)
             VALUES (?1, ?2, ?3, ?4)",
            params![slug.as_str(), action.as_str(), actor, created_at_us],
        )?;

        Ok(VisibilityEvent {
            id: conn.last_insert_rowid(),
            slug: slug.clone(),
            action,
            actor: actor.to_string(),
            created_at_us,
        })
    }

    fn visibility_events_oldest_first(&self) -> Result<Vec<VisibilityEvent>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, item_slug, action, actor, created_at_us
             FROM visibility_events ORDER BY created_at_us ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn visibility_history(&self, slug: &ItemSlug) -> Result<Vec<VisibilityEvent>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, item_slug, action, actor, created_at_us
             FROM visibility_events WHERE item_slug = ?1
             ORDER BY created_at_us DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![slug.as_str()], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn set_item_hidden(&self, slug: &ItemSlug, hidden: bool) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE items SET hidden = ?1 WHERE slug = ?2",
            params![hidden, slug.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "item",
                key: slug.to_string(),
            });
        }
        Ok(())
    }

    fn insert_contributor(&self, contributor: &Contributor) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO contributors (username, character, score) VALUES (?1, ?2, ?3)",
            params![contributor.username, contributor.character, contributor.score],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict {
                entity: "contributor",
                key: contributor.username.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn contributor(&self, username: &str) -> Result<Option<Contributor>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT username, character, score FROM contributors WHERE username = ?1",
                params![username],
                |row| {
                    Ok(Contributor {
                        username: row.get(0)?,
                        character: row.get(1)?,
                        score: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn credit_contributor(&self, name: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE contributors SET score = score + 1
             WHERE username = (
                 SELECT username FROM contributors
                 WHERE username = ?1 OR character = ?1
                 ORDER BY username ASC LIMIT 1
             )",
            params![name],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, SqliteStore, current_schema_version};
    use crate::ledger::VisibilityAction;
    use crate::model::{
        CanonicalItem, Contributor, DamageType, ItemSlug, NewSubmission, StatMods,
    };
    use crate::store::{Store, StoreError};

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("open in-memory store")
    }

    fn item(slug: &str) -> CanonicalItem {
        CanonicalItem {
            slug: ItemSlug::new_unchecked(slug),
            name: slug.replace('-', " "),
            level: 10,
            category: "dagger".into(),
            slot: Some("hands".into()),
            damage_type: Some(DamageType::Pierce),
            avg_damage: Some(13),
            ac_apply: None,
            ac_bonus: None,
            damroll_bonus: Some(2),
            stat_mods: StatMods {
                strength: Some(1),
                ..StatMods::default()
            },
            locations: vec!["Old Keep".into()],
            hidden: false,
            visible_after_us: None,
            first_poster: Some("alice".into()),
            search_text: format!("{} strength +1", slug.replace('-', " ")),
            created_at_us: 1_000,
            updated_at_us: 1_000,
        }
    }

    #[test]
    fn open_sets_wal_and_migrates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("relic.db");
        let store = SqliteStore::open(&path).expect("open store");

        let conn = store.conn().expect("lock");
        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let version = current_schema_version(&conn).expect("schema version");
        assert_eq!(version, LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn submission_insert_fetch_link() {
        let store = store();
        let id = store
            .insert_submission(&NewSubmission {
                body: "a, a rusty dagger, is a dagger,",
                submitter: Some("alice"),
                origin: Some("Old Keep"),
                submitted_at_us: 42,
            })
            .expect("insert");

        let fetched = store.submission(id).expect("fetch").expect("present");
        assert_eq!(fetched.submitter.as_deref(), Some("alice"));
        assert_eq!(fetched.item_slug, None);

        let slug = ItemSlug::new_unchecked("rusty-dagger");
        store.link_submission(id, &slug).expect("link");
        let fetched = store.submission(id).expect("fetch").expect("present");
        assert_eq!(fetched.item_slug, Some(slug));
    }

    #[test]
    fn linking_missing_submission_is_not_found() {
        let store = store();
        let err = store
            .link_submission(999, &ItemSlug::new_unchecked("x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "submission", .. }));
    }

    #[test]
    fn item_roundtrip_preserves_every_field() {
        let store = store();
        let original = item("rusty-dagger");
        store.insert_item(&original).expect("insert");

        let fetched = store
            .item(&original.slug)
            .expect("fetch")
            .expect("present");
        assert_eq!(fetched, original);
    }

    #[test]
    fn duplicate_slug_insert_is_conflict() {
        let store = store();
        store.insert_item(&item("rusty-dagger")).expect("insert");
        let err = store.insert_item(&item("rusty-dagger")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "item", .. }));
    }

    #[test]
    fn update_missing_item_is_not_found() {
        let store = store();
        let err = store.update_item(&item("ghost")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "item", .. }));
    }

    #[test]
    fn list_respects_hidden_flag() {
        let store = store();
        store.insert_item(&item("shown")).expect("insert");
        let mut hidden = item("withheld");
        hidden.hidden = true;
        store.insert_item(&hidden).expect("insert");

        let visible = store.list_items(false).expect("list");
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].slug.as_str(), "shown");

        let all = store.list_items(true).expect("list all");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn search_matches_name_and_search_text() {
        let store = store();
        store.insert_item(&item("rusty-dagger")).expect("insert");

        let by_name = store.search_items("RUSTY").expect("search");
        assert_eq!(by_name.len(), 1);

        let by_mods = store.search_items("strength +1").expect("search");
        assert_eq!(by_mods.len(), 1);

        assert!(store.search_items("zzz").expect("search").is_empty());
    }

    #[test]
    fn visibility_events_are_ordered_both_ways() {
        let store = store();
        let slug = ItemSlug::new_unchecked("rusty-dagger");
        store
            .append_visibility_event(&slug, VisibilityAction::Hide, "mod", 100)
            .expect("append");
        store
            .append_visibility_event(&slug, VisibilityAction::Restore, "mod", 200)
            .expect("append");

        let asc = store.visibility_events_oldest_first().expect("asc");
        assert_eq!(asc.len(), 2);
        assert_eq!(asc[0].action, VisibilityAction::Hide);

        let history = store.visibility_history(&slug).expect("history");
        assert_eq!(history[0].action, VisibilityAction::Restore);
    }

    #[test]
    fn credit_matches_username_or_character() {
        let store = store();
        store
            .insert_contributor(&Contributor {
                username: "alice".into(),
                character: Some("Aelira".into()),
                score: 0,
            })
            .expect("insert");

        assert!(store.credit_contributor("alice").expect("credit"));
        assert!(store.credit_contributor("Aelira").expect("credit"));
        assert!(!store.credit_contributor("nobody").expect("credit"));

        let alice = store
            .contributor("alice")
            .expect("fetch")
            .expect("present");
        assert_eq!(alice.score, 2);
        // No row was created for the unmatched name.
        assert_eq!(store.contributor("nobody").expect("fetch"), None);
    }

    #[test]
    fn delete_all_items_and_count() {
        let store = store();
        store.insert_item(&item("a")).expect("insert");
        store.insert_item(&item("b")).expect("insert");
        assert_eq!(store.item_count().expect("count"), 2);

        assert_eq!(store.delete_all_items().expect("delete"), 2);
        assert_eq!(store.item_count().expect("count"), 0);
    }

    #[test]
    fn clear_submission_links() {
        let store = store();
        let id = store
            .insert_submission(&NewSubmission {
                body: "text",
                submitter: None,
                origin: None,
                submitted_at_us: 1,
            })
            .expect("insert");
        store.insert_item(&item("rusty-dagger")).expect("insert item");
        store
            .link_submission(id, &ItemSlug::new_unchecked("rusty-dagger"))
            .expect("link");

        assert_eq!(store.clear_submission_links().expect("clear"), 1);
        let sub = store.submission(id).expect("fetch").expect("present");
        assert_eq!(sub.item_slug, None);
    }
}
