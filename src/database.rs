//! SQLite-backed entity store.
//!
//! Uses parameterized queries exclusively (no SQL string interpolation of
//! values). All writes are transactional. Every entity table carries the same
//! four leading columns (`id`, `is_deleted`, `created_at`, `updated_at`);
//! [`Entity`] implementations append their own columns after those, in the
//! order declared by [`Entity::COLUMNS`].

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Card, CardImage, Collection, CollectionShare, EntityMeta, ImageKind, PriceSnapshot,
    PriceSource, SharePermission, UserProfile,
};
use crate::money::Money;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Capability interface for persisted records: a stable table mapping plus
/// access to the shared identity/audit block.
pub trait Entity: Sized {
    /// Table name in the database.
    const TABLE: &'static str;
    /// Column names beyond the shared meta columns, in `values()` order.
    const COLUMNS: &'static [&'static str];

    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Column values matching `COLUMNS`, in the same order.
    fn values(&self) -> Vec<Value>;

    /// Rebuild from a row selected as `id, is_deleted, created_at,
    /// updated_at, COLUMNS...` - entity columns start at index 4.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Reject malformed entities before any write.
    fn validate(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Handle to the single on-disk database.
///
/// Cheap to clone; all clones share one connection behind a mutex, which is
/// the only serialization the store needs - every operation is a single
/// transaction under the lock.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (or creates) the database file and initialises the schema.
    ///
    /// Safe to call repeatedly, including from concurrent callers: schema
    /// creation is `IF NOT EXISTS` and the connection waits out short-lived
    /// locks held by sibling initialisers.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        conn.busy_timeout(Duration::from_secs(5))?;
        init_schema(&conn)?;
        log::info!("Opened database: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open {
            path: ":memory:".to_string(),
            source: Box::new(e),
        })?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Writes are transactional, so the data stays consistent even if a
        // previous holder panicked mid-call.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert-or-update keyed by id.
    ///
    /// New ids get `created_at = updated_at = now`; existing rows keep their
    /// `created_at` and have every other non-identity column overwritten with
    /// `updated_at = now` (last writer wins). The passed entity's meta block
    /// is synced to what was written, so a subsequent `get` returns an equal
    /// record.
    pub fn upsert<T: Entity>(&self, entity: &mut T) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        upsert_in_tx(&tx, entity)?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch by id. Soft-deleted rows are still returned here; only queries
    /// hide them by default.
    pub fn get<T: Entity>(&self, id: &str) -> StoreResult<Option<T>> {
        let conn = self.lock();
        let sql = select_sql::<T>("WHERE id = ?1", "");
        Ok(conn
            .query_row(&sql, params![id], |row| T::from_row(row))
            .optional()?)
    }

    /// Marks a row deleted and bumps `updated_at`. A missing id is a no-op,
    /// not an error.
    pub fn soft_delete<T: Entity>(&self, id: &str) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET is_deleted = 1, updated_at = ?1 WHERE id = ?2",
                T::TABLE
            ),
            params![Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            log::debug!("soft_delete: no {} row with id {}", T::TABLE, id);
        }
        Ok(())
    }

    /// All rows of a type, newest first (ties broken by id for deterministic
    /// pagination). Excludes soft-deleted rows unless asked.
    pub fn list<T: Entity>(&self, include_deleted: bool) -> StoreResult<Vec<T>> {
        let where_clause = if include_deleted {
            ""
        } else {
            "WHERE is_deleted = 0"
        };
        self.query_where::<T, _>(where_clause, "ORDER BY created_at DESC, id", [])
    }

    fn query_where<T: Entity, P: rusqlite::Params>(
        &self,
        where_clause: &str,
        order_clause: &str,
        params: P,
    ) -> StoreResult<Vec<T>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&select_sql::<T>(where_clause, order_clause))?;
        let rows = stmt.query_map(params, |row| T::from_row(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
    }

    // ── Typed queries over the foreign-key indexes ─────────────────────────

    /// Non-deleted cards of a collection, newest first.
    pub fn cards_in_collection(&self, collection_id: &str) -> StoreResult<Vec<Card>> {
        self.query_where::<Card, _>(
            "WHERE collection_id = ?1 AND is_deleted = 0",
            "ORDER BY created_at DESC, id",
            params![collection_id],
        )
    }

    pub fn images_for_card(&self, card_id: &str) -> StoreResult<Vec<CardImage>> {
        self.query_where::<CardImage, _>(
            "WHERE card_id = ?1 AND is_deleted = 0",
            "ORDER BY created_at, id",
            params![card_id],
        )
    }

    /// Price time series for a card, oldest observation first.
    pub fn snapshots_for_card(&self, card_id: &str) -> StoreResult<Vec<PriceSnapshot>> {
        self.query_where::<PriceSnapshot, _>(
            "WHERE card_id = ?1 AND is_deleted = 0",
            "ORDER BY observed_at, id",
            params![card_id],
        )
    }

    pub fn shares_for_collection(&self, collection_id: &str) -> StoreResult<Vec<CollectionShare>> {
        self.query_where::<CollectionShare, _>(
            "WHERE collection_id = ?1 AND is_deleted = 0",
            "ORDER BY created_at, id",
            params![collection_id],
        )
    }

    /// Profile lookup by email, case-insensitive.
    pub fn user_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>> {
        let conn = self.lock();
        let sql = select_sql::<UserProfile>(
            "WHERE is_deleted = 0 AND email IS NOT NULL AND LOWER(email) = LOWER(?1)",
            "ORDER BY created_at, id",
        );
        Ok(conn
            .query_row(&sql, params![email.trim()], |row| UserProfile::from_row(row))
            .optional()?)
    }

    /// Case-insensitive substring search over card name, player, set, team
    /// and number.
    pub fn search_cards(&self, text: &str) -> StoreResult<Vec<Card>> {
        let pattern = format!("%{}%", text.trim());
        self.query_where::<Card, _>(
            "WHERE is_deleted = 0 AND (name LIKE ?1 OR player LIKE ?1 \
             OR set_name LIKE ?1 OR team LIKE ?1 OR number LIKE ?1)",
            "ORDER BY updated_at DESC, id",
            params![pattern],
        )
    }

    /// Card plus its initial image in one transaction, so a promoted listing
    /// never ends up half-written.
    pub fn insert_card_with_image(
        &self,
        card: &mut Card,
        image: Option<&mut CardImage>,
    ) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        upsert_in_tx(&tx, card)?;
        if let Some(image) = image {
            upsert_in_tx(&tx, image)?;
        }
        tx.commit()?;
        Ok(())
    }

    // ── Credential records (keyed by email, not by entity id) ──────────────

    pub(crate) fn put_credential(&self, email: &str, hash: &str) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO credentials (email, password_hash, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(email) DO UPDATE SET
                 password_hash = excluded.password_hash,
                 updated_at = excluded.updated_at",
            params![email, hash, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub(crate) fn get_credential(&self, email: &str) -> StoreResult<Option<String>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                "SELECT password_hash FROM credentials WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?)
    }
}

/// Creates all tables and indexes if they don't exist. Idempotent.
fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS user_profiles (
            id               TEXT NOT NULL PRIMARY KEY,
            is_deleted       INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            provider_user_id TEXT,
            email            TEXT,
            guest_id         TEXT,
            display_name     TEXT,
            password_hash    TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_user_profiles_email ON user_profiles(email);

        CREATE TABLE IF NOT EXISTS collections (
            id            TEXT NOT NULL PRIMARY KEY,
            is_deleted    INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL,
            owner_user_id TEXT NOT NULL,
            name          TEXT NOT NULL,
            description   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_collections_owner ON collections(owner_user_id);

        CREATE TABLE IF NOT EXISTS cards (
            id              TEXT NOT NULL PRIMARY KEY,
            is_deleted      INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            collection_id   TEXT NOT NULL,
            name            TEXT NOT NULL,
            player          TEXT NOT NULL,
            team            TEXT NOT NULL,
            year            INTEGER NOT NULL,
            set_name        TEXT NOT NULL,
            number          TEXT NOT NULL,
            grade_company   TEXT NOT NULL,
            grade           REAL,
            purchase_price  INTEGER,
            estimated_value INTEGER,
            photo_path      TEXT,
            FOREIGN KEY (collection_id) REFERENCES collections(id)
        );
        CREATE INDEX IF NOT EXISTS idx_cards_collection ON cards(collection_id);

        CREATE TABLE IF NOT EXISTS card_images (
            id         TEXT NOT NULL PRIMARY KEY,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            card_id    TEXT NOT NULL,
            path       TEXT NOT NULL,
            kind       TEXT NOT NULL,
            FOREIGN KEY (card_id) REFERENCES cards(id)
        );
        CREATE INDEX IF NOT EXISTS idx_card_images_card ON card_images(card_id);

        CREATE TABLE IF NOT EXISTS price_snapshots (
            id          TEXT NOT NULL PRIMARY KEY,
            is_deleted  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            card_id     TEXT NOT NULL,
            price       INTEGER NOT NULL,
            source      TEXT NOT NULL,
            observed_at TEXT NOT NULL,
            FOREIGN KEY (card_id) REFERENCES cards(id)
        );
        CREATE INDEX IF NOT EXISTS idx_price_snapshots_card ON price_snapshots(card_id);

        CREATE TABLE IF NOT EXISTS collection_shares (
            id            TEXT NOT NULL PRIMARY KEY,
            is_deleted    INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL,
            collection_id TEXT NOT NULL,
            invitee_email TEXT NOT NULL,
            permission    TEXT NOT NULL,
            FOREIGN KEY (collection_id) REFERENCES collections(id)
        );
        CREATE INDEX IF NOT EXISTS idx_collection_shares_collection
            ON collection_shares(collection_id);

        CREATE TABLE IF NOT EXISTS credentials (
            email         TEXT NOT NULL PRIMARY KEY,
            password_hash TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );
        ",
    )?;
    log::debug!("Database schema initialized");
    Ok(())
}

fn upsert_in_tx<T: Entity>(tx: &Transaction<'_>, entity: &mut T) -> StoreResult<()> {
    entity.validate()?;

    let existing_created: Option<String> = tx
        .query_row(
            &format!("SELECT created_at FROM {} WHERE id = ?1", T::TABLE),
            params![entity.meta().id],
            |row| row.get(0),
        )
        .optional()?;

    let now = Utc::now();
    {
        let meta = entity.meta_mut();
        meta.updated_at = now;
        match existing_created.as_deref().and_then(parse_timestamp) {
            Some(created) => meta.created_at = created,
            None if existing_created.is_none() => meta.created_at = now,
            // Row exists but its timestamp is unreadable; keep the caller's.
            None => {}
        }
    }

    let mut values: Vec<Value> = vec![
        entity.meta().id.clone().into(),
        entity.meta().is_deleted.into(),
        entity.meta().created_at.to_rfc3339().into(),
        entity.meta().updated_at.to_rfc3339().into(),
    ];
    values.extend(entity.values());

    tx.execute(&upsert_sql::<T>(), params_from_iter(values))?;
    Ok(())
}

/// `INSERT ... ON CONFLICT(id) DO UPDATE` over every column except `id` and
/// `created_at`, which are immutable once written.
fn upsert_sql<T: Entity>() -> String {
    let mut cols: Vec<&str> = vec!["id", "is_deleted", "created_at", "updated_at"];
    cols.extend_from_slice(T::COLUMNS);
    let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = cols
        .iter()
        .skip(1)
        .filter(|c| **c != "created_at")
        .map(|c| format!("{0} = excluded.{0}", c))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        T::TABLE,
        cols.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

fn select_sql<T: Entity>(where_clause: &str, order_clause: &str) -> String {
    let mut cols: Vec<&str> = vec!["id", "is_deleted", "created_at", "updated_at"];
    cols.extend_from_slice(T::COLUMNS);
    let mut sql = format!("SELECT {} FROM {}", cols.join(", "), T::TABLE);
    if !where_clause.is_empty() {
        sql.push(' ');
        sql.push_str(where_clause);
    }
    if !order_clause.is_empty() {
        sql.push(' ');
        sql.push_str(order_clause);
    }
    sql
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn meta_from_row(row: &Row<'_>) -> rusqlite::Result<EntityMeta> {
    Ok(EntityMeta {
        id: row.get(0)?,
        is_deleted: row.get::<_, i64>(1)? != 0,
        created_at: ts_col(row, 2)?,
        updated_at: ts_col(row, 3)?,
    })
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn money_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Money>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(Money::from_cents))
}

fn require(ok: bool, entity: &'static str, reason: &str) -> StoreResult<()> {
    if ok {
        Ok(())
    } else {
        Err(StoreError::Validation {
            entity,
            reason: reason.to_string(),
        })
    }
}

// ── Entity table mappings ──────────────────────────────────────────────────

impl Entity for UserProfile {
    const TABLE: &'static str = "user_profiles";
    const COLUMNS: &'static [&'static str] = &[
        "provider_user_id",
        "email",
        "guest_id",
        "display_name",
        "password_hash",
    ];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.provider_user_id.clone().into(),
            self.email.clone().into(),
            self.guest_id.clone().into(),
            self.display_name.clone().into(),
            self.password_hash.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(UserProfile {
            meta: meta_from_row(row)?,
            provider_user_id: row.get(4)?,
            email: row.get(5)?,
            guest_id: row.get(6)?,
            display_name: row.get(7)?,
            password_hash: row.get(8)?,
        })
    }

    fn validate(&self) -> StoreResult<()> {
        require(
            self.email.as_deref().map_or(true, |e| !e.trim().is_empty()),
            "UserProfile",
            "email must not be blank when present",
        )
    }
}

impl Entity for Collection {
    const TABLE: &'static str = "collections";
    const COLUMNS: &'static [&'static str] = &["owner_user_id", "name", "description"];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.owner_user_id.clone().into(),
            self.name.clone().into(),
            self.description.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Collection {
            meta: meta_from_row(row)?,
            owner_user_id: row.get(4)?,
            name: row.get(5)?,
            description: row.get(6)?,
        })
    }

    fn validate(&self) -> StoreResult<()> {
        require(
            !self.owner_user_id.trim().is_empty(),
            "Collection",
            "owner_user_id is required",
        )?;
        require(!self.name.trim().is_empty(), "Collection", "name is required")
    }
}

impl Entity for Card {
    const TABLE: &'static str = "cards";
    const COLUMNS: &'static [&'static str] = &[
        "collection_id",
        "name",
        "player",
        "team",
        "year",
        "set_name",
        "number",
        "grade_company",
        "grade",
        "purchase_price",
        "estimated_value",
        "photo_path",
    ];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.collection_id.clone().into(),
            self.name.clone().into(),
            self.player.clone().into(),
            self.team.clone().into(),
            self.year.into(),
            self.set_name.clone().into(),
            self.number.clone().into(),
            self.grade_company.clone().into(),
            self.grade.into(),
            self.purchase_price.map(|m| m.cents()).into(),
            self.estimated_value.map(|m| m.cents()).into(),
            self.photo_path.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Card {
            meta: meta_from_row(row)?,
            collection_id: row.get(4)?,
            name: row.get(5)?,
            player: row.get(6)?,
            team: row.get(7)?,
            year: row.get(8)?,
            set_name: row.get(9)?,
            number: row.get(10)?,
            grade_company: row.get(11)?,
            grade: row.get(12)?,
            purchase_price: money_col(row, 13)?,
            estimated_value: money_col(row, 14)?,
            photo_path: row.get(15)?,
        })
    }

    fn validate(&self) -> StoreResult<()> {
        require(
            !self.collection_id.trim().is_empty(),
            "Card",
            "collection_id is required",
        )?;
        require(self.year >= 0, "Card", "year must not be negative")?;
        require(
            !self.purchase_price.map_or(false, |p| p.is_negative()),
            "Card",
            "purchase_price must not be negative",
        )?;
        require(
            !self.estimated_value.map_or(false, |p| p.is_negative()),
            "Card",
            "estimated_value must not be negative",
        )
    }
}

impl Entity for CardImage {
    const TABLE: &'static str = "card_images";
    const COLUMNS: &'static [&'static str] = &["card_id", "path", "kind"];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.card_id.clone().into(),
            self.path.clone().into(),
            self.kind.as_str().to_string().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get(6)?;
        Ok(CardImage {
            meta: meta_from_row(row)?,
            card_id: row.get(4)?,
            path: row.get(5)?,
            kind: ImageKind::parse(&kind).unwrap_or_default(),
        })
    }

    fn validate(&self) -> StoreResult<()> {
        require(
            !self.card_id.trim().is_empty(),
            "CardImage",
            "card_id is required",
        )?;
        require(!self.path.trim().is_empty(), "CardImage", "path is required")
    }
}

impl Entity for PriceSnapshot {
    const TABLE: &'static str = "price_snapshots";
    const COLUMNS: &'static [&'static str] = &["card_id", "price", "source", "observed_at"];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.card_id.clone().into(),
            self.price.cents().into(),
            self.source.as_str().to_string().into(),
            self.observed_at.to_rfc3339().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let source: String = row.get(6)?;
        Ok(PriceSnapshot {
            meta: meta_from_row(row)?,
            card_id: row.get(4)?,
            price: Money::from_cents(row.get(5)?),
            source: PriceSource::parse(&source).unwrap_or_default(),
            observed_at: ts_col(row, 7)?,
        })
    }

    fn validate(&self) -> StoreResult<()> {
        require(
            !self.card_id.trim().is_empty(),
            "PriceSnapshot",
            "card_id is required",
        )?;
        require(
            !self.price.is_negative(),
            "PriceSnapshot",
            "price must not be negative",
        )
    }
}

impl Entity for CollectionShare {
    const TABLE: &'static str = "collection_shares";
    const COLUMNS: &'static [&'static str] = &["collection_id", "invitee_email", "permission"];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.collection_id.clone().into(),
            self.invitee_email.clone().into(),
            self.permission.as_str().to_string().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let permission: String = row.get(6)?;
        Ok(CollectionShare {
            meta: meta_from_row(row)?,
            collection_id: row.get(4)?,
            invitee_email: row.get(5)?,
            permission: SharePermission::parse(&permission).unwrap_or_default(),
        })
    }

    fn validate(&self) -> StoreResult<()> {
        require(
            !self.collection_id.trim().is_empty(),
            "CollectionShare",
            "collection_id is required",
        )?;
        require(
            !self.invitee_email.trim().is_empty(),
            "CollectionShare",
            "invitee_email is required",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn card_in(store: &Store, collection_id: &str) -> Card {
        let mut card = Card::new(collection_id);
        card.name = "2020 Select Silver Prizm #66 - Patrick Mahomes II".to_string();
        card.player = "Patrick Mahomes II".to_string();
        card.team = "Kansas City Chiefs".to_string();
        card.year = 2020;
        card.set_name = "Select Silver Prizm".to_string();
        card.number = "66".to_string();
        card.estimated_value = Money::parse("285.50");
        store.upsert(&mut card).unwrap();
        card
    }

    #[test]
    fn upsert_then_get_round_trips_all_fields() {
        let store = test_store();
        let before = Utc::now();
        let card = card_in(&store, "col-1");

        let fetched: Card = store.get(&card.meta.id).unwrap().unwrap();
        assert_eq!(fetched, card);
        assert!(fetched.meta.updated_at >= before);
        assert_eq!(fetched.estimated_value, Some(Money::from_cents(28550)));
        assert!(fetched.purchase_price.is_none());
    }

    #[test]
    fn upsert_is_idempotent_beyond_updated_at() {
        let store = test_store();
        let mut card = card_in(&store, "col-1");
        let first: Card = store.get(&card.meta.id).unwrap().unwrap();

        store.upsert(&mut card).unwrap();
        let second: Card = store.get(&card.meta.id).unwrap().unwrap();

        assert_eq!(second.meta.created_at, first.meta.created_at);
        assert!(second.meta.updated_at >= first.meta.updated_at);
        assert_eq!(second.name, first.name);
    }

    #[test]
    fn upsert_overwrites_non_identity_fields() {
        let store = test_store();
        let mut card = card_in(&store, "col-1");

        card.grade_company = "PSA".to_string();
        card.grade = Some(9.5);
        store.upsert(&mut card).unwrap();

        let fetched: Card = store.get(&card.meta.id).unwrap().unwrap();
        assert_eq!(fetched.grade_company, "PSA");
        assert_eq!(fetched.grade, Some(9.5));
    }

    #[test]
    fn soft_delete_hides_from_list_but_get_still_works() {
        let store = test_store();
        let card = card_in(&store, "col-1");

        store.soft_delete::<Card>(&card.meta.id).unwrap();

        let visible: Vec<Card> = store.list(false).unwrap();
        assert!(visible.is_empty());

        let all: Vec<Card> = store.list(true).unwrap();
        assert_eq!(all.len(), 1);

        let fetched: Card = store.get(&card.meta.id).unwrap().unwrap();
        assert!(fetched.meta.is_deleted);
        assert!(fetched.meta.updated_at >= card.meta.updated_at);
    }

    #[test]
    fn soft_delete_of_missing_id_is_a_noop() {
        let store = test_store();
        store.soft_delete::<Card>("no-such-id").unwrap();
    }

    #[test]
    fn list_orders_newest_first_with_id_tiebreak() {
        let store = test_store();
        let ts = Utc::now();

        for id in ["bbb", "aaa", "ccc"] {
            let mut collection = Collection::new("user-1", "PC");
            collection.meta.id = id.to_string();
            store.upsert(&mut collection).unwrap();
        }
        // Force identical created_at so only the id tiebreak is in play.
        {
            let conn = store.lock();
            conn.execute(
                "UPDATE collections SET created_at = ?1",
                params![ts.to_rfc3339()],
            )
            .unwrap();
        }

        let listed: Vec<Collection> = store.list(false).unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.meta.id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "bbb", "ccc"]);
    }

    #[test]
    fn validation_rejects_blank_collection_name() {
        let store = test_store();
        let mut collection = Collection::new("user-1", "   ");
        let err = store.upsert(&mut collection).unwrap_err();
        assert!(matches!(err, StoreError::Validation { entity: "Collection", .. }));

        // Nothing was written.
        let listed: Vec<Collection> = store.list(true).unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn validation_rejects_negative_prices() {
        let store = test_store();
        let mut card = Card::new("col-1");
        card.purchase_price = Some(Money::from_cents(-100));
        let err = store.upsert(&mut card).unwrap_err();
        assert!(matches!(err, StoreError::Validation { entity: "Card", .. }));

        let mut snapshot = PriceSnapshot::new("card-1", Money::from_cents(-1), PriceSource::User);
        let err = store.upsert(&mut snapshot).unwrap_err();
        assert!(matches!(err, StoreError::Validation { entity: "PriceSnapshot", .. }));
    }

    #[test]
    fn cards_in_collection_filters_by_collection_and_deletion() {
        let store = test_store();
        let kept = card_in(&store, "col-1");
        let deleted = card_in(&store, "col-1");
        card_in(&store, "col-2");

        store.soft_delete::<Card>(&deleted.meta.id).unwrap();

        let cards = store.cards_in_collection("col-1").unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].meta.id, kept.meta.id);
    }

    #[test]
    fn snapshots_are_ordered_by_observation_time() {
        let store = test_store();
        let mut late = PriceSnapshot::new("card-1", Money::from_cents(300), PriceSource::User);
        late.observed_at = Utc::now();
        let mut early = PriceSnapshot::new("card-1", Money::from_cents(200), PriceSource::User);
        early.observed_at = late.observed_at - chrono::Duration::days(1);

        store.upsert(&mut late).unwrap();
        store.upsert(&mut early).unwrap();

        let series = store.snapshots_for_card("card-1").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].price, Money::from_cents(200));
        assert_eq!(series[1].price, Money::from_cents(300));
    }

    #[test]
    fn user_lookup_by_email_is_case_insensitive() {
        let store = test_store();
        let mut profile = UserProfile::new();
        profile.email = Some("Collector@Example.com".to_string());
        store.upsert(&mut profile).unwrap();

        let found = store.user_by_email("collector@example.COM").unwrap();
        assert_eq!(found.map(|p| p.meta.id), Some(profile.meta.id));
        assert!(store.user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn search_cards_matches_substrings_across_fields() {
        let store = test_store();
        card_in(&store, "col-1");

        assert_eq!(store.search_cards("mahomes").unwrap().len(), 1);
        assert_eq!(store.search_cards("Silver Prizm").unwrap().len(), 1);
        assert_eq!(store.search_cards("Chiefs").unwrap().len(), 1);
        assert!(store.search_cards("Brady").unwrap().is_empty());
    }

    #[test]
    fn insert_card_with_image_writes_both() {
        let store = test_store();
        let mut card = Card::new("col-1");
        card.name = "Test".to_string();
        let mut image = CardImage::new(&card.meta.id, "https://example.com/a.jpg", ImageKind::Marketplace);

        store
            .insert_card_with_image(&mut card, Some(&mut image))
            .unwrap();

        assert!(store.get::<Card>(&card.meta.id).unwrap().is_some());
        let images = store.images_for_card(&card.meta.id).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].kind, ImageKind::Marketplace);
    }

    #[test]
    fn insert_card_with_image_rejects_invalid_image_atomically() {
        let store = test_store();
        let mut card = Card::new("col-1");
        card.name = "Test".to_string();
        let mut image = CardImage::new(&card.meta.id, "   ", ImageKind::Front);

        let err = store.insert_card_with_image(&mut card, Some(&mut image));
        assert!(err.is_err());

        // The card insert was rolled back with the failed image.
        assert!(store.get::<Card>(&card.meta.id).unwrap().is_none());
    }

    #[test]
    fn open_is_idempotent_and_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        {
            let store = Store::open(&path).unwrap();
            card_in(&store, "col-1");
        }
        // Reopen: schema init is a no-op, data survives.
        let store = Store::open(&path).unwrap();
        let cards: Vec<Card> = store.list(false).unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn concurrent_opens_do_not_race_schema_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || Store::open(&path).map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    }

    #[test]
    fn credentials_overwrite_on_conflict() {
        let store = test_store();
        store.put_credential("a@example.com", "hash-1").unwrap();
        store.put_credential("a@example.com", "hash-2").unwrap();
        assert_eq!(
            store.get_credential("a@example.com").unwrap().as_deref(),
            Some("hash-2")
        );
        assert!(store.get_credential("b@example.com").unwrap().is_none());
    }
}
