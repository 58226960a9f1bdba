// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod feed;

pub use feed::{FeedCallback, FeedHandle};

use anyhow::{Context, Result, anyhow, bail};
use catalog_app::{Document, DocumentId, ItemFields};
use feed::FeedRegistry;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const APP_NAME: &str = "catalog";
pub const DOCUMENT_ID_LEN: usize = 20;

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[(
    "documents",
    &[
        "seq",
        "collection",
        "doc_id",
        "data",
        "created_at",
        "updated_at",
    ],
)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_documents_collection_doc_id",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_collection_doc_id ON documents (collection, doc_id);",
    },
    RequiredIndex {
        name: "idx_documents_collection",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents (collection);",
    },
];

const DEMO_PRODUCTS: [(&str, &str, &str, i64, i64); 8] = [
    ("Bamboo Watch", "Analog watch with a bamboo case", "Accessories", 6_500, 24),
    ("Black Watch", "Stainless steel with a leather band", "Accessories", 7_200, 61),
    ("Blue Band", "Resistance band for daily workouts", "Fitness", 7_900, 2),
    ("Blue T-Shirt", "Cotton crew neck", "Clothing", 2_900, 25),
    ("Bracelet", "Braided cord with a brass clasp", "Accessories", 1_500, 73),
    ("Brown Purse", "Leather shoulder purse", "Accessories", 12_000, 0),
    ("Chakra Bracelet", "Beaded stone bracelet", "Accessories", 3_200, 5),
    ("Gaming Set", "Controller and headset bundle", "Electronics", 29_900, 63),
];

pub struct Store {
    conn: Connection,
    feeds: Arc<Mutex<FeedRegistry>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(Self::from_connection(conn))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            feeds: Arc::new(Mutex::new(FeedRegistry::default())),
        }
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    /// Inserts the sample product set. Returns how many documents were added.
    pub fn seed_demo_data(&self, collection: &str) -> Result<usize> {
        let mut inserted = 0usize;
        for (name, description, category, price_cents, amount) in DEMO_PRODUCTS {
            let fields = ItemFields {
                name: name.to_owned(),
                description: description.to_owned(),
                category: category.to_owned(),
                price_cents,
                amount,
            };
            self.create(collection, &fields.to_document_fields()?)
                .with_context(|| format!("seed demo product {name}"))?;
            inserted += 1;
        }
        tracing::info!(collection, inserted, "seeded demo data");
        Ok(inserted)
    }

    /// Every document in `collection`, in creation order. Rows whose data is
    /// not a JSON object are skipped with a warning.
    pub fn list(&self, collection: &str) -> Result<Vec<Document>> {
        validate_collection_name(collection)?;
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT doc_id, data
                FROM documents
                WHERE collection = ?
                ORDER BY seq ASC
                ",
            )
            .context("prepare document list query")?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .with_context(|| format!("list documents in {collection}"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("collect documents in {collection}"))?;

        let mut documents = Vec::with_capacity(rows.len());
        for (id, data) in rows {
            match decode_fields(&id, &data) {
                Ok(fields) => documents.push(Document {
                    id: DocumentId::new(id),
                    fields,
                }),
                Err(error) => {
                    tracing::warn!(collection, id = %id, error = %format!("{error:#}"), "skipped document");
                }
            }
        }
        Ok(documents)
    }

    pub fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
        validate_collection_name(collection)?;
        let data = self
            .conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ? AND doc_id = ?",
                params![collection, id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("load document {id} from {collection}"))?;
        let Some(data) = data else {
            return Ok(None);
        };
        Ok(Some(Document {
            id: id.clone(),
            fields: decode_fields(id.as_str(), &data)?,
        }))
    }

    pub fn create(&self, collection: &str, fields: &Map<String, Value>) -> Result<DocumentId> {
        validate_collection_name(collection)?;
        let data = encode_fields(fields)?;
        let now = now_rfc3339()?;
        let next_seq: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM documents",
                [],
                |row| row.get(0),
            )
            .context("read next document sequence")?;
        let id = generate_document_id(collection, next_seq);
        self.conn
            .execute(
                "
                INSERT INTO documents (collection, doc_id, data, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![collection, id.as_str(), data, now, now],
            )
            .with_context(|| format!("insert document into {collection}"))?;
        tracing::debug!(collection, id = %id, "created document");
        self.publish(collection);
        Ok(id)
    }

    /// Replaces the stored fields of an existing document.
    pub fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        validate_collection_name(collection)?;
        let data = encode_fields(fields)?;
        let now = now_rfc3339()?;
        let changed = self
            .conn
            .execute(
                "
                UPDATE documents
                SET data = ?, updated_at = ?
                WHERE collection = ? AND doc_id = ?
                ",
                params![data, now, collection, id.as_str()],
            )
            .with_context(|| format!("update document {id} in {collection}"))?;
        if changed == 0 {
            bail!("document {id} not found in {collection} -- choose an existing product and retry");
        }
        tracing::debug!(collection, id = %id, "updated document");
        self.publish(collection);
        Ok(())
    }

    pub fn delete(&self, collection: &str, id: &DocumentId) -> Result<()> {
        validate_collection_name(collection)?;
        let changed = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ? AND doc_id = ?",
                params![collection, id.as_str()],
            )
            .with_context(|| format!("delete document {id} from {collection}"))?;
        if changed == 0 {
            bail!("document {id} not found in {collection} -- refresh the list and retry");
        }
        tracing::debug!(collection, id = %id, "deleted document");
        self.publish(collection);
        Ok(())
    }

    pub fn count(&self, collection: &str) -> Result<usize> {
        validate_collection_name(collection)?;
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?",
                params![collection],
                |row| row.get(0),
            )
            .with_context(|| format!("count documents in {collection}"))?;
        usize::try_from(count).map_err(|_| anyhow!("negative document count {count}"))
    }

    /// Registers a live feed on `collection`. The callback receives the
    /// current snapshot immediately and a full snapshot after every change
    /// to the collection, until the returned handle is dropped.
    pub fn subscribe(&self, collection: &str, callback: FeedCallback) -> Result<FeedHandle> {
        validate_collection_name(collection)?;
        let snapshot = self.list(collection)?;
        let (id, listeners) = {
            let mut registry = feed::lock(&self.feeds);
            let id = registry.register(collection, callback);
            (id, registry.listeners_where(|listener_id, _| listener_id == id))
        };
        feed::deliver(&listeners, &snapshot);
        tracing::info!(collection, feed = id, documents = snapshot.len(), "feed opened");
        Ok(FeedHandle::new(id, collection, &self.feeds))
    }

    pub fn feed_count(&self) -> usize {
        feed::lock(&self.feeds).len()
    }

    fn publish(&self, collection: &str) {
        if !feed::lock(&self.feeds).has_listeners(collection) {
            return;
        }
        match self.list(collection) {
            Ok(snapshot) => {
                let listeners = feed::lock(&self.feeds)
                    .listeners_where(|_, listening_to| listening_to == collection);
                let delivered = feed::deliver(&listeners, &snapshot);
                tracing::debug!(collection, delivered, "published snapshot");
            }
            Err(error) => {
                tracing::error!(collection, error = %format!("{error:#}"), "snapshot failed");
            }
        }
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("CATALOG_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set CATALOG_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("catalog.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

pub fn validate_collection_name(collection: &str) -> Result<()> {
    if collection.is_empty() {
        bail!("collection name must not be empty -- set storage.collection and retry");
    }
    if !is_safe_identifier(collection) {
        bail!(
            "collection name {collection:?} may only contain letters, digits and '_' -- rename it and retry"
        );
    }
    Ok(())
}

fn generate_document_id(collection: &str, seq: i64) -> DocumentId {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let digest = Sha256::digest(format!("{collection}:{seq}:{nanos}").as_bytes());
    let mut output = String::with_capacity(DOCUMENT_ID_LEN);
    for byte in digest.iter().take(DOCUMENT_ID_LEN / 2) {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    DocumentId::new(output)
}

fn encode_fields(fields: &Map<String, Value>) -> Result<String> {
    if fields.contains_key("id") {
        bail!("document fields must not carry an `id` key -- the store assigns identifiers");
    }
    serde_json::to_string(fields).context("encode document fields")
}

fn decode_fields(id: &str, data: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(data)
        .with_context(|| format!("decode document {id}"))?
    {
        Value::Object(map) => Ok(map),
        other => bail!("document {id} holds {other} instead of an object"),
    }
}

fn is_safe_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a catalog-compatible database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}
