use std::path::Path;

use anyhow::{Context, Result};
use appforge_common::{AppMetadata, CatalogRecord, StoredApp};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// SQLite-backed catalog of published mini apps.
pub struct CatalogDb {
    conn: Connection,
}

/// Raw `mini_apps` row; tags are still JSON text here.
struct AppRow {
    id: i64,
    name: String,
    description: String,
    category: String,
    tags: String,
    deployment_id: String,
    icon_url: Option<String>,
    version: String,
    rating: f64,
    downloads: i64,
    is_featured: bool,
    created_at: String,
    updated_at: String,
}

impl AppRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            tags: row.get(4)?,
            deployment_id: row.get(5)?,
            icon_url: row.get(6)?,
            version: row.get(7)?,
            rating: row.get(8)?,
            downloads: row.get(9)?,
            is_featured: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_app(self) -> Result<StoredApp> {
        let tags: Vec<String> = serde_json::from_str(&self.tags)
            .with_context(|| format!("Invalid tags JSON for app {}", self.id))?;
        Ok(StoredApp {
            id: self.id,
            record: CatalogRecord {
                name: self.name,
                description: self.description,
                category: self.category,
                tags,
                deployment_id: self.deployment_id,
                icon_url: self.icon_url,
                version: self.version,
                rating: self.rating,
                downloads: self.downloads,
                is_featured: self.is_featured,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_APP: &str = "SELECT id, name, description, category, tags, deployment_id, icon_url,
        version, rating, downloads, is_featured, created_at, updated_at
     FROM mini_apps";

impl CatalogDb {
    /// Open (or create) the catalog at `path` and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog database {}", path.display()))?;
        let db = Self { conn };
        db.run_migrations().context("Failed to run catalog migrations")?;
        Ok(db)
    }

    /// In-memory catalog (for tests and dry runs).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.run_migrations().context("Failed to run catalog migrations")?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS mini_apps (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    category TEXT NOT NULL,
                    tags TEXT NOT NULL DEFAULT '[]',
                    deployment_id TEXT NOT NULL UNIQUE,
                    icon_url TEXT,
                    version TEXT NOT NULL DEFAULT '1.0.0',
                    rating REAL NOT NULL CHECK (rating >= 0 AND rating <= 5),
                    downloads INTEGER NOT NULL DEFAULT 1,
                    is_featured INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_mini_apps_category ON mini_apps(category);
                ",
            )
            .context("Failed to create mini_apps table")?;
        Ok(())
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Insert a new row and return its id. The transaction rolls back if
    /// anything fails; once committed the write is not read back.
    pub fn create(&self, record: &CatalogRecord) -> Result<i64> {
        let tags = serde_json::to_string(&record.tags).context("Failed to serialize tags")?;
        // Safety: CatalogHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO mini_apps
                (name, description, category, tags, deployment_id, icon_url,
                 version, rating, downloads, is_featured)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.name,
                record.description,
                record.category,
                tags,
                record.deployment_id,
                record.icon_url,
                record.version,
                record.rating,
                record.downloads,
                record.is_featured,
            ],
        )
        .context("Failed to insert mini app")?;
        let id = tx.last_insert_rowid();
        tx.commit().context("Failed to commit mini app insert")?;
        Ok(id)
    }

    /// Replace the descriptive fields of the row currently pointing at
    /// `deployment_id` and repoint it at `new_deployment_id`.
    ///
    /// Returns the row id, or `Ok(None)` without touching anything when no
    /// row matches.
    pub fn update(
        &self,
        deployment_id: &str,
        metadata: &AppMetadata,
        new_deployment_id: &str,
    ) -> Result<Option<i64>> {
        let tags = serde_json::to_string(&metadata.tags).context("Failed to serialize tags")?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let id: Option<i64> = tx
            .query_row(
                "SELECT id FROM mini_apps WHERE deployment_id = ?1",
                params![deployment_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up mini app")?;
        let Some(id) = id else {
            return Ok(None);
        };
        tx.execute(
            "UPDATE mini_apps
             SET name = ?1, description = ?2, category = ?3, tags = ?4,
                 deployment_id = ?5, icon_url = ?6, updated_at = datetime('now')
             WHERE id = ?7",
            params![
                metadata.name,
                metadata.description,
                metadata.category,
                tags,
                new_deployment_id,
                metadata.icon,
                id,
            ],
        )
        .context("Failed to update mini app")?;
        tx.commit().context("Failed to commit mini app update")?;
        Ok(Some(id))
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, id: i64) -> Result<Option<StoredApp>> {
        let row = self
            .conn
            .query_row(&format!("{} WHERE id = ?1", SELECT_APP), params![id], AppRow::from_row)
            .optional()
            .context("Failed to query mini app")?;
        row.map(AppRow::into_app).transpose()
    }

    pub fn find_by_deployment(&self, deployment_id: &str) -> Result<Option<StoredApp>> {
        let row = self
            .conn
            .query_row(
                &format!("{} WHERE deployment_id = ?1", SELECT_APP),
                params![deployment_id],
                AppRow::from_row,
            )
            .optional()
            .context("Failed to query mini app by deployment")?;
        row.map(AppRow::into_app).transpose()
    }

    pub fn list(&self) -> Result<Vec<StoredApp>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY id", SELECT_APP))
            .context("Failed to prepare list of mini apps")?;
        let rows = stmt
            .query_map([], AppRow::from_row)
            .context("Failed to query mini apps")?;
        let mut apps = Vec::new();
        for row in rows {
            apps.push(row.context("Failed to read mini app row")?.into_app()?);
        }
        Ok(apps)
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM mini_apps", [], |row| row.get(0))
            .context("Failed to count mini apps")
    }
}
