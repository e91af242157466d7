//! libSQL storage layer for the wiki replica and the project index.
//!
//! Two stores back the rebuild pipeline:
//! - [`WikiStore`] — the wiki database replica (pages, redirects, category
//!   membership). Opened read-only by the pipeline; read-write open exists
//!   for seeding local replica snapshots and tests.
//! - [`IndexStore`] — the index database owned by WikiScope: the live
//!   `projectindex` generation, the [`StagedIndex`] staging generation, and
//!   rebuild-run history.
//!
//! **Query discipline:** every value rides in a bound parameter. Where a
//! statement needs a variable-length `IN (…)` or `VALUES (…)` list, only the
//! *placeholder count* is interpolated into the SQL text, never a value.
//! Every query is wrapped in an explicit timeout so a hung store cannot
//! block a rebuild indefinitely.

mod migrations;

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use libsql::params::IntoParams;
use libsql::{Connection, Database, Value, params};
use tracing::info;

use wikiscope_shared::{Result, RunId, ScopeRecord, WikiScopeError};

// ---------------------------------------------------------------------------
// Query helpers
// ---------------------------------------------------------------------------

/// Run a read query under `timeout`.
async fn query_with_timeout(
    conn: &Connection,
    timeout: Duration,
    sql: &str,
    params: impl IntoParams,
) -> Result<libsql::Rows> {
    match tokio::time::timeout(timeout, conn.query(sql, params)).await {
        Ok(result) => result.map_err(|e| WikiScopeError::Store(e.to_string())),
        Err(_) => Err(WikiScopeError::Store(format!(
            "query exceeded {}s timeout",
            timeout.as_secs()
        ))),
    }
}

/// Run a write statement under `timeout`.
async fn execute_with_timeout(
    conn: &Connection,
    timeout: Duration,
    sql: &str,
    params: impl IntoParams,
) -> Result<u64> {
    match tokio::time::timeout(timeout, conn.execute(sql, params)).await {
        Ok(result) => result.map_err(|e| WikiScopeError::Store(e.to_string())),
        Err(_) => Err(WikiScopeError::Store(format!(
            "statement exceeded {}s timeout",
            timeout.as_secs()
        ))),
    }
}

/// Run a multi-statement batch under `timeout`.
async fn execute_batch_with_timeout(
    conn: &Connection,
    timeout: Duration,
    sql: &str,
) -> Result<()> {
    match tokio::time::timeout(timeout, conn.execute_batch(sql)).await {
        Ok(result) => result.map(|_| ()).map_err(|e| WikiScopeError::Store(e.to_string())),
        Err(_) => Err(WikiScopeError::Store(format!(
            "batch exceeded {}s timeout",
            timeout.as_secs()
        ))),
    }
}

/// `?, ?, …` with exactly `count` placeholders.
fn placeholders(count: usize) -> String {
    let mut s = String::with_capacity(count * 3);
    for i in 0..count {
        if i > 0 {
            s.push_str(", ");
        }
        s.push('?');
    }
    s
}

// ---------------------------------------------------------------------------
// WikiStore
// ---------------------------------------------------------------------------

/// Minimal mirror of the replica tables the rebuild reads. A replica
/// snapshot is not a schema we version, so this is a plain bootstrap rather
/// than a migration.
const REPLICA_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS page (
    page_id        INTEGER PRIMARY KEY,
    page_namespace INTEGER NOT NULL,
    page_title     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_page_ns_title ON page(page_namespace, page_title);

CREATE TABLE IF NOT EXISTS redirect (
    rd_from      INTEGER PRIMARY KEY,
    rd_namespace INTEGER,
    rd_title     TEXT
);

CREATE TABLE IF NOT EXISTS categorylinks (
    cl_from INTEGER NOT NULL,
    cl_to   TEXT NOT NULL,
    PRIMARY KEY (cl_from, cl_to)
);

CREATE INDEX IF NOT EXISTS idx_categorylinks_to ON categorylinks(cl_to);
"#;

/// Selects the quality-assessment category universe from the category
/// namespace. The include patterns pick up `…-Class_…_articles`,
/// `Unassessed_…_articles`, and `WikiProject_…_articles`; the exclusions
/// weed out importance/priority ratings, non-article assessment grades, and
/// a handful of known stray category families.
const ASSESSMENT_CATEGORY_SQL: &str = "\
SELECT page_title FROM page \
WHERE page_namespace = 14 \
AND (page_title LIKE '%-Class_%_articles' \
     OR page_title LIKE 'Unassessed_%_articles' \
     OR page_title LIKE 'WikiProject_%_articles') \
AND page_title NOT LIKE '%-importance_%' \
AND page_title NOT LIKE 'Wikipedia_%' \
AND page_title NOT LIKE 'Template-%' \
AND page_title NOT LIKE 'Redirect-%' \
AND page_title NOT LIKE 'Project-%' \
AND page_title NOT LIKE 'Portal-%' \
AND page_title NOT LIKE 'File-%' \
AND page_title NOT LIKE 'FM-%' \
AND page_title NOT LIKE 'Category-%' \
AND page_title NOT LIKE 'Cat-%' \
AND page_title NOT LIKE 'Book-%' \
AND page_title NOT LIKE 'NA-%' \
AND page_title NOT LIKE '%_Operation_Majestic_Titan_%' \
AND page_title NOT LIKE '%_Version_%' \
AND page_title NOT LIKE 'All_Wikipedia_%' \
AND page_title NOT LIKE '%_Wikipedia-Books_%' \
AND page_title NOT LIKE 'Assessed-%' \
AND page_title NOT LIKE '%-Priority_%' \
AND page_title NOT LIKE 'Unassessed_field_%' \
AND page_title NOT LIKE 'Unassessed_importance_%' \
AND page_title NOT LIKE 'Unassessed-Class_articles' \
AND page_title NOT LIKE '%_Article_quality_research_articles' \
AND page_title NOT LIKE 'WikiProject_lists_of_encyclopedic_articles'";

/// A project-page lookup row: the matched page plus its redirect target
/// columns (null when the page is not a redirect).
#[derive(Debug, Clone)]
pub struct ProjectPageRow {
    /// Title of the matched page.
    pub page_title: String,
    /// Redirect target namespace, if the page is a redirect.
    pub rd_namespace: Option<i64>,
    /// Redirect target title, if the page is a redirect.
    pub rd_title: Option<String>,
}

/// Read handle over the wiki replica database.
pub struct WikiStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    query_timeout: Duration,
}

impl WikiStore {
    /// Open (or create) a replica database at `path` in read-write mode.
    /// Used for seeding local snapshots; the rebuild pipeline opens
    /// read-only.
    pub async fn open(path: &Path, query_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WikiScopeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| WikiScopeError::Store(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| WikiScopeError::Store(e.to_string()))?;

        execute_batch_with_timeout(&conn, query_timeout, REPLICA_SCHEMA_SQL).await?;

        Ok(Self {
            db,
            conn,
            readonly: false,
            query_timeout,
        })
    }

    /// Open a replica database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path, query_timeout: Duration) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| WikiScopeError::Store(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| WikiScopeError::Store(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
            query_timeout,
        })
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(WikiScopeError::Store(
                "replica is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rebuild reads
    // -----------------------------------------------------------------------

    /// All quality-assessment category titles — the raw category universe
    /// the rebuild partitions into project buckets.
    pub async fn assessment_categories(&self) -> Result<Vec<String>> {
        let mut rows = query_with_timeout(
            &self.conn,
            self.query_timeout,
            ASSESSMENT_CATEGORY_SQL,
            params![],
        )
        .await?;

        let mut titles = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            titles.push(
                row.get::<String>(0)
                    .map_err(|e| WikiScopeError::Store(e.to_string()))?,
            );
        }
        Ok(titles)
    }

    /// Look up a page by exact title in the project namespace, joined
    /// against the redirect table so a redirect can be followed in the same
    /// round trip.
    pub async fn project_page(&self, title: &str) -> Result<Option<ProjectPageRow>> {
        let mut rows = query_with_timeout(
            &self.conn,
            self.query_timeout,
            "SELECT page.page_title, redirect.rd_namespace, redirect.rd_title \
             FROM page LEFT JOIN redirect ON redirect.rd_from = page.page_id \
             WHERE page.page_title = ?1 AND page.page_namespace = ?2",
            params![title, wikiscope_shared::PROJECT_NAMESPACE],
        )
        .await?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(ProjectPageRow {
                page_title: row
                    .get::<String>(0)
                    .map_err(|e| WikiScopeError::Store(e.to_string()))?,
                rd_namespace: row.get::<i64>(1).ok(),
                rd_title: row.get::<String>(2).ok(),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(WikiScopeError::Store(e.to_string())),
        }
    }

    /// Distinct `(page_title, page_namespace)` rows for every page in the
    /// discussion namespaces classified under any of `categories`.
    pub async fn discussion_pages_in_categories(
        &self,
        categories: &[String],
    ) -> Result<Vec<(String, i64)>> {
        if categories.is_empty() {
            return Err(WikiScopeError::validation(
                "scope query requires at least one category",
            ));
        }

        let ns = wikiscope_shared::DISCUSSION_NAMESPACES;
        let sql = format!(
            "SELECT DISTINCT page.page_title, page.page_namespace \
             FROM categorylinks JOIN page ON categorylinks.cl_from = page.page_id \
             WHERE page.page_namespace IN ({}) AND categorylinks.cl_to IN ({})",
            placeholders(ns.len()),
            placeholders(categories.len()),
        );

        let mut values: Vec<Value> = ns.iter().map(|&n| Value::from(n)).collect();
        values.extend(categories.iter().map(|c| Value::from(c.clone())));

        let mut rows = query_with_timeout(&self.conn, self.query_timeout, &sql, values).await?;

        let mut pages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            pages.push((
                row.get::<String>(0)
                    .map_err(|e| WikiScopeError::Store(e.to_string()))?,
                row.get::<i64>(1)
                    .map_err(|e| WikiScopeError::Store(e.to_string()))?,
            ));
        }
        Ok(pages)
    }

    // -----------------------------------------------------------------------
    // Snapshot seeding
    // -----------------------------------------------------------------------

    /// Insert a page row into a local replica snapshot.
    pub async fn insert_page(&self, page_id: i64, namespace: i64, title: &str) -> Result<()> {
        self.check_writable()?;
        execute_with_timeout(
            &self.conn,
            self.query_timeout,
            "INSERT INTO page (page_id, page_namespace, page_title) VALUES (?1, ?2, ?3)",
            params![page_id, namespace, title],
        )
        .await?;
        Ok(())
    }

    /// Mark a page as a redirect to `(namespace, title)`.
    pub async fn insert_redirect(&self, from: i64, namespace: i64, title: &str) -> Result<()> {
        self.check_writable()?;
        execute_with_timeout(
            &self.conn,
            self.query_timeout,
            "INSERT INTO redirect (rd_from, rd_namespace, rd_title) VALUES (?1, ?2, ?3)",
            params![from, namespace, title],
        )
        .await?;
        Ok(())
    }

    /// Record category membership for a page.
    pub async fn insert_category_link(&self, from: i64, to: &str) -> Result<()> {
        self.check_writable()?;
        execute_with_timeout(
            &self.conn,
            self.query_timeout,
            "INSERT INTO categorylinks (cl_from, cl_to) VALUES (?1, ?2)",
            params![from, to],
        )
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// IndexStore
// ---------------------------------------------------------------------------

/// Read-write handle over the index database.
pub struct IndexStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    query_timeout: Duration,
}

impl IndexStore {
    /// Open or create the index database at `path` and apply pending
    /// migrations.
    pub async fn open(path: &Path, query_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WikiScopeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| WikiScopeError::Store(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| WikiScopeError::Store(e.to_string()))?;

        let store = Self {
            db,
            conn,
            query_timeout,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                execute_batch_with_timeout(&self.conn, self.query_timeout, migration.sql)
                    .await
                    .map_err(|e| {
                        WikiScopeError::Store(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Published read interface
    // -----------------------------------------------------------------------

    /// Distinct project names whose scope contains `page`, against the live
    /// generation. This is the query the discussion-aggregation collaborator
    /// consumes.
    pub async fn projects_for_page(&self, page: &str) -> Result<Vec<String>> {
        let mut rows = query_with_timeout(
            &self.conn,
            self.query_timeout,
            "SELECT DISTINCT pi_project FROM projectindex \
             WHERE pi_page = ?1 ORDER BY pi_project",
            params![page],
        )
        .await?;

        let mut projects = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            projects.push(
                row.get::<String>(0)
                    .map_err(|e| WikiScopeError::Store(e.to_string()))?,
            );
        }
        Ok(projects)
    }

    /// Number of records in the live generation.
    pub async fn live_record_count(&self) -> Result<u64> {
        let mut rows = query_with_timeout(
            &self.conn,
            self.query_timeout,
            "SELECT COUNT(*) FROM projectindex",
            params![],
        )
        .await?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<u64>(0)
                .map_err(|e| WikiScopeError::Store(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(WikiScopeError::Store(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Staging generation
    // -----------------------------------------------------------------------

    /// Create an empty staging generation, dropping any leftover from an
    /// aborted run. The live generation is untouched until
    /// [`StagedIndex::commit`].
    pub async fn begin_staging(&self) -> Result<StagedIndex> {
        execute_batch_with_timeout(
            &self.conn,
            self.query_timeout,
            "DROP TABLE IF EXISTS projectindex_staging;\n\
             CREATE TABLE projectindex_staging (\n\
                 pi_id      INTEGER PRIMARY KEY AUTOINCREMENT,\n\
                 pi_page    TEXT NOT NULL,\n\
                 pi_project TEXT NOT NULL\n\
             );",
        )
        .await?;

        Ok(StagedIndex {
            conn: self.conn.clone(),
            query_timeout: self.query_timeout,
        })
    }

    // -----------------------------------------------------------------------
    // Rebuild run history
    // -----------------------------------------------------------------------

    /// Record the start of a rebuild run.
    pub async fn insert_rebuild_run(&self, run: &RunId) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        execute_with_timeout(
            &self.conn,
            self.query_timeout,
            "INSERT INTO rebuild_runs (id, started_at) VALUES (?1, ?2)",
            params![run.to_string(), now.as_str()],
        )
        .await?;
        Ok(())
    }

    /// Record completion of a rebuild run with its stats.
    pub async fn finish_rebuild_run(&self, run: &RunId, stats_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        execute_with_timeout(
            &self.conn,
            self.query_timeout,
            "UPDATE rebuild_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
            params![now.as_str(), stats_json, run.to_string()],
        )
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StagedIndex
// ---------------------------------------------------------------------------

/// The in-progress index generation. Invisible to readers until `commit`;
/// `discard` (or the next rebuild's `begin_staging`) removes it without
/// touching the live generation.
pub struct StagedIndex {
    conn: Connection,
    query_timeout: Duration,
}

impl StagedIndex {
    /// Append one chunk of records as a single bulk-insert statement.
    /// Returns the number of rows written.
    pub async fn insert_batch(&self, records: &[ScopeRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut sql =
            String::from("INSERT INTO projectindex_staging (pi_page, pi_project) VALUES ");
        for i in 0..records.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?)");
        }

        let mut values: Vec<Value> = Vec::with_capacity(records.len() * 2);
        for record in records {
            values.push(Value::from(record.page.clone()));
            values.push(Value::from(record.project.to_string()));
        }

        execute_with_timeout(&self.conn, self.query_timeout, &sql, values).await
    }

    /// Atomically promote this generation to live. Readers observe either
    /// the old generation or the new one, never a mixture; on failure the
    /// old generation remains live.
    pub async fn commit(self) -> Result<()> {
        execute_batch_with_timeout(
            &self.conn,
            self.query_timeout,
            "BEGIN IMMEDIATE;\n\
             DROP TABLE IF EXISTS projectindex;\n\
             ALTER TABLE projectindex_staging RENAME TO projectindex;\n\
             CREATE INDEX IF NOT EXISTS idx_projectindex_page ON projectindex(pi_page);\n\
             COMMIT;",
        )
        .await
        .map_err(|e| WikiScopeError::Promotion(e.to_string()))
    }

    /// Drop this generation. The live generation is untouched.
    pub async fn discard(self) -> Result<()> {
        execute_with_timeout(
            &self.conn,
            self.query_timeout,
            "DROP TABLE IF EXISTS projectindex_staging",
            params![],
        )
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
