//! SQLite persistence for analyses, users, and per-user libraries.
//!
//! Connections are opened per call; SQLite serializes writers itself and the
//! call sites are short transactions.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::AnalysisEnvelope;

/// Category assigned when the analysis pipeline provides none.
pub const DEFAULT_CATEGORY: &str = "기타";

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user name already taken: {0}")]
    DuplicateUser(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub user_name: String,
    pub created_at: String,
}

/// One saved analysis as returned by library queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub analysis_id: String,
    pub url: String,
    pub analysis_text: String,
    pub category_name: String,
    pub keywords: Vec<String>,
    pub analyzed_at: String,
    pub saved_at: String,
}

/// SQLite-backed store.
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    pub fn new(db_path: &Path) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS categories (
                category_id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS keywords (
                keyword_id INTEGER PRIMARY KEY AUTOINCREMENT,
                keyword TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS analyses (
                analysis_id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                analysis_text TEXT NOT NULL,
                category_id INTEGER REFERENCES categories(category_id),
                analyzed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS analysis_keywords (
                analysis_id TEXT NOT NULL REFERENCES analyses(analysis_id),
                keyword_id INTEGER NOT NULL REFERENCES keywords(keyword_id),
                PRIMARY KEY (analysis_id, keyword_id)
            );

            CREATE TABLE IF NOT EXISTS library (
                user_id INTEGER NOT NULL REFERENCES users(user_id),
                analysis_id TEXT NOT NULL REFERENCES analyses(analysis_id),
                saved_at TEXT NOT NULL,
                PRIMARY KEY (user_id, analysis_id)
            );
            "#,
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn create_user(&self, user_name: &str) -> Result<UserRecord> {
        let conn = self.connect()?;
        let created_at = Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (user_name, created_at) VALUES (?1, ?2)",
            params![user_name, created_at],
        )?;
        if inserted == 0 {
            return Err(StoreError::DuplicateUser(user_name.to_string()));
        }
        Ok(UserRecord {
            user_id: conn.last_insert_rowid(),
            user_name: user_name.to_string(),
            created_at,
        })
    }

    pub fn find_user_by_name(&self, user_name: &str) -> Result<Option<UserRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, user_name, created_at FROM users WHERE user_name = ?1",
        )?;
        to_option(stmt.query_row(params![user_name], |row| {
            Ok(UserRecord {
                user_id: row.get("user_id")?,
                user_name: row.get("user_name")?,
                created_at: row.get("created_at")?,
            })
        }))
    }

    pub fn find_user_by_id(&self, user_id: i64) -> Result<Option<UserRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, user_name, created_at FROM users WHERE user_id = ?1",
        )?;
        to_option(stmt.query_row(params![user_id], |row| {
            Ok(UserRecord {
                user_id: row.get("user_id")?,
                user_name: row.get("user_name")?,
                created_at: row.get("created_at")?,
            })
        }))
    }

    pub fn delete_user(&self, user_id: i64) -> Result<bool> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM library WHERE user_id = ?1", params![user_id])?;
        let rows = conn.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
        Ok(rows > 0)
    }

    // ------------------------------------------------------------------
    // Analyses
    // ------------------------------------------------------------------

    pub fn analysis_exists(&self, analysis_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM analyses WHERE analysis_id = ?1",
            params![analysis_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Persist an analysis with its category and keyword links.
    /// Already-stored analyses are left untouched; the identifier is
    /// content-derived, so a re-run produces the same row.
    pub fn save_analysis(&self, envelope: &AnalysisEnvelope, category_name: &str) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let already: i64 = tx.query_row(
            "SELECT COUNT(*) FROM analyses WHERE analysis_id = ?1",
            params![envelope.analysis_id],
            |row| row.get(0),
        )?;
        if already == 0 {
            let category_id = find_or_create_category(&tx, category_name)?;
            tx.execute(
                "INSERT INTO analyses (analysis_id, url, analysis_text, category_id, analyzed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    envelope.analysis_id,
                    envelope.url,
                    envelope.analysis_text,
                    category_id,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            for keyword in &envelope.keywords {
                let keyword_id = find_or_create_keyword(&tx, keyword)?;
                tx.execute(
                    "INSERT OR IGNORE INTO analysis_keywords (analysis_id, keyword_id)
                     VALUES (?1, ?2)",
                    params![envelope.analysis_id, keyword_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    /// Link an analysis into a user's library. Saving twice is a no-op.
    pub fn add_to_library(&self, user_id: i64, analysis_id: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO library (user_id, analysis_id, saved_at) VALUES (?1, ?2, ?3)",
            params![user_id, analysis_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// All library entries for a user, most recently saved first.
    pub fn library_for_user(&self, user_id: i64) -> Result<Vec<LibraryEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT a.analysis_id, a.url, a.analysis_text, a.analyzed_at, l.saved_at,
                   COALESCE(c.category_name, ?2) AS category_name
            FROM library l
            JOIN analyses a ON a.analysis_id = l.analysis_id
            LEFT JOIN categories c ON c.category_id = a.category_id
            WHERE l.user_id = ?1
            ORDER BY l.saved_at DESC
            "#,
        )?;

        let mut entries = stmt
            .query_map(params![user_id, DEFAULT_CATEGORY], |row| {
                Ok(LibraryEntry {
                    analysis_id: row.get("analysis_id")?,
                    url: row.get("url")?,
                    analysis_text: row.get("analysis_text")?,
                    category_name: row.get("category_name")?,
                    keywords: Vec::new(),
                    analyzed_at: row.get("analyzed_at")?,
                    saved_at: row.get("saved_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for entry in &mut entries {
            entry.keywords = self.keywords_for_analysis(&conn, &entry.analysis_id)?;
        }
        Ok(entries)
    }

    pub fn remove_from_library(&self, user_id: i64, analysis_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let rows = conn.execute(
            "DELETE FROM library WHERE user_id = ?1 AND analysis_id = ?2",
            params![user_id, analysis_id],
        )?;
        Ok(rows > 0)
    }

    fn keywords_for_analysis(&self, conn: &Connection, analysis_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT k.keyword
            FROM analysis_keywords ak
            JOIN keywords k ON k.keyword_id = ak.keyword_id
            WHERE ak.analysis_id = ?1
            ORDER BY k.keyword
            "#,
        )?;
        let keywords = stmt
            .query_map(params![analysis_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keywords)
    }
}

fn find_or_create_category(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO categories (category_name) VALUES (?1)",
        params![name],
    )?;
    conn.query_row(
        "SELECT category_id FROM categories WHERE category_name = ?1",
        params![name],
        |row| row.get(0),
    )
}

fn find_or_create_keyword(conn: &Connection, keyword: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO keywords (keyword) VALUES (?1)",
        params![keyword],
    )?;
    conn.query_row(
        "SELECT keyword_id FROM keywords WHERE keyword = ?1",
        params![keyword],
        |row| row.get(0),
    )
}

/// Map a no-rows query result to `None`.
fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
