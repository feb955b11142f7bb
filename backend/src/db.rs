//! SQLite access shared by every service.
//!
//! Like the rest of the backend, callers open a short-lived connection per
//! operation instead of holding a pool; SQLite serializes writers itself.

use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS campuses (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    code TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS programs (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    code TEXT NOT NULL DEFAULT '',
    min_years INTEGER NOT NULL DEFAULT 0,
    max_years INTEGER NOT NULL DEFAULT 0,
    tuition_fee TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    academic_year TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS applications (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    middle_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL,
    email TEXT NOT NULL,
    study_mode TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'draft',
    admission_letter_docx TEXT,
    admission_letter_pdf TEXT,
    offer_letter_status TEXT NOT NULL DEFAULT 'pending',
    offer_letter_progress INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS admitted_students (
    id INTEGER PRIMARY KEY,
    application_id INTEGER NOT NULL UNIQUE REFERENCES applications(id),
    student_id TEXT,
    reg_no TEXT,
    admitted_program_id INTEGER NOT NULL REFERENCES programs(id),
    admitted_batch_id INTEGER REFERENCES batches(id),
    admitted_campus_id INTEGER REFERENCES campuses(id),
    admission_date TEXT NOT NULL,
    admission_letter_sent INTEGER NOT NULL DEFAULT 0,
    admission_letter_sent_at TEXT
);

CREATE TABLE IF NOT EXISTS offer_letter_templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    file_url TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    uploaded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS offer_letter_template_programs (
    template_id INTEGER NOT NULL REFERENCES offer_letter_templates(id) ON DELETE CASCADE,
    program_id INTEGER NOT NULL,
    PRIMARY KEY (template_id, program_id)
);

CREATE TABLE IF NOT EXISTS portal_notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    application_id INTEGER NOT NULL REFERENCES applications(id),
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS mail_outbox (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender TEXT NOT NULL,
    recipient TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    attachment TEXT,
    queued_at TEXT NOT NULL,
    sent_at TEXT
);
"#;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("file storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected value in column {column}: {value}")]
    Corrupt { column: &'static str, value: String },
}

/// Handle to the portal database file.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Creates any missing tables. Safe to call on every startup.
    pub fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.open()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

/// Timestamp format used for every stored `*_at` column. Fixed precision
/// keeps lexical order equal to chronological order.
pub fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub fn now() -> String {
    timestamp(chrono::Utc::now())
}
