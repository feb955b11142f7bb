//! Persistence and selection of offer-letter templates.
//!
//! Templates live in `offer_letter_templates`; the programs each one applies
//! to live in `offer_letter_template_programs`. The file itself is kept in
//! the media store and only its relative path is recorded here.

use crate::db::{timestamp, StorageError};
use crate::media::StoredFile;
use chrono::{DateTime, Utc};
use common::model::template::{OfferTemplate, TemplateStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};

#[derive(Debug, thiserror::Error)]
pub enum TemplateStoreError {
    #[error("No template uploaded for program {program_id}")]
    NoTemplateAvailable { program_id: i64 },
    #[error("template {template_id} not found")]
    NotFound { template_id: i64 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for TemplateStoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(err))
    }
}

/// Fields of a template that is about to be stored.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub file_path: String,
    pub file_url: String,
    pub status: TemplateStatus,
    pub programs: Vec<i64>,
    pub uploaded_at: DateTime<Utc>,
}

/// Returns the template to use for an applicant admitted to `program_id`.
///
/// Only active templates bound to the program qualify; the most recently
/// uploaded one wins. Two templates with the same `uploaded_at` are ordered
/// by row id, so the one inserted last is chosen.
pub fn select_for_program(
    conn: &Connection,
    program_id: i64,
) -> Result<OfferTemplate, TemplateStoreError> {
    let template_id: Option<i64> = conn
        .query_row(
            "SELECT t.id FROM offer_letter_templates t
             JOIN offer_letter_template_programs tp ON tp.template_id = t.id
             WHERE tp.program_id = ?1 AND t.status = ?2
             ORDER BY t.uploaded_at DESC, t.id DESC
             LIMIT 1",
            params![program_id, TemplateStatus::Active.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    match template_id {
        Some(id) => load(conn, id),
        None => Err(TemplateStoreError::NoTemplateAvailable { program_id }),
    }
}

pub fn load(conn: &Connection, template_id: i64) -> Result<OfferTemplate, TemplateStoreError> {
    let template = conn
        .query_row(
            "SELECT id, name, file_path, file_url, status, uploaded_at
             FROM offer_letter_templates WHERE id = ?1",
            params![template_id],
            template_from_row,
        )
        .optional()?
        .ok_or(TemplateStoreError::NotFound { template_id })?;
    with_programs(conn, template?)
}

pub fn list(conn: &Connection) -> Result<Vec<OfferTemplate>, TemplateStoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, file_path, file_url, status, uploaded_at
         FROM offer_letter_templates ORDER BY uploaded_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([], template_from_row)?;

    let mut templates = Vec::new();
    for row in rows {
        templates.push(with_programs(conn, row??)?);
    }
    Ok(templates)
}

pub fn insert(
    conn: &mut Connection,
    template: NewTemplate,
) -> Result<OfferTemplate, TemplateStoreError> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO offer_letter_templates (name, file_path, file_url, status, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            template.name,
            template.file_path,
            template.file_url,
            template.status.as_str(),
            timestamp(template.uploaded_at)
        ],
    )?;
    let id = tx.last_insert_rowid();
    for program_id in &template.programs {
        tx.execute(
            "INSERT OR IGNORE INTO offer_letter_template_programs (template_id, program_id)
             VALUES (?1, ?2)",
            params![id, program_id],
        )?;
    }
    tx.commit()?;
    load(conn, id)
}

pub fn set_status(
    conn: &Connection,
    template_id: i64,
    status: TemplateStatus,
) -> Result<OfferTemplate, TemplateStoreError> {
    let changed = conn.execute(
        "UPDATE offer_letter_templates SET status = ?1 WHERE id = ?2",
        params![status.as_str(), template_id],
    )?;
    if changed == 0 {
        return Err(TemplateStoreError::NotFound { template_id });
    }
    load(conn, template_id)
}

/// Edits to an existing template. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TemplateChanges {
    pub name: Option<String>,
    pub status: Option<TemplateStatus>,
    /// Replaces every program binding when set.
    pub programs: Option<Vec<i64>>,
    pub file: Option<StoredFile>,
}

/// Applies `changes` in one transaction and returns the template as it was
/// before and as it is now, so the caller can drop a replaced file.
pub fn update(
    conn: &mut Connection,
    template_id: i64,
    changes: TemplateChanges,
) -> Result<(OfferTemplate, OfferTemplate), TemplateStoreError> {
    let previous = load(conn, template_id)?;
    let (file_path, file_url) = match changes.file {
        Some(file) => (file.relative_path, file.url),
        None => (previous.file_path.clone(), previous.file_url.clone()),
    };

    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE offer_letter_templates
         SET name = ?1, status = ?2, file_path = ?3, file_url = ?4
         WHERE id = ?5",
        params![
            changes.name.unwrap_or_else(|| previous.name.clone()),
            changes.status.unwrap_or(previous.status).as_str(),
            file_path,
            file_url,
            template_id
        ],
    )?;
    if let Some(programs) = &changes.programs {
        tx.execute(
            "DELETE FROM offer_letter_template_programs WHERE template_id = ?1",
            params![template_id],
        )?;
        for program_id in programs {
            tx.execute(
                "INSERT OR IGNORE INTO offer_letter_template_programs (template_id, program_id)
                 VALUES (?1, ?2)",
                params![template_id, program_id],
            )?;
        }
    }
    tx.commit()?;

    let updated = load(conn, template_id)?;
    Ok((previous, updated))
}

/// Removes a template and its program bindings, returning what was removed
/// so the caller can delete the stored file.
pub fn delete(
    conn: &mut Connection,
    template_id: i64,
) -> Result<OfferTemplate, TemplateStoreError> {
    let template = load(conn, template_id)?;
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM offer_letter_template_programs WHERE template_id = ?1",
        params![template_id],
    )?;
    tx.execute(
        "DELETE FROM offer_letter_templates WHERE id = ?1",
        params![template_id],
    )?;
    tx.commit()?;
    Ok(template)
}

/// Whether any template still points at the stored file. Uploads are named
/// by content digest, so several templates can share one file.
pub fn is_file_referenced(conn: &Connection, file_path: &str) -> Result<bool, TemplateStoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM offer_letter_templates WHERE file_path = ?1",
        params![file_path],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<Result<OfferTemplate, StorageError>> {
    let status: String = row.get(4)?;
    let uploaded_at: String = row.get(5)?;

    let status = match status.parse::<TemplateStatus>() {
        Ok(status) => status,
        Err(_) => {
            return Ok(Err(StorageError::Corrupt {
                column: "offer_letter_templates.status",
                value: status,
            }))
        }
    };
    let uploaded_at = match DateTime::parse_from_rfc3339(&uploaded_at) {
        Ok(at) => at.with_timezone(&Utc),
        Err(_) => {
            return Ok(Err(StorageError::Corrupt {
                column: "offer_letter_templates.uploaded_at",
                value: uploaded_at,
            }))
        }
    };

    Ok(Ok(OfferTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        file_path: row.get(2)?,
        file_url: row.get(3)?,
        status,
        programs: Vec::new(),
        uploaded_at,
    }))
}

fn with_programs(
    conn: &Connection,
    mut template: OfferTemplate,
) -> Result<OfferTemplate, TemplateStoreError> {
    let mut stmt = conn.prepare(
        "SELECT program_id FROM offer_letter_template_programs
         WHERE template_id = ?1 ORDER BY program_id",
    )?;
    template.programs = stmt
        .query_map(params![template.id], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(template)
}
