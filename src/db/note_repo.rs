// src/db/note_repo.rs

use sqlx::{types::Json, Executor, Postgres};

use crate::{
    common::error::AppError,
    models::notes::{ContactNote, NewContactNote},
};

#[derive(Clone, Default)]
pub struct NoteRepository;

impl NoteRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_contact_note<'e, E>(&self, executor: E, note: &NewContactNote) -> Result<ContactNote, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, ContactNote>(
            r#"
            INSERT INTO contact_notes (contact_id, text, date, sales_id, status, attachments)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(note.contact_id)
        .bind(note.text.as_deref())
        .bind(note.date)
        .bind(note.sales_id)
        .bind(note.status.as_deref())
        .bind(Json(&note.attachments))
        .fetch_one(executor)
        .await?;

        Ok(created)
    }

    // Retorna quantas notas mudaram de dono
    pub async fn reassign_contact_notes<'e, E>(&self, executor: E, from_contact: i64, to_contact: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("UPDATE contact_notes SET contact_id = $2 WHERE contact_id = $1")
            .bind(from_contact)
            .bind(to_contact)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
