// src/db/contact_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{types::Json, Executor, Postgres};

use crate::{
    common::error::AppError,
    models::contacts::{Contact, NewContact},
};

#[derive(Clone, Default)]
pub struct ContactRepository;

impl ContactRepository {
    pub fn new() -> Self {
        Self
    }

    /// Mesma busca, travando a linha até o fim da transação.
    pub async fn find_by_id_for_update<'e, E>(&self, executor: E, id: i64) -> Result<Option<Contact>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contact = sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(contact)
    }

    // Procura dentro do array JSONB de e-mails
    pub async fn find_by_email<'e, E>(&self, executor: E, email: &str) -> Result<Option<Contact>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM contacts
            WHERE EXISTS (
                SELECT 1 FROM jsonb_array_elements(email_jsonb) AS e
                WHERE lower(e->>'email') = lower($1)
            )
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(email.trim())
        .fetch_optional(executor)
        .await?;

        Ok(contact)
    }

    pub async fn create<'e, E>(&self, executor: E, contact: &NewContact) -> Result<Contact, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (
                first_name, last_name, gender, title, company_id, email_jsonb,
                phone_jsonb, background, first_seen, last_seen, has_newsletter,
                status, tags, sales_id, linkedin_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(contact.first_name.as_deref())
        .bind(contact.last_name.as_deref())
        .bind(contact.gender.as_deref())
        .bind(contact.title.as_deref())
        .bind(contact.company_id)
        .bind(Json(&contact.email_jsonb))
        .bind(Json(&contact.phone_jsonb))
        .bind(contact.background.as_deref())
        .bind(contact.first_seen)
        .bind(contact.last_seen)
        .bind(contact.has_newsletter)
        .bind(contact.status.as_deref())
        .bind(&contact.tags)
        .bind(contact.sales_id)
        .bind(contact.linkedin_url.as_deref())
        .fetch_one(executor)
        .await?;

        Ok(created)
    }

    /// Regrava todos os campos editáveis do contato.
    pub async fn update<'e, E>(&self, executor: E, contact: &Contact) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE contacts SET
                first_name = $2, last_name = $3, gender = $4, title = $5,
                company_id = $6, email_jsonb = $7, phone_jsonb = $8,
                background = $9, avatar = $10, first_seen = $11, last_seen = $12,
                has_newsletter = $13, status = $14, tags = $15, sales_id = $16,
                linkedin_url = $17
            WHERE id = $1
            "#,
        )
        .bind(contact.id)
        .bind(contact.first_name.as_deref())
        .bind(contact.last_name.as_deref())
        .bind(contact.gender.as_deref())
        .bind(contact.title.as_deref())
        .bind(contact.company_id)
        .bind(&contact.email_jsonb)
        .bind(&contact.phone_jsonb)
        .bind(contact.background.as_deref())
        .bind(contact.avatar.as_ref())
        .bind(contact.first_seen)
        .bind(contact.last_seen)
        .bind(contact.has_newsletter)
        .bind(contact.status.as_deref())
        .bind(&contact.tags)
        .bind(contact.sales_id)
        .bind(contact.linkedin_url.as_deref())
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn delete<'e, E>(&self, executor: E, id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn touch_last_seen<'e, E>(&self, executor: E, id: i64, seen_at: DateTime<Utc>) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE contacts SET last_seen = GREATEST(COALESCE(last_seen, $2), $2) WHERE id = $1",
        )
        .bind(id)
        .bind(seen_at)
        .execute(executor)
        .await?;

        Ok(())
    }
}
