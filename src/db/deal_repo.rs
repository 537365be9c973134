// src/db/deal_repo.rs

use sqlx::{Executor, Postgres};

use crate::{common::error::AppError, models::deals::DealContacts};

#[derive(Clone, Default)]
pub struct DealRepository;

impl DealRepository {
    pub fn new() -> Self {
        Self
    }

    /// Negócios cujo `contact_ids` contém o contato, travados para atualização.
    pub async fn list_with_contact<'e, E>(&self, executor: E, contact_id: i64) -> Result<Vec<DealContacts>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let deals = sqlx::query_as::<_, DealContacts>(
            r#"
            SELECT id, contact_ids FROM deals
            WHERE contact_ids @> ARRAY[$1]::BIGINT[]
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(contact_id)
        .fetch_all(executor)
        .await?;

        Ok(deals)
    }

    pub async fn update_contact_ids<'e, E>(&self, executor: E, deal_id: i64, contact_ids: &[i64]) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE deals SET contact_ids = $2, updated_at = NOW() WHERE id = $1")
            .bind(deal_id)
            .bind(contact_ids)
            .execute(executor)
            .await?;

        Ok(())
    }
}
