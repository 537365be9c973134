// src/db/sales_repo.rs

use sqlx::{types::Json, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::sales::{NewSale, Sale, UpdateSalePayload},
};

// O repositório de vendedores, responsável pela tabela 'sales'
#[derive(Clone, Default)]
pub struct SalesRepository;

impl SalesRepository {
    pub fn new() -> Self {
        Self
    }

    // Comparação sem diferenciar maiúsculas (mesmo critério do índice único)
    pub async fn find_by_email<'e, E>(&self, executor: E, email: &str) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE lower(email) = lower($1)")
            .bind(email.trim())
            .fetch_optional(executor)
            .await?;

        Ok(sale)
    }

    pub async fn find_by_user_id<'e, E>(&self, executor: E, user_id: Uuid) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(executor)
            .await?;

        Ok(sale)
    }

    pub async fn create<'e, E>(&self, executor: E, sale: &NewSale) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (first_name, last_name, email, administrator, disabled, avatar, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&sale.first_name)
        .bind(&sale.last_name)
        .bind(sale.email.trim())
        .bind(sale.administrator)
        .bind(sale.disabled)
        .bind(sale.avatar.as_ref().map(Json))
        .bind(sale.user_id)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::EmailAlreadyExists))
    }

    /// Atualização parcial: campos `None` mantêm o valor atual.
    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: i64,
        patch: &UpdateSalePayload,
    ) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                avatar = COALESCE($5, avatar),
                administrator = COALESCE($6, administrator),
                disabled = COALESCE($7, disabled)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.first_name.as_deref())
        .bind(patch.last_name.as_deref())
        .bind(patch.email.as_deref().map(str::trim))
        .bind(patch.avatar.as_ref().map(Json))
        .bind(patch.administrator)
        .bind(patch.disabled)
        .fetch_optional(executor)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::EmailAlreadyExists))
    }
}
