// src/db/configuration_repo.rs

use serde_json::Value;
use sqlx::{types::Json, Executor, Postgres};

use crate::common::error::AppError;

#[derive(Clone, Default)]
pub struct ConfigurationRepository;

impl ConfigurationRepository {
    pub fn new() -> Self {
        Self
    }

    // A configuração é uma linha única (id = 1)
    pub async fn get<'e, E>(&self, executor: E) -> Result<Option<Value>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row: Option<(Json<Value>,)> = sqlx::query_as("SELECT config FROM configuration WHERE id = 1")
            .fetch_optional(executor)
            .await?;

        Ok(row.map(|(config,)| config.0))
    }

    // UPSERT (Insert or Update)
    pub async fn upsert<'e, E>(&self, executor: E, config: &Value) -> Result<Value, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (saved,): (Json<Value>,) = sqlx::query_as(
            r#"
            INSERT INTO configuration (id, config) VALUES (1, $1)
            ON CONFLICT (id)
            DO UPDATE SET config = EXCLUDED.config, updated_at = NOW()
            RETURNING config
            "#,
        )
        .bind(Json(config))
        .fetch_one(executor)
        .await?;

        Ok(saved.0)
    }
}
