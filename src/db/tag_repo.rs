use sqlx::{Executor, Postgres};

use crate::{common::error::AppError, models::tags::Tag};

#[derive(Clone, Default)]
pub struct TagRepository;

impl TagRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_name<'e, E>(&self, executor: E, name: &str) -> Result<Option<Tag>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(executor)
            .await?;

        Ok(tag)
    }

    /// Cria a tag; se outra requisição criou o mesmo nome antes, devolve a existente.
    pub async fn create<'e, E>(&self, executor: E, name: &str, color: &str) -> Result<Tag, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (name, color) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(color)
        .fetch_one(executor)
        .await?;

        Ok(tag)
    }
}
