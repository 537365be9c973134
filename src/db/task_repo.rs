use sqlx::{Executor, Postgres};

use crate::{
    common::error::AppError,
    models::tasks::{NewTask, Task},
};

#[derive(Clone, Default)]
pub struct TaskRepository;

impl TaskRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create<'e, E>(&self, executor: E, task: &NewTask) -> Result<Task, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (contact_id, type, text, due_date, done_date, sales_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(task.contact_id)
        .bind(task.kind.as_deref())
        .bind(task.text.as_deref())
        .bind(task.due_date)
        .bind(task.done_date)
        .bind(task.sales_id)
        .fetch_one(executor)
        .await?;

        Ok(created)
    }

    pub async fn reassign<'e, E>(&self, executor: E, from_contact: i64, to_contact: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("UPDATE tasks SET contact_id = $2 WHERE contact_id = $1")
            .bind(from_contact)
            .bind(to_contact)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
