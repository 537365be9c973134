use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Task {
    pub id: i64,
    pub contact_id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<String>,
    pub due_date: DateTime<Utc>,
    pub done_date: Option<DateTime<Utc>>,
    pub sales_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub contact_id: i64,
    pub kind: Option<String>,
    pub text: Option<String>,
    pub due_date: DateTime<Utc>,
    pub done_date: Option<DateTime<Utc>>,
    pub sales_id: Option<i64>,
}
