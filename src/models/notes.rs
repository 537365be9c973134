// src/models/notes.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;

/// Arquivo anexado (nota, avatar, logo).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Attachment {
    #[serde(default)]
    pub src: String,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    // Caminho no storage; só existe para arquivos enviados pelo CRM
    pub path: Option<String>,
}

impl Attachment {
    pub fn has_source(&self) -> bool {
        !self.src.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ContactNote {
    pub id: i64,
    pub contact_id: i64,
    pub text: Option<String>,
    pub date: DateTime<Utc>,
    pub sales_id: Option<i64>,
    pub status: Option<String>,
    #[schema(value_type = Vec<Attachment>)]
    pub attachments: Json<Vec<Attachment>>,
}

#[derive(Debug, Clone)]
pub struct NewContactNote {
    pub contact_id: i64,
    pub text: Option<String>,
    pub date: DateTime<Utc>,
    pub sales_id: Option<i64>,
    pub status: Option<String>,
    pub attachments: Vec<Attachment>,
}
