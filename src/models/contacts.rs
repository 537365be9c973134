// src/models/contacts.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::notes::Attachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum ContactInfoType {
    #[default]
    Work,
    Home,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct EmailAndType {
    #[validate(email(message = "invalid_email"))]
    #[schema(example = "jane@acme.com")]
    pub email: String,
    #[serde(rename = "type", default)]
    pub kind: ContactInfoType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct PhoneNumberAndType {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "+33 6 12 34 56 78")]
    pub number: String,
    #[serde(rename = "type", default)]
    pub kind: ContactInfoType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Contact {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub title: Option<String>,
    pub company_id: Option<i64>,
    #[schema(value_type = Vec<EmailAndType>)]
    pub email_jsonb: Json<Vec<EmailAndType>>,
    #[schema(value_type = Vec<PhoneNumberAndType>)]
    pub phone_jsonb: Json<Vec<PhoneNumberAndType>>,
    pub background: Option<String>,
    #[schema(value_type = Option<Attachment>)]
    pub avatar: Option<Json<Attachment>>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub has_newsletter: Option<bool>,
    pub status: Option<String>,
    pub tags: Vec<i64>,
    pub sales_id: Option<i64>,
    pub linkedin_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub title: Option<String>,
    pub company_id: Option<i64>,
    pub email_jsonb: Vec<EmailAndType>,
    pub phone_jsonb: Vec<PhoneNumberAndType>,
    pub background: Option<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub has_newsletter: Option<bool>,
    pub status: Option<String>,
    pub tags: Vec<i64>,
    pub sales_id: Option<i64>,
    pub linkedin_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MergeContactsPayload {
    #[schema(example = 12)]
    pub loser_id: i64,
    #[schema(example = 7)]
    pub winner_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MergeContactsResponse {
    pub success: bool,
    pub winner_id: i64,
}
