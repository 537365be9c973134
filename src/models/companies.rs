// src/models/companies.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;

use crate::models::notes::Attachment;

// Faixas de tamanho aceitas (número de funcionários)
pub const COMPANY_SIZES: &[i16] = &[1, 10, 50, 250, 500];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub sector: Option<String>,
    pub size: Option<i16>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub zipcode: Option<String>,
    pub city: Option<String>,
    pub state_abbr: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub revenue: Option<String>,
    pub tax_identifier: Option<String>,
    #[schema(value_type = Option<Attachment>)]
    pub logo: Option<Json<Attachment>>,
    #[schema(value_type = Option<Vec<String>>)]
    pub context_links: Option<Json<Vec<String>>>,
    pub sales_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCompany {
    pub name: String,
    pub sector: Option<String>,
    pub size: Option<i16>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub zipcode: Option<String>,
    pub city: Option<String>,
    pub state_abbr: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub revenue: Option<String>,
    pub tax_identifier: Option<String>,
    pub context_links: Option<Vec<String>>,
    pub sales_id: Option<i64>,
}
