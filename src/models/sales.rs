// src/models/sales.rs

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::notes::Attachment;

// Um "sale" é um usuário do CRM (gerente de contas)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Sale {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub administrator: bool,
    pub disabled: bool,
    #[schema(value_type = Option<Attachment>)]
    pub avatar: Option<Json<Attachment>>,

    // Usuário do serviço de autenticação. Vendedores importados ou com
    // convite pendente ainda não têm conta.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSale {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub administrator: bool,
    pub disabled: bool,
    pub avatar: Option<Attachment>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSalePayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Jane")]
    pub first_name: String,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Doe")]
    pub last_name: String,

    #[validate(email(message = "invalid_email"))]
    #[schema(example = "jane@example.com")]
    pub email: String,

    #[serde(default)]
    pub administrator: bool,

    #[serde(default)]
    pub disabled: bool,

    pub user_id: Option<Uuid>,
}

// PATCH: só os campos presentes são alterados
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSalePayload {
    #[validate(length(min = 1, message = "required"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, message = "required"))]
    pub last_name: Option<String>,

    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,

    pub avatar: Option<Attachment>,
    pub administrator: Option<bool>,
    pub disabled: Option<bool>,
}
