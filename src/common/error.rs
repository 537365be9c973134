use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{common::i18n::I18nStore, middleware::i18n::Locale};

// Erros internos da aplicação. Cada variante conhecida vira uma chave de
// tradução; o resto vira 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Conta desativada")]
    AccountDisabled,

    #[error("Corpo da requisição inválido: {0}")]
    InvalidPayload(String),

    #[error("Ação não permitida")]
    Forbidden,

    #[error("Ação restrita a administradores")]
    AdminRequired,

    #[error("Um usuário não pode desativar a si mesmo")]
    CannotDisableSelf,

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Usuário {0} não encontrado")]
    SaleNotFound(i64),

    #[error("Contato {0} não encontrado")]
    ContactNotFound(i64),

    #[error("Importação não encontrada")]
    ImportNotFound,

    #[error("Importação já iniciada")]
    ImportNotIdle,

    #[error("Importação em andamento")]
    ImportRunning,

    #[error("Não é possível mesclar um contato com ele mesmo")]
    MergeSameContact,

    #[error("Falha ao mesclar contatos: {0}")]
    MergeFailed(Box<AppError>),

    #[error("Credenciais de webhook inválidas")]
    WebhookUnauthorized,

    #[error("Payload de webhook inválido: {0}")]
    WebhookPayloadInvalid(String),

    #[error("Remetente desconhecido: {0}")]
    InboundUnknownSender(String),

    #[error("E-mail sem destinatários")]
    InboundNoRecipients,

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de E/S: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

// O envelope de erro devolvido ao cliente: { "status": 404, "message": "..." }
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), details: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "status": self.status.as_u16(),
            "message": self.message,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    /// Status HTTP e chave de tradução de cada variante.
    fn status_and_key(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AppError::AccountDisabled => (StatusCode::UNAUTHORIZED, "account_disabled"),
            AppError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, "invalid_payload"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::AdminRequired => (StatusCode::FORBIDDEN, "admin_required"),
            AppError::CannotDisableSelf => (StatusCode::BAD_REQUEST, "cannot_disable_self"),
            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, "email_already_exists"),
            AppError::SaleNotFound(_) => (StatusCode::NOT_FOUND, "sale_not_found"),
            AppError::ContactNotFound(_) => (StatusCode::NOT_FOUND, "contact_not_found"),
            AppError::ImportNotFound => (StatusCode::NOT_FOUND, "import_not_found"),
            AppError::ImportNotIdle => (StatusCode::CONFLICT, "import_not_idle"),
            AppError::ImportRunning => (StatusCode::CONFLICT, "import_running"),
            AppError::MergeSameContact => (StatusCode::BAD_REQUEST, "merge_same_contact"),
            AppError::MergeFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "merge_failed"),
            AppError::WebhookUnauthorized => (StatusCode::UNAUTHORIZED, "webhook_unauthorized"),
            // 403 para o provedor não reenviar: tentar de novo não resolve.
            AppError::WebhookPayloadInvalid(_) => (StatusCode::FORBIDDEN, "webhook_payload_invalid"),
            AppError::InboundUnknownSender(_) => (StatusCode::FORBIDDEN, "inbound_unknown_sender"),
            AppError::InboundNoRecipients => (StatusCode::NOT_ACCEPTABLE, "inbound_no_recipients"),
            AppError::DatabaseError(_)
            | AppError::IoError(_)
            | AppError::InternalServerError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status_and_key().0
    }

    /// Converte o erro interno no envelope traduzido para o idioma do cliente.
    pub fn to_api_error(self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let (status, key) = self.status_and_key();

        if status.is_server_error() {
            tracing::error!("Erro Interno do Servidor: {}", self);
        }

        let details = match &self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                                .into()
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                Some(Value::Object(details))
            }
            AppError::InvalidPayload(reason) | AppError::WebhookPayloadInvalid(reason) => {
                Some(json!({ "reason": reason }))
            }
            _ => None,
        };

        ApiError {
            status,
            message: i18n.translate(&locale.0, key),
            details,
        }
    }
}
