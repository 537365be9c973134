// src/handlers/inbound.rs

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use chrono::Utc;
use serde_json::{Map, Value};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, webhook::verify_mailgun_signature},
    models::webhooks::{InboundEmailResult, MailgunInbound, PostmarkInbound},
};

// POST /api/inbound/postmark
//
// Corpo lido como bytes: payload malformado vira 403 (não reenviar).
#[utoipa::path(
    post,
    path = "/api/inbound/postmark",
    tag = "Webhooks",
    request_body = PostmarkInbound,
    responses(
        (status = 200, description = "Notas criadas nos contatos destinatários", body = InboundEmailResult),
        (status = 401, description = "Credenciais inválidas"),
        (status = 403, description = "Payload inválido ou remetente desconhecido (não reenviar)"),
        (status = 406, description = "E-mail sem destinatários")
    ),
    security(("postmark_basic" = []))
)]
pub async fn postmark_inbound(
    State(app_state): State<AppState>,
    locale: Locale,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let to_api_error = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let payload: PostmarkInbound = serde_json::from_slice(&body)
        .map_err(|e| to_api_error(AppError::WebhookPayloadInvalid(e.to_string())))?;

    let result = app_state
        .inbound_email_service
        .handle(payload.into())
        .await
        .map_err(to_api_error)?;

    Ok((StatusCode::OK, Json(result)))
}

// POST /api/inbound/mailgun
//
// O Mailgun só desiste de reenviar com 406, então toda recusa definitiva
// (payload, remetente, destinatários) sai com esse status.
#[utoipa::path(
    post,
    path = "/api/inbound/mailgun",
    tag = "Webhooks",
    request_body(content = MailgunInbound, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Notas criadas nos contatos destinatários", body = InboundEmailResult),
        (status = 401, description = "Assinatura inválida ou expirada"),
        (status = 406, description = "Payload inválido, remetente desconhecido ou sem destinatários (não reenviar)")
    )
)]
pub async fn mailgun_inbound(
    State(app_state): State<AppState>,
    locale: Locale,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let to_api_error = |e: AppError| not_acceptable(e.to_api_error(&locale, &app_state.i18n_store));

    let payload = read_mailgun_form(request, &app_state).await.map_err(to_api_error)?;

    let signed = verify_mailgun_signature(
        &app_state.settings.mailgun_signing_key,
        &payload.timestamp,
        &payload.token,
        &payload.signature,
        Utc::now(),
    );
    if !signed {
        tracing::warn!("⚠️ Webhook do Mailgun recusado: assinatura inválida");
        return Err(to_api_error(AppError::WebhookUnauthorized));
    }

    let result = app_state
        .inbound_email_service
        .handle(payload.into())
        .await
        .map_err(to_api_error)?;

    Ok((StatusCode::OK, Json(result)))
}

fn not_acceptable(mut error: ApiError) -> ApiError {
    if error.status == StatusCode::FORBIDDEN {
        error.status = StatusCode::NOT_ACCEPTABLE;
    }
    error
}

/// O Mailgun manda `multipart/form-data` (com anexos) ou
/// `application/x-www-form-urlencoded`. Anexos são ignorados.
async fn read_mailgun_form(request: Request, state: &AppState) -> Result<MailgunInbound, AppError> {
    let multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !multipart {
        let Form(payload) = Form::<MailgunInbound>::from_request(request, state)
            .await
            .map_err(|e| AppError::WebhookPayloadInvalid(e.body_text()))?;
        return Ok(payload);
    }

    let mut form = Multipart::from_request(request, state)
        .await
        .map_err(|e| AppError::WebhookPayloadInvalid(e.body_text()))?;
    let mut fields = Map::new();
    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| AppError::WebhookPayloadInvalid(e.body_text()))?
    {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|e| AppError::WebhookPayloadInvalid(e.body_text()))?;
        fields.insert(name, Value::String(value));
    }

    serde_json::from_value(Value::Object(fields)).map_err(|e| AppError::WebhookPayloadInvalid(e.to_string()))
}
