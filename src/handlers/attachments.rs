// src/handlers/attachments.rs

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::webhooks::{AttachmentCleanupResult, NoteChangeEvent},
};

// POST /api/webhooks/note-attachments
//
// Corpo lido como bytes: payload malformado vira 403 (não reenviar), e não a
// rejeição padrão do extrator Json.
#[utoipa::path(
    post,
    path = "/api/webhooks/note-attachments",
    tag = "Webhooks",
    request_body = NoteChangeEvent,
    params(("x-webhook-secret" = String, Header, description = "Segredo compartilhado do webhook")),
    responses(
        (status = 200, description = "Anexos órfãos removidos", body = AttachmentCleanupResult),
        (status = 401, description = "Segredo inválido"),
        (status = 403, description = "Payload inválido (não reenviar)")
    )
)]
pub async fn cleanup_note_attachments(
    State(app_state): State<AppState>,
    locale: Locale,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = app_state
        .attachment_service
        .handle(&body)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(AttachmentCleanupResult { deleted })))
}
