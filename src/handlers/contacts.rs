// src/handlers/contacts.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedSale, i18n::Locale, json::ApiJson},
    models::contacts::{MergeContactsPayload, MergeContactsResponse},
};

// POST /api/contacts/merge
#[utoipa::path(
    post,
    path = "/api/contacts/merge",
    tag = "Contacts",
    request_body = MergeContactsPayload,
    responses(
        (status = 200, description = "Contatos mesclados", body = MergeContactsResponse),
        (status = 400, description = "Corpo inválido ou contato mesclado com ele mesmo"),
        (status = 404, description = "Contato não encontrado"),
        (status = 500, description = "Mesclagem desfeita")
    ),
    security(("api_jwt" = []))
)]
pub async fn merge_contacts(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedSale(sale): AuthenticatedSale,
    ApiJson(payload): ApiJson<MergeContactsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let winner_id = app_state
        .merge_service
        .merge(&sale, payload.loser_id, payload.winner_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(MergeContactsResponse { success: true, winner_id })))
}
