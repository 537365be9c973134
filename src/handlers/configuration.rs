// src/handlers/configuration.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedSale, i18n::Locale, json::ApiJson},
    models::configuration::Configuration,
};

// GET /api/configuration
#[utoipa::path(
    get,
    path = "/api/configuration",
    tag = "Configuration",
    responses(
        (status = 200, description = "Configuração do CRM (padrões para chaves ausentes)", body = Configuration)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_configuration(
    State(app_state): State<AppState>,
    locale: Locale,
    _sale: AuthenticatedSale,
) -> Result<impl IntoResponse, ApiError> {
    let configuration = app_state
        .configuration_service
        .get()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(configuration)))
}

// PUT /api/configuration
#[utoipa::path(
    put,
    path = "/api/configuration",
    tag = "Configuration",
    request_body = Configuration,
    responses(
        (status = 200, description = "Configuração gravada", body = Configuration),
        (status = 400, description = "Corpo inválido"),
        (status = 403, description = "Apenas administradores")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_configuration(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedSale(actor): AuthenticatedSale,
    ApiJson(payload): ApiJson<Configuration>,
) -> Result<impl IntoResponse, ApiError> {
    let configuration = app_state
        .configuration_service
        .update(&actor, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(configuration)))
}
