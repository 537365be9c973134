// src/handlers/sales.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedSale, i18n::Locale, json::ApiJson},
    models::sales::{CreateSalePayload, Sale, UpdateSalePayload},
};

// GET /api/sales/me
#[utoipa::path(
    get,
    path = "/api/sales/me",
    tag = "Sales",
    responses(
        (status = 200, description = "Usuário autenticado", body = Sale),
        (status = 401, description = "Token inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedSale(sale): AuthenticatedSale) -> Json<Sale> {
    Json(sale)
}

// POST /api/sales
#[utoipa::path(
    post,
    path = "/api/sales",
    tag = "Sales",
    request_body = CreateSalePayload,
    responses(
        (status = 201, description = "Usuário criado", body = Sale),
        (status = 400, description = "Dados inválidos"),
        (status = 403, description = "Apenas administradores"),
        (status = 409, description = "E-mail já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_sale(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedSale(actor): AuthenticatedSale,
    ApiJson(payload): ApiJson<CreateSalePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let sale = app_state
        .sales_service
        .create_sale(&actor, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(sale)))
}

// PATCH /api/sales/{id}
#[utoipa::path(
    patch,
    path = "/api/sales/{id}",
    tag = "Sales",
    request_body = UpdateSalePayload,
    params(("id" = i64, Path, description = "ID do usuário (sale)")),
    responses(
        (status = 200, description = "Usuário atualizado", body = Sale),
        (status = 400, description = "Dados inválidos ou auto-desativação"),
        (status = 403, description = "Sem permissão"),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_sale(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedSale(actor): AuthenticatedSale,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<UpdateSalePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let sale = app_state
        .sales_service
        .update_sale(&actor, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(sale)))
}
