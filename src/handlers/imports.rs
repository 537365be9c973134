// src/handlers/imports.rs

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::TryStreamExt;
use tokio_util::io::{StreamReader, SyncIoBridge};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedSale, i18n::Locale},
    models::import::{FailedImports, ImportJobCreated, ImportState},
};

// POST /api/imports
#[utoipa::path(
    post,
    path = "/api/imports",
    tag = "Imports",
    responses(
        (status = 201, description = "Importação criada (idle)", body = ImportJobCreated)
    ),
    security(("api_jwt" = []))
)]
pub async fn create_import(
    State(app_state): State<AppState>,
    AuthenticatedSale(sale): AuthenticatedSale,
) -> Result<impl IntoResponse, ApiError> {
    let id = app_state.import_service.create_job(&sale).await;
    Ok((StatusCode::CREATED, Json(ImportJobCreated { id })))
}

// POST /api/imports/{id}/file
#[utoipa::path(
    post,
    path = "/api/imports/{id}/file",
    tag = "Imports",
    request_body(content = Object, description = "Arquivo JSON com sales, companies, contacts, notes e tasks", content_type = "application/json"),
    params(("id" = Uuid, Path, description = "ID da importação")),
    responses(
        (status = 200, description = "Estado final da importação", body = ImportState),
        (status = 404, description = "Importação não encontrada (ou de outro vendedor)"),
        (status = 409, description = "Importação não está idle")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_import_file(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedSale(sale): AuthenticatedSale,
    Path(id): Path<Uuid>,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let configuration = app_state
        .configuration_service
        .get()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // O corpo é lido em streaming pelo parser (thread bloqueante)
    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let reader = SyncIoBridge::new(StreamReader::new(stream));

    // Numa task própria: se o cliente cair, a importação termina mesmo assim
    let import_service = app_state.import_service.clone();
    let state = tokio::spawn(async move { import_service.run(id, reader, &configuration, &sale).await })
        .await
        .map_err(|e| AppError::InternalServerError(anyhow::anyhow!("Task de importação falhou: {}", e)))
        .and_then(|result| result)
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(state)))
}

// GET /api/imports/{id}
#[utoipa::path(
    get,
    path = "/api/imports/{id}",
    tag = "Imports",
    params(("id" = Uuid, Path, description = "ID da importação")),
    responses(
        (status = 200, description = "Estado atual", body = ImportState),
        (status = 404, description = "Importação não encontrada (ou de outro vendedor)")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_import(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedSale(sale): AuthenticatedSale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let state = app_state
        .import_service
        .state(id, &sale)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(state)))
}

// GET /api/imports/{id}/report
#[utoipa::path(
    get,
    path = "/api/imports/{id}/report",
    tag = "Imports",
    params(("id" = Uuid, Path, description = "ID da importação")),
    responses(
        (status = 200, description = "Registros rejeitados, no formato do arquivo de importação", body = FailedImports),
        (status = 404, description = "Importação não encontrada (ou de outro vendedor)")
    ),
    security(("api_jwt" = []))
)]
pub async fn download_report(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedSale(sale): AuthenticatedSale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .import_service
        .report(id, &sale)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_DISPOSITION, "attachment; filename=\"atomic-crm-import-report.json\"")],
        Json(report),
    ))
}

// POST /api/imports/{id}/reset
#[utoipa::path(
    post,
    path = "/api/imports/{id}/reset",
    tag = "Imports",
    params(("id" = Uuid, Path, description = "ID da importação")),
    responses(
        (status = 204, description = "Importação de volta para idle"),
        (status = 404, description = "Importação não encontrada (ou de outro vendedor)"),
        (status = 409, description = "Importação em andamento")
    ),
    security(("api_jwt" = []))
)]
pub async fn reset_import(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedSale(sale): AuthenticatedSale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .import_service
        .reset(id, &sale)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
