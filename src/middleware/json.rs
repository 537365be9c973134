// src/middleware/json.rs

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::header,
    Json,
};
use serde::de::DeserializeOwned;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
};

/// `Json<T>` cuja rejeição (corpo malformado, tipo errado, content-type
/// ausente) sai no envelope `{status, message, details}` traduzido.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T> FromRequest<AppState> for ApiJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let locale = request
            .headers()
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .map(Locale::from_header)
            .unwrap_or_default();

        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(payload_error(rejection).to_api_error(&locale, &state.i18n_store)),
        }
    }
}

fn payload_error(rejection: JsonRejection) -> AppError {
    tracing::debug!("Corpo JSON recusado: {}", rejection.body_text());
    AppError::InvalidPayload(rejection.body_text())
}
