// src/middleware/webhook.rs
//
// Autenticação dos webhooks: segredo compartilhado (banco), HTTP Basic (Postmark)
// e assinatura HMAC (Mailgun).

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Basic, Authorization, HeaderMapExt};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
};

type HmacSha256 = Hmac<Sha256>;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

// Janela aceita entre o timestamp assinado e o relógio local
const MAILGUN_TIMESTAMP_TOLERANCE_SECONDS: i64 = 300;

// Comparação em tempo constante para o tamanho dado
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn webhook_secret_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = app_state.settings.webhook_secret.as_bytes();
    let authorized = request
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .is_some_and(|value| !expected.is_empty() && constant_time_eq(value.as_bytes(), expected));

    if !authorized {
        tracing::warn!("⚠️ Webhook recusado: segredo ausente ou inválido");
        return Err(AppError::WebhookUnauthorized.to_api_error(&locale, &app_state.i18n_store));
    }
    Ok(next.run(request).await)
}

pub async fn postmark_basic_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let settings = &app_state.settings;
    let authorized = request
        .headers()
        .typed_get::<Authorization<Basic>>()
        .is_some_and(|auth| {
            !settings.postmark_user.is_empty()
                && constant_time_eq(auth.username().as_bytes(), settings.postmark_user.as_bytes())
                && constant_time_eq(auth.password().as_bytes(), settings.postmark_password.as_bytes())
        });

    if !authorized {
        tracing::warn!("⚠️ Webhook do Postmark recusado: credenciais inválidas");
        return Err(AppError::WebhookUnauthorized.to_api_error(&locale, &app_state.i18n_store));
    }
    Ok(next.run(request).await)
}

/// Assinatura do Mailgun: HMAC-SHA256 (hex) de `timestamp + token` com a signing key.
pub fn mailgun_signature(signing_key: &str, timestamp: &str, token: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_mailgun_signature(
    signing_key: &str,
    timestamp: &str,
    token: &str,
    signature: &str,
    now: DateTime<Utc>,
) -> bool {
    if signing_key.is_empty() || token.is_empty() {
        return false;
    }
    let fresh = timestamp
        .trim()
        .parse::<i64>()
        .is_ok_and(|ts| (now.timestamp() - ts).abs() <= MAILGUN_TIMESTAMP_TOLERANCE_SECONDS);
    if !fresh {
        tracing::warn!("⚠️ Webhook do Mailgun recusado: timestamp fora da janela ({})", timestamp);
        return false;
    }

    mailgun_signature(signing_key, timestamp, token)
        .is_some_and(|expected| constant_time_eq(signature.trim().as_bytes(), expected.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailgun_signatures_are_checked_against_key_and_clock() {
        let now = Utc::now();
        let timestamp = now.timestamp().to_string();
        let signature = mailgun_signature("key-123", &timestamp, "tok").unwrap();
        assert_eq!(signature.len(), 64);

        assert!(verify_mailgun_signature("key-123", &timestamp, "tok", &signature, now));
        assert!(!verify_mailgun_signature("key-456", &timestamp, "tok", &signature, now));
        assert!(!verify_mailgun_signature("key-123", &timestamp, "other", &signature, now));
        assert!(!verify_mailgun_signature("", &timestamp, "tok", &signature, now));

        let later = now + chrono::Duration::minutes(10);
        assert!(!verify_mailgun_signature("key-123", &timestamp, "tok", &signature, later));
    }

    #[test]
    fn compares_whole_values() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cre"));
    }
}
