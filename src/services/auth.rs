// src/services/auth.rs

use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::error::AppError, db::CrmStore, models::sales::Sale};

// Audiência dos tokens de usuário emitidos pelo serviço de autenticação
pub const TOKEN_AUDIENCE: &str = "authenticated";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
    pub aud: String,
    pub role: Option<String>,
}

/// Valida os tokens do serviço de autenticação; este backend não emite tokens.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CrmStore>,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn CrmStore>, jwt_secret: String) -> Self {
        Self { store, jwt_secret }
    }

    pub async fn validate_token(&self, token: &str) -> Result<Sale, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("Token recusado: {}", e);
            AppError::InvalidToken
        })?;

        // Conta válida, mas sem usuário do CRM vinculado
        let sale = self
            .store
            .find_sale_by_user_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if sale.disabled {
            return Err(AppError::AccountDisabled);
        }
        Ok(sale)
    }

    /// Emite um token como o serviço de autenticação faria.
    #[cfg(test)]
    pub fn create_token(&self, user_id: Uuid) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id,
            exp: (now + chrono::Duration::hours(1)).timestamp() as usize,
            iat: now.timestamp() as usize,
            aud: TOKEN_AUDIENCE.to_string(),
            role: Some("authenticated".to_string()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.jwt_secret.as_ref())).unwrap()
    }
}
