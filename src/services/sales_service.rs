// src/services/sales_service.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::CrmStore,
    models::sales::{CreateSalePayload, NewSale, Sale, UpdateSalePayload},
};

#[derive(Clone)]
pub struct SalesService {
    store: Arc<dyn CrmStore>,
}

impl SalesService {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self { store }
    }

    // Só administradores convidam novos usuários
    pub async fn create_sale(&self, actor: &Sale, payload: CreateSalePayload) -> Result<Sale, AppError> {
        if !actor.administrator {
            return Err(AppError::AdminRequired);
        }

        let sale = self
            .store
            .create_sale(&NewSale {
                first_name: payload.first_name,
                last_name: payload.last_name,
                email: payload.email.trim().to_string(),
                administrator: payload.administrator,
                disabled: payload.disabled,
                avatar: None,
                user_id: payload.user_id,
            })
            .await?;

        tracing::info!("👤 Usuário {} criado por {}", sale.email, actor.email);
        Ok(sale)
    }

    /// PATCH de um usuário.
    ///
    /// Quem não é administrador só altera o próprio cadastro e nunca os
    /// campos `administrator`/`disabled`. Ninguém desativa a si mesmo.
    pub async fn update_sale(&self, actor: &Sale, id: i64, patch: UpdateSalePayload) -> Result<Sale, AppError> {
        if !actor.administrator {
            if actor.id != id {
                return Err(AppError::Forbidden);
            }
            if patch.administrator.is_some() || patch.disabled.is_some() {
                return Err(AppError::AdminRequired);
            }
        }
        if actor.id == id && patch.disabled == Some(true) {
            return Err(AppError::CannotDisableSelf);
        }

        let sale = self.store.update_sale(id, &patch).await?.ok_or(AppError::SaleNotFound(id))?;

        if patch.disabled == Some(true) {
            tracing::info!("🚫 Usuário {} desativado por {}", sale.email, actor.email);
        }
        Ok(sale)
    }
}
