// src/services/configuration_service.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::CrmStore,
    models::{configuration::Configuration, sales::Sale},
};

#[derive(Clone)]
pub struct ConfigurationService {
    store: Arc<dyn CrmStore>,
}

impl ConfigurationService {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self { store }
    }

    /// Configuração gravada, ou a padrão se a linha ainda não existe.
    pub async fn get(&self) -> Result<Configuration, AppError> {
        Ok(self.store.load_configuration().await?.unwrap_or_default())
    }

    pub async fn update(&self, actor: &Sale, configuration: Configuration) -> Result<Configuration, AppError> {
        if !actor.administrator {
            return Err(AppError::AdminRequired);
        }
        let saved = self.store.save_configuration(&configuration).await?;
        tracing::info!("⚙️ Configuração atualizada por {}", actor.email);
        Ok(saved)
    }
}
