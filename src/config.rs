// src/config.rs

use std::{env, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::CrmStore,
    services::{
        attachment_service::AttachmentService,
        auth::AuthService,
        configuration_service::ConfigurationService,
        import_jobs::{ImportJobs, DEFAULT_JOB_TTL},
        import_service::{ImportService, DEFAULT_BATCH_SIZE},
        inbound_email_service::InboundEmailService,
        merge_service::MergeService,
        sales_service::SalesService,
    },
};

/// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub webhook_secret: String,
    pub postmark_user: String,
    pub postmark_password: String,
    pub mailgun_signing_key: String,
    pub attachments_dir: PathBuf,
    pub bind_addr: String,
    pub import_batch_size: usize,
    // Importações paradas há mais tempo que isso são esquecidas
    pub import_job_ttl: Duration,
    // Vazio = qualquer origem
    pub cors_allowed_origins: Vec<String>,
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{} deve ser definida", name))
}

fn optional(name: &str) -> String {
    env::var(name).unwrap_or_default()
}

fn parsed_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} inválida: {}", name, raw)),
        _ => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret: required("JWT_SECRET")?,
            webhook_secret: optional("WEBHOOK_SECRET"),
            postmark_user: optional("POSTMARK_USER"),
            postmark_password: optional("POSTMARK_PASSWORD"),
            mailgun_signing_key: optional("MAILGUN_SIGNING_KEY"),
            attachments_dir: parsed_or("ATTACHMENTS_DIR", PathBuf::from("./attachments"))?,
            bind_addr: parsed_or("BIND_ADDR", "0.0.0.0:3000".to_string())?,
            import_batch_size: parsed_or("IMPORT_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            import_job_ttl: Duration::from_secs(parsed_or("IMPORT_JOB_TTL_SECS", DEFAULT_JOB_TTL.as_secs())?),
            cors_allowed_origins: optional("CORS_ALLOWED_ORIGINS")
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    pub async fn connect_pool(&self) -> anyhow::Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.database_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&self.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
        Ok(pool)
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub i18n_store: I18nStore,
    pub auth_service: AuthService,
    pub import_service: ImportService,
    pub merge_service: MergeService,
    pub sales_service: SalesService,
    pub configuration_service: ConfigurationService,
    pub inbound_email_service: InboundEmailService,
    pub attachment_service: AttachmentService,
}

impl AppState {
    /// Monta o grafo de dependências sobre um `CrmStore` (Postgres em
    /// produção, memória nos testes).
    pub fn new(settings: Settings, store: Arc<dyn CrmStore>) -> anyhow::Result<Self> {
        let i18n_store = I18nStore::load()?;

        Ok(Self {
            auth_service: AuthService::new(store.clone(), settings.jwt_secret.clone()),
            import_service: ImportService::new(
                store.clone(),
                ImportJobs::new(settings.import_job_ttl),
                settings.import_batch_size,
            ),
            merge_service: MergeService::new(store.clone()),
            sales_service: SalesService::new(store.clone()),
            configuration_service: ConfigurationService::new(store.clone()),
            inbound_email_service: InboundEmailService::new(store),
            attachment_service: AttachmentService::new(settings.attachments_dir.clone()),
            i18n_store,
            settings: Arc::new(settings),
        })
    }
}

#[cfg(test)]
impl Settings {
    pub fn for_tests(attachments_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_url: String::new(),
            database_max_connections: 1,
            jwt_secret: "test-secret".into(),
            webhook_secret: "hook-secret".into(),
            postmark_user: "postmark".into(),
            postmark_password: "inbound".into(),
            mailgun_signing_key: "mailgun-key".into(),
            attachments_dir: attachments_dir.into(),
            bind_addr: "127.0.0.1:0".into(),
            import_batch_size: DEFAULT_BATCH_SIZE,
            import_job_ttl: DEFAULT_JOB_TTL,
            cors_allowed_origins: vec![],
        }
    }
}
