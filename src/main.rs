//src/main.rs

use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::{
    config::{AppState, Settings},
    db::{CrmStore, PgCrmStore},
    docs::ApiDoc,
    middleware::{
        auth::auth_guard,
        webhook::{postmark_basic_guard, webhook_secret_guard},
    },
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("⚠️ Origem CORS ignorada: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Router completo da aplicação.
pub fn app(app_state: AppState) -> Router {
    // Rotas do CRM (protegidas pelo Bearer token)
    let import_routes = Router::new()
        .route("/", post(handlers::imports::create_import))
        .route("/{id}", get(handlers::imports::get_import))
        .route("/{id}/file", post(handlers::imports::upload_import_file))
        .route("/{id}/report", get(handlers::imports::download_report))
        .route("/{id}/reset", post(handlers::imports::reset_import));

    let sales_routes = Router::new()
        .route("/", post(handlers::sales::create_sale))
        .route("/me", get(handlers::sales::get_me))
        .route("/{id}", patch(handlers::sales::update_sale));

    let crm_routes = Router::new()
        .nest("/imports", import_routes)
        .nest("/sales", sales_routes)
        .route("/contacts/merge", post(handlers::contacts::merge_contacts))
        .route(
            "/configuration",
            get(handlers::configuration::get_configuration).put(handlers::configuration::update_configuration),
        )
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    // Webhooks: cada um com a sua credencial
    let inbound_routes = Router::new()
        .route("/postmark", post(handlers::inbound::postmark_inbound))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), postmark_basic_guard))
        // Assinatura vem no próprio formulário, conferida no handler
        .route("/mailgun", post(handlers::inbound::mailgun_inbound));

    let webhook_routes = Router::new()
        .route("/note-attachments", post(handlers::attachments::cleanup_note_attachments))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), webhook_secret_guard));

    let cors = cors_layer(&app_state.settings.cors_allowed_origins);

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api", crm_routes)
        .nest("/api/inbound", inbound_routes)
        .nest("/api/webhooks", webhook_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let settings = Settings::from_env()?;
    let pool = settings.connect_pool().await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados.")?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    tokio::fs::create_dir_all(&settings.attachments_dir)
        .await
        .with_context(|| format!("Falha ao criar {}", settings.attachments_dir.display()))?;

    let bind_addr = settings.bind_addr.clone();
    let store: Arc<dyn CrmStore> = Arc::new(PgCrmStore::new(pool));
    let app_state = AppState::new(settings, store)?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Falha ao iniciar o listener TCP em {}", bind_addr))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app(app_state)).await.context("Erro no servidor Axum")?;
    Ok(())
}
