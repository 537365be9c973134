// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Imports ---
        handlers::imports::create_import,
        handlers::imports::upload_import_file,
        handlers::imports::get_import,
        handlers::imports::download_report,
        handlers::imports::reset_import,

        // --- Contacts ---
        handlers::contacts::merge_contacts,

        // --- Sales ---
        handlers::sales::get_me,
        handlers::sales::create_sale,
        handlers::sales::update_sale,

        // --- Configuration ---
        handlers::configuration::get_configuration,
        handlers::configuration::update_configuration,

        // --- Webhooks ---
        handlers::inbound::postmark_inbound,
        handlers::inbound::mailgun_inbound,
        handlers::attachments::cleanup_note_attachments,
    ),
    components(
        schemas(
            // --- Imports ---
            models::import::ImportSection,
            models::import::ImportCounters,
            models::import::FailedImports,
            models::import::ImportProgress,
            models::import::ImportFailure,
            models::import::ImportState,
            models::import::ImportJobCreated,

            // --- Contacts ---
            models::contacts::ContactInfoType,
            models::contacts::EmailAndType,
            models::contacts::PhoneNumberAndType,
            models::contacts::Contact,
            models::contacts::MergeContactsPayload,
            models::contacts::MergeContactsResponse,

            // --- CRM ---
            models::companies::Company,
            models::notes::Attachment,
            models::notes::ContactNote,
            models::tasks::Task,
            models::tags::Tag,

            // --- Sales ---
            models::sales::Sale,
            models::sales::CreateSalePayload,
            models::sales::UpdateSalePayload,

            // --- Configuration ---
            models::configuration::LabeledValue,
            models::configuration::NoteStatus,
            models::configuration::Configuration,

            // --- Webhooks ---
            models::webhooks::PostmarkAddress,
            models::webhooks::PostmarkInbound,
            models::webhooks::MailgunInbound,
            models::webhooks::InboundEmailResult,
            models::webhooks::WebhookEventType,
            models::webhooks::NoteTable,
            models::webhooks::NoteChangeEvent,
            models::webhooks::AttachmentCleanupResult,
        )
    ),
    tags(
        (name = "Imports", description = "Importação em lote (arquivo JSON)"),
        (name = "Contacts", description = "Mesclagem de contatos"),
        (name = "Sales", description = "Usuários do CRM"),
        (name = "Configuration", description = "Configuração do CRM"),
        (name = "Webhooks", description = "E-mails recebidos e limpeza de anexos")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme("api_jwt", SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
        components.add_security_scheme("postmark_basic", SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)));
    }
}
