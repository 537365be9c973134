// src/db/store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    common::error::AppError,
    models::{
        companies::{Company, NewCompany},
        configuration::Configuration,
        contacts::{Contact, NewContact},
        deals::DealContacts,
        notes::{ContactNote, NewContactNote},
        sales::{NewSale, Sale, UpdateSalePayload},
        tags::Tag,
        tasks::{NewTask, Task},
    },
};

/// Acesso aos dados do CRM usado pelos serviços.
///
/// Em produção é o `PgCrmStore`; nos testes, um armazenamento em memória.
#[async_trait]
pub trait CrmStore: Send + Sync {
    // --- SALES ---
    async fn find_sale_by_email(&self, email: &str) -> Result<Option<Sale>, AppError>;
    async fn find_sale_by_user_id(&self, user_id: uuid::Uuid) -> Result<Option<Sale>, AppError>;
    async fn create_sale(&self, sale: &NewSale) -> Result<Sale, AppError>;
    async fn update_sale(&self, id: i64, patch: &UpdateSalePayload) -> Result<Option<Sale>, AppError>;

    // --- COMPANIES ---
    async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>, AppError>;
    async fn create_company(&self, company: &NewCompany) -> Result<Company, AppError>;

    // --- CONTACTS ---
    async fn find_contact_by_email(&self, email: &str) -> Result<Option<Contact>, AppError>;
    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, AppError>;
    /// Avança `last_seen` (nunca recua).
    async fn touch_contact(&self, id: i64, seen_at: DateTime<Utc>) -> Result<(), AppError>;

    // --- TAGS ---
    async fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>, AppError>;
    async fn create_tag(&self, name: &str, color: &str) -> Result<Tag, AppError>;

    // --- NOTES & TASKS ---
    async fn create_contact_note(&self, note: &NewContactNote) -> Result<ContactNote, AppError>;
    async fn create_task(&self, task: &NewTask) -> Result<Task, AppError>;

    // --- CONFIGURATION ---
    async fn load_configuration(&self) -> Result<Option<Configuration>, AppError>;
    async fn save_configuration(&self, configuration: &Configuration) -> Result<Configuration, AppError>;

    // --- MERGE ---
    /// Abre a transação de mesclagem em nome do usuário `actor_id`.
    async fn begin_merge(&self, actor_id: i64) -> Result<Box<dyn MergeTransaction>, AppError>;

    // --- E-MAIL RECEBIDO ---
    /// Abre a transação que anota um e-mail recebido em todos os destinatários.
    async fn begin_inbound(&self, actor_id: i64) -> Result<Box<dyn InboundTransaction>, AppError>;
}

/// Uma transação de mesclagem de contatos. Se for descartada sem `commit`,
/// nada do que foi feito é visível.
#[async_trait]
pub trait MergeTransaction: Send {
    async fn fetch_contact(&mut self, id: i64) -> Result<Option<Contact>, AppError>;
    async fn reassign_tasks(&mut self, from_contact: i64, to_contact: i64) -> Result<u64, AppError>;
    async fn reassign_contact_notes(&mut self, from_contact: i64, to_contact: i64) -> Result<u64, AppError>;
    async fn deals_with_contact(&mut self, contact_id: i64) -> Result<Vec<DealContacts>, AppError>;
    async fn update_deal_contacts(&mut self, deal_id: i64, contact_ids: &[i64]) -> Result<(), AppError>;
    async fn update_contact(&mut self, contact: &Contact) -> Result<(), AppError>;
    async fn delete_contact(&mut self, id: i64) -> Result<(), AppError>;
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

/// Tudo que um e-mail recebido grava: contatos, empresas e notas entram
/// juntos ou nenhum entra, então um reenvio do provedor não duplica notas.
#[async_trait]
pub trait InboundTransaction: Send {
    async fn find_contact_by_email(&mut self, email: &str) -> Result<Option<Contact>, AppError>;
    async fn create_contact(&mut self, contact: &NewContact) -> Result<Contact, AppError>;
    async fn find_company_by_name(&mut self, name: &str) -> Result<Option<Company>, AppError>;
    async fn create_company(&mut self, company: &NewCompany) -> Result<Company, AppError>;
    async fn create_contact_note(&mut self, note: &NewContactNote) -> Result<ContactNote, AppError>;
    async fn touch_contact(&mut self, id: i64, seen_at: DateTime<Utc>) -> Result<(), AppError>;
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
