// src/db/pg_store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_rls_transaction, error::AppError},
    db::{
        store::{CrmStore, InboundTransaction, MergeTransaction},
        CompanyRepository, ConfigurationRepository, ContactRepository, DealRepository, NoteRepository,
        SalesRepository, TagRepository, TaskRepository,
    },
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

/// `CrmStore` sobre o Postgres: monta os repositórios em cima da pool.
#[derive(Clone)]
pub struct PgCrmStore {
    pool: PgPool,
    sales: SalesRepository,
    companies: CompanyRepository,
    contacts: ContactRepository,
    deals: DealRepository,
    notes: NoteRepository,
    tasks: TaskRepository,
    tags: TagRepository,
    configuration: ConfigurationRepository,
}

impl PgCrmStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            sales: SalesRepository::new(),
            companies: CompanyRepository::new(),
            contacts: ContactRepository::new(),
            deals: DealRepository::new(),
            notes: NoteRepository::new(),
            tasks: TaskRepository::new(),
            tags: TagRepository::new(),
            configuration: ConfigurationRepository::new(),
        }
    }
}

#[async_trait]
impl CrmStore for PgCrmStore {
    async fn find_sale_by_email(&self, email: &str) -> Result<Option<Sale>, AppError> {
        self.sales.find_by_email(&self.pool, email).await
    }

    async fn find_sale_by_user_id(&self, user_id: Uuid) -> Result<Option<Sale>, AppError> {
        self.sales.find_by_user_id(&self.pool, user_id).await
    }

    async fn create_sale(&self, sale: &NewSale) -> Result<Sale, AppError> {
        self.sales.create(&self.pool, sale).await
    }

    async fn update_sale(&self, id: i64, patch: &UpdateSalePayload) -> Result<Option<Sale>, AppError> {
        self.sales.update(&self.pool, id, patch).await
    }

    async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>, AppError> {
        self.companies.find_by_name(&self.pool, name).await
    }

    async fn create_company(&self, company: &NewCompany) -> Result<Company, AppError> {
        self.companies.create(&self.pool, company).await
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<Contact>, AppError> {
        self.contacts.find_by_email(&self.pool, email).await
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, AppError> {
        self.contacts.create(&self.pool, contact).await
    }

    async fn touch_contact(&self, id: i64, seen_at: DateTime<Utc>) -> Result<(), AppError> {
        self.contacts.touch_last_seen(&self.pool, id, seen_at).await
    }

    async fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>, AppError> {
        self.tags.find_by_name(&self.pool, name).await
    }

    async fn create_tag(&self, name: &str, color: &str) -> Result<Tag, AppError> {
        self.tags.create(&self.pool, name, color).await
    }

    async fn create_contact_note(&self, note: &NewContactNote) -> Result<ContactNote, AppError> {
        self.notes.create_contact_note(&self.pool, note).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, AppError> {
        self.tasks.create(&self.pool, task).await
    }

    async fn load_configuration(&self) -> Result<Option<Configuration>, AppError> {
        match self.configuration.get(&self.pool).await? {
            Some(raw) => {
                let config = serde_json::from_value(raw)
                    .map_err(|e| anyhow::anyhow!("Configuração armazenada inválida: {}", e))?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    async fn save_configuration(&self, configuration: &Configuration) -> Result<Configuration, AppError> {
        let raw = serde_json::to_value(configuration).map_err(anyhow::Error::from)?;
        let saved = self.configuration.upsert(&self.pool, &raw).await?;
        let config = serde_json::from_value(saved).map_err(anyhow::Error::from)?;
        Ok(config)
    }

    async fn begin_merge(&self, actor_id: i64) -> Result<Box<dyn MergeTransaction>, AppError> {
        let tx = begin_rls_transaction(&self.pool, actor_id).await?;
        Ok(Box::new(PgMergeTransaction {
            tx,
            contacts: self.contacts.clone(),
            deals: self.deals.clone(),
            notes: self.notes.clone(),
            tasks: self.tasks.clone(),
        }))
    }

    async fn begin_inbound(&self, actor_id: i64) -> Result<Box<dyn InboundTransaction>, AppError> {
        let tx = begin_rls_transaction(&self.pool, actor_id).await?;
        Ok(Box::new(PgInboundTransaction {
            tx,
            companies: self.companies.clone(),
            contacts: self.contacts.clone(),
            notes: self.notes.clone(),
        }))
    }
}

/// Transação real: se for descartada sem commit, o sqlx faz rollback no drop.
struct PgMergeTransaction {
    tx: Transaction<'static, Postgres>,
    contacts: ContactRepository,
    deals: DealRepository,
    notes: NoteRepository,
    tasks: TaskRepository,
}

#[async_trait]
impl MergeTransaction for PgMergeTransaction {
    async fn fetch_contact(&mut self, id: i64) -> Result<Option<Contact>, AppError> {
        self.contacts.find_by_id_for_update(&mut *self.tx, id).await
    }

    async fn reassign_tasks(&mut self, from_contact: i64, to_contact: i64) -> Result<u64, AppError> {
        self.tasks.reassign(&mut *self.tx, from_contact, to_contact).await
    }

    async fn reassign_contact_notes(&mut self, from_contact: i64, to_contact: i64) -> Result<u64, AppError> {
        self.notes.reassign_contact_notes(&mut *self.tx, from_contact, to_contact).await
    }

    async fn deals_with_contact(&mut self, contact_id: i64) -> Result<Vec<DealContacts>, AppError> {
        self.deals.list_with_contact(&mut *self.tx, contact_id).await
    }

    async fn update_deal_contacts(&mut self, deal_id: i64, contact_ids: &[i64]) -> Result<(), AppError> {
        self.deals.update_contact_ids(&mut *self.tx, deal_id, contact_ids).await
    }

    async fn update_contact(&mut self, contact: &Contact) -> Result<(), AppError> {
        self.contacts.update(&mut *self.tx, contact).await
    }

    async fn delete_contact(&mut self, id: i64) -> Result<(), AppError> {
        let deleted = self.contacts.delete(&mut *self.tx, id).await?;
        if deleted == 0 {
            return Err(AppError::ContactNotFound(id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

struct PgInboundTransaction {
    tx: Transaction<'static, Postgres>,
    companies: CompanyRepository,
    contacts: ContactRepository,
    notes: NoteRepository,
}

#[async_trait]
impl InboundTransaction for PgInboundTransaction {
    async fn find_contact_by_email(&mut self, email: &str) -> Result<Option<Contact>, AppError> {
        self.contacts.find_by_email(&mut *self.tx, email).await
    }

    async fn create_contact(&mut self, contact: &NewContact) -> Result<Contact, AppError> {
        self.contacts.create(&mut *self.tx, contact).await
    }

    async fn find_company_by_name(&mut self, name: &str) -> Result<Option<Company>, AppError> {
        self.companies.find_by_name(&mut *self.tx, name).await
    }

    async fn create_company(&mut self, company: &NewCompany) -> Result<Company, AppError> {
        self.companies.create(&mut *self.tx, company).await
    }

    async fn create_contact_note(&mut self, note: &NewContactNote) -> Result<ContactNote, AppError> {
        self.notes.create_contact_note(&mut *self.tx, note).await
    }

    async fn touch_contact(&mut self, id: i64, seen_at: DateTime<Utc>) -> Result<(), AppError> {
        self.contacts.touch_last_seen(&mut *self.tx, id, seen_at).await
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
