// src/db/memory.rs
//
// CrmStore em memória para os testes: registra as operações em ordem e
// permite injetar falhas.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{CrmStore, InboundTransaction, MergeTransaction},
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

#[derive(Debug, Clone, PartialEq)]
pub enum FailPoint {
    CreateCompany(String),
    MergeDeleteContact,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    next_id: i64,
    pub sales: BTreeMap<i64, Sale>,
    pub companies: BTreeMap<i64, Company>,
    pub contacts: BTreeMap<i64, Contact>,
    pub deals: BTreeMap<i64, DealContacts>,
    pub notes: BTreeMap<i64, ContactNote>,
    pub tasks: BTreeMap<i64, Task>,
    pub tags: BTreeMap<i64, Tag>,
    pub configuration: Option<Configuration>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn company_by_name(&self, name: &str) -> Option<Company> {
        self.companies.values().find(|c| c.name == name).cloned()
    }

    fn contact_by_email(&self, email: &str) -> Option<Contact> {
        self.contacts
            .values()
            .find(|c| c.email_jsonb.0.iter().any(|e| same_email(&e.email, email)))
            .cloned()
    }

    fn insert_company(&mut self, company: &NewCompany) -> Company {
        let id = self.next_id();
        let created = Company {
            id,
            name: company.name.clone(),
            sector: company.sector.clone(),
            size: company.size,
            linkedin_url: company.linkedin_url.clone(),
            website: company.website.clone(),
            phone_number: company.phone_number.clone(),
            address: company.address.clone(),
            zipcode: company.zipcode.clone(),
            city: company.city.clone(),
            state_abbr: company.state_abbr.clone(),
            country: company.country.clone(),
            description: company.description.clone(),
            revenue: company.revenue.clone(),
            tax_identifier: company.tax_identifier.clone(),
            logo: None,
            context_links: company.context_links.clone().map(Json),
            sales_id: company.sales_id,
            created_at: Utc::now(),
        };
        self.companies.insert(id, created.clone());
        created
    }

    fn insert_contact(&mut self, contact: &NewContact) -> Contact {
        let mut created = blank_contact(self.next_id());
        created.first_name = contact.first_name.clone();
        created.last_name = contact.last_name.clone();
        created.gender = contact.gender.clone();
        created.title = contact.title.clone();
        created.company_id = contact.company_id;
        created.email_jsonb = Json(contact.email_jsonb.clone());
        created.phone_jsonb = Json(contact.phone_jsonb.clone());
        created.background = contact.background.clone();
        created.first_seen = contact.first_seen;
        created.last_seen = contact.last_seen;
        created.has_newsletter = contact.has_newsletter;
        created.status = contact.status.clone();
        created.tags = contact.tags.clone();
        created.sales_id = contact.sales_id;
        created.linkedin_url = contact.linkedin_url.clone();
        self.contacts.insert(created.id, created.clone());
        created
    }

    fn insert_note(&mut self, note: &NewContactNote) -> Result<ContactNote, AppError> {
        if !self.contacts.contains_key(&note.contact_id) {
            return Err(AppError::ContactNotFound(note.contact_id));
        }
        let id = self.next_id();
        let created = ContactNote {
            id,
            contact_id: note.contact_id,
            text: note.text.clone(),
            date: note.date,
            sales_id: note.sales_id,
            status: note.status.clone(),
            attachments: Json(note.attachments.clone()),
        };
        self.notes.insert(id, created.clone());
        Ok(created)
    }

    fn touch(&mut self, id: i64, seen_at: DateTime<Utc>) {
        if let Some(contact) = self.contacts.get_mut(&id) {
            contact.last_seen = Some(contact.last_seen.map_or(seen_at, |current| current.max(seen_at)));
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    log: Arc<Mutex<Vec<String>>>,
    fail_on: Arc<Mutex<Option<FailPoint>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

// Conta uma criação em andamento enquanto estiver vivo
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn blank_contact(id: i64) -> Contact {
    Contact {
        id,
        first_name: None,
        last_name: None,
        gender: None,
        title: None,
        company_id: None,
        email_jsonb: Json(vec![]),
        phone_jsonb: Json(vec![]),
        background: None,
        avatar: None,
        first_seen: None,
        last_seen: None,
        has_newsletter: None,
        status: None,
        tags: vec![],
        sales_id: None,
        linkedin_url: None,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, point: FailPoint) {
        *lock(&self.fail_on) = Some(point);
    }

    pub fn clear_fail_point(&self) {
        *lock(&self.fail_on) = None;
    }

    fn should_fail(&self, point: &FailPoint) -> bool {
        lock(&self.fail_on).as_ref() == Some(point)
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    /// Maior número de criações simultâneas (vendedores, empresas, contatos).
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) {
        lock(&self.log).push(entry);
    }

    pub fn log(&self) -> Vec<String> {
        lock(&self.log).clone()
    }

    pub fn snapshot(&self) -> MemoryState {
        lock(&self.state).clone()
    }

    pub fn seed_sale(&self, first_name: &str, email: &str, administrator: bool) -> Sale {
        let mut state = lock(&self.state);
        let id = state.next_id();
        let sale = Sale {
            id,
            first_name: first_name.to_string(),
            last_name: "Test".to_string(),
            email: email.to_string(),
            administrator,
            disabled: false,
            avatar: None,
            user_id: Some(Uuid::new_v4()),
        };
        state.sales.insert(id, sale.clone());
        sale
    }

    /// Grava o contato como veio (o id é substituído por um novo).
    pub fn seed_contact(&self, mut contact: Contact) -> Contact {
        let mut state = lock(&self.state);
        contact.id = state.next_id();
        state.contacts.insert(contact.id, contact.clone());
        contact
    }

    pub fn seed_deal(&self, contact_ids: Vec<i64>) -> i64 {
        let mut state = lock(&self.state);
        let id = state.next_id();
        state.deals.insert(id, DealContacts { id, contact_ids });
        id
    }

    pub fn seed_task(&self, contact_id: i64) -> i64 {
        let mut state = lock(&self.state);
        let id = state.next_id();
        state.tasks.insert(
            id,
            Task {
                id,
                contact_id,
                kind: None,
                text: Some("Call back".into()),
                due_date: Utc::now(),
                done_date: None,
                sales_id: None,
            },
        );
        id
    }

    pub fn seed_note(&self, contact_id: i64) -> i64 {
        let mut state = lock(&self.state);
        let id = state.next_id();
        state.notes.insert(
            id,
            ContactNote {
                id,
                contact_id,
                text: Some("Met at the fair".into()),
                date: Utc::now(),
                sales_id: None,
                status: None,
                attachments: Json(vec![]),
            },
        );
        id
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[async_trait]
impl CrmStore for MemoryStore {
    async fn find_sale_by_email(&self, email: &str) -> Result<Option<Sale>, AppError> {
        Ok(lock(&self.state).sales.values().find(|s| same_email(&s.email, email)).cloned())
    }

    async fn find_sale_by_user_id(&self, user_id: Uuid) -> Result<Option<Sale>, AppError> {
        Ok(lock(&self.state).sales.values().find(|s| s.user_id == Some(user_id)).cloned())
    }

    async fn create_sale(&self, sale: &NewSale) -> Result<Sale, AppError> {
        self.record(format!("sale:create:{}", sale.email));
        let _in_flight = self.enter();
        tokio::task::yield_now().await;
        let mut state = lock(&self.state);
        if state.sales.values().any(|s| same_email(&s.email, &sale.email)) {
            return Err(AppError::EmailAlreadyExists);
        }
        let id = state.next_id();
        let created = Sale {
            id,
            first_name: sale.first_name.clone(),
            last_name: sale.last_name.clone(),
            email: sale.email.clone(),
            administrator: sale.administrator,
            disabled: sale.disabled,
            avatar: sale.avatar.clone().map(Json),
            user_id: sale.user_id,
        };
        state.sales.insert(id, created.clone());
        Ok(created)
    }

    async fn update_sale(&self, id: i64, patch: &UpdateSalePayload) -> Result<Option<Sale>, AppError> {
        let mut state = lock(&self.state);
        let Some(sale) = state.sales.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = &patch.first_name {
            sale.first_name = v.clone();
        }
        if let Some(v) = &patch.last_name {
            sale.last_name = v.clone();
        }
        if let Some(v) = &patch.email {
            sale.email = v.clone();
        }
        if let Some(v) = &patch.avatar {
            sale.avatar = Some(Json(v.clone()));
        }
        if let Some(v) = patch.administrator {
            sale.administrator = v;
        }
        if let Some(v) = patch.disabled {
            sale.disabled = v;
        }
        Ok(Some(sale.clone()))
    }

    async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>, AppError> {
        Ok(lock(&self.state).company_by_name(name))
    }

    async fn create_company(&self, company: &NewCompany) -> Result<Company, AppError> {
        self.record(format!("company:create:{}", company.name));
        let _in_flight = self.enter();
        tokio::task::yield_now().await;
        if self.should_fail(&FailPoint::CreateCompany(company.name.clone())) {
            return Err(AppError::InternalServerError(anyhow::anyhow!("connection reset")));
        }
        Ok(lock(&self.state).insert_company(company))
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<Contact>, AppError> {
        Ok(lock(&self.state).contact_by_email(email))
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, AppError> {
        let label = contact.first_name.clone().unwrap_or_default();
        self.record(format!("contact:start:{}", label));
        let _in_flight = self.enter();
        // Força o entrelaçamento com as outras criações do lote
        tokio::task::yield_now().await;
        let created = lock(&self.state).insert_contact(contact);
        tokio::task::yield_now().await;
        self.record(format!("contact:done:{}", created.id));
        Ok(created)
    }

    async fn touch_contact(&self, id: i64, seen_at: DateTime<Utc>) -> Result<(), AppError> {
        lock(&self.state).touch(id, seen_at);
        Ok(())
    }

    async fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>, AppError> {
        Ok(lock(&self.state).tags.values().find(|t| t.name == name).cloned())
    }

    async fn create_tag(&self, name: &str, color: &str) -> Result<Tag, AppError> {
        self.record(format!("tag:create:{}", name));
        tokio::task::yield_now().await;
        let mut state = lock(&self.state);
        let id = state.next_id();
        let tag = Tag { id, name: name.to_string(), color: color.to_string() };
        state.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn create_contact_note(&self, note: &NewContactNote) -> Result<ContactNote, AppError> {
        self.record(format!("note:start:{}", note.contact_id));
        lock(&self.state).insert_note(note)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, AppError> {
        self.record(format!("task:start:{}", task.contact_id));
        let mut state = lock(&self.state);
        if !state.contacts.contains_key(&task.contact_id) {
            return Err(AppError::ContactNotFound(task.contact_id));
        }
        let id = state.next_id();
        let created = Task {
            id,
            contact_id: task.contact_id,
            kind: task.kind.clone(),
            text: task.text.clone(),
            due_date: task.due_date,
            done_date: task.done_date,
            sales_id: task.sales_id,
        };
        state.tasks.insert(id, created.clone());
        Ok(created)
    }

    async fn load_configuration(&self) -> Result<Option<Configuration>, AppError> {
        Ok(lock(&self.state).configuration.clone())
    }

    async fn save_configuration(&self, configuration: &Configuration) -> Result<Configuration, AppError> {
        lock(&self.state).configuration = Some(configuration.clone());
        Ok(configuration.clone())
    }

    async fn begin_merge(&self, actor_id: i64) -> Result<Box<dyn MergeTransaction>, AppError> {
        self.record(format!("merge:begin:{}", actor_id));
        Ok(Box::new(MemoryMergeTransaction {
            working: self.snapshot(),
            store: self.clone(),
        }))
    }

    async fn begin_inbound(&self, actor_id: i64) -> Result<Box<dyn InboundTransaction>, AppError> {
        self.record(format!("inbound:begin:{}", actor_id));
        Ok(Box::new(MemoryInboundTransaction {
            working: self.snapshot(),
            store: self.clone(),
        }))
    }
}

/// Trabalha numa cópia do estado; só o `commit` a publica.
struct MemoryMergeTransaction {
    working: MemoryState,
    store: MemoryStore,
}

#[async_trait]
impl MergeTransaction for MemoryMergeTransaction {
    async fn fetch_contact(&mut self, id: i64) -> Result<Option<Contact>, AppError> {
        Ok(self.working.contacts.get(&id).cloned())
    }

    async fn reassign_tasks(&mut self, from_contact: i64, to_contact: i64) -> Result<u64, AppError> {
        let mut count = 0;
        for task in self.working.tasks.values_mut().filter(|t| t.contact_id == from_contact) {
            task.contact_id = to_contact;
            count += 1;
        }
        Ok(count)
    }

    async fn reassign_contact_notes(&mut self, from_contact: i64, to_contact: i64) -> Result<u64, AppError> {
        let mut count = 0;
        for note in self.working.notes.values_mut().filter(|n| n.contact_id == from_contact) {
            note.contact_id = to_contact;
            count += 1;
        }
        Ok(count)
    }

    async fn deals_with_contact(&mut self, contact_id: i64) -> Result<Vec<DealContacts>, AppError> {
        Ok(self
            .working
            .deals
            .values()
            .filter(|d| d.contact_ids.contains(&contact_id))
            .cloned()
            .collect())
    }

    async fn update_deal_contacts(&mut self, deal_id: i64, contact_ids: &[i64]) -> Result<(), AppError> {
        if let Some(deal) = self.working.deals.get_mut(&deal_id) {
            deal.contact_ids = contact_ids.to_vec();
        }
        Ok(())
    }

    async fn update_contact(&mut self, contact: &Contact) -> Result<(), AppError> {
        self.working.contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn delete_contact(&mut self, id: i64) -> Result<(), AppError> {
        if self.store.should_fail(&FailPoint::MergeDeleteContact) {
            return Err(AppError::InternalServerError(anyhow::anyhow!("deadlock detected")));
        }
        self.working
            .contacts
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::ContactNotFound(id))
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        *lock(&self.store.state) = self.working;
        Ok(())
    }
}

struct MemoryInboundTransaction {
    working: MemoryState,
    store: MemoryStore,
}

#[async_trait]
impl InboundTransaction for MemoryInboundTransaction {
    async fn find_contact_by_email(&mut self, email: &str) -> Result<Option<Contact>, AppError> {
        Ok(self.working.contact_by_email(email))
    }

    async fn create_contact(&mut self, contact: &NewContact) -> Result<Contact, AppError> {
        Ok(self.working.insert_contact(contact))
    }

    async fn find_company_by_name(&mut self, name: &str) -> Result<Option<Company>, AppError> {
        Ok(self.working.company_by_name(name))
    }

    async fn create_company(&mut self, company: &NewCompany) -> Result<Company, AppError> {
        if self.store.should_fail(&FailPoint::CreateCompany(company.name.clone())) {
            return Err(AppError::InternalServerError(anyhow::anyhow!("connection reset")));
        }
        Ok(self.working.insert_company(company))
    }

    async fn create_contact_note(&mut self, note: &NewContactNote) -> Result<ContactNote, AppError> {
        self.working.insert_note(note)
    }

    async fn touch_contact(&mut self, id: i64, seen_at: DateTime<Utc>) -> Result<(), AppError> {
        self.working.touch(id, seen_at);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.store.record("inbound:commit".into());
        *lock(&self.store.state) = self.working;
        Ok(())
    }
}
