// src/services/import_service.rs

use std::{
    collections::{HashMap, HashSet},
    io::Read,
    sync::Arc,
};

use chrono::Utc;
use futures::future::join_all;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch, Mutex};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::CrmStore,
    models::{
        companies::{NewCompany, COMPANY_SIZES},
        configuration::Configuration,
        contacts::NewContact,
        import::{
            FailedImports, ImportCompany, ImportContact, ImportFailure, ImportNote, ImportProgress, ImportSale,
            ImportSection, ImportState, ImportTask, SectionRecord,
        },
        notes::{Attachment, NewContactNote},
        sales::{NewSale, Sale},
        tags::TAG_COLORS,
        tasks::NewTask,
    },
    services::{
        import_jobs::ImportJobs,
        import_stream::{self, StreamItem},
    },
};

pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Clone)]
pub struct ImportService {
    store: Arc<dyn CrmStore>,
    jobs: ImportJobs,
    batch_size: usize,
}

impl ImportService {
    pub fn new(store: Arc<dyn CrmStore>, jobs: ImportJobs, batch_size: usize) -> Self {
        Self { store, jobs, batch_size: batch_size.max(1) }
    }

    pub async fn create_job(&self, owner: &Sale) -> Uuid {
        self.jobs.create(owner.id).await
    }

    pub async fn state(&self, job_id: Uuid, owner: &Sale) -> Result<ImportState, AppError> {
        self.jobs.state(job_id, owner.id).await
    }

    pub async fn reset(&self, job_id: Uuid, owner: &Sale) -> Result<(), AppError> {
        self.jobs.reset(job_id, owner.id).await
    }

    /// Relatório de erros: os registros rejeitados até agora.
    pub async fn report(&self, job_id: Uuid, owner: &Sale) -> Result<FailedImports, AppError> {
        let state = self.jobs.state(job_id, owner.id).await?;
        Ok(state.progress().map(|p| p.failed_imports.clone()).unwrap_or_default())
    }

    /// Importa o arquivo no job (que precisa estar idle e ser de `actor`) e
    /// devolve o estado final.
    pub async fn run<R>(
        &self,
        job_id: Uuid,
        reader: R,
        configuration: &Configuration,
        actor: &Sale,
    ) -> Result<ImportState, AppError>
    where
        R: Read + Send + 'static,
    {
        let state = self.jobs.start(job_id, actor.id).await?;
        tracing::info!("📥 Importação {} iniciada por {}", job_id, actor.email);

        let records = import_stream::spawn_reader(reader, self.batch_size);
        let importer = Importer::new(self.store.as_ref(), configuration, actor, self.batch_size);
        let final_state = importer.run(records, &state).await;

        if let Some(progress) = final_state.progress() {
            tracing::info!(
                "📦 Importação {} terminada: {:?}, {} falhas",
                job_id,
                progress.imported,
                ImportSection::ALL.iter().map(|s| progress.failed_imports.section(*s).len()).sum::<usize>()
            );
        }

        self.jobs.finish(job_id, actor.id, final_state.clone()).await?;
        Ok(final_state)
    }
}

// =============================================================================
//  IMPORTADOR
// =============================================================================

/// Tabelas "id do arquivo -> id no banco".
#[derive(Default)]
struct IdMaps {
    sales: HashMap<i64, i64>,
    companies: HashMap<i64, i64>,
    contacts: HashMap<i64, i64>,
}

impl IdMaps {
    fn insert(&mut self, section: ImportSection, file_id: i64, id: i64) {
        let map = match section {
            ImportSection::Sales => &mut self.sales,
            ImportSection::Companies => &mut self.companies,
            ImportSection::Contacts => &mut self.contacts,
            ImportSection::Notes | ImportSection::Tasks => return,
        };
        map.insert(file_id, id);
    }
}

/// Cache nome -> id das tags. O lock fica com quem está criando, então duas
/// gravações do mesmo lote nunca criam a mesma tag.
#[derive(Default)]
struct TagCache {
    by_name: Mutex<HashMap<String, i64>>,
}

impl TagCache {
    async fn resolve(&self, store: &dyn CrmStore, name: &str) -> Result<i64, AppError> {
        let mut cache = self.by_name.lock().await;
        if let Some(id) = cache.get(name) {
            return Ok(*id);
        }

        let tag = match store.find_tag_by_name(name).await? {
            Some(tag) => tag,
            None => {
                let color = TAG_COLORS[cache.len() % TAG_COLORS.len()];
                store.create_tag(name, color).await?
            }
        };
        cache.insert(name.to_string(), tag.id);
        Ok(tag.id)
    }
}

/// Lote de registros da mesma seção, criados em paralelo.
#[derive(Default)]
struct Batch {
    section: Option<ImportSection>,
    records: Vec<Value>,
    keys: HashSet<String>,
}

impl Batch {
    // Troca de seção ou chave repetida: o lote atual tem que terminar antes
    fn must_drain_before(&self, section: ImportSection, key: Option<&str>) -> bool {
        match self.section {
            None => false,
            Some(current) => current != section || key.is_some_and(|k| self.keys.contains(k)),
        }
    }

    fn push(&mut self, section: ImportSection, value: Value, key: Option<String>) {
        self.section = Some(section);
        self.records.push(value);
        if let Some(key) = key {
            self.keys.insert(key);
        }
    }

    fn take(&mut self) -> Option<(ImportSection, Vec<Value>)> {
        self.keys.clear();
        let section = self.section.take()?;
        Some((section, std::mem::take(&mut self.records)))
    }
}

/// Chave de deduplicação dentro de um lote.
fn dedup_key(section: ImportSection, value: &Value) -> Option<String> {
    let raw = match section {
        ImportSection::Sales => value.get("email")?.as_str()?.trim().to_lowercase(),
        ImportSection::Companies => value.get("name")?.as_str()?.to_string(),
        ImportSection::Contacts => value.pointer("/email_jsonb/0/email")?.as_str()?.trim().to_lowercase(),
        ImportSection::Notes | ImportSection::Tasks => return None,
    };
    Some(raw)
}

enum Outcome {
    Imported { file_id: Option<i64>, id: i64 },
    Failed(Value),
}

/// Anexa o motivo ao registro, que volta para o relatório como está.
fn with_error(record: Value, error: &str) -> Value {
    match record {
        Value::Object(mut fields) => {
            fields.insert("error".to_string(), Value::String(error.to_string()));
            Value::Object(fields)
        }
        other => json!({ "record": other, "error": error }),
    }
}

fn parse<T>(section: ImportSection, value: &Value) -> Result<T, String>
where
    T: DeserializeOwned + Validate,
{
    let record = T::deserialize(value).map_err(|e| format!("Invalid {}: {}", section.singular(), e))?;
    record.validate().map_err(|e| {
        format!("Invalid {}: {}", section.singular(), e.to_string().trim().replace('\n', "; "))
    })?;
    Ok(record)
}

fn check_choice(field: &str, value: Option<&str>, allowed: &[&str]) -> Result<(), String> {
    match value {
        Some(v) if !allowed.contains(&v) => Err(format!(
            "Invalid {} \"{}\", expected one of: {}",
            field,
            v,
            allowed.join(", ")
        )),
        _ => Ok(()),
    }
}

fn backend_error(section: ImportSection, e: AppError) -> String {
    format!("Failed to import {}: {}", section.singular(), e)
}

struct Importer<'a> {
    store: &'a dyn CrmStore,
    configuration: &'a Configuration,
    actor: &'a Sale,
    batch_size: usize,
    ids: IdMaps,
    tags: TagCache,
    progress: ImportProgress,
}

impl<'a> Importer<'a> {
    fn new(store: &'a dyn CrmStore, configuration: &'a Configuration, actor: &'a Sale, batch_size: usize) -> Self {
        Self {
            store,
            configuration,
            actor,
            batch_size,
            ids: IdMaps::default(),
            tags: TagCache::default(),
            progress: ImportProgress::default(),
        }
    }

    async fn run(mut self, mut records: mpsc::Receiver<StreamItem>, state: &watch::Sender<ImportState>) -> ImportState {
        let mut batch = Batch::default();

        while let Some(item) = records.recv().await {
            match item {
                Ok(SectionRecord { section, value }) => {
                    let key = dedup_key(section, &value);
                    if batch.must_drain_before(section, key.as_deref()) {
                        self.drain(&mut batch, state).await;
                    }
                    batch.push(section, value, key);
                    if batch.records.len() >= self.batch_size {
                        self.drain(&mut batch, state).await;
                    }
                }
                Err(error) => {
                    // O que já foi lido por inteiro ainda é gravado
                    self.drain(&mut batch, state).await;
                    tracing::warn!("⚠️ Importação interrompida: {}", error);
                    return ImportState::Error(ImportFailure { progress: self.progress, error });
                }
            }
        }

        self.drain(&mut batch, state).await;
        ImportState::Success(self.progress)
    }

    /// Dispara o lote inteiro e só volta quando todas as gravações terminarem.
    async fn drain(&mut self, batch: &mut Batch, state: &watch::Sender<ImportState>) {
        let Some((section, records)) = batch.take() else {
            return;
        };

        let outcomes = {
            let this = &*self;
            join_all(records.into_iter().map(|value| this.import_record(section, value))).await
        };

        for outcome in outcomes {
            match outcome {
                Outcome::Imported { file_id, id } => {
                    if let Some(file_id) = file_id {
                        self.ids.insert(section, file_id, id);
                    }
                    self.progress.imported.increment(section);
                }
                Outcome::Failed(record) => self.progress.failed_imports.push(section, record),
            }
        }

        state.send_replace(ImportState::Importing(self.progress.clone()));
    }

    async fn import_record(&self, section: ImportSection, value: Value) -> Outcome {
        let result = match section {
            ImportSection::Sales => self.import_sale(&value).await,
            ImportSection::Companies => self.import_company(&value).await,
            ImportSection::Contacts => self.import_contact(&value).await,
            ImportSection::Notes => self.import_note(&value).await.map(|id| (None, id)),
            ImportSection::Tasks => self.import_task(&value).await.map(|id| (None, id)),
        };

        match result {
            Ok((file_id, id)) => Outcome::Imported { file_id, id },
            Err(error) => {
                tracing::debug!("Registro rejeitado ({}): {}", section.key(), error);
                Outcome::Failed(with_error(value, &error))
            }
        }
    }

    // --- Chaves estrangeiras ---

    // Sem sales_id no arquivo, o registro fica com quem está importando
    fn resolve_sale(&self, file_id: Option<i64>) -> Result<Option<i64>, String> {
        match file_id {
            None => Ok(Some(self.actor.id)),
            Some(id) => self.ids.sales.get(&id).copied().map(Some).ok_or_else(|| format!("Sale {} not found", id)),
        }
    }

    fn resolve_company(&self, file_id: Option<i64>) -> Result<Option<i64>, String> {
        match file_id {
            None => Ok(None),
            Some(id) => self
                .ids
                .companies
                .get(&id)
                .copied()
                .map(Some)
                .ok_or_else(|| format!("Company {} not found", id)),
        }
    }

    fn resolve_contact(&self, file_id: i64) -> Result<i64, String> {
        self.ids.contacts.get(&file_id).copied().ok_or_else(|| format!("Contact {} not found", file_id))
    }

    // --- Um registro por seção ---

    async fn import_sale(&self, value: &Value) -> Result<(Option<i64>, i64), String> {
        let section = ImportSection::Sales;
        let sale: ImportSale = parse(section, value)?;

        // Reimportar o mesmo arquivo não duplica vendedores
        if let Some(existing) = self.store.find_sale_by_email(&sale.email).await.map_err(|e| backend_error(section, e))? {
            return Ok((Some(sale.id), existing.id));
        }

        // Criar contas é restrito a administradores, como no POST /api/sales
        if !self.actor.administrator {
            return Err(format!("Only administrators can create sale {}", sale.email.trim()));
        }

        let created = self
            .store
            .create_sale(&NewSale {
                first_name: sale.first_name,
                last_name: sale.last_name,
                email: sale.email.trim().to_string(),
                administrator: sale.administrator,
                disabled: sale.disabled,
                avatar: None,
                user_id: None,
            })
            .await
            .map_err(|e| backend_error(section, e))?;

        Ok((Some(sale.id), created.id))
    }

    async fn import_company(&self, value: &Value) -> Result<(Option<i64>, i64), String> {
        let section = ImportSection::Companies;
        let company: ImportCompany = parse(section, value)?;

        let size = match company.size {
            None => None,
            Some(size) => Some(
                COMPANY_SIZES
                    .iter()
                    .copied()
                    .find(|allowed| i64::from(*allowed) == size)
                    .ok_or_else(|| {
                        let allowed: Vec<String> = COMPANY_SIZES.iter().map(ToString::to_string).collect();
                        format!("Invalid size \"{}\", expected one of: {}", size, allowed.join(", "))
                    })?,
            ),
        };
        let sales_id = self.resolve_sale(company.sales_id)?;

        if let Some(existing) = self.store.find_company_by_name(&company.name).await.map_err(|e| backend_error(section, e))? {
            return Ok((Some(company.id), existing.id));
        }

        let created = self
            .store
            .create_company(&NewCompany {
                name: company.name,
                sector: company.sector,
                size,
                linkedin_url: company.linkedin_url,
                website: company.website,
                phone_number: company.phone_number,
                address: company.address,
                zipcode: company.zipcode,
                city: company.city,
                state_abbr: company.state_abbr,
                country: company.country,
                description: company.description,
                revenue: company.revenue,
                tax_identifier: company.tax_identifier,
                context_links: company.context_links,
                sales_id,
            })
            .await
            .map_err(|e| backend_error(section, e))?;

        Ok((Some(company.id), created.id))
    }

    async fn import_contact(&self, value: &Value) -> Result<(Option<i64>, i64), String> {
        let section = ImportSection::Contacts;
        let contact: ImportContact = parse(section, value)?;

        check_choice("gender", contact.gender.as_deref(), &self.configuration.gender_values())?;
        check_choice("status", contact.status.as_deref(), &self.configuration.note_status_values())?;
        let company_id = self.resolve_company(contact.company_id)?;
        let sales_id = self.resolve_sale(contact.sales_id)?;

        if let Some(email) = contact.primary_email() {
            if let Some(existing) = self.store.find_contact_by_email(email).await.map_err(|e| backend_error(section, e))? {
                return Ok((Some(contact.id), existing.id));
            }
        }

        let mut tags = Vec::with_capacity(contact.tags.len());
        for name in contact.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let id = self.tags.resolve(self.store, name).await.map_err(|e| backend_error(section, e))?;
            if !tags.contains(&id) {
                tags.push(id);
            }
        }

        let created = self
            .store
            .create_contact(&NewContact {
                first_name: contact.first_name,
                last_name: contact.last_name,
                gender: contact.gender,
                title: contact.title,
                company_id,
                email_jsonb: contact.email_jsonb,
                phone_jsonb: contact.phone_jsonb,
                background: contact.background,
                first_seen: contact.first_seen,
                last_seen: contact.last_seen,
                has_newsletter: contact.has_newsletter,
                status: contact.status,
                tags,
                sales_id,
                linkedin_url: contact.linkedin_url,
            })
            .await
            .map_err(|e| backend_error(section, e))?;

        Ok((Some(contact.id), created.id))
    }

    async fn import_note(&self, value: &Value) -> Result<i64, String> {
        let section = ImportSection::Notes;
        let note: ImportNote = parse(section, value)?;

        check_choice("status", note.status.as_deref(), &self.configuration.note_status_values())?;
        let contact_id = self.resolve_contact(note.contact_id)?;
        let sales_id = self.resolve_sale(note.sales_id)?;

        let attachments = note
            .attachments
            .into_iter()
            .map(|a| Attachment { src: a.url, title: a.name, kind: None, path: None })
            .collect();

        let created = self
            .store
            .create_contact_note(&NewContactNote {
                contact_id,
                text: note.text,
                date: note.date.unwrap_or_else(Utc::now),
                sales_id,
                status: note.status,
                attachments,
            })
            .await
            .map_err(|e| backend_error(section, e))?;

        Ok(created.id)
    }

    async fn import_task(&self, value: &Value) -> Result<i64, String> {
        let section = ImportSection::Tasks;
        let task: ImportTask = parse(section, value)?;

        check_choice("type", task.kind.as_deref(), &self.configuration.task_type_values())?;
        let contact_id = self.resolve_contact(task.contact_id)?;
        let sales_id = self.resolve_sale(task.sales_id)?;

        let created = self
            .store
            .create_task(&NewTask {
                contact_id,
                kind: task.kind,
                text: task.text,
                due_date: task.due_date,
                done_date: task.done_date,
                sales_id,
            })
            .await
            .map_err(|e| backend_error(section, e))?;

        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{FailPoint, MemoryStore};

    fn service(store: &MemoryStore, batch_size: usize) -> ImportService {
        ImportService::new(Arc::new(store.clone()), ImportJobs::default(), batch_size)
    }

    async fn import(store: &MemoryStore, actor: &Sale, file: Value) -> ImportState {
        let service = service(store, DEFAULT_BATCH_SIZE);
        let job = service.create_job(actor).await;
        let bytes = serde_json::to_vec(&file).unwrap();
        service
            .run(job, std::io::Cursor::new(bytes), &Configuration::default(), actor)
            .await
            .unwrap()
    }

    fn progress(state: &ImportState) -> &ImportProgress {
        match state {
            ImportState::Success(p) => p,
            other => panic!("esperava success, veio {:?}", other),
        }
    }

    fn sample_file() -> Value {
        json!({
            "sales": [
                { "id": 1, "first_name": "Jane", "last_name": "Doe", "email": "jane@acme.com" }
            ],
            "companies": [
                { "id": 10, "name": "Acme", "size": 50, "sales_id": 1 }
            ],
            "contacts": [
                {
                    "id": 100, "first_name": "John", "last_name": "Smith", "gender": "male",
                    "company_id": 10, "sales_id": 1, "status": "warm", "tags": ["vip", "lead"],
                    "email_jsonb": [{ "email": "john@acme.com", "type": "Work" }]
                },
                {
                    "id": 101, "first_name": "Ana", "last_name": "Lopes", "gender": "female",
                    "tags": ["vip"], "email_jsonb": [{ "email": "ana@acme.com", "type": "Work" }]
                }
            ],
            "notes": [
                { "contact_id": 100, "text": "Intro call", "sales_id": 1, "status": "hot",
                  "attachments": [{ "url": "https://files.acme.com/deck.pdf", "name": "deck.pdf" }] },
                { "contact_id": 101, "text": "Sent proposal" }
            ],
            "tasks": [
                { "contact_id": 101, "type": "Call", "text": "Follow up", "due_date": "2025-03-01T09:00:00Z" }
            ]
        })
    }

    #[tokio::test]
    async fn imports_every_section_with_remapped_ids() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);

        let state = import(&store, &actor, sample_file()).await;
        let progress = progress(&state);

        assert_eq!(progress.imported.sales, 1);
        assert_eq!(progress.imported.companies, 1);
        assert_eq!(progress.imported.contacts, 2);
        assert_eq!(progress.imported.notes, 2);
        assert_eq!(progress.imported.tasks, 1);
        assert!(progress.failed_imports.is_empty());

        let db = store.snapshot();
        let jane = db.sales.values().find(|s| s.email == "jane@acme.com").unwrap();
        let acme = db.companies.values().next().unwrap();
        assert_eq!(acme.sales_id, Some(jane.id));

        let john = db.contacts.values().find(|c| c.first_name.as_deref() == Some("John")).unwrap();
        let ana = db.contacts.values().find(|c| c.first_name.as_deref() == Some("Ana")).unwrap();
        assert_eq!(john.company_id, Some(acme.id));
        assert_eq!(john.sales_id, Some(jane.id));
        // Sem sales_id, o contato fica com quem importou
        assert_eq!(ana.sales_id, Some(actor.id));

        // "vip" aparece duas vezes no mesmo lote mas vira uma tag só
        assert_eq!(db.tags.len(), 2);
        let vip = db.tags.values().find(|t| t.name == "vip").unwrap();
        assert!(john.tags.contains(&vip.id) && ana.tags.contains(&vip.id));

        let deck_note = db.notes.values().find(|n| n.contact_id == john.id).unwrap();
        assert_eq!(deck_note.attachments.0[0].src, "https://files.acme.com/deck.pdf");
        assert_eq!(deck_note.attachments.0[0].title.as_deref(), Some("deck.pdf"));
        assert_eq!(db.tasks.values().next().unwrap().contact_id, ana.id);
    }

    #[tokio::test]
    async fn key_order_in_the_file_does_not_break_references() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let service = service(&store, DEFAULT_BATCH_SIZE);
        let job = service.create_job(&actor).await;
        // Dependentes antes das dependências
        let raw = br#"{
            "tasks": [{ "contact_id": 100, "due_date": "2025-03-01T09:00:00Z" }],
            "notes": [{ "contact_id": 100, "text": "Intro call", "sales_id": 1 }],
            "contacts": [{ "id": 100, "first_name": "John", "last_name": "Smith", "company_id": 10, "sales_id": 1 }],
            "companies": [{ "id": 10, "name": "Acme", "sales_id": 1 }],
            "sales": [{ "id": 1, "first_name": "Jane", "last_name": "Doe", "email": "jane@acme.com" }]
        }"#;

        let state = service.run(job, &raw[..], &Configuration::default(), &actor).await.unwrap();
        let progress = progress(&state);

        assert!(progress.failed_imports.is_empty(), "{:?}", progress.failed_imports);
        assert_eq!(progress.imported.tasks, 1);
        let db = store.snapshot();
        let jane = db.sales.values().find(|s| s.email == "jane@acme.com").unwrap();
        let john = db.contacts.values().next().unwrap();
        assert_eq!(john.sales_id, Some(jane.id));
        assert_eq!(john.company_id, db.companies.keys().next().copied());
    }

    #[tokio::test]
    async fn reimporting_a_sale_reuses_the_existing_record() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let file = json!({
            "sales": [
                { "id": 1, "first_name": "Jane", "last_name": "Doe", "email": "jane@acme.com" },
                { "id": 2, "first_name": "Jane", "last_name": "Doe", "email": "JANE@acme.com" }
            ]
        });

        let first = import(&store, &actor, file.clone()).await;
        let second = import(&store, &actor, file).await;

        assert_eq!(progress(&first).imported.sales, 2);
        assert_eq!(progress(&second).imported.sales, 2);
        let creates = store.log().iter().filter(|l| l.starts_with("sale:create")).count();
        assert_eq!(creates, 1);
        assert_eq!(store.snapshot().sales.len(), 2); // admin + jane
    }

    #[tokio::test]
    async fn only_administrators_create_sales_on_import() {
        let store = MemoryStore::new();
        store.seed_sale("Known", "known@crm.io", false);
        let actor = store.seed_sale("Rep", "rep@crm.io", false);
        let file = json!({
            "sales": [
                { "id": 1, "first_name": "Known", "last_name": "Test", "email": "KNOWN@crm.io" },
                { "id": 2, "first_name": "New", "last_name": "Hire", "email": "new@crm.io", "administrator": true }
            ],
            "companies": [
                { "id": 10, "name": "Acme", "sales_id": 1 },
                { "id": 11, "name": "Globex", "sales_id": 2 }
            ]
        });

        let state = import(&store, &actor, file).await;
        let progress = progress(&state);

        // A conta que já existe é reaproveitada; a nova é recusada
        assert_eq!(progress.imported.sales, 1);
        assert_eq!(progress.failed_imports.sales[0]["email"], "new@crm.io");
        assert!(progress.failed_imports.sales[0]["error"].as_str().unwrap().starts_with("Only administrators"));
        assert_eq!(progress.imported.companies, 1);
        assert_eq!(progress.failed_imports.companies[0]["error"], "Sale 2 not found");
        assert_eq!(store.snapshot().sales.len(), 2);
        assert!(!store.log().iter().any(|l| l.starts_with("sale:create")));
    }

    #[tokio::test]
    async fn no_more_than_a_batch_is_written_at_once() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let service = service(&store, 3);
        let job = service.create_job(&actor).await;
        let companies: Vec<Value> = (1..=10).map(|i| json!({ "id": i, "name": format!("Company {}", i) })).collect();
        let bytes = serde_json::to_vec(&json!({ "companies": companies })).unwrap();

        let state = service
            .run(job, std::io::Cursor::new(bytes), &Configuration::default(), &actor)
            .await
            .unwrap();

        assert_eq!(progress(&state).imported.companies, 10);
        // Lotes de 3 criados em paralelo, e nunca mais que isso
        assert_eq!(store.peak_in_flight(), 3);
    }

    #[tokio::test]
    async fn notes_wait_for_their_contacts() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let contacts: Vec<Value> = (1..=5)
            .map(|i| json!({ "id": i, "first_name": format!("c{}", i), "last_name": "X" }))
            .collect();
        let notes: Vec<Value> = (1..=5).rev().map(|i| json!({ "contact_id": i, "text": "hello" })).collect();

        let state = import(&store, &actor, json!({ "contacts": contacts, "notes": notes })).await;
        assert_eq!(progress(&state).imported.notes, 5);

        let log = store.log();
        let position = |entry: &str| log.iter().position(|l| l == entry).unwrap();
        for contact in store.snapshot().contacts.values() {
            let done = position(&format!("contact:done:{}", contact.id));
            let note = position(&format!("note:start:{}", contact.id));
            assert!(done < note, "nota de {} criada antes do contato", contact.id);
        }
    }

    #[tokio::test]
    async fn invalid_gender_is_rejected_before_reaching_the_store() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let file = json!({
            "contacts": [{ "id": 1, "first_name": "Pat", "last_name": "Doe", "gender": "unknown" }]
        });

        let state = import(&store, &actor, file).await;
        let progress = progress(&state);

        assert_eq!(progress.imported.contacts, 0);
        let error = progress.failed_imports.contacts[0]["error"].as_str().unwrap();
        assert!(error.contains("\"unknown\""), "{}", error);
        assert!(error.contains("male, female, nonbinary"), "{}", error);
        assert!(!store.log().iter().any(|l| l.starts_with("contact:")));
    }

    #[tokio::test]
    async fn one_bad_company_does_not_block_the_batch() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        store.fail_on(FailPoint::CreateCompany("Flaky".into()));
        let file = json!({
            "companies": [
                { "id": 1, "name": "Acme" },
                { "id": 2, "sector": "Energy" },
                { "id": 3, "name": "Flaky" },
                { "id": 4, "name": "Globex", "size": 7 },
                { "id": 5, "name": "Initech", "size": 250 }
            ]
        });

        let state = import(&store, &actor, file).await;
        let progress = progress(&state);

        assert_eq!(progress.imported.companies, 2);
        let errors: Vec<&str> = progress
            .failed_imports
            .companies
            .iter()
            .map(|c| c["error"].as_str().unwrap())
            .collect();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("missing field `name`")));
        assert!(errors.iter().any(|e| e.starts_with("Failed to import company")));
        assert!(errors.iter().any(|e| e.contains("1, 10, 50, 250, 500")));

        let names: Vec<String> = store.snapshot().companies.values().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["Acme".to_string(), "Initech".to_string()]);
    }

    #[tokio::test]
    async fn sale_failures_do_not_stop_the_import() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let file = json!({
            "sales": [{ "id": 1, "first_name": "Bad", "last_name": "Mail", "email": "not-an-email" }],
            "companies": [{ "id": 1, "name": "Acme", "sales_id": 1 }, { "id": 2, "name": "Globex" }]
        });

        let state = import(&store, &actor, file).await;
        let progress = progress(&state);

        assert_eq!(progress.failed_imports.sales.len(), 1);
        // A empresa do vendedor rejeitado aponta para uma chave que não existe
        assert_eq!(progress.failed_imports.companies[0]["error"], "Sale 1 not found");
        assert_eq!(progress.imported.companies, 1);
    }

    #[tokio::test]
    async fn orphan_notes_are_reported_not_dropped() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let file = json!({
            "notes": [{ "contact_id": 42, "text": "lost" }],
            "tasks": [{ "contact_id": 42, "due_date": "2025-01-01T00:00:00Z" }]
        });

        let state = import(&store, &actor, file).await;
        let progress = progress(&state);

        assert_eq!(progress.failed_imports.notes[0]["error"], "Contact 42 not found");
        assert_eq!(progress.failed_imports.notes[0]["text"], "lost");
        assert_eq!(progress.failed_imports.tasks[0]["error"], "Contact 42 not found");
    }

    #[tokio::test]
    async fn broken_file_ends_in_error_with_the_counters_so_far() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let service = service(&store, 2);
        let job = service.create_job(&actor).await;
        let raw = br#"{"sales": [{"id": 1, "first_name": "A", "last_name": "B", "email": "a@crm.io"}],
            "companies": [{"id": 1, "name": "Acme"}, {"id": 2, "name": "Globex"}, {"id": 3, "#;

        let state = service
            .run(job, &raw[..], &Configuration::default(), &actor)
            .await
            .unwrap();

        match state {
            ImportState::Error(failure) => {
                assert_eq!(failure.progress.imported.sales, 1);
                assert_eq!(failure.progress.imported.companies, 2);
                assert!(failure.error.starts_with("Invalid import file"));
            }
            other => panic!("esperava error, veio {:?}", other),
        }
        assert!(matches!(service.state(job, &actor).await.unwrap(), ImportState::Error(_)));
    }

    #[tokio::test]
    async fn the_error_report_can_be_fixed_and_imported_again() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let mut file = sample_file();
        file["notes"] = json!([{ "contact_id": 999, "text": "Typo in contact id" }]);

        let service = service(&store, DEFAULT_BATCH_SIZE);
        let job = service.create_job(&actor).await;
        let bytes = serde_json::to_vec(&file).unwrap();
        service
            .run(job, std::io::Cursor::new(bytes), &Configuration::default(), &actor)
            .await
            .unwrap();

        let report = serde_json::to_value(service.report(job, &actor).await.unwrap()).unwrap();
        assert_eq!(report["notes"].as_array().unwrap().len(), 1);
        let before = store.snapshot();

        // O usuário corrige o id e reenvia junto com o resto do arquivo
        let mut retry = file.clone();
        let mut fixed = report["notes"].clone();
        fixed[0]["contact_id"] = json!(100);
        retry["notes"] = fixed;
        retry["tasks"] = json!([]);

        service.reset(job, &actor).await.unwrap();
        let bytes = serde_json::to_vec(&retry).unwrap();
        let state = service
            .run(job, std::io::Cursor::new(bytes), &Configuration::default(), &actor)
            .await
            .unwrap();

        assert!(progress(&state).failed_imports.is_empty());
        let after = store.snapshot();
        assert_eq!(after.sales.len(), before.sales.len());
        assert_eq!(after.companies.len(), before.companies.len());
        assert_eq!(after.contacts.len(), before.contacts.len());
        assert_eq!(after.notes.len(), before.notes.len() + 1);
    }

    #[tokio::test]
    async fn a_finished_job_must_be_reset_before_running_again() {
        let store = MemoryStore::new();
        let actor = store.seed_sale("Admin", "admin@crm.io", true);
        let service = service(&store, DEFAULT_BATCH_SIZE);
        let job = service.create_job(&actor).await;

        service.run(job, &b"{}"[..], &Configuration::default(), &actor).await.unwrap();
        let again = service.run(job, &b"{}"[..], &Configuration::default(), &actor).await;

        assert!(matches!(again, Err(AppError::ImportNotIdle)));
    }
}
