// src/models/import.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::contacts::{EmailAndType, PhoneNumberAndType};

// =============================================================================
//  ARQUIVO DE IMPORTAÇÃO
// =============================================================================

/// Seções do arquivo, na ordem em que dependem umas das outras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImportSection {
    Sales,
    Companies,
    Contacts,
    Notes,
    Tasks,
}

impl ImportSection {
    pub const ALL: [ImportSection; 5] = [
        ImportSection::Sales,
        ImportSection::Companies,
        ImportSection::Contacts,
        ImportSection::Notes,
        ImportSection::Tasks,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    pub fn key(self) -> &'static str {
        match self {
            ImportSection::Sales => "sales",
            ImportSection::Companies => "companies",
            ImportSection::Contacts => "contacts",
            ImportSection::Notes => "notes",
            ImportSection::Tasks => "tasks",
        }
    }

    /// Nível na cadeia de referências: uma seção só pode ser importada
    /// depois de todas as de nível menor.
    pub fn depth(self) -> u8 {
        match self {
            ImportSection::Sales => 0,
            ImportSection::Companies => 1,
            ImportSection::Contacts => 2,
            ImportSection::Notes | ImportSection::Tasks => 3,
        }
    }

    // Usado nas mensagens de erro ("Invalid company: ...")
    pub fn singular(self) -> &'static str {
        match self {
            ImportSection::Sales => "sale",
            ImportSection::Companies => "company",
            ImportSection::Contacts => "contact",
            ImportSection::Notes => "note",
            ImportSection::Tasks => "task",
        }
    }
}

/// Um elemento de uma das seções, ainda sem tipo.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionRecord {
    pub section: ImportSection,
    pub value: Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportSale {
    pub id: i64,
    #[validate(length(min = 1, message = "required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "required"))]
    pub last_name: String,
    #[validate(email(message = "invalid_email"))]
    pub email: String,
    #[serde(default)]
    pub administrator: bool,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportCompany {
    pub id: i64,
    #[validate(length(min = 1, message = "required"))]
    pub name: String,
    pub sector: Option<String>,
    pub size: Option<i64>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub zipcode: Option<String>,
    pub city: Option<String>,
    pub state_abbr: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub revenue: Option<String>,
    pub tax_identifier: Option<String>,
    pub context_links: Option<Vec<String>>,
    pub sales_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportContact {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub title: Option<String>,
    pub company_id: Option<i64>,
    #[serde(default)]
    #[validate(nested)]
    pub email_jsonb: Vec<EmailAndType>,
    #[serde(default)]
    #[validate(nested)]
    pub phone_jsonb: Vec<PhoneNumberAndType>,
    pub background: Option<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub has_newsletter: Option<bool>,
    pub status: Option<String>,
    // Nomes das tags, não ids
    #[serde(default)]
    pub tags: Vec<String>,
    pub sales_id: Option<i64>,
    pub linkedin_url: Option<String>,
}

impl ImportContact {
    pub fn primary_email(&self) -> Option<&str> {
        self.email_jsonb.first().map(|e| e.email.as_str())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportAttachment {
    #[validate(length(min = 1, message = "required"))]
    pub url: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportNote {
    pub contact_id: i64,
    pub text: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub sales_id: Option<i64>,
    pub status: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub attachments: Vec<ImportAttachment>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportTask {
    pub contact_id: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<String>,
    pub due_date: DateTime<Utc>,
    pub done_date: Option<DateTime<Utc>>,
    pub sales_id: Option<i64>,
}

// =============================================================================
//  ESTADO DA IMPORTAÇÃO
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ImportCounters {
    pub sales: usize,
    pub companies: usize,
    pub contacts: usize,
    pub notes: usize,
    pub tasks: usize,
}

impl ImportCounters {
    pub fn increment(&mut self, section: ImportSection) {
        match section {
            ImportSection::Sales => self.sales += 1,
            ImportSection::Companies => self.companies += 1,
            ImportSection::Contacts => self.contacts += 1,
            ImportSection::Notes => self.notes += 1,
            ImportSection::Tasks => self.tasks += 1,
        }
    }
}

/// Registros rejeitados, cada um com um campo `error` a mais.
/// Serializado, é o próprio relatório de erros (e um arquivo de importação válido).
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct FailedImports {
    #[schema(value_type = Vec<Object>)]
    pub sales: Vec<Value>,
    #[schema(value_type = Vec<Object>)]
    pub companies: Vec<Value>,
    #[schema(value_type = Vec<Object>)]
    pub contacts: Vec<Value>,
    #[schema(value_type = Vec<Object>)]
    pub notes: Vec<Value>,
    #[schema(value_type = Vec<Object>)]
    pub tasks: Vec<Value>,
}

impl FailedImports {
    pub fn push(&mut self, section: ImportSection, record: Value) {
        self.section_mut(section).push(record);
    }

    pub fn section(&self, section: ImportSection) -> &[Value] {
        match section {
            ImportSection::Sales => &self.sales,
            ImportSection::Companies => &self.companies,
            ImportSection::Contacts => &self.contacts,
            ImportSection::Notes => &self.notes,
            ImportSection::Tasks => &self.tasks,
        }
    }

    fn section_mut(&mut self, section: ImportSection) -> &mut Vec<Value> {
        match section {
            ImportSection::Sales => &mut self.sales,
            ImportSection::Companies => &mut self.companies,
            ImportSection::Contacts => &mut self.contacts,
            ImportSection::Notes => &mut self.notes,
            ImportSection::Tasks => &mut self.tasks,
        }
    }

    pub fn is_empty(&self) -> bool {
        ImportSection::ALL.iter().all(|s| self.section(*s).is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub imported: ImportCounters,
    pub failed_imports: FailedImports,
}

/// idle -> importing -> (success | error); reset volta para idle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImportState {
    #[default]
    Idle,
    Importing(ImportProgress),
    Success(ImportProgress),
    Error(ImportFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ImportFailure {
    #[serde(flatten)]
    pub progress: ImportProgress,
    pub error: String,
}

impl ImportState {
    pub fn progress(&self) -> Option<&ImportProgress> {
        match self {
            ImportState::Idle => None,
            ImportState::Importing(p) | ImportState::Success(p) => Some(p),
            ImportState::Error(failure) => Some(&failure.progress),
        }
    }

    pub fn is_importing(&self) -> bool {
        matches!(self, ImportState::Importing(_))
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobCreated {
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_serializes_with_status_tag() {
        let mut progress = ImportProgress::default();
        progress.imported.increment(ImportSection::Contacts);
        progress
            .failed_imports
            .push(ImportSection::Notes, json!({ "contact_id": 9, "error": "Contact 9 not found" }));

        let value = serde_json::to_value(ImportState::Importing(progress)).unwrap();

        assert_eq!(value["status"], "importing");
        assert_eq!(value["imported"]["contacts"], 1);
        assert_eq!(value["failedImports"]["notes"][0]["error"], "Contact 9 not found");
        assert_eq!(serde_json::to_value(ImportState::Idle).unwrap(), json!({ "status": "idle" }));
    }

    #[test]
    fn error_state_keeps_counters() {
        let state = ImportState::Error(ImportFailure {
            progress: ImportProgress::default(),
            error: "boom".into(),
        });
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "boom");
        assert_eq!(value["imported"]["sales"], 0);
    }

    #[test]
    fn sections_map_to_file_keys() {
        assert_eq!(ImportSection::from_key("companies"), Some(ImportSection::Companies));
        assert_eq!(ImportSection::from_key("deals"), None);
    }
}
