// src/models/configuration.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LabeledValue {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NoteStatus {
    pub value: String,
    pub label: String,
    pub color: String,
}

/// Configuração do CRM (linha única `configuration`). Chaves ausentes no
/// banco assumem os valores padrão.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    #[schema(example = "Atomic CRM")]
    pub title: String,
    pub light_mode_logo: Option<String>,
    pub dark_mode_logo: Option<String>,
    pub company_sectors: Vec<String>,
    pub deal_categories: Vec<String>,
    pub deal_stages: Vec<LabeledValue>,
    pub deal_pipeline_statuses: Vec<String>,
    pub note_statuses: Vec<NoteStatus>,
    pub task_types: Vec<String>,
    pub contact_gender: Vec<LabeledValue>,
}

fn labeled(pairs: &[(&str, &str)]) -> Vec<LabeledValue> {
    pairs
        .iter()
        .map(|(value, label)| LabeledValue { value: value.to_string(), label: label.to_string() })
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            title: "Atomic CRM".to_string(),
            light_mode_logo: None,
            dark_mode_logo: None,
            company_sectors: strings(&[
                "Communication Services",
                "Consumer Discretionary",
                "Consumer Staples",
                "Energy",
                "Financials",
                "Health Care",
                "Industrials",
                "Information Technology",
                "Materials",
                "Real Estate",
                "Utilities",
            ]),
            deal_categories: strings(&["Other", "Copywriting", "Print project", "UI Design", "Website design"]),
            deal_stages: labeled(&[
                ("opportunity", "Opportunity"),
                ("proposal-sent", "Proposal Sent"),
                ("in-negociation", "In Negotiation"),
                ("won", "Won"),
                ("lost", "Lost"),
                ("delayed", "Delayed"),
            ]),
            deal_pipeline_statuses: strings(&["won"]),
            note_statuses: [
                ("cold", "Cold", "#7dbde8"),
                ("warm", "Warm", "#e8cb7d"),
                ("hot", "Hot", "#e88b7d"),
                ("in-contract", "Contract", "#a4e87d"),
            ]
            .iter()
            .map(|(value, label, color)| NoteStatus {
                value: value.to_string(),
                label: label.to_string(),
                color: color.to_string(),
            })
            .collect(),
            task_types: strings(&[
                "None", "Email", "Demo", "Lunch", "Meeting", "Follow-up", "Thank you", "Ship", "Call",
            ]),
            contact_gender: labeled(&[("male", "He/Him"), ("female", "She/Her"), ("nonbinary", "They/Them")]),
        }
    }
}

impl Configuration {
    pub fn gender_values(&self) -> Vec<&str> {
        self.contact_gender.iter().map(|g| g.value.as_str()).collect()
    }

    pub fn note_status_values(&self) -> Vec<&str> {
        self.note_statuses.iter().map(|s| s.value.as_str()).collect()
    }

    pub fn task_type_values(&self) -> Vec<&str> {
        self.task_types.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_rows_keep_the_defaults() {
        let stored = serde_json::json!({ "title": "Acme CRM", "taskTypes": ["Call"] });
        let config: Configuration = serde_json::from_value(stored).unwrap();

        assert_eq!(config.title, "Acme CRM");
        assert_eq!(config.task_types, vec!["Call".to_string()]);
        assert_eq!(config.gender_values(), vec!["male", "female", "nonbinary"]);
        assert_eq!(config.note_status_values().len(), 4);
    }
}
