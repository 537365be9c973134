// src/models/webhooks.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

// =============================================================================
//  POSTMARK (E-MAIL RECEBIDO)
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PostmarkAddress {
    #[serde(rename = "Email")]
    #[schema(example = "jane@acme.com")]
    pub email: String,
    #[serde(rename = "Name", default)]
    #[schema(example = "Jane Doe")]
    pub name: String,
}

/// Só os campos do webhook de entrada que o CRM usa.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PostmarkInbound {
    pub from_full: PostmarkAddress,
    #[serde(default)]
    pub to_full: Vec<PostmarkAddress>,
    #[serde(default)]
    pub cc_full: Vec<PostmarkAddress>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text_body: String,
    // Só a resposta, sem o histórico citado
    pub stripped_text_reply: Option<String>,
    #[schema(example = "Fri, 1 Aug 2014 16:45:32 -0400")]
    pub date: Option<String>,
}

// =============================================================================
//  MAILGUN (E-MAIL RECEBIDO)
// =============================================================================

/// Campos do formulário que uma rota do Mailgun envia ao encaminhar um e-mail.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MailgunInbound {
    // Assinatura: HMAC-SHA256 de timestamp + token com a signing key
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub signature: String,
    #[schema(example = "Sam Seller <sam@crm.io>")]
    pub from: String,
    #[serde(rename = "To", default)]
    #[schema(example = "Jane Doe <jane@acme.com>, bob@acme.com")]
    pub to: String,
    #[serde(rename = "Cc", default)]
    pub cc: String,
    #[serde(default)]
    pub subject: String,
    #[serde(rename = "body-plain", default)]
    pub body_plain: String,
    #[serde(rename = "stripped-text")]
    pub stripped_text: Option<String>,
    #[serde(rename = "Date")]
    pub date: Option<String>,
}

// =============================================================================
//  E-MAIL RECEBIDO (INDEPENDENTE DO PROVEDOR)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailAddress {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct InboundEmail {
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub subject: String,
    pub text_body: String,
    pub stripped_text_reply: Option<String>,
    pub date: Option<String>,
}

impl From<PostmarkAddress> for EmailAddress {
    fn from(address: PostmarkAddress) -> Self {
        Self { email: address.email, name: address.name }
    }
}

impl From<PostmarkInbound> for InboundEmail {
    fn from(email: PostmarkInbound) -> Self {
        Self {
            from: email.from_full.into(),
            to: email.to_full.into_iter().map(Into::into).collect(),
            cc: email.cc_full.into_iter().map(Into::into).collect(),
            subject: email.subject,
            text_body: email.text_body,
            stripped_text_reply: email.stripped_text_reply,
            date: email.date,
        }
    }
}

impl From<MailgunInbound> for InboundEmail {
    fn from(email: MailgunInbound) -> Self {
        Self {
            from: parse_address(&email.from).unwrap_or_default(),
            to: parse_address_list(&email.to),
            cc: parse_address_list(&email.cc),
            subject: email.subject,
            text_body: email.body_plain,
            stripped_text_reply: email.stripped_text,
            date: email.date,
        }
    }
}

/// `Jane Doe <jane@acme.com>` ou só `jane@acme.com`.
pub fn parse_address(raw: &str) -> Option<EmailAddress> {
    let raw = raw.trim();
    let address = match (raw.rfind('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if open < close => EmailAddress {
            email: raw[open + 1..close].trim().to_string(),
            name: raw[..open].trim().trim_matches('"').trim().to_string(),
        },
        _ => EmailAddress { email: raw.trim_matches('"').to_string(), name: String::new() },
    };
    Some(address).filter(|a| a.email.contains('@'))
}

/// Lista de cabeçalho separada por vírgulas; vírgulas entre aspas fazem parte do nome.
pub fn parse_address_list(raw: &str) -> Vec<EmailAddress> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in raw.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts.iter().filter_map(|p| parse_address(p)).collect()
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InboundEmailResult {
    pub contact_ids: Vec<i64>,
    pub notes_created: usize,
}

// =============================================================================
//  LIMPEZA DE ANEXOS (WEBHOOK DO BANCO)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookEventType {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoteTable {
    ContactNotes,
    DealNotes,
}

/// Evento de alteração numa tabela de notas.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NoteChangeEvent {
    #[serde(rename = "type")]
    pub kind: WebhookEventType,
    pub table: NoteTable,
    #[schema(value_type = Option<Object>)]
    pub record: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub old_record: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentCleanupResult {
    pub deleted: Vec<String>,
}
