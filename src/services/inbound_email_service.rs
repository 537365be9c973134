// src/services/inbound_email_service.rs
//
// E-mails encaminhados (Postmark ou Mailgun) viram notas nos contatos destinatários.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    common::error::AppError,
    db::{store::InboundTransaction, CrmStore},
    models::{
        companies::NewCompany,
        contacts::{Contact, ContactInfoType, EmailAndType, NewContact},
        notes::NewContactNote,
        sales::Sale,
        webhooks::{EmailAddress, InboundEmail, InboundEmailResult},
    },
};

// Domínios de e-mail pessoal: não identificam uma empresa
const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "yahoo.fr",
    "hotmail.com",
    "hotmail.fr",
    "outlook.com",
    "live.com",
    "msn.com",
    "icloud.com",
    "me.com",
    "aol.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "gmx.de",
    "mail.com",
    "yandex.com",
    "free.fr",
    "orange.fr",
    "laposte.net",
];

#[derive(Clone)]
pub struct InboundEmailService {
    store: Arc<dyn CrmStore>,
}

impl InboundEmailService {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, email: InboundEmail) -> Result<InboundEmailResult, AppError> {
        let sender_address = email.from.email.trim().to_string();
        let sender = match self.store.find_sale_by_email(&sender_address).await? {
            Some(sale) if !sale.disabled => sale,
            _ => return Err(AppError::InboundUnknownSender(sender_address)),
        };

        let recipients = recipients(&email);
        if recipients.is_empty() {
            return Err(AppError::InboundNoRecipients);
        }

        let text = note_text(&email);
        let date = email
            .date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        // Um destinatário que falha desfaz os anteriores: o reenvio recomeça do zero
        let mut tx = self.store.begin_inbound(sender.id).await?;
        let mut contact_ids = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let contact = find_or_create_contact(tx.as_mut(), &recipient, &sender, date).await?;

            tx.create_contact_note(&NewContactNote {
                contact_id: contact.id,
                text: Some(text.clone()),
                date,
                sales_id: Some(sender.id),
                status: None,
                attachments: vec![],
            })
            .await?;
            tx.touch_contact(contact.id, date).await?;
            contact_ids.push(contact.id);
        }
        tx.commit().await?;

        tracing::info!("📨 E-mail de {} anotado em {} contatos", sender.email, contact_ids.len());
        Ok(InboundEmailResult { notes_created: contact_ids.len(), contact_ids })
    }
}

async fn find_or_create_contact(
    tx: &mut dyn InboundTransaction,
    recipient: &EmailAddress,
    sender: &Sale,
    date: DateTime<Utc>,
) -> Result<Contact, AppError> {
    let address = recipient.email.trim();
    if let Some(contact) = tx.find_contact_by_email(address).await? {
        return Ok(contact);
    }

    let company_id = match email_domain(address).filter(|d| !is_free_mail(d)) {
        Some(domain) => Some(find_or_create_company(tx, &domain, sender).await?),
        None => None,
    };
    let (first_name, last_name) = split_name(recipient);

    let contact = tx
        .create_contact(&NewContact {
            first_name: Some(first_name),
            last_name,
            company_id,
            email_jsonb: vec![EmailAndType { email: address.to_string(), kind: ContactInfoType::Work }],
            first_seen: Some(date),
            last_seen: Some(date),
            has_newsletter: Some(false),
            sales_id: Some(sender.id),
            ..Default::default()
        })
        .await?;

    tracing::debug!("Contato {} criado a partir de e-mail recebido", contact.id);
    Ok(contact)
}

async fn find_or_create_company(tx: &mut dyn InboundTransaction, domain: &str, sender: &Sale) -> Result<i64, AppError> {
    let name = company_name(domain);
    if let Some(company) = tx.find_company_by_name(&name).await? {
        return Ok(company.id);
    }

    let company = tx
        .create_company(&NewCompany {
            name,
            website: Some(format!("https://{}", domain)),
            sales_id: Some(sender.id),
            ..Default::default()
        })
        .await?;
    Ok(company.id)
}

/// Destinatários de To e Cc, sem repetição.
fn recipients(email: &InboundEmail) -> Vec<EmailAddress> {
    let mut seen = HashSet::new();
    email
        .to
        .iter()
        .chain(&email.cc)
        .filter(|r| !r.email.trim().is_empty())
        .filter(|r| seen.insert(r.email.trim().to_lowercase()))
        .cloned()
        .collect()
}

fn note_text(email: &InboundEmail) -> String {
    let body = email
        .stripped_text_reply
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(&email.text_body)
        .trim();
    let subject = email.subject.trim();

    match (subject.is_empty(), body.is_empty()) {
        (true, _) => body.to_string(),
        (false, true) => subject.to_string(),
        (false, false) => format!("{}\n\n{}", subject, body),
    }
}

fn email_domain(address: &str) -> Option<String> {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
        .filter(|d| d.contains('.'))
}

fn is_free_mail(domain: &str) -> bool {
    FREE_MAIL_DOMAINS.contains(&domain)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// "mail.acme-corp.com" -> "Acme-corp"
fn company_name(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    let main = if labels.len() >= 2 { labels[labels.len() - 2] } else { domain };
    capitalize(main)
}

/// Nome de exibição ("Jane Doe"), ou a parte local do e-mail ("jane.doe").
fn split_name(recipient: &EmailAddress) -> (String, Option<String>) {
    let display = recipient.name.trim().trim_matches('"').trim();
    let words: Vec<String> = if !display.is_empty() {
        display.split_whitespace().map(str::to_string).collect()
    } else {
        let local = recipient.email.split('@').next().unwrap_or_default();
        local
            .split(['.', '_', '-', '+'])
            .filter(|w| !w.is_empty())
            .map(capitalize)
            .collect()
    };

    match words.split_first() {
        Some((first, [])) => (first.clone(), None),
        Some((first, rest)) => (first.clone(), Some(rest.join(" "))),
        None => (recipient.email.trim().to_string(), None),
    }
}
