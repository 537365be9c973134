// src/services/merge_service.rs

use std::{collections::HashSet, sync::Arc};

use crate::{
    common::error::AppError,
    db::CrmStore,
    models::{
        contacts::{Contact, EmailAndType, PhoneNumberAndType},
        sales::Sale,
    },
};

#[derive(Clone)]
pub struct MergeService {
    store: Arc<dyn CrmStore>,
}

impl MergeService {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self { store }
    }

    /// Funde `loser_id` em `winner_id` numa única transação.
    ///
    /// Ordem: tarefas e notas, negócios, campos do vencedor e, por último,
    /// a remoção do perdedor. Qualquer erro desfaz tudo.
    pub async fn merge(&self, actor: &Sale, loser_id: i64, winner_id: i64) -> Result<i64, AppError> {
        if loser_id == winner_id {
            return Err(AppError::MergeSameContact);
        }

        self.run_merge(actor, loser_id, winner_id).await.map_err(|e| match e {
            AppError::ContactNotFound(_) | AppError::MergeSameContact => e,
            other => {
                tracing::error!("🔥 Mesclagem {} -> {} desfeita: {}", loser_id, winner_id, other);
                AppError::MergeFailed(Box::new(other))
            }
        })?;

        tracing::info!("🔀 Contato {} mesclado em {} por {}", loser_id, winner_id, actor.email);
        Ok(winner_id)
    }

    async fn run_merge(&self, actor: &Sale, loser_id: i64, winner_id: i64) -> Result<(), AppError> {
        // Se a transação sair de escopo sem commit, nada é gravado
        let mut tx = self.store.begin_merge(actor.id).await?;

        let winner = tx.fetch_contact(winner_id).await?.ok_or(AppError::ContactNotFound(winner_id))?;
        let loser = tx.fetch_contact(loser_id).await?.ok_or(AppError::ContactNotFound(loser_id))?;

        let tasks = tx.reassign_tasks(loser_id, winner_id).await?;
        let notes = tx.reassign_contact_notes(loser_id, winner_id).await?;

        let deals = tx.deals_with_contact(loser_id).await?;
        for deal in &deals {
            let contact_ids = merge_deal_contacts(&deal.contact_ids, loser_id, winner_id);
            tx.update_deal_contacts(deal.id, &contact_ids).await?;
        }

        tx.update_contact(&merge_contact_fields(&winner, &loser)).await?;
        tx.delete_contact(loser_id).await?;
        tx.commit().await?;

        tracing::debug!(
            "Mesclagem {} -> {}: {} tarefas, {} notas, {} negócios",
            loser_id,
            winner_id,
            tasks,
            notes,
            deals.len()
        );
        Ok(())
    }
}

// =============================================================================
//  POLÍTICA DE MESCLAGEM
// =============================================================================

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// Só dígitos, mantendo o '+' inicial
fn normalize_phone(number: &str) -> String {
    let trimmed = number.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with('+') {
        format!("+{}", digits)
    } else {
        digits
    }
}

fn union_by_key<T: Clone>(first: &[T], second: &[T], key: impl Fn(&T) -> String) -> Vec<T> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(second)
        .filter(|item| seen.insert(key(*item)))
        .cloned()
        .collect()
}

/// Contato resultante da mesclagem: o vencedor completado com o perdedor.
pub fn merge_contact_fields(winner: &Contact, loser: &Contact) -> Contact {
    let pick = |w: &Option<String>, l: &Option<String>| w.clone().or_else(|| l.clone());

    let mut tags = winner.tags.clone();
    for tag in &loser.tags {
        if !tags.contains(tag) {
            tags.push(*tag);
        }
    }

    let avatar = match &winner.avatar {
        Some(avatar) if avatar.0.has_source() => Some(avatar.clone()),
        _ => loser.avatar.clone(),
    };

    Contact {
        id: winner.id,
        first_name: pick(&winner.first_name, &loser.first_name),
        last_name: pick(&winner.last_name, &loser.last_name),
        gender: pick(&winner.gender, &loser.gender),
        title: pick(&winner.title, &loser.title),
        company_id: winner.company_id.or(loser.company_id),
        email_jsonb: sqlx::types::Json(union_by_key(
            &winner.email_jsonb.0,
            &loser.email_jsonb.0,
            |e: &EmailAndType| normalize_email(&e.email),
        )),
        phone_jsonb: sqlx::types::Json(union_by_key(
            &winner.phone_jsonb.0,
            &loser.phone_jsonb.0,
            |p: &PhoneNumberAndType| normalize_phone(&p.number),
        )),
        background: pick(&winner.background, &loser.background),
        avatar,
        first_seen: match (winner.first_seen, loser.first_seen) {
            (Some(w), Some(l)) => Some(w.min(l)),
            (w, l) => w.or(l),
        },
        last_seen: winner.last_seen.max(loser.last_seen),
        has_newsletter: match (winner.has_newsletter, loser.has_newsletter) {
            (None, None) => None,
            (w, l) => Some(w.unwrap_or(false) || l.unwrap_or(false)),
        },
        status: pick(&winner.status, &loser.status),
        tags,
        sales_id: winner.sales_id.or(loser.sales_id),
        linkedin_url: pick(&winner.linkedin_url, &loser.linkedin_url),
    }
}

/// Troca o perdedor pelo vencedor sem repetir ids, mantendo a ordem.
pub fn merge_deal_contacts(contact_ids: &[i64], loser_id: i64, winner_id: i64) -> Vec<i64> {
    let mut merged = Vec::with_capacity(contact_ids.len());
    for id in contact_ids {
        let id = if *id == loser_id { winner_id } else { *id };
        if !merged.contains(&id) {
            merged.push(id);
        }
    }
    merged
}
