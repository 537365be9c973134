// src/services/attachment_service.rs

use std::{
    collections::BTreeSet,
    path::{Component, Path, PathBuf},
};

use serde_json::Value;

use crate::{
    common::error::AppError,
    models::{
        notes::Attachment,
        webhooks::{NoteChangeEvent, WebhookEventType},
    },
};

/// Remove do disco os anexos que deixaram de ser referenciados por uma nota.
#[derive(Clone, Debug)]
pub struct AttachmentService {
    root: PathBuf,
}

impl AttachmentService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Processa o evento (corpo cru do webhook) e devolve os caminhos apagados.
    pub async fn handle(&self, body: &[u8]) -> Result<Vec<String>, AppError> {
        let event: NoteChangeEvent =
            serde_json::from_slice(body).map_err(|e| AppError::WebhookPayloadInvalid(e.to_string()))?;

        let orphaned = orphaned_paths(&event)?;
        // Valida tudo antes de apagar qualquer coisa
        let mut targets = Vec::with_capacity(orphaned.len());
        for path in orphaned {
            let full = self.resolve(&path).await?;
            targets.push((path, full));
        }

        let mut deleted = Vec::with_capacity(targets.len());
        for (path, full) in targets {
            let Some(full) = full else {
                tracing::debug!("Anexo {} já não existia", path);
                continue;
            };
            match tokio::fs::remove_file(&full).await {
                Ok(()) => deleted.push(path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("Anexo {} já não existia", path);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !deleted.is_empty() {
            tracing::info!("🗑️ {} anexos removidos ({:?})", deleted.len(), event.table);
        }
        Ok(deleted)
    }

    /// Só caminhos relativos que, com links simbólicos resolvidos, ficam
    /// dentro da raiz. `None` quando a pasta do arquivo nem existe.
    async fn resolve(&self, path: &str) -> Result<Option<PathBuf>, AppError> {
        let relative = Path::new(path);
        let refused = || {
            tracing::warn!("⚠️ Caminho de anexo recusado: {}", path);
            AppError::WebhookPayloadInvalid(format!("invalid attachment path: {}", path))
        };

        let lexically_safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        let Some(file_name) = relative.file_name().filter(|_| lexically_safe) else {
            return Err(refused());
        };

        let joined = self.root.join(relative);
        let parent = joined.parent().unwrap_or(&self.root);
        let (root, parent) = match (canonical(&self.root).await?, canonical(parent).await?) {
            (Some(root), Some(parent)) => (root, parent),
            _ => return Ok(None),
        };
        if !parent.starts_with(&root) {
            return Err(refused());
        }
        Ok(Some(parent.join(file_name)))
    }
}

async fn canonical(path: &Path) -> Result<Option<PathBuf>, AppError> {
    match tokio::fs::canonicalize(path).await {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn attachment_paths(record: Option<&Value>) -> Result<BTreeSet<String>, AppError> {
    let Some(attachments) = record.and_then(|r| r.get("attachments")).filter(|a| !a.is_null()) else {
        return Ok(BTreeSet::new());
    };

    let attachments: Vec<Attachment> = serde_json::from_value(attachments.clone())
        .map_err(|e| AppError::WebhookPayloadInvalid(format!("attachments: {}", e)))?;

    Ok(attachments.into_iter().filter_map(|a| a.path).filter(|p| !p.is_empty()).collect())
}

/// Caminhos presentes em `old_record` e ausentes em `record` (todos, num DELETE).
pub fn orphaned_paths(event: &NoteChangeEvent) -> Result<Vec<String>, AppError> {
    let missing = |field: &str| AppError::WebhookPayloadInvalid(format!("missing {}", field));

    match event.kind {
        WebhookEventType::Insert => Ok(vec![]),
        WebhookEventType::Delete => {
            let old = event.old_record.as_ref().ok_or_else(|| missing("old_record"))?;
            Ok(attachment_paths(Some(old))?.into_iter().collect())
        }
        WebhookEventType::Update => {
            let old = event.old_record.as_ref().ok_or_else(|| missing("old_record"))?;
            let new = event.record.as_ref().ok_or_else(|| missing("record"))?;
            let kept = attachment_paths(Some(new))?;
            Ok(attachment_paths(Some(old))?.into_iter().filter(|p| !kept.contains(p)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(paths: &[&str]) -> Value {
        let attachments: Vec<Value> = paths
            .iter()
            .map(|p| json!({ "src": format!("https://files/{}", p), "title": p, "path": p }))
            .collect();
        json!({ "id": 1, "text": "hello", "attachments": attachments })
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[tokio::test]
    async fn update_removes_only_dropped_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("notes")).unwrap();
        std::fs::write(dir.path().join("notes/a.pdf"), b"a").unwrap();
        std::fs::write(dir.path().join("notes/b.pdf"), b"b").unwrap();
        let service = AttachmentService::new(dir.path());

        let deleted = service
            .handle(&body(json!({
                "type": "UPDATE",
                "table": "contact_notes",
                "record": note(&["notes/b.pdf"]),
                "old_record": note(&["notes/a.pdf", "notes/b.pdf"]),
            })))
            .await
            .unwrap();

        assert_eq!(deleted, vec!["notes/a.pdf".to_string()]);
        assert!(!dir.path().join("notes/a.pdf").exists());
        assert!(dir.path().join("notes/b.pdf").exists());
    }

    #[tokio::test]
    async fn delete_removes_everything_and_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.png"), b"c").unwrap();
        let service = AttachmentService::new(dir.path());

        let deleted = service
            .handle(&body(json!({
                "type": "DELETE",
                "table": "deal_notes",
                "record": null,
                "old_record": note(&["c.png", "gone.png"]),
            })))
            .await
            .unwrap();

        assert_eq!(deleted, vec!["c.png".to_string()]);
    }

    #[tokio::test]
    async fn paths_outside_the_root_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, b"x").unwrap();
        let root = dir.path().join("attachments");
        std::fs::create_dir_all(&root).unwrap();
        let service = AttachmentService::new(&root);

        for path in ["../keep.txt", "/etc/passwd"] {
            let result = service
                .handle(&body(json!({
                    "type": "DELETE",
                    "table": "contact_notes",
                    "old_record": note(&[path]),
                })))
                .await;
            assert!(matches!(result, Err(AppError::WebhookPayloadInvalid(_))), "{}", path);
        }
        assert!(outside.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_folders_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), b"x").unwrap();
        let root = dir.path().join("attachments");
        std::fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("evil")).unwrap();
        let service = AttachmentService::new(&root);

        let result = service
            .handle(&body(json!({
                "type": "DELETE",
                "table": "contact_notes",
                "old_record": note(&["evil/secret.txt"]),
            })))
            .await;

        assert!(matches!(result, Err(AppError::WebhookPayloadInvalid(_))));
        assert!(outside.join("secret.txt").exists());
    }

    #[tokio::test]
    async fn malformed_events_are_invalid() {
        let service = AttachmentService::new("/tmp/unused");

        let garbage = service.handle(b"not json").await;
        let wrong_table = service
            .handle(&body(json!({ "type": "DELETE", "table": "contacts", "old_record": {} })))
            .await;
        let no_old = service.handle(&body(json!({ "type": "UPDATE", "table": "deal_notes", "record": {} }))).await;

        for result in [garbage, wrong_table, no_old] {
            assert!(matches!(result, Err(AppError::WebhookPayloadInvalid(_))));
        }
    }

    #[test]
    fn inserts_never_orphan_anything() {
        let event: NoteChangeEvent = serde_json::from_value(json!({
            "type": "INSERT", "table": "contact_notes", "record": note(&["x.pdf"]), "old_record": null
        }))
        .unwrap();
        assert!(orphaned_paths(&event).unwrap().is_empty());
    }
}
