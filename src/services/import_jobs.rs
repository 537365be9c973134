// src/services/import_jobs.rs

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use crate::{common::error::AppError, models::import::ImportState};

/// Quanto tempo um job parado (idle ou terminado) fica disponível.
pub const DEFAULT_JOB_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Job {
    owner: i64,
    state: Arc<watch::Sender<ImportState>>,
    touched_at: Instant,
}

/// Registro das importações. Cada job publica o seu estado num canal
/// `watch`, então leituras concorrentes (polling) veem o progresso por lote.
///
/// Um job só é visível para o vendedor que o criou; para os outros ele não
/// existe. Jobs parados há mais de `ttl` são descartados na próxima criação.
#[derive(Clone)]
pub struct ImportJobs {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
    ttl: Duration,
}

impl Default for ImportJobs {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_TTL)
    }
}

impl ImportJobs {
    pub fn new(ttl: Duration) -> Self {
        Self { jobs: Arc::default(), ttl }
    }

    pub async fn create(&self, owner: i64) -> Uuid {
        let mut jobs = self.jobs.write().await;
        evict_expired(&mut jobs, self.ttl);

        let id = Uuid::new_v4();
        let (tx, _rx) = watch::channel(ImportState::Idle);
        jobs.insert(id, Job { owner, state: Arc::new(tx), touched_at: Instant::now() });
        id
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn state(&self, id: Uuid, owner: i64) -> Result<ImportState, AppError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).filter(|job| job.owner == owner).ok_or(AppError::ImportNotFound)?;
        let state = job.state.borrow().clone();
        Ok(state)
    }

    // Aplica `change` no job do dono e renova o prazo de expiração
    async fn update<T>(
        &self,
        id: Uuid,
        owner: i64,
        change: impl FnOnce(&Job) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).filter(|job| job.owner == owner).ok_or(AppError::ImportNotFound)?;
        let result = change(job)?;
        job.touched_at = Instant::now();
        Ok(result)
    }

    /// idle -> importing, de forma atômica. Devolve o canal onde o
    /// importador publica o andamento.
    pub async fn start(&self, id: Uuid, owner: i64) -> Result<Arc<watch::Sender<ImportState>>, AppError> {
        self.update(id, owner, |job| {
            let started = job.state.send_if_modified(|state| {
                if matches!(state, ImportState::Idle) {
                    *state = ImportState::Importing(Default::default());
                    true
                } else {
                    false
                }
            });

            if !started {
                return Err(AppError::ImportNotIdle);
            }
            Ok(job.state.clone())
        })
        .await
    }

    /// Publica o estado final (success ou error).
    pub async fn finish(&self, id: Uuid, owner: i64, state: ImportState) -> Result<(), AppError> {
        self.update(id, owner, |job| {
            job.state.send_replace(state);
            Ok(())
        })
        .await
    }

    /// Volta para idle descartando contadores e falhas.
    pub async fn reset(&self, id: Uuid, owner: i64) -> Result<(), AppError> {
        self.update(id, owner, |job| {
            let mut running = false;
            job.state.send_if_modified(|state| {
                if state.is_importing() {
                    running = true;
                    return false;
                }
                *state = ImportState::Idle;
                true
            });

            if running {
                return Err(AppError::ImportRunning);
            }
            Ok(())
        })
        .await
    }
}

// Jobs em andamento nunca expiram
fn evict_expired(jobs: &mut HashMap<Uuid, Job>, ttl: Duration) {
    let before = jobs.len();
    jobs.retain(|_, job| job.state.borrow().is_importing() || job.touched_at.elapsed() < ttl);

    let evicted = before - jobs.len();
    if evicted > 0 {
        tracing::debug!("🧹 {} importações expiradas descartadas", evicted);
    }
}
