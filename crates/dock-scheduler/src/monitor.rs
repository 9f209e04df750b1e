//! Monitor: consulta read-only sobre el state store más el estado vivo del
//! scheduler.
//!
//! Nunca escribe al store ni llama mutaciones del scheduler (recibe `&impl
//! Scheduler`, y `queue` es el único método `&self`). Un estado vivo
//! inconsultable se reporta como "unknown", no como error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use dock_core::{latest_generation, CoreError, JobArrayStore, StateStore};
use dock_domain::TaskState;

use crate::scheduler::Scheduler;

#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub batch_index: usize,
    pub generation: u32,
    pub state: TaskState,
    pub job_id: String,
    pub array_index: usize,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Código vivo del scheduler para tareas Running, si se pudo obtener.
    pub live: Option<String>,
    pub diagnostic: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub tasks: Vec<TaskSnapshot>,
    pub counts: BTreeMap<String, usize>,
    pub total_batches: usize,
}

impl StatusReport {
    pub fn count(&self, state: TaskState) -> usize {
        self.counts.get(&state.to_string()).copied().unwrap_or(0)
    }
}

/// Arma el snapshot de la campaña; con `job_filter` restringe a un job array.
pub fn snapshot<C, S>(scheduler: &C,
                      store: &S,
                      campaign: Uuid,
                      job_filter: Option<&str>)
                      -> Result<StatusReport, CoreError>
    where C: Scheduler,
          S: StateStore + JobArrayStore
{
    let latest = latest_generation(&store.list(campaign)?);
    let mut tasks = Vec::with_capacity(latest.len());
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    // Una consulta de cola por job id, no por tarea
    let mut live_by_job: BTreeMap<String, Option<Vec<crate::scheduler::QueueEntry>>> = BTreeMap::new();

    for rec in latest.values() {
        if let Some(filter) = job_filter {
            if rec.job_id != filter {
                continue;
            }
        }
        let live = if rec.state == TaskState::Running {
            let entries = live_by_job.entry(rec.job_id.clone()).or_insert_with(|| {
                                                                   match scheduler.queue(&rec.job_id) {
                                                                       Ok(entries) => Some(entries),
                                                                       Err(e) => {
                                                                           debug!("estado vivo inconsultable para {}: {e}", rec.job_id);
                                                                           None
                                                                       }
                                                                   }
                                                               });
            match entries {
                Some(entries) => entries.iter()
                                        .find(|entry| entry.contains(rec.array_index))
                                        .map(|entry| entry.state_code.clone()),
                None => None,
            }
        } else {
            None
        };
        *counts.entry(rec.state.to_string()).or_insert(0) += 1;
        tasks.push(TaskSnapshot { batch_index: rec.key.batch_index,
                                  generation: rec.key.generation,
                                  state: rec.state,
                                  job_id: rec.job_id.clone(),
                                  array_index: rec.array_index,
                                  queued_at: rec.queued_at,
                                  started_at: rec.started_at,
                                  ended_at: rec.ended_at,
                                  live,
                                  diagnostic: rec.diagnostic.clone() });
    }

    let total_batches = tasks.len();
    Ok(StatusReport { tasks, counts, total_batches })
}
