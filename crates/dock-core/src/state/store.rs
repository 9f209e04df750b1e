use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dock_domain::{JobArray, TaskKey, TaskRecord};

use crate::errors::CoreError;

/// Almacenamiento de records de tarea, create-or-replace por clave.
///
/// Contrato: `put` debe ser atómico desde la perspectiva de los lectores
/// (un lector nunca observa un record a medio escribir). El backend durable
/// de `dock-persistence` lo logra con write-to-temp + rename.
pub trait StateStore {
    fn put(&mut self, record: &TaskRecord) -> Result<(), CoreError>;
    fn get(&self, key: &TaskKey) -> Result<Option<TaskRecord>, CoreError>;
    /// Lista todos los records de la campaña, todas las generaciones.
    fn list(&self, campaign: Uuid) -> Result<Vec<TaskRecord>, CoreError>;
}

/// Grupo de batches aún no sometido (queda en cola tras un fallo parcial de
/// submission; `stop` somete el próximo al cancelar el actual).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGroup {
    pub batches: Vec<usize>,
}

/// Registro de los `JobArray` de una campaña más la cola de grupos
/// pendientes.
///
/// El paso de submission serializa el acceso a esta lista (lock de
/// submission en el backend durable) para que dos submits concurrentes no
/// asignen rangos de índices solapados.
pub trait JobArrayStore {
    fn append_job_array(&mut self, campaign: Uuid, job_array: &JobArray) -> Result<(), CoreError>;
    fn list_job_arrays(&self, campaign: Uuid) -> Result<Vec<JobArray>, CoreError>;
    fn replace_queue(&mut self, campaign: Uuid, queue: &[PendingGroup]) -> Result<(), CoreError>;
    fn queued_groups(&self, campaign: Uuid) -> Result<Vec<PendingGroup>, CoreError>;
}

/// Backend in-memory de referencia; los backends durables deben mantener
/// paridad 1:1 con su semántica.
#[derive(Default)]
pub struct InMemoryCampaignStore {
    records: HashMap<TaskKey, TaskRecord>,
    job_arrays: HashMap<Uuid, Vec<JobArray>>,
    queues: HashMap<Uuid, Vec<PendingGroup>>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryCampaignStore {
    fn put(&mut self, record: &TaskRecord) -> Result<(), CoreError> {
        self.records.insert(record.key, record.clone());
        Ok(())
    }

    fn get(&self, key: &TaskKey) -> Result<Option<TaskRecord>, CoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn list(&self, campaign: Uuid) -> Result<Vec<TaskRecord>, CoreError> {
        let mut out: Vec<TaskRecord> =
            self.records.values().filter(|r| r.key.campaign == campaign).cloned().collect();
        out.sort_by_key(|r| (r.key.batch_index, r.key.generation));
        Ok(out)
    }
}

impl JobArrayStore for InMemoryCampaignStore {
    fn append_job_array(&mut self, campaign: Uuid, job_array: &JobArray) -> Result<(), CoreError> {
        self.job_arrays.entry(campaign).or_default().push(job_array.clone());
        Ok(())
    }

    fn list_job_arrays(&self, campaign: Uuid) -> Result<Vec<JobArray>, CoreError> {
        Ok(self.job_arrays.get(&campaign).cloned().unwrap_or_default())
    }

    fn replace_queue(&mut self, campaign: Uuid, queue: &[PendingGroup]) -> Result<(), CoreError> {
        self.queues.insert(campaign, queue.to_vec());
        Ok(())
    }

    fn queued_groups(&self, campaign: Uuid) -> Result<Vec<PendingGroup>, CoreError> {
        Ok(self.queues.get(&campaign).cloned().unwrap_or_default())
    }
}
