//! Scheduler guionado para tests: valida transiciones de estado y la
//! lógica de submission sin un cluster real.

use std::collections::HashMap;

use crate::error::SchedulerError;
use crate::scheduler::{ArraySubmission, QueueEntry, Scheduler};

/// Devuelve job ids secuenciales; cada submit puede guionarse para fallar.
#[derive(Default)]
pub struct FakeScheduler {
    next_job_id: u64,
    /// Resultados guionados por orden de llamada a `submit_array`; agotados
    /// los guiones, los submits siguientes aceptan.
    pub scripted_submit_errors: Vec<Option<SchedulerError>>,
    pub submissions: Vec<ArraySubmission>,
    pub cancelled: Vec<String>,
    /// Estado de cola por job id que devolverá `queue`.
    pub queues: HashMap<String, Vec<QueueEntry>>,
    /// Si está seteado, `queue` falla con este error (cola inconsultable).
    pub queue_error: Option<SchedulerError>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self { next_job_id: 91000, ..Self::default() }
    }

    /// Guiona el resultado del n-ésimo submit (None = acepta).
    pub fn script_submits(mut self, outcomes: Vec<Option<SchedulerError>>) -> Self {
        self.scripted_submit_errors = outcomes;
        self
    }

    pub fn set_queue(&mut self, job_id: &str, entries: Vec<QueueEntry>) {
        self.queues.insert(job_id.to_string(), entries);
    }
}

impl Scheduler for FakeScheduler {
    fn submit_array(&mut self, request: &ArraySubmission) -> Result<String, SchedulerError> {
        let call = self.submissions.len();
        self.submissions.push(request.clone());
        if let Some(Some(err)) = self.scripted_submit_errors.get(call) {
            return Err(err.clone());
        }
        self.next_job_id += 1;
        Ok(self.next_job_id.to_string())
    }

    fn queue(&self, job_id: &str) -> Result<Vec<QueueEntry>, SchedulerError> {
        if let Some(err) = &self.queue_error {
            return Err(err.clone());
        }
        Ok(self.queues.get(job_id).cloned().unwrap_or_default())
    }

    fn cancel(&mut self, job_id: &str) -> Result<(), SchedulerError> {
        self.cancelled.push(job_id.to_string());
        // La cancelación vacía la cola del job (confirmación inmediata)
        self.queues.insert(job_id.to_string(), Vec::new());
        Ok(())
    }
}
