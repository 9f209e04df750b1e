//! Trait `Scheduler`: el contrato mínimo que el orquestador necesita del
//! workload manager del cluster.

use uuid::Uuid;

use dock_core::SchedulerSection;

use crate::error::SchedulerError;

/// Una submission de job array: `task_count` tareas indexadas 1..=N con un
/// throttle de concurrencia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySubmission {
    pub job_name: String,
    pub account: String,
    pub partition: String,
    pub time_limit: String,
    pub nodes: usize,
    pub task_count: usize,
    /// Máximo de tareas corriendo a la vez dentro del array (`%N`).
    pub throttle: usize,
    /// Encadenamiento con el array anterior de la campaña (`afterany`).
    pub dependency: Option<String>,
    pub extra_options: Vec<String>,
    /// Patrón del archivo de log por tarea.
    pub output_pattern: String,
    /// Tags que viajan al entorno de cada tarea: con esto el worker recupera
    /// el mapeo índice-de-array -> batch sin bookkeeping externo.
    pub campaign: Uuid,
    pub group_offset: usize,
}

impl ArraySubmission {
    pub fn from_config(cfg: &SchedulerSection, campaign: Uuid, group_offset: usize, task_count: usize, output_pattern: &str) -> Self {
        ArraySubmission { job_name: cfg.job_name.clone(),
                          account: cfg.account.clone(),
                          partition: cfg.partition.clone(),
                          time_limit: cfg.time_limit.clone(),
                          nodes: cfg.nodes,
                          task_count,
                          throttle: cfg.max_running_tasks.min(task_count),
                          dependency: None,
                          extra_options: cfg.extra_options.clone(),
                          output_pattern: output_pattern.to_string(),
                          campaign,
                          group_offset }
    }
}

/// Una línea del estado de cola de un job: un índice suelto o un rango
/// pendiente (`jobid_[a-b%t]`), con el código de estado del scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub first_index: usize,
    pub last_index: usize,
    /// Código crudo del scheduler (PD, R, CG, ...).
    pub state_code: String,
    pub reason: String,
}

impl QueueEntry {
    pub fn contains(&self, array_index: usize) -> bool {
        (self.first_index..=self.last_index).contains(&array_index)
    }

    pub fn task_count(&self) -> usize {
        self.last_index - self.first_index + 1
    }
}

/// Capacidad externa del workload manager.
///
/// `queue` toma `&self`: los componentes read-only (monitor) reciben una
/// referencia compartida y no pueden llamar mutaciones por construcción.
pub trait Scheduler {
    fn submit_array(&mut self, request: &ArraySubmission) -> Result<String, SchedulerError>;
    fn queue(&self, job_id: &str) -> Result<Vec<QueueEntry>, SchedulerError>;
    fn cancel(&mut self, job_id: &str) -> Result<(), SchedulerError>;
}
