//! Tareas y job arrays.
//!
//! Un `TaskRecord` es la unidad de trabajo agendada: exactamente un batch
//! asignado a exactamente un índice de array dentro de un `JobArray`. Los
//! records son inmutables por generación: re-someter un batch crea una
//! generación nueva y conserva la anterior para auditoría.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DomainError;

/// Estado de una tarea.
///
/// Las transiciones válidas son:
/// - `Pending` -> `Queued` -> `Running`
/// - `Running` -> `Completed` | `Failed` | `Cancelled`
/// - `Pending`/`Queued` -> `Cancelled`
///
/// `Completed`, `Failed` y `Cancelled` son terminales; sólo `Completed`
/// cuenta como "hecho" a efectos de resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }

    fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!((self, next),
                 (Pending, Queued) | (Queued, Running) | (Running, Completed) | (Running, Failed) | (Pending, Cancelled) | (Queued, Cancelled) | (Running, Cancelled))
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Clave única de un record: (campaña, batch, generación).
///
/// La unicidad de esta clave es la base del modelo de concurrencia: ningún
/// par de escritores concurrentes comparte clave, así que el store no
/// necesita locking por tarea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub campaign: Uuid,
    pub batch_index: usize,
    pub generation: u32,
}

impl TaskKey {
    pub fn new(campaign: Uuid, batch_index: usize, generation: u32) -> Self {
        Self { campaign, batch_index, generation }
    }

    /// Nombre determinista del archivo de record (`b00000007.g002.json`).
    pub fn record_name(&self) -> String {
        format!("b{:08}.g{:03}.json", self.batch_index, self.generation)
    }

    /// Nombre del directorio de salida de la tarea (`b00000007.g002`).
    pub fn output_dir_name(&self) -> String {
        format!("b{:08}.g{:03}", self.batch_index, self.generation)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub key: TaskKey,
    /// Job id del scheduler que contiene esta tarea.
    pub job_id: String,
    /// Índice dentro del job array (1-based, convención Slurm).
    pub array_index: usize,
    pub state: TaskState,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Último latido del worker mientras corre el engine.
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    /// Diagnóstico capturado en fallos del engine (nunca fatal de campaña).
    pub diagnostic: Option<String>,
}

impl TaskRecord {
    pub fn queued(key: TaskKey, job_id: &str, array_index: usize) -> Self {
        TaskRecord { key,
                     job_id: job_id.to_string(),
                     array_index,
                     state: TaskState::Queued,
                     queued_at: Some(Utc::now()),
                     started_at: None,
                     ended_at: None,
                     heartbeat_at: None,
                     exit_code: None,
                     diagnostic: None }
    }

    /// Transición validada de estado; devuelve el record nuevo a persistir.
    pub fn transitioned(&self, next: TaskState) -> Result<Self, DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidTransition { from: self.state.to_string(),
                                                        to: next.to_string() });
        }
        let mut rec = self.clone();
        rec.state = next;
        let now = Utc::now();
        match next {
            TaskState::Running => {
                rec.started_at = Some(now);
                rec.heartbeat_at = Some(now);
            }
            s if s.is_terminal() => rec.ended_at = Some(now),
            _ => {}
        }
        Ok(rec)
    }
}

/// Unidad de submission del scheduler: un rango contiguo de índices de array
/// (1..=N) mapeado a una lista ordenada de batches.
///
/// La lista es explícita porque en un resume los batches re-sometidos no son
/// consecutivos. Invariante: `batches.len()` nunca excede el
/// `max_array_size` configurado; campañas con más batches producen varios
/// `JobArray` encadenados.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobArray {
    pub job_id: String,
    /// Batch cubierto por cada índice de array, en orden (índice 1 -> [0]).
    pub batches: Vec<usize>,
    /// Throttle de tareas concurrentes aplicado en el submit (`%N`).
    pub throttle: usize,
    pub submitted_at: DateTime<Utc>,
}

impl JobArray {
    /// Batch que corresponde a un índice de array (1-based) de este job.
    pub fn batch_for_array_index(&self, array_index: usize) -> Option<usize> {
        if array_index == 0 {
            return None;
        }
        self.batches.get(array_index - 1).copied()
    }
}
