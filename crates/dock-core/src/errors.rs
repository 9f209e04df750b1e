//! Errores del core de orquestación.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuración inválida: fatal en el submit, nada queda a medias.
    #[error("config error: {0}")]
    Config(String),
    /// Un archivo de batch existente no coincide con la membresía recién
    /// computada (resume corrupto o desalineado). Fatal sólo para ese batch.
    #[error("input conflict for batch {batch}: {detail}")]
    InputConflict { batch: usize, detail: String },
    /// El último Task del batch sigue Running y no está stale; re-someterlo
    /// correría en paralelo con el trabajo en vuelo.
    #[error("resume conflict for batch {batch}: latest task is running and not stale")]
    ResumeConflict { batch: usize },
    /// El scheduler rechazó una submission; las tandas anteriores aceptadas
    /// no se revierten.
    #[error("scheduler rejected the submission: {0}")]
    SchedulerRejected(String),
    /// Falla de comunicación con el scheduler tras agotar los reintentos.
    #[error("scheduler unavailable: {0}")]
    SchedulerUnavailable(String),
    #[error("state store error: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
