//! Errores de comunicación con el scheduler.

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// El scheduler rechazó la submission (cuota, opciones inválidas).
    #[error("scheduler rejected the submission: {0}")]
    Rejected(String),
    /// Falla de comunicación; se reintenta acotadamente antes de llegar acá.
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),
}

impl From<SchedulerError> for dock_core::CoreError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::Rejected(msg) => dock_core::CoreError::SchedulerRejected(msg),
            SchedulerError::Unavailable(msg) => dock_core::CoreError::SchedulerUnavailable(msg),
        }
    }
}

/// Un rechazo explícito no se reintenta; una falla de comunicación sí.
fn is_retryable(e: &SchedulerError) -> bool {
    matches!(e, SchedulerError::Unavailable(_))
}

/// Retry simple con backoff lineal corto (hasta 3 intentos).
///
/// No altera la semántica de la operación; sólo repite la unidad de trabajo
/// provista por `f` ante errores transitorios.
pub fn with_retry<F, T>(mut f: F) -> Result<T, SchedulerError>
    where F: FnMut() -> Result<T, SchedulerError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 250 * ((attempts + 1) as u64);
                warn!("retryable scheduler error (attempt {}): {e} -> sleeping {delay_ms}ms", attempts + 1);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}
