//! Cálculo del plan de resume.
//!
//! El plan se deriva puramente de la vista de generación vigente: un batch
//! se re-somete si su último Task no está `Completed`. Un Running con latido
//! fresco produce `ResumeConflict` para ese batch únicamente; el resume
//! sigue adelante con los demás.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use dock_domain::{TaskRecord, TaskState};

/// Resultado del análisis por batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    /// Batches a re-someter, con la generación que tendrá el record nuevo.
    pub resubmit: Vec<(usize, u32)>,
    /// Batches con un Running vigente y no-stale (conflicto, se saltean).
    pub conflicts: Vec<usize>,
    /// Batches ya completados; nunca se re-someten.
    pub completed: Vec<usize>,
}

impl ResumePlan {
    pub fn is_noop(&self) -> bool {
        self.resubmit.is_empty() && self.conflicts.is_empty()
    }
}

/// Computa el plan sobre la vista `latest_generation`.
///
/// `total_batches` cubre el caso de batches que nunca llegaron a tener
/// record (submission parcial): se re-someten con generación 1.
pub fn plan_resume(latest: &BTreeMap<usize, TaskRecord>,
                   total_batches: usize,
                   stale_after: Duration,
                   now: DateTime<Utc>)
                   -> ResumePlan {
    let mut plan = ResumePlan { resubmit: Vec::new(),
                                conflicts: Vec::new(),
                                completed: Vec::new() };
    for batch in 0..total_batches {
        match latest.get(&batch) {
            None => plan.resubmit.push((batch, 1)),
            Some(rec) => match rec.state {
                TaskState::Completed => plan.completed.push(batch),
                TaskState::Running => {
                    if is_stale(rec, stale_after, now) {
                        plan.resubmit.push((batch, rec.key.generation + 1));
                    } else {
                        plan.conflicts.push(batch);
                    }
                }
                // Pending/Queued/Failed/Cancelled: re-someter
                _ => plan.resubmit.push((batch, rec.key.generation + 1)),
            },
        }
    }
    plan
}

fn is_stale(rec: &TaskRecord, stale_after: Duration, now: DateTime<Utc>) -> bool {
    let last_beat = rec.heartbeat_at.or(rec.started_at);
    match last_beat {
        Some(ts) => now - ts > stale_after,
        // Running sin timestamp alguno: record anómalo, tratar como stale
        None => true,
    }
}
