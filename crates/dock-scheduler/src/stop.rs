//! Stop Controller: cancela el trabajo en vuelo de un scope (un job array o
//! la campaña entera) y marca sus tareas como `Cancelled`.
//!
//! La cancelación es cooperativa: sólo se le pide al scheduler que termine
//! los procesos; se espera confirmación acotadamente y, si no llega, las
//! tareas se marcan igual con un warning (optimista). Parar un scope sin
//! tareas no-terminales es un no-op que reporta el estado actual. Si quedó
//! una cola de tandas sin someter, la próxima se somete al terminar.

use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use dock_core::{latest_generation, CoreError, JobArrayStore, StateStore};
use dock_domain::{TaskKey, TaskState};

use crate::error::with_retry;
use crate::scheduler::Scheduler;
use crate::submit::{submit_batches, SubmitOutcome};

#[derive(Debug, Default)]
pub struct StopReport {
    pub cancelled_jobs: Vec<String>,
    pub cancelled_tasks: Vec<TaskKey>,
    /// true si el scheduler confirmó que la cola quedó vacía.
    pub confirmed: bool,
    /// Resultado de someter la próxima tanda en cola, si había una.
    pub next_group: Option<Vec<SubmitOutcome>>,
}

impl StopReport {
    pub fn was_noop(&self) -> bool {
        self.cancelled_jobs.is_empty() && self.cancelled_tasks.is_empty()
    }
}

pub fn stop_campaign<C, S>(scheduler: &mut C,
                           store: &mut S,
                           campaign: Uuid,
                           job_filter: Option<&str>,
                           confirm_wait: Duration,
                           cfg: &dock_core::SchedulerSection,
                           output_pattern: &str)
                           -> Result<StopReport, CoreError>
    where C: Scheduler,
          S: StateStore + JobArrayStore
{
    let mut report = StopReport::default();
    let latest = latest_generation(&store.list(campaign)?);
    let open: Vec<_> = latest.values()
                             .filter(|r| !r.state.is_terminal())
                             .filter(|r| job_filter.map_or(true, |j| r.job_id == j))
                             .cloned()
                             .collect();
    if open.is_empty() {
        info!("nada que parar: el scope no tiene tareas no-terminales");
        return Ok(report);
    }

    let mut job_ids: Vec<String> = open.iter().map(|r| r.job_id.clone()).collect();
    job_ids.sort();
    job_ids.dedup();

    for job_id in &job_ids {
        with_retry(|| scheduler.cancel(job_id)).map_err(CoreError::from)?;
        info!("job {job_id} cancelado");
        report.cancelled_jobs.push(job_id.clone());
    }

    // Espera acotada de confirmación: la cola de cada job debe vaciarse
    report.confirmed = wait_until_drained(scheduler, &job_ids, confirm_wait);
    if !report.confirmed {
        warn!("el scheduler no confirmó la cancelación dentro de la espera; se marca Cancelled igualmente");
    }

    for rec in &open {
        let cancelled = rec.transitioned(TaskState::Cancelled)
                           .map_err(|e| CoreError::Store(format!("batch {}: {e}", rec.key.batch_index)))?;
        store.put(&cancelled)?;
        report.cancelled_tasks.push(rec.key);
    }

    // Si hay tandas en cola (submission parcial previa), someter la próxima
    let mut queue = store.queued_groups(campaign)?;
    if !queue.is_empty() && job_filter.is_none() {
        let next = queue.remove(0);
        store.replace_queue(campaign, &queue)?;
        let latest = latest_generation(&store.list(campaign)?);
        let with_gens: Vec<(usize, u32)> =
            next.batches.iter()
                        .map(|b| (*b, latest.get(b).map(|r| r.key.generation + 1).unwrap_or(1)))
                        .collect();
        info!("sometiendo la próxima tanda en cola ({} batches)", with_gens.len());
        report.next_group = Some(submit_batches(scheduler, store, campaign, &with_gens, cfg, output_pattern)?);
    }
    Ok(report)
}

fn wait_until_drained<C: Scheduler>(scheduler: &C, job_ids: &[String], confirm_wait: Duration) -> bool {
    let deadline = Instant::now() + confirm_wait;
    loop {
        let drained = job_ids.iter().all(|job_id| matches!(scheduler.queue(job_id), Ok(entries) if entries.is_empty()));
        if drained {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(200).min(confirm_wait));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeScheduler;
    use dock_core::{InMemoryCampaignStore, PendingGroup, SchedulerSection};
    use dock_domain::TaskRecord;

    fn cfg() -> SchedulerSection {
        SchedulerSection { job_name: "dock".into(),
                           account: "chem".into(),
                           partition: "batch".into(),
                           time_limit: "02:00:00".into(),
                           nodes: 1,
                           max_array_size: 1000,
                           max_running_tasks: 50,
                           extra_options: vec![],
                           heartbeat_secs: 30,
                           stale_after_secs: 600 }
    }

    fn seed(store: &mut InMemoryCampaignStore, campaign: Uuid, batch: usize, job: &str, state: TaskState) {
        let rec = TaskRecord::queued(TaskKey::new(campaign, batch, 1), job, batch + 1);
        let rec = match state {
            TaskState::Queued => rec,
            TaskState::Running => rec.transitioned(TaskState::Running).unwrap(),
            terminal => rec.transitioned(TaskState::Running).unwrap().transitioned(terminal).unwrap(),
        };
        store.put(&rec).unwrap();
    }

    #[test]
    fn cancels_open_tasks_and_preserves_completed() {
        let mut store = InMemoryCampaignStore::new();
        let mut scheduler = FakeScheduler::new();
        let campaign = Uuid::new_v4();
        seed(&mut store, campaign, 0, "91001", TaskState::Completed);
        seed(&mut store, campaign, 1, "91001", TaskState::Running);
        seed(&mut store, campaign, 2, "91002", TaskState::Queued);

        let report =
            stop_campaign(&mut scheduler, &mut store, campaign, None, Duration::ZERO, &cfg(), "o").unwrap();
        assert_eq!(report.cancelled_jobs, vec!["91001", "91002"]);
        assert_eq!(report.cancelled_tasks.len(), 2);
        assert!(report.confirmed);

        let latest = latest_generation(&store.list(campaign).unwrap());
        assert_eq!(latest[&0].state, TaskState::Completed);
        assert_eq!(latest[&1].state, TaskState::Cancelled);
        assert_eq!(latest[&2].state, TaskState::Cancelled);
    }

    #[test]
    fn stop_on_terminal_scope_is_a_noop() {
        let mut store = InMemoryCampaignStore::new();
        let mut scheduler = FakeScheduler::new();
        let campaign = Uuid::new_v4();
        seed(&mut store, campaign, 0, "91001", TaskState::Completed);
        seed(&mut store, campaign, 1, "91001", TaskState::Cancelled);

        let report =
            stop_campaign(&mut scheduler, &mut store, campaign, None, Duration::ZERO, &cfg(), "o").unwrap();
        assert!(report.was_noop());
        assert!(scheduler.cancelled.is_empty());

        // Idempotencia: repetir el stop sigue siendo un no-op
        let again =
            stop_campaign(&mut scheduler, &mut store, campaign, None, Duration::ZERO, &cfg(), "o").unwrap();
        assert!(again.was_noop());
    }

    #[test]
    fn job_filter_limits_the_scope() {
        let mut store = InMemoryCampaignStore::new();
        let mut scheduler = FakeScheduler::new();
        let campaign = Uuid::new_v4();
        seed(&mut store, campaign, 0, "91001", TaskState::Running);
        seed(&mut store, campaign, 1, "91002", TaskState::Running);

        let report = stop_campaign(&mut scheduler, &mut store, campaign, Some("91001"), Duration::ZERO, &cfg(), "o")
            .unwrap();
        assert_eq!(report.cancelled_jobs, vec!["91001"]);
        let latest = latest_generation(&store.list(campaign).unwrap());
        assert_eq!(latest[&0].state, TaskState::Cancelled);
        assert_eq!(latest[&1].state, TaskState::Running);
    }

    #[test]
    fn queued_group_is_submitted_after_stop() {
        let mut store = InMemoryCampaignStore::new();
        let mut scheduler = FakeScheduler::new();
        let campaign = Uuid::new_v4();
        seed(&mut store, campaign, 0, "91001", TaskState::Running);
        store.replace_queue(campaign, &[PendingGroup { batches: vec![5, 6] }]).unwrap();

        let report =
            stop_campaign(&mut scheduler, &mut store, campaign, None, Duration::ZERO, &cfg(), "o").unwrap();
        let next = report.next_group.unwrap();
        assert_eq!(next.len(), 1);
        assert!(next[0].result.is_ok());
        assert!(store.queued_groups(campaign).unwrap().is_empty());
        // Los batches de la tanda sometida quedan Queued en generación 1
        let latest = latest_generation(&store.list(campaign).unwrap());
        assert_eq!(latest[&5].state, TaskState::Queued);
    }
}
