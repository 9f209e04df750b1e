//! Resume Controller: re-somete exactamente los batches cuyo último Task no
//! está `Completed`.
//!
//! Cada re-submission crea records de generación nueva; los records viejos
//! se conservan para auditoría. Un batch con un Running vigente y no-stale
//! se reporta como conflicto y se saltea; el resume sigue con los demás.
//! Los resultados existentes nunca se descartan.

use chrono::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use dock_core::{latest_generation, plan_resume, CoreError, JobArrayStore, ResumePlan, StateStore};

use crate::scheduler::Scheduler;
use crate::submit::{submit_batches, SubmitOutcome};

#[derive(Debug)]
pub struct ResumeOutcome {
    pub plan: ResumePlan,
    /// Vacío cuando el plan fue un no-op.
    pub outcomes: Vec<SubmitOutcome>,
}

pub fn resume_campaign<C, S>(scheduler: &mut C,
                             store: &mut S,
                             campaign: Uuid,
                             total_batches: usize,
                             cfg: &dock_core::SchedulerSection,
                             output_pattern: &str)
                             -> Result<ResumeOutcome, CoreError>
    where C: Scheduler,
          S: StateStore + JobArrayStore
{
    let latest = latest_generation(&store.list(campaign)?);
    let plan = plan_resume(&latest,
                           total_batches,
                           Duration::seconds(cfg.stale_after_secs as i64),
                           chrono::Utc::now());

    for batch in &plan.conflicts {
        warn!("{}", CoreError::ResumeConflict { batch: *batch });
    }
    if plan.resubmit.is_empty() {
        info!("todos los batches completaron el docking, no hay nada que re-someter");
        return Ok(ResumeOutcome { plan, outcomes: Vec::new() });
    }

    info!("re-sometiendo {} batches ({} completados se conservan)",
          plan.resubmit.len(),
          plan.completed.len());
    let outcomes = submit_batches(scheduler, store, campaign, &plan.resubmit, cfg, output_pattern)?;
    Ok(ResumeOutcome { plan, outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeScheduler;
    use dock_core::{InMemoryCampaignStore, SchedulerSection};
    use dock_domain::{TaskKey, TaskRecord, TaskState};

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

    fn seed(store: &mut InMemoryCampaignStore, campaign: Uuid, batch: usize, generation: u32, state: TaskState) {
        let rec = TaskRecord::queued(TaskKey::new(campaign, batch, generation), "91001", batch + 1);
        let rec = match state {
            TaskState::Queued => rec,
            TaskState::Running => rec.transitioned(TaskState::Running).unwrap(),
            terminal => rec.transitioned(TaskState::Running).unwrap().transitioned(terminal).unwrap(),
        };
        store.put(&rec).unwrap();
    }

    #[test]
    fn resubmits_only_not_completed_with_new_generation() {
        let mut store = InMemoryCampaignStore::new();
        let mut scheduler = FakeScheduler::new();
        let campaign = Uuid::new_v4();
        seed(&mut store, campaign, 0, 1, TaskState::Completed);
        seed(&mut store, campaign, 1, 1, TaskState::Failed);
        seed(&mut store, campaign, 2, 1, TaskState::Completed);

        let outcome = resume_campaign(&mut scheduler, &mut store, campaign, 3, &cfg(), "o").unwrap();
        assert_eq!(outcome.plan.resubmit, vec![(1, 2)]);
        assert_eq!(outcome.outcomes.len(), 1);

        // El record viejo del batch 1 se conserva; el nuevo es generación 2
        let records = store.list(campaign).unwrap();
        let gens: Vec<u32> = records.iter()
                                    .filter(|r| r.key.batch_index == 1)
                                    .map(|r| r.key.generation)
                                    .collect();
        assert_eq!(gens, vec![1, 2]);
        let latest = latest_generation(&records);
        assert_eq!(latest[&1].state, TaskState::Queued);
        assert_eq!(latest[&0].state, TaskState::Completed);
    }

    #[test]
    fn second_resume_without_changes_is_a_noop() {
        let mut store = InMemoryCampaignStore::new();
        let mut scheduler = FakeScheduler::new();
        let campaign = Uuid::new_v4();
        seed(&mut store, campaign, 0, 1, TaskState::Completed);
        seed(&mut store, campaign, 1, 1, TaskState::Completed);

        let first = resume_campaign(&mut scheduler, &mut store, campaign, 2, &cfg(), "o").unwrap();
        assert!(first.plan.is_noop());
        let second = resume_campaign(&mut scheduler, &mut store, campaign, 2, &cfg(), "o").unwrap();
        assert!(second.plan.is_noop());
        assert!(scheduler.submissions.is_empty());
    }

    #[test]
    fn fresh_running_is_skipped_as_conflict_others_proceed() {
        let mut store = InMemoryCampaignStore::new();
        let mut scheduler = FakeScheduler::new();
        let campaign = Uuid::new_v4();
        seed(&mut store, campaign, 0, 1, TaskState::Running); // latido fresco
        seed(&mut store, campaign, 1, 1, TaskState::Failed);

        let outcome = resume_campaign(&mut scheduler, &mut store, campaign, 2, &cfg(), "o").unwrap();
        assert_eq!(outcome.plan.conflicts, vec![0]);
        assert_eq!(outcome.plan.resubmit, vec![(1, 2)]);
        assert_eq!(scheduler.submissions.len(), 1);
    }
}
