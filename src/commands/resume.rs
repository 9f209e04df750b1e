//! `resume`: re-somete exactamente los batches no completados.

use std::path::Path;
use std::process::ExitCode;

use tracing::{error, info};

use dock_core::CoreError;
use dock_persistence::{FsCampaignStore, SubmissionLock};
use dock_scheduler::{resume_campaign, SlurmScheduler};

pub fn run(config_path: &Path) -> Result<ExitCode, CoreError> {
    let (cfg, layout) = super::load(config_path)?;
    let campaign = layout.load_campaign()?;
    let total_batches = layout.staged_batch_count()?;
    if total_batches == 0 {
        return Err(CoreError::Config("no staged batches found; run submit first".into()));
    }

    let mut store = FsCampaignStore::new(layout.clone());
    let _lock = SubmissionLock::acquire(&layout, campaign.id)?;
    let mut scheduler = SlurmScheduler::new(&super::submit::worker_command_for(&cfg));

    let outcome = resume_campaign(&mut scheduler,
                                  &mut store,
                                  campaign.id,
                                  total_batches,
                                  &cfg.scheduler,
                                  &super::output_pattern(&cfg, &layout))?;

    info!("{} completados, {} re-sometidos, {} en conflicto",
          outcome.plan.completed.len(),
          outcome.plan.resubmit.len(),
          outcome.plan.conflicts.len());
    if outcome.plan.is_noop() {
        println!("all batches have completed docking, no need to resume");
        return Ok(ExitCode::SUCCESS);
    }

    let mut first_scheduler_error = None;
    for sub in &outcome.outcomes {
        match &sub.result {
            Ok(job_array) => info!("job array {} sometido ({} batches)", job_array.job_id, sub.batches.len()),
            Err(e) => {
                error!("tanda {} rechazada: {e}", sub.group_index);
                first_scheduler_error.get_or_insert_with(|| e.clone());
            }
        }
    }
    if let Some(e) = first_scheduler_error {
        return Err(e.into());
    }
    if let Some(batch) = outcome.plan.conflicts.first() {
        // El resto ya fue re-sometido; el conflicto queda reflejado en el
        // código de salida
        return Err(CoreError::ResumeConflict { batch: *batch });
    }
    Ok(ExitCode::SUCCESS)
}
