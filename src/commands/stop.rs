//! `stop`: cancela el trabajo en vuelo y, si hay tandas en cola, somete la
//! próxima.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use tracing::info;

use dock_core::CoreError;
use dock_persistence::{FsCampaignStore, SubmissionLock};
use dock_scheduler::{stop_campaign, SlurmScheduler};

/// Espera acotada de confirmación de la cancelación.
const CONFIRM_WAIT: Duration = Duration::from_secs(30);

pub fn run(config_path: &Path, job_id: Option<&str>) -> Result<ExitCode, CoreError> {
    let (cfg, layout) = super::load(config_path)?;
    let campaign = layout.load_campaign()?;
    let mut store = FsCampaignStore::new(layout.clone());
    // Puede someter la próxima tanda en cola: serializa como cualquier submit
    let _lock = SubmissionLock::acquire(&layout, campaign.id)?;
    let mut scheduler = SlurmScheduler::new(&super::submit::worker_command_for(&cfg));

    let report = stop_campaign(&mut scheduler,
                               &mut store,
                               campaign.id,
                               job_id,
                               CONFIRM_WAIT,
                               &cfg.scheduler,
                               &super::output_pattern(&cfg, &layout))?;

    if report.was_noop() {
        println!("nothing to stop: no non-terminal tasks in scope");
        return Ok(ExitCode::SUCCESS);
    }
    for job in &report.cancelled_jobs {
        println!("job {job} cancelled");
    }
    println!("{} tasks marked cancelled{}",
             report.cancelled_tasks.len(),
             if report.confirmed { "" } else { " (scheduler did not confirm in time)" });
    if let Some(next) = &report.next_group {
        for sub in next {
            match &sub.result {
                Ok(job_array) => info!("next queued group submitted as job {}", job_array.job_id),
                Err(e) => info!("next queued group failed to submit: {e}"),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
