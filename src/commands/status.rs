//! `status`: reporte read-only del estado de la campaña.
//!
//! Siempre sale 0 (es informativo), incluso con tareas fallidas; los
//! conteos de fallas se imprimen.

use std::path::Path;
use std::process::ExitCode;

use dock_core::CoreError;
use dock_domain::TaskState;
use dock_persistence::FsCampaignStore;
use dock_scheduler::{snapshot, SlurmScheduler};

pub fn run(config_path: &Path, job_filter: Option<&str>) -> Result<ExitCode, CoreError> {
    let (_cfg, layout) = super::load(config_path)?;
    let campaign = layout.load_campaign()?;
    let store = FsCampaignStore::new(layout.clone());
    let scheduler = SlurmScheduler::new("");

    let report = snapshot(&scheduler, &store, campaign.id, job_filter)?;
    let completed = report.count(TaskState::Completed);
    let failed = report.count(TaskState::Failed);
    let cancelled = report.count(TaskState::Cancelled);
    let running = report.count(TaskState::Running);
    let queued = report.count(TaskState::Queued) + report.count(TaskState::Pending);

    println!("campaign {} ({} tasks)", campaign.id, report.total_batches);
    println!("  completed: {completed}  running: {running}  queued: {queued}  failed: {failed}  cancelled: {cancelled}");
    if report.total_batches > 0 {
        println!("  progress: {}%", 100 * completed / report.total_batches);
    }

    for task in &report.tasks {
        let live = match (task.state, &task.live) {
            (TaskState::Running, Some(code)) => format!(" [{code}]"),
            (TaskState::Running, None) => " [unknown]".to_string(),
            _ => String::new(),
        };
        println!("  batch {:>6} gen {:>2}  {}{live}  job {}_{}",
                 task.batch_index, task.generation, task.state, task.job_id, task.array_index);
        if task.state == TaskState::Failed {
            if let Some(diagnostic) = &task.diagnostic {
                for line in diagnostic.lines().take(3) {
                    println!("      ! {line}");
                }
            }
        }
    }
    if failed > 0 {
        println!("{failed} tasks failed; `resume` will re-submit them");
    }
    Ok(ExitCode::SUCCESS)
}
