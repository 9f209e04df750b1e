//! `submit`: particiona, arma el staging y somete los job arrays.

use std::path::Path;
use std::process::ExitCode;

use tracing::{error, info};

use dock_core::{partition, read_structures, CoreError};
use dock_domain::Campaign;
use dock_persistence::{stage_batch, FsCampaignStore, StagingInputs, SubmissionLock};
use dock_scheduler::{submit_batches, SlurmScheduler};

pub fn run(config_path: &Path) -> Result<ExitCode, CoreError> {
    let (cfg, layout) = super::load(config_path)?;
    if layout.campaign_file().is_file() {
        return Err(CoreError::Config(format!("a campaign already exists under {}; use resume, or archive the state dir explicitly",
                                             layout.root().display())));
    }

    let receptor_files: Vec<String> =
        [&cfg.engine.receptor, &cfg.engine.cavity].into_iter().flatten().cloned().collect();
    let campaign = Campaign::new(receptor_files, &cfg.engine.ligand_path, cfg.engine.batch_size)
        .map_err(|e| CoreError::Config(e.to_string()))?;
    layout.ensure(campaign.id)?;
    layout.save_campaign(&campaign)?;
    info!("campaña {} creada", campaign.id);

    // Partición determinista + staging (skip-if-unchanged por batch)
    let structures = read_structures(Path::new(&cfg.engine.ligand_path))?;
    let plans = partition(structures, cfg.engine.batch_size)?;
    info!("{} batches para {} ligandos (batch size {})",
          plans.len(),
          plans.iter().map(|p| p.members.len()).sum::<usize>(),
          cfg.engine.batch_size);

    let inputs = StagingInputs { conf_template: cfg.engine.conf_template.clone().into(),
                                 receptor: cfg.engine.receptor.clone().map(Into::into),
                                 cavity: cfg.engine.cavity.clone().map(Into::into),
                                 ligand_ext: ligand_ext(&cfg.engine.ligand_path) };
    let mut staged: Vec<(usize, u32)> = Vec::with_capacity(plans.len());
    let mut conflicts: Vec<usize> = Vec::new();
    for plan in &plans {
        match stage_batch(&layout, plan, &inputs) {
            Ok(batch) => staged.push((batch.index, 1)),
            Err(CoreError::InputConflict { batch, detail }) => {
                // Fatal sólo para este batch; el resto sigue
                error!("batch {batch}: conflicto de membresía ({detail})");
                conflicts.push(batch);
            }
            Err(e) => return Err(e),
        }
    }

    let mut store = FsCampaignStore::new(layout.clone());
    let _lock = SubmissionLock::acquire(&layout, campaign.id)?;
    let mut scheduler = SlurmScheduler::new(&worker_command_for(&cfg));
    let outcomes = submit_batches(&mut scheduler,
                                  &mut store,
                                  campaign.id,
                                  &staged,
                                  &cfg.scheduler,
                                  &super::output_pattern(&cfg, &layout))?;

    let mut first_scheduler_error = None;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(job_array) => info!("job array {} sometido ({} batches)", job_array.job_id, outcome.batches.len()),
            Err(e) => {
                error!("tanda {} rechazada ({} batches): {e}", outcome.group_index, outcome.batches.len());
                first_scheduler_error.get_or_insert_with(|| e.clone());
            }
        }
    }

    if let Some(e) = first_scheduler_error {
        // Las tandas aceptadas no se revierten; las demás quedan en cola
        return Err(e.into());
    }
    if let Some(batch) = conflicts.first() {
        return Err(CoreError::InputConflict { batch: *batch,
                                              detail: format!("{} batches skipped on membership conflicts",
                                                              conflicts.len()) });
    }
    Ok(ExitCode::SUCCESS)
}

fn ligand_ext(ligand_path: &str) -> String {
    if ligand_path.ends_with(".mol2") {
        "mol2".to_string()
    } else {
        "sdf".to_string()
    }
}

/// Línea que corre cada tarea del array: este mismo binario, subcomando
/// `worker`, con el contrato mínimo (licencia, raíz compartida, verbosidad).
pub(crate) fn worker_command_for(cfg: &dock_core::CampaignConfig) -> String {
    let exe = std::env::current_exe().map(|p| p.display().to_string())
                                     .unwrap_or_else(|_| "dockflow".to_string());
    format!("{exe} worker --shared-root '{}' --licensing '{}' --engine '{}' --log-level {} --heartbeat-secs {}",
            cfg.paths.shared_root,
            cfg.engine.licensing,
            cfg.engine.command,
            cfg.engine.log_level,
            cfg.scheduler.heartbeat_secs)
}
