//! `worker`: entry point interno de cada tarea del job array.
//!
//! Contrato de invocación: licencia, raíz compartida y verbosidad como
//! únicos insumos requeridos; el batch se ubica con el índice de array que
//! inyecta el scheduler en el entorno.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use tracing::info;

use dock_core::CoreError;
use dock_persistence::CampaignLayout;
use dock_worker::{run_worker, SubprocessEngine, WorkerIdentity, WorkerOptions};

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Raíz del filesystem compartido (deriva `in/`, `out/` y `state/`).
    #[arg(long)]
    pub shared_root: PathBuf,
    /// String de configuración de licencia del engine.
    #[arg(long)]
    pub licensing: String,
    /// Ejecutable del engine de docking.
    #[arg(long)]
    pub engine: String,
    #[arg(long, default_value_t = 1)]
    pub log_level: u8,
    #[arg(long, default_value_t = 30)]
    pub heartbeat_secs: u64,
}

pub fn run(args: WorkerArgs) -> Result<ExitCode, CoreError> {
    let Some(identity) = WorkerIdentity::from_env() else {
        // No corremos como tarea de array: nada que hacer
        info!("no scheduler array environment found, exiting");
        return Ok(ExitCode::SUCCESS);
    };

    let layout = CampaignLayout::new(&args.shared_root);
    let engine = SubprocessEngine::new(&args.engine);
    let opts = WorkerOptions { licensing: args.licensing,
                               log_level: args.log_level,
                               heartbeat_secs: args.heartbeat_secs };

    // Un estado terminal Failed también es salida 0: la falla quedó
    // registrada en el store y no debe tumbar el job array
    let state = run_worker(&engine, &layout, &identity, &opts)?;
    info!("task {} of job {} finished as {state}", identity.array_index, identity.job_id);
    Ok(ExitCode::SUCCESS)
}
