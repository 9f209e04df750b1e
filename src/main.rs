//! dockflow: orquestador de campañas de docking sobre un batch scheduler.
//!
//! Un subcomando por controlador: `submit`, `status`, `resume`, `stop`,
//! `collect`, `timing`, más el entry point interno `worker` que corre cada
//! tarea del job array en un nodo de cómputo.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dock_core::CoreError;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "dockflow")]
#[command(version)]
#[command(about = "HPC docking campaign orchestrator", long_about = None)]
struct Cli {
    /// Archivo de configuración de la campaña.
    #[arg(short = 'i', long, default_value = "cluster.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Particiona los ligandos, arma los batches y somete los job arrays.
    Submit,
    /// Estado de cada tarea (read-only), con estado vivo del scheduler.
    Status {
        /// Restringe el reporte a un job array.
        #[arg(short, long)]
        job: Option<String>,
    },
    /// Re-somete exactamente los batches no completados.
    Resume,
    /// Cancela el trabajo en vuelo (de un job array o de la campaña).
    Stop {
        /// Job id a parar; sin él se para la campaña entera.
        job_id: Option<String>,
    },
    /// Junta los resultados en un ranking global ordenado.
    Collect {
        /// Copia cada pose al directorio de resultados, nombrada por rank.
        #[arg(long)]
        materialize_poses: bool,
    },
    /// Estadísticas de tiempos por tarea y por campaña.
    Timing,
    /// Entry point interno: una tarea del job array (no invocar a mano).
    #[command(hide = true)]
    Worker(commands::worker::WorkerArgs),
}

/// Un código de salida distinto por clase de error.
fn exit_code_for(err: &CoreError) -> u8 {
    match err {
        CoreError::Config(_) => 2,
        CoreError::InputConflict { .. } => 3,
        CoreError::SchedulerRejected(_) => 4,
        CoreError::SchedulerUnavailable(_) => 5,
        CoreError::ResumeConflict { .. } => 6,
        _ => 1,
    }
}

fn main() -> ExitCode {
    // Cargar .env si existe, antes de leer el entorno
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Submit => commands::submit::run(&cli.config),
        Commands::Status { job } => commands::status::run(&cli.config, job.as_deref()),
        Commands::Resume => commands::resume::run(&cli.config),
        Commands::Stop { job_id } => commands::stop::run(&cli.config, job_id.as_deref()),
        Commands::Collect { materialize_poses } => commands::collect::run(&cli.config, materialize_poses),
        Commands::Timing => commands::timing::run(&cli.config),
        Commands::Worker(args) => commands::worker::run(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
