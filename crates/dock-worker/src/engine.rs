//! La capability del engine de docking.
//!
//! El engine es un ejecutable externo licenciado y opaco: recibe el área de
//! trabajo desempaquetada y deja su salida en `output/`, incluyendo un
//! ranking por batch (`bestranking.lst`, líneas `score ligand_id pose`).
//! Los tests sustituyen la implementación por `ScriptedEngine` con
//! resultados guionados.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use dock_domain::ResultRecord;

pub const RANKING_FILENAME: &str = "bestranking.lst";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot spawn engine '{command}': {detail}")]
    Spawn { command: String, detail: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Insumos de una corrida: el área privada con el batch desempaquetado.
#[derive(Debug, Clone)]
pub struct BatchInputs {
    pub work_dir: PathBuf,
    /// Configuración del engine dentro del área de trabajo.
    pub conf_file: PathBuf,
    /// Donde el engine deja su salida (fijado por el orquestador).
    pub output_dir: PathBuf,
    pub licensing: String,
    pub log_level: u8,
}

#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// true si el engine dejó los artefactos esperados (el ranking).
    pub artifacts_present: bool,
    pub records: Vec<ResultRecord>,
    pub diagnostic: Option<String>,
}

/// `DockingEngine.run(batchInputs) -> (exitStatus, resultRecords)`.
///
/// `Err` significa que el engine ni siquiera pudo invocarse; el worker lo
/// registra como `Failed` igual que un exit-code distinto de cero.
pub trait DockingEngine {
    fn run(&self, inputs: &BatchInputs) -> Result<EngineOutcome, EngineError>;
}

/// Implementación real: subproceso bloqueante sobre el ejecutable
/// configurado. El límite de wall-clock por tarea lo aplica el scheduler,
/// no el orquestador.
pub struct SubprocessEngine {
    pub command: String,
}

impl SubprocessEngine {
    pub fn new(command: &str) -> Self {
        Self { command: command.to_string() }
    }
}

impl DockingEngine for SubprocessEngine {
    fn run(&self, inputs: &BatchInputs) -> Result<EngineOutcome, EngineError> {
        debug!("invocando {} en {}", self.command, inputs.work_dir.display());
        let output = Command::new(&self.command)
            .arg(&inputs.conf_file)
            .current_dir(&inputs.work_dir)
            .env("CCDC_LICENSING_CONFIGURATION", &inputs.licensing)
            .env("DOCK_LOG_LEVEL", inputs.log_level.to_string())
            .output()
            .map_err(|e| EngineError::Spawn { command: self.command.clone(),
                                              detail: e.to_string() })?;

        let success = output.status.success();
        let diagnostic = if success {
            None
        } else {
            // Diagnóstico capturado para el status report; acotado
            let stderr = String::from_utf8_lossy(&output.stderr);
            Some(stderr.lines().take(20).collect::<Vec<_>>().join("\n"))
        };
        let (artifacts_present, records) = match read_ranking(&inputs.output_dir) {
            Some(records) => (true, records),
            None => (false, Vec::new()),
        };
        Ok(EngineOutcome { success,
                           exit_code: output.status.code(),
                           artifacts_present,
                           records,
                           diagnostic })
    }
}

/// Parsea el ranking por batch del engine: líneas `score ligand_id [pose]`,
/// comentarios con `#`.
pub fn read_ranking(output_dir: &Path) -> Option<Vec<ResultRecord>> {
    let raw = std::fs::read_to_string(output_dir.join(RANKING_FILENAME)).ok()?;
    let mut records = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(score), Some(ligand_id)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(score) = score.parse::<f64>() else {
            continue;
        };
        let pose_file = fields.next().unwrap_or(ligand_id).to_string();
        records.push(ResultRecord { ligand_id: ligand_id.to_string(),
                                    score,
                                    pose_file });
    }
    Some(records)
}

/// Engine guionado para tests de transición de estado: éxito, fallo o
/// timeout sin el engine real.
pub struct ScriptedEngine {
    pub outcome: Result<EngineOutcome, String>,
}

impl ScriptedEngine {
    pub fn succeeding(records: Vec<ResultRecord>) -> Self {
        Self { outcome: Ok(EngineOutcome { success: true,
                                           exit_code: Some(0),
                                           artifacts_present: true,
                                           records,
                                           diagnostic: None }) }
    }

    pub fn failing(exit_code: i32, diagnostic: &str) -> Self {
        Self { outcome: Ok(EngineOutcome { success: false,
                                           exit_code: Some(exit_code),
                                           artifacts_present: false,
                                           records: Vec::new(),
                                           diagnostic: Some(diagnostic.to_string()) }) }
    }

    /// Exit "exitoso" pero sin artefactos: cubre el caso de salida faltante.
    pub fn succeeding_without_artifacts() -> Self {
        Self { outcome: Ok(EngineOutcome { success: true,
                                           exit_code: Some(0),
                                           artifacts_present: false,
                                           records: Vec::new(),
                                           diagnostic: None }) }
    }

    pub fn unspawnable(detail: &str) -> Self {
        Self { outcome: Err(detail.to_string()) }
    }
}

impl DockingEngine for ScriptedEngine {
    fn run(&self, inputs: &BatchInputs) -> Result<EngineOutcome, EngineError> {
        match &self.outcome {
            Ok(outcome) => Ok(outcome.clone()),
            Err(detail) => Err(EngineError::Spawn { command: format!("scripted:{}", inputs.work_dir.display()),
                                                    detail: detail.clone() }),
        }
    }
}
