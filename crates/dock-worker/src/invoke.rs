//! La invocación del worker: una corrida por índice de array.
//!
//! Las dos escrituras de estado (pase a Running y estado terminal) son cada
//! una un único put atómico al store: un crash entre pasos deja la tarea
//! observablemente Queued/Running (y eventualmente stale), nunca "perdida".

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use dock_core::{latest_generation, CoreError, JobArrayStore, StateStore};
use dock_domain::{ResultRecord, TaskRecord, TaskState};
use dock_persistence::{extract_archive, write_result_records, CampaignLayout, FsCampaignStore};

use crate::engine::{BatchInputs, DockingEngine};

/// Identidad de la tarea dentro del array; el worker la recupera del entorno
/// que inyecta el scheduler.
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    pub job_id: String,
    /// 1-based, convención del scheduler.
    pub array_index: usize,
    pub campaign: Uuid,
}

impl WorkerIdentity {
    /// Resuelve la identidad desde el entorno Slurm; `None` si no corremos
    /// como tarea de array (el entry point sale silenciosamente, como
    /// corresponde a una invocación manual).
    pub fn from_env() -> Option<Self> {
        let job_id = std::env::var("SLURM_ARRAY_JOB_ID").ok()?;
        let array_index = std::env::var("SLURM_ARRAY_TASK_ID").ok()?.parse().ok()?;
        let campaign = std::env::var("DOCK_CAMPAIGN").ok()?.parse().ok()?;
        Some(Self { job_id, array_index, campaign })
    }
}

/// Contrato de invocación: licencia, verbosidad y cadencia de latido son los
/// únicos insumos requeridos; el batch se ubica por la identidad.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub licensing: String,
    pub log_level: u8,
    /// 0 desactiva el latido (tests).
    pub heartbeat_secs: u64,
}

/// Corre una tarea completa y devuelve su estado terminal.
///
/// Las fallas del engine (exit distinto de cero, licencia ausente, timeout,
/// artefactos faltantes) terminan en `Ok(Failed)` con diagnóstico: la
/// campaña sigue con el resto de las tareas. `Err` queda reservado para
/// errores del orquestador (store/IO).
pub fn run_worker<E: DockingEngine>(engine: &E,
                                    layout: &CampaignLayout,
                                    identity: &WorkerIdentity,
                                    opts: &WorkerOptions)
                                    -> Result<TaskState, CoreError> {
    let mut store = FsCampaignStore::new(layout.clone());

    // Mapeo índice-de-array -> batch vía el registro de job arrays
    let job_array = store.list_job_arrays(identity.campaign)?
                         .into_iter()
                         .find(|ja| ja.job_id == identity.job_id)
                         .ok_or_else(|| CoreError::Store(format!("no job array {} registered for campaign {}",
                                                                 identity.job_id, identity.campaign)))?;
    let batch = job_array.batch_for_array_index(identity.array_index)
                         .ok_or_else(|| CoreError::Store(format!("array index {} out of range for job {}",
                                                                 identity.array_index, identity.job_id)))?;

    let latest = latest_generation(&store.list(identity.campaign)?);
    let record = latest.get(&batch)
                       .ok_or_else(|| CoreError::Store(format!("no task record for batch {batch}")))?
                       .clone();
    if record.job_id != identity.job_id {
        // Generación más nueva sometida por otro job: esta tarea quedó
        // huérfana y no debe tocar el record ajeno (single-writer).
        warn!("batch {batch} pertenece ahora al job {}, esta tarea ({}) no escribe nada",
              record.job_id, identity.job_id);
        return Ok(record.state);
    }

    info!("tarea {} del job {}: batch {batch} (generación {})",
          identity.array_index, identity.job_id, record.key.generation);
    let running = record.transitioned(TaskState::Running)
                        .map_err(|e| CoreError::Store(format!("batch {batch}: {e}")))?;
    store.put(&running)?;
    let heartbeat = Heartbeat::start(layout.clone(), running.clone(), opts.heartbeat_secs);

    let outcome = dock_batch(engine, layout, batch, opts);

    heartbeat.stop();
    let task_out_dir = layout.task_out_dir(&running.key);
    let (terminal_state, exit_code, diagnostic, records) = match outcome {
        Ok((work, engine_outcome)) => {
            // La salida cruda se conserva siempre, también en fallos
            if let Err(e) = copy_dir(&work.path().join("output"), &task_out_dir) {
                warn!("no se pudo conservar la salida cruda: {e}");
            }
            if engine_outcome.success && engine_outcome.artifacts_present {
                let records = rebase_poses(engine_outcome.records, &task_out_dir);
                (TaskState::Completed, engine_outcome.exit_code, None, records)
            } else {
                let diagnostic = engine_outcome.diagnostic
                                               .unwrap_or_else(|| "expected output artifacts missing".to_string());
                error!("engine falló en batch {batch}: {diagnostic}");
                (TaskState::Failed, engine_outcome.exit_code, Some(diagnostic), Vec::new())
            }
        }
        Err(detail) => {
            error!("no se pudo invocar el engine en batch {batch}: {detail}");
            (TaskState::Failed, None, Some(detail), Vec::new())
        }
    };

    if terminal_state == TaskState::Completed {
        write_result_records(&task_out_dir, &records)?;
    }
    let mut terminal = running.transitioned(terminal_state)
                              .map_err(|e| CoreError::Store(format!("batch {batch}: {e}")))?;
    terminal.exit_code = exit_code;
    terminal.diagnostic = diagnostic;
    store.put(&terminal)?;
    Ok(terminal_state)
}

/// Desempaqueta el batch en un área privada e invoca el engine. Devuelve el
/// área viva (el caller copia la salida antes del drop) más el outcome; los
/// errores se aplanan a String porque todos terminan en `Failed` con
/// diagnóstico.
fn dock_batch<E: DockingEngine>(engine: &E,
                                layout: &CampaignLayout,
                                batch: usize,
                                opts: &WorkerOptions)
                                -> Result<(tempfile::TempDir, crate::engine::EngineOutcome), String> {
    let work = tempfile::tempdir().map_err(|e| format!("cannot create work area: {e}"))?;
    let archive = layout.archive_path(batch);
    extract_archive(&archive, work.path()).map_err(|e| format!("cannot unpack {}: {e}", archive.display()))?;

    let conf_file = find_conf_file(work.path()).ok_or_else(|| "no engine conf file inside the batch archive".to_string())?;
    let output_dir = work.path().join("output");
    std::fs::create_dir_all(&output_dir).map_err(|e| e.to_string())?;

    let inputs = BatchInputs { work_dir: work.path().to_path_buf(),
                               conf_file,
                               output_dir,
                               licensing: opts.licensing.clone(),
                               log_level: opts.log_level };
    let outcome = engine.run(&inputs).map_err(|e| e.to_string())?;
    Ok((work, outcome))
}

fn find_conf_file(dir: &Path) -> Option<std::path::PathBuf> {
    let mut confs: Vec<_> = std::fs::read_dir(dir).ok()?
                                                  .filter_map(|e| e.ok().map(|e| e.path()))
                                                  .filter(|p| p.extension().map(|x| x == "conf").unwrap_or(false))
                                                  .collect();
    confs.sort();
    confs.into_iter().next()
}

/// Reescribe las referencias a poses para que apunten al directorio de
/// salida definitivo de la tarea.
fn rebase_poses(records: Vec<ResultRecord>, task_out_dir: &Path) -> Vec<ResultRecord> {
    records.into_iter()
           .map(|mut rec| {
               rec.pose_file = task_out_dir.join(&rec.pose_file).display().to_string();
               rec
           })
           .collect()
}

fn copy_dir(src: &Path, dest: &Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Latido del worker: refresca `heartbeat_at` del record Running desde un
/// hilo auxiliar mientras el engine corre. Mismo proceso, mismo dueño del
/// record: la regla de single-writer se mantiene porque el hilo se une
/// antes de la escritura terminal.
struct Heartbeat {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    fn start(layout: CampaignLayout, record: TaskRecord, interval_secs: u64) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        if interval_secs == 0 {
            return Self { stop, handle: None };
        }
        let flag = stop.clone();
        let handle = std::thread::spawn(move || {
            let mut store = FsCampaignStore::new(layout);
            let tick = Duration::from_millis(250);
            let mut elapsed = Duration::ZERO;
            let interval = Duration::from_secs(interval_secs);
            while !flag.load(Ordering::Relaxed) {
                std::thread::sleep(tick);
                elapsed += tick;
                if elapsed >= interval {
                    elapsed = Duration::ZERO;
                    let mut beat = record.clone();
                    beat.heartbeat_at = Some(Utc::now());
                    if let Err(e) = store.put(&beat) {
                        warn!("latido no persistido: {e}");
                    }
                }
            }
        });
        Self { stop, handle: Some(handle) }
    }

    fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}
