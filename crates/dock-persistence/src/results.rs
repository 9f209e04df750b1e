//! Persistencia de `ResultRecord`: JSON lines por directorio de tarea.
//!
//! Los records son inmutables una vez escritos; el collector los relee
//! on-demand para recomputar el ranking.

use std::fs;
use std::io::Write;
use std::path::Path;

use dock_core::CoreError;
use dock_domain::ResultRecord;

pub const RESULTS_FILENAME: &str = "results.jsonl";

/// Escribe todos los records de una tarea de una vez (temp + rename, como
/// cualquier otra escritura visible del store).
pub fn write_result_records(task_out_dir: &Path, records: &[ResultRecord]) -> Result<(), CoreError> {
    fs::create_dir_all(task_out_dir)?;
    let path = task_out_dir.join(RESULTS_FILENAME);
    let tmp = task_out_dir.join(format!(".{RESULTS_FILENAME}.tmp-{}", uuid::Uuid::new_v4().simple()));
    let mut buffer = Vec::new();
    for rec in records {
        let line = serde_json::to_string(rec).map_err(|e| CoreError::Store(format!("serialize result: {e}")))?;
        writeln!(buffer, "{line}")?;
    }
    fs::write(&tmp, buffer)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Lee los records de una tarea. `Ok(None)` si el archivo no existe (salida
/// faltante: el collector lo reporta como incompleto, no es un error del
/// orquestador).
pub fn read_result_records(task_out_dir: &Path) -> Result<Option<Vec<ResultRecord>>, CoreError> {
    let path = task_out_dir.join(RESULTS_FILENAME);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let rec = serde_json::from_str(line).map_err(|e| CoreError::Store(format!("malformed result in {}: {e}",
                                                                                  path.display())))?;
        out.push(rec);
    }
    Ok(Some(out))
}

/// Recorre la vista de generación vigente y separa los resultados legibles
/// de los batches incompletos (no completados, o con salida faltante o
/// corrupta). La salida inutilizable se reporta, nunca aborta el collect.
pub fn gather_results(layout: &crate::layout::CampaignLayout,
                      latest: &std::collections::BTreeMap<usize, dock_domain::TaskRecord>,
                      total_batches: usize)
                      -> (Vec<(usize, Vec<ResultRecord>)>, Vec<usize>) {
    use dock_domain::TaskState;
    use tracing::warn;

    let mut per_batch = Vec::new();
    let mut incomplete = Vec::new();
    for batch in 0..total_batches {
        match latest.get(&batch) {
            Some(rec) if rec.state == TaskState::Completed => {
                match read_result_records(&layout.task_out_dir(&rec.key)) {
                    Ok(Some(records)) => per_batch.push((batch, records)),
                    Ok(None) => {
                        warn!("batch {batch} completado pero sin archivo de resultados");
                        incomplete.push(batch);
                    }
                    Err(e) => {
                        warn!("batch {batch}: {e}");
                        incomplete.push(batch);
                    }
                }
            }
            _ => incomplete.push(batch),
        }
    }
    (per_batch, incomplete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_roundtrip_and_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let task_dir = dir.path().join("b00000000.g001");
        assert!(read_result_records(&task_dir).unwrap().is_none());

        let records = vec![ResultRecord { ligand_id: "lig1".into(),
                                          score: 61.2,
                                          pose_file: "output/sol_lig1.mol2".into() }];
        write_result_records(&task_dir, &records).unwrap();
        let loaded = read_result_records(&task_dir).unwrap().unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn malformed_line_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let task_dir = dir.path().join("b00000001.g001");
        fs::create_dir_all(&task_dir).unwrap();
        fs::write(task_dir.join(RESULTS_FILENAME), "not json\n").unwrap();
        assert!(read_result_records(&task_dir).is_err());
    }
}
