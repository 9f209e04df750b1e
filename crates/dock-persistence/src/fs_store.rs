//! Implementación durable de `StateStore`/`JobArrayStore` sobre el
//! filesystem compartido.
//!
//! Cada record es un archivo JSON con nombre determinista por clave
//! (batch, generación). La escritura es write-to-temp + `rename` dentro del
//! mismo directorio: un lector nunca observa un record a medio escribir.
//! No hay locking por tarea (los escritores nunca comparten clave); el único
//! lock es el de submission, que serializa el acceso a la lista de job
//! arrays.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use dock_core::{CoreError, JobArrayStore, PendingGroup, StateStore};
use dock_domain::{JobArray, TaskKey, TaskRecord};

use crate::layout::CampaignLayout;

/// Escritura atómica: serializa a `<path>.tmp-<uuid>` y renombra sobre el
/// destino. `rename` es atómico dentro del mismo filesystem, que es el caso
/// por construcción (mismo directorio).
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    let parent = path.parent().ok_or_else(|| CoreError::Store(format!("no parent dir for {}", path.display())))?;
    fs::create_dir_all(parent)?;
    let tmp = parent.join(format!(".{}.tmp-{}",
                                  path.file_name().and_then(|n| n.to_str()).unwrap_or("record"),
                                  Uuid::new_v4().simple()));
    let body = serde_json::to_vec_pretty(value).map_err(|e| CoreError::Store(format!("serialize: {e}")))?;
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&raw).map(Some)
                              .map_err(|e| CoreError::Store(format!("corrupt record {}: {e}", path.display())))
}

/// Índice de job arrays más la cola de grupos pendientes, persistidos juntos
/// y reemplazados atómicamente.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct JobArrayIndex {
    job_arrays: Vec<JobArray>,
    queue: Vec<PendingGroup>,
}

pub struct FsCampaignStore {
    layout: CampaignLayout,
}

impl FsCampaignStore {
    pub fn new(layout: CampaignLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &CampaignLayout {
        &self.layout
    }

    fn load_index(&self, campaign: Uuid) -> Result<JobArrayIndex, CoreError> {
        Ok(read_json(&self.layout.job_arrays_file(campaign))?.unwrap_or_default())
    }

    fn save_index(&self, campaign: Uuid, index: &JobArrayIndex) -> Result<(), CoreError> {
        atomic_write_json(&self.layout.job_arrays_file(campaign), index)
    }
}

impl StateStore for FsCampaignStore {
    fn put(&mut self, record: &TaskRecord) -> Result<(), CoreError> {
        atomic_write_json(&self.layout.record_path(&record.key), record)
    }

    fn get(&self, key: &TaskKey) -> Result<Option<TaskRecord>, CoreError> {
        read_json(&self.layout.record_path(key))
    }

    fn list(&self, campaign: Uuid) -> Result<Vec<TaskRecord>, CoreError> {
        let dir = self.layout.campaign_state_dir(campaign);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            // Sólo records de tarea (b########.g###.json); índices y
            // temporales se saltean.
            if !(name.starts_with('b') && name.ends_with(".json") && name.contains(".g")) {
                continue;
            }
            match read_json::<TaskRecord>(&path)? {
                Some(rec) => out.push(rec),
                None => warn!("record desapareció durante el listado: {}", path.display()),
            }
        }
        out.sort_by_key(|r| (r.key.batch_index, r.key.generation));
        Ok(out)
    }
}

impl JobArrayStore for FsCampaignStore {
    fn append_job_array(&mut self, campaign: Uuid, job_array: &JobArray) -> Result<(), CoreError> {
        let mut index = self.load_index(campaign)?;
        index.job_arrays.push(job_array.clone());
        self.save_index(campaign, &index)
    }

    fn list_job_arrays(&self, campaign: Uuid) -> Result<Vec<JobArray>, CoreError> {
        Ok(self.load_index(campaign)?.job_arrays)
    }

    fn replace_queue(&mut self, campaign: Uuid, queue: &[PendingGroup]) -> Result<(), CoreError> {
        let mut index = self.load_index(campaign)?;
        index.queue = queue.to_vec();
        self.save_index(campaign, &index)
    }

    fn queued_groups(&self, campaign: Uuid) -> Result<Vec<PendingGroup>, CoreError> {
        Ok(self.load_index(campaign)?.queue)
    }
}

/// Lock de submission: serializa las escrituras a la lista de job arrays
/// para que dos submits concurrentes no asignen rangos solapados. Se toma
/// con `create_new` (falla si existe) y se libera en el drop.
pub struct SubmissionLock {
    path: PathBuf,
}

impl SubmissionLock {
    pub fn acquire(layout: &CampaignLayout, campaign: Uuid) -> Result<Self, CoreError> {
        let path = layout.submit_lock_file(campaign);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(CoreError::Store(format!("another submission holds the lock at {} (remove it if the owner died)",
                                             path.display())))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SubmissionLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("no se pudo liberar el lock {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dock_core::latest_generation;
    use dock_domain::TaskState;

    fn store() -> (tempfile::TempDir, FsCampaignStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = CampaignLayout::new(dir.path());
        (dir, FsCampaignStore::new(layout))
    }

    #[test]
    fn put_then_get_roundtrip() {
        let (_dir, mut store) = store();
        let campaign = Uuid::new_v4();
        let rec = TaskRecord::queued(TaskKey::new(campaign, 7, 2), "91001", 8);
        store.put(&rec).unwrap();
        let loaded = store.get(&rec.key).unwrap().unwrap();
        assert_eq!(loaded.key, rec.key);
        assert_eq!(loaded.state, TaskState::Queued);
    }

    #[test]
    fn put_is_create_or_replace_per_key() {
        let (_dir, mut store) = store();
        let campaign = Uuid::new_v4();
        let rec = TaskRecord::queued(TaskKey::new(campaign, 0, 1), "91001", 1);
        store.put(&rec).unwrap();
        let running = rec.transitioned(TaskState::Running).unwrap();
        store.put(&running).unwrap();
        let loaded = store.get(&rec.key).unwrap().unwrap();
        assert_eq!(loaded.state, TaskState::Running);
        // Una sola entrada para la clave, no un append
        assert_eq!(store.list(campaign).unwrap().len(), 1);
    }

    #[test]
    fn list_returns_all_generations_sorted() {
        let (_dir, mut store) = store();
        let campaign = Uuid::new_v4();
        for (batch, generation) in [(1usize, 1u32), (0, 2), (0, 1)] {
            store.put(&TaskRecord::queued(TaskKey::new(campaign, batch, generation), "91001", batch + 1))
                 .unwrap();
        }
        let listed = store.list(campaign).unwrap();
        let keys: Vec<(usize, u32)> = listed.iter().map(|r| (r.key.batch_index, r.key.generation)).collect();
        assert_eq!(keys, vec![(0, 1), (0, 2), (1, 1)]);
        // La vista de generación vigente toma la más alta
        let latest = latest_generation(&listed);
        assert_eq!(latest[&0].key.generation, 2);
    }

    #[test]
    fn no_temp_files_survive_a_put() {
        let (_dir, mut store) = store();
        let campaign = Uuid::new_v4();
        store.put(&TaskRecord::queued(TaskKey::new(campaign, 0, 1), "91001", 1)).unwrap();
        let dir = store.layout().campaign_state_dir(campaign);
        let leftovers: Vec<_> = std::fs::read_dir(dir).unwrap()
                                                      .filter_map(|e| e.ok())
                                                      .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
                                                      .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn job_array_index_and_queue_roundtrip() {
        let (_dir, mut store) = store();
        let campaign = Uuid::new_v4();
        let ja = JobArray { job_id: "91001".into(),
                            batches: vec![0, 1],
                            throttle: 2,
                            submitted_at: chrono::Utc::now() };
        store.append_job_array(campaign, &ja).unwrap();
        store.replace_queue(campaign, &[PendingGroup { batches: vec![2] }]).unwrap();
        assert_eq!(store.list_job_arrays(campaign).unwrap().len(), 1);
        assert_eq!(store.queued_groups(campaign).unwrap(), vec![PendingGroup { batches: vec![2] }]);
    }

    #[test]
    fn submission_lock_excludes_second_holder() {
        let (_dir, store) = store();
        let campaign = Uuid::new_v4();
        let lock = SubmissionLock::acquire(store.layout(), campaign).unwrap();
        assert!(SubmissionLock::acquire(store.layout(), campaign).is_err());
        drop(lock);
        // Liberado en el drop: se puede volver a tomar
        assert!(SubmissionLock::acquire(store.layout(), campaign).is_ok());
    }
}
