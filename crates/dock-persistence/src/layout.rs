//! Layout on-disk de una campaña bajo la raíz compartida.
//!
//! ```text
//! <root>/in/                      archivos de batch (uno por índice)
//! <root>/out/<b,g>/               salida cruda del engine por generación
//! <root>/state/campaign.json      metadata de la campaña vigente
//! <root>/state/<campaign>/        un record JSON por generación de tarea
//! <root>/state/<campaign>/jobarrays.json
//! ```
//!
//! Todas las rutas derivan de la raíz; nada acá se edita por separado.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use dock_domain::{Batch, Campaign, TaskKey};

use dock_core::CoreError;

#[derive(Debug, Clone)]
pub struct CampaignLayout {
    root: PathBuf,
}

impl CampaignLayout {
    pub fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn in_dir(&self) -> PathBuf {
        self.root.join("in")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn campaign_file(&self) -> PathBuf {
        self.state_dir().join("campaign.json")
    }

    pub fn campaign_state_dir(&self, campaign: Uuid) -> PathBuf {
        self.state_dir().join(campaign.to_string())
    }

    pub fn record_path(&self, key: &TaskKey) -> PathBuf {
        self.campaign_state_dir(key.campaign).join(key.record_name())
    }

    pub fn job_arrays_file(&self, campaign: Uuid) -> PathBuf {
        self.campaign_state_dir(campaign).join("jobarrays.json")
    }

    pub fn submit_lock_file(&self, campaign: Uuid) -> PathBuf {
        self.campaign_state_dir(campaign).join("submit.lock")
    }

    pub fn archive_path(&self, batch_index: usize) -> PathBuf {
        self.in_dir().join(Batch::archive_name(batch_index))
    }

    pub fn manifest_path(&self, batch_index: usize) -> PathBuf {
        self.in_dir().join(Batch::manifest_name(batch_index))
    }

    /// Directorio de salida de una generación de tarea; lo fija el
    /// orquestador, nunca la configuración del engine.
    pub fn task_out_dir(&self, key: &TaskKey) -> PathBuf {
        self.out_dir().join(key.output_dir_name())
    }

    pub fn ranking_file(&self) -> PathBuf {
        self.out_dir().join("bestranking.lst")
    }

    pub fn poses_dir(&self) -> PathBuf {
        self.out_dir().join("poses")
    }

    /// Crea los directorios base de la campaña.
    pub fn ensure(&self, campaign: Uuid) -> Result<(), CoreError> {
        std::fs::create_dir_all(self.in_dir())?;
        std::fs::create_dir_all(self.out_dir())?;
        std::fs::create_dir_all(self.campaign_state_dir(campaign))?;
        Ok(())
    }

    /// Persiste la metadata de la campaña vigente.
    pub fn save_campaign(&self, campaign: &Campaign) -> Result<(), CoreError> {
        std::fs::create_dir_all(self.state_dir())?;
        crate::fs_store::atomic_write_json(&self.campaign_file(), campaign)
    }

    /// Cantidad de batches staged: el `in/` es el registro durable de la
    /// partición (un manifest por índice).
    pub fn staged_batch_count(&self) -> Result<usize, CoreError> {
        let entries = match std::fs::read_dir(self.in_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut count = 0usize;
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("batch_") && name.ends_with(".manifest.json") {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Resuelve la campaña vigente desde la raíz compartida.
    pub fn load_campaign(&self) -> Result<Campaign, CoreError> {
        let raw = std::fs::read_to_string(self.campaign_file()).map_err(|e| {
                      CoreError::Store(format!("no campaign at {} ({e}); run submit first",
                                               self.campaign_file().display()))
                  })?;
        serde_json::from_str(&raw).map_err(|e| CoreError::Store(format!("corrupt campaign.json: {e}")))
    }
}
