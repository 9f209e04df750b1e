//! Carga y validación de la configuración de campaña (`cluster.toml`).
//!
//! Toda opción reconocida está enumerada acá y se chequea en el load; claves
//! desconocidas se rechazan en lugar de ignorarse en silencio. Los
//! subdirectorios de entrada/salida derivan siempre de `shared_root` y no se
//! editan por separado.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dock_domain::ScoreDirection;

use crate::errors::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignConfig {
    pub engine: EngineSection,
    pub paths: PathsSection,
    pub scheduler: SchedulerSection,
}

/// Sección `[engine]`: inputs del docking y del licenciamiento.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Archivo o directorio de ligandos (sdf/mol2).
    pub ligand_path: String,
    pub batch_size: usize,
    /// String de configuración de licencia; el segundo campo (separado por
    /// `;`) debe ser el endpoint http del servidor.
    pub licensing: String,
    /// Ejecutable del engine de docking.
    pub command: String,
    /// Template de configuración del engine, con campos de reemplazo
    /// `{ligand_data_file}` (y receptor/cavity si se pasan por separado).
    pub conf_template: String,
    #[serde(default)]
    pub receptor: Option<String>,
    #[serde(default)]
    pub cavity: Option<String>,
    /// Dirección explícita del ranking; nunca se infiere de los datos.
    #[serde(default = "default_score_direction")]
    pub score_direction: ScoreDirection,
    #[serde(default = "default_log_level")]
    pub log_level: u8,
}

fn default_score_direction() -> ScoreDirection {
    ScoreDirection::Descending
}

fn default_log_level() -> u8 {
    1
}

/// Sección `[paths]`: sólo la raíz compartida; `in/`, `out/` y `state/`
/// derivan de ella.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    pub shared_root: String,
}

impl PathsSection {
    pub fn root(&self) -> &Path {
        Path::new(&self.shared_root)
    }

    pub fn in_dir(&self) -> PathBuf {
        self.root().join("in")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root().join("out")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root().join("state")
    }
}

/// Sección `[scheduler]`: opciones de submission y supervisión.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    pub job_name: String,
    pub account: String,
    pub partition: String,
    /// Límite de wall-clock por tarea, formato del scheduler (HH:MM:SS).
    pub time_limit: String,
    #[serde(default = "default_nodes")]
    pub nodes: usize,
    pub max_array_size: usize,
    pub max_running_tasks: usize,
    /// Opciones extra pasadas tal cual al submit.
    #[serde(default)]
    pub extra_options: Vec<String>,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Umbral a partir del cual un Running sin latido se considera stale.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_nodes() -> usize {
    1
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_stale_after_secs() -> u64 {
    600
}

impl CampaignConfig {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        let cfg: CampaignConfig =
            toml::from_str(&raw).map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Chequeos de rangos y preflight de licencia. Se corren siempre en el
    /// load, antes de que nada quede parcialmente iniciado.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.engine.batch_size == 0 {
            return Err(CoreError::Config("engine.batch_size must be positive".into()));
        }
        if self.scheduler.max_array_size == 0 {
            return Err(CoreError::Config("scheduler.max_array_size must be positive".into()));
        }
        if self.scheduler.max_running_tasks == 0 {
            return Err(CoreError::Config("scheduler.max_running_tasks must be positive".into()));
        }
        if self.paths.shared_root.is_empty() {
            return Err(CoreError::Config("paths.shared_root must not be empty".into()));
        }
        if self.scheduler.stale_after_secs <= self.scheduler.heartbeat_secs {
            return Err(CoreError::Config("scheduler.stale_after_secs must exceed heartbeat_secs".into()));
        }
        // El string de licencia lleva el endpoint en el segundo campo.
        let mut fields = self.engine.licensing.split(';');
        let url = fields.nth(1).unwrap_or("");
        if !url.starts_with("http://") {
            return Err(CoreError::Config("engine.licensing: license server url missing \"http://\"".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> String {
        r#"
[engine]
ligand_path = "ligands.sdf"
batch_size = 2000
licensing = "lmgrd;http://license.example.org:8080;"
command = "gold_auto"
conf_template = "gold.conf"

[paths]
shared_root = "/shared/dock"

[scheduler]
job_name = "dock"
account = "chem"
partition = "batch"
time_limit = "02:00:00"
max_array_size = 1000
max_running_tasks = 50
"#
        .to_string()
    }

    fn load_from_str(s: &str) -> Result<CampaignConfig, CoreError> {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(s.as_bytes()).unwrap();
        CampaignConfig::load(f.path())
    }

    #[test]
    fn loads_valid_config_with_defaults() {
        let cfg = load_from_str(&sample_toml()).unwrap();
        assert_eq!(cfg.engine.batch_size, 2000);
        assert_eq!(cfg.engine.score_direction, ScoreDirection::Descending);
        assert_eq!(cfg.scheduler.nodes, 1);
        assert_eq!(cfg.paths.in_dir(), PathBuf::from("/shared/dock/in"));
        assert_eq!(cfg.paths.state_dir(), PathBuf::from("/shared/dock/state"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let s = sample_toml().replace("[scheduler]", "[scheduler]\nfair_share = true");
        assert!(matches!(load_from_str(&s), Err(CoreError::Config(_))));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let s = sample_toml().replace("batch_size = 2000", "batch_size = 0");
        assert!(matches!(load_from_str(&s), Err(CoreError::Config(_))));
    }

    #[test]
    fn rejects_license_without_http_endpoint() {
        let s = sample_toml().replace("lmgrd;http://license.example.org:8080;", "lmgrd;license.example.org;");
        let err = load_from_str(&s).unwrap_err();
        assert!(err.to_string().contains("http://"), "{err}");
    }
}
