pub mod collect;
pub mod resume;
pub mod status;
pub mod stop;
pub mod submit;
pub mod timing;
pub mod worker;

use std::path::Path;

use dock_core::{CampaignConfig, CoreError};
use dock_persistence::CampaignLayout;

/// Carga la configuración y deriva el layout compartido.
pub fn load(config_path: &Path) -> Result<(CampaignConfig, CampaignLayout), CoreError> {
    let cfg = CampaignConfig::load(config_path)?;
    let layout = CampaignLayout::new(cfg.paths.root());
    Ok((cfg, layout))
}

/// Patrón de logs por tarea dentro de `out/` (`%A` job id, `%a` índice).
pub fn output_pattern(cfg: &CampaignConfig, layout: &CampaignLayout) -> String {
    format!("{}/{}_%A_%a.out", layout.out_dir().display(), cfg.scheduler.job_name)
}
