//! `collect`: junta los `ResultRecord` de las tareas completadas en un
//! ranking global ordenado.
//!
//! Los batches sin salida utilizable se excluyen y se listan aparte: el
//! ranking parcial no es un error, la campaña sigue siendo resumible.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{info, warn};

use dock_core::{latest_generation, CollectReport, CoreError, StateStore};
use dock_persistence::{gather_results, FsCampaignStore};

pub fn run(config_path: &Path, materialize_poses: bool) -> Result<ExitCode, CoreError> {
    let (cfg, layout) = super::load(config_path)?;
    let campaign = layout.load_campaign()?;
    let store = FsCampaignStore::new(layout.clone());
    let total_batches = layout.staged_batch_count()?;
    let latest = latest_generation(&store.list(campaign.id)?);

    let (per_batch, incomplete) = gather_results(&layout, &latest, total_batches);
    let report = CollectReport::build(per_batch, incomplete, cfg.engine.score_direction);
    let ranking_file = layout.ranking_file();
    std::fs::create_dir_all(layout.out_dir())?;
    std::fs::write(&ranking_file, report.ranking.render())?;
    info!("ranking de {} resultados escrito en {}", report.ranking.entries.len(), ranking_file.display());

    if materialize_poses {
        materialize(&report, &layout.poses_dir())?;
    }

    println!("{} results ranked ({} direction) from {} completed batches",
             report.ranking.entries.len(),
             match cfg.engine.score_direction {
                 dock_domain::ScoreDirection::Ascending => "ascending",
                 dock_domain::ScoreDirection::Descending => "descending",
             },
             report.completed_batches.len());
    if report.is_partial() {
        println!("incomplete — {} batches: {:?}", report.incomplete_batches.len(), report.incomplete_batches);
    }
    Ok(ExitCode::SUCCESS)
}

/// Copia cada pose al directorio de resultados, nombrada por su rank.
fn materialize(report: &CollectReport, poses_dir: &PathBuf) -> Result<(), CoreError> {
    std::fs::create_dir_all(poses_dir)?;
    for (rank, rec) in report.ranking.entries.iter().enumerate() {
        let src = Path::new(&rec.pose_file);
        if !src.is_file() {
            warn!("pose de {} no encontrada: {}", rec.ligand_id, rec.pose_file);
            continue;
        }
        let ext = src.extension().and_then(|e| e.to_str()).unwrap_or("mol2");
        let dest = poses_dir.join(format!("rank_{:06}_{}.{ext}", rank + 1, rec.ligand_id));
        std::fs::copy(src, dest)?;
    }
    Ok(())
}
