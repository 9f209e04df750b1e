//! Staging de batches: un tar.gz autocontenido por batch más su manifest.
//!
//! Cada archivo contiene el archivo de ligandos del batch, la configuración
//! del engine con los campos de reemplazo sustituidos y los archivos
//! auxiliares (receptor, cavidad). El staging es idempotente: un batch cuyo
//! manifest ya existe con el mismo fingerprint se saltea sin tocar el
//! archivo; un manifest con membresía distinta es un `InputConflict`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use dock_core::{BatchManifest, CoreError, PlannedBatch};
use dock_domain::Batch;

use crate::fs_store::atomic_write_json;
use crate::layout::CampaignLayout;

/// Insumos fijos del staging, compartidos por todos los batches.
#[derive(Debug, Clone)]
pub struct StagingInputs {
    /// Template de configuración del engine con campos `{...}`.
    pub conf_template: PathBuf,
    pub receptor: Option<PathBuf>,
    pub cavity: Option<PathBuf>,
    /// Extensión del archivo de ligandos dentro del batch (sdf/mol2).
    pub ligand_ext: String,
}

/// Escribe (o saltea) el archivo de un batch y devuelve su descriptor.
pub fn stage_batch(layout: &CampaignLayout, plan: &PlannedBatch, inputs: &StagingInputs) -> Result<Batch, CoreError> {
    fs::create_dir_all(layout.in_dir())?;
    let archive_path = layout.archive_path(plan.index);
    let manifest_path = layout.manifest_path(plan.index);

    if let Some(existing) = read_manifest(&manifest_path)? {
        if existing.fingerprint != plan.fingerprint {
            return Err(CoreError::InputConflict { batch: plan.index,
                                                  detail: format!("existing archive holds {} members with fingerprint {}, recomputed fingerprint is {}",
                                                                  existing.member_count,
                                                                  existing.fingerprint,
                                                                  plan.fingerprint) });
        }
        if archive_path.is_file() {
            debug!("batch {} sin cambios, se saltea el staging", plan.index);
            return Ok(batch_descriptor(plan, &archive_path));
        }
        // Manifest presente pero archivo perdido: se reconstruye
    }

    let conf = render_engine_conf(plan.index, inputs)?;
    write_archive(&archive_path, plan, inputs, &conf)?;
    atomic_write_json(&manifest_path, &plan.manifest())?;
    info!("batch {} staged: {} ligandos en {}", plan.index, plan.members.len(), archive_path.display());
    Ok(batch_descriptor(plan, &archive_path))
}

fn batch_descriptor(plan: &PlannedBatch, archive_path: &Path) -> Batch {
    Batch { index: plan.index,
            member_count: plan.members.len(),
            archive: archive_path.display().to_string(),
            fingerprint: plan.fingerprint.clone() }
}

fn read_manifest(path: &Path) -> Result<Option<BatchManifest>, CoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&raw).map(Some)
                              .map_err(|e| CoreError::Store(format!("corrupt manifest {}: {e}", path.display())))
}

/// Sustituye los campos de reemplazo del template y fija el directorio de
/// salida del engine a `output` (la ruta real la decide el orquestador, no
/// la configuración del engine).
fn render_engine_conf(batch_index: usize, inputs: &StagingInputs) -> Result<String, CoreError> {
    let template = fs::read_to_string(&inputs.conf_template).map_err(|e| {
                       CoreError::Config(format!("cannot read conf template {}: {e}",
                                                 inputs.conf_template.display()))
                   })?;
    if !template.contains("{ligand_data_file}") {
        return Err(CoreError::Config("the '{ligand_data_file}' replacement field is missing from the engine conf template".into()));
    }
    if inputs.receptor.is_some()
       && !(template.contains("{protein_data_file}") && template.contains("{cavity_data_file}"))
    {
        return Err(CoreError::Config("the engine conf template is missing the '{protein_data_file}'/'{cavity_data_file}' replacement fields".into()));
    }

    let ligand_file = ligand_file_name(batch_index, &inputs.ligand_ext);
    let mut conf = template.replace("{ligand_data_file}", &ligand_file);
    if let Some(receptor) = &inputs.receptor {
        conf = conf.replace("{protein_data_file}", &base_name(receptor));
    }
    if let Some(cavity) = &inputs.cavity {
        conf = conf.replace("{cavity_data_file}", &base_name(cavity));
    }
    let rewritten: Vec<String> = conf.lines()
                                     .map(|line| {
                                         let t = line.trim_start();
                                         if t.starts_with("directory") && t.contains('=') {
                                             "directory = output".to_string()
                                         } else {
                                             line.to_string()
                                         }
                                     })
                                     .collect();
    Ok(rewritten.join("\n") + "\n")
}

fn ligand_file_name(batch_index: usize, ext: &str) -> String {
    format!("batch_{batch_index:08}.{ext}")
}

fn base_name(path: &Path) -> String {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string()
}

/// Arma el tar.gz con headers fijos (mtime 0, modo 0644) para que el mismo
/// input produzca bytes idénticos entre corridas.
fn write_archive(archive_path: &Path,
                 plan: &PlannedBatch,
                 inputs: &StagingInputs,
                 conf: &str)
                 -> Result<(), CoreError> {
    let file = fs::File::create(archive_path)?;
    let encoder = GzEncoder::new(file, Compression::fast());
    let mut builder = tar::Builder::new(encoder);

    let mut ligand_data = String::new();
    for member in &plan.members {
        ligand_data.push_str(&member.text);
    }
    append_bytes(&mut builder, &ligand_file_name(plan.index, &inputs.ligand_ext), ligand_data.as_bytes())?;
    append_bytes(&mut builder, &base_name(&inputs.conf_template), conf.as_bytes())?;
    for aux in [&inputs.receptor, &inputs.cavity].into_iter().flatten() {
        let bytes = fs::read(aux).map_err(|e| CoreError::Config(format!("cannot read {}: {e}", aux.display())))?;
        append_bytes(&mut builder, &base_name(aux), &bytes)?;
    }

    let encoder = builder.into_inner().map_err(CoreError::Io)?;
    let mut file = encoder.finish().map_err(CoreError::Io)?;
    file.flush()?;
    Ok(())
}

fn append_bytes<W: Write>(builder: &mut tar::Builder<W>, name: &str, bytes: &[u8]) -> Result<(), CoreError> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder.append_data(&mut header, name, bytes).map_err(CoreError::Io)
}

/// Desempaqueta el archivo de un batch en el área de trabajo privada del
/// worker.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<(), CoreError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    fs::create_dir_all(dest)?;
    archive.unpack(dest).map_err(CoreError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dock_core::{partition, LigandStructure};

    fn ligands(n: usize) -> Vec<LigandStructure> {
        (0..n).map(|i| LigandStructure { id: format!("lig{i:03}"),
                                         text: format!("lig{i:03}\nM  END\n$$$$\n") })
              .collect()
    }

    fn setup(dir: &Path) -> (CampaignLayout, StagingInputs) {
        let conf = dir.join("engine.conf");
        fs::write(&conf, "ligand_data_file = {ligand_data_file}\ndirectory = /tmp/elsewhere\n").unwrap();
        let layout = CampaignLayout::new(&dir.join("shared"));
        (layout,
         StagingInputs { conf_template: conf,
                         receptor: None,
                         cavity: None,
                         ligand_ext: "sdf".to_string() })
    }

    #[test]
    fn stage_extract_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, inputs) = setup(dir.path());
        let plan = &partition(ligands(5), 5).unwrap()[0];
        let batch = stage_batch(&layout, plan, &inputs).unwrap();
        assert_eq!(batch.member_count, 5);

        let work = dir.path().join("work");
        extract_archive(Path::new(&batch.archive), &work).unwrap();
        let ligand_file = work.join("batch_00000000.sdf");
        let conf_file = work.join("engine.conf");
        assert!(ligand_file.is_file());
        let conf = fs::read_to_string(conf_file).unwrap();
        assert!(conf.contains("ligand_data_file = batch_00000000.sdf"));
        // El directorio de salida del engine queda fijado por el orquestador
        assert!(conf.contains("directory = output"));
        assert!(!conf.contains("/tmp/elsewhere"));
        let data = fs::read_to_string(ligand_file).unwrap();
        assert_eq!(data.matches("$$$$").count(), 5);
    }

    #[test]
    fn restaging_identical_input_is_skipped_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, inputs) = setup(dir.path());
        let plan = &partition(ligands(3), 3).unwrap()[0];
        let first = stage_batch(&layout, plan, &inputs).unwrap();
        let bytes_before = fs::read(&first.archive).unwrap();
        let second = stage_batch(&layout, plan, &inputs).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(bytes_before, fs::read(&second.archive).unwrap());
    }

    #[test]
    fn mismatched_existing_membership_is_an_input_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, inputs) = setup(dir.path());
        let plan = &partition(ligands(3), 3).unwrap()[0];
        stage_batch(&layout, plan, &inputs).unwrap();

        // Mismo índice de batch, membresía distinta
        let other = &partition(ligands(4), 4).unwrap()[0];
        let err = stage_batch(&layout, other, &inputs).unwrap_err();
        assert!(matches!(err, CoreError::InputConflict { batch: 0, .. }), "{err}");
    }

    #[test]
    fn template_without_replacement_field_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, mut inputs) = setup(dir.path());
        fs::write(&inputs.conf_template, "no fields here\n").unwrap();
        inputs.ligand_ext = "sdf".into();
        let plan = &partition(ligands(1), 1).unwrap()[0];
        assert!(matches!(stage_batch(&layout, plan, &inputs), Err(CoreError::Config(_))));
    }
}
