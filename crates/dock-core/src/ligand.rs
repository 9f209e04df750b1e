//! Partición de archivos de ligandos en estructuras individuales.
//!
//! Los formatos soportados son multi-estructura: SDF delimitado por `$$$$`
//! y MOL2 delimitado por `@<TRIPOS>MOLECULE`. El orden de aparición en el
//! input es el orden canónico de la campaña.

use std::path::{Path, PathBuf};

use crate::errors::CoreError;

const SDF_DELIMITER: &str = "$$$$";
const MOL2_DELIMITER: &str = "@<TRIPOS>MOLECULE";

/// Una estructura individual extraída del input, con su texto original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigandStructure {
    /// Identificador del ligando: la línea de título si existe, si no
    /// `archivo!ordinal`.
    pub id: String,
    pub text: String,
}

/// Divide el contenido de un archivo SDF en estructuras. El título es la
/// primera línea de cada bloque.
pub fn split_sdf_text(source_name: &str, content: &str) -> Vec<LigandStructure> {
    let mut out = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in content.lines() {
        block.push(line);
        if line.trim_end() == SDF_DELIMITER {
            push_block(&mut out, source_name, &block, 0);
            block.clear();
        }
    }
    // Resto sin delimitador final: también cuenta como estructura
    if block.iter().any(|l| !l.trim().is_empty()) {
        push_block(&mut out, source_name, &block, 0);
    }
    out
}

/// Divide el contenido de un archivo MOL2. No hay terminador: cada
/// `@<TRIPOS>MOLECULE` abre una estructura nueva y el título es la línea
/// siguiente.
pub fn split_mol2_text(source_name: &str, content: &str) -> Vec<LigandStructure> {
    let mut out = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in content.lines() {
        if line.trim_end() == MOL2_DELIMITER && !block.is_empty() {
            push_block(&mut out, source_name, &block, 1);
            block.clear();
        }
        block.push(line);
    }
    if !block.is_empty() {
        push_block(&mut out, source_name, &block, 1);
    }
    out
}

fn push_block(out: &mut Vec<LigandStructure>, source_name: &str, block: &[&str], title_line: usize) {
    let ordinal = out.len();
    let title = block.get(title_line).map(|l| l.trim()).unwrap_or("");
    let id = if title.is_empty() {
        format!("{source_name}!{ordinal}")
    } else {
        title.to_string()
    };
    let mut text = block.join("\n");
    text.push('\n');
    out.push(LigandStructure { id, text });
}

/// Lee las estructuras de un archivo o de un directorio (recorrido en orden
/// alfabético, recursivo), despachando por extensión.
pub fn read_structures(path: &Path) -> Result<Vec<LigandStructure>, CoreError> {
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        gather_sorted(path, &mut files)?;
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        return Err(CoreError::Config(format!("{} not found; specify a ligand file or a directory of ligands",
                                             path.display())));
    }

    let mut all = Vec::new();
    for file in files {
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or("ligands").to_string();
        let content = std::fs::read_to_string(&file)?;
        match ext {
            "sdf" | "sd" => all.extend(split_sdf_text(&name, &content)),
            "mol2" => all.extend(split_mol2_text(&name, &content)),
            _ => continue, // otros archivos en el directorio se ignoran
        }
    }
    Ok(all)
}

fn gather_sorted(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), CoreError> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?.filter_map(|e| e.ok().map(|e| e.path())).collect();
    entries.sort();
    for entry in entries {
        if entry.is_dir() {
            gather_sorted(&entry, out)?;
        } else {
            out.push(entry);
        }
    }
    Ok(())
}
