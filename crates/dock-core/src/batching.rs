//! Partición determinista de la lista de ligandos en batches.
//!
//! La partición es pura: mismo input y mismo `batch_size` producen siempre
//! los mismos límites y los mismos fingerprints de membresía. El staging a
//! disco (tar.gz + manifest) vive en `dock-persistence`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::hashing::membership_fingerprint;
use crate::ligand::LigandStructure;

/// Un batch planificado: slice contiguo de la lista de ligandos.
#[derive(Debug, Clone)]
pub struct PlannedBatch {
    pub index: usize,
    pub members: Vec<LigandStructure>,
    pub fingerprint: String,
}

impl PlannedBatch {
    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    /// Manifest serializable del batch (sidecar del archivo tar.gz).
    pub fn manifest(&self) -> BatchManifest {
        let mut members = IndexMap::new();
        for (i, m) in self.members.iter().enumerate() {
            members.insert(m.id.clone(), i);
        }
        BatchManifest { batch_index: self.index,
                        member_count: self.members.len(),
                        fingerprint: self.fingerprint.clone(),
                        members }
    }
}

/// Membresía persistida junto al archivo del batch. `members` preserva el
/// orden de inserción (id -> posición dentro del batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub batch_index: usize,
    pub member_count: usize,
    pub fingerprint: String,
    pub members: IndexMap<String, usize>,
}

/// Particiona la lista ordenada en batches de a lo sumo `batch_size`
/// miembros. Produce `ceil(N/B)` batches; el último carga el resto (1..B).
pub fn partition(structures: Vec<LigandStructure>, batch_size: usize) -> Result<Vec<PlannedBatch>, CoreError> {
    if batch_size == 0 {
        return Err(CoreError::Config("batch size must be positive".into()));
    }
    if structures.is_empty() {
        return Err(CoreError::Config("ligand input list is empty".into()));
    }
    let mut batches = Vec::with_capacity(structures.len().div_ceil(batch_size));
    let mut members = Vec::with_capacity(batch_size.min(structures.len()));
    for s in structures {
        members.push(s);
        if members.len() == batch_size {
            batches.push(seal(batches.len(), std::mem::take(&mut members)));
        }
    }
    if !members.is_empty() {
        batches.push(seal(batches.len(), members));
    }
    Ok(batches)
}

fn seal(index: usize, members: Vec<LigandStructure>) -> PlannedBatch {
    let ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
    let fingerprint = membership_fingerprint(&ids);
    PlannedBatch { index, members, fingerprint }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ligands(n: usize) -> Vec<LigandStructure> {
        (0..n).map(|i| LigandStructure { id: format!("lig{i:05}"),
                                         text: format!("lig{i:05}\nM  END\n$$$$\n") })
              .collect()
    }

    #[test]
    fn produces_ceil_n_over_b_batches_and_preserves_count() {
        for (n, b) in [(4500usize, 2000usize), (1, 1), (10, 3), (2000, 2000), (2001, 2000)] {
            let batches = partition(ligands(n), b).unwrap();
            assert_eq!(batches.len(), n.div_ceil(b), "n={n} b={b}");
            let total: usize = batches.iter().map(|x| x.members.len()).sum();
            assert_eq!(total, n);
            // Todos menos el último exactamente B; el último 1..=B
            for x in &batches[..batches.len() - 1] {
                assert_eq!(x.members.len(), b);
            }
            let last = batches.last().unwrap().members.len();
            assert!(last >= 1 && last <= b);
        }
    }

    #[test]
    fn scenario_4500_ligands_batch_2000() {
        let batches = partition(ligands(4500), 2000).unwrap();
        let sizes: Vec<usize> = batches.iter().map(|x| x.members.len()).collect();
        assert_eq!(sizes, vec![2000, 2000, 500]);
    }

    #[test]
    fn repartition_is_deterministic() {
        let a = partition(ligands(777), 50).unwrap();
        let b = partition(ligands(777), 50).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.fingerprint, y.fingerprint);
            assert_eq!(x.member_ids(), y.member_ids());
        }
    }

    #[test]
    fn rejects_zero_batch_size_and_empty_input() {
        assert!(matches!(partition(ligands(10), 0), Err(CoreError::Config(_))));
        assert!(matches!(partition(Vec::new(), 10), Err(CoreError::Config(_))));
    }

    #[test]
    fn manifest_preserves_member_order() {
        let batches = partition(ligands(3), 3).unwrap();
        let manifest = batches[0].manifest();
        let keys: Vec<&String> = manifest.members.keys().collect();
        assert_eq!(keys, vec!["lig00000", "lig00001", "lig00002"]);
        assert_eq!(manifest.member_count, 3);
    }
}
