//! Campaña y lotes.
//!
//! Una `Campaign` es una corrida completa de docking sobre un conjunto de
//! ligandos; es dueña de todos los `Batch` y del namespace de estado. Se crea
//! en el submit y sólo se archiva con limpieza explícita, nunca implícita.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    /// Archivos auxiliares que el engine necesita (receptor, cavidad).
    pub receptor_files: Vec<String>,
    pub ligand_source: String,
    pub batch_size: usize,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(receptor_files: Vec<String>, ligand_source: &str, batch_size: usize) -> Result<Self, DomainError> {
        if batch_size == 0 {
            return Err(DomainError::ValidationError("batch_size must be positive".to_string()));
        }
        if ligand_source.is_empty() {
            return Err(DomainError::ValidationError("ligand_source must not be empty".to_string()));
        }
        Ok(Campaign { id: Uuid::new_v4(),
                      receptor_files,
                      ligand_source: ligand_source.to_string(),
                      batch_size,
                      created_at: Utc::now() })
    }
}

/// Partición contigua de la lista de ligandos, empaquetada como una unidad
/// recuperable (archivo tar.gz en staging).
///
/// Invariante: `index` es 0-based y estable durante toda la vida de la
/// campaña; la pertenencia se deriva determinísticamente del input y del
/// `batch_size`, de modo que re-particionar reproduce límites idénticos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub member_count: usize,
    /// Ruta del archivo tar.gz en el staging (`in/`).
    pub archive: String,
    /// Fingerprint blake3 de la lista ordenada de miembros.
    pub fingerprint: String,
}

impl Batch {
    /// Nombre canónico del archivo de un batch (`batch_00000007.tar.gz`).
    pub fn archive_name(index: usize) -> String {
        format!("batch_{index:08}.tar.gz")
    }

    /// Nombre del manifest sidecar con la membresía del batch.
    pub fn manifest_name(index: usize) -> String {
        format!("batch_{index:08}.manifest.json")
    }
}
