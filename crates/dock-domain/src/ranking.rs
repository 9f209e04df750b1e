//! Resultados puntuados y su orden.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Un resultado producido por una tarea: ligando, score escalar y referencia
/// al archivo de pose. Inmutable una vez escrito; es propiedad del batch que
/// lo produjo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub ligand_id: String,
    pub score: f64,
    pub pose_file: String,
}

/// Dirección del orden del ranking global.
///
/// Debe ser una elección explícita de configuración: `Descending` para
/// scores tipo afinidad (mayor es mejor, el caso GOLD), `Ascending` para
/// scores tipo distancia. Nunca se infiere de los datos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreDirection {
    Ascending,
    Descending,
}

impl ScoreDirection {
    /// Orden total para el ranking: score según la dirección, empates por
    /// `ligand_id` ascendente (estable entre corridas).
    pub fn compare(&self, a: &ResultRecord, b: &ResultRecord) -> Ordering {
        let by_score = match self {
            ScoreDirection::Ascending => a.score.partial_cmp(&b.score),
            ScoreDirection::Descending => b.score.partial_cmp(&a.score),
        };
        by_score.unwrap_or(Ordering::Equal)
                .then_with(|| a.ligand_id.cmp(&b.ligand_id))
    }
}
