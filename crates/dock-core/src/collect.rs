//! Ranking global del collector.
//!
//! El ranking se recomputa on-demand a partir de los `ResultRecord`
//! inmutables de las tareas completadas; nunca se muta in-place. Las tareas
//! no completadas quedan excluidas y se reportan aparte para que el caller
//! sepa que el ranking es parcial.

use dock_domain::{ResultRecord, ScoreDirection};

/// Ranking ordenado de todos los resultados de la campaña.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalRanking {
    pub entries: Vec<ResultRecord>,
    pub direction: ScoreDirection,
}

impl GlobalRanking {
    /// Construye el ranking: orden por score según `direction`, empates por
    /// `ligand_id` ascendente. Determinista e idempotente por construcción.
    pub fn build(mut records: Vec<ResultRecord>, direction: ScoreDirection) -> Self {
        records.sort_by(|a, b| direction.compare(a, b));
        GlobalRanking { entries: records, direction }
    }

    /// Render del archivo de ranking: una línea por resultado,
    /// `score  ligand_id  pose_file`, con cabecera comentada.
    pub fn render(&self) -> String {
        let mut out = String::from("# score\tligand_id\tpose_file\n");
        for r in &self.entries {
            out.push_str(&format!("{:.4}\t{}\t{}\n", r.score, r.ligand_id, r.pose_file));
        }
        out
    }
}

/// Salida del collector: ranking más el detalle de cobertura.
#[derive(Debug, Clone)]
pub struct CollectReport {
    pub ranking: GlobalRanking,
    pub completed_batches: Vec<usize>,
    /// Batches sin resultado utilizable (no completados, o con salida
    /// faltante/corrupta). El ranking es parcial si no está vacío.
    pub incomplete_batches: Vec<usize>,
}

impl CollectReport {
    pub fn build(per_batch: Vec<(usize, Vec<ResultRecord>)>,
                 incomplete_batches: Vec<usize>,
                 direction: ScoreDirection)
                 -> Self {
        let mut completed_batches: Vec<usize> = per_batch.iter().map(|(b, _)| *b).collect();
        completed_batches.sort_unstable();
        let records: Vec<ResultRecord> = per_batch.into_iter().flat_map(|(_, recs)| recs).collect();
        CollectReport { ranking: GlobalRanking::build(records, direction),
                        completed_batches,
                        incomplete_batches }
    }

    pub fn is_partial(&self) -> bool {
        !self.incomplete_batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, score: f64) -> ResultRecord {
        ResultRecord { ligand_id: id.to_string(),
                       score,
                       pose_file: format!("poses/{id}.mol2") }
    }

    #[test]
    fn ranking_is_a_sorted_permutation_of_inputs() {
        let input = vec![(0, vec![rec("b", 2.0), rec("a", 9.0)]), (1, vec![rec("c", 5.0)])];
        let report = CollectReport::build(input, vec![], ScoreDirection::Descending);
        let ids: Vec<&str> = report.ranking.entries.iter().map(|r| r.ligand_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert_eq!(report.completed_batches, vec![0, 1]);
        assert!(!report.is_partial());
    }

    #[test]
    fn rebuild_with_same_inputs_is_identical() {
        let input = || vec![(0, vec![rec("x", 1.5), rec("y", 1.5), rec("w", 0.5)])];
        let a = CollectReport::build(input(), vec![], ScoreDirection::Ascending);
        let b = CollectReport::build(input(), vec![], ScoreDirection::Ascending);
        assert_eq!(a.ranking, b.ranking);
        // Empate en 1.5 resuelto por id ascendente
        let ids: Vec<&str> = a.ranking.entries.iter().map(|r| r.ligand_id.as_str()).collect();
        assert_eq!(ids, vec!["w", "x", "y"]);
    }

    #[test]
    fn incomplete_batches_are_reported_not_ranked() {
        let report = CollectReport::build(vec![(0, vec![rec("a", 1.0)])], vec![1, 2], ScoreDirection::Descending);
        assert!(report.is_partial());
        assert_eq!(report.incomplete_batches, vec![1, 2]);
        assert_eq!(report.ranking.entries.len(), 1);
    }

    #[test]
    fn render_has_header_and_one_line_per_entry() {
        let ranking = GlobalRanking::build(vec![rec("a", 55.1234)], ScoreDirection::Descending);
        let text = ranking.render();
        assert!(text.starts_with("# score"));
        assert!(text.contains("55.1234\ta\tposes/a.mol2\n"));
    }
}
