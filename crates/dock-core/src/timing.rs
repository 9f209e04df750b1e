//! Estadísticas de timing derivadas de los timestamps del state store.
//!
//! No hay estado propio: todo sale de los records. Por tarea se reporta la
//! espera en cola (Queued→Running) y el tiempo de corrida (Running→terminal);
//! por campaña, el span de reloj desde el primer Queued al último terminal.

use std::collections::BTreeMap;

use dock_domain::TaskRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct TaskTiming {
    pub batch_index: usize,
    pub generation: u32,
    pub queue_wait_secs: Option<f64>,
    pub run_secs: Option<f64>,
}

/// Agregados al estilo del reporte clásico de batch timing: cantidad, suma,
/// media, mediana, desvío estándar y top-3.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingStats {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub stdev: Option<f64>,
    pub top3: Vec<f64>,
}

impl TimingStats {
    fn from_samples(mut samples: Vec<f64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let count = samples.len();
        let sum: f64 = samples.iter().sum();
        let mean = sum / count as f64;
        let median = if count % 2 == 1 {
            samples[count / 2]
        } else {
            (samples[count / 2 - 1] + samples[count / 2]) / 2.0
        };
        // Desvío estándar muestral; indefinido con menos de 2 datos
        let stdev = if count < 2 {
            None
        } else {
            let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            Some(var.sqrt())
        };
        let top3: Vec<f64> = samples.iter().rev().take(3).copied().collect();
        Some(TimingStats { count, sum, mean, median, stdev, top3 })
    }
}

#[derive(Debug, Clone)]
pub struct TimingReport {
    pub per_task: Vec<TaskTiming>,
    pub run_stats: Option<TimingStats>,
    pub queue_stats: Option<TimingStats>,
    /// Span de reloj de la campaña: primer Queued -> último terminal.
    pub wall_span_secs: Option<f64>,
    /// Tareas sin información de timing (aún no terminales o records
    /// incompletos).
    pub missing: usize,
}

impl TimingReport {
    /// Deriva el reporte de la vista de generación vigente.
    pub fn build(latest: &BTreeMap<usize, TaskRecord>) -> Self {
        let mut per_task = Vec::with_capacity(latest.len());
        let mut runs = Vec::new();
        let mut waits = Vec::new();
        let mut missing = 0usize;
        let mut first_queued = None;
        let mut last_ended = None;

        for rec in latest.values() {
            let queue_wait_secs = match (rec.queued_at, rec.started_at) {
                (Some(q), Some(s)) => Some((s - q).num_milliseconds() as f64 / 1000.0),
                _ => None,
            };
            let run_secs = match (rec.started_at, rec.ended_at) {
                (Some(s), Some(e)) => Some((e - s).num_milliseconds() as f64 / 1000.0),
                _ => None,
            };
            if let Some(w) = queue_wait_secs {
                waits.push(w);
            }
            match run_secs {
                Some(r) => runs.push(r),
                None => missing += 1,
            }
            if let Some(q) = rec.queued_at {
                first_queued = Some(first_queued.map_or(q, |f: chrono::DateTime<chrono::Utc>| f.min(q)));
            }
            if let Some(e) = rec.ended_at {
                last_ended = Some(last_ended.map_or(e, |l: chrono::DateTime<chrono::Utc>| l.max(e)));
            }
            per_task.push(TaskTiming { batch_index: rec.key.batch_index,
                                       generation: rec.key.generation,
                                       queue_wait_secs,
                                       run_secs });
        }

        let wall_span_secs = match (first_queued, last_ended) {
            (Some(q), Some(e)) if e >= q => Some((e - q).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };
        TimingReport { per_task,
                       run_stats: TimingStats::from_samples(runs),
                       queue_stats: TimingStats::from_samples(waits),
                       wall_span_secs,
                       missing }
    }
}
