//! Job Submitter: mapea batches a job arrays respetando el límite de tamaño
//! de array del scheduler.
//!
//! Los batches se agrupan en tandas consecutivas de a lo sumo
//! `max_array_size`; cada tanda es un `JobArray` con throttle
//! `min(max_running_tasks, tamaño)` y encadenado con `afterany` al anterior.
//! Un rechazo del scheduler no revierte las tandas ya aceptadas: el
//! resultado por tanda se devuelve al caller y las tandas rechazadas quedan
//! en la cola de pendientes para reintentar (o para que `stop` las someta).

use tracing::{info, warn};
use uuid::Uuid;

use dock_core::{CoreError, JobArrayStore, PendingGroup, StateStore};
use dock_domain::{JobArray, TaskKey, TaskRecord};

use crate::error::{with_retry, SchedulerError};
use crate::scheduler::{ArraySubmission, Scheduler};

/// Resultado de una tanda: o el `JobArray` aceptado o el error que la dejó
/// en cola.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub group_index: usize,
    pub batches: Vec<usize>,
    pub result: Result<JobArray, SchedulerError>,
}

/// Somete `batches` (pares batch, generación nueva) para la campaña.
///
/// El caller debe sostener el lock de submission de la campaña: esta función
/// asume acceso serializado a la lista de job arrays.
pub fn submit_batches<C, S>(scheduler: &mut C,
                            store: &mut S,
                            campaign: Uuid,
                            batches: &[(usize, u32)],
                            cfg: &dock_core::SchedulerSection,
                            output_pattern: &str)
                            -> Result<Vec<SubmitOutcome>, CoreError>
    where C: Scheduler,
          S: StateStore + JobArrayStore
{
    let mut outcomes = Vec::new();
    let mut dependency: Option<String> = store.list_job_arrays(campaign)?.last().map(|ja| ja.job_id.clone());
    let mut queue = store.queued_groups(campaign)?;

    for (group_index, group) in batches.chunks(cfg.max_array_size).enumerate() {
        let group_batches: Vec<usize> = group.iter().map(|(b, _)| *b).collect();
        let mut request =
            ArraySubmission::from_config(cfg, campaign, group_index, group.len(), output_pattern);
        request.dependency = dependency.clone();

        match with_retry(|| scheduler.submit_array(&request)) {
            Ok(job_id) => {
                let job_array = JobArray { job_id: job_id.clone(),
                                           batches: group_batches.clone(),
                                           throttle: request.throttle,
                                           submitted_at: chrono::Utc::now() };
                store.append_job_array(campaign, &job_array)?;
                for (array_index, (batch, generation)) in group.iter().enumerate() {
                    let key = TaskKey::new(campaign, *batch, *generation);
                    store.put(&TaskRecord::queued(key, &job_id, array_index + 1))?;
                }
                info!("job array {job_id} aceptado: {} tareas (throttle {})", group.len(), request.throttle);
                dependency = Some(job_id.clone());
                outcomes.push(SubmitOutcome { group_index,
                                              batches: group_batches,
                                              result: Ok(job_array) });
            }
            Err(e) => {
                warn!("tanda {group_index} rechazada, queda en cola: {e}");
                queue.push(PendingGroup { batches: group_batches.clone() });
                outcomes.push(SubmitOutcome { group_index,
                                              batches: group_batches,
                                              result: Err(e) });
            }
        }
    }

    store.replace_queue(campaign, &queue)?;
    Ok(outcomes)
}
