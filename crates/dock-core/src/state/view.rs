use std::collections::BTreeMap;

use dock_domain::TaskRecord;

/// Reduce el log de records a la vista "generación vigente por batch".
///
/// El Task vigente de un batch es simplemente el record de mayor generación;
/// las generaciones viejas se conservan para auditoría y nunca se mutan.
pub fn latest_generation(records: &[TaskRecord]) -> BTreeMap<usize, TaskRecord> {
    let mut latest: BTreeMap<usize, TaskRecord> = BTreeMap::new();
    for rec in records {
        match latest.get(&rec.key.batch_index) {
            Some(cur) if cur.key.generation >= rec.key.generation => {}
            _ => {
                latest.insert(rec.key.batch_index, rec.clone());
            }
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use dock_domain::{TaskKey, TaskRecord, TaskState};
    use uuid::Uuid;

    fn rec(campaign: Uuid, batch: usize, generation: u32, state: TaskState) -> TaskRecord {
        let mut r = TaskRecord::queued(TaskKey::new(campaign, batch, generation), "91001", batch + 1);
        r.state = state;
        r
    }

    #[test]
    fn highest_generation_wins() {
        let c = Uuid::new_v4();
        let records = vec![rec(c, 0, 1, TaskState::Failed),
                           rec(c, 0, 2, TaskState::Completed),
                           rec(c, 1, 1, TaskState::Completed)];
        let latest = latest_generation(&records);
        assert_eq!(latest[&0].key.generation, 2);
        assert_eq!(latest[&0].state, TaskState::Completed);
        assert_eq!(latest[&1].key.generation, 1);
    }
}
