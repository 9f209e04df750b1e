//! Transiciones de estado del worker contra un engine guionado.

use chrono::Utc;
use uuid::Uuid;

use dock_core::{partition, JobArrayStore, LigandStructure, StateStore};
use dock_domain::{JobArray, ResultRecord, TaskKey, TaskRecord, TaskState};
use dock_persistence::{read_result_records, stage_batch, CampaignLayout, FsCampaignStore, StagingInputs};
use dock_worker::{run_worker, ScriptedEngine, WorkerIdentity, WorkerOptions};

struct Fixture {
    _root: tempfile::TempDir,
    layout: CampaignLayout,
    campaign: Uuid,
    identity: WorkerIdentity,
    opts: WorkerOptions,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let layout = CampaignLayout::new(&root.path().join("shared"));
    let campaign = Uuid::new_v4();
    layout.ensure(campaign).unwrap();

    let conf = root.path().join("engine.conf");
    std::fs::write(&conf, "ligand_data_file = {ligand_data_file}\ndirectory = output\n").unwrap();
    let ligands: Vec<LigandStructure> =
        (0..3).map(|i| LigandStructure { id: format!("lig{i}"),
                                         text: format!("lig{i}\nM  END\n$$$$\n") })
              .collect();
    let plan = &partition(ligands, 3).unwrap()[0];
    stage_batch(&layout,
                plan,
                &StagingInputs { conf_template: conf,
                                 receptor: None,
                                 cavity: None,
                                 ligand_ext: "sdf".into() }).unwrap();

    let mut store = FsCampaignStore::new(layout.clone());
    store.append_job_array(campaign,
                           &JobArray { job_id: "91001".into(),
                                       batches: vec![0],
                                       throttle: 1,
                                       submitted_at: Utc::now() })
         .unwrap();
    store.put(&TaskRecord::queued(TaskKey::new(campaign, 0, 1), "91001", 1)).unwrap();

    Fixture { _root: root,
              layout,
              campaign,
              identity: WorkerIdentity { job_id: "91001".into(),
                                         array_index: 1,
                                         campaign },
              opts: WorkerOptions { licensing: "lmgrd;http://license.example.org:8080;".into(),
                                    log_level: 1,
                                    heartbeat_secs: 0 } }
}

fn latest(fx: &Fixture) -> TaskRecord {
    let store = FsCampaignStore::new(fx.layout.clone());
    dock_core::latest_generation(&store.list(fx.campaign).unwrap())[&0].clone()
}

#[test]
fn successful_run_completes_and_writes_results() {
    let fx = fixture();
    let records = vec![ResultRecord { ligand_id: "lig0".into(),
                                      score: 61.2,
                                      pose_file: "gold_soln_lig0.mol2".into() }];
    let engine = ScriptedEngine::succeeding(records);

    let state = run_worker(&engine, &fx.layout, &fx.identity, &fx.opts).unwrap();
    assert_eq!(state, TaskState::Completed);

    let rec = latest(&fx);
    assert_eq!(rec.state, TaskState::Completed);
    assert!(rec.started_at.is_some() && rec.ended_at.is_some());
    assert_eq!(rec.exit_code, Some(0));

    let out_dir = fx.layout.task_out_dir(&rec.key);
    let results = read_result_records(&out_dir).unwrap().unwrap();
    assert_eq!(results.len(), 1);
    // Las referencias a poses quedan ancladas al out dir de la tarea
    assert!(results[0].pose_file.starts_with(out_dir.to_str().unwrap()));
}

#[test]
fn engine_failure_is_recorded_not_propagated() {
    let fx = fixture();
    let engine = ScriptedEngine::failing(1, "licence server unreachable");

    let state = run_worker(&engine, &fx.layout, &fx.identity, &fx.opts).unwrap();
    assert_eq!(state, TaskState::Failed);
    let rec = latest(&fx);
    assert_eq!(rec.state, TaskState::Failed);
    assert_eq!(rec.exit_code, Some(1));
    assert!(rec.diagnostic.as_deref().unwrap().contains("licence server"));
    assert!(read_result_records(&fx.layout.task_out_dir(&rec.key)).unwrap().is_none());
}

#[test]
fn timeout_style_failure_keeps_campaign_resumable() {
    let fx = fixture();
    let engine = ScriptedEngine::failing(124, "walltime exceeded, killed by scheduler");
    assert_eq!(run_worker(&engine, &fx.layout, &fx.identity, &fx.opts).unwrap(), TaskState::Failed);
}

#[test]
fn success_without_artifacts_is_a_failure() {
    let fx = fixture();
    let engine = ScriptedEngine::succeeding_without_artifacts();
    let state = run_worker(&engine, &fx.layout, &fx.identity, &fx.opts).unwrap();
    assert_eq!(state, TaskState::Failed);
    assert!(latest(&fx).diagnostic.as_deref().unwrap().contains("artifacts missing"));
}

#[test]
fn unspawnable_engine_is_a_failure_with_diagnostic() {
    let fx = fixture();
    let engine = ScriptedEngine::unspawnable("no such binary");
    assert_eq!(run_worker(&engine, &fx.layout, &fx.identity, &fx.opts).unwrap(), TaskState::Failed);
    assert!(latest(&fx).diagnostic.as_deref().unwrap().contains("no such binary"));
}

#[test]
fn orphaned_task_does_not_touch_a_newer_generation() {
    let fx = fixture();
    // Otra submission tomó el batch: generación 2 con job id distinto
    let mut store = FsCampaignStore::new(fx.layout.clone());
    store.put(&TaskRecord::queued(TaskKey::new(fx.campaign, 0, 2), "91002", 1)).unwrap();

    let engine = ScriptedEngine::succeeding(vec![]);
    let state = run_worker(&engine, &fx.layout, &fx.identity, &fx.opts).unwrap();
    // No escribe nada: reporta el estado del dueño actual
    assert_eq!(state, TaskState::Queued);
    let rec = latest(&fx);
    assert_eq!(rec.key.generation, 2);
    assert_eq!(rec.job_id, "91002");
    assert_eq!(rec.state, TaskState::Queued);
}
