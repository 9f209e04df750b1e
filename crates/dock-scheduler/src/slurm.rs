//! Implementación Slurm del trait `Scheduler` por subprocesos
//! (`sbatch`/`squeue`/`scancel`).

use std::process::Command;

use regex::Regex;
use tracing::{debug, error};

use crate::error::SchedulerError;
use crate::scheduler::{ArraySubmission, QueueEntry, Scheduler};

/// Adapter sobre los binarios de Slurm. `worker_command` es la línea que
/// ejecuta cada tarea del array (el subcomando `worker` de esta misma
/// herramienta, envuelto por el script de lanzamiento).
pub struct SlurmScheduler {
    pub worker_command: String,
}

impl SlurmScheduler {
    pub fn new(worker_command: &str) -> Self {
        Self { worker_command: worker_command.to_string() }
    }

    fn sbatch_args(&self, request: &ArraySubmission) -> Vec<String> {
        let mut args = vec![format!("--output={}", request.output_pattern),
                            format!("--array=1-{}%{}", request.task_count, request.throttle),
                            "--ntasks=1".to_string(),
                            format!("--account={}", request.account),
                            format!("--job-name={}", request.job_name),
                            format!("--nodes={}", request.nodes),
                            format!("--partition={}", request.partition),
                            format!("--time={}", request.time_limit)];
        if let Some(dep) = &request.dependency {
            args.push(format!("--dependency=afterany:{dep}"));
        }
        // Los tags viajan en el entorno de las tareas; el worker recupera el
        // mapeo índice->batch con ellos.
        args.push(format!("--export=ALL,DOCK_CAMPAIGN={},DOCK_GROUP_OFFSET={}",
                          request.campaign, request.group_offset));
        args.extend(request.extra_options.iter().cloned());
        args.push("--wrap".to_string());
        args.push(self.worker_command.clone());
        args
    }
}

fn run(command: &mut Command) -> Result<String, SchedulerError> {
    let output = command.output()
                        .map_err(|e| SchedulerError::Unavailable(format!("cannot spawn {:?}: {e}",
                                                                         command.get_program())))?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SchedulerError::Rejected(format!("{:?} exited {}: {}",
                                                    command.get_program(),
                                                    output.status,
                                                    stderr.trim())));
    }
    Ok(stdout)
}

impl Scheduler for SlurmScheduler {
    fn submit_array(&mut self, request: &ArraySubmission) -> Result<String, SchedulerError> {
        let args = self.sbatch_args(request);
        debug!("sbatch {}", args.join(" "));
        let stdout = run(Command::new("sbatch").args(&args))?;
        parse_sbatch_job_id(&stdout).ok_or_else(|| {
                                        error!("salida de sbatch no reconocida: {stdout}");
                                        SchedulerError::Rejected(format!("unrecognized sbatch output: {}",
                                                                         stdout.trim()))
                                    })
    }

    fn queue(&self, job_id: &str) -> Result<Vec<QueueEntry>, SchedulerError> {
        let stdout = run(Command::new("squeue").args(["-h", "-j", job_id, "-o", "%i %t %r"]))?;
        Ok(parse_squeue_output(job_id, &stdout))
    }

    fn cancel(&mut self, job_id: &str) -> Result<(), SchedulerError> {
        run(Command::new("scancel").arg(job_id)).map(|_| ())
    }
}

pub(crate) fn parse_sbatch_job_id(stdout: &str) -> Option<String> {
    let re = Regex::new(r"Submitted batch job (\d+)").ok()?;
    re.captures(stdout).map(|c| c[1].to_string())
}

/// Parsea las líneas de squeue. Índices sueltos (`91001_4`) y rangos
/// pendientes (`91001_[5-40%8]`); líneas ajenas se ignoran con warning del
/// caller.
pub(crate) fn parse_squeue_output(job_id: &str, stdout: &str) -> Vec<QueueEntry> {
    let single = Regex::new(&format!(r"^{}_\[?(\d+)\]?$", regex::escape(job_id))).ok();
    let range = Regex::new(&format!(r"^{}_\[(\d+)-(\d+)(%\d+)?\]$", regex::escape(job_id))).ok();
    let mut entries = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let mut parts = line.splitn(3, ' ');
        let (Some(ids), Some(state)) = (parts.next(), parts.next()) else {
            continue;
        };
        let reason = parts.next().unwrap_or("").trim().to_string();
        if let Some(m) = single.as_ref().and_then(|re| re.captures(ids)) {
            if let Ok(ix) = m[1].parse::<usize>() {
                entries.push(QueueEntry { first_index: ix,
                                          last_index: ix,
                                          state_code: state.to_string(),
                                          reason });
            }
        } else if let Some(m) = range.as_ref().and_then(|re| re.captures(ids)) {
            if let (Ok(a), Ok(b)) = (m[1].parse::<usize>(), m[2].parse::<usize>()) {
                entries.push(QueueEntry { first_index: a,
                                          last_index: b,
                                          state_code: state.to_string(),
                                          reason });
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parses_sbatch_output() {
        assert_eq!(parse_sbatch_job_id("Submitted batch job 91001\n").as_deref(), Some("91001"));
        assert!(parse_sbatch_job_id("sbatch: error: invalid partition\n").is_none());
    }

    #[test]
    fn parses_squeue_singles_and_ranges() {
        let out = "91001_4 R None\n91001_[5-40%8] PD JobArrayTaskLimit\n91001_7 CG completing\n";
        let entries = parse_squeue_output("91001", out);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].first_index, 4);
        assert_eq!(entries[0].state_code, "R");
        assert_eq!(entries[1].task_count(), 36);
        assert!(entries[1].contains(40));
        assert!(!entries[1].contains(41));
        assert_eq!(entries[1].reason, "JobArrayTaskLimit");
    }

    #[test]
    fn foreign_lines_are_ignored(){
        let entries = parse_squeue_output("91001", "91002_4 R None\ngarbage\n");
        assert!(entries.is_empty());
    }

    #[test]
    fn sbatch_args_carry_throttle_dependency_and_tags() {
        let campaign = Uuid::new_v4();
        let slurm = SlurmScheduler::new("dockflow worker");
        let mut req = ArraySubmission { job_name: "dock".into(),
                                        account: "chem".into(),
                                        partition: "batch".into(),
                                        time_limit: "02:00:00".into(),
                                        nodes: 1,
                                        task_count: 40,
                                        throttle: 8,
                                        dependency: Some("90999".into()),
                                        extra_options: vec!["--qos=long".into()],
                                        output_pattern: "/shared/out/dock_%A_%a.out".into(),
                                        campaign,
                                        group_offset: 2 };
        let args = slurm.sbatch_args(&req);
        assert!(args.contains(&"--array=1-40%8".to_string()));
        assert!(args.contains(&"--dependency=afterany:90999".to_string()));
        assert!(args.contains(&"--qos=long".to_string()));
        assert!(args.iter().any(|a| a.contains(&format!("DOCK_CAMPAIGN={campaign}")) && a.contains("DOCK_GROUP_OFFSET=2")));

        req.dependency = None;
        assert!(!slurm.sbatch_args(&req).iter().any(|a| a.starts_with("--dependency")));
    }
}
