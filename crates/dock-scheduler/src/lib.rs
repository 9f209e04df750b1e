//! dock-scheduler: la costura con el batch scheduler del cluster.
//!
//! Define el trait `Scheduler` (submit de job arrays, estado de cola,
//! cancelación), la implementación Slurm por subprocesos y los controladores
//! que lo combinan con el state store: submitter, monitor, resume y stop.
//! Los tests sustituyen el scheduler real por `FakeScheduler` con resultados
//! guionados.

pub mod error;
pub mod fake;
pub mod monitor;
pub mod resume;
pub mod scheduler;
pub mod slurm;
pub mod stop;
pub mod submit;

pub use error::{with_retry, SchedulerError};
pub use fake::FakeScheduler;
pub use monitor::{snapshot, StatusReport, TaskSnapshot};
pub use resume::{resume_campaign, ResumeOutcome};
pub use scheduler::{ArraySubmission, QueueEntry, Scheduler};
pub use slurm::SlurmScheduler;
pub use stop::{stop_campaign, StopReport};
pub use submit::{submit_batches, SubmitOutcome};
