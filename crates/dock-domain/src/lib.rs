// dock-domain library entry point
pub mod campaign;
pub mod error;
pub mod ranking;
pub mod task;

pub use campaign::{Batch, Campaign};
pub use error::DomainError;
pub use ranking::{ResultRecord, ScoreDirection};
pub use task::{JobArray, TaskKey, TaskRecord, TaskState};
