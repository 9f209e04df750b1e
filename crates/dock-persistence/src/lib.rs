//! dock-persistence
//!
//! Backend durable del orquestador sobre el filesystem compartido del
//! cluster. Provee la implementación de `StateStore`/`JobArrayStore` con
//! paridad 1:1 respecto al backend in-memory de `dock-core`, el layout de
//! directorios de campaña y el staging de archivos de batch.
//!
//! Módulos:
//! - `layout`: derivación de rutas (`in/`, `out/`, `state/`) desde la raíz.
//! - `fs_store`: records de tarea como un archivo JSON por generación,
//!   escritos con write-to-temp + rename (atómico para los lectores).
//! - `archive`: tar.gz por batch más manifest de membresía (skip-if-unchanged
//!   e `InputConflict`).

pub mod archive;
pub mod fs_store;
pub mod layout;
pub mod results;

pub use archive::{extract_archive, stage_batch, StagingInputs};
pub use fs_store::{FsCampaignStore, SubmissionLock};
pub use layout::CampaignLayout;
pub use results::{gather_results, read_result_records, write_result_records};
