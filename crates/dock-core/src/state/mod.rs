//! State store: la única fuente de verdad de la campaña.
//!
//! Todos los componentes (monitor, resume, stop, collector) lo tratan como
//! un log externo, posiblemente stale y eventualmente consistente. Una
//! escritura es un create-or-replace del record de una tarea, con clave
//! (campaña, batch, generación); escritores concurrentes nunca comparten
//! clave, así que no hace falta locking por tarea.

mod store;
mod view;

pub use store::{InMemoryCampaignStore, JobArrayStore, PendingGroup, StateStore};
pub use view::latest_generation;
