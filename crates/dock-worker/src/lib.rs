//! dock-worker: el punto de entrada por índice de array.
//!
//! Cada tarea del job array corre este código en un nodo de cómputo: ubica
//! su batch por el mapeo índice-de-array -> batch, pasa la tarea a Running,
//! desempaqueta el archivo en un área privada, invoca el engine de docking
//! (una capability opaca detrás del trait `DockingEngine`) y escribe el
//! estado terminal más los `ResultRecord` producidos. Una falla del engine
//! se registra como `Failed` con diagnóstico; jamás es fatal de campaña.

pub mod engine;
pub mod invoke;

pub use engine::{BatchInputs, DockingEngine, EngineError, EngineOutcome, ScriptedEngine, SubprocessEngine};
pub use invoke::{run_worker, WorkerIdentity, WorkerOptions};
