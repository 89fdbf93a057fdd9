//! fsq-core: filesystem-backed task queue for experiment orchestration.
//!
//! Tasks are single files and the parent directory encodes the state
//! (`queued`, `checking`, `active`, `paused`, `done`, `failed`). Every state
//! change is one POSIX rename within the queue root, so workers on the same
//! mount coordinate through rename-atomicity alone: no broker, no database,
//! no locks, no leases.

pub mod proc;
pub mod queue;
pub mod status;
pub mod submit;
pub mod task;
pub mod worker;

pub use queue::{QueueDir, TaskState};
pub use submit::{submit, witness, Submission};
pub use worker::{run_worker, WorkerConfig};
