//! Background release instances and their supervisor.

mod release_supervisor;

pub use release_supervisor::{ReleaseSupervisor, TaskKey};
