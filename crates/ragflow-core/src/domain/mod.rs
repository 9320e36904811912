//! Domain layer: workflow instances, the step log, timers and lifecycle events

pub mod events;
pub mod repository;
pub mod step;
pub mod workflow_instance;
