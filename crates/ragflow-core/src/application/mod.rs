/// Time source for durable waits
pub mod clock;

/// Backoff policy for transient step failures
pub mod retry;

/// Memoized steps and durable sleeps
pub mod step_executor;

/// The workflow contract
pub mod workflow;

/// Event dispatch and instance execution
pub mod runtime;

/// Submitting events and awaiting run results
pub mod run_tracker;
