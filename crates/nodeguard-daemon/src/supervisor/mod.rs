mod budget;
mod core;
mod generation;
mod stats;
mod types;

pub use budget::ErrorBudget;
pub use self::core::{NodeIdentity, Supervisor, SupervisorDeps};
pub use generation::{GenerationCounter, GenerationToken};
pub use stats::SupervisorStats;
pub use types::{ExitRecord, LifecyclePhase, ShutdownReason, StopOutcome};

#[cfg(test)]
mod tests;
