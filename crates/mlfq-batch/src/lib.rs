#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod job;
pub mod log;
pub mod pacing;
pub mod registry;
pub mod run_queue;
pub mod scheduler;
pub mod simulation;
pub mod stats;
pub mod trace_log;
pub mod workload;

// Re-export for macros
pub use colored;

pub use config::SchedulerConfig;
pub use error::{SchedError, SchedResult};
pub use job::{Job, JobId, JobStatus};
pub use pacing::{NoPacing, Pacer, WallClockPacer};
pub use registry::JobRegistry;
pub use run_queue::RunQueue;
pub use scheduler::{JobInfo, KillOutcome, Scheduler, StatusSnapshot, StepOutcome};
pub use simulation::{RunSummary, Simulation};
pub use stats::StatsSnapshot;
pub use trace_log::{Event, TraceLog};
pub use workload::{parse_line, submit_lines, BatchReport, GeneratorParams, JobSpec, Workload};

#[cfg(test)]
mod tests;
