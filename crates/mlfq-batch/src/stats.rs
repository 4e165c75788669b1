use serde::{Deserialize, Serialize};

use crate::job::Job;

/// Run-wide counters updated on every job completion.
#[derive(Clone, Debug, Default)]
pub struct RunCounters {
    pub completed: u64,
    pub total_latency: u64,
    pub total_response: u64,
    pub total_turnaround: u64,
    pub total_turnaround_per_burst: f64,
    pub total_latency_per_burst: f64,
    /// Time units consumed by jobs.
    pub processed: u64,
}

impl RunCounters {
    pub fn add_processed(&mut self, units: u64) {
        self.processed = self.processed.saturating_add(units);
    }

    /// Accounts a completed job. Its timestamps must be set.
    pub fn add_completed(&mut self, job: &Job) {
        let latency = job.latency().unwrap_or(0);
        let turnaround = job.turnaround().unwrap_or(0);
        let burst = job.original_burst_time().max(1) as f64;
        self.completed += 1;
        self.total_latency = self.total_latency.saturating_add(latency);
        self.total_response = self.total_response.saturating_add(job.response().unwrap_or(0));
        self.total_turnaround = self.total_turnaround.saturating_add(turnaround);
        self.total_turnaround_per_burst += turnaround as f64 / burst;
        self.total_latency_per_burst += latency as f64 / burst;
    }

    /// Computes averages at the given clock value.
    pub fn snapshot(&self, clock: u64) -> StatsSnapshot {
        let avg = |total: f64| {
            if self.completed > 0 {
                Some(total / self.completed as f64)
            } else {
                None
            }
        };
        StatsSnapshot {
            completed: self.completed,
            throughput: if self.completed > 0 && clock > 0 {
                Some(self.completed as f64 / clock as f64)
            } else {
                None
            },
            avg_latency: avg(self.total_latency as f64),
            avg_response: avg(self.total_response as f64),
            avg_turnaround: avg(self.total_turnaround as f64),
            avg_turnaround_per_burst: avg(self.total_turnaround_per_burst),
            avg_latency_per_burst: avg(self.total_latency_per_burst),
            total_clock_units_processed: self.processed,
        }
    }
}

/// Aggregated statistics of a run.
///
/// Averages are `None` until at least one job has completed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub completed: u64,
    /// Completed jobs per time unit.
    pub throughput: Option<f64>,
    /// Average time from submission to admission.
    pub avg_latency: Option<f64>,
    /// Average time from submission to completion.
    pub avg_response: Option<f64>,
    /// Average time from admission to completion.
    pub avg_turnaround: Option<f64>,
    pub avg_turnaround_per_burst: Option<f64>,
    pub avg_latency_per_burst: Option<f64>,
    pub total_clock_units_processed: u64,
}
