//! Driving the scheduler over a workload.

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::SchedError;
use crate::job::{JobId, JobStatus};
use crate::pacing::{NoPacing, Pacer};
use crate::scheduler::{Scheduler, StepOutcome};
use crate::stats::StatsSnapshot;
use crate::workload::{JobSpec, Workload};
use crate::{log_debug, log_info, log_warn};

/// Final state of a simulation run.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    /// Number of dispatch iterations which ran some job.
    pub steps: u64,
    pub clock: u64,
    /// Whether the run stopped because there was nothing left to do (and not because of the step limit).
    pub finished: bool,
    pub submission_failures: usize,
    /// Ids of registered jobs which did not complete, in ascending order.
    pub unfinished_jobs: Vec<JobId>,
    pub stats: StatsSnapshot,
}

/// Feeds workload arrivals to the scheduler and runs its dispatch loop.
///
/// A job arriving at time `t` is submitted at the first iteration boundary where the clock is at least `t`.
/// If the scheduler has nothing to run while arrivals are still pending, the clock jumps to the next arrival.
pub struct Simulation {
    scheduler: Scheduler,
    arrivals: VecDeque<JobSpec>,
    pacer: Box<dyn Pacer>,
    steps: u64,
    failures: Vec<(JobId, SchedError)>,
}

impl Simulation {
    pub fn new(scheduler: Scheduler, workload: Workload) -> Self {
        let mut jobs = workload.jobs;
        jobs.sort_by_key(|spec| spec.arrival);
        Self {
            scheduler,
            arrivals: jobs.into(),
            pacer: Box::new(NoPacing),
            steps: 0,
            failures: Vec::new(),
        }
    }

    /// Replaces the pacer, by default the simulation runs at full speed.
    pub fn with_pacer(mut self, pacer: Box<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Gives access to the scheduler between iterations, e.g. for lookups and kills.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn time(&self) -> u64 {
        self.scheduler.time()
    }

    pub fn pending_arrivals(&self) -> usize {
        self.arrivals.len()
    }

    /// Submissions rejected by the scheduler so far.
    pub fn failures(&self) -> &[(JobId, SchedError)] {
        &self.failures
    }

    fn submit_due_arrivals(&mut self) {
        while let Some(spec) = self.arrivals.front() {
            if spec.arrival > self.scheduler.time() {
                break;
            }
            let spec = self.arrivals.pop_front().expect("arrival queue has a front job");
            if let Err(e) = spec.submit_to(&mut self.scheduler) {
                log_warn!(self.scheduler, "job {} rejected: {}", spec.id, e);
                self.failures.push((spec.id, e));
            }
        }
    }

    /// Performs one iteration: submits due arrivals, runs one time slice and paces.
    ///
    /// Returns `false` if there is nothing left to run and no pending arrivals.
    pub fn step(&mut self) -> bool {
        self.submit_due_arrivals();
        let consumed = match self.scheduler.step() {
            StepOutcome::Completed { consumed, .. } => consumed,
            StepOutcome::Preempted { slice, .. } => slice,
            StepOutcome::Idle => {
                return match self.arrivals.front() {
                    Some(next) => {
                        let arrival = next.arrival;
                        log_debug!(self.scheduler, "idle until next arrival at {}", arrival);
                        self.scheduler.advance_clock_to(arrival);
                        true
                    }
                    None => false,
                };
            }
        };
        self.steps += 1;
        self.pacer.pause(consumed);
        true
    }

    /// Performs up to `step_count` iterations. Returns `true` if more work could remain.
    pub fn steps(&mut self, step_count: u64) -> bool {
        for _ in 0..step_count {
            if !self.step() {
                return false;
            }
        }
        true
    }

    /// Runs until there is nothing left to do or `max_steps` iterations are made.
    pub fn run(&mut self, max_steps: Option<u64>) -> RunSummary {
        let finished = match max_steps {
            Some(max_steps) => !self.steps(max_steps) || !self.has_work(),
            None => {
                while self.step() {}
                true
            }
        };
        let summary = self.summary(finished);
        log_info!(
            self.scheduler,
            "run {} after {} steps, {} jobs completed",
            if finished { "finished" } else { "stopped" },
            summary.steps,
            summary.stats.completed
        );
        summary
    }

    fn has_work(&self) -> bool {
        !self.arrivals.is_empty() || self.scheduler.has_work()
    }

    pub fn summary(&self, finished: bool) -> RunSummary {
        let mut unfinished_jobs: Vec<JobId> = self
            .scheduler
            .jobs()
            .iter()
            .filter(|job| job.status() != JobStatus::Complete)
            .map(|job| job.id())
            .collect();
        unfinished_jobs.sort_unstable();
        RunSummary {
            steps: self.steps,
            clock: self.scheduler.time(),
            finished,
            submission_failures: self.failures.len(),
            unfinished_jobs,
            stats: self.scheduler.snapshot_stats(),
        }
    }
}
