//! Multilevel feedback queue scheduler with job dependencies and memory-bounded admission.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::error::{SchedError, SchedResult};
use crate::job::{Job, JobId, JobStatus};
use crate::registry::JobRegistry;
use crate::run_queue::RunQueue;
use crate::stats::{RunCounters, StatsSnapshot};
use crate::trace_log::{Event, TraceLog};
use crate::{log_debug, log_error, log_info, log_trace, log_warn};

// OUTCOMES ------------------------------------------------------------------------------------------------------------

/// Result of a single dispatch iteration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum StepOutcome {
    /// No job is admitted to any priority level.
    Idle,
    /// The job finished within its slice.
    Completed {
        job_id: JobId,
        priority: usize,
        slice: u64,
        consumed: u64,
    },
    /// The job used up its slice and was moved to the level `to`.
    Preempted {
        job_id: JobId,
        from: usize,
        to: usize,
        slice: u64,
    },
}

/// Result of a kill request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum KillOutcome {
    /// The job is running or has dependents, repeat the call with `confirmed = true`.
    ConfirmationRequired { successors: Vec<JobId> },
    /// The job was removed from the scheduler.
    Removed,
    /// The job was replaced with a latent placeholder, its dependents keep waiting for it.
    ConvertedToLatent,
}

/// Job state as seen from outside. Fields that make no sense for the current status are `None`/empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub id: JobId,
    pub status: JobStatus,
    pub remaining_time: Option<u64>,
    pub memory: Option<u64>,
    pub dependencies: Vec<JobId>,
    pub successors: Vec<JobId>,
    pub longest_chain_depth: u64,
}

/// State of the queues after the last dispatch iteration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub level_sizes: Vec<usize>,
    pub memory_wait_size: usize,
    pub memory_used: u64,
    pub current_job: Option<JobId>,
    /// Level currently holding the current job (the level it completed at if it is done).
    pub current_priority: Option<usize>,
    pub remaining_time_of_current: Option<u64>,
    pub last_slice: Option<u64>,
}

// SCHEDULER -----------------------------------------------------------------------------------------------------------

/// Simulated batch scheduler.
///
/// Jobs without outstanding dependencies wait in a FIFO memory-wait queue until enough memory is free, then enter
/// the highest priority level. Each [`step`](Scheduler::step) runs the front job of the highest non-empty level for
/// one time slice. A job which does not finish within its slice is moved one level down, at level 0 it is requeued
/// at the tail. Completing a job releases its successors whose last dependency it was.
///
/// The scheduler is single-threaded: submissions, lookups and kills happen between iterations.
pub struct Scheduler {
    config: SchedulerConfig,
    levels: Vec<RunQueue>,
    memory_wait: RunQueue,
    jobs: JobRegistry,
    memory_used: u64,
    clock: u64,
    current: Option<JobId>,
    priority: usize,
    last_slice: Option<u64>,
    counters: RunCounters,
    trace_log: Option<TraceLog>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> SchedResult<Self> {
        config.validate()?;
        Ok(Self {
            levels: vec![RunQueue::new(); config.num_levels],
            memory_wait: RunQueue::new(),
            jobs: JobRegistry::with_capacity(config.registry_capacity),
            memory_used: 0,
            clock: 0,
            current: None,
            priority: 0,
            last_slice: None,
            counters: RunCounters::default(),
            trace_log: if config.trace { Some(TraceLog::new()) } else { None },
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the simulation clock.
    pub fn time(&self) -> u64 {
        self.clock
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.find(id)
    }

    pub fn levels(&self) -> &[RunQueue] {
        &self.levels
    }

    pub fn memory_wait(&self) -> &RunQueue {
        &self.memory_wait
    }

    pub fn memory_used(&self) -> u64 {
        self.memory_used
    }

    pub fn trace_log(&self) -> Option<&TraceLog> {
        self.trace_log.as_ref()
    }

    /// Whether there are admitted jobs or jobs waiting for memory.
    pub fn has_work(&self) -> bool {
        !self.memory_wait.is_empty() || self.levels.iter().any(|level| !level.is_empty())
    }

    /// Moves the clock forward without doing any work, e.g. to the next job arrival.
    pub fn advance_clock_to(&mut self, time: u64) {
        if time > self.clock {
            log_trace!(self, "clock jumps to {}", time);
            self.clock = time;
        }
    }

    fn log_event(&mut self, event: Event) {
        if let Some(trace_log) = self.trace_log.as_mut() {
            trace_log.log_event(event);
        }
    }

    fn job_ref(&self, id: JobId) -> &Job {
        self.jobs
            .find(id)
            .unwrap_or_else(|| panic!("job {} is missing from the registry", id))
    }

    fn job_mut(&mut self, id: JobId) -> &mut Job {
        self.jobs
            .find_mut(id)
            .unwrap_or_else(|| panic!("job {} is missing from the registry", id))
    }

    // SUBMISSION ------------------------------------------------------------------------------------------------------

    /// Specifies a job and registers its dependencies.
    ///
    /// Unknown dependency ids are registered as latent jobs, completed dependencies are skipped.
    /// A job without outstanding dependencies goes to the memory-wait queue.
    /// Nothing is modified if an error is returned.
    pub fn submit(&mut self, id: JobId, burst_time: u64, memory: u64, dependencies: &[JobId]) -> SchedResult<()> {
        if burst_time == 0 {
            return Err(SchedError::InvalidArgument(format!("burst time of job {} must be positive", id)));
        }
        if memory > self.config.max_memory {
            return Err(SchedError::InvalidArgument(format!(
                "memory need of job {} ({}) exceeds the limit of {}",
                id, memory, self.config.max_memory
            )));
        }
        if let Some(job) = self.jobs.find(id) {
            if job.status() != JobStatus::Latent {
                return Err(SchedError::invalid_state(id, job.status(), "prepare"));
            }
        }
        let mut deps: Vec<JobId> = Vec::with_capacity(dependencies.len());
        for &dep in dependencies {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        self.check_acyclic(id, &deps)?;

        if !self.jobs.contains(id) {
            self.jobs.insert(Job::new_latent(id));
        }
        let clock = self.clock;
        let job = self.job_mut(id);
        job.prepare(burst_time, memory)?;
        job.set_inserted_at(clock);

        let mut pending = Vec::with_capacity(deps.len());
        for &dep in deps.iter() {
            if !self.jobs.contains(dep) {
                log_debug!(self, "job {} is not known yet, registered as latent", dep);
            }
            let dep_job = self.jobs.find_or_create_latent(dep);
            if dep_job.status() == JobStatus::Complete {
                continue;
            }
            dep_job.add_successor(id);
            pending.push(dep);
        }
        for &dep in pending.iter() {
            self.job_mut(id).add_dependency(dep);
            if self.config.chain_weighting {
                self.propagate_chain_depth(id, dep);
            }
        }

        log_info!(
            self,
            "submitted job {} (burst {}, memory {}), waiting for {:?}",
            id,
            burst_time,
            memory,
            pending
        );
        self.log_event(Event::JobSubmitted {
            time: clock,
            job_id: id,
            burst_time,
            memory,
            dependencies: pending.clone(),
        });
        if pending.is_empty() {
            self.memory_wait.push(id);
            log_debug!(self, "job {} waits for memory", id);
        }
        Ok(())
    }

    /// Rejects dependencies that already depend on the job, directly or transitively.
    fn check_acyclic(&self, id: JobId, deps: &[JobId]) -> SchedResult<()> {
        if deps.contains(&id) {
            return Err(SchedError::InvalidArgument(format!("job {} can't depend on itself", id)));
        }
        if !self.jobs.contains(id) || deps.is_empty() {
            return Ok(());
        }
        let mut visited = HashSet::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if !visited.insert(cur) {
                continue;
            }
            if let Some(job) = self.jobs.find(cur) {
                for &succ in job.successors() {
                    if deps.contains(&succ) {
                        return Err(SchedError::InvalidArgument(format!(
                            "dependency of job {} on job {} creates a cycle",
                            id, succ
                        )));
                    }
                    stack.push(succ);
                }
            }
        }
        Ok(())
    }

    /// Raises the chain depth of `dep` and of everything below it after `id` started depending on `dep`.
    fn propagate_chain_depth(&mut self, id: JobId, dep: JobId) {
        let depth = self.job_ref(id).longest_chain_depth() + 1;
        let mut stack = vec![(dep, depth)];
        while let Some((cur, depth)) = stack.pop() {
            let job = match self.jobs.find_mut(cur) {
                Some(job) => job,
                None => continue,
            };
            if job.longest_chain_depth() >= depth {
                continue;
            }
            job.set_longest_chain_depth(depth);
            stack.extend(job.dependencies().iter().map(|&next| (next, depth + 1)));
        }
    }

    // ADMISSION -------------------------------------------------------------------------------------------------------

    /// Admits jobs from the head of the memory-wait queue while they fit into memory.
    ///
    /// Admission is strictly FIFO: a large job at the head blocks the smaller ones behind it.
    pub fn admit_waiting(&mut self) {
        let top = self.levels.len() - 1;
        while let Ok(id) = self.memory_wait.front() {
            let need = self.job_ref(id).memory_need();
            if need > self.config.max_memory - self.memory_used {
                break;
            }
            self.memory_wait.pop().expect("memory-wait queue has a front job");
            let clock = self.clock;
            if let Err(e) = self.job_mut(id).start(clock) {
                panic!("job {} in memory-wait queue can't be admitted: {}", id, e);
            }
            self.levels[top].push(id);
            self.memory_used += need;
            log_debug!(self, "admitted job {} to Q{}, memory used {}", id, top, self.memory_used);
            self.log_event(Event::JobAdmitted {
                time: clock,
                job_id: id,
                memory_used: self.memory_used,
            });
        }
    }

    // DISPATCH --------------------------------------------------------------------------------------------------------

    fn slice_for(&self, job: &Job, priority: usize) -> u64 {
        let mut slice = self.config.quantum(priority);
        if self.config.chain_weighting {
            slice = slice.saturating_mul(job.longest_chain_depth().saturating_add(1));
        }
        slice
    }

    /// Runs one scheduling iteration: admission followed by one time slice of the highest priority job.
    pub fn step(&mut self) -> StepOutcome {
        self.admit_waiting();

        let priority = match (0..self.levels.len()).rev().find(|&p| !self.levels[p].is_empty()) {
            Some(priority) => priority,
            None => {
                self.current = None;
                return StepOutcome::Idle;
            }
        };
        let id = match self.levels[priority].front() {
            Ok(id) => id,
            Err(e) => panic!("level Q{} was checked to be non-empty: {}", priority, e),
        };
        let slice = self.slice_for(self.job_ref(id), priority);
        let job = self.job_mut(id);
        let consumed = job.decrease_time(slice);
        let completed = job.status() == JobStatus::Complete;

        self.clock = self.clock.saturating_add(consumed);
        self.counters.add_processed(consumed);
        self.current = Some(id);
        self.last_slice = Some(slice);
        log_debug!(self, "ran job {} at Q{} for {} of {} units", id, priority, consumed, slice);
        self.log_event(Event::JobSliced {
            time: self.clock,
            job_id: id,
            priority,
            slice,
            consumed,
        });

        self.levels[priority].pop().expect("current job is at the front of its level");
        if completed {
            self.complete(id);
            self.priority = priority;
            StepOutcome::Completed {
                job_id: id,
                priority,
                slice,
                consumed,
            }
        } else {
            let next = priority.saturating_sub(1);
            self.levels[next].push(id);
            self.priority = next;
            log_trace!(self, "job {} moved from Q{} to Q{}", id, priority, next);
            self.log_event(Event::JobDemoted {
                time: self.clock,
                job_id: id,
                from: priority,
                to: next,
            });
            StepOutcome::Preempted {
                job_id: id,
                from: priority,
                to: next,
                slice,
            }
        }
    }

    /// Runs iterations until nothing is admitted or waiting for memory. Returns the number of iterations.
    pub fn run_until_idle(&mut self) -> usize {
        let mut steps = 0;
        while self.step() != StepOutcome::Idle {
            steps += 1;
        }
        steps
    }

    fn complete(&mut self, id: JobId) {
        let clock = self.clock;
        let job = self.job_mut(id);
        job.set_completed_at(clock);
        let memory = job.memory_need();
        self.memory_used -= memory;
        if let Some(job) = self.jobs.find(id) {
            self.counters.add_completed(job);
        }
        log_info!(self, "completed job {}, memory used {}", id, self.memory_used);
        self.log_event(Event::JobCompleted { time: clock, job_id: id });
        self.release_successors(id);
    }

    /// Removes the completed job from the dependencies of its successors, in the order they were recorded,
    /// and sends the successors without remaining dependencies to the memory-wait queue.
    fn release_successors(&mut self, id: JobId) {
        let successors = self.job_ref(id).successors().to_vec();
        for succ in successors {
            let job = match self.jobs.find_mut(succ) {
                Some(job) => job,
                None => {
                    log_error!(self, "successor {} of job {} is missing from the registry", succ, id);
                    continue;
                }
            };
            job.remove_dependency(id);
            if job.no_dependencies() && job.status() == JobStatus::Waiting {
                self.memory_wait.push(succ);
                log_debug!(self, "job {} released by job {}, waits for memory", succ, id);
                self.log_event(Event::JobReleased {
                    time: self.clock,
                    job_id: succ,
                    by: id,
                });
            }
        }
    }

    // QUERIES ---------------------------------------------------------------------------------------------------------

    pub fn lookup(&self, id: JobId) -> SchedResult<JobInfo> {
        let job = self.jobs.find(id).ok_or(SchedError::NotFound(id))?;
        let active = matches!(job.status(), JobStatus::Waiting | JobStatus::Running);
        Ok(JobInfo {
            id,
            status: job.status(),
            remaining_time: active.then(|| job.remaining_time()),
            memory: active.then(|| job.memory_need()),
            dependencies: job.dependencies().to_vec(),
            successors: job.successors().to_vec(),
            longest_chain_depth: job.longest_chain_depth(),
        })
    }

    pub fn snapshot_status(&self) -> StatusSnapshot {
        StatusSnapshot {
            level_sizes: self.levels.iter().map(|level| level.len()).collect(),
            memory_wait_size: self.memory_wait.len(),
            memory_used: self.memory_used,
            current_job: self.current,
            current_priority: self.current.map(|_| self.priority),
            remaining_time_of_current: self.current.and_then(|id| self.jobs.find(id)).map(|job| job.remaining_time()),
            last_slice: self.current.and(self.last_slice),
        }
    }

    pub fn snapshot_stats(&self) -> StatsSnapshot {
        self.counters.snapshot(self.clock)
    }

    // KILL ------------------------------------------------------------------------------------------------------------

    /// Terminates a job prematurely.
    ///
    /// A waiting job without dependents is removed at once. Running jobs and jobs with dependents require
    /// confirmation; once confirmed, a job with dependents is turned into a latent placeholder (so the dependents
    /// keep waiting for its id) and a job without dependents is removed.
    pub fn kill(&mut self, id: JobId, confirmed: bool) -> SchedResult<KillOutcome> {
        let job = self.jobs.find(id).ok_or(SchedError::NotFound(id))?;
        let status = job.status();
        let successors = job.successors().to_vec();
        let no_successors = successors.is_empty();
        match status {
            JobStatus::Latent | JobStatus::Complete => Err(SchedError::invalid_state(id, status, "kill")),
            JobStatus::Waiting if no_successors => {
                self.detach(id);
                self.log_killed(id, false);
                Ok(KillOutcome::Removed)
            }
            _ if !confirmed => Ok(KillOutcome::ConfirmationRequired { successors }),
            _ if no_successors => {
                self.detach(id);
                self.log_killed(id, false);
                Ok(KillOutcome::Removed)
            }
            _ => {
                let job = self.detach(id);
                self.jobs.insert(job.into_latent());
                self.log_killed(id, true);
                Ok(KillOutcome::ConvertedToLatent)
            }
        }
    }

    fn log_killed(&mut self, id: JobId, latent: bool) {
        if latent {
            log_warn!(self, "killed job {}, its dependents keep waiting for it", id);
        } else {
            log_warn!(self, "killed job {}", id);
        }
        self.log_event(Event::JobKilled {
            time: self.clock,
            job_id: id,
            latent,
        });
    }

    /// Takes the job out of the scheduler: removes it from the registry and from the queue holding it,
    /// releases its memory and detaches it from the successor lists of its dependencies.
    fn detach(&mut self, id: JobId) -> Job {
        let job = self
            .jobs
            .remove(id)
            .unwrap_or_else(|| panic!("job {} is missing from the registry", id));
        match job.status() {
            JobStatus::Running => {
                let found = self.levels.iter_mut().any(|level| level.force_pop(id));
                assert!(found, "running job {} is not in any priority level", id);
                self.memory_used -= job.memory_need();
            }
            JobStatus::Waiting => {
                self.memory_wait.force_pop(id);
            }
            _ => {}
        }
        for &dep in job.dependencies() {
            if let Some(dep_job) = self.jobs.find_mut(dep) {
                dep_job.remove_successor(id);
            }
        }
        if self.current == Some(id) {
            self.current = None;
        }
        job
    }
}
