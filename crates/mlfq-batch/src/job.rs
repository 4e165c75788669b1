//! Simulated batch job.

use serde::Serialize;

use crate::error::{SchedError, SchedResult};

/// Externally assigned job identifier.
pub type JobId = u64;

/// Represents a job state.
///
/// The state only moves forward, the single exception being [`Job::into_latent`].
#[derive(Eq, PartialEq, Copy, Clone, Debug, Serialize)]
pub enum JobStatus {
    /// Known only by id, referenced as a dependency before being specified.
    Latent,
    /// Specified, waiting for its dependencies or for memory.
    Waiting,
    /// Admitted into one of the priority levels.
    Running,
    /// All work is done.
    Complete,
}

/// Represents a job.
///
/// Dependency and successor edges are stored as ids and resolved through the
/// [`JobRegistry`](crate::registry::JobRegistry) which owns all jobs.
#[derive(Clone, Debug)]
pub struct Job {
    id: JobId,
    status: JobStatus,
    remaining_time: u64,
    original_burst_time: u64,
    memory_need: u64,
    dependencies: Vec<JobId>,
    successors: Vec<JobId>,
    longest_chain_depth: u64,
    inserted_at: Option<u64>,
    started_at: Option<u64>,
    completed_at: Option<u64>,
}

impl Job {
    /// Creates a placeholder job with only the id set.
    pub fn new_latent(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Latent,
            remaining_time: 0,
            original_burst_time: 0,
            memory_need: 0,
            dependencies: Vec::new(),
            successors: Vec::new(),
            longest_chain_depth: 0,
            inserted_at: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn remaining_time(&self) -> u64 {
        self.remaining_time
    }

    pub fn original_burst_time(&self) -> u64 {
        self.original_burst_time
    }

    pub fn memory_need(&self) -> u64 {
        self.memory_need
    }

    /// Jobs this job still waits for, in the order they were recorded.
    pub fn dependencies(&self) -> &[JobId] {
        &self.dependencies
    }

    /// Jobs waiting for this job, in the order they were recorded.
    pub fn successors(&self) -> &[JobId] {
        &self.successors
    }

    pub fn longest_chain_depth(&self) -> u64 {
        self.longest_chain_depth
    }

    pub fn set_longest_chain_depth(&mut self, depth: u64) {
        self.longest_chain_depth = depth;
    }

    pub fn inserted_at(&self) -> Option<u64> {
        self.inserted_at
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<u64> {
        self.completed_at
    }

    /// Turns a latent job into a waiting one.
    pub fn prepare(&mut self, burst_time: u64, memory_need: u64) -> SchedResult<()> {
        if self.status != JobStatus::Latent {
            return Err(SchedError::invalid_state(self.id, self.status, "prepare"));
        }
        self.remaining_time = burst_time;
        self.original_burst_time = burst_time;
        self.memory_need = memory_need;
        self.status = JobStatus::Waiting;
        Ok(())
    }

    pub(crate) fn set_inserted_at(&mut self, time: u64) {
        self.inserted_at = Some(time);
    }

    /// Moves a waiting job into a priority level.
    pub(crate) fn start(&mut self, time: u64) -> SchedResult<()> {
        if self.status != JobStatus::Waiting {
            return Err(SchedError::invalid_state(self.id, self.status, "start"));
        }
        self.status = JobStatus::Running;
        self.started_at = Some(time);
        Ok(())
    }

    pub(crate) fn set_completed_at(&mut self, time: u64) {
        self.completed_at = Some(time);
    }

    /// Runs the job for up to `slice` units and returns the amount of work actually performed.
    ///
    /// If the remaining time fits into the slice, the job is completed.
    pub fn decrease_time(&mut self, slice: u64) -> u64 {
        debug_assert_eq!(self.status, JobStatus::Running, "job {} is not running", self.id);
        if self.remaining_time <= slice {
            let consumed = self.remaining_time;
            self.remaining_time = 0;
            self.status = JobStatus::Complete;
            consumed
        } else {
            self.remaining_time -= slice;
            slice
        }
    }

    pub fn add_dependency(&mut self, id: JobId) {
        self.dependencies.push(id);
    }

    pub fn add_successor(&mut self, id: JobId) {
        self.successors.push(id);
    }

    /// Removes the dependency with the given id, keeping the order of the rest.
    pub fn remove_dependency(&mut self, id: JobId) {
        self.dependencies.retain(|&dep| dep != id);
    }

    pub fn remove_successor(&mut self, id: JobId) {
        self.successors.retain(|&succ| succ != id);
    }

    pub fn no_dependencies(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn no_successors(&self) -> bool {
        self.successors.is_empty()
    }

    /// Replaces the job with a fresh latent placeholder which keeps the id and the successor edges.
    pub fn into_latent(self) -> Job {
        let mut job = Job::new_latent(self.id);
        job.successors = self.successors;
        job.longest_chain_depth = self.longest_chain_depth;
        job
    }

    /// Time between submission and admission.
    pub fn latency(&self) -> Option<u64> {
        Some(self.started_at? - self.inserted_at?)
    }

    /// Time between submission and completion.
    pub fn response(&self) -> Option<u64> {
        Some(self.completed_at? - self.inserted_at?)
    }

    /// Time between admission and completion.
    pub fn turnaround(&self) -> Option<u64> {
        Some(self.completed_at? - self.started_at?)
    }
}
