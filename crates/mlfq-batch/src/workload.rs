//! Job workloads: batch files, YAML files and random generation.

use std::io::BufRead;
use std::path::Path;

use rand::prelude::*;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::error::{SchedError, SchedResult};
use crate::job::JobId;
use crate::scheduler::Scheduler;
use crate::{log_debug, log_warn};

/// Job description as supplied by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    pub burst_time: u64,
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub dependencies: Vec<JobId>,
    /// Clock value at which the job is submitted.
    #[serde(default)]
    pub arrival: u64,
}

impl JobSpec {
    pub fn new(id: JobId, burst_time: u64, memory: u64) -> Self {
        Self {
            id,
            burst_time,
            memory,
            dependencies: Vec::new(),
            arrival: 0,
        }
    }

    pub fn with_dependencies(mut self, dependencies: &[JobId]) -> Self {
        self.dependencies = dependencies.to_vec();
        self
    }

    pub fn with_arrival(mut self, arrival: u64) -> Self {
        self.arrival = arrival;
        self
    }

    pub fn submit_to(&self, scheduler: &mut Scheduler) -> SchedResult<()> {
        scheduler.submit(self.id, self.burst_time, self.memory, &self.dependencies)
    }
}

// BATCH FORMAT ////////////////////////////////////////////////////////////////////////////////////////////////////////

fn parse_field(line: usize, name: &str, value: &str) -> SchedResult<u64> {
    let number: i64 = value.parse().map_err(|_| SchedError::Malformed {
        line,
        reason: format!("{} is not a number: {:?}", name, value),
    })?;
    u64::try_from(number).map_err(|_| SchedError::InvalidArgument(format!("line {}: negative {}", line, name)))
}

/// Parses one line of a batch file: `<id> <burst time> <memory> [<dependency id> ...]`.
///
/// Returns `None` for blank lines and `#` comments.
pub fn parse_line(line: usize, text: &str) -> SchedResult<Option<JobSpec>> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(SchedError::Malformed {
            line,
            reason: format!("expected at least 3 fields, got {}", fields.len()),
        });
    }
    let id = parse_field(line, "id", fields[0])?;
    let burst_time = parse_field(line, "burst time", fields[1])?;
    let memory = parse_field(line, "memory", fields[2])?;
    let dependencies = fields[3..]
        .iter()
        .map(|field| parse_field(line, "dependency", field))
        .collect::<SchedResult<Vec<_>>>()?;
    Ok(Some(JobSpec::new(id, burst_time, memory).with_dependencies(&dependencies)))
}

/// Outcome of a batch submission.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub submitted: usize,
    /// Failed lines with their (1-based) numbers.
    pub failed: Vec<(usize, SchedError)>,
}

/// Submits every job from a batch file. Bad lines are reported and skipped.
pub fn submit_lines<R: BufRead>(scheduler: &mut Scheduler, reader: R) -> BatchReport {
    let mut report = BatchReport::default();
    for (idx, text) in reader.lines().enumerate() {
        let line = idx + 1;
        let result = text
            .map_err(SchedError::from)
            .and_then(|text| parse_line(line, &text))
            .and_then(|spec| match spec {
                Some(spec) => spec.submit_to(scheduler).map(|_| true),
                None => Ok(false),
            });
        match result {
            Ok(true) => report.submitted += 1,
            Ok(false) => {}
            Err(e) => {
                log_warn!(scheduler, "skipped line {}: {}", line, e);
                report.failed.push((line, e));
            }
        }
    }
    log_debug!(
        scheduler,
        "batch done: {} submitted, {} failed",
        report.submitted,
        report.failed.len()
    );
    report
}

// WORKLOAD ////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Parameters of a random workload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratorParams {
    pub jobs: usize,
    pub max_burst: u64,
    pub max_memory: u64,
    /// Probability that a job depends on some earlier job.
    pub dependency_probability: f64,
    pub max_dependencies: usize,
    /// Arrivals are spread uniformly over `[0, max_arrival]`.
    pub max_arrival: u64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            jobs: 100,
            max_burst: 100,
            max_memory: 300,
            dependency_probability: 0.3,
            max_dependencies: 3,
            max_arrival: 0,
        }
    }
}

/// A list of jobs to be fed to the scheduler.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Workload {
    pub jobs: Vec<JobSpec>,
}

impl Workload {
    /// Reads a workload from a YAML file of the form `jobs: [{id, burst_time, memory, dependencies, arrival}]`.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> SchedResult<Self> {
        Ok(serde_yaml::from_str(&std::fs::read_to_string(path)?)?)
    }

    /// Reads a workload from a batch file.
    ///
    /// Unlike [`submit_lines`], the first bad line aborts the reading.
    pub fn from_lines<P: AsRef<Path>>(path: P) -> SchedResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut jobs = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if let Some(spec) = parse_line(idx + 1, line)? {
                jobs.push(spec);
            }
        }
        Ok(Self { jobs })
    }

    /// Generates a random workload. Jobs only depend on jobs generated before them, so there are no cycles.
    pub fn generate<R: Rng>(rng: &mut R, params: &GeneratorParams) -> Self {
        let mut jobs: Vec<JobSpec> = Vec::with_capacity(params.jobs);
        for i in 0..params.jobs {
            let mut spec = JobSpec::new(
                i as JobId + 1,
                rng.gen_range(1..=params.max_burst.max(1)),
                rng.gen_range(0..=params.max_memory),
            );
            if i > 0 && params.max_dependencies > 0 && rng.gen_bool(params.dependency_probability) {
                let count = rng.gen_range(1..=params.max_dependencies.min(i));
                let mut dependencies: Vec<JobId> = (1..=i as JobId).choose_multiple(rng, count);
                dependencies.sort();
                spec.dependencies = dependencies;
            }
            spec.arrival = rng.gen_range(0..=params.max_arrival);
            jobs.push(spec);
        }
        jobs.sort_by_key(|spec| spec.arrival);
        Self { jobs }
    }

    /// Same as [`generate`](Workload::generate) with a PCG generator seeded from `seed`.
    pub fn generate_seeded(seed: u64, params: &GeneratorParams) -> Self {
        Self::generate(&mut Pcg64::seed_from_u64(seed), params)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
