//! Scheduling trace log.

use std::fs::File;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::job::JobId;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    JobSubmitted {
        time: u64,
        job_id: JobId,
        burst_time: u64,
        memory: u64,
        dependencies: Vec<JobId>,
    },
    JobAdmitted {
        time: u64,
        job_id: JobId,
        memory_used: u64,
    },
    JobSliced {
        time: u64,
        job_id: JobId,
        priority: usize,
        slice: u64,
        consumed: u64,
    },
    JobDemoted {
        time: u64,
        job_id: JobId,
        from: usize,
        to: usize,
    },
    JobCompleted {
        time: u64,
        job_id: JobId,
    },
    JobReleased {
        time: u64,
        job_id: JobId,
        by: JobId,
    },
    JobKilled {
        time: u64,
        job_id: JobId,
        latent: bool,
    },
}

impl Event {
    pub fn time(&self) -> u64 {
        match self {
            Event::JobSubmitted { time, .. }
            | Event::JobAdmitted { time, .. }
            | Event::JobSliced { time, .. }
            | Event::JobDemoted { time, .. }
            | Event::JobCompleted { time, .. }
            | Event::JobReleased { time, .. }
            | Event::JobKilled { time, .. } => *time,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::JobSubmitted { job_id, burst_time, .. } => write!(f, "submitted job {job_id} ({burst_time} units)"),
            Event::JobAdmitted { job_id, memory_used, .. } => {
                write!(f, "admitted job {job_id}, memory used {memory_used}")
            }
            Event::JobSliced {
                job_id,
                priority,
                consumed,
                ..
            } => write!(f, "ran job {job_id} at Q{priority} for {consumed} units"),
            Event::JobDemoted { job_id, from, to, .. } => write!(f, "moved job {job_id} from Q{from} to Q{to}"),
            Event::JobCompleted { job_id, .. } => write!(f, "completed job {job_id}"),
            Event::JobReleased { job_id, by, .. } => write!(f, "job {job_id} released by job {by}"),
            Event::JobKilled { job_id, latent, .. } => {
                if *latent {
                    write!(f, "killed job {job_id}, kept as latent")
                } else {
                    write!(f, "killed job {job_id}")
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
pub struct TraceLog {
    pub events: Vec<Event>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn save_to_file(&self, filename: &str) -> Result<(), std::io::Error> {
        File::create(filename)?.write_all(serde_json::to_string_pretty(&self)?.as_bytes())
    }
}
