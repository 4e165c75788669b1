use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::config::SchedulerConfig;
use crate::error::SchedError;
use crate::job::{JobId, JobStatus};
use crate::scheduler::{KillOutcome, Scheduler, StepOutcome};
use crate::trace_log::Event;
use crate::workload::{GeneratorParams, Workload};

fn scheduler(base_quantum: u64, num_levels: usize) -> Scheduler {
    Scheduler::new(SchedulerConfig::new(base_quantum, num_levels)).unwrap()
}

fn check_invariants(sched: &Scheduler) {
    let running_memory: u64 = sched
        .jobs()
        .iter()
        .filter(|job| job.status() == JobStatus::Running)
        .map(|job| job.memory_need())
        .sum();
    assert_eq!(sched.memory_used(), running_memory);
    assert!(sched.memory_used() <= sched.config().max_memory);

    for level in sched.levels() {
        for id in level.iter() {
            let job = sched.job(id).unwrap();
            assert_eq!(job.status(), JobStatus::Running);
            assert!(job.no_dependencies());
        }
    }
    for id in sched.memory_wait().iter() {
        let job = sched.job(id).unwrap();
        assert_eq!(job.status(), JobStatus::Waiting);
        assert!(job.no_dependencies());
    }
    for job in sched.jobs().iter() {
        let levels_holding = sched.levels().iter().filter(|level| level.contains(job.id())).count();
        let in_memory_wait = sched.memory_wait().contains(job.id());
        match job.status() {
            JobStatus::Running => assert_eq!(levels_holding, 1),
            JobStatus::Waiting => assert_eq!(in_memory_wait, job.no_dependencies()),
            _ => {
                assert_eq!(levels_holding, 0);
                assert!(!in_memory_wait);
            }
        }
    }
}

fn step_and_check(sched: &mut Scheduler, remaining: &mut Vec<(JobId, u64)>) -> StepOutcome {
    let outcome = sched.step();
    check_invariants(sched);
    for (id, prev) in remaining.iter() {
        if let Some(job) = sched.job(*id) {
            assert!(job.remaining_time() <= *prev);
        }
    }
    *remaining = sched
        .jobs()
        .iter()
        .filter(|job| job.status() == JobStatus::Running)
        .map(|job| (job.id(), job.remaining_time()))
        .collect();
    outcome
}

fn random_scheduler(rng: &mut Pcg64) -> Scheduler {
    let base_quantum = rng.gen_range(1..20);
    let num_levels = rng.gen_range(1..=base_quantum as usize);
    let config = SchedulerConfig::new(base_quantum, num_levels)
        .with_vary_quanta(rng.gen_bool(0.5))
        .with_chain_weighting(rng.gen_bool(0.5));
    Scheduler::new(config).unwrap()
}

#[test]
fn test_invariants_on_random_workloads() {
    let mut rng = Pcg64::seed_from_u64(123);
    for _ in 0..10 {
        let mut sched = random_scheduler(&mut rng);
        let mut workload = Workload::generate(&mut rng, &GeneratorParams::default());
        // dependencies are often submitted after their dependents and start as latent jobs
        workload.jobs.shuffle(&mut rng);
        for spec in workload.jobs.iter() {
            spec.submit_to(&mut sched).unwrap();
            check_invariants(&sched);
        }

        let mut remaining = Vec::new();
        while step_and_check(&mut sched, &mut remaining) != StepOutcome::Idle {}
        assert!(sched.jobs().iter().all(|job| job.status() == JobStatus::Complete));
        let total_burst: u64 = workload.jobs.iter().map(|spec| spec.burst_time).sum();
        assert_eq!(sched.snapshot_stats().total_clock_units_processed, total_burst);
        assert_eq!(sched.time(), total_burst);
    }
}

#[test]
fn test_invariants_with_random_kills() {
    let mut rng = Pcg64::seed_from_u64(456);
    let mut kills = 0;
    for _ in 0..10 {
        let mut sched = random_scheduler(&mut rng);
        let mut workload = Workload::generate(&mut rng, &GeneratorParams::default());
        workload.jobs.shuffle(&mut rng);
        for spec in workload.jobs.iter() {
            spec.submit_to(&mut sched).unwrap();
        }

        let mut remaining = Vec::new();
        while step_and_check(&mut sched, &mut remaining) != StepOutcome::Idle {
            if rng.gen_bool(0.1) {
                let id = rng.gen_range(1..=workload.len() as JobId);
                if sched.kill(id, true).is_ok() {
                    kills += 1;
                }
                check_invariants(&sched);
            }
        }
        assert_eq!(sched.memory_used(), 0);
        assert!(sched.memory_wait().is_empty());
        for job in sched.jobs().iter() {
            match job.status() {
                JobStatus::Complete | JobStatus::Latent => {}
                // blocked behind a job which was turned into a placeholder
                JobStatus::Waiting => assert!(!job.no_dependencies()),
                JobStatus::Running => panic!("job {} is still running", job.id()),
            }
        }
        assert_eq!(sched.snapshot_stats().total_clock_units_processed, sched.time());
    }
    assert!(kills > 0);
}

#[test]
fn test_registry_grows_with_submissions() {
    let config = SchedulerConfig::new(5, 1).with_registry_capacity(2);
    let mut sched = Scheduler::new(config).unwrap();
    for id in 1..=20 {
        sched.submit(id, 1, 10, &[id + 100]).unwrap();
    }
    assert_eq!(sched.jobs().len(), 40);
    assert!(sched.jobs().capacity() >= 64);
    for id in 1..=20 {
        assert_eq!(sched.lookup(id).unwrap().dependencies, vec![id + 100]);
        assert_eq!(sched.lookup(id + 100).unwrap().status, JobStatus::Latent);
    }
}

#[test]
fn test_huge_quantum_saturates() {
    let config = SchedulerConfig::new(u64::MAX / 2, 1).with_chain_weighting(true);
    let mut sched = Scheduler::new(config).unwrap();
    sched.submit(3, 5, 10, &[2]).unwrap();
    sched.submit(2, 5, 10, &[1]).unwrap();
    sched.submit(1, u64::MAX, 10, &[]).unwrap();
    assert_eq!(
        sched.step(),
        StepOutcome::Completed {
            job_id: 1,
            priority: 0,
            slice: u64::MAX,
            consumed: u64::MAX
        }
    );
    assert_eq!(sched.time(), u64::MAX);

    sched.run_until_idle();
    assert_eq!(sched.time(), u64::MAX);
    let stats = sched.snapshot_stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.total_clock_units_processed, u64::MAX);
}

#[test]
fn test_admission_near_memory_limit() {
    let mut sched = Scheduler::new(SchedulerConfig::new(5, 1).with_max_memory(u64::MAX)).unwrap();
    sched.submit(1, 10, u64::MAX - 1, &[]).unwrap();
    sched.submit(2, 10, 5, &[]).unwrap();
    sched.step();
    assert_eq!(sched.memory_used(), u64::MAX - 1);
    assert_eq!(sched.lookup(2).unwrap().status, JobStatus::Waiting);
    sched.run_until_idle();
    assert_eq!(sched.snapshot_stats().completed, 2);
}

#[test]
fn test_demotion_to_base_level() {
    let mut sched = scheduler(4, 3);
    sched.submit(1, 20, 10, &[]).unwrap();

    let mut levels = Vec::new();
    loop {
        match sched.step() {
            StepOutcome::Preempted { from, to, slice, .. } => {
                assert_eq!(slice, 4);
                assert_eq!(to, from.saturating_sub(1));
                levels.push(from);
            }
            StepOutcome::Completed { priority, consumed, .. } => {
                assert_eq!(priority, 0);
                assert_eq!(consumed, 4);
                break;
            }
            StepOutcome::Idle => unreachable!(),
        }
    }
    assert_eq!(levels, vec![2, 1, 0, 0]);
    assert_eq!(sched.time(), 20);
}

#[test]
fn test_round_robin_at_base_level() {
    let mut sched = scheduler(2, 1);
    sched.submit(1, 4, 10, &[]).unwrap();
    sched.submit(2, 4, 10, &[]).unwrap();

    let mut order = Vec::new();
    loop {
        match sched.step() {
            StepOutcome::Preempted { job_id, .. } | StepOutcome::Completed { job_id, .. } => order.push(job_id),
            StepOutcome::Idle => break,
        }
    }
    assert_eq!(order, vec![1, 2, 1, 2]);
}

#[test]
fn test_vary_quanta_slices() {
    let config = SchedulerConfig::new(12, 3).with_vary_quanta(true);
    let mut sched = Scheduler::new(config).unwrap();
    sched.submit(1, 30, 10, &[]).unwrap();

    let mut slices = Vec::new();
    while sched.step() != StepOutcome::Idle {
        slices.push(sched.snapshot_status().last_slice.unwrap());
    }
    assert_eq!(slices, vec![4, 8, 12, 12]);
    assert_eq!(sched.time(), 30);
}

#[test]
fn test_chain_depth_and_weighted_slice() {
    let config = SchedulerConfig::new(5, 1).with_chain_weighting(true);
    let mut sched = Scheduler::new(config).unwrap();
    sched.submit(3, 5, 10, &[2]).unwrap();
    assert_eq!(sched.lookup(2).unwrap().longest_chain_depth, 1);
    sched.submit(2, 5, 10, &[1]).unwrap();
    assert_eq!(sched.lookup(1).unwrap().longest_chain_depth, 2);

    // shorter chain does not lower the depth
    sched.submit(4, 5, 10, &[1]).unwrap();
    assert_eq!(sched.lookup(1).unwrap().longest_chain_depth, 2);
    assert_eq!(sched.lookup(2).unwrap().longest_chain_depth, 1);
    assert_eq!(sched.lookup(3).unwrap().longest_chain_depth, 0);

    sched.submit(1, 100, 10, &[]).unwrap();
    match sched.step() {
        StepOutcome::Preempted { job_id, slice, .. } => {
            assert_eq!(job_id, 1);
            assert_eq!(slice, 15);
        }
        outcome => panic!("unexpected outcome {:?}", outcome),
    }
    assert_eq!(sched.lookup(1).unwrap().remaining_time, Some(85));
}

#[test]
fn test_chain_depth_propagates_below() {
    let config = SchedulerConfig::new(5, 1).with_chain_weighting(true);
    let mut sched = Scheduler::new(config).unwrap();
    sched.submit(2, 5, 10, &[1]).unwrap();
    sched.submit(3, 5, 10, &[2]).unwrap();
    assert_eq!(sched.lookup(2).unwrap().longest_chain_depth, 1);
    assert_eq!(sched.lookup(1).unwrap().longest_chain_depth, 2);
}

#[test]
fn test_chain_depth_ignored_without_weighting() {
    let mut sched = scheduler(5, 1);
    sched.submit(2, 5, 10, &[1]).unwrap();
    assert_eq!(sched.lookup(1).unwrap().longest_chain_depth, 0);
}

#[test]
fn test_cycles_are_rejected() {
    let mut sched = scheduler(5, 1);
    assert!(matches!(sched.submit(5, 5, 10, &[5]), Err(SchedError::InvalidArgument(_))));
    assert!(matches!(sched.lookup(5), Err(SchedError::NotFound(5))));

    sched.submit(2, 5, 10, &[1]).unwrap();
    assert!(matches!(sched.submit(1, 5, 10, &[2]), Err(SchedError::InvalidArgument(_))));
    let job1 = sched.lookup(1).unwrap();
    assert_eq!(job1.status, JobStatus::Latent);
    assert!(job1.dependencies.is_empty());
    assert_eq!(job1.successors, vec![2]);

    sched.submit(3, 5, 10, &[2]).unwrap();
    assert!(matches!(sched.submit(1, 5, 10, &[3]), Err(SchedError::InvalidArgument(_))));
    assert!(sched.lookup(3).unwrap().successors.is_empty());
}

#[test]
fn test_duplicate_dependencies_collapsed() {
    let mut sched = scheduler(5, 1);
    sched.submit(2, 5, 10, &[1, 1]).unwrap();
    assert_eq!(sched.lookup(2).unwrap().dependencies, vec![1]);
    assert_eq!(sched.lookup(1).unwrap().successors, vec![2]);
}

#[test]
fn test_completed_dependency_is_skipped() {
    let mut sched = scheduler(5, 1);
    sched.submit(1, 1, 10, &[]).unwrap();
    sched.run_until_idle();
    sched.submit(2, 1, 10, &[1]).unwrap();
    assert!(sched.lookup(2).unwrap().dependencies.is_empty());
    assert!(sched.lookup(1).unwrap().successors.is_empty());
    assert_eq!(sched.memory_wait().iter().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn test_successors_released_in_order() {
    let mut sched = scheduler(5, 2);
    sched.submit(3, 5, 10, &[1]).unwrap();
    sched.submit(2, 5, 10, &[1]).unwrap();
    sched.submit(1, 1, 0, &[]).unwrap();
    assert!(matches!(sched.step(), StepOutcome::Completed { job_id: 1, .. }));
    assert_eq!(sched.memory_wait().iter().collect::<Vec<_>>(), vec![3, 2]);
}

#[test]
fn test_bad_submissions() {
    let mut sched = scheduler(5, 1);
    assert!(matches!(sched.submit(1, 0, 10, &[]), Err(SchedError::InvalidArgument(_))));
    assert!(matches!(sched.submit(1, 5, 1001, &[]), Err(SchedError::InvalidArgument(_))));
    assert!(matches!(sched.lookup(1), Err(SchedError::NotFound(1))));
    sched.submit(1, 5, 1000, &[]).unwrap();
    assert!(matches!(
        sched.submit(1, 5, 10, &[]),
        Err(SchedError::InvalidState {
            id: 1,
            status: JobStatus::Waiting,
            ..
        })
    ));
}

#[test]
fn test_stats_undefined_before_completion() {
    let mut sched = scheduler(5, 1);
    let stats = sched.snapshot_stats();
    assert_eq!(stats.completed, 0);
    assert!(stats.throughput.is_none());
    assert!(stats.avg_latency.is_none());
    assert!(stats.avg_turnaround_per_burst.is_none());

    sched.submit(1, 10, 10, &[]).unwrap();
    sched.step();
    let stats = sched.snapshot_stats();
    assert!(stats.avg_response.is_none());
    assert_eq!(stats.total_clock_units_processed, 5);
}

#[test]
fn test_stats_values() {
    let mut sched = scheduler(5, 1);
    sched.submit(1, 10, 100, &[]).unwrap();
    sched.submit(2, 5, 100, &[]).unwrap();
    assert_eq!(sched.run_until_idle(), 3);

    let stats = sched.snapshot_stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.throughput, Some(2. / 15.));
    assert_eq!(stats.avg_latency, Some(0.));
    assert_eq!(stats.avg_response, Some(12.5));
    assert_eq!(stats.avg_turnaround, Some(12.5));
    assert_eq!(stats.avg_turnaround_per_burst, Some(1.75));
    assert_eq!(stats.total_clock_units_processed, 15);
}

#[test]
fn test_latency_of_memory_convoy() {
    let mut sched = scheduler(5, 1);
    sched.submit(1, 5, 600, &[]).unwrap();
    sched.submit(2, 5, 600, &[]).unwrap();
    sched.run_until_idle();
    let stats = sched.snapshot_stats();
    assert_eq!(stats.avg_latency, Some(2.5));
    assert_eq!(stats.avg_latency_per_burst, Some(0.5));
}

#[test]
fn test_status_snapshot() {
    let mut sched = scheduler(5, 2);
    assert_eq!(sched.snapshot_status().current_job, None);
    sched.submit(1, 12, 100, &[]).unwrap();
    sched.submit(2, 3, 200, &[]).unwrap();

    sched.step();
    let status = sched.snapshot_status();
    assert_eq!(status.level_sizes, vec![1, 1]);
    assert_eq!(status.memory_wait_size, 0);
    assert_eq!(status.memory_used, 300);
    assert_eq!(status.current_job, Some(1));
    assert_eq!(status.current_priority, Some(0));
    assert_eq!(status.remaining_time_of_current, Some(7));
    assert_eq!(status.last_slice, Some(5));

    sched.step();
    let status = sched.snapshot_status();
    assert_eq!(status.current_job, Some(2));
    assert_eq!(status.current_priority, Some(1));
    assert_eq!(status.remaining_time_of_current, Some(0));
    assert_eq!(status.memory_used, 100);

    sched.run_until_idle();
    assert_eq!(sched.snapshot_status().current_job, None);
}

#[test]
fn test_kill_rejected() {
    let mut sched = scheduler(5, 1);
    assert!(matches!(sched.kill(1, true), Err(SchedError::NotFound(1))));
    sched.submit(2, 1, 10, &[1]).unwrap();
    assert!(matches!(
        sched.kill(1, true),
        Err(SchedError::InvalidState {
            status: JobStatus::Latent,
            ..
        })
    ));
    sched.submit(3, 1, 10, &[]).unwrap();
    sched.run_until_idle();
    assert!(matches!(
        sched.kill(3, true),
        Err(SchedError::InvalidState {
            status: JobStatus::Complete,
            ..
        })
    ));
}

#[test]
fn test_kill_waiting_job() {
    let mut sched = scheduler(5, 1);
    sched.submit(1, 5, 10, &[]).unwrap();
    assert_eq!(sched.kill(1, false).unwrap(), KillOutcome::Removed);
    assert!(matches!(sched.lookup(1), Err(SchedError::NotFound(1))));
    assert!(sched.memory_wait().is_empty());

    sched.submit(3, 5, 10, &[2]).unwrap();
    assert_eq!(sched.kill(3, false).unwrap(), KillOutcome::Removed);
    assert!(sched.lookup(2).unwrap().successors.is_empty());
    assert_eq!(sched.run_until_idle(), 0);
}

#[test]
fn test_kill_running_job() {
    let mut sched = scheduler(5, 1);
    sched.submit(1, 10, 300, &[]).unwrap();
    sched.step();
    assert_eq!(
        sched.kill(1, false).unwrap(),
        KillOutcome::ConfirmationRequired { successors: vec![] }
    );
    assert_eq!(sched.lookup(1).unwrap().status, JobStatus::Running);

    assert_eq!(sched.kill(1, true).unwrap(), KillOutcome::Removed);
    assert!(matches!(sched.lookup(1), Err(SchedError::NotFound(1))));
    assert_eq!(sched.memory_used(), 0);
    assert!(sched.levels()[0].is_empty());
    assert_eq!(sched.snapshot_status().current_job, None);
    assert_eq!(sched.step(), StepOutcome::Idle);
}

#[test]
fn test_kill_running_job_with_successors() {
    let mut sched = scheduler(5, 1);
    sched.submit(2, 5, 10, &[1]).unwrap();
    sched.submit(1, 10, 300, &[]).unwrap();
    sched.step();
    assert_eq!(
        sched.kill(1, false).unwrap(),
        KillOutcome::ConfirmationRequired { successors: vec![2] }
    );
    assert_eq!(sched.kill(1, true).unwrap(), KillOutcome::ConvertedToLatent);

    let job1 = sched.lookup(1).unwrap();
    assert_eq!(job1.status, JobStatus::Latent);
    assert_eq!(job1.successors, vec![2]);
    assert_eq!(sched.memory_used(), 0);
    assert_eq!(sched.lookup(2).unwrap().dependencies, vec![1]);
    assert_eq!(sched.run_until_idle(), 0);

    // the placeholder can be specified again
    sched.submit(1, 1, 10, &[]).unwrap();
    sched.run_until_idle();
    assert_eq!(sched.lookup(2).unwrap().status, JobStatus::Complete);
}

#[test]
fn test_trace_log() {
    let config = SchedulerConfig::new(5, 1).with_trace(true);
    let mut sched = Scheduler::new(config).unwrap();
    sched.submit(2, 3, 10, &[1]).unwrap();
    sched.submit(1, 7, 10, &[]).unwrap();
    sched.run_until_idle();

    let events = &sched.trace_log().unwrap().events;
    let types: Vec<&str> = events
        .iter()
        .map(|event| match event {
            Event::JobSubmitted { .. } => "submitted",
            Event::JobAdmitted { .. } => "admitted",
            Event::JobSliced { .. } => "sliced",
            Event::JobDemoted { .. } => "demoted",
            Event::JobCompleted { .. } => "completed",
            Event::JobReleased { .. } => "released",
            Event::JobKilled { .. } => "killed",
        })
        .collect();
    assert_eq!(
        types,
        vec![
            "submitted",
            "submitted",
            "admitted",
            "sliced",
            "demoted",
            "sliced",
            "completed",
            "released",
            "admitted",
            "sliced",
            "completed"
        ]
    );
    assert!(events.windows(2).all(|pair| pair[0].time() <= pair[1].time()));
    assert_eq!(events.last().unwrap().time(), 10);

    assert!(scheduler(5, 1).trace_log().is_none());
}
