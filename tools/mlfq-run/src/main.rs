use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use env_logger::Builder;

use mlfq_batch::{
    submit_lines, GeneratorParams, SchedError, SchedResult, Scheduler, SchedulerConfig, Simulation, WallClockPacer,
    Workload,
};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs a batch of jobs through the MLFQ scheduler and prints run statistics
struct Args {
    /// Time slice at the base priority level
    #[arg(required_unless_present = "config")]
    base_quantum: Option<u64>,

    /// Number of priority levels (at most BASE_QUANTUM)
    #[arg(required_unless_present = "config")]
    num_levels: Option<usize>,

    /// Give shorter slices to higher priority levels
    #[arg(short = 'q', long)]
    vary_quanta: bool,

    /// Weight slices by the length of the dependency chain gated by the job
    #[arg(short, long)]
    chain_weighting: bool,

    /// Total memory available to running jobs
    #[arg(long)]
    max_memory: Option<u64>,

    /// Path to YAML file with scheduler configuration (overrides positional arguments)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to file with jobs (YAML if the extension is .yaml or .yml, one job per line otherwise)
    #[arg(short, long)]
    jobs: Option<PathBuf>,

    /// Generate a random workload with the given number of jobs
    #[arg(short, long, conflicts_with = "jobs")]
    generate: Option<usize>,

    /// Random seed for the generated workload
    #[arg(short, long, default_value_t = 123)]
    seed: u64,

    /// Wall-clock delay per time unit in microseconds (no delay by default)
    #[arg(long)]
    pace_us: Option<u64>,

    /// Maximum number of dispatch iterations
    #[arg(long)]
    max_steps: Option<u64>,

    /// Path to produced JSON file with the trace log
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Path to produced JSON file with run statistics (stdout by default)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn build_config(args: &Args) -> SchedResult<SchedulerConfig> {
    let mut config = match (&args.config, args.base_quantum, args.num_levels) {
        (Some(path), _, _) => SchedulerConfig::from_yaml(path)?,
        (None, Some(base_quantum), Some(num_levels)) => SchedulerConfig::new(base_quantum, num_levels),
        _ => {
            return Err(SchedError::InvalidArgument(
                "either --config or BASE_QUANTUM and NUM_LEVELS are required".to_string(),
            ))
        }
    };
    if args.vary_quanta {
        config.vary_quanta = true;
    }
    if args.chain_weighting {
        config.chain_weighting = true;
    }
    if let Some(max_memory) = args.max_memory {
        config.max_memory = max_memory;
    }
    if args.trace.is_some() {
        config.trace = true;
    }
    config.validate()?;
    Ok(config)
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|ext| ext.to_str()), Some("yaml") | Some("yml"))
}

fn load_workload(args: &Args, sched: &mut Scheduler) -> SchedResult<Workload> {
    if let Some(count) = args.generate {
        let params = GeneratorParams {
            jobs: count,
            max_memory: sched.config().max_memory.min(GeneratorParams::default().max_memory),
            ..GeneratorParams::default()
        };
        return Ok(Workload::generate_seeded(args.seed, &params));
    }
    match &args.jobs {
        Some(path) if is_yaml(path) => Workload::from_yaml(path),
        Some(path) => {
            let report = submit_lines(sched, BufReader::new(File::open(path)?));
            log::info!(
                "{}: {} jobs submitted, {} lines skipped",
                path.display(),
                report.submitted,
                report.failed.len()
            );
            Ok(Workload::default())
        }
        None => Ok(Workload::default()),
    }
}

fn main() -> SchedResult<()> {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();

    let mut sched = Scheduler::new(build_config(&args)?)?;
    let workload = load_workload(&args, &mut sched)?;
    let mut sim = Simulation::new(sched, workload);
    if let Some(pace_us) = args.pace_us {
        sim = sim.with_pacer(Box::new(WallClockPacer::from_micros(pace_us)));
    }

    let summary = sim.run(args.max_steps);
    if !summary.unfinished_jobs.is_empty() {
        log::warn!("jobs left unfinished: {:?}", summary.unfinished_jobs);
    }

    if let (Some(path), Some(trace_log)) = (&args.trace, sim.scheduler().trace_log()) {
        trace_log.save_to_file(&path.to_string_lossy())?;
    }

    let json = serde_json::to_string_pretty(&summary).map_err(std::io::Error::from)?;
    match &args.output {
        Some(path) => File::create(path)?.write_all(json.as_bytes())?,
        None => println!("{}", json),
    }
    Ok(())
}
