use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use rcpsp_lib::data_generators::task_graphs::RandomTaskGraph;
use rcpsp_lib::data_structures::{TaskGraph, TaskSpec, MAX_RESOURCE_DEFAULT};
use rcpsp_lib::io;
use rcpsp_lib::simulation::{run_simulations, SimulationConfig, SimulationReport};

#[derive(Parser, Debug)]
#[command(about = "Estimate the achievable makespan of a project by Monte-Carlo simulation.")]
#[command(next_line_help = true)]
struct Cli {
    #[command(subcommand)]
    source: Source,
}

#[derive(Subcommand, Debug)]
enum Source {
    /// Simulate the task list from a json file (an array of task records).
    File {
        /// Path of the task list.
        path: PathBuf,

        #[command(flatten)]
        options: Options,
    },
    /// Generate a random project instance and simulate it.
    Random {
        /// Number of tasks in the generated project.
        #[arg(long, default_value_t = 50)]
        n_tasks: u32,

        /// Maximum number of predecessors drawn per task.
        #[arg(long, default_value_t = 3)]
        max_preds: u32,

        /// Durations are drawn uniformly from 1..=max_duration.
        #[arg(long, default_value_t = 10)]
        max_duration: u32,

        /// Demands are drawn uniformly from 1..=max_task_resource.
        #[arg(long, default_value_t = 5)]
        max_task_resource: u32,

        /// Seed of the instance generator.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[command(flatten)]
        options: Options,
    },
}

#[derive(Args, Debug)]
struct Options {
    /// Number of random orderings to generate and evaluate.
    #[arg(short, long, default_value_t = 1_000_000)]
    iterations: u64,

    /// Worker threads. Defaults to min(32, 2 x available CPUs).
    #[arg(short, long)]
    workers: Option<usize>,

    /// Capacity of the shared resource.
    #[arg(short, long, default_value_t = MAX_RESOURCE_DEFAULT)]
    max_resource: u32,

    /// Base seed; simulation i seeds its generator with seed_base + i.
    #[arg(long, default_value_t = 0)]
    seed_base: u64,

    /// Reservoir size behind the approximate median.
    #[arg(long, default_value_t = 10_000)]
    sample_size: usize,

    /// Simulations dispatched to a worker at a time.
    #[arg(long, default_value_t = 256)]
    chunksize: u64,

    /// Leave the best ordering out of the report.
    #[arg(long, default_value_t = false)]
    skip_best_order: bool,

    /// Directory for the detailed best-order log file.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Sampling step of the log file's resource profile.
    #[arg(long)]
    log_time_unit: Option<f64>,

    /// Fold results in dispatch order for a reproducible median.
    #[arg(long, default_value_t = false)]
    deterministic_sample: bool,

    /// Don't draw the progress bar.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Also write the report as json to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append a one-line summary to this csv file.
    #[arg(long)]
    stats_csv: Option<PathBuf>,
}

/// Row appended to the optional statistics csv.
#[derive(Serialize)]
struct SummaryRow {
    iterations: u64,
    workers: usize,
    max_resource: u32,
    avg: Option<f64>,
    std: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    median_approx: Option<f64>,
    best_makespan: Option<u64>,
    elapsed_seconds: f64,
}

impl SummaryRow {
    fn new(report: &SimulationReport) -> Self {
        Self {
            iterations: report.iterations,
            workers: report.workers,
            max_resource: report.max_resource,
            avg: report.stats.avg,
            std: report.stats.std,
            min: report.stats.min,
            max: report.stats.max,
            median_approx: report.stats.median_approx,
            best_makespan: report.best.as_ref().map(|best| best.makespan),
            elapsed_seconds: report.stats.elapsed_seconds,
        }
    }
}

fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap();

    if let Err(why) = run(Cli::parse()) {
        log::error!("{}", why);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (tasks, options) = match cli.source {
        Source::File { path, options } => {
            let tasks: Vec<TaskSpec> = io::json::read_json_from_file(&path)?;
            log::info!("Loaded {} tasks from {}.", tasks.len(), path.display());
            (tasks, options)
        }
        Source::Random {
            n_tasks,
            max_preds,
            max_duration,
            max_task_resource,
            seed,
            options,
        } => {
            let generator = RandomTaskGraph {
                n_tasks,
                max_preds,
                max_duration,
                max_task_resource,
            };
            log::info!("Generated a random project with {} tasks (seed {}).", n_tasks, seed);
            (generator.generate(seed), options)
        }
    };

    let graph = TaskGraph::new(&tasks, options.max_resource)?;
    let config = SimulationConfig {
        iterations: options.iterations,
        workers: options.workers,
        seed_base: options.seed_base,
        sample_size: options.sample_size,
        chunksize: options.chunksize,
        return_best_order: !options.skip_best_order,
        log_dir: options.log_dir.clone(),
        log_time_unit: options.log_time_unit,
        deterministic_sample: options.deterministic_sample,
        show_progress: !options.quiet,
    };

    let report = run_simulations(&graph, &config)?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = &options.output {
        io::json::write_json_to_file(path, &report)?;
        log::info!("Report written to {}.", path.display());
    }
    if let Some(path) = &options.stats_csv {
        io::csv::append_to_file(path, &SummaryRow::new(&report))?;
        log::info!("Summary appended to {}.", path.display());
    }

    Ok(())
}
