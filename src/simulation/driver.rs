use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use rayon::prelude::*;

use crate::algorithms::graphs::topological_ordering::random_topological_order;
use crate::algorithms::scheduling::resource_constrained::{makespan_for_order, InvalidOrderError};
use crate::data_structures::TaskGraph;

use super::aggregation::{ReservoirSample, WelfordAggregation};
use super::report::package_report;
use super::{SimulationConfig, SimulationError};

/// Offset separating the reservoir's generator from the simulation seeds.
const SAMPLE_SEED_OFFSET: u64 = 9999;

/// Makespan and the ordering that produced it, in node positions.
type SimulationOutcome = (u64, Vec<u32>);

/// One simulation: a fresh generator seeded with `seed` draws a random
/// topological ordering, which is then simulated to its makespan.
fn single_simulation(graph: &TaskGraph, seed: u64) -> Result<SimulationOutcome, InvalidOrderError> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let order = random_topological_order(graph, &mut rng);
    let makespan = makespan_for_order(graph, &order)?;
    Ok((makespan, order))
}

/// Single-threaded fold of the result stream: Welford statistics, the
/// median reservoir and the best ordering seen so far.
pub(super) struct ResultFolder {
    pub(super) aggregation: WelfordAggregation,
    pub(super) reservoir: ReservoirSample<Pcg64>,
    pub(super) best: Option<SimulationOutcome>,
    resequence: bool,
    next_chunk: u64,
    held_back: BTreeMap<u64, Vec<SimulationOutcome>>,
}

impl ResultFolder {
    fn new(config: &SimulationConfig) -> Self {
        let sample_rng = Pcg64::seed_from_u64(config.seed_base.wrapping_add(SAMPLE_SEED_OFFSET));
        Self {
            aggregation: WelfordAggregation::default(),
            reservoir: ReservoirSample::new(config.sample_size, sample_rng),
            best: None,
            resequence: config.deterministic_sample,
            next_chunk: 0,
            held_back: BTreeMap::new(),
        }
    }

    fn fold_chunk(&mut self, chunk: u64, outcomes: Vec<SimulationOutcome>) {
        if self.resequence {
            self.held_back.insert(chunk, outcomes);
            while let Some(ready) = self.held_back.remove(&self.next_chunk) {
                self.next_chunk += 1;
                ready.into_iter().for_each(|outcome| self.fold(outcome));
            }
        } else {
            outcomes.into_iter().for_each(|outcome| self.fold(outcome));
        }
    }

    fn fold(&mut self, (makespan, order): SimulationOutcome) {
        self.aggregation.push(makespan as f64);
        self.reservoir.push(makespan as f64);
        let improves = self.best.as_ref().is_none_or(|(best, _)| makespan < *best);
        if improves {
            self.best = Some((makespan, order));
        }
    }
}

fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, usize::from);
    (2 * cpus).clamp(1, 32)
}

fn progress_bar(config: &SimulationConfig) -> ProgressBar {
    if !config.show_progress {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(config.iterations);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {human_pos}/{human_len} {per_sec}, {eta}",
        )
        .expect("Static template string should be ok."),
    );
    progress
}

/// Estimate the achievable makespan of `graph` by Monte-Carlo sampling.
///
/// Simulation `i` (for `i` in `0..iterations`) seeds its own generator
/// with `seed_base + i`, so a run is fully described by the graph and the
/// configuration. Seeds are dispatched to the worker pool in chunks of
/// `chunksize`; finished chunks stream back through a bounded channel and
/// are folded on the calling thread, so memory stays bounded by a few
/// chunks regardless of `iterations`.
///
/// A simulation error (only possible on cyclic input) aborts the run and
/// discards all partial statistics. Failures while writing the optional
/// best-order log file are reported as warnings inside the result instead.
pub fn run_simulations(
    graph: &TaskGraph,
    config: &SimulationConfig,
) -> Result<super::SimulationReport, SimulationError> {
    if config.iterations == 0 {
        return Err(SimulationError::InvalidParameter("iterations must be at least 1"));
    }
    if config.chunksize == 0 {
        return Err(SimulationError::InvalidParameter("chunksize must be at least 1"));
    }

    let workers = config.workers.unwrap_or_else(default_workers).max(1);
    let started = Instant::now();
    let mut folder = ResultFolder::new(config);

    if graph.is_empty() {
        // nothing to schedule; the statistics stay degenerate (count 0)
        return Ok(package_report(graph, config, workers, folder, started.elapsed()));
    }

    log::info!(
        "Estimate makespan of {} tasks: {} simulations on {} workers (chunks of {}).",
        graph.num_tasks(),
        config.iterations,
        workers,
        config.chunksize
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|why| SimulationError::WorkerPool(why.to_string()))?;

    let iterations = config.iterations;
    let chunksize = config.chunksize;
    let chunk_count = iterations.div_ceil(chunksize);
    let seed_base = config.seed_base;

    let progress = progress_bar(config);
    let (sender, receiver) = mpsc::sync_channel(2 * workers);
    let mut failure: Option<InvalidOrderError> = None;

    pool.in_place_scope(|scope| {
        scope.spawn(move |_| {
            (0..chunk_count)
                .into_par_iter()
                .for_each_with(sender, |sender, chunk| {
                    let first = chunk * chunksize;
                    let last = (first + chunksize).min(iterations);
                    let outcomes: Result<Vec<SimulationOutcome>, InvalidOrderError> = (first..last)
                        .map(|i| single_simulation(graph, seed_base.wrapping_add(i)))
                        .collect();
                    // the send only fails when the run was already aborted
                    sender.send((chunk, outcomes)).ok();
                });
        });

        for (chunk, outcomes) in receiver.iter() {
            if failure.is_some() {
                continue; // drain so that no worker blocks on the channel
            }
            match outcomes {
                Err(why) => failure = Some(why),
                Ok(outcomes) => {
                    progress.inc(outcomes.len() as u64);
                    folder.fold_chunk(chunk, outcomes);
                }
            }
        }
    });

    progress.finish_and_clear();

    if let Some(why) = failure {
        return Err(SimulationError::Worker(why));
    }

    log::info!(
        "Finished {} simulations in {:.3} s.",
        config.iterations,
        started.elapsed().as_secs_f64()
    );

    Ok(package_report(graph, config, workers, folder, started.elapsed()))
}

#[cfg(test)]
mod test {
    use crate::data_structures::TaskSpec;

    use super::super::SimulationReport;
    use super::*;

    fn diamond() -> TaskGraph {
        let tasks = [
            TaskSpec { id: 1, duration: 1, resource: 1, preds: vec![] },
            TaskSpec { id: 2, duration: 2, resource: 1, preds: vec![1] },
            TaskSpec { id: 3, duration: 3, resource: 1, preds: vec![1] },
            TaskSpec { id: 4, duration: 1, resource: 1, preds: vec![2, 3] },
        ];
        TaskGraph::new(&tasks, 10).unwrap()
    }

    fn config(iterations: u64, workers: usize) -> SimulationConfig {
        SimulationConfig {
            iterations,
            workers: Some(workers),
            sample_size: 100,
            chunksize: 64,
            deterministic_sample: true,
            ..SimulationConfig::default()
        }
    }

    fn assert_same_report(a: &SimulationReport, b: &SimulationReport) {
        assert_eq!(a.stats.avg, b.stats.avg);
        assert_eq!(a.stats.std, b.stats.std);
        assert_eq!(a.stats.min, b.stats.min);
        assert_eq!(a.stats.max, b.stats.max);
        assert_eq!(a.stats.median_approx, b.stats.median_approx);
        assert_eq!(a.stats.sample_size_used, b.stats.sample_size_used);
        let (best_a, best_b) = (a.best.as_ref().unwrap(), b.best.as_ref().unwrap());
        assert_eq!(best_a.makespan, best_b.makespan);
        assert_eq!(best_a.order, best_b.order);
        assert_eq!(best_a.order_topological, best_b.order_topological);
    }

    #[test]
    fn test_diamond_statistics() {
        let report = run_simulations(&diamond(), &config(1000, 1)).unwrap();

        // every valid ordering of the diamond yields makespan 5
        assert_eq!(report.iterations, 1000);
        assert_eq!(report.stats.avg, Some(5.0));
        assert_eq!(report.stats.std, Some(0.0));
        assert_eq!(report.stats.min, Some(5.0));
        assert_eq!(report.stats.max, Some(5.0));
        assert_eq!(report.stats.median_approx, Some(5.0));
        assert_eq!(report.stats.sample_size_used, 100);
        assert_eq!(report.best.as_ref().unwrap().makespan, 5);
    }

    #[test]
    fn test_identical_runs_reproduce_the_report() {
        let graph = diamond();
        let first = run_simulations(&graph, &config(1000, 1)).unwrap();
        let second = run_simulations(&graph, &config(1000, 1)).unwrap();
        assert_same_report(&first, &second);
    }

    #[test]
    fn test_worker_count_does_not_change_the_report() {
        // with dispatch-order folding the report is independent of how
        // chunks were scheduled across threads
        let graph = diamond();
        let serial = run_simulations(&graph, &config(2000, 1)).unwrap();
        let parallel = run_simulations(&graph, &config(2000, 4)).unwrap();
        assert_same_report(&serial, &parallel);
    }

    #[test]
    fn test_empty_graph_short_circuits() {
        let graph = TaskGraph::new(&[], 10).unwrap();
        let report = run_simulations(&graph, &config(1000, 2)).unwrap();

        assert_eq!(report.stats.avg, None);
        assert_eq!(report.stats.std, None);
        assert_eq!(report.stats.min, None);
        assert_eq!(report.stats.max, None);
        assert_eq!(report.stats.median_approx, None);
        assert_eq!(report.stats.sample_size_used, 0);
        let best = report.best.unwrap();
        assert_eq!(best.makespan, 0);
        assert!(best.order.is_empty());
        assert!(best.order_topological.is_empty());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let result = run_simulations(&diamond(), &config(0, 1));
        assert!(matches!(result, Err(SimulationError::InvalidParameter(_))));
    }

    #[test]
    fn test_zero_chunksize_rejected() {
        let mut config = config(10, 1);
        config.chunksize = 0;
        let result = run_simulations(&diamond(), &config);
        assert!(matches!(result, Err(SimulationError::InvalidParameter(_))));
    }

    #[test]
    fn test_cyclic_graph_aborts_with_worker_failure() {
        let tasks = [
            TaskSpec { id: 1, duration: 1, resource: 1, preds: vec![2] },
            TaskSpec { id: 2, duration: 1, resource: 1, preds: vec![1] },
        ];
        let graph = TaskGraph::new(&tasks, 10).unwrap();
        let result = run_simulations(&graph, &config(100, 2));
        assert!(matches!(result, Err(SimulationError::Worker(_))));
    }

    #[test]
    fn test_chain_schedule_is_tight() {
        let tasks = [
            TaskSpec { id: 1, duration: 2, resource: 1, preds: vec![] },
            TaskSpec { id: 2, duration: 3, resource: 1, preds: vec![1] },
            TaskSpec { id: 3, duration: 1, resource: 1, preds: vec![2] },
        ];
        let graph = TaskGraph::new(&tasks, 10).unwrap();
        let report = run_simulations(&graph, &config(50, 2)).unwrap();

        assert_eq!(report.stats.avg, Some(6.0));
        let best = report.best.unwrap();
        assert_eq!(best.makespan, 6);
        assert_eq!(best.order, [1, 2, 3]);
        assert_eq!(best.order_topological, [1, 2, 3]);
    }

    #[test]
    fn test_capacity_bound_distribution() {
        // two heavy independent tasks can never overlap, so every ordering
        // serializes to makespan 8
        let tasks = [
            TaskSpec { id: 1, duration: 4, resource: 6, preds: vec![] },
            TaskSpec { id: 2, duration: 4, resource: 6, preds: vec![] },
        ];
        let graph = TaskGraph::new(&tasks, 10).unwrap();
        let report = run_simulations(&graph, &config(200, 2)).unwrap();
        assert_eq!(report.stats.min, Some(8.0));
        assert_eq!(report.stats.max, Some(8.0));
    }
}
