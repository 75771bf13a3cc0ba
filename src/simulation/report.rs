use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::algorithms::scheduling::schedule_log::{log_schedule, ScheduleLog};
use crate::data_structures::{TaskGraph, TaskId, TaskSpec};
use crate::io;

use super::driver::ResultFolder;
use super::SimulationConfig;

/// Aggregate statistics over all simulated makespans. The aggregate fields
/// are `None` when no simulation contributed (empty graph).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub avg: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median_approx: Option<f64>,
    pub sample_size_used: usize,
    pub elapsed_seconds: f64,
}

/// The best ordering found: its makespan, the realized start chronology
/// (ties broken by id) and the topological ordering that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestOrder {
    pub makespan: u64,
    pub order: Vec<TaskId>,
    pub order_topological: Vec<TaskId>,
}

/// Final result of a Monte-Carlo run.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub iterations: u64,
    pub max_resource: u32,
    pub workers: usize,
    pub stats: Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<BestOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Document written to `log_dir/best_order_<unix_seconds>.json`.
#[derive(Serialize)]
struct BestOrderDocument<'a> {
    tasks: Vec<TaskSpec>,
    order: Vec<TaskId>,
    log: &'a ScheduleLog,
    meta: DocumentMeta,
}

#[derive(Serialize)]
struct DocumentMeta {
    logged_at: u64,
    iterations: u64,
    max_resource: u32,
}

/// Assemble the report from the folded state.
///
/// The detailed logger reruns locally (never in a worker) on the best
/// ordering, once for the start chronology and once for the optional log
/// file. Failures on the log-file path degrade to warnings.
pub(super) fn package_report(
    graph: &TaskGraph,
    config: &SimulationConfig,
    workers: usize,
    folder: ResultFolder,
    elapsed: Duration,
) -> SimulationReport {
    let stats = Statistics {
        avg: folder.aggregation.mean(),
        std: folder.aggregation.std_dev(),
        min: folder.aggregation.min(),
        max: folder.aggregation.max(),
        median_approx: folder.reservoir.median(),
        sample_size_used: folder.reservoir.len(),
        elapsed_seconds: elapsed.as_secs_f64(),
    };

    let mut warnings = Vec::new();

    // an empty graph has exactly one (empty) schedule with makespan zero
    let best_seen = folder
        .best
        .or_else(|| graph.is_empty().then(|| (0, Vec::new())));

    let best = if config.return_best_order {
        best_seen.as_ref().map(|(makespan, order)| {
            let chronological = match log_schedule(graph, order, None) {
                Ok(log) => log.chronological_start_order(),
                Err(why) => {
                    // fall back to the topological ordering itself
                    warnings.push(format!("failed to reconstruct start order: {}", why));
                    graph.ids_of(order)
                }
            };
            BestOrder {
                makespan: *makespan,
                order: chronological,
                order_topological: graph.ids_of(order),
            }
        })
    } else {
        None
    };

    let log_file = match (&config.log_dir, &best_seen) {
        (Some(directory), Some((_, order))) => {
            match write_best_order_log(graph, order, config, directory) {
                Ok(path) => Some(path),
                Err(why) => {
                    log::warn!("Couldn't write the best-order log: {}", why);
                    warnings.push(format!("failed to write log: {}", why));
                    None
                }
            }
        }
        _ => None,
    };

    SimulationReport {
        iterations: config.iterations,
        max_resource: graph.max_resource(),
        workers,
        stats,
        best,
        log_file,
        warnings,
    }
}

fn write_best_order_log(
    graph: &TaskGraph,
    order: &[u32],
    config: &SimulationConfig,
    directory: &Path,
) -> Result<PathBuf, String> {
    let log = log_schedule(graph, order, config.log_time_unit).map_err(|why| why.to_string())?;

    let logged_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let path = directory.join(format!("best_order_{}.json", logged_at));

    let document = BestOrderDocument {
        tasks: graph.to_specs(),
        order: graph.ids_of(order),
        log: &log,
        meta: DocumentMeta {
            logged_at,
            iterations: config.iterations,
            max_resource: graph.max_resource(),
        },
    };
    io::json::write_json_to_file(&path, &document).map_err(|why| why.to_string())?;

    Ok(path)
}
