//! List scheduling with a detailed event log.
//!
//! Runs the same placement loop as
//! [`resource_constrained`](super::resource_constrained) but records per-task
//! start and finish times, a chronological event trace and, on request, a
//! dense sampling of the resource profile. Used to reconstruct the schedule
//! of the best ordering found by a Monte-Carlo run.

use std::collections::BTreeMap;

use binary_heap_plus::{BinaryHeap, MinComparator};
use itertools::Itertools;
use serde::Serialize;

use crate::data_structures::{TaskGraph, TaskId};

use super::resource_constrained::InvalidOrderError;

/// Kind of a schedule event. `End` sorts before `Start` so that at equal
/// instants a retirement is observed before a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    End,
    Start,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEvent {
    pub time: u64,
    pub task: TaskId,
    pub event: EventKind,
    /// Demand of the task the event belongs to.
    pub resource: u32,
    /// Committed resource immediately after the event took effect.
    pub resource_in_use: u32,
}

/// One instant of the sampled resource profile. A task is active at `t`
/// iff `start <= t < finish`; zero-demand tasks are listed as active but
/// contribute nothing to `resource_in_use`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSample {
    pub time: f64,
    pub resource_in_use: u32,
    pub active: Vec<TaskId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleLog {
    pub makespan: u64,
    pub start_times: BTreeMap<TaskId, u64>,
    pub finish_times: BTreeMap<TaskId, u64>,
    pub events: Vec<ScheduleEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_samples: Option<Vec<TimeSample>>,
}

impl ScheduleLog {
    /// Task ids in chronological start order, ties broken by id ascending.
    pub fn chronological_start_order(&self) -> Vec<TaskId> {
        self.start_times
            .iter()
            .sorted_by_key(|&(&id, &start)| (start, id))
            .map(|(&id, _)| id)
            .collect()
    }
}

/// Simulate the ordering and reconstruct the full schedule.
///
/// Placement follows
/// [`makespan_for_order`](super::resource_constrained::makespan_for_order)
/// exactly; the makespans agree for every ordering. With a positive
/// `time_unit` the resource profile is sampled at `k * time_unit` for
/// `k = 0 ..= ceil(makespan / time_unit)`.
pub fn log_schedule(
    graph: &TaskGraph,
    order: &[u32],
    time_unit: Option<f64>,
) -> Result<ScheduleLog, InvalidOrderError> {
    let mut running: BinaryHeap<(u64, u32, u32), MinComparator> = BinaryHeap::new_min();
    let mut in_use: u32 = 0;
    let mut scheduled_end: Vec<Option<u64>> = vec![None; graph.num_tasks() as usize];
    let mut start_times: BTreeMap<TaskId, u64> = BTreeMap::new();
    let mut finish_times: BTreeMap<TaskId, u64> = BTreeMap::new();
    let mut events: Vec<ScheduleEvent> = Vec::with_capacity(2 * order.len());
    let mut makespan: u64 = 0;

    let retire = |entry: (u64, u32, u32),
                      in_use: &mut u32,
                      finish_times: &mut BTreeMap<TaskId, u64>,
                      events: &mut Vec<ScheduleEvent>| {
        let (finish, node, freed) = entry;
        *in_use -= freed;
        finish_times.insert(graph.id_of(node), finish);
        events.push(ScheduleEvent {
            time: finish,
            task: graph.id_of(node),
            event: EventKind::End,
            resource: freed,
            resource_in_use: *in_use,
        });
    };

    for &node in order {
        let duration = u64::from(graph.duration(node));
        let demand = graph.resource(node);

        let mut start: u64 = 0;
        let mut missing: Vec<TaskId> = Vec::new();
        for &pred in graph.predecessors(node) {
            match scheduled_end[pred as usize] {
                Some(end) => start = start.max(end),
                None => missing.push(graph.id_of(pred)),
            }
        }
        if !missing.is_empty() {
            return Err(InvalidOrderError {
                task: graph.id_of(node),
                missing,
            });
        }

        while let Some(&entry) = running.peek() {
            if entry.0 > start {
                break;
            }
            running.pop();
            retire(entry, &mut in_use, &mut finish_times, &mut events);
        }

        while in_use + demand > graph.max_resource() {
            let Some(entry) = running.pop() else {
                break;
            };
            if entry.0 > start {
                start = entry.0;
            }
            retire(entry, &mut in_use, &mut finish_times, &mut events);
            while let Some(&elapsed) = running.peek() {
                if elapsed.0 > start {
                    break;
                }
                running.pop();
                retire(elapsed, &mut in_use, &mut finish_times, &mut events);
            }
        }

        let finish = start + duration;
        scheduled_end[node as usize] = Some(finish);
        start_times.insert(graph.id_of(node), start);
        if finish > makespan {
            makespan = finish;
        }
        running.push((finish, node, demand));
        in_use += demand;
        events.push(ScheduleEvent {
            time: start,
            task: graph.id_of(node),
            event: EventKind::Start,
            resource: demand,
            resource_in_use: in_use,
        });
    }

    // the main loop leaves the last placed tasks in the pool
    while let Some(entry) = running.pop() {
        retire(entry, &mut in_use, &mut finish_times, &mut events);
    }

    events.sort_by_key(|e| (e.time, e.event));

    let time_samples = time_unit.filter(|&unit| unit > 0.0).map(|unit| {
        sample_resource_profile(graph, order, &start_times, &finish_times, makespan, unit)
    });

    Ok(ScheduleLog {
        makespan,
        start_times,
        finish_times,
        events,
        time_samples,
    })
}

fn sample_resource_profile(
    graph: &TaskGraph,
    order: &[u32],
    start_times: &BTreeMap<TaskId, u64>,
    finish_times: &BTreeMap<TaskId, u64>,
    makespan: u64,
    time_unit: f64,
) -> Vec<TimeSample> {
    let steps = (makespan as f64 / time_unit).ceil() as u64;
    (0..=steps)
        .map(|k| {
            let time = k as f64 * time_unit;
            let mut resource_in_use = 0;
            let mut active = Vec::new();
            for &node in order {
                let id = graph.id_of(node);
                let start = start_times[&id] as f64;
                let finish = finish_times[&id] as f64;
                if start <= time && time < finish {
                    resource_in_use += graph.resource(node);
                    active.push(id);
                }
            }
            TimeSample {
                time,
                resource_in_use,
                active,
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use crate::algorithms::scheduling::resource_constrained::makespan_for_order;
    use crate::data_structures::TaskSpec;

    use super::*;

    fn graph(tasks: &[(u32, u32, u32, &[u32])], max_resource: u32) -> TaskGraph {
        let specs: Vec<TaskSpec> = tasks
            .iter()
            .map(|&(id, duration, resource, preds)| TaskSpec {
                id,
                duration,
                resource,
                preds: preds.to_vec(),
            })
            .collect();
        TaskGraph::new(&specs, max_resource).unwrap()
    }

    fn chain() -> TaskGraph {
        graph(&[(1, 2, 1, &[]), (2, 3, 1, &[1]), (3, 1, 1, &[2])], 10)
    }

    #[test]
    fn test_chain_start_and_finish_times() {
        let log = log_schedule(&chain(), &[0, 1, 2], None).unwrap();
        assert_eq!(log.makespan, 6);
        assert_eq!(log.start_times, BTreeMap::from([(1, 0), (2, 2), (3, 5)]));
        assert_eq!(log.finish_times, BTreeMap::from([(1, 2), (2, 5), (3, 6)]));
        assert!(log.time_samples.is_none());
    }

    #[test]
    fn test_chain_event_trace() {
        let log = log_schedule(&chain(), &[0, 1, 2], None).unwrap();
        let trace: Vec<(u64, TaskId, EventKind, u32)> = log
            .events
            .iter()
            .map(|e| (e.time, e.task, e.event, e.resource_in_use))
            .collect();
        assert_eq!(
            trace,
            [
                (0, 1, EventKind::Start, 1),
                (2, 1, EventKind::End, 0),
                (2, 2, EventKind::Start, 1),
                (5, 2, EventKind::End, 0),
                (5, 3, EventKind::Start, 1),
                (6, 3, EventKind::End, 0),
            ]
        );
    }

    #[test]
    fn test_end_sorts_before_start_at_equal_time() {
        assert!(EventKind::End < EventKind::Start);
    }

    #[test]
    fn test_makespan_matches_plain_simulation() {
        let graph = graph(
            &[(1, 5, 3, &[]), (2, 5, 3, &[]), (3, 5, 3, &[]), (4, 5, 3, &[])],
            10,
        );
        for order in [[0, 1, 2, 3], [3, 1, 0, 2]] {
            let log = log_schedule(&graph, &order, None).unwrap();
            assert_eq!(Ok(log.makespan), makespan_for_order(&graph, &order));
        }
    }

    #[test]
    fn test_all_running_tasks_are_drained() {
        let graph = graph(&[(1, 5, 3, &[]), (2, 7, 3, &[]), (3, 2, 3, &[])], 10);
        let log = log_schedule(&graph, &[0, 1, 2], None).unwrap();
        assert_eq!(log.finish_times.len(), 3);
        assert_eq!(
            log.events.iter().filter(|e| e.event == EventKind::End).count(),
            3
        );
        // the trace ends with zero committed resource
        assert_eq!(log.events.last().unwrap().resource_in_use, 0);
    }

    #[test]
    fn test_time_samples_cover_the_whole_run() {
        let log = log_schedule(&chain(), &[0, 1, 2], Some(1.0)).unwrap();
        let samples = log.time_samples.unwrap();
        assert_eq!(samples.len(), 7);
        for (k, sample) in samples.iter().enumerate() {
            assert_eq!(sample.time, k as f64);
        }
        // busy with exactly one unit-demand task until the makespan
        assert!(samples[..6].iter().all(|s| s.resource_in_use == 1));
        assert_eq!(samples[6].resource_in_use, 0);
        assert!(samples[6].active.is_empty());
        assert_eq!(samples[0].active, [1]);
        assert_eq!(samples[2].active, [2]);
    }

    #[test]
    fn test_fractional_time_unit_rounds_up() {
        let log = log_schedule(&chain(), &[0, 1, 2], Some(4.0)).unwrap();
        let times: Vec<f64> = log.time_samples.unwrap().iter().map(|s| s.time).collect();
        assert_eq!(times, [0.0, 4.0, 8.0]);
    }

    #[test]
    fn test_zero_demand_task_is_active_but_free() {
        let graph = graph(&[(1, 4, 10, &[]), (2, 2, 0, &[])], 10);
        let log = log_schedule(&graph, &[0, 1], Some(1.0)).unwrap();
        let samples = log.time_samples.unwrap();
        assert_eq!(samples[1].active, [1, 2]);
        assert_eq!(samples[1].resource_in_use, 10);
        assert_eq!(samples[3].active, [1]);
    }

    #[test]
    fn test_chronological_start_order_breaks_ties_by_id() {
        let graph = graph(
            &[(1, 5, 3, &[]), (2, 5, 3, &[]), (3, 5, 3, &[]), (4, 5, 3, &[])],
            10,
        );
        let log = log_schedule(&graph, &[3, 2, 1, 0], None).unwrap();
        // tasks 4, 3, 2 start at 0, task 1 starts at 5
        assert_eq!(log.chronological_start_order(), [2, 3, 4, 1]);
    }

    #[test]
    fn test_schedule_invariants_on_random_instances() {
        use rand::SeedableRng;
        use rand_pcg::Pcg64;

        use crate::algorithms::graphs::topological_ordering::random_topological_order;
        use crate::data_generators::task_graphs::RandomTaskGraph;

        let generator = RandomTaskGraph {
            n_tasks: 30,
            ..RandomTaskGraph::default()
        };
        for seed in 0..5 {
            let tasks = generator.generate(seed);
            let graph = TaskGraph::new(&tasks, 10).unwrap();
            let mut rng = Pcg64::seed_from_u64(seed);
            let order = random_topological_order(&graph, &mut rng);
            let log = log_schedule(&graph, &order, Some(1.0)).unwrap();

            for node in 0..graph.num_tasks() {
                let id = graph.id_of(node);
                assert_eq!(
                    log.finish_times[&id] - log.start_times[&id],
                    u64::from(graph.duration(node))
                );
                for &pred in graph.predecessors(node) {
                    assert!(log.finish_times[&graph.id_of(pred)] <= log.start_times[&id]);
                }
            }
            // the committed resource never exceeds the capacity; durations
            // are integers, so integer instants cover the whole profile
            for sample in log.time_samples.as_ref().unwrap() {
                assert!(sample.resource_in_use <= graph.max_resource());
            }
        }
    }

    #[test]
    fn test_invalid_order_is_rejected() {
        let log = log_schedule(&chain(), &[1, 0, 2], None);
        assert!(log.is_err_and(|e| e.task == 2 && e.missing == [1]));
    }
}
