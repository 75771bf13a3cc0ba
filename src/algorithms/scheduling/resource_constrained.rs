//! Serial list scheduling under a single renewable resource.
//!
//! Given a linear ordering of the tasks, each task is placed at the
//! earliest instant at which all of its predecessors have finished and
//! enough capacity is free. The resulting makespan depends only on the
//! ordering, the graph and the capacity.

use core::fmt;

use binary_heap_plus::{BinaryHeap, MinComparator};

use crate::data_structures::{TaskGraph, TaskId};

/// An ordering placed a task before one of its predecessors.
///
/// Orderings produced by the randomized orderer on a DAG never trigger
/// this; it indicates either a cyclic input graph or a caller-supplied
/// ordering that is not a linear extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOrderError {
    pub task: TaskId,
    pub missing: Vec<TaskId>,
}

impl fmt::Display for InvalidOrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid order: predecessors {:?} of task {} are not scheduled before it.",
            self.missing, self.task
        )
    }
}
impl std::error::Error for InvalidOrderError {}

/// Entry of the running pool: finish time first so the natural tuple order
/// makes the min-heap deterministic on ties.
type Running = (u64, u32, u32);

/// Simulate the ordering and return its makespan.
///
/// For every task in `order` (durations `d`, demand `r`):
///
/// 1. all predecessors must already be placed, else [`InvalidOrderError`];
/// 2. the tentative start is the latest planned predecessor finish;
/// 3. tasks finishing at or before that instant are retired;
/// 4. while `r` does not fit, the earliest running finish is awaited, the
///    start is moved there and further elapsed finishes are retired;
/// 5. the task is placed, its finish `start + d` enters the running pool.
///
/// A task with `r = 0` never waits on capacity. Validation guarantees
/// `r <= capacity` for every task, so step 4 always terminates.
pub fn makespan_for_order(graph: &TaskGraph, order: &[u32]) -> Result<u64, InvalidOrderError> {
    let mut running: BinaryHeap<Running, MinComparator> = BinaryHeap::new_min();
    let mut in_use: u32 = 0;
    let mut scheduled_end: Vec<Option<u64>> = vec![None; graph.num_tasks() as usize];
    let mut makespan: u64 = 0;

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

        // retire everything finished up to the tentative start
        while let Some(&(finish, _, freed)) = running.peek() {
            if finish > start {
                break;
            }
            running.pop();
            in_use -= freed;
        }

        // wait for capacity, one finish event at a time
        while in_use + demand > graph.max_resource() {
            let Some((finish, _, freed)) = running.pop() else {
                break;
            };
            if finish > start {
                start = finish;
            }
            in_use -= freed;
            while let Some(&(other_finish, _, other_freed)) = running.peek() {
                if other_finish > start {
                    break;
                }
                running.pop();
                in_use -= other_freed;
            }
        }

        let finish = start + duration;
        scheduled_end[node as usize] = Some(finish);
        if finish > makespan {
            makespan = finish;
        }
        running.push((finish, node, demand));
        in_use += demand;
    }

    Ok(makespan)
}
