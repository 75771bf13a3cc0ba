use core::fmt;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// External identity of a task, unique within a graph.
pub type TaskId = u32;

/// Default capacity of the shared resource.
pub const MAX_RESOURCE_DEFAULT: u32 = 10;

/// Compact description of a single task as supplied by callers.
///
/// `preds` lists the ids of tasks that must finish before this task may
/// start; set semantics are assumed (duplicates are merged on preparation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSpec {
    pub id: TaskId,
    pub duration: u32,
    pub resource: u32,
    #[serde(default)]
    pub preds: Vec<TaskId>,
}

/// A validated project: tasks, precedence edges and the resource capacity.
///
/// Preparation converts the task list into dense arrays indexed by node
/// position so that the hot simulation loops never touch a hash map. Node
/// positions are assigned in input order; [`TaskGraph::id_of`] maps them
/// back to external ids at the reporting boundary.
///
/// The graph is immutable after construction and can be shared read-only
/// across worker threads.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    ids: Vec<TaskId>,
    durations: Vec<u32>,
    resources: Vec<u32>,
    preds: Vec<Vec<u32>>,
    succs: Vec<Vec<u32>>,
    max_resource: u32,
}

impl TaskGraph {
    /// Validate the task list and build the dense structures.
    ///
    /// Rejected upfront: a zero capacity, duplicate ids, zero durations,
    /// self-dependencies, predecessor ids not present in the list, and any
    /// per-task demand exceeding `max_resource` (such a task could never be
    /// placed). Cycles spanning several tasks are not detected here; the
    /// orderer degrades to a best-effort ordering on cyclic input and the
    /// simulator rejects that ordering.
    pub fn new(tasks: &[TaskSpec], max_resource: u32) -> Result<Self, GraphError> {
        if max_resource == 0 {
            return Err(GraphError::ZeroCapacity);
        }

        let mut position_of: HashMap<TaskId, u32> = HashMap::with_capacity(tasks.len());
        for (position, task) in tasks.iter().enumerate() {
            if task.duration == 0 {
                return Err(GraphError::ZeroDuration(task.id));
            }
            if task.resource > max_resource {
                return Err(GraphError::DemandExceedsCapacity {
                    task: task.id,
                    demand: task.resource,
                    capacity: max_resource,
                });
            }
            if position_of.insert(task.id, position as u32).is_some() {
                return Err(GraphError::DuplicateId(task.id));
            }
        }

        let mut preds: Vec<Vec<u32>> = vec![Vec::new(); tasks.len()];
        let mut succs: Vec<Vec<u32>> = vec![Vec::new(); tasks.len()];
        for (position, task) in tasks.iter().enumerate() {
            let position = position as u32;
            for &pred_id in &task.preds {
                if pred_id == task.id {
                    return Err(GraphError::SelfDependency(task.id));
                }
                let pred = *position_of.get(&pred_id).ok_or(GraphError::UnknownPredecessor {
                    task: task.id,
                    pred: pred_id,
                })?;
                preds[position as usize].push(pred);
            }
            let list = &mut preds[position as usize];
            list.sort_unstable();
            list.dedup();
            for &pred in list.iter() {
                succs[pred as usize].push(position);
            }
        }

        Ok(Self {
            ids: tasks.iter().map(|t| t.id).collect(),
            durations: tasks.iter().map(|t| t.duration).collect(),
            resources: tasks.iter().map(|t| t.resource).collect(),
            preds,
            succs,
            max_resource,
        })
    }

    pub fn num_tasks(&self) -> u32 {
        self.ids.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn max_resource(&self) -> u32 {
        self.max_resource
    }

    /// External id of the task at `node`.
    pub fn id_of(&self, node: u32) -> TaskId {
        self.ids[node as usize]
    }

    /// Map a sequence of node positions back to external ids.
    pub fn ids_of(&self, nodes: &[u32]) -> Vec<TaskId> {
        nodes.iter().map(|&n| self.id_of(n)).collect()
    }

    pub fn duration(&self, node: u32) -> u32 {
        self.durations[node as usize]
    }

    pub fn resource(&self, node: u32) -> u32 {
        self.resources[node as usize]
    }

    pub fn predecessors(&self, node: u32) -> &[u32] {
        &self.preds[node as usize]
    }

    pub fn successors(&self, node: u32) -> &[u32] {
        &self.succs[node as usize]
    }

    /// Reconstruct the compact task list, e.g. for the best-order log file.
    pub fn to_specs(&self) -> Vec<TaskSpec> {
        (0..self.num_tasks())
            .map(|node| TaskSpec {
                id: self.id_of(node),
                duration: self.duration(node),
                resource: self.resource(node),
                preds: self.ids_of(self.predecessors(node)),
            })
            .collect()
    }
}

/// Rejection of malformed graph input, reported before any work is done.
#[derive(Debug, PartialEq, Eq)]
pub enum GraphError {
    ZeroCapacity,
    DuplicateId(TaskId),
    ZeroDuration(TaskId),
    SelfDependency(TaskId),
    UnknownPredecessor { task: TaskId, pred: TaskId },
    DemandExceedsCapacity { task: TaskId, demand: u32, capacity: u32 },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::ZeroCapacity => write!(f, "Resource capacity must be positive."),
            GraphError::DuplicateId(id) => write!(f, "Task id {} appears more than once.", id),
            GraphError::ZeroDuration(id) => {
                write!(f, "Task {} has a zero duration; durations must be positive.", id)
            }
            GraphError::SelfDependency(id) => write!(f, "Task {} depends on itself.", id),
            GraphError::UnknownPredecessor { task, pred } => {
                write!(f, "Task {} references unknown predecessor {}.", task, pred)
            }
            GraphError::DemandExceedsCapacity {
                task,
                demand,
                capacity,
            } => write!(
                f,
                "Task {} demands {} resource units but the capacity is {}; it could never run.",
                task, demand, capacity
            ),
        }
    }
}
impl std::error::Error for GraphError {}
