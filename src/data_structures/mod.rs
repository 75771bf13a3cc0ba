pub mod task_graph;

pub use task_graph::{GraphError, TaskGraph, TaskId, TaskSpec, MAX_RESOURCE_DEFAULT};
