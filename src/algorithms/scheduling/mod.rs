pub mod resource_constrained;
pub mod schedule_log;
