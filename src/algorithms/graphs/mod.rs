pub mod topological_ordering;
