//! Random project instances for experiments and the command line.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::data_structures::TaskSpec;

/// A random project with layered precedence constraints.
///
/// Tasks carry the ids `1..=n_tasks`. The first task has no predecessors;
/// every later task `i` draws `k` uniformly from
/// `0..=min(max_preds, i - 1)` and then samples `k` distinct predecessors
/// from the earlier ids, so the result is always a DAG. Durations and
/// demands are uniform in `1..=max_duration` and `1..=max_task_resource`.
pub struct RandomTaskGraph {
    pub n_tasks: u32,
    pub max_preds: u32,
    pub max_duration: u32,
    pub max_task_resource: u32,
}

impl Default for RandomTaskGraph {
    fn default() -> Self {
        Self {
            n_tasks: 50,
            max_preds: 3,
            max_duration: 10,
            max_task_resource: 5,
        }
    }
}

impl RandomTaskGraph {
    /// Generate the task list; identical seeds yield identical instances.
    pub fn generate(&self, seed: u64) -> Vec<TaskSpec> {
        let mut rng = Pcg64::seed_from_u64(seed);

        (1..=self.n_tasks)
            .map(|id| {
                let earlier = id - 1;
                let num_preds = rng.gen_range(0..=self.max_preds.min(earlier));
                let mut preds: Vec<u32> = index::sample(&mut rng, earlier as usize, num_preds as usize)
                    .iter()
                    .map(|p| p as u32 + 1)
                    .collect();
                preds.sort_unstable();

                TaskSpec {
                    id,
                    duration: rng.gen_range(1..=self.max_duration),
                    resource: rng.gen_range(1..=self.max_task_resource),
                    preds,
                }
            })
            .collect()
    }
}
