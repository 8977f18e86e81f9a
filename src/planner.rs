//! Execution planning: greedy layering of the step dependency graph.
//!
//! The planner turns a step list into an ordered list of batches where every
//! step lands in the earliest batch whose dependencies are already satisfied.
//! Steps inside one batch have no dependency edges among them and can execute
//! concurrently.

use crate::error::EngineError;
use crate::step::Step;
use std::collections::HashSet;
use tracing::debug;

/// The ordered batch plan for one run.
///
/// Computed once before any step executes and read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    batches: Vec<Vec<String>>,
}

impl ExecutionPlan {
    /// The batches in execution order.
    pub fn batches(&self) -> &[Vec<String>] {
        &self.batches
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// True when the plan contains no batches.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of planned steps across all batches.
    pub fn step_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Iterates over batches in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Vec<String>> {
        self.batches.iter()
    }

    /// Clones the plan into the plain nested-list shape used in responses.
    pub fn to_vec(&self) -> Vec<Vec<String>> {
        self.batches.clone()
    }
}

/// Builds the execution plan for a step list.
///
/// Repeatedly collects every unplaced step whose dependencies are all
/// completed; each collection becomes the next batch. A scan that collects
/// nothing while steps remain means the remaining steps form a cycle.
///
/// Validation performed up front: every `depends_on` id must name a step in
/// the set (`UnknownDependency` otherwise).
pub fn build_plan(steps: &[Step]) -> Result<ExecutionPlan, EngineError> {
    let ids: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();

    for step in steps {
        for dep in &step.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(EngineError::UnknownDependency {
                    step_id: step.id.clone(),
                    depends_on: dep.clone(),
                });
            }
        }
    }

    let mut completed: HashSet<&str> = HashSet::new();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut batches: Vec<Vec<String>> = Vec::new();

    while placed.len() < steps.len() {
        let eligible: Vec<&str> = steps
            .iter()
            .filter(|step| !placed.contains(step.id.as_str()))
            .filter(|step| {
                step.depends_on
                    .iter()
                    .all(|dep| completed.contains(dep.as_str()))
            })
            .map(|step| step.id.as_str())
            .collect();

        if eligible.is_empty() {
            let remaining: Vec<String> = steps
                .iter()
                .filter(|step| !placed.contains(step.id.as_str()))
                .map(|step| step.id.clone())
                .collect();
            return Err(EngineError::CircularDependency { remaining });
        }

        for id in &eligible {
            placed.insert(*id);
            completed.insert(*id);
        }

        // Intra-batch order is insignificant for correctness; sort it so logs
        // and the execution_plan in responses are stable.
        let mut batch: Vec<String> = eligible.into_iter().map(str::to_string).collect();
        batch.sort();

        debug!(batch = ?batch, index = batches.len(), "Planned batch");
        batches.push(batch);
    }

    Ok(ExecutionPlan { batches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: &str, deps: &[&str]) -> Step {
        Step::inline(id, id.to_uppercase(), json!({})).with_depends_on(deps.iter().copied())
    }

    #[test]
    fn test_empty_step_list() {
        let plan = build_plan(&[]).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.step_count(), 0);
    }

    #[test]
    fn test_independent_steps_share_one_batch() {
        let steps = vec![step("a", &[]), step("b", &[]), step("c", &[])];
        let plan = build_plan(&steps).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.batches()[0], vec!["a", "b", "c"]);
    }

    #[test]
    fn test_chain_produces_one_batch_per_step() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])];
        let plan = build_plan(&steps).unwrap();

        assert_eq!(plan.to_vec(), vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn test_fan_in_layering() {
        let steps = vec![step("a", &[]), step("b", &[]), step("c", &["a", "b"])];
        let plan = build_plan(&steps).unwrap();

        assert_eq!(plan.to_vec(), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_diamond() {
        let steps = vec![
            step("root", &[]),
            step("left", &["root"]),
            step("right", &["root"]),
            step("merge", &["left", "right"]),
        ];
        let plan = build_plan(&steps).unwrap();

        assert_eq!(
            plan.to_vec(),
            vec![vec!["root"], vec!["left", "right"], vec!["merge"]]
        );
    }

    #[test]
    fn test_widest_layering_not_arbitrary_serialization() {
        // d is free of the a->b chain and must join the earliest batch,
        // not trail behind it.
        let steps = vec![step("a", &[]), step("b", &["a"]), step("d", &[])];
        let plan = build_plan(&steps).unwrap();

        assert_eq!(plan.to_vec(), vec![vec!["a", "d"], vec!["b"]]);
    }

    #[test]
    fn test_every_step_exactly_once() {
        let steps = vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
            step("e", &[]),
        ];
        let plan = build_plan(&steps).unwrap();

        let mut seen: Vec<&str> = plan
            .iter()
            .flat_map(|batch| batch.iter().map(String::as_str))
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(plan.step_count(), steps.len());
    }

    #[test]
    fn test_dependencies_in_strictly_earlier_batches() {
        let steps = vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ];
        let plan = build_plan(&steps).unwrap();

        let batch_of = |id: &str| {
            plan.iter()
                .position(|batch| batch.iter().any(|s| s == id))
                .unwrap()
        };

        for s in &steps {
            for dep in &s.depends_on {
                assert!(batch_of(dep) < batch_of(&s.id), "{dep} !< {}", s.id);
            }
        }
    }

    #[test]
    fn test_two_step_cycle() {
        let steps = vec![step("x", &["y"]), step("y", &["x"])];
        let err = build_plan(&steps).unwrap_err();

        match err {
            EngineError::CircularDependency { remaining } => {
                assert_eq!(remaining.len(), 2);
                assert!(remaining.contains(&"x".to_string()));
                assert!(remaining.contains(&"y".to_string()));
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_self_cycle() {
        let steps = vec![step("solo", &["solo"])];
        assert!(matches!(
            build_plan(&steps),
            Err(EngineError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_partial_cycle_after_progress() {
        let steps = vec![step("a", &[]), step("b", &["a", "c"]), step("c", &["b"])];
        let err = build_plan(&steps).unwrap_err();

        match err {
            EngineError::CircularDependency { remaining } => {
                assert!(remaining.contains(&"b".to_string()));
                assert!(remaining.contains(&"c".to_string()));
                assert!(!remaining.contains(&"a".to_string()));
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dependency() {
        let steps = vec![step("a", &["phantom"])];
        let err = build_plan(&steps).unwrap_err();

        match err {
            EngineError::UnknownDependency {
                step_id,
                depends_on,
            } => {
                assert_eq!(step_id, "a");
                assert_eq!(depends_on, "phantom");
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }
}
