//! Dependency scheduler
//!
//! Validates the dependency graph of a registry and linearizes a selection of
//! it into an execution plan. Among tests whose dependencies are already
//! placed, the one earliest in registry order goes first, so unrelated tests
//! keep their concatenation order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::definition::TestDefinition;
use crate::error::{HarnessError, HarnessResult};
use crate::registry::{Registry, Selection};

/// One entry of an execution plan
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTest {
    /// Position in the registry
    pub position: usize,
    pub id: String,
    pub category: String,
    /// Registry positions of dependencies that are part of this run
    pub dependencies: Vec<usize>,
    /// Declared dependencies excluded from this run
    pub outside_run: Vec<String>,
    /// Number of tests in this run that transitively depend on this one
    pub dependents: usize,
}

/// Linear execution order for a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionPlan {
    steps: Vec<PlannedTest>,
}

impl ExecutionPlan {
    pub fn steps(&self) -> &[PlannedTest] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// Position of a test id within the plan
    pub fn order_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

pub struct Scheduler;

impl Scheduler {
    /// Reject duplicate ids, unknown dependency ids and cycles
    pub fn validate(registry: &Registry) -> HarnessResult<()> {
        let tests = registry.all();

        let mut seen = HashSet::with_capacity(tests.len());
        for test in tests {
            if !seen.insert(test.id.as_str()) {
                return Err(HarnessError::DuplicateTestId(test.id.clone()));
            }
        }

        let index = registry.index();
        for test in tests {
            for dep in &test.depends_on {
                if !index.contains_key(dep.as_str()) {
                    return Err(HarnessError::UnknownDependency {
                        test: test.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if let Some(members) = find_cycle(tests, &index) {
            return Err(HarnessError::DependencyCycle { members });
        }

        Ok(())
    }

    /// Validate the whole registry, then order the selected tests
    pub fn plan(registry: &Registry, selection: &Selection) -> HarnessResult<ExecutionPlan> {
        Self::validate(registry)?;

        let tests = registry.all();
        let index = registry.index();
        let selected = registry.resolve(selection)?;

        let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); tests.len()];
        let mut outside_run: Vec<Vec<String>> = vec![Vec::new(); tests.len()];
        let mut dependents_of: Vec<Vec<usize>> = vec![Vec::new(); tests.len()];
        let mut in_degree = vec![0usize; tests.len()];

        for &position in &selected {
            for dep in &tests[position].depends_on {
                let dep_position = index[dep.as_str()];
                if selected.contains(&dep_position) {
                    if !dependencies[position].contains(&dep_position) {
                        dependencies[position].push(dep_position);
                        dependents_of[dep_position].push(position);
                        in_degree[position] += 1;
                    }
                } else {
                    outside_run[position].push(dep.clone());
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = selected
            .iter()
            .copied()
            .filter(|&p| in_degree[p] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(selected.len());
        while let Some(Reverse(position)) = ready.pop() {
            order.push(position);
            for &child in &dependents_of[position] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push(Reverse(child));
                }
            }
        }

        // validate() rejected cycles, so every selected test is placed
        debug_assert_eq!(order.len(), selected.len());

        let steps: Vec<PlannedTest> = order
            .into_iter()
            .map(|position| {
                let test = &tests[position];
                PlannedTest {
                    position,
                    id: test.id.clone(),
                    category: test.category.clone(),
                    dependencies: std::mem::take(&mut dependencies[position]),
                    outside_run: std::mem::take(&mut outside_run[position]),
                    dependents: count_dependents(position, &dependents_of),
                }
            })
            .collect();

        debug!(planned = steps.len(), registry = tests.len(), "execution plan ready");
        Ok(ExecutionPlan { steps })
    }
}

/// Depth-first search with a "visiting" marker; returns the ids on the first
/// cycle found, in dependency order
fn find_cycle(tests: &[TestDefinition], index: &HashMap<&str, usize>) -> Option<Vec<String>> {
    let mut marks = vec![Mark::Unvisited; tests.len()];
    let mut path = Vec::new();

    for start in 0..tests.len() {
        if marks[start] == Mark::Unvisited {
            if let Some(cycle) = visit(start, tests, index, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn visit(
    node: usize,
    tests: &[TestDefinition],
    index: &HashMap<&str, usize>,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
) -> Option<Vec<String>> {
    marks[node] = Mark::Visiting;
    path.push(node);

    for dep in &tests[node].depends_on {
        let Some(&next) = index.get(dep.as_str()) else {
            continue;
        };
        match marks[next] {
            Mark::Visiting => {
                let start = path.iter().position(|&p| p == next).unwrap_or(0);
                return Some(path[start..].iter().map(|&p| tests[p].id.clone()).collect());
            }
            Mark::Unvisited => {
                if let Some(cycle) = visit(next, tests, index, marks, path) {
                    return Some(cycle);
                }
            }
            Mark::Done => {}
        }
    }

    path.pop();
    marks[node] = Mark::Done;
    None
}

fn count_dependents(position: usize, dependents_of: &[Vec<usize>]) -> usize {
    let mut seen = HashSet::new();
    let mut stack = vec![position];
    while let Some(node) = stack.pop() {
        for &child in &dependents_of[node] {
            if seen.insert(child) {
                stack.push(child);
            }
        }
    }
    seen.len()
}
