// src/dag/adjacency.rs

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::dag::task::TaskName;
use crate::errors::{Result, SweepdagError};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: Vec<TaskName>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskName>,
}

/// In-memory adjacency keyed by task name, plus a topological order.
///
/// Built only from validated input, so every edge points at a known node and
/// the relation is acyclic.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<TaskName, DagNode>,
    order: Vec<TaskName>,
}

impl DagGraph {
    /// Validate `dependencies` against the known task names and build the DAG.
    ///
    /// Fails with `UnknownDependency` for dangling edges and with
    /// `CyclicDependency` (carrying one witness cycle) otherwise.
    pub fn build(dependencies: &BTreeMap<TaskName, BTreeSet<TaskName>>) -> Result<Self> {
        validate_dependencies(dependencies)?;
        validate_acyclic(dependencies)?;
        Ok(Self::from_validated(dependencies))
    }

    /// Build without validation. Callers guarantee that every dependency is
    /// a key of `dependencies` and that there are no cycles.
    pub(crate) fn from_validated(dependencies: &BTreeMap<TaskName, BTreeSet<TaskName>>) -> Self {
        let mut nodes: BTreeMap<TaskName, DagNode> = dependencies
            .iter()
            .map(|(name, deps)| {
                (
                    name.clone(),
                    DagNode {
                        deps: deps.iter().cloned().collect(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for (name, deps) in dependencies {
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        let order = kahn_order(&nodes);
        Self { nodes, order }
    }

    /// Return all task names.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks in dependency order (ties broken by name).
    pub fn topological_order(&self) -> &[TaskName] {
        &self.order
    }

    /// Group tasks into waves: every task of wave `n` only depends on tasks
    /// of earlier waves, so a wave can run together.
    pub fn waves(&self) -> Vec<Vec<TaskName>> {
        let mut wave_of: HashMap<&str, usize> = HashMap::new();
        let mut waves: Vec<Vec<TaskName>> = Vec::new();

        for name in &self.order {
            let wave = self
                .dependencies_of(name)
                .iter()
                .filter_map(|dep| wave_of.get(dep.as_str()))
                .max()
                .map(|w| w + 1)
                .unwrap_or(0);
            wave_of.insert(name, wave);
            if waves.len() <= wave {
                waves.resize_with(wave + 1, Vec::new);
            }
            waves[wave].push(name.clone());
        }

        waves
    }
}

/// Kahn's algorithm over a validated node map; ready nodes are taken in name
/// order so the result is deterministic.
fn kahn_order(nodes: &BTreeMap<TaskName, DagNode>) -> Vec<TaskName> {
    let mut in_degree: BTreeMap<&str, usize> = nodes
        .iter()
        .map(|(name, node)| (name.as_str(), node.deps.len()))
        .collect();

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());
        for dependent in nodes.get(name).map(|n| n.dependents.as_slice()).unwrap_or(&[]) {
            if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(dependent.as_str());
                }
            }
        }
    }

    order
}

fn validate_dependencies(dependencies: &BTreeMap<TaskName, BTreeSet<TaskName>>) -> Result<()> {
    for (name, deps) in dependencies {
        for dep in deps {
            if !dependencies.contains_key(dep) {
                return Err(SweepdagError::UnknownDependency {
                    task: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_acyclic(dependencies: &BTreeMap<TaskName, BTreeSet<TaskName>>) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in dependencies.keys() {
        graph.add_node(name.as_str());
    }

    for (name, deps) in dependencies {
        for dep in deps {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(SweepdagError::CyclicDependency {
            cycle: witness_cycle(&graph, cycle.node_id()),
        }),
    }
}

/// Find one concrete cycle through `start`, which `toposort` reported as
/// part of a cycle. The returned path starts and ends with `start`.
fn witness_cycle(graph: &DiGraphMap<&str, ()>, start: &str) -> Vec<TaskName> {
    let component: HashSet<&str> = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.contains(&start))
        .unwrap_or_default()
        .into_iter()
        .collect();

    // BFS inside the strongly connected component until an edge leads back.
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for next in graph.neighbors(node) {
            if next == start {
                let mut path = vec![node];
                let mut cur = node;
                while let Some(prev) = parent.get(cur).copied() {
                    path.push(prev);
                    cur = prev;
                }
                path.reverse();
                path.push(start);
                return path.into_iter().map(str::to_string).collect();
            }
            if component.contains(next) && !parent.contains_key(next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    vec![start.to_string(), start.to_string()]
}
