#![allow(clippy::used_underscore_binding)]

use derive_more::{Display, Error};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

/// The dependency graph could not be sorted.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum GraphError {
    /// Some nodes could never be resolved because they are part of, or
    /// depend on, a cycle.
    #[display(
        fmt = "cycle detected or missing dependency in the DAG: cycle [{}], unresolved [{}]",
        "cycle.join(\" -> \")",
        "unresolved.join(\", \")"
    )]
    CycleDetected {
        /// One cycle in the graph, starting and ending with the same node.
        cycle: Vec<String>,
        /// Every node that could not be placed in the order.
        unresolved: Vec<String>,
    },
}

/// A directed graph of named nodes, where each node lists the nodes it
/// depends on.
///
/// Nodes that are only ever named as a dependency are part of the graph
/// too. They have no dependencies of their own.
#[derive(Clone, Debug, Default)]
pub struct Dag {
    nodes: IndexMap<String, Vec<String>>,
}

impl Dag {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Dag::default()
    }

    /// Adds a node and the nodes it depends on. Adding a node again appends
    /// to its dependencies. Duplicate dependencies are allowed.
    pub fn add_node<I, S>(&mut self, name: impl Into<String>, dependencies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes
            .entry(name.into())
            .or_default()
            .extend(dependencies.into_iter().map(Into::into));
    }

    /// Whether a node was explicitly added.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// The number of explicitly added nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sorts the graph so that every node comes after all of its
    /// dependencies. Ties are broken by the order nodes were discovered in.
    pub fn sort(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: IndexMap<&str, usize> =
            self.nodes.keys().map(|name| (name.as_str(), 0)).collect();
        for dependencies in self.nodes.values() {
            for dependency in dependencies {
                *in_degree.entry(dependency.as_str()).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut result = Vec::with_capacity(in_degree.len());
        while let Some(node) = queue.pop_front() {
            result.push(node.to_owned());
            for dependency in self.nodes.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependency.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependency);
                    }
                }
            }
        }

        if result.len() < in_degree.len() {
            let unresolved: Vec<&str> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(name, _)| *name)
                .collect();
            return Err(GraphError::CycleDetected {
                cycle: self.find_cycle(&unresolved),
                unresolved: unresolved.into_iter().map(str::to_owned).collect(),
            });
        }

        // Dependents were emitted first
        result.reverse();
        Ok(result)
    }

    fn find_cycle(&self, unresolved: &[&str]) -> Vec<String> {
        let candidates: HashSet<&str> = unresolved.iter().copied().collect();
        let mut visited = HashSet::new();
        for start in unresolved {
            let mut path = Vec::new();
            if let Some(cycle) =
                self.visit(start, &candidates, &mut visited, &mut path)
            {
                return cycle;
            }
        }

        Vec::new()
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        candidates: &HashSet<&'a str>,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(index) = path.iter().position(|step| *step == node) {
            let mut cycle: Vec<String> =
                path[index..].iter().map(|step| (*step).to_owned()).collect();
            cycle.push(node.to_owned());
            return Some(cycle);
        }
        if !visited.insert(node) {
            return None;
        }

        path.push(node);
        for dependency in self.nodes.get(node).into_iter().flatten() {
            if candidates.contains(dependency.as_str()) {
                if let Some(cycle) =
                    self.visit(dependency, candidates, visited, path)
                {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }
}
