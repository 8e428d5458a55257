//! Task dependency graphs.

use crate::core::{Infra, TaskExecutionStatus};
use crate::errors::SchedulerError;
use std::collections::{HashMap, HashSet};

/// A directed graph of task names to the names they depend on.
///
/// Nodes keep insertion order so rounds and diagnostics are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    order: Vec<String>,
    dependencies: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node with its dependencies. Duplicate dependencies are dropped.
    ///
    /// Adding an existing node merges the dependency lists.
    #[must_use]
    pub fn with_node<I, S>(mut self, name: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_node(name, dependencies);
        self
    }

    /// Adds a node in place.
    pub fn add_node<I, S>(&mut self, name: impl Into<String>, dependencies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if !self.dependencies.contains_key(&name) {
            self.order.push(name.clone());
        }
        let deps = self.dependencies.entry(name).or_default();
        for dep in dependencies {
            let dep = dep.into();
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
    }

    /// Builds the apply graph: one node per spec task, edges from `depends`.
    #[must_use]
    pub fn apply_graph(infra: &Infra) -> Self {
        infra.spec.tasks.iter().fold(Self::new(), |graph, task| {
            graph.with_node(task.name.clone(), task.depends.iter().cloned())
        })
    }

    /// Builds the destroy graph over orphaned task records.
    ///
    /// Edges are reversed: if orphan `B` depended on orphan `A`, then `A`
    /// depends on `B`, so dependents are torn down first. Dependencies on
    /// tasks that are not orphaned are ignored.
    #[must_use]
    pub fn destroy_graph(orphans: &[TaskExecutionStatus]) -> Self {
        let names: HashSet<&str> = orphans.iter().map(|t| t.name.as_str()).collect();
        let mut graph = Self::new();
        for orphan in orphans {
            graph.add_node(orphan.name.clone(), Vec::<String>::new());
        }
        for orphan in orphans {
            for dep in orphan.depends.iter().filter(|d| names.contains(d.as_str())) {
                graph.add_node(dep.clone(), [orphan.name.clone()]);
            }
        }
        graph
    }

    /// Returns node names in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[String] {
        &self.order
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns true if the node exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    /// Returns what a node depends on.
    #[must_use]
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.dependencies.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the nodes that depend on `name`, in insertion order.
    #[must_use]
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.order
            .iter()
            .filter(|node| self.dependencies(node).iter().any(|d| d == name))
            .cloned()
            .collect()
    }

    /// Returns each node's unresolved-dependency count.
    #[must_use]
    pub fn in_degrees(&self) -> HashMap<String, usize> {
        self.dependencies
            .iter()
            .map(|(name, deps)| (name.clone(), deps.len()))
            .collect()
    }

    /// Partitions nodes into the rounds the scheduler runs them in.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Stalled`] if some nodes can never become
    /// ready because of a cycle or a dependency outside the graph.
    pub fn levels(&self) -> Result<Vec<Vec<String>>, SchedulerError> {
        let mut pending = self.in_degrees();
        let mut done: HashSet<&str> = HashSet::new();
        let mut levels = Vec::new();

        while done.len() < self.order.len() {
            let ready: Vec<String> = self
                .order
                .iter()
                .filter(|n| !done.contains(n.as_str()) && pending.get(*n) == Some(&0))
                .cloned()
                .collect();

            if ready.is_empty() {
                return Err(SchedulerError::Stalled {
                    pending: self
                        .order
                        .iter()
                        .filter(|n| !done.contains(n.as_str()))
                        .cloned()
                        .collect(),
                });
            }

            for node in &ready {
                for dependent in self.dependents(node) {
                    if let Some(count) = pending.get_mut(&dependent) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
            for node in &self.order {
                if ready.contains(node) {
                    done.insert(node.as_str());
                }
            }
            levels.push(ready);
        }

        Ok(levels)
    }

    /// Finds a dependency cycle, returned with its first node repeated at the end.
    #[must_use]
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for name in &self.order {
            if !visited.contains(name) {
                if let Some(cycle) = self.dfs_cycle(name, &mut visited, &mut rec_stack, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        for dep in self.dependencies(node) {
            if !self.contains(dep) {
                continue;
            }
            if !visited.contains(dep) {
                if let Some(cycle) = self.dfs_cycle(dep, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(dep) {
                let start = path.iter().position(|n| n == dep).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(dep.clone());
                return Some(cycle);
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }
}
