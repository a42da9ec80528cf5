//! Requirement graph walking.
//!
//! The walker expands requirements breadth-first through a
//! [`MetadataSource`]. Before a node is materialized the caller's callback
//! decides whether to expand it, prune its branch, or stop the walk.
//!
//! Like pip's legacy resolver, the first requirement seen for a name wins;
//! later requirements on the same name only add an edge to the graph.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::DistributionRequirement;
use crate::resolver::errors::ResolveError;
use crate::sources::MetadataSource;

/// What the walker does with the node it is about to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Materialize the node and queue its dependencies.
    Continue,
    /// Treat the node as satisfied; do not materialize or expand it.
    Prune,
    /// End the walk immediately.
    Stop,
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Every reachable node was visited.
    Completed,
    /// A callback returned [`WalkAction::Stop`].
    Stopped,
}

/// A node offered to the walk callback.
#[derive(Debug, Clone)]
pub struct WalkNode<'a> {
    pub requirement: &'a DistributionRequirement,
    /// Canonical name of the requirer; `None` for root requests.
    pub parent: Option<&'a str>,
    pub depth: usize,
}

/// Who required what during a walk.
#[derive(Debug, Default)]
pub struct WalkGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    roots: Vec<String>,
}

impl WalkGraph {
    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, parent: Option<&str>, child: &str) {
        let child_idx = self.node(child);
        match parent {
            Some(parent) => {
                let parent_idx = self.node(parent);
                self.graph.update_edge(parent_idx, child_idx, ());
            }
            None => {
                if !self.roots.iter().any(|r| r == child) {
                    self.roots.push(child.to_string());
                }
            }
        }
    }

    /// Number of distinct names seen.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Names that directly required `name`, sorted.
    pub fn requirers(&self, name: &str) -> Vec<String> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut requirers: Vec<String> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        requirers.sort();
        requirers
    }

    /// A requirement chain from a root request down to `name`, e.g.
    /// `["kornia", "torch"]`. Empty if `name` was never seen.
    pub fn chain(&self, name: &str) -> Vec<String> {
        let Some(&start) = self.nodes.get(name) else {
            return Vec::new();
        };

        let mut chain = vec![self.graph[start].clone()];
        let mut current = start;
        while !self.roots.contains(&self.graph[current]) {
            // Follow the earliest requirer; node indices grow in walk order.
            let Some(parent) = self
                .graph
                .neighbors_directed(current, Direction::Incoming)
                .filter(|p| !chain.contains(&self.graph[*p]))
                .min()
            else {
                break;
            };
            chain.push(self.graph[parent].clone());
            current = parent;
        }
        chain.reverse();
        chain
    }
}

/// The result of a walk.
#[derive(Debug)]
pub struct Walk {
    pub outcome: WalkOutcome,
    pub graph: WalkGraph,
}

/// Breadth-first requirement walker.
pub struct RequirementWalker<'a> {
    source: &'a dyn MetadataSource,
}

impl<'a> RequirementWalker<'a> {
    pub fn new(source: &'a dyn MetadataSource) -> Self {
        RequirementWalker { source }
    }

    /// Walk `roots` and everything they depend on, asking `visit` about each
    /// node before it is materialized.
    pub fn walk<F>(&self, roots: &[DistributionRequirement], mut visit: F) -> Result<Walk, ResolveError>
    where
        F: FnMut(&WalkNode<'_>) -> WalkAction,
    {
        let mut graph = WalkGraph::default();
        let mut queue: VecDeque<(DistributionRequirement, Option<String>, usize)> = roots
            .iter()
            .map(|r| (r.clone(), None, 0))
            .collect();

        while let Some((requirement, parent, depth)) = queue.pop_front() {
            let name = requirement.canonical_name();
            let seen = graph.contains(&name);
            graph.add_edge(parent.as_deref(), &name);
            if seen {
                tracing::trace!("`{}` already visited", name);
                continue;
            }

            let node = WalkNode {
                requirement: &requirement,
                parent: parent.as_deref(),
                depth,
            };
            match visit(&node) {
                WalkAction::Stop => {
                    return Ok(Walk {
                        outcome: WalkOutcome::Stopped,
                        graph,
                    })
                }
                WalkAction::Prune => {
                    tracing::debug!("pruned `{}`", requirement);
                    continue;
                }
                WalkAction::Continue => {}
            }

            let materialized =
                self.source
                    .materialize(&requirement)
                    .map_err(|e| ResolveError::Metadata {
                        package: name.clone(),
                        message: format!("{:#}", e),
                    })?;
            tracing::debug!(
                "`{}` resolved to {} with {} dependencies",
                name,
                materialized
                    .version
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                materialized.dependencies.len()
            );

            for dependency in materialized.dependencies {
                if dependency.applies_to(requirement.extras()) {
                    queue.push_back((dependency, Some(name.clone()), depth + 1));
                }
            }
        }

        Ok(Walk {
            outcome: WalkOutcome::Completed,
            graph,
        })
    }
}
