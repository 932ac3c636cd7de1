//! Task dependency edges and cycle prevention.
//!
//! An edge `task_id -> depends_on_task_id` means `task_id` waits on
//! `depends_on_task_id`. Before a new edge is persisted the caller loads the
//! relevant stored edges and runs [`validate_new_dependency`].
//!
//! Two depths of cycle detection exist, selected by [`CycleCheck`]:
//!
//! - [`CycleCheck::OneHop`] rejects only a direct back-edge stored from the
//!   target to the source. Longer cycles (A -> B -> C -> A) pass.
//! - [`CycleCheck::Full`] additionally runs a depth-first reachability search
//!   over the `BLOCKS` subgraph and rejects any path from the target back to
//!   the source.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    #[default]
    Blocks,
    Related,
    Subtask,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub id: DbId,
    pub task_id: DbId,
    pub depends_on_task_id: DbId,
    pub dependency_type: DependencyType,
    pub created_at: Timestamp,
}

impl TaskDependency {
    pub fn new(
        id: DbId,
        task_id: DbId,
        depends_on_task_id: DbId,
        dependency_type: DependencyType,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            task_id,
            depends_on_task_id,
            dependency_type,
            created_at: now,
        }
    }
}

/// How deep the cycle check reaches before accepting a new edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleCheck {
    #[default]
    OneHop,
    Full,
}

impl fmt::Display for CycleCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneHop => f.write_str("one_hop"),
            Self::Full => f.write_str("full"),
        }
    }
}

impl FromStr for CycleCheck {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_hop" => Ok(Self::OneHop),
            "full" => Ok(Self::Full),
            other => Err(CoreError::Validation(format!(
                "Unknown cycle check mode '{other}'. Must be one of: one_hop, full"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Adjacency view over a set of dependency edges.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: HashMap<DbId, Vec<DbId>>,
}

impl DependencyGraph {
    /// Build a graph from edges of the given type only.
    pub fn from_edges<'a, I>(edges: I, kind: DependencyType) -> Self
    where
        I: IntoIterator<Item = &'a TaskDependency>,
    {
        let mut graph = Self::default();
        for edge in edges.into_iter().filter(|e| e.dependency_type == kind) {
            graph
                .edges
                .entry(edge.task_id)
                .or_default()
                .push(edge.depends_on_task_id);
        }
        graph
    }

    /// Tasks `task_id` directly depends on.
    pub fn blockers_of(&self, task_id: DbId) -> &[DbId] {
        self.edges.get(&task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a path `from -> ... -> to` exists. Iterative depth-first
    /// search; each node is expanded at most once.
    pub fn reaches(&self, from: DbId, to: DbId) -> bool {
        let mut stack = vec![from];
        let mut visited = HashSet::new();

        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            stack.extend(
                self.blockers_of(node)
                    .iter()
                    .copied()
                    .filter(|n| !visited.contains(n)),
            );
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check that adding `task_id -> depends_on_task_id` keeps the relation sane.
///
/// `existing` must contain at least every stored edge leaving
/// `depends_on_task_id` and every edge leaving `task_id`. In
/// [`CycleCheck::Full`] mode it must contain the whole `BLOCKS` subgraph
/// reachable from `depends_on_task_id`.
pub fn validate_new_dependency(
    task_id: DbId,
    depends_on_task_id: DbId,
    dependency_type: DependencyType,
    existing: &[TaskDependency],
    mode: CycleCheck,
) -> Result<(), CoreError> {
    if task_id == depends_on_task_id {
        return Err(CoreError::InvalidDependency(format!(
            "Task {task_id} cannot depend on itself"
        )));
    }

    if existing
        .iter()
        .any(|e| e.task_id == task_id && e.depends_on_task_id == depends_on_task_id)
    {
        return Err(CoreError::ConstraintViolation(format!(
            "Task {task_id} already depends on task {depends_on_task_id}"
        )));
    }

    if existing
        .iter()
        .any(|e| e.task_id == depends_on_task_id && e.depends_on_task_id == task_id)
    {
        return Err(CoreError::InvalidDependency(format!(
            "Task {depends_on_task_id} already depends on task {task_id}; \
             adding the reverse edge would create a cycle"
        )));
    }

    if mode == CycleCheck::Full && dependency_type == DependencyType::Blocks {
        let graph = DependencyGraph::from_edges(existing, DependencyType::Blocks);
        if graph.reaches(depends_on_task_id, task_id) {
            return Err(CoreError::InvalidDependency(format!(
                "Task {depends_on_task_id} transitively depends on task {task_id}; \
                 adding this edge would create a cycle"
            )));
        }
    }

    Ok(())
}

/// Check that `task_id` may take `parent_id` as its parent.
///
/// `parent_of` resolves the current parent of any task. The walk stops at a
/// root, at `task_id` (cycle), or at a node already seen (a pre-existing
/// cycle elsewhere in the chain, which is not this edge's fault).
pub fn validate_parent<F>(task_id: DbId, parent_id: DbId, parent_of: F) -> Result<(), CoreError>
where
    F: Fn(DbId) -> Option<DbId>,
{
    if task_id == parent_id {
        return Err(CoreError::ConstraintViolation(
            "A task cannot be its own parent".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut current = Some(parent_id);
    while let Some(ancestor) = current {
        if ancestor == task_id {
            return Err(CoreError::ConstraintViolation(format!(
                "Task {parent_id} is a descendant of task {task_id}; \
                 re-parenting would create a cycle"
            )));
        }
        if !seen.insert(ancestor) {
            break;
        }
        current = parent_of(ancestor);
    }
    Ok(())
}
