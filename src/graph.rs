//! Local record of the submitted job graph
//!
//! The backend stays the only authority on execution order. This record mirrors what was
//! submitted so a pipeline definition can be inspected, printed for a dry run, and checked in tests.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::queue::{JobHandle, Resources};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Real work
    Work,
    /// Stands in for work whose output already exists
    Wait,
    /// Created by fan-in reduction
    Join,
}

#[derive(Clone, Debug, Serialize)]
pub struct JobNode {
    pub handle: JobHandle,
    pub name: String,
    pub kind: NodeKind,
    pub resources: Resources,
    pub dependencies: Vec<JobHandle>,
}

/// Nodes keyed by handle, edges are the dependency relation
#[derive(Debug, Default, Serialize)]
pub struct JobGraph {
    nodes: Vec<JobNode>,
    #[serde(skip)]
    index: HashMap<JobHandle, usize>,
}

impl JobGraph {
    pub fn new() -> JobGraph {
        JobGraph::default()
    }

    pub fn insert(&mut self, node: JobNode) {
        self.index.insert(node.handle.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    pub fn get(&self, handle: &JobHandle) -> Option<&JobNode> {
        self.index.get(handle).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[JobNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|node| node.kind == kind).count()
    }

    /// Handles reachable from `handles` once every join job is expanded into what it joins
    ///
    /// Handles not recorded here (submitted elsewhere, or named by `job://`) are leaves.
    pub fn resolve_joins<'a>(&self, handles: impl IntoIterator<Item = &'a JobHandle>) -> BTreeSet<JobHandle> {
        let mut resolved = BTreeSet::new();
        let mut pending: Vec<JobHandle> = handles.into_iter().cloned().collect();

        while let Some(handle) = pending.pop() {
            match self.get(&handle) {
                Some(node) if node.kind == NodeKind::Join => pending.extend(node.dependencies.iter().cloned()),
                _ => {
                    resolved.insert(handle);
                }
            }
        }
        resolved
    }

    /// Longest chain of join jobs ending at `handle`
    pub fn join_depth(&self, handle: &JobHandle) -> usize {
        match self.get(handle) {
            Some(node) if node.kind == NodeKind::Join => {
                1 + node
                    .dependencies
                    .iter()
                    .map(|dependency| self.join_depth(dependency))
                    .max()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }
}
