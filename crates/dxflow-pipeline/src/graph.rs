//! Job DAG handed to the external scheduler.
//!
//! Nodes live in an arena indexed by insertion order; edges are `(from, to)`
//! index pairs. The scheduler owns execution, so the graph itself only
//! answers structural questions.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Logical operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    CollectHsMetrics,
    DepthToDocFormat,
    FilterByPanel,
    SortSam,
    Zip,
    FilterVariant,
    Remove,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::CollectHsMetrics => "CollectHsMetrics",
            JobKind::DepthToDocFormat => "DepthToDocFormat",
            JobKind::FilterByPanel => "FilterByPanel",
            JobKind::SortSam => "SortSam",
            JobKind::Zip => "Zip",
            JobKind::FilterVariant => "FilterVariant",
            JobKind::Remove => "Remove",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One argument of a job. Flags may repeat (e.g. several zip entries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobArg {
    pub flag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl JobArg {
    pub fn value(flag: &str, value: impl Into<String>) -> Self {
        Self {
            flag: flag.to_string(),
            value: Some(value.into()),
        }
    }

    pub fn path(flag: &str, path: &Path) -> Self {
        Self::value(flag, path.display().to_string())
    }

    pub fn switch(flag: &str) -> Self {
        Self {
            flag: flag.to_string(),
            value: None,
        }
    }
}

/// A fully resolved job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobNode {
    pub index: usize,
    /// `<Kind>_<n>`, `n` counting from 1 in emission order.
    pub name: String,
    pub kind: JobKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    pub processors: u32,
    pub args: Vec<JobArg>,
    /// Files this job writes; used for provenance lookups.
    pub outputs: Vec<PathBuf>,
}

impl JobNode {
    /// Values of every argument with the given flag, in order.
    pub fn arg_values(&self, flag: &str) -> Vec<&str> {
        self.args
            .iter()
            .filter(|a| a.flag == flag)
            .filter_map(|a| a.value.as_deref())
            .collect()
    }

    pub fn has_switch(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a.flag == flag && a.value.is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
}

/// Directed job graph for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobGraph {
    pub attempt_id: i64,
    nodes: Vec<JobNode>,
    edges: Vec<Edge>,
}

impl JobGraph {
    pub fn new(attempt_id: i64) -> Self {
        Self {
            attempt_id,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Append a job and return its index.
    pub fn add_job(
        &mut self,
        kind: JobKind,
        site_name: Option<String>,
        processors: u32,
        args: Vec<JobArg>,
        outputs: Vec<PathBuf>,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(JobNode {
            index,
            name: format!("{}_{}", kind, index + 1),
            kind,
            site_name,
            processors,
            args,
            outputs,
        });
        index
    }

    /// Add a dependency: `to` runs after `from`. Duplicate edges are ignored.
    ///
    /// # Panics
    ///
    /// If either index was not returned by [`JobGraph::add_job`].
    pub fn add_edge(&mut self, from: usize, to: usize) {
        assert!(
            from < self.nodes.len() && to < self.nodes.len(),
            "edge {from} -> {to} references an unknown job"
        );
        let edge = Edge { from, to };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[JobNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, index: usize) -> Option<&JobNode> {
        self.nodes.get(index)
    }

    /// First job of the given kind.
    pub fn find(&self, kind: JobKind) -> Option<&JobNode> {
        self.nodes.iter().find(|n| n.kind == kind)
    }

    /// The job declaring `path` as an output.
    pub fn producer_of(&self, path: &Path) -> Option<&JobNode> {
        self.nodes.iter().find(|n| n.outputs.iter().any(|o| o == path))
    }

    pub fn predecessors(&self, index: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|e| e.to == index)
            .map(|e| e.from)
            .collect()
    }

    pub fn successors(&self, index: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|e| e.from == index)
            .map(|e| e.to)
            .collect()
    }

    /// Jobs with no predecessor.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| !self.edges.iter().any(|e| e.to == i))
            .collect()
    }

    /// Kahn's algorithm, lowest ready index first. `None` if the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut adj: Vec<Vec<usize>> = vec![vec![]; n];
        for edge in &self.edges {
            adj[edge.from].push(edge.to);
            in_degree[edge.to] += 1;
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &neighbor in &adj[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    ready.insert(neighbor);
                }
            }
        }

        (order.len() == n).then_some(order)
    }

    /// Graphviz rendering.
    pub fn to_dot(&self) -> String {
        let mut out = format!("digraph \"attempt_{}\" {{\n", self.attempt_id);
        for node in &self.nodes {
            out.push_str(&format!("  \"{}\";\n", node.name));
        }
        for edge in &self.edges {
            out.push_str(&format!(
                "  \"{}\" -> \"{}\";\n",
                self.nodes[edge.from].name, self.nodes[edge.to].name
            ));
        }
        out.push_str("}\n");
        out
    }
}
