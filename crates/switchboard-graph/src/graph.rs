use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::debug;

use switchboard_core::error::{FlowError, Result};

use crate::node::{Node, NodeKind, BACKUP_NODE};

/// Mutable wiring phase of a graph.
///
/// Nodes are registered by cloning the first time they appear as a connection
/// target; `connect` then always refers to the registered copy by name.
#[derive(Debug)]
pub struct GraphBuilder {
    root: String,
    nodes: HashMap<String, Node>,
    order: Vec<String>,
    edges: Vec<(String, String)>,
}

impl GraphBuilder {
    pub fn new(root: Node) -> Self {
        let name = root.name().to_string();
        let mut nodes = HashMap::new();
        nodes.insert(name.clone(), root);
        Self {
            root: name.clone(),
            nodes,
            order: vec![name],
            edges: Vec::new(),
        }
    }

    /// Connect `from` (a registered node) to `to`.
    pub fn connect(&mut self, from: &str, to: &Node) -> Result<()> {
        let edge_count = self.edges.iter().filter(|(f, _)| f == from).count();
        let source = self
            .nodes
            .get_mut(from)
            .ok_or_else(|| FlowError::NodeNotFound(from.to_string()))?;

        if source.is_interactive() && edge_count > 0 {
            return Err(FlowError::InteractiveFanOut(from.to_string()));
        }
        if self.edges.iter().any(|(f, t)| f == from && t == to.name()) {
            return Err(FlowError::DuplicateEdge {
                from: from.to_string(),
                to: to.name().to_string(),
            });
        }

        source.push_child(to.descriptor().clone());
        self.edges.push((from.to_string(), to.name().to_string()));
        if !self.nodes.contains_key(to.name()) {
            self.nodes.insert(to.name().to_string(), to.clone());
            self.order.push(to.name().to_string());
        }
        debug!(from, to = to.name(), "Connected nodes");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Freeze the wiring.
    pub fn build(self) -> Graph {
        Graph {
            root: self.root,
            nodes: self.nodes,
            order: self.order,
            edges: self.edges,
        }
    }
}

/// Immutable conversation graph, shared across conversations.
#[derive(Debug)]
pub struct Graph {
    root: String,
    nodes: HashMap<String, Node>,
    order: Vec<String>,
    edges: Vec<(String, String)>,
}

impl Graph {
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn has_backup(&self) -> bool {
        self.nodes.contains_key(BACKUP_NODE)
    }

    /// Nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|n| self.nodes.get(n))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Child names of `name`, in wiring order.
    pub fn children(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(f, _)| f == name)
            .map(|(_, t)| t.as_str())
            .collect()
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Graphviz rendering of the topology.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph conversation {\n    rankdir=LR;\n");
        for node in self.nodes() {
            let shape = match node.kind() {
                NodeKind::ModelRouted => "ellipse",
                NodeKind::Action => "box",
                NodeKind::Vision => "hexagon",
            };
            let mut attrs = format!("shape={shape}");
            if node.is_interactive() {
                attrs.push_str(", style=bold, peripheries=2");
            }
            if node.name() == self.root {
                attrs.push_str(", style=filled");
            }
            let _ = writeln!(out, "    \"{}\" [{}];", node.name(), attrs);
        }
        for (from, to) in &self.edges {
            let _ = writeln!(out, "    \"{from}\" -> \"{to}\";");
        }
        out.push_str("}\n");
        out
    }
}
