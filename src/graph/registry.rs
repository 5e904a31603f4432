//! IndexRegistry - dense, swap-compacted element indexes.
//!
//! Topology is stored in a petgraph [`Graph`], whose removals already use
//! swap-remove: the last node (or edge) takes the index of the removed one.
//! The registry mirrors that with an id map per kind and records one
//! [`IndexEvent`] per slot change so that dependent structures can follow.

use std::cmp::Reverse;
use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use super::{ElementIndex, ElementKind, IndexEvent};
use crate::error::{NuiError, Result};

/// Registry behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Create missing endpoint nodes when an edge names them.
    /// When off, such an edge is rejected with `DanglingEndpoint`.
    pub auto_create_endpoints: bool,
}

#[derive(Debug, Clone)]
struct EdgeEntry {
    id: String,
    directed: bool,
}

/// Assigns and recycles dense indexes for nodes and edges.
///
/// The registry is the single source of truth for element counts. It is not
/// safe for concurrent mutation; all structural changes must be serialized
/// onto one thread.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    config: RegistryConfig,
    graph: Graph<String, EdgeEntry, Directed, u32>,
    node_ids: HashMap<String, NodeIndex>,
    edge_ids: HashMap<String, EdgeIndex>,
    events: Vec<IndexEvent>,
}

impl IndexRegistry {
    /// Create an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Register a node and return its dense index (the previous count).
    pub fn add_node(&mut self, id: &str) -> Result<u32> {
        if self.node_ids.contains_key(id) {
            return Err(NuiError::DuplicateId {
                kind: ElementKind::Node,
                id: id.to_owned(),
            });
        }

        let index = self.graph.add_node(id.to_owned());
        self.node_ids.insert(id.to_owned(), index);
        self.events.push(IndexEvent::Added {
            kind: ElementKind::Node,
            index: index.index() as u32,
        });
        Ok(index.index() as u32)
    }

    /// Unregister a node and all of its edges.
    ///
    /// Returns the index the node occupied, or `None` if the id is unknown.
    pub fn remove_node(&mut self, id: &str) -> Option<u32> {
        let Some(&index) = self.node_ids.get(id) else {
            log::warn!(
                "{}",
                NuiError::UnknownId {
                    kind: ElementKind::Node,
                    id: id.to_owned(),
                }
            );
            return None;
        };

        // Highest index first: each swap-remove then only relocates an edge
        // that is not incident, so the collected indexes stay valid.
        let mut incident: Vec<EdgeIndex> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .chain(self.graph.edges_directed(index, Direction::Incoming))
            .map(|e| e.id())
            .collect();
        incident.sort_unstable_by_key(|e| Reverse(e.index()));
        incident.dedup();
        for edge in incident {
            self.remove_edge_at(edge);
        }

        let last = NodeIndex::new(self.graph.node_count() - 1);
        if index != last {
            if let Some(slot) = self.node_ids.get_mut(self.graph[last].as_str()) {
                *slot = index;
            }
            self.events.push(IndexEvent::Swapped {
                kind: ElementKind::Node,
                from: last.index() as u32,
                to: index.index() as u32,
            });
        }

        if let Some(removed) = self.graph.remove_node(index) {
            self.node_ids.remove(&removed);
        }
        self.events.push(IndexEvent::Removed {
            kind: ElementKind::Node,
            index: last.index() as u32,
        });
        Some(index.index() as u32)
    }

    /// Register an edge between two nodes and return its dense index.
    ///
    /// Unknown endpoints are created first when `auto_create_endpoints` is
    /// set; otherwise the edge is rejected and nothing changes.
    pub fn add_edge(&mut self, id: &str, source: &str, target: &str, directed: bool) -> Result<u32> {
        if self.edge_ids.contains_key(id) {
            return Err(NuiError::DuplicateId {
                kind: ElementKind::Edge,
                id: id.to_owned(),
            });
        }

        if !self.config.auto_create_endpoints {
            for node in [source, target] {
                if !self.node_ids.contains_key(node) {
                    return Err(NuiError::DanglingEndpoint {
                        edge: id.to_owned(),
                        node: node.to_owned(),
                    });
                }
            }
        }

        let a = self.resolve_endpoint(source)?;
        let b = self.resolve_endpoint(target)?;

        let index = self.graph.add_edge(
            a,
            b,
            EdgeEntry {
                id: id.to_owned(),
                directed,
            },
        );
        self.edge_ids.insert(id.to_owned(), index);
        self.events.push(IndexEvent::Added {
            kind: ElementKind::Edge,
            index: index.index() as u32,
        });
        Ok(index.index() as u32)
    }

    /// Unregister an edge.
    ///
    /// Returns the index the edge occupied, or `None` if the id is unknown.
    pub fn remove_edge(&mut self, id: &str) -> Option<u32> {
        let Some(&index) = self.edge_ids.get(id) else {
            log::warn!(
                "{}",
                NuiError::UnknownId {
                    kind: ElementKind::Edge,
                    id: id.to_owned(),
                }
            );
            return None;
        };

        self.remove_edge_at(index);
        Some(index.index() as u32)
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.events.push(IndexEvent::Cleared);
        self.graph.clear();
        self.node_ids.clear();
        self.edge_ids.clear();
    }

    /// Take the notifications recorded since the last call, in emission order.
    pub fn drain_events(&mut self) -> Vec<IndexEvent> {
        std::mem::take(&mut self.events)
    }

    fn resolve_endpoint(&mut self, node: &str) -> Result<NodeIndex> {
        if let Some(&index) = self.node_ids.get(node) {
            return Ok(index);
        }
        let index = self.add_node(node)?;
        Ok(NodeIndex::new(index as usize))
    }

    fn remove_edge_at(&mut self, index: EdgeIndex) {
        let last = EdgeIndex::new(self.graph.edge_count() - 1);
        if index != last {
            if let Some(slot) = self.edge_ids.get_mut(self.graph[last].id.as_str()) {
                *slot = index;
            }
            self.events.push(IndexEvent::Swapped {
                kind: ElementKind::Edge,
                from: last.index() as u32,
                to: index.index() as u32,
            });
        }

        if let Some(removed) = self.graph.remove_edge(index) {
            self.edge_ids.remove(&removed.id);
        }
        self.events.push(IndexEvent::Removed {
            kind: ElementKind::Edge,
            index: last.index() as u32,
        });
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of registered edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Sprites are not tracked by the registry.
    pub fn sprite_count(&self) -> usize {
        0
    }

    /// Element count for a kind.
    pub fn count(&self, kind: ElementKind) -> usize {
        match kind {
            ElementKind::Node => self.node_count(),
            ElementKind::Edge => self.edge_count(),
            ElementKind::Sprite => self.sprite_count(),
        }
    }

    /// Current index of a node id.
    pub fn node_index(&self, id: &str) -> Option<u32> {
        self.node_ids.get(id).map(|i| i.index() as u32)
    }

    /// Current index of an edge id.
    pub fn edge_index(&self, id: &str) -> Option<u32> {
        self.edge_ids.get(id).map(|i| i.index() as u32)
    }

    /// Id of the node at `index`.
    pub fn node_id(&self, index: u32) -> Option<&str> {
        self.graph
            .node_weight(NodeIndex::new(index as usize))
            .map(String::as_str)
    }

    /// Id of the edge at `index`.
    pub fn edge_id(&self, index: u32) -> Option<&str> {
        self.graph
            .edge_weight(EdgeIndex::new(index as usize))
            .map(|e| e.id.as_str())
    }

    /// The element occupying `index` for `kind`.
    pub fn element(&self, kind: ElementKind, index: u32) -> Option<ElementIndex<'_>> {
        let id = match kind {
            ElementKind::Node => self.node_id(index)?,
            ElementKind::Edge => self.edge_id(index)?,
            ElementKind::Sprite => return None,
        };
        Some(ElementIndex { kind, index, id })
    }

    /// Node ids in index order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Source and target node indexes of an edge.
    pub fn edge_endpoints(&self, edge: u32) -> Option<(u32, u32)> {
        self.graph
            .edge_endpoints(EdgeIndex::new(edge as usize))
            .map(|(a, b)| (a.index() as u32, b.index() as u32))
    }

    /// Whether the edge at `edge` is directed.
    pub fn is_directed(&self, edge: u32) -> bool {
        self.graph
            .edge_weight(EdgeIndex::new(edge as usize))
            .is_some_and(|e| e.directed)
    }

    /// Number of edge ends incident to a node (a self-loop counts twice).
    pub fn degree(&self, node: u32) -> usize {
        let index = NodeIndex::new(node as usize);
        self.graph.edges_directed(index, Direction::Outgoing).count()
            + self.graph.edges_directed(index, Direction::Incoming).count()
    }

    /// Whether an edge joins the two nodes in either direction.
    pub fn are_connected(&self, a: u32, b: u32) -> bool {
        self.graph
            .find_edge_undirected(NodeIndex::new(a as usize), NodeIndex::new(b as usize))
            .is_some()
    }
}
