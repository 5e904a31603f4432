//! GraphEngine - the composition root.
//!
//! The engine owns the registry and everything that mirrors it. Each public
//! mutation drains the registry's events and hands them, one at a time, to
//! the buffer swapper, the layout and the partition, in that order:
//! buffers must be resized before the layout writes a placement, and the
//! placement must exist before the partition indexes the node.

use serde::{Deserialize, Serialize};

use super::{ElementKind, IndexRegistry, RegistryConfig, TopologyEvent};
use crate::buffers::{
    ArrayRef, BufferId, BufferRef, BufferSwapper, InitContext, Initializer, PrimitiveType, SwapperConfig,
};
use crate::error::{NuiError, Result, warned};
use crate::layout::{AttributeValue, ForceLayout, LayoutConfig, LayoutContext};
use crate::spatial::{Bodies, BoundsProvider, PartitionConfig, Space, SpaceConfig, SpacePartition};

/// Configuration of every engine component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub registry: RegistryConfig,
    pub swapper: SwapperConfig,
    pub partition: PartitionConfig,
    pub space: SpaceConfig,
    pub layout: LayoutConfig,
}

/// A graph with a live force-directed layout.
///
/// Not thread-safe: every call must come from the thread that runs the
/// layout. See `runtime::LayoutThread` for a threaded driver.
pub struct GraphEngine {
    registry: IndexRegistry,
    swapper: BufferSwapper,
    partition: SpacePartition,
    space: Space,
    layout: ForceLayout,
}

impl Default for GraphEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl GraphEngine {
    /// Create an empty engine.
    pub fn new(config: EngineConfig) -> Self {
        let registry = IndexRegistry::new(config.registry);
        let mut swapper = BufferSwapper::new(config.swapper);
        let space = Space::new(config.space);
        let partition = SpacePartition::new(config.partition, space.bounds(), space.is_3d());
        let layout = ForceLayout::new(config.layout, &registry, &mut swapper);
        Self {
            registry,
            swapper,
            partition,
            space,
            layout,
        }
    }

    // =========================================================================
    // Components
    // =========================================================================

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    pub fn swapper(&self) -> &BufferSwapper {
        &self.swapper
    }

    /// Mutable buffer access. Buffer contents only; the registry drives
    /// lengths.
    pub fn swapper_mut(&mut self) -> &mut BufferSwapper {
        &mut self.swapper
    }

    pub fn partition(&self) -> &SpacePartition {
        &self.partition
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn space_mut(&mut self) -> &mut Space {
        &mut self.space
    }

    pub fn layout(&self) -> &ForceLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut ForceLayout {
        &mut self.layout
    }

    pub(crate) fn split_layout(&mut self) -> (&mut ForceLayout, LayoutContext<'_>) {
        (
            &mut self.layout,
            LayoutContext {
                registry: &self.registry,
                swapper: &mut self.swapper,
                partition: &mut self.partition,
                space: &mut self.space,
            },
        )
    }

    // =========================================================================
    // Buffers
    // =========================================================================

    /// Register a primitive buffer that follows `kind`.
    pub fn create_buffer(
        &mut self,
        kind: ElementKind,
        components: usize,
        primitive: PrimitiveType,
        initializer: Option<Initializer>,
    ) -> BufferRef {
        self.swapper
            .create_buffer(&self.registry, kind, components, primitive, initializer)
    }

    /// Register an object array that follows `kind`.
    pub fn create_array<T, F>(&mut self, kind: ElementKind, components: usize, factory: F) -> ArrayRef<T>
    where
        T: Send + 'static,
        F: Fn(&InitContext<'_>, usize) -> T + Send + 'static,
    {
        self.swapper.create_array(&self.registry, kind, components, factory)
    }

    /// Unregister a buffer created through [`Self::create_buffer`] or
    /// [`Self::create_array`].
    pub fn release_buffer(&mut self, handle: impl Into<BufferId>) -> bool {
        self.swapper.release(handle)
    }

    // =========================================================================
    // Topology
    // =========================================================================

    fn dispatch(&mut self) {
        for event in self.registry.drain_events() {
            self.swapper.apply(&event, &self.registry);
            let mut cx = LayoutContext {
                registry: &self.registry,
                swapper: &mut self.swapper,
                partition: &mut self.partition,
                space: &mut self.space,
            };
            self.layout.apply(&event, &mut cx);
            let bodies = self.layout.bodies(&self.swapper);
            self.partition.apply(&event, &bodies, self.space.bounds());
        }
    }

    /// Add a node. A duplicate id is logged and rejected.
    pub fn add_node(&mut self, id: &str) -> Result<u32> {
        let result = warned(self.registry.add_node(id));
        self.dispatch();
        result
    }

    /// Remove a node and its edges. Returns the index it occupied.
    pub fn remove_node(&mut self, id: &str) -> Option<u32> {
        let index = self.registry.remove_node(id);
        self.dispatch();
        index
    }

    /// Add an edge. Duplicate ids and dangling endpoints are logged and
    /// rejected.
    pub fn add_edge(&mut self, id: &str, source: &str, target: &str, directed: bool) -> Result<u32> {
        let result = warned(self.registry.add_edge(id, source, target, directed));
        self.dispatch();
        result
    }

    /// Remove an edge. Returns the index it occupied.
    pub fn remove_edge(&mut self, id: &str) -> Option<u32> {
        let index = self.registry.remove_edge(id);
        self.dispatch();
        index
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.dispatch();
    }

    /// Apply one raw topology event.
    pub fn apply_topology(&mut self, event: &TopologyEvent) -> Result<()> {
        match event {
            TopologyEvent::NodeAdded { id } => self.add_node(id).map(drop),
            TopologyEvent::NodeRemoved { id } => self.remove_node(id).map(drop).ok_or_else(|| NuiError::UnknownId {
                kind: ElementKind::Node,
                id: id.clone(),
            }),
            TopologyEvent::EdgeAdded {
                id,
                source,
                target,
                directed,
            } => self.add_edge(id, source, target, *directed).map(drop),
            TopologyEvent::EdgeRemoved { id } => self.remove_edge(id).map(drop).ok_or_else(|| NuiError::UnknownId {
                kind: ElementKind::Edge,
                id: id.clone(),
            }),
            TopologyEvent::Cleared => {
                self.clear();
                Ok(())
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.registry.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.registry.edge_count()
    }

    /// Node ids in index order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.registry.node_ids()
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Run one layout tick.
    pub fn step(&mut self) {
        let (layout, mut cx) = self.split_layout();
        layout.compute(&mut cx);
    }

    /// Convergence score in `[0, 1]`.
    pub fn stabilization(&self) -> f64 {
        self.layout.stabilization()
    }

    pub fn is_stabilized(&self) -> bool {
        self.layout.is_stabilized()
    }

    pub fn is_publish_needed(&self) -> bool {
        self.layout.is_publish_needed()
    }

    pub fn mark_published(&mut self) {
        self.layout.mark_published();
    }

    /// Forget the energy history.
    pub fn shake(&mut self) {
        self.layout.shake();
    }

    /// Live node positions as flat xyz triples, in index order. Only valid
    /// until the next mutation or tick.
    pub fn positions(&self) -> &[f64] {
        self.swapper.direct::<f64>(self.layout.positions())
    }

    pub fn position(&self, id: &str) -> Option<[f64; 3]> {
        let index = self.registry.node_index(id)?;
        Some(self.position_at(index as usize))
    }

    /// Position of the node at `index`. Panics on a stale index.
    pub fn position_at(&self, index: usize) -> [f64; 3] {
        let buffer = self.layout.positions();
        [0, 1, 2].map(|axis| self.swapper.get::<f64>(buffer, index, axis))
    }

    fn node(&self, id: &str) -> Result<usize> {
        self.registry
            .node_index(id)
            .map(|index| index as usize)
            .ok_or_else(|| NuiError::UnknownId {
                kind: ElementKind::Node,
                id: id.to_owned(),
            })
    }

    fn edge(&self, id: &str) -> Result<usize> {
        self.registry
            .edge_index(id)
            .map(|index| index as usize)
            .ok_or_else(|| NuiError::UnknownId {
                kind: ElementKind::Edge,
                id: id.to_owned(),
            })
    }

    /// Place a node explicitly. Non-finite coordinates are rejected.
    pub fn move_node(&mut self, id: &str, p: [f64; 3]) -> Result<()> {
        let node = warned(self.node(id))?;
        if !p.iter().all(|c| c.is_finite()) {
            return warned(Err(NuiError::InvalidAttribute {
                key: "xyz".to_owned(),
                value: format!("{p:?}"),
            }));
        }
        let (layout, mut cx) = self.split_layout();
        layout.move_node(node, p, &mut cx);
        Ok(())
    }

    /// Frozen nodes keep their position while the rest of the layout runs.
    pub fn freeze_node(&mut self, id: &str, frozen: bool) -> Result<()> {
        let node = warned(self.node(id))?;
        self.layout.freeze_node(&mut self.swapper, node, frozen);
        Ok(())
    }

    /// Nodes within an axis-aligned box of half-size `radius` around `id`.
    pub fn neighborhood(&self, id: &str, radius: f64) -> Result<Vec<&str>> {
        let node = warned(self.node(id))?;
        let bodies = self.layout.bodies(&self.swapper);
        Ok(self
            .partition
            .exact_neighborhood(node, radius, &bodies)
            .filter_map(|other| self.registry.node_id(other))
            .collect())
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Apply a layout-wide attribute. Unknown keys are ignored.
    pub fn set_attribute(&mut self, key: &str, value: &AttributeValue) -> Result<()> {
        if !warned(self.layout.set_attribute(key, value))? {
            log::debug!("attribute '{key}' ignored by the layout");
        }
        Ok(())
    }

    /// Apply a node attribute: `weight`, `frozen`, `xyz`, `x`, `y` or `z`.
    pub fn set_node_attribute(&mut self, id: &str, key: &str, value: &AttributeValue) -> Result<()> {
        let node = warned(self.node(id))?;
        warned(self.apply_node_attribute(node, key, value))
    }

    fn apply_node_attribute(&mut self, node: usize, key: &str, value: &AttributeValue) -> Result<()> {
        match key {
            "weight" => {
                let weight = if value.is_null() { 1.0 } else { value.to_number(key)? };
                let (layout, mut cx) = self.split_layout();
                layout.set_node_weight(&mut cx, node, weight);
            }
            "frozen" => {
                let frozen = value.to_flag(key, true)?;
                self.layout.freeze_node(&mut self.swapper, node, frozen);
            }
            "xyz" => {
                let p = value.to_point(key)?;
                let (layout, mut cx) = self.split_layout();
                layout.move_node(node, p, &mut cx);
            }
            "x" | "y" | "z" => {
                let axis = match key {
                    "x" => 0,
                    "y" => 1,
                    _ => 2,
                };
                let mut p = self.position_at(node);
                p[axis] = value.to_number(key)?;
                let (layout, mut cx) = self.split_layout();
                layout.move_node(node, p, &mut cx);
            }
            _ => log::debug!("node attribute '{key}' ignored by the layout"),
        }
        Ok(())
    }

    /// Apply an edge attribute: `weight` or `ignored`.
    pub fn set_edge_attribute(&mut self, id: &str, key: &str, value: &AttributeValue) -> Result<()> {
        let edge = warned(self.edge(id))?;
        warned(self.apply_edge_attribute(edge, key, value))
    }

    fn apply_edge_attribute(&mut self, edge: usize, key: &str, value: &AttributeValue) -> Result<()> {
        match key {
            "weight" => {
                let weight = if value.is_null() { 1.0 } else { value.to_number(key)? };
                self.layout.set_edge_weight(&mut self.swapper, edge, weight);
            }
            "ignored" => {
                let ignored = value.to_flag(key, true)?;
                self.layout.set_edge_ignored(&mut self.swapper, edge, ignored);
            }
            _ => log::debug!("edge attribute '{key}' ignored by the layout"),
        }
        Ok(())
    }
}

impl Bodies for GraphEngine {
    fn len(&self) -> usize {
        self.registry.node_count()
    }

    fn position(&self, node: usize) -> [f64; 3] {
        self.position_at(node)
    }

    fn weight(&self, node: usize) -> f64 {
        self.swapper.objects(self.layout.particles())[node].weight
    }

    fn degree(&self, node: usize) -> f64 {
        self.registry.degree(node as u32) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::Sizing;
    use crate::layout::Spring;

    fn path(n: usize) -> GraphEngine {
        let mut engine = GraphEngine::default();
        for i in 0..n {
            engine.add_node(&format!("n{i}")).unwrap();
        }
        for i in 1..n {
            engine
                .add_edge(&format!("e{i}"), &format!("n{}", i - 1), &format!("n{i}"), false)
                .unwrap();
        }
        engine
    }

    fn assert_lockstep(engine: &GraphEngine) {
        let n = engine.node_count();
        assert_eq!(engine.swapper().len(ElementKind::Node), n);
        assert_eq!(engine.swapper().len(ElementKind::Edge), engine.edge_count());
        assert_eq!(engine.positions().len(), n * 3);
        assert_eq!(engine.partition().len(), n);
    }

    #[test]
    fn test_add_and_remove() {
        let mut engine = path(3);
        assert_eq!(engine.node_count(), 3);
        assert_eq!(engine.edge_count(), 2);
        assert_lockstep(&engine);

        let c = engine.position("n2").unwrap();
        assert_eq!(engine.remove_node("n1"), Some(1));
        assert_eq!(engine.edge_count(), 0);
        // n2 took slot 1 and kept its position.
        assert_eq!(engine.registry().node_index("n2"), Some(1));
        assert_eq!(engine.position("n2"), Some(c));
        assert_lockstep(&engine);
    }

    #[test]
    fn test_rejected_topology_changes_nothing() {
        let mut engine = path(2);
        assert!(matches!(engine.add_node("n0"), Err(NuiError::DuplicateId { .. })));
        assert!(matches!(
            engine.add_edge("e9", "n0", "z", false),
            Err(NuiError::DanglingEndpoint { .. })
        ));
        assert_eq!(engine.remove_node("z"), None);
        assert_eq!(engine.node_count(), 2);
        assert_eq!(engine.edge_count(), 1);
        assert_lockstep(&engine);
    }

    #[test]
    fn test_apply_topology() {
        let mut engine = GraphEngine::default();
        let events: Vec<TopologyEvent> = vec![
            TopologyEvent::NodeAdded { id: "a".into() },
            TopologyEvent::NodeAdded { id: "b".into() },
            TopologyEvent::EdgeAdded {
                id: "ab".into(),
                source: "a".into(),
                target: "b".into(),
                directed: true,
            },
        ];
        for event in &events {
            engine.apply_topology(event).unwrap();
        }
        assert!(engine.registry().is_directed(0));
        assert!(
            engine
                .apply_topology(&TopologyEvent::EdgeRemoved { id: "zz".into() })
                .is_err()
        );
        engine.apply_topology(&TopologyEvent::Cleared).unwrap();
        assert_eq!(engine.node_count(), 0);
        assert_lockstep(&engine);
    }

    #[test]
    fn test_auto_create_endpoints() {
        let mut engine = GraphEngine::new(EngineConfig {
            registry: RegistryConfig {
                auto_create_endpoints: true,
            },
            ..EngineConfig::default()
        });
        engine.add_edge("e", "x", "y", false).unwrap();
        assert_eq!(engine.node_count(), 2);
        assert_lockstep(&engine);
    }

    #[test]
    fn test_spring_state_follows_swaps() {
        let mut engine = path(4);
        engine.set_edge_attribute("e3", "weight", &2.0.into()).unwrap();
        engine.remove_edge("e1");
        let index = engine.registry().edge_index("e3").unwrap() as usize;
        let springs = engine.swapper().objects(engine.layout().springs());
        assert_eq!(
            springs[index],
            Spring {
                weight: 2.0,
                ignored: false
            }
        );
    }

    #[test]
    fn test_node_attributes() {
        let mut engine = path(2);
        engine.set_node_attribute("n0", "xyz", &vec![5.0, 6.0].into()).unwrap();
        assert_eq!(engine.position("n0"), Some([5.0, 6.0, 0.0]));
        engine.set_node_attribute("n0", "y", &"7".into()).unwrap();
        assert_eq!(engine.position("n0"), Some([5.0, 7.0, 0.0]));

        engine.set_node_attribute("n0", "weight", &3.0.into()).unwrap();
        assert_eq!(engine.weight(0), 3.0);
        engine.set_node_attribute("n0", "weight", &AttributeValue::Null).unwrap();
        assert_eq!(engine.weight(0), 1.0);

        assert!(engine.set_node_attribute("n0", "weight", &"heavy".into()).is_err());
        assert_eq!(engine.weight(0), 1.0);
        assert!(engine.set_node_attribute("nope", "weight", &1.0.into()).is_err());
        engine.set_node_attribute("n0", "ui.color", &"red".into()).unwrap();
    }

    #[test]
    fn test_move_resets_energy_and_publishes() {
        let mut engine = path(3);
        engine.step();
        engine.step();
        engine.mark_published();
        assert_eq!(engine.layout().energy().len(), 2);

        engine.move_node("n1", [1.0, 2.0, 0.0]).unwrap();
        assert!(engine.layout().energy().is_empty());
        assert!(engine.is_publish_needed());
        assert_eq!(engine.position("n1"), Some([1.0, 2.0, 0.0]));
        assert!(engine.move_node("ghost", [0.0; 3]).is_err());
    }

    #[test]
    fn test_move_rejects_non_finite_coordinates() {
        let mut engine = path(30);
        let before = engine.position("n3");

        let err = engine.move_node("n3", [f64::NAN, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, NuiError::InvalidAttribute { .. }));
        assert!(engine.move_node("n4", [0.0, f64::INFINITY, 0.0]).is_err());
        assert_eq!(engine.position("n3"), before);

        engine.step();
        assert!(engine.positions().iter().all(|c| c.is_finite()));
        assert_eq!(engine.partition().len(), 30);
    }

    #[test]
    fn test_move_outside_bounds_rebuilds_partition() {
        let mut engine = path(3);
        engine.move_node("n2", [1000.0, -1000.0, 0.0]).unwrap();
        let root = engine.partition().root();
        assert!(engine.partition().bounds(root).contains([1000.0, -1000.0, 0.0]));
        assert_lockstep(&engine);
    }

    #[test]
    fn test_neighborhood() {
        let mut engine = path(3);
        engine.move_node("n0", [0.0, 0.0, 0.0]).unwrap();
        engine.move_node("n1", [1.0, 1.0, 0.0]).unwrap();
        engine.move_node("n2", [50.0, 50.0, 0.0]).unwrap();
        assert_eq!(engine.neighborhood("n0", 2.0).unwrap(), vec!["n1"]);
        let mut all = engine.neighborhood("n0", f64::INFINITY).unwrap();
        all.sort_unstable();
        assert_eq!(all, vec!["n1", "n2"]);
    }

    #[test]
    fn test_user_buffer_follows_registry() {
        let mut engine = path(2);
        let labels = engine.create_array(ElementKind::Node, 1, |cx, _| {
            cx.element().map(|e| e.id.to_owned()).unwrap_or_default()
        });
        engine.add_node("n2").unwrap();
        engine.remove_node("n0");
        assert_eq!(engine.swapper().objects(labels), ["n2", "n1"]);
        assert!(engine.release_buffer(labels));
    }

    #[test]
    fn test_custom_sizing_config() {
        let mut config = EngineConfig::default();
        config.swapper.node = Sizing::new(10, 5);
        let mut engine = GraphEngine::new(config);
        for i in 0..12 {
            engine.add_node(&i.to_string()).unwrap();
        }
        assert_eq!(engine.swapper().capacity(engine.layout().positions()), 15);
    }
}
