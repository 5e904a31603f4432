//! NUI core - dynamic graph layout engine.
//!
//! The crate keeps a dynamic graph laid out while it changes. It compiles to
//! WebAssembly, where the host drives ticks itself, and to native targets,
//! where [`runtime::LayoutThread`] runs the layout at a fixed rate.
//!
//! # Architecture
//!
//! - `graph`: dense index registry over petgraph, and the [`GraphEngine`]
//!   that keeps everything else in step with it
//! - `buffers`: typed per-element buffers that follow registry swaps
//! - `spatial`: bounds, the Barnes-Hut partition and an R-tree pick index
//! - `layout`: force laws and the per-tick driver

use js_sys::Float64Array;
use wasm_bindgen::prelude::*;

pub mod buffers;
pub mod error;
pub mod graph;
pub mod layout;
#[cfg(target_arch = "wasm32")]
pub mod logging;
#[cfg(not(target_arch = "wasm32"))]
pub mod runtime;
pub mod spatial;

pub use error::{NuiError, Result};
pub use graph::{EngineConfig, GraphEngine};

use layout::AttributeValue;

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    #[cfg(target_arch = "wasm32")]
    logging::init_console_logger(log::LevelFilter::Warn);
}

/// Set the console log level: `off`, `error`, `warn`, `info`, `debug` or
/// `trace`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = setLogLevel)]
pub fn set_log_level(level: &str) -> bool {
    match level.parse::<log::LevelFilter>() {
        Ok(filter) => {
            logging::init_console_logger(filter);
            true
        }
        Err(_) => false,
    }
}

fn attribute(value: JsValue) -> Option<AttributeValue> {
    if value.is_undefined() || value.is_null() {
        return Some(AttributeValue::Null);
    }
    match serde_wasm_bindgen::from_value(value) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("unsupported attribute value: {err}");
            None
        }
    }
}

/// Graph engine exposed to JavaScript.
///
/// Rejected operations return `false` (or `undefined`) and log a warning.
#[wasm_bindgen]
pub struct NuiGraph {
    engine: GraphEngine,
}

#[wasm_bindgen]
impl NuiGraph {
    /// Create an engine. `config` is an optional `EngineConfig` object.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> std::result::Result<NuiGraph, JsError> {
        let config = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|err| JsError::new(&err.to_string()))?
        };
        Ok(Self {
            engine: GraphEngine::new(config),
        })
    }

    // =========================================================================
    // Topology
    // =========================================================================

    #[wasm_bindgen(js_name = addNode)]
    pub fn add_node(&mut self, id: &str) -> bool {
        self.engine.add_node(id).is_ok()
    }

    #[wasm_bindgen(js_name = removeNode)]
    pub fn remove_node(&mut self, id: &str) -> bool {
        self.engine.remove_node(id).is_some()
    }

    #[wasm_bindgen(js_name = addEdge)]
    pub fn add_edge(&mut self, id: &str, source: &str, target: &str, directed: bool) -> bool {
        self.engine.add_edge(id, source, target, directed).is_ok()
    }

    #[wasm_bindgen(js_name = removeEdge)]
    pub fn remove_edge(&mut self, id: &str) -> bool {
        self.engine.remove_edge(id).is_some()
    }

    pub fn clear(&mut self) {
        self.engine.clear();
    }

    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> u32 {
        self.engine.node_count() as u32
    }

    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> u32 {
        self.engine.edge_count() as u32
    }

    /// Dense index of a node, valid until the next topology change.
    #[wasm_bindgen(js_name = nodeIndex)]
    pub fn node_index(&self, id: &str) -> Option<u32> {
        self.engine.registry().node_index(id)
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Run one layout tick.
    pub fn step(&mut self) {
        self.engine.step();
    }

    #[wasm_bindgen(js_name = getStabilization)]
    pub fn stabilization(&self) -> f64 {
        self.engine.stabilization()
    }

    #[wasm_bindgen(js_name = isStabilized)]
    pub fn is_stabilized(&self) -> bool {
        self.engine.is_stabilized()
    }

    #[wasm_bindgen(js_name = isPublishNeeded)]
    pub fn is_publish_needed(&self) -> bool {
        self.engine.is_publish_needed()
    }

    #[wasm_bindgen(js_name = markPublished)]
    pub fn mark_published(&mut self) {
        self.engine.mark_published();
    }

    /// `[x, y, z]` of a node.
    #[wasm_bindgen(js_name = getPosition)]
    pub fn position(&self, id: &str) -> Option<Vec<f64>> {
        self.engine.position(id).map(Vec::from)
    }

    /// Zero-copy view of the positions as `[x0, y0, z0, x1, ...]` in index
    /// order.
    ///
    /// # Safety
    ///
    /// The view is invalidated by any Rust allocation: take a new one after
    /// every call into the engine.
    #[wasm_bindgen(js_name = positionsView)]
    pub fn positions_view(&self) -> Float64Array {
        unsafe { Float64Array::view(self.engine.positions()) }
    }

    #[wasm_bindgen(js_name = moveNode)]
    pub fn move_node(&mut self, id: &str, x: f64, y: f64, z: f64) -> bool {
        self.engine.move_node(id, [x, y, z]).is_ok()
    }

    #[wasm_bindgen(js_name = freezeNode)]
    pub fn freeze_node(&mut self, id: &str, frozen: bool) -> bool {
        self.engine.freeze_node(id, frozen).is_ok()
    }

    /// Restart convergence detection without moving anything.
    pub fn shake(&mut self) {
        self.engine.shake();
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    #[wasm_bindgen(js_name = setAttribute)]
    pub fn set_attribute(&mut self, key: &str, value: JsValue) -> bool {
        attribute(value).is_some_and(|value| self.engine.set_attribute(key, &value).is_ok())
    }

    #[wasm_bindgen(js_name = setNodeAttribute)]
    pub fn set_node_attribute(&mut self, id: &str, key: &str, value: JsValue) -> bool {
        attribute(value).is_some_and(|value| self.engine.set_node_attribute(id, key, &value).is_ok())
    }

    #[wasm_bindgen(js_name = setEdgeAttribute)]
    pub fn set_edge_attribute(&mut self, id: &str, key: &str, value: JsValue) -> bool {
        attribute(value).is_some_and(|value| self.engine.set_edge_attribute(id, key, &value).is_ok())
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// The facade's operations without wasm_bindgen JS types.
    #[test]
    fn test_engine_round_trip() {
        let mut engine = GraphEngine::default();
        for id in ["a", "b", "c", "d"] {
            engine.add_node(id).unwrap();
        }
        engine.add_edge("ab", "a", "b", false).unwrap();
        engine.add_edge("bc", "b", "c", false).unwrap();
        engine.add_edge("cd", "c", "d", false).unwrap();

        for _ in 0..10 {
            engine.step();
        }
        assert!(engine.is_publish_needed());
        assert_eq!(engine.positions().len(), 12);

        engine.remove_node("b");
        assert_eq!(engine.edge_count(), 1);
        assert_eq!(engine.positions().len(), 9);
        assert!(engine.positions().iter().all(|c| c.is_finite()));
    }
}
