//! End-to-end scenarios over the public API.

use nui_core::buffers::{BufferSwapper, PrimitiveType, Sizing, SwapperConfig};
use nui_core::graph::{ElementKind, EngineConfig, GraphEngine, IndexEvent, IndexRegistry, RegistryConfig};
use nui_core::layout::{AttributeValue, LawKind};
use nui_core::spatial::{BoundsProvider, SpaceMode};
use nui_core::NuiError;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn remove_middle_node() {
    init_logger();
    let mut registry = IndexRegistry::new(RegistryConfig::default());
    for id in ["a", "b", "c"] {
        registry.add_node(id).unwrap();
    }
    registry.drain_events();

    assert_eq!(registry.remove_node("b"), Some(1));
    assert_eq!(
        registry.drain_events(),
        vec![
            IndexEvent::Swapped {
                kind: ElementKind::Node,
                from: 2,
                to: 1,
            },
            IndexEvent::Removed {
                kind: ElementKind::Node,
                index: 2,
            },
        ]
    );
    assert_eq!(registry.node_index("a"), Some(0));
    assert_eq!(registry.node_index("c"), Some(1));
    assert_eq!(registry.node_index("b"), None);
}

#[test]
fn dangling_endpoint_is_rejected() {
    init_logger();
    let mut engine = GraphEngine::default();
    engine.add_node("a").unwrap();
    let err = engine.add_edge("e1", "a", "z", false).unwrap_err();
    assert_eq!(
        err,
        NuiError::DanglingEndpoint {
            edge: "e1".into(),
            node: "z".into(),
        }
    );
    assert_eq!(engine.edge_count(), 0);
    assert_eq!(engine.node_count(), 1);
}

#[test]
fn fifteen_hundred_nodes_one_at_a_time() {
    init_logger();
    let mut registry = IndexRegistry::default();
    let mut swapper = BufferSwapper::new(SwapperConfig::default());
    let buffer = swapper.create_buffer_sized(
        &registry,
        ElementKind::Node,
        2,
        PrimitiveType::Float,
        Sizing::new(100, 100),
        None,
    );

    for i in 0..1500 {
        registry.add_node(&format!("n{i}")).unwrap();
        for event in registry.drain_events() {
            swapper.apply(&event, &registry);
        }
        swapper.set::<f32>(buffer, i, 0, i as f32);
    }
    assert_eq!(swapper.capacity(buffer), 1600);
    assert_eq!(swapper.get::<f32>(buffer, 1499, 0), 1499.0);
}

#[test]
fn slots_follow_their_occupants() {
    init_logger();
    let mut engine = GraphEngine::default();
    let tags = engine.create_buffer(ElementKind::Node, 1, PrimitiveType::Long, None);

    let mut next = 0i64;
    let mut expected = std::collections::HashMap::new();
    for round in 0..20 {
        for i in 0..10 {
            let id = format!("r{round}n{i}");
            engine.add_node(&id).unwrap();
            let index = engine.registry().node_index(&id).unwrap() as usize;
            engine.swapper_mut().set::<i64>(tags, index, 0, next);
            expected.insert(id, next);
            next += 1;
        }
        for i in (0..10).step_by(3) {
            let id = format!("r{round}n{i}");
            engine.remove_node(&id);
            expected.remove(&id);
        }
    }

    assert_eq!(engine.node_count(), expected.len());
    for (id, tag) in &expected {
        let index = engine.registry().node_index(id).unwrap() as usize;
        assert_eq!(engine.swapper().get::<i64>(tags, index, 0), *tag, "{id}");
    }
}

#[test]
fn growing_space_follows_the_layout() {
    init_logger();
    let mut config = EngineConfig::default();
    config.space.mode = SpaceMode::Growing;
    let mut engine = GraphEngine::new(config);
    for i in 0..30 {
        engine.add_node(&i.to_string()).unwrap();
    }
    let before = engine.space().bounds();
    engine.move_node("0", [500.0, 0.0, 0.0]).unwrap();
    engine.step();
    let after = engine.space().bounds();
    assert!(after.hi[0] > before.hi[0]);
    assert!(after.contains(engine.position("0").unwrap()));
}

#[test]
fn attribute_channel() {
    init_logger();
    let mut engine = GraphEngine::default();
    engine.add_node("a").unwrap();
    engine.add_node("b").unwrap();
    engine.add_edge("ab", "a", "b", false).unwrap();

    engine.set_attribute("quality", &AttributeValue::from(1.0)).unwrap();
    assert!(engine.layout().config().is_exact());
    engine.set_attribute("law", &AttributeValue::from("linlog")).unwrap();
    assert_eq!(engine.layout().law(), LawKind::LinLog);

    assert!(matches!(
        engine.set_attribute("gravity", &AttributeValue::from("lots")),
        Err(NuiError::InvalidAttribute { .. })
    ));
    assert_eq!(engine.layout().config().gravity, 0.0);

    engine.set_edge_attribute("ab", "ignored", &AttributeValue::Null).unwrap();
    engine.set_node_attribute("a", "frozen", &AttributeValue::from(true)).unwrap();
    let a = engine.position("a").unwrap();
    engine.step();
    assert_eq!(engine.position("a"), Some(a));
}

#[test]
fn clear_then_rebuild() {
    init_logger();
    let mut engine = GraphEngine::default();
    for i in 0..50 {
        engine.add_node(&i.to_string()).unwrap();
    }
    engine.step();
    engine.clear();
    assert_eq!(engine.node_count(), 0);
    assert!(engine.positions().is_empty());
    assert_eq!(engine.partition().len(), 0);

    engine.add_node("again").unwrap();
    engine.step();
    assert_eq!(engine.positions().len(), 3);
}
