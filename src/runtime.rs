//! Dedicated layout thread for native hosts.
//!
//! The thread owns the [`GraphEngine`] exclusively. Producers send
//! [`LayoutCommand`]s over an unbounded crossbeam channel; the thread applies
//! them between ticks, so no tick ever observes a half-applied change.
//! Readers only see complete ticks through the published [`Snapshot`].

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::graph::{GraphEngine, TopologyEvent};
use crate::layout::AttributeValue;
use crate::spatial::PickIndex;

/// A change requested from outside the layout thread.
#[derive(Debug, Clone)]
pub enum LayoutCommand {
    Topology(TopologyEvent),
    Attribute {
        key: String,
        value: AttributeValue,
    },
    NodeAttribute {
        id: String,
        key: String,
        value: AttributeValue,
    },
    EdgeAttribute {
        id: String,
        key: String,
        value: AttributeValue,
    },
    MoveNode {
        id: String,
        position: [f64; 3],
    },
    FreezeNode {
        id: String,
        frozen: bool,
    },
    Shake,
}

/// Positions published at the end of a tick.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Ticks computed when the snapshot was taken.
    pub tick: u64,
    pub stabilization: f64,
    /// Node ids in index order.
    pub ids: Vec<String>,
    /// Flat xyz triples, parallel to `ids`.
    pub positions: Vec<f64>,
    /// Hit-test index over `positions`.
    pub picks: PickIndex,
}

impl Snapshot {
    fn capture(engine: &GraphEngine) -> Self {
        let positions = engine.positions().to_vec();
        Self {
            tick: engine.layout().tick(),
            stabilization: engine.stabilization(),
            ids: engine.node_ids().map(str::to_owned).collect(),
            picks: PickIndex::from_positions(&positions),
            positions,
        }
    }

    /// Position of a node by id.
    pub fn position(&self, id: &str) -> Option<[f64; 3]> {
        let index = self.ids.iter().position(|other| other == id)?;
        let p = self.positions.get(index * 3..index * 3 + 3)?;
        Some([p[0], p[1], p[2]])
    }

    /// Id of the node nearest to `(x, y)` within `max_distance`.
    pub fn pick(&self, x: f64, y: f64, max_distance: f64) -> Option<&str> {
        let index = self.picks.nearest_within(x, y, max_distance)?;
        self.ids.get(index as usize).map(String::as_str)
    }
}

struct LayoutLoop {
    engine: GraphEngine,
    commands: Receiver<LayoutCommand>,
    snapshot: Arc<RwLock<Snapshot>>,
    period: Duration,
}

impl LayoutLoop {
    /// Runs until every command sender is gone, then hands the engine back.
    fn run(mut self) -> GraphEngine {
        let ticker = crossbeam_channel::tick(self.period);
        loop {
            select! {
                recv(self.commands) -> command => match command {
                    Ok(command) => self.apply(command),
                    Err(_) => break,
                },
                recv(ticker) -> _ => self.tick(),
            }
        }
        log::debug!("layout thread stopped after {} ticks", self.engine.layout().tick());
        self.engine
    }

    fn tick(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
        if !self.engine.is_stabilized() {
            self.engine.step();
        }
        if self.engine.is_publish_needed() {
            *self.snapshot.write() = Snapshot::capture(&self.engine);
            self.engine.mark_published();
        }
    }

    // Rejected commands are already logged by the engine.
    fn apply(&mut self, command: LayoutCommand) {
        let engine = &mut self.engine;
        let _ = match command {
            LayoutCommand::Topology(event) => engine.apply_topology(&event),
            LayoutCommand::Attribute { key, value } => engine.set_attribute(&key, &value),
            LayoutCommand::NodeAttribute { id, key, value } => engine.set_node_attribute(&id, &key, &value),
            LayoutCommand::EdgeAttribute { id, key, value } => engine.set_edge_attribute(&id, &key, &value),
            LayoutCommand::MoveNode { id, position } => engine.move_node(&id, position),
            LayoutCommand::FreezeNode { id, frozen } => engine.freeze_node(&id, frozen),
            LayoutCommand::Shake => {
                engine.shake();
                Ok(())
            }
        };
    }
}

/// Runs a [`GraphEngine`] at a fixed tick rate on its own thread.
pub struct LayoutThread {
    commands: Option<Sender<LayoutCommand>>,
    snapshot: Arc<RwLock<Snapshot>>,
    handle: Option<JoinHandle<GraphEngine>>,
}

impl LayoutThread {
    /// Move `engine` onto a new thread ticking `tick_rate_hz` times a second.
    pub fn spawn(engine: GraphEngine, tick_rate_hz: f64) -> io::Result<Self> {
        let (commands, receiver) = crossbeam_channel::unbounded();
        let snapshot = Arc::new(RwLock::new(Snapshot::capture(&engine)));
        let period = Duration::from_secs_f64(1.0 / tick_rate_hz.max(1e-3));

        let state = LayoutLoop {
            engine,
            commands: receiver,
            snapshot: Arc::clone(&snapshot),
            period,
        };
        let handle = thread::Builder::new()
            .name("nui-layout".into())
            .spawn(move || state.run())?;

        log::debug!("layout thread started at {tick_rate_hz} Hz");
        Ok(Self {
            commands: Some(commands),
            snapshot,
            handle: Some(handle),
        })
    }

    /// A sender for producer threads. Commands sent after [`Self::stop`] are
    /// dropped.
    pub fn sender(&self) -> Option<Sender<LayoutCommand>> {
        self.commands.clone()
    }

    /// Queue a command. Returns `false` once the thread has stopped.
    pub fn send(&self, command: LayoutCommand) -> bool {
        self.commands
            .as_ref()
            .is_some_and(|commands| commands.send(command).is_ok())
    }

    /// The last published snapshot. Hold the guard briefly; the thread
    /// waits on it to publish.
    pub fn snapshot(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read()
    }

    /// Stop ticking and take the engine back.
    ///
    /// Senders obtained through [`Self::sender`] must be dropped first, or
    /// this blocks until they are. Returns `None` if the thread panicked.
    pub fn stop(mut self) -> Option<GraphEngine> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<GraphEngine> {
        self.commands = None;
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(engine) => Some(engine),
            Err(_) => {
                log::error!("layout thread panicked");
                None
            }
        }
    }
}

impl Drop for LayoutThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn wait_for(thread: &LayoutThread, done: impl Fn(&Snapshot) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if done(&thread.snapshot()) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn node(id: &str) -> LayoutCommand {
        LayoutCommand::Topology(TopologyEvent::NodeAdded { id: id.into() })
    }

    #[test]
    fn test_commands_and_snapshots() {
        let layout = LayoutThread::spawn(GraphEngine::default(), 500.0).unwrap();
        for id in ["a", "b", "c"] {
            assert!(layout.send(node(id)));
        }
        assert!(layout.send(LayoutCommand::Topology(TopologyEvent::EdgeAdded {
            id: "ab".into(),
            source: "a".into(),
            target: "b".into(),
            directed: false,
        })));

        assert!(wait_for(&layout, |s| s.ids.len() == 3 && s.tick > 2));
        {
            let snapshot = layout.snapshot();
            assert_eq!(snapshot.positions.len(), 9);
            let p = snapshot.position("c").unwrap();
            assert_eq!(snapshot.pick(p[0], p[1], 1e-6), Some("c"));
        }

        let engine = layout.stop().unwrap();
        assert_eq!(engine.node_count(), 3);
        assert_eq!(engine.edge_count(), 1);
    }

    #[test]
    fn test_move_is_published() {
        let layout = LayoutThread::spawn(GraphEngine::default(), 500.0).unwrap();
        layout.send(node("a"));
        layout.send(LayoutCommand::FreezeNode {
            id: "a".into(),
            frozen: true,
        });
        layout.send(LayoutCommand::MoveNode {
            id: "a".into(),
            position: [3.0, 4.0, 0.0],
        });
        assert!(wait_for(&layout, |s| s.position("a") == Some([3.0, 4.0, 0.0])));
    }

    #[test]
    fn test_producer_thread() {
        let layout = LayoutThread::spawn(GraphEngine::default(), 200.0).unwrap();
        let sender = layout.sender().unwrap();
        let producer = thread::spawn(move || {
            for i in 0..20 {
                sender.send(node(&i.to_string())).unwrap();
            }
        });
        producer.join().unwrap();
        assert!(wait_for(&layout, |s| s.ids.len() == 20));
    }
}
