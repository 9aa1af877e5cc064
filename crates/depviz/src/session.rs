//! Interactive layout session.
//!
//! A [`Session`] owns the live [`Simulation`] behind one async mutex. The
//! ticker, pointer events, reset and graph installation all take that lock,
//! so every tick sees a consistent snapshot and a new graph is swapped in
//! strictly between ticks.
//!
//! Positions are published as [`Frame`]s on a broadcast channel, one per
//! tick, for any number of renderers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::config::Config;
use crate::graph::DependencyTree;
use crate::layout::{Layout, NodeState, Simulation, Vec2};
use crate::service::GraphReady;

/// Capacity of the frame channel; slow subscribers skip frames
const FRAME_BUFFER: usize = 16;

/// Positions after one simulation tick.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Simulation tick counter
    pub tick: u64,
    /// Every node's position
    pub positions: Layout,
}

#[derive(Debug, Default)]
struct SessionInner {
    simulation: Option<Simulation>,
    tree: Option<Arc<DependencyTree>>,
    generation: u64,
    paused: bool,
}

/// Shared simulation state plus the frame stream.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
    frames: broadcast::Sender<Frame>,
    config: Arc<Config>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (frames, _) = broadcast::channel(FRAME_BUFFER);
        Self {
            inner: Arc::new(Mutex::new(SessionInner::default())),
            frames,
            config: Arc::new(config),
        }
    }

    /// Receive a [`Frame`] after every tick.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.frames.subscribe()
    }

    /// Replace the displayed graph.
    ///
    /// Results older than the installed generation are ignored. Returns
    /// whether the graph was installed.
    pub async fn install(&self, ready: &GraphReady) -> bool {
        let mut inner = self.inner.lock().await;
        if ready.generation < inner.generation {
            debug!(generation = ready.generation, current = inner.generation, "Ignoring stale graph");
            return false;
        }

        let simulation = Simulation::new(&ready.tree, &self.config.layout, self.config.physics.clone());
        info!(
            generation = ready.generation,
            nodes = simulation.len(),
            "Installing graph"
        );
        inner.simulation = Some(simulation);
        inner.tree = Some(Arc::clone(&ready.tree));
        inner.generation = ready.generation;
        true
    }

    /// The installed tree.
    pub async fn tree(&self) -> Option<Arc<DependencyTree>> {
        self.inner.lock().await.tree.clone()
    }

    /// Advance the simulation one step and publish the frame.
    ///
    /// Returns `None` while paused or before a graph is installed.
    pub async fn tick(&self) -> Option<Frame> {
        self.run_steps(|simulation| {
            simulation.step();
            1
        })
        .await
    }

    /// Advance by `elapsed` wall time in fixed steps and publish one frame.
    ///
    /// At most `physics.max_substeps` steps run per call. Returns `None`
    /// while paused, before a graph is installed, or when `elapsed` did not
    /// add up to a whole step.
    pub async fn advance(&self, elapsed: Duration) -> Option<Frame> {
        self.run_steps(|simulation| simulation.advance(elapsed)).await
    }

    async fn run_steps(&self, run: impl FnOnce(&mut Simulation) -> u32) -> Option<Frame> {
        let frame = {
            let mut inner = self.inner.lock().await;
            if inner.paused {
                return None;
            }
            let simulation = inner.simulation.as_mut()?;
            if run(simulation) == 0 {
                return None;
            }
            Frame {
                tick: simulation.ticks(),
                positions: simulation.positions(),
            }
        };
        // No subscribers is fine
        let _ = self.frames.send(frame.clone());
        Some(frame)
    }

    /// Drive the simulation at `session.tick_hz` until the returned task is
    /// aborted.
    ///
    /// Each wake advances by the wall time since the previous one, so a late
    /// wake catches up with extra substeps instead of slowing the simulation.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let session = self.clone();
        let period = self.config.tick_interval();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last = ticker.tick().await;
            loop {
                let now = ticker.tick().await;
                session.advance(now.duration_since(last)).await;
                last = now;
            }
        })
    }

    /// Pause or resume ticking.
    pub async fn set_paused(&self, paused: bool) {
        self.inner.lock().await.paused = paused;
    }

    /// Pointer press at `point`; starts a drag if it hits a node.
    pub async fn press(&self, point: Vec2) -> Option<PathBuf> {
        self.inner.lock().await.simulation.as_mut()?.press(point)
    }

    /// Start dragging a specific node.
    pub async fn begin_drag(&self, path: &Path, point: Vec2) -> bool {
        match self.inner.lock().await.simulation.as_mut() {
            Some(simulation) => simulation.begin_drag(path, point),
            None => false,
        }
    }

    /// Pointer move during a drag.
    pub async fn drag_to(&self, point: Vec2) -> bool {
        match self.inner.lock().await.simulation.as_mut() {
            Some(simulation) => simulation.drag_to(point),
            None => false,
        }
    }

    /// Pointer release.
    pub async fn release(&self) -> Option<PathBuf> {
        self.inner.lock().await.simulation.as_mut()?.release()
    }

    /// Put every node back on the shell layout. Returns the reset positions
    /// as acknowledgment, or `None` without a graph.
    pub async fn reset(&self) -> Option<Layout> {
        let mut inner = self.inner.lock().await;
        let simulation = inner.simulation.as_mut()?;
        simulation.reset();
        info!("Layout reset");
        Some(simulation.positions())
    }

    /// Current positions.
    pub async fn positions(&self) -> Option<Layout> {
        self.inner.lock().await.simulation.as_ref().map(Simulation::positions)
    }

    /// Interaction state of one node.
    pub async fn node_state(&self, path: &Path) -> Option<NodeState> {
        self.inner.lock().await.simulation.as_ref()?.node_state(path)
    }
}
