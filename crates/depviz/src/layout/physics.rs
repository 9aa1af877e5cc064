//! Spring/repulsion simulation.
//!
//! Every node is a point mass seeded at its shell-layout position with zero
//! velocity. One [`Simulation::step`] advances the system by a fixed
//! timestep:
//!
//! 1. pairwise repulsion `repulsion / max(d, min_distance)²` (O(n²))
//! 2. a damped spring per distinct undirected edge
//! 3. clamp each body's accumulated force to `max_force`
//! 4. each body's [`VelocityUpdate`] computes the new velocity, then the
//!    position is integrated
//! 5. a dragged body is pinned to the pointer
//!
//! ## Drag
//!
//! Dragging swaps velocity-update functions instead of applying forces: the
//! dragged body gets [`dragged_velocity`], its graph neighbours get
//! [`follower_velocity`]. The replaced functions are saved and put back on
//! release, so an override installed with [`Simulation::set_velocity_fn`]
//! survives a drag.
//!
//! ```text
//!  AtRest ──press──▶ Dragged ──release──▶ Settling ──speed < rest_speed──▶ AtRest
//!  AtRest ◀────────────────▶ Following   (while a neighbour is Dragged)
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Layout, Vec2, shell_layout};
use crate::config::{LayoutConfig, PhysicsConfig};
use crate::graph::DependencyTree;

/// Computes a body's velocity after one step.
///
/// Arguments are the current velocity, the acceleration from this step's
/// forces, the space damping (fraction of velocity kept per second) and the
/// timestep.
pub type VelocityUpdate = fn(Vec2, Vec2, f64, f64) -> Vec2;

/// Velocity kept by a dragged body after the default update.
pub const DRAGGED_VELOCITY_FACTOR: f64 = 0.01;

/// Velocity kept by a neighbour of the dragged body after the default update.
pub const FOLLOWER_VELOCITY_FACTOR: f64 = 0.85;

/// Golden angle, used to spread coincident bodies apart deterministically.
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Damped explicit Euler update: `v · damping^dt + a · dt`.
#[must_use]
pub fn default_velocity(velocity: Vec2, acceleration: Vec2, damping: f64, dt: f64) -> Vec2 {
    velocity * damping.powf(dt) + acceleration * dt
}

/// Near-total damping for the body under the pointer.
#[must_use]
pub fn dragged_velocity(velocity: Vec2, acceleration: Vec2, damping: f64, dt: f64) -> Vec2 {
    default_velocity(velocity, acceleration, damping, dt) * DRAGGED_VELOCITY_FACTOR
}

/// Light damping for neighbours of the dragged body.
#[must_use]
pub fn follower_velocity(velocity: Vec2, acceleration: Vec2, damping: f64, dt: f64) -> Vec2 {
    default_velocity(velocity, acceleration, damping, dt) * FOLLOWER_VELOCITY_FACTOR
}

/// Interaction state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Moving freely, not recently dragged
    AtRest,
    /// Under the pointer
    Dragged,
    /// Released and still faster than the rest speed
    Settling,
    /// Neighbour of the dragged node
    Following,
}

#[derive(Debug, Clone)]
struct Body {
    path: PathBuf,
    position: Vec2,
    velocity: Vec2,
    force: Vec2,
    mass: f64,
    velocity_fn: VelocityUpdate,
    saved_fn: Option<VelocityUpdate>,
}

impl Body {
    fn override_velocity_fn(&mut self, f: VelocityUpdate) {
        if self.saved_fn.is_none() {
            self.saved_fn = Some(self.velocity_fn);
        }
        self.velocity_fn = f;
    }

    fn restore_velocity_fn(&mut self) {
        if let Some(saved) = self.saved_fn.take() {
            self.velocity_fn = saved;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Spring {
    a: usize,
    b: usize,
    rest_length: f64,
}

#[derive(Debug, Clone)]
struct Drag {
    node: usize,
    target: Vec2,
    followers: Vec<usize>,
}

/// Physics state of one graph.
///
/// Owns every mutable piece: bodies, springs, neighbour lists, drag state,
/// the settling set and the fixed-step accumulator. All mutation goes
/// through its methods.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: PhysicsConfig,
    home: Layout,
    bodies: Vec<Body>,
    springs: Vec<Spring>,
    neighbors: Vec<Vec<usize>>,
    drag: Option<Drag>,
    settling: BTreeSet<usize>,
    accumulator: f64,
    ticks: u64,
}

impl Simulation {
    /// Seed a simulation from the shell layout of `tree`.
    #[must_use]
    pub fn new(tree: &DependencyTree, layout: &LayoutConfig, config: PhysicsConfig) -> Self {
        let home = shell_layout(tree, layout.scale);
        let graph = tree.to_graph();

        let bodies: Vec<Body> = home
            .iter()
            .map(|entry| Body {
                path: entry.path.clone(),
                position: entry.position,
                velocity: Vec2::ZERO,
                force: Vec2::ZERO,
                mass: config.mass,
                velocity_fn: default_velocity,
                saved_fn: None,
            })
            .collect();

        // Node indices in the graph follow discovery order, as do the bodies
        let mut pairs = BTreeSet::new();
        let mut neighbors = vec![Vec::new(); bodies.len()];
        for edge in graph.inner().edge_indices() {
            let Some((a, b)) = graph.inner().edge_endpoints(edge) else {
                continue;
            };
            let (a, b) = (a.index(), b.index());
            if a == b || !pairs.insert((a.min(b), a.max(b))) {
                continue;
            }
            neighbors[a].push(b);
            neighbors[b].push(a);
        }

        let springs = pairs
            .into_iter()
            .map(|(a, b)| Spring {
                a,
                b,
                rest_length: if config.rest_length_from_layout {
                    bodies[a].position.distance(bodies[b].position)
                } else {
                    config.rest_length
                },
            })
            .collect();

        tracing::debug!(
            bodies = bodies.len(),
            springs = neighbors.iter().map(Vec::len).sum::<usize>() / 2,
            "Simulation seeded from shell layout"
        );

        Self {
            config,
            home,
            bodies,
            springs,
            neighbors,
            drag: None,
            settling: BTreeSet::new(),
            accumulator: 0.0,
            ticks: 0,
        }
    }

    /// Physics settings in use.
    #[must_use]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Number of bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether there are no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Steps taken since creation or the last reset.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance by exactly one timestep.
    pub fn step(&mut self) {
        for body in &mut self.bodies {
            body.force = Vec2::ZERO;
        }

        self.apply_repulsion();
        self.apply_springs();

        let dt = self.config.timestep;
        let damping = self.config.space_damping;
        let max_force = self.config.max_force;
        for body in &mut self.bodies {
            let acceleration = body.force.clamp_length(max_force) / body.mass;
            body.velocity = (body.velocity_fn)(body.velocity, acceleration, damping, dt);
            if !body.velocity.is_finite() {
                body.velocity = Vec2::ZERO;
            }
            body.position += body.velocity * dt;
        }

        if let Some(drag) = &self.drag {
            self.bodies[drag.node].position = drag.target;
        }

        let rest_speed = self.config.rest_speed;
        let bodies = &self.bodies;
        self.settling
            .retain(|&i| bodies[i].velocity.length() >= rest_speed);

        self.ticks += 1;
        tracing::trace!(tick = self.ticks, energy = self.kinetic_energy(), "Simulation step");
    }

    /// Run as many fixed steps as fit into `elapsed` plus the carried
    /// remainder, at most `max_substeps`. Returns the number of steps taken.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        let dt = self.config.timestep;
        self.accumulator += elapsed.as_secs_f64();

        let mut steps = 0;
        while self.accumulator >= dt && steps < self.config.max_substeps {
            self.step();
            self.accumulator -= dt;
            steps += 1;
        }
        if steps == self.config.max_substeps {
            // Drop the backlog instead of spiralling
            self.accumulator = self.accumulator.min(dt);
        }
        steps
    }

    fn apply_repulsion(&mut self) {
        let strength = self.config.repulsion;
        let floor = self.config.min_distance;
        let n = self.bodies.len();

        for i in 0..n {
            for j in (i + 1)..n {
                let delta = self.bodies[i].position - self.bodies[j].position;
                let direction = delta
                    .normalized()
                    .unwrap_or_else(|| fallback_direction(i, j));
                let distance = delta.length().max(floor);
                let force = direction * (strength / (distance * distance));
                self.bodies[i].force += force;
                self.bodies[j].force -= force;
            }
        }
    }

    fn apply_springs(&mut self) {
        let stiffness = self.config.stiffness;
        let damping = self.config.spring_damping;

        for spring in &self.springs {
            let (a, b) = (&self.bodies[spring.a], &self.bodies[spring.b]);
            // Direction from b to a, same convention as repulsion
            let delta = a.position - b.position;
            let direction = delta
                .normalized()
                .unwrap_or_else(|| fallback_direction(spring.a, spring.b));
            let stretch = delta.length() - spring.rest_length;
            let separating_speed = (a.velocity - b.velocity).dot(direction);
            let force = direction * (stiffness * stretch + damping * separating_speed);
            self.bodies[spring.a].force -= force;
            self.bodies[spring.b].force += force;
        }
    }

    /// Start dragging the node under `point`, if any.
    ///
    /// Hit testing uses `node_radius`; the closest hit wins. Returns the
    /// selected node.
    pub fn press(&mut self, point: Vec2) -> Option<PathBuf> {
        let radius = self.config.node_radius;
        let hit = self
            .bodies
            .iter()
            .enumerate()
            .map(|(i, body)| (i, body.position.distance(point)))
            .filter(|&(_, d)| d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)?;

        let path = self.bodies[hit].path.clone();
        self.start_drag(hit, point);
        Some(path)
    }

    /// Start dragging `path`, moving it to `point`.
    ///
    /// Ends any drag already in progress. Returns `false` for unknown paths.
    pub fn begin_drag(&mut self, path: &Path, point: Vec2) -> bool {
        match self.index_of(path) {
            Some(i) => {
                self.start_drag(i, point);
                true
            }
            None => false,
        }
    }

    fn start_drag(&mut self, node: usize, point: Vec2) {
        if self.drag.is_some() {
            self.release();
        }

        self.settling.remove(&node);
        let body = &mut self.bodies[node];
        body.override_velocity_fn(dragged_velocity);
        body.position = point;
        body.velocity = Vec2::ZERO;

        let followers = self.neighbors[node].clone();
        for &f in &followers {
            self.bodies[f].override_velocity_fn(follower_velocity);
        }

        tracing::debug!(
            node = %self.bodies[node].path.display(),
            followers = followers.len(),
            "Drag started"
        );
        self.drag = Some(Drag {
            node,
            target: point,
            followers,
        });
    }

    /// Move the pointer of the current drag. Returns `false` when nothing is
    /// being dragged.
    pub fn drag_to(&mut self, point: Vec2) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        drag.target = point;
        self.bodies[drag.node].position = point;
        true
    }

    /// End the current drag and restore the replaced velocity functions.
    ///
    /// Returns the node that was being dragged.
    pub fn release(&mut self) -> Option<PathBuf> {
        let drag = self.drag.take()?;

        self.bodies[drag.node].restore_velocity_fn();
        for &f in &drag.followers {
            self.bodies[f].restore_velocity_fn();
        }
        self.settling.insert(drag.node);

        let path = self.bodies[drag.node].path.clone();
        tracing::debug!(node = %path.display(), "Drag released");
        Some(path)
    }

    /// Return every body to its shell-layout position at rest.
    ///
    /// Ends any drag and clears the fixed-step backlog. Idempotent.
    pub fn reset(&mut self) {
        self.release();
        for (body, home) in self.bodies.iter_mut().zip(self.home.iter()) {
            body.position = home.position;
            body.velocity = Vec2::ZERO;
            body.force = Vec2::ZERO;
        }
        self.settling.clear();
        self.accumulator = 0.0;
        self.ticks = 0;
    }

    /// Replace the velocity-update function of one node.
    ///
    /// During a drag the new function takes effect on release. Returns
    /// `false` for unknown paths.
    pub fn set_velocity_fn(&mut self, path: &Path, f: VelocityUpdate) -> bool {
        let Some(i) = self.index_of(path) else {
            return false;
        };
        let body = &mut self.bodies[i];
        match body.saved_fn.as_mut() {
            Some(saved) => *saved = f,
            None => body.velocity_fn = f,
        }
        true
    }

    /// Velocity-update function currently applied to a node.
    #[must_use]
    pub fn velocity_fn(&self, path: &Path) -> Option<VelocityUpdate> {
        self.index_of(path).map(|i| self.bodies[i].velocity_fn)
    }

    /// Current positions in discovery order.
    #[must_use]
    pub fn positions(&self) -> Layout {
        self.bodies
            .iter()
            .map(|b| (b.path.clone(), b.position))
            .collect()
    }

    /// The shell layout the simulation was seeded with.
    #[must_use]
    pub fn home(&self) -> &Layout {
        &self.home
    }

    /// Position of one node.
    #[must_use]
    pub fn position(&self, path: &Path) -> Option<Vec2> {
        self.index_of(path).map(|i| self.bodies[i].position)
    }

    /// Velocity of one node.
    #[must_use]
    pub fn velocity(&self, path: &Path) -> Option<Vec2> {
        self.index_of(path).map(|i| self.bodies[i].velocity)
    }

    /// Interaction state of one node.
    #[must_use]
    pub fn node_state(&self, path: &Path) -> Option<NodeState> {
        let i = self.index_of(path)?;
        let state = match &self.drag {
            Some(drag) if drag.node == i => NodeState::Dragged,
            Some(drag) if drag.followers.contains(&i) => NodeState::Following,
            _ if self.settling.contains(&i) => NodeState::Settling,
            _ => NodeState::AtRest,
        };
        Some(state)
    }

    /// Node under the pointer, if a drag is in progress.
    #[must_use]
    pub fn dragged(&self) -> Option<&Path> {
        self.drag
            .as_ref()
            .map(|d| self.bodies[d.node].path.as_path())
    }

    /// Total kinetic energy, `Σ ½·m·v²`.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        self.bodies
            .iter()
            .map(|b| 0.5 * b.mass * b.velocity.length_squared())
            .sum()
    }

    fn index_of(&self, path: &Path) -> Option<usize> {
        self.bodies.iter().position(|b| b.path == path)
    }
}

#[allow(clippy::cast_precision_loss)]
fn fallback_direction(i: usize, j: usize) -> Vec2 {
    Vec2::from_polar(1.0, (i * 31 + j) as f64 * GOLDEN_ANGLE)
}
