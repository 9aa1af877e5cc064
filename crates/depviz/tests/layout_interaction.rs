//! Tests for the shell layout and interactive physics on built graphs.

mod common;

use std::collections::HashMap;

use common::{importing, project};
use depviz::config::{LayoutConfig, PhysicsConfig};
use depviz::graph::{DependencyTree, build_dependency_tree};
use depviz::layout::{
    FOLLOWER_VELOCITY_FACTOR, NodeState, Simulation, Vec2, VelocityUpdate, default_velocity, dragged_velocity,
    follower_velocity, shell_layout,
};
use proptest::prelude::*;

fn star_with_tail() -> (common::Project, DependencyTree) {
    let project = project(&[
        ("x.py", "import y\nimport z\n"),
        ("y.py", "import tail\n"),
        ("z.py", ""),
        ("tail.py", ""),
    ]);
    let (tree, _) = build_dependency_tree(&project.file("x.py"), &project.root).expect("build");
    (project, tree)
}

fn simulation(tree: &DependencyTree) -> Simulation {
    Simulation::new(tree, &LayoutConfig::default(), PhysicsConfig::default())
}

fn uses(simulation: &Simulation, project: &common::Project, file: &str, f: VelocityUpdate) -> bool {
    let current = simulation.velocity_fn(&project.file(file)).expect("known node");
    std::ptr::fn_addr_eq(current, f)
}

// === Drag ===

#[test]
fn dragged_node_stays_under_pointer_and_neighbours_follow() {
    let (project, tree) = star_with_tail();
    let mut sim = simulation(&tree);
    let x = project.file("x.py");
    let y = project.file("y.py");
    let z = project.file("z.py");
    let y_home = sim.position(&y).expect("y");
    let z_home = sim.position(&z).expect("z");
    let pointer = Vec2::new(250.0, -40.0);

    assert!(sim.begin_drag(&x, pointer));
    for _ in 0..30 {
        sim.step();
        assert_eq!(sim.position(&x), Some(pointer));
    }

    assert!(sim.position(&y).expect("y").distance(y_home) > 1e-6);
    assert!(sim.position(&z).expect("z").distance(z_home) > 1e-6);
    assert_eq!(sim.node_state(&x), Some(NodeState::Dragged));
    assert_eq!(sim.node_state(&y), Some(NodeState::Following));
    assert_eq!(sim.node_state(&project.file("tail.py")), Some(NodeState::AtRest));
    assert!(uses(&sim, &project, "x.py", dragged_velocity));
    assert!(uses(&sim, &project, "y.py", follower_velocity));
    assert!(uses(&sim, &project, "tail.py", default_velocity));
}

#[test]
fn follower_response_is_damped_relative_to_free_motion() {
    let (project, tree) = star_with_tail();
    let x = project.file("x.py");
    let y = project.file("y.py");
    let pointer = Vec2::new(300.0, 0.0);

    let mut dragged = simulation(&tree);
    dragged.begin_drag(&x, pointer);
    dragged.step();

    // Same starting positions, but nothing held
    let mut free = simulation(&tree);
    free.begin_drag(&x, pointer);
    free.release();
    free.step();

    let followed = dragged.velocity(&y).expect("y").length();
    let unhindered = free.velocity(&y).expect("y").length();
    assert!(followed > 0.0);
    assert!((followed - unhindered * FOLLOWER_VELOCITY_FACTOR).abs() < 1e-9);
}

#[test]
fn release_restores_default_motion() {
    let (project, tree) = star_with_tail();
    let mut sim = simulation(&tree);
    let x = project.file("x.py");

    sim.begin_drag(&x, Vec2::new(400.0, 400.0));
    sim.step();
    assert_eq!(sim.release(), Some(x.clone()));

    for file in ["x.py", "y.py", "z.py", "tail.py"] {
        assert!(uses(&sim, &project, file, default_velocity), "{file} not restored");
    }
    assert_eq!(sim.dragged(), None);

    // Free again: springs pull it back towards its neighbours
    let before = sim.position(&x).expect("x");
    for _ in 0..10 {
        sim.step();
    }
    assert_ne!(sim.position(&x), Some(before));
}

#[test]
fn reset_returns_to_shell_layout() {
    let (project, tree) = star_with_tail();
    let mut sim = simulation(&tree);
    let home = shell_layout(&tree, LayoutConfig::default().scale);

    sim.press(Vec2::ZERO).expect("root sits at the origin");
    sim.drag_to(Vec2::new(-120.0, 80.0));
    for _ in 0..20 {
        sim.step();
    }
    sim.reset();

    assert_eq!(sim.dragged(), None);
    assert_eq!(sim.ticks(), 0);
    for entry in home.iter() {
        assert_eq!(sim.position(&entry.path), Some(entry.position));
        assert_eq!(sim.velocity(&entry.path), Some(Vec2::ZERO));
    }
    assert_eq!(sim.node_state(&project.file("x.py")), Some(NodeState::AtRest));
}

// === Shell layout ===

/// Random spanning trees over `m0..mN`, as a parent index per module.
fn spanning_trees() -> impl Strategy<Value = Vec<usize>> {
    (1usize..12).prop_flat_map(|n| (1..=n).map(|i| 0..i).collect::<Vec<_>>())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn nodes_of_one_level_share_a_radius(parents in spanning_trees(), scale in 10.0f64..500.0) {
        let mut imports: HashMap<usize, Vec<String>> = HashMap::new();
        for (child, parent) in parents.iter().enumerate() {
            imports.entry(*parent).or_default().push(format!("m{}", child + 1));
        }
        let files: Vec<(String, String)> = (0..=parents.len())
            .map(|i| {
                let source = imports.get(&i).map(|m| importing(m)).unwrap_or_default();
                (format!("m{i}.py"), source)
            })
            .collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(p, s)| (p.as_str(), s.as_str())).collect();
        let project = project(&refs);
        let (tree, _) = build_dependency_tree(&project.file("m0.py"), &project.root).expect("build");

        let layout = shell_layout(&tree, scale);

        prop_assert_eq!(layout.len(), tree.len());
        for entry in layout.iter() {
            let level = tree.levels().get(&entry.path).expect("every node has a level");
            let expected = f64::from(level) * scale;
            prop_assert!((entry.position.length() - expected).abs() < 1e-6);
        }
    }
}
