//! Concentric shell placement.
//!
//! Ring `k` holds every node at BFS level `k` and has radius `k × scale`, so
//! the root sits at the origin. Nodes of one ring are spread evenly in
//! discovery order, and ring `k` is rotated by `k·π / rings` so that spokes
//! of neighbouring rings do not line up.

use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};

use super::{Layout, Vec2};
use crate::graph::{DependencyTree, NodeId};

/// Shell layout of a tree.
///
/// Pure: the same tree always yields the same layout. A node without a
/// recorded level goes on an extra outermost ring.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn shell_layout(tree: &DependencyTree, scale: f64) -> Layout {
    let outer = tree.levels().max_level().map_or(0, |l| l.saturating_add(1));
    let mut rings: BTreeMap<u32, Vec<NodeId>> = BTreeMap::new();

    for (id, _) in tree.nodes() {
        let level = tree.level_of(id).unwrap_or(outer);
        rings.entry(level).or_default().push(id);
    }

    let ring_count = rings.keys().next_back().map_or(1.0, |&k| f64::from(k) + 1.0);
    let mut positions = vec![Vec2::ZERO; tree.len()];

    for (&k, ring) in &rings {
        let radius = f64::from(k) * scale;
        let offset = f64::from(k) * PI / ring_count;
        let step = TAU / ring.len() as f64;

        for (i, &id) in ring.iter().enumerate() {
            positions[id.index()] = Vec2::from_polar(radius, offset + i as f64 * step);
        }
    }

    tree.nodes()
        .map(|(id, node)| (node.path().to_path_buf(), positions[id.index()]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImportInfo;
    use std::path::{Path, PathBuf};

    fn star(children: usize) -> DependencyTree {
        let mut tree = DependencyTree::with_root(PathBuf::from("/p/main.py"), PathBuf::from("/p"));
        for i in 0..children {
            let path = PathBuf::from(format!("/p/m{i}.py"));
            let (id, _) = tree.get_or_insert(path.clone());
            let import = ImportInfo::local(format!("m{i}"), path.clone(), Path::new("/p"), 1, false, None);
            tree.add_edge(tree.root_id(), id, import);
            tree.levels_mut().record_first(&path, 1);
        }
        tree
    }

    #[test]
    fn root_sits_at_origin() {
        let layout = shell_layout(&star(3), 100.0);

        assert_eq!(layout.get(Path::new("/p/main.py")), Some(Vec2::ZERO));
    }

    #[test]
    fn first_ring_uses_scale_as_radius() {
        let layout = shell_layout(&star(4), 80.0);

        for i in 0..4 {
            let p = layout.get(Path::new(&format!("/p/m{i}.py"))).expect("positioned");
            assert!((p.length() - 80.0).abs() < 1e-9);
        }
    }

    #[test]
    fn ring_nodes_are_evenly_spaced() {
        let layout = shell_layout(&star(4), 100.0);
        let a = layout.get(Path::new("/p/m0.py")).expect("m0");
        let b = layout.get(Path::new("/p/m1.py")).expect("m1");

        // Quarter circle apart on a radius-100 ring
        assert!((a.distance(b) - 100.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn layout_follows_discovery_order() {
        let layout = shell_layout(&star(2), 100.0);
        let order: Vec<_> = layout.iter().map(|e| e.path.clone()).collect();

        assert_eq!(
            order,
            vec![
                PathBuf::from("/p/main.py"),
                PathBuf::from("/p/m0.py"),
                PathBuf::from("/p/m1.py"),
            ]
        );
    }

    #[test]
    fn extreme_levels_do_not_overflow() {
        let mut tree = star(1);
        let far = PathBuf::from("/p/far.py");
        let (id, _) = tree.get_or_insert(far.clone());
        let import = ImportInfo::local("far".to_string(), far.clone(), Path::new("/p"), 2, false, None);
        tree.add_edge(tree.root_id(), id, import);
        tree.levels_mut().record_first(&far, u32::MAX);
        tree.get_or_insert(PathBuf::from("/p/unlevelled.py"));

        let layout = shell_layout(&tree, 1.0);

        assert_eq!(layout.len(), 4);
        let p = layout.get(&far).expect("far");
        assert!((p.length() - f64::from(u32::MAX)).abs() < 1e-3);
        // Saturated outer ring shares the deepest level
        let q = layout.get(Path::new("/p/unlevelled.py")).expect("unlevelled");
        assert!(q.length().is_finite());
    }
}
