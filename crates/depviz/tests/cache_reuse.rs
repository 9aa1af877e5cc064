//! Tests for loading graphs through the on-disk cache.

mod common;

use std::fs;

use common::project;
use depviz::cache::{CacheStore, GraphSource, load_or_build};
use depviz::graph::{BuildOptions, GraphBuilder};
use tempfile::TempDir;

fn sample() -> common::Project {
    project(&[
        ("main.py", "import util\nfrom pkg import tools\n"),
        ("util.py", "import os\n"),
        ("pkg/tools.py", "from .. import util\n"),
    ])
}

#[test]
fn second_load_comes_from_cache() {
    let project = sample();
    let cache = TempDir::new().expect("cache dir");
    let store = CacheStore::new(cache.path());
    let builder = GraphBuilder::new(&project.root).expect("builder");
    let entry = project.file("main.py");

    let fresh = load_or_build(Some(&store), &builder, &entry).expect("fresh load");
    let cached = load_or_build(Some(&store), &builder, &entry).expect("cached load");

    assert_eq!(fresh.source, GraphSource::Fresh);
    assert!(fresh.report.is_some());
    assert_eq!(cached.source, GraphSource::Cache);
    assert!(cached.report.is_none());
    assert_eq!(cached.tree.to_graph().vertex_set(), fresh.tree.to_graph().vertex_set());
    assert_eq!(cached.tree.to_graph().edge_set(), fresh.tree.to_graph().edge_set());
    assert_eq!(cached.tree.levels(), fresh.tree.levels());
}

#[test]
fn editing_a_file_triggers_rebuild() {
    let project = sample();
    let cache = TempDir::new().expect("cache dir");
    let store = CacheStore::new(cache.path());
    let builder = GraphBuilder::new(&project.root).expect("builder");
    let entry = project.file("main.py");
    load_or_build(Some(&store), &builder, &entry).expect("fresh load");

    fs::write(project.file("util.py"), "import extra\n").expect("edit util.py");
    fs::write(project.file("extra.py"), "").expect("write extra.py");
    let reloaded = load_or_build(Some(&store), &builder, &entry).expect("reload");

    assert_eq!(reloaded.source, GraphSource::Fresh);
    assert!(reloaded.tree.get(&project.file("extra.py")).is_some());

    // The rebuilt graph replaced the stale document
    let again = load_or_build(Some(&store), &builder, &entry).expect("third load");
    assert_eq!(again.source, GraphSource::Cache);
    assert_eq!(again.tree.len(), 4);
}

#[test]
fn corrupt_document_falls_back_to_build() {
    let project = sample();
    let cache = TempDir::new().expect("cache dir");
    let store = CacheStore::new(cache.path());
    let builder = GraphBuilder::new(&project.root).expect("builder");
    let entry = project.file("main.py");

    let document = store.path_for(&entry, &project.root);
    fs::create_dir_all(document.parent().expect("document dir")).expect("create document dir");
    fs::write(&document, "not json at all").expect("write garbage");

    let outcome = load_or_build(Some(&store), &builder, &entry).expect("load");

    assert_eq!(outcome.source, GraphSource::Fresh);
    assert_eq!(outcome.tree.len(), 3);
    let rewritten = fs::read_to_string(&document).expect("read document");
    assert!(rewritten.contains("\"version\""));
}

#[test]
fn distinct_entries_use_distinct_documents() {
    let project = sample();
    let cache = TempDir::new().expect("cache dir");
    let store = CacheStore::new(cache.path());
    let builder = GraphBuilder::new(&project.root).expect("builder");

    let main = load_or_build(Some(&store), &builder, &project.file("main.py")).expect("main");
    let util = load_or_build(Some(&store), &builder, &project.file("util.py")).expect("util");

    assert_eq!(main.tree.len(), 3);
    assert_eq!(util.tree.len(), 1);
    assert_eq!(store.clear().expect("clear"), 2);
}

#[test]
fn without_store_always_builds() {
    let project = sample();
    let builder = GraphBuilder::new(&project.root).expect("builder");
    let entry = project.file("main.py");

    for _ in 0..2 {
        let outcome = load_or_build(None, &builder, &entry).expect("load");
        assert_eq!(outcome.source, GraphSource::Fresh);
    }
}

#[test]
fn limited_builds_neither_read_nor_write_the_cache() {
    let project = sample();
    let cache = TempDir::new().expect("cache dir");
    let store = CacheStore::new(cache.path());
    let entry = project.file("main.py");
    let full = GraphBuilder::new(&project.root).expect("builder");
    let shallow = GraphBuilder::new(&project.root)
        .expect("builder")
        .with_options(BuildOptions::default().with_max_depth(0));

    let limited = load_or_build(Some(&store), &shallow, &entry).expect("limited load");
    assert_eq!(limited.source, GraphSource::Fresh);
    assert_eq!(limited.tree.len(), 1);
    assert!(!store.path_for(&entry, &project.root).exists());

    let complete = load_or_build(Some(&store), &full, &entry).expect("full load");
    assert_eq!(complete.source, GraphSource::Fresh);
    assert_eq!(complete.tree.len(), 3);

    // A cached complete graph is not handed to a limited request either
    let limited = load_or_build(Some(&store), &shallow, &entry).expect("limited reload");
    assert_eq!(limited.source, GraphSource::Fresh);
    assert_eq!(limited.tree.len(), 1);

    let cached = load_or_build(Some(&store), &full, &entry).expect("cached load");
    assert_eq!(cached.source, GraphSource::Cache);
    assert_eq!(cached.tree.len(), 3);
}

#[test]
fn truncated_file_budget_is_not_cached() {
    let project = sample();
    let cache = TempDir::new().expect("cache dir");
    let store = CacheStore::new(cache.path());
    let entry = project.file("main.py");
    let builder = GraphBuilder::new(&project.root)
        .expect("builder")
        .with_options(BuildOptions::default().with_max_files(1));

    let outcome = load_or_build(Some(&store), &builder, &entry).expect("load");

    assert!(outcome.report.expect("fresh build has a report").truncated);
    assert!(!store.path_for(&entry, &project.root).exists());
}
