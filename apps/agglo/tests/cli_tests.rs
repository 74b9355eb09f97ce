//! Integration tests for the agglo command-line commands.
//!
//! Each test works on a fresh database inside a temporary directory.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use agglo::cli::{
    Cli, Commands, cmd_dataset, cmd_extract, cmd_ingest, cmd_init, cmd_inspect, cmd_pairs,
    cmd_status, execute, parse_triple,
};
use agglo::config::AppConfig;
use agglo_core::{ExcerptError, NodeId, RedbRag, Region, excerpt_from_bytes};
use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Nodes 1 and 2 lie near the origin, node 3 far outside.
fn write_documents(dir: &Path) -> (PathBuf, PathBuf) {
    let nodes = json!([
        {"id": 1, "center_z": 1.0, "center_y": 1.0, "center_x": 1.0},
        {"id": 2, "center_z": 2.0, "center_y": 2.0, "center_x": 2.0},
        {"id": 3, "center_z": 50.0, "center_y": 50.0, "center_x": 50.0}
    ]);
    let edges = json!([
        {"u": 1, "v": 2, "merge_score": 0.2, "gt_merge_score": 0, "merge_labeled": 1},
        {"u": 2, "v": 3, "merge_score": 0.7, "gt_merge_score": 1, "merge_labeled": 1}
    ]);

    let nodes_path = dir.join("nodes.json");
    let edges_path = dir.join("edges.json");
    std::fs::write(&nodes_path, nodes.to_string()).unwrap();
    std::fs::write(&edges_path, edges.to_string()).unwrap();
    (nodes_path, edges_path)
}

/// A database holding the three-node graph.
fn populated_db() -> (TempDir, PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("agglo.redb");
    let (nodes, edges) = write_documents(temp.path());
    cmd_init(&db, false).unwrap();
    cmd_ingest(&db, &AppConfig::default(), true, &nodes, &edges).unwrap();
    (temp, db)
}

fn near_region() -> Region {
    Region::new([0, 0, 0], [10, 10, 10])
}

// =============================================================================
// ARGUMENT PARSING
// =============================================================================

#[test]
fn test_parse_triple() {
    assert_eq!(parse_triple("1,2,3").unwrap(), [1, 2, 3]);
    assert_eq!(parse_triple(" -4, 0 ,9").unwrap(), [-4, 0, 9]);
    assert!(parse_triple("1,2").is_err());
    assert!(parse_triple("1,2,3,4").is_err());
    assert!(parse_triple("a,b,c").is_err());
}

#[test]
fn test_extract_arguments() {
    let cli = Cli::parse_from([
        "agglo", "--json-mode", "-D", "graph.redb", "extract", "--offset", "0,0,0", "--shape",
        "10,20,30", "-o", "out.aggx",
    ]);
    assert!(cli.json_mode);
    assert_eq!(cli.database, PathBuf::from("graph.redb"));
    match cli.command {
        Some(Commands::Extract {
            offset,
            shape,
            inner_offset,
            ..
        }) => {
            assert_eq!(offset, [0, 0, 0]);
            assert_eq!(shape, [10, 20, 30]);
            assert_eq!(inner_offset, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_inner_region_requires_both_parts() {
    let result = Cli::try_parse_from([
        "agglo", "extract", "--offset", "0,0,0", "--shape", "1,1,1", "--inner-offset", "0,0,0",
        "-o", "out.aggx",
    ]);
    assert!(result.is_err());
}

// =============================================================================
// INIT / INGEST / STATUS
// =============================================================================

#[test]
fn test_init_refuses_existing_database() {
    let (_temp, db) = populated_db();
    assert!(matches!(cmd_init(&db, false), Err(ExcerptError::IoError(_))));
}

#[test]
fn test_init_force_resets_database() {
    let (_temp, db) = populated_db();
    cmd_init(&db, true).unwrap();
    let rag = RedbRag::open(&db).unwrap();
    assert_eq!(rag.node_count().unwrap(), 0);
}

#[test]
fn test_ingest_populates_store() {
    let (_temp, db) = populated_db();
    let rag = RedbRag::open(&db).unwrap();
    assert_eq!(rag.node_count().unwrap(), 3);
    assert_eq!(rag.edge_count().unwrap(), 2);
    drop(rag);
    cmd_status(&db, true).unwrap();
    cmd_status(&db, false).unwrap();
}

#[test]
fn test_ingest_missing_field_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("agglo.redb");
    let (nodes, _) = write_documents(temp.path());
    let edges = temp.path().join("bad_edges.json");
    std::fs::write(&edges, json!([{"u": 1, "v": 2}]).to_string()).unwrap();

    let result = cmd_ingest(&db, &AppConfig::default(), false, &nodes, &edges);
    assert!(matches!(result, Err(ExcerptError::SchemaError { .. })));
}

#[test]
fn test_strict_ingest_rejects_extra_field() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("agglo.redb");
    let (_, edges) = write_documents(temp.path());
    let nodes = temp.path().join("tagged_nodes.json");
    std::fs::write(
        &nodes,
        json!([{"id": 1, "center_z": 0, "center_y": 0, "center_x": 0, "size": 12}]).to_string(),
    )
    .unwrap();

    let lenient = cmd_ingest(&db, &AppConfig::default(), false, &nodes, &edges);
    assert!(lenient.is_ok());

    let strict = AppConfig::from_toml_str("[excerpt]\nstrict_fields = true\n").unwrap();
    let result = cmd_ingest(&db, &strict, false, &nodes, &edges);
    assert!(matches!(result, Err(ExcerptError::SchemaError { .. })));
}

#[test]
fn test_ingest_missing_file_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("agglo.redb");
    let missing = temp.path().join("missing.json");
    let result = cmd_ingest(&db, &AppConfig::default(), false, &missing, &missing);
    assert!(matches!(result, Err(ExcerptError::IoError(_))));
}

// =============================================================================
// EXTRACT / INSPECT
// =============================================================================

#[test]
fn test_extract_then_inspect() {
    let (temp, db) = populated_db();
    let output = temp.path().join("near.aggx");
    let region = near_region();

    cmd_extract(
        &db,
        &AppConfig::default(),
        true,
        &region,
        &region,
        None,
        &output,
    )
    .unwrap();

    let excerpt = excerpt_from_bytes(&std::fs::read(&output).unwrap()).unwrap();
    // Node 3 is pulled in as the far endpoint of edge 2-3.
    assert_eq!(excerpt.node_ids, vec![NodeId(1), NodeId(2), NodeId(3)]);
    assert_eq!(excerpt.num_edges(), 4);
    cmd_inspect(&output, true).unwrap();
    cmd_inspect(&output, false).unwrap();
}

#[test]
fn test_extract_with_embeddings() {
    let (temp, db) = populated_db();
    let output = temp.path().join("embedded.aggx");
    let embeddings = temp.path().join("embeddings.json");
    std::fs::write(
        &embeddings,
        json!({"1": [0.1, 0.2], "2": [0.3, 0.4], "3": [0.5, 0.6]}).to_string(),
    )
    .unwrap();

    cmd_extract(
        &db,
        &AppConfig::default(),
        false,
        &near_region(),
        &near_region(),
        Some(&embeddings),
        &output,
    )
    .unwrap();

    let excerpt = excerpt_from_bytes(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(excerpt.feature_dim, 2);
}

#[test]
fn test_extract_empty_region_writes_nothing() {
    let (temp, db) = populated_db();
    let output = temp.path().join("empty.aggx");
    let region = Region::new([100, 100, 100], [10, 10, 10]);

    let result = cmd_extract(
        &db,
        &AppConfig::default(),
        false,
        &region,
        &region,
        None,
        &output,
    );
    assert!(matches!(result, Err(ExcerptError::EmptyRegion { .. })));
    assert!(!output.exists());
}

#[test]
fn test_extract_respects_edge_cap() {
    let (temp, db) = populated_db();
    let output = temp.path().join("capped.aggx");
    let config = AppConfig::from_toml_str("[excerpt]\nmax_edges = 2\n").unwrap();

    let result = cmd_extract(
        &db,
        &config,
        false,
        &near_region(),
        &near_region(),
        None,
        &output,
    );
    assert!(matches!(result, Err(ExcerptError::TooManyEdges { .. })));
}

#[test]
fn test_extract_into_missing_directory_rejected() {
    let (temp, db) = populated_db();
    let output = temp.path().join("no_such_dir").join("near.aggx");
    let result = cmd_extract(
        &db,
        &AppConfig::default(),
        false,
        &near_region(),
        &near_region(),
        None,
        &output,
    );
    assert!(matches!(result, Err(ExcerptError::IoError(_))));
}

#[test]
fn test_inspect_rejects_directory() {
    let temp = tempfile::tempdir().unwrap();
    let result = cmd_inspect(temp.path(), false);
    assert!(matches!(result, Err(ExcerptError::IoError(_))));
}

#[test]
fn test_inspect_rejects_garbage() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("garbage.aggx");
    std::fs::write(&input, b"definitely not an excerpt").unwrap();
    assert!(cmd_inspect(&input, false).is_err());
}

// =============================================================================
// DATASET / PAIRS
// =============================================================================

#[test]
fn test_dataset_skips_empty_blocks() {
    let (temp, db) = populated_db();
    let output_dir = temp.path().join("blocks");
    let config = AppConfig::from_toml_str(
        r#"
[dataset]
roi_offset = [0, 0, 0]
roi_shape = [20, 10, 10]
block_shape = [10, 10, 10]
"#,
    )
    .unwrap();

    cmd_dataset(&db, &config, true, &output_dir, None).unwrap();

    assert!(output_dir.join("excerpt_0.aggx").exists());
    assert!(!output_dir.join("excerpt_1.aggx").exists());
}

#[test]
fn test_dataset_rejects_unfit_blocks() {
    let (temp, db) = populated_db();
    let config = AppConfig::from_toml_str(
        "[dataset]\nroi_shape = [10, 10, 10]\nblock_shape = [20, 20, 20]\n",
    )
    .unwrap();

    let result = cmd_dataset(&db, &config, false, &temp.path().join("blocks"), None);
    assert!(matches!(result, Err(ExcerptError::InvalidConfig(_))));
}

#[test]
fn test_pairs_report() {
    let (_temp, db) = populated_db();
    cmd_pairs(&db, &AppConfig::default(), true, &near_region()).unwrap();
    cmd_pairs(&db, &AppConfig::default(), false, &near_region()).unwrap();
}

#[test]
fn test_execute_dispatches_status() {
    let (_temp, db) = populated_db();
    let cli = Cli::parse_from(["agglo", "-D", db.to_str().unwrap(), "status"]);
    execute(cli).unwrap();
}
