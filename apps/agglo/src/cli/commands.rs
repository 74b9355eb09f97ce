//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::AppConfig;
use agglo_core::{
    Assembler, Document, EmbeddingTable, ExcerptDataset, ExcerptError, GraphExcerpt, PairDataset,
    PatchRequest, RedbRag, Region, TargetStats, edges_from_documents, excerpt_digest,
    excerpt_from_bytes, excerpt_to_bytes, formats::MAX_PERSISTENCE_PAYLOAD_SIZE,
    nodes_from_documents,
};
use std::path::{Path, PathBuf};

// =============================================================================
// INPUT AND OUTPUT FILES
// =============================================================================

/// Upper bound for node/edge documents and embedding tables (1 GB).
const MAX_DOCUMENT_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Read a regular file of at most `max_size` bytes.
fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, ExcerptError> {
    let io = |what: &str, e: std::io::Error| {
        ExcerptError::IoError(format!("{} '{}': {}", what, path.display(), e))
    };
    let resolved = path.canonicalize().map_err(|e| io("Cannot resolve", e))?;
    let metadata = std::fs::metadata(&resolved).map_err(|e| io("Cannot stat", e))?;

    if !metadata.is_file() {
        return Err(ExcerptError::IoError(format!(
            "'{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > max_size {
        return Err(ExcerptError::SerializationError(format!(
            "'{}' holds {} bytes, limit is {}",
            path.display(),
            metadata.len(),
            max_size
        )));
    }
    std::fs::read(&resolved).map_err(|e| io("Cannot read", e))
}

/// Place `path` inside its canonical, existing parent directory.
fn resolve_output(path: &Path) -> Result<PathBuf, ExcerptError> {
    let Some(name) = path.file_name() else {
        return Err(ExcerptError::IoError(format!(
            "Output path '{}' has no file name",
            path.display()
        )));
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    match dir.canonicalize() {
        Ok(dir) if dir.is_dir() => Ok(dir.join(name)),
        Ok(_) => Err(ExcerptError::IoError(format!(
            "'{}' is not a directory",
            dir.display()
        ))),
        Err(e) => Err(ExcerptError::IoError(format!(
            "Cannot resolve output directory '{}': {}",
            dir.display(),
            e
        ))),
    }
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn load_embeddings(path: Option<&Path>) -> Result<Option<EmbeddingTable>, ExcerptError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let table = EmbeddingTable::from_json(&read_input(path, MAX_DOCUMENT_FILE_SIZE)?)?;
    tracing::info!("Loaded {} embeddings from {:?}", table.len(), path);
    Ok(Some(table))
}

fn write_excerpt(excerpt: &GraphExcerpt, output: &Path) -> Result<(usize, String), ExcerptError> {
    let resolved = resolve_output(output)?;
    let data = excerpt_to_bytes(excerpt)?;
    std::fs::write(&resolved, &data)
        .map_err(|e| ExcerptError::IoError(format!("Write file: {}", e)))?;
    Ok((data.len(), excerpt_digest(excerpt)?))
}

/// Summary of an excerpt for status output.
pub fn excerpt_summary(excerpt: &GraphExcerpt) -> serde_json::Value {
    let labeled = excerpt.mask.iter().filter(|&&m| m > 0.0).count();
    serde_json::json!({
        "region": excerpt.region.to_string(),
        "inner_region": excerpt.inner_region.to_string(),
        "strategy": excerpt.strategy,
        "self_loops": excerpt.self_loops,
        "nodes": excerpt.num_nodes(),
        "directed_edges": excerpt.num_edges(),
        "feature_dim": excerpt.feature_dim,
        "weighted_edges": labeled,
        "mask_total": excerpt.mask_total(),
    })
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), ExcerptError> {
    if db_path.exists() {
        if !force {
            return Err(ExcerptError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| ExcerptError::IoError(format!("Remove database: {}", e)))?;
    }

    let _rag = RedbRag::open(db_path)?;
    println!("Initialized new redb database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// INGEST COMMAND
// =============================================================================

/// Ingest node and edge documents.
pub fn cmd_ingest(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    nodes_file: &Path,
    edges_file: &Path,
) -> Result<(), ExcerptError> {
    tracing::info!("Ingesting nodes from {:?}, edges from {:?}", nodes_file, edges_file);

    let parse = |path: &Path| -> Result<Vec<Document>, ExcerptError> {
        let contents = read_input(path, MAX_DOCUMENT_FILE_SIZE)?;
        serde_json::from_slice(&contents).map_err(|e| {
            ExcerptError::SerializationError(format!("Parse {}: {}", path.display(), e))
        })
    };
    let nodes = nodes_from_documents(&parse(nodes_file)?, &config.excerpt.schema)?;
    let edges = edges_from_documents(&parse(edges_file)?, &config.excerpt.schema)?;

    let mut rag = RedbRag::open(db_path)?;
    rag.ingest_batch(&nodes, &edges)?;

    let node_count = rag.node_count()?;
    let edge_count = rag.edge_count()?;
    if json_mode {
        print_json(&serde_json::json!({
            "ingested_nodes": nodes.len(),
            "ingested_edges": edges.len(),
            "node_count": node_count,
            "edge_count": edge_count,
        }));
        return Ok(());
    }

    println!("Ingested {} nodes, {} edges", nodes.len(), edges.len());
    println!("Graph now has {} nodes, {} edges", node_count, edge_count);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show graph status.
pub fn cmd_status(db_path: &Path, json_mode: bool) -> Result<(), ExcerptError> {
    let rag = RedbRag::open(db_path)?;
    let node_count = rag.node_count()?;
    let edge_count = rag.edge_count()?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "node_count": node_count,
            "edge_count": edge_count,
        }));
        return Ok(());
    }

    println!("agglo RAG Status");
    println!("================");
    println!("Database: {:?}", db_path);
    println!();
    println!("Nodes: {}", node_count);
    println!("Edges: {}", edge_count);
    Ok(())
}

// =============================================================================
// EXTRACT COMMAND
// =============================================================================

/// Build the excerpt of `region` and write it to `output`.
pub fn cmd_extract(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    region: &Region,
    inner: &Region,
    embeddings: Option<&Path>,
    output: &Path,
) -> Result<(), ExcerptError> {
    let rag = RedbRag::open(db_path)?;
    let table = load_embeddings(embeddings)?;

    let mut assembler = Assembler::new(&rag, &rag, &config.excerpt);
    if let Some(table) = &table {
        assembler = assembler.with_embeddings(table);
    }
    let excerpt = assembler.assemble_with_inner(region, inner)?;
    let (bytes, digest) = write_excerpt(&excerpt, output)?;

    if json_mode {
        let mut summary = excerpt_summary(&excerpt);
        summary["output"] = serde_json::json!(output.to_string_lossy());
        summary["bytes"] = serde_json::json!(bytes);
        summary["blake3"] = serde_json::json!(digest);
        print_json(&summary);
        return Ok(());
    }

    println!("Extracted excerpt for {}", region);
    println!("  Nodes:          {}", excerpt.num_nodes());
    println!("  Directed edges: {}", excerpt.num_edges());
    println!("  Feature dim:    {}", excerpt.feature_dim);
    println!("Wrote {} bytes to {:?}", bytes, output);
    println!("BLAKE3: {}", digest);
    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Validate and summarize a stored excerpt.
pub fn cmd_inspect(input: &Path, json_mode: bool) -> Result<(), ExcerptError> {
    let data = read_input(input, MAX_PERSISTENCE_PAYLOAD_SIZE as u64)?;
    let excerpt = excerpt_from_bytes(&data)?;
    let digest = excerpt_digest(&excerpt)?;

    if json_mode {
        let mut summary = excerpt_summary(&excerpt);
        summary["blake3"] = serde_json::json!(digest);
        print_json(&summary);
        return Ok(());
    }

    println!("Excerpt {:?}", input);
    println!("  Region:         {}", excerpt.region);
    println!("  Inner region:   {}", excerpt.inner_region);
    println!("  Strategy:       {:?}", excerpt.strategy);
    println!("  Self-loops:     {}", excerpt.self_loops);
    println!("  Nodes:          {}", excerpt.num_nodes());
    println!("  Directed edges: {}", excerpt.num_edges());
    println!("  Feature dim:    {}", excerpt.feature_dim);
    println!("  Mask total:     {:.3}", excerpt.mask_total());
    println!("  BLAKE3:         {}", digest);
    Ok(())
}

// =============================================================================
// DATASET COMMAND
// =============================================================================

/// Build one excerpt per block of the configured ROI.
pub fn cmd_dataset(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    output_dir: &Path,
    embeddings: Option<&Path>,
) -> Result<(), ExcerptError> {
    let sampler = config.sampler()?;
    std::fs::create_dir_all(output_dir)
        .map_err(|e| ExcerptError::IoError(format!("Create output directory: {}", e)))?;

    let rag = RedbRag::open(db_path)?;
    let table = load_embeddings(embeddings)?;
    let mut assembler = Assembler::new(&rag, &rag, &config.excerpt);
    if let Some(table) = &table {
        assembler = assembler.with_embeddings(table);
    }
    let dataset = ExcerptDataset::new(assembler, sampler);
    tracing::info!(
        "Building {} excerpts over {}",
        dataset.len(),
        dataset.sampler().roi()
    );

    let mut stats = TargetStats::default();
    let mut written = 0usize;
    let mut skipped = 0usize;
    for idx in 0..dataset.len() {
        match dataset.get(idx) {
            Ok(excerpt) => {
                write_excerpt(&excerpt, &output_dir.join(format!("excerpt_{}.aggx", idx)))?;
                stats.add(&excerpt);
                written += 1;
            }
            Err(ExcerptError::EmptyRegion { region, .. }) => {
                tracing::warn!("Skipping empty block {}", region);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    let (mean, std) = stats.mean_std().unwrap_or((0.0, 0.0));

    if json_mode {
        print_json(&serde_json::json!({
            "written": written,
            "skipped": skipped,
            "targets_mean": mean,
            "targets_std": std,
        }));
        return Ok(());
    }

    println!("Wrote {} excerpts to {:?} ({} empty blocks skipped)", written, output_dir, skipped);
    println!("Targets: mean {:.4}, std {:.4}", mean, std);
    Ok(())
}

// =============================================================================
// PAIRS COMMAND
// =============================================================================

/// Show siamese pair counts, sampling weights and the first patch boxes.
pub fn cmd_pairs(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    region: &Region,
) -> Result<(), ExcerptError> {
    let rag = RedbRag::open(db_path)?;
    let pairs = PairDataset::load(&rag, region)?;
    let [merges, splits] = pairs.class_counts();
    let weight = |count: usize| if count > 0 { 1.0 / count as f64 } else { 0.0 };

    let first = if pairs.is_empty() {
        None
    } else {
        let sample = pairs.pair(0)?;
        let boxes = sample
            .centers
            .iter()
            .map(|c| PatchRequest::centered(c, &config.pairs).map(|r| r.region))
            .collect::<Result<Vec<_>, _>>()?;
        Some((sample, boxes))
    };

    if json_mode {
        print_json(&serde_json::json!({
            "region": region.to_string(),
            "pairs": pairs.len(),
            "merge_pairs": merges,
            "split_pairs": splits,
            "merge_weight": weight(merges),
            "split_weight": weight(splits),
            "channels": config.pairs.channels.count(),
            "first_patches": first
                .as_ref()
                .map(|(_, boxes)| boxes.iter().map(ToString::to_string).collect::<Vec<_>>()),
        }));
        return Ok(());
    }

    println!("Pairs in {}", region);
    println!("  Total:  {}", pairs.len());
    println!("  Merge:  {} (weight {:.6})", merges, weight(merges));
    println!("  Split:  {} (weight {:.6})", splits, weight(splits));
    if let Some((sample, boxes)) = first {
        println!(
            "First pair {} - {} (target {:+.1})",
            sample.ids[0], sample.ids[1], sample.label
        );
        for b in boxes {
            println!("  Patch: {}", b);
        }
    }
    Ok(())
}
