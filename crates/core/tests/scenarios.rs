//! End-to-end scenarios from the indexing engine's testable-properties list,
//! exercised through `IndexManager`/`Pipeline` rather than individual units.

use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

use strata_core::chunker::{chunk, AdaptiveEnvelope, ChunkInput, ChunkOptions, ChunkStrategy};
use strata_core::manager::IndexManager;
use strata_core::snapshot::PlainSnapshotProvider;
use strata_core::tokenizer::BasicTokenizer;
use strata_core::types::{IndexOptions, RepositorySpec};

fn manager() -> IndexManager {
    IndexManager::new(Arc::new(PlainSnapshotProvider::new()))
}

// ---------------------------------------------------------------------------
// Incremental reuse
// ---------------------------------------------------------------------------

#[tokio::test]
async fn incremental_run_reuses_chunk_ids_for_an_unchanged_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "version1").unwrap();
    fs::write(dir.path().join("b.txt"), "MY_SECRET=one-two-three").unwrap();

    let manager = manager();
    let spec = RepositorySpec::filesystem(dir.path());

    let base = manager.index(&spec, &IndexOptions::default()).await.unwrap();
    let b_ids_before: Vec<String> = base.chunks.iter().filter(|c| c.chunk.metadata.path == "b.txt").map(|c| c.chunk.id.clone()).collect();
    assert!(!b_ids_before.is_empty());

    fs::write(dir.path().join("a.txt"), "version2").unwrap();
    let head_options = IndexOptions { incremental: true, include_paths: vec!["a.txt".to_string()], ..IndexOptions::default() };
    let head = manager.index(&spec, &head_options).await.unwrap();

    let a_detail = manager.get_file(&spec, "a.txt", None).unwrap();
    assert_eq!(a_detail.content, "version2");

    let b_ids_after: Vec<String> = head.chunks.iter().filter(|c| c.chunk.metadata.path == "b.txt").map(|c| c.chunk.id.clone()).collect();
    assert_eq!(
        b_ids_before.into_iter().collect::<std::collections::BTreeSet<_>>(),
        b_ids_after.into_iter().collect::<std::collections::BTreeSet<_>>()
    );
}

// ---------------------------------------------------------------------------
// Adaptive chunking envelope
// ---------------------------------------------------------------------------

#[test]
fn adaptive_envelope_keeps_every_chunk_within_the_configured_line_range() {
    let text: String = (1..=20).map(|n| format!("line{n}\n")).collect();
    let opts = ChunkOptions {
        strategy: ChunkStrategy::Lines,
        target_lines: 3,
        adaptive: Some(AdaptiveEnvelope { min_lines: Some(4), max_lines: Some(6), ..AdaptiveEnvelope::default() }),
        ..ChunkOptions::default()
    };
    let tokenizer = BasicTokenizer;
    let chunks = chunk(&ChunkInput { text: &text, path: "notes.txt", language: None }, &opts, &tokenizer);

    assert_eq!(chunks[0].metadata.start_line, 1);
    for c in &chunks {
        let span = c.metadata.end_line - c.metadata.start_line + 1;
        assert!((4..=6).contains(&span), "chunk {}-{} has span {span}", c.metadata.start_line, c.metadata.end_line);
    }
}

// ---------------------------------------------------------------------------
// Concurrency determinism
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrency_one_matches_concurrency_many_on_chunk_ids() {
    let dir = tempdir().unwrap();
    for n in 0..6 {
        fs::write(dir.path().join(format!("file{n}.txt")), format!("content for file {n}\nsecond line\n")).unwrap();
    }

    let spec = RepositorySpec::filesystem(dir.path());

    let serial = manager().index(&spec, &IndexOptions { concurrency: 1, ..IndexOptions::default() }).await.unwrap();
    let parallel = manager().index(&spec, &IndexOptions { concurrency: 6, ..IndexOptions::default() }).await.unwrap();

    let serial_ids: Vec<&str> = serial.chunks.iter().map(|c| c.chunk.id.as_str()).collect();
    let parallel_ids: Vec<&str> = parallel.chunks.iter().map(|c| c.chunk.id.as_str()).collect();
    assert_eq!(serial_ids, parallel_ids);
}

// ---------------------------------------------------------------------------
// Chained resume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn a_second_run_fed_the_first_runs_resume_cursor_covers_the_remaining_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "file a\n").unwrap();
    fs::write(dir.path().join("b.txt"), "file b\n").unwrap();
    fs::write(dir.path().join("c.txt"), "file c\n").unwrap();
    fs::write(dir.path().join("d.txt"), "file d\n").unwrap();

    let spec = RepositorySpec::filesystem(dir.path());
    let manager = manager();

    let first = manager.index(&spec, &IndexOptions { max_files_per_run: Some(2), ..IndexOptions::default() }).await.unwrap();
    assert_eq!(first.files.len(), 2);
    let cursor = first.resume_cursor.clone().expect("a truncated run must set a resume cursor");

    let second = manager
        .index(&spec, &IndexOptions { max_files_per_run: Some(2), resume_cursor: Some(cursor), ..IndexOptions::default() })
        .await
        .unwrap();
    assert_eq!(second.files.len(), 2);
    assert!(second.resume_cursor.is_none(), "the remainder fits in one run and should not itself be truncated");

    let mut seen: Vec<String> = first.files.iter().chain(second.files.iter()).map(|f| f.path.clone()).collect();
    seen.sort();
    assert_eq!(seen, vec!["a.txt", "b.txt", "c.txt", "d.txt"]);
}
