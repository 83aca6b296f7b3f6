//! Exporter interfaces: the core emits an [`IndexResult`]; concrete
//! encoders (line-delimited records, embedded relational databases, columnar
//! files, vector-store payloads) are out-of-scope collaborators that consume
//! it through the contracts below rather than reaching into pipeline internals.

use crate::types::{IndexChunk, IndexFileMetadata, IndexResult, SecretFinding};
use serde::{Deserialize, Serialize};

/// One exportable unit, tagged by kind so a record-streaming encoder can
/// iterate files, then chunks, then secret findings without downcasting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportRecord {
    File(IndexFileMetadata),
    Chunk(IndexChunk),
    SecretFinding(SecretFinding),
}

/// A backpressure-aware destination for export records: `write` may block
/// or return `Pending`-like errors in a real encoder; this crate only
/// defines the contract encoders implement.
pub trait ChunkRecordSink {
    type Error;

    fn write(&mut self, record: ExportRecord) -> Result<(), Self::Error>;
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Drives `sink` over `result` in the documented order: files, then chunks,
/// then secret findings. Stops at the first write error.
pub fn export_records<S: ChunkRecordSink>(result: &IndexResult, sink: &mut S) -> Result<(), S::Error> {
    for file in &result.files {
        sink.write(ExportRecord::File(file.clone()))?;
    }
    for chunk in &result.chunks {
        sink.write(ExportRecord::Chunk(chunk.clone()))?;
    }
    for finding in &result.secret_findings {
        sink.write(ExportRecord::SecretFinding(finding.clone()))?;
    }
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RepositorySpec, ResumeCursor};
    use std::collections::BTreeMap;
    use std::convert::Infallible;

    #[derive(Default)]
    struct VecSink {
        records: Vec<ExportRecord>,
        flushed: bool,
    }

    impl ChunkRecordSink for VecSink {
        type Error = Infallible;

        fn write(&mut self, record: ExportRecord) -> Result<(), Infallible> {
            self.records.push(record);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            self.flushed = true;
            Ok(())
        }
    }

    fn sample_result() -> IndexResult {
        IndexResult {
            spec: RepositorySpec::filesystem("/repo"),
            revision: None,
            files: vec![IndexFileMetadata {
                path: "a.txt".into(),
                size_bytes: 2,
                content_hash: "h".into(),
                language: None,
                executable: false,
                skip_reason: None,
            }],
            chunks: Vec::new(),
            created_at: 0,
            file_contents_by_path: BTreeMap::new(),
            language_by_content_hash: BTreeMap::new(),
            secret_findings: vec![SecretFinding { path: "a.txt".into(), line: 1, rule_id: "x".into(), excerpt: "e".into() }],
            policy_findings: Vec::new(),
            shards: None,
            resume_cursor: None::<ResumeCursor>,
            test_coverage: None,
            dependency_graph: None,
            symbol_index: None,
        }
    }

    #[test]
    fn emits_files_then_chunks_then_secret_findings_in_order() {
        let result = sample_result();
        let mut sink = VecSink::default();
        export_records(&result, &mut sink).unwrap();

        assert!(matches!(sink.records[0], ExportRecord::File(_)));
        assert!(matches!(sink.records[1], ExportRecord::SecretFinding(_)));
        assert!(sink.flushed);
    }
}
