//! Batch ingestion of a TEI corpus.
//!
//! Scans a directory for `*.tei.xml` files and runs each document through
//! extract → chunk → embed → upsert. Documents are processed by a bounded
//! worker pool; chunk order inside a document is preserved because one
//! task owns the whole document, while documents proceed concurrently.
//!
//! One bad document never aborts the batch: parse failures, empty
//! documents, and backend errors are logged and counted as skips. Chunk
//! ids and texts are deterministic, so interrupting and re-running a
//! batch is a safe replace rather than an accumulation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::chunk::build_chunks;
use crate::config::{self, ChunkingConfig, Config};
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::VectorStore;
use crate::tei::extract_document;

/// Outcome counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// TEI files found by the scan.
    pub files: usize,
    /// Documents fully ingested (or fully chunked, in a dry run).
    pub documents: usize,
    /// Documents skipped after a per-document failure.
    pub skipped: usize,
    /// Chunks written (projected chunks, in a dry run).
    pub chunks: usize,
}

/// Find every `*.tei.xml` under `dir`, sorted by path so runs are
/// deterministic.
pub fn scan_tei_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| Error::Backend(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(".tei.xml") {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Extract and chunk without touching the embedding backend or the
/// index, reporting projected counts.
pub fn dry_run(config: &Config, tei_dir: &Path) -> Result<IngestReport> {
    config::validate(config)?;

    let files = scan_tei_files(tei_dir)?;
    let mut report = IngestReport {
        files: files.len(),
        ..Default::default()
    };

    for path in &files {
        match extract_document(path).and_then(|doc| build_chunks(&doc, &config.chunking)) {
            Ok(chunks) => {
                report.documents += 1;
                report.chunks += chunks.len();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping document");
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}

/// Ingests a TEI directory into a vector collection through injected
/// embedding and index collaborators.
pub struct Ingestor {
    config: Config,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Ingestor {
    pub fn new(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
        }
    }

    /// Ingest every TEI file under `tei_dir`.
    ///
    /// Runs up to `[ingest] workers` documents concurrently; the semaphore
    /// doubles as backpressure against the embedding and index backends.
    pub async fn run(&self, tei_dir: &Path) -> Result<IngestReport> {
        config::validate(&self.config)?;

        let files = scan_tei_files(tei_dir)?;
        let mut report = IngestReport {
            files: files.len(),
            ..Default::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.config.ingest.workers));
        let mut tasks: JoinSet<(PathBuf, Result<usize>)> = JoinSet::new();

        for path in files {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let embedder = self.embedder.clone();
            let chunking = self.config.chunking.clone();
            let batch_size = self.config.embedding.batch_size;

            tasks.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                let outcome = match permit {
                    Ok(_permit) => {
                        ingest_document(&path, &chunking, batch_size, store, embedder).await
                    }
                    Err(e) => Err(Error::Backend(e.into())),
                };
                (path, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((path, Ok(chunks))) => {
                    debug!(path = %path.display(), chunks, "document ingested");
                    report.documents += 1;
                    report.chunks += chunks;
                }
                Ok((path, Err(e))) => {
                    warn!(path = %path.display(), error = %e, "skipping document");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "ingestion worker aborted");
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Process one document end to end. Chunks are embedded in batches and
/// upserted in one call, so the whole document lands atomically and in
/// order.
async fn ingest_document(
    path: &Path,
    chunking: &ChunkingConfig,
    batch_size: usize,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<usize> {
    let document = extract_document(path)?;
    let chunks = build_chunks(&document, chunking)?;

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        vectors.extend(embedder.embed(&texts).await?);
    }

    store.upsert(&chunks, &vectors).await?;
    Ok(chunks.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc><titleStmt><title>Sample</title></titleStmt></fileDesc>
    <profileDesc><abstract><p>Short abstract text.</p></abstract></profileDesc>
  </teiHeader>
  <text><body>
    <div><head>Results</head><p>Result paragraph one.</p></div>
  </body></text>
</TEI>"#;

    fn corpus() -> tempfile::TempDir {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("beta.tei.xml"), GOOD_TEI).unwrap();
        std::fs::write(tmp.path().join("alpha.tei.xml"), GOOD_TEI).unwrap();
        std::fs::write(tmp.path().join("broken.tei.xml"), "<TEI><body>").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "not tei").unwrap();
        tmp
    }

    #[test]
    fn scan_filters_and_sorts() {
        let tmp = corpus();
        let files = scan_tei_files(tmp.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["alpha.tei.xml", "beta.tei.xml", "broken.tei.xml"]);
    }

    #[test]
    fn dry_run_counts_and_isolates_failures() {
        let tmp = corpus();
        let report = dry_run(&Config::default(), tmp.path()).unwrap();
        assert_eq!(report.files, 3);
        assert_eq!(report.documents, 2);
        assert_eq!(report.skipped, 1);
        // Abstract and section each fit one chunk at the default window.
        assert_eq!(report.chunks, 4);
    }

    #[test]
    fn dry_run_rejects_invalid_chunking_upfront() {
        let tmp = corpus();
        let mut config = Config::default();
        config.chunking.overlap_words = config.chunking.max_words;
        let err = dry_run(&config, tmp.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }
}
