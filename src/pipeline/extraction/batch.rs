//! Multi-file uploads.
//!
//! Each file runs on the blocking pool independently. One file failing never
//! cancels or hides the others: every input gets exactly one outcome, in
//! input order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::orchestrator::DocumentPipeline;
use super::types::{BlurVerdict, Engine, ExtractedFields, ProcessedRotatedImagesResult};
use super::ExtractionError;

/// Settled result for one uploaded file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Blur(BlurVerdict),
    Ocr {
        result: ProcessedRotatedImagesResult,
        fields: ExtractedFields,
    },
    Failed {
        path: PathBuf,
        error: String,
    },
}

impl FileOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

fn process_one(pipeline: &DocumentPipeline, path: &Path, engine: Engine) -> FileOutcome {
    let outcome: Result<FileOutcome, ExtractionError> = match engine {
        Engine::Blur => pipeline.run_blur_gate(path).map(FileOutcome::Blur),
        Engine::Ocr => pipeline.run_ocr_extraction(path).map(|result| {
            let fields = pipeline.extract_fields(&result.best_text);
            FileOutcome::Ocr { result, fields }
        }),
    };

    outcome.unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "File processing failed");
        FileOutcome::Failed {
            path: path.to_path_buf(),
            error: e.to_string(),
        }
    })
}

/// Process every path with `engine`, concurrently.
pub async fn process_batch(
    pipeline: Arc<DocumentPipeline>,
    paths: Vec<PathBuf>,
    engine: Engine,
) -> Vec<FileOutcome> {
    info!(files = paths.len(), ?engine, "Starting batch");

    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let pipeline = Arc::clone(&pipeline);
            let task_path = path.clone();
            let handle =
                tokio::task::spawn_blocking(move || process_one(&pipeline, &task_path, engine));
            (path, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => FileOutcome::Failed {
                path,
                error: format!("Processing task panicked: {e}"),
            },
        };
        outcomes.push(outcome);
    }

    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    info!(files = outcomes.len(), failed, "Batch complete");
    outcomes
}
