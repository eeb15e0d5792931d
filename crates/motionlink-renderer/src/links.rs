//! Deferred cross-row links.
//!
//! Rendered rows may point at rows whose output path is not known yet. They
//! do so with a `:::pathTo:::<row id>:::` placeholder. Every rendered file is
//! submitted here along with its path and row id; once the whole run has been
//! submitted, [`LinkResolver::flush`] swaps each placeholder for a relative
//! link and writes everything out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

use dashmap::DashMap;
use motionlink_common::MotionlinkError;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::fs::FilePersistence;
use crate::paths::relative_link;
use crate::rich_text::PLACEHOLDER_PREFIX;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":::pathTo:::([^:\s]+):::").expect("placeholder pattern is valid")
});

/// One rendered output file awaiting flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub output_path: PathBuf,
    pub content: String,
    pub source_row_id: String,
}

/// What a flush did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub resolved: usize,
    /// `(output path, row id)` for every placeholder left in place.
    pub unresolved: Vec<(PathBuf, String)>,
}

/// Buffers output for the whole run. Shared by reference across rules.
///
/// Flushing consumes the resolver, so nothing can be submitted afterwards.
#[derive(Debug, Default)]
pub struct LinkResolver {
    known_paths: DashMap<String, PathBuf>,
    pending: Mutex<Vec<OutputRecord>>,
}

impl LinkResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where `source_row_id` ends up and hold its content for flush.
    pub fn submit(
        &self,
        content: impl Into<String>,
        output_path: impl Into<PathBuf>,
        source_row_id: impl Into<String>,
    ) {
        let record = OutputRecord {
            output_path: output_path.into(),
            content: content.into(),
            source_row_id: source_row_id.into(),
        };
        self.known_paths
            .insert(record.source_row_id.clone(), record.output_path.clone());
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn known_path(&self, row_id: &str) -> Option<PathBuf> {
        self.known_paths.get(row_id).map(|p| p.clone())
    }

    /// Snapshot of the records awaiting flush, in submission order.
    pub fn pending(&self) -> Vec<OutputRecord> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Substitute every resolvable placeholder in `content`, as seen from a
    /// file at `output_path`. Returns the new content and the ids left
    /// unresolved.
    pub fn resolve(&self, content: &str, output_path: &Path) -> (String, Vec<String>) {
        if !content.contains(PLACEHOLDER_PREFIX) {
            return (content.to_string(), Vec::new());
        }

        let mut unresolved = Vec::new();
        let resolved = PLACEHOLDER_RE.replace_all(content, |caps: &Captures| {
            let id = &caps[1];
            match self.known_paths.get(id) {
                Some(target) => relative_link(output_path, &target),
                None => {
                    unresolved.push(id.to_string());
                    caps[0].to_string()
                }
            }
        });
        (resolved.into_owned(), unresolved)
    }

    /// Resolve and write every submitted record exactly once.
    ///
    /// Records sharing an output path collapse to the last one submitted.
    pub async fn flush(self, fs: &impl FilePersistence) -> Result<FlushReport, MotionlinkError> {
        let pending = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut report = FlushReport::default();

        let mut outputs: Vec<(PathBuf, String)> = Vec::with_capacity(pending.len());
        let mut slots: HashMap<PathBuf, usize> = HashMap::new();
        for record in pending {
            let (content, unresolved) = self.resolve(&record.content, &record.output_path);
            let placeholders = PLACEHOLDER_RE.find_iter(&record.content).count();
            report.resolved += placeholders - unresolved.len();

            if !unresolved.is_empty() {
                warn!(
                    path = %record.output_path.display(),
                    ids = ?unresolved,
                    "leaving unresolved page links in output"
                );
                report.unresolved.extend(
                    unresolved
                        .into_iter()
                        .map(|id| (record.output_path.clone(), id)),
                );
            }
            match slots.get(&record.output_path) {
                Some(&slot) => {
                    warn!(
                        path = %record.output_path.display(),
                        row = %record.source_row_id,
                        "output path already used, later row wins"
                    );
                    outputs[slot].1 = content;
                }
                None => {
                    slots.insert(record.output_path.clone(), outputs.len());
                    outputs.push((record.output_path, content));
                }
            }
        }

        let writes = outputs.iter().map(|(path, content)| async move {
            debug!(path = %path.display(), "writing output");
            fs.write_text(path, content).await
        });
        for result in n0_future::join_all(writes).await {
            result?;
            report.written += 1;
        }

        Ok(report)
    }
}
