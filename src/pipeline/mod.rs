//! Page pipeline orchestration.
//!
//! The pipeline fans pages out over a bounded rayon pool. Each page unit
//! renders its vector export and its thumbnail independently, so a failure
//! in one never costs the other. Results travel back over a channel and are
//! reassembled in page order.
//!
//! # Example
//!
//! ```no_run
//! use pdfslides::{load_bytes, OutputConfig, Pipeline, RunStatus};
//!
//! fn main() -> pdfslides::Result<()> {
//!     let data = std::fs::read("slides.pdf")?;
//!     let document = load_bytes(&data)?;
//!
//!     let config = OutputConfig::new().with_max_size(200, 200);
//!     let report = Pipeline::new(config).process(&document);
//!     assert_eq!(report.page_count(), document.page_count());
//!     if report.status != RunStatus::Success {
//!         eprintln!("{} artifacts failed", report.failure_count());
//!     }
//!     Ok(())
//! }
//! ```

mod cancel;
mod options;
mod report;
mod writer;

pub use cancel::CancelToken;
pub use options::{OutputConfig, PageSelection};
pub use report::{FailureReason, Outcome, PageReport, RunReport, RunStatus};
pub use writer::{ArtifactWriter, DirectoryWriter, NamingScheme};

use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;

use crate::error::RenderError;
use crate::export::{PageExporter, ThumbnailGenerator, VectorExporter};
use crate::model::{Document, Page};
use crate::parser::{self, LoadOptions};

/// Runs the per-page exporters over a document.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: OutputConfig,
}

impl Pipeline {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Export every selected page of `document`.
    ///
    /// The report holds exactly one entry per selected page, in page order,
    /// each with a vector and a thumbnail outcome.
    pub fn process(&self, document: &Document) -> RunReport {
        self.run(document, None)
    }

    /// Load `data` and process it. A load failure yields a `Failure`
    /// report with no pages.
    pub fn process_bytes(&self, data: &[u8], options: &LoadOptions) -> RunReport {
        let started_at = Utc::now();
        match parser::load(data, options) {
            Ok(document) => {
                let mut report = self.process(&document);
                report.started_at = started_at;
                report
            }
            Err(e) => {
                log::error!("Failed to load document: {}", e);
                RunReport::load_failure(e, started_at)
            }
        }
    }

    /// Like [`process`](Self::process), writing each artifact through
    /// `writer` as soon as its page completes. A failed write turns that
    /// outcome into [`FailureReason::Write`].
    pub fn process_and_write(&self, document: &Document, writer: &dyn ArtifactWriter) -> RunReport {
        self.run(document, Some(writer))
    }

    fn run(&self, document: &Document, writer: Option<&dyn ArtifactWriter>) -> RunReport {
        let started_at = Utc::now();
        let config = &self.config;
        let indices: Vec<usize> = (0..document.page_count())
            .filter(|&i| u32::try_from(i + 1).is_ok_and(|n| config.pages.includes(n)))
            .collect();

        log::info!(
            "Processing {} of {} pages on {} workers",
            indices.len(),
            document.page_count(),
            config.parallelism
        );

        let vector = VectorExporter::new(config.vector_options());
        let thumbnails = ThumbnailGenerator::new(config.thumbnail_options()).with_limits(
            config.max_width,
            config.max_height,
            config.thumbnail_quality,
        );
        let cancel = &config.cancel;
        let unit = |index: usize| -> PageReport {
            if cancel.is_cancelled() {
                return PageReport::cancelled(index);
            }
            match document.page(index) {
                Some(page) => PageReport {
                    page_index: index,
                    vector: produce(&vector, &page, writer),
                    thumbnail: produce(&thumbnails, &page, writer),
                },
                None => PageReport::cancelled(index),
            }
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallelism.max(1))
            .thread_name(|i| format!("pdfslides-worker-{}", i))
            .build();
        let mut pages = match pool {
            Ok(pool) => {
                let (tx, rx) = crossbeam_channel::unbounded();
                let unit = &unit;
                pool.scope(|scope| {
                    for &index in &indices {
                        let tx = tx.clone();
                        scope.spawn(move |_| {
                            // The receiver outlives the scope.
                            let _ = tx.send(unit(index));
                        });
                    }
                });
                drop(tx);
                rx.iter().collect::<Vec<_>>()
            }
            Err(e) => {
                log::warn!("Worker pool unavailable ({}), processing serially", e);
                indices.iter().map(|&index| unit(index)).collect()
            }
        };
        pages.sort_by_key(|p| p.page_index);

        let validity = document.validity();
        let status = RunReport::status_for(validity, &pages);
        let report = RunReport {
            status,
            validity,
            pages,
            warnings: document.warnings().to_vec(),
            error: None,
            started_at,
            finished_at: Utc::now(),
        };
        log::info!(
            "Run finished: {:?}, {} failed artifacts, {} degraded, {} ms",
            report.status,
            report.failure_count(),
            report.degraded_count(),
            report.duration().num_milliseconds()
        );
        report
    }
}

/// Run one exporter on one page, containing panics to that artifact.
fn produce<E>(exporter: &E, page: &Page<'_>, writer: Option<&dyn ArtifactWriter>) -> Outcome
where
    E: PageExporter,
    E::Error: From<RenderError> + Into<FailureReason>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| exporter.export_page(page)))
        .unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("Page {}: renderer panicked: {}", page.index(), message);
            Err(RenderError::CorruptContentStream(format!("renderer panicked: {}", message)).into())
        });

    match result {
        Ok(artifact) => {
            if let Some(writer) = writer {
                if let Err(e) = writer.write(&artifact) {
                    log::warn!(
                        "Page {}: writing {} failed: {}",
                        page.index(),
                        artifact.suggested_filename(),
                        e
                    );
                    return Outcome::Failure(FailureReason::Write(e.to_string()));
                }
            }
            if artifact.is_degraded() {
                log::warn!(
                    "Page {}: {:?} output is missing content ({} warnings)",
                    page.index(),
                    exporter.kind(),
                    artifact.warnings.len()
                );
            }
            Outcome::Success(artifact)
        }
        Err(e) => {
            log::warn!("Page {}: {:?} export failed: {}", page.index(), exporter.kind(), e);
            Outcome::Failure(e.into())
        }
    }
}
