//! End-to-end runs of the page pipeline.

mod common;

use std::path::PathBuf;
use std::sync::Mutex;

use pdfslides::{
    load_bytes, process_bytes, ArtifactWriter, CancelToken, DirectoryWriter, Error, FailureReason,
    LoadError, LoadOptions, NamingScheme, OutputArtifact, OutputConfig, PageSelection, Pipeline,
    RunStatus, Validity,
};

#[test]
fn test_three_slides_succeed() {
    let config = OutputConfig::new()
        .with_max_size(200, 200)
        .with_thumbnail_quality(80);
    let report = process_bytes(&common::deck(3), config);

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.validity, Validity::Valid);
    assert_eq!(report.page_count(), 3);
    assert_eq!(report.failure_count(), 0);
    assert!(report.error.is_none());

    for (i, page) in report.pages.iter().enumerate() {
        assert_eq!(page.page_index, i);
        assert!(page.is_complete());
        let thumb = page.thumbnail.artifact().unwrap();
        assert!(thumb.width <= 200.0 && thumb.height <= 200.0);
        assert_eq!((thumb.width, thumb.height), (200.0, 150.0));
        let svg = page.vector.artifact().unwrap();
        assert!(String::from_utf8_lossy(&svg.bytes).contains(&format!("Slide {}", i + 1)));
    }
    assert_eq!(report.artifacts().count(), 6);
    assert!(report.finished_at >= report.started_at);
}

#[test]
fn test_output_is_independent_of_parallelism() {
    let doc = load_bytes(&common::deck(4)).unwrap();
    let serial = Pipeline::new(OutputConfig::new().with_parallelism(1)).process(&doc);
    let parallel = Pipeline::new(OutputConfig::new().with_parallelism(4)).process(&doc);

    let serial: Vec<&[u8]> = serial.artifacts().map(|a| a.bytes.as_slice()).collect();
    let parallel: Vec<&[u8]> = parallel.artifacts().map(|a| a.bytes.as_slice()).collect();
    assert_eq!(serial.len(), 8);
    assert_eq!(serial, parallel);
}

#[test]
fn test_corrupt_page_is_isolated() {
    let report = process_bytes(&common::deck_with_corrupt_page(), OutputConfig::default());

    assert_eq!(report.status, RunStatus::PartialSuccess);
    assert_eq!(report.page_count(), 3);
    assert!(report.pages[0].is_complete());
    assert!(report.pages[2].is_complete());

    let broken = &report.pages[1];
    assert!(matches!(
        broken.vector.failure(),
        Some(FailureReason::Export(_))
    ));
    assert!(matches!(
        broken.thumbnail.failure(),
        Some(FailureReason::Thumbnail(_))
    ));
    assert_eq!(report.failure_count(), 2);
}

#[test]
fn test_degraded_page_counts_as_success() {
    let report = process_bytes(&common::page_with_missing_xobject(), OutputConfig::default());

    assert_eq!(report.status, RunStatus::Success);
    assert!(report.pages[0].is_complete());
    assert_eq!(report.degraded_count(), 2);
}

#[test]
fn test_encrypted_document_fails_run() {
    let report = process_bytes(&common::encrypted_deck(), OutputConfig::default());

    assert_eq!(report.status, RunStatus::Failure);
    assert_eq!(report.validity, Validity::Invalid);
    assert!(report.pages.is_empty());
    assert_eq!(report.error, Some(LoadError::Encrypted));
}

#[test]
fn test_damaged_document_reports_validity() {
    let data = common::deck_builder(2).build_with_broken_xref();
    let report = process_bytes(&data, OutputConfig::default());

    assert_eq!(report.page_count(), 2);
    assert!(report.pages.iter().all(|p| p.is_complete()));
    match report.validity {
        Validity::PartiallyCorrupt => {
            assert_eq!(report.status, RunStatus::PartialSuccess);
            assert!(!report.warnings.is_empty());
        }
        Validity::Valid => assert_eq!(report.status, RunStatus::Success),
        Validity::Invalid => panic!("damaged document should load"),
    }
}

#[test]
fn test_cancel_before_start() {
    let token = CancelToken::new();
    token.cancel();
    let config = OutputConfig::new().with_cancel_token(token);
    let report = process_bytes(&common::deck(3), config);

    assert_eq!(report.page_count(), 3);
    assert_ne!(report.status, RunStatus::Success);
    for page in &report.pages {
        assert!(page.vector.is_cancelled());
        assert!(page.thumbnail.is_cancelled());
    }
    assert_eq!(report.artifacts().count(), 0);
}

/// Cancels the run as soon as the first artifact is written.
struct CancellingWriter {
    token: CancelToken,
    written: Mutex<Vec<String>>,
}

impl ArtifactWriter for CancellingWriter {
    fn write(&self, artifact: &OutputArtifact) -> pdfslides::Result<PathBuf> {
        self.token.cancel();
        let name = artifact.suggested_filename();
        self.written.lock().unwrap().push(name.clone());
        Ok(PathBuf::from(name))
    }
}

#[test]
fn test_cancel_mid_run_finishes_started_page() {
    let token = CancelToken::new();
    let writer = CancellingWriter {
        token: token.clone(),
        written: Mutex::new(Vec::new()),
    };
    let config = OutputConfig::new()
        .with_parallelism(1)
        .with_cancel_token(token);
    let doc = load_bytes(&common::deck(3)).unwrap();
    let report = Pipeline::new(config).process_and_write(&doc, &writer);

    assert_eq!(report.page_count(), 3);
    let complete = report.pages.iter().filter(|p| p.is_complete()).count();
    let cancelled = report
        .pages
        .iter()
        .filter(|p| p.vector.is_cancelled() && p.thumbnail.is_cancelled())
        .count();
    assert_eq!((complete, cancelled), (1, 2));
    assert_eq!(writer.written.lock().unwrap().len(), 2);
}

#[test]
fn test_page_selection() {
    let config = OutputConfig::new().with_page_range(2..=3);
    let report = process_bytes(&common::deck(4), config);

    let indices: Vec<usize> = report.pages.iter().map(|p| p.page_index).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(report.status, RunStatus::Success);

    let selection: PageSelection = "1, 4".parse().unwrap();
    let report = process_bytes(&common::deck(4), OutputConfig::new().with_pages(selection));
    let indices: Vec<usize> = report.pages.iter().map(|p| p.page_index).collect();
    assert_eq!(indices, vec![0, 3]);
}

#[test]
fn test_selection_out_of_range() {
    let selection = PageSelection::Range(2..=9);
    assert!(matches!(
        selection.to_indices(4),
        Err(Error::PageOutOfRange(9, 4))
    ));
}

#[test]
fn test_process_and_write_to_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = load_bytes(&common::deck(2)).unwrap();
    let writer = DirectoryWriter::new(tmp.path()).unwrap();
    let report = Pipeline::new(OutputConfig::new().with_max_size(64, 64)).process_and_write(&doc, &writer);

    assert_eq!(report.status, RunStatus::Success);
    for name in ["page-0.svg", "page-0-thumb.jpg", "page-1.svg", "page-1-thumb.jpg"] {
        let path = tmp.path().join(name);
        assert!(path.is_file(), "{} missing", name);
    }
    let svg = std::fs::read_to_string(tmp.path().join("page-1.svg")).unwrap();
    assert!(svg.contains("Slide 2"));

    let report_path = writer.write_report(&report, "report.json").unwrap();
    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(report_path).unwrap()).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["pages"].as_array().unwrap().len(), 2);
    assert_eq!(json["pages"][0]["vector"]["status"], "success");
}

#[test]
fn test_numbered_names() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = load_bytes(&common::deck(1)).unwrap();
    let writer = DirectoryWriter::new(tmp.path())
        .unwrap()
        .with_naming(NamingScheme::Numbered);
    Pipeline::default().process_and_write(&doc, &writer);

    assert!(tmp.path().join("001.svg").is_file());
    assert!(tmp.path().join("001.jpg").is_file());
}

struct FailingWriter;

impl ArtifactWriter for FailingWriter {
    fn write(&self, _artifact: &OutputArtifact) -> pdfslides::Result<PathBuf> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }
}

#[test]
fn test_write_failure_is_reported_per_artifact() {
    let doc = load_bytes(&common::deck(2)).unwrap();
    let report = Pipeline::default().process_and_write(&doc, &FailingWriter);

    assert_eq!(report.status, RunStatus::PartialSuccess);
    assert_eq!(report.failure_count(), 4);
    assert!(matches!(
        report.pages[0].vector.failure(),
        Some(FailureReason::Write(msg)) if msg.contains("read-only")
    ));
}

#[test]
fn test_load_failure_report() {
    let report = Pipeline::default().process_bytes(b"%PDF-1.4\n1 0 obj\n<<", &LoadOptions::default());
    assert_eq!(report.status, RunStatus::Failure);
    assert!(matches!(report.error, Some(LoadError::Truncated(_))));
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_write_all_async() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = load_bytes(&common::deck(2)).unwrap();
    let report = Pipeline::default().process(&doc);

    let writer = DirectoryWriter::new(tmp.path()).unwrap();
    let paths = writer.write_all_async(&report).await.unwrap();
    assert_eq!(paths.len(), 4);
    assert!(paths.iter().all(|p| p.is_file()));
}
