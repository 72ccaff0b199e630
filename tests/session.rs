//! Pipeline tests with a scripted assistant standing in for the AI service.
//!
//! Pages are synthetic images, so no pdfium library and no network are
//! needed.

mod common;

use common::*;
use edgequake_docfill::{
    fill_with_mapping, scan_template, write_atomic, DocFillError, ErrorKind, FillConfig,
    FillProgressCallback, Mapping, ReportAssistant, Session, Stage,
};
use std::io::Cursor;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

const LETTER: &str = concat!(
    "<w:p><w:r><w:t>Name: {{CLIENT_NAME}}</w:t></w:r></w:p>",
    "<w:p><w:r><w:t>DOB: {{DOB}}</w:t></w:r></w:p>",
    r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Policy {{POL</w:t></w:r><w:r><w:t>ICY}}</w:t></w:r></w:p>"#,
);

fn config_with(assistant: Arc<ScriptedAssistant>) -> FillConfig {
    FillConfig::builder()
        .assistant(assistant as Arc<dyn ReportAssistant>)
        .retry_backoff_ms(0)
        .build()
        .unwrap()
}

#[derive(Default)]
struct StageRecorder {
    stages: Mutex<Vec<Stage>>,
    pages: Mutex<Vec<(usize, usize)>>,
    finished: Mutex<Option<(usize, usize)>>,
}

impl FillProgressCallback for StageRecorder {
    fn on_stage_start(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, _text_len: usize) {
        self.pages.lock().unwrap().push((page_num, total_pages));
    }

    fn on_run_complete(&self, placeholders: usize, occurrences: usize) {
        *self.finished.lock().unwrap() = Some((placeholders, occurrences));
    }
}

// ── Full run over page images ────────────────────────────────────────────────

#[tokio::test]
async fn test_run_on_images_fills_template() {
    init_tracing();
    let assistant = Arc::new(ScriptedAssistant::new(
        &["Claimant: Jane Doe\nBorn 3 Feb 1980", "Policy number PN-42"],
        "```json\n{\"CLIENT_NAME\": \"Jane Doe\", \"DOB\": \"1980-02-03\", \"POLICY\": \"PN-42\"}\n```",
    ));
    let mut session = Session::new(config_with(Arc::clone(&assistant)));
    let mut template = Cursor::new(docx(LETTER));

    let output = session
        .run_on_images(&mut template, page_images(2))
        .await
        .expect("run should succeed");

    let xml = part(&output.document, "word/document.xml");
    assert!(xml.contains("<w:t>Name: Jane Doe</w:t>"), "{xml}");
    assert!(xml.contains("<w:t>DOB: 1980-02-03</w:t>"), "{xml}");
    assert!(
        xml.contains("<w:rPr><w:b/></w:rPr><w:t>Policy PN-42</w:t>"),
        "{xml}"
    );

    assert_eq!(output.placeholders, vec!["CLIENT_NAME", "DOB", "POLICY"]);
    assert_eq!(output.stats.pages, 2);
    assert_eq!(output.stats.mapped, 3);
    assert_eq!(output.stats.occurrences, 3);
    assert_eq!(output.stats.multi_run_occurrences, 1);
    assert_eq!(output.stats.total_input_tokens, 2 * 100 + 500);
    assert_eq!(output.stats.total_output_tokens, 2 * 10 + 50);

    assert_eq!(assistant.ocr_calls.load(Ordering::SeqCst), 2);
    assert_eq!(assistant.mapping_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *assistant.seen_placeholders.lock().unwrap(),
        vec!["CLIENT_NAME", "DOB", "POLICY"]
    );
    assert_eq!(
        *assistant.seen_corpus.lock().unwrap(),
        "--- Page 1 ---\nClaimant: Jane Doe\nBorn 3 Feb 1980\n\n--- Page 2 ---\nPolicy number PN-42"
    );
    assert_eq!(session.artifacts().document.as_deref(), Some(&output.document[..]));
}

#[tokio::test]
async fn test_blank_pages_are_left_out_of_the_corpus() {
    let assistant = Arc::new(ScriptedAssistant::new(
        &["first", "   ", "third"],
        r#"{"CLIENT_NAME": "a", "DOB": "b", "POLICY": "c"}"#,
    ));
    let mut session = Session::new(config_with(Arc::clone(&assistant)));
    let mut template = Cursor::new(docx(LETTER));

    let output = session
        .run_on_images(&mut template, page_images(3))
        .await
        .unwrap();

    assert_eq!(output.pages.len(), 3);
    assert_eq!(output.corpus, "--- Page 1 ---\nfirst\n\n--- Page 3 ---\nthird");
}

#[tokio::test]
async fn test_mapping_without_some_keys_fills_empty() {
    let assistant = Arc::new(ScriptedAssistant::new(
        &["text"],
        r#"{"{{CLIENT_NAME}}": "Jane", "UNKNOWN": "dropped"}"#,
    ));
    let mut session = Session::new(config_with(assistant));
    let mut template = Cursor::new(docx(LETTER));

    let output = session
        .run_on_images(&mut template, page_images(1))
        .await
        .unwrap();

    assert_eq!(output.mapping.get("CLIENT_NAME"), Some("Jane"));
    assert_eq!(output.mapping.get("DOB"), Some(""));
    assert_eq!(output.mapping.get("UNKNOWN"), None);
    assert_eq!(output.stats.mapped, 1);

    let xml = part(&output.document, "word/document.xml");
    assert!(xml.contains("<w:t>DOB: </w:t>") || xml.contains(r#"<w:t xml:space="preserve">DOB: </w:t>"#));
}

#[tokio::test]
async fn test_progress_events_follow_stage_order() {
    let recorder = Arc::new(StageRecorder::default());
    let assistant = Arc::new(ScriptedAssistant::new(
        &["a", "b"],
        r#"{"CLIENT_NAME": "x", "DOB": "y", "POLICY": "z"}"#,
    ));
    let config = FillConfig::builder()
        .assistant(assistant as Arc<dyn ReportAssistant>)
        .progress_callback(Arc::clone(&recorder) as Arc<dyn FillProgressCallback>)
        .build()
        .unwrap();
    let mut session = Session::new(config);

    session
        .run_on_images(&mut Cursor::new(docx(LETTER)), page_images(2))
        .await
        .unwrap();

    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![Stage::Scan, Stage::Ocr, Stage::Mapping, Stage::Fill]
    );
    assert_eq!(*recorder.pages.lock().unwrap(), vec![(1, 2), (2, 2)]);
    assert_eq!(*recorder.finished.lock().unwrap(), Some((3, 3)));
}

// ── Failures keep partial artifacts ──────────────────────────────────────────

#[tokio::test]
async fn test_malformed_mapping_keeps_corpus() {
    init_tracing();
    let assistant = Arc::new(ScriptedAssistant::new(
        &["page one", "page two"],
        "I could not find any of these fields.",
    ));
    let mut session = Session::new(config_with(assistant));
    let mut template = Cursor::new(docx(LETTER));

    let err = session
        .run_on_images(&mut template, page_images(2))
        .await
        .unwrap_err();

    assert!(matches!(err, DocFillError::MalformedMapping { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::ExternalService);

    let artifacts = session.artifacts();
    assert_eq!(artifacts.pages.len(), 2);
    assert!(artifacts.corpus.as_deref().unwrap().contains("page two"));
    assert!(artifacts.mapping.is_none());
    assert!(artifacts.document.is_none());
}

#[tokio::test]
async fn test_ocr_failure_stops_the_run() {
    let mut scripted = ScriptedAssistant::new(&["ok", "never"], "{}");
    scripted.failing_page = Some(2);
    let assistant = Arc::new(scripted);
    let mut session = Session::new(config_with(Arc::clone(&assistant)));

    let err = session
        .run_on_images(&mut Cursor::new(docx(LETTER)), page_images(3))
        .await
        .unwrap_err();

    match err {
        DocFillError::OcrFailed { page, attempts, .. } => {
            assert_eq!(page, 2);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected OcrFailed, got {other:?}"),
    }
    assert_eq!(assistant.ocr_calls.load(Ordering::SeqCst), 2);
    assert_eq!(assistant.mapping_calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.artifacts().pages.len(), 1);
    assert!(session.artifacts().corpus.is_none());
    assert_eq!(
        session.artifacts().corpus_so_far().as_deref(),
        Some("--- Page 1 ---\nok")
    );
}

#[tokio::test]
async fn test_mapping_is_retried_when_configured() {
    let scripted = ScriptedAssistant::new(&["text"], r#"{"CLIENT_NAME": "a", "DOB": "b", "POLICY": "c"}"#);
    scripted.mapping_failures.store(2, Ordering::SeqCst);
    let assistant = Arc::new(scripted);
    let config = FillConfig::builder()
        .assistant(Arc::clone(&assistant) as Arc<dyn ReportAssistant>)
        .max_retries(2)
        .retry_backoff_ms(0)
        .build()
        .unwrap();
    let mut session = Session::new(config);

    session
        .run_on_images(&mut Cursor::new(docx(LETTER)), page_images(1))
        .await
        .expect("third attempt should succeed");

    assert_eq!(assistant.mapping_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_mapping_failure_without_retries() {
    let scripted = ScriptedAssistant::new(&["text"], "{}");
    scripted.mapping_failures.store(1, Ordering::SeqCst);
    let mut session = Session::new(config_with(Arc::new(scripted)));

    let err = session
        .run_on_images(&mut Cursor::new(docx(LETTER)), page_images(1))
        .await
        .unwrap_err();

    assert!(matches!(err, DocFillError::MappingFailed { attempts: 1, .. }), "{err}");
    assert!(session.artifacts().corpus.is_some());
}

#[tokio::test]
async fn test_template_without_placeholders_fails_before_ocr() {
    let assistant = Arc::new(ScriptedAssistant::new(&["text"], "{}"));
    let mut session = Session::new(config_with(Arc::clone(&assistant)));

    let err = session
        .run_on_images(&mut Cursor::new(docx(&para("{{UNCLOSED"))), page_images(1))
        .await
        .unwrap_err();

    assert!(matches!(err, DocFillError::NoPlaceholders { .. }), "{err}");
    assert_eq!(assistant.ocr_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_images_is_an_error() {
    let assistant = Arc::new(ScriptedAssistant::new(&[], "{}"));
    let mut session = Session::new(config_with(assistant));

    let err = session
        .run_on_images(&mut Cursor::new(docx(LETTER)), Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DocFillError::NoPagesConverted { .. }));
}

#[tokio::test]
async fn test_value_reintroducing_a_placeholder_fails_verification() {
    let assistant = Arc::new(ScriptedAssistant::new(
        &["text"],
        r#"{"CLIENT_NAME": "{{DOB}}", "DOB": "1980", "POLICY": "p"}"#,
    ));
    let mut session = Session::new(config_with(assistant));

    let err = session
        .run_on_images(&mut Cursor::new(docx(LETTER)), page_images(1))
        .await
        .unwrap_err();

    match err {
        DocFillError::PlaceholdersRemain { names } => assert_eq!(names, vec!["DOB"]),
        other => panic!("expected PlaceholdersRemain, got {other:?}"),
    }
    assert!(session.artifacts().mapping.is_some());
}

#[tokio::test]
async fn test_verification_can_be_disabled() {
    let assistant = Arc::new(ScriptedAssistant::new(
        &["text"],
        r#"{"CLIENT_NAME": "{{DOB}}", "DOB": "1980", "POLICY": "p"}"#,
    ));
    let config = FillConfig::builder()
        .assistant(assistant as Arc<dyn ReportAssistant>)
        .verify_output(false)
        .build()
        .unwrap();
    let mut session = Session::new(config);

    let output = session
        .run_on_images(&mut Cursor::new(docx(LETTER)), page_images(1))
        .await
        .unwrap();

    assert!(part(&output.document, "word/document.xml").contains("Name: {{DOB}}"));
}

// ── Session reuse ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_run_starts_from_clean_artifacts() {
    let assistant = Arc::new(ScriptedAssistant::new(
        &["one", "two", "three"],
        r#"{"CLIENT_NAME": "a", "DOB": "b", "POLICY": "c"}"#,
    ));
    let mut session = Session::new(config_with(Arc::clone(&assistant)));
    let mut template = Cursor::new(docx(LETTER));

    session
        .run_on_images(&mut template, page_images(3))
        .await
        .unwrap();
    assert_eq!(session.artifacts().pages.len(), 3);

    // Same reader again: the template is rewound before it is read.
    session
        .run_on_images(&mut template, page_images(1))
        .await
        .unwrap();
    assert_eq!(session.artifacts().pages.len(), 1);
    assert_eq!(session.artifacts().stats.pages, 1);

    session.reset();
    assert!(session.artifacts().document.is_none());
    assert!(session.artifacts().pages.is_empty());
}

// ── Fill without AI ──────────────────────────────────────────────────────────

#[test]
fn test_session_fill_with_mapping_needs_no_assistant() {
    let mut session = Session::new(FillConfig::default());
    let mapping: Mapping = [("CLIENT_NAME", "Jane"), ("DOB", "1980"), ("POLICY", "P1")]
        .into_iter()
        .collect();

    let output = session
        .fill_with_mapping(&mut Cursor::new(docx(LETTER)), mapping)
        .unwrap();

    assert!(part(&output.document, "word/document.xml").contains("<w:t>Name: Jane</w:t>"));
    assert!(output.pages.is_empty());
    assert_eq!(output.stats.mapped, 3);
}

#[test]
fn test_supplied_mapping_keys_are_matched_to_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let mapping_path = dir.path().join("values.json");
    std::fs::write(
        &mapping_path,
        r#"{"{{CLIENT_NAME}}": "Jane", " DOB ": "1990", "POLICY": "P1", "UNUSED": "x"}"#,
    )
    .unwrap();

    let mapping = Mapping::from_json_file(&mapping_path).unwrap();
    let mut session = Session::new(FillConfig::default());
    let output = session
        .fill_with_mapping(&mut Cursor::new(docx(LETTER)), mapping)
        .unwrap();

    let xml = part(&output.document, "word/document.xml");
    assert!(xml.contains("<w:t>Name: Jane</w:t>"), "{xml}");
    assert!(xml.contains("<w:t>DOB: 1990</w:t>"), "{xml}");
    assert!(output.report.missing.is_empty());
    assert_eq!(output.mapping.get("UNUSED"), None);
    assert_eq!(output.stats.mapped, 3);
}

#[test]
fn test_file_helpers_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("letter.docx");
    let mapping_path = dir.path().join("values.json");
    let output_path = dir.path().join("out/filled.docx");

    std::fs::write(&template_path, docx(LETTER)).unwrap();
    std::fs::write(
        &mapping_path,
        r#"{"CLIENT_NAME": "Jane", "DOB": 1980, "POLICY": true}"#,
    )
    .unwrap();

    let found = scan_template(&template_path, &Default::default()).unwrap();
    assert_eq!(found.len(), 3);

    let mapping = Mapping::from_json_file(&mapping_path).unwrap();
    let output = fill_with_mapping(&template_path, mapping, &FillConfig::default()).unwrap();
    tokio_test::block_on(write_atomic(&output_path, &output.document)).unwrap();

    let written = std::fs::read(&output_path).unwrap();
    assert_eq!(written, output.document);
    assert!(!output_path.with_extension("docx.tmp").exists());
    assert!(part(&written, "word/document.xml").contains("<w:t>DOB: 1980</w:t>"));
}

#[test]
fn test_fill_with_mapping_missing_template() {
    let err = fill_with_mapping(
        "/definitely/not/here.docx",
        Mapping::new(),
        &FillConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(err, DocFillError::TemplateNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::Input);
}
