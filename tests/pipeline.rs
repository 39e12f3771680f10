//! Integration tests for the extraction pipeline.
//!
//! The model is replaced either by an in-process [`ModelInvoker`] or by a
//! one-shot local HTTP server that answers like the Gemini API. No network
//! access or API key is needed.
//!
//! PDF tests build their documents in memory but need libpdfium; they are
//! gated behind the `PDFIUM_TESTS` environment variable:
//!   PDFIUM_TESTS=1 PDFIUM_LIB_PATH=/path/to/lib cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use rfp_extract::{
    extract_document_text, render_prompt, DocumentKind, ExtractionConfig, ExtractionConfigBuilder,
    ExtractionProgressCallback,
    Extractor, ModelBackend, ModelInvoker, ModelResponse, Prompt, RfpError, SourceDocument,
    DOWNLOAD_FILE_NAME, RFP_FIELDS,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Answers every prompt with a fixed string and remembers the prompts.
struct ScriptedModel {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    fn name(&self) -> String {
        "scripted".into()
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<ModelResponse, RfpError> {
        self.prompts.lock().unwrap().push(prompt.as_str().to_string());
        Ok(ModelResponse::from(self.answer.as_str()))
    }
}

/// Records every progress event as a line of text.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("failure: ").map(str::to_string))
            .collect()
    }
}

impl ExtractionProgressCallback for Recorder {
    fn on_extraction_start(&self, name: &str, kind: DocumentKind) {
        self.events.lock().unwrap().push(format!("start: {name} {kind}"));
    }

    fn on_text_extracted(&self, text_chars: usize, _page_count: Option<usize>) {
        self.events.lock().unwrap().push(format!("text: {text_chars}"));
    }

    fn on_failure(&self, message: &str) {
        self.events.lock().unwrap().push(format!("failure: {message}"));
    }

    fn on_extraction_complete(&self, field_count: usize) {
        self.events.lock().unwrap().push(format!("complete: {field_count}"));
    }
}

fn extractor_with(model: Arc<ScriptedModel>, recorder: Arc<Recorder>) -> Extractor {
    let config = ExtractionConfig::builder()
        .invoker(model as Arc<dyn ModelInvoker>)
        .progress_callback(recorder as Arc<dyn ExtractionProgressCallback>)
        .build()
        .unwrap();
    Extractor::new(config).unwrap()
}

fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// A subscriber writing every event, DEBUG and up, into this buffer.
    fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let buf = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || buf.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

const SAMPLE_HTML: &str = "<html><body><p>Bid Number: 123</p></body></html>";

// ── HTML documents ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_html_document_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "sample.html", SAMPLE_HTML);

    let model = ScriptedModel::new(r#"{"Bid Number": "123"}"#);
    let recorder = Arc::new(Recorder::default());
    let extractor = extractor_with(model.clone(), recorder.clone());

    let result = extractor.process_path(&path).await.unwrap().expect("a result");
    assert_eq!(result.get_str("Bid Number"), Some("123"));
    assert_eq!(result.len(), 1);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Bid Number: 123"));
    assert!(!prompts[0].contains("<p>"));
    for field in RFP_FIELDS {
        assert!(prompts[0].contains(field), "prompt lacks field {field}");
    }

    assert_eq!(
        recorder.events(),
        vec![
            "start: sample.html html".to_string(),
            "text: 15".to_string(),
            "complete: 1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_full_answer_reaches_download_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "sample.html",
        "<html><body>Bid Number: 123</body></html>",
    );

    let mut answer = serde_json::Map::new();
    for field in RFP_FIELDS {
        answer.insert(field.to_string(), serde_json::Value::String(String::new()));
    }
    answer.insert("Bid Number".into(), "123".into());
    let model = ScriptedModel::new(&serde_json::Value::Object(answer).to_string());
    let extractor = extractor_with(model.clone(), Arc::new(Recorder::default()));

    let text = extract_document_text(&path, extractor.config()).await.unwrap();
    assert_eq!(text.as_str(), "Bid Number: 123");

    let result = extractor.process_path(&path).await.unwrap().unwrap();
    assert_eq!(result.len(), RFP_FIELDS.len());
    assert!(result.missing_fields().is_empty());

    let written = result.write_json(dir.path()).unwrap();
    let body = std::fs::read_to_string(written).unwrap();
    assert!(body.contains("\"Bid Number\": \"123\""));
    assert!(body.starts_with("{\n    \"Bid Number\""));
}

#[tokio::test]
async fn test_prose_wrapped_answer_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "road.html",
        "<html><body><h1>Road Repair RFP</h1><p>Due 2024-06-01</p></body></html>",
    );

    let model = ScriptedModel::new("Here is the data: {\"Title\": \"Road Repair RFP\"} Thanks!");
    let extractor = extractor_with(model, Arc::new(Recorder::default()));

    let result = extractor.process_path(&path).await.unwrap().unwrap();
    assert_eq!(result.get_str("Title"), Some("Road Repair RFP"));
    assert_eq!(result.len(), 1);
    assert_eq!(result.missing_fields().len(), RFP_FIELDS.len() - 1);
}

#[tokio::test]
async fn test_unsupported_type_is_reported_without_model_call() {
    let model = ScriptedModel::new(r#"{"Bid Number": "123"}"#);
    let recorder = Arc::new(Recorder::default());
    let extractor = extractor_with(model.clone(), recorder.clone());

    // The path need not exist: the type check comes first.
    let outcome = extractor.process_path("does/not/exist/doc.txt").await.unwrap();
    assert!(outcome.is_none());
    assert!(model.prompts().is_empty());

    let failures = recorder.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("Unsupported file type"));
}

#[tokio::test]
async fn test_answer_without_json_is_reported() {
    let model = ScriptedModel::new("I could not find any RFP details.");
    let recorder = Arc::new(Recorder::default());
    let extractor = extractor_with(model, recorder.clone());

    let outcome = extractor
        .process_upload("sample.html", SAMPLE_HTML.as_bytes().to_vec())
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(
        recorder.failures(),
        vec!["No valid JSON found in the response.".to_string()]
    );
}

#[tokio::test]
async fn test_malformed_answer_is_reported() {
    let model = ScriptedModel::new("{ invalid json");
    let recorder = Arc::new(Recorder::default());
    let extractor = extractor_with(model, recorder.clone());

    let outcome = extractor
        .process_upload("sample.html", SAMPLE_HTML.as_bytes().to_vec())
        .await
        .unwrap();
    assert!(outcome.is_none());

    let failures = recorder.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("Error parsing the response as JSON"), "{}", failures[0]);
}

#[tokio::test]
async fn test_failure_with_callback_is_not_logged_as_error() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let recorder = Arc::new(Recorder::default());
    let extractor = extractor_with(ScriptedModel::new("nothing useful"), recorder.clone());
    let outcome = extractor
        .process_upload("sample.html", SAMPLE_HTML.as_bytes().to_vec())
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(recorder.failures().len(), 1);

    let logs = logs.contents();
    assert!(!logs.contains("ERROR"), "{logs}");
    assert!(logs
        .lines()
        .any(|l| l.contains("DEBUG") && l.contains("No valid JSON found")));
}

#[tokio::test]
async fn test_failure_without_callback_is_logged_as_error() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let config = ExtractionConfig::builder()
        .invoker(ScriptedModel::new("nothing useful") as Arc<dyn ModelInvoker>)
        .build()
        .unwrap();
    let extractor = Extractor::new(config).unwrap();
    let outcome = extractor
        .process_upload("sample.html", SAMPLE_HTML.as_bytes().to_vec())
        .await
        .unwrap();
    assert!(outcome.is_none());

    let logs = logs.contents();
    let errors: Vec<&str> = logs.lines().filter(|l| l.contains("ERROR")).collect();
    assert_eq!(errors.len(), 1, "{logs}");
    assert!(errors[0].contains("No valid JSON found in the response."));
}

#[tokio::test]
async fn test_extract_surfaces_errors() {
    let model = ScriptedModel::new("no braces at all");
    let extractor = extractor_with(model, Arc::new(Recorder::default()));
    let doc = SourceDocument::from_bytes("sample.html", SAMPLE_HTML.as_bytes().to_vec()).unwrap();
    assert!(matches!(
        extractor.extract(doc).await,
        Err(RfpError::NoJsonFound)
    ));
}

#[tokio::test]
async fn test_missing_file_propagates() {
    let extractor = extractor_with(ScriptedModel::new("{}"), Arc::new(Recorder::default()));
    let dir = tempfile::tempdir().unwrap();
    let err = extractor
        .process_path(dir.path().join("gone.html"))
        .await
        .unwrap_err();
    assert!(matches!(err, RfpError::FileNotFound { .. }), "{err:?}");
}

#[tokio::test]
async fn test_empty_object_is_a_result() {
    let extractor = extractor_with(ScriptedModel::new("{}"), Arc::new(Recorder::default()));
    let result = extractor
        .process_upload("empty.HTML", b"<html></html>".to_vec())
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.to_pretty_json(), "{}");
}

#[tokio::test]
async fn test_extract_to_file_writes_download_name() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(
        "```json\n{\"Bid Number\": \"123\", \"Title\": \"Road Repair RFP\"}\n```",
    );
    let extractor = extractor_with(model, Arc::new(Recorder::default()));
    let doc = SourceDocument::from_bytes("sample.html", SAMPLE_HTML.as_bytes().to_vec()).unwrap();

    let (path, stats) = extractor.extract_to_file(doc, dir.path()).await.unwrap();
    assert_eq!(path, dir.path().join(DOWNLOAD_FILE_NAME));
    assert_eq!(stats.fields_extracted, 2);
    assert_eq!(stats.document_kind, Some(DocumentKind::Html));
    assert_eq!(stats.text_chars, 15);
    assert!(stats.prompt_bytes > stats.text_chars);

    let body = std::fs::read_to_string(path).unwrap();
    assert_eq!(
        body,
        "{\n    \"Bid Number\": \"123\",\n    \"Title\": \"Road Repair RFP\"\n}\n"
    );
}

#[tokio::test]
async fn test_concurrent_uploads_are_independent() {
    let model = ScriptedModel::new(r#"{"Title": "same"}"#);
    let extractor = Arc::new(extractor_with(model.clone(), Arc::new(Recorder::default())));

    let a = {
        let ex = extractor.clone();
        tokio::spawn(async move {
            ex.process_upload("bid.html", b"<p>first</p>".to_vec()).await
        })
    };
    let b = {
        let ex = extractor.clone();
        tokio::spawn(async move {
            ex.process_upload("bid.html", b"<p>second</p>".to_vec()).await
        })
    };

    assert!(a.await.unwrap().unwrap().is_some());
    assert!(b.await.unwrap().unwrap().is_some());

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts.iter().any(|p| p.contains("first")));
    assert!(prompts.iter().any(|p| p.contains("second")));
}

// ── Dry-run helpers ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_text_and_prompt_without_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "sample.html", SAMPLE_HTML);
    let config = ExtractionConfig::builder()
        .prompt_template("Fields please:\n{document_text}\nEnd.")
        .build()
        .unwrap();

    let text = extract_document_text(&path, &config).await.unwrap();
    assert_eq!(text.as_str(), "Bid Number: 123");
    assert_eq!(text.kind, DocumentKind::Html);

    let prompt = render_prompt(&path, &config).await.unwrap();
    assert_eq!(prompt.as_str(), "Fields please:\nBid Number: 123\nEnd.");
}

// ── Gemini over HTTP ─────────────────────────────────────────────────────────

/// Serve exactly one HTTP request with `status` and `body`, handing the raw
/// request back through the join handle.
async fn one_shot_server(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }
        let reply = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(reply.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&raw).into_owned()
    });

    (format!("http://{addr}/v1beta"), handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let length = head
        .lines()
        .find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.eq_ignore_ascii_case("content-length")
                .then(|| v.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    body.len() >= length
}

fn gemini_config(endpoint: &str, recorder: Arc<Recorder>) -> ExtractionConfig {
    ExtractionConfig::builder()
        .backend(ModelBackend::Gemini)
        .model("gemini-1.5-flash")
        .api_key("test-key")
        .endpoint(endpoint)
        .request_timeout_secs(10)
        .progress_callback(recorder as Arc<dyn ExtractionProgressCallback>)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_gemini_round_trip() {
    let answer = serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [
                {"text": "```json\n{\"Bid Number\": \"123\","},
                {"text": " \"Due Date\": \"2024-06-01\"}\n```"}
            ]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 812, "candidatesTokenCount": 40},
        "modelVersion": "gemini-1.5-flash-002"
    });
    let (endpoint, server) = one_shot_server("200 OK", answer.to_string()).await;

    let extractor = Extractor::new(gemini_config(&endpoint, Arc::new(Recorder::default()))).unwrap();
    assert_eq!(extractor.model_name(), "gemini/gemini-1.5-flash");

    let doc = SourceDocument::from_bytes("sample.html", SAMPLE_HTML.as_bytes().to_vec()).unwrap();
    let output = extractor.extract(doc).await.unwrap();
    assert_eq!(output.result.get_str("Bid Number"), Some("123"));
    assert_eq!(output.result.get_str("Due Date"), Some("2024-06-01"));
    assert_eq!(output.stats.input_tokens, Some(812));
    assert_eq!(output.stats.output_tokens, Some(40));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /v1beta/models/gemini-1.5-flash:generateContent"));
    assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
    assert!(request.contains("Bid Number: 123"));
}

#[tokio::test]
async fn test_gemini_rejection_propagates() {
    let body = serde_json::json!({
        "error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}
    });
    let (endpoint, server) = one_shot_server("400 Bad Request", body.to_string()).await;

    let recorder = Arc::new(Recorder::default());
    let extractor = Extractor::new(gemini_config(&endpoint, recorder.clone())).unwrap();

    let err = extractor
        .process_upload("sample.html", SAMPLE_HTML.as_bytes().to_vec())
        .await
        .unwrap_err();
    match err {
        RfpError::ModelApi { status, ref detail } => {
            assert_eq!(status, 400);
            assert!(detail.starts_with("API key not valid"));
        }
        other => panic!("expected ModelApi, got {other:?}"),
    }
    // Service failures are not user-reported; the callback saw no failure.
    assert!(recorder.failures().is_empty());
    server.await.unwrap();
}

// ── PDF documents ────────────────────────────────────────────────────────────

/// Build a PDF in memory with one page per entry of `pages`; empty entries
/// become blank pages.
fn build_pdf(pages: &[&str]) -> Vec<u8> {
    use pdfium_render::prelude::*;

    let bindings = match std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from) {
        Some(p) if p.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&p))
        }
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_system_library(),
    }
    .expect("pdfium library");
    let pdfium = Pdfium::new(bindings);

    let mut document = pdfium.create_new_pdf().unwrap();
    let font = document.fonts_mut().helvetica();
    for text in pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .unwrap();
        if !text.is_empty() {
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(72.0),
                    PdfPoints::new(720.0),
                    *text,
                    font,
                    PdfPoints::new(24.0),
                )
                .unwrap();
        }
    }
    let bytes = document.save_to_bytes().unwrap();
    bytes
}

#[tokio::test]
async fn test_pdf_pages_join_in_order() {
    if std::env::var("PDFIUM_TESTS").is_err() {
        println!("SKIP — set PDFIUM_TESTS=1 to run PDF tests");
        return;
    }

    let bytes = build_pdf(&["A", "", "C"]);
    let doc = SourceDocument::from_bytes("three-pages.pdf", bytes).unwrap();
    let text = rfp_extract::extract_text(doc, &ExtractionConfig::from_env())
        .await
        .unwrap();

    assert_eq!(text.kind, DocumentKind::Pdf);
    assert_eq!(text.page_count, Some(3));
    assert_eq!(text.as_str(), "AC");
}

#[tokio::test]
async fn test_pdf_upload_reaches_model() {
    if std::env::var("PDFIUM_TESTS").is_err() {
        println!("SKIP — set PDFIUM_TESTS=1 to run PDF tests");
        return;
    }

    let model = ScriptedModel::new(r#"{"Bid Number": "A"}"#);
    let config = ExtractionConfigBuilder::from_env()
        .invoker(model.clone() as Arc<dyn ModelInvoker>)
        .build()
        .unwrap();
    let extractor = Extractor::new(config).unwrap();

    let result = extractor
        .process_upload("bid.PDF", build_pdf(&["A"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.get_str("Bid Number"), Some("A"));
    assert!(model.prompts()[0].contains('A'));
}

#[tokio::test]
async fn test_corrupt_pdf_is_rejected() {
    if std::env::var("PDFIUM_TESTS").is_err() {
        println!("SKIP — set PDFIUM_TESTS=1 to run PDF tests");
        return;
    }
    let config = ExtractionConfig::from_env();
    let doc = SourceDocument::from_bytes("broken.pdf", b"%PDF-1.7 this is not a pdf".to_vec()).unwrap();
    let err = rfp_extract::extract_text(doc, &config).await.unwrap_err();
    assert!(
        matches!(err, RfpError::CorruptPdf { .. } | RfpError::PdfiumBindingFailed(_)),
        "{err:?}"
    );
}
