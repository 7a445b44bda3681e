//! Unit tests for the conversion orchestration state machine.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::*;
use crate::config::OutputFormat;
use crate::domain::payload::MISSING_TRANSACTIONS_MESSAGE;
use crate::domain::ports::{
    FetchRequest, FixtureDownloadSink, FixtureIdentity, FixtureIdentityProvider,
    FixtureUploadedFile, HttpFetchError, WireResponse,
};
use url::Url;

/// Fetch stub with scripted conversion responses and request counters.
#[derive(Default)]
struct ScriptedFetch {
    scripted: Mutex<VecDeque<Result<WireResponse, HttpFetchError>>>,
    dispatches: Mutex<Vec<ConvertDispatch>>,
    get_calls: AtomicUsize,
    post_calls: AtomicUsize,
    entered: Option<Arc<Notify>>,
    release: Option<Arc<Notify>>,
}

impl ScriptedFetch {
    fn scripted(responses: Vec<Result<WireResponse, HttpFetchError>>) -> Self {
        Self {
            scripted: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    fn blocking(
        responses: Vec<Result<WireResponse, HttpFetchError>>,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    ) -> Self {
        Self {
            entered: Some(entered),
            release: Some(release),
            ..Self::scripted(responses)
        }
    }

    fn requests_issued(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst) + self.post_calls.load(Ordering::SeqCst)
    }

    fn dispatches(&self) -> Vec<ConvertDispatch> {
        self.dispatches.lock().expect("dispatch mutex").clone()
    }
}

#[async_trait]
impl HttpFetch for ScriptedFetch {
    async fn get(&self, _request: &FetchRequest) -> Result<WireResponse, HttpFetchError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(wire_response(404, b"404 page not found"))
    }

    async fn post_convert(
        &self,
        dispatch: &ConvertDispatch,
    ) -> Result<WireResponse, HttpFetchError> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        self.dispatches
            .lock()
            .expect("dispatch mutex")
            .push(dispatch.clone());
        if let Some(entered) = &self.entered {
            entered.notify_one();
        }
        if let Some(release) = &self.release {
            release.notified().await;
        }
        self.scripted
            .lock()
            .expect("script mutex")
            .pop_front()
            .unwrap_or_else(|| {
                Err(HttpFetchError::transport("fetch script exhausted unexpectedly"))
            })
    }
}

fn wire_response(status: u16, body: &[u8]) -> WireResponse {
    WireResponse {
        url: "https://api.example.test/v1/transactions/convert".to_owned(),
        status,
        content_type: None,
        content_disposition: None,
        request_id: None,
        body: body.to_vec(),
    }
}

fn json_config() -> ConvertServiceConfig {
    ConvertServiceConfig::new(
        Url::parse("https://api.example.test").expect("base url"),
        TransportMode::Json {
            path: "/v1/transactions/convert".to_owned(),
        },
    )
    .expect("valid config")
}

struct Harness {
    provider: FixtureIdentityProvider,
    fetch: Arc<ScriptedFetch>,
    sink: Arc<FixtureDownloadSink>,
    orchestrator: ConversionOrchestrator,
}

fn harness(fetch: ScriptedFetch, config: ConvertServiceConfig) -> Harness {
    let provider = FixtureIdentityProvider::new();
    let fetch = Arc::new(fetch);
    let sink = Arc::new(FixtureDownloadSink::new());
    let orchestrator = ConversionOrchestrator::new(
        OrchestratorPorts::new(
            Arc::new(provider.clone()),
            Arc::clone(&fetch) as Arc<dyn HttpFetch>,
            Arc::clone(&sink) as Arc<dyn DownloadSink>,
        ),
        config,
    );
    Harness {
        provider,
        fetch,
        sink,
        orchestrator,
    }
}

fn sign_in(harness: &Harness) {
    harness
        .provider
        .emit(Some(Arc::new(FixtureIdentity::new("a@b.c", "token-1"))));
}

fn upload(contents: &str) -> Arc<dyn UploadedFile> {
    Arc::new(FixtureUploadedFile::new("statement.json", contents))
}

#[tokio::test]
async fn signed_out_attempt_fails_fast_with_zero_requests() {
    let h = harness(ScriptedFetch::default(), json_config());

    let error = h
        .orchestrator
        .attempt_conversion(Some(upload("[1]")), "", "")
        .await
        .expect_err("must fail fast");

    assert_eq!(error, ConvertError::not_signed_in());
    assert_eq!(h.fetch.requests_issued(), 0);
    assert_eq!(h.orchestrator.state(), ConversionState::SignedOut);
}

#[tokio::test]
async fn missing_selection_fails_fast_with_zero_requests() {
    let h = harness(ScriptedFetch::default(), json_config());
    sign_in(&h);

    let error = h
        .orchestrator
        .attempt_conversion(None, "", "")
        .await
        .expect_err("must fail fast");

    assert_eq!(error, ConvertError::no_file_selected());
    assert_eq!(h.fetch.requests_issued(), 0);
}

#[tokio::test]
async fn successful_attempt_downloads_under_the_default_filename() {
    let csv = b"date,amount\n2026-01-02,10\n";
    let h = harness(
        ScriptedFetch::scripted(vec![Ok(wire_response(200, csv))]),
        json_config(),
    );
    sign_in(&h);
    let file = upload(r#"{"transactions": [{"amount": 10}]}"#);
    h.orchestrator.select_file(Arc::clone(&file));

    let receipt = h
        .orchestrator
        .attempt_conversion(Some(file), "", "")
        .await
        .expect("conversion succeeds");

    assert_eq!(receipt.filename, "ledgerlift.csv");
    assert_eq!(receipt.byte_count, csv.len());
    let saved = h.sink.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].filename, "ledgerlift.csv");
    assert_eq!(saved[0].bytes, csv.to_vec(), "bytes pass through unchanged");
    assert_eq!(h.orchestrator.state(), ConversionState::SignedInFileSelected);
}

#[tokio::test]
async fn json_tier_posts_the_normalised_body_with_the_bearer_token() {
    let h = harness(
        ScriptedFetch::scripted(vec![Ok(wire_response(200, b"ok"))]),
        json_config(),
    );
    sign_in(&h);

    h.orchestrator
        .attempt_conversion(Some(upload(r#"[{"amount": 10}]"#)), " plaid ", "chase")
        .await
        .expect("conversion succeeds");

    let dispatches = h.fetch.dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].bearer, "token-1");
    assert_eq!(
        dispatches[0].url,
        "https://api.example.test/v1/transactions/convert"
    );
    let ConvertPayload::Json { body } = &dispatches[0].payload else {
        panic!("json tier must post a json payload");
    };
    assert_eq!(body.aggregator_code, "plaid");
    assert_eq!(body.institution_code, "chase");
    assert_eq!(body.transactions.len(), 1);
}

#[tokio::test]
async fn multipart_tier_uploads_raw_bytes_and_clamps_insights() {
    let config = ConvertServiceConfig::new(
        Url::parse("https://api.example.test").expect("base url"),
        TransportMode::Multipart {
            output: OutputFormat::Quickbooks,
            insights: true,
        },
    )
    .expect("valid config");
    let h = harness(
        ScriptedFetch::scripted(vec![Ok(wire_response(200, b"zip-bytes"))]),
        config,
    );
    sign_in(&h);
    let raw = r#"{"transactions": [{"amount": 10}]}"#;

    let receipt = h
        .orchestrator
        .attempt_conversion(Some(upload(raw)), "", "")
        .await
        .expect("conversion succeeds");

    assert_eq!(receipt.filename, "ledgerlift_quickbooks.zip");
    let dispatches = h.fetch.dispatches();
    let ConvertPayload::Multipart {
        file_name,
        file_bytes,
        output,
        insights,
        ..
    } = &dispatches[0].payload
    else {
        panic!("multipart tier must post a form payload");
    };
    assert_eq!(file_name, "statement.json");
    assert_eq!(file_bytes, raw.as_bytes(), "upload is the raw file text");
    assert_eq!(*output, OutputFormat::Quickbooks);
    assert!(!insights, "insights do not exist for quickbooks output");
}

#[tokio::test]
async fn unparseable_upload_propagates_verbatim_without_a_request() {
    let h = harness(ScriptedFetch::default(), json_config());
    sign_in(&h);

    let error = h
        .orchestrator
        .attempt_conversion(Some(upload("not json")), "", "")
        .await
        .expect_err("parse must fail");

    assert_eq!(error, ConvertError::parse("File is not valid JSON."));
    assert_eq!(h.fetch.requests_issued(), 0);
}

#[tokio::test]
async fn shapeless_upload_propagates_the_contract_message() {
    let h = harness(ScriptedFetch::default(), json_config());
    sign_in(&h);

    let error = h
        .orchestrator
        .attempt_conversion(Some(upload(r#"{"foo": 1}"#)), "", "")
        .await
        .expect_err("shape must fail");

    assert_eq!(error, ConvertError::shape(MISSING_TRANSACTIONS_MESSAGE));
}

#[tokio::test]
async fn unreadable_selection_maps_to_file_read_error() {
    struct UnreadableFile;

    #[async_trait]
    impl UploadedFile for UnreadableFile {
        fn name(&self) -> String {
            "statement.json".to_owned()
        }

        async fn read_text(
            &self,
        ) -> Result<String, crate::domain::ports::UploadedFileError> {
            Err(crate::domain::ports::UploadedFileError::unreadable(
                "backing file disappeared",
            ))
        }
    }

    let h = harness(ScriptedFetch::default(), json_config());
    sign_in(&h);

    let error = h
        .orchestrator
        .attempt_conversion(Some(Arc::new(UnreadableFile)), "", "")
        .await
        .expect_err("read must fail");

    assert!(matches!(error, ConvertError::FileRead { .. }));
    assert_eq!(h.fetch.requests_issued(), 0);
    assert_eq!(h.orchestrator.state(), ConversionState::SignedInNoFile);
}

struct ExpiredTokenIdentity;

#[async_trait]
impl Identity for ExpiredTokenIdentity {
    fn email(&self) -> String {
        "a@b.c".to_owned()
    }

    async fn bearer_token(
        &self,
        _force_refresh: bool,
    ) -> Result<String, IdentityProviderError> {
        Err(IdentityProviderError::token_refresh("refresh token revoked"))
    }
}

#[tokio::test]
async fn token_failure_maps_to_auth_token_error() {
    let h = harness(ScriptedFetch::default(), json_config());
    h.provider.emit(Some(Arc::new(ExpiredTokenIdentity)));

    let error = h
        .orchestrator
        .attempt_conversion(Some(upload("[1]")), "", "")
        .await
        .expect_err("token fetch must fail");

    assert!(matches!(error, ConvertError::AuthToken { .. }));
    assert_eq!(h.fetch.requests_issued(), 0, "no request without a token");
}

#[tokio::test]
async fn transport_failure_maps_to_network_error() {
    let h = harness(
        ScriptedFetch::scripted(vec![Err(HttpFetchError::transport("connection reset"))]),
        json_config(),
    );
    sign_in(&h);

    let error = h
        .orchestrator
        .attempt_conversion(Some(upload("[1]")), "", "")
        .await
        .expect_err("transport must fail");

    assert!(matches!(error, ConvertError::Network { .. }));
}

#[tokio::test]
async fn remote_failure_surfaces_message_and_request_id_unchanged() {
    let h = harness(
        ScriptedFetch::scripted(vec![Ok(WireResponse {
            content_type: Some("application/json".to_owned()),
            request_id: Some("req-42".to_owned()),
            body: br#"{"error": {"message": "unsupported aggregator", "request_id": "body-id"}}"#
                .to_vec(),
            ..wire_response(422, b"")
        })]),
        json_config(),
    );
    sign_in(&h);
    let file = upload("[1]");
    h.orchestrator.select_file(Arc::clone(&file));

    let error = h
        .orchestrator
        .attempt_conversion(Some(file), "", "")
        .await
        .expect_err("remote failure");

    assert_eq!(
        error,
        ConvertError::remote(422_u16, "unsupported aggregator", "req-42")
    );
    assert_eq!(error.request_id(), Some("req-42"));
    assert_eq!(
        h.orchestrator.state(),
        ConversionState::SignedInFileSelected,
        "failed attempts return to the pre-busy state",
    );
}

#[tokio::test]
async fn payment_required_is_a_redirect_not_an_inline_message() {
    let h = harness(
        ScriptedFetch::scripted(vec![Ok(wire_response(402, b"upgrade your plan"))]),
        json_config(),
    );
    sign_in(&h);

    let error = h
        .orchestrator
        .attempt_conversion(Some(upload("[1]")), "", "")
        .await
        .expect_err("authorization failure");

    assert!(matches!(error, ConvertError::Authorization { status: 402, .. }));
    assert!(error.requires_redirect());
}

#[tokio::test]
async fn missing_route_reports_the_attempted_url() {
    let h = harness(
        ScriptedFetch::scripted(vec![Ok(wire_response(404, b"404 page not found"))]),
        json_config(),
    );
    sign_in(&h);

    let error = h
        .orchestrator
        .attempt_conversion(Some(upload("[1]")), "", "")
        .await
        .expect_err("endpoint not found");

    let ConvertError::EndpointNotFound { url, message, .. } = &error else {
        panic!("expected endpoint-not-found, got {error:?}");
    };
    assert_eq!(url, "https://api.example.test/v1/transactions/convert");
    assert!(message.contains("404 page not found"));
    assert!(message.contains("URL: https://api.example.test/v1/transactions/convert"));
}

#[tokio::test]
async fn busy_excludes_a_second_attempt_structurally() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let h = harness(
        ScriptedFetch::blocking(
            vec![Ok(wire_response(200, b"ok"))],
            Arc::clone(&entered),
            Arc::clone(&release),
        ),
        json_config(),
    );
    sign_in(&h);
    let file = upload("[1]");
    h.orchestrator.select_file(Arc::clone(&file));

    let orchestrator = Arc::new(h.orchestrator);
    let background = Arc::clone(&orchestrator);
    let first_file = Arc::clone(&file);
    let first = tokio::spawn(async move {
        background
            .attempt_conversion(Some(first_file), "", "")
            .await
    });

    entered.notified().await;
    assert_eq!(orchestrator.state(), ConversionState::Busy);
    assert!(!orchestrator.convert_enabled());

    let second = orchestrator
        .attempt_conversion(Some(file), "", "")
        .await
        .expect_err("second attempt must be rejected");
    assert_eq!(second, ConvertError::attempt_in_flight());

    release.notify_one();
    first
        .await
        .expect("first attempt task")
        .expect("first attempt succeeds");
    assert_eq!(orchestrator.state(), ConversionState::SignedInFileSelected);
}

#[tokio::test]
async fn sign_out_mid_flight_still_delivers_and_reconciles_to_signed_out() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let h = harness(
        ScriptedFetch::blocking(
            vec![Ok(wire_response(200, b"ok"))],
            Arc::clone(&entered),
            Arc::clone(&release),
        ),
        json_config(),
    );
    sign_in(&h);
    let file = upload("[1]");
    h.orchestrator.select_file(Arc::clone(&file));

    let orchestrator = Arc::new(h.orchestrator);
    let background = Arc::clone(&orchestrator);
    let first = tokio::spawn(async move { background.attempt_conversion(Some(file), "", "").await });

    entered.notified().await;
    h.provider.emit(None);
    assert_eq!(
        orchestrator.state(),
        ConversionState::Busy,
        "an in-flight attempt is not cancelled by sign-out",
    );

    release.notify_one();
    let receipt = first
        .await
        .expect("attempt task")
        .expect("attempt still delivers its outcome");
    assert_eq!(receipt.filename, "ledgerlift.csv");
    assert_eq!(orchestrator.state(), ConversionState::SignedOut);
}

#[tokio::test]
async fn state_follows_identity_and_selection_events() {
    let h = harness(ScriptedFetch::default(), json_config());
    let mut states = h.orchestrator.watch_state();
    assert_eq!(h.orchestrator.state(), ConversionState::SignedOut);

    sign_in(&h);
    assert_eq!(h.orchestrator.state(), ConversionState::SignedInNoFile);
    assert!(!h.orchestrator.convert_enabled());

    h.orchestrator.select_file(upload("[1]"));
    assert_eq!(h.orchestrator.state(), ConversionState::SignedInFileSelected);
    assert!(h.orchestrator.convert_enabled());

    h.orchestrator.clear_file();
    assert_eq!(h.orchestrator.state(), ConversionState::SignedInNoFile);

    h.provider.emit(None);
    assert_eq!(h.orchestrator.state(), ConversionState::SignedOut);

    assert!(
        states.has_changed().expect("sender alive"),
        "transitions are published to subscribers",
    );
    states.borrow_and_update();
}

#[tokio::test]
async fn download_sink_failure_maps_to_the_download_variant() {
    struct RefusingSink;

    #[async_trait]
    impl DownloadSink for RefusingSink {
        async fn save(
            &self,
            _filename: &str,
            _bytes: &[u8],
        ) -> Result<(), crate::domain::ports::DownloadSinkError> {
            Err(crate::domain::ports::DownloadSinkError::rejected("disk full"))
        }
    }

    let provider = FixtureIdentityProvider::new();
    let orchestrator = ConversionOrchestrator::new(
        OrchestratorPorts::new(
            Arc::new(provider.clone()),
            Arc::new(ScriptedFetch::scripted(vec![Ok(wire_response(200, b"ok"))])),
            Arc::new(RefusingSink),
        ),
        json_config(),
    );
    provider.emit(Some(Arc::new(FixtureIdentity::new("a@b.c", "t"))));

    let error = orchestrator
        .attempt_conversion(Some(upload("[1]")), "", "")
        .await
        .expect_err("sink failure");

    assert!(matches!(error, ConvertError::Download { .. }));
}

#[tokio::test]
async fn routing_refresh_degrades_to_empty_kinds_when_probes_miss() {
    let h = harness(ScriptedFetch::default(), json_config());
    sign_in(&h);

    let catalogue = h.orchestrator.refresh_routing_catalog().await;

    assert_eq!(catalogue.get(&RoutingKind::Aggregators), Some(&Vec::new()));
    assert_eq!(catalogue.get(&RoutingKind::Institutions), Some(&Vec::new()));
    assert_eq!(
        h.fetch.get_calls.load(Ordering::SeqCst),
        6,
        "every default candidate is probed when none succeeds",
    );
}
