//! Top-level conversion state machine.
//!
//! The orchestrator composes the session gate, payload normaliser, endpoint
//! discovery, and response classifier to drive one conversion attempt end to
//! end, and owns the enablement state of the convert action. State is
//! published through a watch channel so presentation layers consume
//! transitions without this crate assuming any rendering technology.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::config::{ConvertServiceConfig, TransportMode};
use crate::domain::classifier::{ConversionOutcome, classify};
use crate::domain::discovery::EndpointDiscovery;
use crate::domain::error::ConvertError;
use crate::domain::payload::{ConvertRequestBody, normalize};
use crate::domain::ports::{
    ConvertDispatch, ConvertPayload, DownloadSink, HttpFetch, Identity, IdentityProvider,
    IdentityProviderError, IdentitySubscription, UploadedFile,
};
use crate::domain::routing::{RoutingCode, RoutingKind};
use crate::domain::session::SessionGate;

/// Request-machine state driven by identity, selection, and attempt events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    /// No identity; the convert action is unavailable.
    SignedOut,
    /// Signed in, no file selected.
    SignedInNoFile,
    /// Signed in with a selection; the convert action is enabled.
    SignedInFileSelected,
    /// A conversion attempt is in flight; the convert action is disabled.
    Busy,
}

/// Summary of a delivered conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReceipt {
    /// Filename the converted bytes were saved under.
    pub filename: String,
    /// Number of bytes delivered.
    pub byte_count: usize,
}

/// Port bundle required by the orchestrator.
pub struct OrchestratorPorts {
    /// External identity provider.
    pub identity_provider: Arc<dyn IdentityProvider>,
    /// HTTP capability for discovery and conversion requests.
    pub fetch: Arc<dyn HttpFetch>,
    /// Save-as-download delivery.
    pub download_sink: Arc<dyn DownloadSink>,
}

impl OrchestratorPorts {
    /// Build a strongly-typed port bundle.
    pub fn new(
        identity_provider: Arc<dyn IdentityProvider>,
        fetch: Arc<dyn HttpFetch>,
        download_sink: Arc<dyn DownloadSink>,
    ) -> Self {
        Self {
            identity_provider,
            fetch,
            download_sink,
        }
    }
}

struct OrchestratorShared {
    state: watch::Sender<ConversionState>,
    selection: Mutex<Option<Arc<dyn UploadedFile>>>,
    busy: AtomicBool,
    signed_in: AtomicBool,
}

impl OrchestratorShared {
    fn recompute(&self) {
        let next = if self.busy.load(Ordering::SeqCst) {
            ConversionState::Busy
        } else if !self.signed_in.load(Ordering::SeqCst) {
            ConversionState::SignedOut
        } else if self
            .selection
            .lock()
            .map(|selection| selection.is_some())
            .unwrap_or(false)
        {
            ConversionState::SignedInFileSelected
        } else {
            ConversionState::SignedInNoFile
        };
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// One-attempt-at-a-time conversion driver.
pub struct ConversionOrchestrator {
    session: SessionGate,
    fetch: Arc<dyn HttpFetch>,
    download_sink: Arc<dyn DownloadSink>,
    discovery: EndpointDiscovery,
    config: ConvertServiceConfig,
    shared: Arc<OrchestratorShared>,
    _identity_subscription: IdentitySubscription,
}

impl ConversionOrchestrator {
    /// Wire the orchestrator to its ports and configuration.
    ///
    /// The session gate subscribes to the provider first, then the
    /// orchestrator's own listener, so state recomputation always observes
    /// the gate's already-updated snapshot.
    #[must_use]
    pub fn new(ports: OrchestratorPorts, config: ConvertServiceConfig) -> Self {
        let session = SessionGate::new(Arc::clone(&ports.identity_provider));
        let shared = Arc::new(OrchestratorShared {
            state: watch::channel(ConversionState::SignedOut).0,
            selection: Mutex::new(None),
            busy: AtomicBool::new(false),
            signed_in: AtomicBool::new(session.current_identity().is_some()),
        });
        let listener_shared = Arc::clone(&shared);
        let identity_subscription =
            ports
                .identity_provider
                .on_identity_changed(Box::new(move |identity| {
                    listener_shared
                        .signed_in
                        .store(identity.is_some(), Ordering::SeqCst);
                    listener_shared.recompute();
                }));
        shared.recompute();

        Self {
            session,
            fetch: Arc::clone(&ports.fetch),
            download_sink: ports.download_sink,
            discovery: EndpointDiscovery::new(ports.fetch),
            config,
            shared,
            _identity_subscription: identity_subscription,
        }
    }

    /// Session gate, for sign-in/out flows and identity subscriptions.
    #[must_use]
    pub fn session(&self) -> &SessionGate {
        &self.session
    }

    /// Current machine state.
    #[must_use]
    pub fn state(&self) -> ConversionState {
        *self.shared.state.borrow()
    }

    /// Subscribe to state transitions; dropping the receiver cancels.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConversionState> {
        self.shared.state.subscribe()
    }

    /// Whether the convert action is currently enabled.
    #[must_use]
    pub fn convert_enabled(&self) -> bool {
        self.state() == ConversionState::SignedInFileSelected
    }

    /// Record a new file selection.
    pub fn select_file(&self, file: Arc<dyn UploadedFile>) {
        if let Ok(mut selection) = self.shared.selection.lock() {
            *selection = Some(file);
        }
        self.shared.recompute();
    }

    /// Clear the file selection.
    pub fn clear_file(&self) {
        if let Ok(mut selection) = self.shared.selection.lock() {
            *selection = None;
        }
        self.shared.recompute();
    }

    /// Drive one conversion attempt end to end.
    ///
    /// Fail-fast checks run before any I/O: a missing identity or selection
    /// never issues a network call. The attempt then reads the upload,
    /// normalises it, fetches a force-refreshed bearer token, posts through
    /// the configured transport, classifies the response, and delivers a
    /// success through the download sink. Nothing is retried; the machine
    /// returns to a non-busy state reflecting the identity and selection
    /// present at completion.
    ///
    /// # Errors
    ///
    /// One [`ConvertError`] per the taxonomy; check
    /// [`ConvertError::requires_redirect`] before rendering inline.
    pub async fn attempt_conversion(
        &self,
        file: Option<Arc<dyn UploadedFile>>,
        aggregator_code: &str,
        institution_code: &str,
    ) -> Result<ConversionReceipt, ConvertError> {
        let identity = self
            .session
            .current_identity()
            .ok_or_else(ConvertError::not_signed_in)?;
        let file = file.ok_or_else(ConvertError::no_file_selected)?;

        if self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConvertError::attempt_in_flight());
        }
        self.shared.recompute();

        let result = self
            .run_attempt(identity, file, aggregator_code, institution_code)
            .await;

        self.shared.busy.store(false, Ordering::SeqCst);
        self.shared.recompute();
        result
    }

    /// Resolve the routing catalogue for selection surfaces.
    ///
    /// Best-effort by design: runs without a token when signed out, and any
    /// failure, including a token fetch failure, degrades to empty lists
    /// so absent routing metadata never blocks conversion. An empty list for
    /// a kind means its selector stays hidden.
    pub async fn refresh_routing_catalog(&self) -> BTreeMap<RoutingKind, Vec<RoutingCode>> {
        let bearer = match self.session.current_identity() {
            Some(identity) => identity.bearer_token(false).await.ok(),
            None => None,
        };
        self.discovery
            .discover(
                self.config.base_url(),
                self.config.discovery_plan(),
                bearer.as_deref(),
            )
            .await
    }

    async fn run_attempt(
        &self,
        identity: Arc<dyn Identity>,
        file: Arc<dyn UploadedFile>,
        aggregator_code: &str,
        institution_code: &str,
    ) -> Result<ConversionReceipt, ConvertError> {
        let raw = file
            .read_text()
            .await
            .map_err(|error| ConvertError::file_read(error.to_string()))?;
        let body = normalize(&raw, aggregator_code, institution_code)?;

        let token = identity
            .bearer_token(true)
            .await
            .map_err(map_token_error)?;

        let dispatch = ConvertDispatch {
            url: self.config.conversion_url().to_string(),
            bearer: token,
            payload: self.build_payload(file.name(), raw, body),
        };
        let response = self
            .fetch
            .post_convert(&dispatch)
            .await
            .map_err(|error| ConvertError::network(error.to_string()))?;

        match classify(response, &self.config.default_filename()) {
            ConversionOutcome::Success { filename, bytes } => {
                tracing::debug!("conversion produced {} bytes as {filename}", bytes.len());
                self.download_sink
                    .save(&filename, &bytes)
                    .await
                    .map_err(|error| ConvertError::download(error.to_string()))?;
                Ok(ConversionReceipt {
                    filename,
                    byte_count: bytes.len(),
                })
            }
            ConversionOutcome::Failure(rejection) => {
                tracing::debug!(
                    "conversion rejected with HTTP {} (request id {:?})",
                    rejection.status,
                    rejection.request_id,
                );
                Err(rejection.into_convert_error())
            }
        }
    }

    fn build_payload(
        &self,
        file_name: String,
        raw: String,
        body: ConvertRequestBody,
    ) -> ConvertPayload {
        match self.config.transport() {
            TransportMode::Json { .. } => ConvertPayload::Json { body },
            TransportMode::Multipart { output, insights } => ConvertPayload::Multipart {
                file_name,
                file_bytes: raw.into_bytes(),
                output: *output,
                insights: output.supports_insights() && *insights,
                aggregator_code: body.aggregator_code,
                institution_code: body.institution_code,
            },
        }
    }
}

fn map_token_error(error: IdentityProviderError) -> ConvertError {
    match error {
        IdentityProviderError::SignInCancelled => ConvertError::sign_in_cancelled(),
        other => ConvertError::auth_token(other.to_string()),
    }
}

#[cfg(test)]
mod tests;
