//! Conversion error taxonomy.
//!
//! Every failure an attempt can produce is caught at the orchestrator
//! boundary and expressed as one of these variants; nothing propagates as an
//! uncaught failure and nothing is retried. Adapters map the variants to
//! their own surfaces. The one distinction callers must preserve is
//! [`ConvertError::requires_redirect`], which marks failures whose recovery
//! is a navigation (sign-in or upgrade flow) rather than an inline message.

use crate::domain::payload::NormalizeError;
use crate::domain::ports::define_port_error;

define_port_error! {
    /// Single-shot outcome of a failed conversion attempt.
    pub enum ConvertError {
        /// No identity is signed in; no network call was attempted.
        NotSignedIn => "Please sign in first.",
        /// The user dismissed the sign-in flow. Recovery is a redirect.
        SignInCancelled => "Sign-in was dismissed before completing.",
        /// No file is selected; no network call was attempted.
        NoFileSelected => "Please choose a JSON file first.",
        /// The selected file could not be read or decoded.
        FileRead { message: String } => "{message}",
        /// The upload is not syntactically valid JSON.
        Parse { message: String } => "{message}",
        /// No transaction list could be located in the upload.
        Shape { message: String } => "{message}",
        /// A bearer token could not be obtained.
        AuthToken { message: String } =>
            "could not obtain a bearer token: {message}",
        /// HTTP 404: deployment or gateway routing misconfiguration.
        EndpointNotFound { url: String, message: String, request_id: String } =>
            "{message}",
        /// HTTP 401/402/403. Recovery is a redirect, not an inline message.
        Authorization { status: u16, message: String, request_id: String } =>
            "{message}",
        /// Any other non-2xx business failure.
        Remote { status: u16, message: String, request_id: String } =>
            "{message}",
        /// The request itself failed before a status was received.
        Network { message: String } =>
            "conversion request failed: {message}",
        /// A second attempt was started while one is in flight.
        AttemptInFlight => "a conversion attempt is already running",
        /// The converted bytes could not be delivered to the user.
        Download { message: String } =>
            "could not save the converted file: {message}",
    }
}

impl From<NormalizeError> for ConvertError {
    fn from(error: NormalizeError) -> Self {
        match error {
            NormalizeError::Parse { message } => Self::Parse { message },
            NormalizeError::Shape { message } => Self::Shape { message },
        }
    }
}

impl ConvertError {
    /// Whether recovery is a navigation to a sign-in/upgrade flow instead of
    /// an inline error message.
    #[must_use]
    pub fn requires_redirect(&self) -> bool {
        matches!(self, Self::SignInCancelled | Self::Authorization { .. })
    }

    /// Request-correlation id reported by the backend, when one exists.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::EndpointNotFound { request_id, .. }
            | Self::Authorization { request_id, .. }
            | Self::Remote { request_id, .. } => {
                if request_id.is_empty() {
                    None
                } else {
                    Some(request_id)
                }
            }
            _ => None,
        }
    }

    /// HTTP status of the remote failure, when one was received.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::EndpointNotFound { .. } => Some(404),
            Self::Authorization { status, .. } | Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
