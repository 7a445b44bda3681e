//! Driven port for the conversion service's HTTP surface.
//!
//! The domain owns the request and response contracts so classification and
//! discovery stay adapter-agnostic: an adapter reports exactly the status,
//! the three headers the domain consumes, and the raw body bytes.

use async_trait::async_trait;

use crate::config::OutputFormat;
use crate::domain::payload::ConvertRequestBody;

use super::define_port_error;

define_port_error! {
    /// Transport-level failures, before any HTTP status was received.
    pub enum HttpFetchError {
        /// Connection, TLS, or protocol failure.
        Transport { message: String } =>
            "transport failure: {message}",
        /// The request or body read exceeded the adapter timeout.
        Timeout { message: String } =>
            "request timed out: {message}",
    }
}

/// Transport-agnostic record of one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// Final request URL, echoed back in endpoint-not-found messages.
    pub url: String,
    /// Numeric HTTP status.
    pub status: u16,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// `Content-Disposition` header, if present.
    pub content_disposition: Option<String>,
    /// Request-correlation id harvested from the response headers.
    pub request_id: Option<String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

/// One authenticated-or-anonymous GET, used by endpoint discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL to probe.
    pub url: String,
    /// Bearer token, when one is available.
    pub bearer: Option<String>,
}

/// Body of one conversion POST, selected by deployment-tier configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertPayload {
    /// JSON tier: the canonical request body.
    Json {
        /// Normalised conversion request.
        body: ConvertRequestBody,
    },
    /// Multipart tier: the raw upload plus form fields.
    Multipart {
        /// Name of the uploaded file.
        file_name: String,
        /// Raw bytes of the uploaded file.
        file_bytes: Vec<u8>,
        /// Requested output format.
        output: OutputFormat,
        /// Whether the insights add-on is requested.
        insights: bool,
        /// Aggregator routing hint; empty means unspecified.
        aggregator_code: String,
        /// Institution routing hint; empty means unspecified.
        institution_code: String,
    },
}

/// One authenticated conversion POST.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertDispatch {
    /// Absolute conversion endpoint URL.
    pub url: String,
    /// Bearer token for the `Authorization` header.
    pub bearer: String,
    /// Request body description.
    pub payload: ConvertPayload,
}

/// Port for issuing HTTP requests against the conversion service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Issue a GET and report the response without interpreting it.
    async fn get(&self, request: &FetchRequest) -> Result<WireResponse, HttpFetchError>;

    /// Issue a conversion POST and report the response without
    /// interpreting it.
    async fn post_convert(
        &self,
        dispatch: &ConvertDispatch,
    ) -> Result<WireResponse, HttpFetchError>;
}
