//! Reqwest-backed HTTP adapter for the conversion service.
//!
//! The adapter owns transport details only: request serialisation, timeout
//! and transport error mapping, and harvesting the handful of headers the
//! domain consumes into a `WireResponse`. Status interpretation belongs to
//! the classifier, never to this layer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};

use crate::config::ConvertServiceConfig;
use crate::domain::ports::{
    ConvertDispatch, ConvertPayload, FetchRequest, HttpFetch, HttpFetchError, WireResponse,
};

const DEFAULT_USER_AGENT: &str = "ledgerlift-client/0.1";
const REQUEST_ID_HEADER: &str = "x-request-id";
const VENDOR_REQUEST_ID_HEADER: &str = "x-ledgerlift-request-id";
const CLIENT_ORIGIN_HEADER: &str = "X-Client-Origin";

/// Outbound identity settings for conversion service requests.
pub struct ConvertHttpIdentity {
    /// HTTP user-agent sent with every request.
    pub user_agent: String,
    /// `X-Client-Origin` value for server-side log correlation, if any.
    pub client_origin: Option<String>,
}

impl Default for ConvertHttpIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            client_origin: None,
        }
    }
}

impl ConvertHttpIdentity {
    /// Identity derived from the service configuration's client origin.
    #[must_use]
    pub fn for_service(config: &ConvertServiceConfig) -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            client_origin: config.client_origin().map(str::to_owned),
        }
    }
}

/// Adapter performing HTTP requests with one pooled reqwest client.
pub struct ReqwestFetch {
    client: Client,
    user_agent: String,
    client_origin: Option<String>,
}

impl ReqwestFetch {
    /// Build an adapter using a reqwest client with an explicit request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_identity(timeout, ConvertHttpIdentity::default())
    }

    /// Build an adapter whose outbound identity follows the service
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn for_service(
        config: &ConvertServiceConfig,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Self::with_identity(timeout, ConvertHttpIdentity::for_service(config))
    }

    /// Build an adapter with explicit outbound identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_identity(
        timeout: Duration,
        identity: ConvertHttpIdentity,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            user_agent: identity.user_agent,
            client_origin: identity.client_origin,
        })
    }

    fn apply_identity(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(USER_AGENT, self.user_agent.as_str());
        match &self.client_origin {
            Some(origin) => builder.header(CLIENT_ORIGIN_HEADER, origin.as_str()),
            None => builder,
        }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get(&self, request: &FetchRequest) -> Result<WireResponse, HttpFetchError> {
        let mut builder = self
            .client
            .get(&request.url)
            .header(ACCEPT, "application/json");
        builder = self.apply_identity(builder);
        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }
        collect_response(builder).await
    }

    async fn post_convert(
        &self,
        dispatch: &ConvertDispatch,
    ) -> Result<WireResponse, HttpFetchError> {
        let builder = self.client.post(&dispatch.url).bearer_auth(&dispatch.bearer);
        let builder = self.apply_identity(builder);
        let builder = match &dispatch.payload {
            ConvertPayload::Json { body } => builder.json(body),
            ConvertPayload::Multipart {
                file_name,
                file_bytes,
                output,
                insights,
                aggregator_code,
                institution_code,
            } => {
                let mut form = Form::new()
                    .part(
                        "file",
                        Part::bytes(file_bytes.clone()).file_name(file_name.clone()),
                    )
                    .text("output", output.as_field())
                    .text("insights", if *insights { "true" } else { "false" });
                if !aggregator_code.is_empty() {
                    form = form.text("aggregator_code", aggregator_code.clone());
                }
                if !institution_code.is_empty() {
                    form = form.text("institution_code", institution_code.clone());
                }
                builder.multipart(form)
            }
        };
        collect_response(builder).await
    }
}

async fn collect_response(builder: RequestBuilder) -> Result<WireResponse, HttpFetchError> {
    let response = builder.send().await.map_err(map_transport_error)?;
    let url = response.url().to_string();
    let status = response.status().as_u16();
    let headers = response.headers();
    let content_type = header_value(headers, CONTENT_TYPE.as_str());
    let content_disposition = header_value(headers, CONTENT_DISPOSITION.as_str());
    let request_id = harvest_request_id(headers);
    let body = response
        .bytes()
        .await
        .map_err(map_transport_error)?
        .to_vec();
    Ok(WireResponse {
        url,
        status,
        content_type,
        content_disposition,
        request_id,
        body,
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Correlation id from the primary header, falling back to the vendor one.
/// Empty values count as absent.
fn harvest_request_id(headers: &HeaderMap) -> Option<String> {
    non_empty_header(headers, REQUEST_ID_HEADER)
        .or_else(|| non_empty_header(headers, VENDOR_REQUEST_ID_HEADER))
}

fn non_empty_header(headers: &HeaderMap, name: &str) -> Option<String> {
    header_value(headers, name).filter(|value| !value.is_empty())
}

fn map_transport_error(error: reqwest::Error) -> HttpFetchError {
    if error.is_timeout() {
        HttpFetchError::timeout(error.to_string())
    } else {
        HttpFetchError::transport(error.to_string())
    }
}
