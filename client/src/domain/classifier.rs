//! Response classification for conversion requests.
//!
//! Any HTTP response, whether JSON or HTML or plain text, with or without
//! a correlation id, is reduced to one deterministic,
//! user-presentable outcome. The decision order is fixed: success first,
//! then content-negotiated error decoding, then the header correlation id
//! override, then the 404 and authorization special cases.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::domain::error::ConvertError;
use crate::domain::ports::WireResponse;

const BODY_PREVIEW_CHAR_LIMIT: usize = 800;

static FILENAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*?=(?:UTF-8''|")?([^";]+)"#)
        .expect("content-disposition pattern compiles")
});

/// Failure category; drives how the caller presents the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// HTTP 404: the route is missing, a deployment problem rather than a
    /// business error, and presented with extra guidance.
    EndpointNotFound,
    /// HTTP 401/402/403: recovery is a sign-in/upgrade redirect.
    Authorization,
    /// Every other non-2xx status.
    Remote,
}

/// Decoded non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRejection {
    /// Failure category.
    pub kind: RejectionKind,
    /// User-presentable message, surfaced unchanged.
    pub message: String,
    /// Request-correlation id; empty when none was found.
    pub request_id: String,
    /// Numeric HTTP status.
    pub status: u16,
    /// URL the request was issued against.
    pub url: String,
}

impl RemoteRejection {
    /// Map into the attempt-level error taxonomy.
    #[must_use]
    pub fn into_convert_error(self) -> ConvertError {
        match self.kind {
            RejectionKind::EndpointNotFound => {
                ConvertError::endpoint_not_found(self.url, self.message, self.request_id)
            }
            RejectionKind::Authorization => {
                ConvertError::authorization(self.status, self.message, self.request_id)
            }
            RejectionKind::Remote => {
                ConvertError::remote(self.status, self.message, self.request_id)
            }
        }
    }
}

/// Outcome of classifying one conversion response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// 2xx: the converted bytes and the filename to save them under.
    Success {
        /// Filename from `Content-Disposition`, or the configured default.
        filename: String,
        /// Converted bytes, unchanged.
        bytes: Vec<u8>,
    },
    /// Non-2xx: a decoded, user-presentable failure.
    Failure(RemoteRejection),
}

/// Classify one HTTP response into a conversion outcome.
#[must_use]
pub fn classify(response: WireResponse, default_filename: &str) -> ConversionOutcome {
    if is_success(response.status) {
        let filename = filename_from_content_disposition(response.content_disposition.as_deref())
            .unwrap_or_else(|| default_filename.to_owned());
        return ConversionOutcome::Success {
            filename,
            bytes: response.body,
        };
    }

    let decoded = decode_error_body(&response);
    // A transport-level header id outranks whatever the body claims.
    let request_id = response
        .request_id
        .filter(|id| !id.is_empty())
        .unwrap_or(decoded.request_id);

    let kind = match response.status {
        404 => RejectionKind::EndpointNotFound,
        401..=403 => RejectionKind::Authorization,
        _ => RejectionKind::Remote,
    };
    let message = if kind == RejectionKind::EndpointNotFound {
        endpoint_not_found_message(&response.url, &decoded.message)
    } else if decoded.message.is_empty() {
        format!("Convert failed (HTTP {}).", response.status)
    } else {
        decoded.message
    };

    ConversionOutcome::Failure(RemoteRejection {
        kind,
        message,
        request_id,
        status: response.status,
        url: response.url,
    })
}

const fn is_success(status: u16) -> bool {
    status >= 200 && status < 300
}

/// Extract a filename from a `Content-Disposition` header.
///
/// Handles `filename*=UTF-8''…`, `filename="…"`, and unquoted values; the
/// captured group is URL-decoded. Anything unparseable yields `None` and the
/// caller falls back to its default.
fn filename_from_content_disposition(header: Option<&str>) -> Option<String> {
    let header = header?;
    let captured = FILENAME_PATTERN.captures(header)?.get(1)?.as_str();
    let cleaned = captured.replace('"', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(cleaned).ok()?;
    Some(decoded.into_owned())
}

struct DecodedErrorBody {
    message: String,
    request_id: String,
}

/// Decode a non-2xx body by content negotiation.
///
/// JSON bodies are searched for `error.message`, then `message`, with the
/// correlation id at `error.request_id`. Anything else, including JSON that
/// fails to parse despite its content type, is used verbatim as text,
/// truncated to a bounded preview.
fn decode_error_body(response: &WireResponse) -> DecodedErrorBody {
    let declared_json = response
        .content_type
        .as_deref()
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"));

    if declared_json {
        if let Ok(document) = serde_json::from_slice::<serde_json::Value>(&response.body) {
            let message = document
                .pointer("/error/message")
                .or_else(|| document.pointer("/message"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let request_id = document
                .pointer("/error/request_id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned();
            return DecodedErrorBody {
                message,
                request_id,
            };
        }
    }

    DecodedErrorBody {
        message: body_preview(&response.body),
        request_id: String::new(),
    }
}

fn body_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() > BODY_PREVIEW_CHAR_LIMIT {
        let preview: String = text.chars().take(BODY_PREVIEW_CHAR_LIMIT).collect();
        format!("{preview}…")
    } else {
        text.to_owned()
    }
}

fn endpoint_not_found_message(request_url: &str, body_text: &str) -> String {
    let path = Url::parse(request_url)
        .map(|url| url.path().to_owned())
        .unwrap_or_else(|_| request_url.to_owned());
    let extra = if body_text.is_empty() {
        String::new()
    } else {
        format!("\n\nResponse: {body_text}")
    };
    format!(
        "Convert failed (HTTP 404).\nEndpoint not found.\n\nURL: {request_url}{extra}\n\n\
         This usually means the server does not have that route in production, or the API \
         gateway is not forwarding {path}."
    )
}
