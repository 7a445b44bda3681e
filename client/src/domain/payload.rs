//! Payload normalisation for uploaded JSON documents.
//!
//! Uploads arrive in several shapes depending on where the user exported
//! them; all of them are reduced to the one canonical request body the
//! conversion endpoint accepts.

use serde::Serialize;
use serde_json::Value;

use crate::domain::ports::define_port_error;

/// Shape-error text shown verbatim to the user; it names every accepted
/// shape and is part of the upload contract.
pub const MISSING_TRANSACTIONS_MESSAGE: &str = "Could not find a transactions array in the \
     uploaded JSON. Expected an array, or an object with `transactions`, or UK OB \
     `Data.Transaction`.";

const INVALID_JSON_MESSAGE: &str = "File is not valid JSON.";

define_port_error! {
    /// Errors produced while normalising an upload.
    pub enum NormalizeError {
        /// The document is not syntactically valid JSON.
        Parse { message: String } => "{message}",
        /// No non-empty transaction list was found in the document.
        Shape { message: String } => "{message}",
    }
}

/// Canonical conversion request body.
///
/// `transactions` is never empty; the codes may be empty strings, meaning
/// "unspecified", but are always present on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertRequestBody {
    /// Aggregator routing hint, trimmed, possibly empty.
    pub aggregator_code: String,
    /// Institution routing hint, trimmed, possibly empty.
    pub institution_code: String,
    /// Transaction objects exactly as they appeared in the upload.
    pub transactions: Vec<Value>,
}

/// Normalise an uploaded document into the canonical request body.
///
/// Accepted shapes, first match wins: the document is itself an array; the
/// document is an object with a `transactions` array; the document is an
/// object with an Open-Banking-style `Data.Transaction` array. The matched
/// list is moved into the body untouched. Codes are trimmed and passed
/// through without validation; unknown codes are the backend's concern.
///
/// # Errors
///
/// [`NormalizeError::Parse`] when the text is not valid JSON;
/// [`NormalizeError::Shape`] when no shape matches or the matched list is
/// empty.
pub fn normalize(
    raw_json: &str,
    aggregator_code: &str,
    institution_code: &str,
) -> Result<ConvertRequestBody, NormalizeError> {
    let document: Value = serde_json::from_str(raw_json).map_err(|error| {
        tracing::debug!("upload is not parseable JSON: {error}");
        NormalizeError::parse(INVALID_JSON_MESSAGE)
    })?;

    let transactions = extract_transactions(document)
        .ok_or_else(|| NormalizeError::shape(MISSING_TRANSACTIONS_MESSAGE))?;
    if transactions.is_empty() {
        return Err(NormalizeError::shape(MISSING_TRANSACTIONS_MESSAGE));
    }

    Ok(ConvertRequestBody {
        aggregator_code: aggregator_code.trim().to_owned(),
        institution_code: institution_code.trim().to_owned(),
        transactions,
    })
}

fn extract_transactions(document: Value) -> Option<Vec<Value>> {
    match document {
        Value::Array(items) => Some(items),
        Value::Object(mut fields) => {
            if let Some(Value::Array(items)) = fields.remove("transactions") {
                return Some(items);
            }
            if let Some(Value::Object(mut data)) = fields.remove("Data") {
                if let Some(Value::Array(items)) = data.remove("Transaction") {
                    return Some(items);
                }
            }
            None
        }
        _ => None,
    }
}
