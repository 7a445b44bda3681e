//! Conversion service outbound adapters.
//!
//! This module provides a thin reqwest implementation of the `HttpFetch`
//! port.

mod http_fetch;

pub use http_fetch::{ConvertHttpIdentity, ReqwestFetch};
