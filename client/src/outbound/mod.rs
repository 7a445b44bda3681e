//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! Adapters are thin translators between domain contracts and the wire; they
//! contain no business logic. The only adapter today is the reqwest-backed
//! HTTP capability for the conversion service.

pub mod convert_api;
