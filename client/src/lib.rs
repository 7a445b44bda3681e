//! Client-side orchestration for the LedgerLift conversion service.
//!
//! The crate drives one conversion attempt end to end: an uploaded JSON
//! document is normalised into the canonical request body, posted to the
//! configured conversion endpoint with a freshly refreshed bearer token, and
//! the HTTP response is classified into either a saved download or a
//! user-presentable failure. Routing metadata (aggregator and institution
//! codes) is discovered best-effort from a list of candidate endpoints and
//! never blocks the conversion flow.
//!
//! The domain owns all contracts through ports; identity, transport, file
//! access, and download delivery are injected adapters.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use client::config::{ConvertServiceConfig, TransportMode};
//! use client::domain::ports::{
//!     FixtureDownloadSink, FixtureIdentityProvider, FixtureUploadedFile,
//! };
//! use client::domain::{ConversionOrchestrator, OrchestratorPorts};
//! use client::outbound::convert_api::ReqwestFetch;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConvertServiceConfig::new(
//!     url::Url::parse("https://api.example.test")?,
//!     TransportMode::Json {
//!         path: "/v1/transactions/convert".to_owned(),
//!     },
//! )?;
//! let fetch = Arc::new(ReqwestFetch::for_service(&config, Duration::from_secs(120))?);
//! let orchestrator = ConversionOrchestrator::new(
//!     OrchestratorPorts::new(
//!         Arc::new(FixtureIdentityProvider::new()),
//!         fetch,
//!         Arc::new(FixtureDownloadSink::new()),
//!     ),
//!     config,
//! );
//!
//! orchestrator.session().sign_in().await?;
//! let file = Arc::new(FixtureUploadedFile::new(
//!     "statement.json",
//!     r#"[{"amount": 10}]"#,
//! ));
//! let receipt = orchestrator.attempt_conversion(Some(file), "", "").await?;
//! assert!(!receipt.filename.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod outbound;

pub use config::{ConvertServiceConfig, OutputFormat, TransportMode};
pub use domain::{ConversionOrchestrator, ConversionState, ConvertError};
