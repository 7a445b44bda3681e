//! Domain logic for the conversion orchestration flow.
//!
//! Everything here is transport- and rendering-agnostic: the orchestrator
//! publishes [`ConversionState`] transitions and returns taxonomy errors,
//! and all infrastructure enters through the traits in [`ports`].

pub mod classifier;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod payload;
pub mod ports;
pub mod routing;
pub mod session;

pub use self::classifier::{ConversionOutcome, RejectionKind, RemoteRejection, classify};
pub use self::discovery::EndpointDiscovery;
pub use self::error::ConvertError;
pub use self::orchestrator::{
    ConversionOrchestrator, ConversionReceipt, ConversionState, OrchestratorPorts,
};
pub use self::payload::{ConvertRequestBody, NormalizeError, normalize};
pub use self::routing::{DiscoveryPlan, RoutingCode, RoutingKind};
pub use self::session::SessionGate;
