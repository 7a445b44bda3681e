//! Best-effort discovery of routing metadata endpoints.
//!
//! The backend's routing endpoints differ across deployments, so each kind
//! is resolved by walking an ordered list of candidate paths and keeping the
//! first well-formed success. Discovery is an optional enhancement: every
//! per-candidate failure degrades to "this kind yields no codes" and is
//! logged individually so each candidate's failure reason stays
//! diagnosable. Nothing here ever blocks or fails the conversion flow.

use std::collections::BTreeMap;
use std::sync::Arc;

use url::Url;

use crate::domain::ports::{FetchRequest, HttpFetch};
use crate::domain::routing::{DiscoveryPlan, RoutingCode, RoutingKind, decode_routing_list};

/// Sequential candidate-path prober for routing metadata.
pub struct EndpointDiscovery {
    fetch: Arc<dyn HttpFetch>,
}

impl EndpointDiscovery {
    /// Build a prober over an injected HTTP capability.
    #[must_use]
    pub fn new(fetch: Arc<dyn HttpFetch>) -> Self {
        Self { fetch }
    }

    /// Resolve every kind in the plan independently.
    ///
    /// Candidates for one kind are probed strictly in order and the first
    /// 2xx response with a decodable list terminates that kind's search;
    /// deliberately sequential, since most candidates are expected to 404
    /// and serial probing avoids request storms against an unknown-shape
    /// backend. A kind with no usable candidate maps to an empty list,
    /// never an error.
    pub async fn discover(
        &self,
        base_url: &Url,
        plan: &DiscoveryPlan,
        bearer: Option<&str>,
    ) -> BTreeMap<RoutingKind, Vec<RoutingCode>> {
        let mut catalogue = BTreeMap::new();
        for (kind, candidates) in plan.iter() {
            let codes = self.discover_kind(base_url, kind, candidates, bearer).await;
            catalogue.insert(kind, codes);
        }
        catalogue
    }

    async fn discover_kind(
        &self,
        base_url: &Url,
        kind: RoutingKind,
        candidates: &[String],
        bearer: Option<&str>,
    ) -> Vec<RoutingCode> {
        for path in candidates {
            let url = match base_url.join(path) {
                Ok(url) => url,
                Err(error) => {
                    tracing::debug!("skipping unjoinable {kind} candidate {path}: {error}");
                    continue;
                }
            };
            let request = FetchRequest {
                url: url.to_string(),
                bearer: bearer.map(str::to_owned),
            };
            match self.fetch.get(&request).await {
                Err(error) => {
                    tracing::debug!("{kind} candidate {path} unreachable: {error}");
                }
                Ok(response) if !(200..300).contains(&response.status) => {
                    tracing::debug!(
                        "{kind} candidate {path} answered HTTP {}",
                        response.status
                    );
                }
                Ok(response) => match decode_routing_list(&response.body) {
                    Some(codes) => {
                        tracing::debug!("{kind} resolved by {path} with {} codes", codes.len());
                        return codes;
                    }
                    None => {
                        tracing::debug!("{kind} candidate {path} returned an undecodable body");
                    }
                },
            }
        }
        tracing::debug!("no usable {kind} candidate; kind degrades to an empty list");
        Vec::new()
    }
}
