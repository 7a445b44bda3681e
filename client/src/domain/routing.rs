//! Routing metadata: selectable aggregator and institution codes.
//!
//! The backend's list endpoints have drifted across deployments, so the
//! decoding here accepts every shape observed in the wild: a bare JSON
//! array, or an object exposing the list under `items`, `aggregators`, or
//! `institutions`; entries are bare strings or objects with flexible key
//! names. Decoding goes through transport DTOs first, then maps into domain
//! records in one pass.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// Logical resource kinds resolved by endpoint discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoutingKind {
    /// Data-aggregator codes.
    Aggregators,
    /// Financial-institution codes.
    Institutions,
}

impl RoutingKind {
    /// Stable lowercase name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregators => "aggregators",
            Self::Institutions => "institutions",
        }
    }
}

impl fmt::Display for RoutingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable routing code with its display label.
///
/// Insertion order is the backend's order; duplicates pass through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingCode {
    /// Code value submitted with a conversion request.
    pub code: String,
    /// Human-readable label for selection surfaces.
    pub label: String,
}

/// Ordered candidate paths per routing kind, probed first-to-last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPlan {
    candidates: BTreeMap<RoutingKind, Vec<String>>,
}

impl Default for DiscoveryPlan {
    fn default() -> Self {
        Self::empty()
            .with_kind(
                RoutingKind::Aggregators,
                [
                    "/v1/routing/aggregators",
                    "/v1/routing/aggregator-codes",
                    "/v1/aggregators",
                ],
            )
            .with_kind(
                RoutingKind::Institutions,
                [
                    "/v1/routing/institutions",
                    "/v1/routing/institution-codes",
                    "/v1/institutions",
                ],
            )
    }
}

impl DiscoveryPlan {
    /// Plan with no candidates; discovery over it yields empty lists.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            candidates: BTreeMap::new(),
        }
    }

    /// Replace the candidate paths for one kind.
    #[must_use]
    pub fn with_kind<I, P>(mut self, kind: RoutingKind, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.candidates
            .insert(kind, paths.into_iter().map(Into::into).collect());
        self
    }

    /// Candidate paths for one kind, in probe order.
    #[must_use]
    pub fn candidates(&self, kind: RoutingKind) -> &[String] {
        self.candidates.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Iterate kinds and their candidates in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (RoutingKind, &[String])> {
        self.candidates
            .iter()
            .map(|(kind, paths)| (*kind, paths.as_slice()))
    }
}

/// Decode a discovery response body into routing codes.
///
/// `None` means the body is not a routing list at all (the candidate was
/// malformed and the next one should be tried); `Some(vec![])` is a valid,
/// empty catalogue and terminates the probe for that kind.
pub(crate) fn decode_routing_list(body: &[u8]) -> Option<Vec<RoutingCode>> {
    let envelope: RoutingListDto = serde_json::from_slice(body).ok()?;
    let entries = envelope.into_entries()?;
    Some(
        entries
            .into_iter()
            .filter_map(RoutingEntryDto::into_domain)
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoutingListDto {
    Bare(Vec<RoutingEntryDto>),
    Keyed {
        items: Option<Vec<RoutingEntryDto>>,
        aggregators: Option<Vec<RoutingEntryDto>>,
        institutions: Option<Vec<RoutingEntryDto>>,
    },
}

impl RoutingListDto {
    fn into_entries(self) -> Option<Vec<RoutingEntryDto>> {
        match self {
            Self::Bare(entries) => Some(entries),
            Self::Keyed {
                items,
                aggregators,
                institutions,
            } => items.or(aggregators).or(institutions),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoutingEntryDto {
    Bare(String),
    Keyed {
        code: Option<String>,
        id: Option<String>,
        value: Option<String>,
        name: Option<String>,
        label: Option<String>,
    },
    // Anything else (numbers, nested arrays, null) is skipped, not fatal.
    Other(Value),
}

impl RoutingEntryDto {
    fn into_domain(self) -> Option<RoutingCode> {
        match self {
            Self::Bare(text) => {
                if text.is_empty() {
                    None
                } else {
                    Some(RoutingCode {
                        code: text.clone(),
                        label: text,
                    })
                }
            }
            Self::Keyed {
                code,
                id,
                value,
                name,
                label,
            } => {
                let resolved = code
                    .clone()
                    .or_else(|| id.clone())
                    .or(value)
                    .unwrap_or_default();
                if resolved.is_empty() {
                    return None;
                }
                let display = name
                    .or(label)
                    .or(code)
                    .or(id)
                    .unwrap_or_else(|| resolved.clone());
                Some(RoutingCode {
                    code: resolved,
                    label: display,
                })
            }
            Self::Other(_) => None,
        }
    }
}
