//! Conversion service configuration.
//!
//! The backend exposes two request shapes for the same operation across
//! deployment tiers (a JSON body against a configurable path, and a
//! multipart form against per-format paths), and the paths themselves have
//! drifted by deployment. Both the transport mode and the path are therefore
//! explicit, externally supplied configuration; nothing is inferred from
//! payload content.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::ports::define_port_error;
use crate::domain::routing::DiscoveryPlan;

define_port_error! {
    /// Errors raised while validating configuration.
    pub enum ConfigError {
        /// The conversion path cannot be joined onto the base URL.
        InvalidConversionPath { path: String, message: String } =>
            "conversion path {path} is not joinable: {message}",
    }
}

/// Output format offered by the multipart tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// Normalised JSON.
    Json,
    /// QuickBooks export bundle.
    Quickbooks,
}

impl OutputFormat {
    /// Wire value for the multipart `output` field.
    #[must_use]
    pub const fn as_field(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Quickbooks => "quickbooks",
        }
    }

    /// Conversion endpoint path serving this format.
    #[must_use]
    pub const fn endpoint_path(&self) -> &'static str {
        match self {
            Self::Csv => "/v1/full/csv",
            Self::Json => "/v1/full/json",
            Self::Quickbooks => "/v1/full/quickbooks",
        }
    }

    /// Whether the insights add-on exists for this format.
    #[must_use]
    pub const fn supports_insights(&self) -> bool {
        matches!(self, Self::Csv | Self::Json)
    }

    /// Fallback filename when the response names none.
    #[must_use]
    pub fn default_filename(&self) -> String {
        let extension = match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Quickbooks => "zip",
        };
        format!("ledgerlift_{}.{extension}", self.as_field())
    }
}

/// Request shape and endpoint selection for the conversion POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TransportMode {
    /// JSON tier: canonical body posted to an explicit path.
    Json {
        /// Conversion endpoint path, e.g. `/v1/transactions/convert`.
        path: String,
    },
    /// Multipart tier: raw upload posted to the path derived from the
    /// output format.
    Multipart {
        /// Requested output format.
        output: OutputFormat,
        /// Whether the insights add-on is requested. Ignored for formats
        /// that do not support it.
        insights: bool,
    },
}

impl TransportMode {
    /// Endpoint path for this mode.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Json { path } => path,
            Self::Multipart { output, .. } => output.endpoint_path(),
        }
    }
}

/// Validated configuration for one conversion service deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertServiceConfig {
    base_url: Url,
    transport: TransportMode,
    conversion_url: Url,
    client_origin: Option<String>,
    discovery: DiscoveryPlan,
}

impl ConvertServiceConfig {
    /// Build a configuration, validating that the conversion path joins
    /// onto the base URL.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidConversionPath`] when the join fails.
    pub fn new(base_url: Url, transport: TransportMode) -> Result<Self, ConfigError> {
        let conversion_url = base_url
            .join(transport.path())
            .map_err(|error| ConfigError::invalid_conversion_path(transport.path(), error.to_string()))?;
        Ok(Self {
            base_url,
            transport,
            conversion_url,
            client_origin: None,
            discovery: DiscoveryPlan::default(),
        })
    }

    /// Attach an `X-Client-Origin` value sent with conversion requests to
    /// help server-side log correlation.
    #[must_use]
    pub fn with_client_origin(mut self, origin: impl Into<String>) -> Self {
        self.client_origin = Some(origin.into());
        self
    }

    /// Replace the default discovery plan.
    #[must_use]
    pub fn with_discovery_plan(mut self, plan: DiscoveryPlan) -> Self {
        self.discovery = plan;
        self
    }

    /// Service base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Configured transport mode.
    #[must_use]
    pub fn transport(&self) -> &TransportMode {
        &self.transport
    }

    /// Absolute conversion endpoint URL.
    #[must_use]
    pub fn conversion_url(&self) -> &Url {
        &self.conversion_url
    }

    /// Configured client origin, if any.
    #[must_use]
    pub fn client_origin(&self) -> Option<&str> {
        self.client_origin.as_deref()
    }

    /// Candidate paths for routing discovery.
    #[must_use]
    pub fn discovery_plan(&self) -> &DiscoveryPlan {
        &self.discovery
    }

    /// Filename used when the response carries no usable
    /// `Content-Disposition`.
    #[must_use]
    pub fn default_filename(&self) -> String {
        match &self.transport {
            TransportMode::Json { .. } => "ledgerlift.csv".to_owned(),
            TransportMode::Multipart { output, .. } => output.default_filename(),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::rstest;

    use super::*;

    fn base() -> Url {
        Url::parse("https://api.example.test").expect("base url")
    }

    #[test]
    fn json_mode_joins_the_configured_path() {
        let config = ConvertServiceConfig::new(
            base(),
            TransportMode::Json {
                path: "/v1/transactions/convert".to_owned(),
            },
        )
        .expect("valid config");
        assert_eq!(
            config.conversion_url().as_str(),
            "https://api.example.test/v1/transactions/convert"
        );
        assert_eq!(config.default_filename(), "ledgerlift.csv");
    }

    #[test]
    fn trailing_slash_on_the_base_does_not_double_up() {
        let with_slash = Url::parse("https://api.example.test/").expect("base url");
        let config = ConvertServiceConfig::new(
            with_slash,
            TransportMode::Json {
                path: "/v1/transactions/convert".to_owned(),
            },
        )
        .expect("valid config");
        assert_eq!(
            config.conversion_url().as_str(),
            "https://api.example.test/v1/transactions/convert"
        );
    }

    #[rstest]
    #[case(OutputFormat::Csv, "/v1/full/csv", "ledgerlift_csv.csv")]
    #[case(OutputFormat::Json, "/v1/full/json", "ledgerlift_json.json")]
    #[case(OutputFormat::Quickbooks, "/v1/full/quickbooks", "ledgerlift_quickbooks.zip")]
    fn multipart_mode_derives_path_and_filename_from_the_format(
        #[case] output: OutputFormat,
        #[case] path: &str,
        #[case] filename: &str,
    ) {
        let config = ConvertServiceConfig::new(
            base(),
            TransportMode::Multipart {
                output,
                insights: false,
            },
        )
        .expect("valid config");
        assert_eq!(config.conversion_url().path(), path);
        assert_eq!(config.default_filename(), filename);
    }

    #[test]
    fn insights_exist_only_for_csv_and_json() {
        assert!(OutputFormat::Csv.supports_insights());
        assert!(OutputFormat::Json.supports_insights());
        assert!(!OutputFormat::Quickbooks.supports_insights());
    }

    #[test]
    fn builders_attach_origin_and_plan() {
        let config = ConvertServiceConfig::new(
            base(),
            TransportMode::Json {
                path: "/v1/transactions/convert".to_owned(),
            },
        )
        .expect("valid config")
        .with_client_origin("https://app.example.test")
        .with_discovery_plan(crate::domain::routing::DiscoveryPlan::empty());

        assert_eq!(config.client_origin(), Some("https://app.example.test"));
        assert_eq!(
            config
                .discovery_plan()
                .candidates(crate::domain::routing::RoutingKind::Aggregators)
                .len(),
            0
        );
    }
}
