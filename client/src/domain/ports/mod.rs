//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod download_sink;
mod http_fetch;
mod identity_provider;
mod uploaded_file;

#[cfg(test)]
pub use download_sink::MockDownloadSink;
pub use download_sink::{DownloadSink, DownloadSinkError, FixtureDownloadSink, SavedDownload};
#[cfg(test)]
pub use http_fetch::MockHttpFetch;
pub use http_fetch::{
    ConvertDispatch, ConvertPayload, FetchRequest, HttpFetch, HttpFetchError, WireResponse,
};
#[cfg(test)]
pub use identity_provider::{MockIdentity, MockIdentityProvider};
pub use identity_provider::{
    FixtureIdentity, FixtureIdentityProvider, Identity, IdentityListener, IdentityProvider,
    IdentityProviderError, IdentitySubscription,
};
#[cfg(test)]
pub use uploaded_file::MockUploadedFile;
pub use uploaded_file::{FixtureUploadedFile, UploadedFile, UploadedFileError};
