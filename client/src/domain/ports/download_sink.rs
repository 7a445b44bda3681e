//! Driven port for delivering converted bytes to the user.
//!
//! In a browser this is the save-as anchor click; other hosts write to disk
//! or hand the bytes to a share sheet.

use std::sync::Mutex;

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced while saving a converted file.
    pub enum DownloadSinkError {
        /// The host rejected or failed the save.
        Rejected { message: String } =>
            "save-as download failed: {message}",
    }
}

/// Port for the save-as-download side effect.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Deliver `bytes` to the user under `filename`.
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<(), DownloadSinkError>;
}

/// One capture recorded by [`FixtureDownloadSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDownload {
    /// Filename the save was requested under.
    pub filename: String,
    /// Delivered bytes.
    pub bytes: Vec<u8>,
}

/// Sink fixture that records every save in memory.
#[derive(Default)]
pub struct FixtureDownloadSink {
    saved: Mutex<Vec<SavedDownload>>,
}

impl FixtureDownloadSink {
    /// Build an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded save, in order.
    pub fn saved(&self) -> Vec<SavedDownload> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DownloadSink for FixtureDownloadSink {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<(), DownloadSinkError> {
        if let Ok(mut saved) = self.saved.lock() {
            saved.push(SavedDownload {
                filename: filename.to_owned(),
                bytes: bytes.to_vec(),
            });
        }
        Ok(())
    }
}
