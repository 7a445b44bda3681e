//! Driven port for the user-selected upload.
//!
//! The selection is an opaque handle; reading it is asynchronous and may
//! fail after selection (the backing file can disappear or stop decoding).

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced while reading the selected upload.
    pub enum UploadedFileError {
        /// The selection could not be read or decoded as text.
        Unreadable { message: String } =>
            "could not read the selected file: {message}",
    }
}

/// Handle to the file the user selected for conversion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadedFile: Send + Sync {
    /// File name as presented by the selection surface.
    fn name(&self) -> String;

    /// Read the full contents as text.
    async fn read_text(&self) -> Result<String, UploadedFileError>;
}

/// In-memory upload fixture.
#[derive(Debug, Clone)]
pub struct FixtureUploadedFile {
    name: String,
    contents: String,
}

impl FixtureUploadedFile {
    /// Build a fixture upload from its name and contents.
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

#[async_trait]
impl UploadedFile for FixtureUploadedFile {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn read_text(&self) -> Result<String, UploadedFileError> {
        Ok(self.contents.clone())
    }
}
