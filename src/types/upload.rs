use serde::{Deserialize, Serialize};

use crate::types::MessageType;

/// The server's record of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Name of the file as it was sent.
    #[serde(default)]
    pub filename: Option<String>,
    /// Name the server stored the file under.
    pub saved_filename: String,
    /// Reference to pass as a chat request's `file_url`.
    pub url: String,
    /// MIME type reported for the upload.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Size in bytes.
    pub size: u64,
}

impl UploadedFile {
    /// The kind of message that should carry this file.
    pub fn message_type(&self) -> MessageType {
        match self.content_type.as_deref() {
            Some(content_type) if content_type.starts_with("image/") => MessageType::Image,
            Some(_) => MessageType::Document,
            None => MessageType::from_extension(&self.saved_filename),
        }
    }
}
