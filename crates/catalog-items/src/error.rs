/// Errors reported by a [`CatalogService`](crate::CatalogService) implementation.
///
/// `NotFound` is kept apart from transport failures so that existence checks
/// can treat absence as a plain negative answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    /// The request was accepted but the service reported it did not succeed.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors that can occur while provisioning a catalog item.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to open update session for item {item_id}: {message}")]
    SessionCreateFailed { item_id: String, message: String },

    #[error("failed to parse descriptor: {0}")]
    DescriptorParse(String),

    #[error("disk {name} not found inside archive")]
    DiskNotFoundInArchive { name: String },

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("transfer error: {0}")]
    Transfer(String),

    #[error("got status {status} while getting the file from remote url {url}")]
    RemoteFetch { url: String, status: u16 },

    #[error("unsupported template type {0}: only ovf can be used when cloning from a template")]
    UnsupportedTemplateType(String),

    #[error("{operation} ({subject}): {message}")]
    Provider {
        operation: &'static str,
        subject: String,
        message: String,
    },

    #[error("update session {session} still pending after {waited_secs}s")]
    WaitTimedOut { session: String, waited_secs: u64 },
}

impl CatalogError {
    /// Wrap a service failure with the operation and the subject it concerned.
    pub fn provider(
        operation: &'static str,
        subject: impl Into<String>,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::Provider {
            operation,
            subject: subject.into(),
            message: err.to_string(),
        }
    }
}
