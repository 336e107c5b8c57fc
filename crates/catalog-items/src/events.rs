use std::fmt;

/// One lifecycle transition while provisioning an item.
///
/// Components never print; they hand these to an injected [`EventSink`] and
/// the caller decides whether to log, display, or record them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    ItemCreated { item_id: String, name: String },
    SessionOpened { item_id: String, session: String },
    DescriptorResolved { session: String, references: usize },
    FileRegistered { session: String, name: String, size: u64 },
    RemoteFetchRegistered { session: String, name: String, uri: String },
    FileUploaded { session: String, name: String, bytes: u64 },
    SessionCompleted { item_id: String, session: String },
    SessionAborted { session: String, reason: String },
    TemplateCloned { item_id: String, source_moid: String },
    /// A lookup hit a fault that was not a plain "not found".
    LookupFailed { subject: String, message: String },
}

impl UploadEvent {
    /// Short machine-friendly name of the transition.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ItemCreated { .. } => "item_created",
            Self::SessionOpened { .. } => "session_opened",
            Self::DescriptorResolved { .. } => "descriptor_resolved",
            Self::FileRegistered { .. } => "file_registered",
            Self::RemoteFetchRegistered { .. } => "remote_fetch_registered",
            Self::FileUploaded { .. } => "file_uploaded",
            Self::SessionCompleted { .. } => "session_completed",
            Self::SessionAborted { .. } => "session_aborted",
            Self::TemplateCloned { .. } => "template_cloned",
            Self::LookupFailed { .. } => "lookup_failed",
        }
    }
}

impl fmt::Display for UploadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ItemCreated { item_id, name } => write!(f, "created item {name} ({item_id})"),
            Self::SessionOpened { item_id, session } => {
                write!(f, "opened session {session} for item {item_id}")
            }
            Self::DescriptorResolved { references, .. } => {
                write!(f, "descriptor lists {references} file(s)")
            }
            Self::FileRegistered { name, size, .. } => {
                write!(f, "registered {name} ({size} bytes)")
            }
            Self::RemoteFetchRegistered { name, uri, .. } => {
                write!(f, "registered {name} for remote fetch from {uri}")
            }
            Self::FileUploaded { name, bytes, .. } => write!(f, "uploaded {name} ({bytes} bytes)"),
            Self::SessionCompleted { item_id, session } => {
                write!(f, "completed session {session} for item {item_id}")
            }
            Self::SessionAborted { session, reason } => {
                write!(f, "aborted session {session}: {reason}")
            }
            Self::TemplateCloned {
                item_id,
                source_moid,
            } => write!(f, "cloned template {source_moid} into item {item_id}"),
            Self::LookupFailed { subject, message } => {
                write!(f, "lookup of {subject} failed: {message}")
            }
        }
    }
}

/// Receives lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &UploadEvent);
}

/// Forwards every event to `tracing` as one structured event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn emit(&self, event: &UploadEvent) {
        let kind = event.kind();
        match event {
            UploadEvent::ItemCreated { item_id, name } => {
                tracing::info!(event = kind, %item_id, %name, "{event}")
            }
            UploadEvent::SessionOpened { item_id, session } => {
                tracing::info!(event = kind, %item_id, %session, "{event}")
            }
            UploadEvent::DescriptorResolved {
                session,
                references,
            } => tracing::debug!(event = kind, %session, references, "{event}"),
            UploadEvent::FileRegistered {
                session,
                name,
                size,
            } => tracing::debug!(event = kind, %session, %name, size, "{event}"),
            UploadEvent::RemoteFetchRegistered { session, name, uri } => {
                tracing::info!(event = kind, %session, %name, %uri, "{event}")
            }
            UploadEvent::FileUploaded {
                session,
                name,
                bytes,
            } => tracing::info!(event = kind, %session, %name, bytes, "{event}"),
            UploadEvent::SessionCompleted { item_id, session } => {
                tracing::info!(event = kind, %item_id, %session, "{event}")
            }
            UploadEvent::SessionAborted { session, reason } => {
                tracing::warn!(event = kind, %session, %reason, "{event}")
            }
            UploadEvent::TemplateCloned {
                item_id,
                source_moid,
            } => tracing::info!(event = kind, %item_id, %source_moid, "{event}"),
            UploadEvent::LookupFailed { subject, message } => {
                tracing::warn!(event = kind, %subject, %message, "{event}")
            }
        }
    }
}
