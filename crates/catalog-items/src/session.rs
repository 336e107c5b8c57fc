use std::time::Duration;

use crate::error::CatalogError;
use crate::events::{EventSink, UploadEvent};
use crate::item::{NewItem, SessionState, UploadTarget};
use crate::service::CatalogService;

/// Default interval between session state polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How to wait for a remote-fetch registration to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits for as long as the service reports the session pending.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// Creates items and opens update sessions against them.
pub struct SessionManager<'a> {
    service: &'a dyn CatalogService,
    events: &'a dyn EventSink,
}

impl<'a> SessionManager<'a> {
    pub fn new(service: &'a dyn CatalogService, events: &'a dyn EventSink) -> Self {
        Self { service, events }
    }

    pub async fn create_item(&self, item: &NewItem) -> Result<String, CatalogError> {
        let id = self
            .service
            .create_item(&item.to_catalog_item())
            .await
            .map_err(|e| CatalogError::provider("CreateLibraryItem", &item.name, e))?;

        self.events.emit(&UploadEvent::ItemCreated {
            item_id: id.clone(),
            name: item.name.clone(),
        });
        Ok(id)
    }

    pub async fn open_session(&self, item_id: &str) -> Result<UploadSession<'a>, CatalogError> {
        let token = self
            .service
            .create_update_session(item_id)
            .await
            .map_err(|e| CatalogError::SessionCreateFailed {
                item_id: item_id.to_owned(),
                message: e.to_string(),
            })?;

        self.events.emit(&UploadEvent::SessionOpened {
            item_id: item_id.to_owned(),
            session: token.clone(),
        });
        Ok(UploadSession {
            service: self.service,
            events: self.events,
            token,
            item_id: item_id.to_owned(),
        })
    }
}

/// An open update session.
///
/// [`complete`](Self::complete) and [`abort`](Self::abort) consume the
/// session, so it is closed at most once.
pub struct UploadSession<'a> {
    service: &'a dyn CatalogService,
    events: &'a dyn EventSink,
    token: String,
    item_id: String,
}

impl std::fmt::Debug for UploadSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("token", &self.token)
            .field("item_id", &self.item_id)
            .finish()
    }
}

impl<'a> UploadSession<'a> {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn events(&self) -> &'a dyn EventSink {
        self.events
    }

    /// Register a file the caller will push, returning its endpoint.
    pub async fn register_file(&self, name: &str, size: u64) -> Result<UploadTarget, CatalogError> {
        let target = self
            .service
            .add_push_file(&self.token, name, size)
            .await
            .map_err(|e| CatalogError::provider("AddLibraryItemFile", name, e))?;

        self.events.emit(&UploadEvent::FileRegistered {
            session: self.token.clone(),
            name: name.to_owned(),
            size,
        });
        Ok(target)
    }

    /// Ask the service to fetch `uri` itself and store it as `name`.
    pub async fn register_remote_fetch(&self, name: &str, uri: &str) -> Result<(), CatalogError> {
        self.service
            .add_pull_file(&self.token, name, uri)
            .await
            .map_err(|e| CatalogError::provider("AddLibraryItemFileFromURI", name, e))?;

        self.events.emit(&UploadEvent::RemoteFetchRegistered {
            session: self.token.clone(),
            name: name.to_owned(),
            uri: uri.to_owned(),
        });
        Ok(())
    }

    /// Poll until the service no longer reports the session pending.
    pub async fn wait_until_processed(&self, policy: &PollPolicy) -> Result<(), CatalogError> {
        let started = tokio::time::Instant::now();

        loop {
            let state = self
                .service
                .session_state(&self.token)
                .await
                .map_err(|e| {
                    CatalogError::provider("WaitOnLibraryItemUpdateSession", &self.token, e)
                })?;

            match state {
                SessionState::Ready => return Ok(()),
                SessionState::Error(message) => {
                    return Err(CatalogError::provider(
                        "WaitOnLibraryItemUpdateSession",
                        &self.token,
                        message,
                    ));
                }
                SessionState::Pending => {}
            }

            if let Some(timeout) = policy.timeout
                && started.elapsed() + policy.interval > timeout
            {
                return Err(CatalogError::WaitTimedOut {
                    session: self.token.clone(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }

            tracing::debug!(session = %self.token, "waiting for remote fetch");
            tokio::time::sleep(policy.interval).await;
        }
    }

    /// Commit everything pushed into the session.
    pub async fn complete(self) -> Result<(), CatalogError> {
        self.service
            .complete_session(&self.token)
            .await
            .map_err(|e| {
                CatalogError::provider("CompleteLibraryItemUpdateSession", &self.item_id, e)
            })?;

        self.events.emit(&UploadEvent::SessionCompleted {
            item_id: self.item_id,
            session: self.token,
        });
        Ok(())
    }

    /// Discard the session. `reason` is recorded on the emitted event.
    pub async fn abort(self, reason: &str) -> Result<(), CatalogError> {
        self.service
            .cancel_session(&self.token)
            .await
            .map_err(|e| {
                CatalogError::provider("CancelLibraryItemUpdateSession", &self.item_id, e)
            })?;

        self.events.emit(&UploadEvent::SessionAborted {
            session: self.token,
            reason: reason.to_owned(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, InMemoryCatalog, RecordingEvents};

    #[tokio::test]
    async fn create_item_then_open_session() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let events = RecordingEvents::default();
        let manager = SessionManager::new(&catalog, &events);

        let item_id = manager
            .create_item(&NewItem::new("lib-1", "photon"))
            .await
            .unwrap();
        let session = manager.open_session(&item_id).await.unwrap();

        assert_eq!(session.item_id(), item_id);
        assert!(!session.token().is_empty());
        assert_eq!(events.kinds(), vec!["item_created", "session_opened"]);
    }

    #[tokio::test]
    async fn open_session_failure_is_session_create_failed() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        catalog.fail_on("create_update_session");
        let events = RecordingEvents::default();
        let manager = SessionManager::new(&catalog, &events);

        let err = manager.open_session("item-1").await.unwrap_err();
        assert!(matches!(err, CatalogError::SessionCreateFailed { .. }));
    }

    #[tokio::test]
    async fn create_item_failure_is_provider_error() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        catalog.fail_on("create_item");
        let events = RecordingEvents::default();
        let manager = SessionManager::new(&catalog, &events);

        let err = manager
            .create_item(&NewItem::new("lib-1", "photon"))
            .await
            .unwrap_err();
        match err {
            CatalogError::Provider {
                operation, subject, ..
            } => {
                assert_eq!(operation, "CreateLibraryItem");
                assert_eq!(subject, "photon");
            }
            other => panic!("expected Provider, got {other:?}"),
        }
        assert!(events.kinds().is_empty());
    }

    #[tokio::test]
    async fn register_file_returns_endpoint() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let events = RecordingEvents::default();
        let manager = SessionManager::new(&catalog, &events);
        let session = manager.open_session("item-1").await.unwrap();

        let target = session.register_file("disk-0.vmdk", 42).await.unwrap();
        assert_eq!(target.declared_size, 42);
        assert!(target.endpoint_uri.starts_with("http://upload.invalid/"));
        assert!(target.endpoint_uri.ends_with("/disk-0.vmdk"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_polls_until_ready() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        catalog.set_pending_polls(3);
        let events = RecordingEvents::default();
        let manager = SessionManager::new(&catalog, &events);
        let session = manager.open_session("item-1").await.unwrap();

        session
            .wait_until_processed(&PollPolicy::default())
            .await
            .unwrap();

        let polls = catalog
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::SessionState { .. }))
            .count();
        assert_eq!(polls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_honours_timeout() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        catalog.set_pending_polls(100);
        let events = RecordingEvents::default();
        let manager = SessionManager::new(&catalog, &events);
        let session = manager.open_session("item-1").await.unwrap();

        let policy = PollPolicy {
            interval: Duration::from_secs(10),
            timeout: Some(Duration::from_secs(30)),
        };
        let err = session.wait_until_processed(&policy).await.unwrap_err();
        assert!(matches!(err, CatalogError::WaitTimedOut { .. }));
    }

    #[tokio::test]
    async fn wait_surfaces_server_error() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        catalog.set_session_error("source unreachable");
        let events = RecordingEvents::default();
        let manager = SessionManager::new(&catalog, &events);
        let session = manager.open_session("item-1").await.unwrap();

        let err = session
            .wait_until_processed(&PollPolicy::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("source unreachable"));
    }

    #[tokio::test]
    async fn complete_and_abort_emit_events() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let events = RecordingEvents::default();
        let manager = SessionManager::new(&catalog, &events);

        manager
            .open_session("item-1")
            .await
            .unwrap()
            .complete()
            .await
            .unwrap();
        manager
            .open_session("item-2")
            .await
            .unwrap()
            .abort("cancelled")
            .await
            .unwrap();

        assert_eq!(
            events.kinds(),
            vec![
                "session_opened",
                "session_completed",
                "session_opened",
                "session_aborted"
            ]
        );
        assert_eq!(catalog.completed_sessions().len(), 1);
        assert_eq!(catalog.cancelled_sessions().len(), 1);
    }
}
