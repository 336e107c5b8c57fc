use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::ServiceError;
use crate::events::{EventSink, UploadEvent};
use crate::item::{CatalogItem, CloneSpec, Library, SessionState, UploadTarget};
use crate::service::CatalogService;

/// A request received by [`InMemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateLibrary { name: String },
    DeleteLibrary { id: String },
    CreateItem { name: String, id: Option<String> },
    DeleteItem { id: String },
    CreateUpdateSession { item_id: String },
    AddPushFile { session: String, name: String, size: u64 },
    AddPullFile { session: String, name: String, uri: String },
    SessionState { session: String },
    CompleteSession { session: String },
    CancelSession { session: String },
    CreateOvfFromTemplate { moid: String, name: String },
}

#[derive(Default)]
struct State {
    next_id: u64,
    libraries: HashMap<String, Library>,
    items: HashMap<String, CatalogItem>,
    calls: Vec<Call>,
    failing: HashSet<String>,
    pending_polls: usize,
    session_error: Option<String>,
}

impl State {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// In-memory catalog service for testing.
///
/// Push endpoints are issued under `upload_base` as
/// `{upload_base}/upload/{session}/{name}`, so tests can point them at a
/// mock HTTP server.
pub struct InMemoryCatalog {
    upload_base: String,
    state: Mutex<State>,
}

impl InMemoryCatalog {
    pub fn new(upload_base: impl Into<String>) -> Self {
        Self {
            upload_base: upload_base.into(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn add_library(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next("library");
        state.libraries.insert(
            id.clone(),
            Library {
                id: id.clone(),
                name: name.to_owned(),
                library_type: "LOCAL".to_owned(),
                ..Library::default()
            },
        );
        id
    }

    pub fn add_item(&self, library_id: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next("item");
        state.items.insert(
            id.clone(),
            CatalogItem {
                id: id.clone(),
                library_id: library_id.to_owned(),
                name: name.to_owned(),
                description: String::new(),
                item_type: "ovf".to_owned(),
            },
        );
        id
    }

    /// Make the named trait method fail with a transport error.
    pub fn fail_on(&self, method: &str) {
        self.state.lock().unwrap().failing.insert(method.to_owned());
    }

    /// Report the session pending this many times before it becomes ready.
    pub fn set_pending_polls(&self, polls: usize) {
        self.state.lock().unwrap().pending_polls = polls;
    }

    pub fn set_session_error(&self, message: &str) {
        self.state.lock().unwrap().session_error = Some(message.to_owned());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Names of pushed files, in registration order.
    pub fn registered_files(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddPushFile { name, .. } | Call::AddPullFile { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn completed_sessions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CompleteSession { session } => Some(session),
                _ => None,
            })
            .collect()
    }

    pub fn cancelled_sessions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CancelSession { session } => Some(session),
                _ => None,
            })
            .collect()
    }

    pub fn items(&self) -> Vec<CatalogItem> {
        self.state.lock().unwrap().items.values().cloned().collect()
    }

    fn record(&self, method: &str, call: Option<Call>) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(call) = call {
            state.calls.push(call);
        }
        if state.failing.contains(method) {
            return Err(ServiceError::Transport(format!(
                "injected failure in {method}"
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogService for InMemoryCatalog {
    async fn library(&self, id: &str) -> Result<Library, ServiceError> {
        self.record("library", None)?;
        self.state
            .lock()
            .unwrap()
            .libraries
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.to_owned()))
    }

    async fn find_libraries(&self, name: &str) -> Result<Vec<String>, ServiceError> {
        self.record("find_libraries", None)?;
        let state = self.state.lock().unwrap();
        let mut ids: Vec<String> = state
            .libraries
            .values()
            .filter(|l| l.name == name)
            .map(|l| l.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn create_library(&self, library: &Library) -> Result<String, ServiceError> {
        self.record(
            "create_library",
            Some(Call::CreateLibrary {
                name: library.name.clone(),
            }),
        )?;
        let mut state = self.state.lock().unwrap();
        let id = state.next("library");
        let mut stored = library.clone();
        stored.id = id.clone();
        state.libraries.insert(id.clone(), stored);
        Ok(id)
    }

    async fn delete_library(&self, id: &str) -> Result<(), ServiceError> {
        self.record("delete_library", Some(Call::DeleteLibrary { id: id.to_owned() }))?;
        self.state
            .lock()
            .unwrap()
            .libraries
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(id.to_owned()))
    }

    async fn find_items(&self, library_id: &str, name: &str) -> Result<Vec<String>, ServiceError> {
        self.record("find_items", None)?;
        let state = self.state.lock().unwrap();
        let mut ids: Vec<String> = state
            .items
            .values()
            .filter(|i| i.library_id == library_id && i.name == name)
            .map(|i| i.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn item(&self, id: &str) -> Result<CatalogItem, ServiceError> {
        self.record("item", None)?;
        self.state
            .lock()
            .unwrap()
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.to_owned()))
    }

    async fn create_item(&self, item: &CatalogItem) -> Result<String, ServiceError> {
        self.record(
            "create_item",
            Some(Call::CreateItem {
                name: item.name.clone(),
                id: (!item.id.is_empty()).then(|| item.id.clone()),
            }),
        )?;
        let mut state = self.state.lock().unwrap();
        let id = if item.id.is_empty() {
            state.next("item")
        } else {
            item.id.clone()
        };
        let mut stored = item.clone();
        stored.id = id.clone();
        state.items.insert(id.clone(), stored);
        Ok(id)
    }

    async fn delete_item(&self, id: &str) -> Result<(), ServiceError> {
        self.record("delete_item", Some(Call::DeleteItem { id: id.to_owned() }))?;
        self.state
            .lock()
            .unwrap()
            .items
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(id.to_owned()))
    }

    async fn create_update_session(&self, item_id: &str) -> Result<String, ServiceError> {
        self.record(
            "create_update_session",
            Some(Call::CreateUpdateSession {
                item_id: item_id.to_owned(),
            }),
        )?;
        Ok(self.state.lock().unwrap().next("session"))
    }

    async fn add_push_file(
        &self,
        session: &str,
        name: &str,
        size: u64,
    ) -> Result<UploadTarget, ServiceError> {
        self.record(
            "add_push_file",
            Some(Call::AddPushFile {
                session: session.to_owned(),
                name: name.to_owned(),
                size,
            }),
        )?;
        Ok(UploadTarget {
            endpoint_uri: format!("{}/upload/{session}/{name}", self.upload_base),
            declared_size: size,
        })
    }

    async fn add_pull_file(
        &self,
        session: &str,
        name: &str,
        uri: &str,
    ) -> Result<(), ServiceError> {
        self.record(
            "add_pull_file",
            Some(Call::AddPullFile {
                session: session.to_owned(),
                name: name.to_owned(),
                uri: uri.to_owned(),
            }),
        )
    }

    async fn session_state(&self, session: &str) -> Result<SessionState, ServiceError> {
        self.record(
            "session_state",
            Some(Call::SessionState {
                session: session.to_owned(),
            }),
        )?;
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.session_error {
            return Ok(SessionState::Error(message.clone()));
        }
        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            return Ok(SessionState::Pending);
        }
        Ok(SessionState::Ready)
    }

    async fn complete_session(&self, session: &str) -> Result<(), ServiceError> {
        self.record(
            "complete_session",
            Some(Call::CompleteSession {
                session: session.to_owned(),
            }),
        )
    }

    async fn cancel_session(&self, session: &str) -> Result<(), ServiceError> {
        self.record(
            "cancel_session",
            Some(Call::CancelSession {
                session: session.to_owned(),
            }),
        )
    }

    async fn create_ovf_from_template(&self, spec: &CloneSpec) -> Result<String, ServiceError> {
        self.record(
            "create_ovf_from_template",
            Some(Call::CreateOvfFromTemplate {
                moid: spec.source_moid.clone(),
                name: spec.name.clone(),
            }),
        )?;
        let mut state = self.state.lock().unwrap();
        let id = state.next("item");
        state.items.insert(
            id.clone(),
            CatalogItem {
                id: id.clone(),
                library_id: spec.target_library_id.clone(),
                name: spec.name.clone(),
                description: String::new(),
                item_type: "ovf".to_owned(),
            },
        );
        Ok(id)
    }
}

/// Event sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<UploadEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<UploadEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: &UploadEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
