use serde::{Deserialize, Serialize};

/// Every response body of the REST API wraps its payload in `value`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub value: T,
}

/// `{"create_spec": ...}` request body.
#[derive(Debug, Serialize)]
pub struct CreateSpec<T> {
    pub create_spec: T,
}

/// Body of the `~action=find` calls.
#[derive(Debug, Serialize)]
pub struct FindSpec<T> {
    pub spec: T,
}

#[derive(Debug, Serialize)]
pub struct LibraryFind<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ItemFind<'a> {
    pub library_id: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SessionCreate<'a> {
    pub library_item_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct FileAdd<'a> {
    pub file_spec: FileSpec<'a>,
}

/// How a file enters an update session.
#[derive(Debug, Serialize)]
pub struct FileSpec<'a> {
    pub name: &'a str,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_endpoint: Option<Endpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceType {
    Push,
    Pull,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Endpoint {
    pub uri: String,
}

/// Answer to a file registration.
#[derive(Debug, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub upload_endpoint: Option<Endpoint>,
}

#[derive(Debug, Deserialize)]
pub struct SessionInfo {
    pub state: String,
    #[serde(default)]
    pub error_message: Option<LocalizedMessage>,
}

#[derive(Debug, Deserialize)]
pub struct LocalizedMessage {
    #[serde(default)]
    pub default_message: String,
}

/// `POST /rest/com/vmware/vcenter/ovf/library-item` request body.
#[derive(Debug, Serialize)]
pub struct OvfCreate<'a> {
    pub create_spec: OvfCreateSpec<'a>,
    pub source: ResourceId<'a>,
    pub target: LibraryTarget<'a>,
}

#[derive(Debug, Serialize)]
pub struct OvfCreateSpec<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ResourceId<'a> {
    #[serde(rename = "type")]
    pub resource_type: &'a str,
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LibraryTarget<'a> {
    pub library_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct OvfCreateResult {
    pub succeeded: bool,
    #[serde(default)]
    pub ovf_library_item_id: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Error body returned alongside a failing status.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub value: Option<ErrorValue>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorValue {
    #[serde(default)]
    pub messages: Vec<LocalizedMessage>,
}

impl ErrorBody {
    /// First localized message, falling back to the error type.
    pub fn summary(&self) -> String {
        self.value
            .as_ref()
            .and_then(|v| v.messages.first())
            .map(|m| m.default_message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.error_type.clone())
    }
}
