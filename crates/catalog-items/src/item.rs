use std::fmt;

use serde::{Deserialize, Serialize};

/// A content library: a named collection of reusable image items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Only `LOCAL` libraries can be created through this crate.
    #[serde(rename = "type", default)]
    pub library_type: String,
    #[serde(rename = "storage_backings", default)]
    pub storage: Vec<StorageBacking>,
}

/// Where a library may place its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBacking {
    #[serde(rename = "type")]
    pub backing_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datastore_id: String,
}

impl StorageBacking {
    pub const DATASTORE: &'static str = "DATASTORE";

    pub fn datastore(id: impl Into<String>) -> Self {
        Self {
            backing_type: Self::DATASTORE.to_owned(),
            datastore_id: id.into(),
        }
    }
}

/// One versioned artifact inside a library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub library_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
}

/// The identity of an item that is about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub library_id: String,
    pub name: String,
    pub description: String,
    pub item_type: String,
}

impl NewItem {
    pub fn new(library_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            library_id: library_id.into(),
            name: name.into(),
            description: String::new(),
            item_type: OVF_ITEM_TYPE.to_owned(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    pub fn to_catalog_item(&self) -> CatalogItem {
        CatalogItem {
            id: String::new(),
            library_id: self.library_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            item_type: self.item_type.clone(),
        }
    }
}

/// The only item type the template clone path accepts.
pub const OVF_ITEM_TYPE: &str = "ovf";

/// A file the descriptor says the item consists of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// Name as written in the descriptor's `href`, and as stored in archives.
    pub name: String,
    /// Declared size, when the descriptor carries one.
    pub size: Option<u64>,
}

impl FileReference {
    pub fn new(name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Endpoint issued by the service for one pushed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub endpoint_uri: String,
    pub declared_size: u64,
}

/// Server-side processing state of an update session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// A remote fetch registered against the session is still running.
    Pending,
    Ready,
    Error(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Request to create a library item by cloning an existing template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneSpec {
    pub source_moid: String,
    pub target_library_id: String,
    pub name: String,
}
