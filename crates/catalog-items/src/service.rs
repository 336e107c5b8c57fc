use std::sync::Arc;

use crate::error::ServiceError;
use crate::item::{CatalogItem, CloneSpec, Library, SessionState, UploadTarget};

/// The remote catalog service.
///
/// Every method is one request against the service. Implementations map a
/// missing subject to [`ServiceError::NotFound`] and keep every other
/// failure distinct from it.
#[async_trait::async_trait]
pub trait CatalogService: Send + Sync {
    /// Fetch a library by ID.
    async fn library(&self, id: &str) -> Result<Library, ServiceError>;

    /// IDs of libraries with exactly this name.
    async fn find_libraries(&self, name: &str) -> Result<Vec<String>, ServiceError>;

    async fn create_library(&self, library: &Library) -> Result<String, ServiceError>;

    async fn delete_library(&self, id: &str) -> Result<(), ServiceError>;

    /// IDs of items named `name` inside library `library_id`.
    async fn find_items(&self, library_id: &str, name: &str) -> Result<Vec<String>, ServiceError>;

    async fn item(&self, id: &str) -> Result<CatalogItem, ServiceError>;

    /// Create an item. An item carrying an existing ID replaces that item.
    async fn create_item(&self, item: &CatalogItem) -> Result<String, ServiceError>;

    async fn delete_item(&self, id: &str) -> Result<(), ServiceError>;

    /// Open an update session against an item, returning its token.
    async fn create_update_session(&self, item_id: &str) -> Result<String, ServiceError>;

    /// Register a file the client will push; returns where to push it.
    async fn add_push_file(
        &self,
        session: &str,
        name: &str,
        size: u64,
    ) -> Result<UploadTarget, ServiceError>;

    /// Register a file the service fetches itself from `uri`.
    async fn add_pull_file(&self, session: &str, name: &str, uri: &str)
    -> Result<(), ServiceError>;

    async fn session_state(&self, session: &str) -> Result<SessionState, ServiceError>;

    /// Commit the session. Fails if a registered file is missing or short.
    async fn complete_session(&self, session: &str) -> Result<(), ServiceError>;

    /// Discard the session and anything pushed into it.
    async fn cancel_session(&self, session: &str) -> Result<(), ServiceError>;

    /// Create an OVF item by cloning a deployed template.
    async fn create_ovf_from_template(&self, spec: &CloneSpec) -> Result<String, ServiceError>;
}

#[async_trait::async_trait]
impl<T: CatalogService + ?Sized> CatalogService for Arc<T> {
    async fn library(&self, id: &str) -> Result<Library, ServiceError> {
        (**self).library(id).await
    }

    async fn find_libraries(&self, name: &str) -> Result<Vec<String>, ServiceError> {
        (**self).find_libraries(name).await
    }

    async fn create_library(&self, library: &Library) -> Result<String, ServiceError> {
        (**self).create_library(library).await
    }

    async fn delete_library(&self, id: &str) -> Result<(), ServiceError> {
        (**self).delete_library(id).await
    }

    async fn find_items(&self, library_id: &str, name: &str) -> Result<Vec<String>, ServiceError> {
        (**self).find_items(library_id, name).await
    }

    async fn item(&self, id: &str) -> Result<CatalogItem, ServiceError> {
        (**self).item(id).await
    }

    async fn create_item(&self, item: &CatalogItem) -> Result<String, ServiceError> {
        (**self).create_item(item).await
    }

    async fn delete_item(&self, id: &str) -> Result<(), ServiceError> {
        (**self).delete_item(id).await
    }

    async fn create_update_session(&self, item_id: &str) -> Result<String, ServiceError> {
        (**self).create_update_session(item_id).await
    }

    async fn add_push_file(
        &self,
        session: &str,
        name: &str,
        size: u64,
    ) -> Result<UploadTarget, ServiceError> {
        (**self).add_push_file(session, name, size).await
    }

    async fn add_pull_file(
        &self,
        session: &str,
        name: &str,
        uri: &str,
    ) -> Result<(), ServiceError> {
        (**self).add_pull_file(session, name, uri).await
    }

    async fn session_state(&self, session: &str) -> Result<SessionState, ServiceError> {
        (**self).session_state(session).await
    }

    async fn complete_session(&self, session: &str) -> Result<(), ServiceError> {
        (**self).complete_session(session).await
    }

    async fn cancel_session(&self, session: &str) -> Result<(), ServiceError> {
        (**self).cancel_session(session).await
    }

    async fn create_ovf_from_template(&self, spec: &CloneSpec) -> Result<String, ServiceError> {
        (**self).create_ovf_from_template(spec).await
    }
}
