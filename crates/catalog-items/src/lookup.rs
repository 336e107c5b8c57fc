//! Lookup and CRUD helpers for libraries and their items.

use crate::error::{CatalogError, ServiceError};
use crate::events::{EventSink, UploadEvent};
use crate::item::{CatalogItem, Library, StorageBacking};
use crate::service::CatalogService;

/// Only local libraries can be created.
pub const LOCAL_LIBRARY: &str = "LOCAL";

pub async fn library_from_name(
    service: &dyn CatalogService,
    name: &str,
) -> Result<Library, CatalogError> {
    tracing::debug!(library = name, "retrieving content library by name");
    let ids = service
        .find_libraries(name)
        .await
        .map_err(|e| CatalogError::provider("FromName", name, e))?;
    let Some(id) = ids.first() else {
        return Err(CatalogError::NotFound(format!("content library {name}")));
    };
    service
        .library(id)
        .await
        .map_err(|e| CatalogError::provider("FromName", name, e))
}

pub async fn library_from_id(
    service: &dyn CatalogService,
    id: &str,
) -> Result<Library, CatalogError> {
    match service.library(id).await {
        Ok(library) => Ok(library),
        Err(ServiceError::NotFound(_)) => {
            Err(CatalogError::NotFound(format!("content library {id}")))
        }
        Err(e) => Err(CatalogError::provider("FromID", id, e)),
    }
}

/// Create a local library placed on `backings`. Returns its ID.
pub async fn create_library(
    service: &dyn CatalogService,
    name: &str,
    description: &str,
    backings: Vec<StorageBacking>,
) -> Result<String, CatalogError> {
    let library = Library {
        id: String::new(),
        name: name.to_owned(),
        description: description.to_owned(),
        library_type: LOCAL_LIBRARY.to_owned(),
        storage: backings,
    };
    let id = service
        .create_library(&library)
        .await
        .map_err(|e| CatalogError::provider("CreateLibrary", name, e))?;
    tracing::info!(library = name, id = %id, "content library created");
    Ok(id)
}

pub async fn delete_library(
    service: &dyn CatalogService,
    library: &Library,
) -> Result<(), CatalogError> {
    service
        .delete_library(&library.id)
        .await
        .map_err(|e| CatalogError::provider("DeleteLibrary", &library.id, e))?;
    tracing::info!(library = %library.name, "content library deleted");
    Ok(())
}

/// Find the item called `name` in `library`.
pub async fn item_from_name(
    service: &dyn CatalogService,
    library: &Library,
    name: &str,
) -> Result<CatalogItem, CatalogError> {
    let ids = service
        .find_items(&library.id, name)
        .await
        .map_err(|e| CatalogError::provider("ItemFromName", name, e))?;
    let Some(id) = ids.first() else {
        return Err(CatalogError::NotFound(format!(
            "content library item {name}"
        )));
    };
    service
        .item(id)
        .await
        .map_err(|e| CatalogError::provider("ItemFromName", name, e))
}

pub async fn item_from_id(
    service: &dyn CatalogService,
    id: &str,
) -> Result<CatalogItem, CatalogError> {
    match service.item(id).await {
        Ok(item) => Ok(item),
        Err(ServiceError::NotFound(_)) => {
            Err(CatalogError::NotFound(format!("content library item {id}")))
        }
        Err(e) => Err(CatalogError::provider("ItemFromID", id, e)),
    }
}

/// Whether `id` names an existing library item.
///
/// Never fails: absence answers `false`. Any other fault also answers
/// `false` but is reported through `events` so it is not mistaken for
/// absence.
pub async fn is_catalog_item(
    service: &dyn CatalogService,
    events: &dyn EventSink,
    id: &str,
) -> bool {
    match service.item(id).await {
        Ok(_) => true,
        Err(ServiceError::NotFound(_)) => false,
        Err(e) => {
            events.emit(&UploadEvent::LookupFailed {
                subject: id.to_owned(),
                message: e.to_string(),
            });
            false
        }
    }
}

/// Update an item's name and description.
///
/// The service has no in-place update, so this re-creates the item under its
/// existing ID; content is not carried over by the service.
pub async fn update_item(
    service: &dyn CatalogService,
    library: &Library,
    existing: &CatalogItem,
    name: &str,
    description: &str,
) -> Result<String, CatalogError> {
    let item = CatalogItem {
        id: existing.id.clone(),
        library_id: library.id.clone(),
        name: name.to_owned(),
        description: description.to_owned(),
        item_type: existing.item_type.clone(),
    };
    service
        .create_item(&item)
        .await
        .map_err(|e| CatalogError::provider("UpdateLibraryItem", &existing.id, e))
}

pub async fn delete_item(
    service: &dyn CatalogService,
    item: &CatalogItem,
) -> Result<(), CatalogError> {
    service
        .delete_item(&item.id)
        .await
        .map_err(|e| CatalogError::provider("DeleteLibraryItem", &item.id, e))?;
    tracing::info!(item = %item.name, "content library item deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, InMemoryCatalog, RecordingEvents};

    #[tokio::test]
    async fn library_by_name_and_id() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let id = catalog.add_library("images");

        assert_eq!(library_from_name(&catalog, "images").await.unwrap().id, id);
        assert_eq!(library_from_id(&catalog, &id).await.unwrap().name, "images");
    }

    #[tokio::test]
    async fn unknown_library_name_is_not_found() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let err = library_from_name(&catalog, "nope").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn item_by_name_searches_within_library() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let lib_id = catalog.add_library("images");
        let other = catalog.add_library("other");
        catalog.add_item(&other, "photon");
        let id = catalog.add_item(&lib_id, "photon");

        let library = library_from_id(&catalog, &lib_id).await.unwrap();
        assert_eq!(item_from_name(&catalog, &library, "photon").await.unwrap().id, id);
        assert!(matches!(
            item_from_name(&catalog, &library, "ubuntu").await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn item_lookup_fault_is_provider_error() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        catalog.fail_on("item");
        let err = item_from_id(&catalog, "item-1").await.unwrap_err();
        assert!(matches!(err, CatalogError::Provider { operation: "ItemFromID", .. }));
    }

    #[tokio::test]
    async fn is_catalog_item_answers_without_failing() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let events = RecordingEvents::default();
        let id = catalog.add_item("library-1", "photon");

        assert!(is_catalog_item(&catalog, &events, &id).await);
        assert!(!is_catalog_item(&catalog, &events, "item-404").await);
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn is_catalog_item_reports_transport_faults() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        catalog.fail_on("item");
        let events = RecordingEvents::default();

        assert!(!is_catalog_item(&catalog, &events, "item-1").await);
        assert_eq!(events.kinds(), vec!["lookup_failed"]);
    }

    #[tokio::test]
    async fn create_library_is_local() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let id = create_library(
            &catalog,
            "images",
            "golden images",
            vec![StorageBacking::datastore("datastore-1")],
        )
        .await
        .unwrap();

        let library = library_from_id(&catalog, &id).await.unwrap();
        assert_eq!(library.library_type, "LOCAL");
        assert_eq!(library.storage.len(), 1);
    }

    #[tokio::test]
    async fn update_recreates_item_with_existing_id() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let lib_id = catalog.add_library("images");
        let id = catalog.add_item(&lib_id, "photon");
        let library = library_from_id(&catalog, &lib_id).await.unwrap();
        let existing = item_from_id(&catalog, &id).await.unwrap();

        let updated = update_item(&catalog, &library, &existing, "photon-5", "new")
            .await
            .unwrap();

        assert_eq!(updated, id);
        assert!(catalog.calls().contains(&Call::CreateItem {
            name: "photon-5".into(),
            id: Some(id.clone())
        }));
    }

    #[tokio::test]
    async fn delete_removes_item_and_library() {
        let catalog = InMemoryCatalog::new("http://upload.invalid");
        let lib_id = catalog.add_library("images");
        let id = catalog.add_item(&lib_id, "photon");

        let item = item_from_id(&catalog, &id).await.unwrap();
        delete_item(&catalog, &item).await.unwrap();
        assert!(!is_catalog_item(&catalog, &RecordingEvents::default(), &id).await);

        let library = library_from_id(&catalog, &lib_id).await.unwrap();
        delete_library(&catalog, &library).await.unwrap();
        assert!(matches!(
            library_from_id(&catalog, &lib_id).await,
            Err(CatalogError::NotFound(_))
        ));
    }
}
