use crate::error::CatalogError;
use crate::events::{EventSink, UploadEvent};
use crate::item::{CloneSpec, OVF_ITEM_TYPE};
use crate::service::CatalogService;

/// Create a library item by cloning a deployed template on the server side.
///
/// No session is opened and no bytes move through this process. Only the
/// `ovf` item type can be produced this way.
pub async fn clone_template(
    service: &dyn CatalogService,
    events: &dyn EventSink,
    library_id: &str,
    source_moid: &str,
    name: &str,
    template_type: &str,
) -> Result<String, CatalogError> {
    if template_type != OVF_ITEM_TYPE {
        return Err(CatalogError::UnsupportedTemplateType(
            template_type.to_owned(),
        ));
    }

    let spec = CloneSpec {
        source_moid: source_moid.to_owned(),
        target_library_id: library_id.to_owned(),
        name: name.to_owned(),
    };
    let id = service
        .create_ovf_from_template(&spec)
        .await
        .map_err(|e| CatalogError::provider("CreateOVF", source_moid, e))?;

    if id.is_empty() {
        return Err(CatalogError::provider(
            "CreateOVF",
            source_moid,
            "service returned an empty item id",
        ));
    }

    events.emit(&UploadEvent::TemplateCloned {
        item_id: id.clone(),
        source_moid: source_moid.to_owned(),
    });
    Ok(id)
}
