pub mod archive;
pub mod clone;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod item;
pub mod lookup;
pub mod placement;
pub mod service;
pub mod session;

pub use archive::{ArchiveEntry, locate, locate_by};
pub use clone::clone_template;
pub use descriptor::{DescriptorDecoder, Envelope, OvfDecoder, read_envelope};
pub use error::{CatalogError, ServiceError};
pub use events::{EventSink, TracingEvents, UploadEvent};
pub use item::{
    CatalogItem, CloneSpec, FileReference, Library, NewItem, OVF_ITEM_TYPE, SessionState,
    StorageBacking, UploadTarget,
};
pub use service::CatalogService;
pub use session::{PollPolicy, SessionManager, UploadSession};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
