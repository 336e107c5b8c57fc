pub mod fetch;
pub mod rest;
pub mod source;
pub mod transport;
pub mod upload;

pub use fetch::{ByteStream, Fetched, MAX_DESCRIPTOR_SIZE, SourceFetcher, read_descriptor};
pub use rest::{SESSION_HEADER, VapiClient};
pub use source::{ARCHIVE_EXTENSION, Location, Packaging, SourceSpec};
pub use transport::{ExactLength, Uploader};
pub use upload::{ItemSource, ItemUploader};
