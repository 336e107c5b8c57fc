use std::path::Path;
use std::pin::Pin;

use catalog_items::CatalogError;
use futures::TryStreamExt;
use reqwest::Url;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

use crate::source::Location;

/// An owned, forward-only byte stream.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// An opened source.
pub struct Fetched {
    pub reader: ByteStream,
    /// Exact length for local files; the `Content-Length` of remote ones, if sent.
    pub size: Option<u64>,
}

impl std::fmt::Debug for Fetched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetched").field("size", &self.size).finish()
    }
}

/// Opens sources as streams, from disk or over HTTP.
#[derive(Debug, Clone, Default)]
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, location: &Location) -> Result<Fetched, CatalogError> {
        match location {
            Location::Local(path) => self.resolve_local(path).await,
            Location::Remote(url) => self.resolve_remote(url).await,
        }
    }

    /// Open a local file positioned at offset 0, with its exact length.
    pub async fn resolve_local(&self, path: &Path) -> Result<Fetched, CatalogError> {
        let not_found =
            |e: std::io::Error| CatalogError::NotFound(format!("{}: {e}", path.display()));

        let file = tokio::fs::File::open(path).await.map_err(not_found)?;
        let metadata = file.metadata().await.map_err(not_found)?;
        if !metadata.is_file() {
            return Err(CatalogError::NotFound(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        Ok(Fetched {
            reader: Box::pin(file),
            size: Some(metadata.len()),
        })
    }

    /// GET a remote source. Anything but a 2xx status is a failure.
    pub async fn resolve_remote(&self, url: &Url) -> Result<Fetched, CatalogError> {
        tracing::debug!(url = %url, "fetching remote source");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CatalogError::Transfer(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::RemoteFetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let size = response.content_length();
        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Fetched {
            reader: Box::pin(StreamReader::new(body)),
            size,
        })
    }

    /// Read a whole descriptor into memory.
    pub async fn read_to_string(&self, location: &Location) -> Result<String, CatalogError> {
        let fetched = self.resolve(location).await?;
        read_descriptor(fetched.reader).await
    }
}

/// Largest descriptor accepted into memory.
pub const MAX_DESCRIPTOR_SIZE: u64 = 16 * 1024 * 1024;

/// Drain `reader` into a string, rejecting non-UTF-8 content and anything
/// over [`MAX_DESCRIPTOR_SIZE`].
pub async fn read_descriptor<R>(reader: R) -> Result<String, CatalogError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::new();
    reader
        .take(MAX_DESCRIPTOR_SIZE + 1)
        .read_to_end(&mut raw)
        .await
        .map_err(|e| CatalogError::Transfer(format!("failed to read descriptor: {e}")))?;
    if raw.len() as u64 > MAX_DESCRIPTOR_SIZE {
        return Err(CatalogError::DescriptorParse(format!(
            "descriptor exceeds {MAX_DESCRIPTOR_SIZE} bytes"
        )));
    }
    String::from_utf8(raw)
        .map_err(|e| CatalogError::DescriptorParse(format!("invalid UTF-8: {e}")))
}
