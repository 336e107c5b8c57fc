use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use catalog_items::{CatalogError, UploadEvent, UploadSession, UploadTarget};
use futures::Stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

const STREAM_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Pushes file contents to endpoints issued by an update session.
#[derive(Debug, Clone, Default)]
pub struct Uploader {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl Uploader {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            headers: HeaderMap::new(),
        }
    }

    /// Headers sent with every upload, e.g. the API session header.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Register `name` against `session` and stream `reader` to its endpoint.
    ///
    /// `size` is declared up front and must equal what `reader` yields; a
    /// short or long stream fails with [`CatalogError::Transfer`]. Nothing is
    /// retried.
    pub async fn push<R>(
        &self,
        session: &UploadSession<'_>,
        name: &str,
        reader: R,
        size: u64,
    ) -> Result<(), CatalogError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let target = session.register_file(name, size).await?;
        self.send(&target, name, reader).await?;

        session.events().emit(&UploadEvent::FileUploaded {
            session: session.token().to_owned(),
            name: name.to_owned(),
            bytes: size,
        });
        Ok(())
    }

    /// Stream `reader` to an already issued target.
    pub async fn send<R>(
        &self,
        target: &UploadTarget,
        name: &str,
        reader: R,
    ) -> Result<(), CatalogError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let size = target.declared_size;
        let body = ExactLength::new(ReaderStream::with_capacity(reader, STREAM_CHUNK_SIZE), size);

        let response = self
            .client
            .put(&target.endpoint_uri)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(|e| CatalogError::Transfer(format!("upload of {name} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Transfer(format!(
                "upload of {name} rejected with HTTP {status}: {body}"
            )));
        }

        tracing::debug!(file = name, size, "upload accepted");
        Ok(())
    }
}

/// Passes chunks through while enforcing an exact total length.
///
/// One chunk is held back until the next poll shows whether more data
/// follows, so an over-long stream fails before the final declared byte is
/// released and a short one fails instead of ending.
pub struct ExactLength<S> {
    inner: S,
    expected: u64,
    seen: u64,
    held: Option<Bytes>,
    finished: bool,
}

impl<S> ExactLength<S> {
    pub fn new(inner: S, expected: u64) -> Self {
        Self {
            inner,
            expected,
            seen: 0,
            held: None,
            finished: false,
        }
    }

    fn fail(&mut self, kind: io::ErrorKind, message: String) -> Poll<Option<io::Result<Bytes>>> {
        self.finished = true;
        self.held = None;
        Poll::Ready(Some(Err(io::Error::new(kind, message))))
    }
}

impl<S> Stream for ExactLength<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => {
                    this.seen += chunk.len() as u64;
                    if this.seen > this.expected {
                        let message = format!(
                            "stream is longer than the declared {} bytes",
                            this.expected
                        );
                        return this.fail(io::ErrorKind::InvalidData, message);
                    }
                    if let Some(previous) = this.held.replace(chunk) {
                        return Poll::Ready(Some(Ok(previous)));
                    }
                }
                Some(Err(e)) => {
                    this.finished = true;
                    this.held = None;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    if this.seen < this.expected {
                        let message = format!(
                            "stream ended after {} of {} declared bytes",
                            this.seen, this.expected
                        );
                        return this.fail(io::ErrorKind::UnexpectedEof, message);
                    }
                    this.finished = true;
                    return Poll::Ready(this.held.take().map(Ok));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use futures::stream;

    use super::*;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = io::Result<Bytes>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    async fn drain<S>(stream: ExactLength<S>) -> (Vec<u8>, Option<io::Error>)
    where
        S: Stream<Item = io::Result<Bytes>> + Unpin,
    {
        let mut out = Vec::new();
        let mut stream = stream;
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(e) => return (out, Some(e)),
            }
        }
        (out, None)
    }

    #[tokio::test]
    async fn exact_stream_passes_through() {
        let (out, err) = drain(ExactLength::new(chunks(&[b"abc", b"", b"def"]), 6)).await;
        assert_eq!(out, b"abcdef");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn short_stream_fails_before_last_chunk() {
        let (out, err) = drain(ExactLength::new(chunks(&[b"abc", b"de"]), 6)).await;
        assert_eq!(out, b"abc");
        assert_eq!(err.unwrap().kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn long_stream_fails_without_releasing_excess() {
        let (out, err) = drain(ExactLength::new(chunks(&[b"abc", b"def", b"g"]), 6)).await;
        assert_eq!(out, b"abc");
        assert_eq!(err.unwrap().kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn empty_stream_matches_zero() {
        let (out, err) = drain(ExactLength::new(chunks(&[]), 0)).await;
        assert!(out.is_empty());
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn stream_ends_after_error() {
        let mut stream = ExactLength::new(chunks(&[b"ab"]), 3);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
