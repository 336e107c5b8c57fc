use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Component, Path};

use catalog_items::descriptor::DESCRIPTOR_EXTENSION;
use catalog_items::{
    CatalogError, CatalogService, DescriptorDecoder, EventSink, FileReference, NewItem,
    OvfDecoder, PollPolicy, SessionManager, UploadEvent, UploadSession, clone_template, locate,
    locate_by,
};
use reqwest::Url;
use reqwest::header::HeaderMap;

use crate::fetch::{SourceFetcher, read_descriptor};
use crate::source::{Location, Packaging, SourceSpec};
use crate::transport::Uploader;

/// What a new item is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSource {
    /// Stream a descriptor (and its disks) into a fresh item.
    Upload(SourceSpec),
    /// Let the service clone a deployed template identified by its moid.
    Template { moid: String },
}

/// Drives one item from creation to a committed update session.
pub struct ItemUploader<'a> {
    service: &'a dyn CatalogService,
    events: &'a dyn EventSink,
    fetcher: SourceFetcher,
    uploader: Uploader,
    decoder: Box<dyn DescriptorDecoder>,
    poll: PollPolicy,
}

impl<'a> ItemUploader<'a> {
    pub fn new(
        service: &'a dyn CatalogService,
        events: &'a dyn EventSink,
        client: reqwest::Client,
    ) -> Self {
        Self {
            service,
            events,
            fetcher: SourceFetcher::new(client.clone()),
            uploader: Uploader::new(client),
            decoder: Box::new(OvfDecoder),
            poll: PollPolicy::default(),
        }
    }

    /// Headers attached to every file push.
    pub fn with_upload_headers(mut self, headers: HeaderMap) -> Self {
        self.uploader = self.uploader.with_headers(headers);
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_decoder(mut self, decoder: Box<dyn DescriptorDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Create `item` from `source`, returning the new item id.
    pub async fn provision(
        &self,
        item: &NewItem,
        source: &ItemSource,
    ) -> Result<String, CatalogError> {
        match source {
            ItemSource::Upload(spec) => self.create_item(item, spec).await,
            ItemSource::Template { moid } => {
                clone_template(
                    self.service,
                    self.events,
                    &item.library_id,
                    moid,
                    &item.name,
                    &item.item_type,
                )
                .await
            }
        }
    }

    /// Create an item and upload `source` into it.
    ///
    /// Once a session is open it is either completed or aborted before this
    /// returns. An abort that itself fails is logged and the original error
    /// is returned.
    pub async fn create_item(
        &self,
        item: &NewItem,
        source: &SourceSpec,
    ) -> Result<String, CatalogError> {
        let manager = SessionManager::new(self.service, self.events);
        let item_id = manager.create_item(item).await?;
        let session = manager.open_session(&item_id).await?;

        match self.transfer(&session, source).await {
            Ok(()) => {
                session.complete().await?;
                Ok(item_id)
            }
            Err(err) => {
                let token = session.token().to_owned();
                if let Err(abort_err) = session.abort(&err.to_string()).await {
                    tracing::warn!(
                        session = %token,
                        error = %abort_err,
                        "failed to abort update session"
                    );
                }
                Err(err)
            }
        }
    }

    async fn transfer(
        &self,
        session: &UploadSession<'_>,
        source: &SourceSpec,
    ) -> Result<(), CatalogError> {
        tracing::info!(source = %source, session = session.token(), "uploading item content");

        let descriptor = match source.packaging {
            Packaging::Single => self.fetcher.read_to_string(&source.location).await?,
            Packaging::Archive => self.archived_descriptor(source).await?,
        };
        let envelope = self.decoder.decode(&descriptor)?;
        let references = unique(envelope.references);

        self.events.emit(&UploadEvent::DescriptorResolved {
            session: session.token().to_owned(),
            references: references.len(),
        });

        match (&source.location, source.packaging) {
            (Location::Local(path), Packaging::Single) => {
                self.push_local_tree(session, source, path, &references)
                    .await
            }
            (Location::Remote(url), Packaging::Single) => {
                self.fetch_remotely(session, &source.file_name(), url).await
            }
            (_, Packaging::Archive) => {
                let name = source.descriptor_name();
                let size = descriptor.len() as u64;
                self.uploader
                    .push(session, &name, Cursor::new(descriptor.into_bytes()), size)
                    .await?;

                for reference in &references {
                    self.push_archived(session, source, reference).await?;
                }
                Ok(())
            }
        }
    }

    /// Read the descriptor bundled in an archive.
    ///
    /// The scan is single pass, so the first descriptor-like entry wins.
    async fn archived_descriptor(&self, source: &SourceSpec) -> Result<String, CatalogError> {
        let expected = source.descriptor_name();
        let suffix = format!(".{DESCRIPTOR_EXTENSION}");
        let fetched = self.fetcher.resolve(&source.location).await?;

        let entry = locate_by(fetched.reader, |name| {
            name == expected || name.to_ascii_lowercase().ends_with(&suffix)
        })
        .await?
        .ok_or_else(|| CatalogError::DiskNotFoundInArchive {
            name: expected.clone(),
        })?;

        tracing::debug!(entry = entry.name(), "descriptor found in archive");
        read_descriptor(entry.into_payload()).await
    }

    /// Push a local descriptor, then each reference next to it.
    async fn push_local_tree(
        &self,
        session: &UploadSession<'_>,
        source: &SourceSpec,
        descriptor: &Path,
        references: &[FileReference],
    ) -> Result<(), CatalogError> {
        let dir = source.local_dir().unwrap_or_else(|| Path::new(""));
        let paths = references
            .iter()
            .map(|reference| Ok(dir.join(relative_reference(&reference.name)?)))
            .collect::<Result<Vec<_>, CatalogError>>()?;

        self.push_local_file(session, &source.file_name(), descriptor)
            .await?;
        for (reference, path) in references.iter().zip(&paths) {
            self.push_local_file(session, &reference.name, path).await?;
        }
        Ok(())
    }

    async fn push_local_file(
        &self,
        session: &UploadSession<'_>,
        name: &str,
        path: &Path,
    ) -> Result<(), CatalogError> {
        let fetched = self.fetcher.resolve_local(path).await?;
        let size = fetched.size.unwrap_or_default();
        self.uploader
            .push(session, name, fetched.reader, size)
            .await
    }

    /// Hand the descriptor URL to the service and wait for it to finish.
    async fn fetch_remotely(
        &self,
        session: &UploadSession<'_>,
        name: &str,
        url: &Url,
    ) -> Result<(), CatalogError> {
        session.register_remote_fetch(name, url.as_str()).await?;
        session.wait_until_processed(&self.poll).await
    }

    /// Reopen the archive and push one entry out of it.
    async fn push_archived(
        &self,
        session: &UploadSession<'_>,
        source: &SourceSpec,
        reference: &FileReference,
    ) -> Result<(), CatalogError> {
        let fetched = self.fetcher.resolve(&source.location).await?;
        let entry = locate(fetched.reader, &reference.name).await?;
        let size = reference.size.unwrap_or(entry.size());
        self.uploader
            .push(session, &reference.name, entry.into_payload(), size)
            .await
    }
}

/// A reference href as a path that stays inside the descriptor's directory.
fn relative_reference(href: &str) -> Result<&Path, CatalogError> {
    let path = Path::new(href);
    let contained = path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if href.is_empty() || !contained {
        return Err(CatalogError::DescriptorParse(format!(
            "file reference {href:?} is not relative to the descriptor"
        )));
    }
    Ok(path)
}

/// Drop repeated references, keeping the first occurrence of each name.
fn unique(references: Vec<FileReference>) -> Vec<FileReference> {
    let mut seen = HashSet::new();
    references
        .into_iter()
        .filter(|r| seen.insert(r.name.clone()))
        .collect()
}
