use anyhow::{Context, Result};
use catalog_items::{NewItem, PollPolicy, TracingEvents, lookup};
use catalog_items_vapi::{ItemSource, ItemUploader, SourceSpec, VapiClient};

pub struct UploadArgs<'a> {
    pub library: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub item_type: &'a str,
    pub source: &'a str,
}

pub async fn run(
    client: &VapiClient,
    http: &reqwest::Client,
    poll: PollPolicy,
    args: UploadArgs<'_>,
) -> Result<()> {
    let spec = SourceSpec::classify(args.source)?;
    let library = lookup::library_from_name(client, args.library).await?;

    let events = TracingEvents;
    let uploader = ItemUploader::new(client, &events, http.clone())
        .with_upload_headers(client.session_headers())
        .with_poll_policy(poll);

    let item = NewItem::new(&library.id, args.name)
        .with_description(args.description)
        .with_type(args.item_type);
    let id = uploader
        .provision(&item, &ItemSource::Upload(spec))
        .await
        .with_context(|| format!("failed to upload {} into {}", args.source, library.name))?;

    println!("{id}");
    Ok(())
}
