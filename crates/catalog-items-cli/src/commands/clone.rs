use anyhow::{Context, Result};
use catalog_items::{NewItem, TracingEvents, lookup};
use catalog_items_vapi::{ItemSource, ItemUploader, VapiClient};

pub async fn run(
    client: &VapiClient,
    http: &reqwest::Client,
    library: &str,
    name: &str,
    moid: &str,
    item_type: &str,
) -> Result<()> {
    let library = lookup::library_from_name(client, library).await?;

    let events = TracingEvents;
    let uploader = ItemUploader::new(client, &events, http.clone());
    let item = NewItem::new(&library.id, name).with_type(item_type);
    let id = uploader
        .provision(
            &item,
            &ItemSource::Template {
                moid: moid.to_owned(),
            },
        )
        .await
        .with_context(|| format!("failed to clone {moid} into {}", library.name))?;

    println!("{id}");
    Ok(())
}
