use anyhow::{Result, bail};
use catalog_items::{TracingEvents, lookup};
use catalog_items_vapi::VapiClient;

/// Exit successfully only when `id` names an existing library item.
pub async fn run(client: &VapiClient, id: &str) -> Result<()> {
    if lookup::is_catalog_item(client, &TracingEvents, id).await {
        println!("{id} is a content library item");
        return Ok(());
    }
    bail!("{id} is not a content library item");
}
