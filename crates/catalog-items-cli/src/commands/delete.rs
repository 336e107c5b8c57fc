use anyhow::Result;
use catalog_items::lookup;
use catalog_items_vapi::VapiClient;

pub async fn run(client: &VapiClient, library: &str, name: &str) -> Result<()> {
    let library = lookup::library_from_name(client, library).await?;
    let item = lookup::item_from_name(client, &library, name).await?;
    lookup::delete_item(client, &item).await?;

    println!("Deleted {} ({}) from {}", item.name, item.id, library.name);
    Ok(())
}
