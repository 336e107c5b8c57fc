mod commands;
mod config;

use anyhow::Result;
use catalog_items::OVF_ITEM_TYPE;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::upload::UploadArgs;
use crate::config::{Connection, Overrides};

#[derive(Parser)]
#[command(name = "catalog-upload")]
#[command(about = "Create content library items from OVF and OVA sources")]
struct Cli {
    /// vCenter base URL (overrides CATALOG_SERVER and the config file)
    #[arg(long, global = true)]
    server: Option<String>,
    /// User to log in as (overrides CATALOG_USERNAME and the config file)
    #[arg(long, global = true)]
    username: Option<String>,
    /// Accept invalid TLS certificates
    #[arg(long, global = true)]
    insecure: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload an OVF descriptor or OVA archive as a new library item
    Upload {
        /// Name of the target content library
        #[arg(long)]
        library: String,
        /// Name of the new item
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Library item type
        #[arg(long = "type", default_value = OVF_ITEM_TYPE)]
        item_type: String,
        /// Local path or http(s) URL of the .ovf or .ova
        source: String,
    },
    /// Clone a deployed template into a new library item
    Clone {
        #[arg(long)]
        library: String,
        #[arg(long)]
        name: String,
        /// Managed object ID of the source virtual machine
        #[arg(long)]
        template: String,
        #[arg(long = "type", default_value = OVF_ITEM_TYPE)]
        item_type: String,
    },
    /// Check whether an ID names a library item
    Check {
        id: String,
    },
    /// Delete a library item by name
    Delete {
        #[arg(long)]
        library: String,
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("CATALOG_UPLOAD_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let app_config = config::load_config();
    let conn = Connection::resolve(
        &app_config,
        Overrides {
            server: cli.server,
            username: cli.username,
            insecure: cli.insecure,
        },
        |key| std::env::var(key).ok(),
    )?;

    let http = commands::http_client(conn.insecure)?;
    let client = commands::connect(&http, &conn).await?;

    let result = match cli.command {
        Command::Upload {
            library,
            name,
            description,
            item_type,
            source,
        } => {
            let args = UploadArgs {
                library: &library,
                name: &name,
                description: &description,
                item_type: &item_type,
                source: &source,
            };
            commands::upload::run(&client, &http, app_config.poll.policy(), args).await
        }
        Command::Clone {
            library,
            name,
            template,
            item_type,
        } => commands::clone::run(&client, &http, &library, &name, &template, &item_type).await,
        Command::Check { id } => commands::check::run(&client, &id).await,
        Command::Delete { library, name } => commands::delete::run(&client, &library, &name).await,
    };

    if let Err(e) = client.logout().await {
        tracing::warn!(error = %e, "failed to close API session");
    }
    result
}
