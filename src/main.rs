//! AppCourier - command-line client for the Courier resource-management API

use appcourier::classify;
use appcourier::client::assets::AssetApi;
use appcourier::pagination::{paginate_all, Page};
use appcourier::upload::{upload_asset, UploadOptions};
use appcourier::{Config, HttpApiClient};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// AppCourier - upload assets and query resources on the Courier API
#[derive(Parser, Debug)]
#[command(name = "appcourier")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "courier.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a binary asset and wait until the server finishes processing it
    Upload {
        /// File to upload
        file: PathBuf,

        /// Asset resource type, e.g. appScreenshots or appPreviews
        #[arg(long, default_value = "appScreenshots")]
        kind: String,

        /// Overall deadline in seconds (overrides upload.deadline_secs)
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// List all apps, following pagination to the end
    Apps,

    /// Check configuration and connectivity
    Doctor,
}

#[derive(Debug, Default, Deserialize)]
struct AppResource {
    id: String,
    #[serde(default)]
    attributes: serde_json::Value,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to install subscriber");

    if let Err(err) = run(args).await {
        let classified = classify::classify(&err);
        eprintln!("error: {}", classified.message);
        if !classified.hint.is_empty() {
            eprintln!("hint: {}", classified.hint);
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    let client = HttpApiClient::new(&config)?;

    match args.command {
        Command::Upload {
            file,
            kind,
            deadline_secs,
        } => {
            let api = AssetApi::new(&client, kind);
            let options = UploadOptions {
                poll_interval: config.upload.poll_interval(),
                deadline: deadline_secs
                    .map(Duration::from_secs)
                    .or_else(|| config.upload.deadline()),
            };

            // Ctrl-C aborts the in-flight transfer and stops polling.
            let cancel = CancellationToken::new();
            let canceller = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    canceller.cancel();
                }
            });

            let outcome = upload_asset(&api, &client, &file, &options, &cancel).await?;
            println!(
                "{}",
                serde_json::json!({
                    "assetId": outcome.asset_id,
                    "state": outcome.state.state,
                })
            );
        }

        Command::Apps => {
            let first: Page<AppResource> = client.get_json("/v1/apps").await?;
            let (apps, _last) = paginate_all(first, |cursor| {
                let client = &client;
                async move { client.get_json::<Page<AppResource>>(&cursor).await }
            })
            .await?;

            info!(count = apps.len(), "aggregated all pages");
            for app in apps {
                println!(
                    "{}",
                    serde_json::json!({ "id": app.id, "attributes": app.attributes })
                );
            }
        }

        Command::Doctor => {
            println!("config: ok ({})", args.config.display());
            println!("api.base_url: {}", client.base_url());

            if !client.has_credentials() {
                println!("credentials: missing");
                return Err(appcourier::client::ApiError::MissingCredentials.into());
            }
            println!("credentials: configured");

            let _: Page<AppResource> = client.get_json("/v1/apps?limit=1").await?;
            println!("connectivity: ok");
        }
    }

    Ok(())
}
