//! AppCourier Library
//!
//! Command-line client for the Courier resource-management REST API.
//!
//! The interesting machinery lives in three places:
//!
//! - **Asset upload pipeline** ([`upload`]): reserve a server-side asset,
//!   checksum the file, transmit server-specified byte ranges, report
//!   completion, and poll the asynchronous delivery state until terminal.
//! - **Pagination aggregation** ([`pagination`]): follow cursor links until
//!   the collection is exhausted, with a guard against non-advancing cursors.
//! - **Failure classification** ([`classify`]): turn API failures into
//!   human-readable messages with actionable hints (rate limits, credentials,
//!   timeouts).
//!
//! # Example
//!
//! ```no_run
//! use appcourier::client::assets::AssetApi;
//! use appcourier::upload::{upload_asset, UploadOptions};
//! use appcourier::{Config, HttpApiClient};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("courier.yaml")?;
//!     let client = HttpApiClient::new(&config)?;
//!     let api = AssetApi::new(&client, "appScreenshots");
//!     let cancel = CancellationToken::new();
//!     let outcome = upload_asset(
//!         &api,
//!         &client,
//!         Path::new("screenshot.png"),
//!         &UploadOptions::default(),
//!         &cancel,
//!     )
//!     .await?;
//!     println!("asset {} is {}", outcome.asset_id, outcome.state.state);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod client;
pub mod config;
pub mod pagination;
pub mod upload;

// Re-export commonly used types
pub use client::HttpApiClient;
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
