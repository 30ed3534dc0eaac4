//! Typed asset endpoints
//!
//! Speaks the JSON:API-style payloads of the Courier asset resources:
//! reservation (which returns the upload operations), commit with the
//! content checksum, and delivery-state reads. One [`AssetApi`] handles one
//! asset resource type (`appScreenshots`, `appPreviews`, ...).

use super::{ApiError, HttpApiClient};
use crate::upload::{AssetHandle, AssetService, DeliveryState, UploadOperation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct CreateAssetRequest<'a> {
    data: CreateAssetData<'a>,
}

#[derive(Serialize)]
struct CreateAssetData<'a> {
    #[serde(rename = "type")]
    resource_type: &'a str,
    attributes: CreateAssetAttributes<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAssetAttributes<'a> {
    file_name: &'a str,
    file_size: u64,
}

#[derive(Serialize)]
struct CommitAssetRequest<'a> {
    data: CommitAssetData<'a>,
}

#[derive(Serialize)]
struct CommitAssetData<'a> {
    #[serde(rename = "type")]
    resource_type: &'a str,
    id: &'a str,
    attributes: CommitAssetAttributes<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitAssetAttributes<'a> {
    uploaded: bool,
    source_file_checksum: &'a str,
}

#[derive(Deserialize)]
struct AssetDocument {
    data: AssetResource,
}

#[derive(Deserialize)]
struct AssetResource {
    id: String,
    #[serde(default)]
    attributes: AssetAttributes,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetAttributes {
    #[serde(default)]
    upload_operations: Vec<UploadOperation>,
    #[serde(default)]
    asset_delivery_state: Option<DeliveryState>,
}

/// Asset endpoints for one resource type.
pub struct AssetApi<'a> {
    client: &'a HttpApiClient,
    resource_type: String,
}

impl<'a> AssetApi<'a> {
    pub fn new(client: &'a HttpApiClient, resource_type: impl Into<String>) -> Self {
        Self {
            client,
            resource_type: resource_type.into(),
        }
    }

    fn collection_path(&self) -> String {
        format!("/v1/{}", self.resource_type)
    }

    fn resource_path(&self, asset_id: &str) -> String {
        format!("/v1/{}/{}", self.resource_type, asset_id)
    }
}

#[async_trait]
impl AssetService for AssetApi<'_> {
    async fn create(&self, file_name: &str, file_size: u64) -> Result<AssetHandle, ApiError> {
        let request = CreateAssetRequest {
            data: CreateAssetData {
                resource_type: &self.resource_type,
                attributes: CreateAssetAttributes {
                    file_name,
                    file_size,
                },
            },
        };
        let document: AssetDocument = self
            .client
            .post_json(&self.collection_path(), &request)
            .await?;

        Ok(AssetHandle {
            id: document.data.id,
            operations: document.data.attributes.upload_operations,
        })
    }

    async fn commit(&self, asset_id: &str, checksum: &str) -> Result<(), ApiError> {
        let request = CommitAssetRequest {
            data: CommitAssetData {
                resource_type: &self.resource_type,
                id: asset_id,
                attributes: CommitAssetAttributes {
                    uploaded: true,
                    source_file_checksum: checksum,
                },
            },
        };
        let _: AssetDocument = self
            .client
            .patch_json(&self.resource_path(asset_id), &request)
            .await?;
        Ok(())
    }

    async fn delivery_state(&self, asset_id: &str) -> Result<Option<DeliveryState>, ApiError> {
        let document: AssetDocument = self.client.get_json(&self.resource_path(asset_id)).await?;
        Ok(document.data.attributes.asset_delivery_state)
    }
}
