//! Thin JSON/HTTP implementation of [`DataPlatform`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use sandview_model::{
    BinaryDataId, MachineId, MediaRecord, OrganizationId, PartId,
};

use super::{
    ConfigHistoryEntry, DataPlatform, MediaFilter, MediaPage,
    OrganizationSummary, PassRecordFilter, PlatformError, PlatformResult,
    SortOrder,
};

const KEY_ID_HEADER: &str = "x-api-key-id";
const KEY_SECRET_HEADER: &str = "x-api-key";

/// Reqwest-backed client for the platform's JSON API.
///
/// One instance per session; cheap to clone (the inner client is pooled).
#[derive(Clone)]
pub struct CloudPlatformClient {
    http: reqwest::Client,
    base_url: Url,
    api_key_id: String,
    api_key_secret: String,
}

impl std::fmt::Debug for CloudPlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudPlatformClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key_id", &self.api_key_id)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TabularQueryResponse {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct BinaryListResponse {
    #[serde(default)]
    data: Vec<MediaRecord>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BinaryPayloadResponse {
    #[serde(default)]
    payloads: Vec<PayloadEntry>,
}

#[derive(Debug, Deserialize)]
struct PayloadEntry {
    #[serde(with = "base64_bytes")]
    binary: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ConfigHistoryResponse {
    #[serde(default)]
    history: Vec<ConfigHistoryEntryDto>,
}

#[derive(Debug, Deserialize)]
struct ConfigHistoryEntryDto {
    #[serde(default)]
    part: String,
    #[serde(default)]
    robot: String,
    when: DateTime<Utc>,
    #[serde(default)]
    old: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RobotPartResponse {
    #[serde(default)]
    part: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OrganizationsResponse {
    #[serde(default)]
    organizations: Vec<OrganizationDto>,
}

#[derive(Debug, Deserialize)]
struct OrganizationDto {
    id: String,
    #[serde(default)]
    name: String,
}

impl CloudPlatformClient {
    pub fn new(
        base_url: &str,
        api_key_id: impl Into<String>,
        api_key_secret: impl Into<String>,
    ) -> PlatformResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PlatformError::Parse(format!("invalid base url: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key_id: api_key_id.into(),
            api_key_secret: api_key_secret.into(),
        })
    }

    fn endpoint(&self, path: &str) -> PlatformResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PlatformError::Parse(format!("invalid endpoint {path}: {e}")))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> PlatformResult<T> {
        debug!("platform POST {}", path);
        let response = self
            .http
            .post(self.endpoint(path)?)
            .header(KEY_ID_HEADER, &self.api_key_id)
            .header(KEY_SECRET_HEADER, &self.api_key_secret)
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> PlatformResult<T> {
        debug!("platform GET {}", path);
        let response = self
            .http
            .get(self.endpoint(path)?)
            .header(KEY_ID_HEADER, &self.api_key_id)
            .header(KEY_SECRET_HEADER, &self.api_key_secret)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn put_json(&self, path: &str, body: Value) -> PlatformResult<()> {
        debug!("platform PUT {}", path);
        let response = self
            .http
            .put(self.endpoint(path)?)
            .header(KEY_ID_HEADER, &self.api_key_id)
            .header(KEY_SECRET_HEADER, &self.api_key_secret)
            .json(&body)
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(PlatformError::Unauthorized)
            }
            StatusCode::NOT_FOUND => Err(PlatformError::NotFound),
            status => Err(PlatformError::Api(format!("unexpected status {status}"))),
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> PlatformResult<T> {
        match response.status() {
            status if status.is_success() => {
                response.json::<T>().await.map_err(|e| {
                    PlatformError::Parse(format!("invalid response body: {e}"))
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(PlatformError::Unauthorized)
            }
            StatusCode::NOT_FOUND => Err(PlatformError::NotFound),
            status => Err(PlatformError::Api(format!("unexpected status {status}"))),
        }
    }
}

#[async_trait]
impl DataPlatform for CloudPlatformClient {
    async fn query_tabular(
        &self,
        filter: &PassRecordFilter,
        received_before: Option<&str>,
        limit: usize,
    ) -> PlatformResult<Vec<Value>> {
        let mut matcher = json!({
            "organization_id": filter.organization_id.as_str(),
            "location_id": filter.location_id.as_str(),
            "robot_id": filter.machine_id.as_str(),
            "component_name": filter.component_name,
            "component_type": filter.component_type,
        });
        if let Some(bound) = received_before {
            matcher["time_received"] = json!({ "$lt": bound });
        }
        let query = json!([
            { "$match": matcher },
            { "$sort": { "time_received": -1 } },
            { "$limit": limit },
        ]);

        let response: TabularQueryResponse = self
            .post_json(
                "v1/data/tabular/query",
                json!({
                    "organization_id": filter.organization_id.as_str(),
                    "query": query,
                }),
            )
            .await?;
        Ok(response.data)
    }

    async fn query_binary_metadata(
        &self,
        filter: &MediaFilter,
        page_size: usize,
        order: SortOrder,
        cursor: Option<&str>,
    ) -> PlatformResult<MediaPage> {
        let order = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        let response: BinaryListResponse = self
            .post_json(
                "v1/data/binary/list",
                json!({
                    "robot_id": filter.machine_id.as_str(),
                    "interval": {
                        "start": filter.captured_after,
                        "end": filter.captured_before,
                    },
                    "page_size": page_size,
                    "order": order,
                    "cursor": cursor,
                }),
            )
            .await?;
        Ok(MediaPage {
            data: response.data,
            next_cursor: response.next_cursor.filter(|c| !c.is_empty()),
        })
    }

    async fn fetch_binary_payload(
        &self,
        ids: &[BinaryDataId],
    ) -> PlatformResult<Vec<Vec<u8>>> {
        let ids: Vec<&str> = ids.iter().map(BinaryDataId::as_str).collect();
        let response: BinaryPayloadResponse = self
            .post_json("v1/data/binary/download", json!({ "ids": ids }))
            .await?;
        Ok(response
            .payloads
            .into_iter()
            .map(|entry| entry.binary)
            .collect())
    }

    async fn create_signed_url(
        &self,
        path: &str,
        ttl_seconds: u64,
    ) -> PlatformResult<String> {
        let response: SignedUrlResponse = self
            .post_json(
                "v1/data/signed-url",
                json!({ "path": path, "ttl_seconds": ttl_seconds }),
            )
            .await?;
        Ok(response.url)
    }

    async fn get_metadata_blob(
        &self,
        machine_id: &MachineId,
    ) -> PlatformResult<BTreeMap<String, String>> {
        self.get_json(&format!("v1/machines/{}/metadata", machine_id.as_str()))
            .await
    }

    async fn put_metadata_blob(
        &self,
        machine_id: &MachineId,
        blob: &BTreeMap<String, String>,
    ) -> PlatformResult<()> {
        let body = serde_json::to_value(blob)
            .map_err(|e| PlatformError::Parse(e.to_string()))?;
        self.put_json(
            &format!("v1/machines/{}/metadata", machine_id.as_str()),
            body,
        )
        .await
    }

    async fn get_config_history(
        &self,
        part_id: &PartId,
    ) -> PlatformResult<Vec<ConfigHistoryEntry>> {
        let response: ConfigHistoryResponse = self
            .get_json(&format!("v1/parts/{}/history", part_id.as_str()))
            .await?;
        Ok(response
            .history
            .into_iter()
            .map(|entry| ConfigHistoryEntry {
                part_id: PartId::new(entry.part),
                robot_id: MachineId::new(entry.robot),
                when: entry.when,
                old_part: entry.old,
            })
            .collect())
    }

    async fn get_robot_part(
        &self,
        part_id: &PartId,
    ) -> PlatformResult<Option<Value>> {
        let response: RobotPartResponse = self
            .get_json(&format!("v1/parts/{}", part_id.as_str()))
            .await?;
        Ok(response.part)
    }

    async fn list_organizations(
        &self,
    ) -> PlatformResult<Vec<OrganizationSummary>> {
        let response: OrganizationsResponse =
            self.get_json("v1/organizations").await?;
        Ok(response
            .organizations
            .into_iter()
            .map(|org| OrganizationSummary {
                id: OrganizationId::new(org.id),
                name: org.name,
            })
            .collect())
    }
}

/// Payload bytes travel base64-encoded inside the JSON envelope.
mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}
