//! HTTP backend for the remote device registry
//!
//! Talks to the registry's OData-style resource API under `<endpoint>/v4/`.
//! Reads are authorised with the client's own credential; patches carry the
//! credential passed by the caller.

use crate::error::{RegistryError, Result};
use crate::filter::{fields, Filter};
use crate::registry::{DeviceQuery, DeviceRegistry, PatchStatus};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use switchover_types::{
    Credential, Device, DeviceOwner, DeviceType, DeviceUuid, ReleaseId, SupervisorRelease,
};
use tracing::debug;

const DEVICE_RESOURCE: &str = "device";
const RELEASE_RESOURCE: &str = "supervisor_release";
const OWNER_RELATION: &str = "belongs_to__user";

/// Device registry reached over HTTP
pub struct HttpRegistry {
    client: Client,
    base_url: String,
    credential: Credential,
}

/// Envelope every collection read is wrapped in
#[derive(Debug, Deserialize)]
struct Collection<T> {
    d: Vec<T>,
}

/// A link to another resource
///
/// Depending on the query the registry sends a bare id, a `{"__id": n}`
/// reference, or (when expanded) an array of the linked records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Link<T> {
    Id(u64),
    Reference {
        #[serde(rename = "__id")]
        id: u64,
    },
    Expanded(Vec<T>),
}

#[derive(Debug, Deserialize)]
struct LinkedId {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct LinkedUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct DeviceRecord {
    uuid: String,
    device_type: String,
    #[serde(default)]
    supervisor_version: Option<String>,
    #[serde(rename = "should_be_managed_by__supervisor_release", default)]
    assigned_release: Option<Link<LinkedId>>,
    #[serde(rename = "belongs_to__user", default)]
    owner: Option<Link<LinkedUser>>,
    #[serde(default)]
    logs_channel: Option<String>,
}

impl From<DeviceRecord> for Device {
    fn from(record: DeviceRecord) -> Self {
        let assigned_release = match record.assigned_release {
            Some(Link::Id(id)) | Some(Link::Reference { id }) => Some(ReleaseId::new(id)),
            Some(Link::Expanded(linked)) => linked.first().map(|r| ReleaseId::new(r.id)),
            None => None,
        };
        let owner = match record.owner {
            Some(Link::Expanded(users)) => users.into_iter().next().map(|u| DeviceOwner {
                username: u.username,
            }),
            _ => None,
        };

        Device {
            uuid: DeviceUuid::new(record.uuid),
            device_type: DeviceType::new(record.device_type),
            reported_version: record.supervisor_version,
            assigned_release,
            owner,
            logs_channel: record.logs_channel,
        }
    }
}

impl HttpRegistry {
    /// Create a client for the registry at `endpoint`
    pub fn new(endpoint: &str, credential: Credential, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: format!("{}/v4", endpoint.trim_end_matches('/')),
            credential,
        })
    }

    fn request(&self, method: Method, resource: &str, credential: &Credential) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, resource);
        self.client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, credential.header_value())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        filter: &Filter,
        select: Option<&str>,
        expand: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut params = vec![("$filter", filter.to_odata())];
        if let Some(select) = select {
            params.push(("$select", select.to_string()));
        }
        if let Some(expand) = expand {
            params.push(("$expand", expand.to_string()));
        }

        debug!(resource = resource, filter = %filter, "Registry read");

        let response = self
            .request(Method::GET, resource, &self.credential)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let collection: Collection<T> =
            serde_json::from_slice(&body).map_err(|e| RegistryError::Decode {
                resource: resource.to_string(),
                reason: e.to_string(),
            })?;
        Ok(collection.d)
    }
}

#[async_trait]
impl DeviceRegistry for HttpRegistry {
    async fn releases(&self, filter: &Filter) -> Result<Vec<SupervisorRelease>> {
        self.get(RELEASE_RESOURCE, filter, None, None).await
    }

    async fn devices(&self, filter: &Filter, query: DeviceQuery) -> Result<Vec<Device>> {
        let expand = query.expand_owner.then_some(OWNER_RELATION);
        let records: Vec<DeviceRecord> = self.get(DEVICE_RESOURCE, filter, None, expand).await?;
        Ok(records.into_iter().map(Device::from).collect())
    }

    async fn count_devices(&self, filter: &Filter) -> Result<usize> {
        let ids: Vec<LinkedId> = self
            .get(DEVICE_RESOURCE, filter, Some(fields::ID), None)
            .await?;
        Ok(ids.len())
    }

    async fn patch_devices(
        &self,
        filter: &Filter,
        release: ReleaseId,
        credential: &Credential,
    ) -> Result<PatchStatus> {
        let mut body = serde_json::Map::new();
        body.insert(fields::ASSIGNED_RELEASE.to_string(), release.get().into());
        let body = serde_json::Value::Object(body);

        debug!(filter = %filter, body = %body, "Registry patch");

        let response = self
            .request(Method::PATCH, DEVICE_RESOURCE, credential)
            .query(&[("$filter", filter.to_odata())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(PatchStatus::Applied)
        } else {
            Ok(PatchStatus::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
