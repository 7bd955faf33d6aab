//! Credential loading and session bootstrap.
//!
//! The hosting page hands the dashboard a small JSON payload (api key,
//! machine id, machine hostname); everything else - organization, location,
//! display name - is derived from the platform or the hostname. Failures
//! here are initialization-class: they block the dashboard instead of
//! degrading it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use sandview_model::{LocationId, MachineId, OrganizationId};

use crate::error::{CoreError, Result};
use crate::platform::{DataPlatform, PassRecordFilter};

/// Machine hostnames look like `{machine-name}-main.{location}.{...}`.
static HOSTNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<machine>.+?)-main\.(?P<location>[^.]+)\.").unwrap()
});

/// Paired api-key credential issued by the platform.
#[derive(Clone, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub key: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Everything the hosting page provides to reach the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub api_key: ApiKey,
    pub machine_id: MachineId,
    pub hostname: String,
}

impl Credentials {
    /// Parse the JSON payload stored by the hosting page.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|err| {
            CoreError::Initialization(format!(
                "failed to parse credential payload: {err}"
            ))
        })
    }

    /// Load credentials from `SANDVIEW_*` environment variables, for
    /// headless use outside the hosting page.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| {
                CoreError::Initialization(format!(
                    "missing environment variable {name}"
                ))
            })
        };
        Ok(Self {
            api_key: ApiKey {
                id: var("SANDVIEW_API_KEY_ID")?,
                key: var("SANDVIEW_API_KEY_SECRET")?,
            },
            machine_id: MachineId::new(var("SANDVIEW_MACHINE_ID")?),
            hostname: var("SANDVIEW_MACHINE_HOSTNAME")?,
        })
    }

    /// Machine display name embedded in the hostname, when recognizable.
    pub fn machine_name(&self) -> Option<String> {
        HOSTNAME_PATTERN
            .captures(&self.hostname)
            .map(|caps| caps["machine"].to_string())
    }

    /// Location id embedded in the hostname, when recognizable.
    pub fn location_id(&self) -> Option<LocationId> {
        HOSTNAME_PATTERN
            .captures(&self.hostname)
            .map(|caps| LocationId::new(&caps["location"]))
    }
}

/// An established dashboard session: credentials plus resolved identity.
#[derive(Debug, Clone)]
pub struct DashboardSession {
    pub credentials: Credentials,
    pub organization_id: OrganizationId,
}

impl DashboardSession {
    /// Resolve the organization for these credentials. The dashboard is
    /// scoped to exactly one organization; anything else is a setup error.
    pub async fn establish(
        platform: &Arc<dyn DataPlatform>,
        credentials: Credentials,
    ) -> Result<Self> {
        info!(machine = %credentials.machine_id, "establishing dashboard session");

        let organizations =
            platform.list_organizations().await.map_err(|err| {
                CoreError::Initialization(format!(
                    "failed to list organizations: {err}"
                ))
            })?;
        if organizations.len() != 1 {
            return Err(CoreError::Initialization(format!(
                "expected 1 organization, got {}",
                organizations.len()
            )));
        }

        Ok(Self {
            organization_id: organizations[0].id.clone(),
            credentials,
        })
    }

    /// Filter selecting this session's pass summaries.
    pub fn pass_filter(&self) -> PassRecordFilter {
        PassRecordFilter::sanding_summary(
            self.organization_id.clone(),
            self.credentials.location_id().unwrap_or_default(),
            self.credentials.machine_id.clone(),
        )
    }
}
