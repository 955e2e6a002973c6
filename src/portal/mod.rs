//! Portal resolution - share link to gate configuration and catalog metadata
//!
//! A share link is an opaque token identifying one gated portal instance.
//! Resolution is idempotent and side-effect free: it either yields the full
//! configuration (which verification steps are required) plus the portal
//! metadata, or a terminal error. No partial configuration is ever exposed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{GateError, Result};

// ============================================================================
// Types
// ============================================================================

/// Which verification steps a portal requires before releasing documents.
///
/// Fetched once per share link and immutable afterwards. Even with all four
/// flags false the step sequence still terminates in the `docs` step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Capture the visitor's email before anything else
    #[serde(default)]
    pub requires_email: bool,
    /// Verify the email with a one-time code
    #[serde(default)]
    pub requires_otp: bool,
    /// Check a shared password (and/or email allow-list)
    #[serde(default)]
    pub requires_password: bool,
    /// Record NDA acceptance before unlocking documents
    #[serde(default)]
    pub requires_nda: bool,
}

/// One document in the shared collection (read-only listing entry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    pub id: String,
    pub name: String,
    /// Containing folder, if the portal organizes documents into folders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

/// One folder in the portal's hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Branding shown on the gate and portal screens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
}

/// Static portal metadata needed downstream of the gate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalMetadata {
    #[serde(default)]
    pub branding: Branding,
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
    #[serde(default)]
    pub folders: Vec<FolderEntry>,
}

/// A fully resolved portal: gate configuration plus catalog metadata
#[derive(Debug, Clone)]
pub struct ResolvedPortal {
    pub config: GateConfig,
    pub metadata: PortalMetadata,
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves a share link to its gate configuration (allows mocking in tests)
#[async_trait]
pub trait PortalResolver: Send + Sync {
    /// Resolve a share link.
    ///
    /// Errors: [`GateError::LinkInvalid`] when the link does not exist or
    /// has expired, [`GateError::LinkRevoked`] when access was withdrawn,
    /// [`GateError::Transport`] otherwise. All three terminate the flow
    /// before any step begins.
    async fn resolve(&self, link: &str) -> Result<ResolvedPortal>;
}

/// Wire shape of the catalog service's portal endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortalEnvelope {
    #[serde(default)]
    requires_email: bool,
    #[serde(default)]
    requires_otp: bool,
    #[serde(default)]
    requires_password: bool,
    space: SpaceEnvelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpaceEnvelope {
    #[serde(default)]
    nda_required: bool,
    #[serde(default)]
    documents: Vec<DocumentEntry>,
    #[serde(default)]
    folders: Vec<FolderEntry>,
    #[serde(default)]
    branding: Branding,
}

impl From<PortalEnvelope> for ResolvedPortal {
    fn from(envelope: PortalEnvelope) -> Self {
        ResolvedPortal {
            config: GateConfig {
                requires_email: envelope.requires_email,
                requires_otp: envelope.requires_otp,
                requires_password: envelope.requires_password,
                requires_nda: envelope.space.nda_required,
            },
            metadata: PortalMetadata {
                branding: envelope.space.branding,
                documents: envelope.space.documents,
                folders: envelope.space.folders,
            },
        }
    }
}

/// HTTP resolver against the catalog service
pub struct HttpPortalResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPortalResolver {
    /// Create a resolver sharing an existing HTTP client
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Create with a dedicated client using the given request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(client, base_url))
    }
}

#[async_trait]
impl PortalResolver for HttpPortalResolver {
    async fn resolve(&self, link: &str) -> Result<ResolvedPortal> {
        let url = format!("{}/portal/{}", self.base_url, link);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => {}
            reqwest::StatusCode::NOT_FOUND => return Err(GateError::LinkInvalid),
            reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::GONE => {
                return Err(GateError::LinkRevoked)
            }
            status => {
                warn!(%status, link, "portal resolution failed");
                return Err(GateError::Transport(format!(
                    "portal endpoint returned {status}"
                )));
            }
        }

        let envelope: PortalEnvelope = response
            .json()
            .await
            .map_err(|e| GateError::Transport(format!("malformed portal payload: {e}")))?;

        let portal = ResolvedPortal::from(envelope);
        debug!(
            link,
            documents = portal.metadata.documents.len(),
            requires_email = portal.config.requires_email,
            requires_otp = portal.config.requires_otp,
            requires_password = portal.config.requires_password,
            requires_nda = portal.config.requires_nda,
            "portal resolved"
        );
        Ok(portal)
    }
}
