//! Collaborator traits the mirroring engine calls into

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{
    error::Result,
    models::{MetadataDescription, ModuleDescriptor, VirtualEntityConfig},
};

// =============================================================================
// Discovery
// =============================================================================

/// Source of the peers each module knows about
#[async_trait]
pub trait PeerDiscovery: Send + Sync {
    /// Downstream peers known to a frontend.
    ///
    /// SAML frontends report SP entity ids from their metadata store, OIDC
    /// frontends report registered client ids.
    async fn list_known_peers(&self, frontend: &ModuleDescriptor) -> Result<Vec<String>>;

    /// Upstream targets a backend publishes descriptive metadata for
    async fn list_published_descriptions(
        &self,
        backend: &ModuleDescriptor,
    ) -> Result<Vec<MetadataDescription>>;
}

// =============================================================================
// Assembly & Signing
// =============================================================================

/// Key material handed to the signing collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    /// Private key used for the signature
    pub key_file: PathBuf,
    /// Certificate embedded in the signature
    pub cert_file: PathBuf,
    /// Signature algorithm URI, signer default if unset
    #[serde(default)]
    pub signature_algorithm: Option<String>,
    /// Digest algorithm URI, signer default if unset
    #[serde(default)]
    pub digest_algorithm: Option<String>,
}

/// What to build and sign in one call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SigningRequest {
    pub entities: Vec<VirtualEntityConfig>,
    /// Wrap the entities in a single collection descriptor
    pub collection: bool,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Signed, schema-valid metadata document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedDocument {
    /// Entity ids described by the document, in document order
    pub entity_ids: Vec<String>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Serialized document as produced by the signer
    pub content: String,
}

/// Builds entity descriptors from configs, signs and validates them.
///
/// Implementations fail with `ValidationError` when the constructed
/// descriptor does not validate and `SigningError` when signing fails.
#[async_trait]
pub trait MetadataSigner: Send + Sync {
    async fn build_and_sign(
        &self,
        request: &SigningRequest,
        context: &SecurityContext,
    ) -> Result<SignedDocument>;
}
