//! Configuration-backed peer discovery
//!
//! Lists the peers and published descriptions of each module as given in
//! static configuration, for deployments whose metadata stores and client
//! registries are exported ahead of time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use prism_core::{MetadataDescription, ModuleDescriptor, PeerDiscovery, Result};

/// Static peers per frontend and descriptions per backend, keyed by module name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticDiscovery {
    /// Frontend name -> SP entity ids or OIDC client ids
    #[serde(default)]
    pub peers: HashMap<String, Vec<String>>,
    /// Backend name -> upstream target descriptions
    #[serde(default)]
    pub descriptions: HashMap<String, Vec<MetadataDescription>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peers<I, S>(mut self, frontend: impl Into<String>, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.peers
            .entry(frontend.into())
            .or_default()
            .extend(peers.into_iter().map(Into::into));
        self
    }

    pub fn with_descriptions(
        mut self,
        backend: impl Into<String>,
        descriptions: impl IntoIterator<Item = MetadataDescription>,
    ) -> Self {
        self.descriptions
            .entry(backend.into())
            .or_default()
            .extend(descriptions);
        self
    }
}

#[async_trait]
impl PeerDiscovery for StaticDiscovery {
    async fn list_known_peers(&self, frontend: &ModuleDescriptor) -> Result<Vec<String>> {
        Ok(self.peers.get(&frontend.name).cloned().unwrap_or_default())
    }

    async fn list_published_descriptions(
        &self,
        backend: &ModuleDescriptor,
    ) -> Result<Vec<MetadataDescription>> {
        Ok(self
            .descriptions
            .get(&backend.name)
            .cloned()
            .unwrap_or_default())
    }
}
