//! Metadata Generator - multiplies configured modules into virtual entities
//!
//! The generator:
//! - Publishes every backend SP, plus one virtual SP per downstream peer of
//!   each frontend for mirrored backends
//! - Publishes every frontend IdP/OP, plus one virtual IdP per upstream target
//!   of each backend for mirrored frontends
//! - Tolerates discovery failures per frontend/backend pairing and reports them
//!
//! A generation reads module descriptors and never writes them.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use prism_core::{
    EntityMetadata, GenerationReport, MetadataDescription, ModuleDescriptor, ModuleKind,
    PairingFailure, PeerDiscovery, PrismError, Result, VirtualEntityConfig,
};

use crate::builder::EntityConfigBuilder;
use crate::registry::ModuleRegistry;

/// Entities of one side (frontends or backends) and the pairings skipped on the way
#[derive(Debug, Clone, Default)]
pub struct GeneratedEntities {
    pub metadata: EntityMetadata,
    pub failures: Vec<PairingFailure>,
}

impl GeneratedEntities {
    fn commit(&mut self, entities: Vec<VirtualEntityConfig>) -> Result<()> {
        for entity in entities {
            self.metadata.push(entity)?;
        }
        Ok(())
    }

    fn skip_pairing(
        &mut self,
        module: &ModuleDescriptor,
        peer: &ModuleDescriptor,
        error: PrismError,
    ) {
        warn!(
            module = %module.name,
            peer_module = %peer.name,
            error = %error,
            "Skipping pairing after discovery failure"
        );
        self.failures.push(PairingFailure {
            module: module.name.clone(),
            peer_module: peer.name.clone(),
            message: error.to_string(),
        });
    }
}

/// Generates the virtual entity configurations of a proxy
pub struct MetadataGenerator {
    base_url: String,
    discovery: Arc<dyn PeerDiscovery>,
}

impl MetadataGenerator {
    /// Create a generator for a proxy served at `base_url`
    pub fn new(base_url: impl Into<String>, discovery: Arc<dyn PeerDiscovery>) -> Self {
        Self {
            base_url: base_url.into(),
            discovery,
        }
    }

    /// Create a generator using the registry's base URL
    pub fn for_registry(registry: &ModuleRegistry, discovery: Arc<dyn PeerDiscovery>) -> Self {
        Self::new(registry.base_url(), discovery)
    }

    /// Generate frontend and backend metadata for every registered module
    #[instrument(
        skip_all,
        fields(
            frontends = registry.frontends().len(),
            backends = registry.backends().len()
        )
    )]
    pub async fn create_entity_descriptors(
        &self,
        registry: &ModuleRegistry,
    ) -> Result<GenerationReport> {
        let backend = self
            .generate_backend_entities(registry.backends(), registry.frontends())
            .await?;
        let frontend = self
            .generate_frontend_entities(registry.frontends(), registry.backends())
            .await?;

        if let Some(entity_id) = frontend
            .metadata
            .entity_ids()
            .find(|id| backend.metadata.contains_entity(id))
        {
            return Err(PrismError::config_error(format!(
                "entity id collision: '{}' is generated for both a frontend and a backend",
                entity_id
            )));
        }

        let mut failures = backend.failures;
        failures.extend(frontend.failures);

        let report = GenerationReport {
            frontend: frontend.metadata,
            backend: backend.metadata,
            failures,
        };

        info!(
            "Generated {} entities ({} frontend, {} backend), {} pairings skipped",
            report.entity_count(),
            report.frontend.entity_count(),
            report.backend.entity_count(),
            report.failures.len()
        );

        Ok(report)
    }

    /// SP entities for every backend.
    ///
    /// Mirrored backends get their own entity followed by one entity per peer
    /// of every frontend, in configuration and discovery order.
    #[instrument(skip_all)]
    pub async fn generate_backend_entities(
        &self,
        backends: &[ModuleDescriptor],
        frontends: &[ModuleDescriptor],
    ) -> Result<GeneratedEntities> {
        ensure_kinds(backends, frontends)?;

        let builder = EntityConfigBuilder::new(&self.base_url);
        let mut generated = GeneratedEntities::default();

        for backend in backends {
            match backend.kind {
                ModuleKind::SingleBackend => {
                    info!("Creating backend '{}' metadata", backend.name);
                    generated.metadata.push(builder.own_entity(backend)?)?;
                }
                ModuleKind::MirroredBackend => {
                    info!("Creating mirrored backend '{}' metadata", backend.name);
                    generated.metadata.push(builder.own_entity(backend)?)?;

                    for frontend in frontends {
                        match self.mirror_backend(&builder, backend, frontend).await {
                            Ok(entities) => generated.commit(entities)?,
                            Err(e) if e.is_pairing_recoverable() => {
                                generated.skip_pairing(backend, frontend, e)
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
                ModuleKind::SingleFrontend
                | ModuleKind::MirroredFrontend
                | ModuleKind::OidcFrontend => {
                    return Err(not_a(backend, "backend"));
                }
            }
        }

        Ok(generated)
    }

    /// IdP / OP entities for every frontend.
    ///
    /// Mirrored frontends get one entity per target published by every
    /// backend, and no entity under their own id.
    #[instrument(skip_all)]
    pub async fn generate_frontend_entities(
        &self,
        frontends: &[ModuleDescriptor],
        backends: &[ModuleDescriptor],
    ) -> Result<GeneratedEntities> {
        ensure_kinds(backends, frontends)?;

        let builder = EntityConfigBuilder::new(&self.base_url);
        let backend_names: Vec<&str> = backends.iter().map(|b| b.name.as_str()).collect();
        let mut generated = GeneratedEntities::default();

        for frontend in frontends {
            match frontend.kind {
                ModuleKind::SingleFrontend | ModuleKind::OidcFrontend => {
                    info!("Creating frontend '{}' metadata", frontend.name);
                    generated
                        .metadata
                        .push(builder.frontend_entity(frontend, &backend_names)?)?;
                }
                ModuleKind::MirroredFrontend => {
                    generated.metadata.ensure_module(&frontend.name);

                    for backend in backends {
                        info!(
                            "Creating mirrored metadata for frontend '{}' and backend '{}'",
                            frontend.name, backend.name
                        );
                        match self.mirror_frontend(&builder, frontend, backend).await {
                            Ok(entities) => generated.commit(entities)?,
                            Err(e) if e.is_pairing_recoverable() => {
                                generated.skip_pairing(frontend, backend, e)
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
                ModuleKind::SingleBackend | ModuleKind::MirroredBackend => {
                    return Err(not_a(frontend, "frontend"));
                }
            }
        }

        Ok(generated)
    }

    /// Virtual SPs of `backend`, one per downstream peer of `frontend`
    async fn mirror_backend(
        &self,
        builder: &EntityConfigBuilder<'_>,
        backend: &ModuleDescriptor,
        frontend: &ModuleDescriptor,
    ) -> Result<Vec<VirtualEntityConfig>> {
        let peer_kind = match frontend.kind {
            ModuleKind::SingleFrontend | ModuleKind::MirroredFrontend => "SP",
            ModuleKind::OidcFrontend => "client",
            ModuleKind::SingleBackend | ModuleKind::MirroredBackend => {
                return Err(not_a(frontend, "frontend"));
            }
        };

        let endpoints = builder.frontend_endpoints(frontend, &[backend.name.as_str()])?;
        debug!(
            "Frontend '{}' registered {} endpoint services for backend '{}'",
            frontend.name,
            endpoints.len(),
            backend.name
        );

        let peers = unique_in_order(
            self.discovery.list_known_peers(frontend).await?,
            |peer| peer.clone(),
        );
        debug!(
            "Frontend '{}' knows {} {} peers",
            frontend.name,
            peers.len(),
            peer_kind
        );

        peers
            .iter()
            .map(|peer| -> Result<VirtualEntityConfig> {
                let entity = builder.mirrored_service_provider(backend, frontend, peer)?;
                debug!(
                    "Backend '{}' mirrored for {} '{}' as {}",
                    backend.name, peer_kind, peer, entity.entity_id
                );
                Ok(entity)
            })
            .collect()
    }

    /// Virtual IdPs of `frontend`, one per target published by `backend`
    async fn mirror_frontend(
        &self,
        builder: &EntityConfigBuilder<'_>,
        frontend: &ModuleDescriptor,
        backend: &ModuleDescriptor,
    ) -> Result<Vec<VirtualEntityConfig>> {
        let descriptions: Vec<MetadataDescription> = unique_in_order(
            self.discovery.list_published_descriptions(backend).await?,
            |desc| desc.entity_id.clone(),
        );
        debug!(
            "Backend '{}' publishes {} descriptions",
            backend.name,
            descriptions.len()
        );

        descriptions
            .iter()
            .map(|desc| builder.mirrored_identity_provider(frontend, backend, desc))
            .collect()
    }
}

/// Keep the first occurrence of every key, preserving order
fn unique_in_order<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// Kind and field checks for modules handed in without going through a registry
fn ensure_kinds(backends: &[ModuleDescriptor], frontends: &[ModuleDescriptor]) -> Result<()> {
    if let Some(module) = backends.iter().find(|m| !m.kind.is_backend()) {
        return Err(not_a(module, "backend"));
    }
    if let Some(module) = frontends.iter().find(|m| !m.kind.is_frontend()) {
        return Err(not_a(module, "frontend"));
    }
    for module in backends.iter().chain(frontends) {
        module.validate()?;
    }
    Ok(())
}

fn not_a(module: &ModuleDescriptor, role: &str) -> PrismError {
    PrismError::config_error(format!(
        "module '{}' of kind {} cannot be used as a {}",
        module.name, module.kind, role
    ))
}
