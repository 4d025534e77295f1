//! Entity config builder
//!
//! Every virtual entity gets a freshly built protocol configuration derived
//! from `(module, peer module, target)`. Module descriptors are only read, so
//! one registry can serve any number of generations at once.

use prism_core::{
    apply_endpoints, merge_configs, mirrored_backend_entity_id, mirrored_frontend_entity_id,
    Config, EndpointLayout, MetadataDescription, ModuleDescriptor, PrismError, Result,
    VirtualEntityConfig, MIRRORED_IDP_EXCLUDED_KEYS,
};

/// Builds virtual entity configurations for one proxy
#[derive(Debug, Clone, Copy)]
pub struct EntityConfigBuilder<'a> {
    base_url: &'a str,
}

impl<'a> EntityConfigBuilder<'a> {
    pub fn new(base_url: &'a str) -> Self {
        Self { base_url }
    }

    /// The module's own, unmirrored entity
    pub fn own_entity(&self, module: &ModuleDescriptor) -> Result<VirtualEntityConfig> {
        Ok(VirtualEntityConfig::new(
            module.name.clone(),
            module.kind.entity_role(),
            module.base_entity_id()?,
            module.protocol_config()?.clone(),
        ))
    }

    /// Endpoints `frontend` registers when it routes through `backends`
    pub fn frontend_endpoints(
        &self,
        frontend: &ModuleDescriptor,
        backends: &[&str],
    ) -> Result<Config> {
        Ok(EndpointLayout::from_module(frontend)?.register(self.base_url, backends))
    }

    /// A frontend published under its own entity id, routing to every backend
    pub fn frontend_entity(
        &self,
        frontend: &ModuleDescriptor,
        backends: &[&str],
    ) -> Result<VirtualEntityConfig> {
        let role = frontend.kind.entity_role();
        let mut config = frontend.protocol_config()?.clone();
        apply_endpoints(
            &mut config,
            role,
            self.frontend_endpoints(frontend, backends)?,
        )?;

        Ok(VirtualEntityConfig::new(
            frontend.name.clone(),
            role,
            frontend.base_entity_id()?,
            config,
        ))
    }

    /// The backend's SP as seen by one downstream peer of `frontend`.
    ///
    /// `peer` is a SAML SP entity id or an OIDC client id.
    pub fn mirrored_service_provider(
        &self,
        backend: &ModuleDescriptor,
        frontend: &ModuleDescriptor,
        peer: &str,
    ) -> Result<VirtualEntityConfig> {
        if peer.trim().is_empty() {
            return Err(PrismError::discovery_error(
                frontend.name.clone(),
                "discovered a peer with an empty identifier",
            ));
        }

        let entity_id =
            mirrored_backend_entity_id(backend.base_entity_id()?, &frontend.name, peer);

        Ok(VirtualEntityConfig::new(
            backend.name.clone(),
            backend.kind.entity_role(),
            entity_id,
            backend.protocol_config()?.clone(),
        ))
    }

    /// The frontend's IdP standing in for one upstream target of `backend`.
    ///
    /// The target's descriptive metadata is folded into the frontend's IdP
    /// configuration, except its organization and contact details.
    pub fn mirrored_identity_provider(
        &self,
        frontend: &ModuleDescriptor,
        backend: &ModuleDescriptor,
        description: &MetadataDescription,
    ) -> Result<VirtualEntityConfig> {
        if description.entity_id.trim().is_empty() {
            return Err(PrismError::discovery_error(
                backend.name.clone(),
                "published description without an entity id",
            ));
        }

        let role = frontend.kind.entity_role();
        let mut config = merge_configs(
            frontend.protocol_config()?,
            &description.to_overlay(),
            MIRRORED_IDP_EXCLUDED_KEYS,
        );

        let endpoints = EndpointLayout::from_module(frontend)?.register_mirrored(
            self.base_url,
            &backend.name,
            &description.entity_id,
        );
        apply_endpoints(&mut config, role, endpoints)?;

        let entity_id =
            mirrored_frontend_entity_id(frontend.base_entity_id()?, &description.entity_id);

        Ok(VirtualEntityConfig::new(
            frontend.name.clone(),
            role,
            entity_id,
            config,
        ))
    }
}
