//! Domain models for proxy modules and the virtual entities generated from them

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{
    endpoints::EndpointLayout,
    error::{PrismError, Result},
};

/// Key holding the entity identifier inside every protocol section.
pub const ENTITY_ID_KEY: &str = "entityid";

/// Configuration mapping as loaded from the proxy's static configuration.
pub type Config = serde_json::Map<String, Value>;

// =============================================================================
// Module Descriptors
// =============================================================================

/// Capability of a configured proxy module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// SAML SP backend published under its own entity id only
    SingleBackend,
    /// SAML SP backend that gets one virtual SP per downstream peer
    MirroredBackend,
    /// SAML IdP frontend published under its own entity id only
    SingleFrontend,
    /// SAML IdP frontend that gets one virtual IdP per upstream target
    MirroredFrontend,
    /// OpenID Connect provider frontend
    OidcFrontend,
}

impl ModuleKind {
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::SingleBackend | Self::MirroredBackend)
    }

    pub fn is_frontend(&self) -> bool {
        !self.is_backend()
    }

    /// Configuration section holding the module's protocol configuration
    pub fn config_section(&self) -> &'static str {
        match self {
            Self::SingleBackend | Self::MirroredBackend => "sp_config",
            Self::SingleFrontend | Self::MirroredFrontend => "idp_config",
            Self::OidcFrontend => "op_config",
        }
    }

    /// Role of the entities this module publishes
    pub fn entity_role(&self) -> EntityRole {
        match self {
            Self::SingleBackend | Self::MirroredBackend => EntityRole::ServiceProvider,
            Self::SingleFrontend | Self::MirroredFrontend => EntityRole::IdentityProvider,
            Self::OidcFrontend => EntityRole::OpenIdProvider,
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleBackend => write!(f, "single_backend"),
            Self::MirroredBackend => write!(f, "mirrored_backend"),
            Self::SingleFrontend => write!(f, "single_frontend"),
            Self::MirroredFrontend => write!(f, "mirrored_frontend"),
            Self::OidcFrontend => write!(f, "oidc_frontend"),
        }
    }
}

/// Role an entity plays in the federation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    ServiceProvider,
    IdentityProvider,
    OpenIdProvider,
}

impl EntityRole {
    /// Key under `service` where this role's endpoints live
    pub fn service_key(&self) -> &'static str {
        match self {
            Self::ServiceProvider => "sp",
            Self::IdentityProvider => "idp",
            Self::OpenIdProvider => "op",
        }
    }
}

/// One configured proxy-side participant.
///
/// Descriptors are built once at startup and only ever read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub kind: ModuleKind,
    #[serde(default)]
    pub config: Config,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, kind: ModuleKind, config: Config) -> Self {
        Self {
            name: name.into(),
            kind,
            config,
        }
    }

    /// The protocol section (`sp_config`, `idp_config` or `op_config`)
    pub fn protocol_config(&self) -> Result<&Config> {
        let section = self.kind.config_section();
        match self.config.get(section) {
            Some(Value::Object(config)) => Ok(config),
            Some(_) => Err(PrismError::config_error(format!(
                "module '{}' ({}): '{}' must be a mapping",
                self.name, self.kind, section
            ))),
            None => Err(PrismError::config_error(format!(
                "module '{}' ({}): missing '{}'",
                self.name, self.kind, section
            ))),
        }
    }

    /// The unmirrored entity id this module is configured with
    pub fn base_entity_id(&self) -> Result<&str> {
        let section = self.kind.config_section();
        match self.protocol_config()?.get(ENTITY_ID_KEY) {
            Some(Value::String(id)) if !id.trim().is_empty() => Ok(id),
            Some(Value::String(_)) => Err(PrismError::config_error(format!(
                "module '{}' ({}): '{}.{}' is empty",
                self.name, self.kind, section, ENTITY_ID_KEY
            ))),
            Some(_) => Err(PrismError::config_error(format!(
                "module '{}' ({}): '{}.{}' must be a string",
                self.name, self.kind, section, ENTITY_ID_KEY
            ))),
            None => Err(PrismError::config_error(format!(
                "module '{}' ({}): missing base entity id '{}.{}'",
                self.name, self.kind, section, ENTITY_ID_KEY
            ))),
        }
    }

    /// Check everything the generators read from this module
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PrismError::config_error(format!(
                "{} module with an empty name",
                self.kind
            )));
        }
        if self.name.contains('/') {
            return Err(PrismError::config_error(format!(
                "module '{}': names are used as path segments and must not contain '/'",
                self.name
            )));
        }

        self.base_entity_id()?;

        if self.kind.is_frontend() {
            EndpointLayout::from_module(self)?;
        }

        Ok(())
    }
}

// =============================================================================
// Discovered Targets
// =============================================================================

/// Descriptive metadata a backend publishes for one upstream target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDescription {
    #[serde(rename = "entityid")]
    pub entity_id: String,
    /// Organization, contact and display fields as published
    #[serde(flatten)]
    pub metadata: Config,
}

impl MetadataDescription {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            metadata: Config::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The mapping folded into a mirrored IdP configuration
    pub fn to_overlay(&self) -> Config {
        let mut overlay = self.metadata.clone();
        overlay.insert(
            ENTITY_ID_KEY.to_string(),
            Value::String(self.entity_id.clone()),
        );
        overlay
    }
}

// =============================================================================
// Generated Entities
// =============================================================================

/// Configuration of one virtual entity, ready for descriptor assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualEntityConfig {
    pub entity_id: String,
    pub role: EntityRole,
    /// Name of the module publishing this entity
    pub module: String,
    pub protocol_config: Config,
}

impl VirtualEntityConfig {
    /// Build an entity whose protocol config carries `entity_id` as its `entityid`
    pub fn new(
        module: impl Into<String>,
        role: EntityRole,
        entity_id: impl Into<String>,
        mut protocol_config: Config,
    ) -> Self {
        let entity_id = entity_id.into();
        protocol_config.insert(ENTITY_ID_KEY.to_string(), Value::String(entity_id.clone()));

        Self {
            entity_id,
            role,
            module: module.into(),
            protocol_config,
        }
    }

    /// Whether the protocol config agrees with `entity_id`
    pub fn is_self_consistent(&self) -> bool {
        !self.entity_id.is_empty()
            && self.protocol_config.get(ENTITY_ID_KEY).and_then(Value::as_str)
                == Some(self.entity_id.as_str())
    }
}

/// Entities published by a single module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleEntities {
    pub module: String,
    pub entities: Vec<VirtualEntityConfig>,
}

/// Virtual entities per module, in configuration order.
///
/// Entity ids are unique across the whole collection.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct EntityMetadata {
    modules: Vec<ModuleEntities>,
    #[serde(skip)]
    owners: HashMap<String, String>,
}

impl EntityMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `module` has an entry, even if it ends up empty
    pub fn ensure_module(&mut self, module: &str) {
        if !self.modules.iter().any(|m| m.module == module) {
            self.modules.push(ModuleEntities {
                module: module.to_string(),
                entities: Vec::new(),
            });
        }
    }

    /// Append an entity under its module.
    ///
    /// Two entities sharing an id is a configuration error: the published
    /// metadata would be ambiguous.
    pub fn push(&mut self, entity: VirtualEntityConfig) -> Result<()> {
        if let Some(owner) = self.owners.get(&entity.entity_id) {
            return Err(PrismError::config_error(format!(
                "entity id collision: '{}' generated for module '{}' and module '{}'",
                entity.entity_id, owner, entity.module
            )));
        }

        self.ensure_module(&entity.module);
        self.owners
            .insert(entity.entity_id.clone(), entity.module.clone());

        if let Some(entry) = self.modules.iter_mut().find(|m| m.module == entity.module) {
            entry.entities.push(entity);
        }
        Ok(())
    }

    /// Entities of one module, if the module was processed
    pub fn get(&self, module: &str) -> Option<&[VirtualEntityConfig]> {
        self.modules
            .iter()
            .find(|m| m.module == module)
            .map(|m| m.entities.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleEntities> {
        self.modules.iter()
    }

    /// All entity ids in emission order
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.modules
            .iter()
            .flat_map(|m| m.entities.iter().map(|e| e.entity_id.as_str()))
    }

    pub fn contains_entity(&self, entity_id: &str) -> bool {
        self.owners.contains_key(entity_id)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn entity_count(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// A frontend/backend pairing that contributed nothing because discovery failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingFailure {
    /// Module whose metadata is missing the pairing's entities
    pub module: String,
    /// The other side of the pairing
    pub peer_module: String,
    pub message: String,
}

/// Output of one metadata generation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    /// IdP / OP entities per frontend module
    pub frontend: EntityMetadata,
    /// SP entities per backend module
    pub backend: EntityMetadata,
    /// Pairings skipped after a recoverable discovery failure
    pub failures: Vec<PairingFailure>,
}

impl GenerationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.frontend.entity_count() + self.backend.entity_count()
    }
}
