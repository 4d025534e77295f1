//! Module Registry - the proxy's configured frontends and backends
//!
//! The registry provides:
//! - Module validation at startup (names, base entity ids, endpoint layouts)
//! - Lookup by name
//! - Frontend and backend listings in configuration order
//!
//! It is assembled once and then shared read-only, typically as
//! `Arc<ModuleRegistry>`, by every metadata generation.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use prism_core::{
    Config, ModuleDescriptor, ModuleKind, PrismError, Result, ENDPOINTS_KEY, ENTITY_ID_KEY,
};

/// Registry of validated proxy modules
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    /// Public base URL every frontend endpoint hangs off
    base_url: String,
    frontends: Vec<ModuleDescriptor>,
    backends: Vec<ModuleDescriptor>,
}

impl ModuleRegistry {
    /// Create an empty registry for a proxy served at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(PrismError::config_error("proxy base URL is empty"));
        }

        Ok(Self {
            base_url,
            frontends: Vec::new(),
            backends: Vec::new(),
        })
    }

    /// Build a registry from the configured module lists
    pub fn from_modules(
        base_url: impl Into<String>,
        frontends: Vec<ModuleDescriptor>,
        backends: Vec<ModuleDescriptor>,
    ) -> Result<Self> {
        let mut registry = Self::new(base_url)?;

        for module in frontends {
            if !module.kind.is_frontend() {
                return Err(PrismError::config_error(format!(
                    "module '{}' is configured as a frontend but has kind {}",
                    module.name, module.kind
                )));
            }
            registry.register(module)?;
        }

        for module in backends {
            if !module.kind.is_backend() {
                return Err(PrismError::config_error(format!(
                    "module '{}' is configured as a backend but has kind {}",
                    module.name, module.kind
                )));
            }
            registry.register(module)?;
        }

        info!(
            "Loaded frontend modules: {:?}",
            registry.frontends.iter().map(|m| &m.name).collect::<Vec<_>>()
        );
        info!(
            "Loaded backend modules: {:?}",
            registry.backends.iter().map(|m| &m.name).collect::<Vec<_>>()
        );

        Ok(registry)
    }

    /// Validate and register a module
    #[instrument(skip(self, module), fields(module = %module.name, kind = %module.kind))]
    pub fn register(&mut self, module: ModuleDescriptor) -> Result<()> {
        module.validate()?;

        if self.get(&module.name).is_some() {
            return Err(PrismError::config_error(format!(
                "module name '{}' is configured twice",
                module.name
            )));
        }

        debug!("Registering module with base entity id {}", module.base_entity_id()?);

        if module.kind.is_backend() {
            self.backends.push(module);
        } else {
            self.frontends.push(module);
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Frontend modules in configuration order
    pub fn frontends(&self) -> &[ModuleDescriptor] {
        &self.frontends
    }

    /// Backend modules in configuration order
    pub fn backends(&self) -> &[ModuleDescriptor] {
        &self.backends
    }

    /// Find a module by name
    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.frontends
            .iter()
            .chain(self.backends.iter())
            .find(|m| m.name == name)
    }

    pub fn module_count(&self) -> usize {
        self.frontends.len() + self.backends.len()
    }
}

/// Builder for module descriptors
pub struct ModuleBuilder {
    name: String,
    kind: ModuleKind,
    protocol: Config,
    endpoints: BTreeMap<String, Config>,
    extra: Config,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            protocol: Config::new(),
            endpoints: BTreeMap::new(),
            extra: Config::new(),
        }
    }

    /// Set the base entity id of the module's protocol section
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.protocol
            .insert(ENTITY_ID_KEY.to_string(), Value::String(entity_id.into()));
        self
    }

    /// Set a field of the module's protocol section
    pub fn with_protocol_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.protocol.insert(key.into(), value);
        self
    }

    /// Add a frontend endpoint path for a service and binding
    pub fn with_endpoint(
        mut self,
        service: impl Into<String>,
        binding: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        self.endpoints
            .entry(service.into())
            .or_default()
            .insert(binding.into(), Value::String(path.into()));
        self
    }

    /// Set a module-level config key outside the protocol section
    pub fn with_config_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn build(self) -> ModuleDescriptor {
        let mut config = self.extra;
        config.insert(
            self.kind.config_section().to_string(),
            Value::Object(self.protocol),
        );

        if self.kind.is_frontend() {
            let endpoints = self
                .endpoints
                .into_iter()
                .map(|(service, bindings)| (service, Value::Object(bindings)))
                .collect();
            config.insert(ENDPOINTS_KEY.to_string(), Value::Object(endpoints));
        }

        ModuleDescriptor::new(self.name, self.kind, config)
    }

    pub fn register(self, registry: &mut ModuleRegistry) -> Result<ModuleDescriptor> {
        let module = self.build();
        registry.register(module.clone())?;
        Ok(module)
    }
}
