//! Frontend endpoint layout
//!
//! A frontend listens on one URL per (service, binding, backend). Mirrored
//! frontends add the target they stand in for, so every virtual IdP gets its
//! own set of endpoints.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::{
    error::{PrismError, Result},
    ids::encode_target_segment,
    models::{Config, EntityRole, ModuleDescriptor},
};

/// Key holding the endpoint layout in a frontend module's config
pub const ENDPOINTS_KEY: &str = "endpoints";

/// `service -> binding -> path` as configured on a frontend module
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointLayout {
    services: BTreeMap<String, BTreeMap<String, String>>,
}

impl EndpointLayout {
    /// Read the layout from a frontend module's `endpoints` mapping
    pub fn from_module(module: &ModuleDescriptor) -> Result<Self> {
        let raw = match module.config.get(ENDPOINTS_KEY) {
            Some(Value::Object(raw)) => raw,
            Some(_) => {
                return Err(PrismError::config_error(format!(
                    "module '{}': '{}' must be a mapping",
                    module.name, ENDPOINTS_KEY
                )))
            }
            None => {
                return Err(PrismError::config_error(format!(
                    "module '{}': missing '{}'",
                    module.name, ENDPOINTS_KEY
                )))
            }
        };

        let mut services = BTreeMap::new();
        for (service, bindings) in raw {
            let Value::Object(bindings) = bindings else {
                return Err(PrismError::config_error(format!(
                    "module '{}': endpoints of '{}' must map bindings to paths",
                    module.name, service
                )));
            };

            let mut paths = BTreeMap::new();
            for (binding, path) in bindings {
                let Some(path) = path.as_str() else {
                    return Err(PrismError::config_error(format!(
                        "module '{}': path for '{}' / '{}' must be a string",
                        module.name, service, binding
                    )));
                };
                paths.insert(binding.clone(), path.to_string());
            }
            services.insert(service.clone(), paths);
        }

        Ok(Self { services })
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Endpoints of an unmirrored frontend, one URL per backend and binding.
    ///
    /// Each service maps to a list of `[url, binding]` pairs.
    pub fn register(&self, base_url: &str, backends: &[&str]) -> Config {
        self.build(|path| {
            backends
                .iter()
                .map(|backend| join_url(base_url, &[*backend, path]))
                .collect()
        })
    }

    /// Endpoints of one mirrored frontend entity, scoped to a backend and target
    pub fn register_mirrored(
        &self,
        base_url: &str,
        backend: &str,
        target_entity_id: &str,
    ) -> Config {
        let target = encode_target_segment(target_entity_id);
        self.build(|path| vec![join_url(base_url, &[backend, target.as_str(), path])])
    }

    fn build(&self, urls_for: impl Fn(&str) -> Vec<String>) -> Config {
        let mut endpoints = Config::new();
        for (service, bindings) in &self.services {
            let mut entries = Vec::new();
            for (binding, path) in bindings {
                for url in urls_for(path) {
                    entries.push(json!([url, binding]));
                }
            }
            endpoints.insert(service.clone(), Value::Array(entries));
        }
        endpoints
    }
}

/// Write `endpoints` into `config` under `service.<role>.endpoints`.
///
/// Services already present there are replaced, others are kept.
pub fn apply_endpoints(config: &mut Config, role: EntityRole, endpoints: Config) -> Result<()> {
    let mut target = config;
    for key in ["service", role.service_key(), ENDPOINTS_KEY] {
        let slot = target
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Config::new()));
        target = match slot {
            Value::Object(map) => map,
            _ => {
                return Err(PrismError::config_error(format!(
                    "'{}' in a {:?} configuration must be a mapping",
                    key, role
                )))
            }
        };
    }

    target.extend(endpoints);
    Ok(())
}

fn join_url(base_url: &str, segments: &[&str]) -> String {
    let mut url = base_url.trim_end_matches('/').to_string();
    for segment in segments {
        let segment = segment.trim_matches('/');
        if !segment.is_empty() {
            url.push('/');
            url.push_str(segment);
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModuleKind;

    fn frontend() -> ModuleDescriptor {
        let config = json!({
            "idp_config": { "entityid": "https://proxy/idp1" },
            "endpoints": {
                "single_sign_on_service": {
                    "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect": "sso/redirect",
                    "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST": "/sso/post"
                }
            }
        });
        let Value::Object(config) = config else {
            unreachable!()
        };
        ModuleDescriptor::new("idp1", ModuleKind::SingleFrontend, config)
    }

    #[test]
    fn test_register_per_backend() {
        let layout = EndpointLayout::from_module(&frontend()).unwrap();
        let endpoints = layout.register("https://proxy/", &["sp1", "sp2"]);

        let sso = endpoints["single_sign_on_service"].as_array().unwrap();
        assert_eq!(sso.len(), 4);
        assert_eq!(
            sso[0],
            json!([
                "https://proxy/sp1/sso/post",
                "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST"
            ])
        );
        assert_eq!(sso[1][0], "https://proxy/sp2/sso/post");
    }

    #[test]
    fn test_register_mirrored_encodes_target() {
        let layout = EndpointLayout::from_module(&frontend()).unwrap();
        let endpoints =
            layout.register_mirrored("https://proxy", "sp1", "https://idp.example.org");

        let sso = endpoints["single_sign_on_service"].as_array().unwrap();
        assert_eq!(sso.len(), 2);
        let url = sso[0][0].as_str().unwrap();
        assert_eq!(
            url,
            format!(
                "https://proxy/sp1/{}/sso/post",
                encode_target_segment("https://idp.example.org")
            )
        );
    }

    #[test]
    fn test_missing_layout_is_config_error() {
        let mut module = frontend();
        module.config.remove(ENDPOINTS_KEY);
        let err = EndpointLayout::from_module(&module).unwrap_err();
        assert!(matches!(err, PrismError::ConfigError { .. }));
    }

    #[test]
    fn test_apply_rejects_scalar_service() {
        let mut config = Config::new();
        config.insert("service".to_string(), json!("nope"));
        let err = apply_endpoints(&mut config, EntityRole::IdentityProvider, Config::new());
        assert!(err.is_err());
    }
}
