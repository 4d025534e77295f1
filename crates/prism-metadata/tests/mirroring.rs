//! End-to-end mirroring scenarios
//!
//! These run a whole generation over a registry and check the published
//! entity ids and configurations.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use prism_metadata::{
    derive_entity_token, MetadataDescription, MetadataGenerator, ModuleBuilder, ModuleDescriptor,
    ModuleKind, ModuleRegistry, PeerDiscovery, PrismError, Result, StaticDiscovery,
};

const BASE_URL: &str = "https://proxy.example.com";
const POST: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";

fn saml_frontend(name: &str, kind: ModuleKind) -> ModuleDescriptor {
    ModuleBuilder::new(name, kind)
        .with_entity_id(format!("https://proxy/{}", name))
        .with_endpoint("single_sign_on_service", POST, "sso/post")
        .build()
}

fn oidc_frontend(name: &str) -> ModuleDescriptor {
    ModuleBuilder::new(name, ModuleKind::OidcFrontend)
        .with_entity_id(format!("https://proxy/{}", name))
        .with_endpoint("authorization_endpoint", "GET", "authorization")
        .build()
}

fn mirrored_backend(name: &str) -> ModuleDescriptor {
    ModuleBuilder::new(name, ModuleKind::MirroredBackend)
        .with_entity_id(format!("https://proxy/{}", name))
        .with_protocol_field("organization", json!({ "name": "Proxy Operator" }))
        .build()
}

fn generator(registry: &ModuleRegistry, discovery: impl PeerDiscovery + 'static) -> MetadataGenerator {
    MetadataGenerator::for_registry(registry, Arc::new(discovery))
}

#[tokio::test]
async fn test_mirrored_backend_one_entity_per_peer() {
    let frontends = vec![
        saml_frontend("saml", ModuleKind::MirroredFrontend),
        oidc_frontend("oidc"),
    ];
    let backends = vec![mirrored_backend("sp1")];
    let discovery = StaticDiscovery::new()
        .with_peers(
            "saml",
            [
                "https://a.example.org",
                "https://b.example.org",
                "https://c.example.org",
            ],
        )
        .with_peers("oidc", ["client-1", "client-2"]);
    let registry = ModuleRegistry::from_modules(BASE_URL, frontends, backends).unwrap();

    let generated = generator(&registry, discovery)
        .generate_backend_entities(registry.backends(), registry.frontends())
        .await
        .unwrap();

    let entities = generated.metadata.get("sp1").unwrap();
    assert_eq!(entities.len(), 1 + 3 + 2);

    let ids: HashSet<&str> = entities.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids.len(), 6);
    assert!(entities.iter().all(|e| e.is_self_consistent()));
}

#[tokio::test]
async fn test_backend_without_descriptions_yields_no_mirrors() {
    let registry = ModuleRegistry::from_modules(
        BASE_URL,
        vec![saml_frontend("idp1", ModuleKind::MirroredFrontend)],
        vec![mirrored_backend("sp1")],
    )
    .unwrap();

    let generated = generator(&registry, StaticDiscovery::new())
        .generate_frontend_entities(registry.frontends(), registry.backends())
        .await
        .unwrap();

    assert_eq!(generated.metadata.get("idp1").map(|e| e.len()), Some(0));
    assert!(generated.failures.is_empty());
}

#[tokio::test]
async fn test_end_to_end_sp1_idp1() {
    let registry = ModuleRegistry::from_modules(
        BASE_URL,
        vec![saml_frontend("idp1", ModuleKind::MirroredFrontend)],
        vec![mirrored_backend("sp1")],
    )
    .unwrap();
    let discovery = StaticDiscovery::new()
        .with_peers("idp1", ["https://sp.example.org/meta"])
        .with_descriptions(
            "sp1",
            [MetadataDescription::new("https://sp.example.org/meta")
                .with_field("organization", json!({ "name": "Upstream Org" }))
                .with_field("contact_person", json!([{ "email_address": ["a@b"] }]))
                .with_field("display_name", json!("Upstream IdP"))],
        );

    let report = generator(&registry, discovery)
        .create_entity_descriptors(&registry)
        .await
        .unwrap();

    assert!(report.is_complete());

    let backend_ids: Vec<&str> = report.backend.entity_ids().collect();
    let expected_backend = format!(
        "https://proxy/sp1/idp1/{}",
        derive_entity_token("https://sp.example.org/meta")
    );
    assert_eq!(backend_ids, vec!["https://proxy/sp1", expected_backend.as_str()]);

    let mirrored = &report.frontend.get("idp1").unwrap()[0];
    assert_eq!(mirrored.entity_id, "https://proxy/idp1/https://sp.example.org/meta");

    let config = &mirrored.protocol_config;
    assert!(config.get("organization").is_none());
    assert!(config.get("contact_person").is_none());
    assert_eq!(config["display_name"], "Upstream IdP");
    assert_eq!(config["entityid"], "https://proxy/idp1/https://sp.example.org/meta");
}

#[tokio::test]
async fn test_generation_is_reproducible() {
    let build = || {
        let registry = ModuleRegistry::from_modules(
            BASE_URL,
            vec![
                saml_frontend("idp1", ModuleKind::MirroredFrontend),
                saml_frontend("idp2", ModuleKind::SingleFrontend),
                oidc_frontend("op"),
            ],
            vec![mirrored_backend("sp1")],
        )
        .unwrap();
        let discovery = StaticDiscovery::new()
            .with_peers("idp1", ["https://a.example.org", "https://b.example.org"])
            .with_peers("op", ["client-1"])
            .with_descriptions(
                "sp1",
                [
                    MetadataDescription::new("https://idp-a.example.org"),
                    MetadataDescription::new("https://idp-b.example.org"),
                ],
            );
        (registry, discovery)
    };

    let mut runs = Vec::new();
    for _ in 0..2 {
        let (registry, discovery) = build();
        let report = generator(&registry, discovery)
            .create_entity_descriptors(&registry)
            .await
            .unwrap();
        let ids: Vec<String> = report
            .backend
            .entity_ids()
            .chain(report.frontend.entity_ids())
            .map(String::from)
            .collect();
        runs.push(serde_json::to_vec(&ids).unwrap());
    }

    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_generation_leaves_registry_untouched() {
    let registry = ModuleRegistry::from_modules(
        BASE_URL,
        vec![saml_frontend("idp1", ModuleKind::MirroredFrontend)],
        vec![mirrored_backend("sp1")],
    )
    .unwrap();
    let before = registry.clone();
    let discovery = StaticDiscovery::new()
        .with_peers("idp1", ["https://a.example.org"])
        .with_descriptions("sp1", [MetadataDescription::new("https://idp.example.org")]);

    generator(&registry, discovery)
        .create_entity_descriptors(&registry)
        .await
        .unwrap();

    assert_eq!(registry.frontends(), before.frontends());
    assert_eq!(registry.backends(), before.backends());
}

#[tokio::test]
async fn test_missing_frontend_endpoints_aborts_generation() {
    let mut idp1 = saml_frontend("idp1", ModuleKind::SingleFrontend);
    let mut registry = ModuleRegistry::from_modules(BASE_URL, vec![], vec![mirrored_backend("sp1")])
        .unwrap();
    idp1.config.insert("endpoints".to_string(), json!("sso/post"));
    assert!(registry.register(idp1).is_err());

    // The generators check on their own when handed unregistered modules
    let mut idp2 = saml_frontend("idp2", ModuleKind::SingleFrontend);
    idp2.config.insert("endpoints".to_string(), json!("sso/post"));
    let err = generator(&registry, StaticDiscovery::new())
        .generate_backend_entities(registry.backends(), &[idp2])
        .await
        .unwrap_err();
    assert!(matches!(err, PrismError::ConfigError { .. }));
}

/// Discovery that cannot reach the metadata store of one frontend
struct PartialDiscovery {
    inner: StaticDiscovery,
    unreachable: &'static str,
}

#[async_trait]
impl PeerDiscovery for PartialDiscovery {
    async fn list_known_peers(&self, frontend: &ModuleDescriptor) -> Result<Vec<String>> {
        if frontend.name == self.unreachable {
            return Err(PrismError::discovery_error(&frontend.name, "connection refused"));
        }
        self.inner.list_known_peers(frontend).await
    }

    async fn list_published_descriptions(
        &self,
        backend: &ModuleDescriptor,
    ) -> Result<Vec<MetadataDescription>> {
        self.inner.list_published_descriptions(backend).await
    }
}

#[tokio::test]
async fn test_partial_discovery_failure_is_reported() {
    let registry = ModuleRegistry::from_modules(
        BASE_URL,
        vec![
            saml_frontend("idp1", ModuleKind::SingleFrontend),
            saml_frontend("idp2", ModuleKind::SingleFrontend),
        ],
        vec![mirrored_backend("sp1")],
    )
    .unwrap();
    let discovery = PartialDiscovery {
        inner: StaticDiscovery::new()
            .with_peers("idp1", ["https://a.example.org"])
            .with_peers("idp2", ["https://b.example.org"]),
        unreachable: "idp1",
    };

    let report = generator(&registry, discovery)
        .create_entity_descriptors(&registry)
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].peer_module, "idp1");

    // sp1 itself, the idp2 mirror, and both unmirrored frontends
    assert_eq!(report.backend.entity_count(), 2);
    assert_eq!(report.frontend.entity_count(), 2);
}
