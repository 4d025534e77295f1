//! Prism Metadata - Virtual entity generation for mirrored proxy modules
//!
//! This crate turns the proxy's configured modules into the entity
//! configurations published as federation metadata:
//! - Single backends and frontends publish their own entity
//! - Mirrored backends publish one virtual SP per downstream peer
//! - Mirrored frontends publish one virtual IdP per upstream target
//!
//! # Architecture
//!
//! The engine talks to two collaborators:
//! - `PeerDiscovery`: lists the peers and target descriptions of each module
//! - `MetadataSigner`: builds, signs and validates the descriptor documents
//!
//! The `ModuleRegistry` holds the validated modules, the `MetadataGenerator`
//! produces entity configurations from it and the `MetadataPublisher` gets
//! them signed.

pub mod builder;
pub mod discovery;
pub mod generator;
pub mod registry;
pub mod signing;


// Re-export core types
pub use prism_core::*;

pub use builder::EntityConfigBuilder;
pub use discovery::StaticDiscovery;
pub use generator::{GeneratedEntities, MetadataGenerator};
pub use registry::{ModuleBuilder, ModuleRegistry};
pub use signing::{MetadataPublisher, PublishMode, PublishOptions, PublishedModule};
