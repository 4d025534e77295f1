//! Deterministic identifiers for virtual entities
//!
//! A virtual entity never gets a random identifier: its `entityid` is derived
//! from the module that emits it, the peer module it pairs with and the target
//! it mirrors, so regenerating metadata after a restart yields the same ids.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

/// Length of every token produced by [`derive_entity_token`].
pub const ENTITY_TOKEN_LEN: usize = 43;

/// Derive a fixed-length, URL-safe token from an arbitrary seed.
///
/// The seed is usually a downstream SP entity id or an OIDC client id.
pub fn derive_entity_token(seed: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(seed.as_bytes()))
}

/// Entity id of a mirrored backend SP facing one peer of one frontend.
///
/// Shape: `<backend base entity id>/<frontend name>/<token(peer)>`
pub fn mirrored_backend_entity_id(
    base_entity_id: &str,
    frontend_name: &str,
    peer: &str,
) -> String {
    format!("{}/{}/{}", base_entity_id, frontend_name, derive_entity_token(peer))
}

/// Entity id of a mirrored frontend IdP standing in for one upstream target.
///
/// Shape: `<frontend base entity id>/<target entity id>`
pub fn mirrored_frontend_entity_id(base_entity_id: &str, target_entity_id: &str) -> String {
    format!("{}/{}", base_entity_id, target_entity_id)
}

/// URL path segment encoding a target entity id inside a mirrored endpoint.
pub fn encode_target_segment(target_entity_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(target_entity_id.as_bytes())
}
