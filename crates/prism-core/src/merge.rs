//! Configuration merge engine
//!
//! Folds a target's descriptive metadata into a module's protocol
//! configuration without touching either input.

use serde_json::Value;

use crate::models::Config;

/// Keys a synthesized IdP must never inherit from the target it mirrors.
///
/// The proxy stays the organization of record for every entity it publishes.
pub const MIRRORED_IDP_EXCLUDED_KEYS: &[&str] = &["organization", "contact_person"];

/// Deep-merge `overlay` into a copy of `base`.
///
/// Keys listed in `excluded_keys` are skipped at every nesting level, also
/// inside subtrees that `base` does not have yet: such a mapping is copied
/// with its excluded keys removed rather than taken whole. Where both sides
/// hold a mapping the merge recurses, otherwise the overlay value wins.
pub fn merge_configs(base: &Config, overlay: &Config, excluded_keys: &[&str]) -> Config {
    let mut merged = base.clone();
    merge_into(&mut merged, overlay, excluded_keys);
    merged
}

fn merge_into(target: &mut Config, overlay: &Config, excluded_keys: &[&str]) {
    for (key, value) in overlay {
        if excluded_keys.contains(&key.as_str()) {
            continue;
        }

        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_into(existing, nested, excluded_keys);
            }
            (_, Value::Object(nested)) => {
                // A fresh subtree still has to drop excluded keys below it
                let mut fresh = Config::new();
                merge_into(&mut fresh, nested, excluded_keys);
                target.insert(key.clone(), Value::Object(fresh));
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
