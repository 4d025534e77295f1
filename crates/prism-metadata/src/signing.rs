//! Signed metadata assembly
//!
//! Hands generated entity configurations to the signing collaborator, one
//! document per entity or one collection per module, and refuses to return
//! anything that is not a complete, signed document for what was asked.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use prism_core::{
    EntityMetadata, MetadataSigner, PrismError, Result, SecurityContext, SignedDocument,
    SigningRequest, VirtualEntityConfig,
};

/// How a module's entities are packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// One collection descriptor per module
    #[default]
    Collection,
    /// One descriptor per entity
    PerEntity,
}

/// Options for publishing a generation's metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishOptions {
    #[serde(default)]
    pub mode: PublishMode,
    /// Hours the signed metadata stays valid, no validity window if unset or 0
    #[serde(default)]
    pub valid_for_hours: Option<u32>,
}

/// Signed documents of one module
#[derive(Debug, Clone, Serialize)]
pub struct PublishedModule {
    pub module: String,
    pub documents: Vec<SignedDocument>,
}

/// Signs generated metadata through a [`MetadataSigner`]
pub struct MetadataPublisher {
    signer: Arc<dyn MetadataSigner>,
    context: SecurityContext,
}

impl MetadataPublisher {
    pub fn new(signer: Arc<dyn MetadataSigner>, context: SecurityContext) -> Self {
        Self { signer, context }
    }

    /// Sign a single entity descriptor
    #[instrument(skip_all, fields(entity_id = %entity.entity_id))]
    pub async fn sign_entity(
        &self,
        entity: &VirtualEntityConfig,
        valid_for_hours: Option<u32>,
    ) -> Result<SignedDocument> {
        self.sign(vec![entity.clone()], false, valid_for_hours).await
    }

    /// Sign a collection descriptor wrapping `entities`
    #[instrument(skip_all, fields(entities = entities.len()))]
    pub async fn sign_collection(
        &self,
        entities: &[VirtualEntityConfig],
        valid_for_hours: Option<u32>,
    ) -> Result<SignedDocument> {
        self.sign(entities.to_vec(), true, valid_for_hours).await
    }

    /// Sign every module's entities.
    ///
    /// Modules without entities publish nothing. The first failure aborts the
    /// whole publish.
    #[instrument(skip_all, fields(mode = ?options.mode))]
    pub async fn publish(
        &self,
        metadata: &EntityMetadata,
        options: &PublishOptions,
    ) -> Result<Vec<PublishedModule>> {
        let mut published = Vec::new();

        for module in metadata.iter() {
            if module.entities.is_empty() {
                debug!("Module '{}' has no entities to publish", module.module);
                continue;
            }

            let documents = match options.mode {
                PublishMode::Collection => {
                    let document = self
                        .sign_collection(&module.entities, options.valid_for_hours)
                        .await?;
                    vec![document]
                }
                PublishMode::PerEntity => {
                    let mut documents = Vec::with_capacity(module.entities.len());
                    for entity in &module.entities {
                        documents.push(self.sign_entity(entity, options.valid_for_hours).await?);
                    }
                    documents
                }
            };

            info!(
                "Signed {} document(s) for module '{}'",
                documents.len(),
                module.module
            );
            published.push(PublishedModule {
                module: module.module.clone(),
                documents,
            });
        }

        Ok(published)
    }

    async fn sign(
        &self,
        entities: Vec<VirtualEntityConfig>,
        collection: bool,
        valid_for_hours: Option<u32>,
    ) -> Result<SignedDocument> {
        check_entities(&entities)?;

        let requested: Vec<String> = entities.iter().map(|e| e.entity_id.clone()).collect();
        let request = SigningRequest {
            entities,
            collection,
            valid_until: valid_until(valid_for_hours)?,
        };

        let document = self.signer.build_and_sign(&request, &self.context).await?;

        let signed: HashSet<&str> = document.entity_ids.iter().map(String::as_str).collect();
        if document.entity_ids.len() != requested.len()
            || requested.iter().any(|id| !signed.contains(id.as_str()))
        {
            return Err(PrismError::validation_error(format!(
                "signed document describes {:?}, expected {:?}",
                document.entity_ids, requested
            )));
        }

        Ok(document)
    }
}

/// End of the validity window starting now.
///
/// A window reaching past the representable date range is a `ValidationError`.
pub fn valid_until(valid_for_hours: Option<u32>) -> Result<Option<DateTime<Utc>>> {
    let Some(hours) = valid_for_hours.filter(|hours| *hours > 0) else {
        return Ok(None);
    };

    Duration::try_hours(i64::from(hours))
        .and_then(|window| Utc::now().checked_add_signed(window))
        .map(Some)
        .ok_or_else(|| {
            PrismError::validation_error(format!(
                "validity window of {} hours is out of range",
                hours
            ))
        })
}

fn check_entities(entities: &[VirtualEntityConfig]) -> Result<()> {
    if entities.is_empty() {
        return Err(PrismError::validation_error(
            "cannot build a descriptor without entities",
        ));
    }

    let mut seen = HashSet::new();
    for entity in entities {
        if !entity.is_self_consistent() {
            return Err(PrismError::validation_error(format!(
                "entity '{}' of module '{}' does not carry its own entity id",
                entity.entity_id, entity.module
            )));
        }
        if !seen.insert(entity.entity_id.as_str()) {
            return Err(PrismError::validation_error(format!(
                "entity '{}' appears twice in one descriptor",
                entity.entity_id
            )));
        }
    }

    Ok(())
}
