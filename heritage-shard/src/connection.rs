//! Connection descriptors for shards
//!
//! A descriptor is the region template with shard and community
//! discriminators appended. It is a pure function of the shard key and the
//! template source, so nothing here is cached.

use crate::collaborators::TemplateSource;
use crate::error::{Result, ShardError};
use crate::types::{require_field, ShardKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Length of the shard discriminator appended to the template
const SHARD_DISCRIMINATOR_LEN: usize = 8;

/// Region- and shard-scoped connection descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub shard_id: String,
    pub region: String,
    pub community_group: String,
    pub connection_string: String,
    /// Whether a dedicated region template was used
    pub from_region_template: bool,
}

/// Builds connection descriptors from per-region templates
pub struct ConnectionDescriptorBuilder {
    templates: Arc<dyn TemplateSource>,
}

impl ConnectionDescriptorBuilder {
    pub fn new(templates: Arc<dyn TemplateSource>) -> Self {
        Self { templates }
    }

    /// Build the descriptor for a shard key
    pub async fn build(&self, shard_key: &ShardKey) -> Result<ConnectionDescriptor> {
        require_field("shard_id", &shard_key.shard_id)?;
        require_field("region", &shard_key.region)?;

        let region_template = self
            .templates
            .template(&shard_key.region)
            .await
            .map_err(unreachable_source)?;

        let (template, from_region_template) = match region_template {
            Some(template) => (template, true),
            None => {
                let fallback = self
                    .templates
                    .default_template()
                    .await
                    .map_err(unreachable_source)?;
                (fallback, false)
            }
        };

        let mut connection_string = template.replace("{region}", &shard_key.region);
        if !connection_string.is_empty() && !connection_string.ends_with(';') {
            connection_string.push(';');
        }
        let discriminator = shard_key
            .shard_id
            .get(..SHARD_DISCRIMINATOR_LEN)
            .unwrap_or(shard_key.shard_id.as_str());
        connection_string.push_str(&format!(
            "Shard={};Community={};",
            discriminator, shard_key.community_group
        ));

        debug!(
            shard_id = %shard_key.shard_id,
            region = %shard_key.region,
            from_region_template,
            "Built connection descriptor"
        );

        Ok(ConnectionDescriptor {
            shard_id: shard_key.shard_id.clone(),
            region: shard_key.region.clone(),
            community_group: shard_key.community_group.clone(),
            connection_string,
            from_region_template,
        })
    }
}

fn unreachable_source(err: ShardError) -> ShardError {
    warn!(error = %err, "Connection template source failed");
    ShardError::from_dependency("template source", err)
}
