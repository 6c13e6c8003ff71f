//! Configuration-backed collaborators
//!
//! Fixed implementations built from [`ShardingConfig`]. Best for single-region
//! deployments and tests; production wires in remote clients instead.

use super::{AffinityBalancer, AffinityDecision, CulturalClassifier, TemplateSource};
use crate::config::ShardingConfig;
use crate::error::Result;
use crate::types::{require_field, CulturalContext, QueryContext, ShardKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Connection templates taken from configuration
pub struct StaticTemplateSource {
    templates: RwLock<HashMap<String, String>>,
    default_template: String,
}

impl StaticTemplateSource {
    pub fn new(templates: HashMap<String, String>, default_template: String) -> Self {
        Self {
            templates: RwLock::new(templates),
            default_template,
        }
    }

    pub fn from_config(config: &ShardingConfig) -> Self {
        Self::new(config.region_templates.clone(), config.default_template.clone())
    }

    /// Add or replace a region template
    pub fn set_template(&self, region: &str, template: &str) {
        debug!(region = %region, "Updating connection template");
        self.templates
            .write()
            .insert(region.to_string(), template.to_string());
    }
}

#[async_trait]
impl TemplateSource for StaticTemplateSource {
    async fn template(&self, region: &str) -> Result<Option<String>> {
        Ok(self.templates.read().get(region).cloned())
    }

    async fn default_template(&self) -> Result<String> {
        Ok(self.default_template.clone())
    }
}

/// Classifier that maps each region to a configured cultural background
pub struct StaticClassifier {
    backgrounds: HashMap<String, String>,
    default_background: String,
}

impl StaticClassifier {
    pub fn new(backgrounds: HashMap<String, String>, default_background: String) -> Self {
        Self {
            backgrounds,
            default_background,
        }
    }

    pub fn from_config(config: &ShardingConfig) -> Self {
        Self::new(
            config.representative_backgrounds.clone(),
            config.default_background.clone(),
        )
    }
}

#[async_trait]
impl CulturalClassifier for StaticClassifier {
    async fn representative(&self, region: &str) -> Result<CulturalContext> {
        require_field("region", region)?;
        let background = self
            .backgrounds
            .get(region)
            .unwrap_or(&self.default_background);

        Ok(CulturalContext::new(
            &format!("{}_{}", background, region),
            background,
            region,
        ))
    }
}

/// Balancer that accepts every candidate in the candidate's own region
///
/// Used when no geographic balancer is deployed.
#[derive(Debug, Default)]
pub struct AcceptingBalancer;

#[async_trait]
impl AffinityBalancer for AcceptingBalancer {
    async fn confirm(&self, _query: &QueryContext, candidate: &ShardKey) -> Result<AffinityDecision> {
        Ok(AffinityDecision {
            confirmed: true,
            selected_region: candidate.region.clone(),
            affinity_score: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_template_lookup_and_update() {
        let mut templates = HashMap::new();
        templates.insert("europe".to_string(), "Server=eu.db;".to_string());
        let source = StaticTemplateSource::new(templates, "Server={region}.db;".to_string());

        assert_eq!(
            source.template("europe").await.unwrap().as_deref(),
            Some("Server=eu.db;")
        );
        assert_eq!(source.template("oceania").await.unwrap(), None);

        source.set_template("oceania", "Server=au.db;");
        assert_eq!(
            source.template("oceania").await.unwrap().as_deref(),
            Some("Server=au.db;")
        );
    }

    #[tokio::test]
    async fn test_classifier_defaults() {
        let mut backgrounds = HashMap::new();
        backgrounds.insert("south_india".to_string(), "tamil_hindu".to_string());
        let classifier = StaticClassifier::new(backgrounds, "sinhala_buddhist".to_string());

        let ctx = classifier.representative("south_india").await.unwrap();
        assert_eq!(ctx.cultural_background, "tamil_hindu");
        assert_eq!(ctx.community_id, "tamil_hindu_south_india");

        let ctx = classifier.representative("europe").await.unwrap();
        assert_eq!(ctx.cultural_background, "sinhala_buddhist");

        assert!(classifier.representative("").await.is_err());
    }
}
