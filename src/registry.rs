//! Model-to-provider registry.
//!
//! Built once from configuration at startup, then shared read-only behind an
//! `Arc`. On configuration reload the registry is rebuilt wholesale; there is
//! no partial mutation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{convention_env_var_name, ApiKey, Config, ProviderConfig};

/// An upstream provider, as resolved from configuration.
///
/// The credential is normalized at construction time: a key equal to the
/// documented placeholder sentinel is treated as absent, so downstream code
/// only ever checks `Option<ApiKey>`.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Unique provider id (e.g., "openai", "atlas-cloud")
    pub name: String,
    /// Base URL for the provider's API, without trailing slash
    pub base_url: String,
    /// Credential, `None` when unset or placeholder
    pub api_key: Option<ApiKey>,
    /// Whether this provider contributes models to the catalog
    pub enabled: bool,
    /// Models served by this provider, in configuration order
    pub models: Vec<String>,
    /// Env var clients are told to set when the credential is missing
    pub key_env_var: String,
}

impl ProviderDescriptor {
    /// True iff a usable credential is present.
    ///
    /// The placeholder sentinel was already normalized to `None` during
    /// registry construction, so presence is the whole check.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Provider id with `-` mapped to `_`, used in error codes
    /// (e.g., "atlas-cloud" -> "atlas_cloud_error").
    pub fn error_code(&self) -> String {
        format!("{}_error", self.name.replace('-', "_"))
    }
}

/// Read-only mapping from model id to its owning provider.
///
/// Safe for unsynchronized concurrent reads; callers share it via
/// `Arc<ModelRegistry>` and never mutate after construction.
#[derive(Debug)]
pub struct ModelRegistry {
    by_model: HashMap<String, Arc<ProviderDescriptor>>,
    /// Ordered union of all enabled models, for error enumeration and the
    /// catalog endpoint. A model id appears once even if two providers both
    /// claim it.
    model_order: Vec<String>,
    providers: Vec<Arc<ProviderDescriptor>>,
}

impl ModelRegistry {
    /// Build the registry from configuration.
    ///
    /// Construction is total: an empty or partially-configured config yields
    /// a registry with zero enabled providers rather than an error. Disabled
    /// providers contribute no models.
    ///
    /// On model-id collision across providers, the last-registered provider
    /// wins. This mirrors the behavior clients already depend on; see
    /// DESIGN.md for why it is flagged rather than fixed.
    pub fn from_config(config: &Config) -> Self {
        let mut by_model: HashMap<String, Arc<ProviderDescriptor>> = HashMap::new();
        let mut model_order: Vec<String> = Vec::new();
        let mut providers = Vec::with_capacity(config.providers.len());

        for pc in &config.providers {
            let descriptor = Arc::new(Self::descriptor_from_config(pc));
            providers.push(descriptor.clone());

            if !descriptor.enabled {
                tracing::debug!(provider = %descriptor.name, "Provider disabled, skipping models");
                continue;
            }

            for model in &descriptor.models {
                if by_model.insert(model.clone(), descriptor.clone()).is_some() {
                    tracing::warn!(
                        model = %model,
                        provider = %descriptor.name,
                        "Model registered by multiple providers; last one wins"
                    );
                } else {
                    model_order.push(model.clone());
                }
            }
        }

        tracing::info!(
            providers = providers.len(),
            models = model_order.len(),
            "Built model registry"
        );

        Self {
            by_model,
            model_order,
            providers,
        }
    }

    fn descriptor_from_config(pc: &ProviderConfig) -> ProviderDescriptor {
        // Placeholder keys become None here; is_configured() then only has
        // one representation of "unset" to deal with.
        let api_key = match &pc.api_key {
            Some(key) if key.is_placeholder() => {
                tracing::warn!(
                    provider = %pc.name,
                    "API key is the placeholder sentinel, treating as unset"
                );
                None
            }
            other => other.clone(),
        };

        ProviderDescriptor {
            name: pc.name.clone(),
            base_url: pc.url.trim_end_matches('/').to_string(),
            api_key,
            enabled: pc.enabled,
            models: pc.models.clone(),
            key_env_var: convention_env_var_name(&pc.name),
        }
    }

    /// Resolve a model id to its provider. Pure lookup, no I/O.
    pub fn resolve(&self, model: &str) -> Option<&Arc<ProviderDescriptor>> {
        self.by_model.get(model)
    }

    /// Ordered union of all models across enabled providers.
    pub fn available_models(&self) -> &[String] {
        &self.model_order
    }

    /// All configured providers, enabled or not.
    pub fn providers(&self) -> &[Arc<ProviderDescriptor>] {
        &self.providers
    }
}
