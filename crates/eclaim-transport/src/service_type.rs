//! Resolution of the `jnsPelayanan` field.

use eclaim_core::{ResolvedServiceType, ServiceType};
use eclaim_storage::DynEpisodeRegistry;
use serde_json::Value;
use tracing::{debug, warn};

/// Resolves the caller's service type, consulting the episode registry
/// when the value is not a recognized code.
#[derive(Clone, Default)]
pub struct ServiceTypeResolver {
    registry: Option<DynEpisodeRegistry>,
}

impl ServiceTypeResolver {
    pub fn new(registry: Option<DynEpisodeRegistry>) -> Self {
        Self { registry }
    }

    pub async fn resolve(&self, episode: &str, raw: &Value) -> ResolvedServiceType {
        if let Some(known) = ServiceType::from_value(raw) {
            return ResolvedServiceType::Known(known);
        }

        let Some(registry) = &self.registry else {
            return ResolvedServiceType::Unresolved(raw.clone());
        };

        match registry.service_classification(episode).await {
            Ok(Some(classification)) => {
                let resolved = ServiceType::from_classification(&classification);
                debug!(episode, %classification, service_type = %resolved, "Service type from registry");
                ResolvedServiceType::Known(resolved)
            }
            Ok(None) => ResolvedServiceType::Unresolved(raw.clone()),
            Err(e) => {
                warn!(episode, error = %e, "Episode registry lookup failed; passing service type through");
                ResolvedServiceType::Unresolved(raw.clone())
            }
        }
    }
}
