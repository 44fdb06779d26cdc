//! ProviderRegistry - the static set of providers an engine serves

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::Provider;

/// Map of provider id to provider, fixed once the engine is built
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider, replacing any earlier one with the same id
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let id = provider.id().to_string();
        debug!(provider_id = %id, "ProviderRegistry::register: called");
        if self.providers.insert(id.clone(), provider).is_some() {
            debug!(provider_id = %id, "ProviderRegistry::register: replaced existing provider");
        }
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolve a search target list
    ///
    /// An empty selection means every search-capable provider. Unknown ids
    /// are skipped; duplicates collapse to one target.
    pub fn select(&self, provider_ids: &[String]) -> Vec<Arc<dyn Provider>> {
        debug!(?provider_ids, "ProviderRegistry::select: called");
        if provider_ids.is_empty() {
            return self
                .ids()
                .iter()
                .filter_map(|id| self.providers.get(id))
                .filter(|p| p.capabilities().search)
                .cloned()
                .collect();
        }

        let mut seen = Vec::with_capacity(provider_ids.len());
        let mut targets = Vec::with_capacity(provider_ids.len());
        for id in provider_ids {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            match self.providers.get(id) {
                Some(provider) if provider.capabilities().search => targets.push(provider.clone()),
                Some(_) => debug!(provider_id = %id, "ProviderRegistry::select: provider cannot search, skipping"),
                None => debug!(provider_id = %id, "ProviderRegistry::select: unknown provider, skipping"),
            }
        }
        targets
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry").field("providers", &self.ids()).finish()
    }
}
