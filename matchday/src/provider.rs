//! Narrow fetch contract over the per-sport data providers.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{RawProviderEvent, SportDomain};

/// Date-scoped event lookup for one provider family.
#[async_trait]
pub trait EventProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// All events the provider lists for `date`, optionally narrowed to a league.
    async fn fetch(&self, date: NaiveDate, league: Option<&str>) -> Result<Vec<RawProviderEvent>>;
}

/// One provider per sport domain.
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<SportDomain, Arc<dyn EventProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: SportDomain, provider: Arc<dyn EventProvider>) {
        self.providers.insert(domain, provider);
    }

    pub fn with(mut self, domain: SportDomain, provider: Arc<dyn EventProvider>) -> Self {
        self.insert(domain, provider);
        self
    }

    pub fn get(&self, domain: SportDomain) -> Option<&Arc<dyn EventProvider>> {
        self.providers.get(&domain)
    }

    pub fn domains(&self) -> Vec<SportDomain> {
        let mut domains: Vec<SportDomain> = self.providers.keys().copied().collect();
        domains.sort_by_key(|d| d.as_str());
        domains
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<(SportDomain, &str)> = self
            .domains()
            .into_iter()
            .filter_map(|d| self.providers.get(&d).map(|p| (d, p.name())))
            .collect();
        f.debug_struct("ProviderSet").field("providers", &names).finish()
    }
}
