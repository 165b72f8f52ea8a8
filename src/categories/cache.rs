use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::categories::{dedup_options, default_cuisines};
use crate::error::ImportError;
use crate::store::{CachedCategories, StateStore};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Category options read from a remote schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryOptions {
    pub options: Vec<String>,
    /// Name of the property the options came from, if one was found
    pub property_name: Option<String>,
}

/// Anything that can produce the live category enumeration
#[async_trait]
pub trait CategorySource: Send + Sync {
    async fn fetch_category_options(&self) -> Result<CategoryOptions, ImportError>;
}

/// TTL cache of the allowed category values, persisted in the [`StateStore`]
pub struct CuisineCache {
    store: Arc<StateStore>,
    ttl: Duration,
}

impl CuisineCache {
    pub fn new(store: Arc<StateStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Cached options if they are younger than the TTL; never fetches
    pub async fn get(&self) -> Option<Vec<String>> {
        self.get_at(Utc::now()).await
    }

    pub async fn get_at(&self, now: DateTime<Utc>) -> Option<Vec<String>> {
        let cached = match self.store.cached_categories().await {
            Some(cached) if !cached.options.is_empty() => cached,
            _ => {
                debug!("No cached category options found");
                return None;
            }
        };

        let fresh = (now - cached.fetched_at)
            .to_std()
            .map(|age| age < self.ttl)
            // fetched_at in the future: clock moved, keep the entry
            .unwrap_or(true);

        if fresh {
            debug!("Using cached category options: {:?}", cached.options);
            Some(cached.options)
        } else {
            debug!("Cached category options expired");
            None
        }
    }

    pub async fn put(&self, options: Vec<String>) {
        self.put_at(options, Utc::now()).await
    }

    pub async fn put_at(&self, options: Vec<String>, fetched_at: DateTime<Utc>) {
        let cached = CachedCategories {
            options: dedup_options(options),
            fetched_at,
        };
        if let Err(e) = self
            .store
            .update(|state| state.cuisine_cache = Some(cached))
            .await
        {
            warn!("Failed to persist category cache: {}", e);
        }
    }

    pub async fn invalidate(&self) {
        if let Err(e) = self.store.update(|state| state.cuisine_cache = None).await {
            warn!("Failed to clear category cache: {}", e);
        }
    }

    /// Always fetch from `source` and overwrite the cache
    ///
    /// Falls back to the default cuisines when the source has no options or
    /// fails. The property the options came from is remembered for imports.
    pub async fn refresh(&self, source: &dyn CategorySource) -> Vec<String> {
        let options = match source.fetch_category_options().await {
            Ok(fetched) => {
                if let Some(name) = &fetched.property_name {
                    info!("Remembering category property '{}'", name);
                    if let Err(e) = self.store.set_cuisine_property_name(name).await {
                        warn!("Failed to persist category property name: {}", e);
                    }
                }
                let options = dedup_options(fetched.options);
                if options.is_empty() {
                    info!("No category options in the database, using defaults");
                    default_cuisines()
                } else {
                    info!("Fetched {} category options", options.len());
                    options
                }
            }
            Err(e) => {
                warn!("Error fetching category options, using defaults: {}", e);
                default_cuisines()
            }
        };

        self.put(options.clone()).await;
        options
    }

    /// Fresh cached options, or a refresh from `source`
    pub async fn get_or_refresh(&self, source: &dyn CategorySource) -> Vec<String> {
        match self.get().await {
            Some(options) => options,
            None => self.refresh(source).await,
        }
    }
}
