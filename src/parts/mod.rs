//! Optional parts-availability lookup.
//!
//! Consulted only when the classifier names a part and a provider URL is
//! configured. Results are cached; every failure is swallowed to `None` so
//! the chat pipeline proceeds without a listing.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::{ResultCache, cache_key};
use crate::prompt::{MAX_PARTS_IN_PROMPT, PartsRecord};

#[derive(Debug, Clone)]
pub struct PartsFinder {
    client: reqwest::Client,
    url: String,
    cache: Arc<ResultCache>,
}

#[derive(Deserialize)]
struct PartsResponse {
    #[serde(default)]
    parts: Vec<PartsRecord>,
}

impl PartsFinder {
    pub fn new(url: String, timeout_secs: u64, cache: Arc<ResultCache>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, url, cache })
    }

    /// Look up available parts for a canonical part name.
    pub async fn find(&self, entity: &str) -> Option<Vec<PartsRecord>> {
        let key = cache_key("parts", &[entity]);
        if let Some(hit) = self.cache.get(&key) {
            if let Ok(records) = serde_json::from_value::<Vec<PartsRecord>>(hit) {
                debug!(entity, "parts listing served from cache");
                return Some(records);
            }
        }

        match self.fetch(entity).await {
            Ok(mut records) => {
                records.truncate(MAX_PARTS_IN_PROMPT);
                if let Ok(payload) = serde_json::to_value(&records) {
                    self.cache.put(&key, payload);
                }
                Some(records)
            }
            Err(err) => {
                warn!(entity, error = %err, "parts lookup failed, continuing without listing");
                None
            }
        }
    }

    async fn fetch(&self, entity: &str) -> anyhow::Result<Vec<PartsRecord>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("part", entity)])
            .send()
            .await?
            .error_for_status()?;
        let body: PartsResponse = response.json().await?;
        Ok(body.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn unreachable_provider_yields_none() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(ResultCache::new(dir.path().join("cache.json"), 3600, 10));
        let finder = PartsFinder::new("http://127.0.0.1:1/parts".into(), 1, cache).unwrap();

        assert_eq!(finder.find("alternator").await, None);
    }

    #[tokio::test]
    async fn cached_listing_short_circuits_the_provider() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(ResultCache::new(dir.path().join("cache.json"), 3600, 10));
        let records = vec![PartsRecord {
            price: "$120".into(),
            condition: "used".into(),
            mileage: None,
            distance: Some("5 miles".into()),
            seller: "Apex Salvage".into(),
        }];
        cache.put(
            &cache_key("parts", &["alternator"]),
            json!(records.clone()),
        );

        // Provider is unreachable; the cache hit must still answer.
        let finder = PartsFinder::new("http://127.0.0.1:1/parts".into(), 1, cache).unwrap();
        assert_eq!(finder.find("alternator").await, Some(records));
    }
}
