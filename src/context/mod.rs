//! Context assembly for prompt enrichment.
//!
//! Produces a block of background text about the vehicle to prepend to the
//! model prompt. An external semantic-search provider is consulted first
//! when configured (with cached results); any failure falls back to
//! deterministic keyword extraction over the local knowledge base. The
//! fallback never errors and degrades to empty context at worst.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{ResultCache, cache_key};
use crate::knowledge::KnowledgeBase;

/// Query keywords that pull the maintenance schedule into context.
pub const MAINTENANCE_KEYWORDS: &[&str] = &[
    "maintenance",
    "service",
    "schedule",
    "interval",
    "oil change",
    "tune-up",
    "tune up",
    "inspection",
    "rotate",
    "rotation",
    "flush",
];

/// Query keywords that pull diagnostic tips into context.
pub const PROBLEM_KEYWORDS: &[&str] = &[
    "problem",
    "issue",
    "noise",
    "leak",
    "warning light",
    "check engine",
    "stall",
    "vibrat",
    "smell",
    "smoke",
    "won't start",
    "wont start",
    "grinding",
    "squeal",
    "overheat",
    "misfire",
];

/// Client for an external semantic-search provider.
#[derive(Debug, Clone)]
pub struct SemanticSearchClient {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct SemanticSearchRequest<'a> {
    query: &'a str,
    max_chars: usize,
}

#[derive(Deserialize)]
struct SemanticSearchResponse {
    #[serde(default)]
    context: String,
}

impl SemanticSearchClient {
    pub fn new(url: String, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, url })
    }

    async fn search(&self, query: &str, max_chars: usize) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&SemanticSearchRequest { query, max_chars })
            .send()
            .await?
            .error_for_status()?;
        let body: SemanticSearchResponse = response.json().await?;
        Ok(body.context)
    }
}

/// Assembles prompt context from the semantic provider or the knowledge base.
pub struct ContextAssembler {
    knowledge: Option<KnowledgeBase>,
    cache: Arc<ResultCache>,
    semantic: Option<SemanticSearchClient>,
    common_issues_limit: usize,
}

impl ContextAssembler {
    pub fn new(
        knowledge: Option<KnowledgeBase>,
        cache: Arc<ResultCache>,
        semantic: Option<SemanticSearchClient>,
        common_issues_limit: usize,
    ) -> Self {
        Self {
            knowledge,
            cache,
            semantic,
            common_issues_limit,
        }
    }

    /// Assemble context for a query. Total: never errors.
    ///
    /// The semantic path honors `max_chars`; the local fallback does not
    /// truncate. That asymmetry is inherited behavior, kept on purpose and
    /// pinned by a test below.
    pub async fn assemble(&self, query: &str, max_chars: usize) -> String {
        if let Some(semantic) = &self.semantic {
            let key = cache_key("semantic", &[query, &max_chars.to_string()]);
            if let Some(hit) = self.cache.get(&key) {
                if let Some(text) = hit.as_str().filter(|t| !t.is_empty()) {
                    debug!("semantic context served from cache");
                    return text.to_string();
                }
            }

            match semantic.search(query, max_chars).await {
                Ok(text) if !text.trim().is_empty() => {
                    let text = truncate_chars(text.trim(), max_chars);
                    self.cache.put(&key, serde_json::json!(text));
                    return text;
                }
                Ok(_) => debug!("semantic search returned empty context, using local fallback"),
                Err(err) => {
                    warn!(error = %err, "semantic search failed, using local fallback");
                }
            }
        }

        self.local_context(query)
    }

    /// Deterministic keyword extraction over the knowledge base.
    fn local_context(&self, query: &str) -> String {
        let Some(kb) = &self.knowledge else {
            return String::new();
        };
        let lowered = query.to_lowercase();
        let mut sections = vec![kb.identity_header()];

        if MAINTENANCE_KEYWORDS.iter().any(|k| lowered.contains(k))
            && !kb.maintenance_schedule.is_empty()
        {
            let mut section = String::from("Maintenance schedule:");
            for item in &kb.maintenance_schedule {
                section.push_str(&format!("\n- {}: {}", item.interval, item.services.join(", ")));
            }
            sections.push(section);
        }

        if PROBLEM_KEYWORDS.iter().any(|k| lowered.contains(k)) && !kb.diagnostic_tips.is_empty() {
            let mut section = String::from("Diagnostic tips:");
            for (symptom, tip) in &kb.diagnostic_tips {
                section.push_str(&format!("\n- {symptom}: {tip}"));
            }
            sections.push(section);
        }

        if !kb.common_issues.is_empty() {
            let mut section = String::from("Common issues reported for this vehicle:");
            for issue in kb.common_issues.iter().take(self.common_issues_limit) {
                section.push_str(&format!("\n- {issue}"));
            }
            sections.push(section);
        }

        sections.join("\n\n")
    }
}

/// Truncate on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{MaintenanceItem, VehicleIdentity};
    use tempfile::tempdir;

    fn sample_kb() -> KnowledgeBase {
        KnowledgeBase {
            vehicle: VehicleIdentity {
                make: "Volvo".into(),
                model: "XC60".into(),
                year: Some(2021),
                engine: Some("2.0L turbo".into()),
                transmission: Some("automatic".into()),
            },
            maintenance_schedule: vec![MaintenanceItem {
                interval: "10,000 miles".into(),
                services: vec!["oil change".into(), "tire rotation".into()],
            }],
            diagnostic_tips: [(
                "check engine light".to_string(),
                "Read the OBD-II code first.".to_string(),
            )]
            .into_iter()
            .collect(),
            common_issues: (1..=8).map(|i| format!("Issue number {i}")).collect(),
        }
    }

    fn assembler(kb: Option<KnowledgeBase>, limit: usize) -> (ContextAssembler, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let cache = Arc::new(ResultCache::new(dir.path().join("cache.json"), 3600, 10));
        (ContextAssembler::new(kb, cache, None, limit), dir)
    }

    #[tokio::test]
    async fn missing_knowledge_base_yields_empty_context() {
        let (assembler, _dir) = assembler(None, 5);
        assert_eq!(assembler.assemble("my engine stalls", 2000).await, "");
    }

    #[tokio::test]
    async fn identity_and_common_issues_are_always_present() {
        let (assembler, _dir) = assembler(Some(sample_kb()), 3);
        let context = assembler.assemble("hello", 2000).await;

        assert!(context.starts_with("Vehicle: 2021 Volvo XC60"));
        assert!(context.contains("Common issues reported for this vehicle:"));
        assert!(context.contains("Issue number 3"));
        assert!(!context.contains("Issue number 4"), "limit must bound the list");
        assert!(!context.contains("Maintenance schedule:"));
        assert!(!context.contains("Diagnostic tips:"));
    }

    #[tokio::test]
    async fn maintenance_keywords_pull_the_schedule() {
        let (assembler, _dir) = assembler(Some(sample_kb()), 5);
        let context = assembler.assemble("when is my next oil change", 2000).await;

        assert!(context.contains("Maintenance schedule:"));
        assert!(context.contains("10,000 miles: oil change, tire rotation"));
    }

    #[tokio::test]
    async fn problem_keywords_pull_diagnostic_tips() {
        let (assembler, _dir) = assembler(Some(sample_kb()), 5);
        let context = assembler.assemble("the check engine light is on", 2000).await;

        assert!(context.contains("Diagnostic tips:"));
        assert!(context.contains("Read the OBD-II code first."));
    }

    #[tokio::test]
    async fn local_fallback_does_not_truncate_to_max_chars() {
        // Inherited asymmetry: only the semantic path honors max_chars.
        let (assembler, _dir) = assembler(Some(sample_kb()), 8);
        let context = assembler.assemble("hello", 10).await;
        assert!(context.chars().count() > 10);
    }

    #[tokio::test]
    async fn semantic_result_is_truncated_and_cached() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use axum::routing::post;
        use axum::{Json, Router};

        let hits = Arc::new(AtomicUsize::new(0));
        let handler_hits = hits.clone();
        let app = Router::new().route(
            "/search",
            post(move |Json(_req): Json<serde_json::Value>| {
                let hits = handler_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({ "context": "x".repeat(50) }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = tempdir().unwrap();
        let cache = Arc::new(ResultCache::new(dir.path().join("cache.json"), 3600, 10));
        let semantic = SemanticSearchClient::new(format!("http://{addr}/search"), 5).unwrap();
        let assembler = ContextAssembler::new(Some(sample_kb()), cache, Some(semantic), 5);

        let first = assembler.assemble("brake noise", 10).await;
        assert_eq!(first, "x".repeat(10), "provider result must be cut to max_chars");

        let second = assembler.assemble("brake noise", 10).await;
        assert_eq!(second, first);
        assert_eq!(
            hits.load(Ordering::SeqCst),
            1,
            "second lookup must be served from the cache"
        );
    }

    #[tokio::test]
    async fn unreachable_semantic_provider_falls_back_locally() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(ResultCache::new(dir.path().join("cache.json"), 3600, 10));
        let semantic =
            SemanticSearchClient::new("http://127.0.0.1:1/search".into(), 1).unwrap();
        let assembler = ContextAssembler::new(Some(sample_kb()), cache, Some(semantic), 5);

        let context = assembler.assemble("hello", 2000).await;
        assert!(context.starts_with("Vehicle: 2021 Volvo XC60"));
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("🔧🔧🔧🔧", 2), "🔧🔧");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
