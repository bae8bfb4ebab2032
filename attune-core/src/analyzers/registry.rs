//! Analyzer registry and best-effort fan-out

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{Analyzer, AnalyzerResult};
use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, panic_message};
use crate::events::SessionData;

struct Entry {
    analyzer: Arc<dyn Analyzer>,
    /// Set when `initialize` failed; the analyzer is then reported, not run.
    disabled: Option<String>,
}

/// Named set of analyzers. Registered during setup, read on every event.
pub struct AnalyzerRegistry {
    entries: RwLock<BTreeMap<String, Entry>>,
    timeout: Duration,
}

impl AnalyzerRegistry {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            timeout: Duration::from_millis(config.timeout_ms.max(1)),
        }
    }

    /// Register an analyzer. Returns `true` if it replaced one with the same name.
    pub async fn register(&self, name: impl Into<String>, analyzer: Arc<dyn Analyzer>) -> bool {
        let name = name.into();
        debug!(analyzer = %name, "Registering analyzer");
        self.entries
            .write()
            .await
            .insert(
                name,
                Entry {
                    analyzer,
                    disabled: None,
                },
            )
            .is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Analyzers that initialized successfully.
    pub async fn active_count(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.disabled.is_none())
            .count()
    }

    /// Run every analyzer's `initialize`. Failing analyzers are disabled and
    /// their errors returned; the rest stay active.
    pub async fn initialize_all(&self) -> BTreeMap<String, AnalyzerError> {
        let mut failures = BTreeMap::new();
        let mut entries = self.entries.write().await;

        for (name, entry) in entries.iter_mut() {
            let setup = AssertUnwindSafe(entry.analyzer.initialize()).catch_unwind();
            let outcome = match tokio::time::timeout(self.timeout, setup).await {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(AnalyzerError::Panicked(panic_message(panic.as_ref()))),
                Err(_) => Err(AnalyzerError::TimedOut(self.timeout_ms())),
            };
            match outcome {
                Ok(()) => entry.disabled = None,
                Err(e) => {
                    warn!(analyzer = %name, error = %e, "Analyzer failed to initialize, disabling");
                    entry.disabled = Some(e.to_string());
                    failures.insert(name.clone(), e);
                }
            }
        }

        failures
    }

    /// Run every analyzer concurrently and collect one result per analyzer.
    ///
    /// Never fails: errors, panics and timeouts become `Err` entries.
    pub async fn run_all(
        &self,
        user_id: &str,
        session: &SessionData,
        profile: Option<&Value>,
    ) -> BTreeMap<String, AnalyzerResult> {
        let mut results = BTreeMap::new();
        let mut runnable = Vec::new();

        for (name, entry) in self.entries.read().await.iter() {
            match &entry.disabled {
                Some(reason) => {
                    results.insert(
                        name.clone(),
                        AnalyzerResult::Err {
                            reason: format!("disabled: {reason}"),
                        },
                    );
                }
                None => {
                    // Overwritten when the task reports back.
                    results.insert(
                        name.clone(),
                        AnalyzerResult::Err {
                            reason: "analyzer task aborted".to_string(),
                        },
                    );
                    runnable.push((name.clone(), Arc::clone(&entry.analyzer)));
                }
            }
        }

        if runnable.is_empty() {
            return results;
        }

        let user_id: Arc<str> = Arc::from(user_id);
        let session = Arc::new(session.clone());
        let profile = Arc::new(profile.cloned());
        let timeout = self.timeout;
        let timeout_ms = self.timeout_ms();

        let mut tasks = JoinSet::new();
        for (name, analyzer) in runnable {
            let user_id = Arc::clone(&user_id);
            let session = Arc::clone(&session);
            let profile = Arc::clone(&profile);

            tasks.spawn(async move {
                let call = AssertUnwindSafe(analyzer.analyze(&user_id, &session, (*profile).as_ref()))
                    .catch_unwind();
                let result = match tokio::time::timeout(timeout, call).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(panic)) => Err(AnalyzerError::Panicked(panic_message(panic.as_ref()))),
                    Err(_) => Err(AnalyzerError::TimedOut(timeout_ms)),
                };
                (name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    if let Err(e) = &result {
                        warn!(analyzer = %name, user_id = %user_id, error = %e, "Analyzer failed");
                    }
                    results.insert(name, result.into());
                }
                Err(e) => warn!(error = %e, "Analyzer task did not complete"),
            }
        }

        results
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Consolidated view of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub analyzers_run: usize,
    pub succeeded: Vec<String>,
    /// Analyzer name to failure reason.
    pub failed: BTreeMap<String, String>,
    /// String entries of every successful payload's `insights` array.
    pub insights: Vec<String>,
    /// String entries of every successful payload's `recommendations` array.
    pub recommendations: Vec<String>,
}

fn strings_at<'a>(payload: &'a Value, key: &str) -> impl Iterator<Item = String> + 'a {
    payload
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
}

impl AnalysisReport {
    /// Fold a result map. An empty map yields an empty report.
    pub fn consolidate(results: &BTreeMap<String, AnalyzerResult>) -> Self {
        let mut report = Self {
            analyzers_run: results.len(),
            ..Default::default()
        };

        for (name, result) in results {
            match result {
                AnalyzerResult::Ok { payload } => {
                    report.succeeded.push(name.clone());
                    report.insights.extend(strings_at(payload, "insights"));
                    report.recommendations.extend(strings_at(payload, "recommendations"));
                }
                AnalyzerResult::Err { reason } => {
                    report.failed.insert(name.clone(), reason.clone());
                }
            }
        }

        report
    }

    /// Whether every analyzer succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed(Value);

    #[async_trait]
    impl Analyzer for Fixed {
        async fn analyze(
            &self,
            _user_id: &str,
            _session: &SessionData,
            _profile: Option<&Value>,
        ) -> Result<Value, AnalyzerError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Analyzer for Failing {
        async fn analyze(
            &self,
            _user_id: &str,
            _session: &SessionData,
            _profile: Option<&Value>,
        ) -> Result<Value, AnalyzerError> {
            Err(AnalyzerError::Failed("model unavailable".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Analyzer for Panicking {
        async fn analyze(
            &self,
            _user_id: &str,
            _session: &SessionData,
            _profile: Option<&Value>,
        ) -> Result<Value, AnalyzerError> {
            panic!("index out of bounds")
        }
    }

    struct Slow;

    #[async_trait]
    impl Analyzer for Slow {
        async fn analyze(
            &self,
            _user_id: &str,
            _session: &SessionData,
            _profile: Option<&Value>,
        ) -> Result<Value, AnalyzerError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Value::Null)
        }
    }

    struct BadSetup;

    #[async_trait]
    impl Analyzer for BadSetup {
        async fn initialize(&self) -> Result<(), AnalyzerError> {
            Err(AnalyzerError::Failed("missing model weights".into()))
        }

        async fn analyze(
            &self,
            _user_id: &str,
            _session: &SessionData,
            _profile: Option<&Value>,
        ) -> Result<Value, AnalyzerError> {
            Ok(Value::Null)
        }
    }

    fn registry() -> AnalyzerRegistry {
        AnalyzerRegistry::new(&AnalyzerConfig::default())
    }

    #[tokio::test]
    async fn empty_registry_returns_empty_map() {
        let results = registry().run_all("u1", &SessionData::default(), None).await;
        assert!(results.is_empty());
        let report = AnalysisReport::consolidate(&results);
        assert_eq!(report.analyzers_run, 0);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn failures_do_not_hide_other_results() {
        let registry = registry();
        registry
            .register("good", Arc::new(Fixed(json!({"insights": ["focused"]}))))
            .await;
        registry.register("failing", Arc::new(Failing)).await;
        registry.register("panicking", Arc::new(Panicking)).await;

        let results = registry.run_all("u1", &SessionData::default(), None).await;

        assert_eq!(results.len(), 3);
        assert!(results["good"].is_ok());
        assert_eq!(
            results["failing"],
            AnalyzerResult::Err {
                reason: "model unavailable".into()
            }
        );
        match &results["panicking"] {
            AnalyzerResult::Err { reason } => assert!(reason.contains("index out of bounds")),
            other => panic!("expected Err, got {other:?}"),
        }

        let report = AnalysisReport::consolidate(&results);
        assert_eq!(report.succeeded, vec!["good".to_string()]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.insights, vec!["focused".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_analyzer_times_out() {
        let registry = AnalyzerRegistry::new(&AnalyzerConfig { timeout_ms: 50 });
        registry.register("slow", Arc::new(Slow)).await;
        registry.register("fast", Arc::new(Fixed(json!(1)))).await;

        let results = registry.run_all("u1", &SessionData::default(), None).await;
        assert!(results["fast"].is_ok());
        assert_eq!(
            results["slow"],
            AnalyzerResult::Err {
                reason: "timed out after 50 ms".into()
            }
        );
    }

    #[tokio::test]
    async fn failed_initialize_disables_analyzer() {
        let registry = registry();
        registry.register("bad", Arc::new(BadSetup)).await;
        registry.register("good", Arc::new(Fixed(json!({})))).await;

        let failures = registry.initialize_all().await;
        assert_eq!(failures.len(), 1);
        assert!(failures.contains_key("bad"));
        assert_eq!(registry.active_count().await, 1);
        assert_eq!(registry.len().await, 2);

        let results = registry.run_all("u1", &SessionData::default(), None).await;
        assert!(!results["bad"].is_ok());
        assert!(results["good"].is_ok());
    }

    #[tokio::test]
    async fn register_replaces_same_name() {
        let registry = registry();
        assert!(!registry.register("a", Arc::new(Fixed(json!(1)))).await);
        assert!(registry.register("a", Arc::new(Fixed(json!(2)))).await);
        let results = registry.run_all("u1", &SessionData::default(), None).await;
        assert_eq!(results["a"].payload(), Some(&json!(2)));
    }

    #[test]
    fn analyzer_result_serializes_with_status_tag() {
        let ok = serde_json::to_value(AnalyzerResult::Ok { payload: json!(1) }).unwrap();
        assert_eq!(ok, json!({"status": "ok", "payload": 1}));
        let err = serde_json::to_value(AnalyzerResult::Err {
            reason: "x".into(),
        })
        .unwrap();
        assert_eq!(err, json!({"status": "err", "reason": "x"}));
    }
}
