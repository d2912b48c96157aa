//! Concurrent resolution of many titles.
//!
//! The [`BatchResolver`] runs each entity's resolution on its own Tokio task,
//! with at most `concurrency` in flight and a deadline around each one. When a
//! strict-mode provider outage surfaces ([`ResolveError::Unavailable`]) the run
//! is paused: nothing new is scheduled, and the affected and unscheduled
//! requests are handed back as pending instead of being recorded as misses.
//!
//! # Example
//!
//! ```rust,ignore
//! let batch = BatchResolver::new(registry, gateway, 4, Duration::from_secs(60));
//! let report = batch.run(items).await;
//! if let Some(pause) = &report.paused {
//!     eprintln!("paused: {}", pause.reason);
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use crossid_common::{KnownIds, LookupRequest, MediaKind};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::metadata::{ProviderRegistry, ProviderResolution};
use crate::resolver::{ExternalLookupGateway, ResolveError};

/// Default number of resolutions in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default deadline for one entity's resolution across all providers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// One entity to resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    /// What to look up.
    pub request: LookupRequest,
    /// Ids already known for the entity. Receives discovered ids.
    pub known_ids: KnownIds,
}

impl BatchItem {
    /// An item with no known ids.
    pub fn new(request: LookupRequest) -> Self {
        Self {
            request,
            known_ids: KnownIds::new(),
        }
    }
}

/// How one item ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Every available provider was tried.
    Resolved { providers: Vec<ProviderResolution> },
    /// The deadline passed before resolution finished.
    TimedOut,
    /// The request was rejected.
    Invalid { reason: String },
    /// The resolution task died before reporting back.
    Failed { reason: String },
}

/// Result for one completed item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    /// Position in the input.
    pub index: usize,
    /// The item, with its known ids updated by resolution.
    pub item: BatchItem,
    pub outcome: ItemOutcome,
}

impl ItemReport {
    /// Returns `true` if at least one provider produced an id.
    pub fn is_found(&self) -> bool {
        matches!(&self.outcome, ItemOutcome::Resolved { providers } if providers.iter().any(|p| p.result.is_found()))
    }
}

/// Why a run stopped scheduling work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PauseReason {
    /// Provider that became unavailable.
    pub provider: String,
    /// Failure reported by that provider.
    pub reason: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Completed items in input order.
    pub completed: Vec<ItemReport>,
    /// Items to retry later, in input order. Empty unless paused.
    pub pending: Vec<BatchItem>,
    /// Set when a provider outage paused the run.
    pub paused: Option<PauseReason>,
}

impl BatchReport {
    /// Number of completed items with at least one id.
    pub fn found(&self) -> usize {
        self.completed.iter().filter(|r| r.is_found()).count()
    }

    /// Returns `true` if the run stopped early.
    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }
}

/// Parse a batch file: one `title` or `title|year` per line. Blank lines and
/// lines starting with `#` are skipped.
pub fn parse_batch_file(content: &str, kind: MediaKind) -> anyhow::Result<Vec<BatchItem>> {
    let mut items = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (title, year) = match line.rsplit_once('|') {
            Some((title, year)) => {
                let year = year
                    .trim()
                    .parse::<u16>()
                    .with_context(|| format!("line {}: invalid year '{}'", number + 1, year.trim()))?;
                (title.trim(), Some(year))
            }
            None => (line, None),
        };
        if title.is_empty() {
            bail!("line {}: missing title", number + 1);
        }

        let mut request = LookupRequest::new(title, kind);
        if let Some(year) = year {
            request = request.with_year(year);
        }
        items.push(BatchItem::new(request));
    }

    Ok(items)
}

enum TaskResult {
    Done(ItemReport),
    Unavailable(usize, BatchItem, PauseReason),
}

/// Resolves many entities concurrently against a [`ProviderRegistry`].
pub struct BatchResolver {
    registry: Arc<ProviderRegistry>,
    gateway: Arc<ExternalLookupGateway>,
    concurrency: usize,
    timeout: Duration,
}

impl BatchResolver {
    /// Create a runner. `concurrency` is clamped to at least 1.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        gateway: Arc<ExternalLookupGateway>,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            gateway,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Resolve every item, pausing on the first provider outage.
    pub async fn run(&self, items: Vec<BatchItem>) -> BatchReport {
        let total = items.len();
        info!(total, concurrency = self.concurrency, "Starting batch resolution");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let paused = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        let mut unscheduled = Vec::new();
        let mut in_flight = BTreeMap::new();

        let mut queue = items.into_iter().enumerate();
        for (index, item) in queue.by_ref() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                unscheduled.push((index, item));
                break;
            };
            if paused.load(Ordering::SeqCst) {
                unscheduled.push((index, item));
                break;
            }

            let registry = Arc::clone(&self.registry);
            let gateway = Arc::clone(&self.gateway);
            let paused = Arc::clone(&paused);
            let deadline = self.timeout;
            in_flight.insert(index, item.clone());

            tasks.spawn(async move {
                let _permit = permit;
                let result = resolve_item(&registry, &gateway, index, item, deadline).await;
                if matches!(result, TaskResult::Unavailable(..)) {
                    paused.store(true, Ordering::SeqCst);
                }
                result
            });
        }
        unscheduled.extend(queue);

        let mut report = BatchReport::default();
        let mut pending = unscheduled;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskResult::Done(item)) => {
                    in_flight.remove(&item.index);
                    report.completed.push(item);
                }
                Ok(TaskResult::Unavailable(index, item, reason)) => {
                    in_flight.remove(&index);
                    report.paused.get_or_insert(reason);
                    pending.push((index, item));
                }
                Err(e) => warn!(error = %e, "Batch task failed"),
            }
        }

        // Whatever is left never reported back.
        for (index, item) in in_flight {
            report.completed.push(ItemReport {
                index,
                item,
                outcome: ItemOutcome::Failed {
                    reason: "resolution task failed".to_string(),
                },
            });
        }

        report.completed.sort_by_key(|r| r.index);
        pending.sort_by_key(|(index, _)| *index);
        if report.paused.is_some() {
            report.pending = pending.into_iter().map(|(_, item)| item).collect();
        }

        match &report.paused {
            Some(pause) => warn!(
                provider = %pause.provider,
                completed = report.completed.len(),
                pending = report.pending.len(),
                "Batch paused; provider unavailable"
            ),
            None => info!(
                total,
                found = report.found(),
                "Batch resolution complete"
            ),
        }
        report
    }
}

async fn resolve_item(
    registry: &ProviderRegistry,
    gateway: &ExternalLookupGateway,
    index: usize,
    mut item: BatchItem,
    deadline: Duration,
) -> TaskResult {
    let mut known_ids = item.known_ids.clone();
    let attempt = tokio::time::timeout(
        deadline,
        registry.resolve_all(gateway, &item.request, &mut known_ids),
    )
    .await;

    let outcome = match attempt {
        Ok(Ok(providers)) => ItemOutcome::Resolved { providers },
        Ok(Err(ResolveError::Unavailable { provider, operation, source })) => {
            let reason = PauseReason {
                provider,
                reason: format!("{operation}: {source}"),
            };
            // Partial discoveries are kept so the retry can start from them.
            item.known_ids = known_ids;
            return TaskResult::Unavailable(index, item, reason);
        }
        Ok(Err(err @ ResolveError::InvalidRequest(_))) => ItemOutcome::Invalid {
            reason: err.to_string(),
        },
        Err(_) => {
            warn!(title = %item.request.title, timeout_secs = deadline.as_secs(), "Resolution timed out");
            ItemOutcome::TimedOut
        }
    };

    item.known_ids = known_ids;
    TaskResult::Done(ItemReport {
        index,
        item,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::provider::{
        MediaImages, MediaMetadata, MetadataProvider, ProviderSearchClient, Trailer,
    };
    use crate::resolver::{FailurePolicy, TitleResolver};
    use async_trait::async_trait;
    use crossid_common::{Candidate, MediaKind, ProviderError, ResultPage, SearchQuery};
    use std::sync::atomic::AtomicUsize;

    /// Provider answering every title with itself, failing on "outage" and
    /// hanging on "slow".
    struct EchoProvider {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl EchoProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ProviderSearchClient for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn search(&self, query: &SearchQuery, page: u32) -> Result<ResultPage, ProviderError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match query.title.as_str() {
                "outage" => Err(ProviderError::transient("503 Service Unavailable")),
                "panic" => panic!("echo provider bug"),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(ResultPage::empty())
                }
                title if page == 1 => Ok(ResultPage::new(vec![Candidate::new(
                    title.len().to_string(),
                    title,
                    Some(2000),
                )])),
                _ => Ok(ResultPage::empty()),
            }
        }
    }

    #[async_trait]
    impl MetadataProvider for EchoProvider {
        fn language(&self) -> &str {
            "en-US"
        }

        async fn get_metadata(&self, id: &str, _kind: MediaKind) -> Result<MediaMetadata, ProviderError> {
            Err(ProviderError::not_found(id))
        }

        async fn get_images(&self, _id: &str, _kind: MediaKind) -> Result<MediaImages, ProviderError> {
            Ok(MediaImages::default())
        }

        async fn get_trailers(&self, _id: &str, _kind: MediaKind) -> Result<Vec<Trailer>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn runner(provider: Arc<EchoProvider>, policy: FailurePolicy, concurrency: usize) -> BatchResolver {
        let mut registry = ProviderRegistry::new();
        registry.register(provider);
        BatchResolver::new(
            Arc::new(registry),
            Arc::new(ExternalLookupGateway::new(TitleResolver::new(policy))),
            concurrency,
            Duration::from_millis(500),
        )
    }

    fn items(titles: &[&str]) -> Vec<BatchItem> {
        titles
            .iter()
            .map(|t| BatchItem::new(LookupRequest::new(*t, MediaKind::Movie)))
            .collect()
    }

    #[test]
    fn parses_titles_and_years() {
        let content = "# watchlist\nAvatar|2009\n\n  Heat  \nTwo and a half men | 2003\n";
        let items = parse_batch_file(content, MediaKind::Tv).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].request, LookupRequest::new("Avatar", MediaKind::Tv).with_year(2009));
        assert_eq!(items[1].request.title, "Heat");
        assert_eq!(items[1].request.year, None);
        assert_eq!(items[2].request.title, "Two and a half men");
        assert_eq!(items[2].request.year, Some(2003));
    }

    #[test]
    fn rejects_bad_lines() {
        let err = parse_batch_file("Avatar|20o9", MediaKind::Movie).unwrap_err();
        assert!(err.to_string().contains("line 1"));

        let err = parse_batch_file("Heat\n|1995", MediaKind::Movie).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn resolves_all_items_in_input_order() {
        let provider = EchoProvider::new();
        let report = runner(provider, FailurePolicy::lenient(), 3)
            .run(items(&["Alien", "Heat", "Up", "Jaws", "Se7en"]))
            .await;

        assert!(!report.is_paused());
        assert_eq!(report.completed.len(), 5);
        assert_eq!(report.found(), 5);
        let indexes: Vec<usize> = report.completed.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3, 4]);
        assert_eq!(report.completed[1].item.known_ids.get("echo"), Some("4"));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let provider = EchoProvider::new();
        let titles: Vec<String> = (0..12).map(|i| format!("Title {i}")).collect();
        let titles: Vec<&str> = titles.iter().map(String::as_str).collect();

        runner(provider.clone(), FailurePolicy::lenient(), 2)
            .run(items(&titles))
            .await;

        assert!(provider.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn lenient_outage_is_a_miss() {
        let report = runner(EchoProvider::new(), FailurePolicy::lenient(), 1)
            .run(items(&["outage", "Heat"]))
            .await;

        assert!(!report.is_paused());
        assert_eq!(report.completed.len(), 2);
        assert!(!report.completed[0].is_found());
        assert!(report.completed[1].is_found());
    }

    #[tokio::test]
    async fn strict_outage_pauses_the_run() {
        let report = runner(EchoProvider::new(), FailurePolicy::strict(), 1)
            .run(items(&["Alien", "outage", "Heat", "Jaws"]))
            .await;

        let pause = report.paused.as_ref().unwrap();
        assert_eq!(pause.provider, "echo");
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.completed[0].item.request.title, "Alien");

        let pending: Vec<&str> = report.pending.iter().map(|i| i.request.title.as_str()).collect();
        assert_eq!(pending, vec!["outage", "Heat", "Jaws"]);
    }

    #[tokio::test]
    async fn slow_items_time_out() {
        let report = runner(EchoProvider::new(), FailurePolicy::lenient(), 2)
            .run(items(&["slow", "Heat"]))
            .await;

        assert_eq!(report.completed[0].outcome, ItemOutcome::TimedOut);
        assert!(report.completed[1].is_found());
    }

    #[tokio::test]
    async fn invalid_requests_are_reported() {
        let report = runner(EchoProvider::new(), FailurePolicy::strict(), 1)
            .run(items(&["  "]))
            .await;

        assert!(matches!(report.completed[0].outcome, ItemOutcome::Invalid { .. }));
        assert!(!report.is_paused());
    }

    #[tokio::test]
    async fn crashed_task_is_reported_not_dropped() {
        let report = runner(EchoProvider::new(), FailurePolicy::lenient(), 2)
            .run(items(&["Alien", "panic", "Heat"]))
            .await;

        assert_eq!(report.completed.len(), 3);
        let indexes: Vec<usize> = report.completed.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_matches::assert_matches!(&report.completed[1].outcome, ItemOutcome::Failed { .. });
        assert_eq!(report.completed[1].item.request.title, "panic");
        assert!(report.completed[0].is_found());
        assert!(report.completed[2].is_found());
    }
}
