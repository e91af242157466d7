//! Full index rebuild: category universe → buckets → resolution → scope →
//! staged batch writes → atomic promotion.
//!
//! The run moves through Collecting, Batching, and Promoting. Failures
//! during Collecting cost at most one bucket each; any failure during
//! Batching discards the staging generation and fails the run; Promoting
//! either fully succeeds or leaves the prior live generation intact. Every
//! run recomputes the whole universe, so re-running is always safe.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use wikiscope_extractor::ScopeExtractor;
use wikiscope_normalizer::bucket_categories;
use wikiscope_resolver::Resolver;
use wikiscope_shared::{
    CanonicalProject, ProjectKey, RebuildConfig, Result, RunId, ScopeRecord, WikiScopeError,
};
use wikiscope_storage::{IndexStore, StagedIndex, WikiStore};

// ---------------------------------------------------------------------------
// RebuildOutcome
// ---------------------------------------------------------------------------

/// Summary of a completed rebuild.
#[derive(Debug)]
pub struct RebuildOutcome {
    /// Identifier recorded in the run history.
    pub run_id: RunId,
    /// Size of the raw category universe.
    pub categories: usize,
    /// Categories skipped because they normalized to an empty key.
    pub skipped_categories: usize,
    /// Project buckets formed from the universe.
    pub buckets: usize,
    /// Keys with no matching project page (bucket dropped).
    pub unresolved: Vec<ProjectKey>,
    /// Canonical projects that contributed records.
    pub projects: usize,
    /// Records written to the promoted generation.
    pub records: usize,
    /// Bulk-insert statements issued during Batching.
    pub batches: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting rebuild status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a bucket's project page has been resolved.
    fn bucket_resolved(&self, key: &ProjectKey, current: usize, total: usize);
    /// Called when a batch has been staged.
    fn batch_written(&self, current: usize, total: usize);
    /// Called when the rebuild completes.
    fn done(&self, outcome: &RebuildOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn bucket_resolved(&self, _key: &ProjectKey, _current: usize, _total: usize) {}
    fn batch_written(&self, _current: usize, _total: usize) {}
    fn done(&self, _outcome: &RebuildOutcome) {}
}

// ---------------------------------------------------------------------------
// Rebuild
// ---------------------------------------------------------------------------

/// Run a full index rebuild.
///
/// 1. Collecting: load the category universe, bucket by normalized key,
///    resolve each bucket, extract each project's scope.
/// 2. Batching: stage the accumulated records in bounded chunks.
/// 3. Promoting: atomically swap the staged generation live.
#[instrument(skip_all)]
pub async fn rebuild(
    config: &RebuildConfig,
    wiki: &WikiStore,
    index: &IndexStore,
    progress: &dyn ProgressReporter,
) -> Result<RebuildOutcome> {
    if config.batch_size == 0 {
        return Err(WikiScopeError::validation("batch size must be at least 1"));
    }

    let start = Instant::now();
    let run_id = RunId::new();

    info!(%run_id, "starting index rebuild");
    index.insert_rebuild_run(&run_id).await?;

    // --- Collecting ---
    progress.phase("Collecting categories");
    let categories = wiki.assessment_categories().await?;
    info!(categories = categories.len(), "loaded category universe");

    let (buckets, skipped_categories) = bucket_categories(&categories);
    let bucket_count = buckets.len();

    progress.phase("Resolving projects");
    let resolver = Resolver::new(wiki);
    let mut unresolved: Vec<ProjectKey> = Vec::new();
    // Keys resolving to the same canonical page (via redirects or the plural
    // fallback) merge their category sets before scope extraction.
    let mut scopes: BTreeMap<CanonicalProject, Vec<String>> = BTreeMap::new();

    for (i, (key, bucket)) in buckets.into_iter().enumerate() {
        match resolver.resolve(&key).await {
            Ok(Some(project)) => {
                progress.bucket_resolved(&key, i + 1, bucket_count);
                scopes.entry(project).or_default().extend(bucket);
            }
            Ok(None) => {
                warn!(%key, "no project page found for key");
                unresolved.push(key);
            }
            Err(e) => {
                // A store failure here costs one bucket, not the rebuild.
                warn!(%key, error = %e, "project resolution failed, dropping bucket");
                unresolved.push(key);
            }
        }
    }

    progress.phase("Extracting project scopes");
    let extractor = ScopeExtractor::new(wiki);
    let mut records: Vec<ScopeRecord> = Vec::new();
    let project_count = scopes.len();

    for (project, project_categories) in &scopes {
        match extractor.extract_scope(project_categories).await {
            Ok(pages) => {
                records.extend(pages.into_iter().map(|page| ScopeRecord {
                    page,
                    project: project.clone(),
                }));
            }
            Err(e) => {
                warn!(%project, error = %e, "scope extraction failed, dropping project");
            }
        }
    }

    info!(
        records = records.len(),
        projects = project_count,
        "collection complete"
    );

    // --- Batching ---
    progress.phase("Staging index");
    let batches = records.len().div_ceil(config.batch_size);
    let staged = index.begin_staging().await?;

    if let Err(e) = write_batches(&staged, &records, config.batch_size, batches, progress).await {
        if let Err(discard_err) = staged.discard().await {
            warn!(error = %discard_err, "failed to drop staging table after write error");
        }
        return Err(e);
    }

    // --- Promoting ---
    progress.phase("Promoting index");
    staged.commit().await?;

    let outcome = RebuildOutcome {
        run_id,
        categories: categories.len(),
        skipped_categories,
        buckets: bucket_count,
        unresolved,
        projects: project_count,
        records: records.len(),
        batches,
        elapsed: start.elapsed(),
    };

    let stats = serde_json::json!({
        "categories": outcome.categories,
        "skipped_categories": outcome.skipped_categories,
        "buckets": outcome.buckets,
        "unresolved": outcome.unresolved.len(),
        "projects": outcome.projects,
        "records": outcome.records,
        "batches": outcome.batches,
    });
    if let Err(e) = index.finish_rebuild_run(&outcome.run_id, &stats.to_string()).await {
        // The new generation is already live; run history is best-effort.
        warn!(error = %e, "failed to record rebuild completion");
    }

    progress.done(&outcome);

    info!(
        run_id = %outcome.run_id,
        records = outcome.records,
        projects = outcome.projects,
        unresolved = outcome.unresolved.len(),
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "index rebuild complete"
    );

    Ok(outcome)
}

/// Stage all records in bounded chunks, in order.
async fn write_batches(
    staged: &StagedIndex,
    records: &[ScopeRecord],
    batch_size: usize,
    batches: usize,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    for (i, chunk) in records.chunks(batch_size).enumerate() {
        staged.insert_batch(chunk).await?;
        info!(batch = i + 1, total = batches, rows = chunk.len(), "staged batch");
        progress.batch_written(i + 1, batches);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    async fn test_stores() -> (WikiStore, IndexStore) {
        let wiki_path = std::env::temp_dir().join(format!("ws_core_wiki_{}.db", Uuid::now_v7()));
        let index_path = std::env::temp_dir().join(format!("ws_core_index_{}.db", Uuid::now_v7()));
        let wiki = WikiStore::open(&wiki_path, TEST_TIMEOUT).await.expect("open wiki db");
        let index = IndexStore::open(&index_path, TEST_TIMEOUT)
            .await
            .expect("open index db");
        (wiki, index)
    }

    /// Two assessment categories for one project, talk + draft-talk pages in
    /// scope, an article-namespace page out of scope, and one category whose
    /// key has no project page.
    async fn seed_universe(wiki: &WikiStore) {
        wiki.insert_page(10, 14, "Start-Class_Military_history_articles")
            .await
            .expect("seed category");
        wiki.insert_page(11, 14, "WikiProject_Military_history_articles")
            .await
            .expect("seed category");
        wiki.insert_page(12, 14, "Z-Class_Basket_weaving_articles")
            .await
            .expect("seed category");

        wiki.insert_page(20, 4, "WikiProject_Military_history")
            .await
            .expect("seed project page");

        wiki.insert_page(30, 1, "Battle_of_Hastings").await.expect("seed talk page");
        wiki.insert_page(31, 119, "Upcoming_battle")
            .await
            .expect("seed draft talk page");
        wiki.insert_page(32, 0, "Battle_of_Hastings").await.expect("seed article");

        wiki.insert_category_link(30, "Start-Class_Military_history_articles")
            .await
            .expect("seed link");
        wiki.insert_category_link(31, "WikiProject_Military_history_articles")
            .await
            .expect("seed link");
        wiki.insert_category_link(32, "Start-Class_Military_history_articles")
            .await
            .expect("seed link");
    }

    fn config() -> RebuildConfig {
        RebuildConfig {
            batch_size: 10_000,
            query_timeout: TEST_TIMEOUT,
        }
    }

    #[tokio::test]
    async fn end_to_end_rebuild() {
        let (wiki, index) = test_stores().await;
        seed_universe(&wiki).await;

        let outcome = rebuild(&config(), &wiki, &index, &SilentProgress)
            .await
            .expect("rebuild");

        assert_eq!(outcome.categories, 3);
        assert_eq!(outcome.skipped_categories, 0);
        // Both Military_history categories normalize into one bucket.
        assert_eq!(outcome.buckets, 2);
        assert_eq!(outcome.unresolved, vec![ProjectKey::new("Basket_weaving")]);
        assert_eq!(outcome.projects, 1);
        assert_eq!(outcome.records, 2);
        assert_eq!(outcome.batches, 1);

        assert_eq!(
            index
                .projects_for_page("Talk:Battle_of_Hastings")
                .await
                .expect("query"),
            vec!["Wikipedia:WikiProject_Military_history".to_string()]
        );
        assert_eq!(
            index
                .projects_for_page("Draft_talk:Upcoming_battle")
                .await
                .expect("query"),
            vec!["Wikipedia:WikiProject_Military_history".to_string()]
        );
        // The article-namespace page never enters the index.
        assert!(
            index
                .projects_for_page("Battle_of_Hastings")
                .await
                .expect("query")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn rebuild_is_idempotent() {
        let (wiki, index) = test_stores().await;
        seed_universe(&wiki).await;

        let first = rebuild(&config(), &wiki, &index, &SilentProgress)
            .await
            .expect("first rebuild");
        let second = rebuild(&config(), &wiki, &index, &SilentProgress)
            .await
            .expect("second rebuild");

        assert_eq!(first.records, second.records);
        assert_eq!(
            index.live_record_count().await.expect("count"),
            second.records as u64
        );
    }

    #[tokio::test]
    async fn small_batch_size_splits_writes() {
        let (wiki, index) = test_stores().await;
        seed_universe(&wiki).await;

        let outcome = rebuild(
            &RebuildConfig {
                batch_size: 1,
                query_timeout: TEST_TIMEOUT,
            },
            &wiki,
            &index,
            &SilentProgress,
        )
        .await
        .expect("rebuild");

        assert_eq!(outcome.records, 2);
        assert_eq!(outcome.batches, 2);
        assert_eq!(index.live_record_count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn unresolved_bucket_contributes_nothing() {
        let (wiki, index) = test_stores().await;

        // A category and in-scope pages, but no project page to resolve to.
        wiki.insert_page(10, 14, "Start-Class_Orphaned_topic_articles")
            .await
            .expect("seed category");
        wiki.insert_page(30, 1, "Orphaned_page").await.expect("seed talk page");
        wiki.insert_category_link(30, "Start-Class_Orphaned_topic_articles")
            .await
            .expect("seed link");

        let outcome = rebuild(&config(), &wiki, &index, &SilentProgress)
            .await
            .expect("rebuild");

        assert_eq!(outcome.unresolved, vec![ProjectKey::new("Orphaned_topic")]);
        assert_eq!(outcome.records, 0);
        assert_eq!(index.live_record_count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn empty_universe_promotes_empty_generation() {
        let (wiki, index) = test_stores().await;

        let outcome = rebuild(&config(), &wiki, &index, &SilentProgress)
            .await
            .expect("rebuild");

        assert_eq!(outcome.categories, 0);
        assert_eq!(outcome.records, 0);
        assert_eq!(index.live_record_count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let (wiki, index) = test_stores().await;
        let result = rebuild(
            &RebuildConfig {
                batch_size: 0,
                query_timeout: TEST_TIMEOUT,
            },
            &wiki,
            &index,
            &SilentProgress,
        )
        .await;
        assert!(matches!(result, Err(WikiScopeError::Validation { .. })));
    }

    #[tokio::test]
    async fn merged_keys_share_one_project() {
        let (wiki, index) = test_stores().await;

        // Two distinct keys: "Trains" resolves directly, "Railways" is where
        // the Trains page redirects, so both buckets merge into one project.
        wiki.insert_page(10, 14, "Start-Class_Trains_articles")
            .await
            .expect("seed category");
        wiki.insert_page(11, 14, "Start-Class_Railways_articles")
            .await
            .expect("seed category");

        wiki.insert_page(20, 4, "WikiProject_Trains").await.expect("seed page");
        wiki.insert_redirect(20, 4, "WikiProject_Railways")
            .await
            .expect("seed redirect");
        wiki.insert_page(21, 4, "WikiProject_Railways").await.expect("seed page");

        wiki.insert_page(30, 1, "Flying_Scotsman").await.expect("seed talk page");
        wiki.insert_category_link(30, "Start-Class_Trains_articles")
            .await
            .expect("seed link");
        wiki.insert_page(31, 1, "Rail_gauge").await.expect("seed talk page");
        wiki.insert_category_link(31, "Start-Class_Railways_articles")
            .await
            .expect("seed link");

        let outcome = rebuild(&config(), &wiki, &index, &SilentProgress)
            .await
            .expect("rebuild");

        assert_eq!(outcome.buckets, 2);
        assert_eq!(outcome.projects, 1);
        assert_eq!(outcome.records, 2);
        assert_eq!(
            index.projects_for_page("Talk:Flying_Scotsman").await.expect("query"),
            vec!["Wikipedia:WikiProject_Railways".to_string()]
        );
    }
}
