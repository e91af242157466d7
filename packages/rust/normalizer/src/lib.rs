//! Category normalization: raw assessment-category names → project keys.
//!
//! [`normalize`] is an ordered chain of text rewrites; the order is
//! load-bearing, since later rules assume earlier ones already stripped
//! their tokens. The chain is a fixed, hand-tuned sequence — do not reorder
//! or generalize the rules without a corpus of category names to validate
//! against.
//!
//! [`bucket_categories`] groups the raw category universe by normalized key,
//! forming a partition: every input category lands in exactly one bucket or
//! is skipped with a diagnostic.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use wikiscope_shared::ProjectKey;

// ---------------------------------------------------------------------------
// Rewrite patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches `_task_force` / `_taskforce` / plural, with an optional `_by`.
static TASK_FORCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_task_?forces?(_by)?").expect("task force regex"));

/// Matches `_work_group` / `_workgroup`.
static WORK_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_work_?group").expect("work group regex"));

/// Matches a trailing `_articles`.
static ARTICLES_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_articles$").expect("articles suffix regex"));

/// Matches a trailing `_newsletter`.
static NEWSLETTER_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_newsletter$").expect("newsletter suffix regex"));

/// Matches a leading quality-grade prefix: `<AnyText>-Class_` or `Unassessed_`.
static GRADE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((.*)-Class|Unassessed)_").expect("grade prefix regex"));

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a raw category name to its project grouping key.
///
/// Deterministic and pure. Returns `None` when the name strips to nothing —
/// callers skip such categories rather than crash.
pub fn normalize(raw: &str) -> Option<ProjectKey> {
    // Literal token removals, applied to every occurrence.
    let name = raw
        .replace("WikiProject_", "")
        .replace("-related", "") // e.g. "Museum-related" -> "Museum"
        .replace("_quality", "")
        .replace("_subproject_selected_articles", "")
        .replace("_automatically_assessed", "");

    // Qualifier removals, then the trailing markers, then the grade prefix.
    let name = TASK_FORCE_RE.replace_all(&name, "");
    let name = WORK_GROUP_RE.replace_all(&name, "");
    let name = ARTICLES_SUFFIX_RE.replace_all(&name, "");
    let name = NEWSLETTER_SUFFIX_RE.replace_all(&name, "");
    let name = GRADE_PREFIX_RE.replace_all(&name, "");

    capitalize_first(&name).map(ProjectKey::new)
}

/// Uppercase the first character, leaving the rest unchanged.
/// `None` for the empty string.
fn capitalize_first(name: &str) -> Option<String> {
    let mut chars = name.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

// ---------------------------------------------------------------------------
// Bucket grouping
// ---------------------------------------------------------------------------

/// Project buckets: normalized key → raw categories that produced it.
/// Ordered for deterministic iteration during resolution.
pub type ProjectBuckets = BTreeMap<ProjectKey, Vec<String>>;

/// Group the raw category universe by normalized project key.
///
/// Returns the buckets and the number of categories skipped because they
/// normalized to an empty key.
pub fn bucket_categories(categories: &[String]) -> (ProjectBuckets, usize) {
    let mut buckets = ProjectBuckets::new();
    let mut skipped = 0;

    for category in categories {
        match normalize(category) {
            Some(key) => buckets.entry(key).or_default().push(category.clone()),
            None => {
                warn!(category = %category, "category normalized to an empty key, skipping");
                skipped += 1;
            }
        }
    }

    (buckets, skipped)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> String {
        normalize(raw).expect("normalizes to a key").to_string()
    }

    #[test]
    fn wikiproject_prefix_stripped() {
        assert_eq!(key("WikiProject_Military_history_articles"), "Military_history");
    }

    #[test]
    fn grade_class_prefix_stripped() {
        assert_eq!(key("Start-Class_Military_history_articles"), "Military_history");
        assert_eq!(key("FA-Class_Physics_articles"), "Physics");
    }

    #[test]
    fn unassessed_prefix_stripped() {
        assert_eq!(key("Unassessed_Military_history_articles"), "Military_history");
    }

    #[test]
    fn related_suffix_stripped() {
        assert_eq!(key("Museum-related_articles"), "Museum");
    }

    #[test]
    fn quality_token_stripped() {
        assert_eq!(key("Unassessed_Chemistry_quality_articles"), "Chemistry");
    }

    #[test]
    fn subproject_and_automatic_tokens_stripped() {
        assert_eq!(key("Physics_subproject_selected_articles"), "Physics");
        assert_eq!(key("C-Class_Physics_automatically_assessed_articles"), "Physics");
    }

    #[test]
    fn task_force_variants_stripped() {
        // The grade prefix is removed after the task-force token, so the
        // prefix rule sees the already-shortened name.
        assert_eq!(key("A-Class_Berlin_task_force_articles"), "Berlin");
        assert_eq!(key("Military_history_taskforce_articles"), "Military_history");
        assert_eq!(key("B-Class_Maritime_task_forces_by_articles"), "Maritime");
    }

    #[test]
    fn work_group_stripped() {
        assert_eq!(key("Unassessed_Medicine_work_group_articles"), "Medicine");
        assert_eq!(key("Unassessed_Medicine_workgroup_articles"), "Medicine");
    }

    #[test]
    fn newsletter_suffix_stripped() {
        assert_eq!(key("Military_history_newsletter"), "Military_history");
    }

    #[test]
    fn no_grade_prefix_passes_through() {
        // Only the final capitalization applies.
        assert_eq!(key("history_of_science_articles"), "History_of_science");
    }

    #[test]
    fn empty_after_stripping_is_rejected() {
        assert!(normalize("_articles").is_none());
        assert!(normalize("WikiProject__articles").is_none());
    }

    #[test]
    fn normalization_is_deterministic() {
        let a = normalize("Start-Class_Military_history_articles");
        let b = normalize("Start-Class_Military_history_articles");
        assert_eq!(a, b);
    }

    #[test]
    fn buckets_partition_the_universe() {
        let categories = vec![
            "WikiProject_Military_history_articles".to_string(),
            "Start-Class_Military_history_articles".to_string(),
            "Unassessed_Military_history_articles".to_string(),
            "Museum-related_articles".to_string(),
            "_articles".to_string(), // skipped
        ];

        let (buckets, skipped) = bucket_categories(&categories);
        assert_eq!(skipped, 1);

        let bucketed: usize = buckets.values().map(Vec::len).sum();
        assert_eq!(bucketed + skipped, categories.len());

        let military = buckets
            .get(&ProjectKey::new("Military_history"))
            .expect("military history bucket");
        assert_eq!(military.len(), 3);

        let museum = buckets
            .get(&ProjectKey::new("Museum"))
            .expect("museum bucket");
        assert_eq!(museum, &vec!["Museum-related_articles".to_string()]);
    }
}
