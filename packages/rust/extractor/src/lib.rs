//! Scope extraction: a project's category set → its in-scope discussion pages.
//!
//! One store scan per project: every page in the Talk/Draft-talk namespaces
//! classified under any of the project's categories, distinct, returned with
//! the namespace prefix applied.

use tracing::warn;

use wikiscope_shared::{Result, discussion_namespace_prefix};
use wikiscope_storage::WikiStore;

/// Extracts project scopes from the wiki replica.
pub struct ScopeExtractor<'a> {
    store: &'a WikiStore,
}

impl<'a> ScopeExtractor<'a> {
    pub fn new(store: &'a WikiStore) -> Self {
        Self { store }
    }

    /// Prefixed discussion-page titles classified under any of `categories`.
    ///
    /// Callers pass a bucket's full category set, which is non-empty by
    /// construction; an empty set is rejected by the store as a validation
    /// error.
    pub async fn extract_scope(&self, categories: &[String]) -> Result<Vec<String>> {
        let rows = self.store.discussion_pages_in_categories(categories).await?;

        let mut pages = Vec::with_capacity(rows.len());
        for (title, namespace) in rows {
            match discussion_namespace_prefix(namespace) {
                Some(prefix) => pages.push(format!("{prefix}{title}")),
                None => warn!(namespace, title = %title, "page outside discussion namespaces, skipping"),
            }
        }
        Ok(pages)
    }
}
