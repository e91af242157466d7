//! Project resolution: normalized keys → canonical project pages.
//!
//! A key resolves by exact title (`WikiProject_<key>`) in the project
//! namespace, falling back once to the pluralized form. A matched page that
//! is itself a redirect is followed a single hop — the lookup row already
//! carries the target, so no second query is issued and redirect chains are
//! never walked.
//!
//! Resolution misses are data, not errors: `Ok(None)` means no project page
//! exists for the key and the caller drops that bucket with a diagnostic.

use tracing::{debug, warn};

use wikiscope_shared::{CanonicalProject, PROJECT_NAMESPACE, ProjectKey, Result};
use wikiscope_storage::WikiStore;

/// Resolves project keys against the wiki replica.
pub struct Resolver<'a> {
    store: &'a WikiStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a WikiStore) -> Self {
        Self { store }
    }

    /// Resolve `key` to its canonical project page.
    ///
    /// Idempotent for unchanged store state. `Ok(None)` when neither the
    /// exact nor the plural form exists, or when a redirect points outside
    /// the known project namespaces.
    pub async fn resolve(&self, key: &ProjectKey) -> Result<Option<CanonicalProject>> {
        let exact = format!("WikiProject_{key}");
        let row = match self.store.project_page(&exact).await? {
            Some(row) => Some(row),
            None => {
                debug!(%key, "no exact project page, trying plural form");
                let plural = format!("WikiProject_{key}s");
                self.store.project_page(&plural).await?
            }
        };

        let Some(row) = row else {
            return Ok(None);
        };

        if let (Some(namespace), Some(title)) = (row.rd_namespace, row.rd_title.as_deref()) {
            return match CanonicalProject::new(namespace, title) {
                Some(project) => Ok(Some(project)),
                None => {
                    warn!(%key, namespace, "redirect target in unexpected namespace");
                    Ok(None)
                }
            };
        }

        Ok(CanonicalProject::new(PROJECT_NAMESPACE, row.page_title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    async fn test_store() -> WikiStore {
        let tmp = std::env::temp_dir().join(format!("ws_resolver_{}.db", Uuid::now_v7()));
        WikiStore::open(&tmp, Duration::from_secs(5))
            .await
            .expect("open test wiki db")
    }

    #[tokio::test]
    async fn resolves_exact_title() {
        let store = test_store().await;
        store
            .insert_page(1, 4, "WikiProject_Military_history")
            .await
            .expect("seed");

        let resolver = Resolver::new(&store);
        let project = resolver
            .resolve(&ProjectKey::new("Military_history"))
            .await
            .expect("resolve")
            .expect("resolved");
        assert_eq!(project.to_string(), "Wikipedia:WikiProject_Military_history");
    }

    #[tokio::test]
    async fn falls_back_to_plural_form() {
        let store = test_store().await;
        store.insert_page(1, 4, "WikiProject_Museums").await.expect("seed");

        let resolver = Resolver::new(&store);
        let project = resolver
            .resolve(&ProjectKey::new("Museum"))
            .await
            .expect("resolve")
            .expect("resolved");
        assert_eq!(project.to_string(), "Wikipedia:WikiProject_Museums");
    }

    #[tokio::test]
    async fn follows_redirect_one_hop() {
        let store = test_store().await;
        store.insert_page(1, 4, "WikiProject_Trains").await.expect("seed");
        store
            .insert_redirect(1, 4, "WikiProject_Railways")
            .await
            .expect("seed redirect");

        let resolver = Resolver::new(&store);
        let project = resolver
            .resolve(&ProjectKey::new("Trains"))
            .await
            .expect("resolve")
            .expect("resolved");
        // The canonical identity is the redirect target, not the matched page.
        assert_eq!(project.to_string(), "Wikipedia:WikiProject_Railways");
    }

    #[tokio::test]
    async fn redirect_target_namespace_uses_prefix_table() {
        let store = test_store().await;
        store.insert_page(1, 4, "WikiProject_Ships").await.expect("seed");
        store
            .insert_redirect(1, 100, "WikiProject_Ships")
            .await
            .expect("seed redirect");

        let resolver = Resolver::new(&store);
        let project = resolver
            .resolve(&ProjectKey::new("Ships"))
            .await
            .expect("resolve")
            .expect("resolved");
        assert_eq!(project.to_string(), "Portal:WikiProject_Ships");
    }

    #[tokio::test]
    async fn redirect_to_unknown_namespace_is_unresolved() {
        let store = test_store().await;
        store.insert_page(1, 4, "WikiProject_Oddity").await.expect("seed");
        store
            .insert_redirect(1, 118, "Some_draft")
            .await
            .expect("seed redirect");

        let resolver = Resolver::new(&store);
        let result = resolver
            .resolve(&ProjectKey::new("Oddity"))
            .await
            .expect("resolve");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn missing_project_is_unresolved() {
        let store = test_store().await;
        let resolver = Resolver::new(&store);
        let result = resolver
            .resolve(&ProjectKey::new("Nonexistent"))
            .await
            .expect("resolve");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let store = test_store().await;
        store.insert_page(1, 4, "WikiProject_Physics").await.expect("seed");

        let resolver = Resolver::new(&store);
        let key = ProjectKey::new("Physics");
        let first = resolver.resolve(&key).await.expect("first resolve");
        let second = resolver.resolve(&key).await.expect("second resolve");
        assert_eq!(first, second);
    }
}
