//! Core domain types for the project index.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// Namespace id of project pages ("Wikipedia:").
pub const PROJECT_NAMESPACE: i64 = 4;

/// Namespace id of category pages.
pub const CATEGORY_NAMESPACE: i64 = 14;

/// Namespace ids of the discussion pages a project scope is drawn from.
pub const DISCUSSION_NAMESPACES: [i64; 2] = [1, 119];

/// Title prefix for the namespaces a project page may live in (directly or
/// as a redirect target).
pub fn project_namespace_prefix(namespace: i64) -> Option<&'static str> {
    match namespace {
        2 => Some("User:"),
        3 => Some("User_talk:"),
        4 => Some("Wikipedia:"),
        5 => Some("Wikipedia_talk:"),
        100 => Some("Portal:"),
        101 => Some("Portal_talk:"),
        _ => None,
    }
}

/// Title prefix for the discussion namespaces.
pub fn discussion_namespace_prefix(namespace: i64) -> Option<&'static str> {
    match namespace {
        1 => Some("Talk:"),
        119 => Some("Draft_talk:"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ProjectKey
// ---------------------------------------------------------------------------

/// Normalized grouping key derived from one or more category names.
///
/// Keys keep the wiki's underscore encoding (`Military_history`), since
/// resolution concatenates `"WikiProject_" + key` against underscore-encoded
/// page titles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectKey(String);

impl ProjectKey {
    /// Wrap a normalized, non-empty key string. Produced by the normalizer.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// CanonicalProject
// ---------------------------------------------------------------------------

/// The resolved page identity for a project: namespace plus bare title.
///
/// Construction validates the namespace against the fixed prefix table, so
/// `Display` always yields a well-formed prefixed title such as
/// `Wikipedia:WikiProject_Military_history`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalProject {
    namespace: i64,
    prefix: &'static str,
    title: String,
}

impl CanonicalProject {
    /// Build a project identity, or `None` if the namespace is not one a
    /// project page may live in.
    pub fn new(namespace: i64, title: impl Into<String>) -> Option<Self> {
        let prefix = project_namespace_prefix(namespace)?;
        Some(Self {
            namespace,
            prefix,
            title: title.into(),
        })
    }

    pub fn namespace(&self) -> i64 {
        self.namespace
    }

    /// Bare title without the namespace prefix.
    pub fn title(&self) -> &str {
        &self.title
    }
}

impl std::fmt::Display for CanonicalProject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.prefix, self.title)
    }
}

// ---------------------------------------------------------------------------
// ScopeRecord
// ---------------------------------------------------------------------------

/// The atomic unit persisted into the index: one discussion page within one
/// project's scope. Many-to-many across the full index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRecord {
    /// Prefixed discussion page title (`Talk:…` / `Draft_talk:…`).
    pub page: String,
    /// Owning project.
    pub project: CanonicalProject,
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for rebuild-run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
