//! Shared types, error model, and configuration for WikiScope.
//!
//! This crate is the foundation depended on by all other WikiScope crates.
//! It provides:
//! - [`WikiScopeError`] — the unified error type
//! - Domain types ([`ProjectKey`], [`CanonicalProject`], [`ScopeRecord`], [`RunId`])
//! - The fixed namespace-id → title-prefix tables
//! - Configuration ([`AppConfig`], [`RebuildConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, RebuildConfig, RebuildDefaults, StoresConfig, config_dir, config_file_path,
    expand_path, init_config, load_config, load_config_from,
};
pub use error::{Result, WikiScopeError};
pub use types::{
    CATEGORY_NAMESPACE, CanonicalProject, DISCUSSION_NAMESPACES, PROJECT_NAMESPACE, ProjectKey,
    RunId, ScopeRecord, discussion_namespace_prefix, project_namespace_prefix,
};
