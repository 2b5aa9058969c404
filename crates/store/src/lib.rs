//! Template storage for the Folio report pipeline.
//!
//! A [`TemplateStore`] resolves a logical template name to the raw bytes of
//! a report definition. The pipeline never cares where those bytes live.
//!
//! ## Available Stores
//!
//! - [`FilesystemTemplateStore`]: loads `<id>.xml` files from a base directory
//! - [`InMemoryTemplateStore`]: pre-populated in-memory storage
//!
//! A missing template is reported as [`StoreError::NotFound`], distinct from
//! I/O failures, so callers can tell a misconfigured deployment apart from a
//! transient read error.

mod filesystem;

pub use filesystem::FilesystemTemplateStore;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type for template loading operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("failed to load template '{id}': {message}")]
    Io { id: String, message: String },
}

/// Shared template bytes (reference-counted, loaded once per call).
pub type SharedTemplateData = Arc<Vec<u8>>;

/// Opaque identifier of a template resource.
///
/// Immutable; resolved once per render call. The same id always names the
/// same template source, which is what makes compiled templates cacheable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TemplateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A source of template definitions.
///
/// Implementations resolve a [`TemplateId`] to raw definition bytes. Loading
/// has no side effects beyond the read itself.
pub trait TemplateStore: Send + Sync {
    /// Load the template definition for `id`.
    fn load(&self, id: &TemplateId) -> Result<SharedTemplateData, StoreError>;

    /// Check whether a template exists without loading it.
    fn exists(&self, id: &TemplateId) -> bool;

    /// Human-readable store name for logging.
    fn name(&self) -> &'static str;
}

/// An in-memory template store.
///
/// Templates must be registered before use. Useful for tests and for
/// deployments that embed their templates in the binary.
#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    templates: std::sync::RwLock<std::collections::HashMap<String, SharedTemplateData>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under `id`, replacing any previous definition.
    pub fn add(&self, id: impl Into<String>, definition: Vec<u8>) -> Result<(), StoreError> {
        let id = id.into();
        let mut templates = self.templates.write().map_err(|_| StoreError::Io {
            id: id.clone(),
            message: "template store lock poisoned".to_string(),
        })?;
        templates.insert(id, Arc::new(definition));
        Ok(())
    }

    /// Remove a template. Returns `None` if it was not registered.
    pub fn remove(&self, id: &str) -> Option<SharedTemplateData> {
        self.templates.write().ok()?.remove(id)
    }

    /// Number of registered templates. Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.templates.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().map(|t| t.is_empty()).unwrap_or(true)
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn load(&self, id: &TemplateId) -> Result<SharedTemplateData, StoreError> {
        let templates = self.templates.read().map_err(|_| StoreError::Io {
            id: id.to_string(),
            message: "template store lock poisoned".to_string(),
        })?;
        templates
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn exists(&self, id: &TemplateId) -> bool {
        self.templates
            .read()
            .map(|t| t.contains_key(id.as_str()))
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "InMemoryTemplateStore"
    }
}
