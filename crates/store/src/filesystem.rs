//! Filesystem-backed template store.
//!
//! Logical template names resolve to `<id>.xml` files under a base
//! directory. Resolved paths are validated to stay inside the base
//! directory, so a template id can never reach outside the deployment's
//! template tree.

use crate::{SharedTemplateData, StoreError, TemplateId, TemplateStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A template store that reads report definitions from the local filesystem.
///
/// The id `user-list` resolves to `<base>/user-list.xml`. Subdirectories are
/// allowed (`billing/invoice` -> `<base>/billing/invoice.xml`); parent
/// components and absolute ids are rejected.
#[derive(Debug)]
pub struct FilesystemTemplateStore {
    base_path: PathBuf,
    /// Canonicalized base path for containment checks
    canonical_base: Option<PathBuf>,
}

impl FilesystemTemplateStore {
    /// Creates a store rooted at `base_path`.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        let base = base_path.as_ref().to_path_buf();
        // Canonicalization may fail if the directory does not exist yet
        let canonical = base.canonicalize().ok();
        Self {
            base_path: base,
            canonical_base: canonical,
        }
    }

    /// Returns the base directory for this store.
    pub fn base(&self) -> &Path {
        &self.base_path
    }

    /// Resolves a template id to a file path, or `None` if the id would
    /// escape the base directory.
    fn resolve_path_safe(&self, id: &TemplateId) -> Option<PathBuf> {
        let relative = format!("{}.xml", id.as_str());

        if id.as_str().is_empty() || Path::new(&relative).is_absolute() {
            return None;
        }
        for component in Path::new(&relative).components() {
            if let std::path::Component::ParentDir = component {
                return None;
            }
        }

        let full_path = self.base_path.join(&relative);

        if let Ok(canonical) = full_path.canonicalize()
            && let Some(ref base) = self.canonical_base
        {
            if canonical.starts_with(base) {
                return Some(canonical);
            }
            // Escapes the base directory through a symlink
            return None;
        }

        Some(full_path)
    }
}

impl TemplateStore for FilesystemTemplateStore {
    fn load(&self, id: &TemplateId) -> Result<SharedTemplateData, StoreError> {
        let full_path = self
            .resolve_path_safe(id)
            .ok_or_else(|| StoreError::NotFound(format!("{id} (path rejected)")))?;

        log::debug!("loading template '{}' from {}", id, full_path.display());

        std::fs::read(&full_path).map(Arc::new).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::Io {
                    id: id.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn exists(&self, id: &TemplateId) -> bool {
        self.resolve_path_safe(id)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "FilesystemTemplateStore"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_filesystem_store_load_existing_template() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user-list.xml"), b"<report/>").unwrap();

        let store = FilesystemTemplateStore::new(dir.path());
        let data = store.load(&TemplateId::from("user-list")).unwrap();
        assert_eq!(&*data, b"<report/>");
    }

    #[test]
    fn test_filesystem_store_not_found() {
        let dir = tempdir().unwrap();
        let store = FilesystemTemplateStore::new(dir.path());

        let result = store.load(&TemplateId::from("missing"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_filesystem_store_exists() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("present.xml"), b"").unwrap();

        let store = FilesystemTemplateStore::new(dir.path());
        assert!(store.exists(&TemplateId::from("present")));
        assert!(!store.exists(&TemplateId::from("absent")));
    }

    #[test]
    fn test_filesystem_store_allows_nested_ids() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("billing")).unwrap();
        fs::write(dir.path().join("billing/invoice.xml"), b"<report/>").unwrap();

        let store = FilesystemTemplateStore::new(dir.path());
        assert!(store.exists(&TemplateId::from("billing/invoice")));
        let data = store.load(&TemplateId::from("billing/invoice")).unwrap();
        assert_eq!(&*data, b"<report/>");
    }

    #[test]
    fn test_filesystem_store_blocks_traversal() {
        let dir = tempdir().unwrap();
        let store = FilesystemTemplateStore::new(dir.path());

        let result = store.load(&TemplateId::from("../../../etc/passwd"));
        assert!(result.is_err());
        assert!(!store.exists(&TemplateId::from("../secret")));
        assert!(!store.exists(&TemplateId::from("")));
    }

    #[test]
    fn test_filesystem_store_base() {
        let dir = tempdir().unwrap();
        let store = FilesystemTemplateStore::new(dir.path());
        assert_eq!(store.base(), dir.path());
    }
}
