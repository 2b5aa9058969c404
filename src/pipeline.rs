//! The report service: one parametrized pipeline behind per-format
//! convenience wrappers.
//!
//! A request runs Load -> Compile -> Fill -> Export -> Encode inside the
//! caller's thread of control. There is no queue, no background work and
//! no automatic retry; whether to re-run a failed request is the caller's
//! call. The only state shared between requests is the compiled-template
//! cache, keyed by template id plus content digest so a changed definition
//! never serves a stale artifact.

use crate::codec;
use crate::credential;
use crate::error::{PipelineError, Stage};
use folio_engine::{fill, FilledReport, ParameterMap};
use folio_export::{
    DocxExporter, EncryptionSpec, ExportError, ExportFormat, Exporter, PdfConfig, PdfExporter,
    XlsxConfig, XlsxExporter,
};
use folio_source::DataBinding;
use folio_store::{TemplateId, TemplateStore};
use folio_template::{compile, CompileError, CompiledReport};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Content-protection input of a request.
///
/// The user password is derived from `user_seed` (a national-identifier
/// string) by [`credential::derive_password`]; the owner password is taken
/// as-is and may differ.
#[derive(Debug, Clone)]
pub struct Protection {
    pub user_seed: String,
    pub owner_password: String,
}

/// Service-wide knobs.
#[derive(Debug, Clone)]
pub struct ServicePolicy {
    /// Width of the password window cut from the identifier digits.
    pub password_digits: usize,
}

impl Default for ServicePolicy {
    fn default() -> Self {
        Self { password_digits: 4 }
    }
}

/// One report-generation request.
#[derive(Debug)]
pub struct ReportRequest<'c> {
    pub template_id: TemplateId,
    pub format: ExportFormat,
    pub binding: DataBinding<'c>,
    pub parameters: ParameterMap,
    pub protection: Option<Protection>,
}

impl<'c> ReportRequest<'c> {
    pub fn new(
        template_id: impl Into<TemplateId>,
        format: ExportFormat,
        binding: DataBinding<'c>,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            format,
            binding,
            parameters: ParameterMap::new(),
            protection: None,
        }
    }

    pub fn with_parameters(mut self, parameters: ParameterMap) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_protection(mut self, protection: Protection) -> Self {
        self.protection = Some(protection);
        self
    }
}

/// The transferable result: final bytes, Base64-encoded, plus the format
/// they are in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPayload {
    pub format: ExportFormat,
    pub content: String,
}

/// The report-generation pipeline over a template store.
pub struct ReportService<S: TemplateStore> {
    store: S,
    cache: TemplateCache,
    policy: ServicePolicy,
}

impl<S: TemplateStore> ReportService<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, ServicePolicy::default())
    }

    pub fn with_policy(store: S, policy: ServicePolicy) -> Self {
        Self {
            store,
            cache: TemplateCache::new(),
            policy,
        }
    }

    /// Run the full pipeline for one request.
    pub fn generate(&self, request: ReportRequest<'_>) -> Result<ReportPayload, PipelineError> {
        let ReportRequest {
            template_id,
            format,
            binding,
            parameters,
            protection,
        } = request;

        log::debug!("generating report '{template_id}' as {format}");

        let definition = self
            .store
            .load(&template_id)
            .map_err(|e| PipelineError::at(Stage::TemplateLoad, e))?;

        let compiled = self
            .cache
            .get_or_compile(&template_id, &definition)
            .map_err(|e| PipelineError::at(Stage::Compile, e))?;

        let filled = fill(&compiled, binding, &parameters)
            .map_err(|e| PipelineError::at(Stage::Fill, e))?;

        let encryption = protection
            .map(|p| self.encryption_spec(&p, format))
            .transpose()
            .map_err(|e| PipelineError::at(Stage::Export, e))?;

        let bytes =
            export(filled, format, encryption).map_err(|e| PipelineError::at(Stage::Export, e))?;

        let content = codec::encode(&bytes);
        log::debug!(
            "report '{template_id}' generated, {} payload chars",
            content.len()
        );
        Ok(ReportPayload { format, content })
    }

    /// PDF, optionally protected.
    pub fn generate_pdf(
        &self,
        template_id: impl Into<TemplateId>,
        binding: DataBinding<'_>,
        protection: Option<Protection>,
    ) -> Result<ReportPayload, PipelineError> {
        let mut request = ReportRequest::new(template_id, ExportFormat::Pdf, binding);
        request.protection = protection;
        self.generate(request)
    }

    /// Spreadsheet, one worksheet per page.
    pub fn generate_spreadsheet(
        &self,
        template_id: impl Into<TemplateId>,
        binding: DataBinding<'_>,
    ) -> Result<ReportPayload, PipelineError> {
        self.generate(ReportRequest::new(
            template_id,
            ExportFormat::Spreadsheet,
            binding,
        ))
    }

    /// Word-processing document, single continuous flow.
    pub fn generate_word(
        &self,
        template_id: impl Into<TemplateId>,
        binding: DataBinding<'_>,
    ) -> Result<ReportPayload, PipelineError> {
        self.generate(ReportRequest::new(
            template_id,
            ExportFormat::WordDocument,
            binding,
        ))
    }

    fn encryption_spec(
        &self,
        protection: &Protection,
        format: ExportFormat,
    ) -> Result<EncryptionSpec, ExportError> {
        if format != ExportFormat::Pdf {
            return Err(ExportError::Encryption(format!(
                "content protection is only supported for PDF output, not {format}"
            )));
        }
        let user_password =
            credential::derive_password(&protection.user_seed, self.policy.password_digits);
        if user_password.is_empty() {
            return Err(ExportError::Encryption(
                "identifier yields an empty user password".to_string(),
            ));
        }
        Ok(EncryptionSpec::new(
            user_password,
            protection.owner_password.clone(),
        ))
    }
}

fn export(
    filled: FilledReport,
    format: ExportFormat,
    encryption: Option<EncryptionSpec>,
) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Pdf => PdfExporter::new(PdfConfig { encryption }).export(filled),
        ExportFormat::Spreadsheet => XlsxExporter::new(XlsxConfig::default()).export(filled),
        ExportFormat::WordDocument => DocxExporter::new().export(filled),
    }
}

/// Compiled-template cache with at-most-one-compilation-in-flight
/// semantics per key.
///
/// The outer map lock is held only to hand out the per-key cell; the
/// compilation itself runs under the cell, so two requests for the same
/// key wait on one compilation while requests for other keys proceed.
/// Failed compilations are not cached.
struct TemplateCache {
    slots: Mutex<HashMap<String, Arc<OnceCell<Arc<CompiledReport>>>>>,
}

impl TemplateCache {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_compile(
        &self,
        id: &TemplateId,
        definition: &[u8],
    ) -> Result<Arc<CompiledReport>, CompileError> {
        let key = format!("{id}:{:x}", md5::compute(definition));
        self.get_or_init(key, || compile(definition).map(Arc::new))
    }

    fn get_or_init<F>(&self, key: String, init: F) -> Result<Arc<CompiledReport>, CompileError>
    where
        F: FnOnce() -> Result<Arc<CompiledReport>, CompileError>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key).or_default().clone()
        };
        slot.get_or_try_init(init).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn definition() -> &'static [u8] {
        br#"<report name="user-list"><column field="id" width="60"/></report>"#
    }

    #[test]
    fn test_cache_compiles_once_per_content() {
        let cache = TemplateCache::new();
        let id = TemplateId::from("user-list");
        let compilations = AtomicUsize::new(0);

        for _ in 0..3 {
            let key = format!("{id}:{:x}", md5::compute(definition()));
            let compiled = cache
                .get_or_init(key, || {
                    compilations.fetch_add(1, Ordering::SeqCst);
                    compile(definition()).map(Arc::new)
                })
                .unwrap();
            assert_eq!(compiled.name, "user-list");
        }
        assert_eq!(compilations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_shares_one_artifact() {
        let cache = TemplateCache::new();
        let id = TemplateId::from("user-list");
        let a = cache.get_or_compile(&id, definition()).unwrap();
        let b = cache.get_or_compile(&id, definition()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cache_keyed_by_content_digest() {
        let cache = TemplateCache::new();
        let id = TemplateId::from("user-list");
        let a = cache.get_or_compile(&id, definition()).unwrap();
        let changed =
            br#"<report name="user-list"><column field="login" width="90"/></report>"#;
        let b = cache.get_or_compile(&id, changed).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.columns[0].field, "login");
    }

    #[test]
    fn test_cache_does_not_cache_failures() {
        let cache = TemplateCache::new();
        let id = TemplateId::from("broken");
        let bad = br#"<report name="broken"></report>"#;
        assert!(cache.get_or_compile(&id, bad).is_err());
        // A fixed definition under the same id compiles fine.
        let fixed = br#"<report name="broken"><column field="id" width="60"/></report>"#;
        assert!(cache.get_or_compile(&id, fixed).is_ok());
    }
}
