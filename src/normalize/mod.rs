//! Document normalization
//!
//! Drives the traversal engine in value mode once per document. Traversal
//! itself is synchronous; the only async work is the concurrent placeholder
//! fetch pass that runs after traversal and patches outcomes into the data
//! tree by marker. A normalizer is immutable and `Send + Sync`, so any
//! number of documents may be normalized concurrently against one model set.

use crate::compiler::document_type_name;
use crate::config::{
    FileDownloader, HtmlSerializer, LinkResolver, NormalizerConfig,
};
use crate::digest::string_digest;
use crate::error::{Diagnostic, NormalizeError, Result};
use crate::image::placeholder::apply_outcomes;
use crate::image::{ImageResolver, PlaceholderJob};
use crate::model::{CustomTypeModel, ModelSet};
use crate::traverse::{traverse_object, FieldPath, Mode, ValueContext};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A raw document as supplied by the document source.
///
/// Parsing validates only the required top-level metadata; everything under
/// `data` is the traversal engine's concern.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    pub uid: Option<String>,
    pub doc_type: String,
    pub lang: String,
    pub tags: Vec<String>,
    pub first_publication_date: Option<DateTime<Utc>>,
    pub last_publication_date: Option<DateTime<Utc>>,
    pub data: Value,
}

impl RawDocument {
    /// Parse and validate raw document JSON.
    ///
    /// # Errors
    /// Returns `MalformedDocument` when `id` or `type` is missing or empty;
    /// every other piece of metadata is optional and degrades silently.
    pub fn from_value(raw: &Value) -> Result<Self> {
        let id = required_string(raw, "id")?;
        let doc_type = required_string(raw, "type")?;
        Ok(Self {
            id,
            uid: raw
                .get("uid")
                .and_then(Value::as_str)
                .map(str::to_string),
            doc_type,
            lang: raw
                .get("lang")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            tags: raw
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            first_publication_date: parse_timestamp(raw, "first_publication_date"),
            last_publication_date: parse_timestamp(raw, "last_publication_date"),
            data: raw.get("data").cloned().unwrap_or_else(
                || Value::Object(serde_json::Map::new()),
            ),
        })
    }
}

fn required_string(raw: &Value, key: &str) -> Result<String> {
    match raw.get(key).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(NormalizeError::malformed_document(
            format!("<document>.{key}"),
            "missing or empty required metadata",
        )),
    }
}

fn parse_timestamp(raw: &Value, key: &str) -> Option<DateTime<Utc>> {
    let text = raw.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The normalized form of one document. Created whole by a pass and
/// immutable afterwards; downstream consumers only read it.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedRecord {
    id: String,
    document_id: String,
    #[serde(rename = "type")]
    doc_type: String,
    type_name: String,
    uid: Option<String>,
    lang: String,
    tags: Vec<String>,
    first_publication_date: Option<DateTime<Utc>>,
    last_publication_date: Option<DateTime<Utc>>,
    data: Value,
}

impl NormalizedRecord {
    fn new(doc: RawDocument, type_name: String, data: Value) -> Self {
        Self {
            id: string_digest(&format!("{}:{}", doc.doc_type, doc.id)),
            document_id: doc.id,
            doc_type: doc.doc_type,
            type_name,
            uid: doc.uid,
            lang: doc.lang,
            tags: doc.tags,
            first_publication_date: doc.first_publication_date,
            last_publication_date: doc.last_publication_date,
            data,
        }
    }

    /// Derived stable identifier (digest of repository id and type).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The repository's own document identifier.
    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    #[must_use]
    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// The derived document type name, for union resolution.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    #[must_use]
    pub fn lang(&self) -> &str {
        &self.lang
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn first_publication_date(&self) -> Option<DateTime<Utc>> {
        self.first_publication_date
    }

    #[must_use]
    pub fn last_publication_date(&self) -> Option<DateTime<Utc>> {
        self.last_publication_date
    }

    /// The normalized data payload.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }
}

/// A standalone record owned by an external system, registered during a
/// pass (embeds, integration catalog entries).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalRecord {
    pub id: String,
    pub type_name: String,
    pub data: Value,
}

/// Everything one normalization pass produces.
#[derive(Debug)]
pub struct NormalizeOutput {
    pub record: NormalizedRecord,
    pub external_records: Vec<ExternalRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Normalizes raw documents against one immutable model set.
pub struct DocumentNormalizer {
    models: Arc<ModelSet>,
    config: NormalizerConfig,
    resolver: ImageResolver,
    link_resolver: Option<Arc<dyn LinkResolver>>,
    html_serializer: Option<Arc<dyn HtmlSerializer>>,
    file_downloader: Option<Arc<dyn FileDownloader>>,
}

impl DocumentNormalizer {
    /// Create a normalizer over a model set.
    ///
    /// # Errors
    /// Fails only when the image resolver's HTTP client cannot be built.
    pub fn new(models: Arc<ModelSet>, config: NormalizerConfig) -> Result<Self> {
        let resolver = ImageResolver::new(config.image.clone(), config.placeholder_timeout())?;
        Ok(Self {
            models,
            config,
            resolver,
            link_resolver: None,
            html_serializer: None,
            file_downloader: None,
        })
    }

    /// Install the link-resolution callback.
    #[must_use]
    pub fn with_link_resolver(mut self, resolver: Arc<dyn LinkResolver>) -> Self {
        self.link_resolver = Some(resolver);
        self
    }

    /// Install the per-block HTML serializer override.
    #[must_use]
    pub fn with_html_serializer(mut self, serializer: Arc<dyn HtmlSerializer>) -> Self {
        self.html_serializer = Some(serializer);
        self
    }

    /// Install the delegated file-download collaborator.
    #[must_use]
    pub fn with_file_downloader(mut self, downloader: Arc<dyn FileDownloader>) -> Self {
        self.file_downloader = Some(downloader);
        self
    }

    /// Normalize one raw document, resolving its model by document type.
    ///
    /// # Errors
    /// Returns `MalformedDocument` for missing required metadata or an
    /// unknown document type; field-level problems degrade to nulls and
    /// diagnostics instead.
    pub async fn normalize(&self, raw: &Value) -> Result<NormalizeOutput> {
        let doc = RawDocument::from_value(raw)?;
        let model = self.models.custom_type(&doc.doc_type).ok_or_else(|| {
            NormalizeError::malformed_document(
                format!("<document>.{}", doc.doc_type),
                "no model registered for this document type",
            )
        })?;
        self.normalize_with(model, raw).await
    }

    /// Normalize one raw document against an explicit model.
    pub async fn normalize_with(
        &self,
        model: &CustomTypeModel,
        raw: &Value,
    ) -> Result<NormalizeOutput> {
        let doc = RawDocument::from_value(raw)?;
        let prefix = self.config.naming.type_prefix.clone();
        let fields = model.flattened_fields();
        let data_path = FieldPath::root(model.id.as_str()).child("data");

        let mut diagnostics = Vec::new();
        let mut external_records = Vec::new();
        let mut jobs: Vec<PlaceholderJob> = Vec::new();

        let mut data = {
            let mut cx = ValueContext::new(
                &self.models,
                &self.config,
                &self.resolver,
                self.link_resolver.as_deref(),
                self.html_serializer.as_deref(),
                self.file_downloader.as_deref(),
                doc.uid.as_deref(),
                &mut diagnostics,
                &mut external_records,
                &mut jobs,
            );
            let mut mode = Mode::Value(&mut cx);
            traverse_object(
                &fields,
                &data_path,
                &crate::compiler::data_type_name(&prefix, &model.id),
                &mut mode,
                Some(&doc.data),
            )?
            .into_value()?
        };

        if !jobs.is_empty() {
            debug!(
                "running {} placeholder jobs for document {}",
                jobs.len(),
                doc.id
            );
            let outcomes = self
                .resolver
                .run_placeholder_jobs(&jobs, self.config.placeholder_timeout())
                .await;
            apply_outcomes(&mut data, &outcomes);
        }

        let type_name = document_type_name(&prefix, &model.id);
        info!(
            "normalized document {} ({}) with {} diagnostics",
            doc.id,
            model.id,
            diagnostics.len()
        );
        Ok(NormalizeOutput {
            record: NormalizedRecord::new(doc, type_name, data),
            external_records,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_document_requires_id_and_type() {
        let err = RawDocument::from_value(&json!({"type": "page"})).unwrap_err();
        assert!(err.to_string().contains("<document>.id"));

        let err = RawDocument::from_value(&json!({"id": "X", "type": ""})).unwrap_err();
        assert!(err.to_string().contains("<document>.type"));
    }

    #[test]
    fn test_raw_document_optional_metadata_degrades() {
        let doc = RawDocument::from_value(&json!({
            "id": "X",
            "type": "page",
            "first_publication_date": "not-a-date"
        }))
        .unwrap();

        assert_eq!(doc.lang, "");
        assert!(doc.tags.is_empty());
        assert!(doc.uid.is_none());
        assert!(doc.first_publication_date.is_none());
        assert_eq!(doc.data, json!({}));
    }

    #[test]
    fn test_raw_document_parses_timestamps() {
        let doc = RawDocument::from_value(&json!({
            "id": "X",
            "type": "page",
            "lang": "en-us",
            "tags": ["news"],
            "first_publication_date": "2021-03-04T05:06:07+00:00"
        }))
        .unwrap();

        assert_eq!(doc.lang, "en-us");
        assert_eq!(doc.tags, vec!["news".to_string()]);
        let ts = doc.first_publication_date.unwrap();
        assert_eq!(ts.to_rfc3339(), "2021-03-04T05:06:07+00:00");
    }

    #[test]
    fn test_record_id_derives_from_type_and_document_id() {
        let doc = RawDocument::from_value(&json!({"id": "X", "type": "page"})).unwrap();
        let record = NormalizedRecord::new(doc, "ContentPageType".to_string(), json!({}));

        assert_eq!(record.id(), string_digest("page:X"));
        assert_eq!(record.document_id(), "X");
        assert_eq!(record.type_name(), "ContentPageType");
    }
}
