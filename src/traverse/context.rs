//! Traversal state: paths, modes, and per-pass contexts
//!
//! One recursion serves both passes. `Mode` selects which context threads
//! through it: type mode mutates the type graph, value mode accumulates
//! normalized values, external records, and pending placeholder jobs.

use crate::config::{FieldOverrides, FileDownloader, HtmlSerializer, LinkResolver, NamingOptions, NormalizerConfig};
use crate::error::{Diagnostic, NormalizeError, Result};
use crate::image::{ImageResolver, PlaceholderJob};
use crate::model::ModelSet;
use crate::naming::{pascal_case, NameTransformer};
use crate::normalize::ExternalRecord;
use crate::typegraph::{TypeGraph, TypeRef};
use serde_json::Value;
use std::fmt;

/// Path of field keys from the document type down to the current field.
///
/// Rendered as a dot-path for diagnostics, override lookups, and derived
/// identifiers; pascal-joined for derived type names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    #[must_use]
    pub fn root(segment: impl Into<String>) -> Self {
        Self {
            segments: vec![segment.into()],
        }
    }

    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// Derived type name: prefix plus every segment pascal-cased.
    #[must_use]
    pub fn type_name(&self, prefix: &str) -> String {
        let mut name = prefix.to_string();
        for segment in &self.segments {
            name.push_str(&pascal_case(segment));
        }
        name
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// State for one type-mode pass over a model set.
pub struct TypeContext<'a> {
    pub graph: &'a mut TypeGraph,
    pub models: &'a ModelSet,
    pub naming: &'a NamingOptions,
    pub overrides: &'a FieldOverrides,
    pub diagnostics: &'a mut Vec<Diagnostic>,
}

/// State for one value-mode pass over a document.
pub struct ValueContext<'a> {
    pub models: &'a ModelSet,
    pub config: &'a NormalizerConfig,
    pub resolver: &'a ImageResolver,
    pub link_resolver: Option<&'a dyn LinkResolver>,
    pub html_serializer: Option<&'a dyn HtmlSerializer>,
    pub file_downloader: Option<&'a dyn FileDownloader>,
    /// The document's own uid, backing the uid field when data omits it
    pub doc_uid: Option<&'a str>,
    pub diagnostics: &'a mut Vec<Diagnostic>,
    pub external_records: &'a mut Vec<ExternalRecord>,
    pub placeholder_jobs: &'a mut Vec<PlaceholderJob>,
    next_job_id: usize,
}

impl<'a> ValueContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        models: &'a ModelSet,
        config: &'a NormalizerConfig,
        resolver: &'a ImageResolver,
        link_resolver: Option<&'a dyn LinkResolver>,
        html_serializer: Option<&'a dyn HtmlSerializer>,
        file_downloader: Option<&'a dyn FileDownloader>,
        doc_uid: Option<&'a str>,
        diagnostics: &'a mut Vec<Diagnostic>,
        external_records: &'a mut Vec<ExternalRecord>,
        placeholder_jobs: &'a mut Vec<PlaceholderJob>,
    ) -> Self {
        Self {
            models,
            config,
            resolver,
            link_resolver,
            html_serializer,
            file_downloader,
            doc_uid,
            diagnostics,
            external_records,
            placeholder_jobs,
            next_job_id: 0,
        }
    }

    /// Allocate the next placeholder job id.
    pub fn next_job_id(&mut self) -> usize {
        let id = self.next_job_id;
        self.next_job_id += 1;
        id
    }
}

/// Which pass the recursion is running for.
pub enum Mode<'a, 'c> {
    Type(&'c mut TypeContext<'a>),
    Value(&'c mut ValueContext<'a>),
}

impl<'a> Mode<'a, '_> {
    /// The naming options active in either mode.
    #[must_use]
    pub fn naming(&self) -> &NamingOptions {
        match self {
            Mode::Type(cx) => cx.naming,
            Mode::Value(cx) => &cx.config.naming,
        }
    }

    /// The model set either pass runs against.
    #[must_use]
    pub fn models(&self) -> &'a ModelSet {
        match self {
            Mode::Type(cx) => cx.models,
            Mode::Value(cx) => cx.models,
        }
    }

    /// The derived type-name prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        match self {
            Mode::Type(cx) => &cx.naming.type_prefix,
            Mode::Value(cx) => &cx.config.naming.type_prefix,
        }
    }

    /// The record/type key for a field, honoring per-path name overrides.
    #[must_use]
    pub fn record_key(&self, child_path: &FieldPath, key: &str) -> String {
        let (overrides, transformer): (&FieldOverrides, &NameTransformer) = match self {
            Mode::Type(cx) => (cx.overrides, &cx.naming.transformer),
            Mode::Value(cx) => (&cx.config.overrides, &cx.config.naming.transformer),
        };
        if let Some(name) = overrides.get(&child_path.dotted()).and_then(|o| o.name.clone()) {
            return name;
        }
        transformer.transform(key)
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        match self {
            Mode::Type(cx) => cx.diagnostics.push(diagnostic),
            Mode::Value(cx) => cx.diagnostics.push(diagnostic),
        }
    }
}

/// Output of one traversal step: a type reference or a normalized value.
#[derive(Debug, Clone)]
pub enum Traversed {
    Type(TypeRef),
    Value(Value),
}

impl Traversed {
    /// # Errors
    /// Returns `OperationFailed` when called on a value-mode result.
    pub fn into_type_ref(self) -> Result<TypeRef> {
        match self {
            Self::Type(type_ref) => Ok(type_ref),
            Self::Value(_) => Err(NormalizeError::operation_failed(
                "traverse",
                "expected a type-mode result",
            )),
        }
    }

    /// # Errors
    /// Returns `OperationFailed` when called on a type-mode result.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Type(_) => Err(NormalizeError::operation_failed(
                "traverse",
                "expected a value-mode result",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_path_rendering() {
        let path = FieldPath::root("page").child("data").child("body");
        assert_eq!(path.dotted(), "page.data.body");
        assert_eq!(path.type_name("Content"), "ContentPageDataBody");
    }

    #[test]
    fn test_field_path_child_does_not_mutate_parent() {
        let parent = FieldPath::root("page").child("data");
        let _child = parent.child("title");
        assert_eq!(parent.dotted(), "page.data");
    }
}
