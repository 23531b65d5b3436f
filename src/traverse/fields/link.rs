//! Link, content-relationship, and link-to-media fields
//!
//! A link value normalizes to four parallel views: `url` (injected resolver
//! first, payload URL as fallback), `document` (a lazy lookup key, never an
//! eager dereference), `local_file` (delegated download, gated per path),
//! and `raw` (the untouched payload). Broken or non-document targets leave
//! `document` null without unwinding the pass.

use crate::config::DownloadFailurePolicy;
use crate::error::{Diagnostic, NormalizeError, Result};
use crate::model::LinkConfig;
use crate::traverse::context::{FieldPath, Mode, Traversed, ValueContext};
use crate::typegraph::{builtin, TypeNode, TypeRef};
use log::warn;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub fn link(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    _config: &LinkConfig,
    value: Option<&Value>,
) -> Result<Traversed> {
    match mode {
        Mode::Type(cx) => {
            let name = format!("{}LinkType", cx.naming.type_prefix);
            let mut fields = BTreeMap::new();
            fields.insert("url".to_string(), TypeRef::named(builtin::STRING));
            fields.insert("document".to_string(), TypeRef::named(builtin::JSON));
            fields.insert("local_file".to_string(), TypeRef::named(builtin::JSON));
            fields.insert("raw".to_string(), TypeRef::named(builtin::JSON));
            cx.graph
                .register(&name, TypeNode::Object { fields }, &path.dotted())?;
            Ok(Traversed::Type(TypeRef::named(name)))
        }
        Mode::Value(cx) => {
            let Some(payload) = value.filter(|v| !v.is_null()) else {
                return Ok(Traversed::Value(Value::Null));
            };

            let url = resolve_url(cx, payload);
            let document = document_key(payload);
            let local_file = media_local_file(cx, path, payload, url.as_deref())?;

            Ok(Traversed::Value(json!({
                "url": url,
                "document": document,
                "local_file": local_file,
                "raw": payload,
            })))
        }
    }
}

/// The resolver callback is consulted first; declining falls back to the
/// URL carried by the payload itself.
fn resolve_url(cx: &ValueContext<'_>, payload: &Value) -> Option<String> {
    cx.link_resolver
        .and_then(|resolver| resolver.resolve(payload))
        .or_else(|| {
            payload
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
}

/// Lazy lookup key for a document target: `{id, type}`, resolved by the
/// consumer at read time. Null for broken links and non-document targets.
fn document_key(payload: &Value) -> Value {
    let link_type = payload.get("link_type").and_then(Value::as_str);
    if link_type != Some("Document") {
        return Value::Null;
    }
    if payload.get("isBroken").and_then(Value::as_bool) == Some(true) {
        return Value::Null;
    }
    match (
        payload.get("id").and_then(Value::as_str),
        payload.get("type").and_then(Value::as_str),
    ) {
        (Some(id), Some(doc_type)) => json!({ "id": id, "type": doc_type }),
        _ => Value::Null,
    }
}

/// Delegated download for media targets, gated by the per-path policy.
fn media_local_file(
    cx: &mut ValueContext<'_>,
    path: &FieldPath,
    payload: &Value,
    url: Option<&str>,
) -> Result<Value> {
    if payload.get("link_type").and_then(Value::as_str) != Some("Media") {
        return Ok(Value::Null);
    }
    download_local_file(cx, path, url, payload)
}

/// Shared download gate for link-to-media and image fields.
///
/// Downloads are off unless the override bag enables them at this path; a
/// failed download degrades or escalates per the configured policy.
pub(crate) fn download_local_file(
    cx: &mut ValueContext<'_>,
    path: &FieldPath,
    url: Option<&str>,
    field: &Value,
) -> Result<Value> {
    let dotted = path.dotted();
    if !cx.config.overrides.download_allowed(&dotted, field) {
        return Ok(Value::Null);
    }
    let (Some(downloader), Some(url)) = (cx.file_downloader, url) else {
        return Ok(Value::Null);
    };
    match downloader.download(url) {
        Ok(handle) => Ok(serde_json::to_value(handle)?),
        Err(err) => match cx.config.download_failure_policy {
            DownloadFailurePolicy::NullField => {
                warn!("file download failed for {}: {}", dotted, err);
                cx.diagnostics.push(Diagnostic::warning(
                    &dotted,
                    format!("file download failed: {err}"),
                ));
                Ok(Value::Null)
            }
            DownloadFailurePolicy::Fail => {
                Err(NormalizeError::download_failed(dotted, err.to_string()))
            }
        },
    }
}
