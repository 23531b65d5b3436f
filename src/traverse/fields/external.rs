//! Externally resolved fields: embeds and integration catalogs
//!
//! Both kinds carry payloads owned by an external system. A non-empty value
//! registers an external record on the pass output — keyed by `embed_url`
//! for embeds, by the payload's own `id` (content digest as fallback) for
//! integration entries — and the field itself passes the payload through.
//! Empty payloads normalize to null.

use crate::digest::content_digest;
use crate::error::Result;
use crate::model::IntegrationConfig;
use crate::naming::pascal_case;
use crate::normalize::ExternalRecord;
use crate::traverse::context::{FieldPath, Mode, Traversed};
use crate::typegraph::{TypeNode, TypeRef};
use serde_json::Value;

pub fn embed(mode: &mut Mode<'_, '_>, path: &FieldPath, value: Option<&Value>) -> Result<Traversed> {
    match mode {
        Mode::Type(cx) => {
            let name = format!("{}EmbedType", cx.naming.type_prefix);
            cx.graph.register(
                &name,
                TypeNode::External {
                    key_field: "embed_url".to_string(),
                },
                &path.dotted(),
            )?;
            Ok(Traversed::Type(TypeRef::named(name)))
        }
        Mode::Value(cx) => {
            let Some(payload) = non_empty(value) else {
                return Ok(Traversed::Value(Value::Null));
            };
            let id = payload
                .get("embed_url")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| content_digest(payload));
            cx.external_records.push(ExternalRecord {
                id,
                type_name: format!("{}EmbedType", cx.config.naming.type_prefix),
                data: payload.clone(),
            });
            Ok(Traversed::Value(payload.clone()))
        }
    }
}

pub fn integration(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    config: &IntegrationConfig,
    value: Option<&Value>,
) -> Result<Traversed> {
    let type_name = integration_type_name(mode.prefix(), config, path);
    match mode {
        Mode::Type(cx) => {
            cx.graph.register(
                &type_name,
                TypeNode::External {
                    key_field: "id".to_string(),
                },
                &path.dotted(),
            )?;
            Ok(Traversed::Type(TypeRef::named(type_name)))
        }
        Mode::Value(cx) => {
            let Some(payload) = non_empty(value) else {
                return Ok(Traversed::Value(Value::Null));
            };
            let id = payload
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| content_digest(payload));
            cx.external_records.push(ExternalRecord {
                id,
                type_name,
                data: payload.clone(),
            });
            Ok(Traversed::Value(payload.clone()))
        }
    }
}

/// Catalog-named when the model declares a catalog, path-derived otherwise.
fn integration_type_name(prefix: &str, config: &IntegrationConfig, path: &FieldPath) -> String {
    match config.catalog.as_deref() {
        Some(catalog) if !catalog.is_empty() => {
            format!("{prefix}{}IntegrationType", pascal_case(catalog))
        }
        _ => format!("{}IntegrationType", path.type_name(prefix)),
    }
}

fn non_empty(value: Option<&Value>) -> Option<&Value> {
    let value = value?;
    match value {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    }
}
