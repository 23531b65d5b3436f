//! Model Traversal Engine
//!
//! One recursive walk over a model's field maps, run in two modes: type
//! mode derives and registers type descriptors, value mode normalizes an
//! instance document. Both share path tracking, name transformation, and
//! the per-kind dispatch; the mode decides what each step produces.

pub mod context;
pub mod fields;

pub use context::{FieldPath, Mode, Traversed, TypeContext, ValueContext};

use crate::error::Result;
use crate::model::{FieldMap, FieldModel};
use crate::typegraph::{builtin, TypeNode, TypeRef};
use serde_json::Value;
use std::collections::BTreeMap;

/// Traverse one field, dispatching on its kind.
///
/// `value` is the field's raw sub-value and is ignored in type mode. Value
/// mode never fails on absent or oddly-shaped optional data; it degrades to
/// null plus a diagnostic where something is worth flagging.
pub fn traverse_field(
    field: &FieldModel,
    path: &FieldPath,
    mode: &mut Mode<'_, '_>,
    value: Option<&Value>,
) -> Result<Traversed> {
    match field {
        FieldModel::Boolean(_) => fields::scalar(mode, builtin::BOOLEAN, value),
        FieldModel::Color(_) => fields::scalar(mode, builtin::STRING, value),
        FieldModel::Date(_) => fields::scalar(mode, builtin::DATE, value),
        FieldModel::Timestamp(_) => fields::scalar(mode, builtin::DATE_TIME, value),
        FieldModel::Number(_) => fields::scalar(mode, builtin::FLOAT, value),
        FieldModel::Uid(_) => fields::uid(mode, value),
        FieldModel::GeoPoint(_) => fields::geopoint(mode, path, value),
        FieldModel::Select(config) => fields::select(mode, path, config, value),
        FieldModel::Embed(_) => fields::external::embed(mode, path, value),
        FieldModel::IntegrationFields(config) => {
            fields::external::integration(mode, path, config, value)
        }
        FieldModel::Link(config) => fields::link::link(mode, path, config, value),
        FieldModel::RichText(config) => fields::richtext::rich_text(mode, path, config, value),
        FieldModel::Image(config) => fields::image::image(mode, path, config, value),
        FieldModel::Group(config) => fields::group::group(mode, path, config, value),
        FieldModel::SliceZone(config) => fields::slices::slice_zone(mode, path, config, value),
        FieldModel::Unknown(unknown) => fields::unknown(mode, path, unknown, value),
    }
}

/// Traverse a field map as one object.
///
/// Type mode registers an object type under `type_name` and returns a
/// reference to it; value mode returns the normalized object. Field keys are
/// transformed before use as type/record keys; raw sub-values are looked up
/// under the original key.
pub fn traverse_object(
    object_fields: &FieldMap,
    path: &FieldPath,
    type_name: &str,
    mode: &mut Mode<'_, '_>,
    value: Option<&Value>,
) -> Result<Traversed> {
    let source = value.and_then(Value::as_object);
    let mut type_fields: BTreeMap<String, TypeRef> = BTreeMap::new();
    let mut record = serde_json::Map::new();

    for (key, field) in object_fields {
        let child = path.child(key.as_str());
        let record_key = mode.record_key(&child, key);
        let sub_value = source.and_then(|map| map.get(key));
        match traverse_field(field, &child, mode, sub_value)? {
            Traversed::Type(type_ref) => {
                type_fields.insert(record_key, type_ref);
            }
            Traversed::Value(normalized) => {
                record.insert(record_key, normalized);
            }
        }
    }

    match mode {
        Mode::Type(cx) => {
            cx.graph.register(
                type_name,
                TypeNode::Object {
                    fields: type_fields,
                },
                &path.dotted(),
            )?;
            Ok(Traversed::Type(TypeRef::named(type_name)))
        }
        Mode::Value(_) => Ok(Traversed::Value(Value::Object(record))),
    }
}
