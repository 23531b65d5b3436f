//! Slice zones
//!
//! A zone is an ordered, heterogeneous list of blocks. Type mode derives one
//! object type per declared choice (per variation for shared slices), then
//! assembles a union per zone from those members, nesting a union per shared
//! slice family. Value mode normalizes each entry against its choice, tags
//! it with the member type name for union resolution, and assigns a stable
//! content-derived id so unrelated list edits never perturb other entries.

use crate::digest::path_content_digest;
use crate::error::{Diagnostic, Result};
use crate::model::{FieldMap, SharedSliceModel, SliceChoice, SliceVariation, SliceZoneConfig};
use crate::naming::pascal_case;
use crate::traverse::context::{FieldPath, Mode, Traversed};
use crate::traverse::traverse_object;
use crate::typegraph::{builtin, TypeNode, TypeRef};
use log::warn;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

pub fn slice_zone(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    config: &SliceZoneConfig,
    value: Option<&Value>,
) -> Result<Traversed> {
    let models = mode.models();
    let prefix = mode.prefix().to_string();
    let zone_base = path.type_name(&prefix);

    match mode {
        Mode::Type(_) => {
            let mut members = Vec::with_capacity(config.choices.len());
            for (choice_name, choice) in &config.choices {
                match choice {
                    SliceChoice::Inline {
                        primary, repeat, ..
                    } => {
                        let member =
                            inline_slice_type(mode, path, &zone_base, choice_name, primary, repeat)?;
                        members.push(member);
                    }
                    SliceChoice::SharedRef {} => match models.shared_slice(choice_name) {
                        Some(shared) => {
                            let member = shared_slice_types(mode, &prefix, shared)?;
                            members.push(member);
                        }
                        None => {
                            warn!(
                                "zone {} references unknown shared slice \"{}\"",
                                path.dotted(),
                                choice_name
                            );
                            mode.push_diagnostic(Diagnostic::warning(
                                path.dotted(),
                                format!("unknown shared slice \"{choice_name}\", choice skipped"),
                            ));
                        }
                    },
                }
            }

            let union_name = format!("{zone_base}Type");
            if let Mode::Type(cx) = mode {
                cx.graph.register(
                    &union_name,
                    TypeNode::Union { members },
                    &path.dotted(),
                )?;
            }
            Ok(Traversed::Type(TypeRef::list(TypeRef::named(union_name))))
        }
        Mode::Value(_) => {
            let entries = value.and_then(Value::as_array).cloned().unwrap_or_default();
            let mut out = Vec::with_capacity(entries.len());
            let mut seen_ids: HashSet<String> = HashSet::new();

            for entry in &entries {
                let Some(slice_type) = entry.get("slice_type").and_then(Value::as_str) else {
                    mode.push_diagnostic(Diagnostic::warning(
                        path.dotted(),
                        "slice entry without a slice_type, entry skipped",
                    ));
                    continue;
                };
                let Some(choice) = config.choices.get(slice_type) else {
                    mode.push_diagnostic(Diagnostic::warning(
                        path.dotted(),
                        format!("slice entry names undeclared choice \"{slice_type}\", entry skipped"),
                    ));
                    continue;
                };

                let normalized = match choice {
                    SliceChoice::Inline {
                        primary, repeat, ..
                    } => normalize_inline_entry(
                        mode, path, &zone_base, slice_type, primary, repeat, entry,
                    )?,
                    SliceChoice::SharedRef {} => match models.shared_slice(slice_type) {
                        Some(shared) => {
                            normalize_shared_entry(mode, path, &prefix, shared, entry)?
                        }
                        None => {
                            mode.push_diagnostic(Diagnostic::warning(
                                path.dotted(),
                                format!(
                                    "unknown shared slice \"{slice_type}\", entry skipped"
                                ),
                            ));
                            continue;
                        }
                    },
                };
                let Some(mut normalized) = normalized else {
                    continue;
                };

                let id = path_content_digest(&path.dotted(), entry);
                if !seen_ids.insert(id.clone()) {
                    mode.push_diagnostic(Diagnostic::warning(
                        path.dotted(),
                        "content-identical slice entries share a derived id",
                    ));
                }
                normalized.insert("id".to_string(), Value::String(id));
                out.push(Value::Object(normalized));
            }
            Ok(Traversed::Value(Value::Array(out)))
        }
    }
}

/// Register the object type for one inline choice and return its name.
fn inline_slice_type(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    zone_base: &str,
    choice_name: &str,
    primary: &FieldMap,
    repeat: &FieldMap,
) -> Result<String> {
    let base = format!("{zone_base}{}", pascal_case(choice_name));
    let mut fields = slice_metadata_fields();

    if !primary.is_empty() {
        let primary_name = format!("{base}PrimaryType");
        let primary_path = path.child(choice_name).child("primary");
        traverse_object(primary, &primary_path, &primary_name, mode, None)?;
        fields.insert("primary".to_string(), TypeRef::named(primary_name));
    }
    if !repeat.is_empty() {
        let item_name = format!("{base}ItemType");
        let items_path = path.child(choice_name).child("items");
        traverse_object(repeat, &items_path, &item_name, mode, None)?;
        fields.insert(
            "items".to_string(),
            TypeRef::list(TypeRef::named(item_name)),
        );
    }

    let name = format!("{base}Type");
    if let Mode::Type(cx) = mode {
        cx.graph
            .register(&name, TypeNode::Object { fields }, &path.dotted())?;
    }
    Ok(name)
}

/// Register one object type per variation of a shared slice plus the family
/// union, and return the union's name.
///
/// Names derive from the slice id alone, so every zone referencing the
/// family registers identical types and the inserts stay idempotent.
fn shared_slice_types(
    mode: &mut Mode<'_, '_>,
    prefix: &str,
    shared: &SharedSliceModel,
) -> Result<String> {
    let family_base = format!("{prefix}{}", pascal_case(&shared.id));
    let mut members = Vec::with_capacity(shared.variations.len());

    for variation in &shared.variations {
        let base = format!("{family_base}{}", pascal_case(&variation.id));
        let variation_path = FieldPath::root(shared.id.as_str()).child(variation.id.as_str());
        let mut fields = slice_metadata_fields();
        fields.insert("variation".to_string(), TypeRef::named(builtin::STRING));

        if !variation.primary.is_empty() {
            let primary_name = format!("{base}PrimaryType");
            traverse_object(
                &variation.primary,
                &variation_path.child("primary"),
                &primary_name,
                mode,
                None,
            )?;
            fields.insert("primary".to_string(), TypeRef::named(primary_name));
        }
        if !variation.items.is_empty() {
            let item_name = format!("{base}ItemType");
            traverse_object(
                &variation.items,
                &variation_path.child("items"),
                &item_name,
                mode,
                None,
            )?;
            fields.insert(
                "items".to_string(),
                TypeRef::list(TypeRef::named(item_name)),
            );
        }

        let name = format!("{base}Type");
        if let Mode::Type(cx) = mode {
            cx.graph
                .register(&name, TypeNode::Object { fields }, &variation_path.dotted())?;
        }
        members.push(name);
    }

    let union_name = format!("{family_base}Type");
    if let Mode::Type(cx) = mode {
        cx.graph.register(
            &union_name,
            TypeNode::Union { members },
            &shared.id,
        )?;
    }
    Ok(union_name)
}

fn slice_metadata_fields() -> BTreeMap<String, TypeRef> {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("slice_type".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("slice_label".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("_type_name".to_string(), TypeRef::named(builtin::STRING));
    fields
}

fn normalize_inline_entry(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    zone_base: &str,
    slice_type: &str,
    primary: &FieldMap,
    repeat: &FieldMap,
    entry: &Value,
) -> Result<Option<Map<String, Value>>> {
    let base = format!("{zone_base}{}", pascal_case(slice_type));
    let mut out = entry_metadata(slice_type, &format!("{base}Type"), entry);

    if !primary.is_empty() {
        let primary_path = path.child(slice_type).child("primary");
        let normalized = traverse_object(
            primary,
            &primary_path,
            &format!("{base}PrimaryType"),
            mode,
            entry.get("primary"),
        )?
        .into_value()?;
        out.insert("primary".to_string(), normalized);
    }
    if !repeat.is_empty() {
        out.insert(
            "items".to_string(),
            normalize_items(
                mode,
                &path.child(slice_type).child("items"),
                &format!("{base}ItemType"),
                repeat,
                entry.get("items"),
            )?,
        );
    }
    Ok(Some(out))
}

fn normalize_shared_entry(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    prefix: &str,
    shared: &SharedSliceModel,
    entry: &Value,
) -> Result<Option<Map<String, Value>>> {
    let variation = select_variation(mode, path, shared, entry);
    let family_base = format!("{prefix}{}", pascal_case(&shared.id));
    let base = format!("{family_base}{}", pascal_case(&variation.id));
    let mut out = entry_metadata(&shared.id, &format!("{base}Type"), entry);
    out.insert(
        "variation".to_string(),
        Value::String(variation.id.clone()),
    );

    if !variation.primary.is_empty() {
        let primary_path = path.child(shared.id.as_str()).child("primary");
        let normalized = traverse_object(
            &variation.primary,
            &primary_path,
            &format!("{base}PrimaryType"),
            mode,
            entry.get("primary"),
        )?
        .into_value()?;
        out.insert("primary".to_string(), normalized);
    }
    if !variation.items.is_empty() {
        out.insert(
            "items".to_string(),
            normalize_items(
                mode,
                &path.child(shared.id.as_str()).child("items"),
                &format!("{base}ItemType"),
                &variation.items,
                entry.get("items"),
            )?,
        );
    }
    Ok(Some(out))
}

/// The entry's `variation` discriminator selects the variation; an unknown
/// or missing discriminator falls back to the first declared one.
fn select_variation<'m>(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    shared: &'m SharedSliceModel,
    entry: &Value,
) -> &'m SliceVariation {
    let requested = entry.get("variation").and_then(Value::as_str);
    if let Some(variation) = requested.and_then(|id| shared.variation(id)) {
        return variation;
    }
    if let Some(requested) = requested {
        mode.push_diagnostic(Diagnostic::warning(
            path.dotted(),
            format!(
                "unknown variation \"{}\" of shared slice \"{}\", using \"{}\"",
                requested, shared.id, shared.variations[0].id
            ),
        ));
    }
    // Parsing guarantees at least one variation
    &shared.variations[0]
}

fn normalize_items(
    mode: &mut Mode<'_, '_>,
    items_path: &FieldPath,
    item_type_name: &str,
    fields: &FieldMap,
    value: Option<&Value>,
) -> Result<Value> {
    let elements = value.and_then(Value::as_array).cloned().unwrap_or_default();
    let mut out = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let element_path = items_path.child(index.to_string());
        let normalized =
            traverse_object(fields, &element_path, item_type_name, mode, Some(element))?
                .into_value()?;
        out.push(normalized);
    }
    Ok(Value::Array(out))
}

fn entry_metadata(slice_type: &str, type_name: &str, entry: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert(
        "slice_type".to_string(),
        Value::String(slice_type.to_string()),
    );
    out.insert(
        "slice_label".to_string(),
        entry.get("slice_label").cloned().unwrap_or(Value::Null),
    );
    out.insert(
        "_type_name".to_string(),
        Value::String(type_name.to_string()),
    );
    out
}
