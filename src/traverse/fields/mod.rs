//! Field Kind Registry
//!
//! One handler per field kind, each contributing to both traversal modes.
//! Simple kinds live here; the structured kinds get their own modules.

pub mod external;
pub mod group;
pub mod image;
pub mod link;
pub mod richtext;
pub mod slices;

use crate::error::Diagnostic;
use crate::error::Result;
use crate::model::{SelectConfig, UnknownField};
use crate::traverse::context::{FieldPath, Mode, Traversed};
use crate::typegraph::{builtin, TypeNode, TypeRef};
use log::info;
use serde_json::Value;
use std::collections::BTreeMap;

/// Scalar kinds: a built-in leaf type and a value passthrough.
pub fn scalar(mode: &mut Mode<'_, '_>, type_name: &str, value: Option<&Value>) -> Result<Traversed> {
    Ok(match mode {
        Mode::Type(_) => Traversed::Type(TypeRef::named(type_name)),
        Mode::Value(_) => Traversed::Value(value.cloned().unwrap_or(Value::Null)),
    })
}

/// The uid field reads from data when present, falling back to the
/// document's own uid metadata.
pub fn uid(mode: &mut Mode<'_, '_>, value: Option<&Value>) -> Result<Traversed> {
    Ok(match mode {
        Mode::Type(_) => Traversed::Type(TypeRef::named(builtin::STRING)),
        Mode::Value(cx) => {
            let normalized = value
                .filter(|v| !v.is_null())
                .cloned()
                .or_else(|| cx.doc_uid.map(|uid| Value::String(uid.to_string())))
                .unwrap_or(Value::Null);
            Traversed::Value(normalized)
        }
    })
}

/// Geo points share one canonical object type; values pass through.
pub fn geopoint(mode: &mut Mode<'_, '_>, path: &FieldPath, value: Option<&Value>) -> Result<Traversed> {
    match mode {
        Mode::Type(cx) => {
            let name = format!("{}GeoPointType", cx.naming.type_prefix);
            let mut fields = BTreeMap::new();
            fields.insert("latitude".to_string(), TypeRef::named(builtin::FLOAT));
            fields.insert("longitude".to_string(), TypeRef::named(builtin::FLOAT));
            cx.graph
                .register(&name, TypeNode::Object { fields }, &path.dotted())?;
            Ok(Traversed::Type(TypeRef::named(name)))
        }
        Mode::Value(_) => Ok(Traversed::Value(value.cloned().unwrap_or(Value::Null))),
    }
}

/// Select fields with declared options derive an enum type; the type is
/// always nullable, a declared default affects the editing UI only.
pub fn select(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    config: &SelectConfig,
    value: Option<&Value>,
) -> Result<Traversed> {
    match mode {
        Mode::Type(cx) => {
            if config.options.is_empty() {
                return Ok(Traversed::Type(TypeRef::named(builtin::STRING)));
            }
            let name = format!("{}SelectType", path.type_name(&cx.naming.type_prefix));
            cx.graph.register(
                &name,
                TypeNode::Enum {
                    values: config.options.clone(),
                },
                &path.dotted(),
            )?;
            Ok(Traversed::Type(TypeRef::named(name)))
        }
        Mode::Value(_) => Ok(Traversed::Value(value.cloned().unwrap_or(Value::Null))),
    }
}

/// Unknown kinds degrade, never fail: type mode emits one opaque type and
/// one info diagnostic naming the path and kind string; value mode passes
/// the raw value through untouched.
pub fn unknown(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    field: &UnknownField,
    value: Option<&Value>,
) -> Result<Traversed> {
    match mode {
        Mode::Type(cx) => {
            let name = format!("{}UnknownType", path.type_name(&cx.naming.type_prefix));
            cx.graph.register(
                &name,
                TypeNode::Opaque {
                    kind: field.kind.clone(),
                },
                &path.dotted(),
            )?;
            info!(
                "unrecognized field kind \"{}\" at {}, typed opaquely",
                field.kind,
                path.dotted()
            );
            cx.diagnostics.push(Diagnostic::info(
                path.dotted(),
                format!("unrecognized field kind \"{}\", typed opaquely", field.kind),
            ));
            Ok(Traversed::Type(TypeRef::named(name)))
        }
        Mode::Value(_) => Ok(Traversed::Value(value.cloned().unwrap_or(Value::Null))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldOverrides, NamingOptions};
    use crate::model::ModelSet;
    use crate::typegraph::TypeGraph;
    use serde_json::json;

    struct TypeFixture {
        graph: TypeGraph,
        models: ModelSet,
        naming: NamingOptions,
        overrides: FieldOverrides,
        diagnostics: Vec<Diagnostic>,
    }

    impl TypeFixture {
        fn new() -> Self {
            Self {
                graph: TypeGraph::new(),
                models: ModelSet::new(),
                naming: NamingOptions::default(),
                overrides: FieldOverrides::new(),
                diagnostics: Vec::new(),
            }
        }
    }

    #[test]
    fn test_select_with_options_derives_enum() {
        let mut fixture = TypeFixture::new();
        let mut cx = crate::traverse::context::TypeContext {
            graph: &mut fixture.graph,
            models: &fixture.models,
            naming: &fixture.naming,
            overrides: &fixture.overrides,
            diagnostics: &mut fixture.diagnostics,
        };
        let mut mode = Mode::Type(&mut cx);
        let path = FieldPath::root("page").child("data").child("align");
        let config = SelectConfig {
            options: vec!["left".to_string(), "right".to_string()],
            ..Default::default()
        };

        let result = select(&mut mode, &path, &config, None)
            .unwrap()
            .into_type_ref()
            .unwrap();
        assert_eq!(result, TypeRef::named("ContentPageDataAlignSelectType"));
        assert!(matches!(
            fixture.graph.get("ContentPageDataAlignSelectType"),
            Some(TypeNode::Enum { .. })
        ));
    }

    #[test]
    fn test_unknown_emits_one_opaque_type_and_diagnostic() {
        let mut fixture = TypeFixture::new();
        let mut cx = crate::traverse::context::TypeContext {
            graph: &mut fixture.graph,
            models: &fixture.models,
            naming: &fixture.naming,
            overrides: &fixture.overrides,
            diagnostics: &mut fixture.diagnostics,
        };
        let mut mode = Mode::Type(&mut cx);
        let path = FieldPath::root("page").child("data").child("widget");
        let field = UnknownField {
            kind: "HologramProjector".to_string(),
            raw: json!({"type": "HologramProjector"}),
        };

        unknown(&mut mode, &path, &field, None).unwrap();

        assert!(matches!(
            fixture.graph.get("ContentPageDataWidgetUnknownType"),
            Some(TypeNode::Opaque { .. })
        ));
        assert_eq!(fixture.diagnostics.len(), 1);
        assert_eq!(fixture.diagnostics[0].path, "page.data.widget");
        assert!(fixture.diagnostics[0].message.contains("HologramProjector"));
    }
}
