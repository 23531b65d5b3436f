//! Repeating groups
//!
//! A group is an ordered list of sub-records sharing one nested field map.
//! Type mode derives a single object type for the element shape and wraps
//! it in a list; value mode runs the full recursion once per element.

use crate::error::Result;
use crate::model::GroupConfig;
use crate::traverse::context::{FieldPath, Mode, Traversed};
use crate::traverse::traverse_object;
use crate::typegraph::TypeRef;
use serde_json::Value;

pub fn group(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    config: &GroupConfig,
    value: Option<&Value>,
) -> Result<Traversed> {
    let type_name = format!("{}GroupType", path.type_name(mode.prefix()));
    match mode {
        Mode::Type(_) => {
            let element = traverse_object(&config.fields, path, &type_name, mode, None)?
                .into_type_ref()?;
            Ok(Traversed::Type(TypeRef::list(element)))
        }
        Mode::Value(_) => {
            let elements = value.and_then(Value::as_array).cloned().unwrap_or_default();
            let mut out = Vec::with_capacity(elements.len());
            for (index, element) in elements.iter().enumerate() {
                let element_path = path.child(index.to_string());
                let normalized =
                    traverse_object(&config.fields, &element_path, &type_name, mode, Some(element))?
                        .into_value()?;
                out.push(normalized);
            }
            Ok(Traversed::Value(Value::Array(out)))
        }
    }
}
