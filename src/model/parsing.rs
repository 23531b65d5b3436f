//! Parsing raw model definitions
//!
//! Converts the JSON definitions supplied by the model source into typed
//! models, with the structural validation that makes later passes safe:
//! non-empty identifiers, at least one variation per shared slice, no
//! duplicate model ids in one set.

use crate::error::{NormalizeError, Result};
use crate::model::types::{CustomTypeModel, ModelSet, SharedSliceModel};
use serde_json::Value;

/// Parse one custom-type definition.
///
/// # Errors
/// Returns `InvalidModel` if the definition does not deserialize or its id
/// is empty.
pub fn parse_custom_type(raw: &Value) -> Result<CustomTypeModel> {
    let model: CustomTypeModel = serde_json::from_value(raw.clone())
        .map_err(|e| NormalizeError::invalid_model("<custom type>", e.to_string()))?;
    if model.id.is_empty() {
        return Err(NormalizeError::invalid_model(
            "<custom type>",
            "custom type id must not be empty",
        ));
    }
    Ok(model)
}

/// Parse one custom-type definition from a JSON string.
pub fn parse_custom_type_str(raw: &str) -> Result<CustomTypeModel> {
    let value: Value = serde_json::from_str(raw)?;
    parse_custom_type(&value)
}

/// Parse one shared-slice definition.
///
/// # Errors
/// Returns `InvalidModel` if the definition does not deserialize, its id is
/// empty, it declares no variations, or a variation id is empty.
pub fn parse_shared_slice(raw: &Value) -> Result<SharedSliceModel> {
    let model: SharedSliceModel = serde_json::from_value(raw.clone())
        .map_err(|e| NormalizeError::invalid_model("<shared slice>", e.to_string()))?;
    if model.id.is_empty() {
        return Err(NormalizeError::invalid_model(
            "<shared slice>",
            "shared slice id must not be empty",
        ));
    }
    if model.variations.is_empty() {
        return Err(NormalizeError::invalid_model(
            &model.id,
            "shared slice must declare at least one variation",
        ));
    }
    for variation in &model.variations {
        if variation.id.is_empty() {
            return Err(NormalizeError::invalid_model(
                &model.id,
                "shared slice variation id must not be empty",
            ));
        }
    }
    Ok(model)
}

/// Parse one shared-slice definition from a JSON string.
pub fn parse_shared_slice_str(raw: &str) -> Result<SharedSliceModel> {
    let value: Value = serde_json::from_str(raw)?;
    parse_shared_slice(&value)
}

impl ModelSet {
    /// Build a model set from raw definitions.
    ///
    /// # Errors
    /// Returns `InvalidModel` on any parse failure or duplicate id.
    pub fn from_values(custom_types: &[Value], shared_slices: &[Value]) -> Result<Self> {
        let mut set = ModelSet::new();
        for raw in custom_types {
            let model = parse_custom_type(raw)?;
            if set.custom_type(&model.id).is_some() {
                return Err(NormalizeError::invalid_model(
                    &model.id,
                    "duplicate custom type id",
                ));
            }
            set.insert_custom_type(model);
        }
        for raw in shared_slices {
            let model = parse_shared_slice(raw)?;
            if set.shared_slice(&model.id).is_some() {
                return Err(NormalizeError::invalid_model(
                    &model.id,
                    "duplicate shared slice id",
                ));
            }
            set.insert_shared_slice(model);
        }
        Ok(set)
    }
}
