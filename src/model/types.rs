//! Content-model tree types
//!
//! A model set is static for the lifetime of a build: custom types describe
//! whole documents, shared slices describe reusable blocks referenced from
//! slice zones across document types. Field maps are ordered maps so every
//! derived artifact is deterministic.

use crate::model::field::FieldModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered mapping of field key to field model.
pub type FieldMap = BTreeMap<String, FieldModel>;

/// Schema definition for one document type.
///
/// Tabs partition fields for the editing UI only; traversal flattens them
/// into a single field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTypeModel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "json", default)]
    pub tabs: BTreeMap<String, FieldMap>,
}

impl CustomTypeModel {
    /// Iterate all fields across tabs.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldModel)> {
        self.tabs.values().flat_map(|tab| tab.iter())
    }

    /// Collect all fields across tabs into one map.
    ///
    /// Duplicate keys across tabs keep the last occurrence.
    #[must_use]
    pub fn flattened_fields(&self) -> FieldMap {
        self.fields()
            .map(|(key, field)| (key.clone(), field.clone()))
            .collect()
    }
}

/// A reusable, independently versioned block shared across document types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedSliceModel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub variations: Vec<SliceVariation>,
}

impl SharedSliceModel {
    /// Find a variation by its id.
    #[must_use]
    pub fn variation(&self, id: &str) -> Option<&SliceVariation> {
        self.variations.iter().find(|v| v.id == id)
    }
}

/// One variation of a shared slice, with separate primary and items field maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceVariation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub primary: FieldMap,
    #[serde(default)]
    pub items: FieldMap,
}

/// The immutable model set one build compiles and normalizes against.
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    custom_types: BTreeMap<String, CustomTypeModel>,
    shared_slices: BTreeMap<String, SharedSliceModel>,
}

impl ModelSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_custom_type(&mut self, model: CustomTypeModel) {
        self.custom_types.insert(model.id.clone(), model);
    }

    pub fn insert_shared_slice(&mut self, model: SharedSliceModel) {
        self.shared_slices.insert(model.id.clone(), model);
    }

    #[must_use]
    pub fn custom_type(&self, id: &str) -> Option<&CustomTypeModel> {
        self.custom_types.get(id)
    }

    #[must_use]
    pub fn shared_slice(&self, id: &str) -> Option<&SharedSliceModel> {
        self.shared_slices.get(id)
    }

    pub fn custom_types(&self) -> impl Iterator<Item = &CustomTypeModel> {
        self.custom_types.values()
    }

    pub fn shared_slices(&self) -> impl Iterator<Item = &SharedSliceModel> {
        self.shared_slices.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.custom_types.is_empty() && self.shared_slices.is_empty()
    }
}
