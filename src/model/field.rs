//! Field-kind models
//!
//! `FieldModel` is the closed tagged union over every field kind a content
//! model can declare. The wire format is open-ended and evolves faster than
//! engine releases, so deserialization never fails on an unrecognized kind:
//! anything outside the known repertoire lands in `Unknown` with the raw
//! definition preserved. Known kinds with a malformed `config` are a model
//! defect and do fail.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Closed union over all declarable field kinds.
///
/// Every dispatch site matches exhaustively, so adding a variant is a
/// compile-time-visible event at each of them.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldModel {
    Boolean(ScalarConfig),
    Color(ScalarConfig),
    Date(ScalarConfig),
    Embed(ScalarConfig),
    GeoPoint(ScalarConfig),
    Image(ImageFieldConfig),
    IntegrationFields(IntegrationConfig),
    Link(LinkConfig),
    Number(ScalarConfig),
    RichText(RichTextConfig),
    Select(SelectConfig),
    Timestamp(ScalarConfig),
    Uid(ScalarConfig),
    Group(GroupConfig),
    SliceZone(SliceZoneConfig),
    Unknown(UnknownField),
}

/// Shared config shape for scalar-valued kinds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScalarConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Declared width/height constraint on an image field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageConstraint {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A named thumbnail sub-model on an image field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageThumbnail {
    pub name: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageFieldConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<ImageConstraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thumbnails: Vec<ImageThumbnail>,
}

/// Which targets a link field may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSelect {
    /// Any web, document, or media target
    Any,
    /// Documents only (a content relationship)
    Document,
    /// Media-library files only
    Media,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    /// Optional target-type constraint for content relationships
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub customtypes: Vec<String>,
}

impl LinkConfig {
    /// The declared target repertoire, defaulting to any.
    #[must_use]
    pub fn select(&self) -> LinkSelect {
        match self.select.as_deref() {
            Some("document") => LinkSelect::Document,
            Some("media") => LinkSelect::Media,
            _ => LinkSelect::Any,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RichTextConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Comma-separated block types allowed for a single-block field (titles)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single: Option<String>,
    /// Comma-separated block types allowed for a multi-block field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi: Option<String>,
}

impl RichTextConfig {
    /// Whether this field is constrained to a single block (a title).
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.single.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Affects the editing UI only; the value type stays nullable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldModel>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntegrationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Name of the external catalog this field draws from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SliceZoneConfig {
    #[serde(default)]
    pub choices: BTreeMap<String, SliceChoice>,
}

/// One declarable block kind inside a slice zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SliceChoice {
    /// A slice declared inline in the zone
    #[serde(rename = "Slice")]
    Inline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fieldset: Option<String>,
        #[serde(rename = "non-repeat", default)]
        primary: BTreeMap<String, FieldModel>,
        #[serde(default)]
        repeat: BTreeMap<String, FieldModel>,
    },
    /// A reference to a shared slice; resolved by the choice key
    #[serde(rename = "SharedSlice")]
    SharedRef {},
}

/// An unrecognized field kind, carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownField {
    pub kind: String,
    pub raw: Value,
}

impl FieldModel {
    /// Parse a raw field definition, dispatching on its `"type"` discriminator.
    ///
    /// Unrecognized discriminators yield `Unknown`; a recognized kind with a
    /// malformed config is an error.
    pub fn from_raw(raw: Value) -> std::result::Result<Self, String> {
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let config = raw
            .get("config")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        fn cfg<T: DeserializeOwned>(kind: &str, config: Value) -> std::result::Result<T, String> {
            serde_json::from_value(config)
                .map_err(|e| format!("invalid {kind} field config: {e}"))
        }

        Ok(match kind.as_str() {
            "Boolean" => Self::Boolean(cfg(&kind, config)?),
            "Color" => Self::Color(cfg(&kind, config)?),
            "Date" => Self::Date(cfg(&kind, config)?),
            "Embed" => Self::Embed(cfg(&kind, config)?),
            "GeoPoint" => Self::GeoPoint(cfg(&kind, config)?),
            "Image" => Self::Image(cfg(&kind, config)?),
            "IntegrationFields" => Self::IntegrationFields(cfg(&kind, config)?),
            "Link" => Self::Link(cfg(&kind, config)?),
            "Number" => Self::Number(cfg(&kind, config)?),
            "StructuredText" => Self::RichText(cfg(&kind, config)?),
            "Select" => Self::Select(cfg(&kind, config)?),
            "Timestamp" => Self::Timestamp(cfg(&kind, config)?),
            "UID" => Self::Uid(cfg(&kind, config)?),
            "Group" => Self::Group(cfg(&kind, config)?),
            "Slices" => Self::SliceZone(cfg(&kind, config)?),
            _ => Self::Unknown(UnknownField { kind, raw }),
        })
    }

    /// The wire discriminator for this kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Color(_) => "Color",
            Self::Date(_) => "Date",
            Self::Embed(_) => "Embed",
            Self::GeoPoint(_) => "GeoPoint",
            Self::Image(_) => "Image",
            Self::IntegrationFields(_) => "IntegrationFields",
            Self::Link(_) => "Link",
            Self::Number(_) => "Number",
            Self::RichText(_) => "StructuredText",
            Self::Select(_) => "Select",
            Self::Timestamp(_) => "Timestamp",
            Self::Uid(_) => "UID",
            Self::Group(_) => "Group",
            Self::SliceZone(_) => "Slices",
            Self::Unknown(u) => &u.kind,
        }
    }
}

impl<'de> Deserialize<'de> for FieldModel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Self::from_raw(raw).map_err(serde::de::Error::custom)
    }
}

impl Serialize for FieldModel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        fn wire<S: Serializer, C: Serialize>(
            serializer: S,
            kind: &str,
            config: &C,
        ) -> std::result::Result<S::Ok, S::Error> {
            let mut map = serde_json::Map::new();
            map.insert("type".to_string(), Value::String(kind.to_string()));
            let config = serde_json::to_value(config).map_err(serde::ser::Error::custom)?;
            map.insert("config".to_string(), config);
            Value::Object(map).serialize(serializer)
        }

        match self {
            Self::Boolean(c)
            | Self::Color(c)
            | Self::Date(c)
            | Self::Embed(c)
            | Self::GeoPoint(c)
            | Self::Number(c)
            | Self::Timestamp(c)
            | Self::Uid(c) => wire(serializer, self.kind(), c),
            Self::Image(c) => wire(serializer, self.kind(), c),
            Self::IntegrationFields(c) => wire(serializer, self.kind(), c),
            Self::Link(c) => wire(serializer, self.kind(), c),
            Self::RichText(c) => wire(serializer, self.kind(), c),
            Self::Select(c) => wire(serializer, self.kind(), c),
            Self::Group(c) => wire(serializer, self.kind(), c),
            Self::SliceZone(c) => wire(serializer, self.kind(), c),
            Self::Unknown(u) => u.raw.serialize(serializer),
        }
    }
}
