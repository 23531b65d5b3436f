pub mod field;
pub mod parsing;
pub mod types;

pub use field::{
    FieldModel, GroupConfig, ImageConstraint, ImageFieldConfig, ImageThumbnail,
    IntegrationConfig, LinkConfig, LinkSelect, RichTextConfig, ScalarConfig, SelectConfig,
    SliceChoice, SliceZoneConfig, UnknownField,
};
pub use parsing::{
    parse_custom_type, parse_custom_type_str, parse_shared_slice, parse_shared_slice_str,
};
pub use types::{CustomTypeModel, FieldMap, ModelSet, SharedSliceModel, SliceVariation};
