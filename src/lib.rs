//! contentfold — compiles CMS content models into a typed schema and
//! normalizes matching instance documents.
//!
//! One recursive traversal engine serves both passes: type mode derives and
//! registers type descriptors for a query layer, value mode resolves every
//! field of a document per its declared kind — links become lazy
//! cross-references, images become responsive rendering descriptors, rich
//! text becomes parallel text/HTML/source views, and slice zones become
//! ordered arrays of normalized sub-records with stable content-derived
//! identifiers.

pub mod compiler;
pub mod config;
pub mod digest;
pub mod error;
pub mod image;
pub mod model;
pub mod naming;
pub mod normalize;
pub mod traverse;
pub mod typegraph;

pub use compiler::{compile_models, CompiledSchema, CompilerPhase, SchemaCompiler};
pub use config::{
    DownloadFailurePolicy, DownloadPolicy, FieldOverride, FieldOverrides, FileDownloader,
    FileHandle, HtmlSerializer, LinkResolver, NamingOptions, NormalizerConfig,
};
pub use error::{Diagnostic, DiagnosticLevel, NormalizeError, Result};
pub use image::{
    ImageArgs, ImageDimensions, ImageFormat, ImageLayout, ImageResolver, ImageTransformDefaults,
    PlaceholderStrategy, ResolvedImage,
};
pub use model::{
    CustomTypeModel, FieldModel, ModelSet, SharedSliceModel, SliceVariation,
};
pub use naming::NameTransformer;
pub use normalize::{
    DocumentNormalizer, ExternalRecord, NormalizeOutput, NormalizedRecord, RawDocument,
};
pub use typegraph::{TypeGraph, TypeNode, TypeRef};
