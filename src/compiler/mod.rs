//! Schema compilation
//!
//! Drives the traversal engine in type mode once per model, then assembles
//! the all-document-types union. The compiler is an explicit value with a
//! three-phase lifecycle; its type graph is handed to the consumer on
//! compile and never mutated afterwards.

use crate::config::{FieldOverrides, NamingOptions};
use crate::error::{Diagnostic, NormalizeError, Result};
use crate::model::ModelSet;
use crate::naming::pascal_case;
use crate::traverse::{traverse_object, FieldPath, Mode, TypeContext};
use crate::typegraph::{builtin, TypeGraph, TypeNode, TypeRef};
use log::info;
use std::collections::BTreeMap;

/// Derived name of the document type for one custom type id.
#[must_use]
pub fn document_type_name(prefix: &str, type_id: &str) -> String {
    format!("{prefix}{}Type", pascal_case(type_id))
}

/// Derived name of the `data` object type for one custom type id.
#[must_use]
pub fn data_type_name(prefix: &str, type_id: &str) -> String {
    format!("{prefix}{}DataType", pascal_case(type_id))
}

/// Compiler lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerPhase {
    Idle,
    Registering,
    Compiled,
}

impl CompilerPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Registering => "Registering",
            Self::Compiled => "Compiled",
        }
    }
}

/// Output of one compilation pass.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    pub type_graph: TypeGraph,
    /// Name of the union over every registered document type
    pub all_document_types: String,
    /// The registered document type names, in registration order
    pub document_types: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles a model set into a type graph.
pub struct SchemaCompiler {
    phase: CompilerPhase,
    graph: TypeGraph,
    naming: NamingOptions,
    overrides: FieldOverrides,
    document_types: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl SchemaCompiler {
    #[must_use]
    pub fn new(naming: NamingOptions, overrides: FieldOverrides) -> Self {
        Self {
            phase: CompilerPhase::Idle,
            graph: TypeGraph::new(),
            naming,
            overrides,
            document_types: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> CompilerPhase {
        self.phase
    }

    /// Register every model in the set, running type-mode traversal per
    /// custom type. May be called repeatedly before `compile`.
    ///
    /// # Errors
    /// Returns `CompilerState` after `compile`, `SchemaConflict` when two
    /// different shapes land under one derived name.
    pub fn register_models(&mut self, models: &ModelSet) -> Result<()> {
        if self.phase == CompilerPhase::Compiled {
            return Err(NormalizeError::compiler_state(
                "Idle or Registering",
                self.phase.as_str(),
            ));
        }
        self.phase = CompilerPhase::Registering;

        for model in models.custom_types() {
            let prefix = self.naming.type_prefix.clone();
            let path = FieldPath::root(model.id.as_str());
            let data_path = path.child("data");
            let fields = model.flattened_fields();

            let data_ref = {
                let mut cx = TypeContext {
                    graph: &mut self.graph,
                    models,
                    naming: &self.naming,
                    overrides: &self.overrides,
                    diagnostics: &mut self.diagnostics,
                };
                let mut mode = Mode::Type(&mut cx);
                traverse_object(
                    &fields,
                    &data_path,
                    &data_type_name(&prefix, &model.id),
                    &mut mode,
                    None,
                )?
                .into_type_ref()?
            };

            let doc_name = document_type_name(&prefix, &model.id);
            let mut doc_fields = document_metadata_fields();
            doc_fields.insert("data".to_string(), data_ref);
            self.graph
                .register(&doc_name, TypeNode::Object { fields: doc_fields }, &path.dotted())?;
            if !self.document_types.contains(&doc_name) {
                self.document_types.push(doc_name.clone());
            }
            info!("registered model {} as {}", model.id, doc_name);
        }
        Ok(())
    }

    /// Assemble the all-document-types union and seal the pass.
    ///
    /// # Errors
    /// Returns `CompilerState` unless exactly one registration phase
    /// preceded this call.
    pub fn compile(&mut self) -> Result<CompiledSchema> {
        if self.phase != CompilerPhase::Registering {
            return Err(NormalizeError::compiler_state(
                "Registering",
                self.phase.as_str(),
            ));
        }

        let union_name = format!("{}AllDocumentTypes", self.naming.type_prefix);
        let mut members = self.document_types.clone();
        members.sort();
        self.graph
            .register(&union_name, TypeNode::Union { members }, "<document types>")?;
        self.phase = CompilerPhase::Compiled;

        info!(
            "compiled {} document types into {} graph nodes",
            self.document_types.len(),
            self.graph.len()
        );
        Ok(CompiledSchema {
            type_graph: self.graph.clone(),
            all_document_types: union_name,
            document_types: self.document_types.clone(),
            diagnostics: self.diagnostics.clone(),
        })
    }
}

/// One-shot compilation of a model set.
///
/// # Errors
/// Propagates registration and assembly errors unchanged.
pub fn compile_models(
    models: &ModelSet,
    naming: NamingOptions,
    overrides: FieldOverrides,
) -> Result<CompiledSchema> {
    let mut compiler = SchemaCompiler::new(naming, overrides);
    compiler.register_models(models)?;
    compiler.compile()
}

/// The fixed metadata fields shared by every document type. These keys are
/// never run through the name transformer.
fn document_metadata_fields() -> BTreeMap<String, TypeRef> {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("document_id".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("type".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("type_name".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("uid".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("lang".to_string(), TypeRef::named(builtin::STRING));
    fields.insert(
        "tags".to_string(),
        TypeRef::list(TypeRef::named(builtin::STRING)),
    );
    fields.insert(
        "first_publication_date".to_string(),
        TypeRef::named(builtin::DATE_TIME),
    );
    fields.insert(
        "last_publication_date".to_string(),
        TypeRef::named(builtin::DATE_TIME),
    );
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn models() -> ModelSet {
        ModelSet::from_values(
            &[
                json!({
                    "id": "page",
                    "json": {
                        "Main": {
                            "title": {"type": "StructuredText", "config": {"single": "heading1"}},
                            "published": {"type": "Boolean", "config": {}}
                        }
                    }
                }),
                json!({
                    "id": "post",
                    "json": {
                        "Main": {
                            "body": {"type": "StructuredText", "config": {"multi": "paragraph"}}
                        }
                    }
                }),
            ],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_compile_registers_document_types_and_union() {
        let schema = compile_models(
            &models(),
            NamingOptions::default(),
            FieldOverrides::new(),
        )
        .unwrap();

        assert!(schema.type_graph.contains("ContentPageType"));
        assert!(schema.type_graph.contains("ContentPageDataType"));
        assert!(schema.type_graph.contains("ContentPostType"));
        let TypeNode::Union { members } =
            schema.type_graph.get("ContentAllDocumentTypes").unwrap()
        else {
            panic!("expected union node");
        };
        assert_eq!(
            members,
            &vec!["ContentPageType".to_string(), "ContentPostType".to_string()]
        );

        let TypeNode::Object { fields } = schema.type_graph.get("ContentPageType").unwrap()
        else {
            panic!("expected object node");
        };
        assert_eq!(fields["data"], TypeRef::named("ContentPageDataType"));
        assert_eq!(fields["tags"], TypeRef::list(TypeRef::named(builtin::STRING)));
    }

    #[test]
    fn test_registering_twice_is_idempotent() {
        let mut compiler = SchemaCompiler::new(NamingOptions::default(), FieldOverrides::new());
        let models = models();
        compiler.register_models(&models).unwrap();
        compiler.register_models(&models).unwrap();
        let schema = compiler.compile().unwrap();
        assert_eq!(schema.document_types.len(), 2);
    }

    #[test]
    fn test_lifecycle_violations_are_errors() {
        let mut compiler = SchemaCompiler::new(NamingOptions::default(), FieldOverrides::new());

        // Compiling with nothing registered
        let err = compiler.compile().unwrap_err();
        assert!(matches!(err, NormalizeError::CompilerState { .. }));

        compiler.register_models(&models()).unwrap();
        compiler.compile().unwrap();

        // Registering after compile
        let err = compiler.register_models(&models()).unwrap_err();
        assert!(matches!(err, NormalizeError::CompilerState { .. }));

        // Compiling twice
        let err = compiler.compile().unwrap_err();
        assert!(matches!(err, NormalizeError::CompilerState { .. }));
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(document_type_name("Content", "blog_post"), "ContentBlogPostType");
        assert_eq!(data_type_name("Content", "blog_post"), "ContentBlogPostDataType");
    }
}
