//! Typed schema description for the query layer
//!
//! The type graph is an explicit compiler value, built once per compilation
//! pass and handed to the consumer; there is no process-wide registry.
//! Inserts are idempotent per derived name: re-registering an identical node
//! is a no-op, registering a different shape under an existing name is a
//! contract violation surfaced with the dot-path of the second registration.

use crate::error::{NormalizeError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names of the built-in scalar types every graph starts with.
pub mod builtin {
    pub const BOOLEAN: &str = "Boolean";
    pub const STRING: &str = "String";
    pub const INT: &str = "Int";
    pub const FLOAT: &str = "Float";
    pub const DATE: &str = "Date";
    pub const DATE_TIME: &str = "DateTime";
    /// Raw passthrough values with no declared structure
    pub const JSON: &str = "Json";

    pub const ALL: [&str; 7] = [BOOLEAN, STRING, INT, FLOAT, DATE, DATE_TIME, JSON];
}

/// Reference to a type by name, possibly wrapped in list nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
}

impl TypeRef {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    #[must_use]
    pub fn list(inner: Self) -> Self {
        Self::List(Box::new(inner))
    }

    /// The innermost named type.
    #[must_use]
    pub fn base_name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) => inner.base_name(),
        }
    }
}

/// One node of the type graph.
///
/// All field types are nullable; required-ness is not modeled because every
/// content field may legitimately be absent from an instance document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeNode {
    /// A record type with named fields
    Object { fields: BTreeMap<String, TypeRef> },
    /// A tagged choice over object types, resolved by the value's type tag
    Union { members: Vec<String> },
    /// A closed set of string values
    Enum { values: Vec<String> },
    /// A built-in leaf type
    Scalar,
    /// A record resolved from an external system at read time, keyed by
    /// the named field of the normalized value
    External { key_field: String },
    /// An unrecognized field kind, typed opaquely and passed through
    Opaque { kind: String },
}

/// Type-name → descriptor map produced by a compilation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeGraph {
    nodes: BTreeMap<String, TypeNode>,
}

impl TypeGraph {
    /// Create a graph pre-seeded with the built-in scalars.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        for name in builtin::ALL {
            nodes.insert(name.to_string(), TypeNode::Scalar);
        }
        Self { nodes }
    }

    /// Register a node under a derived name.
    ///
    /// Idempotent: inserting an identical node again is a no-op.
    ///
    /// # Errors
    /// Returns `SchemaConflict` when `name` is already bound to a different
    /// shape; `path` names the registration site for triage.
    pub fn register(&mut self, name: &str, node: TypeNode, path: &str) -> Result<()> {
        match self.nodes.get(name) {
            None => {
                debug!("registering type {} (from {})", name, path);
                self.nodes.insert(name.to_string(), node);
                Ok(())
            }
            Some(existing) if *existing == node => Ok(()),
            Some(_) => Err(NormalizeError::schema_conflict(name, path)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeNode> {
        self.nodes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeNode)> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
