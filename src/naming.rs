//! Field-key and type-name transformation
//!
//! CMS field keys may contain characters that are not legal in a query-layer
//! identifier. The transformer maps every field key to a schema-safe form
//! before it is used as a type or record key; fixed document metadata keys
//! are never transformed.

use std::fmt;
use std::sync::Arc;

/// Signature of a pluggable key-transformation rule.
///
/// Returning `None` falls through to the default substitution rule.
pub type TransformFn = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Maps CMS field keys to schema-safe identifiers.
///
/// The default rule substitutes every character outside `[A-Za-z0-9_]` with
/// an underscore and prefixes keys that start with a digit. A custom rule
/// can be installed and is consulted first; per-field overrides from the
/// field-override bag take precedence over both.
#[derive(Clone, Default)]
pub struct NameTransformer {
    custom: Option<Arc<TransformFn>>,
}

impl NameTransformer {
    #[must_use]
    pub fn new() -> Self {
        Self { custom: None }
    }

    /// Install a custom transformation rule consulted before the default.
    #[must_use]
    pub fn with_rule<F>(rule: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            custom: Some(Arc::new(rule)),
        }
    }

    /// Transform a field key into a schema-safe identifier.
    #[must_use]
    pub fn transform(&self, key: &str) -> String {
        if let Some(rule) = &self.custom {
            if let Some(name) = rule(key) {
                return name;
            }
        }
        default_transform(key)
    }
}

impl fmt::Debug for NameTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameTransformer")
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Default substitution rule: non-identifier characters become underscores,
/// a leading digit is prefixed with an underscore.
#[must_use]
pub fn default_transform(key: &str) -> String {
    let mut out: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.chars().next().is_some_and(|c| c.is_numeric()) {
        out.insert(0, '_');
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// Convert a key into PascalCase for use inside derived type names.
///
/// Splits on any non-alphanumeric character and capitalizes each segment,
/// so `"hero-banner"` and `"hero_banner"` both become `"HeroBanner"`.
#[must_use]
pub fn pascal_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper_next = true;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if upper_next {
                out.extend(c.to_uppercase());
                upper_next = false;
            } else {
                out.push(c);
            }
        } else {
            upper_next = true;
        }
    }
    out
}
