//! Normalizer configuration and injected collaborators
//!
//! Configuration is constructed by the embedding application and handed in
//! whole; nothing is read from disk or the environment. Collaborators are
//! the callback seams: link resolution, HTML serialization, and delegated
//! file downloads.

use crate::error::Result;
use crate::image::{ImageTransformDefaults, PlaceholderStrategy};
use crate::naming::NameTransformer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Options shared by schema compilation and document normalization.
///
/// Both passes must derive identical type names, so they consume one value.
#[derive(Debug, Clone)]
pub struct NamingOptions {
    /// Prefix for every derived type name
    pub type_prefix: String,
    /// Field-key transformation rule
    pub transformer: NameTransformer,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            type_prefix: "Content".to_string(),
            transformer: NameTransformer::new(),
        }
    }
}

/// What to do when a delegated file download fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadFailurePolicy {
    /// Leave the field null and finish the pass
    #[default]
    NullField,
    /// Abort the document's normalization with the field's dot-path
    Fail,
}

/// Per-field gate for delegated downloads.
#[derive(Clone)]
pub enum DownloadPolicy {
    Always,
    Never,
    /// Predicate over the raw field value
    When(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl DownloadPolicy {
    #[must_use]
    pub fn allows(&self, field: &Value) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::When(predicate) => predicate(field),
        }
    }
}

impl fmt::Debug for DownloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::Never => write!(f, "Never"),
            Self::When(_) => write!(f, "When(<predicate>)"),
        }
    }
}

/// Per-field settings applied at one dot-path.
#[derive(Debug, Clone, Default)]
pub struct FieldOverride {
    /// Download gate for link-to-media and image fields
    pub download: Option<DownloadPolicy>,
    /// Record/type key to use instead of the transformed field key
    pub name: Option<String>,
}

/// Override bag keyed by `"{type}.data.{field}"` dot-paths.
#[derive(Debug, Clone, Default)]
pub struct FieldOverrides {
    entries: HashMap<String, FieldOverride>,
}

impl FieldOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: FieldOverride) {
        self.entries.insert(path.into(), entry);
    }

    /// Set the download gate at a dot-path, keeping other settings.
    pub fn set_download(&mut self, path: impl Into<String>, policy: DownloadPolicy) {
        self.entries.entry(path.into()).or_default().download = Some(policy);
    }

    /// Set a name override at a dot-path, keeping other settings.
    pub fn set_name(&mut self, path: impl Into<String>, name: impl Into<String>) {
        self.entries.entry(path.into()).or_default().name = Some(name.into());
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FieldOverride> {
        self.entries.get(path)
    }

    /// Whether downloads are enabled at this path (default: disabled).
    #[must_use]
    pub fn download_allowed(&self, path: &str, field: &Value) -> bool {
        self.get(path)
            .and_then(|entry| entry.download.as_ref())
            .is_some_and(|policy| policy.allows(field))
    }
}

/// Configuration for one normalizer instance.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub naming: NamingOptions,
    /// Runtime-configured defaults layered under call-site image parameters
    pub image: ImageTransformDefaults,
    /// Placeholder strategy applied to image fields
    pub placeholder: PlaceholderStrategy,
    /// Timeout for each placeholder HTTP call, in seconds
    pub placeholder_timeout_seconds: u64,
    pub download_failure_policy: DownloadFailurePolicy,
    pub overrides: FieldOverrides,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            naming: NamingOptions::default(),
            image: ImageTransformDefaults::default(),
            placeholder: PlaceholderStrategy::None,
            placeholder_timeout_seconds: 5,
            download_failure_policy: DownloadFailurePolicy::NullField,
            overrides: FieldOverrides::new(),
        }
    }
}

impl NormalizerConfig {
    #[must_use]
    pub fn placeholder_timeout(&self) -> Duration {
        Duration::from_secs(self.placeholder_timeout_seconds)
    }
}

/// Resolves a link target to a URL. Returning `None` declines, falling back
/// to the URL carried by the payload itself.
pub trait LinkResolver: Send + Sync {
    fn resolve(&self, target: &Value) -> Option<String>;
}

impl<F> LinkResolver for F
where
    F: Fn(&Value) -> Option<String> + Send + Sync,
{
    fn resolve(&self, target: &Value) -> Option<String> {
        self(target)
    }
}

/// Serializes one rich-text block to HTML. Returning `None` falls through
/// to the built-in serializer for that block.
pub trait HtmlSerializer: Send + Sync {
    fn serialize(&self, block: &Value) -> Option<String>;
}

impl<F> HtmlSerializer for F
where
    F: Fn(&Value) -> Option<String> + Send + Sync,
{
    fn serialize(&self, block: &Value) -> Option<String> {
        self(block)
    }
}

/// Handle to a file fetched by the download collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHandle {
    /// Stable identifier for the downloaded file
    pub id: String,
    /// Local path, when the collaborator materializes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// The source URL the file was fetched from
    pub url: String,
}

/// Fetches a remote file; invoked only when the per-path policy allows it.
pub trait FileDownloader: Send + Sync {
    fn download(&self, url: &str) -> Result<FileHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_download_disabled_by_default() {
        let overrides = FieldOverrides::new();
        assert!(!overrides.download_allowed("page.data.file", &json!({})));
    }

    #[test]
    fn test_download_policy_variants() {
        let mut overrides = FieldOverrides::new();
        overrides.set_download("page.data.file", DownloadPolicy::Always);
        overrides.set_download("page.data.skip", DownloadPolicy::Never);
        overrides.set_download(
            "page.data.maybe",
            DownloadPolicy::When(Arc::new(|field| field["kind"] == "document")),
        );

        assert!(overrides.download_allowed("page.data.file", &json!({})));
        assert!(!overrides.download_allowed("page.data.skip", &json!({})));
        assert!(overrides.download_allowed("page.data.maybe", &json!({"kind": "document"})));
        assert!(!overrides.download_allowed("page.data.maybe", &json!({"kind": "image"})));
    }

    #[test]
    fn test_name_override() {
        let mut overrides = FieldOverrides::new();
        overrides.set_name("page.data.hero-banner", "banner");
        assert_eq!(
            overrides.get("page.data.hero-banner").unwrap().name.as_deref(),
            Some("banner")
        );
    }

    #[test]
    fn test_closure_link_resolver() {
        let resolver = |target: &Value| {
            target["uid"]
                .as_str()
                .map(|uid| format!("/articles/{uid}"))
        };
        assert_eq!(
            LinkResolver::resolve(&resolver, &json!({"uid": "welcome"})),
            Some("/articles/welcome".to_string())
        );
        assert_eq!(LinkResolver::resolve(&resolver, &json!({})), None);
    }
}
