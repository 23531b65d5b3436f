//! Placeholder extraction
//!
//! Both strategies cost one extra HTTP GET against the transform endpoint:
//! dominant color asks for a palette JSON, blurred fetches a tiny
//! aspect-correct variant and inlines it as a data URI. Both are best-effort:
//! a failure or timeout drops the placeholder and never fails the pass.
//!
//! Traversal is synchronous, so image handlers enqueue jobs and leave marker
//! objects in the emitted value; after traversal the normalizer runs all
//! jobs concurrently and the markers are replaced (or removed) in place.

use crate::error::Result;
use crate::image::{params, ImageDimensions, ImageResolver, PlaceholderStrategy};
use base64::{engine::general_purpose, Engine as _};
use futures::future::join_all;
use log::warn;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Marker key left in emitted values where a placeholder result belongs.
pub(crate) const PENDING_KEY: &str = "__pending_placeholder";

/// Where a resolved placeholder lands relative to its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderSlot {
    /// A data-URI string (fixed/fluid `base64`)
    Base64,
    /// The layout descriptor's placeholder object
    LayoutFallback,
    /// The layout descriptor's background color string
    BackgroundColor,
}

impl PlaceholderSlot {
    fn as_str(self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::LayoutFallback => "fallback",
            Self::BackgroundColor => "color",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "base64" => Some(Self::Base64),
            "fallback" => Some(Self::LayoutFallback),
            "color" => Some(Self::BackgroundColor),
            _ => None,
        }
    }
}

/// One pending placeholder fetch.
#[derive(Debug, Clone)]
pub struct PlaceholderJob {
    pub id: usize,
    pub strategy: PlaceholderStrategy,
    pub fetch_url: String,
    /// MIME type for the data URI when the strategy is blurred
    pub mime: String,
}

/// Result of one placeholder fetch.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderOutcome {
    pub data_uri: Option<String>,
    pub color: Option<String>,
}

/// Build a marker object for a job/slot pair.
pub(crate) fn pending_marker(id: usize, slot: PlaceholderSlot) -> Value {
    json!({ PENDING_KEY: id, "slot": slot.as_str() })
}

fn as_marker(value: &Value) -> Option<(usize, PlaceholderSlot)> {
    let map = value.as_object()?;
    let id = map.get(PENDING_KEY)?.as_u64()? as usize;
    let slot = PlaceholderSlot::from_str(map.get("slot")?.as_str()?)?;
    Some((id, slot))
}

/// MIME type inferred from the source URL's extension, for blurred data URIs.
#[must_use]
pub fn mime_for_source(base: &str) -> String {
    let path = base.split('?').next().unwrap_or("").to_ascii_lowercase();
    let mime = if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".avif") {
        "image/avif"
    } else {
        "image/jpeg"
    };
    mime.to_string()
}

impl ImageResolver {
    /// URL of the palette-extraction request for a source image.
    pub fn palette_url(&self, base: &str) -> Result<String> {
        let mut call = BTreeMap::new();
        call.insert("palette".to_string(), "json".to_string());
        let layered = params::layer_params(self.defaults(), &call);
        params::build_url(base, &layered, None)
    }

    /// URL of the tiny aspect-correct variant fetched for blurring.
    pub fn blur_url(&self, base: &str, dims: ImageDimensions) -> Result<String> {
        let layered = params::layer_params(self.defaults(), &BTreeMap::new());
        let width = params::BLUR_WIDTH.min(dims.width.max(1));
        let height = params::height_for(width, dims.width.max(1), dims.height);
        params::build_url(base, &layered, Some((width, height)))
    }

    /// Fetch the dominant color from a palette request. Best-effort.
    pub async fn fetch_dominant_color(&self, url: &str) -> Option<String> {
        let response = self.client().get(url).send().await.ok()?;
        let body: Value = response.json().await.ok()?;
        body.pointer("/dominant_colors/vibrant/hex")
            .or_else(|| body.pointer("/dominant_colors/muted/hex"))
            .or_else(|| body.pointer("/colors/0/hex"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Fetch a tiny variant and inline it as a data URI. Best-effort.
    pub async fn fetch_blurred(&self, url: &str, mime: &str) -> Option<String> {
        let response = self.client().get(url).send().await.ok()?;
        let bytes = response.bytes().await.ok()?;
        Some(format!(
            "data:{};base64,{}",
            mime,
            general_purpose::STANDARD.encode(&bytes)
        ))
    }

    async fn run_job(&self, job: &PlaceholderJob) -> Option<PlaceholderOutcome> {
        match job.strategy {
            PlaceholderStrategy::None => None,
            PlaceholderStrategy::DominantColor => self
                .fetch_dominant_color(&job.fetch_url)
                .await
                .map(|color| PlaceholderOutcome {
                    color: Some(color),
                    data_uri: None,
                }),
            PlaceholderStrategy::Blurred => self
                .fetch_blurred(&job.fetch_url, &job.mime)
                .await
                .map(|uri| PlaceholderOutcome {
                    data_uri: Some(uri),
                    color: None,
                }),
        }
    }

    /// Run all pending jobs concurrently, each under its own timeout.
    ///
    /// A failed or timed-out job is simply absent from the result map; its
    /// markers are removed when outcomes are applied.
    pub async fn run_placeholder_jobs(
        &self,
        jobs: &[PlaceholderJob],
        timeout: Duration,
    ) -> HashMap<usize, PlaceholderOutcome> {
        let futures = jobs.iter().map(|job| async move {
            match tokio::time::timeout(timeout, self.run_job(job)).await {
                Ok(Some(outcome)) => Some((job.id, outcome)),
                Ok(None) => {
                    warn!("placeholder fetch failed for {}", job.fetch_url);
                    None
                }
                Err(_) => {
                    warn!("placeholder fetch timed out for {}", job.fetch_url);
                    None
                }
            }
        });
        join_all(futures).await.into_iter().flatten().collect()
    }
}

/// Replace every pending marker in `data` with its outcome, removing the
/// key when the job produced nothing.
pub fn apply_outcomes(data: &mut Value, outcomes: &HashMap<usize, PlaceholderOutcome>) {
    match data {
        Value::Object(map) => {
            let mut pending: Vec<(String, Option<Value>)> = Vec::new();
            for (key, value) in map.iter_mut() {
                if let Some((id, slot)) = as_marker(value) {
                    pending.push((key.clone(), resolve_slot(outcomes.get(&id), slot)));
                } else {
                    apply_outcomes(value, outcomes);
                }
            }
            for (key, replacement) in pending {
                match replacement {
                    Some(value) => {
                        map.insert(key, value);
                    }
                    None => {
                        map.remove(&key);
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                apply_outcomes(item, outcomes);
            }
        }
        _ => {}
    }
}

fn resolve_slot(outcome: Option<&PlaceholderOutcome>, slot: PlaceholderSlot) -> Option<Value> {
    let outcome = outcome?;
    match slot {
        PlaceholderSlot::Base64 => outcome.data_uri.clone().map(Value::String),
        PlaceholderSlot::LayoutFallback => outcome
            .data_uri
            .clone()
            .map(|uri| json!({ "fallback": uri })),
        PlaceholderSlot::BackgroundColor => outcome.color.clone().map(Value::String),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageTransformDefaults;

    fn resolver() -> ImageResolver {
        ImageResolver::new(ImageTransformDefaults::new(), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_palette_url() {
        let url = resolver()
            .palette_url("https://images.example.com/photo.png?auto=compress")
            .unwrap();
        assert!(url.contains("palette=json"));
        assert!(url.contains("auto=compress"));
        assert!(!url.contains("w="));
    }

    #[test]
    fn test_blur_url_is_tiny_and_aspect_correct() {
        let url = resolver()
            .blur_url(
                "https://images.example.com/photo.png",
                ImageDimensions {
                    width: 400,
                    height: 300,
                },
            )
            .unwrap();
        assert!(url.contains("w=20&h=15"));
    }

    #[test]
    fn test_mime_for_source() {
        assert_eq!(mime_for_source("https://x.example/a.png?w=3"), "image/png");
        assert_eq!(mime_for_source("https://x.example/a.jpg"), "image/jpeg");
        assert_eq!(mime_for_source("https://x.example/a"), "image/jpeg");
    }

    #[test]
    fn test_apply_outcomes_fills_and_removes() {
        let mut data = json!({
            "image": {
                "fixed": { "src": "x", "base64": pending_marker(1, PlaceholderSlot::Base64) },
                "fluid": { "src": "x", "base64": pending_marker(2, PlaceholderSlot::Base64) },
                "layout_data": { "background_color": pending_marker(1, PlaceholderSlot::BackgroundColor) }
            }
        });

        let mut outcomes = HashMap::new();
        outcomes.insert(
            1,
            PlaceholderOutcome {
                data_uri: Some("data:image/png;base64,AAAA".to_string()),
                color: Some("#336699".to_string()),
            },
        );
        // Job 2 failed: no outcome

        apply_outcomes(&mut data, &outcomes);

        assert_eq!(data["image"]["fixed"]["base64"], "data:image/png;base64,AAAA");
        assert_eq!(data["image"]["layout_data"]["background_color"], "#336699");
        assert!(data["image"]["fluid"].get("base64").is_none());
        // Untouched siblings survive
        assert_eq!(data["image"]["fluid"]["src"], "x");
    }
}
