//! Image-transform URL algebra
//!
//! Responsive variants are synthesized purely through query parameters on
//! the image transform endpoint. Parameter layering, lowest to highest
//! precedence: built-in defaults, runtime-configured defaults, call-site
//! arguments. Width and height are always recomputed per variant and never
//! survive from the source URL.

use crate::error::{NormalizeError, Result};
use reqwest::Url;
use std::collections::BTreeMap;

/// Default width ladder for fluid variants.
pub const DEFAULT_BREAKPOINTS: [u32; 5] = [100, 200, 400, 800, 1600];

/// Default target width for fixed-layout variants.
pub const DEFAULT_FIXED_WIDTH: u32 = 400;

/// Default maximum width for fluid-layout variants.
pub const DEFAULT_FLUID_MAX_WIDTH: u32 = 800;

/// Width of the tiny variant fetched for blurred placeholders.
pub const BLUR_WIDTH: u32 = 20;

/// Runtime-configured default transform parameters.
///
/// Layered above the built-in defaults and below call-site arguments; the
/// same layering applies independently to full-size and placeholder URLs.
#[derive(Debug, Clone, Default)]
pub struct ImageTransformDefaults {
    pub params: BTreeMap<String, String>,
}

impl ImageTransformDefaults {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Parameters every resolved URL starts from.
fn builtin_params() -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("fit".to_string(), "max".to_string());
    params
}

/// Merge the three parameter layers in precedence order.
#[must_use]
pub fn layer_params(
    defaults: &ImageTransformDefaults,
    call: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = builtin_params();
    for (key, value) in &defaults.params {
        merged.insert(key.clone(), value.clone());
    }
    for (key, value) in call {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Whether the source is an SVG, which takes no transform parameters.
#[must_use]
pub fn is_svg(base: &str) -> bool {
    match Url::parse(base) {
        Ok(url) => url.path().to_ascii_lowercase().ends_with(".svg"),
        Err(_) => base.split('?').next().unwrap_or("").to_ascii_lowercase().ends_with(".svg"),
    }
}

/// Decode a possibly double-encoded path component until it is stable.
fn decode_path(path: &str) -> String {
    let mut current = path.to_string();
    for _ in 0..2 {
        match urlencoding::decode(&current) {
            Ok(decoded) if decoded != current => current = decoded.into_owned(),
            _ => break,
        }
    }
    current
}

/// Build a variant URL from a base, a layered parameter set, and optional
/// recomputed dimensions.
///
/// The source URL's own query parameters survive unless overridden by the
/// layered set; its `w`/`h` never survive. Dimensions, when given, are
/// appended last as `w` then `h`.
///
/// # Errors
/// Returns `OperationFailed` when the base URL does not parse.
pub fn build_url(
    base: &str,
    params: &BTreeMap<String, String>,
    dims: Option<(u32, u32)>,
) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| NormalizeError::operation_failed("parse image url", e.to_string()))?;

    let decoded = decode_path(url.path());
    url.set_path(&decoded);

    let existing: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &existing {
            if key != "w" && key != "h" && !params.contains_key(key) {
                pairs.append_pair(key, value);
            }
        }
        for (key, value) in params {
            if key != "w" && key != "h" {
                pairs.append_pair(key, value);
            }
        }
        if let Some((w, h)) = dims {
            pairs.append_pair("w", &w.to_string());
            pairs.append_pair("h", &h.to_string());
        }
    }
    Ok(url.to_string())
}

/// Re-encode an SVG source URL without touching its parameters.
pub fn build_svg_url(base: &str) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| NormalizeError::operation_failed("parse image url", e.to_string()))?;
    let decoded = decode_path(url.path());
    url.set_path(&decoded);
    Ok(url.to_string())
}

/// The fluid width ladder: breakpoints clipped to the source width.
#[must_use]
pub fn fluid_ladder(breakpoints: &[u32], source_width: u32) -> Vec<u32> {
    let mut ladder: Vec<u32> = breakpoints
        .iter()
        .copied()
        .filter(|w| *w <= source_width)
        .collect();
    if ladder.is_empty() {
        ladder.push(source_width);
    }
    ladder
}

/// The fixed density ladder: 1x/2x/3x capped at source resolution.
#[must_use]
pub fn density_ladder(width: u32, source_width: u32) -> Vec<(u32, u32)> {
    let mut ladder: Vec<(u32, u32)> = [1u32, 2, 3]
        .iter()
        .filter(|d| width * **d <= source_width)
        .map(|d| (*d, width * d))
        .collect();
    if ladder.is_empty() {
        ladder.push((1, width.min(source_width)));
    }
    ladder
}

/// Height for a variant width, preserving the base aspect ratio.
#[must_use]
pub fn height_for(width: u32, base_width: u32, base_height: u32) -> u32 {
    if base_width == 0 {
        return base_height;
    }
    (f64::from(width) * f64::from(base_height) / f64::from(base_width)).round() as u32
}

/// Height for a variant width under an explicit aspect ratio.
#[must_use]
pub fn height_for_ratio(width: u32, aspect_ratio: f64) -> u32 {
    if aspect_ratio <= 0.0 {
        return 0;
    }
    (f64::from(width) / aspect_ratio).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layering_precedence() {
        let defaults = ImageTransformDefaults::new()
            .with_param("sat", "-100")
            .with_param("q", "80");
        let mut call = BTreeMap::new();
        call.insert("sat".to_string(), "50".to_string());

        let merged = layer_params(&defaults, &call);
        assert_eq!(merged["sat"], "50");
        assert_eq!(merged["q"], "80");
        assert_eq!(merged["fit"], "max");
    }

    #[test]
    fn test_build_url_recomputes_dimensions() {
        let params = layer_params(&ImageTransformDefaults::new(), &BTreeMap::new());
        let url = build_url(
            "https://images.example.com/photo.png?w=9999&h=9999&auto=compress",
            &params,
            Some((400, 300)),
        )
        .unwrap();

        assert!(url.contains("w=400&h=300"));
        assert!(!url.contains("9999"));
        assert!(url.contains("auto=compress"));
        assert!(url.contains("fit=max"));
    }

    #[test]
    fn test_source_params_survive_unless_overridden() {
        let mut call = BTreeMap::new();
        call.insert("auto".to_string(), "format".to_string());
        let params = layer_params(&ImageTransformDefaults::new(), &call);
        let url = build_url(
            "https://images.example.com/photo.png?auto=compress&rect=0,0,10,10",
            &params,
            None,
        )
        .unwrap();

        assert!(url.contains("auto=format"));
        assert!(!url.contains("auto=compress"));
        assert!(url.contains("rect="));
    }

    #[test]
    fn test_double_encoded_path_is_normalized() {
        let url = build_url(
            "https://images.example.com/a%2520file.png",
            &BTreeMap::new(),
            None,
        )
        .unwrap();
        assert!(url.contains("a%20file.png"));
    }

    #[test]
    fn test_fluid_ladder_clips_to_source() {
        assert_eq!(fluid_ladder(&DEFAULT_BREAKPOINTS, 400), vec![100, 200, 400]);
        assert_eq!(fluid_ladder(&DEFAULT_BREAKPOINTS, 2000), vec![100, 200, 400, 800, 1600]);
        // A source narrower than every breakpoint still gets one entry
        assert_eq!(fluid_ladder(&DEFAULT_BREAKPOINTS, 50), vec![50]);
    }

    #[test]
    fn test_density_ladder_caps_at_source() {
        assert_eq!(density_ladder(400, 1600), vec![(1, 400), (2, 800), (3, 1200)]);
        assert_eq!(density_ladder(400, 900), vec![(1, 400), (2, 800)]);
        assert_eq!(density_ladder(400, 400), vec![(1, 400)]);
    }

    #[test]
    fn test_height_preserves_ratio() {
        assert_eq!(height_for(100, 400, 300), 75);
        assert_eq!(height_for(200, 400, 300), 150);
        assert_eq!(height_for_ratio(300, 1.5), 200);
    }

    #[test]
    fn test_svg_detection() {
        assert!(is_svg("https://images.example.com/logo.svg"));
        assert!(is_svg("https://images.example.com/logo.SVG?x=1"));
        assert!(!is_svg("https://images.example.com/photo.png"));
    }
}
