//! Responsive image resolution
//!
//! Given a base URL on the image transform endpoint plus source dimensions,
//! synthesizes fixed, fluid, and arbitrary-layout rendering descriptors.
//! Everything except placeholder extraction is pure URL query-parameter
//! algebra; the two placeholder strategies each cost one bounded, best-effort
//! HTTP GET.

pub mod params;
pub mod placeholder;

use crate::error::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub use params::{ImageTransformDefaults, DEFAULT_BREAKPOINTS, DEFAULT_FIXED_WIDTH, DEFAULT_FLUID_MAX_WIDTH};
pub use placeholder::{PlaceholderJob, PlaceholderOutcome};

/// Placeholder rendered while the full image loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStrategy {
    /// No placeholder
    #[default]
    None,
    /// A solid color extracted from the image palette
    DominantColor,
    /// A tiny aspect-correct variant inlined as a data URI
    Blurred,
}

/// Output formats a variant source set can be requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Webp,
    Avif,
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Query-parameter value on the transform endpoint.
    #[must_use]
    pub fn param(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// Layout mode for the arbitrary-layout descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageLayout {
    /// Exact pixel dimensions, density-laddered
    Fixed,
    /// Scales down from a maximum width
    #[default]
    Constrained,
    /// Spans the full viewport width
    FullWidth,
}

impl ImageLayout {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Constrained => "constrained",
            Self::FullWidth => "fullWidth",
        }
    }
}

/// Source pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Call-site arguments for one resolution.
#[derive(Debug, Clone, Default)]
pub struct ImageArgs {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub aspect_ratio: Option<f64>,
    /// Replaces the default width ladder entirely
    pub breakpoints: Option<Vec<u32>>,
    /// Overrides the synthesized `sizes` attribute
    pub sizes: Option<String>,
    pub layout: ImageLayout,
    /// Extra formats to emit source sets for, beyond the untouched fallback
    pub formats: Vec<ImageFormat>,
    /// Call-site transform parameters, highest layering precedence
    pub params: BTreeMap<String, String>,
}

impl ImageArgs {
    fn requested_formats(&self) -> Vec<ImageFormat> {
        if self.formats.is_empty() {
            vec![ImageFormat::Webp]
        } else {
            self.formats.clone()
        }
    }
}

/// Fixed-layout descriptor: exact dimensions, pixel-density source set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedImage {
    pub width: u32,
    pub height: u32,
    pub src: String,
    pub src_set: String,
    pub src_webp: String,
    pub src_set_webp: String,
    pub sizes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

/// Fluid-layout descriptor: width ladder scaled to the container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidImage {
    pub aspect_ratio: f64,
    pub src: String,
    pub src_set: String,
    pub src_webp: String,
    pub src_set_webp: String,
    pub sizes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

/// All descriptors for one image field.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedImage {
    pub url: String,
    pub fixed: Option<FixedImage>,
    pub fluid: Option<FluidImage>,
    pub layout_data: Option<Value>,
}

/// Resolves responsive variants against the image transform endpoint.
///
/// Stateless apart from the HTTP client used for placeholder extraction;
/// safe to share across concurrent normalization passes.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    client: reqwest::Client,
    defaults: ImageTransformDefaults,
    timeout: Duration,
}

impl ImageResolver {
    /// Create a resolver with runtime parameter defaults and a per-call
    /// placeholder timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(defaults: ImageTransformDefaults, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            defaults,
            timeout,
        })
    }

    #[must_use]
    pub fn defaults(&self) -> &ImageTransformDefaults {
        &self.defaults
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the full-size URL with layered parameters and no dimensions.
    pub fn resolve_url(&self, base: &str, args: &ImageArgs) -> Result<String> {
        if params::is_svg(base) {
            return params::build_svg_url(base);
        }
        let layered = params::layer_params(&self.defaults, &args.params);
        params::build_url(base, &layered, None)
    }

    /// Resolve the fixed-layout descriptor.
    pub fn resolve_fixed(
        &self,
        base: &str,
        dims: ImageDimensions,
        args: &ImageArgs,
    ) -> Result<FixedImage> {
        let layered = params::layer_params(&self.defaults, &args.params);
        let target_w = args.width.unwrap_or(DEFAULT_FIXED_WIDTH).min(dims.width);
        let target_h = match (args.height, args.aspect_ratio) {
            (Some(h), _) => h,
            (None, Some(ratio)) => params::height_for_ratio(target_w, ratio),
            (None, None) => params::height_for(target_w, dims.width, dims.height),
        };

        let src = params::build_url(base, &layered, Some((target_w, target_h)))?;
        let mut webp = layered.clone();
        webp.insert("fm".to_string(), ImageFormat::Webp.param().to_string());
        let src_webp = params::build_url(base, &webp, Some((target_w, target_h)))?;

        let ladder = params::density_ladder(target_w, dims.width);
        let mut src_set = Vec::with_capacity(ladder.len());
        let mut src_set_webp = Vec::with_capacity(ladder.len());
        for (density, width) in &ladder {
            let height = params::height_for(*width, target_w, target_h);
            src_set.push(format!(
                "{} {}x",
                params::build_url(base, &layered, Some((*width, height)))?,
                density
            ));
            src_set_webp.push(format!(
                "{} {}x",
                params::build_url(base, &webp, Some((*width, height)))?,
                density
            ));
        }

        Ok(FixedImage {
            width: target_w,
            height: target_h,
            src,
            src_set: src_set.join(",\n"),
            src_webp,
            src_set_webp: src_set_webp.join(",\n"),
            sizes: args.sizes.clone().unwrap_or_else(|| format!("{target_w}px")),
            base64: None,
        })
    }

    /// Resolve the fluid-layout descriptor.
    pub fn resolve_fluid(
        &self,
        base: &str,
        dims: ImageDimensions,
        args: &ImageArgs,
    ) -> Result<FluidImage> {
        let layered = params::layer_params(&self.defaults, &args.params);
        let max_w = args.width.unwrap_or(DEFAULT_FLUID_MAX_WIDTH).min(dims.width);
        let aspect_ratio = args
            .aspect_ratio
            .unwrap_or_else(|| f64::from(dims.width) / f64::from(dims.height.max(1)));
        let max_h = params::height_for_ratio(max_w, aspect_ratio);

        let src = params::build_url(base, &layered, Some((max_w, max_h)))?;
        let mut webp = layered.clone();
        webp.insert("fm".to_string(), ImageFormat::Webp.param().to_string());
        let src_webp = params::build_url(base, &webp, Some((max_w, max_h)))?;

        let breakpoints = args
            .breakpoints
            .clone()
            .unwrap_or_else(|| DEFAULT_BREAKPOINTS.to_vec());
        let ladder = params::fluid_ladder(&breakpoints, dims.width);
        let mut src_set = Vec::with_capacity(ladder.len());
        let mut src_set_webp = Vec::with_capacity(ladder.len());
        for width in &ladder {
            let height = params::height_for_ratio(*width, aspect_ratio);
            src_set.push(format!(
                "{} {}w",
                params::build_url(base, &layered, Some((*width, height)))?,
                width
            ));
            src_set_webp.push(format!(
                "{} {}w",
                params::build_url(base, &webp, Some((*width, height)))?,
                width
            ));
        }

        Ok(FluidImage {
            aspect_ratio,
            src,
            src_set: src_set.join(",\n"),
            src_webp,
            src_set_webp: src_set_webp.join(",\n"),
            sizes: args
                .sizes
                .clone()
                .unwrap_or_else(|| format!("(min-width: {max_w}px) {max_w}px, 100vw")),
            base64: None,
        })
    }

    /// Resolve the arbitrary-layout descriptor for the requested layout mode.
    pub fn resolve_layout_data(
        &self,
        base: &str,
        dims: ImageDimensions,
        args: &ImageArgs,
    ) -> Result<Value> {
        let layered = params::layer_params(&self.defaults, &args.params);
        let formats = args.requested_formats();

        let (display_w, display_h, entries, sizes) = match args.layout {
            ImageLayout::Fixed => {
                let fixed = self.resolve_fixed(base, dims, args)?;
                let ladder = params::density_ladder(fixed.width, dims.width);
                let entries: Vec<(u32, u32, String)> = ladder
                    .into_iter()
                    .map(|(density, width)| {
                        let height = params::height_for(width, fixed.width, fixed.height);
                        (width, height, format!("{density}x"))
                    })
                    .collect();
                (fixed.width, fixed.height, entries, fixed.sizes)
            }
            ImageLayout::Constrained | ImageLayout::FullWidth => {
                let max_w = args.width.unwrap_or(DEFAULT_FLUID_MAX_WIDTH).min(dims.width);
                let aspect_ratio = args
                    .aspect_ratio
                    .unwrap_or_else(|| f64::from(dims.width) / f64::from(dims.height.max(1)));
                let breakpoints = args
                    .breakpoints
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BREAKPOINTS.to_vec());
                let entries: Vec<(u32, u32, String)> =
                    params::fluid_ladder(&breakpoints, dims.width)
                        .into_iter()
                        .map(|width| {
                            let height = params::height_for_ratio(width, aspect_ratio);
                            (width, height, format!("{width}w"))
                        })
                        .collect();
                let sizes = args.sizes.clone().unwrap_or_else(|| match args.layout {
                    ImageLayout::FullWidth => "100vw".to_string(),
                    _ => format!("(min-width: {max_w}px) {max_w}px, 100vw"),
                });
                (max_w, params::height_for_ratio(max_w, aspect_ratio), entries, sizes)
            }
        };

        let mut sources = Vec::with_capacity(formats.len());
        for format in &formats {
            let mut format_params = layered.clone();
            format_params.insert("fm".to_string(), format.param().to_string());
            let mut srcset = Vec::with_capacity(entries.len());
            for (width, height, descriptor) in &entries {
                srcset.push(format!(
                    "{} {}",
                    params::build_url(base, &format_params, Some((*width, *height)))?,
                    descriptor
                ));
            }
            sources.push(json!({
                "srcset": srcset.join(",\n"),
                "sizes": sizes,
                "type": format.mime(),
            }));
        }

        let mut fallback_srcset = Vec::with_capacity(entries.len());
        for (width, height, descriptor) in &entries {
            fallback_srcset.push(format!(
                "{} {}",
                params::build_url(base, &layered, Some((*width, *height)))?,
                descriptor
            ));
        }

        Ok(json!({
            "layout": args.layout.as_str(),
            "width": display_w,
            "height": display_h,
            "images": {
                "sources": sources,
                "fallback": {
                    "src": params::build_url(base, &layered, Some((display_w, display_h)))?,
                    "srcset": fallback_srcset.join(",\n"),
                    "sizes": sizes,
                },
            },
        }))
    }

    /// Resolve every descriptor for one image field.
    ///
    /// SVG sources take no transform parameters: only `url` is resolved.
    pub fn resolve(
        &self,
        base: &str,
        dims: ImageDimensions,
        args: &ImageArgs,
    ) -> Result<ResolvedImage> {
        if params::is_svg(base) {
            debug!("svg source, skipping variant synthesis: {}", base);
            return Ok(ResolvedImage {
                url: params::build_svg_url(base)?,
                fixed: None,
                fluid: None,
                layout_data: None,
            });
        }

        Ok(ResolvedImage {
            url: self.resolve_url(base, args)?,
            fixed: Some(self.resolve_fixed(base, dims, args)?),
            fluid: Some(self.resolve_fluid(base, dims, args)?),
            layout_data: Some(self.resolve_layout_data(base, dims, args)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ImageResolver {
        ImageResolver::new(ImageTransformDefaults::new(), Duration::from_secs(5)).unwrap()
    }

    fn dims() -> ImageDimensions {
        ImageDimensions {
            width: 400,
            height: 300,
        }
    }

    #[test]
    fn test_fixed_defaults_use_source_dimensions() {
        let fixed = resolver()
            .resolve_fixed("https://images.example.com/photo.png", dims(), &ImageArgs::default())
            .unwrap();

        assert_eq!(fixed.width, 400);
        assert_eq!(fixed.height, 300);
        assert!(fixed.src.contains("w=400&h=300"));
        assert!(fixed.src_webp.contains("fm=webp"));
        assert_eq!(fixed.sizes, "400px");
    }

    #[test]
    fn test_fluid_ladder_and_sizes() {
        let fluid = resolver()
            .resolve_fluid("https://images.example.com/photo.png", dims(), &ImageArgs::default())
            .unwrap();

        assert_eq!(fluid.sizes, "(min-width: 400px) 400px, 100vw");
        let widths: Vec<&str> = fluid
            .src_set
            .lines()
            .map(|line| line.trim_end_matches(',').rsplit(' ').next().unwrap())
            .collect();
        assert_eq!(widths, vec!["100w", "200w", "400w"]);
        assert!(fluid.src_set.contains("w=100&h=75"));
        assert!(fluid.src_set.contains("w=200&h=150"));
        assert!((fluid.aspect_ratio - 400.0 / 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_layered_params_reach_every_variant() {
        let resolver = ImageResolver::new(
            ImageTransformDefaults::new().with_param("sat", "-100").with_param("q", "80"),
            Duration::from_secs(5),
        )
        .unwrap();
        let mut args = ImageArgs::default();
        args.params.insert("sat".to_string(), "50".to_string());

        let fixed = resolver
            .resolve_fixed("https://images.example.com/photo.png", dims(), &args)
            .unwrap();
        assert!(fixed.src.contains("sat=50"));
        assert!(!fixed.src.contains("sat=-100"));
        assert!(fixed.src.contains("q=80"));
    }

    #[test]
    fn test_explicit_breakpoints_replace_ladder() {
        let mut args = ImageArgs::default();
        args.breakpoints = Some(vec![120, 240]);
        let fluid = resolver()
            .resolve_fluid("https://images.example.com/photo.png", dims(), &args)
            .unwrap();
        assert!(fluid.src_set.contains("w=120"));
        assert!(fluid.src_set.contains("w=240"));
        assert!(!fluid.src_set.contains("w=100&"));
    }

    #[test]
    fn test_aspect_ratio_recomputes_height() {
        let mut args = ImageArgs::default();
        args.aspect_ratio = Some(2.0);
        let fluid = resolver()
            .resolve_fluid("https://images.example.com/photo.png", dims(), &args)
            .unwrap();
        assert!(fluid.src_set.contains("w=100&h=50"));
        assert!(fluid.src_set.contains("w=200&h=100"));
    }

    #[test]
    fn test_svg_resolves_url_only() {
        let resolved = resolver()
            .resolve("https://images.example.com/logo.svg", dims(), &ImageArgs::default())
            .unwrap();
        assert!(resolved.fixed.is_none());
        assert!(resolved.fluid.is_none());
        assert!(resolved.layout_data.is_none());
        assert!(!resolved.url.contains("fit="));
        assert!(!resolved.url.contains("w="));
    }

    #[test]
    fn test_layout_data_full_width_sizes() {
        let mut args = ImageArgs::default();
        args.layout = ImageLayout::FullWidth;
        let data = resolver()
            .resolve_layout_data("https://images.example.com/photo.png", dims(), &args)
            .unwrap();
        assert_eq!(data["layout"], "fullWidth");
        assert_eq!(data["images"]["fallback"]["sizes"], "100vw");
        assert_eq!(data["images"]["sources"][0]["type"], "image/webp");
    }
}
