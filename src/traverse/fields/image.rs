//! Image fields
//!
//! Value mode resolves the field into responsive rendering descriptors via
//! the image resolver, enqueues placeholder fetches as pending jobs, and
//! applies the same per-path download gating as link-to-media. Type mode
//! registers the canonical descriptor types once and derives a per-field
//! type only when the model declares named thumbnails.

use crate::error::{Diagnostic, Result};
use crate::image::placeholder::{mime_for_source, pending_marker, PlaceholderSlot};
use crate::image::{params, ImageArgs, ImageDimensions, PlaceholderJob, PlaceholderStrategy};
use crate::model::ImageFieldConfig;
use crate::traverse::context::{FieldPath, Mode, Traversed, ValueContext};
use crate::traverse::fields::link::download_local_file;
use crate::typegraph::{builtin, TypeGraph, TypeNode, TypeRef};
use log::warn;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub fn image(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    config: &ImageFieldConfig,
    value: Option<&Value>,
) -> Result<Traversed> {
    match mode {
        Mode::Type(cx) => {
            let prefix = cx.naming.type_prefix.clone();
            let dotted = path.dotted();
            register_descriptor_types(cx.graph, &prefix, &dotted)?;

            let mut fields = image_object_fields(&prefix);
            let name = if config.thumbnails.is_empty() {
                format!("{prefix}ImageType")
            } else {
                // Named thumbnails make the shape field-specific
                let thumbs_name = format!("{}ImageThumbnailsType", path.type_name(&prefix));
                let mut thumb_fields = BTreeMap::new();
                for thumbnail in &config.thumbnails {
                    thumb_fields.insert(
                        cx.naming.transformer.transform(&thumbnail.name),
                        TypeRef::named(format!("{prefix}ImageThumbnailType")),
                    );
                }
                cx.graph.register(
                    &thumbs_name,
                    TypeNode::Object {
                        fields: thumb_fields,
                    },
                    &dotted,
                )?;
                fields.insert("thumbnails".to_string(), TypeRef::named(thumbs_name));
                format!("{}ImageType", path.type_name(&prefix))
            };
            cx.graph
                .register(&name, TypeNode::Object { fields }, &dotted)?;
            Ok(Traversed::Type(TypeRef::named(name)))
        }
        Mode::Value(cx) => {
            let Some(payload) = value.and_then(Value::as_object) else {
                return Ok(Traversed::Value(Value::Null));
            };
            let Some(url) = payload.get("url").and_then(Value::as_str) else {
                return Ok(Traversed::Value(Value::Null));
            };

            let mut out = resolve_one(cx, path, payload, url)?;

            if !config.thumbnails.is_empty() {
                let mut thumbs = Map::new();
                for thumbnail in &config.thumbnails {
                    let key = cx.config.naming.transformer.transform(&thumbnail.name);
                    let resolved = payload
                        .get(&thumbnail.name)
                        .and_then(Value::as_object)
                        .and_then(|thumb| {
                            let url = thumb.get("url").and_then(Value::as_str)?;
                            resolve_thumbnail(cx, path, thumb, url)
                        })
                        .unwrap_or(Value::Null);
                    thumbs.insert(key, resolved);
                }
                if let Value::Object(map) = &mut out {
                    map.insert("thumbnails".to_string(), Value::Object(thumbs));
                }
            }

            Ok(Traversed::Value(out))
        }
    }
}

/// Resolve the main view of one image payload: url, descriptors, pending
/// placeholder markers, and the gated local file.
fn resolve_one(
    cx: &mut ValueContext<'_>,
    path: &FieldPath,
    payload: &Map<String, Value>,
    url: &str,
) -> Result<Value> {
    let dims = read_dimensions(payload);
    let resolver = cx.resolver;
    let args = ImageArgs::default();

    let mut out = Map::new();
    out.insert("alt".to_string(), field_or_null(payload, "alt"));
    out.insert("copyright".to_string(), field_or_null(payload, "copyright"));
    out.insert("dimensions".to_string(), field_or_null(payload, "dimensions"));

    let resolved = match dims {
        Some(dims) => resolver.resolve(url, dims, &args),
        // No usable dimensions: only the url can be resolved
        None => resolver.resolve_url(url, &args).map(|resolved_url| {
            crate::image::ResolvedImage {
                url: resolved_url,
                fixed: None,
                fluid: None,
                layout_data: None,
            }
        }),
    };
    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(err) => {
            warn!("image resolution failed at {}: {}", path.dotted(), err);
            cx.diagnostics.push(Diagnostic::warning(
                path.dotted(),
                format!("image resolution failed: {err}"),
            ));
            out.insert("url".to_string(), Value::String(url.to_string()));
            out.insert("local_file".to_string(), Value::Null);
            return Ok(Value::Object(out));
        }
    };

    out.insert("url".to_string(), Value::String(resolved.url.clone()));
    let mut fixed = resolved
        .fixed
        .map(|f| serde_json::to_value(f))
        .transpose()?
        .unwrap_or(Value::Null);
    let mut fluid = resolved
        .fluid
        .map(|f| serde_json::to_value(f))
        .transpose()?
        .unwrap_or(Value::Null);
    let mut layout_data = resolved.layout_data.unwrap_or(Value::Null);

    if let Some(dims) = dims {
        enqueue_placeholder(cx, url, dims, &mut fixed, &mut fluid, &mut layout_data)?;
    }

    out.insert("fixed".to_string(), fixed);
    out.insert("fluid".to_string(), fluid);
    out.insert("layout_data".to_string(), layout_data);

    let local_file = download_local_file(cx, path, Some(url), &Value::Object(payload.clone()))?;
    out.insert("local_file".to_string(), local_file);

    Ok(Value::Object(out))
}

/// Thumbnails carry the descriptor views but no placeholders or downloads.
fn resolve_thumbnail(
    cx: &mut ValueContext<'_>,
    path: &FieldPath,
    payload: &Map<String, Value>,
    url: &str,
) -> Option<Value> {
    let args = ImageArgs::default();
    let mut out = Map::new();
    out.insert("alt".to_string(), field_or_null(payload, "alt"));
    out.insert("copyright".to_string(), field_or_null(payload, "copyright"));
    out.insert("dimensions".to_string(), field_or_null(payload, "dimensions"));

    let resolved = match read_dimensions(payload) {
        Some(dims) => cx.resolver.resolve(url, dims, &args),
        None => cx.resolver.resolve_url(url, &args).map(|resolved_url| {
            crate::image::ResolvedImage {
                url: resolved_url,
                fixed: None,
                fluid: None,
                layout_data: None,
            }
        }),
    };
    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(err) => {
            cx.diagnostics.push(Diagnostic::warning(
                path.dotted(),
                format!("thumbnail resolution failed: {err}"),
            ));
            return None;
        }
    };

    out.insert("url".to_string(), Value::String(resolved.url));
    out.insert(
        "fixed".to_string(),
        resolved
            .fixed
            .and_then(|f| serde_json::to_value(f).ok())
            .unwrap_or(Value::Null),
    );
    out.insert(
        "fluid".to_string(),
        resolved
            .fluid
            .and_then(|f| serde_json::to_value(f).ok())
            .unwrap_or(Value::Null),
    );
    Some(Value::Object(out))
}

/// Enqueue the configured placeholder fetch and leave markers where the
/// outcome lands after the concurrent job pass.
fn enqueue_placeholder(
    cx: &mut ValueContext<'_>,
    url: &str,
    dims: ImageDimensions,
    fixed: &mut Value,
    fluid: &mut Value,
    layout_data: &mut Value,
) -> Result<()> {
    let strategy = cx.config.placeholder;
    if strategy == PlaceholderStrategy::None || params::is_svg(url) {
        return Ok(());
    }
    let id = cx.next_job_id();
    let fetch_url = match strategy {
        PlaceholderStrategy::DominantColor => cx.resolver.palette_url(url)?,
        PlaceholderStrategy::Blurred => cx.resolver.blur_url(url, dims)?,
        PlaceholderStrategy::None => unreachable!(),
    };
    cx.placeholder_jobs.push(PlaceholderJob {
        id,
        strategy,
        fetch_url,
        mime: mime_for_source(url),
    });

    match strategy {
        PlaceholderStrategy::DominantColor => {
            if let Value::Object(map) = layout_data {
                map.insert(
                    "background_color".to_string(),
                    pending_marker(id, PlaceholderSlot::BackgroundColor),
                );
            }
        }
        PlaceholderStrategy::Blurred => {
            if let Value::Object(map) = fixed {
                map.insert(
                    "base64".to_string(),
                    pending_marker(id, PlaceholderSlot::Base64),
                );
            }
            if let Value::Object(map) = fluid {
                map.insert(
                    "base64".to_string(),
                    pending_marker(id, PlaceholderSlot::Base64),
                );
            }
            if let Value::Object(map) = layout_data {
                map.insert(
                    "placeholder".to_string(),
                    pending_marker(id, PlaceholderSlot::LayoutFallback),
                );
            }
        }
        PlaceholderStrategy::None => {}
    }
    Ok(())
}

fn read_dimensions(payload: &Map<String, Value>) -> Option<ImageDimensions> {
    let dims = payload.get("dimensions")?;
    let width = dims.get("width")?.as_u64()? as u32;
    let height = dims.get("height")?.as_u64()? as u32;
    if width == 0 || height == 0 {
        return None;
    }
    Some(ImageDimensions { width, height })
}

fn field_or_null(payload: &Map<String, Value>, key: &str) -> Value {
    payload.get(key).cloned().unwrap_or(Value::Null)
}

/// Canonical descriptor types shared by every image field.
fn register_descriptor_types(graph: &mut TypeGraph, prefix: &str, at: &str) -> Result<()> {
    let mut dims = BTreeMap::new();
    dims.insert("width".to_string(), TypeRef::named(builtin::INT));
    dims.insert("height".to_string(), TypeRef::named(builtin::INT));
    graph.register(
        &format!("{prefix}ImageDimensionsType"),
        TypeNode::Object { fields: dims },
        at,
    )?;

    let mut fixed = srcset_fields();
    fixed.insert("width".to_string(), TypeRef::named(builtin::INT));
    fixed.insert("height".to_string(), TypeRef::named(builtin::INT));
    graph.register(
        &format!("{prefix}ImageFixedType"),
        TypeNode::Object { fields: fixed },
        at,
    )?;

    let mut fluid = srcset_fields();
    fluid.insert("aspect_ratio".to_string(), TypeRef::named(builtin::FLOAT));
    graph.register(
        &format!("{prefix}ImageFluidType"),
        TypeNode::Object { fields: fluid },
        at,
    )?;

    let mut thumbnail = BTreeMap::new();
    thumbnail.insert("alt".to_string(), TypeRef::named(builtin::STRING));
    thumbnail.insert("copyright".to_string(), TypeRef::named(builtin::STRING));
    thumbnail.insert("url".to_string(), TypeRef::named(builtin::STRING));
    thumbnail.insert(
        "dimensions".to_string(),
        TypeRef::named(format!("{prefix}ImageDimensionsType")),
    );
    thumbnail.insert(
        "fixed".to_string(),
        TypeRef::named(format!("{prefix}ImageFixedType")),
    );
    thumbnail.insert(
        "fluid".to_string(),
        TypeRef::named(format!("{prefix}ImageFluidType")),
    );
    graph.register(
        &format!("{prefix}ImageThumbnailType"),
        TypeNode::Object { fields: thumbnail },
        at,
    )?;

    Ok(())
}

fn srcset_fields() -> BTreeMap<String, TypeRef> {
    let mut fields = BTreeMap::new();
    fields.insert("base64".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("src".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("src_set".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("src_webp".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("src_set_webp".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("sizes".to_string(), TypeRef::named(builtin::STRING));
    fields
}

fn image_object_fields(prefix: &str) -> BTreeMap<String, TypeRef> {
    let mut fields = BTreeMap::new();
    fields.insert("alt".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("copyright".to_string(), TypeRef::named(builtin::STRING));
    fields.insert("url".to_string(), TypeRef::named(builtin::STRING));
    fields.insert(
        "dimensions".to_string(),
        TypeRef::named(format!("{prefix}ImageDimensionsType")),
    );
    fields.insert(
        "fixed".to_string(),
        TypeRef::named(format!("{prefix}ImageFixedType")),
    );
    fields.insert(
        "fluid".to_string(),
        TypeRef::named(format!("{prefix}ImageFluidType")),
    );
    fields.insert("layout_data".to_string(), TypeRef::named(builtin::JSON));
    fields.insert("local_file".to_string(), TypeRef::named(builtin::JSON));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldOverrides, NormalizerConfig};
    use crate::image::{ImageResolver, ImageTransformDefaults};
    use crate::model::{ImageThumbnail, ModelSet};
    use crate::normalize::ExternalRecord;
    use crate::traverse::context::TypeContext;
    use crate::config::NamingOptions;
    use serde_json::json;
    use std::time::Duration;

    fn run_value(
        config: &ImageFieldConfig,
        normalizer_config: &NormalizerConfig,
        value: &Value,
    ) -> (Value, Vec<PlaceholderJob>) {
        let models = ModelSet::new();
        let resolver =
            ImageResolver::new(ImageTransformDefaults::new(), Duration::from_secs(1)).unwrap();
        let mut diagnostics = Vec::new();
        let mut external_records: Vec<ExternalRecord> = Vec::new();
        let mut jobs = Vec::new();
        let normalized = {
            let mut cx = ValueContext::new(
                &models,
                normalizer_config,
                &resolver,
                None,
                None,
                None,
                None,
                &mut diagnostics,
                &mut external_records,
                &mut jobs,
            );
            let mut mode = Mode::Value(&mut cx);
            let path = FieldPath::root("page").child("data").child("image");
            image(&mut mode, &path, config, Some(value))
                .unwrap()
                .into_value()
                .unwrap()
        };
        (normalized, jobs)
    }

    fn payload() -> Value {
        json!({
            "url": "https://images.example.com/photo.png",
            "alt": "A photo",
            "copyright": null,
            "dimensions": {"width": 400, "height": 300}
        })
    }

    #[test]
    fn test_value_mode_resolves_descriptors() {
        let (normalized, jobs) = run_value(
            &ImageFieldConfig::default(),
            &NormalizerConfig::default(),
            &payload(),
        );

        assert!(normalized["url"].as_str().unwrap().contains("fit=max"));
        assert!(normalized["fixed"]["src"]
            .as_str()
            .unwrap()
            .contains("w=400&h=300"));
        assert_eq!(
            normalized["fluid"]["sizes"],
            "(min-width: 400px) 400px, 100vw"
        );
        assert_eq!(normalized["alt"], "A photo");
        assert_eq!(normalized["local_file"], Value::Null);
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_blurred_strategy_enqueues_one_job_with_markers() {
        let mut config = NormalizerConfig::default();
        config.placeholder = PlaceholderStrategy::Blurred;

        let (normalized, jobs) = run_value(&ImageFieldConfig::default(), &config, &payload());

        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].fetch_url.contains("w=20&h=15"));
        assert_eq!(jobs[0].mime, "image/png");
        assert!(normalized["fixed"]["base64"].is_object());
        assert!(normalized["fluid"]["base64"].is_object());
        assert!(normalized["layout_data"]["placeholder"].is_object());
    }

    #[test]
    fn test_dominant_color_strategy_targets_layout_data() {
        let mut config = NormalizerConfig::default();
        config.placeholder = PlaceholderStrategy::DominantColor;

        let (normalized, jobs) = run_value(&ImageFieldConfig::default(), &config, &payload());

        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].fetch_url.contains("palette=json"));
        assert!(normalized["layout_data"]["background_color"].is_object());
        assert!(normalized["fixed"].get("base64").is_none());
    }

    #[test]
    fn test_svg_skips_placeholders_and_variants() {
        let mut config = NormalizerConfig::default();
        config.placeholder = PlaceholderStrategy::Blurred;
        let value = json!({
            "url": "https://images.example.com/logo.svg",
            "dimensions": {"width": 100, "height": 100}
        });

        let (normalized, jobs) = run_value(&ImageFieldConfig::default(), &config, &value);

        assert!(jobs.is_empty());
        assert_eq!(normalized["fixed"], Value::Null);
        assert_eq!(normalized["fluid"], Value::Null);
    }

    #[test]
    fn test_empty_image_is_null() {
        let (normalized, _) = run_value(
            &ImageFieldConfig::default(),
            &NormalizerConfig::default(),
            &json!({}),
        );
        assert_eq!(normalized, Value::Null);
    }

    #[test]
    fn test_thumbnails_follow_the_declared_names() {
        let config = ImageFieldConfig {
            thumbnails: vec![ImageThumbnail {
                name: "Mobile".to_string(),
                width: Some(200),
                height: None,
            }],
            ..Default::default()
        };
        let value = json!({
            "url": "https://images.example.com/photo.png",
            "dimensions": {"width": 400, "height": 300},
            "Mobile": {
                "url": "https://images.example.com/photo.png?w=200",
                "dimensions": {"width": 200, "height": 150}
            }
        });

        let (normalized, _) = run_value(&config, &NormalizerConfig::default(), &value);
        assert!(normalized["thumbnails"]["Mobile"]["url"]
            .as_str()
            .unwrap()
            .contains("fit=max"));
    }

    #[test]
    fn test_type_mode_with_thumbnails_derives_field_specific_type() {
        let mut graph = crate::typegraph::TypeGraph::new();
        let models = ModelSet::new();
        let naming = NamingOptions::default();
        let overrides = FieldOverrides::new();
        let mut diagnostics = Vec::new();
        let mut cx = TypeContext {
            graph: &mut graph,
            models: &models,
            naming: &naming,
            overrides: &overrides,
            diagnostics: &mut diagnostics,
        };
        let mut mode = Mode::Type(&mut cx);
        let path = FieldPath::root("page").child("data").child("hero");

        let config = ImageFieldConfig {
            thumbnails: vec![ImageThumbnail {
                name: "mobile".to_string(),
                width: Some(200),
                height: None,
            }],
            ..Default::default()
        };
        let type_ref = image(&mut mode, &path, &config, None)
            .unwrap()
            .into_type_ref()
            .unwrap();

        assert_eq!(type_ref, TypeRef::named("ContentPageDataHeroImageType"));
        assert!(graph.contains("ContentPageDataHeroImageThumbnailsType"));
        assert!(graph.contains("ContentImageFixedType"));

        // A plain image elsewhere reuses the canonical type
        let mut cx = TypeContext {
            graph: &mut graph,
            models: &models,
            naming: &naming,
            overrides: &overrides,
            diagnostics: &mut diagnostics,
        };
        let mut mode = Mode::Type(&mut cx);
        let other = FieldPath::root("page").child("data").child("photo");
        let type_ref = image(&mut mode, &other, &ImageFieldConfig::default(), None)
            .unwrap()
            .into_type_ref()
            .unwrap();
        assert_eq!(type_ref, TypeRef::named("ContentImageType"));
    }
}
