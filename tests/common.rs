//! Common fixtures for integration tests
//!
//! One representative custom type exercising every field kind, one shared
//! slice with two variations, and a matching raw document.

#![allow(dead_code)]

use contentfold::{
    compile_models, CompiledSchema, DocumentNormalizer, ModelSet, NormalizerConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn page_model_json() -> Value {
    json!({
        "id": "page",
        "label": "Page",
        "json": {
            "Main": {
                "uid": {"type": "UID", "config": {}},
                "title": {"type": "StructuredText", "config": {"single": "heading1"}},
                "published": {"type": "Boolean", "config": {}},
                "rating": {"type": "Number", "config": {}},
                "location": {"type": "GeoPoint", "config": {}},
                "image": {"type": "Image", "config": {}},
                "related": {"type": "Link", "config": {"select": "document", "customtypes": ["page"]}},
                "attachment": {"type": "Link", "config": {"select": "media"}},
                "video": {"type": "Embed", "config": {}},
                "gallery": {"type": "Group", "config": {"fields": {
                    "caption": {"type": "StructuredText", "config": {"multi": "paragraph"}},
                    "featured": {"type": "Boolean", "config": {}}
                }}},
                "body": {"type": "Slices", "config": {"choices": {
                    "foo": {
                        "type": "Slice",
                        "non-repeat": {
                            "heading": {"type": "StructuredText", "config": {"single": "heading2"}}
                        },
                        "repeat": {
                            "label": {"type": "Boolean", "config": {}}
                        }
                    },
                    "bar": {
                        "type": "Slice",
                        "non-repeat": {
                            "quote_text": {"type": "StructuredText", "config": {"multi": "paragraph"}}
                        },
                        "repeat": {}
                    },
                    "quote": {"type": "SharedSlice"}
                }}}
            },
            "SEO": {
                "align": {"type": "Select", "config": {"options": ["left", "right"], "default_value": "left"}},
                "widget": {"type": "HologramProjector", "config": {"beam": 12}}
            }
        }
    })
}

pub fn quote_slice_json() -> Value {
    json!({
        "id": "quote",
        "name": "Quote",
        "variations": [
            {
                "id": "default",
                "primary": {
                    "text": {"type": "StructuredText", "config": {"multi": "paragraph"}}
                },
                "items": {}
            },
            {
                "id": "pull",
                "primary": {
                    "text": {"type": "StructuredText", "config": {"multi": "paragraph"}},
                    "attribution": {"type": "StructuredText", "config": {"single": "paragraph"}}
                },
                "items": {}
            }
        ]
    })
}

pub fn model_set() -> ModelSet {
    ModelSet::from_values(&[page_model_json()], &[quote_slice_json()]).unwrap()
}

pub fn raw_page_document() -> Value {
    json!({
        "id": "W9x2Qh",
        "uid": "welcome",
        "type": "page",
        "lang": "en-us",
        "tags": ["featured"],
        "first_publication_date": "2021-03-04T05:06:07+00:00",
        "last_publication_date": "2021-04-05T06:07:08+00:00",
        "data": {
            "title": [{"type": "heading1", "text": "Welcome", "spans": []}],
            "published": true,
            "rating": 4.5,
            "location": {"latitude": 48.85, "longitude": 2.35},
            "image": {
                "url": "https://example.com/image.png",
                "alt": "Snapshot",
                "copyright": null,
                "dimensions": {"width": 400, "height": 300}
            },
            "related": {
                "link_type": "Document",
                "id": "abc123",
                "type": "page",
                "uid": "about",
                "isBroken": false
            },
            "attachment": {
                "link_type": "Media",
                "url": "https://example.com/files/report.pdf",
                "name": "report.pdf"
            },
            "video": {
                "embed_url": "https://video.example/watch?v=42",
                "type": "video",
                "title": "A talk"
            },
            "gallery": [
                {"caption": [{"type": "paragraph", "text": "One", "spans": []}], "featured": true},
                {"caption": [{"type": "paragraph", "text": "Two", "spans": []}], "featured": false}
            ],
            "body": [
                {
                    "slice_type": "foo",
                    "slice_label": null,
                    "primary": {
                        "heading": [{"type": "heading2", "text": "First", "spans": []}]
                    },
                    "items": [{"label": true}]
                },
                {
                    "slice_type": "bar",
                    "primary": {
                        "quote_text": [{"type": "paragraph", "text": "Quoted.", "spans": []}]
                    },
                    "items": []
                },
                {
                    "slice_type": "quote",
                    "variation": "default",
                    "primary": {
                        "text": [{"type": "paragraph", "text": "Shared.", "spans": []}]
                    }
                }
            ],
            "align": "left",
            "widget": {"beam": 12}
        }
    })
}

pub struct CommonTestFixture {
    pub models: Arc<ModelSet>,
    pub schema: CompiledSchema,
    pub normalizer: DocumentNormalizer,
}

impl CommonTestFixture {
    pub fn new() -> Self {
        Self::with_config(NormalizerConfig::default())
    }

    pub fn with_config(config: NormalizerConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let models = Arc::new(model_set());
        let schema = compile_models(&models, config.naming.clone(), config.overrides.clone())
            .expect("fixture models compile");
        let normalizer = DocumentNormalizer::new(Arc::clone(&models), config)
            .expect("fixture normalizer builds");
        Self {
            models,
            schema,
            normalizer,
        }
    }
}
