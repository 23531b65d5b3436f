//! Rich text and title fields
//!
//! Normalized into parallel views: plain text, serialized HTML, and the
//! untouched structured block array (twice, as `rich_text` and `raw`).
//! `text` and `html` are null, never empty strings, when the field holds no
//! content. An injected serializer is consulted per block before the
//! built-in one.

use crate::config::{HtmlSerializer, LinkResolver};
use crate::error::Result;
use crate::model::RichTextConfig;
use crate::traverse::context::{FieldPath, Mode, Traversed};
use crate::typegraph::{builtin, TypeNode, TypeRef};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub fn rich_text(
    mode: &mut Mode<'_, '_>,
    path: &FieldPath,
    _config: &RichTextConfig,
    value: Option<&Value>,
) -> Result<Traversed> {
    match mode {
        Mode::Type(cx) => {
            let name = format!("{}StructuredTextType", cx.naming.type_prefix);
            let mut fields = BTreeMap::new();
            fields.insert("text".to_string(), TypeRef::named(builtin::STRING));
            fields.insert("html".to_string(), TypeRef::named(builtin::STRING));
            fields.insert("rich_text".to_string(), TypeRef::named(builtin::JSON));
            fields.insert("raw".to_string(), TypeRef::named(builtin::JSON));
            cx.graph
                .register(&name, TypeNode::Object { fields }, &path.dotted())?;
            Ok(Traversed::Type(TypeRef::named(name)))
        }
        Mode::Value(cx) => {
            let blocks: Vec<Value> = value
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let raw = Value::Array(blocks.clone());

            let text = as_text(&blocks);
            let text = if text.trim().is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };

            let html = if blocks.is_empty() {
                Value::Null
            } else {
                let rendered = serialize_blocks(&blocks, cx.html_serializer, cx.link_resolver);
                if rendered.is_empty() {
                    Value::Null
                } else {
                    Value::String(rendered)
                }
            };

            Ok(Traversed::Value(json!({
                "text": text,
                "html": html,
                "rich_text": raw,
                "raw": raw,
            })))
        }
    }
}

/// Plain-text view: block texts joined with newlines, media blocks skipped.
#[must_use]
pub fn as_text(blocks: &[Value]) -> String {
    blocks
        .iter()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// HTML view over a block array, with list-item runs wrapped in `ul`/`ol`.
#[must_use]
pub fn serialize_blocks(
    blocks: &[Value],
    custom: Option<&dyn HtmlSerializer>,
    links: Option<&dyn LinkResolver>,
) -> String {
    let mut out = String::new();
    let mut open_list: Option<&str> = None;

    for block in blocks {
        let kind = block.get("type").and_then(Value::as_str).unwrap_or("");
        let list_tag = match kind {
            "list-item" => Some("ul"),
            "o-list-item" => Some("ol"),
            _ => None,
        };

        if open_list != list_tag {
            if let Some(tag) = open_list {
                out.push_str(&format!("</{tag}>"));
            }
            if let Some(tag) = list_tag {
                out.push_str(&format!("<{tag}>"));
            }
            open_list = list_tag;
        }

        if let Some(html) = custom.and_then(|serializer| serializer.serialize(block)) {
            out.push_str(&html);
        } else {
            out.push_str(&serialize_block(block, kind, links));
        }
    }
    if let Some(tag) = open_list {
        out.push_str(&format!("</{tag}>"));
    }
    out
}

fn serialize_block(block: &Value, kind: &str, links: Option<&dyn LinkResolver>) -> String {
    let text = block.get("text").and_then(Value::as_str).unwrap_or("");
    let spans = block
        .get("spans")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    match kind {
        "heading1" | "heading2" | "heading3" | "heading4" | "heading5" | "heading6" => {
            let level = &kind[7..8];
            format!("<h{level}>{}</h{level}>", render_spans(text, &spans, links))
        }
        "paragraph" => format!("<p>{}</p>", render_spans(text, &spans, links)),
        "preformatted" => format!("<pre>{}</pre>", escape_html(text)),
        "list-item" | "o-list-item" => {
            format!("<li>{}</li>", render_spans(text, &spans, links))
        }
        "image" => {
            let url = block.get("url").and_then(Value::as_str).unwrap_or("");
            let alt = block.get("alt").and_then(Value::as_str).unwrap_or("");
            format!(
                "<p class=\"block-img\"><img src=\"{}\" alt=\"{}\" /></p>",
                escape_html(url),
                escape_html(alt)
            )
        }
        "embed" => {
            let oembed = block.get("oembed").cloned().unwrap_or(Value::Null);
            let embed_url = oembed.get("embed_url").and_then(Value::as_str).unwrap_or("");
            let html = oembed.get("html").and_then(Value::as_str).unwrap_or("");
            format!(
                "<div data-oembed=\"{}\">{}</div>",
                escape_html(embed_url),
                html
            )
        }
        _ => format!("<p>{}</p>", render_spans(text, &spans, links)),
    }
}

#[derive(Debug, Clone)]
struct Span {
    start: usize,
    end: usize,
    kind: String,
    data: Value,
}

fn parse_spans(spans: &[Value]) -> Vec<Span> {
    let mut parsed: Vec<Span> = spans
        .iter()
        .filter_map(|span| {
            Some(Span {
                start: span.get("start")?.as_u64()? as usize,
                end: span.get("end")?.as_u64()? as usize,
                kind: span.get("type")?.as_str()?.to_string(),
                data: span.get("data").cloned().unwrap_or(Value::Null),
            })
        })
        .collect();
    parsed.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    parsed
}

/// Apply formatting spans to a block's text.
///
/// Span offsets count characters, not bytes. Nested spans render nested
/// tags; a span crossing a previously opened one is dropped rather than
/// emitting interleaved tags.
fn render_spans(text: &str, spans: &[Value], links: Option<&dyn LinkResolver>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let parsed = parse_spans(spans);
    render_range(&chars, 0, chars.len(), &parsed, links)
}

fn render_range(
    chars: &[char],
    lo: usize,
    hi: usize,
    spans: &[Span],
    links: Option<&dyn LinkResolver>,
) -> String {
    let mut out = String::new();
    let mut pos = lo;
    let mut i = 0;

    while i < spans.len() {
        let span = &spans[i];
        let start = span.start.max(lo);
        let end = span.end.min(hi);
        if start >= hi || end <= start {
            i += 1;
            continue;
        }
        if start < pos {
            // crosses an already-rendered span
            i += 1;
            continue;
        }

        out.push_str(&escape_chars(&chars[pos..start]));

        let mut children = Vec::new();
        let mut j = i + 1;
        while j < spans.len() && spans[j].start < end {
            if spans[j].end <= end {
                children.push(spans[j].clone());
            }
            j += 1;
        }

        let (open, close) = span_tags(span, links);
        out.push_str(&open);
        out.push_str(&render_range(chars, start, end, &children, links));
        out.push_str(&close);

        pos = end;
        i = j;
    }

    out.push_str(&escape_chars(&chars[pos..hi.min(chars.len())]));
    out
}

fn span_tags(span: &Span, links: Option<&dyn LinkResolver>) -> (String, String) {
    match span.kind.as_str() {
        "strong" => ("<strong>".to_string(), "</strong>".to_string()),
        "em" => ("<em>".to_string(), "</em>".to_string()),
        "label" => {
            let label = span
                .data
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or("");
            (
                format!("<span class=\"{}\">", escape_html(label)),
                "</span>".to_string(),
            )
        }
        "hyperlink" => {
            let href = links
                .and_then(|resolver| resolver.resolve(&span.data))
                .or_else(|| {
                    span.data
                        .get("url")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_default();
            let target = span.data.get("target").and_then(Value::as_str);
            let open = match target {
                Some(target) => format!(
                    "<a href=\"{}\" target=\"{}\" rel=\"noopener\">",
                    escape_html(&href),
                    escape_html(target)
                ),
                None => format!("<a href=\"{}\">", escape_html(&href)),
            };
            (open, "</a>".to_string())
        }
        _ => (String::new(), String::new()),
    }
}

fn escape_chars(chars: &[char]) -> String {
    escape_html(&chars.iter().collect::<String>())
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_text_joins_blocks() {
        let blocks = vec![
            json!({"type": "heading1", "text": "Title", "spans": []}),
            json!({"type": "paragraph", "text": "Body", "spans": []}),
        ];
        assert_eq!(as_text(&blocks), "Title\nBody");
    }

    #[test]
    fn test_serialize_heading_and_paragraph() {
        let blocks = vec![
            json!({"type": "heading2", "text": "Hello", "spans": []}),
            json!({"type": "paragraph", "text": "World", "spans": []}),
        ];
        assert_eq!(
            serialize_blocks(&blocks, None, None),
            "<h2>Hello</h2><p>World</p>"
        );
    }

    #[test]
    fn test_spans_nest_and_escape() {
        let blocks = vec![json!({
            "type": "paragraph",
            "text": "a < b & bold",
            "spans": [
                {"start": 6, "end": 12, "type": "strong"},
                {"start": 8, "end": 12, "type": "em"}
            ]
        })];
        assert_eq!(
            serialize_blocks(&blocks, None, None),
            "<p>a &lt; b <strong>&amp; <em>bold</em></strong></p>"
        );
    }

    #[test]
    fn test_list_runs_are_grouped() {
        let blocks = vec![
            json!({"type": "list-item", "text": "one", "spans": []}),
            json!({"type": "list-item", "text": "two", "spans": []}),
            json!({"type": "paragraph", "text": "after", "spans": []}),
        ];
        assert_eq!(
            serialize_blocks(&blocks, None, None),
            "<ul><li>one</li><li>two</li></ul><p>after</p>"
        );
    }

    #[test]
    fn test_hyperlink_uses_resolver_before_payload_url() {
        let blocks = vec![json!({
            "type": "paragraph",
            "text": "link",
            "spans": [
                {"start": 0, "end": 4, "type": "hyperlink",
                 "data": {"link_type": "Document", "uid": "about", "url": "https://fallback.example"}}
            ]
        })];
        let resolver = |target: &Value| {
            target
                .get("uid")
                .and_then(Value::as_str)
                .map(|uid| format!("/{uid}"))
        };
        assert_eq!(
            serialize_blocks(&blocks, None, Some(&resolver)),
            "<p><a href=\"/about\">link</a></p>"
        );
    }

    #[test]
    fn test_custom_serializer_wins_per_block() {
        let blocks = vec![
            json!({"type": "heading1", "text": "Custom", "spans": []}),
            json!({"type": "paragraph", "text": "Default", "spans": []}),
        ];
        let custom = |block: &Value| {
            (block["type"] == "heading1").then(|| "<header>Custom</header>".to_string())
        };
        assert_eq!(
            serialize_blocks(&blocks, Some(&custom), None),
            "<header>Custom</header><p>Default</p>"
        );
    }
}
