//! Decoder for the Zettelstore ZJSON encoding.
//!
//! ZJSON represents a parsed zettel as nested JSON objects. Every node object
//! names its kind under the empty key and stores its payload under short,
//! single-letter keys:
//!
//! | Key | Payload |
//! |---|---|
//! | `""` | node kind (`Para`, `Heading`, `Link`, ...) |
//! | `n` | number (heading level) |
//! | `i` | inline children |
//! | `b` | block children |
//! | `s`, `q`, `v` | first, second and third string |
//! | `a` | attributes |
//! | `c` | list items |
//! | `d`, `e` | description list terms and their descriptions |
//! | `p` | table (header row, body rows) |
//! | `j` | base64 binary data |
//!
//! Decoding is lenient about node kinds it does not know: they become
//! [`Block::Other`] / [`Inline::Other`] and are ignored downstream. Structural
//! problems (a block list that is not an array, a node without a kind) are
//! errors, since nothing sensible can be built from them.

use crate::content::{
    Alignment, Attributes, Block, Description, FormatKind, Inline, ListKind, LiteralKind,
    RefState, RegionKind, TableCell, VerbatimKind,
};
use crate::meta::{Meta, MetaValue};
use crate::source::{Zettel, ZettelOrder, ZettelRef};
use crate::zid::ZettelId;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

const NAME_TYPE: &str = "";
const NAME_ATTRS: &str = "a";
const NAME_BINARY: &str = "j";
const NAME_BLOCK: &str = "b";
const NAME_DESCR_LIST: &str = "d";
const NAME_DESCRIPTION: &str = "e";
const NAME_INLINE: &str = "i";
const NAME_LIST: &str = "c";
const NAME_NUMBER: &str = "n";
const NAME_STRING: &str = "s";
const NAME_STRING2: &str = "q";
const NAME_STRING3: &str = "v";
const NAME_TABLE: &str = "p";

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: &'static str,
    },
    #[error("node without kind")]
    MissingKind,
    #[error("invalid zettel id {0:?}")]
    InvalidZid(String),
}

#[derive(Deserialize)]
struct RawZettel {
    #[serde(default)]
    meta: Value,
    #[serde(default)]
    content: Value,
}

#[derive(Deserialize)]
struct RawRef {
    id: String,
    #[serde(default)]
    meta: Value,
}

#[derive(Deserialize)]
struct RawList {
    #[serde(default)]
    list: Vec<RawRef>,
}

#[derive(Deserialize)]
struct RawOrder {
    id: String,
    #[serde(default)]
    meta: Value,
    #[serde(default)]
    list: Vec<RawRef>,
}

/// Decode the body of `GET /z/{zid}?enc=zjson`.
pub fn decode_zettel(zid: &ZettelId, body: &[u8]) -> Result<Zettel, DecodeError> {
    let raw: RawZettel = serde_json::from_slice(body)?;
    Ok(Zettel {
        zid: zid.clone(),
        meta: decode_meta(&raw.meta)?,
        content: decode_blocks(&raw.content)?,
    })
}

/// Decode the body of `GET /z/{zid}?enc=zjson&part=meta`.
///
/// Accepts both a bare metadata object and one wrapped in `{"meta": ...}`.
pub fn decode_meta_body(body: &[u8]) -> Result<Meta, DecodeError> {
    let value: Value = serde_json::from_slice(body)?;
    match value.get("meta") {
        Some(inner) if inner.is_object() => decode_meta(inner),
        _ => decode_meta(&value),
    }
}

/// Decode the body of `GET /o/{zid}`.
pub fn decode_order(body: &[u8]) -> Result<ZettelOrder, DecodeError> {
    let raw: RawOrder = serde_json::from_slice(body)?;
    Ok(ZettelOrder {
        zid: parse_zid(&raw.id)?,
        meta: decode_meta(&raw.meta)?,
        list: decode_refs(raw.list)?,
    })
}

/// Decode the body of `GET /j?{query}`.
pub fn decode_list(body: &[u8]) -> Result<Vec<ZettelRef>, DecodeError> {
    let raw: RawList = serde_json::from_slice(body)?;
    decode_refs(raw.list)
}

fn decode_refs(refs: Vec<RawRef>) -> Result<Vec<ZettelRef>, DecodeError> {
    refs.into_iter()
        .map(|r| {
            Ok(ZettelRef {
                zid: parse_zid(&r.id)?,
                meta: decode_meta(&r.meta)?,
            })
        })
        .collect()
}

fn parse_zid(s: &str) -> Result<ZettelId, DecodeError> {
    ZettelId::parse(s).ok_or_else(|| DecodeError::InvalidZid(s.to_string()))
}

// ============================================================================
// Metadata
// ============================================================================

/// Metadata values come in three shapes: a plain string, an inline array, or
/// a typed object `{"": "Zettelmarkup", "i": [...]}` / `{"": "Word", "s": "..."}`.
pub fn decode_meta(value: &Value) -> Result<Meta, DecodeError> {
    let mut meta = Meta::new();
    let obj = match value {
        Value::Null => return Ok(meta),
        Value::Object(obj) => obj,
        other => return Err(unexpected("object", other)),
    };
    for (key, val) in obj {
        let decoded = match val {
            Value::String(s) => MetaValue::Text(s.clone()),
            Value::Array(_) => MetaValue::Inlines(decode_inlines(val)?),
            Value::Object(typed) => {
                if let Some(inlines) = typed.get(NAME_INLINE) {
                    MetaValue::Inlines(decode_inlines(inlines)?)
                } else {
                    MetaValue::Text(get_string(typed, NAME_STRING))
                }
            }
            Value::Bool(b) => MetaValue::Text(b.to_string()),
            Value::Number(n) => MetaValue::Text(n.to_string()),
            Value::Null => continue,
        };
        meta.insert(key.clone(), decoded);
    }
    Ok(meta)
}

// ============================================================================
// Blocks
// ============================================================================

pub fn decode_blocks(value: &Value) -> Result<Vec<Block>, DecodeError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(decode_block).collect(),
        other => Err(unexpected("block array", other)),
    }
}

fn decode_block(value: &Value) -> Result<Block, DecodeError> {
    let obj = as_object(value)?;
    let block = match kind(obj)? {
        "Para" => Block::Paragraph(inlines_of(obj)?),
        "Heading" => Block::Heading {
            // 0 marks an unknown level, which never splits a slide.
            level: get_number(obj).unwrap_or(0),
            attrs: attrs_of(obj),
            inlines: inlines_of(obj)?,
        },
        "Thematic" => Block::ThematicBreak,
        "Bullet" => list(obj, ListKind::Bullet)?,
        "Ordered" => list(obj, ListKind::Ordered)?,
        "Quotation" => list(obj, ListKind::Quotation)?,
        "Description" => Block::DescriptionList(descriptions(obj)?),
        "Table" => table(obj)?,
        "Block" => region(obj, RegionKind::Block)?,
        "Poem" => region(obj, RegionKind::Poem)?,
        "Excerpt" => region(obj, RegionKind::Excerpt)?,
        "CodeBlock" => verbatim(obj, VerbatimKind::Code),
        "EvalBlock" => verbatim(obj, VerbatimKind::Eval),
        "CommentBlock" => verbatim(obj, VerbatimKind::Comment),
        "HTMLBlock" => verbatim(obj, VerbatimKind::Html),
        "BLOB" => Block::Blob {
            syntax: get_string(obj, NAME_STRING),
            title: get_string(obj, NAME_STRING2),
            data: get_string(obj, NAME_BINARY),
            svg: get_string(obj, NAME_STRING3),
        },
        other => Block::Other(other.to_string()),
    };
    Ok(block)
}

fn list(obj: &Map<String, Value>, kind: ListKind) -> Result<Block, DecodeError> {
    let items = match obj.get(NAME_LIST) {
        Some(Value::Array(items)) => items.iter().map(decode_blocks).collect::<Result<_, _>>()?,
        Some(other) => return Err(unexpected("list items", other)),
        None => Vec::new(),
    };
    Ok(Block::List { kind, items })
}

fn descriptions(obj: &Map<String, Value>) -> Result<Vec<Description>, DecodeError> {
    let Some(Value::Array(entries)) = obj.get(NAME_DESCR_LIST) else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .map(|entry| {
            let entry = as_object(entry)?;
            let descriptions = match entry.get(NAME_DESCRIPTION) {
                Some(Value::Array(descrs)) => {
                    descrs.iter().map(decode_blocks).collect::<Result<_, _>>()?
                }
                _ => Vec::new(),
            };
            Ok(Description {
                term: inlines_of(entry)?,
                descriptions,
            })
        })
        .collect()
}

fn table(obj: &Map<String, Value>) -> Result<Block, DecodeError> {
    let Some(Value::Array(parts)) = obj.get(NAME_TABLE) else {
        return Ok(Block::Table {
            header: Vec::new(),
            rows: Vec::new(),
        });
    };
    let header = match parts.first() {
        Some(row) => row_cells(row)?,
        None => Vec::new(),
    };
    let rows = match parts.get(1) {
        Some(Value::Array(rows)) => rows.iter().map(row_cells).collect::<Result<_, _>>()?,
        _ => Vec::new(),
    };
    Ok(Block::Table { header, rows })
}

fn row_cells(row: &Value) -> Result<Vec<TableCell>, DecodeError> {
    match row {
        Value::Array(cells) => cells
            .iter()
            .map(|cell| {
                let cell = as_object(cell)?;
                let align = match get_string(cell, NAME_STRING).as_str() {
                    "<" => Alignment::Left,
                    ":" => Alignment::Center,
                    ">" => Alignment::Right,
                    _ => Alignment::Default,
                };
                Ok(TableCell {
                    align,
                    inlines: inlines_of(cell)?,
                })
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(unexpected("table row", other)),
    }
}

fn region(obj: &Map<String, Value>, kind: RegionKind) -> Result<Block, DecodeError> {
    Ok(Block::Region {
        kind,
        attrs: attrs_of(obj),
        blocks: decode_blocks(obj.get(NAME_BLOCK).unwrap_or(&Value::Null))?,
        cite: inlines_of(obj)?,
    })
}

fn verbatim(obj: &Map<String, Value>, kind: VerbatimKind) -> Block {
    Block::Verbatim {
        kind,
        attrs: attrs_of(obj),
        content: get_string(obj, NAME_STRING),
    }
}

// ============================================================================
// Inlines
// ============================================================================

pub fn decode_inlines(value: &Value) -> Result<Vec<Inline>, DecodeError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(decode_inline).collect(),
        other => Err(unexpected("inline array", other)),
    }
}

fn decode_inline(value: &Value) -> Result<Inline, DecodeError> {
    let obj = as_object(value)?;
    let inline = match kind(obj)? {
        "Text" => Inline::Text(get_string(obj, NAME_STRING)),
        "Space" => Inline::Space,
        "Soft" => Inline::SoftBreak,
        "Hard" => Inline::HardBreak,
        "Tag" => Inline::Tag(get_string(obj, NAME_STRING)),
        "Link" => Inline::Link {
            attrs: attrs_of(obj),
            reference: get_string(obj, NAME_STRING),
            state: RefState::parse(&get_string(obj, NAME_STRING2)),
            inlines: inlines_of(obj)?,
        },
        "Embed" => Inline::Embed {
            attrs: attrs_of(obj),
            reference: get_string(obj, NAME_STRING),
            syntax: get_string(obj, NAME_STRING2),
            inlines: inlines_of(obj)?,
        },
        "EmbedBLOB" => Inline::EmbedBlob {
            attrs: attrs_of(obj),
            syntax: get_string(obj, NAME_STRING),
            data: get_string(obj, NAME_BINARY),
            svg: get_string(obj, NAME_STRING3),
            inlines: inlines_of(obj)?,
        },
        "Cite" => Inline::Citation {
            attrs: attrs_of(obj),
            key: get_string(obj, NAME_STRING),
            inlines: inlines_of(obj)?,
        },
        "Mark" => Inline::Mark {
            mark: get_string(obj, NAME_STRING),
            fragment: get_string(obj, NAME_STRING2),
            inlines: inlines_of(obj)?,
        },
        "Footnote" => Inline::Footnote {
            attrs: attrs_of(obj),
            inlines: inlines_of(obj)?,
        },
        "Delete" => format(obj, FormatKind::Delete)?,
        "Emph" => format(obj, FormatKind::Emph)?,
        "Insert" => format(obj, FormatKind::Insert)?,
        "Quote" => format(obj, FormatKind::Quote)?,
        "Span" => format(obj, FormatKind::Span)?,
        "Strong" => format(obj, FormatKind::Strong)?,
        "Sub" => format(obj, FormatKind::Sub)?,
        "Super" => format(obj, FormatKind::Super)?,
        "Code" => literal(obj, LiteralKind::Code),
        "Comment" => literal(obj, LiteralKind::Comment),
        "Input" => literal(obj, LiteralKind::Input),
        "Output" => literal(obj, LiteralKind::Output),
        "HTML" => literal(obj, LiteralKind::Html),
        other => Inline::Other(other.to_string()),
    };
    Ok(inline)
}

fn format(obj: &Map<String, Value>, kind: FormatKind) -> Result<Inline, DecodeError> {
    Ok(Inline::Format {
        kind,
        attrs: attrs_of(obj),
        inlines: inlines_of(obj)?,
    })
}

fn literal(obj: &Map<String, Value>, kind: LiteralKind) -> Inline {
    Inline::Literal {
        kind,
        attrs: attrs_of(obj),
        content: get_string(obj, NAME_STRING),
    }
}

// ============================================================================
// Field access
// ============================================================================

fn as_object(value: &Value) -> Result<&Map<String, Value>, DecodeError> {
    value
        .as_object()
        .ok_or_else(|| unexpected("node object", value))
}

fn kind(obj: &Map<String, Value>) -> Result<&str, DecodeError> {
    obj.get(NAME_TYPE)
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingKind)
}

fn inlines_of(obj: &Map<String, Value>) -> Result<Vec<Inline>, DecodeError> {
    decode_inlines(obj.get(NAME_INLINE).unwrap_or(&Value::Null))
}

fn get_string(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Numbers are sent as strings (`"n": "1"`) but accept JSON numbers too.
fn get_number(obj: &Map<String, Value>) -> Option<u32> {
    match obj.get(NAME_NUMBER)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
}

fn attrs_of(obj: &Map<String, Value>) -> Attributes {
    match obj.get(NAME_ATTRS) {
        Some(Value::Object(attrs)) => attrs
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
        _ => Attributes::new(),
    }
}

fn unexpected(expected: &'static str, found: &Value) -> DecodeError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    DecodeError::Unexpected { expected, found }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::plain_text;
    use crate::meta::KEY_TITLE;
    use serde_json::json;

    #[test]
    fn decodes_paragraph_and_heading() {
        let content = json!([
            {"": "Heading", "n": "1", "i": [{"": "Text", "s": "Intro"}]},
            {"": "Para", "i": [
                {"": "Text", "s": "Hello"},
                {"": "Space"},
                {"": "Text", "s": "world"}
            ]}
        ]);
        let blocks = decode_blocks(&content).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], Block::heading(1, "Intro"));
        match &blocks[1] {
            Block::Paragraph(inlines) => assert_eq!(plain_text(inlines), "Hello world"),
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn heading_without_level_does_not_split() {
        let content = json!([
            {"": "Para", "i": [{"": "Text", "s": "before"}]},
            {"": "Heading", "i": [{"": "Text", "s": "Loose"}]},
            {"": "Heading", "n": "x", "i": [{"": "Text", "s": "Bad"}]},
            {"": "Para", "i": [{"": "Text", "s": "after"}]}
        ]);
        let blocks = decode_blocks(&content).unwrap();
        assert!(matches!(blocks[1], Block::Heading { level: 0, .. }));
        assert!(matches!(blocks[2], Block::Heading { level: 0, .. }));
        assert!(blocks.iter().all(|b| b.split_title().is_none()));
    }

    #[test]
    fn decodes_zettel_link_with_state() {
        let content = json!([{"": "Para", "i": [
            {"": "Link", "q": "zettel", "s": "20230101000000", "i": [{"": "Text", "s": "there"}]}
        ]}]);
        let blocks = decode_blocks(&content).unwrap();
        let Block::Paragraph(inlines) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            inlines[0].linked_zettel(),
            Some(ZettelId::new("20230101000000"))
        );
    }

    #[test]
    fn decodes_embed_syntax() {
        let inlines = decode_inlines(&json!([
            {"": "Embed", "s": "20230101000001", "q": "png"}
        ]))
        .unwrap();
        assert_eq!(
            inlines[0].embedded_zettel(),
            Some((ZettelId::new("20230101000001"), "png"))
        );
    }

    #[test]
    fn decodes_mermaid_eval_block() {
        let blocks = decode_blocks(&json!([
            {"": "EvalBlock", "a": {"": "mermaid"}, "s": "graph TD; A-->B"}
        ]))
        .unwrap();
        assert!(blocks[0].is_mermaid());
    }

    #[test]
    fn unknown_kinds_become_other() {
        let blocks = decode_blocks(&json!([{"": "MathBlock", "s": "x^2"}])).unwrap();
        assert_eq!(blocks, vec![Block::Other("MathBlock".to_string())]);
        let inlines = decode_inlines(&json!([{"": "Math", "s": "x"}])).unwrap();
        assert_eq!(inlines, vec![Inline::Other("Math".to_string())]);
    }

    #[test]
    fn node_without_kind_is_an_error() {
        let err = decode_blocks(&json!([{"i": []}])).unwrap_err();
        assert!(matches!(err, DecodeError::MissingKind));
    }

    #[test]
    fn non_array_content_is_an_error() {
        let err = decode_blocks(&json!({"": "Para"})).unwrap_err();
        assert!(matches!(err, DecodeError::Unexpected { .. }));
    }

    #[test]
    fn decodes_nested_list_and_table() {
        let blocks = decode_blocks(&json!([
            {"": "Bullet", "c": [[{"": "Para", "i": [{"": "Text", "s": "one"}]}]]},
            {"": "Table", "p": [
                [{"": "Cell", "s": ">", "i": [{"": "Text", "s": "h"}]}],
                [[{"": "Cell", "i": [{"": "Text", "s": "c"}]}]]
            ]}
        ]))
        .unwrap();
        assert!(matches!(&blocks[0], Block::List { kind: ListKind::Bullet, items } if items.len() == 1));
        let Block::Table { header, rows } = &blocks[1] else {
            panic!("expected table");
        };
        assert_eq!(header[0].align, Alignment::Right);
        assert_eq!(rows[0][0].inlines, vec![Inline::text("c")]);
    }

    #[test]
    fn meta_accepts_all_value_shapes() {
        let meta = decode_meta(&json!({
            "role": "slideset",
            "title": {"": "Zettelmarkup", "i": [{"": "Text", "s": "Typed"}]},
            "sub-title": [{"": "Text", "s": "Bare"}],
            "lang": {"": "Word", "s": "en"}
        }))
        .unwrap();
        assert_eq!(meta.text("role").as_deref(), Some("slideset"));
        assert_eq!(meta.text(KEY_TITLE).as_deref(), Some("Typed"));
        assert_eq!(meta.text("sub-title").as_deref(), Some("Bare"));
        assert_eq!(meta.text("lang").as_deref(), Some("en"));
    }

    #[test]
    fn decodes_full_zettel() {
        let body = br#"{"id":"20230101000000","meta":{"title":"T"},"content":[{"": "Thematic"}]}"#;
        let zid = ZettelId::new("20230101000000");
        let z = decode_zettel(&zid, body).unwrap();
        assert_eq!(z.zid, zid);
        assert_eq!(z.meta.text(KEY_TITLE).as_deref(), Some("T"));
        assert_eq!(z.content, vec![Block::ThematicBreak]);
    }

    #[test]
    fn meta_body_accepts_wrapped_form() {
        let meta = decode_meta_body(br#"{"meta":{"title":"Wrapped"}}"#).unwrap();
        assert_eq!(meta.text(KEY_TITLE).as_deref(), Some("Wrapped"));
        let meta = decode_meta_body(br#"{"title":"Bare"}"#).unwrap();
        assert_eq!(meta.text(KEY_TITLE).as_deref(), Some("Bare"));
    }

    #[test]
    fn decodes_order() {
        let body = br#"{
            "id": "20230101000000",
            "meta": {"title": "Deck", "role": "slideset"},
            "list": [
                {"id": "20230101000001", "meta": {"title": "First"}},
                {"id": "20230101000002", "meta": {}}
            ]
        }"#;
        let order = decode_order(body).unwrap();
        assert_eq!(order.zid, ZettelId::new("20230101000000"));
        assert_eq!(order.list.len(), 2);
        assert_eq!(order.list[1].zid, ZettelId::new("20230101000002"));
        assert_eq!(order.list[0].meta.text(KEY_TITLE).as_deref(), Some("First"));
    }

    #[test]
    fn decodes_zettel_list() {
        let body = br#"{
            "query": "role:slideset",
            "list": [
                {"id": "20230101000003", "meta": {"title": "Deck"}, "rights": 2},
                {"id": "20230101000004"}
            ]
        }"#;
        let list = decode_list(body).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].meta.text(KEY_TITLE).as_deref(), Some("Deck"));
        assert!(list[1].meta.is_empty());
    }

    #[test]
    fn empty_zettel_list() {
        assert!(decode_list(br#"{"list": []}"#).unwrap().is_empty());
    }

    #[test]
    fn order_with_invalid_zid_is_an_error() {
        let body = br#"{"id": "nope", "meta": {}, "list": []}"#;
        assert!(matches!(
            decode_order(body),
            Err(DecodeError::InvalidZid(_))
        ));
    }
}
