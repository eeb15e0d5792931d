//! Content model for rows fetched from a content database.
//!
//! The shapes follow the remote API's JSON closely so raw responses
//! deserialize directly. Blocks are kept loosely typed: the payload for a
//! block lives under a key named after its kind, and renderers pull out the
//! fields they need.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;
use tracing::warn;

use crate::error::RemoteError;

/// Inline formatting applied to a rich-text run.
///
/// `underline` and `color` are carried through but not rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    pub color: SmolStr,
}

/// One atomic inline content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(flatten)]
    pub content: RichTextContent,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextContent {
    Text { text: TextContent },
    Mention { mention: Mention },
    Equation { equation: Equation },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
    #[serde(default)]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mention {
    User { user: UserMention },
    Date { date: DateMention },
    Page { page: Reference },
    Database { database: Reference },
    /// Mention kinds we do not render (template mentions, link previews).
    #[serde(other)]
    Unsupported,
}

/// A mentioned user. Partial user objects carry only an id; people and bots
/// also carry a `type` and a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMention {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<SmolStr>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserMention {
    /// Display name for people and bots; `None` for anonymous users.
    pub fn display_name(&self) -> Option<&str> {
        match self.kind.as_deref() {
            Some("person") | Some("bot") => self.name.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateMention {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    pub expression: String,
}

/// A media reference inside a block (image, video, file, pdf, audio).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    #[serde(flatten)]
    pub source: FileSource,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileSource {
    /// Linked from elsewhere; used as-is.
    External { external: ExternalFile },
    /// Hosted by the content source behind an expiring URL.
    File { file: HostedFile },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalFile {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedFile {
    pub url: String,
    #[serde(default)]
    pub expiry_time: Option<String>,
}

/// One node in a row's content tree.
///
/// `children` is populated by the fetcher, never by the remote response
/// itself. A block with `has_children == false` always has no children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SmolStr,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: impl Into<SmolStr>, payload: Value) -> Self {
        let kind = kind.into();
        let mut fields = Map::new();
        fields.insert(kind.to_string(), payload);
        Self {
            id: id.into(),
            kind,
            has_children: false,
            fields,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.has_children = !children.is_empty();
        self.children = children;
        self
    }

    /// The kind-specific payload, e.g. `block["paragraph"]`.
    pub fn payload(&self) -> Option<&Value> {
        self.fields.get(self.kind.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload().and_then(|p| p.get(name))
    }

    pub fn field_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.field(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn bool_field(&self, name: &str) -> bool {
        self.field(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// The payload decoded as a whole, for media kinds whose payload is a
    /// [`FileObject`].
    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.payload()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Rich text of the block. Older API versions call the field `text`.
    pub fn rich_text(&self) -> Vec<RichText> {
        self.runs("rich_text")
            .or_else(|| self.runs("text"))
            .unwrap_or_default()
    }

    pub fn caption(&self) -> Vec<RichText> {
        self.runs("caption").unwrap_or_default()
    }

    /// `None` when the field is absent. A field that fails to decode is
    /// logged and reads as empty.
    fn runs(&self, name: &str) -> Option<Vec<RichText>> {
        let value = self.field(name)?;
        match Vec::<RichText>::deserialize(value) {
            Ok(runs) => Some(runs),
            Err(err) => {
                warn!(
                    block = %self.id,
                    kind = %self.kind,
                    field = name,
                    error = %err,
                    "dropping rich text that failed to decode"
                );
                Some(Vec::new())
            }
        }
    }
}

/// One fetched database entry ("page").
///
/// Serialized as-is into the template view, so user transforms can stash
/// anything they want to render under `other_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    /// Used as the output file stem. Defaults to `id`.
    pub title: String,
    pub data: Value,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub other_data: Map<String, Value>,
}

impl Row {
    /// Build a row from a raw page object as returned by a database query.
    pub fn from_page(data: Value) -> Result<Self, RemoteError> {
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Malformed("page object without an id".into()))?
            .to_string();
        Ok(Self {
            title: id.clone(),
            id,
            data,
            blocks: Vec::new(),
            other_data: Map::new(),
        })
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.data.get("properties").and_then(|p| p.get(name))
    }

    /// Plain text of a title property, concatenated across its runs.
    pub fn title_property(&self, name: &str) -> Option<String> {
        let runs = self.property(name)?.get("title")?.as_array()?;
        let text: String = runs
            .iter()
            .filter_map(|run| run.get("plain_text").and_then(Value::as_str))
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

/// A fetched database: its own metadata plus its rows in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub data: Value,
    pub rows: Vec<Row>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rich_text_text_run() {
        let run: RichText = serde_json::from_value(json!({
            "type": "text",
            "text": { "content": "abc", "link": { "url": "http://example.com" } },
            "annotations": { "bold": true, "italic": false, "strikethrough": false,
                             "underline": false, "code": false, "color": "default" },
            "plain_text": "abc",
            "href": "http://example.com"
        }))
        .unwrap();

        assert!(run.annotations.bold);
        match run.content {
            RichTextContent::Text { text } => {
                assert_eq!(text.content, "abc");
                assert_eq!(text.link.unwrap().url, "http://example.com");
            }
            other => panic!("expected text run, got {other:?}"),
        }
    }

    #[test]
    fn test_rich_text_page_mention() {
        let run: RichText = serde_json::from_value(json!({
            "type": "mention",
            "mention": { "type": "page", "page": { "id": "abc-def" } },
            "plain_text": "dub",
            "href": null
        }))
        .unwrap();

        assert_eq!(
            run.content,
            RichTextContent::Mention {
                mention: Mention::Page {
                    page: Reference {
                        id: "abc-def".into()
                    }
                }
            }
        );
        assert_eq!(run.annotations, Annotations::default());
    }

    #[test]
    fn test_unknown_mention_kind() {
        let run: RichText = serde_json::from_value(json!({
            "type": "mention",
            "mention": { "type": "template_mention", "template_mention": {} },
            "plain_text": "@today"
        }))
        .unwrap();
        assert!(matches!(
            run.content,
            RichTextContent::Mention {
                mention: Mention::Unsupported
            }
        ));
    }

    #[test]
    fn test_user_display_name() {
        let person: UserMention = serde_json::from_value(json!({
            "object": "user", "id": "u1", "type": "person", "name": "Ada"
        }))
        .unwrap();
        let anon: UserMention =
            serde_json::from_value(json!({ "object": "user", "id": "u2" })).unwrap();
        assert_eq!(person.display_name(), Some("Ada"));
        assert_eq!(anon.display_name(), None);
    }

    #[test]
    fn test_block_from_raw_response() {
        let block: Block = serde_json::from_value(json!({
            "object": "block",
            "id": "b1",
            "type": "to_do",
            "has_children": false,
            "to_do": {
                "rich_text": [{ "type": "text", "text": { "content": "ship" }, "plain_text": "ship" }],
                "checked": true
            }
        }))
        .unwrap();

        assert_eq!(block.kind, "to_do");
        assert!(block.bool_field("checked"));
        assert_eq!(block.rich_text().len(), 1);
        assert!(block.children.is_empty());
    }

    #[test]
    fn test_undecodable_rich_text_reads_as_empty() {
        let block = Block::new(
            "b1",
            "paragraph",
            json!({
                "rich_text": [{ "type": "text" }],
                "text": [{ "type": "text", "text": { "content": "old" }, "plain_text": "old" }]
            }),
        );
        assert!(block.rich_text().is_empty());

        let legacy = Block::new(
            "b2",
            "paragraph",
            json!({ "text": [{ "type": "text", "text": { "content": "old" }, "plain_text": "old" }] }),
        );
        assert_eq!(legacy.rich_text()[0].plain_text, "old");
    }

    #[test]
    fn test_file_object_sources() {
        let external: FileObject = serde_json::from_value(json!({
            "type": "external", "external": { "url": "https://x.test/a.png" }, "caption": []
        }))
        .unwrap();
        let hosted: FileObject = serde_json::from_value(json!({
            "type": "file", "file": { "url": "https://s3.test/a.png", "expiry_time": "2030-01-01" }
        }))
        .unwrap();

        assert!(matches!(external.source, FileSource::External { .. }));
        assert!(matches!(hosted.source, FileSource::File { .. }));
        assert!(hosted.caption.is_empty());
    }

    #[test]
    fn test_row_from_page_defaults_title_to_id() {
        let row =
            Row::from_page(json!({ "object": "page", "id": "p1", "properties": {} })).unwrap();
        assert_eq!(row.title, "p1");
        assert!(row.blocks.is_empty());
    }

    #[test]
    fn test_row_without_id_is_malformed() {
        assert!(matches!(
            Row::from_page(json!({ "object": "page" })),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn test_title_property() {
        let row = Row::from_page(json!({
            "id": "p1",
            "properties": { "Name": { "title": [
                { "type": "text", "plain_text": "Hello " },
                { "type": "text", "plain_text": "World" }
            ] } }
        }))
        .unwrap();
        assert_eq!(row.title_property("Name").as_deref(), Some("Hello World"));
        assert_eq!(row.title_property("Missing"), None);
    }
}
