//! Per-kind block renderers.
//!
//! [`BlockRenderers`] maps a block kind (`paragraph`, `image`, ...) to the
//! function producing that block's own markdown, children excluded. The
//! defaults can be replaced per kind before a run starts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use motionlink_common::model::{Block, FileObject};
use smol_str::SmolStr;
use tracing::debug;

use crate::media::{MediaRef, MediaResolver};
use crate::rich_text::render_all;

/// Host used for links to child pages and databases.
pub const DEFAULT_PAGE_HOST: &str = "www.notion.so";

/// What a block renderer can reach while rendering.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub media: &'a dyn MediaResolver,
    /// Output directory of the rule being rendered. Staged media lands
    /// beneath it.
    pub out_dir: &'a Path,
    pub page_host: &'a str,
}

impl<'a> RenderContext<'a> {
    pub fn new(media: &'a dyn MediaResolver, out_dir: &'a Path) -> Self {
        Self {
            media,
            out_dir,
            page_host: DEFAULT_PAGE_HOST,
        }
    }

    pub fn resolve_media(&self, file: &FileObject) -> MediaRef {
        self.media.resolve(file, self.out_dir)
    }
}

pub type BlockRenderFn = Arc<dyn Fn(&Block, &RenderContext<'_>) -> String + Send + Sync>;

/// Registry of block renderers keyed by kind.
#[derive(Clone)]
pub struct BlockRenderers {
    renderers: HashMap<SmolStr, BlockRenderFn>,
}

impl std::fmt::Debug for BlockRenderers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.renderers.keys().collect();
        kinds.sort();
        f.debug_struct("BlockRenderers")
            .field("kinds", &kinds)
            .finish()
    }
}

impl Default for BlockRenderers {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BlockRenderers {
    /// A registry with no renderers; every block renders as unknown.
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut this = Self::empty();
        this.set("paragraph", prefixed(""));
        this.set("heading_1", prefixed("# "));
        this.set("heading_2", prefixed("## "));
        this.set("heading_3", prefixed("### "));
        this.set("bulleted_list_item", prefixed("- "));
        // always literal "1.", markdown renumbers
        this.set("numbered_list_item", prefixed("1. "));
        this.set("toggle", prefixed(""));
        this.set("to_do", to_do);
        this.set("quote", quote);
        this.set("callout", callout);
        this.set("code", code);
        this.set("equation", equation);
        this.set("divider", |_, _| "---".to_string());
        this.set("table_of_contents", |_, _| String::new());
        this.set("breadcrumb", |_, _| String::new());
        this.set("child_page", child_link);
        this.set("child_database", child_link);
        this.set("image", image);
        this.set("video", include_media);
        this.set("file", include_media);
        this.set("pdf", include_media);
        this.set("audio", include_media);
        this.set("embed", embed);
        this.set("bookmark", bookmark);
        this.set("unsupported", |_, _| "Unsupported".to_string());
        this
    }

    fn set<F>(&mut self, kind: &'static str, render: F)
    where
        F: Fn(&Block, &RenderContext<'_>) -> String + Send + Sync + 'static,
    {
        self.renderers
            .insert(SmolStr::new_static(kind), Arc::new(render));
    }

    /// Replace (or add) the renderer for `kind`. Returns the previous one.
    pub fn override_kind<F>(
        &mut self,
        kind: impl Into<SmolStr>,
        render: F,
    ) -> Option<BlockRenderFn>
    where
        F: Fn(&Block, &RenderContext<'_>) -> String + Send + Sync + 'static,
    {
        self.renderers.insert(kind.into(), Arc::new(render))
    }

    pub fn with_override<F>(mut self, kind: impl Into<SmolStr>, render: F) -> Self
    where
        F: Fn(&Block, &RenderContext<'_>) -> String + Send + Sync + 'static,
    {
        self.override_kind(kind, render);
        self
    }

    pub fn remove(&mut self, kind: &str) -> Option<BlockRenderFn> {
        self.renderers.remove(kind)
    }

    pub fn get(&self, kind: &str) -> Option<&BlockRenderFn> {
        self.renderers.get(kind)
    }

    /// Markdown for the block itself. Unknown kinds yield a visible marker
    /// rather than failing.
    pub fn render(&self, block: &Block, ctx: &RenderContext<'_>) -> String {
        match self.renderers.get(block.kind.as_str()) {
            Some(render) => render(block, ctx),
            None => {
                debug!(kind = %block.kind, id = %block.id, "no renderer for block kind");
                format!("Unknown Block: {}", block.kind)
            }
        }
    }
}

fn prefixed(
    prefix: &'static str,
) -> impl Fn(&Block, &RenderContext<'_>) -> String + Send + Sync + 'static {
    move |block, _| format!("{prefix}{}", render_all(&block.rich_text()))
}

fn to_do(block: &Block, _: &RenderContext<'_>) -> String {
    let check = if block.bool_field("checked") { 'X' } else { ' ' };
    format!("- [{check}] {}", render_all(&block.rich_text()))
}

fn quote(block: &Block, _: &RenderContext<'_>) -> String {
    format!("> {}", render_all(&block.rich_text()))
}

fn callout(block: &Block, _: &RenderContext<'_>) -> String {
    let text = render_all(&block.rich_text());
    let emoji = block
        .field("icon")
        .filter(|icon| icon.get("type").and_then(|t| t.as_str()) == Some("emoji"))
        .and_then(|icon| icon.get("emoji"))
        .and_then(|e| e.as_str());
    match emoji {
        Some(icon) => format!("> {icon} {text}"),
        None => format!("> {text}"),
    }
}

fn code(block: &Block, _: &RenderContext<'_>) -> String {
    let language = block.str_field("language").unwrap_or_default();
    format!("```{language}\n{}\n```", render_all(&block.rich_text()))
}

fn equation(block: &Block, _: &RenderContext<'_>) -> String {
    format!("$${}$$", block.str_field("expression").unwrap_or_default())
}

fn child_link(block: &Block, ctx: &RenderContext<'_>) -> String {
    let title = block.str_field("title").unwrap_or_default();
    let id = block.id.replace('-', "");
    format!("[{title}](https://{}/{id})", ctx.page_host)
}

fn media(block: &Block, ctx: &RenderContext<'_>) -> Option<MediaRef> {
    let file = block.payload_as::<FileObject>();
    if file.is_none() {
        debug!(kind = %block.kind, id = %block.id, "media block without a file object");
    }
    file.map(|file| ctx.resolve_media(&file))
}

fn image(block: &Block, ctx: &RenderContext<'_>) -> String {
    media(block, ctx)
        .map(|m| format!("![{0}]({1} \"{0}\")", m.caption_markdown, m.src))
        .unwrap_or_default()
}

fn include_media(block: &Block, ctx: &RenderContext<'_>) -> String {
    media(block, ctx)
        .map(|m| format!("[{}]({} ':include')", m.caption_markdown, m.src))
        .unwrap_or_default()
}

fn embed(block: &Block, _: &RenderContext<'_>) -> String {
    let caption = render_all(&block.caption());
    let url = block.str_field("url").unwrap_or_default();
    format!("[{caption}]({url} ':include')")
}

fn bookmark(block: &Block, _: &RenderContext<'_>) -> String {
    let url = block.str_field("url").unwrap_or_default();
    format!("[{url}]({url})")
}
