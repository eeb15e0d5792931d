use motionlink_common::model::Block;

use crate::block::{BlockRenderers, RenderContext};

/// Indentation added per nesting level.
pub const CHILD_INDENT: &str = "    ";

/// Renders block forests to markdown.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    renderers: BlockRenderers,
}

impl MarkdownRenderer {
    pub fn new(renderers: BlockRenderers) -> Self {
        Self { renderers }
    }

    pub fn renderers(&self) -> &BlockRenderers {
        &self.renderers
    }

    pub fn render_forest(&self, blocks: &[Block], ctx: &RenderContext<'_>) -> String {
        self.render_forest_with_indent(blocks, ctx, "")
    }

    /// Each block's markdown is prefixed with `indent` and followed by a
    /// newline; siblings are separated by one blank line. Children are
    /// rendered one level deeper, right-trimmed, and appended after their
    /// parent when non-empty.
    pub fn render_forest_with_indent(
        &self,
        blocks: &[Block],
        ctx: &RenderContext<'_>,
        indent: &str,
    ) -> String {
        let mut out = String::new();
        let child_indent = format!("{indent}{CHILD_INDENT}");

        for block in blocks {
            let markdown = self.renderers.render(block, ctx);
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(indent);
            out.push_str(&markdown);
            out.push('\n');

            let children = self.render_forest_with_indent(&block.children, ctx, &child_indent);
            let children = children.trim_end();
            if !children.is_empty() {
                out.push('\n');
                out.push_str(children);
                out.push('\n');
            }
        }

        out
    }
}
