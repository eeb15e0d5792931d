//! Inline markdown for rich-text runs.

use motionlink_common::model::{Annotations, Mention, RichText, RichTextContent};

/// Marker embedded in rendered output wherever a link to another row's
/// output file belongs. Resolved by [`crate::LinkResolver::flush`].
pub const PLACEHOLDER_PREFIX: &str = ":::pathTo:::";
pub const PLACEHOLDER_SUFFIX: &str = ":::";

/// The placeholder for row `id`, e.g. `:::pathTo:::abc:::`.
pub fn path_placeholder(id: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{id}{PLACEHOLDER_SUFFIX}")
}

/// Wrap `text` in markdown emphasis. Code is innermost, bold outermost.
pub fn apply_annotations(text: &str, annotations: &Annotations) -> String {
    let mut out = text.to_string();
    if annotations.code {
        out = format!("`{out}`");
    }
    if annotations.strikethrough {
        out = format!("~~{out}~~");
    }
    if annotations.italic {
        out = format!("*{out}*");
    }
    if annotations.bold {
        out = format!("**{out}**");
    }
    out
}

fn link(text: &str, href: Option<&str>) -> String {
    match href {
        Some(href) => format!("[{text}]({href})"),
        None => text.to_string(),
    }
}

pub fn render_rich_text(run: &RichText) -> String {
    let href = run.href.as_deref();
    let out = match &run.content {
        RichTextContent::Text { text } => {
            link(&text.content, text.link.as_ref().map(|l| l.url.as_str()))
        }
        RichTextContent::Mention { mention } => match mention {
            Mention::User { user } => link(user.display_name().unwrap_or(&run.plain_text), href),
            Mention::Date { date } => {
                let text = match &date.end {
                    Some(end) => format!("{} to {}", date.start, end),
                    None => date.start.clone(),
                };
                link(&text, href)
            }
            // pages always link through the placeholder, never their href
            Mention::Page { page } => {
                format!("[{}]({})", run.plain_text, path_placeholder(&page.id))
            }
            Mention::Database { .. } => {
                format!("[{}]({})", run.plain_text, href.unwrap_or_default())
            }
            Mention::Unsupported => run.plain_text.clone(),
        },
        RichTextContent::Equation { equation } => {
            link(&format!("${}$", equation.expression), href)
        }
    };
    apply_annotations(&out, &run.annotations)
}

/// Concatenate the rendering of each run.
pub fn render_all(runs: &[RichText]) -> String {
    runs.iter().map(render_rich_text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn run(value: Value) -> RichText {
        serde_json::from_value(value).unwrap()
    }

    fn text(content: &str) -> RichText {
        run(json!({ "type": "text", "text": { "content": content }, "plain_text": content }))
    }

    #[test]
    fn test_annotation_nesting_all_combinations() {
        // (bold, italic, strikethrough, code) -> expected
        let cases = [
            ((false, false, false, false), "abc"),
            ((false, false, false, true), "`abc`"),
            ((false, false, true, false), "~~abc~~"),
            ((false, false, true, true), "~~`abc`~~"),
            ((false, true, false, false), "*abc*"),
            ((false, true, false, true), "*`abc`*"),
            ((false, true, true, false), "*~~abc~~*"),
            ((false, true, true, true), "*~~`abc`~~*"),
            ((true, false, false, false), "**abc**"),
            ((true, false, false, true), "**`abc`**"),
            ((true, false, true, false), "**~~abc~~**"),
            ((true, false, true, true), "**~~`abc`~~**"),
            ((true, true, false, false), "***abc***"),
            ((true, true, false, true), "***`abc`***"),
            ((true, true, true, false), "***~~abc~~***"),
            ((true, true, true, true), "***~~`abc`~~***"),
        ];

        for ((bold, italic, strikethrough, code), expected) in cases {
            let annotations = Annotations {
                bold,
                italic,
                strikethrough,
                code,
                // never rendered
                underline: true,
                color: "red".into(),
            };
            assert_eq!(
                apply_annotations("abc", &annotations),
                expected,
                "bold={bold} italic={italic} strike={strikethrough} code={code}"
            );
        }
    }

    #[test]
    fn test_plain_text_and_link() {
        assert_eq!(render_rich_text(&text("hello")), "hello");

        let linked = run(json!({
            "type": "text",
            "text": { "content": "site", "link": { "url": "https://example.com" } },
            "annotations": { "bold": true },
            "plain_text": "site",
            "href": "https://example.com"
        }));
        assert_eq!(render_rich_text(&linked), "**[site](https://example.com)**");
    }

    #[test]
    fn test_user_mentions() {
        let person = run(json!({
            "type": "mention",
            "mention": { "type": "user", "user": { "id": "u1", "type": "person", "name": "Ada" } },
            "plain_text": "@Ada Lovelace"
        }));
        let anonymous = run(json!({
            "type": "mention",
            "mention": { "type": "user", "user": { "id": "u2" } },
            "plain_text": "@Anonymous"
        }));
        let bot_with_href = run(json!({
            "type": "mention",
            "mention": { "type": "user", "user": { "id": "u3", "type": "bot", "name": "Robo" } },
            "plain_text": "@Robo",
            "href": "https://example.com/robo"
        }));

        assert_eq!(render_rich_text(&person), "Ada");
        assert_eq!(render_rich_text(&anonymous), "@Anonymous");
        assert_eq!(render_rich_text(&bot_with_href), "[Robo](https://example.com/robo)");
    }

    #[test]
    fn test_date_mentions() {
        let single = run(json!({
            "type": "mention",
            "mention": { "type": "date", "date": { "start": "2021-01-01" } },
            "plain_text": "January 1, 2021"
        }));
        let range = run(json!({
            "type": "mention",
            "mention": { "type": "date", "date": { "start": "2021-01-01", "end": "2021-02-01" } },
            "annotations": { "italic": true },
            "plain_text": "..."
        }));

        assert_eq!(render_rich_text(&single), "2021-01-01");
        assert_eq!(render_rich_text(&range), "*2021-01-01 to 2021-02-01*");
    }

    #[test]
    fn test_page_mention_uses_placeholder_even_with_href() {
        let page = run(json!({
            "type": "mention",
            "mention": { "type": "page", "page": { "id": "abc-123" } },
            "plain_text": "Other page",
            "href": "https://www.notion.so/abc123"
        }));
        assert_eq!(
            render_rich_text(&page),
            "[Other page](:::pathTo:::abc-123:::)"
        );
    }

    #[test]
    fn test_database_mention_links_href() {
        let database = run(json!({
            "type": "mention",
            "mention": { "type": "database", "database": { "id": "db-1" } },
            "plain_text": "Tasks",
            "href": "https://www.notion.so/db1"
        }));
        assert_eq!(render_rich_text(&database), "[Tasks](https://www.notion.so/db1)");
    }

    #[test]
    fn test_equation() {
        let plain = run(json!({
            "type": "equation", "equation": { "expression": "e=mc^2" }, "plain_text": "e=mc^2"
        }));
        let linked = run(json!({
            "type": "equation", "equation": { "expression": "x" },
            "plain_text": "x", "href": "https://example.com", "annotations": { "bold": true }
        }));
        assert_eq!(render_rich_text(&plain), "$e=mc^2$");
        assert_eq!(render_rich_text(&linked), "**[$x$](https://example.com)**");
    }

    #[test]
    fn test_render_all() {
        assert_eq!(render_all(&[]), "");
        assert_eq!(render_all(&[text("a"), text("b"), text(" c")]), "ab c");
    }
}
