//! Message body rendering
//!
//! Text in, display-safe markup out. Links always open in a new browsing
//! context without a referrer or opener, and their destination is emitted
//! exactly as written. Raw HTML in the source is shown as text.

/// Attributes added to every anchor
pub const LINK_ATTRIBUTES: &str = r#"target="_blank" rel="noopener noreferrer""#;

/// Render message content for display. Absent content renders as empty.
pub fn render_markdown(content: Option<&str>) -> String {
    let text = content.unwrap_or_default();
    if text.is_empty() {
        return String::new();
    }

    convert(text)
}

#[cfg(feature = "markdown")]
fn convert(text: &str) -> String {
    match markdown::to_html(text) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(error = %e, "Markdown conversion failed, using plain rendering");
            render_plain(text)
        }
    }
}

#[cfg(not(feature = "markdown"))]
fn convert(text: &str) -> String {
    render_plain(text)
}

/// Minimal transform: escape markup and keep line breaks
pub fn render_plain(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

#[cfg(feature = "markdown")]
mod markdown {
    use super::{escape_html, LINK_ATTRIBUTES};
    use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd};
    use std::fmt;

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options
    }

    /// Opening anchor tag. The destination is attribute-escaped only, so a
    /// browser reads back the exact URL the author wrote.
    fn open_anchor(link_type: LinkType, dest_url: &str, title: &str) -> String {
        let href = if link_type == LinkType::Email && !dest_url.starts_with("mailto:") {
            format!("mailto:{dest_url}")
        } else {
            dest_url.to_string()
        };
        let mut tag = format!("<a href=\"{}\" {LINK_ATTRIBUTES}", escape_html(&href));
        if !title.is_empty() {
            tag.push_str(&format!(" title=\"{}\"", escape_html(title)));
        }
        tag.push('>');
        tag
    }

    pub(super) fn to_html(text: &str) -> Result<String, fmt::Error> {
        let events = Parser::new_ext(text, options()).map(|event| match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            }) => Event::InlineHtml(CowStr::from(open_anchor(link_type, &dest_url, &title))),
            Event::End(TagEnd::Link) => Event::InlineHtml(CowStr::Borrowed("</a>")),
            // Author-supplied markup is displayed, never interpreted
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::write_html_fmt(&mut out, events)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_empty_input() {
        assert_eq!(render_markdown(None), "");
        assert_eq!(render_markdown(Some("")), "");
    }

    #[test]
    fn test_plain_fallback() {
        assert_eq!(render_plain("a\nb"), "a<br>b");
        assert_eq!(
            render_plain("<script>x</script>"),
            "&lt;script&gt;x&lt;/script&gt;"
        );
    }

    #[cfg(feature = "markdown")]
    mod markdown_tests {
        use super::super::*;
        use proptest::prelude::*;

        #[test]
        fn test_javascript_href_preserved_with_safety_attributes() {
            let html = render_markdown(Some("[x](javascript:alert(1))"));
            assert!(
                html.contains(r#"<a href="javascript:alert(1)" target="_blank" rel="noopener noreferrer">x</a>"#),
                "got: {html}"
            );
        }

        #[test]
        fn test_every_anchor_rewritten() {
            let text = "See [one](https://a.example/x?y=1&z=2), [two](https://b.example) \
                        and <https://c.example/auto>.\n\n- [three](/relative \"Title\")";
            let html = render_markdown(Some(text));
            assert_eq!(html.matches("<a ").count(), 4);
            assert_eq!(html.matches(LINK_ATTRIBUTES).count(), 4);
            assert!(html.contains(r#"href="https://a.example/x?y=1&amp;z=2""#));
            assert!(html.contains(r#"href="https://c.example/auto""#));
            assert!(html.contains(r#"title="Title""#));
        }

        #[test]
        fn test_email_autolink_gets_mailto() {
            let html = render_markdown(Some("<someone@example.com>"));
            assert!(html.contains(r#"href="mailto:someone@example.com""#));
            assert!(html.contains(LINK_ATTRIBUTES));
        }

        #[test]
        fn test_raw_html_is_escaped() {
            let html = render_markdown(Some("hi <a href=\"https://x\">raw</a>\n\n<script>alert(1)</script>"));
            assert!(!html.contains("<script>"));
            assert!(!html.contains("<a href=\"https://x\">"));
            assert!(html.contains("&lt;script&gt;"));
        }

        #[test]
        fn test_basic_markdown() {
            let html = render_markdown(Some("# Title\n\n**bold** and `code`"));
            assert!(html.contains("<h1>Title</h1>"));
            assert!(html.contains("<strong>bold</strong>"));
            assert!(html.contains("<code>code</code>"));
        }

        proptest! {
            #[test]
            fn prop_link_destination_survives(
                label in "[a-zA-Z0-9 ]{1,20}",
                url in "[a-zA-Z][a-zA-Z0-9+.-]{0,8}:[a-zA-Z0-9/?=._~%#-]{1,40}",
            ) {
                let html = render_markdown(Some(&format!("[{}]({url})", label.trim_end())));
                let expected = format!("<a href=\"{url}\" {LINK_ATTRIBUTES}");
                prop_assert!(html.contains(&expected), "missing {} in {}", expected, html);
            }
        }
    }
}
