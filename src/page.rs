//! Standalone preview page: markdown in, HTML page with live blocks out.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag};
use std::fmt::Write;
use tracing::debug;

use crate::config::PreviewConfig;
use crate::error::LiveHtmlResult;
use crate::host::{host_listener_script, HostView};

/// Render `markdown` to a full HTML page. Fenced blocks tagged with
/// `config.fence_language` become live surfaces; everything else is plain
/// markdown output.
pub fn render_markdown_page(markdown: &str, config: &PreviewConfig) -> LiveHtmlResult<String> {
    let mut view = HostView::new(config.clone())?;
    let body = render_markdown_body(markdown, &mut view)?;
    let blocks = view.coordinator().containers().count();
    debug!(blocks, "rendered preview page");

    let mut html = String::new();
    write!(
        html,
        r#"<!DOCTYPE html>
<html lang="{}">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Live HTML Preview</title>
</head>
<body>
{}
<script>{}</script>
</body>
</html>
"#,
        config.renderer.language,
        body,
        host_listener_script(&config.host),
    )?;
    Ok(html)
}

/// Markdown to HTML, mounting one surface in `view` per live block.
pub fn render_markdown_body(markdown: &str, view: &mut HostView) -> LiveHtmlResult<String> {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);

    let fence = view.config().fence_language.clone();
    let mut events: Vec<Event> = Vec::new();
    let mut live: Option<String> = None;

    for event in Parser::new_ext(markdown, opts) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info)))
                if info.split_whitespace().next() == Some(fence.as_str()) =>
            {
                live = Some(String::new());
            }
            Event::Text(ref text) if live.is_some() => {
                if let Some(source) = live.as_mut() {
                    source.push_str(text);
                }
            }
            Event::End(Tag::CodeBlock(_)) if live.is_some() => {
                let source = live.take().unwrap_or_default();
                let block = view.render_block(&source)?;
                events.push(Event::Html(CowStr::from(block.iframe_html)));
            }
            other => events.push(other),
        }
    }

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, events.into_iter());
    Ok(html)
}
