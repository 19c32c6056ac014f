//! Message rendering.
//!
//! Renderers only ever see a `Projection`: the named fields plus `body`.
//! Malformed body entries are skipped, never an error.

use lazy_static::lazy_static;
use regex::Regex;

use crate::submission::{value_to_string, BodyValue, Projection};

lazy_static! {
    static ref LINE_BREAKS: Regex = Regex::new(r"(?i)<br\s*/?>|</(p|div|tr|h[1-6]|li)>").unwrap();
    static ref TAGS: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref BLANK_RUNS: Regex = Regex::new(r"\n{3,}").unwrap();
}

pub trait Renderer: Send + Sync {
    fn render_html(&self, projection: &Projection) -> anyhow::Result<String>;

    /// Plain-text part. `None` asks the caller to derive it from the markup.
    fn render_text(&self, _projection: &Projection) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Table layout of the named fields followed by body entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRenderer;

impl DefaultRenderer {
    fn rows(projection: &Projection) -> Vec<(String, RenderedValue)> {
        let mut rows = Vec::new();
        for (label, value) in [
            ("Name", &projection.name),
            ("Email", &projection.email),
            ("Phone", &projection.phone),
            ("Subject", &projection.subject),
            ("Message", &projection.message),
        ] {
            if !value.trim().is_empty() {
                rows.push((label.to_string(), RenderedValue::Plain(value.clone())));
            }
        }

        for (key, entry) in &projection.body {
            if !entry.is_well_formed() {
                log::debug!("BODY_ENTRY_SKIPPED key={} reason=malformed", key);
                continue;
            }
            let rendered = match entry {
                BodyValue::Scalar(v) => RenderedValue::Plain(value_to_string(v)),
                BodyValue::Pair { text, html } => RenderedValue::Pair {
                    text: text.clone(),
                    html: html.clone(),
                },
            };
            rows.push((key.clone(), rendered));
        }
        rows
    }
}

enum RenderedValue {
    Plain(String),
    Pair { text: String, html: String },
}

impl Renderer for DefaultRenderer {
    fn render_html(&self, projection: &Projection) -> anyhow::Result<String> {
        let mut out = String::from("<table>\n");
        for (label, value) in Self::rows(projection) {
            let cell = match value {
                RenderedValue::Plain(s) => escape_html(&s).replace('\n', "<br>"),
                RenderedValue::Pair { html, .. } if !html.is_empty() => html,
                RenderedValue::Pair { text, .. } => escape_html(&text).replace('\n', "<br>"),
            };
            out.push_str(&format!(
                "<tr><th>{}</th><td>{}</td></tr>\n",
                escape_html(&label),
                cell
            ));
        }
        out.push_str("</table>\n");
        Ok(out)
    }

    fn render_text(&self, projection: &Projection) -> anyhow::Result<Option<String>> {
        let mut out = String::new();
        for (label, value) in Self::rows(projection) {
            let text = match value {
                RenderedValue::Plain(s) => s,
                RenderedValue::Pair { text, .. } if !text.is_empty() => text,
                RenderedValue::Pair { html, .. } => html_to_text(&html),
            };
            out.push_str(&format!("{}: {}\n", label, text));
        }
        Ok(Some(out))
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Derive a plain-text body from markup.
pub fn html_to_text(html: &str) -> String {
    let text = LINE_BREAKS.replace_all(html, "\n");
    let text = TAGS.replace_all(&text, "");
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}
