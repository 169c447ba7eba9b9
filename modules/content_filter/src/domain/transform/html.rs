//! HTML rewriting for the strip, markdown and custom modes
//!
//! Input is parsed as an HTML fragment, so tag and attribute boundaries are
//! whatever the HTML tokenizer decides, quotes and stray brackets included.
//! Text produced by the strip and markdown modes keeps `&`, `<` and `>`
//! entity-escaped, so the output never contains markup of its own.

// Whitespace patterns are literals; a failure to compile is a programming error.
#![allow(clippy::expect_used)]

use super::{ContentTransformer, TransformError};
use crate::contract::{FilterMode, FilterOptions};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::collections::{BTreeSet, HashMap, HashSet};

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("whitespace pattern compiles")
}

static NEWLINE_RUN: Lazy<Regex> = Lazy::new(|| pattern(r"[ \t]*(?:\n[ \t]*)+"));
static HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| pattern(r"[ \t]+"));
static ANY_SPACE: Lazy<Regex> = Lazy::new(|| pattern(r"\s+"));
static TRAILING_SPACE: Lazy<Regex> = Lazy::new(|| pattern(r"[ \t]+\n"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| pattern(r"\n{3,}"));

/// Elements dropped together with everything inside them
const NON_CONTENT: &[&str] = &["script", "style", "template"];

/// Elements that become a line break in strip_all
const LINE_BREAK_TAGS: &[&str] = &[
    "p", "div", "br", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol",
];

/// Elements that become a paragraph break in markdown
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "blockquote", "section", "article", "header", "footer", "table", "tr",
];

const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Tag attributes that survive custom filtering, per tag
const SAFE_ATTRIBUTES: &[(&str, &[&str])] =
    &[("a", &["href", "title"]), ("img", &["src", "alt", "title"])];

/// Parser-backed transformer for all filter modes
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTransformer;

impl ContentTransformer for HtmlTransformer {
    fn transform(
        &self,
        raw: &str,
        mode: FilterMode,
        options: &FilterOptions,
    ) -> Result<String, TransformError> {
        let output = match mode {
            FilterMode::None => raw.to_string(),
            FilterMode::StripAll => strip_all(raw, options.preserve_line_breaks),
            FilterMode::Markdown => to_markdown(raw, options),
            FilterMode::Custom => filter_custom(raw, &options.custom_allowed_tags),
        };
        Ok(output)
    }
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// Remove all markup
///
/// With `preserve_line_breaks`, block-level elements become a single newline
/// and runs of blank lines collapse to one newline; otherwise all whitespace
/// collapses to single spaces.
pub fn strip_all(html: &str, preserve_line_breaks: bool) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::new();
    collect_text(fragment.root_element(), preserve_line_breaks, &mut text);

    if preserve_line_breaks {
        let text = NEWLINE_RUN.replace_all(&text, "\n");
        HORIZONTAL_SPACE.replace_all(&text, " ").trim().to_string()
    } else {
        ANY_SPACE.replace_all(&text, " ").trim().to_string()
    }
}

fn collect_text(element: ElementRef<'_>, preserve_line_breaks: bool, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => escape_into(text, out),
            Node::Element(el) => {
                let name = el.name();
                if NON_CONTENT.contains(&name) {
                    continue;
                }
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let line_break = preserve_line_breaks && LINE_BREAK_TAGS.contains(&name);
                if line_break {
                    out.push('\n');
                }
                collect_text(child, preserve_line_breaks, out);
                if line_break {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn single_line(text: &str) -> String {
    ANY_SPACE.replace_all(text.trim(), " ").into_owned()
}

/// Convert markup to Markdown
///
/// Each conversion is gated by its option; disabled markup is stripped
/// with its text kept.
pub fn to_markdown(html: &str, options: &FilterOptions) -> String {
    let fragment = Html::parse_fragment(html);
    let md = MarkdownWriter { options }.children(fragment.root_element());

    let md = TRAILING_SPACE.replace_all(&md, "\n");
    EXCESS_NEWLINES.replace_all(&md, "\n\n").trim().to_string()
}

struct MarkdownWriter<'o> {
    options: &'o FilterOptions,
}

impl MarkdownWriter<'_> {
    fn children(&self, element: ElementRef<'_>) -> String {
        let mut out = String::new();
        for child in element.children() {
            match child.value() {
                Node::Text(text) => escape_into(&text.replace('\u{a0}', " "), &mut out),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        out.push_str(&self.element(child));
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn element(&self, element: ElementRef<'_>) -> String {
        let options = self.options;
        let name = element.value().name();

        if NON_CONTENT.contains(&name) {
            return String::new();
        }
        if let Some(index) = HEADINGS.iter().position(|heading| *heading == name) {
            let text = single_line(&self.children(element));
            return if options.convert_headings {
                format!("\n\n{} {}\n\n", "#".repeat(index + 1), text)
            } else {
                format!("\n\n{text}\n\n")
            };
        }

        match name {
            "strong" | "b" if options.convert_emphasis => {
                wrap_inline(&self.children(element), "**")
            }
            "em" | "i" if options.convert_emphasis => wrap_inline(&self.children(element), "_"),
            "a" if options.convert_links => {
                let href = element.value().attr("href").map_or("", str::trim);
                let text = single_line(&self.children(element));
                match (href.is_empty(), text.is_empty()) {
                    (true, _) => text,
                    (false, true) => format!("[{href}]({href})"),
                    (false, false) => format!("[{text}]({href})"),
                }
            }
            "li" => {
                let text = single_line(&self.children(element));
                if options.convert_lists {
                    format!("- {text}\n")
                } else {
                    format!("{text}\n")
                }
            }
            "ul" | "ol" => format!("\n{}\n", self.children(element)),
            "pre" if options.convert_code => {
                let code: String = element.text().collect();
                format!("\n\n```\n{}\n```\n\n", code.trim_matches('\n'))
            }
            "code" if options.convert_code => {
                let code: String = element.text().collect();
                format!("`{code}`")
            }
            "br" => "\n".to_string(),
            _ if name == "pre" || BLOCK_TAGS.contains(&name) => {
                format!("\n\n{}\n\n", self.children(element))
            }
            _ => self.children(element),
        }
    }
}

fn wrap_inline(inner: &str, marker: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        inner.to_string()
    } else {
        format!("{marker}{trimmed}{marker}")
    }
}

/// Parse a comma-separated tag allowlist
pub fn parse_allowlist(tags: &str) -> BTreeSet<String> {
    tags.split(',')
        .map(|tag| tag.trim().to_ascii_lowercase())
        .filter(|tag| !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric()))
        .collect()
}

/// Keep only allowlisted tags
///
/// Surviving tags carry only a small set of safe attributes; removed tags
/// disappear with every attribute they had. Script, style and template
/// elements are always dropped with their content. An empty allowlist
/// behaves like `strip_all` with line breaks preserved.
pub fn filter_custom(html: &str, allowed_tags: &str) -> String {
    let allowed = parse_allowlist(allowed_tags);
    if allowed.is_empty() {
        return strip_all(html, true);
    }

    let tags: HashSet<&str> = allowed
        .iter()
        .map(String::as_str)
        .filter(|tag| !NON_CONTENT.contains(tag))
        .collect();
    let attributes: HashMap<&str, HashSet<&str>> = SAFE_ATTRIBUTES
        .iter()
        .filter(|(tag, _)| tags.contains(tag))
        .map(|(tag, permitted)| (*tag, permitted.iter().copied().collect()))
        .collect();

    let cleaned = ammonia::Builder::default()
        .tags(tags)
        .generic_attributes(HashSet::new())
        .tag_attributes(attributes)
        .link_rel(None)
        .clean_content_tags(NON_CONTENT.iter().copied().collect())
        .clean(html)
        .to_string();

    EXCESS_NEWLINES.replace_all(&cleaned, "\n\n").trim().to_string()
}
