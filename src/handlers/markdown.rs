//! Markdown conversion handler.
//!
//! Converts `*.md` files to HTML with footnotes, fenced code blocks, and
//! generated heading ids. On the full render path, the converter looks for a
//! reserved auto template (`_auto-md.tmpl`) from the file's directory upward
//! to the source root — nearest ancestor wins — and, when found, renders it
//! with the converted body as the `content` variable. Without one the raw
//! conversion is emitted. `fragment` is always the raw conversion.

use super::{ContentHandler, Document};
use crate::env::{BuildEnvironment, Context};
use crate::error::BuildError;
use anyhow::Result;
use minijinja::{Value, context};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const MARKDOWN_EXT: &str = "md";

/// Reserved per-tree wrapper template for converted markdown.
pub const AUTO_TEMPLATE: &str = "_auto-md.tmpl";

pub struct MarkdownHandler {
    env: &'static BuildEnvironment,
}

impl MarkdownHandler {
    pub fn new(env: &'static BuildEnvironment) -> Self {
        Self { env }
    }
}

impl ContentHandler for MarkdownHandler {
    fn matches(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == MARKDOWN_EXT)
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Document>> {
        Ok(Box::new(MarkdownDocument {
            env: self.env,
            source: path.to_path_buf(),
            converted: OnceLock::new(),
        }))
    }
}

pub struct MarkdownDocument {
    env: &'static BuildEnvironment,
    source: PathBuf,
    /// Converted HTML, filled on first use.
    converted: OnceLock<String>,
}

impl MarkdownDocument {
    fn converted(&self) -> Result<&str> {
        if let Some(html) = self.converted.get() {
            return Ok(html);
        }
        let text =
            fs::read_to_string(&self.source).map_err(|e| BuildError::io(&self.source, e))?;
        let html = convert(&text);
        Ok(self.converted.get_or_init(|| html))
    }

    /// Walk from the file's directory up to the source root (inclusive)
    /// looking for the auto template. Nearest ancestor wins.
    fn find_auto_template(&self) -> Option<PathBuf> {
        let root = self.env.source_root();
        let mut dir = self.source.parent()?;
        loop {
            let candidate = dir.join(AUTO_TEMPLATE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if dir == root {
                return None;
            }
            dir = dir.parent()?;
        }
    }
}

impl Document for MarkdownDocument {
    fn source(&self) -> &Path {
        &self.source
    }

    fn render(&self, ctx: &Context) -> Result<Vec<u8>> {
        let body = self.converted()?;
        match self.find_auto_template() {
            Some(template_path) => {
                let template = self.env.resolve(&template_path)?;
                let merged = context! {
                    content => Value::from_safe_string(body.to_owned()),
                    ..ctx.clone()
                };
                Ok(template.fragment(&merged)?.into_bytes())
            }
            None => Ok(body.as_bytes().to_vec()),
        }
    }

    fn fragment(&self, _ctx: &Context) -> Result<String> {
        Ok(self.converted()?.to_owned())
    }
}

// ============================================================================
// Conversion
// ============================================================================

/// Convert markdown text to HTML.
///
/// Headings without an explicit id get one generated from their text;
/// repeats within one document are suffixed `-1`, `-2`, … in order.
pub(crate) fn convert(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);

    let events: Vec<Event<'_>> = Parser::new_ext(text, options).collect();
    let mut seen = BTreeMap::<String, usize>::new();
    let mut out: Vec<Event<'_>> = Vec::with_capacity(events.len());

    for (idx, event) in events.iter().enumerate() {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let id = match id {
                    Some(existing) => Some(existing.clone()),
                    None => {
                        let text = heading_text(&events[idx + 1..]);
                        Some(CowStr::from(unique_slug(heading_slug(&text), &mut seen)))
                    }
                };
                out.push(Event::Start(Tag::Heading {
                    level: *level,
                    id,
                    classes: classes.clone(),
                    attrs: attrs.clone(),
                }));
            }
            other => out.push(other.clone()),
        }
    }

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, out.into_iter());
    html
}

/// Collect the text content of a heading, up to its end tag.
fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::End(TagEnd::Heading(_)) => break,
            _ => {}
        }
    }
    text
}

/// Kebab-case a heading's text for use as an anchor id.
fn heading_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "section".to_owned()
    } else {
        slug
    }
}

fn unique_slug(slug: String, seen: &mut BTreeMap<String, usize>) -> String {
    let count = seen.entry(slug.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        slug
    } else {
        format!("{slug}-{}", *count - 1)
    }
}
