//! Template handler.
//!
//! Loads `*.tmpl` files through a shared minijinja environment whose loader
//! is rooted at the source directory. The build exposes itself to templates
//! through explicit globals rather than ambient state:
//!
//! - `grab(path)` — resolve another source file through the content handler
//!   chain and embed its fragment rendering. Re-entrant; guarded by a fixed
//!   recursion depth so a cyclic grab fails loudly instead of hanging.
//! - `select(html, selector)` — structural query over an HTML string
//!   (`tag`, `#id`, `.class` forms), returning matching outer HTML.
//! - `glob(pattern)` — source-relative paths matching a glob pattern.
//! - `url_for(path)` — a source path's mapped output-relative url.
//!
//! A `markdown` filter runs text through the markup converter after common
//! leading indentation is stripped, so `{% filter markdown %}` blocks can be
//! indented to match the surrounding template.

use super::{ContentHandler, Document};
use crate::env::{BuildEnvironment, Context, empty_context, rel_url};
use crate::error::BuildError;
use crate::utils::html;
use anyhow::{Result, anyhow};
use minijinja::{Environment, ErrorKind, Value, context, path_loader};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const TEMPLATE_EXT: &str = "tmpl";

/// Depth bound for re-entrant grabs. Generous for legitimate nesting;
/// a cycle trips it long before the stack is in danger.
const MAX_GRAB_DEPTH: usize = 32;

thread_local! {
    static GRAB_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// RAII guard for the grab depth counter.
struct DepthGuard;

impl DepthGuard {
    fn enter(path: &Path) -> Result<Self, minijinja::Error> {
        let depth = GRAB_DEPTH.get();
        if depth >= MAX_GRAB_DEPTH {
            let err = BuildError::RecursionLimit {
                path: path.to_path_buf(),
                depth: MAX_GRAB_DEPTH,
            };
            return Err(minijinja::Error::new(
                ErrorKind::InvalidOperation,
                err.to_string(),
            ));
        }
        GRAB_DEPTH.set(depth + 1);
        Ok(Self)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        GRAB_DEPTH.set(GRAB_DEPTH.get().saturating_sub(1));
    }
}

pub struct TemplateHandler {
    env: &'static BuildEnvironment,
    /// Shared engine, rebuilt at the start of every build run so template
    /// edits are picked up across watch rebuilds.
    jinja: RwLock<Arc<Environment<'static>>>,
}

impl TemplateHandler {
    pub fn new(env: &'static BuildEnvironment) -> Self {
        Self {
            env,
            jinja: RwLock::new(Arc::new(make_engine(env))),
        }
    }

    fn engine(&self) -> Result<Arc<Environment<'static>>> {
        self.jinja
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| anyhow!("template engine lock poisoned"))
    }
}

impl ContentHandler for TemplateHandler {
    fn matches(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == TEMPLATE_EXT)
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Document>> {
        let rel = self.env.source_rel(path)?;
        Ok(Box::new(TemplateDocument {
            env: self.env,
            jinja: self.engine()?,
            name: rel_url(&rel),
            source: path.to_path_buf(),
        }))
    }

    fn begin_build(&self) {
        if let Ok(mut guard) = self.jinja.write() {
            *guard = Arc::new(make_engine(self.env));
        }
    }
}

/// Build the shared engine: source-rooted loader plus the template globals.
fn make_engine(env: &'static BuildEnvironment) -> Environment<'static> {
    let mut jinja = Environment::new();
    jinja.set_loader(path_loader(env.source_root()));

    jinja.add_function("grab", move |path: String| grab(env, &path));
    jinja.add_function("glob", move |pattern: String| glob_sources(env, &pattern));
    jinja.add_function("url_for", move |path: String| url_for(env, &path));
    jinja.add_function("select", |input: String, selector: String| {
        html::select(&input, &selector)
            .map(Value::from_safe_string)
            .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, format!("{e:#}")))
    });
    jinja.add_filter("markdown", |body: String| {
        Value::from_safe_string(super::markdown::convert(&dedent(&body)))
    });

    jinja
}

// ============================================================================
// Template globals
// ============================================================================

fn to_render_error(err: anyhow::Error) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, format!("{err:#}"))
}

/// Resolve another source file through the dispatch machinery and return
/// its fragment rendering.
fn grab(env: &'static BuildEnvironment, path: &str) -> Result<Value, minijinja::Error> {
    let path = Path::new(path);
    let _guard = DepthGuard::enter(path)?;
    let doc = env.resolve(path).map_err(to_render_error)?;
    let fragment = doc.fragment(&empty_context()).map_err(to_render_error)?;
    Ok(Value::from_safe_string(fragment))
}

/// Source-relative paths matching a glob pattern, in sorted order.
fn glob_sources(env: &'static BuildEnvironment, pattern: &str) -> Result<Value, minijinja::Error> {
    let root = env.source_root();
    let full = root.join(pattern);
    let entries = glob::glob(&full.to_string_lossy())
        .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()))?;

    let mut paths: Vec<String> = entries
        .flatten()
        .filter_map(|p| p.strip_prefix(root).ok().map(rel_url))
        .collect();
    paths.sort();

    Ok(Value::from_serialize(&paths))
}

/// A source path's mapped output-relative url.
fn url_for(env: &'static BuildEnvironment, path: &str) -> Result<Value, minijinja::Error> {
    let mapped = env.map_path(Path::new(path)).map_err(to_render_error)?;
    Ok(Value::from(rel_url(&mapped)))
}

// ============================================================================
// Documents
// ============================================================================

pub struct TemplateDocument {
    env: &'static BuildEnvironment,
    jinja: Arc<Environment<'static>>,
    /// Loader-relative template name (`blog/_post.tmpl`).
    name: String,
    source: PathBuf,
}

impl TemplateDocument {
    fn render_with(&self, ctx: Value) -> Result<String> {
        let template = self
            .jinja
            .get_template(&self.name)
            .map_err(|e| BuildError::template(&self.source, e))?;
        template
            .render(ctx)
            .map_err(|e| BuildError::template(&self.source, e).into())
    }

    fn url(&self) -> Result<String> {
        Ok(rel_url(&self.env.map_path(&self.source)?))
    }
}

impl Document for TemplateDocument {
    fn source(&self) -> &Path {
        &self.source
    }

    /// Full page render: the caller's context plus the page variables
    /// (`source_path`, `url`, `to_root`).
    fn render(&self, ctx: &Context) -> Result<Vec<u8>> {
        let url = self.url()?;
        let page = context! {
            source_path => self.source.display().to_string(),
            url => url.clone(),
            to_root => to_root(&url),
            ..ctx.clone()
        };
        Ok(self.render_with(page)?.into_bytes())
    }

    /// Embeddable render: only `to_root` joins the caller's context, so a
    /// grabbed or auto-applied template does not see another page's
    /// identity.
    fn fragment(&self, ctx: &Context) -> Result<String> {
        let url = self.url()?;
        let page = context! {
            to_root => to_root(&url),
            ..ctx.clone()
        };
        self.render_with(page)
    }
}

/// Relative prefix from a page's output location back to the site root.
fn to_root(url: &str) -> String {
    let depth = url.matches('/').count();
    if depth == 0 {
        ".".to_owned()
    } else {
        vec![".."; depth].join("/")
    }
}

// ============================================================================
// Markdown block dedent
// ============================================================================

/// Strip common leading indentation from a markdown filter block.
///
/// The first line with non-whitespace content fixes the indent width N;
/// every line from there on is stripped of up to N leading spaces. A line
/// with fewer than N leading spaces loses only what it has and its
/// remainder starts at column 0.
fn dedent(body: &str) -> String {
    let mut indent: Option<usize> = None;
    let mut out: Vec<&str> = Vec::new();

    for line in body.lines() {
        if indent.is_none() && !line.trim().is_empty() {
            indent = Some(leading_spaces(line));
        }
        match indent {
            None => out.push(line),
            Some(n) => out.push(&line[leading_spaces(line).min(n)..]),
        }
    }

    out.join("\n")
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}
