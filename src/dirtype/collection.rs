//! Chronological collection processor.
//!
//! A directory declaring `type: collection` treats its directly-contained
//! files matching the `YYYY-MM-DD-HH-MM-<slug>.<ext>` convention as an
//! ordered series. Processing runs in phases with a hard barrier between
//! them:
//!
//! 1. scan and parse item filenames (non-matching files are excluded, not
//!    errored);
//! 2. sort ascending by timestamp, ties broken by filename;
//! 3. materialize every item's body, so later renders can reference any
//!    sibling without re-reading disk;
//! 4. write each item through the `post_renderer` template (`post` in
//!    context);
//! 5. write the `index_renderer` template to its own mapped output path
//!    with the full ordered list (`posts` in context);
//! 6. optionally copy non-matching files through the default per-file path
//!    (`copy_others: true`);
//! 7. recurse into subdirectories.
//!
//! Renderer paths in the metadata are source-root-relative and normally
//! point at reserved (`_`-prefixed) template documents, which only this
//! strategy touches.

use super::{DirectoryProcessor, TypeHandler, dispatch_subdirectories, visible_entries};
use crate::env::{BuildEnvironment, empty_context, rel_url};
use crate::meta::DirectoryMetadata;
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use minijinja::{Value, context};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const COLLECTION_TYPE: &str = "collection";

const POST_RENDERER_KEY: &str = "post_renderer";
const INDEX_RENDERER_KEY: &str = "index_renderer";
const COPY_OTHERS_KEY: &str = "copy_others";

/// Fixed positional numeric groups: year, month, day, hour, minute, slug.
static ITEM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})-(\d{2})-(\d{2})-([^.]+)").expect("hardcoded pattern")
});

pub struct CollectionTypeHandler;

impl TypeHandler for CollectionTypeHandler {
    fn matches(&self, _dir: &Path, meta: &DirectoryMetadata) -> bool {
        meta.kind.as_deref() == Some(COLLECTION_TYPE)
    }

    fn load(
        &self,
        env: &'static BuildEnvironment,
        dir: &Path,
        meta: DirectoryMetadata,
    ) -> Result<Box<dyn DirectoryProcessor>> {
        Ok(Box::new(CollectionProcessor {
            env,
            dir: dir.to_path_buf(),
            meta,
        }))
    }
}

/// One file in the ordered series.
#[derive(Debug, Clone)]
pub struct CollectionItem {
    pub posted: NaiveDateTime,
    pub slug: String,
    pub file_name: String,
    pub source: PathBuf,
    pub url: String,
    /// Rendered body, materialized before any item or index render runs.
    pub body: String,
}

impl CollectionItem {
    fn to_value(&self) -> Value {
        context! {
            slug => self.slug.clone(),
            posted => self.posted.format("%Y-%m-%d %H:%M").to_string(),
            url => self.url.clone(),
            body => Value::from_safe_string(self.body.clone()),
        }
    }
}

/// Parse the timestamp and slug out of an item filename. `None` means the
/// file is not part of the collection.
fn parse_item_name(name: &str) -> Option<(NaiveDateTime, String)> {
    let caps = ITEM_PATTERN.captures(name)?;

    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let date = NaiveDate::from_ymd_opt(num(1)? as i32, num(2)?, num(3)?)?;
    let time = NaiveTime::from_hms_opt(num(4)?, num(5)?, 0)?;

    Some((NaiveDateTime::new(date, time), caps[6].to_owned()))
}

pub struct CollectionProcessor {
    env: &'static BuildEnvironment,
    dir: PathBuf,
    meta: DirectoryMetadata,
}

impl DirectoryProcessor for CollectionProcessor {
    fn process(&self) -> Result<()> {
        let (files, dirs) = visible_entries(&self.dir)?;

        // Phase 1: scan.
        let mut items = Vec::new();
        let mut claimed = BTreeSet::new();
        for file in &files {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((posted, slug)) = parse_item_name(name) else {
                continue;
            };
            claimed.insert(file.clone());
            items.push(CollectionItem {
                posted,
                slug,
                file_name: name.to_owned(),
                source: file.clone(),
                url: rel_url(&self.env.map_path(file)?),
                body: String::new(),
            });
        }
        self.env.logger().debug(
            "collection",
            format!("{}: {} item(s)", self.dir.display(), items.len()),
        );

        // Phase 2: total order.
        items.sort_by(|a, b| {
            a.posted
                .cmp(&b.posted)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        // Phase 3: materialize every body before any render runs.
        for item in &mut items {
            let doc = self.env.resolve(&item.source)?;
            item.body = doc.fragment(&empty_context())?;
        }

        // Phase 4: each item through the post renderer.
        let post_renderer = self.meta.require_path(&self.dir, POST_RENDERER_KEY)?;
        let renderer = self.env.resolve(&post_renderer)?;
        for item in &items {
            let out = self.env.output_path(&item.source)?;
            renderer.write_to(&out, &context! { post => item.to_value() })?;
        }

        // Phase 5: the index, with the full ordered list in context.
        let index_renderer = self.meta.require_path(&self.dir, INDEX_RENDERER_KEY)?;
        let index = self.env.resolve(&index_renderer)?;
        let index_out = self.env.output_path(&index_renderer)?;
        let posts: Vec<Value> = items.iter().map(CollectionItem::to_value).collect();
        index.write_to(&index_out, &context! { posts => posts })?;

        // Phase 6: optional passthrough for non-matching files.
        if self.meta.bool_key(COPY_OTHERS_KEY) {
            for file in files.iter().filter(|f| !claimed.contains(*f)) {
                let doc = self.env.resolve(file)?;
                doc.write_to(&self.env.output_path(file)?, &empty_context())?;
            }
        }

        dispatch_subdirectories(self.env, &dirs)
    }
}
