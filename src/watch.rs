//! File system watcher for rebuild-on-change.
//!
//! Watches the source tree and re-runs the full build when a batch of
//! changes settles. There is no incremental rebuild: the model is cheap
//! full builds, debounced so editor save storms collapse into one run.
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                 Event Loop                     │
//! │                                                │
//! │  ┌──────────┐   ┌───────────┐   ┌───────────┐  │
//! │  │ notify   │──▶│ Debouncer │──▶│ full      │  │
//! │  │ events   │   │ + cooldown│   │ rebuild   │  │
//! │  └──────────┘   └───────────┘   └───────────┘  │
//! └────────────────────────────────────────────────┘
//! ```

use crate::build::build_site;
use crate::env::BuildEnvironment;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Quiet period after a successful rebuild during which new events are
/// dropped, so our own follow-up noise does not immediately retrigger.
const REBUILD_COOLDOWN: Duration = Duration::from_millis(800);

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events with debouncing and rebuild cooldown.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
    debounce: Duration,
}

impl Debouncer {
    fn new(debounce: Duration) -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            last_rebuild: None,
            debounce,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_rebuild
            .is_some_and(|t| t.elapsed() < REBUILD_COOLDOWN)
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        if !self.pending.is_empty() {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= self.debounce)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn mark_rebuild(&mut self) {
        self.last_rebuild = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            self.debounce
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Run a full build, reporting failures without ending the watch session.
fn run_build(env: &'static BuildEnvironment) -> bool {
    match build_site(env) {
        Ok(()) => true,
        Err(e) => {
            env.logger().log("error", format!("build failed: {e:#}"));
            false
        }
    }
}

/// Build once, then block watching the source tree, rebuilding on change.
pub fn watch_and_build(env: &'static BuildEnvironment, debounce: Duration) -> Result<()> {
    run_build(env);

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("failed to create file watcher")?;
    watcher
        .watch(env.source_root(), RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", env.source_root().display()))?;

    env.logger().log(
        "watch",
        format!("watching {} (ctrl-c to stop)", env.source_root().display()),
    );

    let mut debouncer = Debouncer::new(debounce);

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event);
            }
            Ok(Err(e)) => env.logger().log("watch", format!("error: {e}")),
            Err(mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                let changed = debouncer.take();
                env.logger()
                    .log("watch", format!("{} change(s), rebuilding", changed.len()));
                if run_build(env) {
                    debouncer.mark_rebuild();
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
            // Other cases: irrelevant events, timeout without ready, etc.
            _ => {}
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
