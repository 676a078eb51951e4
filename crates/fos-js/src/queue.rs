//! Script and callback queues
//!
//! The run loop owns these; scripts only reach them through bound
//! natives, so ordering does not depend on script-visible state.

use std::collections::VecDeque;

/// Bundled scripts replaced by native equivalents
pub const SKIPPED_SCRIPTS: &[&str] = &[
    "js/libs/pixi.js",
    "js/libs/pixi-tilemap.js",
    "js/libs/pixi-picture.js",
    "js/libs/fpsmeter.js",
    "js/libs/iphone-inline-video.browser.js",
];

/// A pending script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEntry {
    /// Path relative to the project directory
    File(String),
    /// Source handed over directly, with a name for error reports
    Inline { name: String, source: String },
}

impl ScriptEntry {
    /// Name used in logs and errors
    pub fn name(&self) -> &str {
        match self {
            Self::File(path) => path,
            Self::Inline { name, .. } => name,
        }
    }
}

/// FIFO of scripts
#[derive(Debug, Default)]
pub struct ScriptQueue {
    pending: VecDeque<ScriptEntry>,
}

impl ScriptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` unless it is skip-listed. Returns whether it was queued.
    pub fn enqueue(&mut self, path: &str) -> bool {
        let normalized = path.trim_start_matches("./");
        if SKIPPED_SCRIPTS.contains(&normalized) {
            tracing::debug!(script = path, "skipping replaced script");
            return false;
        }
        self.pending.push_back(ScriptEntry::File(path.to_string()));
        true
    }

    /// Append inline source; never skipped
    pub fn enqueue_inline(&mut self, name: &str, source: &str) {
        self.pending.push_back(ScriptEntry::Inline {
            name: name.to_string(),
            source: source.to_string(),
        });
    }

    pub fn pop(&mut self) -> Option<ScriptEntry> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// FIFO of deferred callbacks, run one at a time
#[derive(Debug)]
pub struct CallbackQueue<T> {
    pending: VecDeque<T>,
}

impl<T> CallbackQueue<T> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, callback: T) {
        self.pending.push_back(callback);
    }

    /// Oldest callback
    pub fn pop(&mut self) -> Option<T> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<T> Default for CallbackQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Animation-frame callbacks.
///
/// Each tick takes the whole list; callbacks registered while the
/// snapshot runs land in the next tick.
#[derive(Debug)]
pub struct FrameQueue<T> {
    pending: Vec<T>,
}

impl<T> FrameQueue<T> {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    pub fn push(&mut self, callback: T) {
        self.pending.push(callback);
    }

    /// Take every registered callback, leaving the list empty
    pub fn take_snapshot(&mut self) -> Vec<T> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
