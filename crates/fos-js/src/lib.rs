//! fOS JavaScript Host
//!
//! QuickJS-based host that runs browser-targeting game scripts against
//! native canvas surfaces.
//!
//! Features:
//! - QuickJS runtime via rquickjs
//! - Console API (log, info, warn, error, debug)
//! - window/document/canvas/Image stand-ins and a 2D context
//! - requestAnimationFrame, window.onload and script insertion queues
//! - In-memory localStorage
//! - Frame handoff with a native render thread

mod bridge;
mod builtins;
mod console;
mod context2d;
mod dom;
mod handle;
mod host;
mod queue;
mod runloop;
mod storage;

use std::path::{Path, PathBuf};

pub use dom::{ElementKind, EventType};
pub use host::Host;
pub use queue::{CallbackQueue, FrameQueue, SKIPPED_SCRIPTS, ScriptEntry, ScriptQueue};
pub use runloop::{FrameDone, FrameLink, FrameStart, InputEvent, RenderLink, RunState, frame_channel};
pub use storage::Storage;

/// Font used for all text, relative to the project directory
pub const DEFAULT_FONT: &str = "fonts/mplus-1m-regular.ttf";

/// Host error
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Canvas(#[from] fos_canvas::CanvasError),

    #[error(transparent)]
    Text(#[from] fos_text::TextError),

    #[error("not supported event type: {0}")]
    UnsupportedEventType(String),

    #[error("not supported {what}: {name}")]
    UnsupportedMode { what: &'static str, name: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data file {path}: {source}")]
    Data {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{script}: {message}{}", location(.file, .line))]
    ScriptRuntime {
        script: String,
        message: String,
        file: Option<String>,
        line: Option<u32>,
        stack: Option<String>,
    },

    #[error("JavaScript engine error: {0}")]
    Engine(String),

    #[error("render thread disconnected")]
    Disconnected,
}

fn location(file: &Option<String>, line: &Option<u32>) -> String {
    match (file, line) {
        (Some(file), Some(line)) => format!(" ({file}:{line})"),
        (Some(file), None) => format!(" ({file})"),
        _ => String::new(),
    }
}

impl From<rquickjs::Error> for HostError {
    fn from(e: rquickjs::Error) -> Self {
        HostError::Engine(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HostError>;

/// Host configuration, passed explicitly to [`Host::new`]
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Root for scripts, images and data files
    pub project_dir: PathBuf,
    /// Font to load at startup; `None` leaves text drawing unavailable
    /// until [`Host::set_font`]
    pub font_path: Option<PathBuf>,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl HostConfig {
    /// 816x624 screen and the default font under `project_dir`
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        let project_dir = project_dir.as_ref().to_path_buf();
        Self {
            font_path: Some(project_dir.join(DEFAULT_FONT)),
            project_dir,
            screen_width: 816,
            screen_height: 624,
        }
    }

    pub fn with_screen_size(mut self, width: u32, height: u32) -> Self {
        self.screen_width = width;
        self.screen_height = height;
        self
    }

    pub fn without_font(mut self) -> Self {
        self.font_path = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::new("/games/demo");
        assert_eq!(config.font_path.unwrap(), Path::new("/games/demo/fonts/mplus-1m-regular.ttf"));
        assert_eq!((config.screen_width, config.screen_height), (816, 624));
    }

    #[test]
    fn test_script_error_display() {
        let err = HostError::ScriptRuntime {
            script: "js/main.js".into(),
            message: "ReferenceError: foo is not defined".into(),
            file: Some("main.js".into()),
            line: Some(3),
            stack: None,
        };
        assert_eq!(
            err.to_string(),
            "js/main.js: ReferenceError: foo is not defined (main.js:3)"
        );
    }
}
