//! Script host
//!
//! [`Host`] owns the QuickJS runtime together with every registry the
//! bound natives reach: the surface table, the text renderer, the script
//! and callback queues, listeners and the body's canvases. Nothing is
//! process-global, so several hosts can live side by side.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use fos_canvas::{DrawingState, ResourceTable, Surface};
use fos_text::{Font, TextRenderer};
use rquickjs::context::EvalOptions;
use rquickjs::prelude::Coerced;
use rquickjs::{
    CatchResultExt, CaughtError, Class, Context, Ctx, FromJs, Function, Object, Persistent,
    Runtime, Value,
};

use crate::console::install_console;
use crate::context2d::CanvasState;
use crate::dom::{BodyLayers, EventListeners};
use crate::handle::ReleaseQueue;
use crate::queue::{CallbackQueue, FrameQueue, ScriptEntry, ScriptQueue};
use crate::runloop::RunState;
use crate::storage::{Storage, create_storage_object};
use crate::{HostConfig, HostError, Result, bridge, builtins};

const PRELUDE: &str = include_str!("prelude.js");

pub(crate) type Callback = Persistent<Function<'static>>;

pub(crate) type Shared = Rc<RefCell<HostState>>;

/// Everything the bound natives share
pub(crate) struct HostState {
    pub(crate) config: HostConfig,
    pub(crate) surfaces: ResourceTable<Surface>,
    pub(crate) releases: ReleaseQueue,
    pub(crate) text: Option<TextRenderer>,
    pub(crate) scripts: ScriptQueue,
    pub(crate) on_load: CallbackQueue<Callback>,
    pub(crate) frames: FrameQueue<Callback>,
    pub(crate) listeners: EventListeners<Callback>,
    pub(crate) body: BodyLayers<Persistent<Object<'static>>>,
    pub(crate) storage: Rc<RefCell<Storage>>,
    /// Composition target, screen sized
    pub(crate) screen: Surface,
    pub(crate) warned_multiply: bool,
}

impl HostState {
    fn new(config: HostConfig) -> Result<Self> {
        let screen = Surface::new(config.screen_width, config.screen_height)?;
        Ok(Self {
            config,
            surfaces: ResourceTable::new(),
            releases: ReleaseQueue::new(),
            text: None,
            scripts: ScriptQueue::new(),
            on_load: CallbackQueue::new(),
            frames: FrameQueue::new(),
            listeners: EventListeners::new(),
            body: BodyLayers::new(),
            storage: Rc::new(RefCell::new(Storage::new())),
            screen,
            warned_multiply: false,
        })
    }

    /// Free surfaces whose script wrappers were collected
    pub(crate) fn drain_releases(&mut self) -> usize {
        let released = self.releases.drain();
        for handle in &released {
            if self.surfaces.release(*handle).is_none() {
                tracing::warn!(%handle, "released handle was not live");
            }
        }
        if !released.is_empty() {
            tracing::trace!(count = released.len(), live = self.surfaces.len(), "surfaces released");
        }
        released.len()
    }

    /// Drop every script reference held natively
    fn clear_script_refs(&mut self) {
        self.on_load.clear();
        self.frames.clear();
        self.listeners.clear();
        self.body.clear();
    }
}

/// Embedded script host
pub struct Host {
    state: Shared,
    context: Context,
    runtime: Runtime,
    pub(crate) run_state: RunState,
    pub(crate) started: Instant,
}

impl Host {
    /// Create a host, install the natives and the prelude, and load the
    /// configured font
    pub fn new(config: HostConfig) -> Result<Self> {
        let font = config.font_path.as_deref().map(Font::load).transpose()?;
        let state: Shared = Rc::new(RefCell::new(HostState::new(config)?));

        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;
        let mut host = Self {
            state,
            context,
            runtime,
            run_state: RunState::DrainScripts,
            started: Instant::now(),
        };
        host.install()?;
        if let Some(font) = font {
            host.set_font(font)?;
        }
        tracing::info!(
            project = %host.state.borrow().config.project_dir.display(),
            "script host ready"
        );
        Ok(host)
    }

    fn install(&mut self) -> Result<()> {
        let state = self.state.clone();
        self.with_script("prelude", move |ctx| {
            install_console(ctx)?;
            builtins::install_builtins(ctx)?;
            let storage = state.borrow().storage.clone();
            ctx.globals().set("_fos_localStorage", create_storage_object(ctx, storage)?)?;
            bridge::install(ctx, &state)?;
            Class::<CanvasState>::define(&ctx.globals())?;
            ctx.globals().set("_fos_stateProperties", DrawingState::PROPERTIES.to_vec())?;
            ctx.eval::<(), _>(PRELUDE)
        })
    }

    /// Replace the font used by text natives
    pub fn set_font(&mut self, font: Font) -> Result<()> {
        let mut st = self.state.borrow_mut();
        let renderer =
            TextRenderer::with_scratch_size(font, st.config.screen_width, st.config.screen_height)?;
        st.text = Some(renderer);
        Ok(())
    }

    pub fn config(&self) -> HostConfig {
        self.state.borrow().config.clone()
    }

    /// Queue a script file relative to the project directory.
    /// Returns false for skip-listed scripts.
    pub fn enqueue_script(&self, path: &str) -> bool {
        self.state.borrow_mut().scripts.enqueue(path)
    }

    /// Queue script source under `name`
    pub fn enqueue_source(&self, name: &str, source: &str) {
        self.state.borrow_mut().scripts.enqueue_inline(name, source);
    }

    /// Evaluate `source` right away and convert its completion value
    pub fn evaluate<T>(&self, source: &str) -> Result<T>
    where
        T: for<'js> FromJs<'js>,
    {
        let source = source.to_string();
        self.with_script("evaluate", move |ctx| ctx.eval(source))
    }

    /// Live native surfaces
    pub fn surface_count(&self) -> usize {
        self.state.borrow().surfaces.len()
    }

    pub fn pending_scripts(&self) -> usize {
        self.state.borrow().scripts.len()
    }

    /// Run the collector, then free the surfaces it orphaned
    pub fn collect_garbage(&self) -> usize {
        self.runtime.run_gc();
        self.state.borrow_mut().drain_releases()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub(crate) fn state(&self) -> &Shared {
        &self.state
    }

    /// Execute one queued script
    pub(crate) fn execute_script(&self, entry: ScriptEntry) -> Result<()> {
        let _span = tracing::info_span!("script", name = entry.name()).entered();
        tracing::debug!(script = entry.name(), "executing script");

        let path = match &entry {
            ScriptEntry::File(path) => self.state.borrow().config.project_dir.join(path),
            ScriptEntry::Inline { name, .. } => PathBuf::from(name),
        };
        let name = entry.name().to_string();
        let result = self.context.with(|ctx| {
            let mut options = EvalOptions::default();
            options.strict = false;
            let result = match entry {
                ScriptEntry::File(_) => ctx.eval_file_with_options::<(), _>(&path, options),
                ScriptEntry::Inline { source, .. } => ctx.eval_with_options::<(), _>(source, options),
            };
            result.catch(&ctx).map_err(|err| script_error(&name, &path, err))
        });
        result?;
        self.settle()
    }

    /// Run `f` inside the engine; a thrown exception becomes
    /// [`HostError::ScriptRuntime`] attributed to `script`
    pub(crate) fn with_script<F, R>(&self, script: &str, f: F) -> Result<R>
    where
        F: for<'js> FnOnce(&Ctx<'js>) -> rquickjs::Result<R>,
    {
        let path = Path::new(script);
        let value = self
            .context
            .with(|ctx| f(&ctx).catch(&ctx).map_err(|err| script_error(script, path, err)))?;
        self.settle()?;
        Ok(value)
    }

    /// Call a stored callback with no arguments
    pub(crate) fn call_callback(&self, what: &str, callback: Callback) -> Result<()> {
        self.with_script(what, move |ctx| callback.restore(ctx)?.call::<_, ()>(()))
    }

    /// Flush promise jobs, then free collected surfaces
    fn settle(&self) -> Result<()> {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => {}
                Ok(false) => break,
                Err(job) => {
                    return Err(job.0.with(|ctx| {
                        script_error("pending job", Path::new("pending job"), caught(ctx.catch()))
                    }));
                }
            }
        }
        self.state.borrow_mut().drain_releases();
        Ok(())
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        // persistent references must go before the runtime does
        let state = &self.state;
        self.context.with(|_ctx| {
            if let Ok(mut st) = state.try_borrow_mut() {
                st.clear_script_refs();
            }
        });
    }
}

/// Classify a value picked up with `Ctx::catch`
fn caught(value: Value<'_>) -> CaughtError<'_> {
    match value.clone().into_exception() {
        Some(exception) => CaughtError::Exception(exception),
        None => CaughtError::Value(value),
    }
}

fn script_error(script: &str, path: &Path, err: CaughtError<'_>) -> HostError {
    match err {
        CaughtError::Exception(exception) => {
            let object = exception.as_object();
            let message = exception.message().unwrap_or_default();
            let message = match object.get::<_, Option<String>>("name").ok().flatten() {
                Some(name) if !name.is_empty() => format!("{name}: {message}"),
                _ => message,
            };
            HostError::ScriptRuntime {
                script: script.to_string(),
                message,
                file: object.get::<_, Option<String>>("fileName").ok().flatten(),
                line: object.get::<_, Option<u32>>("lineNumber").ok().flatten(),
                stack: exception.stack().filter(|s| !s.is_empty()),
            }
        }
        CaughtError::Value(value) => {
            let ctx = value.ctx().clone();
            let message = Coerced::<String>::from_js(&ctx, value)
                .map(|s| s.0)
                .unwrap_or_else(|_| "unknown value".to_string());
            HostError::ScriptRuntime {
                script: script.to_string(),
                message: format!("uncaught {message}"),
                file: None,
                line: None,
                stack: None,
            }
        }
        CaughtError::Error(rquickjs::Error::Io(source)) => HostError::Io {
            path: path.to_path_buf(),
            source,
        },
        CaughtError::Error(e) => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Host {
        Host::new(HostConfig::new(std::env::temp_dir()).without_font()).unwrap()
    }

    #[test]
    fn test_prelude_installs_window() {
        let host = host();
        let agent: String = host.evaluate("window.navigator.userAgent").unwrap();
        assert_eq!(agent, "fos-player");
        let same: bool = host.evaluate("window === this && window.document === document").unwrap();
        assert!(same);
    }

    #[test]
    fn test_uncaught_exception_carries_location() {
        let host = host();
        host.enqueue_source("broken.js", "var x = 1;\nnotDefined();\n");
        let entry = host.state().borrow_mut().scripts.pop().unwrap();
        let err = host.execute_script(entry).unwrap_err();
        match err {
            HostError::ScriptRuntime { script, message, .. } => {
                assert_eq!(script, "broken.js");
                assert!(message.starts_with("ReferenceError"), "{message}");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_thrown_value_is_reported() {
        let host = host();
        let err = host.evaluate::<()>("throw 'boom'").unwrap_err();
        assert!(err.to_string().contains("uncaught boom"), "{err}");
    }

    #[test]
    fn test_missing_script_is_io_error() {
        let host = host();
        host.enqueue_script("js/does-not-exist.js");
        let entry = host.state().borrow_mut().scripts.pop().unwrap();
        assert!(matches!(host.execute_script(entry), Err(HostError::Io { .. })));
    }

    #[test]
    fn test_text_needs_a_font() {
        let host = host();
        let message: String = host
            .evaluate(
                "var c = document.createElement('canvas'); c.width = 4; c.height = 4;
                 try { c.getContext('2d').measureText('x'); '' } catch (e) { e.message }",
            )
            .unwrap();
        assert_eq!(message, "invalid state: no font loaded");
    }

    #[test]
    fn test_missing_font_fails_startup() {
        let config = HostConfig::new(std::env::temp_dir().join("fos-js-no-project"));
        assert!(matches!(Host::new(config), Err(HostError::Text(_))));
    }
}
