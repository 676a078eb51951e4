//! Run loop and frame handoff
//!
//! The script thread drains scripts, then on-load callbacks, then waits
//! for the render thread to start a frame. Each frame is a strict
//! two-phase exchange over rendezvous channels: the render thread sends
//! [`FrameStart`] and blocks; the script thread runs the frame callbacks,
//! composes the body's canvases and answers with [`FrameDone`]. At most
//! one frame is ever in flight.

use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

use fos_canvas::DrawOperation;
use rquickjs::function::Constructor;
use rquickjs::prelude::{Coerced, This};
use rquickjs::{Class, FromJs, Object, Persistent, Value};

use crate::dom::{EventType, composition_order};
use crate::handle::SurfaceHandle;
use crate::host::Host;
use crate::{HostError, Result};

/// Run loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    DrainScripts,
    RunLoadCallbacks,
    AwaitFrame,
    RunFrameCallbacks,
}

/// Input forwarded by the render thread
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Cursor position in canvas pixels
    MouseMove { x: f64, y: f64 },
    KeyDown { key_code: u32 },
    KeyUp { key_code: u32 },
}

impl InputEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::MouseMove { .. } => EventType::MouseMove,
            Self::KeyDown { .. } => EventType::KeyDown,
            Self::KeyUp { .. } => EventType::KeyUp,
        }
    }
}

/// "Frame starting" signal
#[derive(Debug, Default)]
pub struct FrameStart {
    pub events: Vec<InputEvent>,
}

/// "Script mutations complete" signal carrying the composed frame
#[derive(Debug)]
pub struct FrameDone {
    pub width: u32,
    pub height: u32,
    /// Non-premultiplied RGBA, row-major
    pub pixels: Vec<u8>,
}

/// Render thread end of the handoff
#[derive(Debug)]
pub struct RenderLink {
    start: SyncSender<FrameStart>,
    done: Receiver<FrameDone>,
}

impl RenderLink {
    /// Start a frame and block until the script thread finishes it.
    /// Returns `None` once the script thread has stopped.
    pub fn frame(&self, start: FrameStart) -> Option<FrameDone> {
        self.start.send(start).ok()?;
        self.done.recv().ok()
    }
}

/// Script thread end of the handoff
#[derive(Debug)]
pub struct FrameLink {
    start: Receiver<FrameStart>,
    done: SyncSender<FrameDone>,
}

/// Create the two rendezvous channels of the frame handoff
pub fn frame_channel() -> (RenderLink, FrameLink) {
    let (start_tx, start_rx) = sync_channel(0);
    let (done_tx, done_rx) = sync_channel(0);
    (
        RenderLink {
            start: start_tx,
            done: done_rx,
        },
        FrameLink {
            start: start_rx,
            done: done_tx,
        },
    )
}

impl Host {
    /// Drain scripts and on-load callbacks until both queues are empty.
    ///
    /// Each on-load callback runs to completion, and any scripts it
    /// queued run, before the next callback starts.
    pub fn run_until_idle(&mut self) -> Result<()> {
        loop {
            self.run_state = RunState::DrainScripts;
            loop {
                let next = self.state().borrow_mut().scripts.pop();
                let Some(entry) = next else { break };
                self.execute_script(entry)?;
            }

            self.run_state = RunState::RunLoadCallbacks;
            let next = self.state().borrow_mut().on_load.pop();
            let Some(callback) = next else { break };
            let _span = tracing::info_span!("load_callback").entered();
            self.call_callback("onload callback", callback)?;
        }
        self.run_state = RunState::AwaitFrame;
        Ok(())
    }

    /// Run one frame: dispatch input, run the animation-frame snapshot and
    /// compose the body's canvases
    pub fn run_frame(&mut self, events: &[InputEvent]) -> Result<FrameDone> {
        self.run_state = RunState::RunFrameCallbacks;
        for event in events {
            self.dispatch_event(event)?;
        }

        let snapshot = self.state().borrow_mut().frames.take_snapshot();
        let timestamp = self.started.elapsed().as_secs_f64() * 1000.0;
        {
            let _span = tracing::info_span!("frame_callbacks", count = snapshot.len()).entered();
            for callback in snapshot {
                self.with_script("animation frame callback", move |ctx| {
                    callback.restore(ctx)?.call::<_, ()>((timestamp,))
                })?;
            }
        }

        let frame = self.compose()?;
        self.run_state = RunState::DrainScripts;
        Ok(frame)
    }

    /// Drive the loop against a render thread until it hangs up
    pub fn run(&mut self, link: &FrameLink) -> Result<()> {
        let mut frames: u64 = 0;
        loop {
            self.run_until_idle()?;
            let Ok(start) = link.start.recv() else {
                tracing::info!(frames, "render thread closed, stopping");
                return Ok(());
            };
            let done = self.run_frame(&start.events)?;
            link.done.send(done).map_err(|_| HostError::Disconnected)?;
            frames += 1;
        }
    }

    fn dispatch_event(&self, event: &InputEvent) -> Result<()> {
        let kind = event.event_type();
        let listeners = self.state().borrow().listeners.listeners(kind);
        if listeners.is_empty() {
            return Ok(());
        }
        tracing::trace!(event = %kind, listeners = listeners.len(), "dispatching input");
        let event = event.clone();
        self.with_script("event listener", move |ctx| {
            let init = Object::new(ctx.clone())?;
            match event {
                InputEvent::MouseMove { x, y } => {
                    init.set("pageX", x)?;
                    init.set("pageY", y)?;
                }
                InputEvent::KeyDown { key_code } | InputEvent::KeyUp { key_code } => {
                    init.set("keyCode", key_code)?;
                }
            }
            let constructor: Constructor = ctx.globals().get("Event")?;
            let dom_event: Object = constructor.construct((kind.as_str(), init))?;
            let document: Object = ctx.globals().get("document")?;
            for listener in listeners {
                listener
                    .restore(ctx)?
                    .call::<_, ()>((This(document.clone()), dom_event.clone()))?;
            }
            Ok(())
        })
    }

    /// Flatten the body's canvases onto the screen surface
    fn compose(&self) -> Result<FrameDone> {
        let _span = tracing::info_span!("compose").entered();
        let elements: Vec<Persistent<Object<'static>>> =
            self.state().borrow().body.iter().cloned().collect();

        let layers = self.with_script("compose", move |ctx| {
            let mut layers = Vec::with_capacity(elements.len());
            for element in elements {
                let element = element.restore(ctx)?;
                let surface: Value = element.get("_surface")?;
                let Ok(wrapper) = Class::<SurfaceHandle>::from_value(&surface) else {
                    continue;
                };
                let style: Object = element.get("style")?;
                let z: Value = style.get("zIndex")?;
                let z = if z.is_undefined() || z.is_null() {
                    0.0
                } else {
                    Coerced::<f64>::from_js(ctx, z)?.0
                };
                let handle = wrapper.borrow().handle();
                layers.push((handle, if z.is_nan() { 0.0 } else { z }));
            }
            Ok(layers)
        })?;

        let z_indices: Vec<f64> = layers.iter().map(|(_, z)| *z).collect();
        let mut st = self.state().borrow_mut();
        let st = &mut *st;
        st.screen.clear();
        let op = DrawOperation::default();
        for index in composition_order(&z_indices) {
            let surface = st.surfaces.get(layers[index].0)?;
            st.screen.draw_image(surface, &op);
        }
        let (width, height) = st.screen.size();
        Ok(FrameDone {
            width,
            height,
            pixels: st.screen.to_rgba(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostConfig;

    fn host() -> Host {
        let config = HostConfig::new(std::env::temp_dir())
            .without_font()
            .with_screen_size(4, 4);
        Host::new(config).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let mut host = host();
        assert_eq!(host.run_state(), RunState::DrainScripts);
        host.run_until_idle().unwrap();
        assert_eq!(host.run_state(), RunState::AwaitFrame);
        host.run_frame(&[]).unwrap();
        assert_eq!(host.run_state(), RunState::DrainScripts);
    }

    #[test]
    fn test_compose_orders_by_z_index() {
        let mut host = host();
        host.enqueue_source(
            "layers.js",
            r#"
            function layer(color, z) {
                var c = document.createElement('canvas');
                c.width = 4; c.height = 4;
                if (z !== undefined) c.style.zIndex = z;
                var g = c.getContext('2d');
                g.fillStyle = color;
                g.fillRect(0, 0, 4, 4);
                document.body.appendChild(c);
                return c;
            }
            layer('#ff0000', 2);
            layer('#00ff00');
            layer('#0000ff', 1);
            "#,
        );
        host.run_until_idle().unwrap();
        let frame = host.run_frame(&[]).unwrap();
        assert_eq!((frame.width, frame.height), (4, 4));
        assert_eq!(&frame.pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_detached_canvas_is_not_composed() {
        let mut host = host();
        host.enqueue_source(
            "detach.js",
            r#"
            var c = document.createElement('canvas');
            c.width = 4; c.height = 4;
            c.getContext('2d').fillRect(0, 0, 4, 4);
            document.body.appendChild(c);
            document.body.removeChild(c);
            "#,
        );
        host.run_until_idle().unwrap();
        let frame = host.run_frame(&[]).unwrap();
        assert!(frame.pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_input_reaches_listeners() {
        let mut host = host();
        host.enqueue_source(
            "input.js",
            r#"
            var seen = [];
            document.addEventListener('keydown', function(e) {
                seen.push(e.type + ':' + e.keyCode + ':' + (this === document));
            });
            document.addEventListener('mousemove', function(e) {
                seen.push(e.type + ':' + e.pageX + ',' + e.pageY);
            });
            "#,
        );
        host.run_until_idle().unwrap();
        host.run_frame(&[
            InputEvent::KeyDown { key_code: 13 },
            InputEvent::KeyUp { key_code: 13 },
            InputEvent::MouseMove { x: 3.0, y: 1.0 },
        ])
        .unwrap();
        let seen: String = host.evaluate("seen.join('|')").unwrap();
        assert_eq!(seen, "keydown:13:true|mousemove:3,1");
    }

    #[test]
    fn test_frame_callback_error_is_terminal() {
        let mut host = host();
        host.enqueue_source("raf.js", "requestAnimationFrame(function() { missing(); });");
        host.run_until_idle().unwrap();
        let err = host.run_frame(&[]).unwrap_err();
        assert!(matches!(err, HostError::ScriptRuntime { .. }), "{err}");
    }
}
