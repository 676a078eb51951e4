//! Player window
//!
//! Runs on the main thread as the render side of the frame handoff:
//! every display tick it forwards the input gathered since the last
//! frame, waits for the script thread to finish the frame, and copies
//! the composed pixels into the window.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result, anyhow};
use fos_js::{FrameDone, FrameStart, InputEvent, RenderLink};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::project::WindowConfig;

/// 60 Hz
const FRAME_INTERVAL: Duration = Duration::from_nanos(16_666_667);

/// Open the window and drive frames until it is closed or the script
/// thread stops
pub fn run(link: RenderLink, window: &WindowConfig, scale: u32) -> Result<()> {
    let event_loop = EventLoop::new().context("cannot create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PlayerApp::new(link, window.clone(), scale);
    event_loop.run_app(&mut app).context("event loop failed")?;
    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct PlayerApp {
    link: RenderLink,
    config: WindowConfig,
    scale: u32,
    window: Option<Arc<Window>>,
    surface: Option<softbuffer::Surface<Arc<Window>, Arc<Window>>>,
    /// Input since the last frame
    events: Vec<InputEvent>,
    next_frame: Instant,
    frames: u64,
    error: Option<anyhow::Error>,
}

impl PlayerApp {
    fn new(link: RenderLink, config: WindowConfig, scale: u32) -> Self {
        Self {
            link,
            config,
            scale: scale.max(1),
            window: None,
            surface: None,
            events: Vec::new(),
            next_frame: Instant::now(),
            frames: 0,
            error: None,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let size = PhysicalSize::new(self.config.width * self.scale, self.config.height * self.scale);
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(size)
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(attrs).context("cannot create window")?);

        let context = softbuffer::Context::new(window.clone())
            .map_err(|e| anyhow!("cannot create framebuffer context: {e}"))?;
        let surface = softbuffer::Surface::new(&context, window.clone())
            .map_err(|e| anyhow!("cannot create framebuffer: {e}"))?;

        tracing::info!(
            title = %self.config.title,
            width = size.width,
            height = size.height,
            "window opened"
        );
        self.window = Some(window);
        self.surface = Some(surface);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.error = Some(err);
        event_loop.exit();
    }

    /// Hand one frame to the script thread and show the result
    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let start = FrameStart {
            events: std::mem::take(&mut self.events),
        };
        let Some(done) = self.link.frame(start) else {
            tracing::info!(frames = self.frames, "script thread stopped");
            event_loop.exit();
            return;
        };
        self.frames += 1;
        if let Err(err) = self.present(&done) {
            self.fail(event_loop, err);
        }
    }

    fn present(&mut self, frame: &FrameDone) -> Result<()> {
        let Some(surface) = &mut self.surface else {
            return Ok(());
        };
        let (Some(width), Some(height)) = (
            NonZeroU32::new(frame.width * self.scale),
            NonZeroU32::new(frame.height * self.scale),
        ) else {
            return Ok(());
        };
        surface
            .resize(width, height)
            .map_err(|e| anyhow!("cannot resize framebuffer: {e}"))?;
        let mut buffer = surface
            .buffer_mut()
            .map_err(|e| anyhow!("cannot map framebuffer: {e}"))?;
        blit(frame, self.scale, &mut buffer);
        buffer
            .present()
            .map_err(|e| anyhow!("cannot present frame: {e}"))
    }

    fn handle_key(&mut self, event: KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(key_code) = dom_key_code(code) else {
            tracing::trace!(?code, "key without a DOM code");
            return;
        };
        self.events.push(match event.state {
            ElementState::Pressed => InputEvent::KeyDown { key_code },
            ElementState::Released => InputEvent::KeyUp { key_code },
        });
    }
}

impl ApplicationHandler for PlayerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.create_window(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.frame(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let scale = f64::from(self.scale);
                self.events.push(InputEvent::MouseMove {
                    x: (position.x / scale).floor(),
                    y: (position.y / scale).floor(),
                });
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = &self.window else { return };
        let now = Instant::now();
        if now >= self.next_frame {
            window.request_redraw();
            self.next_frame += FRAME_INTERVAL;
            if self.next_frame < now {
                self.next_frame = now + FRAME_INTERVAL;
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
    }
}

/// Copy RGBA into 0x00RRGGBB pixels, scaled up by nearest neighbour
pub fn blit(frame: &FrameDone, scale: u32, dst: &mut [u32]) {
    let scale = scale.max(1) as usize;
    let (width, height) = (frame.width as usize, frame.height as usize);
    if frame.pixels.len() < width * height * 4 || width == 0 {
        return;
    }
    let dst_width = width * scale;
    for (y, row) in dst.chunks_exact_mut(dst_width).take(height * scale).enumerate() {
        let src_row = &frame.pixels[(y / scale) * width * 4..][..width * 4];
        for (x, px) in row.iter_mut().enumerate() {
            let rgb = &src_row[(x / scale) * 4..][..3];
            *px = u32::from(rgb[0]) << 16 | u32::from(rgb[1]) << 8 | u32::from(rgb[2]);
        }
    }
}

/// DOM `keyCode` of a physical key
pub fn dom_key_code(code: KeyCode) -> Option<u32> {
    use KeyCode::*;

    const LETTERS: [KeyCode; 26] = [
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN,
        KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
    ];
    const DIGITS: [KeyCode; 10] = [
        Digit0, Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9,
    ];
    const NUMPAD: [KeyCode; 10] = [
        Numpad0, Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,
    ];
    const FUNCTION: [KeyCode; 12] = [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12];

    let offset = |table: &[KeyCode], base: u32| {
        table.iter().position(|k| *k == code).map(|i| base + i as u32)
    };
    let fixed = match code {
        Backspace => Some(8),
        Tab => Some(9),
        Enter | NumpadEnter => Some(13),
        ShiftLeft | ShiftRight => Some(16),
        ControlLeft | ControlRight => Some(17),
        AltLeft | AltRight => Some(18),
        Escape => Some(27),
        Space => Some(32),
        PageUp => Some(33),
        PageDown => Some(34),
        End => Some(35),
        Home => Some(36),
        ArrowLeft => Some(37),
        ArrowUp => Some(38),
        ArrowRight => Some(39),
        ArrowDown => Some(40),
        Insert => Some(45),
        Delete => Some(46),
        _ => None,
    };
    fixed
        .or_else(|| offset(&DIGITS, 48))
        .or_else(|| offset(&LETTERS, 65))
        .or_else(|| offset(&NUMPAD, 96))
        .or_else(|| offset(&FUNCTION, 112))
}
