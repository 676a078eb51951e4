//! Bound natives
//!
//! Global `_fos_*` functions the prelude builds the document and canvas
//! on. Arguments are primitives, surface wrappers and flat number arrays
//! only. A failing native throws an `Error` whose message is the Rust
//! error's `Display`, so script-side try/catch can react.

use std::fs;
use std::path::{Component, Path};

use fos_canvas::{CanvasError, DrawOperation, PackedColor, Surface, load_surface, parse_color};
use fos_text::{Align, TextDraw, font_size};
use rquickjs::prelude::Coerced;
use rquickjs::{Class, Ctx, Exception, Function, Object, Persistent, TypedArray, Value};
use tiny_skia::ColorU8;

use crate::dom::{ElementKind, EventType};
use crate::handle::{SurfaceHandle, handle_arg};
use crate::host::Shared;
use crate::{HostError, Result};

/// Largest surface edge script may request
const MAX_EDGE: f64 = 16384.0;

/// Convert native errors into script exceptions
pub(crate) trait OrThrow<T> {
    fn or_throw(self, ctx: &Ctx<'_>) -> rquickjs::Result<T>;
}

impl<T, E: Into<HostError>> OrThrow<T> for std::result::Result<T, E> {
    fn or_throw(self, ctx: &Ctx<'_>) -> rquickjs::Result<T> {
        self.map_err(|e| {
            let e: HostError = e.into();
            tracing::debug!(error = %e, "native call failed");
            Exception::throw_message(ctx, &e.to_string())
        })
    }
}

fn define<'js, F, P>(ctx: &Ctx<'js>, name: &str, f: F) -> rquickjs::Result<()>
where
    F: rquickjs::function::IntoJsFunc<'js, P> + 'js,
{
    ctx.globals().set(name, Function::new(ctx.clone(), f)?.with_name(name)?)
}

fn edge(value: f64, what: &str) -> std::result::Result<u32, CanvasError> {
    if !value.is_finite() || value < 1.0 || value > MAX_EDGE {
        return Err(CanvasError::InvalidArgument(format!("{what} {value} out of range")));
    }
    Ok(value as u32)
}

fn coordinate(value: f64, what: &str) -> std::result::Result<i64, CanvasError> {
    if !value.is_finite() {
        return Err(CanvasError::InvalidArgument(format!("{what} {value} is not finite")));
    }
    Ok(value.floor() as i64)
}

/// Coordinate for text placement, which works in `i32` pixels
fn text_coordinate(value: f64, what: &str) -> std::result::Result<i32, CanvasError> {
    let floored = coordinate(value, what)?;
    i32::try_from(floored)
        .map_err(|_| CanvasError::InvalidArgument(format!("{what} {value} out of range")))
}

fn text_color(packed: PackedColor) -> ColorU8 {
    ColorU8::from_rgba(packed.r(), packed.g(), packed.b(), packed.a())
}

/// Resolve a data file under the project directory
fn data_path(base: &Path, relative: &str) -> std::result::Result<std::path::PathBuf, HostError> {
    let relative = Path::new(relative);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(CanvasError::InvalidArgument(format!(
            "data path {} leaves the project",
            relative.display()
        ))
        .into());
    }
    Ok(base.join(relative))
}

/// Read and validate a JSON data file
pub(crate) fn read_data_file(base: &Path, relative: &str) -> Result<String> {
    let path = data_path(base, relative)?;
    let text = fs::read_to_string(&path).map_err(|source| HostError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str::<serde_json::Value>(&text)
        .map_err(|source| HostError::Data { path: path.clone(), source })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "data file loaded");
    Ok(text)
}

/// Install every native into the global object
pub fn install<'js>(ctx: &Ctx<'js>, state: &Shared) -> rquickjs::Result<()> {
    install_surfaces(ctx, state)?;
    install_drawing(ctx, state)?;
    install_text(ctx, state)?;
    install_scheduling(ctx, state)?;
    install_document(ctx, state)?;
    Ok(())
}

fn install_surfaces<'js>(ctx: &Ctx<'js>, state: &Shared) -> rquickjs::Result<()> {
    let st = state.clone();
    define(
        ctx,
        "_fos_newSurface",
        move |ctx: Ctx<'js>, width: f64, height: f64| -> rquickjs::Result<Class<'js, SurfaceHandle>> {
            let surface = edge(width, "width")
                .and_then(|w| Ok((w, edge(height, "height")?)))
                .and_then(|(w, h)| Surface::new(w, h))
                .or_throw(&ctx)?;
            let mut st = st.borrow_mut();
            let handle = st.surfaces.insert(surface);
            tracing::debug!(%handle, width, height, "surface created");
            SurfaceHandle::wrap(&ctx, handle, &st.releases)
        },
    )?;

    let st = state.clone();
    define(
        ctx,
        "_fos_loadSurface",
        move |ctx: Ctx<'js>, reference: Coerced<String>| -> rquickjs::Result<Class<'js, SurfaceHandle>> {
            let base = st.borrow().config.project_dir.clone();
            let surface = load_surface(&base, &reference.0).or_throw(&ctx)?;
            let mut st = st.borrow_mut();
            let (width, height) = surface.size();
            let handle = st.surfaces.insert(surface);
            tracing::debug!(%handle, width, height, "surface loaded");
            SurfaceHandle::wrap(&ctx, handle, &st.releases)
        },
    )?;

    let st = state.clone();
    define(
        ctx,
        "_fos_surfaceSize",
        move |ctx: Ctx<'js>, target: Value<'js>| -> rquickjs::Result<Vec<u32>> {
            let handle = handle_arg(&ctx, &target)?;
            let st = st.borrow();
            let surface = st.surfaces.get(handle).or_throw(&ctx)?;
            Ok(vec![surface.width(), surface.height()])
        },
    )?;

    Ok(())
}

fn install_drawing<'js>(ctx: &Ctx<'js>, state: &Shared) -> rquickjs::Result<()> {
    let st = state.clone();
    define(
        ctx,
        "_fos_clearRect",
        move |ctx: Ctx<'js>, target: Value<'js>, x: f64, y: f64, w: f64, h: f64| -> rquickjs::Result<()> {
            let handle = handle_arg(&ctx, &target)?;
            let mut st = st.borrow_mut();
            let surface = st.surfaces.get_mut(handle).or_throw(&ctx)?;
            surface.clear_rect(x, y, w, h).or_throw(&ctx)
        },
    )?;

    let st = state.clone();
    define(
        ctx,
        "_fos_fillRect",
        move |ctx: Ctx<'js>,
              target: Value<'js>,
              x: f64,
              y: f64,
              w: f64,
              h: f64,
              color: f64|
              -> rquickjs::Result<()> {
            let handle = handle_arg(&ctx, &target)?;
            let mut st = st.borrow_mut();
            let surface = st.surfaces.get_mut(handle).or_throw(&ctx)?;
            surface.fill_rect(x, y, w, h, PackedColor::from_f64(color));
            Ok(())
        },
    )?;

    let st = state.clone();
    define(
        ctx,
        "_fos_drawImage",
        move |ctx: Ctx<'js>,
              target: Value<'js>,
              source: Value<'js>,
              parts: Vec<f64>,
              geom: Vec<f64>,
              mode: Coerced<String>,
              alpha: f64|
              -> rquickjs::Result<()> {
            let dst = handle_arg(&ctx, &target)?;
            let src = handle_arg(&ctx, &source)?;
            let op = DrawOperation::from_flat(&parts, &geom, &mode.0, alpha).or_throw(&ctx)?;

            let mut st = st.borrow_mut();
            if op.mode.is_degraded() {
                if !st.warned_multiply {
                    st.warned_multiply = true;
                    tracing::warn!(mode = op.mode.as_str(), "composite mode unsupported, draws skipped");
                }
                return Ok(());
            }
            if dst == src {
                let copy = st.surfaces.get(src).or_throw(&ctx)?.clone();
                let surface = st.surfaces.get_mut(dst).or_throw(&ctx)?;
                surface.draw_image(&copy, &op);
            } else {
                let (target, source) = st.surfaces.get_pair_mut(dst, src).or_throw(&ctx)?;
                target.draw_image(source, &op);
            }
            tracing::trace!(%dst, %src, parts = op.parts.len(), "image drawn");
            Ok(())
        },
    )?;

    let st = state.clone();
    define(
        ctx,
        "_fos_readPixels",
        move |ctx: Ctx<'js>,
              target: Value<'js>,
              x: f64,
              y: f64,
              w: f64,
              h: f64|
              -> rquickjs::Result<TypedArray<'js, u8>> {
            let handle = handle_arg(&ctx, &target)?;
            let st = st.borrow();
            let surface = st.surfaces.get(handle).or_throw(&ctx)?;
            let pixels = coordinate(x, "x")
                .and_then(|x| Ok((x, coordinate(y, "y")?, coordinate(w, "width")?, coordinate(h, "height")?)))
                .and_then(|(x, y, w, h)| surface.read_pixels(x, y, w, h))
                .or_throw(&ctx)?;
            TypedArray::<u8>::new(ctx.clone(), pixels)
        },
    )?;

    define(
        ctx,
        "_fos_parseColor",
        move |ctx: Ctx<'js>, style: Coerced<String>, alpha: f64| -> rquickjs::Result<f64> {
            let alpha = if alpha.is_finite() { alpha } else { 1.0 };
            parse_color(&style.0, alpha).map(|c| c.0 as f64).or_throw(&ctx)
        },
    )?;

    Ok(())
}

fn install_text<'js>(ctx: &Ctx<'js>, state: &Shared) -> rquickjs::Result<()> {
    let st = state.clone();
    // geom is [x, y, maxWidth, lineWidth]
    define(
        ctx,
        "_fos_drawText",
        move |ctx: Ctx<'js>,
              target: Value<'js>,
              text: Coerced<String>,
              geom: Vec<f64>,
              font: Coerced<String>,
              align: Coerced<String>,
              color: f64|
              -> rquickjs::Result<()> {
            let handle = handle_arg(&ctx, &target)?;
            let &[x, y, max_width, line_width] = geom.as_slice() else {
                return Err::<(), _>(CanvasError::InvalidArgument(format!(
                    "text geometry needs 4 numbers, got {}",
                    geom.len()
                )))
                .or_throw(&ctx);
            };
            let size = font_size(&font.0).or_throw(&ctx)?;
            let align: Align = align.0.parse().or_throw(&ctx)?;
            let positive = |v: f64| if v.is_finite() && v > 0.0 { v as u32 } else { 0 };
            let req = TextDraw {
                text: &text.0,
                size,
                line_width: positive(line_width),
                x: text_coordinate(x, "x").or_throw(&ctx)?,
                y: text_coordinate(y, "y").or_throw(&ctx)?,
                max_width: positive(max_width),
                align,
                color: text_color(PackedColor::from_f64(color)),
            };

            let mut st = st.borrow_mut();
            let st = &mut *st;
            let renderer = st
                .text
                .as_mut()
                .ok_or_else(|| CanvasError::InvalidState("no font loaded".to_string()))
                .or_throw(&ctx)?;
            let surface = st.surfaces.get_mut(handle).or_throw(&ctx)?;
            renderer.draw(surface.pixmap_mut(), &req).or_throw(&ctx)
        },
    )?;

    let st = state.clone();
    define(
        ctx,
        "_fos_measureText",
        move |ctx: Ctx<'js>, text: Coerced<String>, font: Coerced<String>| -> rquickjs::Result<Vec<u32>> {
            let size = font_size(&font.0).or_throw(&ctx)?;
            let st = st.borrow();
            let renderer = st
                .text
                .as_ref()
                .ok_or_else(|| CanvasError::InvalidState("no font loaded".to_string()))
                .or_throw(&ctx)?;
            let (width, height) = renderer.measure(&text.0, size).or_throw(&ctx)?;
            Ok(vec![width, height])
        },
    )?;

    Ok(())
}

fn install_scheduling<'js>(ctx: &Ctx<'js>, state: &Shared) -> rquickjs::Result<()> {
    let st = state.clone();
    define(ctx, "_fos_appendScript", move |src: Coerced<String>| -> bool {
        st.borrow_mut().scripts.enqueue(&src.0)
    })?;

    let st = state.clone();
    define(ctx, "_fos_onLoad", move |ctx: Ctx<'js>, callback: Function<'js>| {
        st.borrow_mut().on_load.push(Persistent::save(&ctx, callback));
    })?;

    let st = state.clone();
    define(
        ctx,
        "_fos_requestAnimationFrame",
        move |ctx: Ctx<'js>, callback: Function<'js>| -> u32 {
            let mut st = st.borrow_mut();
            st.frames.push(Persistent::save(&ctx, callback));
            st.frames.len() as u32
        },
    )?;

    Ok(())
}

fn install_document<'js>(ctx: &Ctx<'js>, state: &Shared) -> rquickjs::Result<()> {
    let st = state.clone();
    define(
        ctx,
        "_fos_addEventListener",
        move |ctx: Ctx<'js>, kind: Coerced<String>, listener: Function<'js>| -> rquickjs::Result<()> {
            let event: EventType = kind.0.parse().or_throw(&ctx)?;
            st.borrow_mut().listeners.add(event, Persistent::save(&ctx, listener));
            Ok(())
        },
    )?;

    define(
        ctx,
        "_fos_elementKind",
        move |ctx: Ctx<'js>, tag: Coerced<String>| -> rquickjs::Result<&'static str> {
            let kind: ElementKind = tag.0.parse().or_throw(&ctx)?;
            Ok(kind.as_str())
        },
    )?;

    let st = state.clone();
    define(ctx, "_fos_attachCanvas", move |ctx: Ctx<'js>, id: u32, element: Object<'js>| {
        st.borrow_mut().body.attach(id, Persistent::save(&ctx, element));
    })?;

    let st = state.clone();
    define(ctx, "_fos_detachCanvas", move |id: u32| -> bool { st.borrow_mut().body.detach(id) })?;

    let st = state.clone();
    define(
        ctx,
        "_fos_loadJSONFile",
        move |ctx: Ctx<'js>, path: Coerced<String>| -> rquickjs::Result<String> {
            let base = st.borrow().config.project_dir.clone();
            read_data_file(&base, &path.0).or_throw(&ctx)
        },
    )?;

    let st = state.clone();
    define(ctx, "_fos_screenSize", move || -> Vec<u32> {
        let st = st.borrow();
        vec![st.config.screen_width, st.config.screen_height]
    })?;

    Ok(())
}
