//! Script-held surface handles
//!
//! A `NativeSurface` object is the only way script refers to a surface.
//! When the collector frees it, its drop posts the handle to a
//! [`ReleaseQueue`]; the run loop drains the queue between script
//! executions, so the surface table is only touched from the loop.

use std::cell::RefCell;
use std::rc::Rc;

use fos_canvas::{CanvasError, Handle};
use rquickjs::class::Trace;
use rquickjs::{Class, Ctx, JsLifetime, Value};

use crate::bridge::OrThrow;

/// Handles whose script wrapper has been collected
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue {
    pending: Rc<RefCell<Vec<Handle>>>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn post(&self, handle: Handle) {
        // the queue is only borrowed briefly by drain, never across a GC
        if let Ok(mut pending) = self.pending.try_borrow_mut() {
            pending.push(handle);
        } else {
            tracing::warn!(%handle, "release queue busy, surface leaked");
        }
    }

    /// Take every posted handle
    pub fn drain(&self) -> Vec<Handle> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

/// Script wrapper around a surface handle
#[derive(Trace, JsLifetime)]
#[rquickjs::class(rename = "NativeSurface", frozen)]
pub struct SurfaceHandle {
    #[qjs(skip_trace)]
    handle: Handle,
    #[qjs(skip_trace)]
    releases: ReleaseQueue,
}

#[rquickjs::methods]
impl SurfaceHandle {
    #[qjs(rename = "toString")]
    pub fn describe(&self) -> String {
        format!("[NativeSurface {}]", self.handle)
    }
}

impl SurfaceHandle {
    /// Wrap `handle` in a new script object
    pub fn wrap<'js>(
        ctx: &Ctx<'js>,
        handle: Handle,
        releases: &ReleaseQueue,
    ) -> rquickjs::Result<Class<'js, Self>> {
        Class::instance(
            ctx.clone(),
            Self {
                handle,
                releases: releases.clone(),
            },
        )
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        tracing::trace!(handle = %self.handle, "surface wrapper collected");
        self.releases.post(self.handle);
    }
}

/// Handle carried by a script value.
///
/// `undefined`/`null` means the canvas never got a surface, which is a
/// state error rather than a type error.
pub fn handle_arg<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> rquickjs::Result<Handle> {
    if value.is_undefined() || value.is_null() {
        return Err(CanvasError::InvalidState("canvas is not initialized".to_string()))
            .or_throw(ctx);
    }
    let wrapper = Class::<SurfaceHandle>::from_value(value).map_err(|_| {
        rquickjs::Exception::throw_type(ctx, "expected a native surface")
    })?;
    let handle = wrapper.borrow().handle;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    #[test]
    fn test_collected_wrapper_posts_release() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let releases = ReleaseQueue::new();
        let handle = Handle::from_bits(7);

        context.with(|ctx| {
            let wrapper = SurfaceHandle::wrap(&ctx, handle, &releases).unwrap();
            ctx.globals().set("s", wrapper).unwrap();
            let text: String = ctx.eval("String(s)").unwrap();
            assert_eq!(text, format!("[NativeSurface {handle}]"));
            assert!(releases.is_empty());
            let _: () = ctx.eval("s = undefined").unwrap();
        });
        runtime.run_gc();
        assert_eq!(releases.drain(), [handle]);
        assert!(releases.is_empty());
    }

    #[test]
    fn test_handle_arg_rejects_missing_surface() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let releases = ReleaseQueue::new();

        context.with(|ctx| {
            let wrapper = SurfaceHandle::wrap(&ctx, Handle::from_bits(3), &releases).unwrap();
            let value = wrapper.into_value();
            assert_eq!(handle_arg(&ctx, &value).unwrap(), Handle::from_bits(3));

            let err = handle_arg(&ctx, &Value::new_undefined(ctx.clone())).unwrap_err();
            assert!(err.is_exception());
            let exception = ctx.catch();
            let message: String = exception.as_object().unwrap().get("message").unwrap();
            assert_eq!(message, "invalid state: canvas is not initialized");
        });
    }
}
