//! 2D context drawing state
//!
//! `CanvasState` exposes the native save/restore stack to the prelude,
//! which maps the context's style properties onto `prop`/`setProp`.

use fos_canvas::{DrawingState, PropKind, StateStack, StyleValue, TransformMatrix, parse_color};
use rquickjs::class::Trace;
use rquickjs::prelude::Coerced;
use rquickjs::{Ctx, FromJs, IntoJs, JsLifetime, Value};

use crate::bridge::OrThrow;

#[derive(Trace, JsLifetime, Default)]
#[rquickjs::class(rename = "CanvasState")]
pub struct CanvasState {
    #[qjs(skip_trace)]
    stack: StateStack,
}

#[rquickjs::methods]
impl CanvasState {
    #[qjs(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a style property
    pub fn prop<'js>(&self, ctx: Ctx<'js>, name: String) -> rquickjs::Result<Value<'js>> {
        match self.stack.current().get(&name).or_throw(&ctx)? {
            StyleValue::Number(n) => n.into_js(&ctx),
            StyleValue::Text(s) => s.into_js(&ctx),
        }
    }

    /// Assign a style property with the usual script coercions
    #[qjs(rename = "setProp")]
    pub fn set_prop<'js>(
        &mut self,
        ctx: Ctx<'js>,
        name: String,
        value: Value<'js>,
    ) -> rquickjs::Result<()> {
        let value = match DrawingState::kind(&name) {
            Some(PropKind::Number) => StyleValue::Number(Coerced::<f64>::from_js(&ctx, value)?.0),
            Some(PropKind::Text) => StyleValue::Text(Coerced::<String>::from_js(&ctx, value)?.0),
            None => StyleValue::Number(f64::NAN),
        };
        self.stack.current_mut().set(&name, value).or_throw(&ctx)
    }

    pub fn save(&mut self) {
        self.stack.save();
    }

    /// Pop a frame; restoring the base frame is a no-op returning false
    pub fn restore(&mut self) -> bool {
        self.stack.restore()
    }

    #[qjs(get)]
    pub fn depth(&self) -> u32 {
        self.stack.depth() as u32
    }

    #[qjs(rename = "setTransform")]
    pub fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        self.stack.set_transform(TransformMatrix::new(a, b, c, d, e, f));
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.stack.scale(sx, sy);
    }

    pub fn translate(&mut self, tx: f64, ty: f64) {
        self.stack.translate(tx, ty);
    }

    /// `[a, b, c, d, e, f]`
    #[qjs(rename = "getTransform")]
    pub fn transform(&self) -> Vec<f64> {
        self.stack.current().transform.to_array().to_vec()
    }

    /// Packed fill color with the global alpha folded in
    #[qjs(rename = "fillColor")]
    pub fn fill_color(&self, ctx: Ctx<'_>) -> rquickjs::Result<f64> {
        let state = self.stack.current();
        parse_color(&state.fill_style, state.global_alpha)
            .map(|c| c.0 as f64)
            .or_throw(&ctx)
    }

    #[qjs(rename = "strokeColor")]
    pub fn stroke_color(&self, ctx: Ctx<'_>) -> rquickjs::Result<f64> {
        let state = self.stack.current();
        parse_color(&state.stroke_style, state.global_alpha)
            .map(|c| c.0 as f64)
            .or_throw(&ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Class, Context, Runtime};

    fn with_state<R>(f: impl FnOnce(&Ctx<'_>) -> R) -> R {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            Class::<CanvasState>::define(&ctx.globals()).unwrap();
            f(&ctx)
        })
    }

    #[test]
    fn test_defaults_and_coercion() {
        with_state(|ctx| {
            let font: String = ctx.eval("new CanvasState().prop('font')").unwrap();
            assert_eq!(font, "10px sans-serif");
            let alpha: f64 = ctx
                .eval("var s = new CanvasState(); s.setProp('globalAlpha', '0.5'); s.prop('globalAlpha')")
                .unwrap();
            assert_eq!(alpha, 0.5);
            let ignored: String = ctx
                .eval("s.setProp('lineCap', 'wobbly'); s.prop('lineCap')")
                .unwrap();
            assert_eq!(ignored, "butt");
        });
    }

    #[test]
    fn test_save_restore_roundtrip() {
        with_state(|ctx| {
            let same: bool = ctx
                .eval(
                    r#"
                    var s = new CanvasState();
                    s.setProp('fillStyle', '#ff0000');
                    var before = JSON.stringify([s.prop('fillStyle'), s.prop('globalAlpha'), s.getTransform()]);
                    for (var i = 0; i < 3; i++) {
                        s.save();
                        s.setProp('fillStyle', 'rgb(0,0,' + i + ')');
                        s.setProp('globalAlpha', 0.25);
                        s.translate(10, 10);
                    }
                    for (var i = 0; i < 3; i++) s.restore();
                    before === JSON.stringify([s.prop('fillStyle'), s.prop('globalAlpha'), s.getTransform()])
                    "#,
                )
                .unwrap();
            assert!(same);
            let popped: bool = ctx.eval("s.restore()").unwrap();
            assert!(!popped);
            let depth: u32 = ctx.eval("s.depth").unwrap();
            assert_eq!(depth, 1);
        });
    }

    #[test]
    fn test_colors_fold_global_alpha() {
        with_state(|ctx| {
            let color: f64 = ctx
                .eval("var s = new CanvasState(); s.setProp('globalAlpha', 0.5); s.setProp('fillStyle', '#ffffff'); s.fillColor()")
                .unwrap();
            assert_eq!(color as u32, 0xffff_ff7f);
            let bad = ctx
                .eval::<f64, _>("s.setProp('strokeStyle', 'teal'); s.strokeColor()")
                .is_err();
            assert!(bad);
        });
    }

    #[test]
    fn test_unknown_property_throws() {
        with_state(|ctx| {
            let thrown: bool = ctx
                .eval("try { new CanvasState().setProp('bogus', 1); false } catch (e) { true }")
                .unwrap();
            assert!(thrown);
        });
    }
}
