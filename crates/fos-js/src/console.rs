//! Console API
//!
//! Implements console.log, console.warn, console.error, etc. on top of
//! `tracing`.

use std::fmt::Write;

use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};

/// Console levels and the tracing level each maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

/// Install console API into the global object
pub fn install_console<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    for (name, level) in [
        ("log", Level::Log),
        ("info", Level::Info),
        ("warn", Level::Warn),
        ("error", Level::Error),
        ("debug", Level::Debug),
    ] {
        console.set(
            name,
            Function::new(ctx.clone(), move |args: Rest<Value<'js>>| {
                log_with_level(level, &args.0);
            })?,
        )?;
    }
    ctx.globals().set("console", console)?;
    Ok(())
}

fn log_with_level(level: Level, values: &[Value<'_>]) {
    let mut output = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        format_value(&mut output, value);
    }

    match level {
        Level::Error => tracing::error!("[JS] {}", output),
        Level::Warn => tracing::warn!("[JS] {}", output),
        Level::Debug => tracing::debug!("[JS] {}", output),
        Level::Log | Level::Info => tracing::info!("[JS] {}", output),
    }
}

/// Format a JavaScript value for logging
fn format_value(out: &mut String, value: &Value<'_>) {
    if value.is_undefined() {
        out.push_str("undefined");
    } else if value.is_null() {
        out.push_str("null");
    } else if let Some(b) = value.as_bool() {
        write!(out, "{b}").ok();
    } else if let Some(n) = value.as_int() {
        write!(out, "{n}").ok();
    } else if let Some(n) = value.as_float() {
        write!(out, "{n}").ok();
    } else if let Some(s) = value.as_string() {
        if let Ok(s) = s.to_string() {
            out.push_str(&s);
        }
    } else if let Some(e) = value.as_exception() {
        out.push_str(&e.message().unwrap_or_else(|| "Error".to_string()));
    } else if value.is_array() {
        out.push_str("[Array]");
    } else if value.is_function() {
        out.push_str("[Function]");
    } else if value.is_object() {
        out.push_str("[Object]");
    } else {
        out.push_str("[unknown]");
    }
}
