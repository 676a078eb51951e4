//! Builtin prototype extensions
//!
//! Helpers legacy game code expects on `String`, `Number` and `Array`.
//! Each is added non-enumerable and only when the prototype does not
//! already define it.

use rquickjs::object::Property;
use rquickjs::prelude::{Coerced, Opt, Rest, This};
use rquickjs::{Array, Ctx, Function, Object, Value};

/// Replace `%N` placeholders with the N-th argument (1-based).
/// Placeholders without a matching argument are kept.
pub fn format_placeholders(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let arg = after[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| args.get(i));
        match arg {
            Some(arg) => out.push_str(arg),
            None => out.push_str(&rest[pos..pos + 1 + digits]),
        }
        rest = &after[digits..];
    }
    out.push_str(rest);
    out
}

/// Left-pad with zeros up to `length` characters
pub fn pad_zero(s: &str, length: usize) -> String {
    let missing = length.saturating_sub(s.chars().count());
    let mut out = "0".repeat(missing);
    out.push_str(s);
    out
}

/// Modulo with the sign of the divisor
pub fn modulo(x: f64, n: f64) -> f64 {
    ((x % n) + n) % n
}

fn clamp(x: f64, min: f64, max: f64) -> f64 {
    let mut v = x;
    if v < min {
        v = min;
    }
    if v > max {
        v = max;
    }
    v
}

fn length_arg(n: Opt<f64>) -> usize {
    n.0.filter(|n| n.is_finite() && *n > 0.0).map_or(0, |n| n as usize)
}

fn strict_equals<'js>(a: &Value<'js>, b: &Value<'js>) -> bool {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_string(), b.as_string()) {
        return matches!((x.to_string(), y.to_string()), (Ok(x), Ok(y)) if x == y);
    }
    a == b
}

fn arrays_equal<'js>(a: &Array<'js>, b: &Value<'js>) -> rquickjs::Result<bool> {
    let Some(b) = b.as_array() else {
        return Ok(false);
    };
    if a.len() != b.len() {
        return Ok(false);
    }
    for i in 0..a.len() {
        let x: Value = a.get(i)?;
        let y: Value = b.get(i)?;
        let same = match x.as_array() {
            Some(inner) if y.is_array() => arrays_equal(inner, &y)?,
            _ => strict_equals(&x, &y),
        };
        if !same {
            return Ok(false);
        }
    }
    Ok(true)
}

fn add_missing<'js>(proto: &Object<'js>, name: &str, f: Function<'js>) -> rquickjs::Result<()> {
    if proto.contains_key(name)? {
        tracing::trace!(name, "builtin already defined");
        return Ok(());
    }
    proto.prop(name, Property::from(f.with_name(name)?).writable().configurable())
}

fn prototype<'js>(ctx: &Ctx<'js>, class: &str) -> rquickjs::Result<Object<'js>> {
    ctx.globals().get::<_, Object>(class)?.get("prototype")
}

/// Install the extensions on the global constructors
pub fn install_builtins<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let string = prototype(ctx, "String")?;
    add_missing(
        &string,
        "format",
        Function::new(ctx.clone(), |this: This<Coerced<String>>, args: Rest<Coerced<String>>| {
            let args: Vec<String> = args.0.into_iter().map(|a| a.0).collect();
            format_placeholders(&this.0.0, &args)
        })?,
    )?;
    add_missing(
        &string,
        "padZero",
        Function::new(ctx.clone(), |this: This<Coerced<String>>, n: Opt<f64>| {
            pad_zero(&this.0.0, length_arg(n))
        })?,
    )?;
    add_missing(
        &string,
        "contains",
        Function::new(ctx.clone(), |this: This<Coerced<String>>, s: Coerced<String>| {
            this.0.0.contains(s.0.as_str())
        })?,
    )?;

    let number = prototype(ctx, "Number")?;
    add_missing(
        &number,
        "clamp",
        Function::new(ctx.clone(), |this: This<Coerced<f64>>, min: f64, max: f64| {
            clamp(this.0.0, min, max)
        })?,
    )?;
    add_missing(
        &number,
        "mod",
        Function::new(ctx.clone(), |this: This<Coerced<f64>>, n: f64| modulo(this.0.0, n))?,
    )?;
    add_missing(
        &number,
        "padZero",
        Function::new(ctx.clone(), |this: This<Coerced<String>>, n: Opt<f64>| {
            pad_zero(&this.0.0, length_arg(n))
        })?,
    )?;

    let array = prototype(ctx, "Array")?;
    add_missing(
        &array,
        "equals",
        Function::new(
            ctx.clone(),
            |this: This<Array<'js>>, other: Value<'js>| -> rquickjs::Result<bool> {
                arrays_equal(&this.0, &other)
            },
        )?,
    )?;
    add_missing(
        &array,
        "clone",
        Function::new(ctx.clone(), |this: This<Object<'js>>| -> rquickjs::Result<Value<'js>> {
            this.0
                .get::<_, Function<'js>>("slice")?
                .call::<_, Value<'js>>((This(this.0.clone()), 0))
        })?,
    )?;
    add_missing(
        &array,
        "contains",
        Function::new(ctx.clone(), |this: This<Array<'js>>, needle: Value<'js>| -> bool {
            this.0
                .iter::<Value<'js>>()
                .any(|v| v.is_ok_and(|v| strict_equals(&v, &needle)))
        })?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn eval<T: for<'js> rquickjs::FromJs<'js>>(source: &str) -> T {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            install_builtins(&ctx).unwrap();
            ctx.eval(source).unwrap()
        })
    }

    #[test]
    fn test_format_placeholders() {
        let args = ["hello".to_string(), "world".to_string()];
        assert_eq!(format_placeholders("", &args), "");
        assert_eq!(format_placeholders("foo%1bar%2baz", &args), "foohellobarworldbaz");
        assert_eq!(format_placeholders("%2%1%2", &args), "worldhelloworld");
        assert_eq!(format_placeholders("100% %3", &args), "100% %3");
    }

    #[test]
    fn test_pad_and_mod() {
        assert_eq!(pad_zero("7", 3), "007");
        assert_eq!(pad_zero("1234", 3), "1234");
        assert_eq!(modulo(-1.0, 4.0), 3.0);
        assert_eq!(modulo(5.0, 4.0), 1.0);
    }

    #[test]
    fn test_string_and_number_methods() {
        let s: String = eval("'%1 has %2 HP'.format('Harold', 120)");
        assert_eq!(s, "Harold has 120 HP");
        let s: String = eval("(5).padZero(3) + ':' + '42'.padZero(4)");
        assert_eq!(s, "005:0042");
        let n: f64 = eval("(15).clamp(0, 10) + (-3).clamp(0, 10) + (-1).mod(5)");
        assert_eq!(n, 14.0);
        let b: bool = eval("'abc'.contains('bc') && !'abc'.contains('x')");
        assert!(b);
    }

    #[test]
    fn test_array_methods() {
        let b: bool = eval("[1, [2, 'x']].equals([1, [2, 'x']]) && ![1, 2].equals([1, 3]) && ![1].equals(null)");
        assert!(b);
        let b: bool = eval("var a = [1, 2]; var c = a.clone(); c.push(3); a.length === 2 && c.length === 3");
        assert!(b);
        let b: bool = eval("[1, 'two'].contains('two') && ![1].contains(2)");
        assert!(b);
        let keys: String = eval("var k = []; for (var i in [5, 6]) k.push(i); k.join(',')");
        assert_eq!(keys, "0,1");
    }

    #[test]
    fn test_existing_methods_are_kept() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let _: () = ctx.eval("String.prototype.format = function() { return 'mine'; }").unwrap();
            install_builtins(&ctx).unwrap();
            let s: String = ctx.eval("'x'.format()").unwrap();
            assert_eq!(s, "mine");
        });
    }
}
