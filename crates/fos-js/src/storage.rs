//! localStorage
//!
//! In-memory string map. Nothing is persisted; a fresh host starts empty.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rquickjs::prelude::{Coerced, Opt};
use rquickjs::{Ctx, Function, IntoJs, Object, Value};

/// Storage backend
#[derive(Debug, Default)]
pub struct Storage {
    data: BTreeMap<String, String>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    pub fn remove_item(&mut self, key: &str) {
        self.data.remove(key);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Key at `index` in key order
    pub fn key(&self, index: usize) -> Option<&str> {
        self.data.keys().nth(index).map(String::as_str)
    }

    pub fn length(&self) -> usize {
        self.data.len()
    }
}

/// Missing entries read as `null`, not `undefined`
fn nullable<'js>(ctx: &Ctx<'js>, value: Option<&str>) -> rquickjs::Result<Value<'js>> {
    match value {
        Some(value) => value.into_js(ctx),
        None => Ok(Value::new_null(ctx.clone())),
    }
}

/// Build the script-side `localStorage` object
pub fn create_storage_object<'js>(
    ctx: &Ctx<'js>,
    storage: Rc<RefCell<Storage>>,
) -> rquickjs::Result<Object<'js>> {
    let obj = Object::new(ctx.clone())?;

    let s = storage.clone();
    obj.set(
        "getItem",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, key: Coerced<String>| -> rquickjs::Result<Value<'js>> {
                nullable(&ctx, s.borrow().get_item(&key.0))
            },
        )?,
    )?;

    let s = storage.clone();
    obj.set(
        "setItem",
        Function::new(ctx.clone(), move |key: Coerced<String>, value: Coerced<String>| {
            s.borrow_mut().set_item(&key.0, &value.0);
        })?,
    )?;

    let s = storage.clone();
    obj.set(
        "removeItem",
        Function::new(ctx.clone(), move |key: Coerced<String>| {
            s.borrow_mut().remove_item(&key.0);
        })?,
    )?;

    let s = storage.clone();
    obj.set(
        "clear",
        Function::new(ctx.clone(), move || {
            s.borrow_mut().clear();
        })?,
    )?;

    let s = storage.clone();
    obj.set(
        "key",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, index: Opt<f64>| -> rquickjs::Result<Value<'js>> {
                let index = index.0.unwrap_or(0.0);
                if index < 0.0 || !index.is_finite() {
                    return nullable(&ctx, None);
                }
                nullable(&ctx, s.borrow().key(index as usize))
            },
        )?,
    )?;

    let s = storage;
    obj.set(
        "_length",
        Function::new(ctx.clone(), move || -> u32 { s.borrow().length() as u32 })?,
    )?;

    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    #[test]
    fn test_storage() {
        let mut storage = Storage::new();

        storage.set_item("key1", "value1");
        assert_eq!(storage.get_item("key1"), Some("value1"));

        storage.set_item("key2", "value2");
        assert_eq!(storage.length(), 2);
        assert_eq!(storage.key(1), Some("key2"));
        assert_eq!(storage.key(2), None);

        storage.remove_item("key1");
        assert_eq!(storage.get_item("key1"), None);

        storage.clear();
        assert_eq!(storage.length(), 0);
    }

    #[test]
    fn test_script_access() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let storage = Rc::new(RefCell::new(Storage::new()));

        context.with(|ctx| {
            let obj = create_storage_object(&ctx, storage.clone()).unwrap();
            ctx.globals().set("store", obj).unwrap();
            let missing: bool = ctx.eval("store.getItem('RPG Config') === null").unwrap();
            assert!(missing);
            let _: () = ctx.eval("store.setItem('RPG Config', 12); store.setItem('x', 'y'); store.removeItem('x')").unwrap();
        });
        assert_eq!(storage.borrow().get_item("RPG Config"), Some("12"));
        assert_eq!(storage.borrow().length(), 1);
    }

    #[test]
    fn test_key_lookup_from_script() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let storage = Rc::new(RefCell::new(Storage::new()));
        storage.borrow_mut().set_item("b", "2");
        storage.borrow_mut().set_item("a", "1");

        context.with(|ctx| {
            let obj = create_storage_object(&ctx, storage.clone()).unwrap();
            ctx.globals().set("store", obj).unwrap();
            let keys: String = ctx
                .eval("[store.key(0), store.key(1), store.key(2), store.key(-1), store._length()].join(',')")
                .unwrap();
            assert_eq!(keys, "a,b,,,2");
            let nulls: bool = ctx.eval("store.key(5) === null && store.getItem('a') === '1'").unwrap();
            assert!(nulls);
        });
    }
}
