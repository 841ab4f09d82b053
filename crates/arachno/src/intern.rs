//! Symbol interning.
//!
//! The process-wide table maps user keys to symbol values. `#_symbol` always
//! mints and registers a fresh symbol under its key; `#_symbol_for` shares an
//! existing registration. Symbols carry their rendered label (`Symbol(key)`),
//! which is also the string key under which symbol-named methods are
//! installed on prototypes.

use std::sync::{Arc, LazyLock, RwLock};

use indexmap::IndexMap;

use crate::value::Value;

/// Well-known key consulted by `for..of` over instances.
pub(crate) const ITERATOR: &str = "iterator";
/// Well-known key for custom rendering hooks.
pub(crate) const DEBUG: &str = "debug";

static SYMBOLS: LazyLock<RwLock<IndexMap<String, Arc<str>>>> = LazyLock::new(|| RwLock::new(IndexMap::new()));

fn label_for(key: &str) -> Arc<str> {
    Arc::from(format!("Symbol({key})"))
}

/// Mints a symbol for `key` and (re)registers it.
pub(crate) fn intern(key: &str) -> Value {
    let label = label_for(key);
    SYMBOLS
        .write()
        .expect("symbol table lock poisoned")
        .insert(key.to_owned(), label.clone());
    Value::Symbol(label)
}

/// `Symbol.for`-style sharing: returns the registered symbol for `key`,
/// registering one on first use.
pub(crate) fn intern_shared(key: &str) -> Value {
    if let Some(label) = SYMBOLS.read().expect("symbol table lock poisoned").get(key) {
        return Value::Symbol(label.clone());
    }
    intern(key)
}

/// The string key under which a symbol-named member is stored: the symbol's
/// label. Method declarations with computed symbol names coerce the same way.
pub(crate) fn symbol_key(key: &str) -> Value {
    match intern_shared(key) {
        Value::Symbol(label) => Value::Str(label),
        _ => unreachable!("intern_shared always yields a symbol"),
    }
}

/// Number of registered symbols.
pub fn symbol_count() -> usize {
    SYMBOLS.read().expect("symbol table lock poisoned").len()
}

pub(crate) fn clear() {
    SYMBOLS.write().expect("symbol table lock poisoned").clear();
}
