//! The macro registry and the core `#_` macros.
//!
//! Macros are host-provided callables exposed as runtime values under
//! reserved `#_` names; the calling convention is
//! `(args, env, pos, interpreter) -> value`. The registry is populated with
//! the core set at first use and installed into the global scope as `static`
//! bindings when the global scope is created. Hosts extend the set with
//! [`register_macro`] (the HTTP server, ASX compiler, and REPL surfaces live
//! host-side).

use std::sync::{Arc, LazyLock, RwLock};

use indexmap::IndexMap;

use crate::{
    ast::{DeclKind, Pos},
    exception::{RunError, RunResult, type_error},
    heap::{self, Handle, HeapData},
    intern,
    parse::Parser,
    run::Interpreter,
    scope::{self, ScopeId, ScopeKind},
    value::{
        self, MacroFn, Value, alloc_array, alloc_macro, alloc_object, alloc_raw, instance_data, to_plain_string,
    },
};

static RUNTIME_ARGS: LazyLock<RwLock<Vec<String>>> = LazyLock::new(|| RwLock::new(Vec::new()));

/// Sets the script arguments surfaced by `#_runtime_arguments`.
pub fn set_runtime_arguments(args: Vec<String>) {
    *RUNTIME_ARGS.write().expect("runtime args lock poisoned") = args;
}

static REGISTRY: LazyLock<RwLock<IndexMap<String, MacroFn>>> = LazyLock::new(|| RwLock::new(core_macros()));

/// Registers a macro under a `#_` name. Macros registered before the first
/// interpreter is created are installed into the global scope at startup;
/// later registrations install immediately.
pub fn register_macro<F>(name: &str, func: F)
where
    F: Fn(&mut Interpreter, &[Value], ScopeId, Pos) -> RunResult<Value> + Send + Sync + 'static,
{
    let func: MacroFn = Arc::new(func);
    REGISTRY
        .write()
        .expect("macro registry lock poisoned")
        .insert(name.to_owned(), func.clone());
    if let Some(global) = scope::global_scope_if_created() {
        let value = alloc_macro(name, func);
        scope::insert_binding(global, name, heap::alloc_cell(value), DeclKind::Static);
    }
}

/// Installs every registered macro into the global scope as a `static`
/// binding. Called once, from global-scope creation.
pub(crate) fn install_macros(global: ScopeId) {
    let registry: Vec<(String, MacroFn)> = REGISTRY
        .read()
        .expect("macro registry lock poisoned")
        .iter()
        .map(|(name, func)| (name.clone(), func.clone()))
        .collect();
    for (name, func) in registry {
        let value = alloc_macro(&name, func);
        scope::insert_binding(global, &name, heap::alloc_cell(value), DeclKind::Static);
    }
}

// ---- argument plumbing ----

fn macro_error(message: impl Into<String>, env: ScopeId, pos: Pos) -> RunError {
    let path = scope::source_path(env);
    type_error(message, pos, &path)
}

fn want_str(args: &[Value], index: usize, what: &str, env: ScopeId, pos: Pos) -> RunResult<Arc<str>> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        other => Err(macro_error(
            format!(
                "{what} expects its argument {} to be of type (string) but got {}",
                index + 1,
                other.map_or("undefined".to_owned(), |v| v.kind().to_string())
            ),
            env,
            pos,
        )),
    }
}

fn want_number(args: &[Value], index: usize, what: &str, env: ScopeId, pos: Pos) -> RunResult<f64> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        other => Err(macro_error(
            format!(
                "{what} expects its argument {} to be of type (number) but got {}",
                index + 1,
                other.map_or("undefined".to_owned(), |v| v.kind().to_string())
            ),
            env,
            pos,
        )),
    }
}

// ---- byte arrays (Raw payloads) ----

const BYTE_ARRAY: &str = "byte-array";
const BYTE: &str = "byte";

fn raw_bytes(args: &[Value], index: usize, what: &str, env: ScopeId, pos: Pos) -> RunResult<(Handle, Vec<u8>)> {
    if let Some(Value::Raw(handle)) = args.get(index) {
        let bytes = heap::with(*handle, |data| match data {
            HeapData::Raw(raw) => raw.value.downcast_ref::<Vec<u8>>().cloned(),
            _ => None,
        })
        .flatten();
        if let Some(bytes) = bytes {
            return Ok((*handle, bytes));
        }
    }
    Err(macro_error(
        format!("{what} expects its argument {} to be of type (raw [byte array])", index + 1),
        env,
        pos,
    ))
}

fn raw_byte(args: &[Value], index: usize) -> Option<u8> {
    if let Some(Value::Raw(handle)) = args.get(index) {
        return heap::with(*handle, |data| match data {
            HeapData::Raw(raw) => raw.value.downcast_ref::<u8>().copied(),
            _ => None,
        })
        .flatten();
    }
    None
}

// ---- the core macro set ----

fn m<F>(func: F) -> MacroFn
where
    F: Fn(&mut Interpreter, &[Value], ScopeId, Pos) -> RunResult<Value> + Send + Sync + 'static,
{
    Arc::new(func)
}

fn core_macros() -> IndexMap<String, MacroFn> {
    let mut macros: IndexMap<String, MacroFn> = IndexMap::new();

    macros.insert(
        "#_print".to_owned(),
        m(|interp, args, _env, _pos| {
            interp.print_args(args);
            Ok(Value::Undefined)
        }),
    );

    macros.insert(
        "#_symbol".to_owned(),
        m(|_interp, args, env, pos| {
            let Some(key) = args.first() else {
                return Err(macro_error("#_symbol needs one argument of type string", env, pos));
            };
            Ok(intern::intern(&to_plain_string(key)))
        }),
    );

    macros.insert(
        "#_symbol_for".to_owned(),
        m(|_interp, args, env, pos| {
            let Some(key) = args.first() else {
                return Err(macro_error("#_symbol_for needs one argument of type string", env, pos));
            };
            Ok(intern::intern_shared(&to_plain_string(key)))
        }),
    );

    macros.insert(
        "#_to_string".to_owned(),
        m(|_interp, args, _env, _pos| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            Ok(Value::str(to_plain_string(&value)))
        }),
    );

    macros.insert(
        "#_str_length".to_owned(),
        m(|_interp, args, _env, _pos| {
            let length = match args.first() {
                Some(Value::Str(s)) => s.len() as f64,
                _ => -1.0,
            };
            Ok(Value::Number(length))
        }),
    );

    macros.insert(
        "#_slice_str".to_owned(),
        m(|_interp, args, env, pos| {
            if args.len() < 3 {
                return Err(macro_error(
                    "#_slice_str expects 3 arguments of type (number, number, string)",
                    env,
                    pos,
                ));
            }
            let from = want_number(args, 0, "#_slice_str", env, pos)? as i64;
            let to = want_number(args, 1, "#_slice_str", env, pos)? as i64;
            let text = want_str(args, 2, "#_slice_str", env, pos)?;
            let length = text.len() as i64;
            let mut from = if from < 0 { from + length } else { from };
            let mut to = to.min(length - 1);
            from = from.clamp(0, (length - 1).max(0));
            to = to.max(0);
            if length == 0 || from > to {
                return Ok(Value::str(""));
            }
            let slice = text.get(from as usize..=(to as usize)).unwrap_or("");
            Ok(Value::str(slice.to_owned()))
        }),
    );

    macros.insert(
        "#_unicode".to_owned(),
        m(|_interp, _args, _env, _pos| {
            let codes = [
                ("reset", "\x1b[0m"),
                ("bright", "\x1b[1m"),
                ("dim", "\x1b[2m"),
                ("italics", "\x1b[3m"),
                ("underline", "\x1b[4m"),
                ("red", "\x1b[31m"),
                ("green", "\x1b[32m"),
                ("yellow", "\x1b[33m"),
                ("blue", "\x1b[34m"),
                ("magenta", "\x1b[35m"),
                ("cyan", "\x1b[36m"),
                ("newline", "\r\n"),
                ("tab", "\t"),
            ];
            let props = codes.iter().map(|(k, v)| (Value::str(*k), Value::str(*v))).collect();
            Ok(alloc_object(props, None))
        }),
    );

    macros.insert(
        "#_value".to_owned(),
        m(|_interp, args, env, pos| {
            let Some(value) = args.first() else {
                return Err(macro_error("#_value expects 1 argument of type (any)", env, pos));
            };
            if let Value::Instance(handle) = value
                && let Some(data) = instance_data(*handle)
                && let Some(default) = data.default
            {
                return Ok(heap::get_cell(default));
            }
            Ok(value.clone())
        }),
    );

    macros.insert(
        "#_array_length".to_owned(),
        m(|_interp, args, env, pos| {
            let Some(Value::Array(handle)) = args.first() else {
                return Err(macro_error(
                    "#_array_length expects its 1st argument to be of type (array)",
                    env,
                    pos,
                ));
            };
            Ok(Value::Number(value::array_len(*handle) as f64))
        }),
    );

    macros.insert(
        "#_runtime_arguments".to_owned(),
        m(|_interp, _args, _env, _pos| {
            let args: Vec<Value> = RUNTIME_ARGS
                .read()
                .expect("runtime args lock poisoned")
                .iter()
                .map(|arg| Value::str(arg.clone()))
                .collect();
            Ok(alloc_array(args))
        }),
    );

    macros.insert(
        "#_date".to_owned(),
        m(|_interp, _args, _env, _pos| {
            use chrono::{Datelike, Local, Timelike};
            let now = Local::now();
            let fields = [
                ("getHour", f64::from(now.hour())),
                ("getMinute", f64::from(now.minute())),
                ("getSecond", f64::from(now.second())),
                ("getMillisecond", f64::from(now.nanosecond() / 1_000_000)),
                ("getDay", f64::from(now.day())),
                ("getMonth", f64::from(now.month())),
                ("getYear", f64::from(now.year())),
                ("getWeekDay", f64::from(now.weekday().num_days_from_sunday())),
            ];
            let props = fields.iter().map(|(k, v)| (Value::str(*k), Value::Number(*v))).collect();
            Ok(alloc_object(props, None))
        }),
    );

    macros.insert(
        "#_import_meta_path".to_owned(),
        m(|_interp, _args, env, _pos| Ok(Value::str(scope::source_path(env)))),
    );

    macros.insert(
        "#_as_absolute_path".to_owned(),
        m(|_interp, args, env, pos| {
            let path = want_str(args, 0, "#_as_absolute_path", env, pos)?;
            let absolute = std::path::absolute(path.as_ref())
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| path.to_string());
            Ok(Value::str(absolute))
        }),
    );

    macros.insert(
        "#_relative_path_to_file".to_owned(),
        m(|_interp, args, env, pos| {
            let file = want_str(args, 0, "#_relative_path_to_file", env, pos)?;
            let target = want_str(args, 1, "#_relative_path_to_file", env, pos)?;
            let base = std::path::Path::new(file.as_ref())
                .parent()
                .unwrap_or_else(|| std::path::Path::new("."));
            Ok(Value::str(base.join(target.as_ref()).to_string_lossy().into_owned()))
        }),
    );

    macros.insert(
        "#_run_as_script".to_owned(),
        m(|interp, args, env, pos| {
            let target = want_str(args, 0, "#_run_as_script", env, pos)?;
            let resolved = std::path::absolute(target.as_ref())
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| target.to_string());
            let program = Parser::from_file(&resolved, "program")
                .and_then(|parser| parser.parse(true))
                .map_err(RunError::from)?;
            let script = scope::new_scope(Some(env), ScopeKind::Program, &resolved);
            let mut sub = interp.sub_interpreter();
            sub.eval_program(&program, script)?;
            Ok(Value::Undefined)
        }),
    );

    macros.insert(
        "#_new_parser".to_owned(),
        m(|_interp, args, env, pos| {
            let path = want_str(args, 0, "#_new_parser", env, pos)?;
            let script_type = want_str(args, 1, "#_new_parser", env, pos)?;
            let parse = alloc_macro(
                "parse",
                m(move |_interp, args, env, pos| {
                    let Some(Value::Bool(main)) = args.first() else {
                        return Err(macro_error(
                            "Parser.parse (#_new_parser().parse) expects its 1st argument to be of type (boolean)",
                            env,
                            pos,
                        ));
                    };
                    let program = Parser::from_file(&path, &script_type)
                        .and_then(|parser| parser.parse(*main))
                        .map_err(RunError::from)?;
                    Ok(alloc_raw("program", Box::new(program)))
                }),
            );
            Ok(alloc_object(vec![(Value::str("parse"), parse)], None))
        }),
    );

    // byte arrays

    macros.insert(
        "#_new_byte_array".to_owned(),
        m(|_interp, args, env, pos| {
            let bytes: Vec<u8> = match args.first() {
                None => Vec::new(),
                Some(Value::Str(s)) => s.as_bytes().to_vec(),
                Some(Value::Number(_)) => {
                    let mut bytes = Vec::with_capacity(args.len());
                    for (index, arg) in args.iter().enumerate() {
                        let Value::Number(n) = arg else {
                            return Err(macro_error(
                                format!("#_new_byte_array expects its argument {} to be of type (number)", index + 1),
                                env,
                                pos,
                            ));
                        };
                        bytes.push(*n as u8);
                    }
                    bytes
                }
                Some(Value::Raw(_)) => {
                    let mut bytes = Vec::with_capacity(args.len());
                    for index in 0..args.len() {
                        let Some(byte) = raw_byte(args, index) else {
                            return Err(macro_error(
                                format!(
                                    "#_new_byte_array expects its argument {} to be of type (raw [byte])",
                                    index + 1
                                ),
                                env,
                                pos,
                            ));
                        };
                        bytes.push(byte);
                    }
                    bytes
                }
                Some(other) => {
                    return Err(macro_error(
                        format!(
                            "#_new_byte_array cannot build a byte array from type {}",
                            other.kind()
                        ),
                        env,
                        pos,
                    ));
                }
            };
            Ok(alloc_raw(BYTE_ARRAY, Box::new(bytes)))
        }),
    );

    macros.insert(
        "#_byte".to_owned(),
        m(|_interp, args, env, pos| {
            let byte = match args.first() {
                Some(Value::Str(s)) if !s.is_empty() => s.as_bytes()[0],
                Some(Value::Number(n)) => *n as u8,
                other => {
                    return Err(macro_error(
                        format!(
                            "#_byte: cannot convert argument of {} to byte",
                            other.map_or("undefined".to_owned(), |v| v.kind().to_string())
                        ),
                        env,
                        pos,
                    ));
                }
            };
            Ok(alloc_raw(BYTE, Box::new(byte)))
        }),
    );

    macros.insert(
        "#_push_byte".to_owned(),
        m(|_interp, args, env, pos| {
            let (handle, _) = raw_bytes(args, 0, "#_push_byte", env, pos)?;
            let Some(byte) = raw_byte(args, 1) else {
                return Err(macro_error(
                    "#_push_byte expects its 2nd argument to be of type (raw [byte])",
                    env,
                    pos,
                ));
            };
            heap::mutate(handle, |data| {
                if let HeapData::Raw(raw) = data
                    && let Some(bytes) = raw.value.downcast_mut::<Vec<u8>>()
                {
                    bytes.push(byte);
                }
            });
            Ok(args[0].clone())
        }),
    );

    macros.insert(
        "#_write_byte_array".to_owned(),
        m(|_interp, args, env, pos| {
            let (_, source) = raw_bytes(args, 0, "#_write_byte_array", env, pos)?;
            let (dest_handle, dest) = raw_bytes(args, 1, "#_write_byte_array", env, pos)?;
            let position = want_number(args, 2, "#_write_byte_array", env, pos)? as usize;
            if position + source.len() > dest.len() {
                return Err(macro_error("#_write_byte_array: write exceeds destination length", env, pos));
            }
            heap::mutate(dest_handle, |data| {
                if let HeapData::Raw(raw) = data
                    && let Some(bytes) = raw.value.downcast_mut::<Vec<u8>>()
                {
                    bytes[position..position + source.len()].copy_from_slice(&source);
                }
            });
            Ok(alloc_raw(BYTE_ARRAY, Box::new(Vec::<u8>::new())))
        }),
    );

    macros.insert(
        "#_decode_byte_array".to_owned(),
        m(|_interp, args, env, pos| {
            let (_, bytes) = raw_bytes(args, 0, "#_decode_byte_array", env, pos)?;
            Ok(Value::str(String::from_utf8_lossy(&bytes).into_owned()))
        }),
    );

    macros.insert(
        "#_is_byte_array".to_owned(),
        m(|_interp, args, env, pos| Ok(Value::Bool(raw_bytes(args, 0, "#_is_byte_array", env, pos).is_ok()))),
    );

    macros.insert(
        "#_byte_array_length".to_owned(),
        m(|_interp, args, env, pos| {
            let (_, bytes) = raw_bytes(args, 0, "#_byte_array_length", env, pos)?;
            Ok(Value::Number(bytes.len() as f64))
        }),
    );

    macros.insert(
        "#_byte_at".to_owned(),
        m(|_interp, args, env, pos| {
            let (_, bytes) = raw_bytes(args, 0, "#_byte_at", env, pos)?;
            let index = want_number(args, 1, "#_byte_at", env, pos)? as usize;
            let Some(byte) = bytes.get(index) else {
                return Err(macro_error("#_byte_at: index out of range", env, pos));
            };
            Ok(Value::Number(f64::from(*byte)))
        }),
    );

    macros
}
