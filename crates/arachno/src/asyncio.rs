//! Promises and the microtask queue.
//!
//! All "async" is a scheduling trick inside a single thread: constructing a
//! promise queues one executor task, and the interpreter drains the queue
//! (LIFO) after the synchronous program completes. A promise instance carries
//! three callback cells (`thenCallback`, `catchCallback`, `finallyCallback`)
//! registered by the chainable `then`/`catch`/`finally` methods and fired
//! when the executor settles.

use std::sync::{Arc, LazyLock, RwLock};

use smallvec::smallvec;

use crate::{
    ast::{DeclKind, Pos},
    exception::{RunResult, type_error},
    heap::{self, Handle, HeapData},
    run::Interpreter,
    scope::{self, ScopeId},
    value::{self, CallArgs, InstanceData, NativeClassData, Value, alloc_macro, alloc_object, find_own_prop, insert_prop},
};

/// One queued executor invocation.
pub(crate) struct Task {
    /// Function or macro to invoke when the task drains.
    pub executor: Value,
    /// Arguments for the executor. With `pass_resolve`, the promise's
    /// `resolve` macro is prepended at drain time.
    pub args: CallArgs,
    /// The promise instance this task settles.
    pub promise: Handle,
    /// `new Promise(f)` executors receive `resolve` as their first argument;
    /// async-function executors receive only their original arguments.
    pub pass_resolve: bool,
    pub env: ScopeId,
    pub pos: Pos,
}

static PROMISE_CLASS: LazyLock<RwLock<Option<Handle>>> = LazyLock::new(|| RwLock::new(None));

/// The shared native `Promise` class body, built once per process.
pub(crate) fn promise_class_handle() -> Handle {
    if let Some(handle) = *PROMISE_CLASS.read().expect("promise class lock poisoned") {
        return handle;
    }
    let mut slot = PROMISE_CLASS.write().expect("promise class lock poisoned");
    if let Some(handle) = *slot {
        return handle;
    }
    let ctor = alloc_macro(
        "constructor",
        Arc::new(|interp: &mut Interpreter, args: &[Value], env: ScopeId, pos: Pos| {
            let path = scope::source_path(env);
            let Some((Value::Instance(instance), rest)) = args.split_last() else {
                return Err(type_error("Promise constructor invoked without an instance", pos, &path));
            };
            let Some(executor) = rest.first().cloned() else {
                return Err(type_error("Promise expects one argument, but it was given none", pos, &path));
            };
            if !matches!(executor, Value::Function(_) | Value::Macro(_)) {
                return Err(type_error(
                    format!(
                        "Promise expects an argument of type 'function', but it was given one of {}",
                        executor.kind()
                    ),
                    pos,
                    &path,
                ));
            }
            setup_promise(interp, *instance, executor, CallArgs::new(), true, env, pos);
            Ok(Value::Undefined)
        }),
    );
    let Value::Macro(ctor_handle) = ctor else {
        unreachable!("alloc_macro yields a macro value");
    };
    let handle = heap::alloc(HeapData::NativeClass(NativeClassData {
        name: "Promise".to_owned(),
        ctor: ctor_handle,
        methods: Vec::new(),
        props: Vec::new(),
    }));
    *slot = Some(handle);
    handle
}

/// Declares the `Promise` binding in the global scope.
pub(crate) fn install_promise_class(global: ScopeId) {
    let class = Value::NativeClass(promise_class_handle());
    scope::insert_binding(global, "Promise", heap::alloc_cell(class), DeclKind::Static);
}

/// Drops the cached class body so a fresh heap rebuilds it. Part of
/// `reset_runtime`.
pub(crate) fn clear() {
    *PROMISE_CLASS.write().expect("promise class lock poisoned") = None;
}

/// Builds a promise around `executor` directly (async function calls and
/// dynamic import), without going through `new`.
pub(crate) fn make_promise(
    interp: &mut Interpreter,
    executor: Value,
    exec_args: CallArgs,
    pass_resolve: bool,
    env: ScopeId,
    pos: Pos,
) -> RunResult<Value> {
    let class = promise_class_handle();
    let instance = heap::alloc(HeapData::Instance(InstanceData {
        class_name: "Promise".to_owned(),
        class,
        default: None,
        props: Vec::new(),
        proto: alloc_object(Vec::new(), Some(env)),
        class_body: env,
    }));
    setup_promise(interp, instance, executor, exec_args, pass_resolve, env, pos);
    Ok(Value::Instance(instance))
}

/// Installs the per-promise callback cells and method macros, then queues the
/// executor task.
pub(crate) fn setup_promise(
    interp: &mut Interpreter,
    instance: Handle,
    executor: Value,
    exec_args: CallArgs,
    pass_resolve: bool,
    env: ScopeId,
    pos: Pos,
) {
    let this = Value::Instance(instance);
    let then_cell = heap::alloc_cell(Value::Undefined);
    let catch_cell = heap::alloc_cell(Value::Undefined);
    let finally_cell = heap::alloc_cell(Value::Undefined);
    insert_prop(&this, Value::str("thenCallback"), then_cell);
    insert_prop(&this, Value::str("catchCallback"), catch_cell);
    insert_prop(&this, Value::str("finallyCallback"), finally_cell);

    let register = |name: &'static str, cell: Handle| {
        alloc_macro(
            name,
            Arc::new(move |_interp: &mut Interpreter, args: &[Value], env: ScopeId, pos: Pos| {
                let Some(callback) = args.first().cloned() else {
                    let path = scope::source_path(env);
                    return Err(type_error(
                        format!("Promise.{name} expects 1 argument (callback), but it was given 0"),
                        pos,
                        &path,
                    ));
                };
                heap::set_cell(cell, callback);
                Ok(Value::Instance(instance))
            }),
        )
    };
    let then_macro = register("then", then_cell);
    let catch_macro = register("catch", catch_cell);
    let finally_macro = register("finally", finally_cell);

    // resolve(value, promise): fires the promise's registered then callback
    // and yields the value either way.
    let resolve_macro = alloc_macro(
        "resolve",
        Arc::new(|interp: &mut Interpreter, args: &[Value], env: ScopeId, pos: Pos| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            if let Some(promise @ Value::Instance(_)) = args.get(1) {
                if let Some(cell) = find_own_prop(promise, &Value::str("thenCallback")) {
                    let callback = heap::get_cell(cell);
                    if matches!(callback, Value::Function(_) | Value::Macro(_)) {
                        interp.call_value(callback, smallvec![value.clone()], env, pos)?;
                    }
                }
            }
            Ok(value)
        }),
    );

    for (name, value) in [
        ("then", then_macro),
        ("catch", catch_macro),
        ("finally", finally_macro),
        ("resolve", resolve_macro),
    ] {
        insert_prop(&this, Value::str(name), heap::alloc_cell(value));
    }

    interp.queue_microtask(Task {
        executor,
        args: exec_args,
        promise: instance,
        pass_resolve,
        env,
        pos,
    });
}

impl Interpreter {
    pub(crate) fn queue_microtask(&mut self, task: Task) {
        self.microtasks.push(task);
    }

    /// Drains the queue LIFO until empty. Called after top-level evaluation
    /// and at the end of each REPL input.
    pub(crate) fn drain_microtasks(&mut self) -> RunResult<()> {
        while let Some(task) = self.microtasks.pop() {
            self.run_task(task)?;
        }
        Ok(())
    }

    fn run_task(&mut self, task: Task) -> RunResult<()> {
        let promise = Value::Instance(task.promise);
        let promise_prop = |name: &str| {
            find_own_prop(&promise, &Value::str(name))
                .map(heap::get_cell)
                .filter(|v| matches!(v, Value::Function(_) | Value::Macro(_)))
        };
        let mut args = task.args;
        if task.pass_resolve
            && let Some(resolve) = promise_prop("resolve")
        {
            args.insert(0, resolve);
        }
        // async executors run inline with their flag cleared, exactly like
        // an awaited call
        let result = match &task.executor {
            Value::Function(handle) => {
                let was_async = value::function_data(*handle).is_some_and(|f| f.is_async);
                value::set_function_async(*handle, false);
                let result = self.call_value(task.executor.clone(), args, task.env, task.pos);
                value::set_function_async(*handle, was_async);
                result
            }
            other => self.call_value(other.clone(), args, task.env, task.pos),
        };
        let outcome = match result {
            Ok(value) => {
                if let Some(resolve) = promise_prop("resolve") {
                    self.call_value(resolve, smallvec![value, promise.clone()], task.env, task.pos)?;
                }
                Ok(())
            }
            Err(error) if error.catchable() => {
                if let Some(callback) = promise_prop("catchCallback") {
                    self.call_value(callback, smallvec![error.catch_value()], task.env, task.pos)?;
                    Ok(())
                } else {
                    Err(error)
                }
            }
            Err(error) => Err(error),
        };
        if let Some(callback) = promise_prop("finallyCallback") {
            self.call_value(callback, CallArgs::new(), task.env, task.pos)?;
        }
        outcome
    }
}
