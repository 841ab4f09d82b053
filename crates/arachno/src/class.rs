//! Class declaration, instantiation, and native-class support.
//!
//! Instantiation builds a fresh "class body" environment parented at the
//! class's declaration environment, binds `this`, evaluates field
//! initializers and installs them on a per-instance prototype object, binds
//! and installs methods, then runs the constructor. `super(...)` re-points
//! the prototype chain into the parent instance's prototype.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    ast::{ClassDecl, Constructor, DeclKind, Node, Pos},
    exception::{RunResult, type_error},
    heap::{self, Handle, HeapData},
    run::Interpreter,
    scope::{self, ScopeId, ScopeKind},
    value::{
        self, CallArgs, ClassData, InstanceData, Value, alloc_object, insert_prop, macro_parts,
        set_instance_default,
    },
};

static ANONYMOUS_CLASSES: AtomicUsize = AtomicUsize::new(0);

/// Evaluates a class declaration: resolves the parent class, captures fields,
/// methods, constructor, and the declaration environment. Named classes bind
/// `constant`; the binding cell is returned for export bookkeeping.
pub(crate) fn eval_class_decl(
    _interp: &mut Interpreter,
    decl: &ClassDecl,
    env: ScopeId,
) -> RunResult<(Value, Option<(String, Handle)>)> {
    let parent = match &decl.extends {
        Some(extends) => {
            let value = scope::lookup(env, extends, decl.pos)?;
            let Value::Class(parent) = value else {
                let path = scope::source_path(env);
                return Err(type_error(
                    format!(
                        "cannot extend type {}, it is not a class and is not constructable",
                        value.kind()
                    ),
                    decl.pos,
                    &path,
                ));
            };
            Some(parent)
        }
        None => None,
    };
    let name = if decl.anonymous {
        format!("${}", ANONYMOUS_CLASSES.fetch_add(1, Ordering::Relaxed))
    } else {
        decl.name.clone()
    };
    let data = ClassData {
        name: name.clone(),
        anonymous: decl.anonymous,
        parent,
        fields: Arc::from(decl.fields.clone()),
        methods: Arc::from(decl.methods.clone()),
        ctor: decl.ctor.clone().map(Arc::new),
        decl_env: env,
        props: Vec::new(),
        proto: alloc_object(Vec::new(), None),
    };
    let class = Value::Class(heap::alloc(HeapData::Class(data)));
    if decl.anonymous {
        return Ok((class, None));
    }
    let handle = scope::declare(env, &name, class.clone(), DeclKind::Constant, decl.pos)?;
    Ok((class, Some((name, handle))))
}

/// Instantiates a user class. The returned value is the new instance; its
/// class handle records the class body it was built from (the identity
/// `instanceof` compares).
pub(crate) fn instantiate(
    interp: &mut Interpreter,
    class_handle: Handle,
    args: CallArgs,
    pos: Pos,
) -> RunResult<Value> {
    let Some(class) = value::class_data(class_handle) else {
        return Err(type_error(
            "type undefined is not a class and is not constructable",
            pos,
            "",
        ));
    };
    let path = scope::source_path(class.decl_env);
    let class_body = scope::new_scope(Some(class.decl_env), ScopeKind::Object, &path);
    let proto = alloc_object(Vec::new(), Some(class_body));
    let instance_handle = heap::alloc(HeapData::Instance(InstanceData {
        class_name: class.name.clone(),
        class: class_handle,
        default: None,
        props: Vec::new(),
        proto: proto.clone(),
        class_body,
    }));
    let this = Value::Instance(instance_handle);
    scope::declare(class_body, "this", this.clone(), DeclKind::Constant, pos)?;
    for field in class.fields.iter() {
        let initial = interp.eval(&field.value, class_body)?;
        let cell = scope::declare(class_body, &field.name, initial, DeclKind::Mutable, field.pos)?;
        insert_prop(&proto, Value::str(field.name.clone()), cell);
        if field.is_default {
            set_instance_default(instance_handle, cell);
        }
    }
    for method in class.methods.iter() {
        let (_, named) = interp.eval_function_decl(&method.decl, class_body)?;
        if let Some((name, cell)) = named {
            insert_prop(&proto, Value::str(name), cell);
        }
    }
    if let Some(ctor) = &class.ctor {
        call_ctor(interp, ctor, args, class_body, pos)?;
    }
    Ok(this)
}

/// Runs the constructor in a function scope under the class body so `this`
/// and field bindings resolve lexically.
fn call_ctor(interp: &mut Interpreter, ctor: &Constructor, args: CallArgs, class_body: ScopeId, pos: Pos) -> RunResult<Value> {
    let path = scope::source_path(class_body);
    let fn_scope = scope::new_scope(Some(class_body), ScopeKind::Function, &path);
    let params: Vec<Node> = ctor.params.iter().map(|p| p.expr.clone()).collect();
    interp.bind_params(&params, &args, fn_scope)?;
    interp.exec_function_body("constructor", &ctor.body, fn_scope, pos, class_body)
}

/// Instantiates a native (host-provided) class: the instance's prototype
/// carries the class's properties and method macros, and the constructor
/// macro runs with the instance appended to the caller's arguments.
pub(crate) fn native_instantiate(
    interp: &mut Interpreter,
    class_handle: Handle,
    args: CallArgs,
    env: ScopeId,
    pos: Pos,
) -> RunResult<Value> {
    let path = scope::source_path(env);
    let Some((name, ctor, methods, props)) = value::native_class_parts(class_handle) else {
        return Err(type_error(
            "type undefined is not a class and is not constructable",
            pos,
            &path,
        ));
    };
    let proto = alloc_object(Vec::new(), Some(env));
    let mut default = None;
    for (key, cell) in props {
        insert_prop(&proto, Value::str(key), cell);
        default = Some(cell);
    }
    for (key, method) in methods {
        let cell = heap::alloc_cell(Value::Macro(method));
        insert_prop(&proto, Value::str(key), cell);
    }
    let instance_handle = heap::alloc(HeapData::Instance(InstanceData {
        class_name: name,
        class: class_handle,
        default,
        props: Vec::new(),
        proto,
        class_body: env,
    }));
    let this = Value::Instance(instance_handle);
    let Some((_, func)) = macro_parts(ctor) else {
        return Err(type_error("native constructor is missing from the heap", pos, &path));
    };
    let mut full_args = args;
    full_args.push(this.clone());
    func(interp, &full_args, env, pos)?;
    Ok(this)
}
