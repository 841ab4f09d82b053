//! The evaluator: statement/expression dispatch, call mechanics, modules,
//! and the public `Runner`/`Session` entry points.
//!
//! Control flow out of loops and functions is driven by interpreter flags
//! (`terminated`, `returned_from_function`, `broke`, `continued`) that the
//! block driver inspects between statements; errors and thrown values unwind
//! through `RunResult`.

use std::{cell::RefCell, path::Path, rc::Rc, sync::Arc};

use smallvec::smallvec;

use crate::{
    asyncio::{self, Task},
    ast::{
        AssignOp, BinaryOp, ComparisonOp, DeclKind, FunctionDecl, IncrOp, IterOp, LogicalOp, Node, ObjectProp, Pos,
        Program,
    },
    class,
    exception::{LangError, RunError, RunResult, reference_error, syntax_error, type_error},
    heap::{self, Handle},
    intern,
    io::{PrintWriter, StdPrint},
    parse::Parser,
    scope::{self, ScopeId, ScopeKind},
    value::{
        self, CallArgs, Value, alloc_array, alloc_object, find_own_prop, find_prop_chain, fmt_number, insert_prop,
        is_truthy, render_value, to_plain_string, values_equal, values_strict_equal,
    },
};

/// Native call-stack headroom guard.
const MAX_CALL_DEPTH: usize = 512;

/// One active function frame.
struct Frame {
    #[allow(dead_code)]
    name: String,
}

/// A single interpreter: control flags, call stack, microtask queue, and the
/// module's export set. The heap, scope arena, symbol table, and macro
/// registry are process-wide collaborators shared between interpreters.
pub struct Interpreter {
    returned_from_function: bool,
    terminated: bool,
    broke: bool,
    continued: bool,
    /// The value carried by an in-flight `return`, consumed when the frame
    /// unwinds. Statements between the `return` and the function body (loops,
    /// `try`, `switch`) evaluate to `undefined` themselves.
    return_value: Value,
    call_stack: Vec<Frame>,
    pub(crate) microtasks: Vec<Task>,
    exports: Vec<(Value, Handle)>,
    out: Rc<RefCell<dyn PrintWriter>>,
    pub(crate) color: bool,
}

impl Interpreter {
    pub fn new(out: Rc<RefCell<dyn PrintWriter>>, color: bool) -> Self {
        Self {
            returned_from_function: false,
            terminated: false,
            broke: false,
            continued: false,
            return_value: Value::Undefined,
            call_stack: Vec::new(),
            microtasks: Vec::new(),
            exports: Vec::new(),
            out,
            color,
        }
    }

    /// A fresh interpreter for module evaluation, sharing the output writer.
    pub(crate) fn sub_interpreter(&self) -> Self {
        Self::new(Rc::clone(&self.out), self.color)
    }

    /// Formats a value for printing, honoring a `debug`-symbol method on the
    /// prototype chain of instances and objects.
    pub fn display_value(&mut self, value: &Value) -> String {
        if matches!(value, Value::Instance(_) | Value::Object(_)) {
            let debug_key = intern::symbol_key(intern::DEBUG);
            if let Some(method_cell) = find_prop_chain(value, &debug_key) {
                let method = heap::get_cell(method_cell);
                if matches!(method, Value::Function(_) | Value::Macro(_)) {
                    let env = match value {
                        Value::Instance(h) => value::instance_data(*h).map(|i| i.class_body),
                        Value::Object(h) => value::object_env(*h),
                        _ => None,
                    }
                    .unwrap_or_else(scope::global_scope);
                    if let Ok(Value::Str(text)) =
                        self.call_value(method, smallvec![Value::str("  ")], env, Pos::default())
                    {
                        return text.to_string();
                    }
                }
            }
        }
        render_value(value, self.color)
    }

    /// `#_print`: arguments separated by spaces, terminated by a newline.
    pub fn print_args(&mut self, args: &[Value]) {
        for (index, arg) in args.iter().enumerate() {
            let text = self.display_value(arg);
            self.out.borrow_mut().stdout_write(&text);
            if index < args.len() - 1 {
                self.out.borrow_mut().stdout_push(' ');
            }
        }
        self.out.borrow_mut().stdout_push('\n');
    }

    // ---- program and block drivers ----

    /// Evaluates a whole program: synchronous body, then the microtask drain,
    /// then the export object.
    pub(crate) fn eval_program(&mut self, program: &Program, env: ScopeId) -> RunResult<Value> {
        self.eval_block(&program.body, env)?;
        self.drain_microtasks()?;
        let props = std::mem::take(&mut self.exports);
        Ok(Value::Object(heap::alloc(heap::HeapData::Object(value::ObjectData {
            props,
            proto: Value::Null,
            env: Some(env),
        }))))
    }

    pub(crate) fn eval_block(&mut self, body: &[Node], env: ScopeId) -> RunResult<Value> {
        let mut last = Value::Undefined;
        for stmt in body {
            if self.terminated {
                return Ok(last);
            }
            last = self.eval(stmt, env)?;
        }
        Ok(last)
    }

    // ---- dispatch ----

    pub(crate) fn eval(&mut self, node: &Node, env: ScopeId) -> RunResult<Value> {
        match node {
            // literals
            Node::Number { value, .. } => Ok(Value::Number(*value)),
            Node::Str { value, .. } => Ok(Value::str(value.clone())),
            Node::TemplateString { parts, .. } => self.eval_template(parts, env),
            Node::Ident { name, pos } => scope::lookup(env, name, *pos),
            Node::Array { elements, .. } => {
                let values = self.eval_args(elements, env)?;
                Ok(alloc_array(values.into_vec()))
            }
            Node::Object { properties, pos } => self.eval_object_literal(properties, *pos, env),
            // declarations
            Node::VarDecl { left, right, kind, .. } => {
                let value = match right {
                    Some(right) => self.eval(right, env)?,
                    None => Value::Undefined,
                };
                self.declare_pattern(left, value, *kind, env)?;
                Ok(Value::Undefined)
            }
            Node::Function(decl) => self.eval_function_decl(decl, env).map(|(v, _)| v),
            Node::Class(decl) => class::eval_class_decl(self, decl, env).map(|(v, _)| v),
            // statements
            Node::If { condition, body, else_body, .. } => self.eval_if(condition, body, else_body, env),
            Node::While { condition, body, do_while, .. } => self.eval_while(condition, body, *do_while, env),
            Node::For { before, condition, after, body, .. } => self.eval_for(before, condition, after, body, env),
            Node::ForIter { left, right, kind, op, body, pos } => {
                self.eval_for_iter(left, right, *kind, *op, body, *pos, env)
            }
            Node::Try { body, catch, finally, catch_param, pos } => {
                self.eval_try(body, catch.as_deref(), finally, catch_param.as_deref(), *pos, env)
            }
            Node::Throw { value, .. } => {
                let thrown = self.eval(value, env)?;
                Err(RunError::Thrown(thrown))
            }
            Node::Delete { operand, pos } => self.eval_delete(operand, *pos, env),
            Node::Block { body, .. } => {
                let block = self.child_scope(env, ScopeKind::Block);
                self.eval_block(body, block)
            }
            Node::Return { value, pos } => self.eval_return(value.as_deref(), *pos, env),
            Node::Break { pos } => {
                if scope::resolve_kind(env, ScopeKind::Loop).is_none() {
                    let path = scope::source_path(env);
                    return Err(syntax_error(
                        "illegal use of the break keyword, break statements can only be used in the body of loops",
                        *pos,
                        &path,
                    ));
                }
                self.broke = true;
                self.terminated = true;
                Ok(Value::Undefined)
            }
            Node::Continue { pos } => {
                if scope::resolve_kind(env, ScopeKind::Loop).is_none() {
                    let path = scope::source_path(env);
                    return Err(syntax_error(
                        "illegal use of the continue keyword, continue statements can only be used in the body of loops",
                        *pos,
                        &path,
                    ));
                }
                self.continued = true;
                self.terminated = true;
                Ok(Value::Undefined)
            }
            Node::Label { .. } => Ok(Value::Undefined),
            Node::Import { path, namespace, names, from, pos } => {
                self.eval_import(path.as_deref(), namespace.as_deref(), names.as_deref(), from.as_deref(), *pos, env)
            }
            Node::Export { export, .. } => self.eval_export(export, env),
            Node::Switch { on, cases, default, .. } => {
                let on_value = self.eval(on, env)?;
                let block = self.child_scope(env, ScopeKind::Block);
                for case in cases {
                    let condition = self.eval(&case.condition, env)?;
                    if values_equal(&condition, &on_value) {
                        self.eval_block(&case.body, block)?;
                        return Ok(Value::Undefined);
                    }
                }
                self.eval_block(default, block)?;
                Ok(Value::Undefined)
            }
            // expressions
            Node::Assignment { left, right, op, pos } => self.eval_assignment(left, right, *op, *pos, env),
            Node::Binary { left, right, op, pos } => {
                let lhs = self.eval(left, env)?;
                let rhs = self.eval(right, env)?;
                self.eval_binary(&lhs, &rhs, *op, *pos, env)
            }
            Node::Comparison { left, right, op, pos } => self.eval_comparison(left, right, *op, *pos, env),
            Node::Logical { left, right, op, .. } => self.eval_logical(left, right.as_deref(), *op, env),
            Node::Ternary { condition, then, otherwise, .. } => {
                let cond = self.eval(condition, env)?;
                if is_truthy(&cond) {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Node::Match { on, cases, .. } => {
                let on_value = self.eval(on, env)?;
                for arm in cases {
                    let pattern = self.eval(&arm.pattern, env)?;
                    if values_equal(&on_value, &pattern) {
                        return self.eval(&arm.body, env);
                    }
                }
                Ok(Value::Null)
            }
            Node::From { path, pos } => self.import_module(path, env, *pos),
            Node::Instanceof { left, right, .. } => {
                let lhs = self.eval(left, env)?;
                let rhs = self.eval(right, env)?;
                let matched = match (&lhs, &rhs) {
                    (Value::Instance(instance), Value::Class(class)) | (Value::Instance(instance), Value::NativeClass(class)) => {
                        value::instance_data(*instance).is_some_and(|data| data.class == *class)
                    }
                    _ => false,
                };
                Ok(Value::Bool(matched))
            }
            Node::In { left, right, pos } => self.eval_in(left, right, *pos, env),
            Node::New { operand, pos } => self.eval_new(operand, *pos, env),
            Node::Super { args, pos } => self.eval_super(args, *pos, env),
            Node::Await { operand, .. } => self.eval_await(operand, env),
            Node::DynamicImport { specifier, is_async, pos } => {
                let spec = self.eval(specifier, env)?;
                self.eval_dynamic_import(spec, *is_async, *pos, env)
            }
            Node::Call { caller, args, pos } => {
                let callee = self.eval(caller, env)?;
                let args = self.eval_args(args, env)?;
                self.call_value(callee, args, env, *pos)
            }
            Node::Member { object, property, computed, pos } => {
                match self.get_member_handle(object, property, *computed, *pos, env)? {
                    Some(cell) => Ok(heap::get_cell(cell)),
                    None => Ok(Value::Undefined),
                }
            }
            Node::Grouping { exprs, .. } => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, env)?;
                }
                Ok(last)
            }
            Node::Increment { operand, op, prefix, pos } => self.eval_increment(operand, *op, *prefix, *pos, env),
            Node::Typeof { operand, .. } => {
                let value = self.eval(operand, env)?;
                Ok(Value::str(value.kind().to_string()))
            }
            Node::Void { operand, .. } => {
                self.eval(operand, env)?;
                Ok(Value::Undefined)
            }
            Node::RestSpread { operand, pos } => {
                let path = scope::source_path(env);
                let value = self.eval(operand, env)?;
                Err(type_error(
                    format!("cannot spread type {} here", value.kind()),
                    *pos,
                    &path,
                ))
            }
            Node::GlobalThis { pos } => scope::lookup(env, "globalThis", *pos),
            Node::GlobalMember { property, pos } => {
                let global = self.global_this(env, *pos)?;
                match find_own_prop(&global, &Value::str(property.clone())) {
                    Some(cell) => Ok(heap::get_cell(cell)),
                    None => Ok(Value::Undefined),
                }
            }
            Node::GlobalMemberAssign { property, right, pos, .. } => {
                let rhs = self.eval(right, env)?;
                let global = self.global_this(env, *pos)?;
                let key = Value::str(property.clone());
                match find_own_prop(&global, &key) {
                    Some(cell) => heap::set_cell(cell, rhs.clone()),
                    None => {
                        let cell = heap::alloc_cell(rhs.clone());
                        insert_prop(&global, key, cell);
                        if let Some(program) = scope::resolve_kind(env, ScopeKind::Program) {
                            scope::insert_binding(program, property, cell, DeclKind::Mutable);
                        }
                    }
                }
                Ok(rhs)
            }
        }
    }

    fn global_this(&mut self, env: ScopeId, pos: Pos) -> RunResult<Value> {
        let global = scope::lookup(env, "globalThis", pos)?;
        if matches!(global, Value::Object(_)) {
            Ok(global)
        } else {
            let path = scope::source_path(env);
            Err(reference_error("invalid reference to globalThis", pos, &path))
        }
    }

    fn child_scope(&self, env: ScopeId, kind: ScopeKind) -> ScopeId {
        let path = scope::source_path(env);
        scope::new_scope(Some(env), kind, &path)
    }

    // ---- declarations and destructuring ----

    /// Declares the pattern `left` against `value`, returning the created
    /// bindings (name, cell) for export bookkeeping.
    pub(crate) fn declare_pattern(
        &mut self,
        left: &Node,
        value: Value,
        kind: DeclKind,
        env: ScopeId,
    ) -> RunResult<Vec<(String, Handle)>> {
        match left {
            Node::Ident { name, pos } => {
                let handle = scope::declare(env, name, value, kind, *pos)?;
                Ok(vec![(name.clone(), handle)])
            }
            Node::Object { properties, pos } => self.destructure_object_decl(properties, *pos, &value, kind, env),
            Node::Array { elements, pos } => self.destructure_array_decl(elements, *pos, &value, kind, env),
            other => {
                let path = scope::source_path(env);
                Err(syntax_error("invalid left hand side in variable declaration", other.pos(), &path))
            }
        }
    }

    fn pattern_key(&mut self, prop: &ObjectProp, env: ScopeId) -> RunResult<String> {
        if prop.dynamic {
            let key = self.eval(&prop.key, env)?;
            return Ok(to_plain_string(&key));
        }
        match prop.key.as_ref() {
            Node::Ident { name, .. } => Ok(name.clone()),
            Node::Str { value, .. } => Ok(value.clone()),
            Node::Number { value, .. } => Ok(fmt_number(*value)),
            other => {
                let path = scope::source_path(env);
                Err(syntax_error("invalid property key in object pattern", other.pos(), &path))
            }
        }
    }

    fn destructure_object_decl(
        &mut self,
        properties: &[ObjectProp],
        pos: Pos,
        value: &Value,
        kind: DeclKind,
        env: ScopeId,
    ) -> RunResult<Vec<(String, Handle)>> {
        let path = scope::source_path(env);
        if !matches!(value, Value::Object(_) | Value::Instance(_)) {
            return Err(type_error(
                format!("cannot destructure type {}, it is not an object", value.kind()),
                pos,
                &path,
            ));
        }
        let mut decls = Vec::new();
        for prop in properties {
            let prop_key = self.pattern_key(prop, env)?;
            let target = match &prop.value {
                Some(Node::Ident { name, .. }) => name.clone(),
                Some(other) => {
                    return Err(syntax_error(
                        "unexpected token in object destructuring, identifier expected",
                        other.pos(),
                        &path,
                    ));
                }
                None => prop_key.clone(),
            };
            let key = Value::str(prop_key.clone());
            let cell = find_prop_chain(value, &key).ok_or_else(|| {
                reference_error(format!("type object has no property named {prop_key}"), prop.key.pos(), &path)
            })?;
            let handle = scope::declare(env, &target, heap::get_cell(cell), kind, pos)?;
            decls.push((target, handle));
        }
        Ok(decls)
    }

    fn destructure_object_assign(
        &mut self,
        properties: &[ObjectProp],
        pos: Pos,
        value: &Value,
        env: ScopeId,
    ) -> RunResult<()> {
        let path = scope::source_path(env);
        if !matches!(value, Value::Object(_) | Value::Instance(_)) {
            return Err(type_error(
                format!("cannot destructure type {}, it is not an object", value.kind()),
                pos,
                &path,
            ));
        }
        for prop in properties {
            let prop_key = self.pattern_key(prop, env)?;
            let target = match &prop.value {
                Some(Node::Ident { name, .. }) => name.clone(),
                Some(other) => {
                    return Err(syntax_error(
                        "unexpected token in object destructuring, identifier expected",
                        other.pos(),
                        &path,
                    ));
                }
                None => prop_key.clone(),
            };
            let key = Value::str(prop_key.clone());
            let cell = find_own_prop(value, &key).ok_or_else(|| {
                reference_error(format!("type object has no property named {prop_key}"), prop.key.pos(), &path)
            })?;
            scope::assign(env, &target, heap::get_cell(cell), pos)?;
        }
        Ok(())
    }

    fn destructure_array_decl(
        &mut self,
        elements: &[Node],
        pos: Pos,
        value: &Value,
        kind: DeclKind,
        env: ScopeId,
    ) -> RunResult<Vec<(String, Handle)>> {
        let path = scope::source_path(env);
        let Value::Array(array) = value else {
            return Err(type_error(
                format!("cannot destructure type {}, it is not an array", value.kind()),
                pos,
                &path,
            ));
        };
        let items = value::array_items(*array);
        let mut decls = Vec::new();
        for (index, element) in elements.iter().enumerate() {
            let Node::Ident { name, pos: ident_pos } = element else {
                return Err(syntax_error(
                    "unexpected token in array destructuring, identifier expected",
                    element.pos(),
                    &path,
                ));
            };
            let element_value = items
                .get(index)
                .copied()
                .flatten()
                .map(heap::get_cell)
                .unwrap_or(Value::Undefined);
            let handle = scope::declare(env, name, element_value, kind, *ident_pos)?;
            decls.push((name.clone(), handle));
        }
        Ok(decls)
    }

    fn destructure_array_assign(&mut self, elements: &[Node], pos: Pos, value: &Value, env: ScopeId) -> RunResult<()> {
        let path = scope::source_path(env);
        let Value::Array(array) = value else {
            return Err(type_error(
                format!("cannot destructure type {}, it is not an array", value.kind()),
                pos,
                &path,
            ));
        };
        let items = value::array_items(*array);
        for (index, element) in elements.iter().enumerate() {
            let Node::Ident { name, pos: ident_pos } = element else {
                return Err(syntax_error(
                    "unexpected token in array destructuring, identifier expected",
                    element.pos(),
                    &path,
                ));
            };
            let element_value = items
                .get(index)
                .copied()
                .flatten()
                .map(heap::get_cell)
                .unwrap_or(Value::Undefined);
            scope::assign(env, name, element_value, *ident_pos)?;
        }
        Ok(())
    }

    // ---- control flow ----

    fn eval_if(&mut self, condition: &Node, body: &[Node], else_body: &[Node], env: ScopeId) -> RunResult<Value> {
        let (cond, is_decl) = match condition {
            Node::VarDecl { right, .. } => {
                let value = match right {
                    Some(right) => self.eval(right, env)?,
                    None => Value::Undefined,
                };
                (value, true)
            }
            other => (self.eval(other, env)?, false),
        };
        let block = self.child_scope(env, ScopeKind::Block);
        if is_truthy(&cond) {
            if is_decl {
                self.eval(condition, block)?;
            }
            self.eval_block(body, block)
        } else if !else_body.is_empty() {
            self.eval_block(else_body, block)
        } else {
            Ok(Value::Undefined)
        }
    }

    fn eval_while(&mut self, condition: &Node, body: &[Node], do_while: bool, env: ScopeId) -> RunResult<Value> {
        if do_while {
            loop {
                let scope = self.child_scope(env, ScopeKind::Loop);
                self.eval_block(body, scope)?;
                if self.broke {
                    self.broke = false;
                    self.terminated = false;
                    break;
                }
                if self.continued {
                    self.continued = false;
                    self.terminated = false;
                } else if self.terminated {
                    break;
                }
                let cond = self.eval(condition, env)?;
                if !is_truthy(&cond) {
                    break;
                }
            }
            return Ok(Value::Undefined);
        }
        let mut cond = self.eval(condition, env)?;
        while is_truthy(&cond) {
            let scope = self.child_scope(env, ScopeKind::Loop);
            self.eval_block(body, scope)?;
            if self.broke {
                self.broke = false;
                self.terminated = false;
                break;
            }
            if self.continued {
                self.continued = false;
                self.terminated = false;
            } else if self.terminated {
                break;
            }
            cond = self.eval(condition, env)?;
        }
        Ok(Value::Undefined)
    }

    fn eval_for(&mut self, before: &Node, condition: &Node, after: &Node, body: &[Node], env: ScopeId) -> RunResult<Value> {
        let scope = self.child_scope(env, ScopeKind::Loop);
        match before {
            Node::Assignment { left, right, op: AssignOp::Assign, .. } => {
                let value = self.eval(right, scope)?;
                self.declare_pattern(left, value, DeclKind::Mutable, scope)?;
            }
            other => {
                self.eval(other, env)?;
            }
        }
        loop {
            let iteration = self.child_scope(scope, ScopeKind::Loop);
            let cond = self.eval(condition, iteration)?;
            if !is_truthy(&cond) {
                break;
            }
            self.eval_block(body, iteration)?;
            if self.broke {
                self.broke = false;
                self.terminated = false;
                break;
            }
            if self.continued {
                self.continued = false;
                self.terminated = false;
            } else if self.terminated {
                break;
            }
            self.eval(after, iteration)?;
        }
        Ok(Value::Undefined)
    }

    fn eval_for_iter(
        &mut self,
        left: &Node,
        right: &Node,
        kind: DeclKind,
        op: IterOp,
        body: &[Node],
        pos: Pos,
        env: ScopeId,
    ) -> RunResult<Value> {
        let path = scope::source_path(env);
        let value = self.eval(right, env)?;
        let items: Vec<Value> = match op {
            IterOp::In => match &value {
                Value::Object(_) | Value::Instance(_) => value::own_props(&value)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(key, _)| key)
                    .collect(),
                Value::Array(h) => (0..value::array_len(*h)).map(|i| Value::Number(i as f64)).collect(),
                other => {
                    return Err(type_error(
                        format!("type {} is not iterable in for..in loop", other.kind()),
                        pos,
                        &path,
                    ));
                }
            },
            IterOp::Of => match &value {
                Value::Object(_) => value::own_props(&value)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(_, cell)| heap::get_cell(cell))
                    .collect(),
                Value::Array(h) => value::array_items(*h)
                    .into_iter()
                    .map(|slot| slot.map(heap::get_cell).unwrap_or(Value::Undefined))
                    .collect(),
                Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
                Value::Instance(_) => self.iterate_instance(&value, pos, env)?,
                other => {
                    return Err(type_error(
                        format!("type {} is not iterable in for..of loop", other.kind()),
                        pos,
                        &path,
                    ));
                }
            },
        };
        for item in items {
            let scope = self.child_scope(env, ScopeKind::Loop);
            self.declare_pattern(left, item, kind, scope)?;
            self.eval_block(body, scope)?;
            if self.broke {
                self.broke = false;
                self.terminated = false;
                break;
            }
            if self.continued {
                self.continued = false;
                self.terminated = false;
            } else if self.terminated {
                break;
            }
        }
        Ok(Value::Undefined)
    }

    /// Drives the iterator protocol: the instance (or its prototype chain)
    /// provides a method keyed by the interned `iterator` symbol; the
    /// returned value exposes `next()` yielding `{ value, done }` objects.
    fn iterate_instance(&mut self, value: &Value, pos: Pos, env: ScopeId) -> RunResult<Vec<Value>> {
        let path = scope::source_path(env);
        let protocol_err = || {
            type_error(
                "an instance must have a Symbol.iterator method that returns an iterator: for..of loop",
                pos,
                &path,
            )
        };
        let iterator_key = intern::symbol_key(intern::ITERATOR);
        let method_cell = find_prop_chain(value, &iterator_key).ok_or_else(protocol_err)?;
        let method = heap::get_cell(method_cell);
        if !matches!(method, Value::Function(_) | Value::Macro(_)) {
            return Err(protocol_err());
        }
        let class_body = match value {
            Value::Instance(h) => value::instance_data(*h).map(|i| i.class_body).unwrap_or(env),
            _ => env,
        };
        let iterator = self.call_value(method, CallArgs::new(), class_body, pos)?;
        let next_cell = find_prop_chain(&iterator, &Value::str("next")).ok_or_else(protocol_err)?;
        let next = heap::get_cell(next_cell);
        if !matches!(next, Value::Function(_) | Value::Macro(_)) {
            return Err(protocol_err());
        }
        let mut items = Vec::new();
        loop {
            let step = self.call_value(next.clone(), CallArgs::new(), class_body, pos)?;
            if !matches!(step, Value::Object(_) | Value::Instance(_)) {
                return Err(protocol_err());
            }
            let done_cell = find_own_prop(&step, &Value::str("done")).ok_or_else(protocol_err)?;
            if is_truthy(&heap::get_cell(done_cell)) {
                break;
            }
            let item = find_own_prop(&step, &Value::str("value"))
                .map(heap::get_cell)
                .unwrap_or(Value::Undefined);
            items.push(item);
        }
        Ok(items)
    }

    fn eval_try(
        &mut self,
        body: &[Node],
        catch: Option<&[Node]>,
        finally: &[Node],
        catch_param: Option<&str>,
        pos: Pos,
        env: ScopeId,
    ) -> RunResult<Value> {
        let try_scope = self.child_scope(env, ScopeKind::Try);
        let result = self.eval_block(body, try_scope);
        let outcome = match result {
            Ok(_) => Ok(Value::Undefined),
            Err(error) if error.catchable() && catch.is_some() => {
                let catch_scope = self.child_scope(env, ScopeKind::Block);
                if let Some(param) = catch_param {
                    scope::declare(catch_scope, param, error.catch_value(), DeclKind::Mutable, pos)?;
                }
                self.eval_block(catch.unwrap_or_default(), catch_scope).map(|_| Value::Undefined)
            }
            Err(error) => Err(error),
        };
        if !finally.is_empty() {
            // finally runs even when the try body returned, broke, or
            // continued; stash the control flags around it
            let saved = (self.returned_from_function, self.terminated, self.broke, self.continued);
            self.returned_from_function = false;
            self.terminated = false;
            self.broke = false;
            self.continued = false;
            let finally_scope = self.child_scope(env, ScopeKind::Block);
            let finally_result = self.eval_block(finally, finally_scope);
            self.returned_from_function |= saved.0;
            self.terminated |= saved.1;
            self.broke |= saved.2;
            self.continued |= saved.3;
            finally_result?;
        }
        outcome
    }

    fn eval_return(&mut self, value: Option<&Node>, pos: Pos, env: ScopeId) -> RunResult<Value> {
        if scope::resolve_kind(env, ScopeKind::Function).is_none() {
            let path = scope::source_path(env);
            return Err(syntax_error(
                "illegal use of the return keyword, return statements can only be used in the body of functions",
                pos,
                &path,
            ));
        }
        let result = match value {
            Some(value) => self.eval(value, env)?,
            None => Value::Undefined,
        };
        self.call_stack.pop();
        self.returned_from_function = true;
        self.terminated = true;
        self.return_value = result.clone();
        Ok(result)
    }

    fn eval_delete(&mut self, operand: &Node, _pos: Pos, env: ScopeId) -> RunResult<Value> {
        match operand {
            Node::Ident { name, pos } => {
                let handle = scope::delete_binding(env, name, *pos)?;
                heap::delete(handle);
            }
            Node::Member { object, property, computed, .. } => {
                let target = self.eval(object, env)?;
                let key = self.member_key(property, *computed, env)?;
                if let Some(cell) = value::remove_prop(&target, &key) {
                    heap::delete(cell);
                }
            }
            other => {
                let path = scope::source_path(env);
                return Err(syntax_error(
                    "the operand of the \"delete\" keyword must be a variable or property access",
                    other.pos(),
                    &path,
                ));
            }
        }
        Ok(Value::Undefined)
    }

    // ---- member access ----

    fn member_key(&mut self, property: &Node, computed: bool, env: ScopeId) -> RunResult<Value> {
        if computed {
            return self.eval(property, env);
        }
        match property {
            Node::Ident { name, .. } => Ok(Value::str(name.clone())),
            other => {
                let path = scope::source_path(env);
                Err(syntax_error("invalid property access, identifier expected", other.pos(), &path))
            }
        }
    }

    /// Resolves a member expression to the cell behind it, or `None` when the
    /// read should yield `undefined`. String indexing materializes a fresh
    /// one-character cell.
    fn get_member_handle(
        &mut self,
        object: &Node,
        property: &Node,
        computed: bool,
        _pos: Pos,
        env: ScopeId,
    ) -> RunResult<Option<Handle>> {
        let target = self.eval(object, env)?;
        let key = self.member_key(property, computed, env)?;
        self.member_handle_of(&target, &key, computed, property.pos(), env)
    }

    fn member_handle_of(
        &mut self,
        target: &Value,
        key: &Value,
        computed: bool,
        pos: Pos,
        env: ScopeId,
    ) -> RunResult<Option<Handle>> {
        let path = scope::source_path(env);
        match target {
            Value::Object(_) | Value::Instance(_) | Value::Function(_) | Value::Class(_) | Value::NativeClass(_) => {
                Ok(find_prop_chain(target, key))
            }
            Value::Array(array) => {
                if !computed {
                    return Err(type_error(
                        format!("cannot read properties of type array (reading {})", to_plain_string(key)),
                        pos,
                        &path,
                    ));
                }
                let Value::Number(index) = key else {
                    return Err(type_error(
                        format!("type {} cannot be used to index an array", key.kind()),
                        pos,
                        &path,
                    ));
                };
                if index.fract() != 0.0 {
                    return Err(type_error(
                        format!("type {} cannot be used to index an array", key.kind()),
                        pos,
                        &path,
                    ));
                }
                if *index < 0.0 {
                    return Ok(None);
                }
                let items = value::array_items(*array);
                Ok(items.get(*index as usize).copied().flatten())
            }
            Value::Str(text) => {
                if !computed {
                    return Err(type_error(
                        format!("cannot read properties of type string (reading {})", to_plain_string(key)),
                        pos,
                        &path,
                    ));
                }
                let Value::Number(index) = key else {
                    return Err(type_error(
                        format!("type {} cannot be used to index a string", key.kind()),
                        pos,
                        &path,
                    ));
                };
                let length = text.chars().count() as i64;
                let mut at = *index as i64;
                if at < 0 {
                    at += length;
                }
                if at < 0 || at >= length {
                    return Ok(None);
                }
                let ch = text.chars().nth(at as usize).map(|c| c.to_string()).unwrap_or_default();
                Ok(Some(heap::alloc_cell(Value::str(ch))))
            }
            other => Err(type_error(
                format!(
                    "cannot read properties of type {} (reading {})",
                    other.kind(),
                    to_plain_string(key)
                ),
                pos,
                &path,
            )),
        }
    }

    // ---- assignment ----

    fn eval_assignment(&mut self, left: &Node, right: &Node, op: AssignOp, pos: Pos, env: ScopeId) -> RunResult<Value> {
        let rhs = self.eval(right, env)?;
        let value = match op {
            AssignOp::Assign => rhs.clone(),
            AssignOp::NullishAssign => {
                let lhs = self.eval(left, env)?;
                if lhs.is_nullish() {
                    rhs.clone()
                } else {
                    return Ok(lhs);
                }
            }
            AssignOp::AddAssign => {
                let lhs = self.eval(left, env)?;
                self.op_add(&lhs, &rhs, pos, env)?
            }
            AssignOp::SubAssign => {
                let lhs = self.eval(left, env)?;
                self.op_numeric(BinaryOp::Sub, &lhs, &rhs, pos, env)?
            }
            AssignOp::MulAssign => {
                let lhs = self.eval(left, env)?;
                self.op_numeric(BinaryOp::Mul, &lhs, &rhs, pos, env)?
            }
            AssignOp::DivAssign => {
                let lhs = self.eval(left, env)?;
                self.op_numeric(BinaryOp::Div, &lhs, &rhs, pos, env)?
            }
            AssignOp::ModAssign => {
                let lhs = self.eval(left, env)?;
                self.op_numeric(BinaryOp::Mod, &lhs, &rhs, pos, env)?
            }
        };
        match left {
            Node::Ident { name, pos } => {
                scope::assign(env, name, value.clone(), *pos)?;
                Ok(value)
            }
            Node::Member { object, property, computed, pos } => {
                self.member_assign(object, property, *computed, value, *pos, env)
            }
            Node::Object { properties, pos } => {
                self.destructure_object_assign(properties, *pos, &rhs, env)?;
                Ok(value)
            }
            Node::Array { elements, pos } => {
                self.destructure_array_assign(elements, *pos, &rhs, env)?;
                Ok(value)
            }
            other => {
                let path = scope::source_path(env);
                Err(syntax_error("invalid left hand side in assignment", other.pos(), &path))
            }
        }
    }

    /// Writes through a member expression. A missing own property is created
    /// on the receiver itself (never on a prototype); creating one through a
    /// `static`-bound root identifier is a syntactic error.
    fn member_assign(
        &mut self,
        object: &Node,
        property: &Node,
        computed: bool,
        value: Value,
        pos: Pos,
        env: ScopeId,
    ) -> RunResult<Value> {
        let path = scope::source_path(env);
        let target = self.eval(object, env)?;
        let key = self.member_key(property, computed, env)?;
        if let Value::Array(array) = &target {
            if !computed {
                return Err(type_error(
                    format!("cannot read properties of type array (reading {})", to_plain_string(&key)),
                    pos,
                    &path,
                ));
            }
            let Value::Number(index) = key else {
                return Err(type_error(
                    format!("type {} cannot be used to index an array", key.kind()),
                    pos,
                    &path,
                ));
            };
            if index.fract() != 0.0 || index < 0.0 {
                return Err(type_error(
                    format!("{} cannot be used to index an array", fmt_number(index)),
                    pos,
                    &path,
                ));
            }
            let index = index as usize;
            let existing = value::array_items(*array).get(index).copied().flatten();
            match existing {
                Some(cell) => heap::set_cell(cell, value.clone()),
                None => {
                    let cell = heap::alloc_cell(value.clone());
                    value::array_set_slot(*array, index, cell);
                }
            }
            return Ok(value);
        }
        if let Value::Str(_) = &target {
            return Err(type_error("cannot assign to properties of type string", pos, &path));
        }
        match self.member_handle_of(&target, &key, computed, property.pos(), env)? {
            Some(cell) => {
                // walk the chain for reads, but never write through it: only
                // rebind when the property is the receiver's own
                if find_own_prop(&target, &key).is_some() {
                    heap::set_cell(cell, value.clone());
                } else {
                    let fresh = heap::alloc_cell(value.clone());
                    insert_prop(&target, key, fresh);
                }
            }
            None => {
                if let Some(root) = root_identifier(object)
                    && scope::binding_kind(env, root) == Some(DeclKind::Static)
                {
                    return Err(syntax_error("assignment to static variable", pos, &path));
                }
                if !matches!(
                    target,
                    Value::Object(_) | Value::Instance(_) | Value::Function(_) | Value::Class(_)
                ) {
                    return Err(type_error(
                        format!("cannot create properties on type {}", target.kind()),
                        pos,
                        &path,
                    ));
                }
                let cell = heap::alloc_cell(value.clone());
                insert_prop(&target, key, cell);
            }
        }
        Ok(value)
    }

    // ---- operators ----

    fn eval_binary(&mut self, lhs: &Value, rhs: &Value, op: BinaryOp, pos: Pos, env: ScopeId) -> RunResult<Value> {
        match op {
            BinaryOp::Add => self.op_add(lhs, rhs, pos, env),
            _ => self.op_numeric(op, lhs, rhs, pos, env),
        }
    }

    /// `+` is overloaded: string if either operand is a string, numeric when
    /// both are numbers, a type error otherwise.
    fn op_add(&mut self, lhs: &Value, rhs: &Value, pos: Pos, env: ScopeId) -> RunResult<Value> {
        match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
            (Value::Str(a), Value::Number(b)) => Ok(Value::str(format!("{a}{}", fmt_number(*b)))),
            (Value::Number(a), Value::Str(b)) => Ok(Value::str(format!("{}{b}", fmt_number(*a)))),
            _ => {
                let path = scope::source_path(env);
                Err(type_error(
                    format!("'+' operation between type {} and {} is invalid", lhs.kind(), rhs.kind()),
                    pos,
                    &path,
                ))
            }
        }
    }

    fn op_numeric(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value, pos: Pos, env: ScopeId) -> RunResult<Value> {
        let (Value::Number(a), Value::Number(b)) = (lhs, rhs) else {
            let path = scope::source_path(env);
            return Err(type_error(
                format!("'{op}' operation between type {} and {} is invalid", lhs.kind(), rhs.kind()),
                pos,
                &path,
            ));
        };
        let result = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => a.round() % b,
            BinaryOp::Pow => a.powi(b.round() as i32),
        };
        Ok(Value::Number(result))
    }

    fn eval_comparison(&mut self, left: &Node, right: &Node, op: ComparisonOp, pos: Pos, env: ScopeId) -> RunResult<Value> {
        let lhs = self.eval(left, env)?;
        let rhs = self.eval(right, env)?;
        let result = match op {
            ComparisonOp::Eq => values_equal(&lhs, &rhs),
            ComparisonOp::Ne => !values_equal(&lhs, &rhs),
            ComparisonOp::StrictEq => values_strict_equal(&lhs, &rhs),
            ComparisonOp::StrictNe => !values_strict_equal(&lhs, &rhs),
            ComparisonOp::Lt | ComparisonOp::Gt | ComparisonOp::Le | ComparisonOp::Ge => {
                let a = self.ord_operand(&lhs, &rhs, op, pos, env)?;
                let b = self.ord_operand(&rhs, &lhs, op, pos, env)?;
                match op {
                    ComparisonOp::Lt => a < b,
                    ComparisonOp::Gt => a > b,
                    ComparisonOp::Le => a <= b,
                    ComparisonOp::Ge => a >= b,
                    _ => unreachable!("ordered comparison handled above"),
                }
            }
        };
        Ok(Value::Bool(result))
    }

    /// Ordering operands coerce numerically: numbers are themselves, strings
    /// contribute their byte length. Anything else is a type error.
    fn ord_operand(&self, value: &Value, other: &Value, op: ComparisonOp, pos: Pos, env: ScopeId) -> RunResult<f64> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Str(s) => Ok(s.len() as f64),
            _ => {
                let path = scope::source_path(env);
                Err(type_error(
                    format!(
                        "'{op}' operator cannot take operands of type {} and {}",
                        value.kind(),
                        other.kind()
                    ),
                    pos,
                    &path,
                ))
            }
        }
    }

    fn eval_logical(&mut self, left: &Node, right: Option<&Node>, op: LogicalOp, env: ScopeId) -> RunResult<Value> {
        let lhs = self.eval(left, env)?;
        match op {
            LogicalOp::Not => Ok(Value::Bool(!is_truthy(&lhs))),
            LogicalOp::And => {
                let rhs = self.eval(right.expect("logical and has a right operand"), env)?;
                if is_truthy(&lhs) { Ok(rhs) } else { Ok(lhs) }
            }
            LogicalOp::Or => {
                let rhs = self.eval(right.expect("logical or has a right operand"), env)?;
                if is_truthy(&lhs) { Ok(lhs) } else { Ok(rhs) }
            }
        }
    }

    fn eval_in(&mut self, left: &Node, right: &Node, pos: Pos, env: ScopeId) -> RunResult<Value> {
        let path = scope::source_path(env);
        let key = self.eval(left, env)?;
        let target = self.eval(right, env)?;
        if !matches!(key, Value::Str(_)) {
            return Err(type_error(
                format!(
                    "'in' cannot check for properties in type {} with type {}",
                    target.kind(),
                    key.kind()
                ),
                pos,
                &path,
            ));
        }
        match target {
            Value::Object(_) | Value::Instance(_) => Ok(Value::Bool(find_own_prop(&target, &key).is_some())),
            other => Err(type_error(
                format!("'in' cannot check for properties in type {}", other.kind()),
                pos,
                &path,
            )),
        }
    }

    fn eval_increment(&mut self, operand: &Node, op: IncrOp, prefix: bool, pos: Pos, env: ScopeId) -> RunResult<Value> {
        let path = scope::source_path(env);
        let current = self.eval(operand, env)?;
        let Value::Number(n) = current else {
            return Err(type_error(
                format!("'{op}' requires a numeric operand, got {}", current.kind()),
                pos,
                &path,
            ));
        };
        let stored = match op {
            IncrOp::Inc => n + 1.0,
            IncrOp::Dec => n - 1.0,
        };
        let returned = if prefix { stored } else { n };
        match operand {
            Node::Ident { name, pos } => {
                let handle = scope::reference_of(env, name, *pos)?;
                heap::set_cell(handle, Value::Number(stored));
            }
            Node::Member { object, property, computed, pos } => {
                match self.get_member_handle(object, property, *computed, *pos, env)? {
                    Some(cell) => heap::set_cell(cell, Value::Number(stored)),
                    None => {
                        return Err(type_error("cannot increment a missing property", *pos, &path));
                    }
                }
            }
            other => {
                return Err(syntax_error(
                    "increment and decrement require a variable or property access",
                    other.pos(),
                    &path,
                ));
            }
        }
        Ok(Value::Number(returned))
    }

    fn eval_template(&mut self, parts: &[crate::ast::TemplatePart], env: ScopeId) -> RunResult<Value> {
        let mut text = String::new();
        for part in parts {
            match part {
                crate::ast::TemplatePart::Lit(lit) => text.push_str(lit),
                crate::ast::TemplatePart::Expr(expr) => {
                    let value = self.eval(expr, env)?;
                    text.push_str(&to_plain_string(&value));
                }
            }
        }
        Ok(Value::str(text))
    }

    // ---- objects, functions, classes ----

    fn eval_object_literal(&mut self, properties: &[ObjectProp], pos: Pos, env: ScopeId) -> RunResult<Value> {
        let object_env = self.child_scope(env, ScopeKind::Object);
        let object = alloc_object(Vec::new(), Some(object_env));
        for prop in properties {
            let key = if prop.dynamic {
                self.eval(&prop.key, object_env)?
            } else {
                match prop.key.as_ref() {
                    Node::Ident { name, .. } => Value::str(name.clone()),
                    Node::Str { value, .. } => Value::str(value.clone()),
                    Node::Number { value, .. } => Value::Number(*value),
                    other => {
                        let path = scope::source_path(env);
                        return Err(syntax_error("invalid property key in object literal", other.pos(), &path));
                    }
                }
            };
            let value = match &prop.value {
                Some(node) => self.eval(node, object_env)?,
                None => scope::lookup(object_env, &to_plain_string(&key), pos)?,
            };
            value::adopt_name(&value, &to_plain_string(&key));
            let cell = heap::alloc_cell(value);
            insert_prop(&object, key, cell);
        }
        scope::declare(object_env, "this", object.clone(), DeclKind::Constant, pos)?;
        Ok(object)
    }

    /// Evaluates a function declaration to a function value. Named,
    /// non-anonymous declarations are bound `constant` in the current scope;
    /// the binding cell is returned for export bookkeeping.
    pub(crate) fn eval_function_decl(
        &mut self,
        decl: &FunctionDecl,
        env: ScopeId,
    ) -> RunResult<(Value, Option<(String, Handle)>)> {
        let mut name = if decl.dynamic_name {
            let name_node = decl.name.as_deref().expect("dynamic name node present");
            let value = self.eval(name_node, env)?;
            to_plain_string(&value)
        } else {
            match decl.name.as_deref() {
                Some(Node::Ident { name, .. }) => name.clone(),
                Some(Node::Str { value, .. }) => value.clone(),
                Some(Node::Number { value, .. }) => fmt_number(*value),
                _ => String::new(),
            }
        };
        let anonymous = decl.is_anonymous || name.is_empty();
        if anonymous && name.is_empty() {
            name = "(anonymous)".to_owned();
        }
        let data = value::FunctionData {
            name: name.clone(),
            params: Arc::from(decl.params.clone()),
            body: Arc::from(decl.body.clone()),
            decl_env: env,
            is_async: decl.is_async,
            is_arrow: decl.is_arrow,
            is_anonymous: decl.is_anonymous,
            props: Vec::new(),
            proto: alloc_object(Vec::new(), None),
        };
        let function = Value::Function(heap::alloc(heap::HeapData::Function(data)));
        if anonymous {
            return Ok((function, None));
        }
        let handle = scope::declare(env, &name, function.clone(), DeclKind::Constant, decl.pos)?;
        Ok((function, Some((name, handle))))
    }

    // ---- calls ----

    pub(crate) fn call_value(&mut self, callee: Value, args: CallArgs, env: ScopeId, pos: Pos) -> RunResult<Value> {
        match callee {
            Value::Function(handle) => {
                let Some(function) = value::function_data(handle) else {
                    let path = scope::source_path(env);
                    return Err(type_error("function body is missing from the heap", pos, &path));
                };
                if function.is_async {
                    return asyncio::make_promise(self, Value::Function(handle), args, false, env, pos);
                }
                let caller_path = scope::source_path(env);
                let fn_scope = scope::new_scope(Some(function.decl_env), ScopeKind::Function, &caller_path);
                self.resolve_this(&function, fn_scope, pos)?;
                self.bind_params(&function.params, &args, fn_scope)?;
                self.exec_function_body(&function.name, &function.body, fn_scope, pos, env)
            }
            Value::Macro(handle) => {
                let Some((_, func)) = value::macro_parts(handle) else {
                    let path = scope::source_path(env);
                    return Err(type_error("macro body is missing from the heap", pos, &path));
                };
                func(self, &args, env, pos)
            }
            other => {
                let path = scope::source_path(env);
                Err(type_error(
                    format!("type {} is not a function and is not callable", other.kind()),
                    pos,
                    &path,
                ))
            }
        }
    }

    /// Binds `this` for a function not declared inside an object/class body:
    /// arrows inherit it from the declaration environment, regular functions
    /// get a fresh empty object.
    fn resolve_this(&mut self, function: &value::FunctionData, fn_scope: ScopeId, pos: Pos) -> RunResult<()> {
        if scope::resolve_kind(function.decl_env, ScopeKind::Object).is_none() {
            if function.is_arrow {
                let this = scope::lookup(function.decl_env, "this", pos)?;
                scope::declare(fn_scope, "this", this, DeclKind::Constant, pos)?;
            } else {
                let this = alloc_object(Vec::new(), Some(fn_scope));
                scope::declare(fn_scope, "this", this, DeclKind::Constant, pos)?;
            }
        }
        Ok(())
    }

    /// Binds call arguments to the parameter list: plain identifiers,
    /// defaulted assignments (applied when the argument is nullish), rest
    /// parameters, and nested destructuring patterns. Containers bind their
    /// handle; scalars copy by value.
    pub(crate) fn bind_params(&mut self, params: &[Node], args: &[Value], fn_scope: ScopeId) -> RunResult<()> {
        for (index, param) in params.iter().enumerate() {
            let arg = args.get(index).cloned().unwrap_or(Value::Undefined);
            match param {
                Node::Ident { name, pos } => {
                    scope::declare(fn_scope, name, arg, DeclKind::Mutable, *pos)?;
                }
                Node::Assignment { left, right, op: AssignOp::Assign, pos } => {
                    let Node::Ident { name, .. } = left.as_ref() else {
                        let path = scope::source_path(fn_scope);
                        return Err(syntax_error("invalid parameter expression, identifier expected", *pos, &path));
                    };
                    let value = if arg.is_nullish() { self.eval(right, fn_scope)? } else { arg };
                    scope::declare(fn_scope, name, value, DeclKind::Mutable, *pos)?;
                }
                Node::RestSpread { operand, .. } => {
                    let rest = alloc_array(args.get(index..).unwrap_or_default().to_vec());
                    self.bind_params(std::slice::from_ref(operand), &[rest], fn_scope)?;
                    break;
                }
                Node::Object { properties, pos } => {
                    self.destructure_object_decl(properties, *pos, &arg, DeclKind::Mutable, fn_scope)?;
                }
                Node::Array { elements, pos } => {
                    self.destructure_array_decl(elements, *pos, &arg, DeclKind::Mutable, fn_scope)?;
                }
                other => {
                    let path = scope::source_path(fn_scope);
                    return Err(syntax_error(
                        "invalid parameter expression, identifier expected",
                        other.pos(),
                        &path,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Runs a function body on the call stack. Without an explicit `return`
    /// the result is `undefined`.
    pub(crate) fn exec_function_body(
        &mut self,
        name: &str,
        body: &[Node],
        fn_scope: ScopeId,
        pos: Pos,
        env: ScopeId,
    ) -> RunResult<Value> {
        if self.call_stack.len() >= MAX_CALL_DEPTH {
            let path = scope::source_path(env);
            return Err(type_error("maximum call depth exceeded", pos, &path));
        }
        self.call_stack.push(Frame { name: name.to_owned() });
        let result = self.eval_block(body, fn_scope);
        match result {
            Err(error) => {
                if self.returned_from_function {
                    // a return unwound the frame before the error surfaced
                    // (a throwing finally block, for instance)
                    self.returned_from_function = false;
                    self.terminated = false;
                    self.return_value = Value::Undefined;
                } else {
                    self.call_stack.pop();
                }
                Err(error)
            }
            Ok(_) => {
                if self.returned_from_function {
                    // the return statement already popped the frame
                    self.returned_from_function = false;
                    self.terminated = false;
                    Ok(std::mem::replace(&mut self.return_value, Value::Undefined))
                } else {
                    self.call_stack.pop();
                    Ok(Value::Undefined)
                }
            }
        }
    }

    /// Evaluates call arguments, flattening array spreads.
    pub(crate) fn eval_args(&mut self, nodes: &[Node], env: ScopeId) -> RunResult<CallArgs> {
        let mut args = CallArgs::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::RestSpread { operand, pos } => {
                    let value = self.eval(operand, env)?;
                    let Value::Array(array) = value else {
                        let path = scope::source_path(env);
                        return Err(type_error(format!("cannot spread type {}", value.kind()), *pos, &path));
                    };
                    for slot in value::array_items(array) {
                        args.push(slot.map(heap::get_cell).unwrap_or(Value::Undefined));
                    }
                }
                other => args.push(self.eval(other, env)?),
            }
        }
        Ok(args)
    }

    // ---- new / super / await ----

    fn eval_new(&mut self, operand: &Node, pos: Pos, env: ScopeId) -> RunResult<Value> {
        let (target_node, args) = match operand {
            Node::Call { caller, args, .. } => (caller.as_ref(), self.eval_args(args, env)?),
            other => (other, CallArgs::new()),
        };
        let target = self.eval(target_node, env)?;
        match target {
            Value::Class(handle) => class::instantiate(self, handle, args, pos),
            Value::NativeClass(handle) => class::native_instantiate(self, handle, args, env, pos),
            other => {
                let path = scope::source_path(env);
                Err(type_error(
                    format!("type {} is not a class and is not constructable", other.kind()),
                    pos,
                    &path,
                ))
            }
        }
    }

    /// `super(...)` inside a constructor: runs the parent constructor and
    /// re-points the instance's prototype chain into the super instance's
    /// prototype.
    fn eval_super(&mut self, args: &[Node], pos: Pos, env: ScopeId) -> RunResult<Value> {
        let this = scope::lookup(env, "this", pos)?;
        let Value::Instance(instance) = this else {
            let path = scope::source_path(env);
            return Err(syntax_error("super can only be called inside a constructor", pos, &path));
        };
        let Some(instance_data) = value::instance_data(instance) else {
            return Ok(Value::Null);
        };
        let Some(class) = value::class_data(instance_data.class) else {
            return Ok(Value::Null);
        };
        let Some(parent) = class.parent else {
            return Ok(Value::Null);
        };
        let mut evaluated = CallArgs::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.eval(arg, env)?);
        }
        let super_instance = class::instantiate(self, parent, evaluated, pos)?;
        let super_proto = value::proto_of(&super_instance);
        if matches!(super_proto, Value::Object(_)) {
            let this_value = Value::Instance(instance);
            let this_proto = value::proto_of(&this_value);
            if matches!(this_proto, Value::Object(_)) {
                value::set_proto(&this_proto, super_proto);
            } else {
                value::set_proto(&this_value, super_proto);
            }
        }
        Ok(Value::Undefined)
    }

    /// `await` is synchronous recursion: awaiting an async function call
    /// temporarily clears its `async` flag so the body runs inline.
    fn eval_await(&mut self, operand: &Node, env: ScopeId) -> RunResult<Value> {
        match operand {
            Node::Call { caller, args, pos } => {
                let callee = self.eval(caller, env)?;
                let args = self.eval_args(args, env)?;
                if let Value::Function(handle) = &callee {
                    let was_async = value::function_data(*handle).is_some_and(|f| f.is_async);
                    value::set_function_async(*handle, false);
                    let result = self.call_value(callee.clone(), args, env, *pos);
                    value::set_function_async(*handle, was_async);
                    return result;
                }
                self.call_value(callee, args, env, *pos)
            }
            Node::DynamicImport { specifier, pos, .. } => {
                let spec = self.eval(specifier, env)?;
                self.eval_dynamic_import(spec, false, *pos, env)
            }
            other => self.eval(other, env),
        }
    }

    // ---- modules ----

    fn eval_dynamic_import(&mut self, specifier: Value, is_async: bool, pos: Pos, env: ScopeId) -> RunResult<Value> {
        let path = scope::source_path(env);
        let Value::Str(target) = &specifier else {
            return Err(type_error(
                format!(
                    "Dynamic import's specifier must be of type 'string', but here has type {}",
                    specifier.kind()
                ),
                pos,
                &path,
            ));
        };
        if is_async {
            let import_macro = value::alloc_macro(
                "import",
                Arc::new(move |interp: &mut Interpreter, args: &[Value], env: ScopeId, pos: Pos| {
                    let Some(Value::Str(target)) = args.first() else {
                        let path = scope::source_path(env);
                        return Err(type_error(
                            "Dynamic import's specifier must be of type 'string'",
                            pos,
                            &path,
                        ));
                    };
                    let target = target.to_string();
                    interp.import_module(&target, env, pos)
                }),
            );
            return asyncio::make_promise(self, import_macro, smallvec![specifier.clone()], false, env, pos);
        }
        let target = target.to_string();
        self.import_module(&target, env, pos)
    }

    /// Resolves `target` relative to the importing module's path, evaluates
    /// it in a fresh interpreter over a fresh program scope, and returns the
    /// exports object. Each import re-evaluates the target.
    pub(crate) fn import_module(&mut self, target: &str, env: ScopeId, _pos: Pos) -> RunResult<Value> {
        let base = scope::source_path(env);
        let resolved = resolve_relative(&base, target);
        let program = Parser::from_file(&resolved, "module")
            .and_then(|parser| parser.parse(false))
            .map_err(RunError::from)?;
        let script_env = create_script_scope(&resolved);
        let mut sub = self.sub_interpreter();
        sub.eval_program(&program, script_env)
    }

    fn eval_import(
        &mut self,
        path: Option<&str>,
        namespace: Option<&str>,
        names: Option<&Node>,
        from: Option<&Node>,
        pos: Pos,
        env: ScopeId,
    ) -> RunResult<Value> {
        if let Some(from_node) = from {
            let module = self.eval(from_node, env)?;
            if let Some(namespace) = namespace {
                scope::declare(env, namespace, module, DeclKind::Static, pos)?;
            } else if let Some(Node::Object { properties, pos: names_pos }) = names {
                self.destructure_object_decl(properties, *names_pos, &module, DeclKind::Constant, env)?;
            }
        } else if let Some(target) = path {
            self.import_module(target, env, pos)?;
        }
        Ok(Value::Undefined)
    }

    fn eval_export(&mut self, export: &Node, env: ScopeId) -> RunResult<Value> {
        match export {
            Node::VarDecl { left, right, kind, .. } => {
                let value = match right {
                    Some(right) => self.eval(right, env)?,
                    None => Value::Undefined,
                };
                let decls = self.declare_pattern(left, value, *kind, env)?;
                for (name, handle) in decls {
                    self.exports.push((Value::str(name), handle));
                }
            }
            Node::Function(decl) => {
                let (_, named) = self.eval_function_decl(decl, env)?;
                if let Some((name, handle)) = named {
                    self.exports.push((Value::str(name), handle));
                }
            }
            Node::Class(decl) => {
                let (_, named) = class::eval_class_decl(self, decl, env)?;
                if let Some((name, handle)) = named {
                    self.exports.push((Value::str(name), handle));
                }
            }
            Node::Object { .. } => {
                let object = self.eval(export, env)?;
                for (key, handle) in value::own_props(&object).unwrap_or_default() {
                    self.exports.push((key, handle));
                }
            }
            other => {
                let path = scope::source_path(env);
                return Err(syntax_error("invalid export statement", other.pos(), &path));
            }
        }
        Ok(Value::Undefined)
    }
}

/// Root identifier of a (possibly nested) member expression chain.
fn root_identifier(node: &Node) -> Option<&str> {
    match node {
        Node::Member { object, .. } => root_identifier(object),
        Node::Ident { name, .. } => Some(name),
        _ => None,
    }
}

/// Joins `target` onto the directory of `base_file`. Absolute targets pass
/// through.
fn resolve_relative(base_file: &str, target: &str) -> String {
    let target_path = Path::new(target);
    if target_path.is_absolute() {
        return target.to_owned();
    }
    let base_dir = Path::new(base_file).parent().unwrap_or_else(|| Path::new("."));
    let joined = base_dir.join(target_path);
    match std::fs::canonicalize(&joined) {
        Ok(canonical) => canonical.to_string_lossy().into_owned(),
        Err(_) => joined.to_string_lossy().into_owned(),
    }
}

/// Creates a fresh `program` scope parented at the shared global scope, with
/// its `globalThis` object snapshotting every visible binding.
pub fn create_script_scope(path: &str) -> ScopeId {
    let script = scope::new_scope(Some(scope::global_scope()), ScopeKind::Program, path);
    let bindings = scope::all_bindings(script);
    let props = bindings
        .into_iter()
        .map(|(name, handle)| (Value::str(name), handle))
        .collect();
    let global_object = Value::Object(heap::alloc(heap::HeapData::Object(value::ObjectData {
        props,
        proto: Value::Null,
        env: None,
    })));
    scope::insert_binding(script, "globalThis", heap::alloc_cell(global_object), DeclKind::Constant);
    script
}

/// Parses and evaluates one source text. The unit of embedding: construct
/// with source and a path (used for diagnostics and import resolution), then
/// `run` it against a fresh program scope.
pub struct Runner {
    source: String,
    path: String,
}

impl Runner {
    pub fn new(source: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            path: path.into(),
        }
    }

    /// Parses without evaluating.
    pub fn parse(&self) -> Result<Program, LangError> {
        Parser::new(&self.source, &self.path, "program")?.parse(true)
    }

    /// Runs against stdout.
    pub fn run(&self) -> Result<Value, RunError> {
        self.run_with_writer(Rc::new(RefCell::new(StdPrint)), false)
    }

    /// Runs with an explicit writer; `color` controls ANSI rendering.
    pub fn run_with_writer(&self, out: Rc<RefCell<dyn PrintWriter>>, color: bool) -> Result<Value, RunError> {
        let program = self.parse()?;
        let env = create_script_scope(&self.path);
        let mut interp = Interpreter::new(out, color);
        interp.eval_program(&program, env)
    }

    /// Runs with collected output; returns the result and everything the
    /// program printed. The workhorse of the test suites.
    pub fn run_collect(&self) -> (Result<Value, RunError>, String) {
        let writer = Rc::new(RefCell::new(crate::io::CollectStringPrint::new()));
        let result = self.run_with_writer(writer.clone(), false);
        let output = writer.borrow().output().to_owned();
        (result, output)
    }
}

/// A persistent evaluation session: one program scope, one interpreter,
/// many inputs. Backs the REPL.
pub struct Session {
    env: ScopeId,
    interp: Interpreter,
}

impl Session {
    pub fn new(path: &str, out: Rc<RefCell<dyn PrintWriter>>, color: bool) -> Self {
        Self {
            env: create_script_scope(path),
            interp: Interpreter::new(out, color),
        }
    }

    /// Parses and evaluates one input line against the persistent scope,
    /// draining microtasks afterwards. Returns the last evaluated value.
    pub fn eval_line(&mut self, source: &str) -> Result<Value, RunError> {
        let path = scope::source_path(self.env);
        let program = Parser::new(source, &path, "program")
            .and_then(|parser| parser.parse(true))
            .map_err(RunError::from)?;
        let value = self.interp.eval_block(&program.body, self.env)?;
        self.interp.drain_microtasks()?;
        Ok(value)
    }

    /// Formats a value the way the session's interpreter prints it.
    pub fn display(&mut self, value: &Value) -> String {
        self.interp.display_value(value)
    }
}
