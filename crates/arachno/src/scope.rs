//! The environment tree: nested scopes with per-name handles and declaration
//! kinds.
//!
//! Scopes live in a process-wide arena indexed by `ScopeId`: closures
//! capture their declaration environment, so scope lifetimes outlive block
//! exit. The global scope is created lazily on first use and shared by every
//! interpreter in the process; each module evaluates in a fresh `program`
//! scope parented at it.

use std::sync::{Arc, LazyLock, RwLock};

use indexmap::IndexMap;

use crate::{
    ast::{DeclKind, Pos},
    exception::{RunResult, reference_error, syntax_error},
    heap::{self, Handle},
    value::{self, Value},
};

/// Index of a scope in the process-wide arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Global,
    Program,
    Block,
    Loop,
    Function,
    Object,
    Try,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    handle: Handle,
    kind: DeclKind,
}

struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    source_path: Arc<str>,
    bindings: IndexMap<String, Binding>,
}

static SCOPES: LazyLock<RwLock<Vec<Scope>>> = LazyLock::new(|| RwLock::new(Vec::new()));
static GLOBAL: LazyLock<RwLock<Option<ScopeId>>> = LazyLock::new(|| RwLock::new(None));

pub(crate) fn new_scope(parent: Option<ScopeId>, kind: ScopeKind, source_path: &str) -> ScopeId {
    let mut scopes = SCOPES.write().expect("scope arena lock poisoned");
    let id = ScopeId(u32::try_from(scopes.len()).expect("scope arena overflow"));
    scopes.push(Scope {
        parent,
        kind,
        source_path: Arc::from(source_path),
        bindings: IndexMap::new(),
    });
    id
}

pub(crate) fn parent_of(id: ScopeId) -> Option<ScopeId> {
    SCOPES.read().expect("scope arena lock poisoned")[id.0 as usize].parent
}

pub(crate) fn kind_of(id: ScopeId) -> ScopeKind {
    SCOPES.read().expect("scope arena lock poisoned")[id.0 as usize].kind
}

pub(crate) fn source_path(id: ScopeId) -> String {
    SCOPES.read().expect("scope arena lock poisoned")[id.0 as usize]
        .source_path
        .to_string()
}

fn own_binding(id: ScopeId, name: &str) -> Option<Binding> {
    SCOPES.read().expect("scope arena lock poisoned")[id.0 as usize]
        .bindings
        .get(name)
        .copied()
}

/// Walks parent links to the scope declaring `name`.
pub(crate) fn resolve_declaring_scope(mut id: ScopeId, name: &str) -> Option<ScopeId> {
    loop {
        if own_binding(id, name).is_some() {
            return Some(id);
        }
        id = parent_of(id)?;
    }
}

/// Declares `name` in exactly this scope, allocating its cell. Redeclaring a
/// name already present in the same scope is a syntactic error.
pub(crate) fn declare(id: ScopeId, name: &str, value: Value, kind: DeclKind, pos: Pos) -> RunResult<Handle> {
    if let Some(existing) = own_binding(id, name) {
        let path = source_path(id);
        return Err(syntax_error(
            format!("cannot redeclare {} variable {name}", existing.kind),
            pos,
            &path,
        ));
    }
    let handle = heap::alloc_cell(value);
    insert_binding(id, name, handle, kind);
    Ok(handle)
}

/// Installs a binding over an existing cell, without redeclaration checks.
/// Used for macro installation and `globalThis` writes.
pub(crate) fn insert_binding(id: ScopeId, name: &str, handle: Handle, kind: DeclKind) {
    let mut scopes = SCOPES.write().expect("scope arena lock poisoned");
    scopes[id.0 as usize].bindings.insert(name.to_owned(), Binding { handle, kind });
}

/// The cell handle `name` resolves to, or a reference error.
pub(crate) fn reference_of(id: ScopeId, name: &str, pos: Pos) -> RunResult<Handle> {
    match resolve_declaring_scope(id, name) {
        Some(declaring) => Ok(own_binding(declaring, name).expect("binding exists in declaring scope").handle),
        None => {
            let path = source_path(id);
            Err(reference_error(
                format!("could not resolve variable `{name}` as it does not exist"),
                pos,
                &path,
            ))
        }
    }
}

pub(crate) fn lookup(id: ScopeId, name: &str, pos: Pos) -> RunResult<Value> {
    let handle = reference_of(id, name, pos)?;
    Ok(heap::get_cell(handle))
}

/// Rebinds `name`'s cell. `constant` and `static` bindings refuse
/// reassignment with a syntactic error.
pub(crate) fn assign(id: ScopeId, name: &str, value: Value, pos: Pos) -> RunResult<Value> {
    let declaring = match resolve_declaring_scope(id, name) {
        Some(declaring) => declaring,
        None => {
            let path = source_path(id);
            return Err(reference_error(
                format!("could not resolve variable `{name}` as it does not exist"),
                pos,
                &path,
            ));
        }
    };
    let binding = own_binding(declaring, name).expect("binding exists in declaring scope");
    if matches!(binding.kind, DeclKind::Constant | DeclKind::Static) {
        let path = source_path(id);
        return Err(syntax_error(
            format!("assignment to {} variable: {name}", binding.kind),
            pos,
            &path,
        ));
    }
    heap::set_cell(binding.handle, value.clone());
    Ok(value)
}

/// The declaration kind `name` resolves to, if any.
pub(crate) fn binding_kind(id: ScopeId, name: &str) -> Option<DeclKind> {
    let declaring = resolve_declaring_scope(id, name)?;
    own_binding(declaring, name).map(|b| b.kind)
}

/// Removes the binding for `name`, returning its cell handle for heap
/// cleanup.
pub(crate) fn delete_binding(id: ScopeId, name: &str, pos: Pos) -> RunResult<Handle> {
    let declaring = match resolve_declaring_scope(id, name) {
        Some(declaring) => declaring,
        None => {
            let path = source_path(id);
            return Err(reference_error(
                format!("could not resolve variable `{name}` as it does not exist"),
                pos,
                &path,
            ));
        }
    };
    let mut scopes = SCOPES.write().expect("scope arena lock poisoned");
    let binding = scopes[declaring.0 as usize]
        .bindings
        .shift_remove(name)
        .expect("binding exists in declaring scope");
    Ok(binding.handle)
}

/// Nearest enclosing scope of the given kind, including this one.
pub(crate) fn resolve_kind(mut id: ScopeId, kind: ScopeKind) -> Option<ScopeId> {
    loop {
        if kind_of(id) == kind {
            return Some(id);
        }
        id = parent_of(id)?;
    }
}

/// All visible bindings from this scope to the global scope, nearest
/// declaration winning.
pub(crate) fn all_bindings(id: ScopeId) -> Vec<(String, Handle)> {
    let mut seen = IndexMap::new();
    let mut current = Some(id);
    while let Some(scope_id) = current {
        let scopes = SCOPES.read().expect("scope arena lock poisoned");
        let scope = &scopes[scope_id.0 as usize];
        for (name, binding) in &scope.bindings {
            seen.entry(name.clone()).or_insert(binding.handle);
        }
        current = scope.parent;
        drop(scopes);
    }
    seen.into_iter().collect()
}

/// The shared global scope, created lazily: `true`/`false`/`undefined`/
/// `null`/`this` as `static` bindings, plus every registered macro.
pub fn global_scope() -> ScopeId {
    if let Some(id) = *GLOBAL.read().expect("global scope lock poisoned") {
        return id;
    }
    let mut slot = GLOBAL.write().expect("global scope lock poisoned");
    if let Some(id) = *slot {
        return id;
    }
    let id = new_scope(None, ScopeKind::Global, "");
    let statics = [
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
        ("undefined", Value::Undefined),
        ("null", Value::Null),
        ("this", value::alloc_object(Vec::new(), None)),
    ];
    for (name, value) in statics {
        insert_binding(id, name, heap::alloc_cell(value), DeclKind::Static);
    }
    crate::builtins::install_macros(id);
    crate::asyncio::install_promise_class(id);
    *slot = Some(id);
    id
}

pub(crate) fn global_scope_if_created() -> Option<ScopeId> {
    *GLOBAL.read().expect("global scope lock poisoned")
}

pub(crate) fn clear() {
    SCOPES.write().expect("scope arena lock poisoned").clear();
    *GLOBAL.write().expect("global scope lock poisoned") = None;
}
