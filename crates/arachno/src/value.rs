//! Runtime values: the tagged sum, structural containers, coercions, and
//! printing.
//!
//! Scalar values live inline; mutable containers are handle-carrying variants
//! whose bodies live on the heap, so `a = b` copies the handle and both names
//! reference one cell (reference semantics). Container bodies store their
//! elements and properties as handles in turn.

use std::{any::Any, sync::Arc};

use ahash::AHashSet;
use strum::{Display, IntoStaticStr};

use crate::{
    ast::{ClassField, ClassMethod, Constructor, Node, Pos},
    exception::RunResult,
    heap::{self, Handle, HeapData},
    run::Interpreter,
    scope::ScopeId,
};

/// Signature of a host-provided macro: `(args, env, pos, interpreter)` to a
/// runtime value.
pub type MacroFn = Arc<dyn Fn(&mut Interpreter, &[Value], ScopeId, Pos) -> RunResult<Value> + Send + Sync>;

/// Argument buffer on the call path; short argument lists stay inline.
pub(crate) type CallArgs = smallvec::SmallVec<[Value; 4]>;

/// Primary runtime value type.
///
/// Containers (`Array`, `Object`, `Function`, `Macro`, `Class`,
/// `NativeClass`, `Instance`, `Raw`) carry the handle of their heap body;
/// cloning a `Value` is always cheap and preserves sharing.
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    /// A symbol, identified by its rendered label (`Symbol(key)`).
    Symbol(Arc<str>),
    Array(Handle),
    Object(Handle),
    Function(Handle),
    Macro(Handle),
    Class(Handle),
    NativeClass(Handle),
    Instance(Handle),
    /// Opaque host-owned value.
    Raw(Handle),
}

/// Canonical type tags, as produced by `typeof` and used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ValueKind {
    #[strum(serialize = "number")]
    Number,
    #[strum(serialize = "string")]
    Str,
    #[strum(serialize = "boolean")]
    Bool,
    #[strum(serialize = "null")]
    Null,
    #[strum(serialize = "undefined")]
    Undefined,
    #[strum(serialize = "object")]
    Object,
    #[strum(serialize = "array")]
    Array,
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = "macro")]
    Macro,
    #[strum(serialize = "class")]
    Class,
    #[strum(serialize = "instance")]
    Instance,
    #[strum(serialize = "symbol")]
    Symbol,
    #[strum(serialize = "raw")]
    Raw,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::Str,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Function(_) => ValueKind::Function,
            Value::Macro(_) => ValueKind::Macro,
            Value::Class(_) | Value::NativeClass(_) => ValueKind::Class,
            Value::Instance(_) => ValueKind::Instance,
            Value::Raw(_) => ValueKind::Raw,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub(crate) fn str(text: impl Into<Arc<str>>) -> Self {
        Value::Str(text.into())
    }
}

// ---- container bodies ----

/// Ordered sequence of element handles. `None` slots are holes created by
/// assignment past the end; they read as `undefined`.
#[derive(Debug, Clone, Default)]
pub(crate) struct ArrayData {
    pub elements: Vec<Option<Handle>>,
}

/// An object body: own properties keyed by arbitrary values (compared by
/// structural equality), an optional prototype (an object or `Null`), and the
/// environment the literal was evaluated in (method-scope `this`).
#[derive(Debug, Clone)]
pub(crate) struct ObjectData {
    pub props: Vec<(Value, Handle)>,
    pub proto: Value,
    pub env: Option<ScopeId>,
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionData {
    pub name: String,
    pub params: Arc<[Node]>,
    pub body: Arc<[Node]>,
    pub decl_env: ScopeId,
    pub is_async: bool,
    pub is_arrow: bool,
    pub is_anonymous: bool,
    /// Functions carry own properties and a prototype, like objects.
    pub props: Vec<(Value, Handle)>,
    pub proto: Value,
}

#[derive(Debug, Clone)]
pub(crate) struct ClassData {
    pub name: String,
    pub anonymous: bool,
    /// Heap handle of the parent class body when `extends` is present.
    pub parent: Option<Handle>,
    pub fields: Arc<[ClassField]>,
    pub methods: Arc<[ClassMethod]>,
    pub ctor: Option<Arc<Constructor>>,
    pub decl_env: ScopeId,
    pub props: Vec<(Value, Handle)>,
    pub proto: Value,
}

/// Host-provided class: a constructor macro plus method macros, instantiated
/// through the same `new` path as user classes. The constructor macro
/// receives the freshly built instance appended to the caller's arguments.
pub(crate) struct NativeClassData {
    pub name: String,
    pub ctor: Handle,
    pub methods: Vec<(String, Handle)>,
    pub props: Vec<(String, Handle)>,
}

#[derive(Debug, Clone)]
pub(crate) struct InstanceData {
    pub class_name: String,
    /// Heap handle of the class body this instance was built from.
    pub class: Handle,
    /// Cell of the field flagged `default`, read by `#_value`.
    pub default: Option<Handle>,
    pub props: Vec<(Value, Handle)>,
    /// Per-instance prototype object; the mutable chain tip.
    pub proto: Value,
    pub class_body: ScopeId,
}

pub(crate) struct MacroData {
    pub name: String,
    pub func: MacroFn,
}

/// Opaque host-owned payload.
pub(crate) struct RawData {
    pub label: String,
    pub value: Box<dyn Any + Send + Sync>,
}

// ---- property and array helpers (no heap lock held across recursion) ----

/// Clones out the own-property list of any property-bearing value.
pub(crate) fn own_props(value: &Value) -> Option<Vec<(Value, Handle)>> {
    let handle = match value {
        Value::Object(h) | Value::Function(h) | Value::Class(h) | Value::Instance(h) | Value::NativeClass(h) => *h,
        _ => return None,
    };
    heap::with(handle, |data| match data {
        HeapData::Object(o) => Some(o.props.clone()),
        HeapData::Function(f) => Some(f.props.clone()),
        HeapData::Class(c) => Some(c.props.clone()),
        HeapData::Instance(i) => Some(i.props.clone()),
        HeapData::NativeClass(n) => Some(
            n.props
                .iter()
                .map(|(k, v)| (Value::str(k.clone()), *v))
                .collect(),
        ),
        _ => None,
    })
    .flatten()
}

/// The prototype link of a property-bearing value (`Null` terminates).
pub(crate) fn proto_of(value: &Value) -> Value {
    let handle = match value {
        Value::Object(h) | Value::Function(h) | Value::Class(h) | Value::Instance(h) => *h,
        _ => return Value::Null,
    };
    heap::with(handle, |data| match data {
        HeapData::Object(o) => o.proto.clone(),
        HeapData::Function(f) => f.proto.clone(),
        HeapData::Class(c) => c.proto.clone(),
        HeapData::Instance(i) => i.proto.clone(),
        _ => Value::Null,
    })
    .unwrap_or(Value::Null)
}

/// Finds an own property by structurally equal key.
pub(crate) fn find_own_prop(value: &Value, key: &Value) -> Option<Handle> {
    let props = own_props(value)?;
    props.iter().find(|(k, _)| values_equal(k, key)).map(|(_, h)| *h)
}

/// Own lookup, then prototype chain walk. Each chain link is itself an
/// object; a `Null` link terminates the walk.
pub(crate) fn find_prop_chain(value: &Value, key: &Value) -> Option<Handle> {
    if let Some(handle) = find_own_prop(value, key) {
        return Some(handle);
    }
    let mut link = proto_of(value);
    loop {
        match link {
            Value::Object(_) => {
                if let Some(handle) = find_own_prop(&link, key) {
                    return Some(handle);
                }
                link = proto_of(&link);
            }
            _ => return None,
        }
    }
}

/// Adds an own property (the caller has established it is absent).
pub(crate) fn insert_prop(value: &Value, key: Value, cell: Handle) -> bool {
    let handle = match value {
        Value::Object(h) | Value::Function(h) | Value::Class(h) | Value::Instance(h) => *h,
        _ => return false,
    };
    heap::mutate(handle, |data| match data {
        HeapData::Object(o) => o.props.push((key, cell)),
        HeapData::Function(f) => f.props.push((key, cell)),
        HeapData::Class(c) => c.props.push((key, cell)),
        HeapData::Instance(i) => i.props.push((key, cell)),
        _ => {}
    })
    .is_some()
}

/// Removes an own property, returning its cell handle.
pub(crate) fn remove_prop(value: &Value, key: &Value) -> Option<Handle> {
    let props = own_props(value)?;
    let index = props.iter().position(|(k, _)| values_equal(k, key))?;
    let handle = match value {
        Value::Object(h) | Value::Function(h) | Value::Class(h) | Value::Instance(h) => *h,
        _ => return None,
    };
    heap::mutate(handle, |data| match data {
        HeapData::Object(o) => Some(o.props.remove(index).1),
        HeapData::Function(f) => Some(f.props.remove(index).1),
        HeapData::Class(c) => Some(c.props.remove(index).1),
        HeapData::Instance(i) => Some(i.props.remove(index).1),
        _ => None,
    })
    .flatten()
}

pub(crate) fn set_proto(value: &Value, proto: Value) {
    let handle = match value {
        Value::Object(h) | Value::Function(h) | Value::Class(h) | Value::Instance(h) => *h,
        _ => return,
    };
    heap::mutate(handle, |data| match data {
        HeapData::Object(o) => o.proto = proto,
        HeapData::Function(f) => f.proto = proto,
        HeapData::Class(c) => c.proto = proto,
        HeapData::Instance(i) => i.proto = proto,
        _ => {}
    });
}

pub(crate) fn array_items(handle: Handle) -> Vec<Option<Handle>> {
    heap::with(handle, |data| match data {
        HeapData::Array(a) => a.elements.clone(),
        _ => Vec::new(),
    })
    .unwrap_or_default()
}

pub(crate) fn array_len(handle: Handle) -> usize {
    heap::with(handle, |data| match data {
        HeapData::Array(a) => a.elements.len(),
        _ => 0,
    })
    .unwrap_or(0)
}

pub(crate) fn array_push(handle: Handle, cell: Handle) {
    heap::mutate(handle, |data| {
        if let HeapData::Array(a) = data {
            a.elements.push(Some(cell));
        }
    });
}

/// Sets an element slot, extending the array with holes past the end.
pub(crate) fn array_set_slot(handle: Handle, index: usize, cell: Handle) {
    heap::mutate(handle, |data| {
        if let HeapData::Array(a) = data {
            if index >= a.elements.len() {
                a.elements.resize(index + 1, None);
            }
            a.elements[index] = Some(cell);
        }
    });
}

pub(crate) fn alloc_array(values: Vec<Value>) -> Value {
    let elements = values.into_iter().map(|v| Some(heap::alloc_cell(v))).collect();
    Value::Array(heap::alloc(HeapData::Array(ArrayData { elements })))
}

pub(crate) fn alloc_object(props: Vec<(Value, Value)>, env: Option<ScopeId>) -> Value {
    let props = props
        .into_iter()
        .map(|(k, v)| (k, heap::alloc_cell(v)))
        .collect();
    Value::Object(heap::alloc(HeapData::Object(ObjectData {
        props,
        proto: Value::Null,
        env,
    })))
}

pub(crate) fn alloc_macro(name: &str, func: MacroFn) -> Value {
    Value::Macro(heap::alloc(HeapData::Macro(MacroData {
        name: name.to_owned(),
        func,
    })))
}

pub(crate) fn alloc_raw(label: &str, value: Box<dyn Any + Send + Sync>) -> Value {
    Value::Raw(heap::alloc(HeapData::Raw(RawData {
        label: label.to_owned(),
        value,
    })))
}

pub(crate) fn macro_parts(handle: Handle) -> Option<(String, MacroFn)> {
    heap::with(handle, |data| match data {
        HeapData::Macro(m) => Some((m.name.clone(), m.func.clone())),
        _ => None,
    })
    .flatten()
}

pub(crate) fn function_data(handle: Handle) -> Option<FunctionData> {
    heap::with(handle, |data| match data {
        HeapData::Function(f) => Some(f.clone()),
        _ => None,
    })
    .flatten()
}

pub(crate) fn class_data(handle: Handle) -> Option<ClassData> {
    heap::with(handle, |data| match data {
        HeapData::Class(c) => Some(c.clone()),
        _ => None,
    })
    .flatten()
}

pub(crate) fn instance_data(handle: Handle) -> Option<InstanceData> {
    heap::with(handle, |data| match data {
        HeapData::Instance(i) => Some(i.clone()),
        _ => None,
    })
    .flatten()
}

pub(crate) fn object_env(handle: Handle) -> Option<ScopeId> {
    heap::with(handle, |data| match data {
        HeapData::Object(o) => o.env,
        _ => None,
    })
    .flatten()
}

pub(crate) fn native_class_parts(handle: Handle) -> Option<(String, Handle, Vec<(String, Handle)>, Vec<(String, Handle)>)> {
    heap::with(handle, |data| match data {
        HeapData::NativeClass(n) => Some((n.name.clone(), n.ctor, n.methods.clone(), n.props.clone())),
        _ => None,
    })
    .flatten()
}

pub(crate) fn set_instance_default(handle: Handle, cell: Handle) {
    heap::mutate(handle, |data| {
        if let HeapData::Instance(i) = data {
            i.default = Some(cell);
        }
    });
}

pub(crate) fn set_function_async(handle: Handle, is_async: bool) {
    heap::mutate(handle, |data| {
        if let HeapData::Function(f) = data {
            f.is_async = is_async;
        }
    });
}

/// Renames an anonymous function or class when it lands in a named slot.
pub(crate) fn adopt_name(value: &Value, name: &str) {
    match value {
        Value::Function(h) => {
            heap::mutate(*h, |data| {
                if let HeapData::Function(f) = data
                    && (f.is_anonymous || f.name.is_empty())
                {
                    f.name = name.to_owned();
                }
            });
        }
        Value::Class(h) => {
            heap::mutate(*h, |data| {
                if let HeapData::Class(c) = data
                    && (c.anonymous || c.name.is_empty())
                {
                    c.name = name.to_owned();
                }
            });
        }
        _ => {}
    }
}

// ---- coercions ----

/// Truthiness: booleans are themselves, numbers non-zero, strings non-empty,
/// arrays and objects non-empty. Everything else is false.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::Array(h) => array_len(*h) > 0,
        Value::Object(_) => own_props(value).is_some_and(|props| !props.is_empty()),
        _ => false,
    }
}

/// Structural deep equality over the tagged values. Containers compare by
/// content through their handles; identical handles short-circuit. Functions,
/// classes, macros, and raws compare by identity.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    values_equal_inner(a, b, &mut AHashSet::new())
}

fn values_equal_inner(a: &Value, b: &Value, seen: &mut AHashSet<(Handle, Handle)>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            if x == y {
                return true;
            }
            if !seen.insert((*x, *y)) {
                return true;
            }
            let left = array_items(*x);
            let right = array_items(*y);
            left.len() == right.len()
                && left.iter().zip(right.iter()).all(|(l, r)| {
                    let lv = l.map(heap::get_cell).unwrap_or(Value::Undefined);
                    let rv = r.map(heap::get_cell).unwrap_or(Value::Undefined);
                    values_equal_inner(&lv, &rv, seen)
                })
        }
        (Value::Object(x), Value::Object(y)) | (Value::Instance(x), Value::Instance(y)) => {
            if x == y {
                return true;
            }
            if !seen.insert((*x, *y)) {
                return true;
            }
            let left = own_props(a).unwrap_or_default();
            let right = own_props(b).unwrap_or_default();
            left.len() == right.len()
                && left.iter().all(|(key, handle)| {
                    right
                        .iter()
                        .find(|(k, _)| values_equal_inner(k, key, seen))
                        .is_some_and(|(_, other)| {
                            values_equal_inner(&heap::get_cell(*handle), &heap::get_cell(*other), seen)
                        })
                })
        }
        (Value::Function(x), Value::Function(y))
        | (Value::Macro(x), Value::Macro(y))
        | (Value::Class(x), Value::Class(y))
        | (Value::NativeClass(x), Value::NativeClass(y))
        | (Value::Raw(x), Value::Raw(y)) => x == y,
        _ => false,
    }
}

/// `===`: structural equality plus matching runtime type tags.
pub(crate) fn values_strict_equal(a: &Value, b: &Value) -> bool {
    values_equal(a, b) && a.kind() == b.kind()
}

/// Formats a number the way the language prints it: integers without a
/// fractional part, everything else through ryu.
pub(crate) fn fmt_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == n.trunc() && n.abs() < 9_007_199_254_740_992.0 {
        let mut text = format!("{}", n as i64);
        if text == "-0" {
            text = "0".to_owned();
        }
        return text;
    }
    ryu::Buffer::new().format(n).to_owned()
}

/// Plain (uncolored, unquoted) string coercion, as used by `#_to_string`,
/// template interpolation, and string keys.
pub(crate) fn to_plain_string(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_owned(),
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => fmt_number(*n),
        Value::Str(s) => s.to_string(),
        Value::Symbol(label) => label.to_string(),
        Value::Array(_) => "[array]".to_owned(),
        Value::Object(_) => "[object]".to_owned(),
        Value::Function(h) => function_data(*h).map(|f| f.name).unwrap_or_default(),
        Value::Macro(h) => macro_parts(*h).map(|(name, _)| name).unwrap_or_default(),
        Value::Class(h) => class_data(*h).map(|c| c.name).unwrap_or_default(),
        Value::NativeClass(h) => heap::with(*h, |data| match data {
            HeapData::NativeClass(n) => n.name.clone(),
            _ => String::new(),
        })
        .unwrap_or_default(),
        Value::Instance(h) => instance_data(*h).map(|i| i.class_name).unwrap_or_default(),
        Value::Raw(h) => heap::with(*h, |data| match data {
            HeapData::Raw(r) => r.label.clone(),
            _ => String::new(),
        })
        .unwrap_or_default(),
    }
}

// ---- printing ----

const MAX_RENDER_DEPTH: usize = 4;

struct Palette {
    color: bool,
}

impl Palette {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_owned()
        }
    }
}

/// Renders a value for terminal output: strings at depth 0 print raw, nested
/// strings quoted; containers recurse with a depth cap and `[Circular]`
/// markers for cycles.
pub(crate) fn render_value(value: &Value, color: bool) -> String {
    render_inner(value, 0, &Palette { color }, &mut AHashSet::new())
}

fn render_inner(value: &Value, depth: usize, palette: &Palette, visiting: &mut AHashSet<Handle>) -> String {
    match value {
        Value::Undefined => palette.paint("1;97", "undefined"),
        Value::Null => palette.paint("1;97", "null"),
        Value::Bool(b) => palette.paint("33", &b.to_string()),
        Value::Number(n) => palette.paint("33", &fmt_number(*n)),
        Value::Str(s) => {
            if depth == 0 {
                s.to_string()
            } else {
                let quote = if s.contains('"') && s.contains('\'') {
                    '`'
                } else if s.contains('"') {
                    '\''
                } else {
                    '"'
                };
                palette.paint("32", &format!("{quote}{s}{quote}"))
            }
        }
        Value::Symbol(label) => palette.paint("32", label),
        Value::Array(h) => {
            if depth > MAX_RENDER_DEPTH {
                return palette.paint("36", "[array]");
            }
            if !visiting.insert(*h) {
                return palette.paint("36", "[Circular]");
            }
            let items: Vec<String> = array_items(*h)
                .iter()
                .map(|slot| {
                    let element = slot.map(heap::get_cell).unwrap_or(Value::Undefined);
                    render_inner(&element, depth + 1, palette, visiting)
                })
                .collect();
            visiting.remove(h);
            format!("[ {} ]", items.join(", "))
        }
        Value::Object(h) | Value::Instance(h) => {
            if depth > MAX_RENDER_DEPTH {
                return palette.paint("36", if matches!(value, Value::Object(_)) { "[object]" } else { "[instance]" });
            }
            if !visiting.insert(*h) {
                return palette.paint("36", "[Circular]");
            }
            let pairs: Vec<String> = own_props(value)
                .unwrap_or_default()
                .iter()
                .map(|(key, handle)| {
                    let rendered_key = render_inner(key, depth.max(1), palette, visiting);
                    let rendered = render_inner(&heap::get_cell(*handle), depth + 1, palette, visiting);
                    format!("{rendered_key}: {rendered}")
                })
                .collect();
            visiting.remove(h);
            let body = if pairs.is_empty() {
                "{}".to_owned()
            } else {
                format!("{{ {} }}", pairs.join(", "))
            };
            if let Value::Instance(_) = value {
                format!("{} {body}", to_plain_string(value))
            } else {
                body
            }
        }
        Value::Function(h) => {
            let name = function_data(*h).map(|f| f.name).unwrap_or_default();
            palette.paint("36", &format!("[function {name}]"))
        }
        Value::Macro(h) => {
            let name = macro_parts(*h).map(|(name, _)| name).unwrap_or_default();
            palette.paint("34", &format!("[macro {name}]"))
        }
        Value::Class(_) | Value::NativeClass(_) => {
            let mut name = to_plain_string(value);
            if name.is_empty() || name.starts_with('$') {
                name = "(anonymous)".to_owned();
            }
            palette.paint("36", &format!("[class {name}]"))
        }
        Value::Raw(_) => palette.paint("3", &format!("[raw {}]", to_plain_string(value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting() {
        assert_eq!(fmt_number(7.0), "7");
        assert_eq!(fmt_number(-3.0), "-3");
        assert_eq!(fmt_number(1.5), "1.5");
        assert_eq!(fmt_number(f64::NAN), "NaN");
        assert_eq!(fmt_number(-0.0), "0");
    }

    #[test]
    fn scalar_truthiness() {
        assert!(is_truthy(&Value::Bool(true)));
        assert!(!is_truthy(&Value::Bool(false)));
        assert!(is_truthy(&Value::Number(2.0)));
        assert!(!is_truthy(&Value::Number(0.0)));
        assert!(is_truthy(&Value::str("x")));
        assert!(!is_truthy(&Value::str("")));
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&Value::Undefined));
    }

    #[test]
    fn deep_equality_over_containers() {
        let a = alloc_array(vec![Value::Number(1.0), Value::str("x")]);
        let b = alloc_array(vec![Value::Number(1.0), Value::str("x")]);
        let c = alloc_array(vec![Value::Number(2.0)]);
        assert!(values_equal(&a, &b));
        assert!(!values_equal(&a, &c));
    }

    #[test]
    fn strict_equality_checks_type_tags() {
        assert!(values_equal(&Value::Number(0.0), &Value::Number(-0.0)));
        assert!(!values_strict_equal(&Value::Number(1.0), &Value::str("1")));
        assert!(values_strict_equal(&Value::str("a"), &Value::str("a")));
    }

    #[test]
    fn render_plain_scalars() {
        assert_eq!(render_value(&Value::Number(7.0), false), "7");
        assert_eq!(render_value(&Value::str("hi"), false), "hi");
        assert_eq!(render_value(&Value::Bool(true), false), "true");
    }

    #[test]
    fn render_marks_cycles() {
        let array = alloc_array(vec![Value::Number(1.0)]);
        if let Value::Array(h) = &array {
            array_push(*h, heap::alloc_cell(array.clone()));
        }
        let rendered = render_value(&array, false);
        assert!(rendered.contains("[Circular]"), "{rendered}");
    }
}
