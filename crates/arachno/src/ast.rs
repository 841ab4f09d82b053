//! AST node definitions produced by the parser.
//!
//! The tree is a single flat sum type: one `Node` variant per language
//! construct, each carrying its source position. Dispatch in the evaluator is
//! a `match` over the variant, not dynamic polymorphism. Nodes serialize to
//! JSON for `--ast` dumps and the `#_new_parser` reflection macro.

use serde::Serialize;
use strum::{Display, EnumString};

/// Source position of a node: 1-based line and column, plus the character
/// count used to size caret underlines in diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
    pub count: usize,
}

/// Declaration kind attached to a binding.
///
/// `spawn` declares `mutable`, `immortal` declares `constant`, `static` and
/// `var` declare themselves. `constant` and `static` refuse reassignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum DeclKind {
    Mutable,
    Constant,
    Static,
    Var,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "**")]
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
pub enum ComparisonOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "===")]
    StrictEq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "!==")]
    StrictNe,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">=")]
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
pub enum AssignOp {
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "+=")]
    AddAssign,
    #[strum(serialize = "-=")]
    SubAssign,
    #[strum(serialize = "*=")]
    MulAssign,
    #[strum(serialize = "/=")]
    DivAssign,
    #[strum(serialize = "%=")]
    ModAssign,
    #[strum(serialize = "??=")]
    NullishAssign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
pub enum LogicalOp {
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "!")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
pub enum IncrOp {
    #[strum(serialize = "++")]
    Inc,
    #[strum(serialize = "--")]
    Dec,
}

/// Operator of a for-iterator loop: `for (.. in ..)` or `for (.. of ..)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum IterOp {
    In,
    Of,
}

/// One literal or interpolated segment of a template string.
///
/// Interpolations (`#{ expr }`) are split out and parsed at parse time so the
/// evaluator only has to evaluate and concatenate.
#[derive(Debug, Clone, Serialize)]
pub enum TemplatePart {
    Lit(String),
    Expr(Box<Node>),
}

/// One `key: value` entry of an object literal or destructuring pattern.
///
/// `dynamic` marks a parenthesized/bracketed computed key. A `None` value is
/// the shorthand form (`{ name }` constructs from scope; in a pattern it
/// binds the property under its own name).
#[derive(Debug, Clone, Serialize)]
pub struct ObjectProp {
    pub key: Box<Node>,
    pub dynamic: bool,
    pub value: Option<Node>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchCase {
    pub condition: Node,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchArm {
    pub pattern: Node,
    pub body: Node,
}

/// A function declaration or expression, also embedded in class methods and
/// object-literal method shorthands.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDecl {
    /// Declared name. `None` for anonymous functions; a non-identifier node
    /// when the name is computed (`[expr]` method keys).
    pub name: Option<Box<Node>>,
    pub dynamic_name: bool,
    pub is_async: bool,
    pub is_anonymous: bool,
    pub is_arrow: bool,
    pub params: Vec<Node>,
    pub body: Vec<Node>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassField {
    pub is_private: bool,
    pub is_default: bool,
    pub is_static: bool,
    pub name: String,
    pub value: Node,
    pub pos: Pos,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassMethod {
    pub is_private: bool,
    pub is_static: bool,
    pub decl: FunctionDecl,
    pub pos: Pos,
}

/// Constructor parameter. `public`/`private` markers are parsed and preserved
/// but the evaluator does not auto-assign them to the instance.
#[derive(Debug, Clone, Serialize)]
pub struct CtorParam {
    pub is_private: bool,
    pub is_public: bool,
    pub expr: Node,
    pub pos: Pos,
}

#[derive(Debug, Clone, Serialize)]
pub struct Constructor {
    pub params: Vec<CtorParam>,
    pub body: Vec<Node>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDecl {
    pub name: String,
    pub anonymous: bool,
    pub extends: Option<String>,
    pub fields: Vec<ClassField>,
    pub methods: Vec<ClassMethod>,
    pub ctor: Option<Constructor>,
    pub pos: Pos,
}

/// A parsed module or script.
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub body: Vec<Node>,
    pub source_path: String,
    pub script_type: String,
    pub main: bool,
}

/// The AST sum type. No node is shared between two parents; positions are
/// always populated by the parser.
#[derive(Debug, Clone, Serialize)]
pub enum Node {
    // Literals
    Number { value: f64, pos: Pos },
    Str { value: String, pos: Pos },
    TemplateString { parts: Vec<TemplatePart>, pos: Pos },
    Ident { name: String, pos: Pos },
    Array { elements: Vec<Node>, pos: Pos },
    Object { properties: Vec<ObjectProp>, pos: Pos },

    // Declarations
    VarDecl { left: Box<Node>, right: Option<Box<Node>>, kind: DeclKind, pos: Pos },
    Function(FunctionDecl),
    Class(ClassDecl),

    // Statements
    If { condition: Box<Node>, body: Vec<Node>, else_body: Vec<Node>, pos: Pos },
    While { condition: Box<Node>, body: Vec<Node>, do_while: bool, pos: Pos },
    For { before: Box<Node>, condition: Box<Node>, after: Box<Node>, body: Vec<Node>, pos: Pos },
    ForIter { left: Box<Node>, right: Box<Node>, kind: DeclKind, op: IterOp, body: Vec<Node>, pos: Pos },
    Try { body: Vec<Node>, catch: Option<Vec<Node>>, finally: Vec<Node>, catch_param: Option<String>, pos: Pos },
    Throw { value: Box<Node>, pos: Pos },
    Delete { operand: Box<Node>, pos: Pos },
    Block { body: Vec<Node>, pos: Pos },
    Return { value: Option<Box<Node>>, pos: Pos },
    Break { pos: Pos },
    Continue { pos: Pos },
    Label { name: String, pos: Pos },
    Import { path: Option<String>, namespace: Option<String>, names: Option<Box<Node>>, from: Option<Box<Node>>, pos: Pos },
    Export { export: Box<Node>, pos: Pos },
    Switch { on: Box<Node>, cases: Vec<SwitchCase>, default: Vec<Node>, pos: Pos },

    // Expressions
    Assignment { left: Box<Node>, right: Box<Node>, op: AssignOp, pos: Pos },
    Binary { left: Box<Node>, right: Box<Node>, op: BinaryOp, pos: Pos },
    Comparison { left: Box<Node>, right: Box<Node>, op: ComparisonOp, pos: Pos },
    Logical { left: Box<Node>, right: Option<Box<Node>>, op: LogicalOp, pos: Pos },
    Ternary { condition: Box<Node>, then: Box<Node>, otherwise: Box<Node>, pos: Pos },
    Match { on: Box<Node>, cases: Vec<MatchArm>, pos: Pos },
    From { path: String, pos: Pos },
    Instanceof { left: Box<Node>, right: Box<Node>, pos: Pos },
    In { left: Box<Node>, right: Box<Node>, pos: Pos },
    New { operand: Box<Node>, pos: Pos },
    Super { args: Vec<Node>, pos: Pos },
    Await { operand: Box<Node>, pos: Pos },
    DynamicImport { specifier: Box<Node>, is_async: bool, pos: Pos },
    Call { caller: Box<Node>, args: Vec<Node>, pos: Pos },
    Member { object: Box<Node>, property: Box<Node>, computed: bool, pos: Pos },
    Grouping { exprs: Vec<Node>, pos: Pos },
    Increment { operand: Box<Node>, op: IncrOp, prefix: bool, pos: Pos },
    Typeof { operand: Box<Node>, pos: Pos },
    Void { operand: Box<Node>, pos: Pos },
    RestSpread { operand: Box<Node>, pos: Pos },
    GlobalThis { pos: Pos },
    GlobalMember { property: String, pos: Pos },
    GlobalMemberAssign { property: String, right: Box<Node>, op: AssignOp, pos: Pos },
}

impl Node {
    /// Source position of any node.
    pub fn pos(&self) -> Pos {
        match self {
            Node::Number { pos, .. }
            | Node::Str { pos, .. }
            | Node::TemplateString { pos, .. }
            | Node::Ident { pos, .. }
            | Node::Array { pos, .. }
            | Node::Object { pos, .. }
            | Node::VarDecl { pos, .. }
            | Node::If { pos, .. }
            | Node::While { pos, .. }
            | Node::For { pos, .. }
            | Node::ForIter { pos, .. }
            | Node::Try { pos, .. }
            | Node::Throw { pos, .. }
            | Node::Delete { pos, .. }
            | Node::Block { pos, .. }
            | Node::Return { pos, .. }
            | Node::Break { pos }
            | Node::Continue { pos }
            | Node::Label { pos, .. }
            | Node::Import { pos, .. }
            | Node::Export { pos, .. }
            | Node::Switch { pos, .. }
            | Node::Assignment { pos, .. }
            | Node::Binary { pos, .. }
            | Node::Comparison { pos, .. }
            | Node::Logical { pos, .. }
            | Node::Ternary { pos, .. }
            | Node::Match { pos, .. }
            | Node::From { pos, .. }
            | Node::Instanceof { pos, .. }
            | Node::In { pos, .. }
            | Node::New { pos, .. }
            | Node::Super { pos, .. }
            | Node::Await { pos, .. }
            | Node::DynamicImport { pos, .. }
            | Node::Call { pos, .. }
            | Node::Member { pos, .. }
            | Node::Grouping { pos, .. }
            | Node::Increment { pos, .. }
            | Node::Typeof { pos, .. }
            | Node::Void { pos, .. }
            | Node::RestSpread { pos, .. }
            | Node::GlobalThis { pos }
            | Node::GlobalMember { pos, .. }
            | Node::GlobalMemberAssign { pos, .. } => *pos,
            Node::Function(decl) => decl.pos,
            Node::Class(decl) => decl.pos,
        }
    }
}
