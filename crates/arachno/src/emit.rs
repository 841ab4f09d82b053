//! AST-to-source emission.
//!
//! Prints a parsed program back to source text that re-parses to an
//! equivalent tree: sub-expressions are parenthesized freely (parse groups
//! them, which evaluates identically), declaration kinds map back to their
//! keywords, and statements are terminated explicitly. Used by round-trip
//! tests and available to hosts for dumping reflected programs.

use std::fmt::Write as _;

use crate::{
    ast::{DeclKind, FunctionDecl, LogicalOp, Node, Program, TemplatePart},
    value::fmt_number,
};

/// Renders a whole program, one statement per line.
pub fn program_source(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.body {
        emit_stmt(&mut out, stmt);
        out.push('\n');
    }
    out
}

fn decl_keyword(kind: DeclKind) -> &'static str {
    match kind {
        DeclKind::Mutable => "spawn",
        DeclKind::Constant => "immortal",
        DeclKind::Static => "static",
        DeclKind::Var => "var",
    }
}

fn emit_block(out: &mut String, body: &[Node]) {
    out.push_str("{ ");
    for stmt in body {
        emit_stmt(out, stmt);
        out.push(' ');
    }
    out.push('}');
}

fn emit_stmt(out: &mut String, node: &Node) {
    match node {
        Node::VarDecl { left, right, kind, .. } => {
            let _ = write!(out, "{} ", decl_keyword(*kind));
            emit_expr(out, left);
            if let Some(right) = right {
                out.push_str(" = ");
                emit_expr(out, right);
            }
            out.push(';');
        }
        Node::If { condition, body, else_body, .. } => {
            out.push_str("if (");
            emit_stmt_or_expr(out, condition);
            out.push_str(") ");
            emit_block(out, body);
            if !else_body.is_empty() {
                out.push_str(" else ");
                emit_block(out, else_body);
            }
        }
        Node::While { condition, body, do_while, .. } => {
            if *do_while {
                out.push_str("do ");
                emit_block(out, body);
                out.push_str(" while (");
                emit_expr(out, condition);
                out.push_str(");");
            } else {
                out.push_str("while (");
                emit_expr(out, condition);
                out.push_str(") ");
                emit_block(out, body);
            }
        }
        Node::For { before, condition, after, body, .. } => {
            out.push_str("for (");
            emit_expr(out, before);
            out.push_str("; ");
            emit_expr(out, condition);
            out.push_str("; ");
            emit_expr(out, after);
            out.push_str(") ");
            emit_block(out, body);
        }
        Node::ForIter { left, right, kind, op, body, .. } => {
            let _ = write!(out, "for ({} ", decl_keyword(*kind));
            emit_expr(out, left);
            let _ = write!(out, " {op} ");
            emit_expr(out, right);
            out.push_str(") ");
            emit_block(out, body);
        }
        Node::Try { body, catch, finally, catch_param, .. } => {
            out.push_str("try ");
            emit_block(out, body);
            if let Some(catch) = catch {
                out.push_str(" catch ");
                if let Some(param) = catch_param {
                    let _ = write!(out, "({param}) ");
                }
                emit_block(out, catch);
            }
            if !finally.is_empty() {
                out.push_str(" finally ");
                emit_block(out, finally);
            }
        }
        Node::Throw { value, .. } => {
            out.push_str("throw ");
            emit_expr(out, value);
            out.push(';');
        }
        Node::Delete { operand, .. } => {
            out.push_str("delete ");
            emit_expr(out, operand);
            out.push(';');
        }
        Node::Block { body, .. } => emit_block(out, body),
        Node::Return { value, .. } => {
            out.push_str("return");
            if let Some(value) = value {
                out.push(' ');
                emit_expr(out, value);
            }
            out.push(';');
        }
        Node::Break { .. } => out.push_str("break;"),
        Node::Continue { .. } => out.push_str("continue;"),
        Node::Label { name, .. } => {
            let _ = write!(out, "{name} :>");
        }
        Node::Import { path, namespace, names, from, .. } => {
            out.push_str("import ");
            if let Some(path) = path {
                let _ = write!(out, "\"{path}\"");
            } else if let Some(namespace) = namespace {
                out.push_str(namespace);
            } else if let Some(names) = names {
                emit_expr(out, names);
            }
            if let Some(from) = from {
                out.push(' ');
                emit_expr(out, from);
            }
            out.push(';');
        }
        Node::Export { export, .. } => {
            out.push_str("export ");
            emit_stmt(out, export);
        }
        Node::Switch { on, cases, default, .. } => {
            out.push_str("switch (");
            emit_expr(out, on);
            out.push_str(") { ");
            for case in cases {
                out.push_str("case ");
                emit_expr(out, &case.condition);
                out.push_str(": ");
                emit_block(out, &case.body);
                out.push(' ');
            }
            if !default.is_empty() {
                out.push_str("default: ");
                emit_block(out, default);
                out.push(' ');
            }
            out.push('}');
        }
        Node::Function(decl) => emit_function(out, decl, true),
        Node::Class(decl) => {
            let _ = write!(out, "class {}", decl.name);
            if let Some(extends) = &decl.extends {
                let _ = write!(out, " extends {extends}");
            }
            out.push_str(" { ");
            for field in &decl.fields {
                if field.is_private {
                    out.push_str("private ");
                }
                if field.is_default {
                    out.push_str("default ");
                }
                let _ = write!(out, "{} = ", field.name);
                emit_expr(out, &field.value);
                out.push_str("; ");
            }
            for method in &decl.methods {
                if method.is_private {
                    out.push_str("private ");
                }
                emit_function(out, &method.decl, true);
                out.push(' ');
            }
            if let Some(ctor) = &decl.ctor {
                out.push_str("constructor(");
                for (index, param) in ctor.params.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    if param.is_private {
                        out.push_str("private ");
                    }
                    if param.is_public {
                        out.push_str("public ");
                    }
                    emit_expr(out, &param.expr);
                }
                out.push_str(") ");
                emit_block(out, &ctor.body);
                out.push(' ');
            }
            out.push('}');
        }
        other => {
            emit_expr(out, other);
            out.push(';');
        }
    }
}

/// An `if` condition may be a declaration.
fn emit_stmt_or_expr(out: &mut String, node: &Node) {
    if let Node::VarDecl { left, right, kind, .. } = node {
        let _ = write!(out, "{} ", decl_keyword(*kind));
        emit_expr(out, left);
        if let Some(right) = right {
            out.push_str(" = ");
            emit_expr(out, right);
        }
    } else {
        emit_expr(out, node);
    }
}

fn emit_function(out: &mut String, decl: &FunctionDecl, keyword: bool) {
    if decl.is_arrow {
        out.push('(');
        emit_list(out, &decl.params);
        out.push_str(") => ");
        emit_block(out, &decl.body);
        return;
    }
    if decl.is_async {
        out.push_str("async ");
    }
    if keyword {
        out.push_str("function ");
    }
    match decl.name.as_deref() {
        Some(name) if decl.dynamic_name => {
            out.push('[');
            emit_expr(out, name);
            out.push(']');
        }
        Some(Node::Ident { name, .. }) => out.push_str(name),
        Some(other) => emit_expr(out, other),
        None => {}
    }
    out.push('(');
    emit_list(out, &decl.params);
    out.push_str(") ");
    emit_block(out, &decl.body);
}

fn emit_list(out: &mut String, nodes: &[Node]) {
    for (index, node) in nodes.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        emit_expr(out, node);
    }
}

fn emit_str_literal(out: &mut String, value: &str) {
    let quote = if value.contains('"') { '\'' } else { '"' };
    let _ = write!(out, "{quote}{value}{quote}");
}

fn emit_expr(out: &mut String, node: &Node) {
    match node {
        Node::Number { value, .. } => out.push_str(&fmt_number(*value)),
        Node::Str { value, .. } => emit_str_literal(out, value),
        Node::TemplateString { parts, .. } => {
            out.push('`');
            for part in parts {
                match part {
                    TemplatePart::Lit(lit) => out.push_str(lit),
                    TemplatePart::Expr(expr) => {
                        out.push_str("#{");
                        emit_expr(out, expr);
                        out.push('}');
                    }
                }
            }
            out.push('`');
        }
        Node::Ident { name, .. } => out.push_str(name),
        Node::Array { elements, .. } => {
            out.push('[');
            emit_list(out, elements);
            out.push(']');
        }
        Node::Object { properties, .. } => {
            out.push_str("{ ");
            for (index, prop) in properties.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                if prop.dynamic {
                    out.push('[');
                    emit_expr(out, &prop.key);
                    out.push(']');
                } else {
                    emit_expr(out, &prop.key);
                }
                match &prop.value {
                    Some(Node::Function(decl)) if !decl.is_arrow => {
                        // method shorthand: the key is the name
                        out.push('(');
                        emit_list(out, &decl.params);
                        out.push_str(") ");
                        emit_block(out, &decl.body);
                    }
                    Some(value) => {
                        out.push_str(": ");
                        emit_expr(out, value);
                    }
                    None => {}
                }
            }
            out.push_str(" }");
        }
        Node::Assignment { left, right, op, .. } => {
            emit_expr(out, left);
            let _ = write!(out, " {op} ");
            emit_expr(out, right);
        }
        Node::Binary { left, right, op, .. } => {
            out.push('(');
            emit_expr(out, left);
            let _ = write!(out, " {op} ");
            emit_expr(out, right);
            out.push(')');
        }
        Node::Comparison { left, right, op, .. } => {
            out.push('(');
            emit_expr(out, left);
            let _ = write!(out, " {op} ");
            emit_expr(out, right);
            out.push(')');
        }
        Node::Logical { left, right, op, .. } => {
            if *op == LogicalOp::Not {
                out.push_str("!(");
                emit_expr(out, left);
                out.push(')');
            } else {
                out.push('(');
                emit_expr(out, left);
                let _ = write!(out, " {op} ");
                if let Some(right) = right {
                    emit_expr(out, right);
                }
                out.push(')');
            }
        }
        Node::Ternary { condition, then, otherwise, .. } => {
            out.push('(');
            emit_expr(out, condition);
            out.push_str(") ? (");
            emit_expr(out, then);
            out.push_str(") : (");
            emit_expr(out, otherwise);
            out.push(')');
        }
        Node::Match { on, cases, .. } => {
            out.push_str("match ");
            emit_expr(out, on);
            out.push_str(" { ");
            for case in cases {
                emit_expr(out, &case.pattern);
                out.push_str(" => ");
                match &case.body {
                    Node::Block { body, .. } => emit_block(out, body),
                    other => emit_expr(out, other),
                }
                out.push_str(", ");
            }
            out.push('}');
        }
        Node::From { path, .. } => {
            out.push_str("from ");
            emit_str_literal(out, path);
        }
        Node::Instanceof { left, right, .. } => {
            emit_expr(out, left);
            out.push_str(" instanceof ");
            emit_expr(out, right);
        }
        Node::In { left, right, .. } => {
            emit_expr(out, left);
            out.push_str(" in ");
            emit_expr(out, right);
        }
        Node::New { operand, .. } => {
            out.push_str("new ");
            emit_expr(out, operand);
        }
        Node::Super { args, .. } => {
            out.push_str("super(");
            emit_list(out, args);
            out.push(')');
        }
        Node::Await { operand, .. } => {
            out.push_str("await ");
            emit_expr(out, operand);
        }
        Node::DynamicImport { specifier, .. } => {
            out.push_str("import(");
            emit_expr(out, specifier);
            out.push(')');
        }
        Node::Call { caller, args, .. } => {
            emit_expr(out, caller);
            out.push('(');
            emit_list(out, args);
            out.push(')');
        }
        Node::Member { object, property, computed, .. } => {
            emit_expr(out, object);
            if *computed {
                out.push('[');
                emit_expr(out, property);
                out.push(']');
            } else {
                out.push('.');
                emit_expr(out, property);
            }
        }
        Node::Grouping { exprs, .. } => {
            out.push('(');
            emit_list(out, exprs);
            out.push(')');
        }
        Node::Increment { operand, op, prefix, .. } => {
            if *prefix {
                let _ = write!(out, "{op}");
                emit_expr(out, operand);
            } else {
                emit_expr(out, operand);
                let _ = write!(out, "{op}");
            }
        }
        Node::Typeof { operand, .. } => {
            out.push_str("typeof ");
            emit_expr(out, operand);
        }
        Node::Void { operand, .. } => {
            out.push_str("void ");
            emit_expr(out, operand);
        }
        Node::RestSpread { operand, .. } => {
            out.push_str("...");
            emit_expr(out, operand);
        }
        Node::GlobalThis { .. } => out.push_str("globalThis"),
        Node::GlobalMember { property, .. } => {
            let _ = write!(out, "globalThis.{property}");
        }
        Node::GlobalMemberAssign { property, right, op, .. } => {
            let _ = write!(out, "globalThis.{property} {op} ");
            emit_expr(out, right);
        }
        Node::Function(decl) => emit_function(out, decl, true),
        other => emit_stmt(out, other),
    }
}
