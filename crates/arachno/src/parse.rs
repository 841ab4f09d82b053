//! Hand-rolled recursive-descent parser.
//!
//! Each production is a method consuming zero or more tokens and returning a
//! node. Error strategy: the first syntactic error terminates the parse with
//! a positioned diagnostic with no recovery. `expect` consumes or errors, `eat`
//! consumes unconditionally.

use std::str::FromStr;

use crate::{
    ast::{
        AssignOp, BinaryOp, ClassDecl, ClassField, ClassMethod, ComparisonOp, Constructor, CtorParam, DeclKind,
        FunctionDecl, IncrOp, IterOp, LogicalOp, MatchArm, Node, ObjectProp, Pos, Program, SwitchCase, TemplatePart,
    },
    exception::{ErrorKind, LangError},
    lex::{Keyword, Token, TokenKind, tokenize},
};

/// How a function declaration is introduced, which controls whether the
/// leading keyword and the name are required.
#[derive(Clone, Copy, PartialEq, Eq)]
enum FnContext {
    /// `function name(...) {...}` statement: name required.
    Statement,
    /// Function expression: name optional, anonymous otherwise.
    Expression,
    /// Class method: name may be a computed `[expr]` key.
    Method,
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    index: usize,
    source_path: String,
    script_type: String,
}

impl Parser {
    pub(crate) fn new(source: &str, path: &str, script_type: &str) -> Result<Self, LangError> {
        let tokens = tokenize(source, path)?;
        Ok(Self {
            tokens,
            index: 0,
            source_path: path.to_owned(),
            script_type: script_type.to_owned(),
        })
    }

    pub(crate) fn from_file(path: &str, script_type: &str) -> Result<Self, LangError> {
        let source = std::fs::read_to_string(path).map_err(|err| {
            LangError::new(
                ErrorKind::SyntaxError,
                format!("could not read source file {path}: {err}"),
                Pos::default(),
                path,
            )
        })?;
        Self::new(&source, path, script_type)
    }

    pub(crate) fn parse(mut self, main: bool) -> Result<Program, LangError> {
        let mut body = Vec::new();
        while self.not_eof() {
            body.push(self.parse_stmt()?);
        }
        Ok(Program {
            body,
            source_path: self.source_path,
            script_type: self.script_type,
            main,
        })
    }

    /// Parses a single expression followed by end of input. Used for template
    /// interpolations and the REPL expression path.
    pub(crate) fn parse_expression(mut self) -> Result<Node, LangError> {
        let node = self.parse_nested_expr()?;
        if self.not_eof() {
            return Err(self.unexpected_token_err(&self.at(0).clone()));
        }
        Ok(node)
    }

    // ---- token plumbing ----

    fn at(&self, offset: usize) -> &Token {
        let index = (self.index + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn kind_at(&self, offset: usize) -> TokenKind {
        self.at(offset).kind
    }

    fn eat(&mut self) -> Token {
        let token = self.at(0).clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, LangError> {
        let token = self.at(0).clone();
        if token.kind != kind {
            return Err(self.syntax_err(
                format!("expected a token of type {kind}, but got {}", token.kind),
                token.pos(),
            ));
        }
        Ok(self.eat())
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token, LangError> {
        self.expect(TokenKind::Keyword(keyword))
    }

    fn is_at(&self, kind: TokenKind) -> bool {
        self.kind_at(0) == kind
    }

    fn is_at_keyword(&self, keyword: Keyword) -> bool {
        self.kind_at(0) == TokenKind::Keyword(keyword)
    }

    fn not_eof(&self) -> bool {
        self.kind_at(0) != TokenKind::Eof
    }

    fn eat_semicolon(&mut self) -> bool {
        if self.is_at(TokenKind::SemiColon) {
            self.eat();
            return true;
        }
        false
    }

    fn eat_comma(&mut self) -> bool {
        if self.is_at(TokenKind::Comma) {
            self.eat();
            return true;
        }
        false
    }

    fn syntax_err(&self, message: impl Into<String>, pos: Pos) -> LangError {
        LangError::new(ErrorKind::SyntaxError, message, pos, &self.source_path)
    }

    fn unexpected_token_err(&self, token: &Token) -> LangError {
        let what = if token.kind == TokenKind::Eof {
            " <eof>".to_owned()
        } else {
            format!(" {}", token.src)
        };
        self.syntax_err(format!("unexpected token reached:{what}"), token.pos())
    }

    fn decl_kind_at(&self, offset: usize) -> Option<DeclKind> {
        match self.kind_at(offset) {
            TokenKind::Keyword(Keyword::Spawn) => Some(DeclKind::Mutable),
            TokenKind::Keyword(Keyword::Immortal) => Some(DeclKind::Constant),
            TokenKind::Keyword(Keyword::Static) => Some(DeclKind::Static),
            TokenKind::Keyword(Keyword::Var) => Some(DeclKind::Var),
            _ => None,
        }
    }

    // ---- statements ----

    fn parse_stmt(&mut self) -> Result<Node, LangError> {
        match self.kind_at(0) {
            TokenKind::Keyword(Keyword::If) => self.parse_if_stmt(),
            TokenKind::Keyword(Keyword::While) | TokenKind::Keyword(Keyword::Do) => self.parse_while_loop(),
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw_stmt(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try_stmt(),
            TokenKind::OpenBrace => self.parse_block_stmt(),
            TokenKind::Keyword(Keyword::Delete) => self.parse_delete_stmt(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_loop(),
            TokenKind::Keyword(Keyword::Function) | TokenKind::Keyword(Keyword::Async) => {
                Ok(Node::Function(self.parse_function_decl(FnContext::Statement)?))
            }
            TokenKind::Keyword(Keyword::Return) => self.parse_return_stmt(),
            TokenKind::Keyword(Keyword::Break) => {
                let pos = self.eat().pos();
                self.eat_semicolon();
                Ok(Node::Break { pos })
            }
            TokenKind::Keyword(Keyword::Continue) => {
                let pos = self.eat().pos();
                self.eat_semicolon();
                Ok(Node::Continue { pos })
            }
            TokenKind::Label => self.parse_label(),
            TokenKind::Keyword(Keyword::Class) => Ok(Node::Class(self.parse_class_decl(false)?)),
            TokenKind::Keyword(Keyword::Import) => self.parse_import_stmt(),
            TokenKind::Keyword(Keyword::Export) => self.parse_export_stmt(),
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch_stmt(),
            _ if self.decl_kind_at(0).is_some() => self.parse_var_decl(),
            _ => self.parse_expr(),
        }
    }

    fn parse_label(&mut self) -> Result<Node, LangError> {
        let token = self.expect(TokenKind::Label)?;
        let name = token.src.replace(' ', "").replacen(":>", "", 1);
        Ok(Node::Label { name, pos: token.pos() })
    }

    fn parse_var_decl(&mut self) -> Result<Node, LangError> {
        let kind = self.decl_kind_at(0).unwrap_or(DeclKind::Mutable);
        let keyword = self.eat();
        let left = self.parse_decl_pattern()?;
        match left {
            Node::Ident { .. } | Node::Array { .. } | Node::Object { .. } => {}
            ref other => {
                return Err(self.syntax_err("invalid left hand side in variable declaration", other.pos()));
            }
        }
        let right = if self.is_at(TokenKind::AssignmentOp) && self.at(0).src == "=" {
            self.eat();
            let value = self.parse_global_this_or_expr()?;
            Some(Box::new(value))
        } else {
            None
        };
        self.eat_semicolon();
        Ok(Node::VarDecl {
            left: Box::new(left),
            right,
            kind,
            pos: keyword.pos(),
        })
    }

    fn parse_decl_pattern(&mut self) -> Result<Node, LangError> {
        if self.is_at(TokenKind::OpenBrace) {
            self.parse_object_destructuring()
        } else {
            self.parse_array()
        }
    }

    fn parse_global_this_or_expr(&mut self) -> Result<Node, LangError> {
        if self.is_at_keyword(Keyword::GlobalThis) && self.kind_at(1) != TokenKind::Dot {
            let token = self.eat();
            return Ok(Node::GlobalThis { pos: token.pos() });
        }
        self.parse_top_expr()
    }

    fn parse_if_stmt(&mut self) -> Result<Node, LangError> {
        let pos = self.expect_keyword(Keyword::If)?.pos();
        self.expect(TokenKind::OpenParen)?;
        let condition = if self.decl_kind_at(0).is_some() {
            self.parse_var_decl()?
        } else {
            self.parse_nested_expr()?
        };
        self.expect(TokenKind::CloseParen)?;
        let body = self.parse_block()?;
        let mut else_body = Vec::new();
        if self.is_at_keyword(Keyword::Else) {
            self.eat();
            if self.is_at(TokenKind::OpenBrace) {
                else_body = self.parse_block()?;
            } else {
                else_body.push(self.parse_stmt()?);
            }
        }
        Ok(Node::If {
            condition: Box::new(condition),
            body,
            else_body,
            pos,
        })
    }

    fn parse_while_loop(&mut self) -> Result<Node, LangError> {
        if self.is_at_keyword(Keyword::Do) {
            let pos = self.eat().pos();
            let body = self.parse_block()?;
            self.expect_keyword(Keyword::While)?;
            self.expect(TokenKind::OpenParen)?;
            let condition = self.parse_nested_expr()?;
            self.expect(TokenKind::CloseParen)?;
            self.eat_semicolon();
            return Ok(Node::While {
                condition: Box::new(condition),
                body,
                do_while: true,
                pos,
            });
        }
        let pos = self.expect_keyword(Keyword::While)?.pos();
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_nested_expr()?;
        self.expect(TokenKind::CloseParen)?;
        let body = self.parse_block()?;
        Ok(Node::While {
            condition: Box::new(condition),
            body,
            do_while: false,
            pos,
        })
    }

    fn parse_for_loop(&mut self) -> Result<Node, LangError> {
        let pos = self.expect_keyword(Keyword::For)?.pos();
        self.expect(TokenKind::OpenParen)?;
        if self.decl_kind_at(0).is_some() {
            self.parse_for_iterator_loop(pos)
        } else {
            self.parse_traditional_for_loop(pos)
        }
    }

    fn parse_traditional_for_loop(&mut self, pos: Pos) -> Result<Node, LangError> {
        let before = self.parse_nested_expr()?;
        self.expect(TokenKind::SemiColon)?;
        let condition = self.parse_nested_expr()?;
        self.expect(TokenKind::SemiColon)?;
        let after = self.parse_nested_expr()?;
        self.expect(TokenKind::CloseParen)?;
        let body = self.parse_block()?;
        Ok(Node::For {
            before: Box::new(before),
            condition: Box::new(condition),
            after: Box::new(after),
            body,
            pos,
        })
    }

    fn parse_for_iterator_loop(&mut self, pos: Pos) -> Result<Node, LangError> {
        let kind = self.decl_kind_at(0).unwrap_or(DeclKind::Mutable);
        self.eat();
        let left = if self.is_at(TokenKind::OpenBrace) {
            self.parse_object_destructuring()?
        } else if self.is_at(TokenKind::OpenBracket) {
            self.parse_array()?
        } else {
            let token = self.expect(TokenKind::Identifier)?;
            Node::Ident {
                name: token.src.clone(),
                pos: token.pos(),
            }
        };
        let op = if self.is_at_keyword(Keyword::Of) {
            IterOp::Of
        } else if self.is_at_keyword(Keyword::In) {
            IterOp::In
        } else {
            let token = self.at(0).clone();
            return Err(self.unexpected_token_err(&token));
        };
        self.eat();
        let right = self.parse_nested_expr()?;
        self.expect(TokenKind::CloseParen)?;
        let body = self.parse_block()?;
        Ok(Node::ForIter {
            left: Box::new(left),
            right: Box::new(right),
            kind,
            op,
            body,
            pos,
        })
    }

    fn parse_throw_stmt(&mut self) -> Result<Node, LangError> {
        let pos = self.expect_keyword(Keyword::Throw)?.pos();
        let value = self.parse_expr()?;
        Ok(Node::Throw {
            value: Box::new(value),
            pos,
        })
    }

    fn parse_try_stmt(&mut self) -> Result<Node, LangError> {
        let pos = self.expect_keyword(Keyword::Try)?.pos();
        let body = self.parse_block()?;
        if !self.is_at_keyword(Keyword::Catch) && !self.is_at_keyword(Keyword::Finally) {
            self.expect_keyword(Keyword::Catch)?;
        }
        let mut catch = None;
        let mut catch_param = None;
        if self.is_at_keyword(Keyword::Catch) {
            self.eat();
            if self.is_at(TokenKind::OpenParen) {
                self.eat();
                let param = self.expect(TokenKind::Identifier)?;
                catch_param = Some(param.src);
                self.expect(TokenKind::CloseParen)?;
            }
            catch = Some(self.parse_block()?);
        }
        let mut finally = Vec::new();
        if self.is_at_keyword(Keyword::Finally) {
            self.eat();
            finally = self.parse_block()?;
        }
        Ok(Node::Try {
            body,
            catch,
            finally,
            catch_param,
            pos,
        })
    }

    fn parse_block_stmt(&mut self) -> Result<Node, LangError> {
        let pos = self.at(0).pos();
        let body = self.parse_block()?;
        self.eat_semicolon();
        Ok(Node::Block { body, pos })
    }

    fn parse_block(&mut self) -> Result<Vec<Node>, LangError> {
        self.expect(TokenKind::OpenBrace)?;
        let mut body = Vec::new();
        while self.not_eof() && !self.is_at(TokenKind::CloseBrace) {
            body.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(body)
    }

    fn parse_delete_stmt(&mut self) -> Result<Node, LangError> {
        let pos = self.expect_keyword(Keyword::Delete)?.pos();
        let operand = self.parse_expr()?;
        match operand {
            Node::Ident { .. } | Node::Member { .. } => {}
            ref other => {
                return Err(self.syntax_err(
                    "the operand of the \"delete\" keyword must be a variable or property access",
                    other.pos(),
                ));
            }
        }
        Ok(Node::Delete {
            operand: Box::new(operand),
            pos,
        })
    }

    fn parse_return_stmt(&mut self) -> Result<Node, LangError> {
        let pos = self.expect_keyword(Keyword::Return)?.pos();
        let value = if self.is_at(TokenKind::CloseBrace) || self.eat_semicolon() {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        Ok(Node::Return { value, pos })
    }

    fn parse_import_stmt(&mut self) -> Result<Node, LangError> {
        let pos = self.expect_keyword(Keyword::Import)?.pos();
        let mut path = None;
        let mut namespace = None;
        let mut names = None;
        let mut from = None;
        if self.is_at(TokenKind::Str) {
            path = Some(self.eat().src);
        } else if self.is_at(TokenKind::Identifier) {
            namespace = Some(self.eat().src);
            if !self.is_at_keyword(Keyword::From) {
                let token = self.at(0).clone();
                return Err(self.unexpected_token_err(&token));
            }
            from = Some(Box::new(self.parse_from_expr()?));
        } else if self.is_at(TokenKind::OpenBrace) {
            names = Some(Box::new(self.parse_object_destructuring()?));
            if !self.is_at_keyword(Keyword::From) {
                let token = self.at(0).clone();
                return Err(self.unexpected_token_err(&token));
            }
            from = Some(Box::new(self.parse_from_expr()?));
        } else {
            let token = self.at(0).clone();
            return Err(self.unexpected_token_err(&token));
        }
        self.eat_semicolon();
        Ok(Node::Import {
            path,
            namespace,
            names,
            from,
            pos,
        })
    }

    fn parse_export_stmt(&mut self) -> Result<Node, LangError> {
        let pos = self.expect_keyword(Keyword::Export)?.pos();
        let export = if self.decl_kind_at(0).is_some() {
            self.parse_var_decl()?
        } else if matches!(
            self.kind_at(0),
            TokenKind::Keyword(Keyword::Function) | TokenKind::Keyword(Keyword::Async)
        ) {
            Node::Function(self.parse_function_decl(FnContext::Statement)?)
        } else if self.is_at(TokenKind::OpenBrace) {
            self.parse_object()?
        } else if self.is_at_keyword(Keyword::Class) {
            Node::Class(self.parse_class_decl(false)?)
        } else {
            let token = self.at(0).clone();
            return Err(self.unexpected_token_err(&token));
        };
        Ok(Node::Export {
            export: Box::new(export),
            pos,
        })
    }

    fn parse_switch_stmt(&mut self) -> Result<Node, LangError> {
        let pos = self.expect_keyword(Keyword::Switch)?.pos();
        let on = self.parse_nested_expr()?;
        self.expect(TokenKind::OpenBrace)?;
        let mut cases = Vec::new();
        let mut default = Vec::new();
        while self.not_eof() && !self.is_at(TokenKind::CloseBrace) {
            if self.is_at_keyword(Keyword::Case) {
                self.eat();
                let condition = self.parse_top_expr()?;
                self.expect(TokenKind::Colon)?;
                let body = self.parse_block()?;
                cases.push(SwitchCase { condition, body });
            } else if self.is_at_keyword(Keyword::Default) {
                self.eat();
                self.expect(TokenKind::Colon)?;
                default = self.parse_block()?;
            } else {
                let token = self.at(0).clone();
                return Err(self.unexpected_token_err(&token));
            }
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(Node::Switch {
            on: Box::new(on),
            cases,
            default,
            pos,
        })
    }

    // ---- classes ----

    fn parse_class_decl(&mut self, expr: bool) -> Result<ClassDecl, LangError> {
        let pos = self.expect_keyword(Keyword::Class)?.pos();
        let mut anonymous = false;
        let name = if !expr {
            self.expect(TokenKind::Identifier)?.src
        } else if self.is_at(TokenKind::Identifier) {
            self.eat().src
        } else {
            anonymous = true;
            String::new()
        };
        let extends = if self.is_at_keyword(Keyword::Extends) {
            self.eat();
            Some(self.expect(TokenKind::Identifier)?.src)
        } else {
            None
        };
        self.expect(TokenKind::OpenBrace)?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut ctor = None;
        while self.not_eof() && !self.is_at(TokenKind::CloseBrace) {
            if let Some(field) = self.try_parse_class_field()? {
                fields.push(field);
            } else if let Some(method) = self.try_parse_class_method()? {
                methods.push(method);
            } else if self.is_at_keyword(Keyword::Constructor) {
                if ctor.is_some() {
                    let token = self.at(0).clone();
                    return Err(self.syntax_err(
                        "having multiple constructor implementations in one class is not allowed",
                        token.pos(),
                    ));
                }
                ctor = Some(self.parse_class_ctor()?);
            } else {
                let token = self.at(0).clone();
                return Err(self.unexpected_token_err(&token));
            }
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(ClassDecl {
            name,
            anonymous,
            extends,
            fields,
            methods,
            ctor,
            pos,
        })
    }

    /// Class item lookahead: `[private|public] [default] name = expr ;`
    fn try_parse_class_field(&mut self) -> Result<Option<ClassField>, LangError> {
        let mut offset = 0;
        let mut is_private = false;
        if matches!(
            self.kind_at(offset),
            TokenKind::Keyword(Keyword::Private) | TokenKind::Keyword(Keyword::Public)
        ) {
            is_private = self.kind_at(offset) == TokenKind::Keyword(Keyword::Private);
            offset += 1;
        }
        let mut is_default = false;
        if self.kind_at(offset) == TokenKind::Keyword(Keyword::Default) {
            is_default = true;
            offset += 1;
        }
        let mut name = String::new();
        if self.kind_at(offset) == TokenKind::Identifier {
            name = self.at(offset).src.clone();
            offset += 1;
        }
        if !(self.kind_at(offset) == TokenKind::AssignmentOp && self.at(offset).src == "=") {
            return Ok(None);
        }
        if name.is_empty() {
            let token = self.at(offset).clone();
            return Err(self.unexpected_token_err(&token));
        }
        let pos = self.at(0).pos();
        for _ in 0..=offset {
            self.eat();
        }
        let value = self.parse_top_expr()?;
        self.eat_semicolon();
        Ok(Some(ClassField {
            is_private,
            is_default,
            is_static: false,
            name,
            value,
            pos,
        }))
    }

    /// Class item lookahead: `[private|public] function name(...) {...}`
    fn try_parse_class_method(&mut self) -> Result<Option<ClassMethod>, LangError> {
        let mut offset = 0;
        let mut is_private = false;
        if matches!(
            self.kind_at(offset),
            TokenKind::Keyword(Keyword::Private) | TokenKind::Keyword(Keyword::Public)
        ) {
            is_private = self.kind_at(offset) == TokenKind::Keyword(Keyword::Private);
            offset += 1;
        }
        if self.kind_at(offset) != TokenKind::Keyword(Keyword::Function) {
            return Ok(None);
        }
        let pos = self.at(0).pos();
        for _ in 0..offset {
            self.eat();
        }
        let decl = self.parse_function_decl(FnContext::Method)?;
        Ok(Some(ClassMethod {
            is_private,
            is_static: false,
            decl,
            pos,
        }))
    }

    fn parse_class_ctor(&mut self) -> Result<Constructor, LangError> {
        let pos = self.expect_keyword(Keyword::Constructor)?.pos();
        self.expect(TokenKind::OpenParen)?;
        let mut params = Vec::new();
        while self.not_eof() && !self.is_at(TokenKind::CloseParen) {
            let kind = self.kind_at(0);
            let is_private = kind == TokenKind::Keyword(Keyword::Private);
            let is_public = kind == TokenKind::Keyword(Keyword::Public);
            if is_private || is_public {
                self.eat();
            }
            let expr = self.parse_arg(true)?;
            let param_pos = expr.pos();
            params.push(CtorParam {
                is_private,
                is_public,
                expr,
                pos: param_pos,
            });
            if !self.is_at(TokenKind::CloseParen) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::CloseParen)?;
        let body = self.parse_block()?;
        Ok(Constructor { params, body, pos })
    }

    // ---- functions ----

    fn parse_function_decl(&mut self, context: FnContext) -> Result<FunctionDecl, LangError> {
        let pos = self.at(0).pos();
        let mut is_async = false;
        if self.is_at_keyword(Keyword::Async) {
            is_async = true;
            self.eat();
        }
        self.expect_keyword(Keyword::Function)?;
        let mut name = None;
        let mut dynamic_name = false;
        let mut is_anonymous = false;
        match context {
            FnContext::Method => {
                if self.is_at(TokenKind::OpenBracket) {
                    self.eat();
                    name = Some(Box::new(self.parse_top_expr()?));
                    dynamic_name = true;
                    self.expect(TokenKind::CloseBracket)?;
                } else {
                    let token = self.expect(TokenKind::Identifier)?;
                    name = Some(Box::new(Node::Ident {
                        name: token.src.clone(),
                        pos: token.pos(),
                    }));
                }
            }
            FnContext::Statement => {
                let token = self.expect(TokenKind::Identifier)?;
                name = Some(Box::new(Node::Ident {
                    name: token.src.clone(),
                    pos: token.pos(),
                }));
            }
            FnContext::Expression => {
                if self.is_at(TokenKind::Identifier) {
                    let token = self.eat();
                    name = Some(Box::new(Node::Ident {
                        name: token.src.clone(),
                        pos: token.pos(),
                    }));
                } else {
                    is_anonymous = true;
                }
            }
        }
        let params = self.parse_args(true)?;
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            dynamic_name,
            is_async,
            is_anonymous,
            is_arrow: false,
            params,
            body,
            pos,
        })
    }

    fn parse_args(&mut self, params: bool) -> Result<Vec<Node>, LangError> {
        self.expect(TokenKind::OpenParen)?;
        let mut exprs = Vec::new();
        while self.not_eof() && !self.is_at(TokenKind::CloseParen) {
            self.eat_comma();
            exprs.push(self.parse_arg(params)?);
        }
        self.expect(TokenKind::CloseParen)?;
        Ok(exprs)
    }

    fn parse_arg(&mut self, params: bool) -> Result<Node, LangError> {
        let expr = self.parse_rest_or_spread()?;
        if params {
            match expr {
                Node::Ident { .. }
                | Node::Assignment { .. }
                | Node::RestSpread { .. }
                | Node::Object { .. }
                | Node::Array { .. } => {}
                ref other => {
                    return Err(
                        self.syntax_err("invalid parameter expression, identifier expected", other.pos())
                    );
                }
            }
        }
        Ok(expr)
    }

    fn parse_rest_or_spread(&mut self) -> Result<Node, LangError> {
        if !self.is_at(TokenKind::Ellipsis) {
            return self.parse_nested_expr();
        }
        let pos = self.eat().pos();
        let operand = self.parse_nested_expr()?;
        Ok(Node::RestSpread {
            operand: Box::new(operand),
            pos,
        })
    }

    // ---- expressions, loosest to tightest ----

    fn parse_expr(&mut self) -> Result<Node, LangError> {
        let expr = self.parse_assignment_expr()?;
        self.eat_semicolon();
        Ok(expr)
    }

    fn parse_nested_expr(&mut self) -> Result<Node, LangError> {
        self.parse_assignment_expr()
    }

    fn parse_assignment_expr(&mut self) -> Result<Node, LangError> {
        let left = self.parse_top_expr()?;
        if !self.is_at(TokenKind::AssignmentOp) {
            return Ok(left);
        }
        let pos = left.pos();
        let token = self.eat();
        let op = AssignOp::from_str(&token.src)
            .map_err(|_| self.syntax_err(format!("unknown assignment operator {}", token.src), token.pos()))?;
        let right = self.parse_nested_expr()?;
        Ok(Node::Assignment {
            left: Box::new(left),
            right: Box::new(right),
            op,
            pos,
        })
    }

    fn parse_top_expr(&mut self) -> Result<Node, LangError> {
        self.parse_ternary_expr()
    }

    fn parse_ternary_expr(&mut self) -> Result<Node, LangError> {
        let condition = self.parse_match_expr()?;
        if !self.is_at(TokenKind::Question) {
            return Ok(condition);
        }
        self.eat();
        let then = self.parse_match_expr()?;
        self.expect(TokenKind::Colon)?;
        let otherwise = self.parse_match_expr()?;
        let pos = condition.pos();
        Ok(Node::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
            pos,
        })
    }

    fn parse_match_expr(&mut self) -> Result<Node, LangError> {
        if !self.is_at_keyword(Keyword::Match) {
            return self.parse_from_expr();
        }
        let pos = self.eat().pos();
        let on = self.parse_top_expr()?;
        self.expect(TokenKind::OpenBrace)?;
        let mut cases = Vec::new();
        while self.not_eof() && !self.is_at(TokenKind::CloseBrace) {
            let pattern = self.parse_nested_expr()?;
            self.expect(TokenKind::Arrow)?;
            let body = if self.is_at(TokenKind::OpenBrace) {
                self.parse_block_stmt()?
            } else {
                self.parse_nested_expr()?
            };
            cases.push(MatchArm { pattern, body });
            self.eat_comma();
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(Node::Match {
            on: Box::new(on),
            cases,
            pos,
        })
    }

    fn parse_from_expr(&mut self) -> Result<Node, LangError> {
        if !self.is_at_keyword(Keyword::From) {
            return self.parse_logical_expr();
        }
        let pos = self.eat().pos();
        let path = self.expect(TokenKind::Str)?.src;
        Ok(Node::From { path, pos })
    }

    fn parse_logical_expr(&mut self) -> Result<Node, LangError> {
        if self.is_at(TokenKind::LogicalOp) && self.at(0).src == "!" {
            let pos = self.eat().pos();
            let left = self.parse_instanceof_expr()?;
            return Ok(Node::Logical {
                left: Box::new(left),
                right: None,
                op: LogicalOp::Not,
                pos,
            });
        }
        let left = self.parse_instanceof_expr()?;
        if !self.is_at(TokenKind::LogicalOp) {
            return Ok(left);
        }
        let token = self.eat();
        let op = LogicalOp::from_str(&token.src)
            .map_err(|_| self.syntax_err(format!("unknown logical operator {}", token.src), token.pos()))?;
        let right = self.parse_logical_expr()?;
        let pos = left.pos();
        Ok(Node::Logical {
            left: Box::new(left),
            right: Some(Box::new(right)),
            op,
            pos,
        })
    }

    fn parse_instanceof_expr(&mut self) -> Result<Node, LangError> {
        let left = self.parse_super_expr()?;
        if !self.is_at_keyword(Keyword::Instanceof) {
            return Ok(left);
        }
        self.eat();
        let right = self.parse_super_expr()?;
        let pos = left.pos();
        Ok(Node::Instanceof {
            left: Box::new(left),
            right: Box::new(right),
            pos,
        })
    }

    fn parse_super_expr(&mut self) -> Result<Node, LangError> {
        if !self.is_at_keyword(Keyword::Super) {
            return self.parse_await_expr();
        }
        let pos = self.eat().pos();
        let args = self.parse_args(false)?;
        Ok(Node::Super { args, pos })
    }

    fn parse_await_expr(&mut self) -> Result<Node, LangError> {
        if !self.is_at_keyword(Keyword::Await) {
            return self.parse_import_expr();
        }
        let pos = self.eat().pos();
        let operand = self.parse_import_expr()?;
        Ok(Node::Await {
            operand: Box::new(operand),
            pos,
        })
    }

    fn parse_import_expr(&mut self) -> Result<Node, LangError> {
        if !self.is_at_keyword(Keyword::Import) {
            return self.parse_new_expr();
        }
        let pos = self.eat().pos();
        self.expect(TokenKind::OpenParen)?;
        let specifier = self.parse_nested_expr()?;
        self.expect(TokenKind::CloseParen)?;
        Ok(Node::DynamicImport {
            specifier: Box::new(specifier),
            is_async: true,
            pos,
        })
    }

    fn parse_new_expr(&mut self) -> Result<Node, LangError> {
        if !self.is_at_keyword(Keyword::New) {
            return self.parse_class_expr();
        }
        let pos = self.eat().pos();
        let operand = self.parse_class_expr()?;
        Ok(Node::New {
            operand: Box::new(operand),
            pos,
        })
    }

    fn parse_class_expr(&mut self) -> Result<Node, LangError> {
        if self.is_at_keyword(Keyword::Class) {
            return Ok(Node::Class(self.parse_class_decl(true)?));
        }
        self.parse_fn_expr()
    }

    fn parse_fn_expr(&mut self) -> Result<Node, LangError> {
        if self.is_at_keyword(Keyword::Function) {
            return Ok(Node::Function(self.parse_function_decl(FnContext::Expression)?));
        }
        self.parse_in_expr()
    }

    fn parse_in_expr(&mut self) -> Result<Node, LangError> {
        let left = self.parse_comparison_expr()?;
        if !self.is_at_keyword(Keyword::In) {
            return Ok(left);
        }
        self.eat();
        let right = self.parse_comparison_expr()?;
        let pos = left.pos();
        Ok(Node::In {
            left: Box::new(left),
            right: Box::new(right),
            pos,
        })
    }

    fn parse_comparison_expr(&mut self) -> Result<Node, LangError> {
        let left = self.parse_additive_expr()?;
        if !self.is_at(TokenKind::ComparisonOp) {
            return Ok(left);
        }
        let token = self.eat();
        let op = ComparisonOp::from_str(&token.src)
            .map_err(|_| self.syntax_err(format!("unknown comparison operator {}", token.src), token.pos()))?;
        let right = self.parse_comparison_expr()?;
        let pos = left.pos();
        Ok(Node::Comparison {
            left: Box::new(left),
            right: Box::new(right),
            op,
            pos,
        })
    }

    fn parse_additive_expr(&mut self) -> Result<Node, LangError> {
        let mut left = self.parse_multiplicative_expr()?;
        while self.is_at(TokenKind::BinaryOp) && matches!(self.at(0).src.as_str(), "+" | "-") {
            let token = self.eat();
            let op = if token.src == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            let right = self.parse_multiplicative_expr()?;
            let pos = left.pos();
            left = Node::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op,
                pos,
            };
            if self.eat_semicolon() {
                return Ok(left);
            }
        }
        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Node, LangError> {
        let mut left = self.parse_member_expr()?;
        while self.is_at(TokenKind::BinaryOp) && matches!(self.at(0).src.as_str(), "*" | "/" | "%" | "**") {
            let token = self.eat();
            let op = BinaryOp::from_str(&token.src)
                .map_err(|_| self.syntax_err(format!("unknown binary operator {}", token.src), token.pos()))?;
            let right = self.parse_member_expr()?;
            let pos = left.pos();
            left = Node::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op,
                pos,
            };
            if self.eat_semicolon() {
                return Ok(left);
            }
        }
        Ok(left)
    }

    /// Member access composes left-associatively; `a.b.c(x).d` yields a call
    /// whose caller is a member expression whose object is another call. The
    /// short method-call form `.name(args)` folds the parsed call into a call
    /// on a member expression.
    fn parse_member_expr(&mut self) -> Result<Node, LangError> {
        let mut object = self.parse_call_expr()?;
        while self.not_eof() && matches!(self.kind_at(0), TokenKind::Dot | TokenKind::OpenBracket) {
            let opener = self.eat();
            let computed = opener.kind == TokenKind::OpenBracket;
            let property = if computed {
                self.parse_nested_expr()?
            } else {
                self.parse_call_expr()?
            };
            let pos = object.pos();
            match property {
                Node::Ident { .. } => {
                    object = Node::Member {
                        object: Box::new(object),
                        property: Box::new(property),
                        computed,
                        pos,
                    };
                }
                Node::Call { caller, args, pos: call_pos } if !computed => {
                    object = Node::Call {
                        caller: Box::new(Node::Member {
                            object: Box::new(object),
                            property: caller,
                            computed,
                            pos,
                        }),
                        args,
                        pos: call_pos,
                    };
                }
                other if computed => {
                    object = Node::Member {
                        object: Box::new(object),
                        property: Box::new(other),
                        computed,
                        pos,
                    };
                }
                other => {
                    return Err(self.syntax_err("invalid property access, identifier expected", other.pos()));
                }
            }
            if computed {
                self.expect(TokenKind::CloseBracket)?;
            }
        }
        if matches!(object, Node::Member { .. })
            && matches!(self.kind_at(0), TokenKind::IncrementOp | TokenKind::DecrementOp)
        {
            let token = self.eat();
            let op = if token.kind == TokenKind::IncrementOp {
                IncrOp::Inc
            } else {
                IncrOp::Dec
            };
            let pos = object.pos();
            object = Node::Increment {
                operand: Box::new(object),
                op,
                prefix: false,
                pos,
            };
        }
        Ok(object)
    }

    fn parse_call_expr(&mut self) -> Result<Node, LangError> {
        let caller = self.parse_object()?;
        if self.is_at(TokenKind::OpenParen) {
            let pos = caller.pos();
            let args = self.parse_args(false)?;
            return Ok(Node::Call {
                caller: Box::new(caller),
                args,
                pos,
            });
        }
        Ok(caller)
    }

    // ---- literals ----

    fn parse_object(&mut self) -> Result<Node, LangError> {
        if !self.is_at(TokenKind::OpenBrace) {
            return self.parse_array();
        }
        let pos = self.eat().pos();
        let mut properties = Vec::new();
        while self.not_eof() && !self.is_at(TokenKind::CloseBrace) {
            let (key, dynamic) = self.parse_object_key()?;
            let value = if self.is_at(TokenKind::OpenParen) {
                // method shorthand: `name(params) { ... }`
                let fn_pos = key.pos();
                let params = self.parse_args(true)?;
                let body = self.parse_block()?;
                Some(Node::Function(FunctionDecl {
                    name: Some(Box::new(key.clone())),
                    dynamic_name: dynamic,
                    is_async: false,
                    is_anonymous: false,
                    is_arrow: false,
                    params,
                    body,
                    pos: fn_pos,
                }))
            } else if !self.is_at(TokenKind::Comma) && !self.is_at(TokenKind::CloseBrace) {
                self.expect(TokenKind::Colon)?;
                Some(self.parse_nested_expr()?)
            } else {
                None
            };
            properties.push(ObjectProp {
                key: Box::new(key),
                dynamic,
                value,
            });
            self.eat_comma();
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(Node::Object { properties, pos })
    }

    fn parse_object_key(&mut self) -> Result<(Node, bool), LangError> {
        if self.is_at(TokenKind::OpenBracket) {
            self.eat();
            let key = self.parse_top_expr()?;
            self.expect(TokenKind::CloseBracket)?;
            return Ok((key, true));
        }
        let key = self.parse_primary_expr()?;
        match key {
            Node::Number { .. } | Node::Str { .. } | Node::Ident { .. } => Ok((key, false)),
            other => Err(self.syntax_err("invalid property key in object literal", other.pos())),
        }
    }

    /// Object destructuring pattern: keys as in a literal, values restricted
    /// to identifiers (the binding targets).
    fn parse_object_destructuring(&mut self) -> Result<Node, LangError> {
        let pos = self.expect(TokenKind::OpenBrace)?.pos();
        let mut properties = Vec::new();
        while self.not_eof() && !self.is_at(TokenKind::CloseBrace) {
            let (key, dynamic) = self.parse_object_key()?;
            let value = if self.is_at(TokenKind::Colon) {
                self.eat();
                let token = self.expect(TokenKind::Identifier)?;
                Some(Node::Ident {
                    name: token.src.clone(),
                    pos: token.pos(),
                })
            } else {
                None
            };
            properties.push(ObjectProp {
                key: Box::new(key),
                dynamic,
                value,
            });
            if !self.is_at(TokenKind::CloseBrace) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(Node::Object { properties, pos })
    }

    fn parse_array(&mut self) -> Result<Node, LangError> {
        if !self.is_at(TokenKind::OpenBracket) {
            return self.parse_primary_expr();
        }
        let pos = self.eat().pos();
        let mut elements = Vec::new();
        while self.not_eof() && !self.is_at(TokenKind::CloseBracket) {
            elements.push(self.parse_nested_expr()?);
            if !self.is_at(TokenKind::CloseBracket) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::CloseBracket)?;
        Ok(Node::Array { elements, pos })
    }

    fn parse_primary_expr(&mut self) -> Result<Node, LangError> {
        let pos = self.at(0).pos();
        match self.kind_at(0) {
            TokenKind::Number => {
                let token = self.eat();
                let value = parse_number_literal(&token.src)
                    .ok_or_else(|| self.syntax_err(format!("invalid numeric literal {}", token.src), pos))?;
                Ok(Node::Number { value, pos })
            }
            TokenKind::Str => {
                let token = self.eat();
                Ok(Node::Str { value: token.src, pos })
            }
            TokenKind::Identifier => {
                let token = self.eat();
                let expr = Node::Ident { name: token.src, pos };
                if matches!(self.kind_at(0), TokenKind::IncrementOp | TokenKind::DecrementOp) {
                    let op_token = self.eat();
                    let op = if op_token.kind == TokenKind::IncrementOp {
                        IncrOp::Inc
                    } else {
                        IncrOp::Dec
                    };
                    return Ok(Node::Increment {
                        operand: Box::new(expr),
                        op,
                        prefix: false,
                        pos,
                    });
                }
                Ok(expr)
            }
            TokenKind::Keyword(Keyword::Typeof) => {
                let pos = self.eat().pos();
                let operand = self.parse_object()?;
                Ok(Node::Typeof {
                    operand: Box::new(operand),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::Void) => {
                let pos = self.eat().pos();
                let operand = self.parse_object()?;
                Ok(Node::Void {
                    operand: Box::new(operand),
                    pos,
                })
            }
            TokenKind::IncrementOp | TokenKind::DecrementOp => {
                let token = self.eat();
                let op = if token.kind == TokenKind::IncrementOp {
                    IncrOp::Inc
                } else {
                    IncrOp::Dec
                };
                let operand = self.parse_nested_expr()?;
                Ok(Node::Increment {
                    operand: Box::new(operand),
                    op,
                    prefix: true,
                    pos,
                })
            }
            TokenKind::OpenParen => self.parse_paren_or_arrow(),
            TokenKind::Keyword(Keyword::GlobalThis) => self.parse_global_this_member(),
            TokenKind::TemplateString => {
                let token = self.eat();
                let parts = self.parse_template_parts(&token.src, pos)?;
                Ok(Node::TemplateString { parts, pos })
            }
            _ => {
                let token = self.at(0).clone();
                Err(self.unexpected_token_err(&token))
            }
        }
    }

    /// A parenthesized group, or, when `=>` follows, an arrow function
    /// whose parameters are the grouped expressions. Arrow bodies are a block
    /// or a single expression (implicit return).
    fn parse_paren_or_arrow(&mut self) -> Result<Node, LangError> {
        let pos = self.expect(TokenKind::OpenParen)?.pos();
        if self.is_at(TokenKind::CloseParen) && self.kind_at(1) == TokenKind::Arrow {
            self.eat();
            self.eat();
            let body = self.parse_arrow_body()?;
            return Ok(Node::Function(FunctionDecl {
                name: None,
                dynamic_name: false,
                is_async: false,
                is_anonymous: true,
                is_arrow: true,
                params: Vec::new(),
                body,
                pos,
            }));
        }
        let mut exprs = vec![self.parse_nested_expr()?];
        while self.is_at(TokenKind::Comma) {
            self.eat_comma();
            exprs.push(self.parse_nested_expr()?);
        }
        self.expect(TokenKind::CloseParen)?;
        if self.is_at(TokenKind::Arrow) {
            self.eat();
            let body = self.parse_arrow_body()?;
            return Ok(Node::Function(FunctionDecl {
                name: None,
                dynamic_name: false,
                is_async: false,
                is_anonymous: true,
                is_arrow: true,
                params: exprs,
                body,
                pos,
            }));
        }
        Ok(Node::Grouping { exprs, pos })
    }

    fn parse_arrow_body(&mut self) -> Result<Vec<Node>, LangError> {
        if self.is_at(TokenKind::OpenBrace) {
            return self.parse_block();
        }
        let expr = self.parse_nested_expr()?;
        let pos = expr.pos();
        Ok(vec![Node::Return {
            value: Some(Box::new(expr)),
            pos,
        }])
    }

    fn parse_global_this_member(&mut self) -> Result<Node, LangError> {
        if self.kind_at(1) != TokenKind::Dot {
            let token = self.at(0).clone();
            return Err(self.unexpected_token_err(&token));
        }
        let pos = self.eat().pos();
        self.eat(); // dot
        let property = self.expect(TokenKind::Identifier)?.src;
        if self.is_at(TokenKind::AssignmentOp) {
            let token = self.eat();
            let op = AssignOp::from_str(&token.src)
                .map_err(|_| self.syntax_err(format!("unknown assignment operator {}", token.src), token.pos()))?;
            let right = self.parse_expr()?;
            return Ok(Node::GlobalMemberAssign {
                property,
                right: Box::new(right),
                op,
                pos,
            });
        }
        Ok(Node::GlobalMember { property, pos })
    }

    /// Post-scans a raw template body for `#{ expr }` interpolations. Each
    /// interpolation source is parsed as a nested expression with a fresh
    /// sub-parser.
    fn parse_template_parts(&mut self, raw: &str, pos: Pos) -> Result<Vec<TemplatePart>, LangError> {
        let mut parts = Vec::new();
        let mut rest = raw;
        while let Some(start) = rest.find("#{") {
            if start > 0 {
                parts.push(TemplatePart::Lit(rest[..start].to_owned()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| self.syntax_err("unterminated interpolation in template string", pos))?;
            let sub = Parser::new(&after[..end], &self.source_path, "expression")?;
            let expr = sub.parse_expression()?;
            parts.push(TemplatePart::Expr(Box::new(expr)));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Lit(rest.to_owned()));
        }
        Ok(parts)
    }
}

/// Parses a numeric literal, including `0x`/`0o`/`0b` radix forms with
/// optional `_` separators.
fn parse_number_literal(src: &str) -> Option<f64> {
    let cleaned: String = src.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let radix = if lower.starts_with("0x") {
        Some(16)
    } else if lower.starts_with("0o") {
        Some(8)
    } else if lower.starts_with("0b") {
        Some(2)
    } else {
        None
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&cleaned[2..], radix).ok().map(|n| n as f64);
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_source(source: &str) -> Program {
        Parser::new(source, "test.as", "program").unwrap().parse(true).unwrap()
    }

    fn parse_err(source: &str) -> LangError {
        match Parser::new(source, "test.as", "program") {
            Ok(parser) => parser.parse(true).unwrap_err(),
            Err(err) => err,
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let program = parse_source("spawn a = 1 + 2 * 3;");
        let Node::VarDecl { right: Some(right), .. } = &program.body[0] else {
            panic!("expected declaration, got {:?}", program.body[0]);
        };
        let Node::Binary { op: BinaryOp::Add, right: mul, .. } = right.as_ref() else {
            panic!("expected addition at the top: {right:?}");
        };
        assert!(matches!(mul.as_ref(), Node::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn member_chain_composes_left_associatively() {
        let program = parse_source("a.b.c(x).d;");
        // a.b.c(x).d = Member { object: Call { caller: Member { .. c } }, prop: d }
        let Node::Member { object, computed: false, .. } = &program.body[0] else {
            panic!("expected member at top: {:?}", program.body[0]);
        };
        let Node::Call { caller, .. } = object.as_ref() else {
            panic!("expected call under member: {object:?}");
        };
        assert!(matches!(caller.as_ref(), Node::Member { .. }));
    }

    #[test]
    fn arrow_function_flags() {
        let program = parse_source("spawn f = (a, b) => { return a; };");
        let Node::VarDecl { right: Some(right), .. } = &program.body[0] else {
            panic!("expected declaration");
        };
        let Node::Function(decl) = right.as_ref() else {
            panic!("expected function: {right:?}");
        };
        assert!(decl.is_arrow);
        assert!(decl.is_anonymous);
        assert_eq!(decl.params.len(), 2);
    }

    #[test]
    fn expression_arrow_body_becomes_return() {
        let program = parse_source("spawn f = (v) => v + 1;");
        let Node::VarDecl { right: Some(right), .. } = &program.body[0] else {
            panic!("expected declaration");
        };
        let Node::Function(decl) = right.as_ref() else {
            panic!("expected function");
        };
        assert!(matches!(decl.body[0], Node::Return { value: Some(_), .. }));
    }

    #[test]
    fn class_body_items() {
        let program = parse_source(
            "class Point { default x = 0; private y = 0; function sum() { return 1; } constructor(a) { } }",
        );
        let Node::Class(decl) = &program.body[0] else {
            panic!("expected class");
        };
        assert_eq!(decl.fields.len(), 2);
        assert!(decl.fields[0].is_default);
        assert!(decl.fields[1].is_private);
        assert_eq!(decl.methods.len(), 1);
        assert!(decl.ctor.is_some());
    }

    #[test]
    fn duplicate_constructor_rejected() {
        let err = parse_err("class A { constructor() {} constructor() {} }");
        assert!(err.message.contains("multiple constructor"));
    }

    #[test]
    fn template_interpolations_split() {
        let program = parse_source("spawn s = `a #{x} b`;");
        let Node::VarDecl { right: Some(right), .. } = &program.body[0] else {
            panic!("expected declaration");
        };
        let Node::TemplateString { parts, .. } = right.as_ref() else {
            panic!("expected template: {right:?}");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[1], TemplatePart::Expr(_)));
    }

    #[test]
    fn radix_literals() {
        let program = parse_source("spawn a = 0x10; spawn b = 0b101; spawn c = 0o17;");
        let values: Vec<f64> = program
            .body
            .iter()
            .map(|node| {
                let Node::VarDecl { right: Some(right), .. } = node else {
                    panic!("expected declaration");
                };
                let Node::Number { value, .. } = right.as_ref() else {
                    panic!("expected number");
                };
                *value
            })
            .collect();
        assert_eq!(values, vec![16.0, 5.0, 15.0]);
    }

    #[test]
    fn parser_reports_unexpected_token() {
        let err = parse_err("spawn = 1;");
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn destructuring_patterns_parse() {
        let program = parse_source("spawn { x, y: z } = o; spawn [ a, b ] = arr;");
        assert!(matches!(&program.body[0], Node::VarDecl { left, .. } if matches!(left.as_ref(), Node::Object { .. })));
        assert!(matches!(&program.body[1], Node::VarDecl { left, .. } if matches!(left.as_ref(), Node::Array { .. })));
    }

    #[test]
    fn import_forms() {
        let program = parse_source("import { a, b } from \"./m.as\"; import util from \"./u.as\";");
        assert!(matches!(&program.body[0], Node::Import { names: Some(_), from: Some(_), .. }));
        assert!(matches!(&program.body[1], Node::Import { namespace: Some(_), .. }));
    }

    #[test]
    fn match_expression_arms() {
        let program = parse_source("spawn v = match x { 1 => \"one\", 2 => { \"two\" } };");
        let Node::VarDecl { right: Some(right), .. } = &program.body[0] else {
            panic!("expected declaration");
        };
        let Node::Match { cases, .. } = right.as_ref() else {
            panic!("expected match: {right:?}");
        };
        assert_eq!(cases.len(), 2);
    }
}
