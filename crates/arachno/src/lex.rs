//! Regex-directed scanner producing the token stream.
//!
//! Tokens come from an ordered spec table: the first pattern matching at the
//! current position wins, so order is load-bearing: the template fence
//! ` ``` ` before the interpolation braces `${`/`}$` before the back-tick,
//! and multi-character operators before their single-character prefixes.
//! String and template literals switch to direct character consumption after
//! the opening quote matches.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    ast::Pos,
    exception::{ErrorKind, LangError},
};

/// Reserved words. An identifier lexeme matching one of these is promoted to
/// a keyword token. `goto`, `using`, and `go` are reserved without grammar
/// productions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Var,
    Spawn,
    Immortal,
    Static,
    Using,
    Function,
    Class,
    Constructor,
    If,
    Else,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Delete,
    Do,
    While,
    For,
    Throw,
    Return,
    Goto,
    Try,
    Catch,
    Finally,
    Private,
    Public,
    Extends,
    Async,
    Import,
    Export,
    From,
    As,
    #[strum(serialize = "globalThis")]
    GlobalThis,
    In,
    Of,
    Instanceof,
    Typeof,
    Void,
    Super,
    New,
    Await,
    Go,
    Match,
}

/// Closed token-kind enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Number,
    Str,
    TemplateString,
    Identifier,
    Label,
    BinaryOp,
    Arrow,
    AssignmentOp,
    ComparisonOp,
    LogicalOp,
    IncrementOp,
    DecrementOp,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    Colon,
    SemiColon,
    Dot,
    Comma,
    Question,
    Ellipsis,
    TemplateFence,
    InterpOpen,
    InterpClose,
    Whitespace,
    Keyword(Keyword),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Eof => "<eof>",
            TokenKind::Number => "number",
            TokenKind::Str => "string",
            TokenKind::TemplateString => "template-string",
            TokenKind::Identifier => "identifier",
            TokenKind::Label => "label",
            TokenKind::BinaryOp => "binary-operator",
            TokenKind::Arrow => "arrow",
            TokenKind::AssignmentOp => "assignment-operator",
            TokenKind::ComparisonOp => "comparison-operator",
            TokenKind::LogicalOp => "logical-operator",
            TokenKind::IncrementOp => "increment-operator",
            TokenKind::DecrementOp => "decrement-operator",
            TokenKind::OpenParen => "open-parenthesis",
            TokenKind::CloseParen => "close-parenthesis",
            TokenKind::OpenBracket => "open-bracket",
            TokenKind::CloseBracket => "close-bracket",
            TokenKind::OpenBrace => "open-brace",
            TokenKind::CloseBrace => "close-brace",
            TokenKind::Colon => "colon",
            TokenKind::SemiColon => "semi-colon",
            TokenKind::Dot => "dot",
            TokenKind::Comma => "comma",
            TokenKind::Question => "?",
            TokenKind::Ellipsis => "...",
            TokenKind::TemplateFence => "```",
            TokenKind::InterpOpen => "${",
            TokenKind::InterpClose => "}$",
            TokenKind::Whitespace => "white-space",
            TokenKind::Keyword(keyword) => keyword.into(),
        };
        f.write_str(name)
    }
}

/// One token: kind, raw source text, and 1-based line/column span.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub src: String,
    pub line: usize,
    pub col: usize,
    pub end: usize,
}

impl Token {
    pub(crate) fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            col: self.col,
            count: self.end.saturating_sub(self.col).max(1),
        }
    }
}

/// Raw match class before special handling. Quotes and back-ticks hand off to
/// the direct string scanner.
enum Spec {
    Kind(TokenKind),
    Quote,
    BackTick,
}

static TOKEN_SPECS: LazyLock<Vec<(Regex, Spec)>> = LazyLock::new(|| {
    let spec = |pattern: &str, class: Spec| (Regex::new(pattern).expect("token pattern compiles"), class);
    vec![
        spec(r"^-?\d+(\.\d+)?\b", Spec::Kind(TokenKind::Number)),
        spec("^\"", Spec::Quote),
        spec("^'", Spec::Quote),
        spec("^```", Spec::Kind(TokenKind::TemplateFence)),
        spec(r"^\$\{", Spec::Kind(TokenKind::InterpOpen)),
        spec(r"^\}\$", Spec::Kind(TokenKind::InterpClose)),
        spec("^`", Spec::BackTick),
        spec(r"^0[bB][01]+[01_]*", Spec::Kind(TokenKind::Number)),
        spec(r"^0[oO][0-7]+[0-7_]*", Spec::Kind(TokenKind::Number)),
        spec(r"^0[xX][0-9a-fA-F]+[0-9a-fA-F_]*", Spec::Kind(TokenKind::Number)),
        spec(r"^[a-zA-Z_#]+[a-zA-Z0-9_#]* *:>", Spec::Kind(TokenKind::Label)),
        spec(r"^[a-zA-Z_#]+[a-zA-Z0-9_#]*", Spec::Kind(TokenKind::Identifier)),
        spec(r"^\s", Spec::Kind(TokenKind::Whitespace)),
        spec(r"^=>", Spec::Kind(TokenKind::Arrow)),
        spec(r"^(===|==|!==|!=|>=|<=|>|<)", Spec::Kind(TokenKind::ComparisonOp)),
        spec(r"^(\+=|-=|\*=|/=|%=|\?\?=|=)", Spec::Kind(TokenKind::AssignmentOp)),
        spec(r"^\+\+", Spec::Kind(TokenKind::IncrementOp)),
        spec(r"^--", Spec::Kind(TokenKind::DecrementOp)),
        spec(r"^\?", Spec::Kind(TokenKind::Question)),
        spec(r"^\.\.\.", Spec::Kind(TokenKind::Ellipsis)),
        spec(r"^(\*\*|\+|-|/|%|\*)", Spec::Kind(TokenKind::BinaryOp)),
        spec(r"^(&&|\|\||!)", Spec::Kind(TokenKind::LogicalOp)),
        spec(r"^\(", Spec::Kind(TokenKind::OpenParen)),
        spec(r"^\)", Spec::Kind(TokenKind::CloseParen)),
        spec(r"^\{", Spec::Kind(TokenKind::OpenBrace)),
        spec(r"^\}", Spec::Kind(TokenKind::CloseBrace)),
        spec(r"^\[", Spec::Kind(TokenKind::OpenBracket)),
        spec(r"^\]", Spec::Kind(TokenKind::CloseBracket)),
        spec(r"^:", Spec::Kind(TokenKind::Colon)),
        spec(r"^;", Spec::Kind(TokenKind::SemiColon)),
        spec(r"^\.", Spec::Kind(TokenKind::Dot)),
        spec(r"^,", Spec::Kind(TokenKind::Comma)),
    ]
});

/// Scans `source` into an append-only token sequence terminated by EOF.
pub(crate) fn tokenize(source: &str, path: &str) -> Result<Vec<Token>, LangError> {
    let mut tokens = Vec::new();
    let mut position = 0usize;
    let mut line = 1usize;
    let mut col = 1usize;

    'scan: while position < source.len() {
        let remaining = &source[position..];
        for (pattern, class) in TOKEN_SPECS.iter() {
            let Some(found) = pattern.find(remaining) else {
                continue;
            };
            let length = found.end();
            match class {
                Spec::Quote | Spec::BackTick => {
                    let quote = remaining.chars().next().unwrap_or('"');
                    let (inner, consumed) = scan_quoted(remaining, quote).ok_or_else(|| {
                        let what = if matches!(class, Spec::Quote) {
                            "unclosed string literal"
                        } else {
                            "unclosed template literal"
                        };
                        LangError::new(ErrorKind::SyntaxError, what, Pos { line, col, count: 1 }, path)
                    })?;
                    let kind = if matches!(class, Spec::Quote) {
                        TokenKind::Str
                    } else {
                        TokenKind::TemplateString
                    };
                    tokens.push(Token {
                        kind,
                        src: inner,
                        line,
                        col,
                        end: col + consumed,
                    });
                    for ch in remaining[..consumed].chars() {
                        if ch == '\n' {
                            line += 1;
                            col = 1;
                        } else {
                            col += ch.len_utf8();
                        }
                    }
                    position += consumed;
                    continue 'scan;
                }
                Spec::Kind(TokenKind::Whitespace) => {
                    position += length;
                    if &remaining[..length] == "\n" {
                        line += 1;
                        col = 1;
                    } else {
                        col += length;
                    }
                    continue 'scan;
                }
                Spec::Kind(kind) => {
                    let src = remaining[..length].to_owned();
                    let kind = if *kind == TokenKind::Identifier {
                        match Keyword::from_str(&src) {
                            Ok(keyword) => TokenKind::Keyword(keyword),
                            Err(_) => TokenKind::Identifier,
                        }
                    } else {
                        *kind
                    };
                    tokens.push(Token {
                        kind,
                        src,
                        line,
                        col,
                        end: col + length,
                    });
                    position += length;
                    col += length;
                    continue 'scan;
                }
            }
        }
        return Err(LangError::new(
            ErrorKind::SyntaxError,
            "unrecognised character found in source",
            Pos { line, col, count: 1 },
            path,
        ));
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        src: "EOF".to_owned(),
        line,
        col,
        end: col,
    });
    Ok(tokens)
}

/// Consumes a quoted literal starting at the opening quote. A backslash
/// forces the following character to be taken literally (both characters are
/// kept in the lexeme, so the closing quote can be escaped). Returns the
/// inner text and the total bytes consumed including both quotes, or `None`
/// when the literal never closes.
fn scan_quoted(remaining: &str, quote: char) -> Option<(String, usize)> {
    let mut inner = String::new();
    let mut chars = remaining.char_indices();
    chars.next(); // opening quote
    while let Some((offset, ch)) = chars.next() {
        if ch == quote {
            return Some((inner, offset + ch.len_utf8()));
        }
        inner.push(ch);
        if ch == '\\' {
            let (_, escaped) = chars.next()?;
            inner.push(escaped);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, "test.as").unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_declaration() {
        assert_eq!(
            kinds("spawn a = 1 + 2;"),
            vec![
                TokenKind::Keyword(Keyword::Spawn),
                TokenKind::Identifier,
                TokenKind::AssignmentOp,
                TokenKind::Number,
                TokenKind::BinaryOp,
                TokenKind::Number,
                TokenKind::SemiColon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keyword_promotion_is_exact() {
        let tokens = tokenize("classes class", "test.as").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Keyword(Keyword::Class));
    }

    #[test]
    fn string_keeps_escapes_verbatim() {
        let tokens = tokenize(r#""a\"b""#, "test.as").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].src, "a\\\"b");
    }

    #[test]
    fn unclosed_string_is_a_syntax_error() {
        let err = tokenize("\"abc", "test.as").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
        assert!(err.message.contains("unclosed string literal"));
    }

    #[test]
    fn template_literal_token() {
        let tokens = tokenize("`hi #{name}`", "test.as").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::TemplateString);
        assert_eq!(tokens[0].src, "hi #{name}");
    }

    #[test]
    fn label_token_absorbs_marker() {
        let tokens = tokenize("start :> 1", "test.as").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Label);
        assert_eq!(tokens[0].src, "start :>");
        assert_eq!(tokens[1].kind, TokenKind::Number);
    }

    #[test]
    fn macro_names_are_identifiers() {
        let tokens = tokenize("#_print(a)", "test.as").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].src, "#_print");
    }

    #[test]
    fn multi_char_operators_win() {
        assert_eq!(
            kinds("a === b ** c ??= d => ..."),
            vec![
                TokenKind::Identifier,
                TokenKind::ComparisonOp,
                TokenKind::Identifier,
                TokenKind::BinaryOp,
                TokenKind::Identifier,
                TokenKind::AssignmentOp,
                TokenKind::Identifier,
                TokenKind::Arrow,
                TokenKind::Ellipsis,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn radix_literals_lex_as_numbers() {
        for source in ["0x1F", "0b1010", "0o17"] {
            let tokens = tokenize(source, "test.as").unwrap();
            assert_eq!(tokens[0].kind, TokenKind::Number, "{source}");
            assert_eq!(tokens[0].src, source);
        }
    }

    #[test]
    fn newline_resets_column() {
        let tokens = tokenize("a\nb", "test.as").unwrap();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 1));
    }
}
