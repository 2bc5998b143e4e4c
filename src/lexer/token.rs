use std::fmt;

use serde::Serialize;

/// Line/column location of a token inside its source file, 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

/// The token set of the declaration subset this crate reads. Anything the
/// declaration parser never dispatches on lexes as `Op`, which keeps body
/// skipping total over arbitrary source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Number(String),
    Str(String),
    RawStr(String),
    Rune(String),

    Package,
    Import,
    Type,
    Struct,
    Interface,
    Func,
    Map,
    Chan,
    Const,
    Var,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
    Star,
    Assign,
    Pipe,
    Tilde,
    Ellipsis,
    Op(String),
}

impl TokenKind {
    /// Whether an automatic semicolon follows this token at a line end.
    pub fn ends_statement(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Number(_)
                | TokenKind::Str(_)
                | TokenKind::RawStr(_)
                | TokenKind::Rune(_)
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    }

    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Number(text) => format!("number '{text}'"),
            TokenKind::Str(_) | TokenKind::RawStr(_) => "string literal".to_string(),
            TokenKind::Rune(_) => "rune literal".to_string(),
            TokenKind::Op(op) => format!("'{op}'"),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Package => "package",
            TokenKind::Import => "import",
            TokenKind::Type => "type",
            TokenKind::Struct => "struct",
            TokenKind::Interface => "interface",
            TokenKind::Func => "func",
            TokenKind::Map => "map",
            TokenKind::Chan => "chan",
            TokenKind::Const => "const",
            TokenKind::Var => "var",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Star => "*",
            TokenKind::Assign => "=",
            TokenKind::Pipe => "|",
            TokenKind::Tilde => "~",
            TokenKind::Ellipsis => "...",
            _ => "",
        }
    }
}

/// A source comment, kept apart from the significant token stream so that
/// declaration docs can be assembled by line adjacency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Content with the comment markers stripped, one entry per line.
    pub lines: Vec<String>,
    pub start_line: usize,
    pub end_line: usize,
    /// A comment sharing its line with earlier code never joins a doc group.
    pub trailing: bool,
}
