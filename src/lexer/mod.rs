//! Tokenizer for the declaration subset of Go sources that the generator
//! reads. It keeps comments out-of-band (for doc attachment), performs the
//! automatic semicolon insertion the grammar relies on, and lexes everything
//! it does not understand into opaque operator tokens so that skipped
//! function bodies can never fail the scan.

mod token;

pub use token::{Comment, Position, Token, TokenKind};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at {pos}")]
pub struct LexError {
    pub message: String,
    pub pos: Position,
}

/// A scanned source file: significant tokens plus the comment table.
#[derive(Debug, Clone)]
pub struct LexedSource {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

impl LexedSource {
    /// Assemble the doc group that ends on the line directly above `line`.
    ///
    /// Comment groups chain upwards while each member ends exactly one line
    /// above the next; a blank line or a trailing comment breaks the chain.
    pub fn doc_before(&self, line: usize) -> Option<String> {
        if line <= 1 {
            return None;
        }
        let mut group: Vec<&Comment> = Vec::new();
        let mut wanted = line - 1;
        loop {
            let found = self
                .comments
                .iter()
                .find(|c| c.end_line == wanted && !c.trailing);
            match found {
                Some(comment) => {
                    group.push(comment);
                    if comment.start_line <= 1 {
                        break;
                    }
                    wanted = comment.start_line - 1;
                }
                None => break,
            }
        }
        if group.is_empty() {
            return None;
        }
        group.reverse();
        let mut text = String::new();
        for comment in group {
            for l in &comment.lines {
                text.push_str(l);
                text.push('\n');
            }
        }
        Some(text)
    }
}

pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    line_has_code: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            comments: Vec::new(),
            line_has_code: false,
        }
    }

    pub fn lex(source: &str) -> Result<LexedSource, LexError> {
        let mut lexer = Lexer::new(source);
        lexer.run()?;
        Ok(LexedSource {
            tokens: lexer.tokens,
            comments: lexer.comments,
        })
    }

    fn run(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.insert_semicolon_if_needed();
                    self.advance_line();
                }
                '/' if self.peek_at(1) == Some('/') => self.line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.block_comment()?,
                '"' => self.interpreted_string()?,
                '`' => self.raw_string()?,
                '\'' => self.rune_literal()?,
                c if c.is_alphabetic() || c == '_' => self.ident(),
                c if c.is_ascii_digit() => self.number(),
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number(),
                _ => self.operator(),
            }
        }
        self.insert_semicolon_if_needed();
        Ok(())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.index += 1;
            self.column += 1;
        }
        c
    }

    fn advance_line(&mut self) {
        self.index += 1;
        self.line += 1;
        self.column = 1;
        self.line_has_code = false;
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn push(&mut self, kind: TokenKind, pos: Position) {
        self.tokens.push(Token { kind, pos });
        self.line_has_code = true;
    }

    fn insert_semicolon_if_needed(&mut self) {
        if !self.line_has_code {
            return;
        }
        if let Some(last) = self.tokens.last() {
            if last.kind.ends_statement() {
                let pos = self.position();
                self.tokens.push(Token {
                    kind: TokenKind::Semicolon,
                    pos,
                });
            }
        }
    }

    fn line_comment(&mut self) {
        let start_line = self.line;
        let trailing = self.line_has_code;
        self.advance();
        self.advance();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.advance();
        }
        let text = text.strip_prefix(' ').unwrap_or(&text).to_string();
        self.comments.push(Comment {
            lines: vec![text],
            start_line,
            end_line: start_line,
            trailing,
        });
    }

    fn block_comment(&mut self) -> Result<(), LexError> {
        let start_line = self.line;
        let start = self.position();
        let trailing = self.line_has_code;
        self.advance();
        self.advance();
        let mut text = String::new();
        let mut closed = false;
        while let Some(c) = self.peek() {
            if c == '*' && self.peek_at(1) == Some('/') {
                self.advance();
                self.advance();
                closed = true;
                break;
            }
            if c == '\n' {
                text.push('\n');
                self.advance_line();
            } else {
                text.push(c);
                self.advance();
            }
        }
        if !closed {
            return Err(LexError {
                message: "block comment is not terminated".to_string(),
                pos: start,
            });
        }
        let end_line = self.line;
        let lines = text
            .lines()
            .map(|l| l.strip_prefix(' ').unwrap_or(l).to_string())
            .collect();
        self.comments.push(Comment {
            lines,
            start_line,
            end_line,
            trailing,
        });
        if end_line > start_line {
            self.insert_semicolon_if_needed();
            self.line_has_code = false;
        }
        Ok(())
    }

    fn interpreted_string(&mut self) -> Result<(), LexError> {
        let pos = self.position();
        self.advance();
        let mut raw = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError {
                        message: "string literal is not terminated".to_string(),
                        pos,
                    });
                }
                Some('\\') => {
                    raw.push('\\');
                    self.advance();
                    if let Some(escaped) = self.advance() {
                        raw.push(escaped);
                    }
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    raw.push(c);
                    self.advance();
                }
            }
        }
        let value = unescape::unescape(&raw).unwrap_or(raw);
        self.push(TokenKind::Str(value), pos);
        Ok(())
    }

    fn raw_string(&mut self) -> Result<(), LexError> {
        let pos = self.position();
        self.advance();
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        message: "raw string literal is not terminated".to_string(),
                        pos,
                    });
                }
                Some('`') => {
                    self.advance();
                    break;
                }
                Some('\n') => {
                    value.push('\n');
                    self.advance_line();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        self.push(TokenKind::RawStr(value), pos);
        // raw strings count as code on their closing line
        self.line_has_code = true;
        Ok(())
    }

    fn rune_literal(&mut self) -> Result<(), LexError> {
        let pos = self.position();
        self.advance();
        let mut raw = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError {
                        message: "rune literal is not terminated".to_string(),
                        pos,
                    });
                }
                Some('\\') => {
                    raw.push('\\');
                    self.advance();
                    if let Some(escaped) = self.advance() {
                        raw.push(escaped);
                    }
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    raw.push(c);
                    self.advance();
                }
            }
        }
        self.push(TokenKind::Rune(raw), pos);
        Ok(())
    }

    fn ident(&mut self) {
        let pos = self.position();
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = match name.as_str() {
            "package" => TokenKind::Package,
            "import" => TokenKind::Import,
            "type" => TokenKind::Type,
            "struct" => TokenKind::Struct,
            "interface" => TokenKind::Interface,
            "func" => TokenKind::Func,
            "map" => TokenKind::Map,
            "chan" => TokenKind::Chan,
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            _ => TokenKind::Ident(name),
        };
        self.push(kind, pos);
    }

    fn number(&mut self) {
        let pos = self.position();
        let mut text = String::new();
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let keep = c.is_ascii_alphanumeric()
                || c == '_'
                || c == '.'
                || ((c == '+' || c == '-') && matches!(prev, 'e' | 'E' | 'p' | 'P'));
            if !keep {
                break;
            }
            text.push(c);
            prev = c;
            self.advance();
        }
        self.push(TokenKind::Number(text), pos);
    }

    fn operator(&mut self) {
        let pos = self.position();
        if self.peek() == Some('.') && self.peek_at(1) == Some('.') && self.peek_at(2) == Some('.') {
            self.advance();
            self.advance();
            self.advance();
            self.push(TokenKind::Ellipsis, pos);
            return;
        }
        let c = self.advance().unwrap_or('\0');
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '*' => TokenKind::Star,
            '=' => TokenKind::Assign,
            '|' => TokenKind::Pipe,
            '~' => TokenKind::Tilde,
            other => TokenKind::Op(other.to_string()),
        };
        self.push(kind, pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_declaration_tokens() {
        let lexed = Lexer::lex("package users\n\ntype User struct {\n\tId string `json:\"id\"`\n}\n")
            .unwrap();
        let kinds: Vec<&TokenKind> = lexed.tokens.iter().map(|t| &t.kind).collect();
        assert!(matches!(kinds[0], TokenKind::Package));
        assert!(matches!(kinds[1], TokenKind::Ident(name) if name == "users"));
        assert!(matches!(kinds[2], TokenKind::Semicolon));
        assert!(matches!(kinds[3], TokenKind::Type));
        assert!(kinds
            .iter()
            .any(|k| matches!(k, TokenKind::RawStr(tag) if tag == "json:\"id\"")));
    }

    #[test]
    fn inserts_semicolons_at_line_ends() {
        let lexed = Lexer::lex("a\nb\n").unwrap();
        let kinds: Vec<&TokenKind> = lexed.tokens.iter().map(|t| &t.kind).collect();
        assert_eq!(kinds.len(), 4);
        assert!(matches!(kinds[1], TokenKind::Semicolon));
        assert!(matches!(kinds[3], TokenKind::Semicolon));
    }

    #[test]
    fn unescapes_interpreted_strings() {
        let lexed = Lexer::lex("\"a\\tb\"\n").unwrap();
        assert!(matches!(&lexed.tokens[0].kind, TokenKind::Str(s) if s == "a\tb"));
    }

    #[test]
    fn collects_doc_groups_by_adjacency() {
        let source = "// @service users\n// @title Users\npackage users\n";
        let lexed = Lexer::lex(source).unwrap();
        let doc = lexed.doc_before(3).unwrap();
        assert_eq!(doc, "@service users\n@title Users\n");
    }

    #[test]
    fn blank_line_breaks_doc_group() {
        let source = "// detached\n\n// @fn get\nfunc get() {}\n";
        let lexed = Lexer::lex(source).unwrap();
        let doc = lexed.doc_before(4).unwrap();
        assert_eq!(doc, "@fn get\n");
    }

    #[test]
    fn trailing_comment_is_not_doc() {
        let source = "var x = 1 // not a doc\nfunc get() {}\n";
        let lexed = Lexer::lex(source).unwrap();
        assert!(lexed.doc_before(2).is_none());
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(Lexer::lex("\"abc\n").is_err());
    }

    #[test]
    fn body_braces_survive_strings_and_runes() {
        let lexed = Lexer::lex("func f() { s := \"}\"; r := '}' }\n").unwrap();
        let opens = lexed
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::LBrace)
            .count();
        let closes = lexed
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::RBrace)
            .count();
        assert_eq!(opens, 1);
        assert_eq!(closes, 1);
    }
}
