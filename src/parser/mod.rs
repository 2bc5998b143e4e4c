//! Recursive-descent parser for the declaration subset of Go that the
//! generator reads: package clause, imports, type declarations (including
//! generic parameter lists) and top-level function signatures. Bodies of
//! functions and const/var blocks are skipped by bracket matching.

pub mod ast;

use thiserror::Error;

use crate::lexer::{LexedSource, Lexer, Position, Token, TokenKind};

use self::ast::{
    FieldDecl, File, FuncDecl, ImportSpec, Param, TypeDecl, TypeExpr, TypeParam,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at {pos}")]
pub struct ParseError {
    pub message: String,
    pub pos: Position,
}

impl ParseError {
    fn new(message: impl Into<String>, pos: Position) -> Self {
        ParseError {
            message: message.into(),
            pos,
        }
    }
}

/// Parse a whole source file.
pub fn parse_file(source: &str) -> Result<File, ParseError> {
    let lexed = Lexer::lex(source).map_err(|e| ParseError::new(e.message.clone(), e.pos))?;
    Parser::new(lexed).file()
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    lexed: LexedSource,
}

impl Parser {
    fn new(lexed: LexedSource) -> Self {
        Parser {
            tokens: lexed.tokens.clone(),
            index: 0,
            lexed,
        }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.index).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.index + offset).map(|t| &t.kind)
    }

    fn pos(&self) -> Position {
        self.tokens
            .get(self.index)
            .map(|t| t.pos)
            .or_else(|| self.tokens.last().map(|t| t.pos))
            .unwrap_or_default()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.index += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let pos = self.pos();
        match self.next() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(ParseError::new(
                format!(
                    "expected {} but found {}",
                    kind.describe(),
                    token.kind.describe()
                ),
                token.pos,
            )),
            None => Err(ParseError::new(
                format!("expected {} but reached end of file", kind.describe()),
                pos,
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Position), ParseError> {
        let pos = self.pos();
        match self.next() {
            Some(Token {
                kind: TokenKind::Ident(name),
                pos,
            }) => Ok((name, pos)),
            Some(token) => Err(ParseError::new(
                format!("expected identifier but found {}", token.kind.describe()),
                token.pos,
            )),
            None => Err(ParseError::new(
                "expected identifier but reached end of file",
                pos,
            )),
        }
    }

    fn skip_semicolons(&mut self) {
        while self.eat(&TokenKind::Semicolon) {}
    }

    fn doc_before_current(&self) -> Option<String> {
        let line = self.tokens.get(self.index)?.pos.line;
        self.lexed.doc_before(line)
    }

    fn file(&mut self) -> Result<File, ParseError> {
        self.skip_semicolons();
        let doc = self.doc_before_current();
        self.expect(TokenKind::Package)?;
        let (package, _) = self.expect_ident()?;
        self.skip_semicolons();

        let mut file = File {
            package,
            doc,
            imports: Vec::new(),
            types: Vec::new(),
            funcs: Vec::new(),
        };
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Semicolon => {
                    self.index += 1;
                }
                TokenKind::Import => self.import_decl(&mut file)?,
                TokenKind::Type => self.type_decl(&mut file)?,
                TokenKind::Func => self.func_decl(&mut file)?,
                TokenKind::Const | TokenKind::Var => self.skip_value_decl()?,
                _ => {
                    let token = self.next().expect("peeked token exists");
                    return Err(ParseError::new(
                        format!("unexpected {} at top level", token.kind.describe()),
                        token.pos,
                    ));
                }
            }
        }
        Ok(file)
    }

    fn import_decl(&mut self, file: &mut File) -> Result<(), ParseError> {
        self.expect(TokenKind::Import)?;
        if self.eat(&TokenKind::LParen) {
            loop {
                self.skip_semicolons();
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                file.imports.push(self.import_spec()?);
            }
        } else {
            file.imports.push(self.import_spec()?);
        }
        Ok(())
    }

    fn import_spec(&mut self) -> Result<ImportSpec, ParseError> {
        let pos = self.pos();
        let alias = match self.peek() {
            Some(TokenKind::Ident(name)) => {
                let name = name.clone();
                self.index += 1;
                Some(name)
            }
            Some(TokenKind::Dot) => {
                self.index += 1;
                Some(".".to_string())
            }
            _ => None,
        };
        let path = match self.next() {
            Some(Token {
                kind: TokenKind::Str(path),
                ..
            }) => path,
            Some(token) => {
                return Err(ParseError::new(
                    format!("expected import path but found {}", token.kind.describe()),
                    token.pos,
                ))
            }
            None => {
                return Err(ParseError::new(
                    "expected import path but reached end of file",
                    pos,
                ))
            }
        };
        Ok(ImportSpec { path, alias, pos })
    }

    fn type_decl(&mut self, file: &mut File) -> Result<(), ParseError> {
        let decl_doc = self.doc_before_current();
        self.expect(TokenKind::Type)?;
        if self.eat(&TokenKind::LParen) {
            let mut specs = Vec::new();
            loop {
                self.skip_semicolons();
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                let spec_doc = self.doc_before_current();
                specs.push(self.type_spec(spec_doc)?);
            }
            // a single grouped spec without its own doc inherits the group doc
            if specs.len() == 1 && specs[0].doc.is_none() {
                specs[0].doc = decl_doc;
            }
            file.types.append(&mut specs);
        } else {
            file.types.push(self.type_spec(decl_doc)?);
        }
        Ok(())
    }

    fn type_spec(&mut self, doc: Option<String>) -> Result<TypeDecl, ParseError> {
        let (name, pos) = self.expect_ident()?;
        let mut type_params = Vec::new();
        if self.peek() == Some(&TokenKind::LBracket) {
            type_params = self.type_params()?;
        }
        let assign = self.eat(&TokenKind::Assign);
        let expr = self.type_expr()?;
        Ok(TypeDecl {
            doc,
            name,
            assign,
            type_params,
            expr,
            pos,
        })
    }

    fn type_params(&mut self) -> Result<Vec<TypeParam>, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut params = Vec::new();
        loop {
            self.skip_semicolons();
            if self.eat(&TokenKind::RBracket) {
                break;
            }
            let mut names = Vec::new();
            let (first, _) = self.expect_ident()?;
            names.push(first);
            while self.eat(&TokenKind::Comma) {
                let (name, _) = self.expect_ident()?;
                names.push(name);
            }
            let constraint = self.type_union()?;
            params.push(TypeParam { names, constraint });
            if !self.eat(&TokenKind::Comma) {
                self.skip_semicolons();
                self.expect(TokenKind::RBracket)?;
                break;
            }
        }
        Ok(params)
    }

    fn func_decl(&mut self, file: &mut File) -> Result<(), ParseError> {
        let doc = self.doc_before_current();
        let func_token = self.expect(TokenKind::Func)?;
        let mut has_receiver = false;
        if self.peek() == Some(&TokenKind::LParen) {
            has_receiver = true;
            self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
        }
        let (name, _) = self.expect_ident()?;
        let mut type_params = Vec::new();
        if self.peek() == Some(&TokenKind::LBracket) {
            type_params = self.type_params()?;
        }
        let params = self.param_list()?;
        let results = self.result_list()?;
        if self.peek() == Some(&TokenKind::LBrace) {
            self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
        }
        file.funcs.push(FuncDecl {
            doc,
            has_receiver,
            name,
            type_params,
            params,
            results,
            pos: func_token.pos,
        });
        Ok(())
    }

    fn param_list(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        loop {
            self.skip_semicolons();
            if self.eat(&TokenKind::RParen) {
                break;
            }
            self.param_group(&mut params)?;
            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::RParen)?;
                break;
            }
        }
        Ok(params)
    }

    /// Parse one comma-joined parameter group. `a, b string` expands into two
    /// named params; bare idents followed by `,`/`)` are unnamed types.
    fn param_group(&mut self, params: &mut Vec<Param>) -> Result<(), ParseError> {
        let mut pending: Vec<String> = Vec::new();
        loop {
            let named_head = matches!(self.peek(), Some(TokenKind::Ident(_)))
                && match self.peek_at(1) {
                    Some(TokenKind::Comma) | Some(TokenKind::RParen) | Some(TokenKind::Dot) => {
                        false
                    }
                    Some(_) => true,
                    None => false,
                };
            if named_head {
                // `name Type` is the common shape; `PageResult[User]` also
                // starts Ident+LBracket, so back out on a failed type parse
                let save = self.index;
                let (name, _) = self.expect_ident()?;
                let variadic = self.eat(&TokenKind::Ellipsis);
                match self.type_expr() {
                    Ok(expr) => {
                        for pending_name in pending.drain(..) {
                            params.push(Param {
                                name: Some(pending_name),
                                expr: expr.clone(),
                                variadic: false,
                            });
                        }
                        params.push(Param {
                            name: Some(name),
                            expr,
                            variadic,
                        });
                        return Ok(());
                    }
                    Err(_) => {
                        self.index = save;
                    }
                }
                for pending_name in pending.drain(..) {
                    params.push(Param {
                        name: None,
                        expr: TypeExpr::Ident(pending_name),
                        variadic: false,
                    });
                }
                let variadic = self.eat(&TokenKind::Ellipsis);
                let expr = self.type_expr()?;
                params.push(Param {
                    name: None,
                    expr,
                    variadic,
                });
                return Ok(());
            }
            if matches!(self.peek(), Some(TokenKind::Ident(_)))
                && matches!(self.peek_at(1), Some(TokenKind::Comma))
            {
                let (name, _) = self.expect_ident()?;
                pending.push(name);
                self.expect(TokenKind::Comma)?;
                continue;
            }
            // the remaining tokens form a plain type; any pending idents
            // were unnamed types of their own
            for pending_name in pending.drain(..) {
                params.push(Param {
                    name: None,
                    expr: TypeExpr::Ident(pending_name),
                    variadic: false,
                });
            }
            let variadic = self.eat(&TokenKind::Ellipsis);
            let expr = self.type_expr()?;
            params.push(Param {
                name: None,
                expr,
                variadic,
            });
            return Ok(());
        }
    }

    fn result_list(&mut self) -> Result<Vec<Param>, ParseError> {
        match self.peek() {
            Some(TokenKind::LParen) => self.param_list(),
            Some(kind) if starts_type(kind) => {
                let expr = self.type_expr()?;
                Ok(vec![Param {
                    name: None,
                    expr,
                    variadic: false,
                }])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn skip_value_decl(&mut self) -> Result<(), ParseError> {
        // const/var declarations carry nothing the generator reads
        self.next();
        if self.peek() == Some(&TokenKind::LParen) {
            self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
            return Ok(());
        }
        let mut parens = 0usize;
        let mut braces = 0usize;
        let mut brackets = 0usize;
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::LParen => parens += 1,
                TokenKind::RParen => parens = parens.saturating_sub(1),
                TokenKind::LBrace => braces += 1,
                TokenKind::RBrace => braces = braces.saturating_sub(1),
                TokenKind::LBracket => brackets += 1,
                TokenKind::RBracket => brackets = brackets.saturating_sub(1),
                TokenKind::Semicolon if parens == 0 && braces == 0 && brackets == 0 => {
                    self.index += 1;
                    return Ok(());
                }
                _ => {}
            }
            self.index += 1;
        }
        Ok(())
    }

    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) -> Result<(), ParseError> {
        let start = self.pos();
        self.expect(open.clone())?;
        let mut depth = 1usize;
        while let Some(kind) = self.peek() {
            if *kind == open {
                depth += 1;
            } else if *kind == close {
                depth -= 1;
                if depth == 0 {
                    self.index += 1;
                    return Ok(());
                }
            }
            self.index += 1;
        }
        Err(ParseError::new(
            format!("unbalanced {} group", open.describe()),
            start,
        ))
    }

    fn type_expr(&mut self) -> Result<TypeExpr, ParseError> {
        let pos = self.pos();
        match self.peek() {
            Some(TokenKind::Star) => {
                self.index += 1;
                Ok(TypeExpr::Pointer(Box::new(self.type_expr()?)))
            }
            Some(TokenKind::LBracket) => {
                self.index += 1;
                if self.eat(&TokenKind::RBracket) {
                    return Ok(TypeExpr::Slice(Box::new(self.type_expr()?)));
                }
                let mut len = String::new();
                while let Some(kind) = self.peek() {
                    if *kind == TokenKind::RBracket {
                        break;
                    }
                    match kind {
                        TokenKind::Number(text) | TokenKind::Ident(text) => len.push_str(text),
                        TokenKind::Ellipsis => len.push_str("..."),
                        TokenKind::Dot => len.push('.'),
                        _ => len.push('?'),
                    }
                    self.index += 1;
                }
                self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr::Array {
                    len,
                    elem: Box::new(self.type_expr()?),
                })
            }
            Some(TokenKind::Map) => {
                self.index += 1;
                self.expect(TokenKind::LBracket)?;
                let key = self.type_expr()?;
                self.expect(TokenKind::RBracket)?;
                let value = self.type_expr()?;
                Ok(TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            Some(TokenKind::Chan) => {
                self.index += 1;
                // drop a send direction if present
                if matches!(self.peek(), Some(TokenKind::Op(op)) if op == "<") {
                    self.index += 1;
                    if matches!(self.peek(), Some(TokenKind::Op(op)) if op == "-") {
                        self.index += 1;
                    }
                }
                Ok(TypeExpr::Chan(Box::new(self.type_expr()?)))
            }
            Some(TokenKind::Op(op)) if op == "<" => {
                // receive-direction channel: <-chan T
                self.index += 1;
                if matches!(self.peek(), Some(TokenKind::Op(op)) if op == "-") {
                    self.index += 1;
                }
                self.expect(TokenKind::Chan)?;
                Ok(TypeExpr::Chan(Box::new(self.type_expr()?)))
            }
            Some(TokenKind::Struct) => {
                self.index += 1;
                self.struct_body()
            }
            Some(TokenKind::Interface) => {
                self.index += 1;
                self.interface_body()
            }
            Some(TokenKind::Func) => {
                self.index += 1;
                let _ = self.param_list()?;
                let _ = self.result_list()?;
                Ok(TypeExpr::FuncType)
            }
            Some(TokenKind::LParen) => {
                self.index += 1;
                let inner = self.type_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            Some(TokenKind::Tilde) => {
                self.index += 1;
                self.type_expr()
            }
            Some(TokenKind::Ident(_)) => {
                let (name, _) = self.expect_ident()?;
                let base = if self.eat(&TokenKind::Dot) {
                    let (selected, _) = self.expect_ident()?;
                    TypeExpr::Selector {
                        pkg: name,
                        name: selected,
                    }
                } else {
                    TypeExpr::Ident(name)
                };
                if self.peek() == Some(&TokenKind::LBracket) {
                    // generic instantiation
                    self.index += 1;
                    let mut args = Vec::new();
                    loop {
                        args.push(self.type_expr()?);
                        if self.eat(&TokenKind::Comma) {
                            continue;
                        }
                        self.expect(TokenKind::RBracket)?;
                        break;
                    }
                    return Ok(TypeExpr::Index {
                        base: Box::new(base),
                        args,
                    });
                }
                Ok(base)
            }
            Some(other) => Err(ParseError::new(
                format!("expected a type but found {}", other.describe()),
                pos,
            )),
            None => Err(ParseError::new(
                "expected a type but reached end of file",
                pos,
            )),
        }
    }

    fn type_union(&mut self) -> Result<TypeExpr, ParseError> {
        let first = self.type_expr()?;
        if self.peek() != Some(&TokenKind::Pipe) {
            return Ok(first);
        }
        let mut terms = vec![first];
        while self.eat(&TokenKind::Pipe) {
            terms.push(self.type_expr()?);
        }
        Ok(TypeExpr::Union(terms))
    }

    fn struct_body(&mut self) -> Result<TypeExpr, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        loop {
            self.skip_semicolons();
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            fields.push(self.field_decl()?);
        }
        Ok(TypeExpr::Struct(fields))
    }

    fn field_decl(&mut self) -> Result<FieldDecl, ParseError> {
        let doc = self.doc_before_current();
        let pos = self.pos();
        // embedded fields: `Ident`, `pkg.Ident` or `*pkg.Ident` directly
        // followed by a tag or the field terminator
        let embedded = match self.peek() {
            Some(TokenKind::Star) => true,
            Some(TokenKind::Ident(_)) => match self.peek_at(1) {
                Some(TokenKind::Dot) => true,
                Some(TokenKind::RawStr(_))
                | Some(TokenKind::Str(_))
                | Some(TokenKind::Semicolon)
                | Some(TokenKind::RBrace) => true,
                _ => false,
            },
            _ => false,
        };
        if embedded {
            let expr = self.type_expr()?;
            let tag = self.field_tag();
            self.end_field()?;
            return Ok(FieldDecl {
                doc,
                names: Vec::new(),
                embedded: true,
                expr,
                tag,
                pos,
            });
        }
        let mut names = Vec::new();
        let (first, _) = self.expect_ident()?;
        names.push(first);
        while self.eat(&TokenKind::Comma) {
            let (name, _) = self.expect_ident()?;
            names.push(name);
        }
        let expr = self.type_expr()?;
        let tag = self.field_tag();
        self.end_field()?;
        Ok(FieldDecl {
            doc,
            names,
            embedded: false,
            expr,
            tag,
            pos,
        })
    }

    fn field_tag(&mut self) -> Option<String> {
        match self.peek() {
            Some(TokenKind::RawStr(tag)) | Some(TokenKind::Str(tag)) => {
                let tag = tag.clone();
                self.index += 1;
                Some(tag)
            }
            _ => None,
        }
    }

    fn end_field(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Some(TokenKind::Semicolon) => {
                self.index += 1;
                Ok(())
            }
            Some(TokenKind::RBrace) | None => Ok(()),
            Some(other) => Err(ParseError::new(
                format!("expected end of field but found {}", other.describe()),
                self.pos(),
            )),
        }
    }

    fn interface_body(&mut self) -> Result<TypeExpr, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut terms = Vec::new();
        loop {
            self.skip_semicolons();
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            let is_method = matches!(self.peek(), Some(TokenKind::Ident(_)))
                && matches!(self.peek_at(1), Some(TokenKind::LParen));
            if is_method {
                let _ = self.expect_ident()?;
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
                // swallow whatever results follow, up to the field end
                let mut depth = 0usize;
                while let Some(kind) = self.peek() {
                    match kind {
                        TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                        TokenKind::RParen | TokenKind::RBracket => {
                            depth = depth.saturating_sub(1)
                        }
                        TokenKind::RBrace if depth == 0 => break,
                        TokenKind::RBrace => depth -= 1,
                        TokenKind::Semicolon if depth == 0 => break,
                        _ => {}
                    }
                    self.index += 1;
                }
                continue;
            }
            terms.push(self.type_union()?);
        }
        Ok(TypeExpr::Interface(terms))
    }
}

fn starts_type(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident(_)
            | TokenKind::Star
            | TokenKind::LBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Struct
            | TokenKind::Interface
            | TokenKind::Func
            | TokenKind::LParen
            | TokenKind::Tilde
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_package_imports_and_struct() {
        let source = r#"package users

import (
	"context"
	stdjson "encoding/json"
)

// User is a person.
type User struct {
	// @title identifier
	Id   string `json:"id"`
	Name string `json:"name"`
	raw  stdjson.RawMessage
}
"#;
        let file = parse_file(source).unwrap();
        assert_eq!(file.package, "users");
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[1].alias.as_deref(), Some("stdjson"));
        let decl = file.type_decl("User").unwrap();
        assert_eq!(decl.doc.as_deref(), Some("User is a person.\n"));
        let TypeExpr::Struct(fields) = &decl.expr else {
            panic!("expected struct");
        };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].names, vec!["Id".to_string()]);
        assert_eq!(fields[0].tag.as_deref(), Some("json:\"id\""));
        assert_eq!(fields[0].doc.as_deref(), Some("@title identifier\n"));
    }

    #[test]
    fn parses_function_signature_and_skips_body() {
        let source = r#"package users

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn get
// @authorization
func get(ctx context.Context, param GetParam) (v *User, err errors.CodeError) {
	if param.Id == "" {
		return
	}
	return
}
"#;
        let file = parse_file(source).unwrap();
        assert_eq!(file.funcs.len(), 1);
        let func = &file.funcs[0];
        assert_eq!(func.name, "get");
        assert!(func.doc.as_deref().unwrap().contains("@fn get"));
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].name.as_deref(), Some("ctx"));
        assert_eq!(
            func.params[0].expr,
            TypeExpr::Selector {
                pkg: "context".to_string(),
                name: "Context".to_string()
            }
        );
        assert_eq!(func.results.len(), 2);
        assert_eq!(
            func.results[0].expr,
            TypeExpr::Pointer(Box::new(TypeExpr::Ident("User".to_string())))
        );
    }

    #[test]
    fn parses_generic_declaration_and_instantiation() {
        let source = r#"package dal

type PageResult[E any] struct {
	Items []E `json:"items"`
}

type UserPage struct {
	Page PageResult[User] `json:"page"`
}
"#;
        let file = parse_file(source).unwrap();
        let decl = file.type_decl("PageResult").unwrap();
        assert_eq!(decl.type_params.len(), 1);
        assert_eq!(decl.type_params[0].names, vec!["E".to_string()]);
        let page = file.type_decl("UserPage").unwrap();
        let TypeExpr::Struct(fields) = &page.expr else {
            panic!("expected struct");
        };
        assert_eq!(
            fields[0].expr,
            TypeExpr::Index {
                base: Box::new(TypeExpr::Ident("PageResult".to_string())),
                args: vec![TypeExpr::Ident("User".to_string())],
            }
        );
    }

    #[test]
    fn parses_constraint_unions() {
        let source = "package n\n\ntype Number interface {\n\tint | int64 | float64\n}\n";
        let file = parse_file(source).unwrap();
        let decl = file.type_decl("Number").unwrap();
        let TypeExpr::Interface(terms) = &decl.expr else {
            panic!("expected interface");
        };
        assert_eq!(terms.len(), 1);
        let TypeExpr::Union(parts) = &terms[0] else {
            panic!("expected union");
        };
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn methods_are_dropped_from_interfaces() {
        let source =
            "package c\n\ntype Component interface {\n\tName() (name string)\n\tBuild(options map[string]string) (err error)\n}\n";
        let file = parse_file(source).unwrap();
        let decl = file.type_decl("Component").unwrap();
        assert_eq!(decl.expr, TypeExpr::Interface(Vec::new()));
    }

    #[test]
    fn skips_receiver_functions_and_value_decls() {
        let source = r#"package svc

const name = "svc"

var registry = map[string]int{
	"a": 1,
}

func (s *Service) Handle() {}

type marker struct{}
"#;
        let file = parse_file(source).unwrap();
        assert_eq!(file.funcs.len(), 1);
        assert!(file.funcs[0].has_receiver);
        assert!(file.type_decl("marker").is_some());
    }

    #[test]
    fn parses_embedded_fields() {
        let source = "package a\n\ntype B struct {\n\tsql.Time\n\t*Meta\n\tName string\n}\n";
        let file = parse_file(source).unwrap();
        let TypeExpr::Struct(fields) = &file.type_decl("B").unwrap().expr else {
            panic!("expected struct");
        };
        assert!(fields[0].embedded);
        assert!(fields[1].embedded);
        assert!(!fields[2].embedded);
    }

    #[test]
    fn shared_name_groups_expand() {
        let source = "package a\n\nfunc f(a, b string, c int) {}\n";
        let file = parse_file(source).unwrap();
        let params = &file.funcs[0].params;
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name.as_deref(), Some("a"));
        assert_eq!(params[0].expr, TypeExpr::Ident("string".to_string()));
        assert_eq!(params[1].name.as_deref(), Some("b"));
        assert_eq!(params[2].name.as_deref(), Some("c"));
    }
}
