use std::sync::Arc;
use std::time::Duration;

use log::debug;
use once_cell::sync::OnceCell;

use crate::annotations::Annotations;
use crate::errors::{Error, Result};
use crate::module::{Import, Imports, Module};
use crate::parser::ast;
use crate::process;
use crate::resolver::{ResolveCtx, Scope, TypeId, TypeKind};

/// A resolved parameter or result of an endpoint function.
#[derive(Debug, Clone)]
pub struct FunctionField {
    pub name: String,
    pub type_id: TypeId,
}

struct ParsedSignature {
    param: Option<FunctionField>,
    result: Option<FunctionField>,
}

/// One `@fn` annotated function of a service. Created during service
/// discovery; the parameter and result types resolve in the analyze phase.
pub struct Function {
    module: Arc<Module>,
    host_service_name: String,
    host_service_path: String,
    file_imports: Imports,
    decl: ast::FuncDecl,
    pub ident: String,
    pub const_ident: String,
    pub proxy_ident: String,
    pub annotations: Annotations,
    parsed: OnceCell<ParsedSignature>,
}

impl Function {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        module: Arc<Module>,
        host_service_name: String,
        host_service_path: String,
        file_imports: Imports,
        decl: ast::FuncDecl,
        annotations: Annotations,
    ) -> Self {
        let ident = decl.name.clone();
        Function {
            module,
            host_service_name,
            host_service_path,
            file_imports,
            const_ident: format!("_{ident}Fn"),
            proxy_ident: to_upper_camel(&ident),
            decl,
            ident,
            annotations,
            parsed: OnceCell::new(),
        }
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn host_service_name(&self) -> &str {
        &self.host_service_name
    }

    pub fn host_service_path(&self) -> &str {
        &self.host_service_path
    }

    /// The exported endpoint name.
    pub fn name(&self) -> String {
        match self.annotations.get("fn") {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self.ident.clone(),
        }
    }

    pub fn title(&self) -> String {
        match self.annotations.get("title") {
            Some(title) if !title.trim().is_empty() => title.trim().to_string(),
            _ => self.name(),
        }
    }

    pub fn description(&self) -> String {
        self.annotations.get("description").unwrap_or("").to_string()
    }

    pub fn internal(&self) -> bool {
        self.annotations.contains("internal")
    }

    pub fn authorization(&self) -> bool {
        self.annotations.contains("authorization")
    }

    pub fn permission(&self) -> Option<&str> {
        match self.annotations.get("permission") {
            Some(body) if !body.trim().is_empty() => Some(body.trim()),
            _ => None,
        }
    }

    pub fn validation(&self) -> Option<String> {
        if !self.annotations.contains("validation") {
            return None;
        }
        match self.annotations.get("validation") {
            Some(body) if !body.trim().is_empty() => Some(body.trim().to_string()),
            _ => Some(self.title()),
        }
    }

    pub fn timeout(&self) -> Result<Option<Duration>> {
        match self.annotations.get("timeout") {
            Some(body) => {
                let timeout = parse_go_duration(body.trim()).map_err(|e| {
                    e.with_meta("service", &self.host_service_name)
                        .with_meta("fn", &self.ident)
                })?;
                Ok(Some(timeout))
            }
            None => Ok(None),
        }
    }

    pub fn timeout_literal(&self) -> Option<&str> {
        self.annotations.get("timeout").map(str::trim)
    }

    pub fn sql(&self) -> Option<&str> {
        match self.annotations.get("sql") {
            Some(body) if !body.trim().is_empty() => Some(body.trim()),
            _ => None,
        }
    }

    pub fn transactional(&self) -> bool {
        self.annotations.contains("transactional")
    }

    pub fn barrier(&self) -> bool {
        self.annotations.contains("barrier")
    }

    pub fn deprecated(&self) -> bool {
        self.annotations.contains("deprecated")
    }

    pub fn errors_doc(&self) -> Option<&str> {
        self.annotations.get("errors")
    }

    pub fn param(&self) -> Option<&FunctionField> {
        self.parsed.get().and_then(|p| p.param.as_ref())
    }

    pub fn result(&self) -> Option<&FunctionField> {
        self.parsed.get().and_then(|p| p.result.as_ref())
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    /// Foreign package paths needed to name the parameter and result.
    pub fn paths(&self) -> Vec<String> {
        let types = self.module.types();
        let mut paths = Vec::new();
        for field in [self.param(), self.result()].into_iter().flatten() {
            for path in types.top_paths(field.type_id) {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    /// Validate the signature against the contract and resolve the
    /// parameter/result types.
    pub fn parse(&self, ctx: &process::Context) -> Result<String> {
        self.parsed.get_or_try_init(|| self.analyze(ctx))?;
        Ok(format!(
            "{}/{}: parse succeed",
            self.host_service_name,
            self.name()
        ))
    }

    fn analyze(&self, process: &process::Context) -> Result<ParsedSignature> {
        process.check()?;
        debug!(
            "analyzing fn '{}' of service '{}'",
            self.ident, self.host_service_name
        );
        let fail = |cause: Error| {
            cause
                .with_meta("service", &self.host_service_name)
                .with_meta("fn", &self.ident)
        };
        if !self.decl.type_params.is_empty() {
            return Err(fail(Error::unsupported_shape(
                "generic functions are not supported",
            )));
        }
        if self.decl.params.is_empty() || self.decl.params.len() > 2 {
            return Err(fail(Error::unsupported_shape(
                "fn must have one or two params",
            )));
        }
        if !is_context_type(&self.decl.params[0].expr, &self.file_imports) {
            return Err(fail(Error::unsupported_shape(
                "first fn param must be context.Context",
            )));
        }
        if self.decl.results.is_empty() || self.decl.results.len() > 2 {
            return Err(fail(Error::unsupported_shape(
                "fn must have one or two results",
            )));
        }
        let last_result = self.decl.results.last().expect("results are not empty");
        if !is_code_error_type(&last_result.expr, &self.file_imports) {
            return Err(fail(Error::unsupported_shape(
                "last fn result must be errors.CodeError",
            )));
        }

        let types = self.module.types();
        let mut resolve_ctx = ResolveCtx::new(&self.module, process);
        let scope = Scope::new(self.host_service_path.clone(), self.file_imports.clone());

        let param = if self.decl.params.len() == 2 {
            let declared = &self.decl.params[1];
            let type_id = types.resolve_expr(&mut resolve_ctx, &scope, &declared.expr)?;
            let kind = terminal_kind(types, type_id);
            if !matches!(kind, TypeKind::Struct | TypeKind::Array) {
                return Err(fail(Error::unsupported_shape(
                    "fn param type must be a struct or an array",
                )
                .with_meta("type", declared.expr.describe())));
            }
            Some(FunctionField {
                name: declared.name.clone().unwrap_or_else(|| "argument".to_string()),
                type_id,
            })
        } else {
            None
        };

        let result = if self.decl.results.len() == 2 {
            let declared = &self.decl.results[0];
            let type_id = types.resolve_expr(&mut resolve_ctx, &scope, &declared.expr)?;
            let kind = terminal_kind(types, type_id);
            if !matches!(kind, TypeKind::Struct | TypeKind::Array | TypeKind::Map) {
                return Err(fail(Error::unsupported_shape(
                    "fn result type must be a struct, an array or a map",
                )
                .with_meta("type", declared.expr.describe())));
            }
            Some(FunctionField {
                name: declared.name.clone().unwrap_or_else(|| "result".to_string()),
                type_id,
            })
        } else {
            None
        };

        Ok(ParsedSignature { param, result })
    }

    /// Import bindings for the parameter and result packages.
    pub fn imports(&self) -> Imports {
        let mut imports = Imports::new();
        for path in self.paths() {
            imports.add(Import::new(path));
        }
        imports
    }
}

/// Kind after unwrapping pointers and named aliases.
fn terminal_kind(types: &crate::resolver::Types, id: TypeId) -> TypeKind {
    let mut current = id;
    loop {
        let node = types.get(current);
        match node.kind {
            TypeKind::Pointer | TypeKind::Ident => match node.elements.first() {
                Some(inner) => current = *inner,
                None => return node.kind,
            },
            other => return other,
        }
    }
}

fn is_context_type(expr: &ast::TypeExpr, imports: &Imports) -> bool {
    let ast::TypeExpr::Selector { pkg, name } = expr else {
        return false;
    };
    if name != "Context" {
        return false;
    }
    imports.find(pkg).map(|i| i.path.as_str()) == Some("context")
}

fn is_code_error_type(expr: &ast::TypeExpr, imports: &Imports) -> bool {
    let ast::TypeExpr::Selector { pkg, name } = expr else {
        return false;
    };
    if name != "CodeError" {
        return false;
    }
    imports.find(pkg).map(|i| i.path.as_str()) == Some("github.com/aacfactory/errors")
}

fn to_upper_camel(ident: &str) -> String {
    ident
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Parse a Go duration literal: decimal values with `h`, `m`, `s`, `ms`,
/// `us`/`µs` or `ns` units, possibly concatenated (`1m30s`).
pub fn parse_go_duration(s: &str) -> Result<Duration> {
    let invalid = || {
        Error::invalid_input("timeout annotation is not a valid duration").with_meta("value", s)
    };
    if s.is_empty() {
        return Err(invalid());
    }
    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if digits_end == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..digits_end].parse().map_err(|_| invalid())?;
        let unit_rest = &rest[digits_end..];
        let (unit, len) = if unit_rest.starts_with("ms") {
            (0.001, 2)
        } else if unit_rest.starts_with("us") {
            (0.000_001, 2)
        } else if unit_rest.starts_with("µs") {
            (0.000_001, "µs".len())
        } else if unit_rest.starts_with("ns") {
            (0.000_000_001, 2)
        } else if unit_rest.starts_with('h') {
            (3600.0, 1)
        } else if unit_rest.starts_with('m') {
            (60.0, 1)
        } else if unit_rest.starts_with('s') {
            (1.0, 1)
        } else {
            return Err(invalid());
        };
        total += Duration::from_secs_f64(value * unit);
        rest = &unit_rest[len..];
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_camel_from_lower_camel() {
        assert_eq!(to_upper_camel("getUser"), "GetUser");
        assert_eq!(to_upper_camel("get_user"), "GetUser");
        assert_eq!(to_upper_camel("g"), "G");
    }

    #[test]
    fn go_durations() {
        assert_eq!(parse_go_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(
            parse_go_duration("1m30s").unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(
            parse_go_duration("300ms").unwrap(),
            Duration::from_millis(300)
        );
        assert!(parse_go_duration("fast").is_err());
        assert!(parse_go_duration("10").is_err());
    }

    fn only_function(
        project: &crate::testutil::TestProject,
    ) -> (std::sync::Arc<crate::module::Service>, crate::process::Context) {
        let module = crate::module::Module::load(&project.mod_path()).unwrap();
        let services = module.services().unwrap();
        (services[0].clone(), crate::process::Context::new())
    }

    #[test]
    fn generic_instantiated_param_is_rejected() {
        let project = crate::testutil::project();
        project.file("modules/users/doc.go", "// @service users\npackage users\n");
        project.file(
            "modules/users/fns_src.go",
            r#"package users

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn pageUsers
func pageUsers(ctx context.Context, param List[User]) (err errors.CodeError) {
	return
}

type List[E any] struct {
	Items []E `json:"items"`
}

type User struct {
	Id string `json:"id"`
}
"#,
        );
        let (service, process) = only_function(&project);
        let err = service.functions[0].parse(&process).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::UnsupportedShape);
    }

    #[test]
    fn builtin_result_is_rejected() {
        let project = crate::testutil::project();
        project.file("modules/users/doc.go", "// @service users\npackage users\n");
        project.file(
            "modules/users/fns_src.go",
            r#"package users

import (
	"context"

	"github.com/aacfactory/errors"
	"github.com/aacfactory/fns/service"
)

// @fn touch
func touch(ctx context.Context, param Param) (result service.Empty, err errors.CodeError) {
	return
}

type Param struct {
	Id string `json:"id"`
}
"#,
        );
        let (service, process) = only_function(&project);
        let err = service.functions[0].parse(&process).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::UnsupportedShape);
    }

    #[test]
    fn named_alias_over_array_param_is_accepted() {
        let project = crate::testutil::project();
        project.file("modules/users/doc.go", "// @service users\npackage users\n");
        project.file(
            "modules/users/fns_src.go",
            r#"package users

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn tag
func tag(ctx context.Context, param Names) (err errors.CodeError) {
	return
}

type Names []string
"#,
        );
        let (service, process) = only_function(&project);
        service.functions[0].parse(&process).unwrap();
        assert!(service.functions[0].param().is_some());
    }
}
