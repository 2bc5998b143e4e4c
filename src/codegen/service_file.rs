use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::debug;

use crate::codegen::documents::map_type;
use crate::codegen::writer::{
    go_duration_literal, go_quote, render_type, write_imports, write_source, GoWriter,
};
use crate::errors::{Error, Result};
use crate::files;
use crate::module::{Function, Imports, Service};
use crate::process;
use crate::resolver::TypeKind;

/// The generated `fns.go` companion of one service.
pub struct ServiceFile {
    service: Arc<Service>,
}

impl ServiceFile {
    pub fn new(service: Arc<Service>) -> Self {
        ServiceFile { service }
    }

    pub fn filename(&self) -> String {
        files::join(&self.service.dir, "fns.go")
    }

    pub fn write(&self, ctx: &process::Context) -> Result<String> {
        let content = self.content(ctx).map_err(|e| {
            Error::invalid_input("code file write failed")
                .with_meta("kind", "service")
                .with_meta("service", &self.service.name)
                .with_meta("file", self.filename())
                .with_cause(e)
        })?;
        write_source(&self.filename(), &content)?;
        debug!(
            "service '{}' written to '{}'",
            self.service.name,
            self.filename()
        );
        Ok(format!("{}: write succeed", self.service.name))
    }

    /// Render the whole file. Pure with respect to the filesystem, which is
    /// what keeps two identical runs byte-identical.
    pub fn content(&self, ctx: &process::Context) -> Result<String> {
        ctx.check()?;
        for function in &self.service.functions {
            if !function.is_parsed() {
                return Err(Error::invalid_input("fn is not parsed")
                    .with_meta("service", &self.service.name)
                    .with_meta("fn", &function.ident));
            }
        }
        let imports = self.merged_imports()?;
        let mut writer = GoWriter::new();
        let package = self
            .service
            .path
            .rsplit('/')
            .next()
            .unwrap_or(&self.service.path);
        writer.line("// NOTE: this file has been automatically generated, DON'T EDIT IT.");
        writer.blank();
        writer.line(format!("package {package}"));
        writer.blank();
        write_imports(&mut writer, &imports);
        self.write_consts(&mut writer);
        for function in &self.service.functions {
            self.write_proxy(&mut writer, function, &imports)?;
        }
        self.write_service_type(&mut writer, &imports)?;
        self.write_handle(&mut writer, &imports)?;
        self.write_document(&mut writer)?;
        Ok(writer.finish())
    }

    fn merged_imports(&self) -> Result<Imports> {
        let service = &self.service;
        let mut uses_time = false;
        let mut uses_authorization = false;
        let mut uses_validation = false;
        let mut uses_sql = false;
        let mut permission_paths: BTreeSet<String> = BTreeSet::new();
        let mut foreign: BTreeSet<String> = BTreeSet::new();
        for function in &service.functions {
            if function.timeout_literal().is_some() {
                uses_time = true;
            }
            if function.authorization() {
                uses_authorization = true;
            }
            if function.validation().is_some() && function.param().is_some() {
                uses_validation = true;
            }
            if function.sql().is_some() || function.transactional() {
                uses_sql = true;
            }
            if let Some(body) = function.permission() {
                let (path, _) = permission_target(body, &service.name, &function.ident)?;
                permission_paths.insert(path);
            }
            for path in function.paths() {
                if path != service.path {
                    foreign.insert(path);
                }
            }
        }

        let mut imports = Imports::new();
        let mut counters = HashMap::new();
        imports.add_path("context", &mut counters);
        if uses_time {
            imports.add_path("time", &mut counters);
        }
        imports.add_path("github.com/aacfactory/errors", &mut counters);
        imports.add_path("github.com/aacfactory/fns/service", &mut counters);
        if uses_authorization {
            imports.add_path("github.com/aacfactory/fns/service/authorizations", &mut counters);
        }
        if !service.internal {
            imports.add_path("github.com/aacfactory/fns/service/documents", &mut counters);
        }
        if uses_validation {
            imports.add_path("github.com/aacfactory/fns/service/validators", &mut counters);
        }
        if uses_sql {
            imports.add_path("github.com/aacfactory/fns-contrib/databases/sql", &mut counters);
        }
        for path in &permission_paths {
            imports.add_path(path, &mut counters);
        }
        for path in &foreign {
            imports.add_path(path, &mut counters);
        }
        if let Some(components_path) = service.components_path() {
            imports.add_path(&components_path, &mut counters);
        }
        Ok(imports)
    }

    fn write_consts(&self, writer: &mut GoWriter) {
        writer.open("const (");
        writer.line(format!("_name = {}", go_quote(&self.service.name)));
        for function in &self.service.functions {
            writer.line(format!(
                "{} = {}",
                function.const_ident,
                go_quote(&function.name())
            ));
        }
        writer.close(")");
        writer.blank();
    }

    fn write_proxy(
        &self,
        writer: &mut GoWriter,
        function: &Arc<Function>,
        imports: &Imports,
    ) -> Result<()> {
        let types = self.service.module().types();
        let host = &self.service.path;
        let param_sig = match function.param() {
            Some(field) => format!(
                ", argument {}",
                render_type(types, field.type_id, host, imports)?
            ),
            None => String::new(),
        };
        let result_sig = match function.result() {
            Some(field) => format!(
                "result {}, ",
                render_type(types, field.type_id, host, imports)?
            ),
            None => String::new(),
        };
        writer.open(format!(
            "func {}(ctx context.Context{param_sig}) ({result_sig}err errors.CodeError) {{",
            function.proxy_ident
        ));
        writer.line("endpoint, hasEndpoint := service.GetEndpoint(ctx, _name)");
        writer.open("if !hasEndpoint {");
        writer.line(format!(
            "err = errors.Warning({}).WithMeta({}, _name)",
            go_quote(&format!("{}: endpoint was not found", self.service.name)),
            go_quote("service")
        ));
        writer.line("return");
        writer.close("}");
        let argument = match function.param() {
            Some(_) => "service.NewArgument(argument)".to_string(),
            None => "service.NewArgument(service.Empty{})".to_string(),
        };
        match function.result() {
            None => {
                writer.line(format!(
                    "err = endpoint.RequestSync(ctx, {}, {argument}, nil)",
                    function.const_ident
                ));
            }
            Some(field) => {
                if types.kind(field.type_id) == TypeKind::Pointer {
                    let inner = types.get(field.type_id).elements[0];
                    let target = render_type(types, inner, host, imports)?;
                    writer.line(format!("result = &{target}{{}}"));
                    writer.line(format!(
                        "err = endpoint.RequestSync(ctx, {}, {argument}, result)",
                        function.const_ident
                    ));
                } else {
                    writer.line(format!(
                        "err = endpoint.RequestSync(ctx, {}, {argument}, &result)",
                        function.const_ident
                    ));
                }
            }
        }
        writer.line("return");
        writer.close("}");
        writer.blank();
        Ok(())
    }

    fn write_service_type(&self, writer: &mut GoWriter, imports: &Imports) -> Result<()> {
        let service = &self.service;
        writer.open("func Service() (v service.Service) {");
        if service.components.is_empty() {
            writer.open("v = &_service{");
            writer.line(format!(
                "Abstract: service.NewAbstract(_name, {}),",
                service.internal
            ));
            writer.close("}");
        } else {
            let components_path = service.components_path().expect("components are not empty");
            let binding = imports
                .by_path(&components_path)
                .map(|i| i.ident().to_string())
                .ok_or_else(|| {
                    Error::resolve_failure("missing import").with_meta("path", &components_path)
                })?;
            writer.open("v = &_service{");
            writer.open(format!(
                "Abstract: service.NewAbstract(_name, {},",
                service.internal
            ));
            for component in &service.components {
                writer.line(format!("&{binding}.{}{{}},", component.ident));
            }
            writer.close("),");
            writer.close("}");
        }
        writer.line("return");
        writer.close("}");
        writer.blank();
        writer.open("type _service struct {");
        writer.line("service.Abstract");
        writer.close("}");
        writer.blank();
        Ok(())
    }

    fn write_handle(&self, writer: &mut GoWriter, imports: &Imports) -> Result<()> {
        writer.open(
            "func (svc *_service) Handle(ctx context.Context, fn string, argument service.Argument) (v interface{}, err errors.CodeError) {",
        );
        writer.line("switch fn {");
        for function in &self.service.functions {
            self.write_handle_case(writer, function, imports)?;
        }
        writer.open("default:");
        writer.line(format!(
            "err = errors.Warning({}).WithMeta({}, _name).WithMeta({}, fn)",
            go_quote(&format!("{}: fn was not found", self.service.name)),
            go_quote("service"),
            go_quote("fn")
        ));
        writer.dedent();
        writer.line("}");
        writer.line("return");
        writer.close("}");
        writer.blank();
        Ok(())
    }

    fn write_handle_case(
        &self,
        writer: &mut GoWriter,
        function: &Arc<Function>,
        imports: &Imports,
    ) -> Result<()> {
        let service = &self.service;
        let types = service.module().types();
        let host = &service.path;
        writer.open(format!("case {}:", function.const_ident));
        let has_timeout = function.timeout_literal().is_some();
        let cancel_before_break = |writer: &mut GoWriter, wrapped: bool| {
            if wrapped {
                writer.line("cancel()");
            }
        };

        if function.internal() {
            writer.open("if !service.CanAccessInternal(ctx) {");
            writer.line(format!(
                "err = errors.Warning({}).WithMeta({}, _name).WithMeta({}, fn)",
                go_quote(&format!(
                    "{}: fn cannot be accessed externally",
                    service.name
                )),
                go_quote("service"),
                go_quote("fn")
            ));
            writer.line("break");
            writer.close("}");
        }
        if function.authorization() {
            writer.line("verifyErr := authorizations.Verify(ctx)");
            writer.open("if verifyErr != nil {");
            writer.line("err = verifyErr");
            writer.line("break");
            writer.close("}");
        }
        if let Some(body) = function.permission() {
            let (path, ident) = permission_target(body, &service.name, &function.ident)?;
            let binding = imports
                .by_path(&path)
                .map(|i| i.ident().to_string())
                .ok_or_else(|| {
                    Error::resolve_failure("missing import").with_meta("path", &path)
                })?;
            writer.line(format!(
                "allowed, enforceErr := {binding}.{ident}.EnforceRequest(ctx, _name, {})",
                function.const_ident
            ));
            writer.open("if enforceErr != nil {");
            writer.line("err = enforceErr");
            writer.line("break");
            writer.close("}");
            writer.open("if !allowed {");
            writer.line(format!(
                "err = errors.Forbidden({}).WithMeta({}, _name).WithMeta({}, fn)",
                go_quote(&format!("{}: forbidden", service.name)),
                go_quote("service"),
                go_quote("fn")
            ));
            writer.line("break");
            writer.close("}");
        }
        if let Some(field) = function.param() {
            if types.kind(field.type_id) == TypeKind::Pointer {
                let inner = types.get(field.type_id).elements[0];
                let target = render_type(types, inner, host, imports)?;
                writer.line(format!("param := &{target}{{}}"));
                writer.line("scanErr := argument.Scan(param)");
            } else {
                let target = render_type(types, field.type_id, host, imports)?;
                writer.line(format!("param := {target}{{}}"));
                writer.line("scanErr := argument.Scan(&param)");
            }
            writer.open("if scanErr != nil {");
            writer.line(format!(
                "err = errors.BadRequest({}).WithCause(scanErr)",
                go_quote(&format!(
                    "{}: scan request argument failed",
                    service.name
                ))
            ));
            writer.line("break");
            writer.close("}");
        }
        if let (Some(_), Some(title)) = (function.param(), function.validation()) {
            writer.line(format!(
                "validateErr := validators.Validate(param, {})",
                go_quote(&title)
            ));
            writer.open("if validateErr != nil {");
            writer.line("err = validateErr");
            writer.line("break");
            writer.close("}");
        }
        if has_timeout {
            let timeout = function.timeout()?.expect("timeout literal is present");
            writer.line("var cancel context.CancelFunc");
            writer.line(format!(
                "ctx, cancel = context.WithTimeout(ctx, {})",
                go_duration_literal(timeout)
            ));
        }
        if let Some(database) = function.sql() {
            writer.line(format!(
                "ctx = sql.WithDatabase(ctx, {})",
                go_quote(database)
            ));
        }
        if function.transactional() {
            writer.line("beginErr := sql.BeginTransaction(ctx)");
            writer.open("if beginErr != nil {");
            writer.line("err = beginErr");
            cancel_before_break(writer, has_timeout);
            writer.line("break");
            writer.close("}");
        }

        let call_args = match function.param() {
            Some(_) => "ctx, param",
            None => "ctx",
        };
        if function.barrier() {
            writer.open(format!(
                "v, err = service.Barrier(ctx, {}, argument, func(ctx context.Context) (interface{{}}, errors.CodeError) {{",
                function.const_ident
            ));
            if function.result().is_some() {
                writer.line(format!("return {}({call_args})", function.ident));
            } else {
                writer.line(format!("return nil, {}({call_args})", function.ident));
            }
            writer.close("})");
        } else if function.result().is_some() {
            writer.line(format!("v, err = {}({call_args})", function.ident));
        } else {
            writer.line(format!("err = {}({call_args})", function.ident));
        }

        if function.transactional() {
            writer.open("if err == nil {");
            writer.line("commitErr := sql.CommitTransaction(ctx)");
            writer.open("if commitErr != nil {");
            writer.line("_ = sql.RollbackTransaction(ctx)");
            writer.line("err = commitErr");
            writer.close("}");
            writer.chain("} else {");
            writer.line("_ = sql.RollbackTransaction(ctx)");
            writer.close("}");
        }
        if has_timeout {
            writer.line("cancel()");
        }
        writer.dedent();
        Ok(())
    }

    fn write_document(&self, writer: &mut GoWriter) -> Result<()> {
        let service = &self.service;
        writer.open("func (svc *_service) Document() (doc service.Document) {");
        if service.internal {
            writer.line("return");
            writer.close("}");
            return Ok(());
        }
        let types = service.module().types();
        writer.line(format!(
            "document := documents.NewService(_name, {}, {})",
            go_quote(&service.title),
            go_quote(&service.description)
        ));
        for function in &service.functions {
            if function.internal() {
                continue;
            }
            let param_descriptor = match function.param() {
                Some(field) => map_type(types, field.type_id, &mut Vec::new())?,
                None => "nil".to_string(),
            };
            let result_descriptor = match function.result() {
                Some(field) => map_type(types, field.type_id, &mut Vec::new())?,
                None => "nil".to_string(),
            };
            let mut description = function.description();
            if let Some(errors_doc) = function.errors_doc() {
                if !errors_doc.is_empty() {
                    if !description.is_empty() {
                        description.push('\n');
                    }
                    description.push_str(errors_doc);
                }
            }
            writer.open("document.AddFn(");
            writer.line(format!("{},", go_quote(&function.name())));
            writer.line(format!("{},", go_quote(&function.title())));
            writer.line(format!("{},", go_quote(&description)));
            writer.line(format!("{},", function.authorization()));
            writer.line(format!("{},", function.deprecated()));
            writer.line(format!("{param_descriptor},"));
            writer.line(format!("{result_descriptor},"));
            writer.close(")");
        }
        writer.line("doc = document");
        writer.line("return");
        writer.close("}");
        Ok(())
    }
}

fn permission_target(body: &str, service: &str, ident: &str) -> Result<(String, String)> {
    match body.rsplit_once('/') {
        Some((path, name)) if !path.is_empty() && !name.is_empty() => {
            Ok((path.to_string(), name.to_string()))
        }
        _ => Err(Error::invalid_input("permission annotation must be <path>/<Ident>")
            .with_meta("service", service)
            .with_meta("fn", ident)
            .with_meta("permission", body)),
    }
}
