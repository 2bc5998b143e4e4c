//! End-to-end generation over fixture projects written into temp dirs.
//! `GOPATH` is process-global, so every test serializes on one lock.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fngen::errors::ErrorKind;
use fngen::process::ProcessResult;
use fngen::{Options, Project};

static ENV_LOCK: Mutex<()> = Mutex::new(());

struct Fixture {
    _guard: std::sync::MutexGuard<'static, ()>,
    root: tempfile::TempDir,
    project_dir: PathBuf,
}

fn fixture() -> Fixture {
    let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let root = tempfile::tempdir().expect("create temp dir");
    let gopath = root.path().join("gopath");
    fs::create_dir_all(gopath.join("pkg/mod")).expect("create pkg cache");
    std::env::set_var("GOPATH", &gopath);
    std::env::remove_var("GOROOT");
    let project_dir = root.path().join("project");
    fs::create_dir_all(&project_dir).expect("create project dir");
    write(
        &project_dir.join("go.mod"),
        "module example.com/project\n\ngo 1.21\n",
    );
    Fixture {
        _guard: guard,
        root,
        project_dir,
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write fixture file");
}

impl Fixture {
    fn file(&self, rel: &str, content: &str) {
        write(&self.project_dir.join(rel), content);
    }

    fn dir(&self) -> String {
        self.project_dir.to_string_lossy().into_owned()
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.project_dir.join(rel)).expect("read generated file")
    }

    fn users_service(&self) {
        self.file(
            "modules/users/doc.go",
            "// @service users\n// @title Users\n// @description User service\npackage users\n",
        );
        self.file(
            "modules/users/get.go",
            r#"package users

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn getUser
// @authorization
// @timeout 2s
// @title Get User
func getUser(ctx context.Context, param GetUserParam) (result *User, err errors.CodeError) {
	result = &User{}
	return
}

type GetUserParam struct {
	// @title identifier
	Id string `json:"id" validate:"required"`
}

type User struct {
	Id   string `json:"id"`
	Name string `json:"name"`
}
"#,
        );
    }
}

fn run(project: &Project) -> Vec<ProcessResult> {
    let mut process = project.coding().expect("build process");
    process.start().iter().collect()
}

#[test]
fn generates_service_companion_and_deploys() {
    let fx = fixture();
    fx.users_service();

    let project = Project::load(&fx.dir(), Options::new()).expect("load project");
    let results = run(&project);
    for result in &results {
        assert!(result.succeed(), "unit failed: {result}");
    }
    assert_eq!(results.len(), 3, "one parse, one write, one deploy unit");

    let generated = fx.read("modules/users/fns.go");
    assert!(generated.starts_with(
        "// NOTE: this file has been automatically generated, DON'T EDIT IT."
    ));
    assert!(generated.contains("package users\n"));
    assert!(generated.contains("_name = \"users\""));
    assert!(generated.contains("_getUserFn = \"getUser\""));
    assert!(generated.contains(
        "func GetUser(ctx context.Context, argument GetUserParam) (result *User, err errors.CodeError) {"
    ));
    assert!(generated.contains("service.GetEndpoint(ctx, _name)"));
    assert!(generated.contains("case _getUserFn:"));
    assert!(generated.contains("verifyErr := authorizations.Verify(ctx)"));
    assert!(generated.contains("ctx, cancel = context.WithTimeout(ctx, 2*time.Second)"));
    assert!(generated.contains("param := GetUserParam{}"));
    assert!(generated.contains("v, err = getUser(ctx, param)"));
    assert!(generated.contains("document.AddFn("));
    assert!(generated.contains("\"getUser\","));
    assert!(generated.contains("documents.Struct(\"example.com/project/modules/users\", \"GetUserParam\")"));
    assert!(generated.contains(".AddProperty(\"id\", documents.String().SetTitle(\"identifier\").AsRequired())"));
    assert!(generated.contains("documents.Struct(\"example.com/project/modules/users\", \"User\")"));

    let deploys = fx.read("modules/fns.go");
    assert!(deploys.contains("package modules\n"));
    assert!(deploys.contains("func deploys() (v []service.Service) {"));
    assert!(deploys.contains("users.Service(),"));
}

#[test]
fn regeneration_is_byte_identical() {
    let fx = fixture();
    fx.users_service();

    let project = Project::load(&fx.dir(), Options::new()).expect("load project");
    for result in run(&project) {
        assert!(result.succeed(), "unit failed: {result}");
    }
    let first_service = fx.read("modules/users/fns.go");
    let first_deploys = fx.read("modules/fns.go");

    // delete the outputs and regenerate with a fresh load
    fs::remove_file(fx.project_dir.join("modules/users/fns.go")).unwrap();
    fs::remove_file(fx.project_dir.join("modules/fns.go")).unwrap();
    let project = Project::load(&fx.dir(), Options::new()).expect("reload project");
    for result in run(&project) {
        assert!(result.succeed(), "unit failed: {result}");
    }
    assert_eq!(first_service, fx.read("modules/users/fns.go"));
    assert_eq!(first_deploys, fx.read("modules/fns.go"));
}

#[test]
fn workspace_use_overrides_required_module() {
    let fx = fixture();
    // the required module only exists as a workspace member
    write(
        &fx.root.path().join("libs/util/go.mod"),
        "module example.com/util\n\ngo 1.21\n",
    );
    write(
        &fx.root.path().join("libs/util/meta.go"),
        "package util\n\ntype Meta struct {\n\tTrace string `json:\"trace\"`\n}\n",
    );
    write(
        &fx.root.path().join("go.work"),
        "go 1.21\n\nuse (\n\t./project\n\t./libs/util\n)\n",
    );
    fx.file(
        "go.mod",
        "module example.com/project\n\ngo 1.21\n\nrequire example.com/util v0.1.0\n",
    );
    fx.file(
        "modules/users/doc.go",
        "// @service users\npackage users\n",
    );
    fx.file(
        "modules/users/get.go",
        r#"package users

import (
	"context"

	"example.com/util"
	"github.com/aacfactory/errors"
)

// @fn getMeta
func getMeta(ctx context.Context, param MetaParam) (result util.Meta, err errors.CodeError) {
	return
}

type MetaParam struct {
	Id string `json:"id"`
}
"#,
        );

    let options = Options::new()
        .with_work(fx.root.path().join("go.work").to_string_lossy())
        .expect("workspace option");
    let project = Project::load(&fx.dir(), options).expect("load project with workspace");
    for result in run(&project) {
        assert!(result.succeed(), "unit failed: {result}");
    }
    let generated = fx.read("modules/users/fns.go");
    assert!(generated.contains("\"example.com/util\""));
    assert!(generated.contains("result util.Meta"));
    assert!(generated.contains("documents.Struct(\"example.com/util\", \"Meta\")"));
}

#[test]
fn generic_function_fails_analysis_but_step_completes() {
    let fx = fixture();
    fx.file(
        "modules/users/doc.go",
        "// @service users\npackage users\n",
    );
    fx.file(
        "modules/users/fns_src.go",
        r#"package users

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn bad
func bad[T any](ctx context.Context, param Param) (err errors.CodeError) {
	return
}

// @fn good
func good(ctx context.Context, param Param) (err errors.CodeError) {
	return
}

type Param struct {
	Id string `json:"id"`
}
"#,
    );

    let project = Project::load(&fx.dir(), Options::new()).expect("load project");
    let results = run(&project);
    let parsing: Vec<&ProcessResult> = results
        .iter()
        .filter(|r| r.step_name == "services: parsing")
        .collect();
    assert_eq!(parsing.len(), 2, "both fns report");
    let failed: Vec<&&ProcessResult> = parsing.iter().filter(|r| !r.succeed()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].error.as_ref().unwrap().kind(),
        ErrorKind::UnsupportedShape
    );
    // later steps still ran and reported
    assert!(results.iter().any(|r| r.step_name == "services: writing"));
    assert!(results.iter().any(|r| r.step_name == "services: deploying"));
}

#[test]
fn sentinel_argument_and_ignored_response() {
    let fx = fixture();
    fx.file(
        "modules/health/doc.go",
        "// @service health\npackage health\n",
    );
    fx.file(
        "modules/health/ping.go",
        r#"package health

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn ping
func ping(ctx context.Context) (err errors.CodeError) {
	return
}
"#,
    );

    let project = Project::load(&fx.dir(), Options::new()).expect("load project");
    for result in run(&project) {
        assert!(result.succeed(), "unit failed: {result}");
    }
    let generated = fx.read("modules/health/fns.go");
    assert!(generated.contains("func Ping(ctx context.Context) (err errors.CodeError) {"));
    assert!(generated.contains("service.NewArgument(service.Empty{})"));
    assert!(generated.contains("err = endpoint.RequestSync(ctx, _pingFn, service.NewArgument(service.Empty{}), nil)"));
    assert!(generated.contains("err = ping(ctx)"));
}

#[test]
fn internal_services_and_functions_skip_documents() {
    let fx = fixture();
    fx.file(
        "modules/audit/doc.go",
        "// @service audit\n// @internal\npackage audit\n",
    );
    fx.file(
        "modules/audit/log.go",
        r#"package audit

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn log
func log(ctx context.Context, param Entry) (err errors.CodeError) {
	return
}

type Entry struct {
	Message string `json:"message"`
}
"#,
    );
    fx.file(
        "modules/users/doc.go",
        "// @service users\npackage users\n",
    );
    fx.file(
        "modules/users/fns_src.go",
        r#"package users

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn touch
// @internal
func touch(ctx context.Context, param TouchParam) (err errors.CodeError) {
	return
}

// @fn get
func get(ctx context.Context, param TouchParam) (err errors.CodeError) {
	return
}

type TouchParam struct {
	Id string `json:"id"`
}
"#,
    );

    let project = Project::load(&fx.dir(), Options::new()).expect("load project");
    for result in run(&project) {
        assert!(result.succeed(), "unit failed: {result}");
    }

    let audit = fx.read("modules/audit/fns.go");
    assert!(audit.contains("func (svc *_service) Document() (doc service.Document) {\n\treturn\n}"));
    assert!(!audit.contains("documents.NewService"));

    let users = fx.read("modules/users/fns.go");
    // the internal fn stays dispatchable but is absent from documents
    assert!(users.contains("case _touchFn:"));
    assert!(users.contains("service.CanAccessInternal(ctx)"));
    assert!(users.contains("\"get\","));
    assert!(!users.contains("\"touch\","));
}

#[test]
fn components_are_composed_into_the_service() {
    let fx = fixture();
    fx.file(
        "modules/users/doc.go",
        "// @service users\npackage users\n",
    );
    fx.file(
        "modules/users/get.go",
        r#"package users

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn get
func get(ctx context.Context, param Param) (err errors.CodeError) {
	return
}

type Param struct {
	Id string `json:"id"`
}
"#,
    );
    fx.file(
        "modules/users/components/cache.go",
        "package components\n\n// @component\ntype Cache struct{}\n",
    );

    let project = Project::load(&fx.dir(), Options::new()).expect("load project");
    for result in run(&project) {
        assert!(result.succeed(), "unit failed: {result}");
    }
    let generated = fx.read("modules/users/fns.go");
    assert!(generated.contains("\"example.com/project/modules/users/components\""));
    assert!(generated.contains("&components.Cache{},"));
}

#[test]
fn middleware_order_and_transactions() {
    let fx = fixture();
    fx.file(
        "modules/orders/doc.go",
        "// @service orders\npackage orders\n",
    );
    fx.file(
        "modules/orders/create.go",
        r#"package orders

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn createOrder
// @authorization
// @permission example.com/project/security/Enforcer
// @validation
// @sql postgres
// @transactional
// @barrier
func createOrder(ctx context.Context, param CreateOrderParam) (result Order, err errors.CodeError) {
	return
}

type CreateOrderParam struct {
	Sku string `json:"sku" validate:"required"`
}

type Order struct {
	Id string `json:"id"`
}
"#,
    );
    fx.file(
        "security/enforcer.go",
        "package security\n\ntype enforcer struct{}\n\nvar Enforcer = enforcer{}\n",
    );

    let project = Project::load(&fx.dir(), Options::new()).expect("load project");
    for result in run(&project) {
        assert!(result.succeed(), "unit failed: {result}");
    }
    let generated = fx.read("modules/orders/fns.go");
    let case_start = generated.find("case _createOrderFn:").expect("dispatch case");
    let case_body = &generated[case_start..];
    let verify = case_body.find("authorizations.Verify(ctx)").expect("authorization");
    let enforce = case_body
        .find("security.Enforcer.EnforceRequest(ctx, _name, _createOrderFn)")
        .expect("permission");
    let scan = case_body.find("argument.Scan(&param)").expect("decode");
    let validate = case_body
        .find("validators.Validate(param, \"createOrder\")")
        .expect("validation");
    let database = case_body.find("sql.WithDatabase(ctx, \"postgres\")").expect("sql scope");
    let begin = case_body.find("sql.BeginTransaction(ctx)").expect("begin");
    let barrier = case_body
        .find("service.Barrier(ctx, _createOrderFn, argument,")
        .expect("barrier");
    let commit = case_body.find("sql.CommitTransaction(ctx)").expect("commit");
    assert!(verify < enforce, "authorization before permission");
    assert!(enforce < scan, "permission before decode");
    assert!(scan < validate, "decode before validation");
    assert!(validate < database, "validation before sql scope");
    assert!(database < begin, "sql scope before begin");
    assert!(begin < barrier, "begin before the call");
    assert!(barrier < commit, "call before commit");
}

#[test]
fn exported_fn_name_fails_loading() {
    let fx = fixture();
    fx.file(
        "modules/users/doc.go",
        "// @service users\npackage users\n",
    );
    fx.file(
        "modules/users/get.go",
        r#"package users

import (
	"context"

	"github.com/aacfactory/errors"
)

// @fn get
func Get(ctx context.Context) (err errors.CodeError) {
	return
}
"#,
    );

    let project = Project::load(&fx.dir(), Options::new()).expect("load project");
    let err = project.coding().unwrap_err();
    assert!(err.to_string().contains("must not be exported"));
}
