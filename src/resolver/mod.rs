//! Canonical type resolution. Every named type in any known package maps to
//! one node in an append-only registry, keyed by `(path, name)`; resolution
//! is single-flighted per key, and cyclic declarations are handled by
//! seeding the key's slot with a placeholder that the finishing build
//! overwrites in place, so cyclic children end up pointing at the canonical
//! node itself.

mod types;

pub use types::{json_name, key_of, parse_field_tag, Type, TypeId, TypeKind, TypeParadigm};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::trace;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::annotations::parse_annotations;
use crate::errors::{Error, Result};
use crate::module::{Imports, Module};
use crate::parser::ast::{FieldDecl, TypeExpr};
use crate::process;

const SCALARS: &[&str] = &[
    "string", "bool", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16",
    "uint32", "uint64", "float32", "float64", "complex64", "complex128", "byte", "rune",
];

/// Whitelisted `(path, name)` pairs resolved without reading the remote
/// declaration: well-known wrappers become basics, framework markers become
/// builtins documented by reference.
fn well_known(path: &str, name: &str) -> Option<TypeKind> {
    match (path, name) {
        ("time", "Time")
        | ("time", "Duration")
        | ("encoding/json", "RawMessage")
        | ("github.com/aacfactory/json", "RawMessage")
        | ("github.com/aacfactory/json", "Object")
        | ("github.com/aacfactory/json", "Array")
        | ("github.com/aacfactory/json", "Date")
        | ("github.com/aacfactory/json", "Time")
        | ("github.com/aacfactory/fns-contrib/databases/sql", "Date")
        | ("github.com/aacfactory/fns-contrib/databases/sql", "Time")
        | ("github.com/aacfactory/fns/commons/passwords", "Password") => Some(TypeKind::Basic),
        ("github.com/aacfactory/errors", "CodeError")
        | ("github.com/aacfactory/fns/service", "Empty")
        | ("github.com/aacfactory/fns-contrib/databases/sql/dal", "PageResult") => {
            Some(TypeKind::Builtin)
        }
        _ => None,
    }
}

/// Resolution scope: the package a type expression appears in, the file's
/// import bindings, and the generic parameters currently in scope.
pub struct Scope {
    pub path: String,
    pub imports: Imports,
    pub paradigms: Vec<(String, TypeId)>,
}

impl Scope {
    pub fn new(path: impl Into<String>, imports: Imports) -> Self {
        Scope {
            path: path.into(),
            imports,
            paradigms: Vec::new(),
        }
    }

    fn paradigm(&self, name: &str) -> Option<TypeId> {
        self.paradigms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }
}

/// Per-request state: the project module to resolve against, the run's
/// cancellation token, and the keys this request is currently building.
pub struct ResolveCtx<'a> {
    pub root: &'a Arc<Module>,
    pub process: &'a process::Context,
    processing: HashMap<String, TypeId>,
}

impl<'a> ResolveCtx<'a> {
    pub fn new(root: &'a Arc<Module>, process: &'a process::Context) -> Self {
        ResolveCtx {
            root,
            process,
            processing: HashMap::new(),
        }
    }
}

struct Registry {
    nodes: Vec<Type>,
    keys: HashMap<String, TypeId>,
}

struct Flight {
    done: Mutex<bool>,
    cv: Condvar,
}

impl Flight {
    fn new() -> Self {
        Flight {
            done: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn finish(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cv.notify_all();
    }
}

/// The shared type registry. Reads go through the lock-free-ish `RwLock`
/// read path; writes happen only inside a key's single-flight build.
pub struct Types {
    registry: RwLock<Registry>,
    flights: Mutex<HashMap<String, Arc<Flight>>>,
}

impl Default for Types {
    fn default() -> Self {
        Types::new()
    }
}

impl Types {
    pub fn new() -> Self {
        Types {
            registry: RwLock::new(Registry {
                nodes: Vec::new(),
                keys: HashMap::new(),
            }),
            flights: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: TypeId) -> Type {
        self.registry.read().nodes[id.0].clone()
    }

    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.registry.read().nodes[id.0].kind
    }

    pub fn lookup(&self, key: &str) -> Option<TypeId> {
        self.registry.read().keys.get(key).copied()
    }

    fn alloc(&self, node: Type) -> TypeId {
        let mut registry = self.registry.write();
        let id = TypeId(registry.nodes.len());
        registry.nodes.push(node);
        id
    }

    fn finalize(&self, id: TypeId, node: Type) {
        self.registry.write().nodes[id.0] = node;
    }

    fn publish(&self, key: &str, id: TypeId) {
        self.registry.write().keys.insert(key.to_string(), id);
    }

    /// Publish-or-reuse for cheap keyed nodes (scalars, wrappers, markers).
    fn intern(&self, key: &str, node: Type) -> TypeId {
        if let Some(id) = self.lookup(key) {
            return id;
        }
        let mut registry = self.registry.write();
        if let Some(id) = registry.keys.get(key) {
            return *id;
        }
        let id = TypeId(registry.nodes.len());
        registry.nodes.push(node);
        registry.keys.insert(key.to_string(), id);
        id
    }

    fn basic(&self, name: &str) -> TypeId {
        self.intern(&key_of("", name), Type::named(TypeKind::Basic, "", name))
    }

    fn any(&self) -> TypeId {
        self.intern(&key_of("", "any"), Type::named(TypeKind::Any, "", "any"))
    }

    /// Resolve a type expression within a scope to its canonical node.
    pub fn resolve_expr(
        &self,
        ctx: &mut ResolveCtx,
        scope: &Scope,
        expr: &TypeExpr,
    ) -> Result<TypeId> {
        match expr {
            TypeExpr::Ident(name) => {
                if let Some(marker) = scope.paradigm(name) {
                    return Ok(marker);
                }
                if name == "any" {
                    return Ok(self.any());
                }
                if SCALARS.contains(&name.as_str()) {
                    return Ok(self.basic(name));
                }
                self.resolve_named(ctx, &scope.path, name)
            }
            TypeExpr::Selector { pkg, name } => {
                let Some(import) = scope.imports.find(pkg) else {
                    return Err(Error::resolve_failure("missing import")
                        .with_meta("ident", pkg)
                        .with_meta("path", &scope.path));
                };
                let path = import.path.clone();
                if let Some(kind) = well_known(&path, name) {
                    return Ok(self.intern(
                        &key_of(&path, name),
                        Type::named(kind, path.as_str(), name.as_str()),
                    ));
                }
                self.resolve_named(ctx, &path, name)
            }
            TypeExpr::Pointer(inner) => {
                let element = self.resolve_expr(ctx, scope, inner)?;
                let mut node = Type::new(TypeKind::Pointer);
                node.elements.push(element);
                Ok(self.alloc(node))
            }
            TypeExpr::Slice(inner) => {
                let element = self.resolve_expr(ctx, scope, inner)?;
                let mut node = Type::new(TypeKind::Array);
                node.elements.push(element);
                Ok(self.alloc(node))
            }
            TypeExpr::Array { elem, .. } => {
                let element = self.resolve_expr(ctx, scope, elem)?;
                let mut node = Type::new(TypeKind::Array);
                node.elements.push(element);
                Ok(self.alloc(node))
            }
            TypeExpr::Map { key, value } => {
                let key_id = self.resolve_expr(ctx, scope, key)?;
                if !self.is_basic_through_idents(key_id) {
                    return Err(Error::unsupported_shape("map key must be basic")
                        .with_meta("key", key.describe())
                        .with_meta("path", &scope.path));
                }
                let value_id = self.resolve_expr(ctx, scope, value)?;
                let mut node = Type::new(TypeKind::Map);
                node.elements.push(key_id);
                node.elements.push(value_id);
                Ok(self.alloc(node))
            }
            TypeExpr::Struct(fields) => {
                let elements = self.build_fields(ctx, scope, fields)?;
                let mut node = Type::new(TypeKind::Struct);
                node.elements = elements;
                Ok(self.alloc(node))
            }
            TypeExpr::Interface(terms) => {
                if terms.is_empty() {
                    return Ok(self.any());
                }
                Ok(self.alloc(Type::new(TypeKind::Interface)))
            }
            TypeExpr::Index { base, args } => self.instantiate(ctx, scope, base, args),
            TypeExpr::Union(_) => Err(Error::unsupported_shape(
                "union types are only supported as generic constraints",
            )
            .with_meta("path", &scope.path)),
            TypeExpr::FuncType => Err(Error::unsupported_shape("function types are not supported")
                .with_meta("path", &scope.path)),
            TypeExpr::Chan(_) => Err(Error::unsupported_shape("channel types are not supported")
                .with_meta("path", &scope.path)),
        }
    }

    /// Resolve a named declaration, single-flighted and cycle-safe.
    fn resolve_named(&self, ctx: &mut ResolveCtx, path: &str, name: &str) -> Result<TypeId> {
        let key = key_of(path, name);
        let started = Instant::now();
        loop {
            if let Some(id) = self.lookup(&key) {
                return Ok(id);
            }
            if let Some(id) = ctx.processing.get(&key) {
                // a cycle on this request's own stack: hand back the
                // placeholder slot, the enclosing build finishes it
                return Ok(*id);
            }
            let flight = {
                let mut flights = self.flights.lock();
                if let Some(id) = self.lookup(&key) {
                    return Ok(id);
                }
                match flights.get(&key) {
                    Some(flight) => Some(flight.clone()),
                    None => {
                        flights.insert(key.clone(), Arc::new(Flight::new()));
                        None
                    }
                }
            };
            let Some(flight) = flight else {
                // claimed: build, then release the slot whatever happened
                let built = self.build_named(ctx, path, name, &key);
                let removed = self.flights.lock().remove(&key);
                if let Some(flight) = removed {
                    flight.finish();
                }
                return built;
            };
            self.wait_flight(ctx, &flight, started, &key)?;
        }
    }

    fn wait_flight(
        &self,
        ctx: &ResolveCtx,
        flight: &Flight,
        started: Instant,
        key: &str,
    ) -> Result<()> {
        let mut done = flight.done.lock();
        while !*done {
            ctx.process.check()?;
            if started.elapsed() > Duration::from_secs(30) {
                return Err(Error::resolve_failure("cyclic placeholder never resolved")
                    .with_meta("key", key));
            }
            self.cv_wait(flight, &mut done);
        }
        Ok(())
    }

    fn cv_wait(&self, flight: &Flight, done: &mut parking_lot::MutexGuard<'_, bool>) {
        let _ = flight.cv.wait_for(done, Duration::from_millis(100));
    }

    fn build_named(
        &self,
        ctx: &mut ResolveCtx,
        path: &str,
        name: &str,
        key: &str,
    ) -> Result<TypeId> {
        ctx.process.check()?;
        trace!("resolving type '{key}'");
        let module = ctx.root.module_of(path)?;
        let found = module.sources().find_type(path, name).map_err(|e| {
            Error::resolve_failure("read type declaration failed")
                .with_meta("path", path)
                .with_meta("name", name)
                .with_cause(e)
        })?;
        let Some(found) = found else {
            return Err(Error::resolve_failure("type was not found")
                .with_meta("path", path)
                .with_meta("name", name));
        };
        let annotations = match &found.decl.doc {
            Some(doc) => parse_annotations(doc)?,
            None => Default::default(),
        };

        let placeholder = self.alloc(Type::named(TypeKind::Reference, path, name));
        ctx.processing.insert(key.to_string(), placeholder);

        let build = (|| -> Result<Type> {
            let mut scope = Scope::new(path, found.imports.clone());
            let mut paradigms = Vec::new();
            for type_param in &found.decl.type_params {
                for param_name in &type_param.names {
                    let constraint = self.resolve_constraint(ctx, &scope, &type_param.constraint)?;
                    let marker = self.alloc(Type::named(
                        TypeKind::ParadigmElement,
                        "",
                        param_name.as_str(),
                    ));
                    paradigms.push(TypeParadigm {
                        name: param_name.clone(),
                        types: constraint,
                    });
                    scope.paradigms.push((param_name.clone(), marker));
                }
            }
            let mut node = match &found.decl.expr {
                TypeExpr::Struct(fields) => {
                    let mut node = Type::named(TypeKind::Struct, path, name);
                    node.elements = self.build_fields(ctx, &scope, fields)?;
                    node
                }
                TypeExpr::Interface(_) => Type::named(TypeKind::Interface, path, name),
                other => {
                    let inner = self.resolve_expr(ctx, &mut scope, other)?;
                    let mut node = Type::named(TypeKind::Ident, path, name);
                    node.elements.push(inner);
                    node
                }
            };
            node.annotations = annotations;
            node.paradigms = paradigms;
            Ok(node)
        })();

        ctx.processing.remove(key);
        match build {
            Ok(node) => {
                // the placeholder slot becomes the canonical node, which is
                // exactly what cyclic children already point at
                self.finalize(placeholder, node);
                self.publish(key, placeholder);
                Ok(placeholder)
            }
            Err(err) => Err(err),
        }
    }

    fn build_fields(
        &self,
        ctx: &mut ResolveCtx,
        scope: &Scope,
        fields: &[FieldDecl],
    ) -> Result<Vec<TypeId>> {
        let mut elements = Vec::new();
        for field in fields {
            let annotations = match &field.doc {
                Some(doc) => parse_annotations(doc)?,
                None => Default::default(),
            };
            let tags = field
                .tag
                .as_deref()
                .map(parse_field_tag)
                .unwrap_or_default();
            if tags.get("json").map(String::as_str) == Some("-") {
                continue;
            }
            if field.embedded {
                let embedded_name = embedded_field_name(&field.expr);
                if !is_exported(&embedded_name) {
                    continue;
                }
                let inner = self.resolve_expr(ctx, scope, &field.expr)?;
                let mut node = Type::named(TypeKind::StructField, "", embedded_name.as_str());
                node.annotations = annotations;
                node.tags = tags;
                node.elements.push(inner);
                elements.push(self.alloc(node));
                continue;
            }
            let exported: Vec<&String> = field.names.iter().filter(|n| is_exported(n)).collect();
            if exported.is_empty() {
                continue;
            }
            let inner = self.resolve_expr(ctx, scope, &field.expr)?;
            let kind = if mentions_paradigm(&field.expr, scope) {
                TypeKind::ParadigmElement
            } else {
                TypeKind::StructField
            };
            for field_name in exported {
                let mut node = Type::named(kind, "", field_name.as_str());
                node.annotations = annotations.clone();
                node.tags = tags.clone();
                node.elements.push(inner);
                elements.push(self.alloc(node));
            }
        }
        Ok(elements)
    }

    fn resolve_constraint(
        &self,
        ctx: &mut ResolveCtx,
        scope: &Scope,
        expr: &TypeExpr,
    ) -> Result<Vec<TypeId>> {
        match expr {
            TypeExpr::Union(terms) => {
                let mut ids = Vec::new();
                for term in terms {
                    ids.extend(self.resolve_constraint(ctx, scope, term)?);
                }
                Ok(ids)
            }
            TypeExpr::Interface(terms) => {
                let mut ids = Vec::new();
                for term in terms {
                    ids.extend(self.resolve_constraint(ctx, scope, term)?);
                }
                Ok(ids)
            }
            other => Ok(vec![self.resolve_expr(ctx, scope, other)?]),
        }
    }

    /// Resolve a generic instantiation: the canonical definition is kept as
    /// is, the substituted shape is recorded alongside it.
    fn instantiate(
        &self,
        ctx: &mut ResolveCtx,
        scope: &Scope,
        base: &TypeExpr,
        args: &[TypeExpr],
    ) -> Result<TypeId> {
        let canonical = self.resolve_expr(ctx, scope, base)?;
        let mut arg_ids = Vec::new();
        for arg in args {
            arg_ids.push(self.resolve_expr(ctx, scope, arg)?);
        }
        let canonical_node = self.get(canonical);
        if canonical_node.kind == TypeKind::Reference {
            // instantiating a type that is itself mid-resolution on this
            // request; fall back to the canonical slot
            return Ok(canonical);
        }
        let inst_key = self.instantiation_key(&canonical_node, &arg_ids);
        if let Some(id) = self.lookup(&inst_key) {
            return Ok(id);
        }

        let mut paradigms = Vec::new();
        let mut mapping = HashMap::new();
        if canonical_node.paradigms.is_empty() {
            // a builtin generic carries no declared parameters, keep the
            // arguments for rendering all the same
            for arg in &arg_ids {
                paradigms.push(TypeParadigm {
                    name: String::new(),
                    types: vec![*arg],
                });
            }
        } else {
            for (idx, paradigm) in canonical_node.paradigms.iter().enumerate() {
                let Some(arg) = arg_ids.get(idx) else {
                    return Err(Error::unsupported_shape("generic argument count mismatch")
                        .with_meta("type", canonical_node.key()));
                };
                paradigms.push(TypeParadigm {
                    name: paradigm.name.clone(),
                    types: vec![*arg],
                });
                mapping.insert(paradigm.name.clone(), *arg);
            }
        }
        let packed = if canonical_node.kind == TypeKind::Builtin || mapping.is_empty() {
            None
        } else {
            let mut memo = HashMap::new();
            Some(self.substitute(canonical, &mapping, &mut memo))
        };
        let mut node = Type::named(
            TypeKind::Paradigm,
            canonical_node.path.as_str(),
            canonical_node.name.as_str(),
        );
        node.paradigms = paradigms;
        node.elements.push(canonical);
        node.packed = packed;
        let id = self.intern(&inst_key, node);
        Ok(id)
    }

    fn instantiation_key(&self, canonical: &Type, args: &[TypeId]) -> String {
        let parts: Vec<String> = args
            .iter()
            .map(|id| {
                let node = self.get(*id);
                if node.name.is_empty() {
                    format!("#{}", id.0)
                } else {
                    node.key()
                }
            })
            .collect();
        format!("{}[{}]", canonical.key(), parts.join(","))
    }

    /// Deep-copy `id` with generic parameter markers swapped for concrete
    /// arguments; subtrees without markers are shared, not copied.
    fn substitute(
        &self,
        id: TypeId,
        mapping: &HashMap<String, TypeId>,
        memo: &mut HashMap<TypeId, TypeId>,
    ) -> TypeId {
        if let Some(copied) = memo.get(&id) {
            return *copied;
        }
        let node = self.get(id);
        if node.is_paradigm_marker() {
            if let Some(replacement) = mapping.get(&node.name) {
                return *replacement;
            }
            return id;
        }
        let mut visited = HashSet::new();
        if !self.involves_markers(id, &mut visited) {
            return id;
        }
        let slot = self.alloc(Type::named(
            TypeKind::Reference,
            node.path.as_str(),
            node.name.as_str(),
        ));
        memo.insert(id, slot);
        let mut copy = node.clone();
        if copy.kind == TypeKind::ParadigmElement {
            copy.kind = TypeKind::StructField;
        }
        copy.elements = copy
            .elements
            .iter()
            .map(|child| self.substitute(*child, mapping, memo))
            .collect();
        if let Some(packed) = copy.packed {
            copy.packed = Some(self.substitute(packed, mapping, memo));
        }
        self.finalize(slot, copy);
        slot
    }

    fn involves_markers(&self, id: TypeId, visited: &mut HashSet<TypeId>) -> bool {
        if !visited.insert(id) {
            return false;
        }
        let node = self.get(id);
        if node.kind == TypeKind::ParadigmElement {
            return true;
        }
        for child in &node.elements {
            if self.involves_markers(*child, visited) {
                return true;
            }
        }
        if let Some(packed) = node.packed {
            if self.involves_markers(packed, visited) {
                return true;
            }
        }
        false
    }

    pub fn is_basic_through_idents(&self, id: TypeId) -> bool {
        let mut current = id;
        loop {
            let node = self.get(current);
            match node.kind {
                TypeKind::Basic => return true,
                TypeKind::Ident => match node.elements.first() {
                    Some(inner) => current = *inner,
                    None => return false,
                },
                _ => return false,
            }
        }
    }

    /// Foreign package paths needed to name a type, generic arguments
    /// included.
    pub fn top_paths(&self, id: TypeId) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_top_paths(id, &mut paths, &mut HashSet::new());
        paths
    }

    fn collect_top_paths(&self, id: TypeId, out: &mut Vec<String>, visited: &mut HashSet<TypeId>) {
        if !visited.insert(id) {
            return;
        }
        let node = self.get(id);
        match node.kind {
            TypeKind::Struct
            | TypeKind::Interface
            | TypeKind::Ident
            | TypeKind::Builtin
            | TypeKind::Basic
            | TypeKind::Reference => {
                if !node.path.is_empty() && !out.contains(&node.path) {
                    out.push(node.path.clone());
                }
            }
            TypeKind::Paradigm => {
                if !node.path.is_empty() && !out.contains(&node.path) {
                    out.push(node.path.clone());
                }
                for paradigm in &node.paradigms {
                    for arg in &paradigm.types {
                        self.collect_top_paths(*arg, out, visited);
                    }
                }
            }
            TypeKind::Pointer | TypeKind::Array => {
                if let Some(element) = node.elements.first() {
                    self.collect_top_paths(*element, out, visited);
                }
            }
            TypeKind::Map => {
                if let Some(value) = node.elements.get(1) {
                    self.collect_top_paths(*value, out, visited);
                }
            }
            _ => {}
        }
    }
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn embedded_field_name(expr: &TypeExpr) -> String {
    match expr {
        TypeExpr::Ident(name) => name.clone(),
        TypeExpr::Selector { name, .. } => name.clone(),
        TypeExpr::Pointer(inner) => embedded_field_name(inner),
        TypeExpr::Index { base, .. } => embedded_field_name(base),
        _ => String::new(),
    }
}

fn mentions_paradigm(expr: &TypeExpr, scope: &Scope) -> bool {
    match expr {
        TypeExpr::Ident(name) => scope.paradigm(name).is_some(),
        TypeExpr::Selector { .. } | TypeExpr::FuncType => false,
        TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) | TypeExpr::Chan(inner) => {
            mentions_paradigm(inner, scope)
        }
        TypeExpr::Array { elem, .. } => mentions_paradigm(elem, scope),
        TypeExpr::Map { key, value } => {
            mentions_paradigm(key, scope) || mentions_paradigm(value, scope)
        }
        TypeExpr::Struct(fields) => fields.iter().any(|f| mentions_paradigm(&f.expr, scope)),
        TypeExpr::Interface(terms) | TypeExpr::Union(terms) => {
            terms.iter().any(|t| mentions_paradigm(t, scope))
        }
        TypeExpr::Index { base, args } => {
            mentions_paradigm(base, scope) || args.iter().any(|a| mentions_paradigm(a, scope))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Imports;
    use crate::testutil;

    fn empty_scope(path: &str) -> Scope {
        Scope::new(path, Imports::new())
    }

    #[test]
    fn cyclic_struct_resolves_to_one_canonical_instance() {
        let project = testutil::project();
        project.file(
            "types/tree.go",
            "package types\n\ntype Tree struct {\n\tName     string  `json:\"name\"`\n\tChildren []*Tree `json:\"children\"`\n}\n",
        );
        let module = crate::module::Module::load(&project.mod_path()).unwrap();
        let process = crate::process::Context::new();
        let mut ctx = ResolveCtx::new(&module, &process);
        let scope = empty_scope("example.com/project/types");
        let types = module.types();

        let tree = types
            .resolve_expr(&mut ctx, &scope, &TypeExpr::Ident("Tree".to_string()))
            .unwrap();
        let node = types.get(tree);
        assert_eq!(node.kind, TypeKind::Struct);
        assert_eq!(node.name, "Tree");
        assert_eq!(node.elements.len(), 2);

        let children_field = types.get(node.elements[1]);
        assert_eq!(children_field.kind, TypeKind::StructField);
        let array = types.get(children_field.elements[0]);
        assert_eq!(array.kind, TypeKind::Array);
        let pointer = types.get(array.elements[0]);
        assert_eq!(pointer.kind, TypeKind::Pointer);
        // the cycle closes on the canonical node itself
        assert_eq!(pointer.elements[0], tree);

        // a second walk observes the same instance
        let mut ctx2 = ResolveCtx::new(&module, &process);
        let again = types
            .resolve_expr(&mut ctx2, &scope, &TypeExpr::Ident("Tree".to_string()))
            .unwrap();
        assert_eq!(again, tree);

        // no reference placeholder survives in the reachable graph
        let mut stack = vec![tree];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let node = types.get(id);
            assert_ne!(node.kind, TypeKind::Reference);
            stack.extend(node.elements.iter().copied());
        }
    }

    #[test]
    fn scalars_wrappers_and_any() {
        let project = testutil::project();
        project.file("types/doc.go", "package types\n");
        let module = crate::module::Module::load(&project.mod_path()).unwrap();
        let process = crate::process::Context::new();
        let mut ctx = ResolveCtx::new(&module, &process);
        let scope = empty_scope("example.com/project/types");
        let types = module.types();

        let s = types
            .resolve_expr(&mut ctx, &scope, &TypeExpr::Ident("string".to_string()))
            .unwrap();
        assert_eq!(types.get(s).kind, TypeKind::Basic);
        let s2 = types
            .resolve_expr(&mut ctx, &scope, &TypeExpr::Ident("string".to_string()))
            .unwrap();
        assert_eq!(s, s2);

        let any = types
            .resolve_expr(&mut ctx, &scope, &TypeExpr::Ident("any".to_string()))
            .unwrap();
        assert_eq!(types.get(any).kind, TypeKind::Any);

        let mut imports = Imports::new();
        imports.add(crate::module::Import::new("time"));
        let scope = Scope::new("example.com/project/types", imports);
        let datetime = types
            .resolve_expr(
                &mut ctx,
                &scope,
                &TypeExpr::Selector {
                    pkg: "time".to_string(),
                    name: "Time".to_string(),
                },
            )
            .unwrap();
        let node = types.get(datetime);
        assert_eq!(node.kind, TypeKind::Basic);
        assert_eq!(node.path, "time");
    }

    #[test]
    fn map_keys_must_be_basic_through_idents() {
        let project = testutil::project();
        project.file(
            "types/types.go",
            "package types\n\ntype Id string\n\ntype Obj struct {\n\tName string `json:\"name\"`\n}\n",
        );
        let module = crate::module::Module::load(&project.mod_path()).unwrap();
        let process = crate::process::Context::new();
        let mut ctx = ResolveCtx::new(&module, &process);
        let scope = empty_scope("example.com/project/types");
        let types = module.types();

        let ok = types.resolve_expr(
            &mut ctx,
            &scope,
            &TypeExpr::Map {
                key: Box::new(TypeExpr::Ident("Id".to_string())),
                value: Box::new(TypeExpr::Ident("Obj".to_string())),
            },
        );
        assert!(ok.is_ok());

        let bad = types.resolve_expr(
            &mut ctx,
            &scope,
            &TypeExpr::Map {
                key: Box::new(TypeExpr::Ident("Obj".to_string())),
                value: Box::new(TypeExpr::Ident("string".to_string())),
            },
        );
        assert_eq!(
            bad.unwrap_err().kind(),
            crate::errors::ErrorKind::UnsupportedShape
        );
    }

    #[test]
    fn named_alias_wraps_underlying_type() {
        let project = testutil::project();
        project.file(
            "types/types.go",
            "package types\n\ntype Names []string\n",
        );
        let module = crate::module::Module::load(&project.mod_path()).unwrap();
        let process = crate::process::Context::new();
        let mut ctx = ResolveCtx::new(&module, &process);
        let scope = empty_scope("example.com/project/types");
        let types = module.types();

        let id = types
            .resolve_expr(&mut ctx, &scope, &TypeExpr::Ident("Names".to_string()))
            .unwrap();
        let node = types.get(id);
        assert_eq!(node.kind, TypeKind::Ident);
        assert_eq!(node.name, "Names");
        assert_eq!(types.get(node.elements[0]).kind, TypeKind::Array);
    }

    #[test]
    fn generic_instantiation_packs_a_substituted_shape() {
        let project = testutil::project();
        project.file(
            "types/types.go",
            "package types\n\ntype List[E any] struct {\n\tItems []E  `json:\"items\"`\n\tTotal int64 `json:\"total\"`\n}\n\ntype User struct {\n\tId string `json:\"id\"`\n}\n",
        );
        let module = crate::module::Module::load(&project.mod_path()).unwrap();
        let process = crate::process::Context::new();
        let mut ctx = ResolveCtx::new(&module, &process);
        let scope = empty_scope("example.com/project/types");
        let types = module.types();

        let inst = types
            .resolve_expr(
                &mut ctx,
                &scope,
                &TypeExpr::Index {
                    base: Box::new(TypeExpr::Ident("List".to_string())),
                    args: vec![TypeExpr::Ident("User".to_string())],
                },
            )
            .unwrap();
        let node = types.get(inst);
        assert_eq!(node.kind, TypeKind::Paradigm);
        assert_eq!(node.name, "List");
        assert_eq!(node.paradigms.len(), 1);

        let packed = types.get(node.packed.expect("instantiation is packed"));
        assert_eq!(packed.kind, TypeKind::Struct);
        // the substituted field is a plain struct field over []User
        let items = types.get(packed.elements[0]);
        assert_eq!(items.kind, TypeKind::StructField);
        let array = types.get(items.elements[0]);
        assert_eq!(array.kind, TypeKind::Array);
        assert_eq!(types.get(array.elements[0]).name, "User");
        // the untouched field is shared with the canonical definition
        let canonical = types.get(node.elements[0]);
        assert_eq!(packed.elements[1], canonical.elements[1]);

        // resolving the same instantiation again reuses the node
        let again = types
            .resolve_expr(
                &mut ctx,
                &scope,
                &TypeExpr::Index {
                    base: Box::new(TypeExpr::Ident("List".to_string())),
                    args: vec![TypeExpr::Ident("User".to_string())],
                },
            )
            .unwrap();
        assert_eq!(again, inst);
    }

    #[test]
    fn unexported_and_skipped_fields_are_dropped() {
        let project = testutil::project();
        project.file(
            "types/types.go",
            "package types\n\ntype Obj struct {\n\tId     string `json:\"id\"`\n\tSecret string `json:\"-\"`\n\thidden string\n}\n",
        );
        let module = crate::module::Module::load(&project.mod_path()).unwrap();
        let process = crate::process::Context::new();
        let mut ctx = ResolveCtx::new(&module, &process);
        let scope = empty_scope("example.com/project/types");
        let types = module.types();

        let id = types
            .resolve_expr(&mut ctx, &scope, &TypeExpr::Ident("Obj".to_string()))
            .unwrap();
        let node = types.get(id);
        assert_eq!(node.elements.len(), 1);
        assert_eq!(types.get(node.elements[0]).name, "Id");
    }

    #[test]
    fn unknown_identifier_is_a_resolve_failure() {
        let project = testutil::project();
        project.file("types/doc.go", "package types\n");
        let module = crate::module::Module::load(&project.mod_path()).unwrap();
        let process = crate::process::Context::new();
        let mut ctx = ResolveCtx::new(&module, &process);
        let scope = empty_scope("example.com/project/types");
        let err = module
            .types()
            .resolve_expr(&mut ctx, &scope, &TypeExpr::Ident("Missing".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ResolveFailure);
    }
}
