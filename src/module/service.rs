use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use log::debug;

use crate::annotations::parse_annotations;
use crate::errors::{Error, Result};
use crate::files;
use crate::module::{Function, Imports, Module};

/// An annotated type of the service's `components` sub-package, injected
/// into the service base at composition time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub ident: String,
}

/// A directory under the project's `modules` root whose `doc.go` carries a
/// `@service` annotation.
pub struct Service {
    module: Arc<Module>,
    pub path: String,
    pub dir: String,
    pub name: String,
    pub internal: bool,
    pub title: String,
    pub description: String,
    pub functions: Vec<Arc<Function>>,
    pub components: Vec<Component>,
}

impl Service {
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// The package path of the service's components, when it has any.
    pub fn components_path(&self) -> Option<String> {
        if self.components.is_empty() {
            None
        } else {
            Some(format!("{}/components", self.path))
        }
    }
}

impl Module {
    /// Discover the services declared under `<dir>/modules`.
    pub fn services(self: &Arc<Self>) -> Result<Vec<Arc<Service>>> {
        let root = files::join(&self.dir, "modules");
        if !files::exists(&root) {
            return Err(Error::invalid_input("modules dir was not found")
                .with_meta("dir", &root));
        }
        let entries = fs::read_dir(&root).map_err(|e| {
            Error::io_failure("read modules dir failed")
                .with_meta("dir", &root)
                .with_cause(e)
        })?;
        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::io_failure("read modules dir failed")
                    .with_meta("dir", &root)
                    .with_cause(e)
            })?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        let mut services = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();
        for name in names {
            let path = format!("{}/modules/{}", self.name, name);
            let Some(service) = try_load_service(self, &path)? else {
                continue;
            };
            if let Some(previous) = seen.insert(service.name.clone(), path.clone()) {
                return Err(Error::invalid_input("service name is duplicated")
                    .with_meta("service", &service.name)
                    .with_meta("first", previous)
                    .with_meta("second", path));
            }
            services.push(Arc::new(service));
        }
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }
}

fn try_load_service(module: &Arc<Module>, path: &str) -> Result<Option<Service>> {
    let dir = module.sources().dir_of(path)?;
    if !files::exists(&files::join(&dir, "doc.go")) {
        return Ok(None);
    }
    let file = module.sources().read_file(path, "doc.go")?;
    let dir_name = path.rsplit('/').next().unwrap_or(path);
    if file.package != dir_name {
        return Err(Error::invalid_input("pkg must be same as dir name")
            .with_meta("path", path)
            .with_meta("pkg", &file.package));
    }
    let Some(doc) = &file.doc else {
        return Ok(None);
    };
    let annotations = parse_annotations(doc)
        .map_err(|e| Error::parse_failure("parse service doc failed").with_meta("path", path).with_cause(e))?;
    let Some(name) = annotations.get("service") else {
        return Ok(None);
    };
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(Error::invalid_input("service name is required").with_meta("path", path));
    }
    debug!("loading service '{name}' at '{path}'");
    let mut service = Service {
        module: module.clone(),
        path: path.to_string(),
        dir,
        name,
        internal: annotations.contains("internal"),
        title: annotations.get("title").unwrap_or("").to_string(),
        description: annotations.get("description").unwrap_or("").to_string(),
        functions: Vec::new(),
        components: Vec::new(),
    };
    load_functions(module, &mut service)?;
    load_components(module, &mut service)?;
    service.functions.sort_by(|a, b| a.ident.cmp(&b.ident));
    service.components.sort_by(|a, b| a.ident.cmp(&b.ident));
    let mut fn_names: HashMap<String, String> = HashMap::new();
    for function in &service.functions {
        if let Some(previous) = fn_names.insert(function.name(), function.ident.clone()) {
            return Err(Error::invalid_input("fn name is duplicated")
                .with_meta("service", &service.name)
                .with_meta("fn", function.name())
                .with_meta("first", previous)
                .with_meta("second", &function.ident));
        }
    }
    Ok(Some(service))
}

fn load_functions(module: &Arc<Module>, service: &mut Service) -> Result<()> {
    let mut functions = Vec::new();
    module.sources().read_dir(&service.path, |file, filename| {
        let imports = Imports::from_file(file);
        for decl in &file.funcs {
            if decl.has_receiver {
                continue;
            }
            let Some(doc) = &decl.doc else {
                continue;
            };
            if !doc.contains("@fn") {
                continue;
            }
            let ident = decl.name.as_str();
            if ident
                .chars()
                .next()
                .is_some_and(char::is_uppercase)
            {
                return Err(Error::invalid_input("fn name must not be exported")
                    .with_meta("file", filename)
                    .with_meta("fn", ident));
            }
            let annotations = parse_annotations(doc).map_err(|e| {
                Error::parse_failure("parse fn annotations failed")
                    .with_meta("file", filename)
                    .with_meta("fn", ident)
                    .with_cause(e)
            })?;
            functions.push(Arc::new(Function::new(
                module.clone(),
                service.name.clone(),
                service.path.clone(),
                imports.clone(),
                decl.clone(),
                annotations,
            )));
        }
        Ok(())
    })?;
    service.functions = functions;
    Ok(())
}

fn load_components(module: &Arc<Module>, service: &mut Service) -> Result<()> {
    let components_path = format!("{}/components", service.path);
    let dir = module.sources().dir_of(&components_path)?;
    if !files::exists(&dir) {
        return Ok(());
    }
    let mut components = Vec::new();
    module.sources().read_dir(&components_path, |file, filename| {
        for decl in &file.types {
            let Some(doc) = &decl.doc else {
                continue;
            };
            if !doc.contains("@component") {
                continue;
            }
            if !decl
                .name
                .chars()
                .next()
                .is_some_and(char::is_uppercase)
            {
                return Err(Error::invalid_input("component name must be exported")
                    .with_meta("file", filename)
                    .with_meta("component", &decl.name));
            }
            components.push(Component {
                ident: decl.name.clone(),
            });
        }
        Ok(())
    })?;
    service.components = components;
    Ok(())
}
