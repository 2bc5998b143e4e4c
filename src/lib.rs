pub mod annotations;
pub mod codegen;
pub mod errors;
pub mod files;
pub mod lexer;
pub mod manifest;
pub mod module;
pub mod parser;
pub mod process;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use crate::codegen::{DeploysFile, ServiceFile};
use crate::errors::{Error, Result};
use crate::module::Module;
use crate::process::{Process, Unit};

/// Project loading options.
#[derive(Debug, Clone, Default)]
pub struct Options {
    work: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Options { work: None }
    }

    /// Superimpose a workspace manifest over the project's requirements.
    pub fn with_work(mut self, work: impl Into<String>) -> Result<Self> {
        let work = work.into().trim().to_string();
        if work.is_empty() {
            return Err(Error::invalid_input("workspace option is invalid"));
        }
        self.work = Some(work);
        Ok(self)
    }
}

/// A loaded project: the module graph rooted at `<dir>/go.mod`.
pub struct Project {
    pub module: Arc<Module>,
}

impl Project {
    pub fn load(dir: &str, options: Options) -> Result<Project> {
        let dir = dir.trim();
        if dir.is_empty() {
            return Err(Error::invalid_input("load project failed")
                .with_cause(Error::invalid_input("project dir is nil")));
        }
        let mod_path = files::join(dir, "go.mod");
        let module = match &options.work {
            Some(work) => Module::load_with_work(&mod_path, work),
            None => Module::load(&mod_path),
        }
        .map_err(|e| Error::invalid_input("load project failed").with_cause(e))?;
        Ok(Project { module })
    }

    /// Build the generation process: analyze every function, write every
    /// service file, then the deploys aggregator.
    pub fn coding(&self) -> Result<Process> {
        let services = self
            .module
            .services()
            .map_err(|e| Error::invalid_input("project coding failed").with_cause(e))?;
        let mut process = Process::new();

        let mut parse_units: Vec<Unit> = Vec::new();
        let mut write_units: Vec<Unit> = Vec::new();
        for service in &services {
            for function in &service.functions {
                let function = function.clone();
                parse_units.push(Box::new(move |ctx| function.parse(ctx)));
            }
            let file = ServiceFile::new(service.clone());
            write_units.push(Box::new(move |ctx| file.write(ctx)));
        }
        let deploys = DeploysFile::new(&files::join(&self.module.dir, "modules"), services);
        let deploy_units: Vec<Unit> = vec![Box::new(move |ctx| deploys.write(ctx))];

        process.add("services: parsing", parse_units);
        process.add("services: writing", write_units);
        process.add("services: deploying", deploy_units);
        Ok(process)
    }
}
