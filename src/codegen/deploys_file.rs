use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::codegen::writer::{write_imports, write_source, GoWriter};
use crate::errors::{Error, Result};
use crate::files;
use crate::module::{Imports, Service};
use crate::process;

/// The aggregator listing every generated service for deployment, written
/// into the project's modules root.
pub struct DeploysFile {
    filename: String,
    services: Vec<Arc<Service>>,
}

impl DeploysFile {
    pub fn new(dir: &str, services: Vec<Arc<Service>>) -> Self {
        DeploysFile {
            filename: files::join(dir, "fns.go"),
            services,
        }
    }

    pub fn filename(&self) -> String {
        self.filename.clone()
    }

    pub fn write(&self, ctx: &process::Context) -> Result<String> {
        let content = self.content(ctx).map_err(|e| {
            Error::invalid_input("code file write failed")
                .with_meta("kind", "deploys")
                .with_meta("file", &self.filename)
                .with_cause(e)
        })?;
        write_source(&self.filename, &content)?;
        debug!("deploys written to '{}'", self.filename);
        Ok("deploys: write succeed".to_string())
    }

    pub fn content(&self, ctx: &process::Context) -> Result<String> {
        ctx.check()?;
        let mut imports = Imports::new();
        let mut counters = HashMap::new();
        imports.add_path("github.com/aacfactory/fns/service", &mut counters);
        let mut bindings = Vec::new();
        for service in &self.services {
            bindings.push(imports.add_path(&service.path, &mut counters));
        }

        let mut writer = GoWriter::new();
        writer.line("// NOTE: this file has been automatically generated, DON'T EDIT IT.");
        writer.blank();
        writer.line("package modules");
        writer.blank();
        write_imports(&mut writer, &imports);
        writer.open("func deploys() (v []service.Service) {");
        if !self.services.is_empty() {
            writer.open("v = append(");
            writer.line("v,");
            for binding in &bindings {
                writer.line(format!("{binding}.Service(),"));
            }
            writer.close(")");
        }
        writer.line("return");
        writer.close("}");
        Ok(writer.finish())
    }
}
