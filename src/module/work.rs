use std::path::Path;
use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;

use crate::errors::{Error, Result};
use crate::files;
use crate::manifest;
use crate::module::{Module, Require};

/// A parsed workspace manifest. `use` entries superimpose local module roots
/// over whatever the project requires; `replace` entries apply to any
/// requirement the project itself did not already replace.
pub struct Work {
    pub filename: String,
    pub uses: Vec<Arc<Module>>,
    pub replaces: Vec<Require>,
}

impl Work {
    pub fn parse(path: &str, pkg_dir: &str) -> Result<Arc<Work>> {
        let filename = files::absolute(path)?;
        if !files::exists(&filename) {
            return Err(Error::invalid_input("work file was not found").with_meta("path", &filename));
        }
        let dir = files::to_slash(Path::new(&filename).parent().unwrap_or(Path::new("")));
        let content = files::read_to_string(&filename)?;
        let parsed = manifest::parse_work(&content)
            .map_err(|e| Error::parse_failure("parse work file failed").with_meta("path", &filename).with_cause(e))?;

        let mut uses = Vec::new();
        for use_path in &parsed.uses {
            let use_dir = if use_path.starts_with('/') {
                use_path.clone()
            } else {
                files::normalize(&files::join(&dir, use_path))
            };
            let module = Module::load_dep(&use_dir, None, pkg_dir)?;
            debug!("workspace uses '{}' at '{}'", module.name, module.dir);
            uses.push(Arc::new(module));
        }

        let mut replaces = Vec::new();
        for replace in &parsed.replaces {
            let new_dir = if replace.is_local() {
                files::normalize(&files::join(&dir, &replace.new_path))
            } else {
                let mut d = files::join(pkg_dir, &replace.new_path);
                if let Some(version) = &replace.new_version {
                    d = format!("{d}@{version}");
                }
                d
            };
            if !files::exists(&new_dir) {
                return Err(Error::invalid_input("replace dir of require is not exist")
                    .with_meta("path", &new_dir)
                    .with_meta("work", &filename));
            }
            replaces.push(Require {
                name: replace.old_path.clone(),
                version: replace.old_version.clone().unwrap_or_default(),
                dir: String::new(),
                indirect: false,
                replace: Some(Box::new(Require::plain(
                    replace.new_path.clone(),
                    replace.new_version.clone().unwrap_or_default(),
                    new_dir,
                ))),
                module: OnceCell::new(),
            });
        }

        Ok(Arc::new(Work {
            filename,
            uses,
            replaces,
        }))
    }

    pub fn use_module(&self, path: &str) -> Option<&Arc<Module>> {
        self.uses.iter().find(|m| m.name == path)
    }
}
