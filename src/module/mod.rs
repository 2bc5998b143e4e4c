//! Module graph resolution: the project's own module, its requirements and
//! replacements, and an optional superimposed workspace, all mapped down to
//! on-disk directories. Requirement modules parse lazily, at most once, on
//! the first type lookup that crosses a module boundary.

pub mod env;
mod function;
mod import;
mod service;
mod sources;
mod work;

pub use function::{Function, FunctionField, parse_go_duration};
pub use import::{Import, Imports};
pub use service::{Component, Service};
pub use sources::{FoundType, Sources};
pub use work::Work;

use std::path::Path;
use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;

use crate::errors::{Error, Result};
use crate::files;
use crate::manifest;
use crate::resolver::Types;

pub struct Module {
    /// Path of the manifest file this module was parsed from.
    pub path: String,
    pub dir: String,
    pub name: String,
    pub version: Option<String>,
    pub go_version: Option<String>,
    pub requires: Vec<Require>,
    work: Option<Arc<Work>>,
    sources: Sources,
    pkg_dir: String,
    types: Types,
}

pub struct Require {
    pub name: String,
    pub version: String,
    pub dir: String,
    pub indirect: bool,
    pub replace: Option<Box<Require>>,
    module: OnceCell<Arc<Module>>,
}

impl Require {
    pub fn plain(name: String, version: String, dir: String) -> Self {
        Require {
            name,
            version,
            dir,
            indirect: false,
            replace: None,
            module: OnceCell::new(),
        }
    }

    /// The directory all file access for this requirement goes through.
    pub fn effective_dir(&self) -> &str {
        match &self.replace {
            Some(replace) => &replace.dir,
            None => &self.dir,
        }
    }

    /// Parse the requirement's own manifest, once. The binding name stays
    /// the required path even when a replacement redirects the directory.
    fn parsed(&self, pkg_dir: &str) -> Result<&Arc<Module>> {
        self.module.get_or_try_init(|| {
            debug!("parsing require '{}@{}'", self.name, self.version);
            let module = Module::load_dep(self.effective_dir(), Some(&self.name), pkg_dir)?;
            Ok(Arc::new(module))
        })
    }
}

impl Module {
    /// Load the project module rooted at a manifest path.
    pub fn load(mod_path: &str) -> Result<Arc<Module>> {
        let pkg_dir = env::pkg_dir()?;
        Self::load_root(mod_path, None, &pkg_dir)
    }

    /// Load the project module with a workspace manifest superimposed.
    pub fn load_with_work(mod_path: &str, work_path: &str) -> Result<Arc<Module>> {
        let pkg_dir = env::pkg_dir()?;
        let work = Work::parse(work_path, &pkg_dir)?;
        Self::load_root(mod_path, Some(work), &pkg_dir)
    }

    fn load_root(mod_path: &str, work: Option<Arc<Work>>, pkg_dir: &str) -> Result<Arc<Module>> {
        let path = files::absolute(mod_path)?;
        if !files::exists(&path) {
            return Err(Error::invalid_input("mod file was not found").with_meta("path", &path));
        }
        let dir = files::to_slash(Path::new(&path).parent().unwrap_or(Path::new("")));
        let content = files::read_to_string(&path)?;
        let parsed = manifest::parse_mod(&content)
            .map_err(|e| Error::parse_failure("parse mod file failed").with_meta("path", &path).with_cause(e))?;

        let mut requires = Vec::new();
        for require in &parsed.requires {
            let require_dir = files::join(
                pkg_dir,
                &format!("{}@{}", require.path, require.version),
            );
            let mut entry = Require {
                name: require.path.clone(),
                version: require.version.clone(),
                dir: require_dir,
                indirect: require.indirect,
                replace: None,
                module: OnceCell::new(),
            };
            if let Some(work) = &work {
                if let Some(used) = work.use_module(&require.path) {
                    // the workspace module wins verbatim, whatever the version
                    entry.replace = Some(Box::new(Require::plain(
                        require.path.clone(),
                        String::new(),
                        used.dir.clone(),
                    )));
                }
            }
            requires.push(entry);
        }

        for replace in &parsed.replaces {
            let matched = requires.iter_mut().find(|r| {
                r.replace.is_none()
                    && r.name == replace.old_path
                    && replace
                        .old_version
                        .as_deref()
                        .map(|v| v == r.version)
                        .unwrap_or(true)
            });
            let Some(require) = matched else {
                continue;
            };
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
                    .with_meta("mod", &path));
            }
            require.replace = Some(Box::new(Require::plain(
                replace.new_path.clone(),
                replace.new_version.clone().unwrap_or_default(),
                new_dir,
            )));
        }

        if let Some(work) = &work {
            for work_replace in &work.replaces {
                let matched = requires.iter_mut().find(|r| {
                    r.replace.is_none()
                        && r.name == work_replace.name
                        && (work_replace.version.is_empty() || work_replace.version == r.version)
                });
                if let (Some(require), Some(replacement)) = (matched, &work_replace.replace) {
                    require.replace = Some(replacement.clone_plain());
                }
            }
        }

        for require in &requires {
            if require.replace.is_none() && !files::exists(&require.dir) {
                return Err(Error::invalid_input("require dir is not exist")
                    .with_meta("require", format!("{}@{}", require.name, require.version))
                    .with_meta("path", &require.dir));
            }
        }

        let sources = Sources::new(parsed.name.clone(), dir.clone());
        Ok(Arc::new(Module {
            path,
            dir,
            name: parsed.name,
            version: parsed.version,
            go_version: parsed.go_version,
            requires,
            work,
            sources,
            pkg_dir: pkg_dir.to_string(),
            types: Types::new(),
        }))
    }

    /// Load a dependency or workspace module descriptor. Requirement lists
    /// of dependencies are never resolved; path matching always runs against
    /// the project module.
    pub(crate) fn load_dep(dir: &str, forced_name: Option<&str>, pkg_dir: &str) -> Result<Module> {
        let dir = files::absolute(dir)?;
        let path = files::join(&dir, "go.mod");
        if !files::exists(&path) {
            return Err(Error::invalid_input("mod file was not found").with_meta("path", &path));
        }
        let content = files::read_to_string(&path)?;
        let parsed = manifest::parse_mod(&content)
            .map_err(|e| Error::parse_failure("parse mod file failed").with_meta("path", &path).with_cause(e))?;
        let name = forced_name.map(str::to_string).unwrap_or(parsed.name);
        let sources = Sources::new(name.clone(), dir.clone());
        Ok(Module {
            path,
            dir,
            name,
            version: parsed.version,
            go_version: parsed.go_version,
            requires: Vec::new(),
            work: None,
            sources,
            pkg_dir: pkg_dir.to_string(),
            types: Types::new(),
        })
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn types(&self) -> &Types {
        &self.types
    }

    pub fn work(&self) -> Option<&Arc<Work>> {
        self.work.as_ref()
    }

    /// Find the module a logical package path belongs to: the project
    /// itself, a workspace `use`, or a requirement (longest path match).
    pub fn module_of(self: &Arc<Self>, path: &str) -> Result<Arc<Module>> {
        if path_in(&self.name, path) {
            return Ok(self.clone());
        }
        if let Some(work) = &self.work {
            for used in &work.uses {
                if path_in(&used.name, path) {
                    return Ok(used.clone());
                }
            }
        }
        let mut best: Option<&Require> = None;
        for require in &self.requires {
            if path_in(&require.name, path) {
                let better = best
                    .map(|b| require.name.len() > b.name.len())
                    .unwrap_or(true);
                if better {
                    best = Some(require);
                }
            }
        }
        match best {
            Some(require) => Ok(require.parsed(&self.pkg_dir)?.clone()),
            None => Err(Error::resolve_failure("path is not in module")
                .with_meta("path", path)
                .with_meta("mod", &self.name)),
        }
    }
}

impl Require {
    fn clone_plain(&self) -> Box<Require> {
        Box::new(Require {
            name: self.name.clone(),
            version: self.version.clone(),
            dir: self.dir.clone(),
            indirect: self.indirect,
            replace: self.replace.as_ref().map(|r| r.clone_plain()),
            module: OnceCell::new(),
        })
    }
}

fn path_in(module_name: &str, path: &str) -> bool {
    path == module_name || path.starts_with(&format!("{module_name}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_matching_respects_segment_boundaries() {
        assert!(path_in("example.com/util", "example.com/util"));
        assert!(path_in("example.com/util", "example.com/util/strings"));
        assert!(!path_in("example.com/util", "example.com/utility"));
    }
}
