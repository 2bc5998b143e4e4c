//! Lazily parsed source trees of one module. Each package directory is
//! listed once; each file is parsed at most once behind a per-file cell so
//! that the first reader does the work and later readers observe the cached
//! tree.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use log::trace;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::errors::{Error, Result};
use crate::files;
use crate::module::import::Imports;
use crate::parser::{self, ast};

pub struct Sources {
    /// The module's logical path, the prefix every package path must carry.
    name: String,
    /// The module's on-disk root.
    dir: String,
    readers: Mutex<HashMap<String, Arc<DirReader>>>,
}

impl Sources {
    pub fn new(name: impl Into<String>, dir: impl Into<String>) -> Self {
        Sources {
            name: name.into(),
            dir: dir.into(),
            readers: Mutex::new(HashMap::new()),
        }
    }

    /// Translate a logical package path into the on-disk directory.
    pub fn dir_of(&self, path: &str) -> Result<String> {
        if path == self.name {
            return Ok(self.dir.clone());
        }
        match path.strip_prefix(&format!("{}/", self.name)) {
            Some(sub) => Ok(files::join(&self.dir, sub)),
            None => Err(Error::resolve_failure("path is not in module")
                .with_meta("path", path)
                .with_meta("mod", &self.name)),
        }
    }

    fn reader(&self, path: &str) -> Result<Arc<DirReader>> {
        let mut readers = self.readers.lock();
        if let Some(reader) = readers.get(path) {
            return Ok(reader.clone());
        }
        let dir = self.dir_of(path)?;
        let entries = fs::read_dir(&dir).map_err(|e| {
            Error::io_failure("read source dir failed")
                .with_meta("path", path)
                .with_meta("dir", &dir)
                .with_cause(e)
        })?;
        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::io_failure("read source dir failed")
                    .with_meta("path", path)
                    .with_cause(e)
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir || !name.ends_with(".go") || name.ends_with("_test.go") {
                continue;
            }
            names.push(name);
        }
        // listing order is os-defined, pin it
        names.sort();
        let sources = names
            .into_iter()
            .map(|name| {
                Arc::new(SourceFile {
                    filename: files::join(&dir, &name),
                    name,
                    parsed: OnceCell::new(),
                })
            })
            .collect();
        let reader = Arc::new(DirReader { files: sources });
        readers.insert(path.to_string(), reader.clone());
        Ok(reader)
    }

    /// Read one named file of a package.
    pub fn read_file(&self, path: &str, filename: &str) -> Result<Arc<ast::File>> {
        let reader = self.reader(path)?;
        for source in &reader.files {
            if source.name == filename {
                return source.file();
            }
        }
        Err(Error::io_failure("no file found")
            .with_meta("path", path)
            .with_meta("file", filename)
            .with_meta("mod", &self.name))
    }

    /// Iterate every non-test source file of a package.
    pub fn read_dir(
        &self,
        path: &str,
        mut f: impl FnMut(&Arc<ast::File>, &str) -> Result<()>,
    ) -> Result<()> {
        let reader = self.reader(path)?;
        for source in &reader.files {
            let file = source.file()?;
            f(&file, &source.filename)?;
        }
        Ok(())
    }

    /// Find the declaration of a named type in a package, together with the
    /// declaring file's import bindings.
    pub fn find_type(&self, path: &str, name: &str) -> Result<Option<FoundType>> {
        let reader = self.reader(path)?;
        for source in &reader.files {
            let file = source.file()?;
            if let Some(decl) = file.type_decl(name) {
                trace!("found type '{name}' of '{path}' in '{}'", source.filename);
                return Ok(Some(FoundType {
                    decl: decl.clone(),
                    imports: Imports::from_file(&file),
                    filename: source.filename.clone(),
                }));
            }
        }
        Ok(None)
    }
}

pub struct FoundType {
    pub decl: ast::TypeDecl,
    pub imports: Imports,
    pub filename: String,
}

struct DirReader {
    files: Vec<Arc<SourceFile>>,
}

struct SourceFile {
    filename: String,
    name: String,
    parsed: OnceCell<std::result::Result<Arc<ast::File>, Error>>,
}

impl SourceFile {
    fn file(&self) -> Result<Arc<ast::File>> {
        self.parsed
            .get_or_init(|| {
                let content = files::read_to_string(&self.filename)?;
                let file = parser::parse_file(&content).map_err(|e| {
                    Error::parse_failure("parse source failed")
                        .with_meta("file", &self.filename)
                        .with_cause(e)
                })?;
                Ok(Arc::new(file))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &std::path::Path, name: &str, content: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn maps_paths_and_parses_once() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("users");
        fs::create_dir_all(&pkg).unwrap();
        write_file(&pkg, "doc.go", "// @service users\npackage users\n");
        write_file(&pkg, "user.go", "package users\n\ntype User struct {\n\tId string `json:\"id\"`\n}\n");
        write_file(&pkg, "user_test.go", "package users\n\nbroken {\n");

        let sources = Sources::new("example.com/project", files::to_slash(tmp.path()));
        let dir = sources.dir_of("example.com/project/users").unwrap();
        assert!(dir.ends_with("/users"));
        assert!(sources.dir_of("other.com/x").is_err());

        let file = sources
            .read_file("example.com/project/users", "doc.go")
            .unwrap();
        assert_eq!(file.package, "users");
        // test files are never listed
        let mut seen = Vec::new();
        sources
            .read_dir("example.com/project/users", |file, filename| {
                seen.push((file.package.clone(), filename.to_string()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.len(), 2);

        let found = sources
            .find_type("example.com/project/users", "User")
            .unwrap()
            .unwrap();
        assert_eq!(found.decl.name, "User");
        assert!(sources
            .find_type("example.com/project/users", "Missing")
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_file_reports_which_one() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("svc");
        fs::create_dir_all(&pkg).unwrap();
        write_file(&pkg, "a.go", "package svc\n");
        let sources = Sources::new("m", files::to_slash(tmp.path()));
        let err = sources.read_file("m/svc", "doc.go").unwrap_err();
        assert!(err.to_string().contains("doc.go"));
    }
}
