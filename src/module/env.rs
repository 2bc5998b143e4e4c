use std::env;

use crate::errors::{Error, Result};
use crate::files;

pub fn gopath() -> Option<String> {
    lookup("GOPATH")
}

pub fn goroot() -> Option<String> {
    lookup("GOROOT")
}

fn lookup(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.replace('\\', "/"))
}

/// Locate the package cache, `GOPATH` taking priority over `GOROOT`.
pub fn pkg_dir() -> Result<String> {
    if let Some(gopath) = gopath() {
        let dir = files::join(&gopath, "pkg/mod");
        if !files::exists(&dir) {
            return Err(Error::invalid_input("GOPATH was found but has no 'pkg/mod' dir")
                .with_meta("gopath", gopath));
        }
        return Ok(dir);
    }
    if let Some(goroot) = goroot() {
        let dir = files::join(&goroot, "pkg/mod");
        if !files::exists(&dir) {
            return Err(Error::invalid_input("GOROOT was found but has no 'pkg/mod' dir")
                .with_meta("goroot", goroot));
        }
        return Ok(dir);
    }
    Err(Error::invalid_input("GOPATH and GOROOT were not found"))
}
