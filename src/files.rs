//! Small filesystem helpers. All paths handled by the generator are
//! normalized to forward slashes, whatever the host separator is.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

pub fn to_slash(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

pub fn join(base: &str, sub: &str) -> String {
    if sub.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return sub.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), sub.trim_start_matches('/'))
}

pub fn exists(path: &str) -> bool {
    Path::new(path).exists()
}

pub fn absolute(path: &str) -> Result<String> {
    let p = PathBuf::from(path);
    if p.is_absolute() {
        return Ok(to_slash(&p));
    }
    let cwd = std::env::current_dir().map_err(|e| {
        Error::io_failure("get working directory failed").with_cause(e)
    })?;
    Ok(to_slash(&cwd.join(p)))
}

/// Lexically resolve `.` and `..` segments without touching the filesystem.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                match out.last() {
                    Some(&"..") | None => out.push(".."),
                    Some(_) => {
                        out.pop();
                    }
                }
            }
            other => out.push(other),
        }
    }
    let joined = out.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

pub fn read_to_string(path: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::io_failure("read file failed").with_meta("file", path).with_cause(e))
}
