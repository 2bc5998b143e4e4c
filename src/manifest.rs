//! Line-oriented parser for module manifests (`go.mod`) and workspace
//! manifests (`go.work`). Only the directives the generator consumes are
//! modeled; unknown directives are skipped.

use serde::Serialize;

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModFile {
    pub name: String,
    pub version: Option<String>,
    pub go_version: Option<String>,
    pub requires: Vec<ModRequire>,
    pub replaces: Vec<ModReplace>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModRequire {
    pub path: String,
    pub version: String,
    pub indirect: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModReplace {
    pub old_path: String,
    pub old_version: Option<String>,
    pub new_path: String,
    pub new_version: Option<String>,
}

impl ModReplace {
    /// Whether the replacement points into the filesystem instead of the
    /// package cache.
    pub fn is_local(&self) -> bool {
        self.new_path.starts_with("./")
            || self.new_path.starts_with("../")
            || self.new_path.starts_with('/')
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkFile {
    pub go_version: Option<String>,
    pub uses: Vec<String>,
    pub replaces: Vec<ModReplace>,
}

pub fn parse_mod(source: &str) -> Result<ModFile> {
    let mut file = ModFile::default();
    let mut block: Option<String> = None;
    for (no, raw) in source.lines().enumerate() {
        let line = strip_comment(raw).trim().to_string();
        if line.is_empty() {
            continue;
        }
        if let Some(directive) = &block {
            if line == ")" {
                block = None;
                continue;
            }
            apply_mod_directive(&mut file, directive.clone(), &line, no + 1)?;
            continue;
        }
        let (directive, rest) = split_directive(&line);
        if rest == "(" {
            block = Some(directive);
            continue;
        }
        apply_mod_directive(&mut file, directive, rest.trim(), no + 1)?;
    }
    if file.name.is_empty() {
        return Err(Error::parse_failure("mod file has no module directive"));
    }
    Ok(file)
}

pub fn parse_work(source: &str) -> Result<WorkFile> {
    let mut file = WorkFile::default();
    let mut block: Option<String> = None;
    for (no, raw) in source.lines().enumerate() {
        let line = strip_comment(raw).trim().to_string();
        if line.is_empty() {
            continue;
        }
        if let Some(directive) = &block {
            if line == ")" {
                block = None;
                continue;
            }
            apply_work_directive(&mut file, directive.clone(), &line, no + 1)?;
            continue;
        }
        let (directive, rest) = split_directive(&line);
        if rest == "(" {
            block = Some(directive);
            continue;
        }
        apply_work_directive(&mut file, directive, rest.trim(), no + 1)?;
    }
    Ok(file)
}

fn apply_mod_directive(file: &mut ModFile, directive: String, body: &str, line: usize) -> Result<()> {
    match directive.as_str() {
        "module" => {
            let body = unquote(body);
            match body.split_once('@') {
                Some((path, version)) => {
                    file.name = path.to_string();
                    file.version = Some(version.to_string());
                }
                None => file.name = body,
            }
            Ok(())
        }
        "go" => {
            file.go_version = Some(body.to_string());
            Ok(())
        }
        "require" => {
            let require = parse_require(body, line)?;
            file.requires.push(require);
            Ok(())
        }
        "replace" => {
            file.replaces.push(parse_replace(body, line)?);
            Ok(())
        }
        // exclude, retract, toolchain and anything newer are irrelevant here
        _ => Ok(()),
    }
}

fn apply_work_directive(
    file: &mut WorkFile,
    directive: String,
    body: &str,
    line: usize,
) -> Result<()> {
    match directive.as_str() {
        "go" => {
            file.go_version = Some(body.to_string());
            Ok(())
        }
        "use" => {
            file.uses.push(unquote(body));
            Ok(())
        }
        "replace" => {
            file.replaces.push(parse_replace(body, line)?);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn parse_require(body: &str, line: usize) -> Result<ModRequire> {
    let indirect = body.contains("// indirect");
    let mut parts = body.split_whitespace();
    let path = parts.next().map(unquote).unwrap_or_default();
    let version = parts.next().unwrap_or_default().to_string();
    if path.is_empty() || version.is_empty() {
        return Err(Error::parse_failure("require directive is invalid")
            .with_meta("line", line.to_string())
            .with_meta("body", body));
    }
    Ok(ModRequire {
        path,
        version,
        indirect,
    })
}

fn parse_replace(body: &str, line: usize) -> Result<ModReplace> {
    let Some((old, new)) = body.split_once("=>") else {
        return Err(Error::parse_failure("replace directive is invalid")
            .with_meta("line", line.to_string())
            .with_meta("body", body));
    };
    let mut old_parts = old.split_whitespace();
    let old_path = old_parts.next().map(unquote).unwrap_or_default();
    let old_version = old_parts.next().map(str::to_string);
    let mut new_parts = new.split_whitespace();
    let new_path = new_parts.next().map(unquote).unwrap_or_default();
    let new_version = new_parts.next().map(str::to_string);
    if old_path.is_empty() || new_path.is_empty() {
        return Err(Error::parse_failure("replace directive is invalid")
            .with_meta("line", line.to_string())
            .with_meta("body", body));
    }
    Ok(ModReplace {
        old_path,
        old_version,
        new_path,
        new_version,
    })
}

fn split_directive(line: &str) -> (String, &str) {
    match line.split_once(char::is_whitespace) {
        Some((directive, rest)) => (directive.to_string(), rest.trim()),
        None => (line.to_string(), ""),
    }
}

fn strip_comment(line: &str) -> &str {
    // `// indirect` markers are the one comment that carries meaning
    if line.trim_end().ends_with("// indirect") {
        return line;
    }
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn unquote(s: &str) -> String {
    s.trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mod_file() {
        let source = r#"module example.com/project

go 1.21

require (
	github.com/aacfactory/fns v1.0.0
	example.com/util v0.1.0 // indirect
)

require github.com/aacfactory/errors v1.2.0

replace example.com/util v0.1.0 => ../util
"#;
        let file = parse_mod(source).unwrap();
        assert_eq!(file.name, "example.com/project");
        assert_eq!(file.go_version.as_deref(), Some("1.21"));
        assert_eq!(file.requires.len(), 3);
        assert!(file.requires[1].indirect);
        assert_eq!(file.requires[2].path, "github.com/aacfactory/errors");
        assert_eq!(file.replaces.len(), 1);
        assert!(file.replaces[0].is_local());
        assert_eq!(file.replaces[0].old_version.as_deref(), Some("v0.1.0"));
    }

    #[test]
    fn parses_work_file() {
        let source = "go 1.21\n\nuse ./libs/util\n\nuse (\n\t./svc\n)\n\nreplace a.com/x => b.com/x v2.0.0\n";
        let file = parse_work(source).unwrap();
        assert_eq!(file.uses, vec!["./libs/util".to_string(), "./svc".to_string()]);
        assert_eq!(file.replaces.len(), 1);
        assert_eq!(file.replaces[0].new_version.as_deref(), Some("v2.0.0"));
    }

    #[test]
    fn missing_module_directive_fails() {
        assert!(parse_mod("go 1.21\n").is_err());
    }

    #[test]
    fn comments_are_stripped() {
        let file = parse_mod("// heading\nmodule a.com/b // tail\n").unwrap();
        assert_eq!(file.name, "a.com/b");
    }
}
