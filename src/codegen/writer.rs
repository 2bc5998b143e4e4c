use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::module::Imports;
use crate::resolver::{TypeId, TypeKind, Types};

/// Line-oriented Go source buffer with indentation scoping.
pub struct GoWriter {
    buf: String,
    indent: usize,
}

impl GoWriter {
    pub fn new() -> Self {
        GoWriter {
            buf: String::new(),
            indent: 0,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        for _ in 0..self.indent {
            self.buf.push('\t');
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.buf.push('\n');
        self
    }

    /// Write a block opener and indent what follows.
    pub fn open(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(text);
        self.indent += 1;
        self
    }

    /// Dedent and write the block closer.
    pub fn close(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.line(text)
    }

    /// Close one block and open the next on the same line (`} else {`).
    pub fn chain(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
        self.indent += 1;
        self
    }

    /// Leave a block without emitting a closer line.
    pub fn dedent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

impl Default for GoWriter {
    fn default() -> Self {
        GoWriter::new()
    }
}

/// Render the import block, the standard library group first.
pub fn write_imports(writer: &mut GoWriter, imports: &Imports) {
    if imports.is_empty() {
        return;
    }
    let std_group: Vec<_> = imports.iter().filter(|i| is_std_path(&i.path)).collect();
    let ext_group: Vec<_> = imports.iter().filter(|i| !is_std_path(&i.path)).collect();
    writer.open("import (");
    for import in &std_group {
        match &import.alias {
            Some(alias) => writer.line(format!("{alias} \"{}\"", import.path)),
            None => writer.line(format!("\"{}\"", import.path)),
        };
    }
    if !std_group.is_empty() && !ext_group.is_empty() {
        writer.blank();
    }
    for import in &ext_group {
        match &import.alias {
            Some(alias) => writer.line(format!("{alias} \"{}\"", import.path)),
            None => writer.line(format!("\"{}\"", import.path)),
        };
    }
    writer.close(")");
    writer.blank();
}

fn is_std_path(path: &str) -> bool {
    match path.split('/').next() {
        Some(first) => !first.contains('.'),
        None => true,
    }
}

/// Quote a string as a Go interpreted string literal.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Render a duration as a Go expression using the coarsest exact unit.
pub fn go_duration_literal(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    const UNITS: &[(u128, &str)] = &[
        (3_600_000_000_000, "time.Hour"),
        (60_000_000_000, "time.Minute"),
        (1_000_000_000, "time.Second"),
        (1_000_000, "time.Millisecond"),
        (1_000, "time.Microsecond"),
    ];
    for (size, unit) in UNITS {
        if nanos > 0 && nanos % size == 0 {
            return format!("{}*{}", nanos / size, unit);
        }
    }
    format!("time.Duration({nanos})")
}

/// Render the Go syntax naming a resolved type. Types declared in the host
/// package are written unqualified; foreign packages go through the emitted
/// file's import bindings.
pub fn render_type(
    types: &Types,
    id: TypeId,
    host_path: &str,
    imports: &Imports,
) -> Result<String> {
    let node = types.get(id);
    match node.kind {
        TypeKind::Basic | TypeKind::Builtin | TypeKind::Ident | TypeKind::Interface
        | TypeKind::Struct | TypeKind::Reference => {
            if node.name.is_empty() {
                return Err(Error::unsupported_shape("anonymous type cannot be named")
                    .with_meta("kind", format!("{:?}", node.kind)));
            }
            qualified(&node.path, &node.name, host_path, imports)
        }
        TypeKind::Pointer => {
            let inner = render_type(types, node.elements[0], host_path, imports)?;
            Ok(format!("*{inner}"))
        }
        TypeKind::Array => {
            let inner = render_type(types, node.elements[0], host_path, imports)?;
            Ok(format!("[]{inner}"))
        }
        TypeKind::Map => {
            let key = render_type(types, node.elements[0], host_path, imports)?;
            let value = render_type(types, node.elements[1], host_path, imports)?;
            Ok(format!("map[{key}]{value}"))
        }
        TypeKind::Any => Ok("interface{}".to_string()),
        TypeKind::Paradigm => {
            let base = qualified(&node.path, &node.name, host_path, imports)?;
            let mut args = Vec::new();
            for paradigm in &node.paradigms {
                for arg in &paradigm.types {
                    args.push(render_type(types, *arg, host_path, imports)?);
                }
            }
            Ok(format!("{base}[{}]", args.join(", ")))
        }
        TypeKind::StructField | TypeKind::ParadigmElement => {
            Err(Error::internal("field carrier cannot be rendered as a type")
                .with_meta("name", &node.name))
        }
    }
}

fn qualified(path: &str, name: &str, host_path: &str, imports: &Imports) -> Result<String> {
    if path.is_empty() || path == host_path {
        return Ok(name.to_string());
    }
    match imports.by_path(path) {
        Some(import) => Ok(format!("{}.{name}", import.ident())),
        None => Err(Error::resolve_failure("missing import")
            .with_meta("path", path)
            .with_meta("name", name)),
    }
}

/// Write generated content: truncate, create, write, sync, 0600.
pub fn write_source(filename: &str, content: &str) -> Result<()> {
    let mut options = OpenOptions::new();
    options.create(true).truncate(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(filename).map_err(|e| {
        Error::io_failure("open code file failed")
            .with_meta("file", filename)
            .with_cause(e)
    })?;
    file.write_all(content.as_bytes()).map_err(|e| {
        Error::io_failure("write code file failed")
            .with_meta("file", filename)
            .with_cause(e)
    })?;
    file.sync_all().map_err(|e| {
        Error::io_failure("sync code file failed")
            .with_meta("file", filename)
            .with_cause(e)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_indents_blocks() {
        let mut writer = GoWriter::new();
        writer.open("func deploys() {");
        writer.line("return");
        writer.close("}");
        assert_eq!(writer.finish(), "func deploys() {\n\treturn\n}\n");
    }

    #[test]
    fn quotes_go_strings() {
        assert_eq!(go_quote("a\"b\nc"), "\"a\\\"b\\nc\"");
    }

    #[test]
    fn duration_literals_pick_exact_units() {
        assert_eq!(go_duration_literal(Duration::from_secs(2)), "2*time.Second");
        assert_eq!(go_duration_literal(Duration::from_secs(90)), "90*time.Second");
        assert_eq!(
            go_duration_literal(Duration::from_millis(300)),
            "300*time.Millisecond"
        );
        assert_eq!(go_duration_literal(Duration::from_secs(3600)), "1*time.Hour");
    }

    #[test]
    fn std_and_external_imports_are_grouped() {
        let mut imports = Imports::new();
        let mut counters = std::collections::HashMap::new();
        imports.add_path("context", &mut counters);
        imports.add_path("github.com/aacfactory/errors", &mut counters);
        let mut writer = GoWriter::new();
        write_imports(&mut writer, &imports);
        let text = writer.finish();
        assert_eq!(
            text,
            "import (\n\t\"context\"\n\n\t\"github.com/aacfactory/errors\"\n)\n\n"
        );
    }
}
