//! Mapping from resolved types to the documentation DSL consumed by the
//! framework's documentation endpoint. Every function of a public service
//! gets parameter and result descriptors built out of `documents.*`
//! constructor chains.

use crate::codegen::writer::go_quote;
use crate::errors::{Error, Result};
use crate::resolver::{json_name, Type, TypeId, TypeKind, Types};

/// Render the `documents.*` expression describing a type. `in_progress`
/// carries the struct keys currently being expanded so that cyclic shapes
/// degrade to references instead of recursing forever.
pub fn map_type(types: &Types, id: TypeId, in_progress: &mut Vec<String>) -> Result<String> {
    let node = types.get(id);
    match node.kind {
        TypeKind::Basic => basic_element(&node),
        TypeKind::Builtin => Ok(format!(
            "documents.Ref({}, {})",
            go_quote(&node.path),
            go_quote(&node.name)
        )),
        TypeKind::Ident => {
            let inner = map_type(types, node.elements[0], in_progress)?;
            Ok(format!(
                "documents.Ident({}, {}, {inner})",
                go_quote(&node.path),
                go_quote(&node.name)
            ))
        }
        TypeKind::Interface => {
            let mut code = format!(
                "documents.Struct({}, {})",
                go_quote(&node.path),
                go_quote(&node.name)
            );
            code.push_str(&type_decorations(&node));
            Ok(code)
        }
        TypeKind::Struct => {
            let key = node.key();
            if in_progress.contains(&key) {
                return Ok(format!(
                    "documents.Ref({}, {})",
                    go_quote(&node.path),
                    go_quote(&node.name)
                ));
            }
            in_progress.push(key);
            let built = struct_element(types, &node, in_progress);
            in_progress.pop();
            built
        }
        TypeKind::StructField | TypeKind::ParadigmElement => {
            let Some(inner) = node.elements.first() else {
                return Err(Error::unsupported_shape("unknown type kind")
                    .with_meta("kind", "paradigm-element")
                    .with_meta("name", &node.name));
            };
            let mut code = map_type(types, *inner, in_progress)?;
            code.push_str(&field_decorations(&node));
            Ok(code)
        }
        TypeKind::Pointer => map_type(types, node.elements[0], in_progress),
        TypeKind::Array => {
            let element = types.get(node.elements[0]);
            if element.kind == TypeKind::Basic
                && element.path.is_empty()
                && (element.name == "byte" || element.name == "uint8")
            {
                return Ok("documents.Bytes()".to_string());
            }
            let inner = map_type(types, node.elements[0], in_progress)?;
            let mut code = format!("documents.Array({inner})");
            if !node.name.is_empty() {
                code.push_str(&format!(
                    ".SetPath({}).SetName({})",
                    go_quote(&node.path),
                    go_quote(&node.name)
                ));
            }
            code.push_str(&type_decorations(&node));
            Ok(code)
        }
        TypeKind::Map => {
            let inner = map_type(types, node.elements[1], in_progress)?;
            let mut code = format!("documents.Map({inner})");
            if !node.name.is_empty() {
                code.push_str(&format!(
                    ".SetPath({}).SetName({})",
                    go_quote(&node.path),
                    go_quote(&node.name)
                ));
            }
            Ok(code)
        }
        TypeKind::Any => Ok("documents.Any()".to_string()),
        TypeKind::Paradigm => match node.packed {
            Some(packed) => map_type(types, packed, in_progress),
            None => Ok(format!(
                "documents.Ref({}, {})",
                go_quote(&node.path),
                go_quote(&node.name)
            )),
        },
        TypeKind::Reference => Ok(format!(
            "documents.Ref({}, {})",
            go_quote(&node.path),
            go_quote(&node.name)
        )),
    }
}

fn basic_element(node: &Type) -> Result<String> {
    if !node.path.is_empty() {
        let constructor = match (node.path.as_str(), node.name.as_str()) {
            ("time", "Time") => "DateTime",
            ("time", "Duration") => "Duration",
            ("encoding/json", "RawMessage") => "JsonRaw",
            ("github.com/aacfactory/json", "RawMessage")
            | ("github.com/aacfactory/json", "Object")
            | ("github.com/aacfactory/json", "Array") => "JsonRaw",
            ("github.com/aacfactory/json", "Date")
            | ("github.com/aacfactory/fns-contrib/databases/sql", "Date") => "Date",
            ("github.com/aacfactory/json", "Time")
            | ("github.com/aacfactory/fns-contrib/databases/sql", "Time") => "Time",
            ("github.com/aacfactory/fns/commons/passwords", "Password") => "Password",
            _ => {
                return Err(Error::unsupported_shape("unknown type kind")
                    .with_meta("path", &node.path)
                    .with_meta("name", &node.name))
            }
        };
        return Ok(format!("documents.{constructor}()"));
    }
    let constructor = match node.name.as_str() {
        "string" => "String",
        "bool" => "Bool",
        "int8" | "int16" | "int32" | "rune" => "Int32",
        "int" | "int64" => "Int64",
        "uint8" | "byte" => "Uint8",
        "uint16" | "uint32" => "Uint32",
        "uint" | "uint64" => "Uint64",
        "float32" => "Float32",
        "float64" => "Float64",
        "complex64" => "Complex64",
        "complex128" => "Complex128",
        _ => {
            return Err(Error::unsupported_shape("unknown type kind")
                .with_meta("name", &node.name))
        }
    };
    Ok(format!("documents.{constructor}()"))
}

fn struct_element(types: &Types, node: &Type, in_progress: &mut Vec<String>) -> Result<String> {
    let mut code = format!(
        "documents.Struct({}, {})",
        go_quote(&node.path),
        go_quote(&node.name)
    );
    code.push_str(&type_decorations(node));
    for field_id in &node.elements {
        let field = types.get(*field_id);
        let property = map_type(types, *field_id, in_progress)?;
        code.push_str(&format!(
            ".AddProperty({}, {property})",
            go_quote(json_name(&field.tags, &field.name))
        ));
    }
    Ok(code)
}

fn type_decorations(node: &Type) -> String {
    let mut out = String::new();
    if let Some(title) = node.annotations.get("title") {
        if !title.is_empty() {
            out.push_str(&format!(".SetTitle({})", go_quote(title)));
        }
    }
    if let Some(description) = node.annotations.get("description") {
        if !description.is_empty() {
            out.push_str(&format!(".SetDescription({})", go_quote(description)));
        }
    }
    if node.annotations.contains("deprecated") {
        out.push_str(".AsDeprecated()");
    }
    out
}

fn field_decorations(node: &Type) -> String {
    let mut out = type_decorations(node);
    if node.annotations.contains("password") {
        out.push_str(".AsPassword()");
    }
    if let Some(enums) = node.annotations.get("enum") {
        if !enums.is_empty() {
            let values = enums
                .split(',')
                .map(|v| go_quote(v.trim()))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(".SetEnum({values})"));
        }
    }
    let required = node
        .tags
        .get("validate")
        .map(|v| v.split(',').any(|part| part == "required"))
        .unwrap_or(false);
    if required {
        out.push_str(".AsRequired()");
    }
    if let Some(message) = node.annotations.get("message") {
        if !message.is_empty() {
            out.push_str(&format!(".SetValidationMessage({})", go_quote(message)));
        }
    }
    if let Some(i18n) = node.annotations.get("message-i18n") {
        for line in i18n.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (locale, message) = match line.split_once(':') {
                Some((locale, message)) => (locale.trim(), message.trim()),
                None => continue,
            };
            out.push_str(&format!(
                ".AddValidationMessageI18n({}, {})",
                go_quote(locale),
                go_quote(message)
            ));
        }
    }
    out
}
