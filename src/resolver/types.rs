use std::collections::BTreeMap;

use serde::Serialize;

use crate::annotations::Annotations;

/// Index of a node in the type registry. Identity is the index: two walks
/// reaching the same canonical key observe the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TypeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeKind {
    /// Primitive scalar or a whitelisted well-known wrapper, documented as
    /// its concrete form.
    Basic,
    /// Framework or standard-library type documented by reference.
    Builtin,
    /// A named alias over exactly one underlying type.
    Ident,
    Interface,
    Struct,
    StructField,
    Pointer,
    Array,
    Map,
    Any,
    /// A generic instantiation; the substituted shape hangs off `packed`.
    Paradigm,
    /// A generic parameter marker, or a field whose type mentions one.
    ParadigmElement,
    /// Placeholder seeded while a cyclic type is being resolved; the slot is
    /// overwritten by the finished node, so none survives resolution.
    Reference,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeParadigm {
    pub name: String,
    pub types: Vec<TypeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Type {
    pub kind: TypeKind,
    pub path: String,
    pub name: String,
    pub annotations: Annotations,
    pub paradigms: Vec<TypeParadigm>,
    pub tags: BTreeMap<String, String>,
    pub elements: Vec<TypeId>,
    pub packed: Option<TypeId>,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Type {
            kind,
            path: String::new(),
            name: String::new(),
            annotations: Annotations::new(),
            paradigms: Vec::new(),
            tags: BTreeMap::new(),
            elements: Vec::new(),
            packed: None,
        }
    }

    pub fn named(kind: TypeKind, path: impl Into<String>, name: impl Into<String>) -> Self {
        let mut t = Type::new(kind);
        t.path = path.into();
        t.name = name.into();
        t
    }

    pub fn key(&self) -> String {
        key_of(&self.path, &self.name)
    }

    /// A generic parameter marker, as opposed to a field carrier.
    pub fn is_paradigm_marker(&self) -> bool {
        self.kind == TypeKind::ParadigmElement && self.elements.is_empty()
    }
}

pub fn key_of(path: &str, name: &str) -> String {
    format!("{path}:{name}")
}

/// Parse a struct tag literal into its key/value pairs. Mirrors the
/// reflect.StructTag layout: space-separated `key:"value"` entries.
pub fn parse_field_tag(tag: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    let mut rest = tag.trim_matches('`');
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        let Some(colon) = rest.find(':') else {
            break;
        };
        let name = &rest[..colon];
        if name.is_empty() || name.contains(' ') || name.contains('"') {
            break;
        }
        let after = &rest[colon + 1..];
        if !after.starts_with('"') {
            break;
        }
        let mut end = None;
        let bytes = after.as_bytes();
        let mut i = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    end = Some(i);
                    break;
                }
                _ => i += 1,
            }
        }
        let Some(end) = end else {
            break;
        };
        let value = after[1..end].replace("\\\"", "\"").replace("\\\\", "\\");
        tags.insert(name.to_string(), value);
        rest = &after[end + 1..];
    }
    tags
}

/// The json binding name of a field: the first segment of its `json` tag,
/// falling back to the field name itself.
pub fn json_name<'a>(tags: &'a BTreeMap<String, String>, field_name: &'a str) -> &'a str {
    match tags.get("json") {
        Some(tag) => {
            let name = tag.split(',').next().unwrap_or("");
            if name.is_empty() {
                field_name
            } else {
                name
            }
        }
        None => field_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_struct_tags() {
        let tags = parse_field_tag("`json:\"id\" validate:\"required\"`");
        assert_eq!(tags.get("json").map(String::as_str), Some("id"));
        assert_eq!(tags.get("validate").map(String::as_str), Some("required"));
    }

    #[test]
    fn parses_tag_with_options() {
        let tags = parse_field_tag("json:\"name,omitempty\"");
        assert_eq!(tags.get("json").map(String::as_str), Some("name,omitempty"));
        assert_eq!(json_name(&tags, "Name"), "name");
    }

    #[test]
    fn json_name_falls_back_to_field() {
        let tags = BTreeMap::new();
        assert_eq!(json_name(&tags, "Name"), "Name");
        let tags = parse_field_tag("json:\",omitempty\"");
        assert_eq!(json_name(&tags, "Name"), "Name");
    }
}
