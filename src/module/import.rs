use std::collections::HashMap;

use serde::Serialize;

use crate::parser::ast;

/// One import binding: a package path plus an optional alias. The binding
/// ident defaults to the path's tail segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    pub path: String,
    pub alias: Option<String>,
}

impl Import {
    pub fn new(path: impl Into<String>) -> Self {
        Import {
            path: path.into(),
            alias: None,
        }
    }

    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[idx + 1..],
            None => &self.path,
        }
    }

    pub fn ident(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.name(),
        }
    }
}

/// An ordered set of import bindings. Used both for a source file's imports
/// (idents are unique per file) and for the import block of an emitted file,
/// where colliding tail names get numbered aliases.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Imports {
    items: Vec<Import>,
}

impl Imports {
    pub fn new() -> Self {
        Imports { items: Vec::new() }
    }

    pub fn from_file(file: &ast::File) -> Self {
        let mut imports = Imports::new();
        for spec in &file.imports {
            // blank and dot imports bind nothing usable
            if matches!(spec.alias.as_deref(), Some("_") | Some(".")) {
                continue;
            }
            imports.add(Import {
                path: spec.path.clone(),
                alias: spec.alias.clone(),
            });
        }
        imports
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Import> {
        self.items.iter()
    }

    pub fn find(&self, ident: &str) -> Option<&Import> {
        self.items.iter().find(|i| i.ident() == ident)
    }

    pub fn by_path(&self, path: &str) -> Option<&Import> {
        self.items.iter().find(|i| i.path == path)
    }

    /// Add a source binding; a duplicate ident keeps the first entry.
    pub fn add(&mut self, import: Import) {
        if self.find(import.ident()).is_none() {
            self.items.push(import);
        }
    }

    /// Add a package for emission and return the binding ident to qualify
    /// references with. The first package owning a tail name keeps it
    /// alias-less; later ones get `<tail><N>` with a per-tail counter.
    pub fn add_path(&mut self, path: &str, counters: &mut HashMap<String, usize>) -> String {
        if let Some(existing) = self.by_path(path) {
            return existing.ident().to_string();
        }
        let mut import = Import::new(path);
        if self.find(import.ident()).is_some() {
            let times = counters.entry(import.name().to_string()).or_insert(0);
            *times += 1;
            import.alias = Some(format!("{}{}", import.name(), times));
        }
        let ident = import.ident().to_string();
        self.items.push(import);
        ident
    }

    /// Merge groups of bindings into one emission set, dropping source
    /// aliases and re-disambiguating collisions deterministically.
    pub fn merge(groups: &[&Imports]) -> Imports {
        let mut merged = Imports::new();
        let mut counters = HashMap::new();
        for group in groups {
            for import in group.iter() {
                merged.add_path(&import.path, &mut counters);
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_ident_prefers_alias() {
        let import = Import {
            path: "encoding/json".to_string(),
            alias: Some("stdjson".to_string()),
        };
        assert_eq!(import.name(), "json");
        assert_eq!(import.ident(), "stdjson");
    }

    #[test]
    fn merge_aliases_colliding_tails() {
        let mut first = Imports::new();
        first.add(Import::new("encoding/json"));
        first.add(Import::new("a/a"));
        first.add(Import::new("a/b"));
        let mut second = Imports::new();
        second.add(Import {
            path: "encoding/json".to_string(),
            alias: Some("stdjson".to_string()),
        });
        second.add(Import::new("b/a"));
        second.add(Import::new("b/b"));
        let merged = Imports::merge(&[&first, &second]);
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.by_path("encoding/json").unwrap().ident(), "json");
        assert_eq!(merged.by_path("a/a").unwrap().ident(), "a");
        assert_eq!(merged.by_path("b/a").unwrap().ident(), "a1");
        assert_eq!(merged.by_path("b/b").unwrap().ident(), "b1");
    }

    #[test]
    fn second_collision_counts_up() {
        let mut imports = Imports::new();
        let mut counters = HashMap::new();
        assert_eq!(imports.add_path("a/json", &mut counters), "json");
        assert_eq!(imports.add_path("b/json", &mut counters), "json1");
        assert_eq!(imports.add_path("c/json", &mut counters), "json2");
        assert_eq!(imports.add_path("a/json", &mut counters), "json");
    }
}
