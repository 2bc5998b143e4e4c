use std::collections::BTreeMap;

use log::warn;
use serde::Serialize;

use crate::errors::Result;

/// Annotations parsed out of a doc comment. Keys keep their `@` names
/// without the marker; a bare `@key` records an empty body so presence can
/// be queried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Annotations(BTreeMap<String, String>);

impl Annotations {
    pub fn new() -> Self {
        Annotations(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn set(&mut self, key: &str, body: &str) {
        let body = body.strip_suffix('\n').unwrap_or(body);
        let body = body.replace("'>>>'", ">>>").replace("'<<<'", "<<<");
        self.0.insert(key.to_string(), body);
    }
}

/// Parse a doc comment into its annotation map.
///
/// One annotation per `@key` line; the remainder of the line is the body. A
/// body spanning several lines is quoted between `>>>` and `<<<`; inside such
/// a block a leading `@` is body text. The literals `'>>>'` and `'<<<'`
/// commit as the corresponding bare triplets.
pub fn parse_annotations(s: &str) -> Result<Annotations> {
    let mut annotations = Annotations::new();
    if s.is_empty() || !s.contains('@') {
        return Ok(annotations);
    }
    let mut current_key = String::new();
    let mut current_body = String::new();
    let mut block_reading = false;
    for raw in s.lines() {
        let mut line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(stripped) = line.strip_prefix('@') {
            if block_reading {
                current_body.push_str(line);
                current_body.push('\n');
                continue;
            }
            if stripped.is_empty() {
                continue;
            }
            if !current_key.is_empty() {
                annotations.set(&current_key, &current_body);
                current_key.clear();
                current_body.clear();
            }
            match stripped.split_once(' ') {
                None => {
                    current_key = stripped.to_string();
                    // presence-only annotation until a body shows up
                    annotations.set(&current_key, "");
                    continue;
                }
                Some((key, rest)) => {
                    current_key = key.to_string();
                    line = rest.trim();
                }
            }
        }
        if line.is_empty() {
            continue;
        }
        if block_reading {
            let (remains, has_block_end) = cut_suffix(line, "<<<");
            current_body.push_str(remains);
            if has_block_end {
                annotations.set(&current_key, &current_body);
                current_key.clear();
                current_body.clear();
                block_reading = false;
            } else if !remains.is_empty() {
                current_body.push('\n');
            }
            continue;
        }
        let (remains, opens_block) = cut_prefix(line, ">>>");
        if opens_block && !current_key.is_empty() {
            block_reading = true;
            let (remains, has_block_end) = cut_suffix(remains, "<<<");
            current_body.push_str(remains);
            if has_block_end {
                annotations.set(&current_key, &current_body);
                current_key.clear();
                current_body.clear();
                block_reading = false;
            } else if !remains.is_empty() {
                current_body.push('\n');
            }
            continue;
        } else if !current_key.is_empty() {
            current_body.push_str(remains);
            annotations.set(&current_key, &current_body);
            current_key.clear();
            current_body.clear();
        }
    }
    if !current_key.is_empty() {
        if block_reading {
            warn!("annotation block of '@{current_key}' has no closing marker, keeping what was read");
        }
        annotations.set(&current_key, &current_body);
    }
    Ok(annotations)
}

fn cut_prefix<'a>(s: &'a str, prefix: &str) -> (&'a str, bool) {
    match s.strip_prefix(prefix) {
        Some(rest) => (rest, true),
        None => (s, false),
    }
}

fn cut_suffix<'a>(s: &'a str, suffix: &str) -> (&'a str, bool) {
    match s.strip_suffix(suffix) {
        Some(rest) => (rest, true),
        None => (s, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_bodies_and_blocks() {
        let s = "get\n\
                 @fn get\n\
                 @validate\n\
                 @authorization\n\
                 @internal\n\
                 @title Get\n\
                 abcd\n\
                 @description\n\
                 >>>\n\
                 Get a user @a\n\
                 @b\n\
                 '>>>'\n\
                 '<<<'\n\
                 ----------\n\
                 <<<\n\
                 1234\n";
        let annotations = parse_annotations(s).unwrap();
        assert_eq!(annotations.get("fn"), Some("get"));
        assert_eq!(annotations.get("validate"), Some(""));
        assert!(annotations.contains("authorization"));
        assert!(annotations.contains("internal"));
        assert_eq!(annotations.get("title"), Some("Get"));
        let description = annotations.get("description").unwrap();
        assert!(description.starts_with("Get a user @a"));
        assert!(description.contains("@b"));
        assert!(description.contains(">>>"));
        assert!(description.contains("<<<"));
        assert!(description.ends_with("----------"));
    }

    #[test]
    fn presence_only_annotation_records_empty_body() {
        let annotations = parse_annotations("@barrier\n").unwrap();
        assert_eq!(annotations.get("barrier"), Some(""));
    }

    #[test]
    fn single_line_body_is_trimmed() {
        let annotations = parse_annotations("@timeout 2s\n").unwrap();
        assert_eq!(annotations.get("timeout"), Some("2s"));
    }

    #[test]
    fn block_without_terminator_keeps_content() {
        let annotations = parse_annotations("@description\n>>>\nline one\nline two\n").unwrap();
        assert_eq!(annotations.get("description"), Some("line one\nline two"));
    }

    #[test]
    fn no_marker_yields_empty_map() {
        let annotations = parse_annotations("plain doc text\n").unwrap();
        assert!(annotations.is_empty());
    }

    #[test]
    fn reparse_of_rendered_map_is_stable() {
        let source = "@fn get\n@title Get\n@timeout 2s\n";
        let first = parse_annotations(source).unwrap();
        let rendered = first
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    format!("@{k}\n")
                } else {
                    format!("@{k} {v}\n")
                }
            })
            .collect::<String>();
        let second = parse_annotations(&rendered).unwrap();
        assert_eq!(first, second);
    }
}
