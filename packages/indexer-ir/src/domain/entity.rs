use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::span::LineSpan;

/// The set of entity kinds a parser may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    File,
    Class,
    Function,
    Method,
    Variable,
    Documentation,
    TextChunk,
    ManualNote,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::File => "file",
            EntityType::Class => "class",
            EntityType::Function => "function",
            EntityType::Method => "method",
            EntityType::Variable => "variable",
            EntityType::Documentation => "documentation",
            EntityType::TextChunk => "text_chunk",
            EntityType::ManualNote => "manual_note",
            EntityType::Other => "other",
        }
    }
}

/// A named, typed node extracted from a file.
///
/// `name` is unique within a collection by convention: a fully-qualified
/// `module::Class::method` path. Every non-manual entity is owned by
/// exactly one file — `file_path` is never `None` for parsed entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: EntityType,
    pub file_path: Option<PathBuf>,
    pub line_span: LineSpan,
    pub observations: Vec<String>,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        entity_type: EntityType,
        file_path: PathBuf,
        line_span: LineSpan,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type,
            file_path: Some(file_path),
            line_span,
            observations: Vec::new(),
        }
    }

    pub fn is_manual(&self) -> bool {
        self.file_path.is_none()
    }

    pub fn with_observations(mut self, observations: Vec<String>) -> Self {
        self.observations = observations;
        self
    }

    /// Disambiguates a duplicate name by appending the declaration's
    /// starting line — only called on an actual collision within scope.
    pub fn disambiguated_name(base_name: &str, line_start: usize) -> String {
        format!("{base_name}#{line_start}")
    }

    /// Synthetic name for an anonymous declaration (lambda, arrow function).
    pub fn anonymous_name(file_path: &std::path::Path, line: usize) -> String {
        format!("anon@{}:{}", file_path.display(), line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disambiguation_appends_line() {
        assert_eq!(Entity::disambiguated_name("mod::f", 42), "mod::f#42");
    }

    #[test]
    fn anonymous_name_format() {
        let name = Entity::anonymous_name(std::path::Path::new("a.py"), 7);
        assert_eq!(name, "anon@a.py:7");
    }

    #[test]
    fn manual_entity_has_no_file_path() {
        let e = Entity {
            name: "note-1".into(),
            entity_type: EntityType::ManualNote,
            file_path: None,
            line_span: LineSpan::single(0),
            observations: vec![],
        };
        assert!(e.is_manual());
    }
}
