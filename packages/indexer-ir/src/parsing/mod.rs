pub mod plugins;
pub mod registry;

use std::path::{Path, PathBuf};

use crate::domain::chunk::Chunk;
use crate::domain::entity::Entity;
use crate::domain::relation::Relation;

/// Policy flags published per parser and consulted by the orchestrator (C9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserPolicy {
    pub supports_streaming: bool,
    pub emits_implementation: bool,
}

/// A non-fatal issue surfaced during parsing (e.g. a grammar error node).
#[derive(Debug, Clone, PartialEq)]
pub struct ParseDiagnostic {
    pub message: String,
    pub line: Option<usize>,
}

impl ParseDiagnostic {
    pub fn new(message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Output of a single `Parser::parse` call.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub metadata_chunks: Vec<Chunk>,
    pub implementation_chunks: Vec<Chunk>,
    pub diagnostics: Vec<ParseDiagnostic>,
    /// Set when the streaming pathway was used for an oversized input.
    pub streamed: bool,
}

impl ExtractionResult {
    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn add_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    pub fn add_diagnostic(&mut self, diagnostic: ParseDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn merge(&mut self, other: ExtractionResult) {
        self.entities.extend(other.entities);
        self.relations.extend(other.relations);
        self.metadata_chunks.extend(other.metadata_chunks);
        self.implementation_chunks.extend(other.implementation_chunks);
        self.diagnostics.extend(other.diagnostics);
        self.streamed = self.streamed || other.streamed;
    }
}

/// Tracks the qualified-name scope stack and per-scope name collisions
/// while a parser walks a single file.
pub struct ExtractionContext {
    pub file_path: PathBuf,
    scope_stack: Vec<String>,
    seen_names: std::collections::HashSet<String>,
}

impl ExtractionContext {
    pub fn new(file_path: PathBuf, module_name: impl Into<String>) -> Self {
        Self {
            file_path,
            scope_stack: vec![module_name.into()],
            seen_names: std::collections::HashSet::new(),
        }
    }

    pub fn push_scope(&mut self, name: &str) {
        self.scope_stack.push(name.to_string());
    }

    pub fn pop_scope(&mut self) {
        if self.scope_stack.len() > 1 {
            self.scope_stack.pop();
        }
    }

    pub fn current_prefix(&self) -> String {
        self.scope_stack.join("::")
    }

    pub fn qualified_name(&self, name: &str) -> String {
        format!("{}::{}", self.current_prefix(), name)
    }

    /// Returns the name to actually use: the bare qualified name on the
    /// first declaration, or the line-disambiguated form on collision.
    pub fn resolve_name(&mut self, name: &str, line_start: usize) -> String {
        let candidate = self.qualified_name(name);
        if self.seen_names.insert(candidate.clone()) {
            candidate
        } else {
            Entity::disambiguated_name(&candidate, line_start)
        }
    }

    pub fn anonymous_name(&self, line: usize) -> String {
        Entity::anonymous_name(&self.file_path, line)
    }
}

/// The uniform extraction contract every language parser implements.
pub trait Parser: Send + Sync {
    /// File extensions this parser claims, case-folded, without the dot.
    fn extensions(&self) -> &'static [&'static str];

    fn language_name(&self) -> &'static str;

    fn policy(&self) -> ParserPolicy;

    fn parse(&self, file_bytes: &[u8], file_path: &Path) -> ExtractionResult;
}
