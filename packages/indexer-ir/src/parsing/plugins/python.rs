use std::path::Path;

use tree_sitter::{Node, Parser as TsParser};

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::domain::relation::{Relation, RelationType};
use crate::observation::{extract_observations, ObservationInput};
use crate::parsing::plugins::{decode, push_file_entity};
use crate::parsing::{ExtractionContext, ExtractionResult, ParseDiagnostic, Parser, ParserPolicy};
use crate::shared::span::LineSpan;

pub struct PythonParser;

impl Parser for PythonParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn language_name(&self) -> &'static str {
        "python"
    }

    fn policy(&self) -> ParserPolicy {
        ParserPolicy {
            supports_streaming: false,
            emits_implementation: true,
        }
    }

    fn parse(&self, file_bytes: &[u8], file_path: &Path) -> ExtractionResult {
        let mut result = ExtractionResult::default();
        let (source, line_count) = decode(file_bytes);

        let mut ts_parser = TsParser::new();
        if ts_parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .is_err()
        {
            result.add_diagnostic(ParseDiagnostic::new("failed to load python grammar", None));
            push_file_entity(&mut result, file_path, line_count, None);
            return result;
        }
        let tree = match ts_parser.parse(&source, None) {
            Some(t) => t,
            None => {
                result.add_diagnostic(ParseDiagnostic::new("python parse timed out", None));
                push_file_entity(&mut result, file_path, line_count, None);
                return result;
            }
        };
        let root = tree.root_node();
        if root.has_error() {
            result.add_diagnostic(ParseDiagnostic::new(
                "python source contains syntax errors",
                None,
            ));
        }

        let bytes = source.as_bytes();
        let module_summary = leading_docstring(&root, bytes);
        let file_name = push_file_entity(&mut result, file_path, line_count, module_summary);

        let module_name = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();
        let mut ctx = ExtractionContext::new(file_path.to_path_buf(), module_name);

        walk_imports(&root, bytes, file_path, &file_name, &mut result);
        walk_node(&root, bytes, file_path, &file_name, &mut ctx, &mut result);

        result
    }
}

fn text<'a>(node: Node, bytes: &'a [u8]) -> &'a str {
    node.utf8_text(bytes).unwrap_or("")
}

fn leading_docstring(root: &Node, bytes: &[u8]) -> Option<String> {
    let mut cursor = root.walk();
    let first_stmt = root.children(&mut cursor).find(|n| n.kind() != "comment")?;
    if first_stmt.kind() == "expression_statement" {
        let string_node = first_stmt.child(0)?;
        if string_node.kind() == "string" {
            return Some(clean_docstring(text(string_node, bytes)));
        }
    }
    None
}

fn clean_docstring(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == 'r' || c == 'R')
        .trim()
        .to_string()
}

fn walk_imports(
    root: &Node,
    bytes: &[u8],
    file_path: &Path,
    file_name: &str,
    result: &mut ExtractionResult,
) {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                for name in dotted_names(&child, bytes) {
                    result.add_relation(Relation::new(
                        file_name,
                        name,
                        RelationType::Imports,
                        file_path.to_path_buf(),
                    ));
                }
            }
            "import_from_statement" => {
                if let Some(module) = child.child_by_field_name("module_name") {
                    result.add_relation(Relation::new(
                        file_name,
                        text(module, bytes),
                        RelationType::Imports,
                        file_path.to_path_buf(),
                    ));
                }
            }
            _ => {}
        }
    }
}

fn dotted_names(node: &Node, bytes: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "dotted_name" | "aliased_import" | "identifier") {
            names.push(text(child, bytes).to_string());
        }
    }
    if names.is_empty() {
        names.push(text(*node, bytes).trim_start_matches("import").trim().to_string());
    }
    names
}

/// Recursively walks the tree, creating Class/Function/Method entities
/// with nested qualified names and emitting their relations.
fn walk_node(
    node: &Node,
    bytes: &[u8],
    file_path: &Path,
    owner: &str,
    ctx: &mut ExtractionContext,
    result: &mut ExtractionResult,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "decorated_definition" => {
                let decorators = collect_decorators(&child, bytes);
                if let Some(def) = child
                    .children(&mut child.walk())
                    .find(|n| matches!(n.kind(), "class_definition" | "function_definition"))
                {
                    handle_definition(&def, bytes, file_path, owner, ctx, result, decorators);
                }
            }
            "class_definition" => {
                handle_definition(&child, bytes, file_path, owner, ctx, result, Vec::new());
            }
            "function_definition" => {
                handle_definition(&child, bytes, file_path, owner, ctx, result, Vec::new());
            }
            _ => {
                walk_node(&child, bytes, file_path, owner, ctx, result);
            }
        }
    }
}

fn collect_decorators(node: &Node, bytes: &[u8]) -> Vec<String> {
    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "decorator" {
            let raw = text(child, bytes).trim_start_matches('@').trim();
            decorators.push(raw.split('(').next().unwrap_or(raw).to_string());
        }
    }
    decorators
}

fn handle_definition(
    def: &Node,
    bytes: &[u8],
    file_path: &Path,
    owner: &str,
    ctx: &mut ExtractionContext,
    result: &mut ExtractionResult,
    decorators: Vec<String>,
) {
    let is_class = def.kind() == "class_definition";
    let line_start = def.start_position().row + 1;
    let line_end = def.end_position().row + 1;
    let span = LineSpan::new(line_start, line_end);

    let raw_name = def
        .child_by_field_name("name")
        .map(|n| text(n, bytes).to_string())
        .unwrap_or_else(|| ctx.anonymous_name(line_start));
    let qualified = ctx.resolve_name(&raw_name, line_start);

    let entity_type = if is_class {
        EntityType::Class
    } else if enclosing_is_class(def) {
        EntityType::Method
    } else {
        EntityType::Function
    };

    result.add_relation(Relation::new(
        owner,
        qualified.clone(),
        RelationType::Contains,
        file_path.to_path_buf(),
    ));

    if is_class {
        for base in superclasses(def, bytes) {
            result.add_relation(Relation::new(
                qualified.clone(),
                base,
                RelationType::Inherits,
                file_path.to_path_buf(),
            ));
        }
    }

    for decorator in &decorators {
        result.add_relation(Relation::new(
            qualified.clone(),
            decorator.clone(),
            RelationType::Decorates,
            file_path.to_path_buf(),
        ));
    }

    let body = def.child_by_field_name("body");
    let docstring = body.as_ref().and_then(|b| leading_docstring(b, bytes));
    let is_async = text(*def, bytes).trim_start().starts_with("async");

    let mut stats = BodyStats::default();
    if let Some(body) = &body {
        collect_stats(body, bytes, &mut stats);
    }
    for callee in &stats.calls {
        result.add_relation(Relation::new(
            qualified.clone(),
            callee.clone(),
            RelationType::Calls,
            file_path.to_path_buf(),
        ));
    }
    for ctor in &stats.instantiates {
        result.add_relation(Relation::new(
            qualified.clone(),
            ctor.clone(),
            RelationType::Instantiates,
            file_path.to_path_buf(),
        ));
    }
    for exc in &stats.raises {
        result.add_relation(Relation::new(
            qualified.clone(),
            exc.clone(),
            RelationType::Raises,
            file_path.to_path_buf(),
        ));
    }
    for exc in &stats.catches {
        result.add_relation(Relation::new(
            qualified.clone(),
            exc.clone(),
            RelationType::Catches,
            file_path.to_path_buf(),
        ));
    }

    let param_count = def
        .child_by_field_name("parameters")
        .map(|p| p.named_child_count())
        .unwrap_or(0);
    let returns = def
        .child_by_field_name("return_type")
        .map(|n| text(n, bytes).to_string());

    let observations = extract_observations(
        &qualified,
        &ObservationInput {
            purpose: docstring.clone(),
            param_count: if is_class { None } else { Some(param_count) },
            returns,
            branch_count: Some(stats.branch_count),
            calls: stats.calls.clone(),
            raises: stats.raises.clone(),
            catches: stats.catches.clone(),
            decorators: decorators.clone(),
            is_async: Some(is_async),
        },
    );

    let entity = Entity::new(qualified.clone(), entity_type, file_path.to_path_buf(), span)
        .with_observations(observations.clone());
    result.add_entity(entity);

    let signature = text(*def, bytes)
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    let mut metadata_content = signature;
    if let Some(doc) = &docstring {
        metadata_content.push('\n');
        metadata_content.push_str(doc);
    }
    for tag in &observations {
        metadata_content.push('\n');
        metadata_content.push_str(tag);
    }

    let has_implementation = body.is_some();
    let metadata_chunk = Chunk::new(
        qualified.clone(),
        ChunkKind::Metadata,
        metadata_content,
        entity_type,
        file_path.to_path_buf(),
        span,
    )
    .with_has_implementation(has_implementation);
    result.metadata_chunks.push(metadata_chunk);

    if has_implementation {
        let implementation_chunk = Chunk::new(
            qualified.clone(),
            ChunkKind::Implementation,
            text(*def, bytes),
            entity_type,
            file_path.to_path_buf(),
            span,
        );
        result.implementation_chunks.push(implementation_chunk);
    }

    if let Some(body) = body {
        ctx.push_scope(&raw_name);
        walk_node(&body, bytes, file_path, &qualified, ctx, result);
        ctx.pop_scope();
    }
}

/// True when `def`'s nearest enclosing definition is a class — i.e. it
/// should be classified as a method rather than a free function.
fn enclosing_is_class(def: &Node) -> bool {
    let mut current = def.parent();
    while let Some(node) = current {
        match node.kind() {
            "class_definition" => return true,
            "function_definition" => return false,
            _ => current = node.parent(),
        }
    }
    false
}

fn superclasses(def: &Node, bytes: &[u8]) -> Vec<String> {
    let mut bases = Vec::new();
    if let Some(args) = def.child_by_field_name("superclasses") {
        let mut cursor = args.walk();
        for child in args.named_children(&mut cursor) {
            if matches!(child.kind(), "identifier" | "attribute") {
                bases.push(text(child, bytes).to_string());
            }
        }
    }
    bases
}

#[derive(Default)]
struct BodyStats {
    branch_count: u32,
    calls: Vec<String>,
    instantiates: Vec<String>,
    raises: Vec<String>,
    catches: Vec<String>,
}

/// Walks a function/class body collecting call sites, raised/caught
/// exception names, and a branch-count complexity signal. Does not
/// descend into nested function/class bodies — those get their own
/// entity and their own stats when `walk_node` reaches them.
fn collect_stats(node: &Node, bytes: &[u8], stats: &mut BodyStats) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" | "class_definition" => continue,
            "if_statement" | "for_statement" | "while_statement" | "boolean_operator"
            | "conditional_expression" => {
                stats.branch_count += 1;
                collect_stats(&child, bytes, stats);
            }
            "call" => {
                if let Some(func) = child.child_by_field_name("function") {
                    let name = text(func, bytes).to_string();
                    if name.chars().next().is_some_and(|c| c.is_uppercase()) {
                        stats.instantiates.push(name);
                    } else {
                        stats.calls.push(name);
                    }
                }
                collect_stats(&child, bytes, stats);
            }
            "raise_statement" => {
                if let Some(exc) = child.named_child(0) {
                    stats.raises.push(first_ident(&exc, bytes));
                }
                collect_stats(&child, bytes, stats);
            }
            "except_clause" => {
                if let Some(exc) = child.named_child(0) {
                    if exc.kind() != "block" {
                        stats.catches.push(first_ident(&exc, bytes));
                    }
                }
                collect_stats(&child, bytes, stats);
            }
            _ => collect_stats(&child, bytes, stats),
        }
    }
}

fn first_ident(node: &Node, bytes: &[u8]) -> String {
    if matches!(node.kind(), "identifier" | "attribute" | "call") {
        if node.kind() == "call" {
            if let Some(func) = node.child_by_field_name("function") {
                return text(func, bytes).to_string();
            }
        }
        return text(*node, bytes).to_string();
    }
    text(*node, bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ExtractionResult {
        PythonParser.parse(src.as_bytes(), Path::new("a.py"))
    }

    #[test]
    fn emits_file_entity_and_class_with_method() {
        let src = "class Foo:\n    def bar(self):\n        pass\n";
        let result = parse(src);
        assert!(result
            .entities
            .iter()
            .any(|e| e.entity_type == EntityType::File));
        assert!(result
            .entities
            .iter()
            .any(|e| e.name == "a::Foo" && e.entity_type == EntityType::Class));
        assert!(result
            .entities
            .iter()
            .any(|e| e.name == "a::Foo::bar" && e.entity_type == EntityType::Method));
        assert!(result.relations.iter().any(|r| r.relation_type
            == RelationType::Contains
            && r.from_entity == "a::Foo"
            && r.to_entity == "a::Foo::bar"));
    }

    #[test]
    fn import_from_statement_emits_imports_relation() {
        let src = "from a import load_user\n";
        let result = parse(src);
        assert!(result
            .relations
            .iter()
            .any(|r| r.relation_type == RelationType::Imports && r.to_entity == "a"));
    }

    #[test]
    fn functions_have_implementation_chunks() {
        let src = "def f():\n    return 1\n";
        let result = parse(src);
        assert_eq!(result.implementation_chunks.len(), 1);
        let meta = result
            .metadata_chunks
            .iter()
            .find(|c| c.entity_name == "a::f")
            .unwrap();
        assert!(meta.has_implementation);
    }
}
